pub mod booking;
pub mod catalog;
pub mod client;
pub mod conversation;
pub mod quote;
