pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod trek;

pub use domain::booking::{Booking, BookingStatus, PaymentInstallment, SupplierConfirmation};
pub use domain::catalog::{Destination, PermitRequirement, ServiceRate, ServiceRateId, ServiceType};
pub use domain::client::{ClientId, ClientProfile, LeadTemperature};
pub use domain::conversation::{ConversationId, ConversationTurn, Message, Role, ToolCall, ToolResult};
pub use domain::quote::{Quote, QuoteId, QuoteItem, QuoteItemRequest, QuoteStatus};
pub use errors::{ApplicationError, DomainError, InterfaceError};
