use async_trait::async_trait;
use thiserror::Error;

use concierge_core::domain::booking::{Booking, PaymentInstallment, SupplierConfirmation};
use concierge_core::domain::catalog::{
    Destination, PermitRequirement, ServiceRate, ServiceRateId, ServiceType,
};
use concierge_core::domain::client::{ClientId, ClientProfile};
use concierge_core::domain::conversation::{ConversationId, ConversationTurn};
use concierge_core::domain::quote::{Quote, QuoteId};

pub mod booking;
pub mod catalog;
pub mod client;
pub mod conversation;
pub mod memory;
pub mod quote;

pub use booking::SqlBookingRepository;
pub use catalog::SqlCatalogRepository;
pub use client::SqlClientProfileRepository;
pub use conversation::SqlConversationMemoryRepository;
pub use memory::{
    InMemoryBookingRepository, InMemoryCatalogRepository, InMemoryClientProfileRepository,
    InMemoryConversationMemoryRepository, InMemoryQuoteRepository,
};
pub use quote::SqlQuoteRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: String },
}

#[async_trait]
pub trait ClientProfileRepository: Send + Sync {
    async fn find_by_id(&self, id: &ClientId) -> Result<Option<ClientProfile>, RepositoryError>;
    async fn save(&self, profile: ClientProfile) -> Result<(), RepositoryError>;
    /// Adds `delta` to the stored score, clamped to 0..=100, and returns the new score.
    async fn adjust_lead_score(&self, id: &ClientId, delta: i32) -> Result<u8, RepositoryError>;
    async fn update_locale(&self, id: &ClientId, locale: &str) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait ConversationMemoryRepository: Send + Sync {
    async fn append(&self, turn: ConversationTurn) -> Result<(), RepositoryError>;
    /// Most recent turns for a client, oldest first. Turns belonging to
    /// `exclude_conversation` are skipped since the caller already holds them.
    async fn recent(
        &self,
        client_id: &ClientId,
        exclude_conversation: Option<&ConversationId>,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, RepositoryError>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RateOrder {
    #[default]
    Name,
    SellPriceDesc,
}

/// Filter for active service rates. Text fields match case-insensitively;
/// `destination` matches either the destination id or a fragment of its name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RateFilter {
    pub destination: Option<String>,
    pub service_type: Option<ServiceType>,
    pub category: Option<String>,
    pub text: Option<String>,
    pub min_star_rating: Option<i64>,
    pub max_duration_days: Option<i64>,
    pub exclude_ids: Vec<String>,
    pub order: RateOrder,
    pub limit: usize,
}

impl Default for RateFilter {
    fn default() -> Self {
        Self {
            destination: None,
            service_type: None,
            category: None,
            text: None,
            min_star_rating: None,
            max_duration_days: None,
            exclude_ids: Vec::new(),
            order: RateOrder::Name,
            limit: 20,
        }
    }
}

impl RateFilter {
    pub fn matches(&self, rate: &ServiceRate) -> bool {
        if !rate.active {
            return false;
        }
        if let Some(destination) = self.destination.as_deref() {
            let needle = destination.to_lowercase();
            if rate.destination_id.to_lowercase() != needle
                && !rate.destination_name.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if self.service_type.is_some_and(|service_type| service_type != rate.service_type) {
            return false;
        }
        if let Some(category) = self.category.as_deref() {
            if !rate.category.eq_ignore_ascii_case(category) {
                return false;
            }
        }
        if let Some(text) = self.text.as_deref() {
            let needle = text.to_lowercase();
            if !rate.name.to_lowercase().contains(&needle)
                && !rate.description.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if let Some(min) = self.min_star_rating {
            if rate.star_rating.unwrap_or(0) < min {
                return false;
            }
        }
        if let Some(max) = self.max_duration_days {
            if rate.duration_days.is_some_and(|days| days > max) {
                return false;
            }
        }
        !self.exclude_ids.iter().any(|id| id == &rate.id.0)
    }
}

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn search_rates(&self, filter: &RateFilter) -> Result<Vec<ServiceRate>, RepositoryError>;
    async fn find_rate(&self, id: &ServiceRateId) -> Result<Option<ServiceRate>, RepositoryError>;
    async fn list_destinations(
        &self,
        country: Option<&str>,
    ) -> Result<Vec<Destination>, RepositoryError>;
    async fn list_categories(
        &self,
        service_type: Option<ServiceType>,
    ) -> Result<Vec<String>, RepositoryError>;
    async fn permits_for_region(
        &self,
        region: &str,
    ) -> Result<Vec<PermitRequirement>, RepositoryError>;
}

#[async_trait]
pub trait QuoteRepository: Send + Sync {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
    async fn save(&self, quote: Quote) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn find_by_reference(&self, reference: &str)
        -> Result<Option<Booking>, RepositoryError>;
    async fn installments(
        &self,
        booking_id: &str,
    ) -> Result<Vec<PaymentInstallment>, RepositoryError>;
    async fn confirmations(
        &self,
        booking_id: &str,
    ) -> Result<Vec<SupplierConfirmation>, RepositoryError>;
}

pub(crate) fn decode_error(error: sqlx::Error) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

pub(crate) fn parse_u32(column: &str, value: i64) -> Result<u32, RepositoryError> {
    u32::try_from(value).map_err(|_| {
        RepositoryError::Decode(format!(
            "invalid value for `{column}` (expected non-negative u32): {value}"
        ))
    })
}

pub(crate) fn parse_date(column: &str, value: &str) -> Result<chrono::NaiveDate, RepositoryError> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|error| RepositoryError::Decode(format!("invalid date in `{column}`: {error}")))
}

pub(crate) fn parse_timestamp(
    column: &str,
    value: &str,
) -> Result<chrono::DateTime<chrono::Utc>, RepositoryError> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&chrono::Utc))
        .map_err(|error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: {error}"))
        })
}

pub(crate) fn parse_enum<T>(column: &str, value: &str) -> Result<T, RepositoryError>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse::<T>().map_err(|error| RepositoryError::Decode(format!("{column}: {error}")))
}

#[cfg(test)]
mod tests {
    use concierge_core::domain::catalog::{ServiceRate, ServiceRateId, ServiceType};

    use super::RateFilter;

    fn rate(id: &str, name: &str, stars: Option<i64>) -> ServiceRate {
        ServiceRate {
            id: ServiceRateId(id.to_string()),
            destination_id: "dest-ktm".to_string(),
            destination_name: "Kathmandu".to_string(),
            service_type: ServiceType::Hotel,
            category: "heritage".to_string(),
            name: name.to_string(),
            star_rating: stars,
            supplier_name: "Supplier".to_string(),
            cost_price_cents: 10_000,
            sell_price_cents: 15_000,
            currency: "USD".to_string(),
            unit: "per_room_night".to_string(),
            duration_days: None,
            season_start: None,
            season_end: None,
            capacity: None,
            description: "Courtyard suites".to_string(),
            active: true,
        }
    }

    #[test]
    fn destination_matches_id_or_name_fragment() {
        let candidate = rate("rate-1", "Dwarika's", Some(5));

        let by_name = RateFilter { destination: Some("kathmandu".to_string()), ..RateFilter::default() };
        let by_id = RateFilter { destination: Some("DEST-KTM".to_string()), ..RateFilter::default() };
        let other = RateFilter { destination: Some("Paro".to_string()), ..RateFilter::default() };

        assert!(by_name.matches(&candidate));
        assert!(by_id.matches(&candidate));
        assert!(!other.matches(&candidate));
    }

    #[test]
    fn inactive_and_excluded_rates_never_match() {
        let mut inactive = rate("rate-1", "Dwarika's", Some(5));
        inactive.active = false;
        assert!(!RateFilter::default().matches(&inactive));

        let excluded = RateFilter { exclude_ids: vec!["rate-2".to_string()], ..RateFilter::default() };
        assert!(!excluded.matches(&rate("rate-2", "Yak & Yeti", Some(4))));
    }

    #[test]
    fn star_rating_and_text_filters() {
        let filter = RateFilter {
            min_star_rating: Some(5),
            text: Some("COURTYARD".to_string()),
            ..RateFilter::default()
        };

        assert!(filter.matches(&rate("rate-1", "Dwarika's", Some(5))));
        assert!(!filter.matches(&rate("rate-2", "Yak & Yeti", Some(4))));
        assert!(!filter.matches(&rate("rate-3", "Guest House", None)));
    }
}
