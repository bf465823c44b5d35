use std::collections::{BTreeSet, HashMap};

use tokio::sync::RwLock;

use concierge_core::domain::booking::{Booking, PaymentInstallment, SupplierConfirmation};
use concierge_core::domain::catalog::{
    Destination, PermitRequirement, ServiceRate, ServiceRateId, ServiceType,
};
use concierge_core::domain::client::{apply_score_delta, ClientId, ClientProfile};
use concierge_core::domain::conversation::{ConversationId, ConversationTurn};
use concierge_core::domain::quote::{Quote, QuoteId};

use super::{
    BookingRepository, CatalogRepository, ClientProfileRepository, ConversationMemoryRepository,
    QuoteRepository, RateFilter, RateOrder, RepositoryError,
};

#[derive(Default)]
pub struct InMemoryClientProfileRepository {
    profiles: RwLock<HashMap<String, ClientProfile>>,
}

#[async_trait::async_trait]
impl ClientProfileRepository for InMemoryClientProfileRepository {
    async fn find_by_id(&self, id: &ClientId) -> Result<Option<ClientProfile>, RepositoryError> {
        let profiles = self.profiles.read().await;
        Ok(profiles.get(&id.0).cloned())
    }

    async fn save(&self, profile: ClientProfile) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        profiles.insert(profile.id.0.clone(), profile);
        Ok(())
    }

    async fn adjust_lead_score(&self, id: &ClientId, delta: i32) -> Result<u8, RepositoryError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles.get_mut(&id.0).ok_or_else(|| RepositoryError::NotFound {
            entity: "client_profile",
            id: id.0.clone(),
        })?;
        profile.lead_score = apply_score_delta(profile.lead_score, delta);
        Ok(profile.lead_score)
    }

    async fn update_locale(&self, id: &ClientId, locale: &str) -> Result<(), RepositoryError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles.get_mut(&id.0).ok_or_else(|| RepositoryError::NotFound {
            entity: "client_profile",
            id: id.0.clone(),
        })?;
        profile.locale = locale.to_string();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryConversationMemoryRepository {
    turns: RwLock<Vec<ConversationTurn>>,
}

impl InMemoryConversationMemoryRepository {
    pub async fn all(&self) -> Vec<ConversationTurn> {
        self.turns.read().await.clone()
    }
}

#[async_trait::async_trait]
impl ConversationMemoryRepository for InMemoryConversationMemoryRepository {
    async fn append(&self, turn: ConversationTurn) -> Result<(), RepositoryError> {
        self.turns.write().await.push(turn);
        Ok(())
    }

    async fn recent(
        &self,
        client_id: &ClientId,
        exclude_conversation: Option<&ConversationId>,
        limit: usize,
    ) -> Result<Vec<ConversationTurn>, RepositoryError> {
        let turns = self.turns.read().await;
        let mut matching = turns
            .iter()
            .filter(|turn| &turn.client_id == client_id)
            .filter(|turn| {
                exclude_conversation.is_none() || turn.conversation_id.as_ref() != exclude_conversation
            })
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by_key(|turn| turn.created_at);
        let skip = matching.len().saturating_sub(limit);
        Ok(matching.split_off(skip))
    }
}

#[derive(Default)]
pub struct InMemoryCatalogRepository {
    destinations: RwLock<Vec<Destination>>,
    rates: RwLock<Vec<ServiceRate>>,
    permits: RwLock<Vec<PermitRequirement>>,
}

impl InMemoryCatalogRepository {
    pub fn new(
        destinations: Vec<Destination>,
        rates: Vec<ServiceRate>,
        permits: Vec<PermitRequirement>,
    ) -> Self {
        Self {
            destinations: RwLock::new(destinations),
            rates: RwLock::new(rates),
            permits: RwLock::new(permits),
        }
    }
}

#[async_trait::async_trait]
impl CatalogRepository for InMemoryCatalogRepository {
    async fn search_rates(&self, filter: &RateFilter) -> Result<Vec<ServiceRate>, RepositoryError> {
        let rates = self.rates.read().await;
        let mut matching =
            rates.iter().filter(|rate| filter.matches(rate)).cloned().collect::<Vec<_>>();
        match filter.order {
            RateOrder::Name => matching.sort_by(|left, right| left.name.cmp(&right.name)),
            RateOrder::SellPriceDesc => matching.sort_by(|left, right| {
                right
                    .sell_price_cents
                    .cmp(&left.sell_price_cents)
                    .then_with(|| left.name.cmp(&right.name))
            }),
        }
        matching.truncate(filter.limit);
        Ok(matching)
    }

    async fn find_rate(&self, id: &ServiceRateId) -> Result<Option<ServiceRate>, RepositoryError> {
        let rates = self.rates.read().await;
        Ok(rates.iter().find(|rate| &rate.id == id).cloned())
    }

    async fn list_destinations(
        &self,
        country: Option<&str>,
    ) -> Result<Vec<Destination>, RepositoryError> {
        let destinations = self.destinations.read().await;
        Ok(destinations
            .iter()
            .filter(|destination| {
                country.map_or(true, |country| destination.country.eq_ignore_ascii_case(country))
            })
            .cloned()
            .collect())
    }

    async fn list_categories(
        &self,
        service_type: Option<ServiceType>,
    ) -> Result<Vec<String>, RepositoryError> {
        let rates = self.rates.read().await;
        let categories = rates
            .iter()
            .filter(|rate| rate.active)
            .filter(|rate| service_type.map_or(true, |service_type| rate.service_type == service_type))
            .map(|rate| rate.category.clone())
            .collect::<BTreeSet<_>>();
        Ok(categories.into_iter().collect())
    }

    async fn permits_for_region(
        &self,
        region: &str,
    ) -> Result<Vec<PermitRequirement>, RepositoryError> {
        let permits = self.permits.read().await;
        Ok(permits
            .iter()
            .filter(|permit| permit.region.eq_ignore_ascii_case(region.trim()))
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryQuoteRepository {
    quotes: RwLock<HashMap<String, Quote>>,
}

#[async_trait::async_trait]
impl QuoteRepository for InMemoryQuoteRepository {
    async fn find_by_id(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        let quotes = self.quotes.read().await;
        Ok(quotes.get(&id.0).cloned())
    }

    async fn save(&self, quote: Quote) -> Result<(), RepositoryError> {
        let mut quotes = self.quotes.write().await;
        quotes.insert(quote.id.0.clone(), quote);
        Ok(())
    }
}

struct BookingRecord {
    booking: Booking,
    installments: Vec<PaymentInstallment>,
    confirmations: Vec<SupplierConfirmation>,
}

#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: RwLock<Vec<BookingRecord>>,
}

impl InMemoryBookingRepository {
    pub async fn insert(
        &self,
        booking: Booking,
        installments: Vec<PaymentInstallment>,
        confirmations: Vec<SupplierConfirmation>,
    ) {
        self.bookings.write().await.push(BookingRecord { booking, installments, confirmations });
    }
}

#[async_trait::async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn find_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Booking>, RepositoryError> {
        let bookings = self.bookings.read().await;
        Ok(bookings
            .iter()
            .find(|record| record.booking.reference.eq_ignore_ascii_case(reference.trim()))
            .map(|record| record.booking.clone()))
    }

    async fn installments(
        &self,
        booking_id: &str,
    ) -> Result<Vec<PaymentInstallment>, RepositoryError> {
        let bookings = self.bookings.read().await;
        let mut installments = bookings
            .iter()
            .filter(|record| record.booking.id == booking_id)
            .flat_map(|record| record.installments.iter().cloned())
            .collect::<Vec<_>>();
        installments.sort_by_key(|installment| installment.due_date);
        Ok(installments)
    }

    async fn confirmations(
        &self,
        booking_id: &str,
    ) -> Result<Vec<SupplierConfirmation>, RepositoryError> {
        let bookings = self.bookings.read().await;
        Ok(bookings
            .iter()
            .filter(|record| record.booking.id == booking_id)
            .flat_map(|record| record.confirmations.iter().cloned())
            .collect())
    }
}
