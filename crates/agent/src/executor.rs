//! Repository-backed implementation of every concierge tool.
//!
//! Results are returned raw: rate listings and quote totals include supplier
//! cost and margin so internal callers see the whole picture. The runtime
//! sanitizes every result before it reaches the model.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use concierge_core::domain::booking::{Booking, ConfirmationStatus, InstallmentStatus};
use concierge_core::domain::catalog::{ServiceRate, ServiceRateId, ServiceType};
use concierge_core::domain::quote::{Quote, QuoteId, QuoteItem, QuoteItemRequest, QuoteStatus};
use concierge_core::pricing::{
    cents_to_decimal, decimal_to_cents, decimal_to_f64, margin_percent, price_line, summarize,
    PricedLine, QuoteTotals,
};
use concierge_core::trek::{
    validate_acclimatization, ItineraryDay, MAX_SLEEPING_ALTITUDE_M, MIN_SLEEPING_ALTITUDE_M,
};
use concierge_db::repositories::{
    BookingRepository, CatalogRepository, QuoteRepository, RateFilter, RateOrder,
};

use crate::tools::{ToolContext, ToolError, ToolExecutor, ToolName};

const MAX_UPSELLS: usize = 3;
const DEFAULT_QUOTE_TITLE: &str = "Bespoke journey";

pub const RESEARCH_GUIDANCE: &str = "This service is not in the contracted catalog. Estimate from \
     general market knowledge for the destination and season, give a price range rather than a \
     single figure, label every figure as an estimate, and offer to confirm exact pricing with a \
     local partner before booking.";

pub struct CatalogToolExecutor {
    catalog: Arc<dyn CatalogRepository>,
    quotes: Arc<dyn QuoteRepository>,
    bookings: Arc<dyn BookingRepository>,
    today: Option<NaiveDate>,
}

impl CatalogToolExecutor {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        quotes: Arc<dyn QuoteRepository>,
        bookings: Arc<dyn BookingRepository>,
    ) -> Self {
        Self { catalog, quotes, bookings, today: None }
    }

    /// Pins the date used for departure countdowns and overdue installments.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    async fn search_rates(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: SearchRatesArgs = parse_arguments(arguments)?;
        let filter = RateFilter {
            destination: non_empty(args.destination),
            service_type: args.service_type.as_deref().map(parse_service_type).transpose()?,
            category: non_empty(args.category),
            text: non_empty(args.query),
            ..RateFilter::default()
        };
        let rates = self.catalog.search_rates(&filter).await?;
        Ok(json!({"count": rates.len(), "rates": rates.iter().map(rate_json).collect::<Vec<_>>()}))
    }

    async fn search_hotels(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: SearchHotelsArgs = parse_arguments(arguments)?;
        let filter = RateFilter {
            destination: non_empty(args.destination),
            service_type: Some(ServiceType::Hotel),
            min_star_rating: args.min_star_rating,
            ..RateFilter::default()
        };
        let hotels = self.catalog.search_rates(&filter).await?;
        Ok(json!({"count": hotels.len(), "hotels": hotels.iter().map(rate_json).collect::<Vec<_>>()}))
    }

    async fn search_packages(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: SearchPackagesArgs = parse_arguments(arguments)?;
        let filter = RateFilter {
            destination: non_empty(args.destination),
            service_type: Some(ServiceType::Package),
            max_duration_days: args.max_duration_days,
            ..RateFilter::default()
        };
        let packages = self.catalog.search_rates(&filter).await?;
        Ok(json!({
            "count": packages.len(),
            "packages": packages.iter().map(rate_json).collect::<Vec<_>>()
        }))
    }

    async fn price_items(
        &self,
        items: &[QuoteItemRequest],
        travelers: u32,
    ) -> Result<PricedSelection, ToolError> {
        let mut lines = Vec::with_capacity(items.len());
        let mut currency = None;
        for item in items {
            let rate = self
                .catalog
                .find_rate(&ServiceRateId(item.service_id.clone()))
                .await?
                .ok_or_else(|| ToolError::NotFound(format!("service `{}`", item.service_id)))?;
            if !rate.active {
                return Err(ToolError::InvalidArguments(format!(
                    "service `{}` is no longer offered",
                    item.service_id
                )));
            }
            match currency.as_deref() {
                None => currency = Some(rate.currency.clone()),
                Some(existing) if existing != rate.currency => {
                    return Err(ToolError::InvalidArguments(format!(
                        "service `{}` is priced in {}, the quote is in {existing}",
                        item.service_id, rate.currency
                    )));
                }
                Some(_) => {}
            }
            let line = price_line(&rate, item)
                .map_err(|error| ToolError::InvalidArguments(error.to_string()))?;
            lines.push(line);
        }

        let totals = summarize(&lines, travelers)
            .map_err(|error| ToolError::InvalidArguments(error.to_string()))?;
        Ok(PricedSelection { currency: currency.unwrap_or_else(|| "USD".to_string()), lines, totals })
    }

    async fn calculate_quote(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: QuoteArgs = parse_arguments(arguments)?;
        let priced = self.price_items(&args.items, args.travelers.unwrap_or(1)).await?;
        Ok(priced.to_json())
    }

    async fn save_quote(&self, arguments: Value, context: &ToolContext) -> Result<Value, ToolError> {
        let args: QuoteArgs = parse_arguments(arguments)?;
        let priced = self.price_items(&args.items, args.travelers.unwrap_or(1)).await?;

        let quote = Quote {
            id: QuoteId(Uuid::new_v4().to_string()),
            client_id: context.client_id.clone(),
            title: non_empty(args.title).unwrap_or_else(|| DEFAULT_QUOTE_TITLE.to_string()),
            status: QuoteStatus::Draft,
            currency: priced.currency.clone(),
            travelers: priced.totals.travelers,
            start_date: args.start_date,
            items: priced
                .lines
                .iter()
                .map(|line| QuoteItem {
                    id: Uuid::new_v4().to_string(),
                    service_rate_id: ServiceRateId(line.service_id.clone()),
                    description: line.description.clone(),
                    quantity: line.quantity,
                    nights: line.nights,
                    unit_sell_cents: decimal_to_cents(line.unit_sell),
                    unit_cost_cents: decimal_to_cents(line.unit_cost),
                })
                .collect(),
            created_at: Utc::now(),
        };
        let quote_id = quote.id.0.clone();
        let title = quote.title.clone();
        self.quotes.save(quote).await?;

        Ok(json!({
            "quoteId": quote_id,
            "status": QuoteStatus::Draft.as_str(),
            "title": title,
            "currency": priced.currency,
            "travelers": priced.totals.travelers,
            "sellTotal": decimal_to_f64(priced.totals.sell),
            "perPerson": decimal_to_f64(priced.totals.per_person),
            "marginPercent": decimal_to_f64(priced.totals.margin_percent),
        }))
    }

    async fn get_destinations(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: DestinationArgs = parse_arguments(arguments)?;
        let country = non_empty(args.country);
        let destinations = self.catalog.list_destinations(country.as_deref()).await?;
        Ok(json!({
            "destinations": destinations
                .iter()
                .map(|destination| json!({
                    "id": destination.id,
                    "name": destination.name,
                    "country": destination.country,
                    "region": destination.region,
                    "description": destination.description,
                    "maxAltitudeM": destination.max_altitude_m,
                }))
                .collect::<Vec<_>>()
        }))
    }

    async fn get_service_details(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: ServiceArgs = parse_arguments(arguments)?;
        let rate = self
            .catalog
            .find_rate(&ServiceRateId(args.service_id.clone()))
            .await?
            .ok_or_else(|| ToolError::NotFound(format!("service `{}`", args.service_id)))?;
        Ok(json!({"service": rate_json(&rate)}))
    }

    async fn list_categories(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: CategoryArgs = parse_arguments(arguments)?;
        let service_type = args.service_type.as_deref().map(parse_service_type).transpose()?;
        let categories = self.catalog.list_categories(service_type).await?;
        Ok(json!({
            "serviceType": service_type.map(|service_type| service_type.as_str()),
            "categories": categories,
        }))
    }

    fn research_external_rates(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: ResearchArgs = parse_arguments(arguments)?;
        Ok(json!({
            "source": "estimate",
            "destination": args.destination,
            "request": args.service_description,
            "guidance": RESEARCH_GUIDANCE,
        }))
    }

    async fn booking(&self, reference: &str) -> Result<Booking, ToolError> {
        self.bookings
            .find_by_reference(reference)
            .await?
            .ok_or_else(|| ToolError::NotFound(format!("booking `{}`", reference.trim())))
    }

    async fn get_booking_status(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: BookingArgs = parse_arguments(arguments)?;
        let booking = self.booking(&args.booking_reference).await?;
        Ok(booking_json(&booking))
    }

    async fn get_payment_schedule(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: BookingArgs = parse_arguments(arguments)?;
        let booking = self.booking(&args.booking_reference).await?;
        let installments = self.bookings.installments(&booking.id).await?;
        let today = self.today();

        Ok(json!({
            "reference": booking.reference,
            "currency": booking.currency,
            "outstanding": money(booking.balance_cents()),
            "installments": installments
                .iter()
                .map(|installment| json!({
                    "label": installment.label,
                    "dueDate": installment.due_date.to_string(),
                    "amount": money(installment.amount_cents),
                    "status": installment.effective_status(today).as_str(),
                }))
                .collect::<Vec<_>>(),
        }))
    }

    async fn get_supplier_confirmations(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: BookingArgs = parse_arguments(arguments)?;
        let booking = self.booking(&args.booking_reference).await?;
        let confirmations = self.bookings.confirmations(&booking.id).await?;
        let pending = confirmations
            .iter()
            .filter(|confirmation| confirmation.status != ConfirmationStatus::Confirmed)
            .count();

        Ok(json!({
            "reference": booking.reference,
            "pending": pending,
            "confirmations": confirmations
                .iter()
                .map(|confirmation| json!({
                    "supplier": confirmation.supplier_name,
                    "service": confirmation.service_name,
                    "status": confirmation.status.as_str(),
                    "confirmationNumber": confirmation.confirmation_number,
                }))
                .collect::<Vec<_>>(),
        }))
    }

    async fn get_trip_briefing(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: BookingArgs = parse_arguments(arguments)?;
        let booking = self.booking(&args.booking_reference).await?;
        let confirmations = self.bookings.confirmations(&booking.id).await?;
        let installments = self.bookings.installments(&booking.id).await?;
        let today = self.today();

        let overdue = installments
            .iter()
            .filter(|installment| installment.effective_status(today) == InstallmentStatus::Overdue)
            .map(|installment| installment.label.clone())
            .collect::<Vec<_>>();
        let unconfirmed = confirmations
            .iter()
            .filter(|confirmation| confirmation.status != ConfirmationStatus::Confirmed)
            .map(|confirmation| confirmation.service_name.clone())
            .collect::<Vec<_>>();

        Ok(json!({
            "booking": booking_json(&booking),
            "daysUntilDeparture": booking.days_until_departure(today),
            "outstandingBalance": money(booking.balance_cents()),
            "allConfirmed": unconfirmed.is_empty(),
            "unconfirmedServices": unconfirmed,
            "overdueInstallments": overdue,
            "confirmations": confirmations
                .iter()
                .map(|confirmation| json!({
                    "service": confirmation.service_name,
                    "status": confirmation.status.as_str(),
                }))
                .collect::<Vec<_>>(),
        }))
    }

    async fn check_availability(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: AvailabilityArgs = parse_arguments(arguments)?;
        if args.quantity == 0 {
            return Err(ToolError::InvalidArguments("quantity must be at least 1".to_string()));
        }
        let rate = self
            .catalog
            .find_rate(&ServiceRateId(args.service_id.clone()))
            .await?
            .ok_or_else(|| ToolError::NotFound(format!("service `{}`", args.service_id)))?;

        let mut reasons = Vec::new();
        if !rate.active {
            reasons.push("service is no longer offered".to_string());
        }
        if !rate.in_season(args.date) {
            reasons.push(format!(
                "outside the operating season ({} to {})",
                rate.season_start.as_deref().unwrap_or("?"),
                rate.season_end.as_deref().unwrap_or("?")
            ));
        }
        if let Some(capacity) = rate.capacity {
            if i64::from(args.quantity) > capacity {
                reasons.push(format!("requested {} exceeds capacity of {capacity}", args.quantity));
            }
        }

        Ok(json!({
            "serviceId": rate.id.0,
            "name": rate.name,
            "date": args.date.to_string(),
            "quantity": args.quantity,
            "available": reasons.is_empty(),
            "reasons": reasons,
        }))
    }

    fn validate_trek_acclimatization(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: TrekArgs = parse_arguments(arguments)?;
        let altitudes = MIN_SLEEPING_ALTITUDE_M..=MAX_SLEEPING_ALTITUDE_M;
        if let Some(day) =
            args.itinerary.iter().find(|day| !altitudes.contains(&day.sleeping_altitude_m))
        {
            return Err(ToolError::InvalidArguments(format!(
                "day {} sleeping altitude {} m is outside {MIN_SLEEPING_ALTITUDE_M}..={MAX_SLEEPING_ALTITUDE_M} m",
                day.day, day.sleeping_altitude_m
            )));
        }
        let report = validate_acclimatization(&args.itinerary);
        Ok(json!({
            "valid": report.valid,
            "recommendation": report.recommendation,
            "issues": report
                .issues
                .iter()
                .map(|issue| json!({
                    "day": issue.day,
                    "severity": issue.severity,
                    "message": issue.message,
                }))
                .collect::<Vec<_>>(),
        }))
    }

    async fn validate_permits(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: PermitArgs = parse_arguments(arguments)?;
        let region = args.region.trim().to_string();
        if region.is_empty() {
            return Err(ToolError::InvalidArguments("region must not be empty".to_string()));
        }
        let required = self.catalog.permits_for_region(&region).await?;
        let held = args
            .permits_held
            .iter()
            .map(|permit| normalize_permit(permit))
            .filter(|permit| !permit.is_empty())
            .collect::<Vec<_>>();
        let missing = required
            .iter()
            .filter(|permit| !held.contains(&normalize_permit(&permit.permit_name)))
            .map(|permit| permit.permit_name.clone())
            .collect::<Vec<_>>();

        let mut result = json!({
            "region": region,
            "complete": missing.is_empty(),
            "missing": missing,
            "required": required
                .iter()
                .map(|permit| json!({
                    "name": permit.permit_name,
                    "issuingAuthority": permit.issuing_authority,
                    "fee": money(permit.fee_cents),
                    "currency": permit.currency,
                    "notes": permit.notes,
                }))
                .collect::<Vec<_>>(),
        });
        if required.is_empty() {
            result["note"] = json!(
                "No permit requirements are on file for this region. Confirm with the local operator."
            );
        }
        Ok(result)
    }

    async fn suggest_upsells(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: UpsellArgs = parse_arguments(arguments)?;
        let filter = RateFilter {
            destination: non_empty(Some(args.destination.clone())),
            exclude_ids: args.exclude_service_ids,
            order: RateOrder::SellPriceDesc,
            limit: MAX_UPSELLS,
            ..RateFilter::default()
        };
        let suggestions = self.catalog.search_rates(&filter).await?;
        Ok(json!({
            "destination": args.destination,
            "suggestions": suggestions.iter().map(rate_json).collect::<Vec<_>>(),
        }))
    }
}

#[async_trait]
impl ToolExecutor for CatalogToolExecutor {
    async fn execute(
        &self,
        tool: ToolName,
        arguments: Value,
        context: &ToolContext,
    ) -> Result<Value, ToolError> {
        match tool {
            ToolName::SearchRates => self.search_rates(arguments).await,
            ToolName::SearchHotels => self.search_hotels(arguments).await,
            ToolName::SearchPackages => self.search_packages(arguments).await,
            ToolName::CalculateQuote => self.calculate_quote(arguments).await,
            ToolName::GetDestinations => self.get_destinations(arguments).await,
            ToolName::GetServiceDetails => self.get_service_details(arguments).await,
            ToolName::ListCategories => self.list_categories(arguments).await,
            ToolName::ResearchExternalRates => self.research_external_rates(arguments),
            ToolName::SaveQuote => self.save_quote(arguments, context).await,
            ToolName::GetBookingStatus => self.get_booking_status(arguments).await,
            ToolName::GetPaymentSchedule => self.get_payment_schedule(arguments).await,
            ToolName::GetSupplierConfirmations => self.get_supplier_confirmations(arguments).await,
            ToolName::GetTripBriefing => self.get_trip_briefing(arguments).await,
            ToolName::CheckAvailability => self.check_availability(arguments).await,
            ToolName::ValidateTrekAcclimatization => self.validate_trek_acclimatization(arguments),
            ToolName::ValidatePermits => self.validate_permits(arguments).await,
            ToolName::SuggestUpsells => self.suggest_upsells(arguments).await,
        }
    }
}

struct PricedSelection {
    currency: String,
    lines: Vec<PricedLine>,
    totals: QuoteTotals,
}

impl PricedSelection {
    fn to_json(&self) -> Value {
        json!({
            "currency": self.currency,
            "travelers": self.totals.travelers,
            "lines": self
                .lines
                .iter()
                .map(|line| json!({
                    "serviceId": line.service_id,
                    "description": line.description,
                    "quantity": line.quantity,
                    "nights": line.nights,
                    "unitPrice": decimal_to_f64(line.unit_sell),
                    "lineTotal": decimal_to_f64(line.line_sell),
                    "unitCost": decimal_to_f64(line.unit_cost),
                    "lineCost": decimal_to_f64(line.line_cost),
                }))
                .collect::<Vec<_>>(),
            "totals": {
                "sellTotal": decimal_to_f64(self.totals.sell),
                "perPerson": decimal_to_f64(self.totals.per_person),
                "totalCost": decimal_to_f64(self.totals.cost),
                "marginAmount": decimal_to_f64(self.totals.margin_amount),
                "marginPercent": decimal_to_f64(self.totals.margin_percent),
            },
        })
    }
}

fn money(cents: i64) -> f64 {
    decimal_to_f64(cents_to_decimal(cents))
}

fn rate_json(rate: &ServiceRate) -> Value {
    let sell = cents_to_decimal(rate.sell_price_cents);
    let cost = cents_to_decimal(rate.cost_price_cents);
    json!({
        "id": rate.id.0,
        "name": rate.name,
        "destination": rate.destination_name,
        "destinationId": rate.destination_id,
        "serviceType": rate.service_type.as_str(),
        "category": rate.category,
        "starRating": rate.star_rating,
        "supplier": rate.supplier_name,
        "sellPrice": decimal_to_f64(sell),
        "costPrice": decimal_to_f64(cost),
        "marginPercent": decimal_to_f64(margin_percent(sell, cost)),
        "currency": rate.currency,
        "unit": rate.unit,
        "durationDays": rate.duration_days,
        "seasonStart": rate.season_start,
        "seasonEnd": rate.season_end,
        "capacity": rate.capacity,
        "description": rate.description,
    })
}

fn booking_json(booking: &Booking) -> Value {
    json!({
        "reference": booking.reference,
        "destination": booking.destination_name,
        "status": booking.status.as_str(),
        "startDate": booking.start_date.to_string(),
        "endDate": booking.end_date.to_string(),
        "travelers": booking.travelers,
        "currency": booking.currency,
        "total": money(booking.total_cents),
        "paid": money(booking.paid_cents),
        "balance": money(booking.balance_cents()),
    })
}

/// Missing arguments (`null`) are read as an empty object so tools whose
/// fields are all optional can be called bare.
fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    let arguments = if arguments.is_null() { json!({}) } else { arguments };
    serde_json::from_value(arguments).map_err(|error| ToolError::InvalidArguments(error.to_string()))
}

fn parse_service_type(value: &str) -> Result<ServiceType, ToolError> {
    value.parse::<ServiceType>().map_err(ToolError::InvalidArguments)
}

fn normalize_permit(name: &str) -> String {
    name.split_whitespace().map(str::to_lowercase).collect::<Vec<_>>().join(" ")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

#[derive(Debug, Default, Deserialize)]
struct SearchRatesArgs {
    #[serde(default)]
    destination: Option<String>,
    #[serde(default)]
    service_type: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    query: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchHotelsArgs {
    #[serde(default)]
    destination: Option<String>,
    #[serde(default)]
    min_star_rating: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SearchPackagesArgs {
    #[serde(default)]
    destination: Option<String>,
    #[serde(default)]
    max_duration_days: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct QuoteArgs {
    items: Vec<QuoteItemRequest>,
    #[serde(default)]
    travelers: Option<u32>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    start_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct DestinationArgs {
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ServiceArgs {
    service_id: String,
}

#[derive(Debug, Deserialize)]
struct CategoryArgs {
    #[serde(default)]
    service_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResearchArgs {
    #[serde(default)]
    destination: Option<String>,
    service_description: String,
}

#[derive(Debug, Deserialize)]
struct BookingArgs {
    booking_reference: String,
}

#[derive(Debug, Deserialize)]
struct AvailabilityArgs {
    service_id: String,
    date: NaiveDate,
    #[serde(default = "default_quantity")]
    quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct TrekArgs {
    itinerary: Vec<ItineraryDay>,
}

#[derive(Debug, Deserialize)]
struct PermitArgs {
    region: String,
    #[serde(default)]
    permits_held: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct UpsellArgs {
    destination: String,
    #[serde(default)]
    exclude_service_ids: Vec<String>,
}
