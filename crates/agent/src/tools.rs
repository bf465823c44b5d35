use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use concierge_core::domain::client::ClientId;
use concierge_core::domain::conversation::ConversationId;
use concierge_db::repositories::RepositoryError;

/// Every tool the model may call. Dispatch is an exhaustive match over this enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolName {
    SearchRates,
    SearchHotels,
    SearchPackages,
    CalculateQuote,
    GetDestinations,
    GetServiceDetails,
    ListCategories,
    ResearchExternalRates,
    SaveQuote,
    GetBookingStatus,
    GetPaymentSchedule,
    GetSupplierConfirmations,
    GetTripBriefing,
    CheckAvailability,
    ValidateTrekAcclimatization,
    ValidatePermits,
    SuggestUpsells,
}

impl ToolName {
    pub const ALL: [ToolName; 17] = [
        ToolName::SearchRates,
        ToolName::SearchHotels,
        ToolName::SearchPackages,
        ToolName::CalculateQuote,
        ToolName::GetDestinations,
        ToolName::GetServiceDetails,
        ToolName::ListCategories,
        ToolName::ResearchExternalRates,
        ToolName::SaveQuote,
        ToolName::GetBookingStatus,
        ToolName::GetPaymentSchedule,
        ToolName::GetSupplierConfirmations,
        ToolName::GetTripBriefing,
        ToolName::CheckAvailability,
        ToolName::ValidateTrekAcclimatization,
        ToolName::ValidatePermits,
        ToolName::SuggestUpsells,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SearchRates => "search_rates",
            Self::SearchHotels => "search_hotels",
            Self::SearchPackages => "search_packages",
            Self::CalculateQuote => "calculate_quote",
            Self::GetDestinations => "get_destinations",
            Self::GetServiceDetails => "get_service_details",
            Self::ListCategories => "list_categories",
            Self::ResearchExternalRates => "research_external_rates",
            Self::SaveQuote => "save_quote",
            Self::GetBookingStatus => "get_booking_status",
            Self::GetPaymentSchedule => "get_payment_schedule",
            Self::GetSupplierConfirmations => "get_supplier_confirmations",
            Self::GetTripBriefing => "get_trip_briefing",
            Self::CheckAvailability => "check_availability",
            Self::ValidateTrekAcclimatization => "validate_trek_acclimatization",
            Self::ValidatePermits => "validate_permits",
            Self::SuggestUpsells => "suggest_upsells",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == name)
    }

    fn description(&self) -> &'static str {
        match self {
            Self::SearchRates => {
                "Search contracted service rates by destination, service type, category or free text."
            }
            Self::SearchHotels => "Search hotels in a destination, optionally with a minimum star rating.",
            Self::SearchPackages => {
                "Search multi-day packages and treks in a destination, optionally capped by duration."
            }
            Self::CalculateQuote => {
                "Price a selection of services. Returns line totals, the trip total and the per-person price."
            }
            Self::GetDestinations => "List destinations, optionally filtered by country.",
            Self::GetServiceDetails => "Get full details for one service by its id.",
            Self::ListCategories => "List service categories, optionally for one service type.",
            Self::ResearchExternalRates => {
                "Use when the catalog has no match. Returns guidance for giving a labelled estimate."
            }
            Self::SaveQuote => "Save a confirmed selection as a draft quote for the client.",
            Self::GetBookingStatus => "Get the status, dates and balance of a booking by reference.",
            Self::GetPaymentSchedule => "Get the payment installments of a booking by reference.",
            Self::GetSupplierConfirmations => {
                "Get the supplier confirmation status for every service in a booking."
            }
            Self::GetTripBriefing => {
                "Get a pre-departure briefing: booking summary, confirmations and days until departure."
            }
            Self::CheckAvailability => {
                "Check whether a service is bookable on a date for a given quantity."
            }
            Self::ValidateTrekAcclimatization => {
                "Check a trek itinerary's sleeping altitudes against safe acclimatization rules."
            }
            Self::ValidatePermits => "List the permits a trekking region requires and which are missing.",
            Self::SuggestUpsells => "Suggest up to three premium additions in the same destination.",
        }
    }

    fn parameters(&self) -> Value {
        match self {
            Self::SearchRates => object_schema(
                json!({
                    "destination": {"type": "string", "description": "Destination id or name fragment"},
                    "service_type": {
                        "type": "string",
                        "enum": ["hotel", "activity", "transport", "guide", "package", "flight"]
                    },
                    "category": {"type": "string"},
                    "query": {"type": "string", "description": "Free text matched against name and description"}
                }),
                &[],
            ),
            Self::SearchHotels => object_schema(
                json!({
                    "destination": {"type": "string"},
                    "min_star_rating": {"type": "integer", "minimum": 1, "maximum": 5}
                }),
                &["destination"],
            ),
            Self::SearchPackages => object_schema(
                json!({
                    "destination": {"type": "string"},
                    "max_duration_days": {"type": "integer", "minimum": 1}
                }),
                &[],
            ),
            Self::CalculateQuote | Self::SaveQuote => {
                let mut properties = json!({
                    "items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "service_id": {"type": "string"},
                                "quantity": {"type": "integer", "minimum": 1},
                                "nights": {"type": "integer", "minimum": 0}
                            },
                            "required": ["service_id"]
                        }
                    },
                    "travelers": {"type": "integer", "minimum": 1}
                });
                if *self == Self::SaveQuote {
                    properties["title"] = json!({"type": "string"});
                    properties["start_date"] = json!({"type": "string", "format": "date"});
                }
                object_schema(properties, &["items"])
            }
            Self::GetDestinations => object_schema(json!({"country": {"type": "string"}}), &[]),
            Self::GetServiceDetails => {
                object_schema(json!({"service_id": {"type": "string"}}), &["service_id"])
            }
            Self::ListCategories => {
                object_schema(json!({"service_type": {"type": "string"}}), &[])
            }
            Self::ResearchExternalRates => object_schema(
                json!({
                    "destination": {"type": "string"},
                    "service_description": {"type": "string"}
                }),
                &["service_description"],
            ),
            Self::GetBookingStatus
            | Self::GetPaymentSchedule
            | Self::GetSupplierConfirmations
            | Self::GetTripBriefing => object_schema(
                json!({"booking_reference": {"type": "string", "description": "e.g. CNC-2026-0417"}}),
                &["booking_reference"],
            ),
            Self::CheckAvailability => object_schema(
                json!({
                    "service_id": {"type": "string"},
                    "date": {"type": "string", "format": "date"},
                    "quantity": {"type": "integer", "minimum": 1}
                }),
                &["service_id", "date"],
            ),
            Self::ValidateTrekAcclimatization => object_schema(
                json!({
                    "itinerary": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "day": {"type": "integer", "minimum": 1},
                                "sleeping_altitude_m": {"type": "integer"}
                            },
                            "required": ["day", "sleeping_altitude_m"]
                        }
                    }
                }),
                &["itinerary"],
            ),
            Self::ValidatePermits => object_schema(
                json!({
                    "region": {"type": "string"},
                    "permits_held": {"type": "array", "items": {"type": "string"}}
                }),
                &["region"],
            ),
            Self::SuggestUpsells => object_schema(
                json!({
                    "destination": {"type": "string"},
                    "exclude_service_ids": {"type": "array", "items": {"type": "string"}}
                }),
                &["destination"],
            ),
        }
    }

    pub fn definition(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.as_str(),
                "description": self.description(),
                "parameters": self.parameters(),
            }
        })
    }
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({"type": "object", "properties": properties, "required": required})
}

/// OpenAI-style function schemas for every tool, in [`ToolName::ALL`] order.
pub fn tool_definitions() -> Vec<Value> {
    ToolName::ALL.iter().map(ToolName::definition).collect()
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolContext {
    pub client_id: Option<ClientId>,
    pub conversation_id: Option<ConversationId>,
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("unknown tool `{0}`")]
    Unknown(String),
}

impl ToolError {
    pub fn fallback_hint(&self) -> &'static str {
        match self {
            Self::InvalidArguments(_) => "Check the tool arguments against its schema and try again.",
            Self::NotFound(_) => {
                "Tell the client the item could not be found and ask them to confirm the details."
            }
            Self::Repository(_) => {
                "The catalog is temporarily unavailable. Apologise and offer to follow up shortly."
            }
            Self::Unknown(_) => "Use only the tools provided in this conversation.",
        }
    }
}

#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(
        &self,
        tool: ToolName,
        arguments: Value,
        context: &ToolContext,
    ) -> Result<Value, ToolError>;
}
