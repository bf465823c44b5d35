use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceRateId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    Hotel,
    Activity,
    Transport,
    Guide,
    Package,
    Flight,
}

impl ServiceType {
    pub const ALL: [ServiceType; 6] = [
        ServiceType::Hotel,
        ServiceType::Activity,
        ServiceType::Transport,
        ServiceType::Guide,
        ServiceType::Package,
        ServiceType::Flight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hotel => "hotel",
            Self::Activity => "activity",
            Self::Transport => "transport",
            Self::Guide => "guide",
            Self::Package => "package",
            Self::Flight => "flight",
        }
    }
}

impl std::str::FromStr for ServiceType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        let singular = normalized.strip_suffix('s').unwrap_or(&normalized);
        Self::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == singular)
            .ok_or_else(|| format!("unknown service type `{value}`"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
    pub name: String,
    pub country: String,
    pub region: Option<String>,
    pub description: String,
    pub max_altitude_m: Option<i64>,
}

/// A contracted supplier rate. Cost and sell prices are both held here; only the
/// sell side is client-facing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRate {
    pub id: ServiceRateId,
    pub destination_id: String,
    pub destination_name: String,
    pub service_type: ServiceType,
    pub category: String,
    pub name: String,
    pub star_rating: Option<i64>,
    pub supplier_name: String,
    pub cost_price_cents: i64,
    pub sell_price_cents: i64,
    pub currency: String,
    pub unit: String,
    pub duration_days: Option<i64>,
    pub season_start: Option<String>,
    pub season_end: Option<String>,
    pub capacity: Option<i64>,
    pub description: String,
    pub active: bool,
}

impl ServiceRate {
    /// Season bounds are `MM-DD` strings; a window whose start is after its end
    /// wraps the new year. Missing or unparsable bounds mean year-round.
    pub fn in_season(&self, date: NaiveDate) -> bool {
        let (Some(start), Some(end)) = (
            self.season_start.as_deref().and_then(parse_month_day),
            self.season_end.as_deref().and_then(parse_month_day),
        ) else {
            return true;
        };

        let day = (date.month(), date.day());
        if start <= end {
            start <= day && day <= end
        } else {
            day >= start || day <= end
        }
    }
}

fn parse_month_day(value: &str) -> Option<(u32, u32)> {
    let (month, day) = value.trim().split_once('-')?;
    let month = month.parse::<u32>().ok()?;
    let day = day.parse::<u32>().ok()?;
    ((1..=12).contains(&month) && (1..=31).contains(&day)).then_some((month, day))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitRequirement {
    pub region: String,
    pub permit_name: String,
    pub issuing_authority: String,
    pub fee_cents: i64,
    pub currency: String,
    pub notes: Option<String>,
}
