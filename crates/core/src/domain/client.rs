use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientProfile {
    pub id: ClientId,
    pub name: String,
    pub email: Option<String>,
    pub locale: String,
    pub lead_score: u8,
}

impl ClientProfile {
    pub fn temperature(&self) -> LeadTemperature {
        LeadTemperature::from_score(self.lead_score)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadTemperature {
    Cold,
    Warm,
    Hot,
    Qualified,
}

impl LeadTemperature {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=29 => Self::Cold,
            30..=59 => Self::Warm,
            60..=79 => Self::Hot,
            _ => Self::Qualified,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Cold => "exploring",
            Self::Warm => "interested",
            Self::Hot => "ready to plan",
            Self::Qualified => "ready to book",
        }
    }
}

/// Applies a signed delta to a lead score, saturating at 0 and 100.
pub fn apply_score_delta(current: u8, delta: i32) -> u8 {
    (i32::from(current) + delta).clamp(0, 100) as u8
}
