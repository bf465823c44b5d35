//! Keyword lead scoring for inbound client messages.
//!
//! Each message yields a small signed delta that the side-effect worker adds
//! to the stored score. Signals are counted once per message regardless of how
//! many keywords hit.

pub const MAX_POSITIVE_DELTA: i32 = 25;
pub const MAX_NEGATIVE_DELTA: i32 = -10;

const BOOKING_INTENT: &[&str] = &[
    "book", "reserve", "reservation", "deposit", "confirm", "ready to", "let's go ahead",
    "go ahead", "sign up",
];
const MONTHS: &[&str] = &[
    "january", "february", "march", "april", "may ", "june", "july", "august", "september",
    "october", "november", "december", "next year", "next month", "this autumn", "this spring",
];
const GROUP_MARKERS: &[&str] = &[
    "people", "adults", "guests", "travelers", "travellers", "children", "kids", "couple",
    "family", "honeymoon", "my wife", "my husband", "my partner",
];
const BUDGET_MARKERS: &[&str] = &["budget", "per person", "usd", "$", "€", "£", "price range"];
const LUXURY_MARKERS: &[&str] = &[
    "luxury", "five-star", "5-star", "5 star", "private", "suite", "helicopter", "butler",
    "exclusive", "bespoke",
];
const PREMIUM_DESTINATIONS: &[&str] =
    &["everest", "bhutan", "tibet", "ladakh", "mustang", "annapurna", "amankora", "dwarika"];
const HESITATION: &[&str] = &[
    "just looking", "just browsing", "maybe someday", "too expensive", "not sure yet",
    "cancel", "not interested",
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LeadSignals {
    pub booking_intent: bool,
    pub travel_dates: bool,
    pub group_size: bool,
    pub budget: bool,
    pub luxury: bool,
    pub premium_destination: bool,
    pub hesitation: bool,
    pub delta: i32,
}

impl LeadSignals {
    pub fn is_empty(&self) -> bool {
        self.delta == 0
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LeadScorer;

impl LeadScorer {
    pub fn score_message(&self, text: &str) -> LeadSignals {
        let lowered = format!("{} ", text.to_lowercase());

        let mut signals = LeadSignals {
            booking_intent: contains_any(&lowered, BOOKING_INTENT),
            travel_dates: contains_any(&lowered, MONTHS) || has_date_pattern(&lowered),
            group_size: contains_any(&lowered, GROUP_MARKERS),
            budget: contains_any(&lowered, BUDGET_MARKERS),
            luxury: contains_any(&lowered, LUXURY_MARKERS),
            premium_destination: contains_any(&lowered, PREMIUM_DESTINATIONS),
            hesitation: contains_any(&lowered, HESITATION),
            delta: 0,
        };

        let weighted = [
            (signals.booking_intent, 15),
            (signals.travel_dates, 10),
            (signals.group_size, 5),
            (signals.budget, 5),
            (signals.luxury, 5),
            (signals.premium_destination, 5),
            (signals.hesitation, -10),
        ];
        let raw: i32 = weighted.iter().filter(|(hit, _)| *hit).map(|(_, weight)| weight).sum();
        signals.delta = raw.clamp(MAX_NEGATIVE_DELTA, MAX_POSITIVE_DELTA);
        signals
    }
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| text.contains(needle))
}

/// `2026-11-03`, `3/11` or `03.11` style dates.
fn has_date_pattern(text: &str) -> bool {
    let bytes = text.as_bytes();
    bytes.windows(3).any(|window| {
        window[0].is_ascii_digit()
            && matches!(window[1], b'-' | b'/' | b'.')
            && window[2].is_ascii_digit()
    })
}
