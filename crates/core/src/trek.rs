//! Acclimatization rules for high-altitude trekking itineraries.
//!
//! Sleeping altitude is what matters: above 3,000 m the gain between two
//! consecutive nights must stay within 500 m, a rest day is expected after three
//! straight ascending nights, and nights above 5,500 m are flagged for review.

use serde::{Deserialize, Serialize};

pub const ACCLIMATIZATION_THRESHOLD_M: i64 = 3_000;
pub const MAX_DAILY_GAIN_M: i64 = 500;
pub const MAX_CONSECUTIVE_ASCENT_DAYS: u32 = 3;
pub const EXTREME_ALTITUDE_M: i64 = 5_500;
/// Plausible sleeping altitudes, Dead Sea shore to the Everest summit ridge.
pub const MIN_SLEEPING_ALTITUDE_M: i64 = -500;
pub const MAX_SLEEPING_ALTITUDE_M: i64 = 9_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItineraryDay {
    pub day: u32,
    pub sleeping_altitude_m: i64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Violation,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcclimatizationIssue {
    pub day: u32,
    pub severity: IssueSeverity,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcclimatizationReport {
    pub valid: bool,
    pub issues: Vec<AcclimatizationIssue>,
    pub recommendation: String,
}

pub fn validate_acclimatization(days: &[ItineraryDay]) -> AcclimatizationReport {
    let mut ordered = days.to_vec();
    ordered.sort_by_key(|day| day.day);

    let mut issues = Vec::new();
    if ordered.is_empty() {
        issues.push(AcclimatizationIssue {
            day: 0,
            severity: IssueSeverity::Violation,
            message: "itinerary has no days to validate".to_string(),
        });
    }

    let mut ascent_streak = 0_u32;
    for (index, current) in ordered.iter().enumerate() {
        if current.sleeping_altitude_m > EXTREME_ALTITUDE_M {
            issues.push(AcclimatizationIssue {
                day: current.day,
                severity: IssueSeverity::Warning,
                message: format!(
                    "sleeping at {} m is above {} m and needs expedition-level support",
                    current.sleeping_altitude_m, EXTREME_ALTITUDE_M
                ),
            });
        }

        let Some(previous) = index.checked_sub(1).map(|prev| ordered[prev]) else {
            continue;
        };
        let gain = current.sleeping_altitude_m.saturating_sub(previous.sleeping_altitude_m);
        let above_threshold = current.sleeping_altitude_m > ACCLIMATIZATION_THRESHOLD_M;

        if above_threshold && gain > MAX_DAILY_GAIN_M {
            issues.push(AcclimatizationIssue {
                day: current.day,
                severity: IssueSeverity::Violation,
                message: format!(
                    "sleeping altitude rises {gain} m (from {} m to {} m); keep daily gain within {MAX_DAILY_GAIN_M} m above {ACCLIMATIZATION_THRESHOLD_M} m",
                    previous.sleeping_altitude_m, current.sleeping_altitude_m
                ),
            });
        }

        if above_threshold && gain > 0 {
            ascent_streak += 1;
            if ascent_streak == MAX_CONSECUTIVE_ASCENT_DAYS + 1 {
                issues.push(AcclimatizationIssue {
                    day: current.day,
                    severity: IssueSeverity::Warning,
                    message: format!(
                        "{} consecutive ascending nights above {ACCLIMATIZATION_THRESHOLD_M} m; schedule an acclimatization day",
                        ascent_streak
                    ),
                });
            }
        } else {
            ascent_streak = 0;
        }
    }

    let valid = issues.iter().all(|issue| issue.severity != IssueSeverity::Violation);
    let recommendation = if !valid {
        "Add acclimatization days or reduce daily altitude gain before confirming this itinerary."
    } else if issues.is_empty() {
        "Itinerary follows standard acclimatization guidance."
    } else {
        "Itinerary is acceptable; review the warnings with the trek leader."
    };

    AcclimatizationReport { valid, issues, recommendation: recommendation.to_string() }
}

#[cfg(test)]
mod tests {
    use super::{validate_acclimatization, IssueSeverity, ItineraryDay};

    fn itinerary(altitudes: &[i64]) -> Vec<ItineraryDay> {
        altitudes
            .iter()
            .enumerate()
            .map(|(index, altitude)| ItineraryDay {
                day: index as u32 + 1,
                sleeping_altitude_m: *altitude,
            })
            .collect()
    }

    #[test]
    fn classic_everest_profile_is_valid() {
        let report =
            validate_acclimatization(&itinerary(&[2_860, 2_610, 3_440, 3_440, 3_870, 4_410, 4_410]));

        assert!(report.valid);
        assert!(report.issues.is_empty(), "unexpected issues: {:?}", report.issues);
    }

    #[test]
    fn large_gain_above_threshold_is_a_violation() {
        let report = validate_acclimatization(&itinerary(&[2_860, 3_440, 4_410]));

        assert!(!report.valid);
        assert_eq!(report.issues.len(), 2);
        assert!(report.issues.iter().all(|issue| issue.severity == IssueSeverity::Violation));
        assert_eq!(report.issues[1].day, 3);
    }

    #[test]
    fn gain_below_threshold_is_ignored() {
        let report = validate_acclimatization(&itinerary(&[1_400, 2_600]));
        assert!(report.valid);
    }

    #[test]
    fn long_ascent_streak_warns_once() {
        let report =
            validate_acclimatization(&itinerary(&[3_100, 3_400, 3_700, 4_000, 4_300, 4_600]));

        assert!(report.valid);
        let warnings = report
            .issues
            .iter()
            .filter(|issue| issue.severity == IssueSeverity::Warning)
            .collect::<Vec<_>>();
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].day, 5);
    }

    #[test]
    fn empty_itinerary_is_invalid() {
        assert!(!validate_acclimatization(&[]).valid);
    }

    #[test]
    fn extreme_altitudes_do_not_overflow_the_gain() {
        let report = validate_acclimatization(&itinerary(&[i64::MIN, 4_000, i64::MAX]));

        assert!(!report.valid);
        assert!(report
            .issues
            .iter()
            .any(|issue| issue.day == 2 && issue.severity == IssueSeverity::Violation));
    }

    #[test]
    fn days_are_validated_in_order() {
        let mut days = itinerary(&[3_100, 3_400, 3_700]);
        days.reverse();
        assert!(validate_acclimatization(&days).valid);
    }
}
