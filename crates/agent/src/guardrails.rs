//! Financial field stripping for tool results.
//!
//! Tool executors return raw rows, internal cost columns included. Everything a
//! tool produces passes through [`sanitize_tool_result`] before it is appended to
//! the model conversation, so supplier cost, margin and tier pricing never reach
//! the model or the client.

use serde_json::{Map, Value};

/// Denied keys in normalized form (lowercase, `_` and `-` removed).
const SENSITIVE_FIELDS: &[&str] = &[
    // cost
    "cost",
    "costprice",
    "totalcost",
    "unitcost",
    "suppliercost",
    "netrate",
    "basecost",
    "linecost",
    "costpricecents",
    "unitcostcents",
    // margin, markup, profit
    "margin",
    "marginpercent",
    "marginamount",
    "markup",
    "markuppercent",
    "profit",
    "commission",
    "agencymargin",
    // internal sell-price variants
    "sellpriceoverride",
    "agencysellprice",
    "suppliersellprice",
    "wholesaleprice",
    // tier pricing
    "tierpricing",
    "pricetiers",
    "pricingtiers",
];

/// Top-level array fields that carry rate listings.
const RATE_LIST_FIELDS: &[&str] = &["rates", "hotels", "packages", "services", "results"];

pub const EMPTY_RATES_HINT: &str = "No matching rates were found in our catalog. Offer to research \
     the request with research_external_rates and present any figures as clearly labelled estimates.";

fn normalize_key(key: &str) -> String {
    key.chars().filter(|c| *c != '_' && *c != '-').flat_map(char::to_lowercase).collect()
}

pub fn is_sensitive_field(key: &str) -> bool {
    let normalized = normalize_key(key);
    SENSITIVE_FIELDS.contains(&normalized.as_str())
}

/// Returns a copy of `value` with every denied key removed at every depth.
pub fn sanitize(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(key, _)| !is_sensitive_field(key))
                .map(|(key, nested)| (key.clone(), sanitize(nested)))
                .collect::<Map<_, _>>(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize).collect()),
        scalar => scalar.clone(),
    }
}

/// [`sanitize`] plus the empty-listing hint: a top-level object whose rate list
/// is empty gains a `fallback_hint`, unless it already has one.
pub fn sanitize_tool_result(value: &Value) -> Value {
    let mut sanitized = sanitize(value);
    if let Value::Object(map) = &mut sanitized {
        let has_empty_listing = RATE_LIST_FIELDS
            .iter()
            .any(|field| map.get(*field).and_then(Value::as_array).is_some_and(Vec::is_empty));
        if has_empty_listing && !map.contains_key("fallback_hint") {
            map.insert("fallback_hint".to_string(), Value::String(EMPTY_RATES_HINT.to_string()));
        }
    }
    sanitized
}
