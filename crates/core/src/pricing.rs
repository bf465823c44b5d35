use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::catalog::ServiceRate;
use crate::domain::quote::QuoteItemRequest;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub service_id: String,
    pub description: String,
    pub quantity: u32,
    pub nights: u32,
    pub unit_sell: Decimal,
    pub unit_cost: Decimal,
    pub line_sell: Decimal,
    pub line_cost: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTotals {
    pub sell: Decimal,
    pub cost: Decimal,
    pub margin_amount: Decimal,
    pub margin_percent: Decimal,
    pub per_person: Decimal,
    pub travelers: u32,
}

pub fn cents_to_decimal(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

pub fn decimal_to_cents(amount: Decimal) -> i64 {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0)
}

/// Lossy conversion for JSON payloads handed to the model.
pub fn decimal_to_f64(amount: Decimal) -> f64 {
    amount.to_f64().unwrap_or(0.0)
}

/// Margin as a percentage of the sell price, rounded to 2 dp. Zero when the sell
/// price is zero.
pub fn margin_percent(sell: Decimal, cost: Decimal) -> Decimal {
    if sell.is_zero() {
        return Decimal::ZERO;
    }
    ((sell - cost) / sell * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Nights multiply only when given; a missing or zero night count prices the line once.
pub fn price_line(rate: &ServiceRate, request: &QuoteItemRequest) -> Result<PricedLine, DomainError> {
    if request.quantity <= 0 || request.quantity > i64::from(u16::MAX) {
        return Err(DomainError::InvalidQuantity {
            service_id: request.service_id.clone(),
            quantity: request.quantity,
        });
    }
    let nights = request.nights.unwrap_or(0);
    if !(0..=365).contains(&nights) {
        return Err(DomainError::InvariantViolation(format!(
            "nights for `{}` must be in range 0..=365",
            request.service_id
        )));
    }

    let quantity = request.quantity as u32;
    let nights = nights as u32;
    let multiplier = Decimal::from(quantity) * Decimal::from(nights.max(1));
    let unit_sell = cents_to_decimal(rate.sell_price_cents);
    let unit_cost = cents_to_decimal(rate.cost_price_cents);

    Ok(PricedLine {
        service_id: rate.id.0.clone(),
        description: rate.name.clone(),
        quantity,
        nights,
        unit_sell,
        unit_cost,
        line_sell: unit_sell * multiplier,
        line_cost: unit_cost * multiplier,
    })
}

pub fn summarize(lines: &[PricedLine], travelers: u32) -> Result<QuoteTotals, DomainError> {
    if lines.is_empty() {
        return Err(DomainError::EmptyQuote);
    }

    let travelers = travelers.max(1);
    let sell: Decimal = lines.iter().map(|line| line.line_sell).sum();
    let cost: Decimal = lines.iter().map(|line| line.line_cost).sum();
    let per_person = (sell / Decimal::from(travelers))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    Ok(QuoteTotals {
        sell,
        cost,
        margin_amount: sell - cost,
        margin_percent: margin_percent(sell, cost),
        per_person,
        travelers,
    })
}
