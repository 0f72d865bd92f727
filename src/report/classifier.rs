use rust_decimal::{Decimal, RoundingStrategy};

use crate::types::{Money, ProfitSign};

/// Reference price minus landed cost, rounded half-up to cents.
/// `None` when no reference price was resolved.
pub fn profit(reference_price: Option<Money>, landed_cost: Money) -> Option<Money> {
    reference_price.map(|price| {
        (price - landed_cost).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    })
}

/// Exactly zero profit is folded into `Unknown` together with "no price".
pub fn classify(profit: Option<Money>) -> ProfitSign {
    match profit {
        Some(p) if p > Decimal::ZERO => ProfitSign::Positive,
        Some(p) if p < Decimal::ZERO => ProfitSign::Negative,
        _ => ProfitSign::Unknown,
    }
}
