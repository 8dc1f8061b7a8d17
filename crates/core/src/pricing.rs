//! Service price table and the adjustment formula applied on top of it.

use std::collections::BTreeMap;

use rust_decimal::{Decimal, RoundingStrategy};

/// Largest surcharge the analyzer may apply to a base price.
pub const MAX_ADJUSTMENT_PCT: Decimal = Decimal::from_parts(50, 0, 0, false, 0);

/// Largest base price accepted from configuration.
pub const MAX_BASE_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

const DEFAULT_SERVICES: [(&str, i64); 3] = [
    ("Constitución de empresa", 1500),
    ("Defensa laboral", 2000),
    ("Consultoría tributaria", 800),
];

/// Immutable mapping from service-type label to base price.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceTable {
    services: BTreeMap<String, Decimal>,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::new(
            DEFAULT_SERVICES
                .iter()
                .map(|(service, price)| (service.to_string(), Decimal::from(*price)))
                .collect(),
        )
    }
}

impl PriceTable {
    pub fn new(services: BTreeMap<String, Decimal>) -> Self {
        Self { services }
    }

    /// Base price for `service_type`, or zero when the type is not priced.
    pub fn base_price(&self, service_type: &str) -> Decimal {
        self.services.get(service_type).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn is_known(&self, service_type: &str) -> bool {
        self.services.contains_key(service_type)
    }

    pub fn services(&self) -> impl Iterator<Item = (&str, Decimal)> {
        self.services.iter().map(|(service, price)| (service.as_str(), *price))
    }

    pub fn into_services(self) -> BTreeMap<String, Decimal> {
        self.services
    }
}

/// Clamps a model-proposed surcharge into `0..=MAX_ADJUSTMENT_PCT`.
pub fn clamp_adjustment(adjustment_pct: Decimal) -> Decimal {
    adjustment_pct.clamp(Decimal::ZERO, MAX_ADJUSTMENT_PCT)
}

/// `base * (1 + adjustment / 100)`, rounded to cents with midpoints away from zero.
/// Saturates at `Decimal::MAX` instead of overflowing.
pub fn adjusted_price(base_price: Decimal, adjustment_pct: Decimal) -> Decimal {
    let factor = Decimal::ONE.saturating_add(adjustment_pct / Decimal::ONE_HUNDRED);
    base_price
        .saturating_mul(factor)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}
