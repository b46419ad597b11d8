use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

use super::rounding::{format_money, round_money, sum_money};
use crate::db::models::Regime;

/// Name of the synthetic total row written per regime
pub const TOTAL: &str = "TOTAL";

/// A soft failure resolved to a zero or default value
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notice {
    pub regime: Regime,
    pub tax: String,
    pub message: String,
}

/// Itemized result of one regime
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RegimeTotals {
    pub regime: Regime,
    pub items: Vec<(String, Decimal)>,
    pub total: Decimal,
    pub notices: Vec<Notice>,
}

impl RegimeTotals {
    pub fn new(regime: Regime) -> Self {
        Self {
            regime,
            items: Vec::new(),
            total: round_money(Decimal::ZERO),
            notices: Vec::new(),
        }
    }

    /// Append an item; the amount is rounded and the total recomputed.
    pub fn push(&mut self, tax: &str, amount: Decimal) {
        self.items.push((tax.to_string(), round_money(amount)));
        self.total = sum_money(self.items.iter().map(|(_, v)| v));
    }

    /// Record a fallback so it shows up next to the numbers
    pub fn notice(&mut self, tax: &str, message: impl Into<String>) {
        let message = message.into();
        warn!(regime = %self.regime, tax, "{}", message);
        self.notices.push(Notice {
            regime: self.regime,
            tax: tax.to_string(),
            message,
        });
    }

    pub fn get(&self, tax: &str) -> Option<Decimal> {
        self.items.iter().find(|(t, _)| t == tax).map(|(_, v)| *v)
    }

    /// `{tax: "0.00", ..., "TOTAL": "0.00"}`
    pub fn to_string_map(&self) -> BTreeMap<String, String> {
        let mut map: BTreeMap<String, String> = self
            .items
            .iter()
            .map(|(tax, value)| (tax.clone(), format_money(*value)))
            .collect();
        map.insert(TOTAL.to_string(), format_money(self.total));
        map
    }
}
