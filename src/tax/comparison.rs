//! Regime comparison view
//!
//! Burden of each regime as a percentage of total revenue, the itemized
//! breakdown, the winning (cheapest) regime and the saving it represents
//! against the regime the company is currently in.

use rust_decimal::Decimal;
use serde::Serialize;

use super::orchestrator::SimulationOutcome;
use super::rounding::round_money;
use super::totals::Notice;
use crate::config::EngineConfig;
use crate::db::models::Regime;

/// One regime's line in the comparison
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RegimeSummary {
    pub regime: Regime,
    pub total: Decimal,
    /// Total as a percentage of total revenue
    pub burden_pct: Decimal,
    pub items: Vec<(String, Decimal)>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Comparison {
    pub snapshot_id: i64,
    pub total_revenue: Decimal,
    pub regimes: Vec<RegimeSummary>,
    pub winner: Option<Regime>,
    pub current_regime: Option<Regime>,
    /// Current regime total minus winner total
    pub savings_vs_current: Option<Decimal>,
    pub notices: Vec<Notice>,
}

impl Comparison {
    pub fn from_outcome(
        outcome: &SimulationOutcome,
        config: &EngineConfig,
        current_regime: Option<Regime>,
    ) -> Self {
        let revenue = outcome.total_revenue;
        let regimes: Vec<RegimeSummary> = outcome
            .regimes
            .iter()
            .map(|t| RegimeSummary {
                regime: t.regime,
                total: t.total,
                burden_pct: burden_pct(t.total, revenue),
                items: t.items.clone(),
            })
            .collect();

        let totals: Vec<(Regime, Decimal)> = regimes.iter().map(|r| (r.regime, r.total)).collect();
        let winner = pick_winner(&totals, config);

        let savings_vs_current = match (winner, current_regime) {
            (Some(w), Some(c)) => {
                let total_of = |regime: Regime| {
                    totals.iter().find(|(r, _)| *r == regime).map(|(_, v)| *v)
                };
                match (total_of(w), total_of(c)) {
                    (Some(best), Some(current)) => Some(round_money(current - best)),
                    _ => None,
                }
            }
            _ => None,
        };

        Self {
            snapshot_id: outcome.snapshot_id,
            total_revenue: revenue,
            regimes,
            winner,
            current_regime,
            savings_vs_current,
            notices: outcome.notices(),
        }
    }
}

/// Total as a percentage of revenue; 0.00 when there is no revenue
pub fn burden_pct(total: Decimal, revenue: Decimal) -> Decimal {
    if revenue.is_zero() {
        return round_money(Decimal::ZERO);
    }
    round_money(total / revenue * Decimal::ONE_HUNDRED)
}

/// Regime with the lowest total; ties go to the regime ranked first in the
/// configured priority.
pub fn pick_winner(totals: &[(Regime, Decimal)], config: &EngineConfig) -> Option<Regime> {
    totals
        .iter()
        .min_by(|(ra, va), (rb, vb)| {
            va.cmp(vb)
                .then_with(|| config.priority_rank(*ra).cmp(&config.priority_rank(*rb)))
        })
        .map(|(regime, _)| *regime)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tie_goes_to_first_declared_regime() {
        let totals = [
            (Regime::Simples, dec!(500.00)),
            (Regime::Presumido, dec!(450.00)),
            (Regime::Real, dec!(450.00)),
        ];
        assert_eq!(pick_winner(&totals, &EngineConfig::default()), Some(Regime::Presumido));

        // Input order does not matter
        let reversed = [totals[2], totals[1], totals[0]];
        assert_eq!(pick_winner(&reversed, &EngineConfig::default()), Some(Regime::Presumido));
    }

    #[test]
    fn test_configured_priority_breaks_ties() {
        let config = EngineConfig {
            regime_priority: vec![Regime::Real, Regime::Presumido, Regime::Simples],
            ..Default::default()
        };
        let totals = [
            (Regime::Simples, dec!(450.00)),
            (Regime::Presumido, dec!(450.00)),
            (Regime::Real, dec!(450.00)),
        ];
        assert_eq!(pick_winner(&totals, &config), Some(Regime::Real));
        assert_eq!(pick_winner(&[], &config), None);
    }

    #[test]
    fn test_burden_percentage() {
        assert_eq!(burden_pct(dec!(4800), dec!(120000)), dec!(4.00));
        assert_eq!(burden_pct(dec!(1000), dec!(3000)), dec!(33.33));
        assert_eq!(burden_pct(dec!(1000), Decimal::ZERO), dec!(0.00));
    }
}
