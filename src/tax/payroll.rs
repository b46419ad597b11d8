//! Employer payroll contribution (INSS patronal)
//!
//! Precedence: an explicit positive amount, else a positive combined rate over
//! the payroll, else zero. There is no statutory-rate fallback. A snapshot
//! may switch to the revenue-based alternative contribution (CPRB).

use rust_decimal::Decimal;
use tracing::debug;

use super::input::{Figures, SimulationInput};
use super::rounding::{percent_of, round_money};
use super::totals::RegimeTotals;
use crate::config::{EngineConfig, PayrollExemptionPolicy};

pub const INSS: &str = "INSS";

/// Which computation path produced the contribution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContributionPath {
    Informed,
    PayrollRate,
    RevenueBased,
    Exempt,
    None,
}

/// Compute the contribution and the path taken.
///
/// `exemption` is the policy the calling regime honours for the snapshot's
/// exemption flag; the presumed regime passes `Ignore`.
pub fn employer_contribution(
    input: &SimulationInput,
    figures: &Figures,
    config: &EngineConfig,
    exemption: PayrollExemptionPolicy,
) -> (Decimal, ContributionPath) {
    let informed = figures.employer_contribution;

    if input.payroll_exemption {
        match exemption {
            PayrollExemptionPolicy::Ignore => {}
            PayrollExemptionPolicy::Zero => {
                return (round_money(Decimal::ZERO), ContributionPath::Exempt);
            }
            PayrollExemptionPolicy::KeepInformed => {
                if informed > Decimal::ZERO {
                    return (informed, ContributionPath::Informed);
                }
                return (round_money(Decimal::ZERO), ContributionPath::Exempt);
            }
        }
    }

    let alternative_rate = figures.alternative_contribution_rate;
    let informed_wins =
        config.explicit_contribution_overrides_alternative && informed > Decimal::ZERO;
    if input.alternative_contribution && alternative_rate > Decimal::ZERO && !informed_wins {
        let value = round_money(percent_of(figures.domestic_revenue, alternative_rate));
        debug!(%value, rate = %alternative_rate, "revenue-based contribution");
        return (value, ContributionPath::RevenueBased);
    }

    if informed > Decimal::ZERO {
        return (informed, ContributionPath::Informed);
    }

    if figures.employer_contribution_rate > Decimal::ZERO {
        let value = round_money(percent_of(
            figures.payroll_total,
            figures.employer_contribution_rate,
        ));
        return (value, ContributionPath::PayrollRate);
    }

    (round_money(Decimal::ZERO), ContributionPath::None)
}

/// Push the INSS item onto a regime, noting when payroll went untaxed.
pub fn push_contribution(
    totals: &mut RegimeTotals,
    input: &SimulationInput,
    figures: &Figures,
    config: &EngineConfig,
    exemption: PayrollExemptionPolicy,
) {
    let (value, path) = employer_contribution(input, figures, config, exemption);
    match path {
        ContributionPath::None if figures.payroll_total > Decimal::ZERO => {
            totals.notice(
                INSS,
                "payroll informed without contribution amount or rate; contribution is 0.00",
            );
        }
        ContributionPath::Exempt => {
            totals.notice(INSS, "payroll exemption applied; contribution is 0.00");
        }
        _ => {}
    }
    totals.push(INSS, value);
}
