//! Lucro Real
//!
//! IRPJ and CSLL are charged on the actual profit after fiscal adjustments;
//! PIS/COFINS are non-cumulative, so credits are subtracted and the result
//! may be negative. Negative PIS/COFINS lines are passed through as-is.

use anyhow::Result;
use rust_decimal::Decimal;
use tracing::debug;

use super::input::{Figures, SimulationInput};
use super::payroll::push_contribution;
use super::rates::{
    fixed_rate_or_default, iss_and_icms, irpj_with_surtax, pis_cofins_rates, PisCofinsBasis,
    COFINS, CSLL, ICMS, IRPJ, ISS, PIS,
};
use super::reference::ReferenceData;
use super::rounding::{percent_of, round_money};
use super::totals::RegimeTotals;
use crate::config::EngineConfig;
use crate::db::models::Regime;

/// Profit before fiscal adjustments: the informed accounting profit when
/// non-zero, else revenue minus costs and expenses.
pub fn profit_base(figures: &Figures) -> Decimal {
    if !figures.accounting_profit.is_zero() {
        return figures.accounting_profit;
    }
    figures.total_revenue
        - figures.goods_cost
        - figures.services_cost
        - figures.operating_expenses
        - figures.other_expenses
}

/// Taxable profit after additions and exclusions, floored at zero
pub fn adjusted_profit(figures: &Figures) -> Decimal {
    let adjusted = profit_base(figures) + figures.fiscal_additions
        + figures.non_deductible_expenses
        - figures.fiscal_exclusions;
    round_money(adjusted.max(Decimal::ZERO))
}

/// Compute the Lucro Real regime for a snapshot
pub fn calculate<R: ReferenceData + ?Sized>(
    input: &SimulationInput,
    figures: &Figures,
    reference: &R,
    config: &EngineConfig,
    months: u32,
) -> Result<RegimeTotals> {
    let mut totals = RegimeTotals::new(Regime::Real);

    let profit = adjusted_profit(figures);
    debug!(base = %profit_base(figures), adjusted = %profit, "actual profit");

    let irpj_rate =
        fixed_rate_or_default(reference, IRPJ, config.fallbacks.irpj_rate, &mut totals)?;
    let csll_rate =
        fixed_rate_or_default(reference, CSLL, config.fallbacks.csll_rate, &mut totals)?;

    let irpj = irpj_with_surtax(profit, irpj_rate, months, &config.rules);
    let csll = round_money(percent_of(profit, csll_rate));

    let (pis_rate, cofins_rate) = pis_cofins_rates(
        figures,
        reference,
        config,
        PisCofinsBasis::NonCumulative,
        &mut totals,
    )?;
    let pis = round_money(percent_of(figures.domestic_revenue, pis_rate) - figures.pis_credits);
    let cofins =
        round_money(percent_of(figures.domestic_revenue, cofins_rate) - figures.cofins_credits);

    let (iss, icms) = iss_and_icms(figures);

    totals.push(IRPJ, irpj);
    totals.push(CSLL, csll);
    totals.push(PIS, pis);
    totals.push(COFINS, cofins);
    push_contribution(&mut totals, input, figures, config, config.payroll_exemption);
    totals.push(ISS, iss);
    totals.push(ICMS, icms);

    Ok(totals)
}
