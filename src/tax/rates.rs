//! Rate lookups and rules shared by the profit-based regimes

use anyhow::Result;
use rust_decimal::Decimal;

use super::input::Figures;
use super::reference::ReferenceData;
use super::rounding::{percent_of, round_money};
use super::totals::RegimeTotals;
use crate::config::{EngineConfig, PisCofinsSource, ProfitTaxRules};
use crate::error::SimulationError;

pub const IRPJ: &str = "IRPJ";
pub const CSLL: &str = "CSLL";
pub const PIS: &str = "PIS";
pub const COFINS: &str = "COFINS";
pub const ISS: &str = "ISS";
pub const ICMS: &str = "ICMS";

/// PIS/COFINS regime of incidence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PisCofinsBasis {
    Cumulative,
    NonCumulative,
}

/// Fixed-table rate for `tax`, or `default` with a notice
pub fn fixed_rate_or_default<R: ReferenceData + ?Sized>(
    reference: &R,
    tax: &str,
    default: Decimal,
    totals: &mut RegimeTotals,
) -> Result<Decimal> {
    match reference.fixed_rate(tax)? {
        Some(rate) => Ok(round_money(rate)),
        None => {
            let rate = round_money(default);
            totals.notice(tax, format!("no fixed rate registered; using default {}%", rate));
            Ok(rate)
        }
    }
}

/// PIS and COFINS rates (%) for the given basis
///
/// From the snapshot, both rates are required whenever domestic revenue is
/// positive. From the federal table, missing rows fall back to the configured
/// defaults.
pub fn pis_cofins_rates<R: ReferenceData + ?Sized>(
    figures: &Figures,
    reference: &R,
    config: &EngineConfig,
    basis: PisCofinsBasis,
    totals: &mut RegimeTotals,
) -> Result<(Decimal, Decimal)> {
    match config.pis_cofins_source {
        PisCofinsSource::Snapshot => {
            let (pis, cofins) = (figures.pis_rate, figures.cofins_rate);
            if figures.domestic_revenue > Decimal::ZERO
                && (pis <= Decimal::ZERO || cofins <= Decimal::ZERO)
            {
                return Err(SimulationError::MissingAnnexReference(
                    "PIS and COFINS rates are required when there is domestic revenue".to_string(),
                )
                .into());
            }
            Ok((pis, cofins))
        }
        PisCofinsSource::FederalTable => {
            let fallbacks = &config.fallbacks;
            let (table_basis, pis_default, cofins_default) = match basis {
                PisCofinsBasis::Cumulative => (
                    config.cumulative_basis.as_str(),
                    fallbacks.pis_cumulative_rate,
                    fallbacks.cofins_cumulative_rate,
                ),
                PisCofinsBasis::NonCumulative => (
                    config.non_cumulative_basis.as_str(),
                    fallbacks.pis_non_cumulative_rate,
                    fallbacks.cofins_non_cumulative_rate,
                ),
            };
            let pis = federal_rate_or_default(reference, PIS, table_basis, pis_default, totals)?;
            let cofins =
                federal_rate_or_default(reference, COFINS, table_basis, cofins_default, totals)?;
            Ok((pis, cofins))
        }
    }
}

fn federal_rate_or_default<R: ReferenceData + ?Sized>(
    reference: &R,
    tax: &str,
    basis: &str,
    default: Decimal,
    totals: &mut RegimeTotals,
) -> Result<Decimal> {
    match reference.federal_rate(tax, basis)? {
        Some(rate) => Ok(round_money(rate)),
        None => {
            let rate = round_money(default);
            totals.notice(
                tax,
                format!("no federal rate for basis '{}'; using default {}%", basis, rate),
            );
            Ok(rate)
        }
    }
}

/// IRPJ at `rate_pct` plus the surtax on the base above the period threshold
pub fn irpj_with_surtax(
    base: Decimal,
    rate_pct: Decimal,
    months: u32,
    rules: &ProfitTaxRules,
) -> Decimal {
    let threshold = round_money(rules.surtax_monthly_threshold * Decimal::from(months.max(1)));
    let excess = base - threshold;
    let surtax = if excess > Decimal::ZERO {
        percent_of(excess, rules.surtax_rate)
    } else {
        Decimal::ZERO
    };
    round_money(percent_of(base, rate_pct) + surtax)
}

/// ISS on services and ICMS on domestic goods revenue
pub fn iss_and_icms(figures: &Figures) -> (Decimal, Decimal) {
    let iss = round_money(percent_of(figures.services_revenue, figures.iss_rate));
    let domestic_goods = round_money(
        (figures.goods_revenue - figures.export_revenue).max(Decimal::ZERO),
    );
    let icms = round_money(percent_of(domestic_goods, figures.icms_rate));
    (iss, icms)
}
