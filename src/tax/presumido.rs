//! Lucro Presumido
//!
//! IRPJ and CSLL are charged on a profit presumed as a percentage of goods and
//! services revenue; PIS/COFINS are cumulative over domestic revenue.

use anyhow::Result;
use rust_decimal::Decimal;

use super::input::{Figures, RevenueStream, SimulationInput};
use super::payroll::push_contribution;
use super::rates::{
    iss_and_icms, irpj_with_surtax, pis_cofins_rates, PisCofinsBasis, COFINS, CSLL, ICMS, IRPJ,
    ISS, PIS,
};
use super::reference::ReferenceData;
use super::rounding::{percent_of, round_money};
use super::totals::RegimeTotals;
use crate::config::{EngineConfig, PayrollExemptionPolicy, PresumptionSource};
use crate::db::models::Regime;
use crate::error::SimulationError;

/// IRPJ and CSLL presumption percentages of one revenue stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Presumption {
    irpj_pct: Decimal,
    csll_pct: Decimal,
}

/// Compute the Lucro Presumido regime for a snapshot
pub fn calculate<R: ReferenceData + ?Sized>(
    input: &SimulationInput,
    figures: &Figures,
    reference: &R,
    config: &EngineConfig,
    months: u32,
) -> Result<RegimeTotals> {
    let mut totals = RegimeTotals::new(Regime::Presumido);

    let goods = presumption(figures, reference, config, RevenueStream::Goods, &mut totals)?;
    let services = presumption(figures, reference, config, RevenueStream::Services, &mut totals)?;

    let irpj_base = round_money(
        percent_of(figures.goods_revenue, goods.irpj_pct)
            + percent_of(figures.services_revenue, services.irpj_pct),
    );
    let csll_base = round_money(
        percent_of(figures.goods_revenue, goods.csll_pct)
            + percent_of(figures.services_revenue, services.csll_pct),
    );

    let rules = &config.rules;
    let irpj = irpj_with_surtax(irpj_base, rules.presumed_irpj_rate, months, rules);
    let csll = round_money(percent_of(csll_base, rules.presumed_csll_rate));

    let (pis_rate, cofins_rate) = pis_cofins_rates(
        figures,
        reference,
        config,
        PisCofinsBasis::Cumulative,
        &mut totals,
    )?;
    let pis = round_money(percent_of(figures.domestic_revenue, pis_rate));
    let cofins = round_money(percent_of(figures.domestic_revenue, cofins_rate));

    let (iss, icms) = iss_and_icms(figures);

    totals.push(IRPJ, irpj);
    totals.push(CSLL, csll);
    totals.push(PIS, pis);
    totals.push(COFINS, cofins);
    totals.push(ISS, iss);
    totals.push(ICMS, icms);
    push_contribution(
        &mut totals,
        input,
        figures,
        config,
        PayrollExemptionPolicy::Ignore,
    );

    Ok(totals)
}

fn presumption<R: ReferenceData + ?Sized>(
    figures: &Figures,
    reference: &R,
    config: &EngineConfig,
    stream: RevenueStream,
    totals: &mut RegimeTotals,
) -> Result<Presumption> {
    let revenue = figures.stream_revenue(stream);

    match config.presumption_source {
        PresumptionSource::Snapshot => {
            let factors = match stream {
                RevenueStream::Goods => Presumption {
                    irpj_pct: figures.presumed_irpj_goods,
                    csll_pct: figures.presumed_csll_goods,
                },
                RevenueStream::Services => Presumption {
                    irpj_pct: figures.presumed_irpj_services,
                    csll_pct: figures.presumed_csll_services,
                },
            };
            if revenue > Decimal::ZERO
                && (factors.irpj_pct <= Decimal::ZERO || factors.csll_pct <= Decimal::ZERO)
            {
                return Err(SimulationError::MissingAnnexReference(format!(
                    "IRPJ/CSLL presumption percentages are required for {} revenue",
                    stream
                ))
                .into());
            }
            Ok(factors)
        }
        PresumptionSource::Table => {
            if revenue <= Decimal::ZERO {
                return Ok(Presumption {
                    irpj_pct: Decimal::ZERO,
                    csll_pct: Decimal::ZERO,
                });
            }
            let (category, default_irpj, default_csll) = match stream {
                RevenueStream::Goods => (
                    config.goods_activity_category.as_str(),
                    config.fallbacks.presumed_irpj_goods,
                    config.fallbacks.presumed_csll_goods,
                ),
                RevenueStream::Services => (
                    config.services_activity_category.as_str(),
                    config.fallbacks.presumed_irpj_services,
                    config.fallbacks.presumed_csll_services,
                ),
            };
            match reference.presumption_factor(category)? {
                Some(factor) => Ok(Presumption {
                    irpj_pct: round_money(factor.irpj_pct),
                    csll_pct: round_money(factor.csll_pct),
                }),
                None => {
                    let factors = Presumption {
                        irpj_pct: round_money(default_irpj),
                        csll_pct: round_money(default_csll),
                    };
                    totals.notice(
                        IRPJ,
                        format!(
                            "no presumption factor for '{}'; using IRPJ {}% / CSLL {}%",
                            category, factors.irpj_pct, factors.csll_pct
                        ),
                    );
                    Ok(factors)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::PresumptionFactor;
    use crate::tax::payroll::INSS;
    use crate::tax::reference::ReferenceTables;
    use rust_decimal_macros::dec;

    fn snapshot() -> SimulationInput {
        SimulationInput {
            total_revenue: dec!(300000),
            goods_revenue: dec!(200000),
            services_revenue: dec!(100000),
            export_revenue: dec!(50000),
            trailing_12m_revenue: dec!(1200000),
            pis_rate: dec!(0.65),
            cofins_rate: dec!(3.00),
            iss_rate: dec!(5.00),
            icms_rate: dec!(18.00),
            employer_contribution_rate: dec!(28.00),
            payroll_total: dec!(40000),
            presumed_irpj_goods: dec!(8),
            presumed_csll_goods: dec!(12),
            presumed_irpj_services: dec!(32),
            presumed_csll_services: dec!(32),
            ..Default::default()
        }
    }

    fn run(input: &SimulationInput, config: &EngineConfig, months: u32) -> Result<RegimeTotals> {
        calculate(
            input,
            &Figures::from_input(input),
            &ReferenceTables::default(),
            config,
            months,
        )
    }

    #[test]
    fn test_itemized_presumed_profit() {
        let totals = run(&snapshot(), &EngineConfig::default(), 1).unwrap();

        // IRPJ base 16000 + 32000 = 48000 -> 7200 + 2800 surtax
        assert_eq!(totals.get(IRPJ), Some(dec!(10000.00)));
        // CSLL base 24000 + 32000 = 56000 -> 9%
        assert_eq!(totals.get(CSLL), Some(dec!(5040.00)));
        assert_eq!(totals.get(PIS), Some(dec!(1625.00)));
        assert_eq!(totals.get(COFINS), Some(dec!(7500.00)));
        assert_eq!(totals.get(ISS), Some(dec!(5000.00)));
        assert_eq!(totals.get(ICMS), Some(dec!(27000.00)));
        assert_eq!(totals.get(INSS), Some(dec!(11200.00)));
        assert_eq!(totals.total, dec!(67365.00));
    }

    #[test]
    fn test_quarter_raises_surtax_threshold() {
        let totals = run(&snapshot(), &EngineConfig::default(), 3).unwrap();
        assert_eq!(totals.get(IRPJ), Some(dec!(7200.00)));
    }

    #[test]
    fn test_missing_presumption_percentage_fails() {
        let input = SimulationInput {
            presumed_csll_services: Decimal::ZERO,
            ..snapshot()
        };
        let err = run(&input, &EngineConfig::default(), 1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SimulationError>(),
            Some(SimulationError::MissingAnnexReference(msg)) if msg.contains("services")
        ));
    }

    #[test]
    fn test_missing_percentage_is_fine_without_revenue() {
        let input = SimulationInput {
            total_revenue: dec!(200000),
            services_revenue: Decimal::ZERO,
            presumed_irpj_services: Decimal::ZERO,
            presumed_csll_services: Decimal::ZERO,
            ..snapshot()
        };
        assert!(run(&input, &EngineConfig::default(), 1).is_ok());
    }

    #[test]
    fn test_table_driven_presumption() {
        let config = EngineConfig {
            presumption_source: PresumptionSource::Table,
            ..Default::default()
        };
        let tables = ReferenceTables {
            presumption_factors: vec![PresumptionFactor {
                activity: "Comercio".to_string(),
                irpj_pct: dec!(8),
                csll_pct: dec!(12),
            }],
            ..Default::default()
        };
        let input = SimulationInput {
            presumed_irpj_goods: Decimal::ZERO,
            presumed_csll_goods: Decimal::ZERO,
            presumed_irpj_services: Decimal::ZERO,
            presumed_csll_services: Decimal::ZERO,
            ..snapshot()
        };

        let totals = calculate(&input, &Figures::from_input(&input), &tables, &config, 1).unwrap();
        // Services fall back to the configured 32% / 32%
        assert_eq!(totals.get(IRPJ), Some(dec!(10000.00)));
        assert_eq!(totals.get(CSLL), Some(dec!(5040.00)));
        assert_eq!(totals.notices.len(), 1);
    }
}
