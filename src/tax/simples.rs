//! Simples Nacional (DAS)
//!
//! The unified tax is computed per annex slice of revenue: the bracket of the
//! slice's annex is selected by trailing-12-month revenue (RBT12) and turned
//! into an effective rate `(RBT12 * nominal - deduction) / RBT12`.

use anyhow::Result;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::input::{Figures, RevenueStream, SimulationInput};
use super::reference::{find_bracket, ReferenceData};
use super::rounding::{percent_of, round_money, sum_money};
use super::totals::RegimeTotals;
use crate::config::{AnnexAssignment, EngineConfig};
use crate::db::models::Regime;
use crate::error::SimulationError;

pub const DAS: &str = "DAS";

/// Allowed gap between a stream's revenue and the sum of its apportionment
fn apportionment_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

/// Compute the Simples Nacional regime for a snapshot
pub fn calculate<R: ReferenceData + ?Sized>(
    input: &SimulationInput,
    figures: &Figures,
    reference: &R,
    config: &EngineConfig,
) -> Result<RegimeTotals> {
    let mut totals = RegimeTotals::new(Regime::Simples);

    let activity = input.company.primary_activity.trim();
    if !activity.is_empty() && reference.is_disqualified(activity)? {
        info!(activity, "activity barred from Simples Nacional");
        totals.notice(
            DAS,
            format!("activity {} is barred from Simples Nacional; DAS is 0.00", activity),
        );
        totals.push(DAS, Decimal::ZERO);
        return Ok(totals);
    }

    let rbt12 = figures.trailing_12m_revenue;

    let shares = match config.annex_assignment {
        AnnexAssignment::Apportioned => {
            let mut shares = Vec::new();
            for stream in [RevenueStream::Goods, RevenueStream::Services] {
                shares.extend(apportioned_shares(
                    input,
                    figures,
                    reference,
                    stream,
                    rbt12,
                    &mut totals,
                )?);
            }
            shares
        }
        AnnexAssignment::Inferred => {
            let revenue = round_money(figures.goods_revenue + figures.services_revenue);
            if revenue <= Decimal::ZERO {
                Vec::new()
            } else {
                let annex = inferred_annex(input, reference)?;
                vec![annex_share(reference, rbt12, annex, revenue, &mut totals)?]
            }
        }
    };

    totals.push(DAS, sum_money(&shares));
    Ok(totals)
}

/// Validate one stream's apportionment and compute the share of every line
fn apportioned_shares<R: ReferenceData + ?Sized>(
    input: &SimulationInput,
    figures: &Figures,
    reference: &R,
    stream: RevenueStream,
    rbt12: Decimal,
    totals: &mut RegimeTotals,
) -> Result<Vec<Decimal>> {
    let revenue = figures.stream_revenue(stream);
    let lines = input.apportionment(stream);

    if revenue <= Decimal::ZERO && lines.is_empty() {
        return Ok(Vec::new());
    }

    let apportioned = sum_money(&lines.iter().map(|l| round_money(l.value)).collect::<Vec<_>>());
    if lines.is_empty() || (apportioned - revenue).abs() > apportionment_tolerance() {
        return Err(SimulationError::ApportionmentMismatch {
            stream: stream.to_string(),
            declared: revenue,
            apportioned,
        }
        .into());
    }

    let mut annexes = Vec::with_capacity(lines.len());
    for line in lines {
        let annex = line.annex.ok_or_else(|| {
            SimulationError::MissingAnnexReference(format!(
                "{} apportionment line of {} has no annex",
                stream,
                round_money(line.value)
            ))
        })?;
        if !reference.has_annex(annex)? {
            return Err(SimulationError::MissingAnnexReference(format!(
                "annex {} used in {} apportionment is not registered",
                annex, stream
            ))
            .into());
        }
        annexes.push((annex, round_money(line.value)));
    }

    if revenue <= Decimal::ZERO {
        return Ok(Vec::new());
    }

    annexes
        .into_iter()
        .map(|(annex, value)| annex_share(reference, rbt12, annex, value, totals))
        .collect()
}

/// Single annex for the whole revenue: manual choice, else activity mapping
fn inferred_annex<R: ReferenceData + ?Sized>(input: &SimulationInput, reference: &R) -> Result<u32> {
    let activity = input.company.primary_activity.trim();
    let annex = match input.manual_annex {
        Some(annex) => Some(annex),
        None if !activity.is_empty() => reference.annex_for_activity(activity)?,
        None => None,
    };

    match annex {
        Some(annex) if reference.has_annex(annex)? => Ok(annex),
        Some(annex) => Err(SimulationError::MissingAnnexReference(format!(
            "annex {} is not registered",
            annex
        ))
        .into()),
        None => Err(SimulationError::MissingAnnexReference(format!(
            "no annex informed or mapped for activity '{}'",
            activity
        ))
        .into()),
    }
}

/// DAS owed on `value` revenue taxed under `annex`
fn annex_share<R: ReferenceData + ?Sized>(
    reference: &R,
    rbt12: Decimal,
    annex: u32,
    value: Decimal,
    totals: &mut RegimeTotals,
) -> Result<Decimal> {
    let Some(bracket) = find_bracket(reference, annex, rbt12)? else {
        totals.notice(
            DAS,
            format!(
                "no bracket of annex {} covers RBT12 {}; slice of {} contributes 0.00",
                annex, rbt12, value
            ),
        );
        return Ok(round_money(Decimal::ZERO));
    };

    let nominal = round_money(bracket.nominal_rate);
    let deduction = round_money(bracket.deduction);
    let divisor = if rbt12 > Decimal::ZERO { rbt12 } else { Decimal::ONE };
    let effective_rate = (percent_of(rbt12, nominal) - deduction) / divisor;
    let share = round_money(value * effective_rate);

    debug!(annex, %value, %nominal, %deduction, %effective_rate, %share, "annex share");
    Ok(share)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Bracket;
    use crate::tax::input::ApportionmentLine;
    use crate::tax::reference::ReferenceTables;
    use rust_decimal_macros::dec;

    fn tables() -> ReferenceTables {
        let mut tables = ReferenceTables::default()
            .with_bracket(Bracket {
                annex: 1,
                revenue_from: dec!(0),
                revenue_to: dec!(180000.00),
                nominal_rate: dec!(4.00),
                deduction: dec!(0),
            })
            .with_bracket(Bracket {
                annex: 1,
                revenue_from: dec!(180000.01),
                revenue_to: dec!(360000.00),
                nominal_rate: dec!(7.30),
                deduction: dec!(5940.00),
            })
            .with_bracket(Bracket {
                annex: 3,
                revenue_from: dec!(0),
                revenue_to: dec!(180000.00),
                nominal_rate: dec!(6.00),
                deduction: dec!(0),
            });
        tables.disqualified_activities.insert("6422-1/00".to_string());
        tables.activity_annexes.insert("4711-3/02".to_string(), 1);
        tables
    }

    fn goods_snapshot(goods: Decimal, rbt12: Decimal) -> SimulationInput {
        SimulationInput {
            total_revenue: goods,
            goods_revenue: goods,
            trailing_12m_revenue: rbt12,
            goods_apportionment: vec![ApportionmentLine {
                annex: Some(1),
                value: goods,
            }],
            ..Default::default()
        }
    }

    fn run(input: &SimulationInput, config: &EngineConfig) -> Result<RegimeTotals> {
        calculate(input, &Figures::from_input(input), &tables(), config)
    }

    #[test]
    fn test_single_annex_first_bracket() {
        let totals = run(&goods_snapshot(dec!(120000.00), dec!(120000.00)), &EngineConfig::default()).unwrap();
        assert_eq!(totals.get(DAS), Some(dec!(4800.00)));
        assert_eq!(totals.total, dec!(4800.00));
    }

    #[test]
    fn test_effective_rate_with_deduction() {
        // (240000 * 7.30% - 5940) / 240000 = 4.825%
        let totals = run(&goods_snapshot(dec!(20000.00), dec!(240000.00)), &EngineConfig::default()).unwrap();
        assert_eq!(totals.total, dec!(965.00));
    }

    #[test]
    fn test_split_across_annexes() {
        let input = SimulationInput {
            total_revenue: dec!(30000),
            goods_revenue: dec!(10000),
            services_revenue: dec!(20000),
            trailing_12m_revenue: dec!(100000),
            goods_apportionment: vec![ApportionmentLine { annex: Some(1), value: dec!(10000) }],
            services_apportionment: vec![
                ApportionmentLine { annex: Some(1), value: dec!(5000) },
                ApportionmentLine { annex: Some(3), value: dec!(15000) },
            ],
            ..Default::default()
        };
        let totals = run(&input, &EngineConfig::default()).unwrap();
        // 400 + 200 + 900
        assert_eq!(totals.total, dec!(1500.00));
    }

    #[test]
    fn test_disqualified_activity_is_zero() {
        let mut input = goods_snapshot(dec!(120000.00), dec!(120000.00));
        input.company.primary_activity = "6422-1/00".to_string();
        input.goods_apportionment.clear();

        let totals = run(&input, &EngineConfig::default()).unwrap();
        assert_eq!(totals.total, dec!(0.00));
        assert_eq!(totals.notices.len(), 1);
    }

    #[test]
    fn test_mismatched_apportionment_fails() {
        let mut input = goods_snapshot(dec!(120000.00), dec!(120000.00));
        input.goods_apportionment[0].value = dec!(119999.98);

        let err = run(&input, &EngineConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SimulationError>(),
            Some(SimulationError::ApportionmentMismatch { .. })
        ));
    }

    #[test]
    fn test_apportionment_within_tolerance_passes() {
        let mut input = goods_snapshot(dec!(120000.00), dec!(120000.00));
        input.goods_apportionment[0].value = dec!(119999.99);
        assert!(run(&input, &EngineConfig::default()).is_ok());
    }

    #[test]
    fn test_positive_stream_without_lines_fails() {
        let mut input = goods_snapshot(dec!(1000.00), dec!(1000.00));
        input.goods_apportionment.clear();

        let err = run(&input, &EngineConfig::default()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<SimulationError>(),
            Some(&SimulationError::ApportionmentMismatch {
                stream: "goods".to_string(),
                declared: dec!(1000.00),
                apportioned: dec!(0.00),
            })
        );
    }

    #[test]
    fn test_lines_on_zero_stream_must_still_balance() {
        let mut input = goods_snapshot(dec!(0), dec!(1000.00));
        input.goods_apportionment[0].value = dec!(50);
        assert!(run(&input, &EngineConfig::default()).is_err());
    }

    #[test]
    fn test_line_without_annex_or_unknown_annex() {
        let mut input = goods_snapshot(dec!(1000.00), dec!(1000.00));
        input.goods_apportionment[0].annex = None;
        let err = run(&input, &EngineConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SimulationError>(),
            Some(SimulationError::MissingAnnexReference(_))
        ));

        input.goods_apportionment[0].annex = Some(7);
        let err = run(&input, &EngineConfig::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SimulationError>(),
            Some(SimulationError::MissingAnnexReference(_))
        ));
    }

    #[test]
    fn test_bracket_miss_contributes_zero_with_notice() {
        let input = goods_snapshot(dec!(1000.00), dec!(5000000.00));
        let totals = run(&input, &EngineConfig::default()).unwrap();
        assert_eq!(totals.total, dec!(0.00));
        assert_eq!(totals.notices.len(), 1);
        assert!(totals.notices[0].message.contains("annex 1"));
    }

    #[test]
    fn test_inferred_annex_from_activity() {
        let config = EngineConfig {
            annex_assignment: AnnexAssignment::Inferred,
            ..Default::default()
        };
        let mut input = goods_snapshot(dec!(50000.00), dec!(100000.00));
        input.goods_apportionment.clear();
        input.services_revenue = dec!(10000.00);
        input.company.primary_activity = "4711-3/02".to_string();

        let totals = run(&input, &config).unwrap();
        assert_eq!(totals.total, dec!(2400.00));

        input.manual_annex = Some(3);
        let totals = run(&input, &config).unwrap();
        assert_eq!(totals.total, dec!(3600.00));

        input.manual_annex = None;
        input.company.primary_activity = "0000-0/00".to_string();
        assert!(run(&input, &config).is_err());
    }
    #[test]
    fn test_inferred_without_revenue_needs_no_annex() {
        let config = EngineConfig {
            annex_assignment: AnnexAssignment::Inferred,
            ..Default::default()
        };
        let mut input = goods_snapshot(dec!(0.00), dec!(100000.00));
        input.goods_apportionment.clear();
        input.company.primary_activity = "0000-0/00".to_string();

        let totals = run(&input, &config).unwrap();
        assert_eq!(totals.get(DAS), Some(dec!(0.00)));
        assert!(totals.notices.is_empty());
    }
}

