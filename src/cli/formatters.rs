//! Output formatting module for CLI display
//!
//! This module handles all terminal output formatting, separating
//! the concerns of data calculation from presentation.

use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use tabled::{
    settings::{object::Columns, Alignment, Style},
    Table, Tabled,
};

use crate::db::models::{Regime, StoredTaxLine};
use crate::tax::comparison::Comparison;
use crate::tax::reference::ReferenceTables;
use crate::tax::rounding::format_money;
use crate::tax::totals::TOTAL;
use crate::tax::SimulationOutcome;
use crate::utils::{format_currency, format_decimal_br, format_percent};

/// Comparison as JSON: string view of every regime plus the summary
pub fn format_comparison_json(outcome: &SimulationOutcome, comparison: &Comparison) -> String {
    #[derive(Serialize)]
    struct JsonRegime {
        regime: String,
        total: String,
        burden_pct: String,
    }

    #[derive(Serialize)]
    struct JsonNotice {
        regime: String,
        tax: String,
        message: String,
    }

    #[derive(Serialize)]
    struct JsonComparison {
        snapshot_id: i64,
        total_revenue: String,
        results: BTreeMap<String, BTreeMap<String, String>>,
        regimes: Vec<JsonRegime>,
        winner: Option<String>,
        current_regime: Option<String>,
        savings_vs_current: Option<String>,
        notices: Vec<JsonNotice>,
    }

    let json = JsonComparison {
        snapshot_id: comparison.snapshot_id,
        total_revenue: format_money(comparison.total_revenue),
        results: outcome.to_string_map(),
        regimes: comparison
            .regimes
            .iter()
            .map(|r| JsonRegime {
                regime: r.regime.key().to_string(),
                total: format_money(r.total),
                burden_pct: format_money(r.burden_pct),
            })
            .collect(),
        winner: comparison.winner.map(|r| r.key().to_string()),
        current_regime: comparison.current_regime.map(|r| r.key().to_string()),
        savings_vs_current: comparison.savings_vs_current.map(format_money),
        notices: comparison
            .notices
            .iter()
            .map(|n| JsonNotice {
                regime: n.regime.key().to_string(),
                tax: n.tax.clone(),
                message: n.message.clone(),
            })
            .collect(),
    };

    serde_json::to_string_pretty(&json)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

/// Comparison as terminal tables: summary, itemized breakdown and notices
pub fn format_comparison_table(comparison: &Comparison) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "\n{} Regime comparison - snapshot {} (revenue {})\n\n",
        "📊".cyan().bold(),
        comparison.snapshot_id,
        format_currency(comparison.total_revenue)
    ));

    #[derive(Tabled)]
    struct SummaryRow {
        #[tabled(rename = "Regime")]
        regime: String,
        #[tabled(rename = "Total")]
        total: String,
        #[tabled(rename = "Burden")]
        burden: String,
    }

    let rows: Vec<SummaryRow> = comparison
        .regimes
        .iter()
        .map(|r| {
            let mut regime = r.regime.display_name().to_string();
            if comparison.current_regime == Some(r.regime) {
                regime.push_str(" (current)");
            }
            let total = format_currency(r.total);
            let total = if comparison.winner == Some(r.regime) {
                total.green().bold().to_string()
            } else {
                total
            };
            SummaryRow {
                regime,
                total,
                burden: format_percent(r.burden_pct),
            }
        })
        .collect();

    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    output.push_str(&table.to_string());

    output.push_str(&format!("\n\n{}", "Itemized".bold()));
    output.push('\n');
    output.push_str(&format_itemized_table(comparison));

    if let Some(winner) = comparison.winner {
        output.push_str(&format!(
            "\n\n{:<20} {}",
            "Lowest burden:".bold(),
            winner.display_name().green().bold()
        ));
    }
    output.push_str(&format!(
        "\n{:<20} {}",
        "Current regime:".bold(),
        regime_label(comparison.current_regime)
    ));
    if let Some(savings) = comparison.savings_vs_current {
        let savings_colored = if savings > Decimal::ZERO {
            format_currency(savings).green()
        } else {
            format_currency(savings).normal()
        };
        output.push_str(&format!(
            "\n{:<20} {}",
            "Savings vs current:".bold(),
            savings_colored
        ));
    }
    output.push('\n');

    if !comparison.notices.is_empty() {
        output.push_str(&format!("\n{} Notices\n", "⚠".yellow().bold()));
        for notice in &comparison.notices {
            output.push_str(&format!(
                "  {} {}: {}\n",
                notice.regime.display_name().yellow(),
                notice.tax,
                notice.message
            ));
        }
    }

    output
}

/// One row per tax, one column per regime
fn format_itemized_table(comparison: &Comparison) -> String {
    let mut taxes: Vec<String> = Vec::new();
    for summary in &comparison.regimes {
        for (tax, _) in &summary.items {
            if !taxes.contains(tax) {
                taxes.push(tax.clone());
            }
        }
    }

    let mut builder = tabled::builder::Builder::default();
    let mut header = vec!["Tax".to_string()];
    header.extend(comparison.regimes.iter().map(|r| r.regime.as_str().to_string()));
    builder.push_record(header);

    for tax in taxes.iter().map(String::as_str).chain(std::iter::once(TOTAL)) {
        let mut record = vec![tax.to_string()];
        for summary in &comparison.regimes {
            let value = if tax == TOTAL {
                Some(summary.total)
            } else {
                summary.items.iter().find(|(t, _)| t == tax).map(|(_, v)| *v)
            };
            record.push(value.map(format_currency).unwrap_or_else(|| "-".to_string()));
        }
        builder.push_record(record);
    }

    let mut table = builder.build();
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());
    table.to_string()
}

/// Itemized comparison as CSV, one row per (regime, tax)
pub fn comparison_to_csv(comparison: &Comparison) -> String {
    let mut csv = String::new();

    csv.push_str("Regime,Tributo,Valor\n");
    for summary in &comparison.regimes {
        for (tax, value) in &summary.items {
            csv.push_str(&format!(
                "{},{},{}\n",
                summary.regime.key(),
                tax,
                format_money(*value)
            ));
        }
        csv.push_str(&format!(
            "{},{},{}\n",
            summary.regime.key(),
            TOTAL,
            format_money(summary.total)
        ));
    }

    csv.push_str("\nRegime,Total,Carga (%)\n");
    for summary in &comparison.regimes {
        csv.push_str(&format!(
            "{},{},{}\n",
            summary.regime.key(),
            format_money(summary.total),
            format_money(summary.burden_pct)
        ));
    }

    if let Some(winner) = comparison.winner {
        csv.push_str(&format!("\nMENOR CARGA,{}\n", winner.key()));
    }

    csv
}

/// Stored result set as JSON, same shape as the simulate string view
pub fn format_results_json(snapshot_id: i64, lines: &[StoredTaxLine]) -> String {
    #[derive(Serialize)]
    struct JsonResults {
        snapshot_id: i64,
        computed_at: Option<String>,
        results: BTreeMap<String, BTreeMap<String, String>>,
    }

    let mut results: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
    for stored in lines {
        results
            .entry(stored.line.regime.key().to_string())
            .or_default()
            .insert(stored.line.tax.clone(), format_money(stored.line.amount));
    }

    let json = JsonResults {
        snapshot_id,
        computed_at: lines.first().map(|l| l.computed_at.to_rfc3339()),
        results,
    };

    serde_json::to_string_pretty(&json)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

/// Stored result set as a table
pub fn format_results_table(snapshot_id: i64, lines: &[StoredTaxLine]) -> String {
    if lines.is_empty() {
        return format!(
            "{} No results stored for snapshot {}\nRun: {} simulate <input.json>\n",
            "ℹ".blue().bold(),
            snapshot_id,
            "taxsim".bold()
        );
    }

    #[derive(Tabled)]
    struct ResultRow {
        #[tabled(rename = "Regime")]
        regime: String,
        #[tabled(rename = "Tax")]
        tax: String,
        #[tabled(rename = "Amount")]
        amount: String,
    }

    let rows: Vec<ResultRow> = lines
        .iter()
        .map(|stored| {
            let is_total = stored.line.tax == TOTAL;
            let amount = format_currency(stored.line.amount);
            ResultRow {
                regime: stored.line.regime.display_name().to_string(),
                tax: stored.line.tax.clone(),
                amount: if is_total {
                    amount.bold().to_string()
                } else {
                    amount
                },
            }
        })
        .collect();

    let mut output = format!(
        "\n{} Results for snapshot {} (computed {})\n\n",
        "📋".cyan().bold(),
        snapshot_id,
        lines[0].computed_at.format("%d/%m/%Y %H:%M")
    );
    let mut table = Table::new(&rows);
    table.with(Style::modern());
    table.modify(Columns::new(2..), Alignment::right());
    output.push_str(&table.to_string());
    output.push('\n');
    output
}

/// Reference tables as JSON
pub fn format_tables_json(tables: &ReferenceTables) -> String {
    serde_json::to_string_pretty(tables)
        .unwrap_or_else(|e| format!(r#"{{"error": "JSON serialization failed: {}"}}"#, e))
}

/// Reference tables for the terminal
pub fn format_tables(tables: &ReferenceTables) -> String {
    let mut output = String::new();

    #[derive(Tabled)]
    struct BracketRow {
        #[tabled(rename = "Annex")]
        annex: u32,
        #[tabled(rename = "From")]
        from: String,
        #[tabled(rename = "To")]
        to: String,
        #[tabled(rename = "Nominal")]
        nominal: String,
        #[tabled(rename = "Deduction")]
        deduction: String,
    }

    output.push_str(&format!("\n{} Simples Nacional brackets\n\n", "📑".cyan().bold()));
    if tables.brackets.is_empty() {
        output.push_str("  (none)\n");
    } else {
        let rows: Vec<BracketRow> = tables
            .brackets
            .iter()
            .map(|b| BracketRow {
                annex: b.annex,
                from: format_currency(b.revenue_from),
                to: format_currency(b.revenue_to),
                nominal: format_percent(b.nominal_rate),
                deduction: format_currency(b.deduction),
            })
            .collect();
        let mut table = Table::new(&rows);
        table.with(Style::modern());
        table.modify(Columns::new(1..), Alignment::right());
        output.push_str(&table.to_string());
        output.push('\n');
    }

    if !tables.fixed_rates.is_empty() || !tables.federal_rates.is_empty() {
        output.push_str(&format!("\n{}\n", "Rates".bold()));
        for (tax, rate) in &tables.fixed_rates {
            output.push_str(&format!("  {:<8} {:>16}\n", tax, format_percent(*rate)));
        }
        for rate in &tables.federal_rates {
            output.push_str(&format!(
                "  {:<8} {:>16}  ({})\n",
                rate.tax,
                format_percent(rate.rate),
                rate.basis
            ));
        }
    }

    if !tables.presumption_factors.is_empty() {
        output.push_str(&format!("\n{}\n", "Presumption factors (IRPJ / CSLL)".bold()));
        for factor in &tables.presumption_factors {
            output.push_str(&format!(
                "  {:<28} {} / {}\n",
                factor.activity,
                format_decimal_br(factor.irpj_pct),
                format_decimal_br(factor.csll_pct)
            ));
        }
    }

    if !tables.disqualified_activities.is_empty() {
        output.push_str(&format!("\n{}\n", "Barred from Simples Nacional".bold()));
        for code in &tables.disqualified_activities {
            output.push_str(&format!("  {}\n", code));
        }
    }

    output
}

/// Human label for a regime that may be unknown
pub fn regime_label(regime: Option<Regime>) -> String {
    regime
        .map(|r| r.display_name().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::tax::totals::RegimeTotals;
    use rust_decimal_macros::dec;

    fn comparison() -> (SimulationOutcome, Comparison) {
        let mut simples = RegimeTotals::new(Regime::Simples);
        simples.push("DAS", dec!(500));
        let mut presumido = RegimeTotals::new(Regime::Presumido);
        presumido.push("IRPJ", dec!(300));
        presumido.push("CSLL", dec!(150));
        let mut real = RegimeTotals::new(Regime::Real);
        real.push("IRPJ", dec!(450));

        let outcome = SimulationOutcome {
            snapshot_id: 3,
            total_revenue: dec!(10000.00),
            regimes: vec![simples, presumido, real],
        };
        let comparison =
            Comparison::from_outcome(&outcome, &EngineConfig::default(), Some(Regime::Simples));
        (outcome, comparison)
    }

    #[test]
    fn test_csv_has_totals_and_winner() {
        let (_, comparison) = comparison();
        let csv = comparison_to_csv(&comparison);

        assert!(csv.starts_with("Regime,Tributo,Valor\n"));
        assert!(csv.contains("simples,DAS,500.00\n"));
        assert!(csv.contains("presumido,TOTAL,450.00\n"));
        assert!(csv.contains("presumido,450.00,4.50\n"));
        assert!(csv.ends_with("MENOR CARGA,presumido\n"));
    }

    #[test]
    fn test_json_carries_string_view() {
        let (outcome, comparison) = comparison();
        let json: serde_json::Value =
            serde_json::from_str(&format_comparison_json(&outcome, &comparison)).unwrap();

        assert_eq!(json["results"]["simples"]["TOTAL"], "500.00");
        assert_eq!(json["winner"], "presumido");
        assert_eq!(json["current_regime"], "simples");
        assert_eq!(json["savings_vs_current"], "50.00");
    }

    #[test]
    fn test_empty_results_message() {
        let msg = format_results_table(9, &[]);
        assert!(msg.contains("No results stored for snapshot 9"));
    }

    #[test]
    fn test_regime_label() {
        assert_eq!(regime_label(Some(Regime::Real)), "Lucro Real");
        assert_eq!(regime_label(None), "unknown");
    }
}
