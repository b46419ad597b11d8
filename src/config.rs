//! Engine configuration
//!
//! Every fallback rate the calculators may use, every variant switch and
//! every policy the regimes disagree on is an explicit field here. The
//! configuration is read from TOML; every field has a default, so an empty
//! file (or no file at all) gives the canonical behavior.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::db::models::Regime;

/// Where presumed-profit percentages come from
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PresumptionSource {
    /// Percentages supplied on the snapshot (required when the stream is positive)
    #[default]
    Snapshot,
    /// Reference table keyed by activity category
    Table,
}

/// How Simples Nacional revenue is assigned to annexes
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AnnexAssignment {
    /// Explicit per-stream apportionment lines
    #[default]
    Apportioned,
    /// Whole revenue under one annex (manual, else by activity code)
    Inferred,
}

/// Where PIS/COFINS rates come from
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PisCofinsSource {
    #[default]
    Snapshot,
    FederalTable,
}

/// Effect of the snapshot's payroll exemption flag on the employer contribution
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayrollExemptionPolicy {
    /// Flag has no effect
    #[default]
    Ignore,
    /// Contribution is always 0.00
    Zero,
    /// Only an explicitly informed amount survives
    KeepInformed,
}

/// Values used when a reference table has no row
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Fallbacks {
    pub irpj_rate: Decimal,
    pub csll_rate: Decimal,
    pub pis_cumulative_rate: Decimal,
    pub cofins_cumulative_rate: Decimal,
    pub pis_non_cumulative_rate: Decimal,
    pub cofins_non_cumulative_rate: Decimal,
    pub presumed_irpj_goods: Decimal,
    pub presumed_csll_goods: Decimal,
    pub presumed_irpj_services: Decimal,
    pub presumed_csll_services: Decimal,
}

impl Default for Fallbacks {
    fn default() -> Self {
        Self {
            irpj_rate: Decimal::new(1500, 2),
            csll_rate: Decimal::new(900, 2),
            pis_cumulative_rate: Decimal::new(65, 2),
            cofins_cumulative_rate: Decimal::new(300, 2),
            pis_non_cumulative_rate: Decimal::new(165, 2),
            cofins_non_cumulative_rate: Decimal::new(760, 2),
            presumed_irpj_goods: Decimal::new(800, 2),
            presumed_csll_goods: Decimal::new(1200, 2),
            presumed_irpj_services: Decimal::new(3200, 2),
            presumed_csll_services: Decimal::new(3200, 2),
        }
    }
}

/// Statutory IRPJ/CSLL parameters shared by both profit regimes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProfitTaxRules {
    /// Presumed-profit IRPJ rate (%)
    pub presumed_irpj_rate: Decimal,
    /// Presumed-profit CSLL rate (%)
    pub presumed_csll_rate: Decimal,
    /// Additional IRPJ on the base above the threshold (%)
    pub surtax_rate: Decimal,
    /// Monthly threshold for the additional IRPJ
    pub surtax_monthly_threshold: Decimal,
}

impl Default for ProfitTaxRules {
    fn default() -> Self {
        Self {
            presumed_irpj_rate: Decimal::new(1500, 2),
            presumed_csll_rate: Decimal::new(900, 2),
            surtax_rate: Decimal::new(1000, 2),
            surtax_monthly_threshold: Decimal::new(20000, 0),
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub presumption_source: PresumptionSource,
    pub annex_assignment: AnnexAssignment,
    pub pis_cofins_source: PisCofinsSource,
    pub payroll_exemption: PayrollExemptionPolicy,
    /// When the alternative contribution is enabled, an explicit amount still wins
    pub explicit_contribution_overrides_alternative: bool,
    /// Presumption-table category for goods revenue
    pub goods_activity_category: String,
    /// Presumption-table category for services revenue
    pub services_activity_category: String,
    /// Federal-table basis for cumulative PIS/COFINS
    pub cumulative_basis: String,
    /// Federal-table basis for non-cumulative PIS/COFINS
    pub non_cumulative_basis: String,
    /// Winner tie-break order, first wins
    pub regime_priority: Vec<Regime>,
    pub rules: ProfitTaxRules,
    pub fallbacks: Fallbacks,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            presumption_source: PresumptionSource::default(),
            annex_assignment: AnnexAssignment::default(),
            pis_cofins_source: PisCofinsSource::default(),
            payroll_exemption: PayrollExemptionPolicy::default(),
            explicit_contribution_overrides_alternative: false,
            goods_activity_category: "comercio".to_string(),
            services_activity_category: "servicos".to_string(),
            cumulative_basis: "cumulativo".to_string(),
            non_cumulative_basis: "nao cumulativo".to_string(),
            regime_priority: Regime::ALL.to_vec(),
            rules: ProfitTaxRules::default(),
            fallbacks: Fallbacks::default(),
        }
    }
}

impl EngineConfig {
    /// Parse a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("Failed to parse engine configuration")
    }

    /// Load from an explicit path, else `~/.taxsim/config.toml` when present,
    /// else defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(Self::default()),
            },
        };

        info!("Loading engine configuration from {:?}", path);
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::from_toml_str(&contents)
    }

    /// Tie-break rank of a regime; regimes missing from the list rank last
    /// in declaration order.
    pub fn priority_rank(&self, regime: Regime) -> usize {
        self.regime_priority
            .iter()
            .position(|r| *r == regime)
            .unwrap_or_else(|| {
                self.regime_priority.len()
                    + Regime::ALL.iter().position(|r| *r == regime).unwrap_or(0)
            })
    }
}

fn default_config_path() -> Option<PathBuf> {
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".taxsim").join("config.toml"))
}
