//! Read-only parametrization tables consulted by the calculators
//!
//! The engine only sees the [`ReferenceData`] trait. The SQLite-backed
//! provider lives in `crate::db`; [`ReferenceTables`] is an in-memory
//! provider that can be loaded from JSON.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::db::models::{Bracket, FederalRate, PresumptionFactor};

/// Lookups over the parametrization set. Absence is `Ok(None)`; `Err` is
/// reserved for storage failures.
pub trait ReferenceData: Send + Sync {
    /// Bracket rows of an annex ordered by lower bound
    fn brackets(&self, annex: u32) -> Result<Vec<Bracket>>;

    fn has_annex(&self, annex: u32) -> Result<bool>;

    fn is_disqualified(&self, activity_code: &str) -> Result<bool>;

    fn fixed_rate(&self, tax: &str) -> Result<Option<Decimal>>;

    fn federal_rate(&self, tax: &str, basis: &str) -> Result<Option<Decimal>>;

    /// Factor whose activity name contains `category`, case-insensitively
    fn presumption_factor(&self, category: &str) -> Result<Option<PresumptionFactor>>;

    fn annex_for_activity(&self, activity_code: &str) -> Result<Option<u32>>;
}

/// Bracket of `annex` containing `revenue`; the first match wins so a value on
/// an upper bound resolves to the lower bracket.
pub fn find_bracket<R: ReferenceData + ?Sized>(
    reference: &R,
    annex: u32,
    revenue: Decimal,
) -> Result<Option<Bracket>> {
    Ok(reference
        .brackets(annex)?
        .into_iter()
        .find(|b| b.contains(revenue)))
}

/// In-memory reference tables
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceTables {
    pub annexes: BTreeSet<u32>,
    pub brackets: Vec<Bracket>,
    pub disqualified_activities: BTreeSet<String>,
    pub fixed_rates: BTreeMap<String, Decimal>,
    pub federal_rates: Vec<FederalRate>,
    pub presumption_factors: Vec<PresumptionFactor>,
    pub activity_annexes: BTreeMap<String, u32>,
}

impl ReferenceTables {
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let mut tables: Self =
            serde_json::from_str(contents).context("Failed to parse reference tables JSON")?;
        // Annexes referenced by bracket rows are implicitly known
        let bracket_annexes: Vec<u32> = tables.brackets.iter().map(|b| b.annex).collect();
        tables.annexes.extend(bracket_annexes);
        Ok(tables)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read reference tables {:?}", path))?;
        Self::from_json_str(&contents)
    }

    pub fn with_bracket(mut self, bracket: Bracket) -> Self {
        self.annexes.insert(bracket.annex);
        self.brackets.push(bracket);
        self
    }
}

impl ReferenceData for ReferenceTables {
    fn brackets(&self, annex: u32) -> Result<Vec<Bracket>> {
        let mut rows: Vec<Bracket> = self
            .brackets
            .iter()
            .filter(|b| b.annex == annex)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.revenue_from.cmp(&b.revenue_from));
        Ok(rows)
    }

    fn has_annex(&self, annex: u32) -> Result<bool> {
        Ok(self.annexes.contains(&annex))
    }

    fn is_disqualified(&self, activity_code: &str) -> Result<bool> {
        Ok(self.disqualified_activities.contains(activity_code.trim()))
    }

    fn fixed_rate(&self, tax: &str) -> Result<Option<Decimal>> {
        Ok(self.fixed_rates.get(tax).copied())
    }

    fn federal_rate(&self, tax: &str, basis: &str) -> Result<Option<Decimal>> {
        Ok(self
            .federal_rates
            .iter()
            .find(|r| r.tax == tax && r.basis.eq_ignore_ascii_case(basis))
            .map(|r| r.rate))
    }

    fn presumption_factor(&self, category: &str) -> Result<Option<PresumptionFactor>> {
        let needle = category.to_lowercase();
        Ok(self
            .presumption_factors
            .iter()
            .find(|f| f.activity.to_lowercase().contains(&needle))
            .cloned())
    }

    fn annex_for_activity(&self, activity_code: &str) -> Result<Option<u32>> {
        Ok(self.activity_annexes.get(activity_code.trim()).copied())
    }
}
