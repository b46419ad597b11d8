use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Corporate tax regimes compared by the simulator
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Regime {
    Simples,   // Simples Nacional (DAS)
    Presumido, // Lucro Presumido
    Real,      // Lucro Real
}

impl Regime {
    /// Declaration order; also the default tie-break priority.
    pub const ALL: [Regime; 3] = [Regime::Simples, Regime::Presumido, Regime::Real];

    pub fn as_str(&self) -> &'static str {
        match self {
            Regime::Simples => "Simples",
            Regime::Presumido => "Presumido",
            Regime::Real => "Real",
        }
    }

    /// Lowercase key used in the itemized string view
    pub fn key(&self) -> &'static str {
        match self {
            Regime::Simples => "simples",
            Regime::Presumido => "presumido",
            Regime::Real => "real",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Regime::Simples => "Simples Nacional",
            Regime::Presumido => "Lucro Presumido",
            Regime::Real => "Lucro Real",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Regime {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simples" | "simples nacional" | "sn" => Ok(Regime::Simples),
            "presumido" | "lucro presumido" | "lp" => Ok(Regime::Presumido),
            "real" | "lucro real" | "lr" => Ok(Regime::Real),
            _ => Err(()),
        }
    }
}

/// One stored tax line of a simulation result set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaxLineResult {
    pub snapshot_id: i64,
    pub regime: Regime,
    pub tax: String,
    pub amount: Decimal,
}

/// A stored line together with the time it was written
#[derive(Debug, Clone, Serialize)]
pub struct StoredTaxLine {
    pub line: TaxLineResult,
    pub computed_at: DateTime<Utc>,
}

/// Simples Nacional bracket row ("faixa") of an annex
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bracket {
    pub annex: u32,
    pub revenue_from: Decimal,
    pub revenue_to: Decimal,
    pub nominal_rate: Decimal, // %
    #[serde(default)]
    pub deduction: Decimal,
}

impl Bracket {
    /// Both bounds inclusive: a value on `revenue_to` stays in this bracket.
    pub fn contains(&self, revenue: Decimal) -> bool {
        self.revenue_from <= revenue && revenue <= self.revenue_to
    }
}

/// Presumed-profit base percentages for an activity category
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresumptionFactor {
    pub activity: String,
    pub irpj_pct: Decimal,
    pub csll_pct: Decimal,
}

/// Federal rate row keyed by (tax, calculation basis)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FederalRate {
    pub tax: String,
    pub basis: String,
    pub rate: Decimal,
}
