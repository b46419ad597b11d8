//! Runs the three regime calculators over one snapshot and stores the
//! itemized result set.

use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use super::comparison::Comparison;
use super::input::{Figures, SimulationInput};
use super::reference::ReferenceData;
use super::registry::{normalize_regime, tax_id_digits, RegimeRegistry};
use super::sink::ResultSink;
use super::totals::{Notice, RegimeTotals, TOTAL};
use super::{presumido, real, simples};
use crate::config::EngineConfig;
use crate::db::models::{Regime, TaxLineResult};
use crate::error::SimulationError;

/// Per-regime results of one snapshot
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SimulationOutcome {
    pub snapshot_id: i64,
    pub total_revenue: Decimal,
    pub regimes: Vec<RegimeTotals>,
}

impl SimulationOutcome {
    pub fn get(&self, regime: Regime) -> Option<&RegimeTotals> {
        self.regimes.iter().find(|t| t.regime == regime)
    }

    /// `{"simples": {"DAS": "0.00", "TOTAL": "0.00"}, ...}`
    pub fn to_string_map(&self) -> BTreeMap<String, BTreeMap<String, String>> {
        self.regimes
            .iter()
            .map(|t| (t.regime.key().to_string(), t.to_string_map()))
            .collect()
    }

    /// Rows handed to the result sink, one `TOTAL` row closing each regime
    pub fn lines(&self) -> Vec<TaxLineResult> {
        let mut lines = Vec::new();
        for totals in &self.regimes {
            let rows = totals
                .items
                .iter()
                .map(|(tax, amount)| (tax.as_str(), *amount))
                .chain(std::iter::once((TOTAL, totals.total)));
            for (tax, amount) in rows {
                lines.push(TaxLineResult {
                    snapshot_id: self.snapshot_id,
                    regime: totals.regime,
                    tax: tax.to_string(),
                    amount,
                });
            }
        }
        lines
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.regimes
            .iter()
            .flat_map(|t| t.notices.iter().cloned())
            .collect()
    }
}

pub struct RegimeOrchestrator<'a> {
    reference: &'a dyn ReferenceData,
    sink: &'a dyn ResultSink,
    registry: Option<&'a dyn RegimeRegistry>,
    config: EngineConfig,
    months: u32,
    current_regimes: Mutex<HashMap<i64, Option<Regime>>>,
}

impl<'a> RegimeOrchestrator<'a> {
    pub fn new(
        reference: &'a dyn ReferenceData,
        sink: &'a dyn ResultSink,
        config: EngineConfig,
    ) -> Self {
        Self {
            reference,
            sink,
            registry: None,
            config,
            months: 1,
            current_regimes: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_registry(mut self, registry: &'a dyn RegimeRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Period length used by the IRPJ surtax threshold; at least one month.
    pub fn with_months(mut self, months: u32) -> Self {
        self.months = months.max(1);
        self
    }

    pub fn months(&self) -> u32 {
        self.months
    }

    /// Compute every regime and replace the snapshot's stored rows.
    ///
    /// Nothing is written unless all three regimes compute successfully.
    pub fn process(&self, input: &SimulationInput) -> Result<SimulationOutcome> {
        let outcome = self.compute(input)?;
        let lines = outcome.lines();
        self.sink.replace(input.id, &lines)?;
        info!(snapshot = input.id, rows = lines.len(), "result set stored");
        Ok(outcome)
    }

    /// Compute every regime without touching the result sink
    pub fn compute(&self, input: &SimulationInput) -> Result<SimulationOutcome> {
        info!(snapshot = input.id, months = self.months, "simulating regimes");
        let figures = Figures::from_input(input);

        if figures.trailing_12m_revenue <= Decimal::ZERO {
            return Err(SimulationError::MissingAggregate.into());
        }

        let simples = simples::calculate(input, &figures, self.reference, &self.config)?;
        debug!(total = %simples.total, "simples nacional computed");
        let presumido =
            presumido::calculate(input, &figures, self.reference, &self.config, self.months)?;
        debug!(total = %presumido.total, "lucro presumido computed");
        let real = real::calculate(input, &figures, self.reference, &self.config, self.months)?;
        debug!(total = %real.total, "lucro real computed");

        Ok(SimulationOutcome {
            snapshot_id: input.id,
            total_revenue: figures.total_revenue,
            regimes: vec![simples, presumido, real],
        })
    }

    /// Regime the company is currently in: the declared one, else the
    /// registry's, memoized per snapshot. Registry failures count as unknown.
    pub fn current_regime(&self, input: &SimulationInput) -> Result<Option<Regime>> {
        if let Some(declared) = input.company.declared_regime.as_deref() {
            if let Some(regime) = normalize_regime(declared) {
                return Ok(Some(regime));
            }
        }

        let Some(registry) = self.registry else {
            return Ok(None);
        };

        let mut memo = self
            .current_regimes
            .lock()
            .map_err(|_| anyhow!("current regime cache lock poisoned"))?;
        if let Some(cached) = memo.get(&input.id) {
            return Ok(*cached);
        }

        let digits = tax_id_digits(&input.company.tax_id);
        let regime = if digits.is_empty() {
            None
        } else {
            match registry.raw_regime(&digits) {
                Ok(raw) => raw.as_deref().and_then(normalize_regime),
                Err(err) => {
                    warn!(tax_id = %digits, "current regime lookup failed: {:#}", err);
                    None
                }
            }
        };
        memo.insert(input.id, regime);
        Ok(regime)
    }

    /// Comparison view of an outcome
    pub fn comparison(
        &self,
        input: &SimulationInput,
        outcome: &SimulationOutcome,
    ) -> Result<Comparison> {
        let current = self.current_regime(input)?;
        Ok(Comparison::from_outcome(outcome, &self.config, current))
    }
}
