use anyhow::{anyhow, Result};
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::db::models::TaxLineResult;

/// Storage for simulation result sets.
///
/// `replace` must drop every existing line of the snapshot and write the new
/// set as one unit: either the new set is fully visible or the old one is
/// left untouched.
pub trait ResultSink: Send + Sync {
    fn replace(&self, snapshot_id: i64, lines: &[TaxLineResult]) -> Result<()>;

    fn lines(&self, snapshot_id: i64) -> Result<Vec<TaxLineResult>>;
}

/// Result sink kept in memory, used for dry runs and tests
#[derive(Debug, Default)]
pub struct MemoryResultSink {
    sets: Mutex<BTreeMap<i64, Vec<TaxLineResult>>>,
}

impl MemoryResultSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultSink for MemoryResultSink {
    fn replace(&self, snapshot_id: i64, lines: &[TaxLineResult]) -> Result<()> {
        let mut sets = self
            .sets
            .lock()
            .map_err(|_| anyhow!("result sink lock poisoned"))?;
        sets.insert(snapshot_id, lines.to_vec());
        Ok(())
    }

    fn lines(&self, snapshot_id: i64) -> Result<Vec<TaxLineResult>> {
        let sets = self
            .sets
            .lock()
            .map_err(|_| anyhow!("result sink lock poisoned"))?;
        Ok(sets.get(&snapshot_id).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Regime;
    use rust_decimal_macros::dec;

    fn line(snapshot_id: i64, tax: &str) -> TaxLineResult {
        TaxLineResult {
            snapshot_id,
            regime: Regime::Simples,
            tax: tax.to_string(),
            amount: dec!(1.00),
        }
    }

    #[test]
    fn test_replace_drops_previous_set() {
        let sink = MemoryResultSink::new();
        sink.replace(1, &[line(1, "DAS"), line(1, "TOTAL")]).unwrap();
        sink.replace(1, &[line(1, "TOTAL")]).unwrap();
        sink.replace(2, &[line(2, "DAS")]).unwrap();

        assert_eq!(sink.lines(1).unwrap(), vec![line(1, "TOTAL")]);
        assert_eq!(sink.lines(2).unwrap().len(), 1);
        assert!(sink.lines(3).unwrap().is_empty());
    }
}
