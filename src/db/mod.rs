// Database module - SQLite connection, reference tables and result storage

pub mod models;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::error::StoreError;
use crate::tax::reference::{ReferenceData, ReferenceTables};
use crate::tax::registry::RegimeRegistry;
use crate::tax::sink::ResultSink;
pub use models::{Bracket, FederalRate, PresumptionFactor, Regime, StoredTaxLine, TaxLineResult};

/// Get the default database path (~/.taxsim/data.db)
pub fn get_default_db_path() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    let taxsim_dir = PathBuf::from(home).join(".taxsim");

    // Create directory if it doesn't exist
    std::fs::create_dir_all(&taxsim_dir).context("Failed to create .taxsim directory")?;

    Ok(taxsim_dir.join("data.db"))
}

/// Open database connection
pub fn open_db(db_path: Option<PathBuf>) -> Result<Connection> {
    let path = match db_path {
        Some(path) => path,
        None => get_default_db_path()?,
    };
    let conn = Connection::open(&path).context(format!("Failed to open database at {:?}", path))?;

    // Enable foreign keys
    conn.execute("PRAGMA foreign_keys = ON", [])
        .context("Failed to enable foreign keys")?;

    Ok(conn)
}

/// Initialize the database with schema and the statutory tables
///
/// Safe to run more than once: existing rows are never overwritten.
pub fn init_database(db_path: Option<PathBuf>) -> Result<()> {
    let path = match db_path {
        Some(path) => path,
        None => get_default_db_path()?,
    };

    info!("Initializing database at: {:?}", path);

    let conn = open_db(Some(path))?;

    conn.execute_batch(include_str!("schema.sql"))
        .context("Failed to execute schema")?;
    conn.execute_batch(include_str!("seed.sql"))
        .context("Failed to seed reference tables")?;

    info!("Database initialized successfully");
    Ok(())
}

/// Fail with a readable message when `init` was never run on this database
pub fn ensure_initialized(conn: &Connection) -> Result<()> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'tax_results'",
            [],
            |row| row.get(0),
        )
        .optional()?;

    if found.is_none() {
        return Err(StoreError::DbError(
            "database is not initialized; run `taxsim init` first".to_string(),
        )
        .into());
    }
    Ok(())
}

/// Helper to read Decimal from SQLite (handles both INTEGER, REAL and TEXT)
pub fn get_decimal_value(row: &rusqlite::Row, idx: usize) -> Result<Decimal, rusqlite::Error> {
    use rusqlite::types::ValueRef;

    match row.get_ref(idx)? {
        ValueRef::Text(bytes) => {
            let s = std::str::from_utf8(bytes)
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            Decimal::from_str(s.trim())
                .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        }
        ValueRef::Integer(i) => Ok(Decimal::from(i)),
        ValueRef::Real(f) => {
            Decimal::try_from(f).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
        }
        _ => Err(rusqlite::Error::InvalidColumnType(
            idx,
            "decimal".to_string(),
            rusqlite::types::Type::Null,
        )),
    }
}

/// Simples Nacional brackets, optionally of a single annex
pub fn list_brackets(conn: &Connection, annex: Option<u32>) -> Result<Vec<Bracket>> {
    let mut stmt = conn.prepare(
        "SELECT annex, revenue_from, revenue_to, nominal_rate, deduction
         FROM simples_brackets
         WHERE (?1 IS NULL OR annex = ?1)
         ORDER BY annex, CAST(revenue_from AS REAL)",
    )?;

    let rows = stmt.query_map(params![annex], |row| {
        Ok(Bracket {
            annex: row.get(0)?,
            revenue_from: get_decimal_value(row, 1)?,
            revenue_to: get_decimal_value(row, 2)?,
            nominal_rate: get_decimal_value(row, 3)?,
            deduction: get_decimal_value(row, 4)?,
        })
    })?;

    rows.collect::<Result<Vec<_>, _>>()
        .context("Failed to read Simples Nacional brackets")
}

/// Upsert one bracket row; the annex is registered if missing.
pub fn insert_bracket(conn: &Connection, bracket: &Bracket) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO simples_annexes (annex, description) VALUES (?1, ?2)",
        params![bracket.annex, format!("Anexo {}", bracket.annex)],
    )?;
    conn.execute(
        "INSERT INTO simples_brackets (annex, revenue_from, revenue_to, nominal_rate, deduction)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(annex, revenue_from) DO UPDATE SET
            revenue_to = excluded.revenue_to,
            nominal_rate = excluded.nominal_rate,
            deduction = excluded.deduction",
        params![
            bracket.annex,
            bracket.revenue_from.to_string(),
            bracket.revenue_to.to_string(),
            bracket.nominal_rate.to_string(),
            bracket.deduction.to_string(),
        ],
    )?;
    Ok(())
}

pub fn insert_disqualified_activity(conn: &Connection, activity_code: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO disqualified_activities (activity_code) VALUES (?1)",
        params![activity_code.trim()],
    )?;
    Ok(())
}

pub fn insert_activity_annex(conn: &Connection, activity_code: &str, annex: u32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO activity_annexes (activity_code, annex) VALUES (?1, ?2)",
        params![activity_code.trim(), annex],
    )?;
    Ok(())
}

/// Register the free-text regime of a company; the tax id is reduced to digits.
pub fn set_company_regime(conn: &Connection, tax_id: &str, regime: &str) -> Result<()> {
    let digits = crate::tax::registry::tax_id_digits(tax_id);
    conn.execute(
        "INSERT OR REPLACE INTO company_regimes (tax_id, regime) VALUES (?1, ?2)",
        params![digits, regime.trim()],
    )?;
    Ok(())
}

/// Read every reference table into memory
pub fn load_reference_tables(conn: &Connection) -> Result<ReferenceTables> {
    let mut tables = ReferenceTables::default();

    let mut stmt = conn.prepare("SELECT annex FROM simples_annexes ORDER BY annex")?;
    tables.annexes = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    tables.brackets = list_brackets(conn, None)?;

    let mut stmt = conn.prepare("SELECT activity_code FROM disqualified_activities")?;
    tables.disqualified_activities = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    let mut stmt = conn.prepare("SELECT tax, rate FROM fixed_rates ORDER BY tax")?;
    tables.fixed_rates = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, get_decimal_value(row, 1)?)))?
        .collect::<Result<_, _>>()?;

    let mut stmt = conn.prepare("SELECT tax, basis, rate FROM federal_rates ORDER BY tax, basis")?;
    tables.federal_rates = stmt
        .query_map([], |row| {
            Ok(FederalRate {
                tax: row.get(0)?,
                basis: row.get(1)?,
                rate: get_decimal_value(row, 2)?,
            })
        })?
        .collect::<Result<_, _>>()?;

    let mut stmt =
        conn.prepare("SELECT activity, irpj_pct, csll_pct FROM presumption_factors ORDER BY activity")?;
    tables.presumption_factors = stmt
        .query_map([], |row| {
            Ok(PresumptionFactor {
                activity: row.get(0)?,
                irpj_pct: get_decimal_value(row, 1)?,
                csll_pct: get_decimal_value(row, 2)?,
            })
        })?
        .collect::<Result<_, _>>()?;

    let mut stmt = conn.prepare("SELECT activity_code, annex FROM activity_annexes")?;
    tables.activity_annexes = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?)))?
        .collect::<Result<_, _>>()?;

    Ok(tables)
}

/// Connection shared by the SQLite collaborators, locked per statement
pub type SharedConnection = Mutex<Connection>;

fn lock_conn(conn: &SharedConnection) -> Result<MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|_| anyhow!("database connection lock poisoned"))
}

/// Reference data read straight from the database
pub struct SqliteReferenceData<'a> {
    conn: &'a SharedConnection,
}

impl<'a> SqliteReferenceData<'a> {
    pub fn new(conn: &'a SharedConnection) -> Self {
        Self { conn }
    }
}

impl ReferenceData for SqliteReferenceData<'_> {
    fn brackets(&self, annex: u32) -> Result<Vec<Bracket>> {
        list_brackets(&*lock_conn(self.conn)?, Some(annex))
    }

    fn has_annex(&self, annex: u32) -> Result<bool> {
        let found: Option<u32> = lock_conn(self.conn)?
            .query_row(
                "SELECT annex FROM simples_annexes WHERE annex = ?1",
                params![annex],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn is_disqualified(&self, activity_code: &str) -> Result<bool> {
        let found: Option<String> = lock_conn(self.conn)?
            .query_row(
                "SELECT activity_code FROM disqualified_activities WHERE activity_code = ?1",
                params![activity_code.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn fixed_rate(&self, tax: &str) -> Result<Option<Decimal>> {
        lock_conn(self.conn)?
            .query_row(
                "SELECT rate FROM fixed_rates WHERE tax = ?1",
                params![tax],
                |row| get_decimal_value(row, 0),
            )
            .optional()
            .context(format!("Failed to read fixed rate of {}", tax))
    }

    fn federal_rate(&self, tax: &str, basis: &str) -> Result<Option<Decimal>> {
        lock_conn(self.conn)?
            .query_row(
                "SELECT rate FROM federal_rates WHERE tax = ?1 AND lower(basis) = lower(?2)",
                params![tax, basis],
                |row| get_decimal_value(row, 0),
            )
            .optional()
            .context(format!("Failed to read {} rate for basis {}", tax, basis))
    }

    fn presumption_factor(&self, category: &str) -> Result<Option<PresumptionFactor>> {
        let pattern = format!("%{}%", category.to_lowercase());
        lock_conn(self.conn)?
            .query_row(
                "SELECT activity, irpj_pct, csll_pct FROM presumption_factors
                 WHERE lower(activity) LIKE ?1
                 ORDER BY activity
                 LIMIT 1",
                params![pattern],
                |row| {
                    Ok(PresumptionFactor {
                        activity: row.get(0)?,
                        irpj_pct: get_decimal_value(row, 1)?,
                        csll_pct: get_decimal_value(row, 2)?,
                    })
                },
            )
            .optional()
            .context(format!("Failed to read presumption factor for {}", category))
    }

    fn annex_for_activity(&self, activity_code: &str) -> Result<Option<u32>> {
        let annex = lock_conn(self.conn)?
            .query_row(
                "SELECT annex FROM activity_annexes WHERE activity_code = ?1",
                params![activity_code.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(annex)
    }
}

/// Stores result sets in `tax_results`
pub struct SqliteResultSink<'a> {
    conn: &'a SharedConnection,
}

impl<'a> SqliteResultSink<'a> {
    pub fn new(conn: &'a SharedConnection) -> Self {
        Self { conn }
    }

    /// Stored lines with the time they were computed
    pub fn stored_lines(&self, snapshot_id: i64) -> Result<Vec<StoredTaxLine>> {
        let conn = lock_conn(self.conn)?;
        let mut stmt = conn.prepare(
            "SELECT snapshot_id, regime, tax, amount, computed_at
             FROM tax_results
             WHERE snapshot_id = ?1
             ORDER BY id",
        )?;

        let mut rows = stmt.query(params![snapshot_id])?;
        let mut lines = Vec::new();
        while let Some(row) = rows.next()? {
            let regime_text: String = row.get(1)?;
            let regime = regime_text.parse::<Regime>().map_err(|_| {
                StoreError::ParseError(format!("unknown regime '{}' in tax_results", regime_text))
            })?;
            lines.push(StoredTaxLine {
                line: TaxLineResult {
                    snapshot_id: row.get(0)?,
                    regime,
                    tax: row.get(2)?,
                    amount: get_decimal_value(row, 3)?,
                },
                computed_at: row.get(4)?,
            });
        }
        Ok(lines)
    }
}

impl ResultSink for SqliteResultSink<'_> {
    fn replace(&self, snapshot_id: i64, lines: &[TaxLineResult]) -> Result<()> {
        let conn = lock_conn(self.conn)?;
        let tx = conn
            .unchecked_transaction()
            .context("Failed to start result transaction")?;

        let removed = tx.execute(
            "DELETE FROM tax_results WHERE snapshot_id = ?1",
            params![snapshot_id],
        )?;

        let computed_at = Utc::now();
        {
            let mut stmt = tx.prepare(
                "INSERT INTO tax_results (snapshot_id, regime, tax, amount, computed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for line in lines {
                stmt.execute(params![
                    snapshot_id,
                    line.regime.as_str(),
                    line.tax,
                    line.amount.to_string(),
                    computed_at,
                ])
                .context(format!(
                    "Failed to store {} {} for snapshot {}",
                    line.regime, line.tax, snapshot_id
                ))?;
            }
        }

        tx.commit().context("Failed to commit result set")?;
        debug!(snapshot_id, removed, inserted = lines.len(), "result set replaced");
        Ok(())
    }

    fn lines(&self, snapshot_id: i64) -> Result<Vec<TaxLineResult>> {
        Ok(self
            .stored_lines(snapshot_id)?
            .into_iter()
            .map(|stored| stored.line)
            .collect())
    }
}

/// Current regime lookup backed by `company_regimes`
pub struct SqliteRegimeRegistry<'a> {
    conn: &'a SharedConnection,
}

impl<'a> SqliteRegimeRegistry<'a> {
    pub fn new(conn: &'a SharedConnection) -> Self {
        Self { conn }
    }
}

impl RegimeRegistry for SqliteRegimeRegistry<'_> {
    fn raw_regime(&self, tax_id_digits: &str) -> Result<Option<String>> {
        let regime = lock_conn(self.conn)?
            .query_row(
                "SELECT regime FROM company_regimes WHERE tax_id = ?1",
                params![tax_id_digits],
                |row| row.get(0),
            )
            .optional()?;
        Ok(regime)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn initialized() -> (tempfile::TempDir, SharedConnection) {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        init_database(Some(db_path.clone())).unwrap();
        let conn = open_db(Some(db_path)).unwrap();
        (temp_dir, Mutex::new(conn))
    }

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path().unwrap();
        assert!(path.to_string_lossy().contains(".taxsim"));
        assert!(path.to_string_lossy().ends_with("data.db"));
    }

    #[test]
    fn test_init_database_is_repeatable() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");

        init_database(Some(db_path.clone())).unwrap();
        init_database(Some(db_path.clone())).unwrap();

        let conn = Connection::open(&db_path).unwrap();
        let brackets: i64 = conn
            .query_row("SELECT COUNT(*) FROM simples_brackets", [], |row| row.get(0))
            .unwrap();
        assert_eq!(brackets, 30);
        ensure_initialized(&conn).unwrap();
    }

    #[test]
    fn test_uninitialized_database_is_reported() {
        let conn = Connection::open_in_memory().unwrap();
        let err = ensure_initialized(&conn).unwrap_err();
        assert!(err.to_string().contains("taxsim init"));
    }

    #[test]
    fn test_seeded_reference_lookups() {
        let (_dir, conn) = initialized();
        let reference = SqliteReferenceData::new(&conn);

        let brackets = reference.brackets(1).unwrap();
        assert_eq!(brackets.len(), 6);
        assert_eq!(brackets[0].nominal_rate, dec!(4.00));
        assert_eq!(brackets[1].deduction, dec!(5940.00));

        assert!(reference.has_annex(5).unwrap());
        assert!(!reference.has_annex(6).unwrap());
        assert_eq!(reference.fixed_rate("IRPJ").unwrap(), Some(dec!(15.00)));
        assert_eq!(
            reference.federal_rate("COFINS", "Nao Cumulativo").unwrap(),
            Some(dec!(7.60))
        );
        let factor = reference.presumption_factor("Servicos").unwrap().unwrap();
        assert_eq!(factor.irpj_pct, dec!(32.00));
    }

    #[test]
    fn test_replace_is_whole_set() {
        let (_dir, conn) = initialized();
        let sink = SqliteResultSink::new(&conn);
        let line = |tax: &str, amount: Decimal| TaxLineResult {
            snapshot_id: 1,
            regime: Regime::Presumido,
            tax: tax.to_string(),
            amount,
        };

        sink.replace(1, &[line("PIS", dec!(10.00)), line("TOTAL", dec!(10.00))])
            .unwrap();
        sink.replace(1, &[line("TOTAL", dec!(12.50))]).unwrap();

        let lines = sink.lines(1).unwrap();
        assert_eq!(lines, vec![line("TOTAL", dec!(12.50))]);
    }

    #[test]
    fn test_failed_replace_keeps_previous_set() {
        let (_dir, conn) = initialized();
        let sink = SqliteResultSink::new(&conn);
        let line = |tax: &str| TaxLineResult {
            snapshot_id: 1,
            regime: Regime::Real,
            tax: tax.to_string(),
            amount: dec!(1.00),
        };

        sink.replace(1, &[line("IRPJ")]).unwrap();
        // Duplicate (regime, tax) violates the unique key halfway through
        assert!(sink.replace(1, &[line("CSLL"), line("CSLL")]).is_err());

        assert_eq!(sink.lines(1).unwrap(), vec![line("IRPJ")]);
    }

    #[test]
    fn test_collaborators_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SqliteReferenceData<'static>>();
        assert_send_sync::<SqliteResultSink<'static>>();
        assert_send_sync::<SqliteRegimeRegistry<'static>>();
    }

    #[test]
    fn test_registry_lookup_by_digits() {
        let (_dir, conn) = initialized();
        set_company_regime(&conn.lock().unwrap(), "12.345.678/0001-90", "Lucro Presumido")
            .unwrap();

        let registry = SqliteRegimeRegistry::new(&conn);
        assert_eq!(
            registry.raw_regime("12345678000190").unwrap(),
            Some("Lucro Presumido".to_string())
        );
        assert_eq!(registry.raw_regime("999").unwrap(), None);
    }
}
