use rust_decimal_macros::dec;
use std::path::Path;
use std::sync::Mutex;
use tempfile::TempDir;

use taxsim::config::EngineConfig;
use taxsim::db::models::{Bracket, Regime};
use taxsim::db::{
    self, SharedConnection, SqliteReferenceData, SqliteRegimeRegistry, SqliteResultSink,
};
use taxsim::dispatcher::read_input;
use taxsim::error::SimulationError;
use taxsim::tax::reference::find_bracket;
use taxsim::tax::{ReferenceData, RegimeOrchestrator, ResultSink, SimulationInput, TOTAL};

fn setup_db() -> (TempDir, SharedConnection) {
    let dir = TempDir::new().expect("failed to create temp dir");
    let db_path = dir.path().join("taxsim.db");
    db::init_database(Some(db_path.clone())).expect("init failed");
    let conn = db::open_db(Some(db_path)).expect("open failed");
    (dir, Mutex::new(conn))
}

fn fixture_input() -> SimulationInput {
    read_input(Path::new("tests/fixtures/simulation.json")).expect("failed to load snapshot")
}

#[test]
fn seeded_tables_reproduce_fixture_totals() {
    let (_dir, conn) = setup_db();
    let reference = SqliteReferenceData::new(&conn);
    let sink = SqliteResultSink::new(&conn);
    let orchestrator = RegimeOrchestrator::new(&reference, &sink, EngineConfig::default());

    let outcome = orchestrator.process(&fixture_input()).unwrap();
    let view = outcome.to_string_map();
    assert_eq!(view["simples"]["TOTAL"], "30680.00");
    assert_eq!(view["presumido"]["TOTAL"], "78190.00");
    assert_eq!(view["real"]["TOTAL"], "86750.00");

    let stored = sink.stored_lines(42).unwrap();
    assert_eq!(stored.len(), outcome.lines().len());
    let totals: Vec<_> = stored
        .iter()
        .filter(|s| s.line.tax == TOTAL)
        .map(|s| (s.line.regime, s.line.amount))
        .collect();
    assert_eq!(
        totals,
        vec![
            (Regime::Simples, dec!(30680.00)),
            (Regime::Presumido, dec!(78190.00)),
            (Regime::Real, dec!(86750.00)),
        ]
    );
}

#[test]
fn rerun_replaces_rows_instead_of_adding() {
    let (_dir, conn) = setup_db();
    let reference = SqliteReferenceData::new(&conn);
    let sink = SqliteResultSink::new(&conn);
    let orchestrator = RegimeOrchestrator::new(&reference, &sink, EngineConfig::default());

    let mut input = fixture_input();
    orchestrator.process(&input).unwrap();
    let first_count = sink.lines(42).unwrap().len();

    input.icms_rate = dec!(12.00);
    orchestrator.process(&input).unwrap();

    let count: i64 = conn
        .lock()
        .unwrap()
        .query_row(
            "SELECT COUNT(*) FROM tax_results WHERE snapshot_id = 42",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count as usize, first_count);

    let icms: Vec<_> = sink
        .lines(42)
        .unwrap()
        .into_iter()
        .filter(|l| l.tax == "ICMS")
        .map(|l| l.amount)
        .collect();
    assert_eq!(icms, vec![dec!(24000.00), dec!(24000.00)]);
}

#[test]
fn validation_failure_keeps_stored_set() {
    let (_dir, conn) = setup_db();
    let reference = SqliteReferenceData::new(&conn);
    let sink = SqliteResultSink::new(&conn);
    let orchestrator = RegimeOrchestrator::new(&reference, &sink, EngineConfig::default());

    let input = fixture_input();
    orchestrator.process(&input).unwrap();
    let before = sink.lines(42).unwrap();

    let mut broken = input.clone();
    broken.goods_apportionment[0].annex = None;
    let err = orchestrator.process(&broken).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SimulationError>(),
        Some(SimulationError::MissingAnnexReference(_))
    ));

    assert_eq!(sink.lines(42).unwrap(), before);
}

#[test]
fn current_regime_from_registry_table() {
    let (_dir, conn) = setup_db();
    db::set_company_regime(&conn.lock().unwrap(), "12345678000190", "Lucro Real").unwrap();

    let reference = SqliteReferenceData::new(&conn);
    let sink = SqliteResultSink::new(&conn);
    let registry = SqliteRegimeRegistry::new(&conn);
    let orchestrator = RegimeOrchestrator::new(&reference, &sink, EngineConfig::default())
        .with_registry(&registry);

    let input = fixture_input();
    let outcome = orchestrator.process(&input).unwrap();
    let comparison = orchestrator.comparison(&input, &outcome).unwrap();

    assert_eq!(comparison.current_regime, Some(Regime::Real));
    assert_eq!(comparison.savings_vs_current, Some(dec!(56070.00)));
}

#[test]
fn custom_rows_drive_reference_lookups() {
    let (_dir, conn) = setup_db();
    {
        let raw = conn.lock().unwrap();
        db::insert_bracket(
            &raw,
            &Bracket {
                annex: 1,
                revenue_from: dec!(720000.01),
                revenue_to: dec!(1800000.00),
                nominal_rate: dec!(12.00),
                deduction: dec!(0),
            },
        )
        .unwrap();
        db::insert_disqualified_activity(&raw, "6434-4/00").unwrap();
        db::insert_activity_annex(&raw, "4712-1/00", 1).unwrap();
    }

    let reference = SqliteReferenceData::new(&conn);
    let bracket = find_bracket(&reference, 1, dec!(1200000))
        .unwrap()
        .unwrap();
    assert_eq!(bracket.nominal_rate, dec!(12.00));
    assert!(reference.is_disqualified("6434-4/00").unwrap());
    assert_eq!(reference.annex_for_activity("4712-1/00").unwrap(), Some(1));

    let tables = db::load_reference_tables(&conn.lock().unwrap()).unwrap();
    assert_eq!(tables.brackets.len(), 30);
    assert!(tables.annexes.contains(&5));
    assert_eq!(tables.activity_annexes.get("4712-1/00"), Some(&1));
}
