//! End-to-end query scenarios through the engine facade.

use std::path::Path;

use quarry_common::{EngineConfig, PlannerConfig, QuarryError};
use quarry_sql::{Engine, ParsedQuery};
use tempfile::TempDir;

fn engine_with(dir: &Path, planner: PlannerConfig) -> Engine {
    let mut config = EngineConfig::for_testing(dir);
    config.planner = planner;
    Engine::open(config).unwrap()
}

fn load(engine: &Engine, dir: &Path, table: &str, definition: &str, rows: &[String]) {
    engine.create_table(table, definition).unwrap();
    let path = dir.join(format!("{table}.tbl"));
    std::fs::write(&path, rows.join("\n")).unwrap();
    engine.load_table(table, path).unwrap();
}

/// Runs `sql` and returns its output lines, sorted, without the trailing
/// blank line.
fn run_sorted(engine: &Engine, sql: &str) -> Vec<String> {
    let outcome = engine.run(sql).unwrap();
    let text = std::fs::read_to_string(&outcome.output).unwrap();
    assert!(text.ends_with("\n\n") || text == "\n");
    let mut lines: Vec<String> = text.lines().filter(|l| !l.is_empty()).map(String::from).collect();
    assert_eq!(lines.len() as u64, outcome.tuples);
    lines.sort();
    lines
}

fn keys(values: &[i32]) -> Vec<String> {
    values.iter().map(ToString::to_string).collect()
}

#[test]
fn hash_join_matches_shared_keys_in_either_order() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with(dir.path(), PlannerConfig::with_hash_joins());
    load(&engine, dir.path(), "L", "k:int", &keys(&[1, 2, 3]));
    load(&engine, dir.path(), "R", "k:int", &keys(&[2, 3, 4]));

    let expected = vec!["2|2".to_string(), "3|3".to_string()];
    let outcome = engine.run("SELECT * FROM L, R WHERE L.k = R.k").unwrap();
    assert!(outcome.plan.contains("JOIN HASH"));
    assert_eq!(run_sorted(&engine, "SELECT * FROM L, R WHERE L.k = R.k"), expected);
    assert_eq!(run_sorted(&engine, "SELECT * FROM R, L WHERE R.k = L.k"), expected);
}

fn star_schema(dir: &Path, planner: PlannerConfig) -> Engine {
    let engine = engine_with(dir, planner);
    let customers: Vec<String> = (0..40).map(|i| format!("{i}|c{}|{}", i % 7, i % 3)).collect();
    let orders: Vec<String> = (0..200)
        .map(|i| format!("{i}|{}|{}.5", (i * 7) % 45, i % 11))
        .collect();
    let regions: Vec<String> = (0..3).map(|i| format!("{i}|region-{i}")).collect();
    load(&engine, dir, "customer", "id:int, name:string, region:int", &customers);
    load(&engine, dir, "orders", "id:int, cust:int, amount:float", &orders);
    load(&engine, dir, "region", "id:int, label:string", &regions);
    engine
}

const STAR_QUERY: &str = "SELECT orders.id, customer.name, region.label \
     FROM orders, customer, region \
     WHERE orders.cust = customer.id AND customer.region = region.id AND orders.amount > 3";

#[test]
fn join_strategies_produce_the_same_rows() {
    let nested = TempDir::new().unwrap();
    let hashed = TempDir::new().unwrap();
    let symmetric = TempDir::new().unwrap();

    let mut symmetric_planner = PlannerConfig::with_hash_joins();
    symmetric_planner.allow_symmetric_hash_join = true;
    symmetric_planner.symmetric_hash_threshold = 0;

    let baseline = run_sorted(
        &star_schema(nested.path(), PlannerConfig::default()),
        STAR_QUERY,
    );
    assert!(!baseline.is_empty());

    let hash_engine = star_schema(hashed.path(), PlannerConfig::with_hash_joins());
    assert_eq!(run_sorted(&hash_engine, STAR_QUERY), baseline);

    let symmetric_engine = star_schema(symmetric.path(), symmetric_planner);
    let plan = symmetric_engine.compile(STAR_QUERY).unwrap().to_string();
    assert!(plan.contains("SYMMETRIC HASH"));
    assert_eq!(run_sorted(&symmetric_engine, STAR_QUERY), baseline);
}

#[test]
fn index_scan_agrees_with_sequential_scan() {
    let dir = TempDir::new().unwrap();
    let engine = star_schema(dir.path(), PlannerConfig::default());
    let sql = "SELECT orders.id, orders.amount FROM orders WHERE orders.cust = 14";

    let scanned = run_sorted(&engine, sql);
    assert!(!scanned.is_empty());

    engine.build_index("orders", "cust").unwrap();
    let plan = engine.compile(sql).unwrap().to_string();
    assert!(plan.contains("INDEX SCAN orders ON cust = 14"));
    assert_eq!(run_sorted(&engine, sql), scanned);

    assert!(run_sorted(&engine, "SELECT * FROM orders WHERE orders.cust = 1000").is_empty());
}

#[test]
fn grouped_sum_over_arithmetic() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with(dir.path(), PlannerConfig::default());
    let rows: Vec<String> = (1..=6).map(|i| format!("{}|{i}", i % 2)).collect();
    load(&engine, dir.path(), "T", "g:int, v:int", &rows);

    // g = 1: v in {1, 3, 5}; g = 0: v in {2, 4, 6}.
    assert_eq!(
        run_sorted(&engine, "SELECT SUM(v * 2 + 1), g FROM T GROUP BY g"),
        vec!["21.00|1".to_string(), "27.00|0".to_string()]
    );
    assert_eq!(run_sorted(&engine, "SELECT SUM(v / 4) FROM T"), vec!["5.25".to_string()]);
}

#[test]
fn distinct_projection() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with(dir.path(), PlannerConfig::default());
    let rows: Vec<String> = ["x|1", "y|2", "x|3", "x|4", "z|5"].iter().map(|s| s.to_string()).collect();
    load(&engine, dir.path(), "T", "s:string, n:int", &rows);

    assert_eq!(
        run_sorted(&engine, "SELECT DISTINCT s FROM T"),
        vec!["x".to_string(), "y".to_string(), "z".to_string()]
    );
    assert_eq!(
        run_sorted(&engine, "SELECT n FROM T WHERE s = 'x' AND n > 1"),
        vec!["3".to_string(), "4".to_string()]
    );
}

#[test]
fn errors_surface_with_their_category() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with(dir.path(), PlannerConfig::default());
    load(&engine, dir.path(), "A", "k:int", &keys(&[1]));
    load(&engine, dir.path(), "B", "k:int", &keys(&[1]));

    assert!(matches!(
        engine.run("SELECT * FROM A, B"),
        Err(QuarryError::MissingJoinPredicate { .. })
    ));
    assert!(matches!(
        engine.run("SELECT k FROM A ORDER BY k"),
        Err(QuarryError::Unsupported { .. })
    ));
    assert!(matches!(engine.run("SELEC k FROM A"), Err(QuarryError::Syntax { .. })));
    assert!(matches!(
        engine.run("SELECT * FROM A WHERE A.k = 'one'"),
        Err(QuarryError::TypeMismatch { .. })
    ));
    assert!(matches!(
        engine.run("SELECT * FROM C"),
        Err(QuarryError::TableNotFound { .. })
    ));
}

#[test]
fn queries_can_be_supplied_as_json() {
    let dir = TempDir::new().unwrap();
    let engine = engine_with(dir.path(), PlannerConfig::default());
    load(&engine, dir.path(), "T", "a:int, b:float", &["1|0.5".to_string(), "2|1.5".to_string()]);

    let query: ParsedQuery = serde_json::from_str(
        r#"{
            "tables": ["T"],
            "predicate": [{"left": {"Attribute": "a"}, "op": "Gt", "right": {"Int": 1}}],
            "projection": ["b"]
        }"#,
    )
    .unwrap();
    let outcome = engine.run_query(&query).unwrap();
    assert_eq!(outcome.tuples, 1);
    assert_eq!(std::fs::read_to_string(outcome.output).unwrap(), "1.50\n\n");
}
