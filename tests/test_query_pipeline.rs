//! Integration tests for running queries over files.

use percolate_sql::config::{ColumnType, Config};
use percolate_sql::database::Session;
use percolate_sql::ingest::{Format, SourceInput};
use percolate_sql::storage::{table_exists, QueryResult};
use percolate_sql::{DatabaseError, RowValue};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn text(s: &str) -> RowValue {
    RowValue::from(s)
}

fn config(pushdown: bool, column_type: ColumnType) -> Config {
    let mut config = Config {
        pushdown,
        ..Config::default()
    };
    config.loader.column_type = column_type;
    config
}

/// Run `query` over one source with pushdown on and off.
fn run_both(
    query: &str,
    source: &SourceInput,
    column_type: ColumnType,
) -> (percolate_sql::Result<QueryResult>, percolate_sql::Result<QueryResult>) {
    let run = |pushdown| {
        Session::open(config(pushdown, column_type))
            .unwrap()
            .run(query, std::slice::from_ref(source))
    };
    (run(true), run(false))
}

/// Rows in a stable order, for comparing results without ORDER BY.
fn sorted_rows(result: &QueryResult) -> Vec<String> {
    let mut rows: Vec<String> = result.rows.iter().map(|row| format!("{:?}", row)).collect();
    rows.sort();
    rows
}

#[test]
fn test_join_csv_and_json() {
    let dir = tempdir().unwrap();
    let users = write(dir.path(), "users.csv", "id,name\n1,ada\n2,bob\n3,cy\n");
    let ages = write(dir.path(), "ages.json", r#"[{"id": 1, "age": 36}, {"id": 2, "age": 41}]"#);

    let mut session = Session::open_temp().unwrap();
    let result = session
        .run(
            "SELECT {0}.name, {1}.age FROM {0} JOIN {1} ON {0}.id = {1}.id ORDER BY {0}.name",
            &[SourceInput::new(&users), SourceInput::new(&ages)],
        )
        .unwrap();

    assert_eq!(result.columns, vec!["name", "age"]);
    assert_eq!(
        result.rows,
        vec![vec![text("ada"), text("36")], vec![text("bob"), text("41")]]
    );
}

#[test]
fn test_path_reference() {
    let dir = tempdir().unwrap();
    let doc = write(
        dir.path(),
        "doc.json",
        r#"{"data": {"items": [{"a": 1}, {"a": 2}, {"a": 3}]}, "meta": {"n": 3}}"#,
    );

    let mut session = Session::open_temp().unwrap();
    let result = session
        .run(r#"SELECT count(*) AS n FROM {0, "data.items"}"#, &[SourceInput::new(&doc)])
        .unwrap();
    assert_eq!(result.rows, vec![vec![RowValue::Int(3)]]);

    let result = session
        .run(r#"SELECT a FROM {"data.items"} WHERE a > '1' ORDER BY a"#, &[SourceInput::new(&doc)])
        .unwrap();
    assert_eq!(result.rows, vec![vec![text("2")], vec![text("3")]]);

    let err = session
        .run(r#"SELECT * FROM {0, "meta.n"}"#, &[SourceInput::new(&doc)])
        .unwrap_err();
    assert!(matches!(err, DatabaseError::PathNotFound { index: 0, .. }));
}

#[test]
fn test_pushdown_filters_while_loading() {
    let dir = tempdir().unwrap();
    let users = write(dir.path(), "users.csv", "id,name\n1,ada\n2,bob\n3,cy\n");

    let mut session = Session::open_temp().unwrap();
    let result = session
        .run("SELECT id FROM {} WHERE name = 'bob'", &[SourceInput::new(&users)])
        .unwrap();

    assert_eq!(result.rows, vec![vec![text("2")]]);
    let stats = session.load_stats("t_0").unwrap();
    assert_eq!(stats.rows_written, 1);
    assert_eq!(stats.rows_skipped, 2);
}

#[test]
fn test_pushdown_disabled() {
    let dir = tempdir().unwrap();
    let users = write(dir.path(), "users.csv", "id,name\n1,ada\n2,bob\n3,cy\n");

    let config = Config {
        pushdown: false,
        ..Config::default()
    };
    let mut session = Session::open(config).unwrap();
    let result = session
        .run("SELECT id FROM {} WHERE name = 'bob'", &[SourceInput::new(&users)])
        .unwrap();

    assert_eq!(result.rows, vec![vec![text("2")]]);
    assert_eq!(session.load_stats("t_0").unwrap().rows_skipped, 0);
}

#[test]
fn test_unsupported_where_keeps_rows() {
    let dir = tempdir().unwrap();
    let data = write(dir.path(), "nums.jsonl", "{\"a\": \"10\"}\n{\"a\": \"20\"}\n");

    let mut session = Session::open_temp().unwrap();
    let result = session
        .run("SELECT a FROM {} WHERE a + 0 > 15", &[SourceInput::new(&data)])
        .unwrap();

    assert_eq!(result.rows, vec![vec![text("20")]]);
    assert_eq!(session.load_stats("t_0").unwrap().rows_skipped, 0);
}

#[test]
fn test_loaded_sources_are_reused() {
    let dir = tempdir().unwrap();
    let users = write(dir.path(), "users.csv", "id,name\n1,ada\n2,bob\n");
    let sources = [SourceInput::new(&users)];

    let mut session = Session::open_temp().unwrap();
    assert_eq!(session.run("SELECT * FROM {}", &sources).unwrap().len(), 2);

    let result = session
        .run("SELECT id FROM {} WHERE name = 'ada'", &sources)
        .unwrap();
    assert_eq!(result.rows, vec![vec![text("1")]]);
    assert_eq!(session.load_stats("t_0").unwrap().rows_skipped, 0);
}

#[test]
fn test_changed_input_is_reloaded() {
    let dir = tempdir().unwrap();
    let a = write(dir.path(), "a.json", r#"[{"v": "from-a"}]"#);
    let b = write(dir.path(), "b.json", r#"[{"v": "from-b"}]"#);

    let mut session = Session::open_temp().unwrap();
    let result = session.run("SELECT v FROM {}", &[SourceInput::new(&a)]).unwrap();
    assert_eq!(result.rows, vec![vec![text("from-a")]]);

    let result = session.run("SELECT v FROM {}", &[SourceInput::new(&b)]).unwrap();
    assert_eq!(result.rows, vec![vec![text("from-b")]]);

    // Same path read with another format is a different source too
    let lines = write(dir.path(), "lines", "{\"v\": \"first\"}\n{\"v\": \"second\"}\n");
    let result = session
        .run(
            "SELECT count(*) FROM {}",
            &[SourceInput::new(&lines).with_format(Format::JsonLines)],
        )
        .unwrap();
    assert_eq!(result.rows, vec![vec![RowValue::Int(2)]]);
}

#[test]
fn test_numeric_columns_load_unfiltered() {
    let dir = tempdir().unwrap();
    let data = write(dir.path(), "nums.json", r#"[{"a": 10}, {"a": 9}, {"a": 100}]"#);
    let source = SourceInput::new(&data);

    let (on, off) = run_both("SELECT a FROM {} WHERE a > 5", &source, ColumnType::Numeric);
    let on = on.unwrap();
    assert_eq!(sorted_rows(&on), sorted_rows(&off.unwrap()));
    assert_eq!(on.len(), 3);

    let mut session = Session::open(config(true, ColumnType::Numeric)).unwrap();
    session.run("SELECT a FROM {} WHERE a > 5", &[source]).unwrap();
    assert_eq!(session.load_stats("t_0").unwrap().rows_skipped, 0);
}

#[test]
fn test_columns_of_skipped_rows_stay_queryable() {
    let dir = tempdir().unwrap();
    let data = write(dir.path(), "rows.json", r#"[{"a": "1"}, {"a": "2", "b": "x"}]"#);

    let mut session = Session::open_temp().unwrap();
    let result = session
        .run("SELECT a, b FROM {} WHERE a = '1'", &[SourceInput::new(&data)])
        .unwrap();

    assert_eq!(result.rows, vec![vec![text("1"), RowValue::Null]]);
    assert_eq!(session.load_stats("t_0").unwrap().rows_skipped, 1);
}

#[test]
fn test_filtered_sources_are_reloaded() {
    let dir = tempdir().unwrap();
    let users = write(dir.path(), "users.csv", "id,name\n1,ada\n2,bob\n");
    let sources = [SourceInput::new(&users)];

    let mut session = Session::open_temp().unwrap();
    assert_eq!(
        session.run("SELECT id FROM {} WHERE name = 'ada'", &sources).unwrap().len(),
        1
    );
    assert_eq!(session.run("SELECT * FROM {}", &sources).unwrap().len(), 2);
}

#[test]
fn test_schema_evolution_through_session() {
    let dir = tempdir().unwrap();
    let data = write(
        dir.path(),
        "events",
        "{\"a\": 1}\n{\"a\": 2, \"b\": {\"c\": \"x\"}}\n",
    );

    let mut session = Session::open_temp().unwrap();
    let result = session
        .run(
            "SELECT * FROM {0} ORDER BY rowid",
            &[SourceInput::new(&data).with_format(Format::JsonLines)],
        )
        .unwrap();

    assert_eq!(result.columns, vec!["a", "b.c"]);
    assert_eq!(
        result.rows,
        vec![vec![text("1"), RowValue::Null], vec![text("2"), text("x")]]
    );
}

#[test]
fn test_convert_numbers_with_numeric_columns() {
    let dir = tempdir().unwrap();
    let data = write(dir.path(), "prices.tsv", "item\tprice\nnut\t2.5\nbolt\t10\n");

    let mut config = Config {
        convert_numbers: true,
        ..Config::default()
    };
    config.loader.column_type = percolate_sql::config::ColumnType::Numeric;

    let mut session = Session::open(config).unwrap();
    let result = session
        .run("SELECT sum(price) AS total FROM {}", &[SourceInput::new(&data)])
        .unwrap();

    assert_eq!(result.rows, vec![vec![RowValue::Float(12.5)]]);
}

#[test]
fn test_file_store() {
    let dir = tempdir().unwrap();
    let data = write(dir.path(), "rows.json", r#"[{"a": "1"}]"#);
    let db_path = dir.path().join("psq.db");

    let config = Config {
        db_path: Some(db_path.clone()),
        ..Config::default()
    };
    let mut session = Session::open(config.clone()).unwrap();
    session.run("SELECT * FROM {}", &[SourceInput::new(&data)]).unwrap();
    assert!(table_exists(session.connection(), "t_0").unwrap());
    drop(session);

    // A new session over the same file replaces the table instead of failing
    let mut session = Session::open(config).unwrap();
    let result = session.run("SELECT * FROM {}", &[SourceInput::new(&data)]).unwrap();
    assert_eq!(result.len(), 1);
}

#[test]
fn test_errors() {
    let dir = tempdir().unwrap();
    let data = write(dir.path(), "rows.json", r#"[{"a": "1"}]"#);
    let mut session = Session::open_temp().unwrap();

    assert!(matches!(
        session.run("SELECT * FROM {2}", &[SourceInput::new(&data)]),
        Err(DatabaseError::UnknownSource(2))
    ));
    assert!(matches!(
        session.run("SELECT * FROM {}", &[SourceInput::new(dir.path().join("x.parquet"))]),
        Err(DatabaseError::UnsupportedFormat(_))
    ));
    assert!(session
        .run("SELECT nope FROM {}", &[SourceInput::new(&data)])
        .unwrap_err()
        .is_store_error());
}

fn field_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        (0i64..12).prop_map(|i| json!(i)),
        prop::sample::select(vec!["", "1", "10", "9", "x", "ab"]).prop_map(|s| json!(s)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_pushdown_matches_unfiltered_load(
        rows in prop::collection::vec(
            (prop::option::of(field_value()), prop::option::of(field_value())),
            1..6,
        ),
        column in prop::sample::select(vec!["a", "b"]),
        op in prop::sample::select(vec!["=", "<", ">", "<=", ">="]),
        constant in prop::sample::select(vec!["'1'", "'10'", "'9'", "'x'", "''", "5", "10"]),
        numeric in any::<bool>(),
    ) {
        let records: Vec<Value> = rows
            .iter()
            .enumerate()
            .map(|(id, (a, b))| {
                let mut record = serde_json::Map::new();
                record.insert("id".to_string(), json!(id));
                if let Some(a) = a {
                    record.insert("a".to_string(), a.clone());
                }
                if let Some(b) = b {
                    record.insert("b".to_string(), b.clone());
                }
                Value::Object(record)
            })
            .collect();

        let dir = tempdir().unwrap();
        let data = write(dir.path(), "rows.json", &Value::Array(records).to_string());
        let column_type = if numeric { ColumnType::Numeric } else { ColumnType::Text };
        let query = format!("SELECT id, a, b FROM {{}} WHERE {} {} {}", column, op, constant);

        let (on, off) = run_both(&query, &SourceInput::new(&data), column_type);
        match (on, off) {
            (Ok(on), Ok(off)) => {
                prop_assert_eq!(sorted_rows(&on), sorted_rows(&off));
            }
            (on, off) => {
                prop_assert_eq!(on.is_ok(), off.is_ok(), "{:?} vs {:?}", on, off);
            }
        }
    }
}
