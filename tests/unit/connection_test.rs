mod common;

use common::{column, running, text, Call, Engine, Script};
use hivelink::auth::AuthMechanism;
use hivelink::config::{ConnectConfig, ConnectionOptions};
use hivelink::cursor::ScanType;
use hivelink::error::DriverError;
use hivelink::rpc::CellValue;
use hivelink::value::{NamedValue, Value};
use hivelink::{Connection, RawLiteral};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn config(options: ConnectionOptions) -> ConnectConfig {
    ConnectConfig::new("127.0.0.1:10000")
        .with_auth(AuthMechanism::NoSasl)
        .with_database("churn")
        .with_options(options)
}

fn train_script(rows: usize) -> Script {
    Script {
        columns: vec![
            column("train.customerid", "VARCHAR_TYPE"),
            column("train.gender", "VARCHAR_TYPE"),
        ],
        rows: (0..rows)
            .map(|i| vec![text(&format!("c{}", i)), text(if i % 2 == 0 { "Female" } else { "Male" })])
            .collect(),
        ..Script::default()
    }
}

async fn connect(engine: &Engine, options: ConnectionOptions) -> Connection<common::EngineClient> {
    Connection::connect(engine, &config(options)).await.unwrap()
}

#[tokio::test]
async fn test_query_reads_all_rows_across_pages() {
    let engine = Engine::new(train_script(82));
    let options = ConnectionOptions {
        batch_size: 30,
        ..ConnectionOptions::default()
    };
    let mut conn = connect(&engine, options).await;

    let mut cursor = conn.query("SELECT customerID, gender FROM train", &[]).await.unwrap();
    let mut n = 0;
    while let Some(row) = cursor.next_row().await.unwrap() {
        assert_eq!(row.len(), 2);
        n += 1;
    }
    assert_eq!(n, 82);
    assert!(cursor.next_row().await.unwrap().is_none());
    cursor.close().await.unwrap();

    let fetches: Vec<_> = engine
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Fetch(..)))
        .collect();
    assert_eq!(fetches.len(), 3);
    assert!(fetches.iter().all(|c| matches!(c, Call::Fetch(_, 30))));
}

#[tokio::test]
async fn test_column_metadata() {
    let engine = Engine::new(train_script(1));
    let mut conn = connect(
        &engine,
        ConnectionOptions {
            qualify_column_names: false,
            ..ConnectionOptions::default()
        },
    )
    .await;

    let cursor = conn.query("SELECT customerID, gender FROM train;", &[]).await.unwrap();
    assert_eq!(cursor.column_names(), vec!["customerid", "gender"]);
    for c in cursor.columns() {
        assert_eq!(c.type_name, "VARCHAR_TYPE");
        assert_eq!(c.scan_type, ScanType::Text);
    }
}

#[tokio::test]
async fn test_qualified_column_names_by_default() {
    let engine = Engine::new(train_script(1));
    let mut conn = connect(&engine, ConnectionOptions::default()).await;

    let cursor = conn.query("SELECT * FROM train", &[]).await.unwrap();
    assert_eq!(cursor.column_names(), vec!["train.customerid", "train.gender"]);
}

#[tokio::test]
async fn test_query_sends_interpolated_sql() {
    let engine = Engine::new(train_script(0));
    let mut conn = connect(&engine, ConnectionOptions::default()).await;

    let cursor = conn
        .query(
            "SELECT * FROM train WHERE gender = ? AND tags = ? LIMIT ?",
            &[
                Value::from("O'Brien"),
                Value::literal(RawLiteral::new("ARRAY('a','b')")),
                Value::Int(10),
            ],
        )
        .await
        .unwrap();
    assert!(cursor.column_names().len() == 2);
    drop(cursor);

    assert_eq!(
        engine.submitted(),
        vec![r"SELECT * FROM train WHERE gender = 'O\'Brien' AND tags = ARRAY('a','b') LIMIT 10"]
    );
}

#[tokio::test]
async fn test_interpolation_errors_never_reach_the_engine() {
    let engine = Engine::new(Script::default());
    let mut conn = connect(&engine, ConnectionOptions::default()).await;

    let err = conn.query("SELECT ?", &[]).await.err().unwrap();
    assert!(matches!(err, DriverError::ArgumentCountMismatch { .. }));

    let err = conn
        .query_named("SELECT ?", &[NamedValue::named("id", 1)])
        .await
        .err()
        .unwrap();
    assert!(matches!(err, DriverError::NamedParametersUnsupported { .. }));

    let err = conn
        .exec("INSERT INTO t VALUES (?)", &[Value::Float(f64::INFINITY)])
        .await
        .unwrap_err();
    assert!(matches!(err, DriverError::UnsupportedArgumentType { .. }));

    assert!(engine.submitted().is_empty());
}

#[tokio::test]
async fn test_exec_closes_operation() {
    let engine = Engine::new(Script {
        has_result_set: false,
        ..Script::default()
    });
    let mut conn = connect(&engine, ConnectionOptions::default()).await;

    conn.exec(
        "insert into churn.test (gender) values (?)",
        &[Value::from("Female")],
    )
    .await
    .unwrap();

    assert_eq!(
        engine.submitted(),
        vec!["insert into churn.test (gender) values ('Female')"]
    );
    assert_eq!(engine.count(|c| matches!(c, Call::CloseOperation(_))), 1);
    assert!(conn.session().current_operation().is_none());
}

#[tokio::test]
async fn test_statement_without_result_set_is_empty() {
    let engine = Engine::new(Script {
        has_result_set: false,
        ..Script::default()
    });
    let mut conn = connect(&engine, ConnectionOptions::default()).await;

    let mut cursor = conn.query("CREATE TABLE t (a INT)", &[]).await.unwrap();
    assert!(cursor.columns().is_empty());
    assert!(cursor.next_row().await.unwrap().is_none());
    assert_eq!(engine.count(|c| matches!(c, Call::Fetch(..))), 0);
}

#[tokio::test]
async fn test_ping() {
    let engine = Engine::new(Script {
        columns: vec![column("_c0", "INT_TYPE")],
        rows: vec![vec![text("1")]],
        ..Script::default()
    });
    let mut conn = connect(&engine, ConnectionOptions::default()).await;

    conn.ping().await.unwrap();
    assert_eq!(engine.submitted(), vec!["SELECT 1"]);
    assert_eq!(engine.count(|c| matches!(c, Call::CloseOperation(_))), 1);
}

#[tokio::test]
async fn test_collect_all() {
    let engine = Engine::new(Script {
        columns: vec![column("t.a", "STRING_TYPE")],
        rows: vec![vec![text("x")], vec![CellValue::Null]],
        ..Script::default()
    });
    let mut conn = connect(&engine, ConnectionOptions::default()).await;

    let result = conn.query("SELECT a FROM t", &[]).await.unwrap().collect_all().await.unwrap();
    assert_eq!(result.columns[0].name, "t.a");
    assert_eq!(result.rows, vec![vec![text("x")], vec![CellValue::Null]]);
    assert_eq!(result.rows[1][0].as_text(), None);
}

#[tokio::test]
async fn test_closing_cursor_early_is_safe() {
    let engine = Engine::new(train_script(50));
    let mut conn = connect(
        &engine,
        ConnectionOptions {
            batch_size: 10,
            ..ConnectionOptions::default()
        },
    )
    .await;

    let mut cursor = conn.query("SELECT * FROM train", &[]).await.unwrap();
    assert!(cursor.next_row().await.unwrap().is_some());
    cursor.close().await.unwrap();
    cursor.close().await.unwrap();
    assert!(cursor.next_row().await.unwrap().is_none());

    assert_eq!(engine.count(|c| matches!(c, Call::CloseOperation(_))), 1);
    assert_eq!(engine.count(|c| matches!(c, Call::Fetch(..))), 1);
}

#[tokio::test]
async fn test_dropped_cursor_operation_is_released_on_next_query() {
    let engine = Engine::new(train_script(5));
    let mut conn = connect(&engine, ConnectionOptions::default()).await;

    {
        let cursor = conn.query("SELECT 1", &[]).await.unwrap();
        assert_eq!(cursor.operation().id, "op-1");
    }
    assert_eq!(
        conn.session().current_operation().map(|o| o.id.as_str()),
        Some("op-1")
    );

    let cursor = conn.query("SELECT 2", &[]).await.unwrap();
    assert_eq!(cursor.operation().id, "op-2");
    drop(cursor);

    let calls = engine.calls();
    let close_pos = calls
        .iter()
        .position(|c| *c == Call::CloseOperation("op-1".to_string()))
        .expect("op-1 closed");
    let submit_pos = calls
        .iter()
        .position(|c| *c == Call::Submit("SELECT 2".to_string()))
        .unwrap();
    assert!(close_pos < submit_pos);
}

#[tokio::test]
async fn test_close_connection_then_query_fails() {
    let engine = Engine::new(train_script(1));
    let mut conn = connect(&engine, ConnectionOptions::default()).await;

    conn.close().await.unwrap();
    conn.close().await.unwrap();
    assert!(conn.is_closed());

    let err = conn.query("SELECT 1", &[]).await.err().unwrap();
    assert!(matches!(err, DriverError::SessionClosed));
    let err = conn.ping().await.unwrap_err();
    assert!(matches!(err, DriverError::SessionClosed));
    assert_eq!(engine.count(|c| matches!(c, Call::CloseSession(_))), 1);
    assert!(engine.submitted().is_empty());
}

#[tokio::test]
async fn test_close_connection_releases_open_operation() {
    let engine = Engine::new(train_script(3));
    let mut conn = connect(&engine, ConnectionOptions::default()).await;

    drop(conn.query("SELECT * FROM train", &[]).await.unwrap());
    conn.close().await.unwrap();

    let calls = engine.calls();
    assert_eq!(
        &calls[calls.len() - 2..],
        &[
            Call::CloseOperation("op-1".to_string()),
            Call::CloseSession("session-1".to_string())
        ]
    );
}

#[tokio::test]
async fn test_failed_statement_releases_operation() {
    let engine = Engine::new(Script {
        statuses: [hivelink::rpc::OperationStatus {
            state: hivelink::rpc::OperationState::Error,
            error_message: Some("FAILED: ParseException".to_string()),
        }]
        .into_iter()
        .collect(),
        ..Script::default()
    });
    let mut conn = connect(&engine, ConnectionOptions::default()).await;

    let err = conn.query("SELEC 1", &[]).await.err().unwrap();
    assert_eq!(err.to_string(), "query: FAILED: ParseException");
    assert!(conn.session().current_operation().is_none());
    assert_eq!(engine.count(|c| matches!(c, Call::CloseOperation(_))), 1);
}

#[tokio::test(start_paused = true)]
async fn test_query_with_cancellation() {
    let engine = Engine::new(Script {
        statuses: running(100),
        ..Script::default()
    });
    let mut conn = connect(
        &engine,
        ConnectionOptions {
            poll_interval: Duration::from_secs(1),
            ..ConnectionOptions::default()
        },
    )
    .await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        trigger.cancel();
    });

    let err = conn.query_with("SELECT * FROM big", &[], &cancel).await.err().unwrap();
    assert!(matches!(err, DriverError::StatementCancelled));
    assert_eq!(engine.count(|c| matches!(c, Call::Cancel(_))), 1);
    assert_eq!(engine.count(|c| matches!(c, Call::Poll(_))), 3);
    assert!(!conn.is_closed());
}
