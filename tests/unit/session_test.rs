mod common;

use common::{Call, Engine, Script};
use hivelink::auth::AuthMechanism;
use hivelink::config::ConnectConfig;
use hivelink::error::DriverError;
use hivelink::session::{Session, SessionState};
use secrecy::SecretString;
use std::collections::HashMap;

fn plain_config() -> ConnectConfig {
    ConnectConfig::new("127.0.0.1:10000")
        .with_auth(AuthMechanism::Plain)
        .with_credentials("sqlflow", SecretString::from("sqlflow".to_string()))
}

#[tokio::test]
async fn test_open_session_sends_credentials_and_database() {
    let engine = Engine::new(Script::default());
    let config = plain_config().with_database("churn");

    let session = Session::open(&engine, &config).await.unwrap();
    assert_eq!(session.state(), SessionState::Authenticated);
    assert_eq!(session.handle().unwrap().id, "session-1");

    let calls = engine.calls();
    assert_eq!(calls[0], Call::OpenTransport("127.0.0.1:10000".to_string()));
    assert_eq!(
        calls[1],
        Call::Authenticate("SASL PLAIN sqlflow:sqlflow max=10000".to_string())
    );
    let mut expected = HashMap::new();
    expected.insert("use:database".to_string(), "churn".to_string());
    assert_eq!(
        calls[2],
        Call::OpenSession {
            username: Some("sqlflow".to_string()),
            password: Some("sqlflow".to_string()),
            configuration: expected,
        }
    );
}

#[tokio::test]
async fn test_session_config_merges_with_database() {
    let engine = Engine::new(Script::default());
    let mut config = plain_config().with_database("sales");
    config
        .session_config
        .insert("hive.exec.dynamic.partition".to_string(), "true".to_string());

    Session::open(&engine, &config).await.unwrap();

    let configuration = engine
        .calls()
        .into_iter()
        .find_map(|c| match c {
            Call::OpenSession { configuration, .. } => Some(configuration),
            _ => None,
        })
        .unwrap();
    assert_eq!(configuration.get("use:database").map(String::as_str), Some("sales"));
    assert_eq!(
        configuration.get("hive.exec.dynamic.partition").map(String::as_str),
        Some("true")
    );
}

#[tokio::test]
async fn test_nosasl_without_user_sends_no_credentials() {
    let engine = Engine::new(Script::default());
    let config = ConnectConfig::new("hs2:10000").with_auth(AuthMechanism::NoSasl);

    Session::open(&engine, &config).await.unwrap();

    let calls = engine.calls();
    assert_eq!(calls[1], Call::Authenticate("BUFFERED 4096".to_string()));
    assert_eq!(
        calls[2],
        Call::OpenSession {
            username: None,
            password: None,
            configuration: HashMap::new(),
        }
    );
}

#[tokio::test]
async fn test_none_auth_opens_session_as_plain() {
    let engine = Engine::new(Script::default());
    let mut config = ConnectConfig::new("hs2:10000").with_auth(AuthMechanism::None);
    config.username = Some("analyst".to_string());

    Session::open(&engine, &config).await.unwrap();

    let calls = engine.calls();
    assert_eq!(calls[1], Call::Authenticate("SASL PLAIN analyst:x max=10000".to_string()));
    assert!(matches!(
        &calls[2],
        Call::OpenSession { username: Some(u), password: Some(p), .. } if u == "analyst" && p == "x"
    ));
}

#[tokio::test]
async fn test_transport_failure_is_not_retried() {
    let engine = Engine::new(Script {
        fail_transport: true,
        ..Script::default()
    });

    let err = Session::open(&engine, &plain_config()).await.err().unwrap();
    assert!(matches!(err, DriverError::Transport { .. }));
    assert_eq!(engine.count(|c| matches!(c, Call::OpenTransport(_))), 1);
    assert_eq!(engine.calls().len(), 1);
}

#[tokio::test]
async fn test_auth_failure_stops_before_open_session() {
    let engine = Engine::new(Script {
        fail_auth: true,
        ..Script::default()
    });

    let err = Session::open(&engine, &plain_config()).await.err().unwrap();
    assert_eq!(err.to_string(), "auth: Bad SASL negotiation status: 4 ()");
    assert_eq!(engine.count(|c| matches!(c, Call::OpenSession { .. })), 0);
}

#[tokio::test]
async fn test_open_session_failure_is_fatal() {
    let engine = Engine::new(Script {
        fail_open_session: true,
        ..Script::default()
    });

    let err = Session::open(&engine, &plain_config()).await.err().unwrap();
    assert!(matches!(err, DriverError::Rpc { .. }));
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let engine = Engine::new(Script::default());
    let mut session = Session::open(&engine, &plain_config()).await.unwrap();

    session.close().await.unwrap();
    session.close().await.unwrap();

    assert!(session.is_closed());
    assert!(matches!(session.handle(), Err(DriverError::SessionClosed)));
    assert_eq!(engine.count(|c| matches!(c, Call::CloseSession(_))), 1);
}

#[tokio::test]
async fn test_failed_close_still_releases_handle() {
    let engine = Engine::new(Script {
        fail_close_session: true,
        ..Script::default()
    });
    let mut session = Session::open(&engine, &plain_config()).await.unwrap();

    let err = session.close().await.unwrap_err();
    assert!(matches!(err, DriverError::Rpc { .. }));
    assert_eq!(session.state(), SessionState::Closed);
    assert!(matches!(session.handle(), Err(DriverError::SessionClosed)));
    session.close().await.unwrap();
}
