//! Tests for MS SQL Server connection module

use crate::connection::{
    build_config, column_data_to_value, procedure_params, value_to_tiberius_param,
    MssqlConnection, MssqlConnectionError, TiberiusParam,
};
use dbproc_core::{
    Connection, ConnectionConfig, ConnectionState, DbProcError, Parameter, ProcedureCall, Value,
};
use std::sync::Arc;
use std::borrow::Cow;
use tiberius::{ColumnData, ToSql};

fn local_config() -> ConnectionConfig {
    ConnectionConfig::new_mssql("localhost", 1433, "app", "sa").with_password("secret")
}

// Value conversion tests

#[test]
fn test_procedure_params_keep_arity_and_order() {
    let params = procedure_params(&[
        Parameter::new("a", Value::Null),
        Parameter::new("b", true),
        Parameter::new("c", 42),
        Parameter::new("d", std::f64::consts::PI),
        Parameter::new("e", "test"),
    ]);
    assert_eq!(params.len(), 5);
    assert!(matches!(params[0], TiberiusParam::Null));
    assert!(matches!(params[1], TiberiusParam::Bool(true)));
    assert!(matches!(params[2], TiberiusParam::I32(42)));
    assert!(matches!(params[4], TiberiusParam::String(ref s) if s == "test"));
}

#[test]
fn test_value_to_tiberius_widens_int8() {
    assert!(matches!(value_to_tiberius_param(&Value::Int8(-5)), TiberiusParam::I16(-5)));
}

#[test]
fn test_value_to_tiberius_text_like_values() {
    let decimal = value_to_tiberius_param(&Value::Decimal("123.456".to_string()));
    let json = value_to_tiberius_param(&Value::Json(serde_json::json!({"key": "value"})));
    assert!(matches!(decimal, TiberiusParam::String(ref s) if s == "123.456"));
    assert!(matches!(json, TiberiusParam::String(ref s) if s.contains("\"key\"")));
}

#[test]
fn test_value_to_tiberius_datetime_utc_is_naive_utc() {
    let naive = chrono::NaiveDate::from_ymd_opt(2024, 1, 15)
        .unwrap()
        .and_hms_opt(14, 30, 0)
        .unwrap();
    let utc = chrono::DateTime::from_naive_utc_and_offset(naive, chrono::Utc);
    let param = value_to_tiberius_param(&Value::DateTimeUtc(utc));
    assert!(matches!(param, TiberiusParam::DateTime(dt) if dt == naive));
}

#[test]
fn test_tiberius_param_to_sql() {
    assert!(matches!(TiberiusParam::Null.to_sql(), ColumnData::I32(None)));
    assert!(matches!(TiberiusParam::Bool(true).to_sql(), ColumnData::Bit(Some(true))));
    assert!(matches!(TiberiusParam::I64(7).to_sql(), ColumnData::I64(Some(7))));
    assert!(matches!(
        TiberiusParam::String("hello".to_string()).to_sql(),
        ColumnData::String(Some(ref s)) if s == "hello"
    ));
    assert!(matches!(
        TiberiusParam::Bytes(vec![1, 2, 3]).to_sql(),
        ColumnData::Binary(Some(ref b)) if **b == [1u8, 2, 3]
    ));
    let id = uuid::Uuid::new_v4();
    assert!(matches!(TiberiusParam::Uuid(id).to_sql(), ColumnData::Guid(Some(g)) if g == id));
}

// Column data conversion tests

#[test]
fn test_column_data_nulls_become_null() {
    for data in [
        ColumnData::I32(None),
        ColumnData::String(None),
        ColumnData::Bit(None),
        ColumnData::Guid(None),
        ColumnData::Date(None),
    ] {
        assert_eq!(column_data_to_value(data).unwrap(), Value::Null);
    }
}

#[test]
fn test_column_data_scalars() {
    assert_eq!(column_data_to_value(ColumnData::I32(Some(42))).unwrap(), Value::Int32(42));
    assert_eq!(column_data_to_value(ColumnData::I64(Some(-1))).unwrap(), Value::Int64(-1));
    assert_eq!(column_data_to_value(ColumnData::Bit(Some(true))).unwrap(), Value::Bool(true));
    assert_eq!(
        column_data_to_value(ColumnData::String(Some(Cow::Owned("hello".to_string())))).unwrap(),
        Value::String("hello".to_string())
    );
}

#[test]
fn test_column_data_tinyint_widens() {
    assert_eq!(column_data_to_value(ColumnData::U8(Some(255))).unwrap(), Value::Int16(255));
}

// Configuration tests

#[test]
fn test_build_config_defaults() {
    let tds = build_config(&local_config()).unwrap();
    assert_eq!(tds.get_addr(), "localhost:1433");
}

#[test]
fn test_build_config_default_port() {
    let mut config = local_config();
    config.port = 0;
    let tds = build_config(&config).unwrap();
    assert_eq!(tds.get_addr(), "localhost:1433");
}

#[test]
fn test_build_config_encrypt_modes() {
    for mode in ["required", "on", "off", "not_supported"] {
        let config = local_config().with_param("encrypt", mode);
        assert!(build_config(&config).is_ok(), "rejected `{}`", mode);
    }
}

#[test]
fn test_build_config_unknown_encrypt_mode() {
    let config = local_config().with_param("encrypt", "sometimes");
    let err = build_config(&config).unwrap_err();
    assert!(matches!(err, MssqlConnectionError::InvalidConfig(_)));
}

#[cfg(not(windows))]
#[test]
fn test_build_config_requires_user_off_windows() {
    let mut config = local_config();
    config.username = None;
    let err = build_config(&config).unwrap_err();
    assert!(matches!(err, MssqlConnectionError::AuthenticationFailed(_)));
}

#[test]
fn test_from_config_keeps_database() {
    let conn = MssqlConnection::from_config(&local_config()).unwrap();
    assert_eq!(conn.database(), Some("app"));
}

#[test]
fn test_from_ado_string() {
    let conn =
        MssqlConnection::from_ado_string("server=tcp:db.internal,1444;user=sa;password=secret")
            .unwrap();
    assert_eq!(conn.database(), None);
    assert!(format!("{:?}", conn).contains("db.internal:1444"));
}

// Error conversion tests

#[test]
fn test_mssql_error_conversion() {
    let err: DbProcError = MssqlConnectionError::NotOpen.into();
    assert!(matches!(err, DbProcError::Connection(_)));

    let err: DbProcError = MssqlConnectionError::InvalidConfig("bad".to_string()).into();
    assert!(matches!(err, DbProcError::Configuration(ref m) if m == "bad"));

    let err: DbProcError = MssqlConnectionError::Busy.into();
    assert!(err.to_string().contains("busy"));
}

#[test]
fn test_mssql_error_display() {
    let err = MssqlConnectionError::ConnectionFailed("refused".to_string());
    assert!(err.to_string().contains("Connection failed"));

    let err = MssqlConnectionError::AuthenticationFailed("bad password".to_string());
    assert!(err.to_string().contains("Authentication failed"));
}

// Lifecycle tests that need no server

#[test]
fn test_new_connection_is_closed() {
    let conn = MssqlConnection::from_config(&local_config()).unwrap();
    assert_eq!(conn.driver_name(), "mssql");
    assert_eq!(conn.state(), ConnectionState::Closed);
    assert!(conn.is_closed());
}

#[test]
fn test_close_unopened_connection_is_noop() {
    let conn = MssqlConnection::from_config(&local_config()).unwrap();
    conn.close().unwrap();
    conn.close().unwrap();
    assert_eq!(conn.state(), ConnectionState::Closed);
}

#[tokio::test]
async fn test_execute_without_open_fails() {
    let conn = MssqlConnection::from_config(&local_config()).unwrap();
    let result = conn.execute_reader(&ProcedureCall::new("GetUsers")).await;
    assert!(matches!(result, Err(DbProcError::Connection(_))));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_execute_from_spawn_blocking() {
    let conn = Arc::new(MssqlConnection::from_config(&local_config()).unwrap());
    let worker = Arc::clone(&conn);

    let result = tokio::task::spawn_blocking(move || {
        worker
            .execute_reader_blocking(&ProcedureCall::new("GetUsers"))
            .map(|_| ())
    })
    .await
    .unwrap();

    assert!(matches!(result, Err(DbProcError::Connection(ref m)) if m.contains("not open")));
    assert!(conn.is_closed());
}

#[test]
fn test_invalid_procedure_name_fails_before_touching_session() {
    let conn = MssqlConnection::from_config(&local_config()).unwrap();
    let result = conn.execute_reader_blocking(&ProcedureCall::new("dbo..GetUsers"));
    assert!(matches!(result, Err(DbProcError::Execution(_))));
}

#[test]
fn test_blocking_execute_without_open_fails() {
    let conn = MssqlConnection::from_config(&local_config()).unwrap();
    let result = conn.execute_reader_blocking(&ProcedureCall::new("GetUsers"));
    assert!(matches!(result, Err(DbProcError::Connection(_))));
}
