//! MS SQL Server connection implementation using tiberius

use crate::cursor::{EventSender, StreamEvent, StreamingCursor, ROW_BUFFER};
use crate::runtime;
use crate::statement::build_exec_statement;
use async_trait::async_trait;
use chrono::NaiveDate;
use dbproc_core::{
    BlockingCursor, ColumnMeta, Connection, ConnectionConfig, ConnectionState, DbProcError,
    Parameter, ProcedureCall, Result, ResultCursor, Value,
};
use futures::TryStreamExt;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use tiberius::{
    AuthMethod, Client, ColumnData, Config, EncryptionLevel, QueryItem, Row as TiberiusRow, ToSql,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::Instrument;

const DEFAULT_PORT: u16 = 1433;

/// MS SQL Server connection errors
#[derive(Debug, thiserror::Error)]
pub enum MssqlConnectionError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Connection is not open")]
    NotOpen,

    #[error("Connection is busy with another request")]
    Busy,

    #[error("Tiberius error: {0}")]
    Tiberius(#[from] tiberius::error::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MssqlConnectionError> for DbProcError {
    fn from(err: MssqlConnectionError) -> Self {
        match err {
            MssqlConnectionError::InvalidConfig(msg) => DbProcError::Configuration(msg),
            MssqlConnectionError::Io(e) => DbProcError::Io(e),
            MssqlConnectionError::Tiberius(e) => DbProcError::Execution(e.to_string()),
            other => DbProcError::Connection(other.to_string()),
        }
    }
}

type TdsClient = Client<Compat<TcpStream>>;

/// Session state shared with the task streaming a result set.
///
/// While a result is being read the client is lent to that task and
/// `client` is `None`. The lock is never held across an await.
#[derive(Default)]
struct Session {
    client: Option<TdsClient>,
    open: bool,
}

impl Session {
    fn install(&mut self, client: TdsClient) {
        if self.open {
            tracing::debug!("connection already open, dropping the new client");
            return;
        }
        self.client = Some(client);
        self.open = true;
    }

    /// Take back a client lent to a streaming task
    fn restore(&mut self, client: TdsClient) {
        if self.open && self.client.is_none() {
            self.client = Some(client);
        } else {
            tracing::debug!("session closed while streaming, dropping client");
        }
    }

    fn lend(&mut self) -> std::result::Result<TdsClient, MssqlConnectionError> {
        if !self.open {
            return Err(MssqlConnectionError::NotOpen);
        }
        self.client.take().ok_or(MssqlConnectionError::Busy)
    }
}

/// MS SQL Server connection using tiberius.
///
/// Constructing the connection does no I/O; the TCP session is established
/// by `open` and torn down by `close`. Result rows are streamed: the client
/// is handed to a task that forwards rows through a bounded channel, so at
/// most [`ROW_BUFFER`] rows are held in memory ahead of the reader.
pub struct MssqlConnection {
    config: Config,
    session: Arc<Mutex<Session>>,
    database: Option<String>,
}

impl MssqlConnection {
    /// Create a closed connection from a tiberius configuration
    pub fn new(config: Config, database: Option<String>) -> Self {
        Self {
            config,
            session: Arc::new(Mutex::new(Session::default())),
            database,
        }
    }

    /// Create a closed connection from a shared [`ConnectionConfig`].
    ///
    /// Recognised params: `trust_cert`, `encrypt` (`required`, `on`, `off`,
    /// `not_supported`) and `application_name`.
    pub fn from_config(config: &ConnectionConfig) -> std::result::Result<Self, MssqlConnectionError> {
        let tds = build_config(config)?;
        Ok(Self::new(tds, config.get_string("database")))
    }

    /// Create a closed connection from an ADO.NET style connection string
    pub fn from_ado_string(conn_str: &str) -> std::result::Result<Self, MssqlConnectionError> {
        let tds = Config::from_ado_string(conn_str)
            .map_err(|e| MssqlConnectionError::InvalidConfig(e.to_string()))?;
        Ok(Self::new(tds, None))
    }

    /// Database name this connection was configured with
    pub fn database(&self) -> Option<&str> {
        self.database.as_deref()
    }

    #[tracing::instrument(skip(config), fields(addr = %config.get_addr()))]
    async fn connect(config: Config) -> std::result::Result<TdsClient, MssqlConnectionError> {
        tracing::debug!("connecting to MS SQL Server");

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| MssqlConnectionError::ConnectionFailed(e.to_string()))?;
        tcp.set_nodelay(true)?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| MssqlConnectionError::ConnectionFailed(e.to_string()))?;

        tracing::debug!("successfully connected to MS SQL Server");
        Ok(client)
    }

    fn connect_failed(e: MssqlConnectionError) -> DbProcError {
        tracing::error!(error = %e, "failed to open MS SQL Server connection");
        DbProcError::Connection(e.to_string())
    }

    /// Lend the client to a new streaming task.
    ///
    /// Returns the receiving end of the row channel and the task itself; the
    /// caller decides which runtime drives it.
    fn start_stream(
        &self,
        call: &ProcedureCall,
    ) -> Result<(mpsc::Receiver<Result<StreamEvent>>, impl Future<Output = ()> + Send + 'static)>
    {
        let sql = build_exec_statement(call)?;
        let params = procedure_params(call.parameters());
        let client = self.session.lock().lend()?;

        let (tx, rx) = mpsc::channel(ROW_BUFFER);
        let session = Arc::clone(&self.session);
        let span = tracing::debug_span!("mssql_procedure", procedure = %call.name());
        let task = async move {
            let mut client = client;
            if let Err(e) = stream_first_result(&mut client, &sql, &params, &tx).await {
                tracing::error!(error = %e, "procedure execution failed");
                let _ = tx.send(Err(e)).await;
            }
            session.lock().restore(client);
        }
        .instrument(span);

        Ok((rx, task))
    }
}

/// Run the statement and forward the first result set through `tx`.
///
/// Later result sets are read and discarded. Stops early when the cursor
/// has been dropped.
async fn stream_first_result(
    client: &mut TdsClient,
    sql: &str,
    params: &[TiberiusParam],
    tx: &EventSender,
) -> Result<()> {
    let start = std::time::Instant::now();
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();

    let mut stream = client
        .query(sql, &param_refs[..])
        .await
        .map_err(|e| DbProcError::Execution(e.to_string()))?;

    let mut row_count = 0usize;
    while let Some(item) = stream
        .try_next()
        .await
        .map_err(|e| DbProcError::Execution(e.to_string()))?
    {
        let event = match item {
            QueryItem::Metadata(meta) if meta.result_index() == 0 => StreamEvent::Columns(
                meta.columns()
                    .iter()
                    .enumerate()
                    .map(|(idx, col)| tiberius_column_to_meta(col, idx))
                    .collect(),
            ),
            QueryItem::Row(row) if row.result_index() == 0 => {
                row_count += 1;
                StreamEvent::Row(tiberius_row_to_values(row)?)
            }
            _ => continue,
        };
        if tx.send(Ok(event)).await.is_err() {
            tracing::debug!(row_count, "cursor dropped before the result was fully read");
            return Ok(());
        }
    }

    tracing::debug!(
        row_count,
        duration_ms = start.elapsed().as_millis() as u64,
        "procedure completed"
    );
    Ok(())
}

/// Translate a shared configuration into a tiberius configuration
pub(crate) fn build_config(
    config: &ConnectionConfig,
) -> std::result::Result<Config, MssqlConnectionError> {
    let mut tds = Config::new();
    tds.host(
        config
            .get_string("host")
            .unwrap_or_else(|| "localhost".to_string()),
    );
    tds.port(if config.port > 0 { config.port } else { DEFAULT_PORT });

    if let Some(db) = config.get_string("database") {
        tds.database(db);
    }
    if let Some(app) = config.get_string("application_name") {
        tds.application_name(app);
    }
    if config.get_bool("trust_cert").unwrap_or(false) {
        tds.trust_cert();
    }

    let encryption = match config.get_string("encrypt").as_deref() {
        None | Some("required") => EncryptionLevel::Required,
        Some("on") => EncryptionLevel::On,
        Some("off") => EncryptionLevel::Off,
        Some("not_supported") => EncryptionLevel::NotSupported,
        Some(other) => {
            return Err(MssqlConnectionError::InvalidConfig(format!(
                "unknown encrypt mode `{}`",
                other
            )));
        }
    };
    tds.encryption(encryption);

    let username = config
        .get_string("user")
        .or_else(|| config.get_string("username"));
    match (username, config.get_string("password")) {
        (Some(user), Some(pass)) => tds.authentication(AuthMethod::sql_server(user, pass)),
        (Some(user), None) => tds.authentication(AuthMethod::sql_server(user, "")),
        (None, _) => {
            #[cfg(windows)]
            {
                tds.authentication(AuthMethod::Integrated);
            }
            #[cfg(not(windows))]
            {
                return Err(MssqlConnectionError::AuthenticationFailed(
                    "Windows authentication is only supported on Windows".to_string(),
                ));
            }
        }
    }

    Ok(tds)
}

#[async_trait]
impl Connection for MssqlConnection {
    fn driver_name(&self) -> &str {
        "mssql"
    }

    fn state(&self) -> ConnectionState {
        if self.session.lock().open {
            ConnectionState::Open
        } else {
            ConnectionState::Closed
        }
    }

    async fn open(&self) -> Result<()> {
        if self.state() == ConnectionState::Open {
            return Ok(());
        }
        let client = Self::connect(self.config.clone())
            .await
            .map_err(Self::connect_failed)?;
        self.session.lock().install(client);
        Ok(())
    }

    fn open_blocking(&self) -> Result<()> {
        if self.state() == ConnectionState::Open {
            return Ok(());
        }
        let client =
            runtime::block_on(Self::connect(self.config.clone()))?.map_err(Self::connect_failed)?;
        self.session.lock().install(client);
        Ok(())
    }

    async fn execute_reader(&self, call: &ProcedureCall) -> Result<Box<dyn ResultCursor>> {
        let (rx, task) = self.start_stream(call)?;
        tokio::spawn(task);
        let cursor = StreamingCursor::start(rx).await?;
        Ok(Box::new(cursor))
    }

    fn execute_reader_blocking(&self, call: &ProcedureCall) -> Result<Box<dyn BlockingCursor>> {
        let (rx, task) = self.start_stream(call)?;
        runtime::spawn(task)?;
        let cursor = runtime::wait(StreamingCursor::start(rx))?;
        Ok(Box::new(cursor))
    }

    fn close(&self) -> Result<()> {
        let mut session = self.session.lock();
        if session.client.take().is_some() {
            tracing::debug!("MS SQL Server connection closed");
        }
        session.open = false;
        Ok(())
    }
}

/// Convert a tiberius column to ColumnMeta
fn tiberius_column_to_meta(col: &tiberius::Column, ordinal: usize) -> ColumnMeta {
    ColumnMeta::new(col.name(), ordinal).with_data_type(format!("{:?}", col.column_type()))
}

/// Convert a tiberius row to a vector of Values by consuming the row
fn tiberius_row_to_values(row: TiberiusRow) -> Result<Vec<Value>> {
    row.into_iter().map(column_data_to_value).collect()
}

fn days_since(year: i32, days: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or_default() + chrono::Duration::days(days)
}

fn time_from_increments(increments: u64, scale: u8) -> chrono::NaiveTime {
    let per_second = 10u64.pow(scale as u32);
    let secs = increments / per_second;
    let nanos = (increments % per_second) * 10u64.pow(9 - scale as u32);
    chrono::NaiveTime::from_num_seconds_from_midnight_opt(secs as u32, nanos as u32)
        .unwrap_or_default()
}

/// Convert tiberius ColumnData to a dbproc Value
pub(crate) fn column_data_to_value(col_data: ColumnData<'static>) -> Result<Value> {
    let value = match col_data {
        ColumnData::Bit(v) => v.map(Value::Bool).unwrap_or_default(),
        // tinyint is unsigned; widen so every value fits
        ColumnData::U8(v) => v.map(|v| Value::Int16(v as i16)).unwrap_or_default(),
        ColumnData::I16(v) => v.map(Value::Int16).unwrap_or_default(),
        ColumnData::I32(v) => v.map(Value::Int32).unwrap_or_default(),
        ColumnData::I64(v) => v.map(Value::Int64).unwrap_or_default(),
        ColumnData::F32(v) => v.map(Value::Float32).unwrap_or_default(),
        ColumnData::F64(v) => v.map(Value::Float64).unwrap_or_default(),
        ColumnData::String(v) => v.map(|s| Value::String(s.into_owned())).unwrap_or_default(),
        ColumnData::Guid(v) => v.map(Value::Uuid).unwrap_or_default(),
        ColumnData::Binary(v) => v.map(|b| Value::Bytes(b.into_owned())).unwrap_or_default(),
        ColumnData::Numeric(v) => v.map(|n| Value::Decimal(n.to_string())).unwrap_or_default(),
        ColumnData::Xml(v) => v
            .map(|x| Value::String(x.into_owned().into_string()))
            .unwrap_or_default(),
        ColumnData::DateTime(v) => v
            .map(|v| {
                // seconds_fragments are 1/300 s
                let fragments = v.seconds_fragments() as u64;
                let time = chrono::NaiveTime::from_num_seconds_from_midnight_opt(
                    (fragments / 300) as u32,
                    ((fragments % 300) * 1_000_000_000 / 300) as u32,
                )
                .unwrap_or_default();
                Value::DateTime(days_since(1900, v.days() as i64).and_time(time))
            })
            .unwrap_or_default(),
        ColumnData::SmallDateTime(v) => v
            .map(|v| {
                let time = chrono::NaiveTime::from_num_seconds_from_midnight_opt(
                    (v.seconds_fragments() as u32) * 60,
                    0,
                )
                .unwrap_or_default();
                Value::DateTime(days_since(1900, v.days() as i64).and_time(time))
            })
            .unwrap_or_default(),
        ColumnData::DateTime2(v) => v
            .map(|v| {
                let date = days_since(1, v.date().days() as i64);
                let time = time_from_increments(v.time().increments(), v.time().scale());
                Value::DateTime(date.and_time(time))
            })
            .unwrap_or_default(),
        ColumnData::DateTimeOffset(v) => v
            .map(|v| {
                let dt2 = v.datetime2();
                let date = days_since(1, dt2.date().days() as i64);
                let time = time_from_increments(dt2.time().increments(), dt2.time().scale());
                // datetime2 part of a datetimeoffset is stored in UTC
                Value::DateTimeUtc(chrono::DateTime::from_naive_utc_and_offset(
                    date.and_time(time),
                    chrono::Utc,
                ))
            })
            .unwrap_or_default(),
        ColumnData::Date(v) => v
            .map(|v| Value::Date(days_since(1, v.days() as i64)))
            .unwrap_or_default(),
        ColumnData::Time(v) => v
            .map(|v| Value::Time(time_from_increments(v.increments(), v.scale())))
            .unwrap_or_default(),
    };
    Ok(value)
}

/// Container for tiberius parameter values
#[derive(Debug)]
pub(crate) enum TiberiusParam {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
}

impl ToSql for TiberiusParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            TiberiusParam::Null => ColumnData::I32(None),
            TiberiusParam::Bool(v) => ColumnData::Bit(Some(*v)),
            TiberiusParam::I16(v) => ColumnData::I16(Some(*v)),
            TiberiusParam::I32(v) => ColumnData::I32(Some(*v)),
            TiberiusParam::I64(v) => ColumnData::I64(Some(*v)),
            TiberiusParam::F32(v) => ColumnData::F32(Some(*v)),
            TiberiusParam::F64(v) => ColumnData::F64(Some(*v)),
            TiberiusParam::String(v) => {
                ColumnData::String(Some(std::borrow::Cow::Borrowed(v.as_str())))
            }
            TiberiusParam::Bytes(v) => {
                ColumnData::Binary(Some(std::borrow::Cow::Borrowed(v.as_slice())))
            }
            TiberiusParam::Uuid(v) => ColumnData::Guid(Some(*v)),
            TiberiusParam::Date(v) => v.to_sql(),
            TiberiusParam::Time(v) => v.to_sql(),
            TiberiusParam::DateTime(v) => v.to_sql(),
        }
    }
}

/// Convert procedure parameters to tiberius parameters, in order
pub(crate) fn procedure_params(params: &[Parameter]) -> Vec<TiberiusParam> {
    params.iter().map(|p| value_to_tiberius_param(&p.value)).collect()
}

/// Convert a dbproc Value to a tiberius parameter
pub(crate) fn value_to_tiberius_param(value: &Value) -> TiberiusParam {
    match value {
        Value::Null => TiberiusParam::Null,
        Value::Bool(b) => TiberiusParam::Bool(*b),
        Value::Int8(i) => TiberiusParam::I16(*i as i16),
        Value::Int16(i) => TiberiusParam::I16(*i),
        Value::Int32(i) => TiberiusParam::I32(*i),
        Value::Int64(i) => TiberiusParam::I64(*i),
        Value::Float32(f) => TiberiusParam::F32(*f),
        Value::Float64(f) => TiberiusParam::F64(*f),
        Value::Decimal(d) => TiberiusParam::String(d.clone()),
        Value::String(s) => TiberiusParam::String(s.clone()),
        Value::Bytes(b) => TiberiusParam::Bytes(b.clone()),
        Value::Uuid(u) => TiberiusParam::Uuid(*u),
        Value::Date(d) => TiberiusParam::Date(*d),
        Value::Time(t) => TiberiusParam::Time(*t),
        Value::DateTime(dt) => TiberiusParam::DateTime(*dt),
        Value::DateTimeUtc(dt) => TiberiusParam::DateTime(dt.naive_utc()),
        Value::Json(j) => TiberiusParam::String(j.to_string()),
    }
}

impl std::fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("addr", &self.config.get_addr())
            .field("database", &self.database)
            .field("open", &self.session.lock().open)
            .finish()
    }
}
