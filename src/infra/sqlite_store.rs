use std::time::Duration;

use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OpenFlags, ToSql};
use tracing::{debug, warn};

use crate::app::ports::{StoreConnector, StoreSession, WriteFault};
use crate::config::ConnectionDescriptor;
use crate::domain::CanonicalRecord;
use crate::error::{IngestError, Result};
use crate::pipeline::storage::{StoreValue, TargetSchema, BATCH_LEDGER_TABLE};

impl ToSql for StoreValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            StoreValue::Text(s) => ToSqlOutput::from(s.as_str()),
            StoreValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            StoreValue::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
        })
    }
}

/// Opens one SQLite connection and `BEGIN IMMEDIATE` transaction per batch.
pub struct SqliteConnector {
    descriptor: ConnectionDescriptor,
}

impl SqliteConnector {
    pub fn new(descriptor: ConnectionDescriptor) -> Self {
        Self { descriptor }
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    fn open(&self) -> Result<Connection> {
        let d = &self.descriptor;
        if d.create_if_missing {
            if let Some(parent) = d.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| connection_error(&d.path, e))?;
            }
        }

        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if d.create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        let conn = Connection::open_with_flags(&d.path, flags).map_err(|e| connection_error(&d.path, e))?;
        conn.busy_timeout(Duration::from_millis(d.busy_timeout_ms))
            .map_err(|e| connection_error(&d.path, e))?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(|e| connection_error(&d.path, e))?;
        Ok(conn)
    }

    /// Create the target table and the batch ledger outside of any ingest.
    pub fn init_schema(&self, schema: &TargetSchema) -> Result<()> {
        let conn = self.open()?;
        conn.execute_batch(&format!("{};\n{};", schema.create_table_sql(), ledger_sql()))
            .map_err(|e| connection_error(&self.descriptor.path, e))?;
        Ok(())
    }
}

impl StoreConnector for SqliteConnector {
    fn acquire(&self, schema: &TargetSchema) -> Result<Box<dyn StoreSession>> {
        let conn = self.open()?;
        conn.execute_batch("BEGIN IMMEDIATE")
            .map_err(|e| connection_error(&self.descriptor.path, e))?;
        let mut session = SqliteSession { conn, finished: false };
        if self.descriptor.ensure_schema {
            if let Err(e) = session.conn.execute_batch(&schema.create_table_sql()) {
                session.finish("ROLLBACK").ok();
                return Err(connection_error(&self.descriptor.path, e));
            }
        }
        let existing = match table_columns(&session.conn, &schema.table) {
            Ok(columns) => columns,
            Err(e) => {
                session.finish("ROLLBACK").ok();
                return Err(connection_error(&self.descriptor.path, e));
            }
        };
        if let Err(e) = check_layout(schema, &existing) {
            session.finish("ROLLBACK").ok();
            return Err(e);
        }
        debug!(path = %self.descriptor.path.display(), table = %schema.table, "store session opened");
        Ok(Box::new(session))
    }
}

fn table_columns(conn: &Connection, table: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(columns)
}

/// A table that lacks a target column is a deployment mistake; retrying cannot fix it.
fn check_layout(schema: &TargetSchema, existing: &[String]) -> Result<()> {
    if existing.is_empty() {
        return Err(IngestError::Config(format!("table '{}' does not exist", schema.table)));
    }
    let missing: Vec<&str> = schema
        .columns
        .iter()
        .map(|c| c.column)
        .filter(|c| !existing.iter().any(|e| e.eq_ignore_ascii_case(c)))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(IngestError::Config(format!(
            "table '{}' is missing column(s) {}; is pipeline.target set for this database?",
            schema.table,
            missing.join(", ")
        )))
    }
}

pub struct SqliteSession {
    conn: Connection,
    finished: bool,
}

impl SqliteSession {
    fn finish(&mut self, statement: &str) -> std::result::Result<(), WriteFault> {
        self.finished = true;
        self.conn
            .execute_batch(statement)
            .map_err(|e| WriteFault::Fatal(format!("{} failed: {}", statement, e)))
    }
}

impl StoreSession for SqliteSession {
    fn insert(&mut self, schema: &TargetSchema, record: &CanonicalRecord) -> std::result::Result<(), WriteFault> {
        let mut stmt = self.conn.prepare_cached(&schema.insert_sql()).map_err(classify)?;
        stmt.execute(params_from_iter(schema.values(record).iter()))
            .map_err(classify)?;
        Ok(())
    }

    fn batch_recorded(&mut self, batch_key: &str) -> std::result::Result<bool, WriteFault> {
        self.conn.execute_batch(&ledger_sql()).map_err(fatal)?;
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT 1 FROM {} WHERE batch_key = ?1", BATCH_LEDGER_TABLE))
            .map_err(fatal)?;
        let mut rows = stmt.query(params![batch_key]).map_err(fatal)?;
        let found = rows.next().map_err(fatal)?.is_some();
        Ok(found)
    }

    fn record_batch(&mut self, batch_key: &str, source: &str, rows_written: usize) -> std::result::Result<(), WriteFault> {
        self.conn.execute_batch(&ledger_sql()).map_err(fatal)?;
        self.conn
            .execute(
                &format!(
                    "INSERT INTO {} (batch_key, source, rows_written, ingested_at) VALUES (?1, ?2, ?3, ?4)",
                    BATCH_LEDGER_TABLE
                ),
                params![batch_key, source, rows_written as i64, chrono::Utc::now().to_rfc3339()],
            )
            .map_err(fatal)?;
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> std::result::Result<(), WriteFault> {
        self.finish("COMMIT")
    }

    fn rollback(mut self: Box<Self>) -> std::result::Result<(), WriteFault> {
        self.finish("ROLLBACK")
    }
}

impl Drop for SqliteSession {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(e) = self.conn.execute_batch("ROLLBACK") {
                warn!("rollback on drop failed: {}", e);
            }
        }
    }
}

fn ledger_sql() -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            batch_key    TEXT PRIMARY KEY,
            source       TEXT NOT NULL,
            rows_written INTEGER NOT NULL,
            ingested_at  TEXT NOT NULL
        )",
        BATCH_LEDGER_TABLE
    )
}

fn connection_error(path: &std::path::Path, e: impl std::fmt::Display) -> IngestError {
    IngestError::Connection {
        message: format!("{}: {}", path.display(), e),
    }
}

fn fatal(e: rusqlite::Error) -> WriteFault {
    WriteFault::Fatal(e.to_string())
}

/// Errors that only concern the offending row leave the transaction usable.
fn classify(e: rusqlite::Error) -> WriteFault {
    match &e {
        rusqlite::Error::SqliteFailure(err, _)
            if matches!(
                err.code,
                ErrorCode::ConstraintViolation
                    | ErrorCode::TypeMismatch
                    | ErrorCode::TooBig
                    | ErrorCode::ParameterOutOfRange
            ) =>
        {
            WriteFault::Row(e.to_string())
        }
        rusqlite::Error::ToSqlConversionFailure(_) | rusqlite::Error::InvalidParameterCount(_, _) => {
            WriteFault::Row(e.to_string())
        }
        _ => WriteFault::Fatal(e.to_string()),
    }
}
