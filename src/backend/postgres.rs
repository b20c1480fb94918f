//! PostgreSQL execution backend.
//!
//! Dispatches statements over sqlx, resolving a connection pool per profile
//! and reusing it across calls.

use super::{ColumnInfo, QueryBackend, QueryLimits, Row, Tabular, Value};
use crate::error::{ConduitError, Result};
use crate::registry::ConnectionProfile;
use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Column as SqlxColumn, Row as SqlxRow, TypeInfo};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Maximum number of connection retry attempts.
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts (doubles each retry).
const RETRY_BASE_DELAY_MS: u64 = 500;

/// Execution backend for PostgreSQL targets.
pub struct PostgresBackend {
    pools: Mutex<HashMap<String, PgPool>>,
}

impl PostgresBackend {
    /// Creates a backend with an empty pool cache.
    pub fn new() -> Self {
        Self {
            pools: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached pool for a profile, connecting if necessary.
    async fn pool_for(&self, profile: &ConnectionProfile) -> Result<PgPool> {
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(&profile.id) {
            if !pool.is_closed() {
                return Ok(pool.clone());
            }
            pools.remove(&profile.id);
        }

        let pool = connect_with_retry(profile).await?;
        pools.insert(profile.id.clone(), pool.clone());
        Ok(pool)
    }

    /// Closes all cached pools.
    pub async fn close(&self) {
        let mut pools = self.pools.lock().await;
        for (_, pool) in pools.drain() {
            pool.close().await;
        }
    }
}

impl Default for PostgresBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryBackend for PostgresBackend {
    async fn run_query(
        &self,
        profile: &ConnectionProfile,
        sql: &str,
        limits: &QueryLimits,
    ) -> Result<Tabular> {
        let pool = self.pool_for(profile).await?;

        let result = tokio::time::timeout(
            Duration::from_millis(limits.timeout_ms),
            sqlx::query(sql).fetch_all(&pool),
        )
        .await
        .map_err(|_| {
            ConduitError::backend(format!(
                "Query timed out after {} ms",
                limits.timeout_ms
            ))
        })?
        .map_err(|e| ConduitError::backend(format_query_error(e)))?;

        let columns: Vec<ColumnInfo> = result
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
                    .collect()
            })
            .unwrap_or_default();

        let rows: Vec<Row> = result.iter().map(convert_row).collect();

        Ok(Tabular::with_data(columns, rows))
    }
}

/// Builds a PostgreSQL connection string from a profile.
fn connection_string(profile: &ConnectionProfile) -> String {
    let database = profile.schema.as_deref().unwrap_or("postgres");
    let sslmode = if profile.use_tls { "require" } else { "prefer" };
    let credentials = match &profile.password {
        Some(password) => format!("{}:{}", profile.user, password),
        None => profile.user.clone(),
    };
    format!(
        "postgres://{}@{}:{}/{}?sslmode={}",
        credentials, profile.host, profile.port, database, sslmode
    )
}

/// Connects to the target, retrying transient failures with backoff.
async fn connect_with_retry(profile: &ConnectionProfile) -> Result<PgPool> {
    let conn_str = connection_string(profile);
    let mut last_error = None;
    let mut delay = Duration::from_millis(RETRY_BASE_DELAY_MS);

    for attempt in 1..=MAX_RETRY_ATTEMPTS {
        debug!(
            connection_id = %profile.id,
            "Connection attempt {} of {}",
            attempt,
            MAX_RETRY_ATTEMPTS
        );

        let result = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&conn_str)
            .await;

        match result {
            Ok(pool) => {
                debug!(connection_id = %profile.id, "Connected");
                return Ok(pool);
            }
            Err(e) => {
                let is_transient = is_transient_error(&e);
                last_error = Some(e);

                if attempt < MAX_RETRY_ATTEMPTS && is_transient {
                    warn!(
                        "Connection attempt {} failed (transient error), retrying in {:?}",
                        attempt, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }

    Err(map_connection_error(
        last_error.expect("at least one attempt was made"),
        profile,
    ))
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info().name()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
fn convert_value(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name.to_uppercase().as_str() {
        "BOOL" | "BOOLEAN" => row
            .try_get::<Option<bool>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bool)
            .unwrap_or(Value::Null),

        "INT2" | "SMALLINT" => row
            .try_get::<Option<i16>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT4" | "INT" | "INTEGER" => row
            .try_get::<Option<i32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Int(v as i64))
            .unwrap_or(Value::Null),

        "INT8" | "BIGINT" => row
            .try_get::<Option<i64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Int)
            .unwrap_or(Value::Null),

        "FLOAT4" | "REAL" => row
            .try_get::<Option<f32>, _>(index)
            .ok()
            .flatten()
            .map(|v| Value::Float(v as f64))
            .unwrap_or(Value::Null),

        "FLOAT8" | "DOUBLE PRECISION" => row
            .try_get::<Option<f64>, _>(index)
            .ok()
            .flatten()
            .map(Value::Float)
            .unwrap_or(Value::Null),

        "BYTEA" => row
            .try_get::<Option<Vec<u8>>, _>(index)
            .ok()
            .flatten()
            .map(Value::Bytes)
            .unwrap_or(Value::Null),

        // For all other types, try to get as string
        _ => row
            .try_get::<Option<String>, _>(index)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Determines if an error is transient and worth retrying.
fn is_transient_error(error: &sqlx::Error) -> bool {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused")
        || error_str.contains("timed out")
        || error_str.contains("timeout")
        || error_str.contains("temporarily unavailable")
        || error_str.contains("connection reset")
        || error_str.contains("broken pipe")
    {
        return true;
    }

    // Authentication and database-not-found errors are not transient
    false
}

/// Maps sqlx connection errors to user-friendly messages.
fn map_connection_error(error: sqlx::Error, profile: &ConnectionProfile) -> ConduitError {
    let host = &profile.host;
    let port = profile.port;
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        ConduitError::backend(format!(
            "Cannot connect to {host}:{port}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        ConduitError::backend(format!(
            "Authentication failed for user '{}'. Check your credentials.",
            profile.user
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        ConduitError::backend(format!(
            "Database '{}' does not exist.",
            profile.schema.as_deref().unwrap_or("postgres")
        ))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        ConduitError::backend(format!(
            "Connection to {host}:{port} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        ConduitError::backend(error.to_string())
    }
}

/// Formats a query error with detail and hints if available.
fn format_query_error(error: sqlx::Error) -> String {
    match error.as_database_error() {
        Some(db_error) => {
            let mut result = String::from("ERROR: ");
            result.push_str(db_error.message());

            if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>()
            {
                if let Some(detail) = pg_error.detail() {
                    result.push_str("\n  DETAIL: ");
                    result.push_str(detail);
                }
                if let Some(hint) = pg_error.hint() {
                    result.push_str("\n  HINT: ");
                    result.push_str(hint);
                }
            }

            result
        }
        None => error.to_string(),
    }
}
