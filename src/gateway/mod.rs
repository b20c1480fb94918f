//! SQL execution gateway.
//!
//! Orchestrates validation, classification, dispatch to a backend,
//! enforcement of row limits, result shaping, and history recording, and
//! tracks in-flight queries so they can be listed and cancelled.
//!
//! Execution failures never surface as `Err`: `execute` always returns a
//! [`QueryResult`], with failures carried inside it, so batch callers can
//! inspect uniform result objects.

mod types;

pub use types::{
    ActiveQuery, ExecuteOptions, PlanEstimate, QueryError, QueryResult, ResultMetadata,
    DEFAULT_MAX_ROWS, DEFAULT_TIMEOUT_MS,
};

use crate::backend::{QueryBackend, QueryLimits, Tabular};
use crate::classify::{classify, QueryType};
use crate::error::{ConduitError, Result};
use crate::history::{HistoryEntry, HistoryStore};
use crate::registry::ConnectionRegistry;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

struct ActiveHandle {
    info: ActiveQuery,
    token: CancellationToken,
}

/// The execution gateway, composed from its collaborators.
pub struct Gateway {
    registry: Arc<ConnectionRegistry>,
    history: Arc<HistoryStore>,
    backend: Arc<dyn QueryBackend>,
    active: Mutex<HashMap<String, ActiveHandle>>,
}

impl Gateway {
    /// Creates a gateway over the given registry, history store, and backend.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        history: Arc<HistoryStore>,
        backend: Arc<dyn QueryBackend>,
    ) -> Self {
        Self {
            registry,
            history,
            backend,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Executes a single statement against the named connection.
    ///
    /// Every attempt, successful or not, is recorded to history
    /// (best-effort) and yields a [`QueryResult`].
    pub async fn execute(
        &self,
        connection_id: &str,
        sql: &str,
        options: &ExecuteOptions,
    ) -> QueryResult {
        let query_id = Uuid::new_v4().to_string();
        let query_type = classify(sql);
        let started = Instant::now();

        debug!(%query_id, connection_id, %query_type, "Dispatching query");
        let outcome = self
            .dispatch(&query_id, connection_id, sql, options)
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(tabular) => shape_result(query_id, query_type, elapsed_ms, tabular, options),
            Err(error) => {
                info!(code = %error.code, message = %error.message, "Query failed");
                QueryResult::failure(query_id, query_type, elapsed_ms, error)
            }
        };

        // Best-effort: the history store logs its own persistence failures
        self.history
            .append(history_entry(connection_id, sql, &result))
            .await;

        result
    }

    /// Validates, tracks, and dispatches one statement to the backend,
    /// racing it against cancellation.
    async fn dispatch(
        &self,
        query_id: &str,
        connection_id: &str,
        sql: &str,
        options: &ExecuteOptions,
    ) -> std::result::Result<Tabular, QueryError> {
        let profile = self
            .registry
            .get(connection_id)
            .await
            .map_err(|_| QueryError::new("not_found", "Instance not found"))?;

        if sql.trim().is_empty() {
            return Err(QueryError::new("validation", "SQL query is required"));
        }

        let token = CancellationToken::new();
        self.track(query_id, connection_id, sql, token.clone());

        let limits = QueryLimits {
            timeout_ms: options.timeout_ms,
            max_rows: options.max_rows,
        };

        let outcome = tokio::select! {
            _ = token.cancelled() => Err(QueryError::new("cancelled", "Query was cancelled")),
            result = self.backend.run_query(&profile, sql, &limits) => {
                result.map_err(QueryError::from)
            }
        };

        self.untrack(query_id);
        outcome
    }

    /// Executes statements strictly in order.
    ///
    /// Stops after the first failed statement unless
    /// `options.continue_on_error` is set, in which case every statement runs
    /// and the returned list matches the input length.
    pub async fn execute_batch(
        &self,
        connection_id: &str,
        statements: &[String],
        options: &ExecuteOptions,
    ) -> Vec<QueryResult> {
        let mut results = Vec::with_capacity(statements.len());

        for sql in statements {
            let result = self.execute(connection_id, sql, options).await;
            let failed = !result.success;
            results.push(result);

            if failed && !options.continue_on_error {
                break;
            }
        }

        results
    }

    /// Cancels an in-flight query, returning whether one was cancelled.
    ///
    /// The gateway stops waiting for the result; the backend's own work is
    /// not guaranteed to halt.
    pub fn cancel(&self, query_id: &str) -> bool {
        let handle = self
            .active
            .lock()
            .expect("active query lock poisoned")
            .remove(query_id);

        match handle {
            Some(handle) => {
                info!(%query_id, "Cancelling query");
                handle.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Lists snapshots of all in-flight queries.
    pub fn active_queries(&self) -> Vec<ActiveQuery> {
        let active = self.active.lock().expect("active query lock poisoned");
        let mut queries: Vec<ActiveQuery> = active.values().map(|h| h.info.clone()).collect();
        queries.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        queries
    }

    /// Returns an advisory cost estimate for a statement.
    ///
    /// Diagnostic only: the estimate is fabricated from the statement text
    /// and must never drive correctness decisions.
    pub async fn execution_plan(&self, connection_id: &str, sql: &str) -> Result<PlanEstimate> {
        self.registry
            .get(connection_id)
            .await
            .map_err(|_| ConduitError::not_found("Instance not found"))?;

        if sql.trim().is_empty() {
            return Err(ConduitError::validation("SQL query is required"));
        }

        let filtered = sql.to_uppercase().contains("WHERE");
        let estimated_rows: u64 = if filtered { 100 } else { 1_000 };

        Ok(PlanEstimate {
            estimated_cost: estimated_rows as f64 / 10.0,
            estimated_rows,
            operations: vec![
                "TABLE SCAN".to_string(),
                "FILTER".to_string(),
                "PROJECTION".to_string(),
            ],
        })
    }

    fn track(&self, query_id: &str, connection_id: &str, sql: &str, token: CancellationToken) {
        let handle = ActiveHandle {
            info: ActiveQuery {
                query_id: query_id.to_string(),
                connection_id: connection_id.to_string(),
                sql: sql.to_string(),
                started_at: Utc::now(),
            },
            token,
        };
        self.active
            .lock()
            .expect("active query lock poisoned")
            .insert(query_id.to_string(), handle);
    }

    fn untrack(&self, query_id: &str) {
        self.active
            .lock()
            .expect("active query lock poisoned")
            .remove(query_id);
    }
}

/// Applies the row limit and metadata option to raw backend output.
fn shape_result(
    query_id: String,
    query_type: QueryType,
    elapsed_ms: u64,
    tabular: Tabular,
    options: &ExecuteOptions,
) -> QueryResult {
    let total = tabular.rows.len();
    let mut rows = tabular.rows;
    let mut columns = tabular.columns;
    let mut metadata = ResultMetadata::default();

    if total > options.max_rows {
        rows.truncate(options.max_rows);
        metadata.truncated = true;
        metadata.warnings.push(format!(
            "Result truncated to {} of {} rows",
            options.max_rows, total
        ));
    }

    if !options.include_metadata {
        for column in &mut columns {
            column.data_type.clear();
        }
    }

    QueryResult::success(query_id, query_type, elapsed_ms, columns, rows, metadata)
}

fn history_entry(connection_id: &str, sql: &str, result: &QueryResult) -> HistoryEntry {
    HistoryEntry {
        id: result.query_id.clone(),
        connection_id: connection_id.to_string(),
        sql: sql.to_string(),
        query_type: result.query_type,
        success: result.success,
        row_count: result.row_count,
        elapsed_ms: result.elapsed_ms,
        executed_at: Utc::now(),
        error: result.error.as_ref().map(|e| e.message.clone()),
    }
}
