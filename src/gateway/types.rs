//! Result and option types for the execution gateway.

use crate::backend::{ColumnInfo, Row};
use crate::classify::QueryType;
use crate::error::ConduitError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default advisory timeout for a single execution.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Default hard cap on returned rows.
pub const DEFAULT_MAX_ROWS: usize = 1_000;

/// Execution options with documented defaults.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Advisory upper bound on execution time, forwarded to the backend.
    pub timeout_ms: u64,

    /// Hard cap on returned rows; excess rows are truncated with a warning.
    pub max_rows: usize,

    /// Whether column type metadata accompanies results.
    pub include_metadata: bool,

    /// Whether batch execution keeps going past a failed statement.
    pub continue_on_error: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_TIMEOUT_MS,
            max_rows: DEFAULT_MAX_ROWS,
            include_metadata: true,
            continue_on_error: false,
        }
    }
}

impl ExecuteOptions {
    /// Sets the advisory timeout in milliseconds.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Sets the maximum row count.
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    /// Sets whether column type metadata accompanies results.
    pub fn with_metadata(mut self, include_metadata: bool) -> Self {
        self.include_metadata = include_metadata;
        self
    }

    /// Sets whether batch execution continues past failures.
    pub fn with_continue_on_error(mut self, continue_on_error: bool) -> Self {
        self.continue_on_error = continue_on_error;
        self
    }
}

/// Error details carried inside a failed [`QueryResult`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryError {
    /// Short machine-readable code.
    pub code: String,

    /// Human-readable message.
    pub message: String,

    /// Optional further detail.
    pub detail: Option<String>,
}

impl QueryError {
    /// Creates a new query error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            detail: None,
        }
    }

    /// Attaches further detail.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

impl From<ConduitError> for QueryError {
    fn from(error: ConduitError) -> Self {
        let code = error.code();
        let message = match error {
            ConduitError::Validation(m)
            | ConduitError::NotFound(m)
            | ConduitError::Backend(m)
            | ConduitError::Storage(m)
            | ConduitError::Config(m)
            | ConduitError::Internal(m) => m,
        };
        Self::new(code, message)
    }
}

/// Metadata attached to a successful result.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultMetadata {
    /// Warnings raised while shaping the result (e.g. truncation).
    pub warnings: Vec<String>,

    /// Whether the row list was cut down to the configured maximum.
    pub truncated: bool,
}

/// The outcome of one execution attempt. Immutable after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Identifier assigned to this execution.
    pub query_id: String,

    /// Whether the execution succeeded.
    pub success: bool,

    /// Classified statement type.
    pub query_type: QueryType,

    /// Execution time in milliseconds.
    pub elapsed_ms: u64,

    /// Number of returned rows; always equals `rows.len()`.
    pub row_count: usize,

    /// Column metadata, aligned with every row.
    pub columns: Vec<ColumnInfo>,

    /// Returned rows.
    pub rows: Vec<Row>,

    /// Result metadata.
    pub metadata: ResultMetadata,

    /// Error details for failed executions.
    pub error: Option<QueryError>,
}

impl QueryResult {
    /// Builds a successful result from shaped tabular data.
    pub fn success(
        query_id: String,
        query_type: QueryType,
        elapsed_ms: u64,
        columns: Vec<ColumnInfo>,
        rows: Vec<Row>,
        metadata: ResultMetadata,
    ) -> Self {
        Self {
            query_id,
            success: true,
            query_type,
            elapsed_ms,
            row_count: rows.len(),
            columns,
            rows,
            metadata,
            error: None,
        }
    }

    /// Builds a failed result carrying the given error.
    pub fn failure(
        query_id: String,
        query_type: QueryType,
        elapsed_ms: u64,
        error: QueryError,
    ) -> Self {
        Self {
            query_id,
            success: false,
            query_type,
            elapsed_ms,
            row_count: 0,
            columns: Vec::new(),
            rows: Vec::new(),
            metadata: ResultMetadata::default(),
            error: Some(error),
        }
    }

    /// Returns true if the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Descriptive snapshot of an in-flight execution.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveQuery {
    /// Query identifier, usable with cancellation.
    pub query_id: String,

    /// Connection the query is running against.
    pub connection_id: String,

    /// The SQL text being executed.
    pub sql: String,

    /// When the execution started.
    pub started_at: DateTime<Utc>,
}

/// Advisory cost estimate for a statement.
///
/// Diagnostic only; never accurate enough for correctness decisions.
#[derive(Debug, Clone, Serialize)]
pub struct PlanEstimate {
    /// Estimated execution cost in arbitrary units.
    pub estimated_cost: f64,

    /// Estimated number of produced rows.
    pub estimated_rows: u64,

    /// Logical operations in execution order.
    pub operations: Vec<String>,
}
