//! Backend abstraction for query dispatch.
//!
//! Provides a trait-based interface for execution backends, allowing the
//! gateway to dispatch queries without knowing wire-level details.

mod mock;
mod postgres;
mod types;

pub use mock::{FailingBackend, MockBackend};
pub use postgres::PostgresBackend;
pub use types::{ColumnInfo, Row, Tabular, Value};

use crate::error::Result;
use crate::registry::ConnectionProfile;
use async_trait::async_trait;

/// Caller-supplied bounds forwarded to the backend with each dispatch.
///
/// The timeout is an upper bound the backend is expected to honor; the row
/// limit is advisory here and enforced again by the gateway on the returned
/// rows.
#[derive(Debug, Clone, Copy)]
pub struct QueryLimits {
    /// Maximum execution time in milliseconds.
    pub timeout_ms: u64,

    /// Maximum number of rows the caller will keep.
    pub max_rows: usize,
}

/// Trait defining the interface for execution backends.
///
/// The gateway treats implementations as opaque async collaborators; errors
/// surface as `ConduitError::Backend`.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    /// Executes a SQL statement against the target described by `profile`
    /// and returns the tabular result.
    async fn run_query(
        &self,
        profile: &ConnectionProfile,
        sql: &str,
        limits: &QueryLimits,
    ) -> Result<Tabular>;
}
