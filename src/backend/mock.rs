//! Mock backends for testing.
//!
//! Provides an in-memory backend implementation producing deterministic
//! sample rows, and a failing variant for error-path tests.

use super::{ColumnInfo, QueryBackend, QueryLimits, Tabular, Value};
use crate::classify::{classify, QueryType};
use crate::error::{ConduitError, Result};
use crate::registry::ConnectionProfile;
use async_trait::async_trait;
use std::time::Duration;

/// A mock backend that fabricates deterministic results.
///
/// SELECT statements yield `row_count` sample rows over a fixed column set;
/// other statements yield an empty result. An optional delay simulates a
/// slow backend for cancellation tests.
pub struct MockBackend {
    columns: Vec<ColumnInfo>,
    row_count: usize,
    delay: Option<Duration>,
}

impl MockBackend {
    /// Creates a mock backend returning three sample rows per SELECT.
    pub fn new() -> Self {
        Self {
            columns: vec![
                ColumnInfo::new("id", "INTEGER"),
                ColumnInfo::new("name", "NVARCHAR"),
                ColumnInfo::new("amount", "DOUBLE"),
            ],
            row_count: 3,
            delay: None,
        }
    }

    /// Overrides the number of rows produced for SELECT statements.
    pub fn with_row_count(mut self, row_count: usize) -> Self {
        self.row_count = row_count;
        self
    }

    /// Overrides the column set of produced results.
    pub fn with_columns(mut self, columns: Vec<ColumnInfo>) -> Self {
        self.columns = columns;
        self
    }

    /// Adds an artificial delay before responding.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn sample_row(&self, index: usize) -> Vec<Value> {
        self.columns
            .iter()
            .enumerate()
            .map(|(col, info)| match info.data_type.as_str() {
                "INTEGER" => Value::Int((index + 1) as i64),
                "DOUBLE" => Value::Float((index + 1) as f64 * 2.5),
                _ => Value::String(format!("record-{}-{}", index + 1, col + 1)),
            })
            .collect()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryBackend for MockBackend {
    async fn run_query(
        &self,
        _profile: &ConnectionProfile,
        sql: &str,
        _limits: &QueryLimits,
    ) -> Result<Tabular> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if classify(sql) == QueryType::Select {
            let rows = (0..self.row_count).map(|i| self.sample_row(i)).collect();
            Ok(Tabular::with_data(self.columns.clone(), rows))
        } else {
            Ok(Tabular::default())
        }
    }
}

/// A backend that fails every dispatch with a fixed message.
pub struct FailingBackend {
    message: String,
}

impl FailingBackend {
    /// Creates a failing backend with the given error message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl QueryBackend for FailingBackend {
    async fn run_query(
        &self,
        _profile: &ConnectionProfile,
        _sql: &str,
        _limits: &QueryLimits,
    ) -> Result<Tabular> {
        Err(ConduitError::backend(self.message.clone()))
    }
}
