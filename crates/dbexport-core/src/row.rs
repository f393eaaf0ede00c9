use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::task::ExportScope;

/// A single typed scalar produced by the row source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    DateTime(DateTime<Utc>),
    Bytes(Vec<u8>),
}

/// One entry of the ordered column schema returned alongside rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: String,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Values in source column order.
pub type Row = Vec<Value>;

/// Lazy, finite, non-restartable stream of rows for one query.
///
/// May fail mid-iteration with a connection or query error.
#[async_trait]
pub trait RowSource: Send {
    fn columns(&self) -> &[Column];

    /// Next batch of rows, or `None` once the stream is exhausted.
    async fn next_batch(&mut self) -> Result<Option<Vec<Row>>>;
}

/// Gateway to the source databases. Queries handed to it have already been
/// validated and size-bounded upstream.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Open a row stream. `scope` decides whether the page boundary is kept
    /// or the query is re-issued for the full result.
    async fn open(
        &self,
        database: &str,
        sql: &str,
        scope: ExportScope,
    ) -> Result<Box<dyn RowSource>>;

    /// Total row count for the query, when the source can answer cheaply.
    async fn count_rows(&self, database: &str, sql: &str) -> Result<Option<u64>>;

    /// Bounded sample of leading rows, with the column schema.
    async fn sample(
        &self,
        database: &str,
        sql: &str,
        limit: usize,
    ) -> Result<(Vec<Column>, Vec<Row>)>;
}

/// Verdict of the external SQL safety validator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub is_select_only: bool,
    pub rewritten_sql: String,
    pub error: Option<String>,
}

/// External statement-type checker and LIMIT injector. Consulted once at
/// submission time; its rewritten SQL is trusted thereafter.
pub trait SqlValidator: Send + Sync {
    fn validate(&self, sql: &str) -> ValidationOutcome;
}
