//! Generic record-oriented boundary to the backing data store.
//!
//! Records are JSON objects keyed by column name. The note repository is the
//! only typed layer on top; backends only know tables, equality filters and
//! a single ordering column, which is what a managed relational REST service
//! exposes.

mod embedded;
mod query;
mod rest;

pub use embedded::EmbeddedStore;
pub use query::{Filter, Order, Query};
pub use rest::RestStore;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

use crate::object_store::ObjectStoreError;
use crate::storage::DatabaseError;

/// A single row, keyed by column name.
pub type Record = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Notes,
    Subjects,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Notes => "notes",
            Table::Subjects => "subjects",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },
    #[error("File storage error: {0}")]
    Blob(#[from] ObjectStoreError),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Invalid {table} record: {message}")]
    InvalidRecord { table: Table, message: String },
    #[error("Replication error: {0}")]
    Replication(String),
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Transient failures a caller may simply retry.
    pub fn is_unavailable(&self) -> bool {
        match self {
            StoreError::Unavailable(_) | StoreError::Request(_) => true,
            StoreError::Backend { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Abstraction over the record store backends.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Rows of `table` matching every filter, in the requested order.
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Record>, StoreError>;

    /// Insert one row and return it as persisted, server defaults included.
    async fn insert(&self, table: Table, record: Record) -> Result<Record, StoreError>;

    /// Merge `patch` into every row matching `filters`; returns the updated rows.
    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Record,
    ) -> Result<Vec<Record>, StoreError>;
}

/// Serialize a typed row into a record.
pub fn to_record<T: Serialize>(table: Table, value: &T) -> Result<Record, StoreError> {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::InvalidRecord {
            table,
            message: format!("expected an object, got {other}"),
        }),
        Err(e) => Err(StoreError::InvalidRecord {
            table,
            message: e.to_string(),
        }),
    }
}

/// Deserialize a record into a typed row.
pub fn from_record<T: DeserializeOwned>(table: Table, record: Record) -> Result<T, StoreError> {
    serde_json::from_value(serde_json::Value::Object(record)).map_err(|e| {
        StoreError::InvalidRecord {
            table,
            message: e.to_string(),
        }
    })
}
