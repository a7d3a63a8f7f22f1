//! Generic table access — the data seam between the console and the hosted
//! backend's row store.
//!
//! DESIGN
//! ======
//! The profile resolver (and, outside this crate, the CRUD screens) only ever
//! need three operations: read one row by key, insert a row, and update rows
//! matching a key. `TableStore` closes that surface behind a trait so tests
//! and the REST implementation are interchangeable.
//!
//! ERROR HANDLING
//! ==============
//! "Not found" is a `None` result, not an error. Transport, permission,
//! uniqueness-conflict, and malformed-row failures are typed so callers can
//! distinguish "row absent" from "could not ask".

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

/// Failures from the row store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Network failure or unusable response.
    #[error("store transport error: {0}")]
    Transport(String),
    /// Unique-constraint violation on insert.
    #[error("unique conflict in {table}")]
    Conflict { table: String },
    /// The backend rejected the request for this table (row-level security).
    #[error("permission denied on {table}")]
    Denied { table: String },
    /// An update matched no rows.
    #[error("no matching row in {table}")]
    Missing { table: String },
    /// The row came back but could not be decoded.
    #[error("malformed row from {table}: {detail}")]
    Malformed { table: String, detail: String },
}

/// Row read/insert/update by table name and key column.
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Fetch at most one row where `column = value`.
    async fn select_one(&self, table: &str, column: &str, value: &str) -> Result<Option<Value>, StoreError>;

    /// Insert a row, returning the stored representation.
    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError>;

    /// Update rows where `column = value` with the given changes, returning
    /// the first updated row.
    async fn update_where(&self, table: &str, column: &str, value: &str, changes: Value) -> Result<Value, StoreError>;
}

// =============================================================================
// IN-MEMORY STORE
// =============================================================================

/// In-memory `TableStore` used by tests and local tooling.
///
/// Unique columns registered via [`MemoryTableStore::with_unique`] reject
/// duplicate inserts with [`StoreError::Conflict`], mirroring the backend's
/// unique-key behavior so conflict-handling paths are exercisable offline.
#[derive(Debug, Default)]
pub struct MemoryTableStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    unique: Vec<(String, String)>,
}

impl MemoryTableStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `column` as unique within `table`.
    #[must_use]
    pub fn with_unique(mut self, table: &str, column: &str) -> Self {
        self.unique.push((table.to_owned(), column.to_owned()));
        self
    }

    /// Number of rows currently stored in `table`.
    pub async fn row_count(&self, table: &str) -> usize {
        let tables = self.tables.lock().await;
        tables.get(table).map_or(0, Vec::len)
    }
}

fn field_matches(row: &Value, column: &str, value: &str) -> bool {
    match row.get(column) {
        Some(Value::String(s)) => s == value,
        Some(other) => other.to_string() == value,
        None => false,
    }
}

#[async_trait]
impl TableStore for MemoryTableStore {
    async fn select_one(&self, table: &str, column: &str, value: &str) -> Result<Option<Value>, StoreError> {
        let tables = self.tables.lock().await;
        let rows = tables.get(table);
        Ok(rows.and_then(|rows| rows.iter().find(|r| field_matches(r, column, value)).cloned()))
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError> {
        let mut tables = self.tables.lock().await;
        let rows = tables.entry(table.to_owned()).or_default();

        for (unique_table, column) in &self.unique {
            if unique_table != table {
                continue;
            }
            let Some(candidate) = row.get(column).and_then(Value::as_str) else {
                continue;
            };
            if rows.iter().any(|r| field_matches(r, column, candidate)) {
                return Err(StoreError::Conflict { table: table.to_owned() });
            }
        }

        rows.push(row.clone());
        Ok(row)
    }

    async fn update_where(&self, table: &str, column: &str, value: &str, changes: Value) -> Result<Value, StoreError> {
        let mut tables = self.tables.lock().await;
        let rows = tables
            .get_mut(table)
            .ok_or_else(|| StoreError::Missing { table: table.to_owned() })?;

        let row = rows
            .iter_mut()
            .find(|r| field_matches(r, column, value))
            .ok_or_else(|| StoreError::Missing { table: table.to_owned() })?;

        if let (Value::Object(target), Value::Object(patch)) = (&mut *row, &changes) {
            for (key, val) in patch {
                target.insert(key.clone(), val.clone());
            }
        }
        Ok(row.clone())
    }
}

// =============================================================================
// REST STORE
// =============================================================================

/// `TableStore` backed by the hosted backend's REST rows endpoint.
///
/// Requests carry the project API key; when a user session is active the
/// bearer token is forwarded as well so row-level security applies to the
/// signed-in operator rather than the anonymous role.
pub struct RestTableStore {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    bearer: std::sync::RwLock<Option<String>>,
}

impl RestTableStore {
    #[must_use]
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key: api_key.to_owned(),
            bearer: std::sync::RwLock::new(None),
        }
    }

    /// Set or clear the forwarded bearer token for subsequent requests.
    pub fn set_bearer(&self, token: Option<String>) {
        let mut bearer = self
            .bearer
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *bearer = token;
    }

    fn rows_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let req = req.header("apikey", &self.api_key);
        let bearer = self
            .bearer
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match bearer.as_deref() {
            Some(token) => req.header("Authorization", format!("Bearer {token}")),
            None => req,
        }
    }

    fn map_status(table: &str, status: reqwest::StatusCode, body: &str) -> StoreError {
        match status.as_u16() {
            401 | 403 => StoreError::Denied { table: table.to_owned() },
            409 => StoreError::Conflict { table: table.to_owned() },
            _ => StoreError::Transport(format!("{status}: {body}")),
        }
    }

    async fn read_rows(table: &str, resp: reqwest::Response) -> Result<Vec<Value>, StoreError> {
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(Self::map_status(table, status, &body));
        }
        serde_json::from_str::<Vec<Value>>(&body).map_err(|e| StoreError::Malformed {
            table: table.to_owned(),
            detail: e.to_string(),
        })
    }
}

#[async_trait]
impl TableStore for RestTableStore {
    async fn select_one(&self, table: &str, column: &str, value: &str) -> Result<Option<Value>, StoreError> {
        let url = format!("{}?{column}=eq.{value}&limit=1", self.rows_url(table));
        let resp = self
            .apply_auth(self.http.get(&url))
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let rows = Self::read_rows(table, resp).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value, StoreError> {
        let resp = self
            .apply_auth(self.http.post(self.rows_url(table)))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let rows = Self::read_rows(table, resp).await?;
        rows.into_iter().next().ok_or_else(|| StoreError::Malformed {
            table: table.to_owned(),
            detail: "insert returned no representation".to_owned(),
        })
    }

    async fn update_where(&self, table: &str, column: &str, value: &str, changes: Value) -> Result<Value, StoreError> {
        let url = format!("{}?{column}=eq.{value}", self.rows_url(table));
        let resp = self
            .apply_auth(self.http.patch(&url))
            .header("Prefer", "return=representation")
            .json(&changes)
            .send()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        let rows = Self::read_rows(table, resp).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::Missing { table: table.to_owned() })
    }
}

#[cfg(test)]
#[path = "table_test.rs"]
mod tests;
