//! Document store seam.
//!
//! Everything above this module talks to the backing store through
//! [`DocumentStore`] and reads results through [`DocumentCursor`], so the
//! relational layer runs the same against the HTTP transport and the
//! in-process store.

pub mod http;
pub mod memory;

use std::collections::VecDeque;
use std::fmt;

use serde_json::Value as JsonValue;

use crate::core::{Document, DriverError, Result, Value};

pub use http::HttpStore;
pub use memory::MemoryStore;

/// Named bind variables as they go over the wire.
pub type BindVars = serde_json::Map<String, JsonValue>;

/// Per-query transport options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Documents per round trip; `None` leaves it to the store.
    pub batch_size: Option<u32>,
    /// Ask the store for the total result count up front.
    pub count: bool,
}

/// A forward-only, single-pass source of result rows.
pub trait DocumentCursor: Send {
    /// Whether another row can be pulled without blocking on an empty source.
    fn has_next(&self) -> bool;

    /// Pull the next raw result value.
    fn next_value(&mut self) -> Result<Option<Value>>;

    /// Pull the next row; rows that are not objects are rejected.
    fn next_document(&mut self) -> Result<Option<Document>> {
        match self.next_value()? {
            None => Ok(None),
            Some(Value::Object(doc)) => Ok(Some(doc)),
            Some(other) => Err(DriverError::QueryError(format!(
                "row is not a document but {}",
                other.type_name()
            ))),
        }
    }

    /// Total number of results, when the store reported one.
    fn count(&self) -> Option<u64> {
        None
    }

    /// Release server-side resources. Calling it twice is harmless.
    fn close(&mut self) -> Result<()>;
}

/// Cursor over rows already held in memory.
#[derive(Debug, Default)]
pub struct VecCursor {
    rows: VecDeque<Value>,
    count: Option<u64>,
}

impl VecCursor {
    pub fn new(documents: Vec<Document>) -> Self {
        Self::from_values(documents.into_iter().map(Value::Object).collect())
    }

    pub fn from_values(values: Vec<Value>) -> Self {
        Self {
            rows: values.into(),
            count: None,
        }
    }

    /// Report `count` through [`DocumentCursor::count`].
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }
}

impl DocumentCursor for VecCursor {
    fn has_next(&self) -> bool {
        !self.rows.is_empty()
    }

    fn next_value(&mut self) -> Result<Option<Value>> {
        Ok(self.rows.pop_front())
    }

    fn count(&self) -> Option<u64> {
        self.count
    }

    fn close(&mut self) -> Result<()> {
        self.rows.clear();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    Document,
    Edge,
}

impl CollectionKind {
    /// Table type reported by the metadata catalog.
    pub fn table_type(&self) -> &'static str {
        match self {
            Self::Document => "DOCUMENT",
            Self::Edge => "EDGES",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionInfo {
    pub name: String,
    pub kind: CollectionKind,
    pub is_system: bool,
}

impl CollectionInfo {
    pub fn new(name: impl Into<String>, kind: CollectionKind) -> Self {
        let name = name.into();
        let is_system = name.starts_with('_');
        Self {
            name,
            kind,
            is_system,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    ArangoSearch,
    SearchAlias,
}

impl ViewKind {
    pub fn table_type(&self) -> &'static str {
        match self {
            Self::ArangoSearch => "ARANGO_SEARCH",
            Self::SearchAlias => "SEARCH_ALIAS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewInfo {
    pub name: String,
    pub kind: ViewKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerVersion {
    pub server: String,
    pub version: String,
    pub license: String,
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({})", self.server, self.version, self.license)
    }
}

/// Operations the relational layer needs from a document store.
pub trait DocumentStore: Send + Sync {
    /// Run a query with named bind variables and open a cursor over its results.
    fn query(
        &self,
        database: &str,
        query: &str,
        bind_vars: &BindVars,
        options: &QueryOptions,
    ) -> Result<Box<dyn DocumentCursor>>;

    /// Up to `limit` documents of `collection` in storage order; `None` reads them all.
    fn sample_documents(
        &self,
        database: &str,
        collection: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Document>>;

    fn collections(&self, database: &str) -> Result<Vec<CollectionInfo>>;

    fn views(&self, database: &str) -> Result<Vec<ViewInfo>>;

    /// Databases the current user can access.
    fn databases(&self) -> Result<Vec<String>>;

    fn version(&self) -> Result<ServerVersion>;

    fn ping(&self) -> Result<()> {
        self.version().map(|_| ())
    }

    /// Release transport resources. Called once when the owning connection closes.
    fn shutdown(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_vec_cursor_drains_in_order() {
        let docs = vec![
            Value::document_from_json(json!({"n": 1})).unwrap(),
            Value::document_from_json(json!({"n": 2})).unwrap(),
        ];
        let mut cursor = VecCursor::new(docs);

        assert!(cursor.has_next());
        assert_eq!(cursor.next_document().unwrap().unwrap()["n"], Value::Integer(1));
        assert_eq!(cursor.next_document().unwrap().unwrap()["n"], Value::Integer(2));
        assert!(!cursor.has_next());
        assert!(cursor.next_document().unwrap().is_none());
    }

    #[test]
    fn test_scalar_row_is_rejected() {
        let mut cursor = VecCursor::from_values(vec![Value::Integer(1)]);
        let err = cursor.next_document().unwrap_err();
        assert!(matches!(err, DriverError::QueryError(_)));
    }

    #[test]
    fn test_system_collection_detection() {
        assert!(CollectionInfo::new("_users", CollectionKind::Document).is_system);
        assert!(!CollectionInfo::new("users", CollectionKind::Edge).is_system);
        assert_eq!(CollectionKind::Edge.table_type(), "EDGES");
        assert_eq!(ViewKind::SearchAlias.table_type(), "SEARCH_ALIAS");
    }
}
