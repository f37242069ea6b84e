// ============================================================================
// arango-rdbc Library
// ============================================================================

pub mod catalog;
pub mod connection;
pub mod core;
pub mod document;
pub mod result;
pub mod statement;
pub mod store;

use std::collections::HashMap;

use log::debug;

// Re-export main types for convenience
pub use catalog::DatabaseMetadata;
pub use connection::{Connection, ConnectionConfig};
pub use core::{ColumnDescriptor, Document, DriverError, Result, TypeTag, Value};
pub use document::{FromValue, SampleSize, SchemaInferenceEngine};
pub use result::{ColumnIndex, ResultMetadata, ResultTable, RowCursor};
pub use statement::{ParameterMetadata, PreparedStatement, Statement};
pub use store::{DocumentCursor, DocumentStore, HttpStore, MemoryStore};

pub const DRIVER_NAME: &str = "ArangoDB RDBC Driver";
pub const DRIVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Whether `url` is a connection string this crate handles.
pub fn accepts_url(url: &str) -> bool {
    let url = url.strip_prefix("jdbc:").unwrap_or(url);
    url.starts_with(connection::config::URL_SCHEME)
}

/// Connect over HTTP using a connection string plus extra properties.
///
/// Properties override nothing in the address: host, port and database come
/// from `url`. Everything else (credentials, timeouts, sampling) comes from
/// `properties`.
///
/// # Examples
///
/// ```ignore
/// use std::collections::HashMap;
///
/// let mut props = HashMap::new();
/// props.insert("user".to_string(), "root".to_string());
/// props.insert("password".to_string(), "secret".to_string());
///
/// let conn = arango_rdbc::connect("arangodb://localhost:8529/shop", &props)?;
/// let mut stmt = conn.create_statement()?;
/// let rows = stmt.execute_query("FOR p IN products RETURN p")?;
/// while rows.advance()? {
///     println!("{:?}", rows.get_string("name")?);
/// }
/// ```
pub fn connect(url: &str, properties: &HashMap<String, String>) -> Result<Connection> {
    debug!(
        "connect(url={}, properties={:?})",
        url,
        connection::config::redact_properties(properties)
    );
    if !accepts_url(url) {
        return Err(DriverError::ConfigurationError(format!(
            "unsupported URL '{}'",
            url
        )));
    }
    let config = ConnectionConfig::from_url(url)?.with_properties(properties);
    Connection::open(config)
}
