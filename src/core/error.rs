use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    /// Malformed connection string or configuration, raised before any network attempt.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// The store is unreachable or rejected the credentials.
    #[error("Connectivity error: {0}")]
    ConnectivityError(String),

    /// The operation has no equivalent in the document store.
    #[error("Unsupported operation: {0}")]
    CapabilityError(String),

    #[error("Parameter binding error: {0}")]
    ParameterBindingError(String),

    /// A textual value could not be parsed into the requested type.
    #[error("Format error: {0}")]
    FormatError(String),

    #[error("Metadata retrieval error: {0}")]
    MetadataRetrievalError(String),

    /// Access to a closed resource, or to a row that is not there.
    #[error("State error: {0}")]
    StateError(String),

    /// The store failed or rejected a query.
    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Column error: {0}")]
    ColumnError(String),
}

pub type Result<T> = std::result::Result<T, DriverError>;

impl DriverError {
    pub(crate) fn closed(what: &str) -> Self {
        Self::StateError(format!("{} is closed", what))
    }

    pub(crate) fn unsupported(operation: &str) -> Self {
        Self::CapabilityError(format!("{} is not supported", operation))
    }

    /// Errors a caller may fix and retry without reconnecting.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ParameterBindingError(_) | Self::FormatError(_) | Self::MetadataRetrievalError(_)
        )
    }
}

impl From<reqwest::Error> for DriverError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::QueryError(format!("malformed response: {}", err))
        } else {
            Self::ConnectivityError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DriverError {
    fn from(err: serde_json::Error) -> Self {
        Self::QueryError(format!("malformed response: {}", err))
    }
}
