use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use std::time::Duration;

use log::error;

use crate::core::{DriverError, Result};
use crate::document::SampleSize;

pub const URL_SCHEME: &str = "arangodb://";
pub const SYSTEM_DATABASE: &str = "_system";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 8529;
pub const DEFAULT_SCHEMA: &str = "public";
pub const DEFAULT_METADATA_SAMPLE_SIZE: i64 = 1000;
pub const REDACTED: &str = "*REDACTED*";

pub const PROPERTY_URL: &str = "url";
pub const PROPERTY_HOST: &str = "host";
pub const PROPERTY_PORT: &str = "port";
pub const PROPERTY_DATABASE_NAME: &str = "databaseName";
pub const PROPERTY_USER: &str = "user";
pub const PROPERTY_PASSWORD: &str = "password";
pub const PROPERTY_JWT: &str = "jwt";
pub const PROPERTY_TIMEOUT: &str = "timeout";
pub const PROPERTY_MAX_CONNECTIONS: &str = "maxConnections";
pub const PROPERTY_CONNECTION_TTL: &str = "connectionTtl";
pub const PROPERTY_KEEP_ALIVE_INTERVAL: &str = "keepAliveInterval";
pub const PROPERTY_USE_SSL: &str = "useSsl";
pub const PROPERTY_VERIFY_HOST: &str = "verifyHost";
pub const PROPERTY_ACQUIRE_HOST_LIST: &str = "acquireHostList";
pub const PROPERTY_ACQUIRE_HOST_LIST_INTERVAL: &str = "acquireHostListInterval";
pub const PROPERTY_RESPONSE_QUEUE_TIME_SAMPLES: &str = "responseQueueTimeSamples";
pub const PROPERTY_CHUNK_SIZE: &str = "chunkSize";
pub const PROPERTY_SCHEMA: &str = "schema";
pub const PROPERTY_METADATA_SAMPLE_SIZE: &str = "jdbcMetadataSampleSize";

const SECRET_PROPERTIES: [&str; 2] = [PROPERTY_PASSWORD, PROPERTY_JWT];

/// Connection configuration
///
/// Built from a connection string (`arangodb://host[:port][/database]`), from
/// a property map, or with the builder methods.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    /// Database queries run against
    pub database: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Bearer token; takes precedence over user/password
    pub jwt: Option<String>,
    /// Per-request transport timeout
    pub timeout: Option<Duration>,
    /// Idle connections kept per host
    pub max_connections: Option<usize>,
    pub connection_ttl: Option<Duration>,
    pub keep_alive_interval: Option<Duration>,
    pub use_ssl: bool,
    /// When false, TLS certificates are not verified
    pub verify_host: bool,
    // Cluster and VST options below are carried for completeness; the HTTP
    // transport has no use for them.
    pub acquire_host_list: bool,
    pub acquire_host_list_interval: Option<Duration>,
    pub response_queue_time_samples: Option<u32>,
    pub chunk_size: Option<u32>,
    /// Logical schema label reported by the catalog
    pub schema: String,
    /// Documents sampled per collection for column inference; 0 or less means all
    pub metadata_sample_size: i64,
}

impl ConnectionConfig {
    /// Create a new connection configuration
    pub fn new(host: &str) -> Self {
        Self {
            host: host.to_string(),
            port: DEFAULT_PORT,
            database: SYSTEM_DATABASE.to_string(),
            user: None,
            password: None,
            jwt: None,
            timeout: None,
            max_connections: None,
            connection_ttl: None,
            keep_alive_interval: None,
            use_ssl: false,
            verify_host: true,
            acquire_host_list: false,
            acquire_host_list_interval: None,
            response_queue_time_samples: None,
            chunk_size: None,
            schema: DEFAULT_SCHEMA.to_string(),
            metadata_sample_size: DEFAULT_METADATA_SAMPLE_SIZE,
        }
    }

    /// Set the database name
    pub fn database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    /// Set the port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set basic credentials
    pub fn credentials(mut self, user: &str, password: &str) -> Self {
        self.user = Some(user.to_string());
        self.password = Some(password.to_string());
        self
    }

    pub fn jwt(mut self, token: &str) -> Self {
        self.jwt = Some(token.to_string());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn use_ssl(mut self, use_ssl: bool) -> Self {
        self.use_ssl = use_ssl;
        self
    }

    pub fn schema(mut self, schema: &str) -> Self {
        self.schema = schema.to_string();
        self
    }

    pub fn metadata_sample_size(mut self, size: i64) -> Self {
        self.metadata_sample_size = size;
        self
    }

    /// Parse from connection string
    ///
    /// Format: `arangodb://host[:port][/database]`, optionally prefixed with
    /// `jdbc:`. Port defaults to 8529 and database to `_system`.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let config = ConnectionConfig::from_url("arangodb://db.local:8530/shop")?;
    /// ```
    pub fn from_url(url: &str) -> Result<Self> {
        let rest = url
            .strip_prefix("jdbc:")
            .unwrap_or(url)
            .strip_prefix(URL_SCHEME)
            .ok_or_else(|| {
                DriverError::ConfigurationError(format!(
                    "invalid URL '{}', expected {}host[:port][/databaseName]",
                    url, URL_SCHEME
                ))
            })?;

        let (host_port, database) = match rest.split_once('/') {
            Some((host_port, db)) => (host_port, db.trim_end_matches('/')),
            None => (rest, ""),
        };

        let (host, port) = match host_port.split_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    DriverError::ConfigurationError(format!("invalid port '{}' in URL", port))
                })?;
                (host, port)
            }
            None => (host_port, DEFAULT_PORT),
        };

        if host.is_empty() {
            return Err(DriverError::ConfigurationError(format!(
                "missing host in URL '{}'",
                url
            )));
        }

        let database = if database.is_empty() {
            SYSTEM_DATABASE
        } else {
            database
        };

        Ok(Self::new(host).port(port).database(database))
    }

    /// Build from a property map.
    ///
    /// `url` supplies host, port and database when present; otherwise the
    /// `host`, `port` and `databaseName` properties do.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        let base = match properties.get(PROPERTY_URL) {
            Some(url) => Self::from_url(url)?,
            None => {
                let host = properties
                    .get(PROPERTY_HOST)
                    .map(String::as_str)
                    .unwrap_or(DEFAULT_HOST);
                let port = parse_property(properties, PROPERTY_PORT).unwrap_or(DEFAULT_PORT);
                let database = properties
                    .get(PROPERTY_DATABASE_NAME)
                    .map(String::as_str)
                    .unwrap_or(SYSTEM_DATABASE);
                Self::new(host).port(port).database(database)
            }
        };
        Ok(base.with_properties(properties))
    }

    /// Apply every non-address property. Malformed numbers and booleans are
    /// logged and leave the option at its current value.
    pub fn with_properties(mut self, properties: &HashMap<String, String>) -> Self {
        if let Some(user) = properties.get(PROPERTY_USER) {
            self.user = Some(user.clone());
        }
        if let Some(password) = properties.get(PROPERTY_PASSWORD) {
            self.password = Some(password.clone());
        }
        if let Some(jwt) = properties.get(PROPERTY_JWT) {
            self.jwt = Some(jwt.clone());
        }

        let millis = |key: &str| parse_property::<u64>(properties, key).map(Duration::from_millis);
        self.timeout = millis(PROPERTY_TIMEOUT).or(self.timeout);
        self.connection_ttl = millis(PROPERTY_CONNECTION_TTL).or(self.connection_ttl);
        self.acquire_host_list_interval =
            millis(PROPERTY_ACQUIRE_HOST_LIST_INTERVAL).or(self.acquire_host_list_interval);
        self.keep_alive_interval = parse_property::<u64>(properties, PROPERTY_KEEP_ALIVE_INTERVAL)
            .map(Duration::from_secs)
            .or(self.keep_alive_interval);

        self.max_connections =
            parse_property(properties, PROPERTY_MAX_CONNECTIONS).or(self.max_connections);
        self.response_queue_time_samples =
            parse_property(properties, PROPERTY_RESPONSE_QUEUE_TIME_SAMPLES)
                .or(self.response_queue_time_samples);
        self.chunk_size = parse_property(properties, PROPERTY_CHUNK_SIZE).or(self.chunk_size);

        self.use_ssl = parse_flag(properties, PROPERTY_USE_SSL).unwrap_or(self.use_ssl);
        self.verify_host = parse_flag(properties, PROPERTY_VERIFY_HOST).unwrap_or(self.verify_host);
        self.acquire_host_list =
            parse_flag(properties, PROPERTY_ACQUIRE_HOST_LIST).unwrap_or(self.acquire_host_list);

        if let Some(schema) = properties.get(PROPERTY_SCHEMA) {
            self.schema = schema.clone();
        }
        self.metadata_sample_size = parse_property(properties, PROPERTY_METADATA_SAMPLE_SIZE)
            .unwrap_or(self.metadata_sample_size);

        self
    }

    /// Convert to connection string (credentials are never part of it)
    pub fn to_url(&self) -> String {
        format!("{}{}:{}/{}", URL_SCHEME, self.host, self.port, self.database)
    }

    /// Base address of the HTTP API.
    pub fn endpoint(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn sample_size(&self) -> SampleSize {
        SampleSize::from_setting(self.metadata_sample_size)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(DriverError::ConfigurationError("host cannot be empty".into()));
        }

        if self.port == 0 {
            return Err(DriverError::ConfigurationError("port must be > 0".into()));
        }

        if self.database.is_empty() {
            return Err(DriverError::ConfigurationError("database name cannot be empty".into()));
        }

        if self.max_connections == Some(0) {
            return Err(DriverError::ConfigurationError("maxConnections must be > 0".into()));
        }

        if self.password.is_some() && self.user.is_none() && self.jwt.is_none() {
            return Err(DriverError::ConfigurationError(
                "password given without user".into(),
            ));
        }

        Ok(())
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_HOST)
    }
}

/// Copy of `properties` safe to log: secrets are replaced by `*REDACTED*`.
pub fn redact_properties(properties: &HashMap<String, String>) -> BTreeMap<String, String> {
    properties
        .iter()
        .map(|(key, value)| {
            let shown = if SECRET_PROPERTIES.contains(&key.as_str()) {
                REDACTED.to_string()
            } else {
                value.clone()
            };
            (key.clone(), shown)
        })
        .collect()
}

fn parse_property<T: FromStr>(properties: &HashMap<String, String>, key: &str) -> Option<T> {
    let raw = properties.get(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            error!("Invalid value for {}: {}", key, raw);
            None
        }
    }
}

fn parse_flag(properties: &HashMap<String, String>, key: &str) -> Option<bool> {
    let raw = properties.get(key)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => {
            error!("Invalid value for {}: {}", key, raw);
            None
        }
    }
}
