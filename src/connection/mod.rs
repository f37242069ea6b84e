pub mod config;

use std::sync::{Arc, RwLock};

use log::{debug, info};

use crate::catalog::DatabaseMetadata;
use crate::core::lifecycle::CloseFlag;
use crate::core::{DriverError, Result};
use crate::statement::{PreparedStatement, Statement};
use crate::store::{DocumentStore, HttpStore};
pub use config::ConnectionConfig;

/// State a connection shares with everything created from it.
#[derive(Clone)]
pub(crate) struct Session {
    store: Arc<dyn DocumentStore>,
    database: Arc<RwLock<String>>,
    schema: Arc<RwLock<String>>,
}

impl Session {
    fn new(store: Arc<dyn DocumentStore>, database: &str, schema: &str) -> Self {
        Self {
            store,
            database: Arc::new(RwLock::new(database.to_string())),
            schema: Arc::new(RwLock::new(schema.to_string())),
        }
    }

    pub(crate) fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub(crate) fn database(&self) -> Result<String> {
        read_shared(&self.database)
    }

    pub(crate) fn schema(&self) -> Result<String> {
        read_shared(&self.schema)
    }
}

fn read_shared(slot: &RwLock<String>) -> Result<String> {
    slot.read()
        .map(|value| value.clone())
        .map_err(|_| DriverError::StateError("connection state lock poisoned".into()))
}

fn write_shared(slot: &RwLock<String>, value: &str) -> Result<()> {
    let mut guard = slot
        .write()
        .map_err(|_| DriverError::StateError("connection state lock poisoned".into()))?;
    *guard = value.to_string();
    Ok(())
}

/// Database connection handle
///
/// Hands out statements and the metadata catalog. Closing it closes every
/// statement and cursor created from it.
pub struct Connection {
    config: ConnectionConfig,
    session: Session,
    close_flag: CloseFlag,
    read_only: bool,
}

impl Connection {
    /// Connect over HTTP. No request is made until the first operation.
    pub fn open(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        let store = HttpStore::new(&config)?;
        Self::with_store(config, Arc::new(store))
    }

    /// Connect to an explicit store, such as a [`crate::store::MemoryStore`].
    pub fn with_store(config: ConnectionConfig, store: Arc<dyn DocumentStore>) -> Result<Self> {
        config.validate()?;
        info!("connection to {} opened", config.to_url());
        let session = Session::new(store, &config.database, &config.schema);
        Ok(Self {
            config,
            session,
            close_flag: CloseFlag::new(),
            read_only: false,
        })
    }

    fn check_open(&self) -> Result<()> {
        self.close_flag.ensure_open("Connection")
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn create_statement(&self) -> Result<Statement> {
        debug!("create_statement()");
        self.check_open()?;
        Ok(Statement::new(self.session.clone(), self.close_flag.child()))
    }

    /// Prepare a query template with `@name` placeholders.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let mut stmt = conn.prepare("FOR u IN users FILTER u.age > @min RETURN u")?;
    /// stmt.bind(1, 18)?;
    /// let rows = stmt.execute_query()?;
    /// ```
    pub fn prepare(&self, template: &str) -> Result<PreparedStatement> {
        debug!("prepare(template={})", template);
        let statement = self.create_statement()?;
        Ok(PreparedStatement::new(statement, template))
    }

    /// Queries are already native; the text comes back unchanged.
    pub fn native_query(&self, query: &str) -> Result<String> {
        self.check_open()?;
        Ok(query.to_string())
    }

    pub fn prepare_call(&self, _query: &str) -> Result<()> {
        self.check_open()?;
        Err(DriverError::unsupported("CallableStatement"))
    }

    pub fn metadata(&self) -> Result<DatabaseMetadata> {
        self.check_open()?;
        Ok(DatabaseMetadata::new(
            self.session.clone(),
            self.close_flag.child(),
            &self.config,
        ))
    }

    /// Database queries run against.
    pub fn catalog(&self) -> Result<String> {
        self.check_open()?;
        self.session.database()
    }

    /// Switch the database for subsequent queries of this connection and its statements.
    pub fn set_catalog(&mut self, database: &str) -> Result<()> {
        debug!("set_catalog(database={})", database);
        self.check_open()?;
        write_shared(&self.session.database, database)
    }

    pub fn schema(&self) -> Result<String> {
        self.check_open()?;
        self.session.schema()
    }

    pub fn set_schema(&mut self, schema: &str) -> Result<()> {
        debug!("set_schema(schema={})", schema);
        self.check_open()?;
        write_shared(&self.session.schema, schema)
    }

    pub fn is_read_only(&self) -> Result<bool> {
        self.check_open()?;
        Ok(self.read_only)
    }

    /// Recorded only; queries are not inspected.
    pub fn set_read_only(&mut self, read_only: bool) -> Result<()> {
        self.check_open()?;
        self.read_only = read_only;
        Ok(())
    }

    /// Every query commits on its own.
    pub fn auto_commit(&self) -> Result<bool> {
        self.check_open()?;
        Ok(true)
    }

    pub fn set_auto_commit(&mut self, auto_commit: bool) -> Result<()> {
        debug!("set_auto_commit(auto_commit={})", auto_commit);
        self.check_open()?;
        if auto_commit {
            Ok(())
        } else {
            Err(DriverError::unsupported("manual commit mode"))
        }
    }

    pub fn commit(&mut self) -> Result<()> {
        self.check_open()?;
        Err(DriverError::unsupported("commit"))
    }

    pub fn rollback(&mut self) -> Result<()> {
        self.check_open()?;
        Err(DriverError::unsupported("rollback"))
    }

    pub fn set_savepoint(&mut self, _name: &str) -> Result<()> {
        self.check_open()?;
        Err(DriverError::unsupported("savepoints"))
    }

    /// Whether the connection is open and the store answers.
    pub fn is_valid(&self) -> bool {
        !self.close_flag.is_closed() && self.session.store().ping().is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.close_flag.is_closed()
    }

    /// Close the connection. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.close_flag.is_closed() {
            return Ok(());
        }
        debug!("close()");
        self.close_flag.close();
        self.session.store().shutdown();
        info!("connection to {} closed", self.config.to_url());
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
