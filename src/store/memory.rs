//! In-process document store.
//!
//! Holds databases, collections and views in memory. Query support is
//! limited to full scans of the form `FOR d IN coll RETURN d`
//! (collection given literally or as an `@@coll` bind variable), plus canned
//! results registered per exact query text. Everything else is rejected.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::debug;
use regex::Regex;
use serde_json::Value as JsonValue;

use super::{
    BindVars, CollectionInfo, CollectionKind, DocumentCursor, DocumentStore, QueryOptions,
    ServerVersion, VecCursor, ViewInfo, ViewKind,
};
use crate::core::{Document, DriverError, Result, Value};

pub const SYSTEM_DATABASE: &str = "_system";

lazy_static! {
    static ref FULL_SCAN: Regex = Regex::new(
        r"(?is)^\s*FOR\s+([A-Za-z_][A-Za-z0-9_]*)\s+IN\s+(@@[A-Za-z_][A-Za-z0-9_]*|`[^`]+`|[A-Za-z_][A-Za-z0-9_]*)\s+RETURN\s+([A-Za-z_][A-Za-z0-9_]*)\s*$"
    )
    .unwrap();
}

#[derive(Debug, Default)]
struct MemoryCollection {
    kind: Option<CollectionKind>,
    documents: Vec<Document>,
}

#[derive(Debug, Default)]
struct MemoryDatabase {
    collections: IndexMap<String, MemoryCollection>,
    views: Vec<ViewInfo>,
}

#[derive(Debug)]
struct StoreState {
    databases: IndexMap<String, MemoryDatabase>,
    canned: HashMap<String, Vec<Value>>,
    broken_collections: HashSet<(String, String)>,
    last_query: Option<(String, BindVars, QueryOptions)>,
    available: bool,
    shut_down: bool,
    version: ServerVersion,
}

/// Document store kept entirely in memory.
#[derive(Debug)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    /// A store with only the `_system` database.
    pub fn new() -> Self {
        let mut databases = IndexMap::new();
        databases.insert(SYSTEM_DATABASE.to_string(), MemoryDatabase::default());

        Self {
            state: RwLock::new(StoreState {
                databases,
                canned: HashMap::new(),
                broken_collections: HashSet::new(),
                last_query: None,
                available: true,
                shut_down: false,
                version: ServerVersion {
                    server: "arango".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    license: "community".to_string(),
                },
            }),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state
            .read()
            .map_err(|_| DriverError::ConnectivityError("memory store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.state
            .write()
            .map_err(|_| DriverError::ConnectivityError("memory store lock poisoned".into()))
    }

    fn reachable(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        let state = self.read()?;
        if !state.available {
            return Err(DriverError::ConnectivityError("store is unreachable".into()));
        }
        Ok(state)
    }

    pub fn create_database(&self, name: &str) -> Result<()> {
        let mut state = self.write()?;
        if state.databases.contains_key(name) {
            return Err(DriverError::QueryError(format!("duplicate database name '{}'", name)));
        }
        state.databases.insert(name.to_string(), MemoryDatabase::default());
        Ok(())
    }

    pub fn create_collection(&self, database: &str, name: &str, kind: CollectionKind) -> Result<()> {
        let mut state = self.write()?;
        let db = database_mut(&mut state, database)?;
        if db.collections.contains_key(name) {
            return Err(DriverError::QueryError(format!("duplicate collection name '{}'", name)));
        }
        db.collections.insert(
            name.to_string(),
            MemoryCollection {
                kind: Some(kind),
                documents: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn create_view(&self, database: &str, name: &str, kind: ViewKind) -> Result<()> {
        let mut state = self.write()?;
        let db = database_mut(&mut state, database)?;
        db.views.push(ViewInfo {
            name: name.to_string(),
            kind,
        });
        Ok(())
    }

    /// Append a document to a collection, creating the collection on first use.
    pub fn insert(&self, database: &str, collection: &str, document: Document) -> Result<()> {
        let mut state = self.write()?;
        let db = database_mut(&mut state, database)?;
        let coll = db.collections.entry(collection.to_string()).or_default();
        coll.kind.get_or_insert(CollectionKind::Document);
        coll.documents.push(document);
        Ok(())
    }

    /// Like [`MemoryStore::insert`] for a JSON object literal.
    pub fn insert_json(&self, database: &str, collection: &str, json: JsonValue) -> Result<()> {
        let document = Value::document_from_json(json).ok_or_else(|| {
            DriverError::QueryError("only objects can be stored as documents".into())
        })?;
        self.insert(database, collection, document)
    }

    /// Serve `rows` whenever exactly `query` is submitted.
    pub fn register_query(&self, query: &str, rows: Vec<Value>) -> Result<()> {
        self.write()?.canned.insert(query.to_string(), rows);
        Ok(())
    }

    /// Make sampling `collection` fail from now on.
    pub fn break_collection(&self, database: &str, collection: &str) -> Result<()> {
        self.write()?
            .broken_collections
            .insert((database.to_string(), collection.to_string()));
        Ok(())
    }

    /// Simulate the store going away (or coming back).
    pub fn set_available(&self, available: bool) -> Result<()> {
        self.write()?.available = available;
        Ok(())
    }

    pub fn set_license(&self, license: &str) -> Result<()> {
        self.write()?.version.license = license.to_string();
        Ok(())
    }

    /// Text, bind variables and options of the most recent query.
    pub fn last_query(&self) -> Option<(String, BindVars, QueryOptions)> {
        self.read().ok().and_then(|state| state.last_query.clone())
    }

    pub fn last_bind_vars(&self) -> Option<BindVars> {
        self.last_query().map(|(_, vars, _)| vars)
    }

    pub fn is_shut_down(&self) -> bool {
        self.read().map(|state| state.shut_down).unwrap_or(false)
    }

    fn scan(&self, state: &StoreState, database: &str, query: &str, bind_vars: &BindVars) -> Result<Vec<Value>> {
        let caps = FULL_SCAN
            .captures(query)
            .ok_or_else(|| DriverError::QueryError(format!("unsupported query: {}", query.trim())))?;

        if caps[1] != caps[3] {
            return Err(DriverError::QueryError(format!(
                "variable '{}' is not defined",
                &caps[3]
            )));
        }

        let source = &caps[2];
        let collection = if let Some(param) = source.strip_prefix("@@") {
            bind_vars
                .get(&format!("@{}", param))
                .and_then(JsonValue::as_str)
                .ok_or_else(|| {
                    DriverError::QueryError(format!("bind parameter '@{}' was not declared", param))
                })?
                .to_string()
        } else {
            source.trim_matches('`').to_string()
        };

        let db = database_ref(state, database)?;
        let coll = db.collections.get(&collection).ok_or_else(|| {
            DriverError::QueryError(format!("collection or view not found: {}", collection))
        })?;
        Ok(coll.documents.iter().cloned().map(Value::Object).collect())
    }
}

fn database_ref<'a>(state: &'a StoreState, name: &str) -> Result<&'a MemoryDatabase> {
    state
        .databases
        .get(name)
        .ok_or_else(|| DriverError::QueryError(format!("database not found: {}", name)))
}

fn database_mut<'a>(state: &'a mut StoreState, name: &str) -> Result<&'a mut MemoryDatabase> {
    state
        .databases
        .get_mut(name)
        .ok_or_else(|| DriverError::QueryError(format!("database not found: {}", name)))
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryStore {
    fn query(
        &self,
        database: &str,
        query: &str,
        bind_vars: &BindVars,
        options: &QueryOptions,
    ) -> Result<Box<dyn DocumentCursor>> {
        debug!("memory query on '{}': {}", database, query);
        let rows = {
            let state = self.reachable()?;
            match state.canned.get(query) {
                Some(rows) => rows.clone(),
                None => self.scan(&state, database, query, bind_vars)?,
            }
        };

        self.write()?.last_query = Some((query.to_string(), bind_vars.clone(), options.clone()));

        let total = rows.len() as u64;
        let cursor = VecCursor::from_values(rows);
        Ok(Box::new(if options.count {
            cursor.with_count(total)
        } else {
            cursor
        }))
    }

    fn sample_documents(
        &self,
        database: &str,
        collection: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Document>> {
        let state = self.reachable()?;
        if state
            .broken_collections
            .contains(&(database.to_string(), collection.to_string()))
        {
            return Err(DriverError::QueryError(format!(
                "collection '{}' could not be read",
                collection
            )));
        }

        let db = database_ref(&state, database)?;
        let coll = db.collections.get(collection).ok_or_else(|| {
            DriverError::QueryError(format!("collection or view not found: {}", collection))
        })?;
        let take = limit.unwrap_or(usize::MAX);
        Ok(coll.documents.iter().take(take).cloned().collect())
    }

    fn collections(&self, database: &str) -> Result<Vec<CollectionInfo>> {
        let state = self.reachable()?;
        let db = database_ref(&state, database)?;
        Ok(db
            .collections
            .iter()
            .map(|(name, coll)| {
                CollectionInfo::new(name.clone(), coll.kind.unwrap_or(CollectionKind::Document))
            })
            .collect())
    }

    fn views(&self, database: &str) -> Result<Vec<ViewInfo>> {
        let state = self.reachable()?;
        Ok(database_ref(&state, database)?.views.clone())
    }

    fn databases(&self) -> Result<Vec<String>> {
        let state = self.reachable()?;
        Ok(state.databases.keys().cloned().collect())
    }

    fn version(&self) -> Result<ServerVersion> {
        Ok(self.reachable()?.version.clone())
    }

    fn shutdown(&self) {
        if let Ok(mut state) = self.write() {
            state.shut_down = true;
        }
    }
}
