//! Database metadata catalog.
//!
//! Listings (databases, collections, inferred columns, keys) come back as
//! row cursors with the upper-case column names relational tools expect.
//! Collections map to tables, views to tables of a search type, and the
//! schema is a fixed logical label.

use indexmap::IndexMap;
use log::{debug, warn};

use crate::connection::Session;
use crate::connection::config::ConnectionConfig;
use crate::core::lifecycle::CloseFlag;
use crate::core::{ColumnDescriptor, Document, DriverError, Result, Value};
use crate::document::SchemaInferenceEngine;
use crate::result::RowCursor;
use crate::store::{CollectionInfo, CollectionKind, ViewKind};

pub const PRODUCT_PREFIX: &str = "ArangoDB";
pub const KEY_ATTRIBUTE: &str = "_key";
pub const IDENTIFIER_QUOTE: &str = "`";
pub const SQL_KEYWORDS: &str =
    "FOR,IN,RETURN,FILTER,SORT,LIMIT,LET,COLLECT,INSERT,UPDATE,REPLACE,REMOVE,UPSERT";

// Nullability codes used in column listings
const COLUMN_NULLABLE_UNKNOWN: i64 = 2;
const SQL_NULL: i64 = 0;

fn row<const N: usize>(cells: [(&str, Value); N]) -> Document {
    cells
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect::<IndexMap<_, _>>()
}

/// Metadata of the store behind one connection.
pub struct DatabaseMetadata {
    session: Session,
    close_flag: CloseFlag,
    url: String,
    user: Option<String>,
    inference: SchemaInferenceEngine,
}

impl DatabaseMetadata {
    pub(crate) fn new(session: Session, close_flag: CloseFlag, config: &ConnectionConfig) -> Self {
        Self {
            session,
            close_flag,
            url: config.to_url(),
            user: config.user.clone(),
            inference: SchemaInferenceEngine::new(config.sample_size()),
        }
    }

    fn check_open(&self) -> Result<()> {
        self.close_flag.ensure_open("DatabaseMetadata")
    }

    fn cursor(&self, rows: Vec<Document>) -> Result<RowCursor> {
        RowCursor::from_documents(rows, self.close_flag.child())
    }

    fn database_or_current(&self, catalog: Option<&str>) -> Result<String> {
        match catalog {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => self.session.database(),
        }
    }

    fn user_collections(&self, database: &str, name: Option<&str>) -> Result<Vec<CollectionInfo>> {
        let collections = self.session.store().collections(database).map_err(|e| {
            DriverError::MetadataRetrievalError(format!(
                "failed to list collections of '{}': {}",
                database, e
            ))
        })?;
        Ok(collections
            .into_iter()
            .filter(|c| !c.is_system)
            .filter(|c| name.is_none_or(|n| c.name == n))
            .collect())
    }

    /// Accessible non-system databases. Failures yield an empty listing.
    pub fn catalogs(&self) -> Result<RowCursor> {
        debug!("catalogs()");
        self.check_open()?;
        let rows = match self.session.store().databases() {
            Ok(names) => names
                .into_iter()
                .filter(|name| !name.starts_with('_'))
                .map(|name| row([("TABLE_CAT", Value::from(name))]))
                .collect(),
            Err(e) => {
                warn!("listing databases failed, reporting none: {}", e);
                Vec::new()
            }
        };
        self.cursor(rows)
    }

    /// The single logical schema of `catalog` (or of the current database).
    pub fn schemas(&self, catalog: Option<&str>) -> Result<RowCursor> {
        debug!("schemas(catalog={:?})", catalog);
        self.check_open()?;
        let database = self.database_or_current(catalog)?;
        self.cursor(vec![row([
            ("TABLE_CATALOG", Value::from(database)),
            ("TABLE_SCHEM", Value::from(self.session.schema()?)),
        ])])
    }

    pub fn table_types(&self) -> Result<RowCursor> {
        debug!("table_types()");
        self.check_open()?;
        let rows = [
            CollectionKind::Document.table_type(),
            CollectionKind::Edge.table_type(),
            ViewKind::ArangoSearch.table_type(),
            ViewKind::SearchAlias.table_type(),
        ]
        .into_iter()
        .map(|t| row([("TABLE_TYPE", Value::from(t))]))
        .collect();
        self.cursor(rows)
    }

    /// Collections and views, optionally narrowed to an exact name and to
    /// a set of table types.
    pub fn tables(
        &self,
        catalog: Option<&str>,
        table_name: Option<&str>,
        types: Option<&[&str]>,
    ) -> Result<RowCursor> {
        debug!(
            "tables(catalog={:?}, table_name={:?}, types={:?})",
            catalog, table_name, types
        );
        self.check_open()?;
        let database = self.database_or_current(catalog)?;
        let schema = self.session.schema()?;

        let mut entries: Vec<(String, &'static str)> = self
            .user_collections(&database, table_name)?
            .into_iter()
            .map(|c| (c.name, c.kind.table_type()))
            .collect();

        let views = self.session.store().views(&database).map_err(|e| {
            DriverError::MetadataRetrievalError(format!(
                "failed to list views of '{}': {}",
                database, e
            ))
        })?;
        entries.extend(
            views
                .into_iter()
                .filter(|v| table_name.is_none_or(|n| v.name == n))
                .map(|v| (v.name, v.kind.table_type())),
        );

        let rows = entries
            .into_iter()
            .filter(|(_, table_type)| types.is_none_or(|wanted| wanted.contains(table_type)))
            .map(|(name, table_type)| {
                row([
                    ("TABLE_CAT", Value::from(database.as_str())),
                    ("TABLE_SCHEM", Value::from(schema.as_str())),
                    ("TABLE_NAME", Value::from(name)),
                    ("TABLE_TYPE", Value::from(table_type)),
                    ("REMARKS", Value::from("")),
                    ("TYPE_CAT", Value::Null),
                    ("TYPE_SCHEM", Value::Null),
                    ("TYPE_NAME", Value::Null),
                    ("SELF_REFERENCING_COL_NAME", Value::Null),
                    ("REF_GENERATION", Value::Null),
                ])
            })
            .collect();
        self.cursor(rows)
    }

    /// Inferred columns of one collection.
    pub fn column_descriptors(
        &self,
        catalog: Option<&str>,
        collection: &str,
    ) -> Result<Vec<ColumnDescriptor>> {
        self.check_open()?;
        let database = self.database_or_current(catalog)?;
        self.inference
            .infer_collection(self.session.store(), &database, collection)
    }

    /// Inferred columns of every matching collection. A collection whose
    /// sample cannot be read contributes no rows.
    pub fn columns(
        &self,
        catalog: Option<&str>,
        table_name: Option<&str>,
        column_name: Option<&str>,
    ) -> Result<RowCursor> {
        debug!(
            "columns(catalog={:?}, table_name={:?}, column_name={:?})",
            catalog, table_name, column_name
        );
        self.check_open()?;
        let database = self.database_or_current(catalog)?;
        let schema = self.session.schema()?;

        let mut rows = Vec::new();
        for collection in self.user_collections(&database, table_name)? {
            let columns = match self.inference.infer_collection(
                self.session.store(),
                &database,
                &collection.name,
            ) {
                Ok(columns) => columns,
                Err(e) => {
                    warn!("skipping columns of '{}': {}", collection.name, e);
                    Vec::new()
                }
            };

            for column in columns
                .into_iter()
                .filter(|c| column_name.is_none_or(|n| c.name == n))
            {
                rows.push(row([
                    ("TABLE_CAT", Value::from(database.as_str())),
                    ("TABLE_SCHEM", Value::from(schema.as_str())),
                    ("TABLE_NAME", Value::from(collection.name.as_str())),
                    ("COLUMN_NAME", Value::from(column.name)),
                    ("DATA_TYPE", Value::from(column.type_tag.sql_code())),
                    ("TYPE_NAME", Value::from(column.native_type)),
                    ("COLUMN_SIZE", Value::Integer(-1)),
                    ("BUFFER_LENGTH", Value::Integer(-1)),
                    ("DECIMAL_DIGITS", Value::Null),
                    ("NUM_PREC_RADIX", Value::Integer(10)),
                    ("NULLABLE", Value::Integer(COLUMN_NULLABLE_UNKNOWN)),
                    ("REMARKS", Value::Null),
                    ("COLUMN_DEF", Value::Null),
                    ("SQL_DATA_TYPE", Value::Integer(SQL_NULL)),
                    ("SQL_DATETIME_SUB", Value::Integer(SQL_NULL)),
                    ("CHAR_OCTET_LENGTH", Value::Null),
                    ("ORDINAL_POSITION", Value::from(column.ordinal as i64)),
                    ("IS_NULLABLE", Value::from("")),
                    ("SCOPE_CATALOG", Value::Null),
                    ("SCOPE_SCHEMA", Value::Null),
                    ("SCOPE_TABLE", Value::Null),
                    ("SOURCE_DATA_TYPE", Value::Null),
                    ("IS_AUTOINCREMENT", Value::from("")),
                    ("IS_GENERATEDCOLUMN", Value::from("")),
                ]));
            }
        }
        self.cursor(rows)
    }

    /// Every collection is keyed by `_key`.
    pub fn primary_keys(&self, catalog: Option<&str>, table_name: Option<&str>) -> Result<RowCursor> {
        debug!("primary_keys(catalog={:?}, table_name={:?})", catalog, table_name);
        self.check_open()?;
        let database = self.database_or_current(catalog)?;
        let schema = self.session.schema()?;

        let rows = self
            .user_collections(&database, table_name)?
            .into_iter()
            .map(|c| {
                let pk_name = format!("{}_PrimaryKey", c.name);
                row([
                    ("TABLE_CAT", Value::from(database.as_str())),
                    ("TABLE_SCHEM", Value::from(schema.as_str())),
                    ("TABLE_NAME", Value::from(c.name)),
                    ("COLUMN_NAME", Value::from(KEY_ATTRIBUTE)),
                    ("KEY_SEQ", Value::Integer(1)),
                    ("PK_NAME", Value::from(pk_name)),
                ])
            })
            .collect();
        self.cursor(rows)
    }

    /// Always empty: documents carry no declared foreign keys.
    pub fn imported_keys(&self, catalog: Option<&str>, table_name: &str) -> Result<RowCursor> {
        debug!("imported_keys(catalog={:?}, table_name={})", catalog, table_name);
        self.check_open()?;
        self.cursor(Vec::new())
    }

    pub fn exported_keys(&self, catalog: Option<&str>, table_name: &str) -> Result<RowCursor> {
        debug!("exported_keys(catalog={:?}, table_name={})", catalog, table_name);
        self.check_open()?;
        self.cursor(Vec::new())
    }

    pub fn cross_reference(&self, parent_table: &str, foreign_table: &str) -> Result<RowCursor> {
        debug!(
            "cross_reference(parent_table={}, foreign_table={})",
            parent_table, foreign_table
        );
        self.check_open()?;
        self.cursor(Vec::new())
    }

    /// `ArangoDB <license>`, as reported by the server.
    pub fn product_name(&self) -> Result<String> {
        self.check_open()?;
        let version = self.session.store().version()?;
        Ok(format!("{} {}", PRODUCT_PREFIX, version.license))
    }

    pub fn product_version(&self) -> Result<String> {
        self.check_open()?;
        Ok(self.session.store().version()?.version)
    }

    /// Leading numeric components of the server version (`3.11.4` gives `(3, 11)`).
    pub fn product_major_minor(&self) -> Result<(u32, u32)> {
        let version = self.product_version()?;
        let mut parts = version
            .split(|c: char| !c.is_ascii_digit())
            .map(|part| part.parse::<u32>().unwrap_or(0));
        Ok((parts.next().unwrap_or(0), parts.next().unwrap_or(0)))
    }

    pub fn driver_name(&self) -> &'static str {
        crate::DRIVER_NAME
    }

    pub fn driver_version(&self) -> &'static str {
        crate::DRIVER_VERSION
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn user_name(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn identifier_quote(&self) -> &'static str {
        IDENTIFIER_QUOTE
    }

    pub fn sql_keywords(&self) -> &'static str {
        SQL_KEYWORDS
    }
}
