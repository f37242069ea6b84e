//! Statements
//!
//! `Statement` submits query text verbatim. `PreparedStatement` fixes a
//! template at prepare time and binds its `@name` placeholders by ordinal or
//! by name before each execution.

pub mod params;
pub mod prepared;

pub use params::{ParameterBindings, ParameterMetadata, ParameterMode};
pub use prepared::PreparedStatement;

use log::debug;

use crate::connection::Session;
use crate::core::lifecycle::CloseFlag;
use crate::core::{DriverError, Result};
use crate::result::RowCursor;
use crate::store::{BindVars, DocumentCursor, QueryOptions};

fn count_rows(source: &mut dyn DocumentCursor) -> Result<u64> {
    if let Some(count) = source.count() {
        return Ok(count);
    }
    let mut rows = 0;
    while source.next_value()?.is_some() {
        rows += 1;
    }
    Ok(rows)
}

/// Counts the rows of `source` and releases it, also when counting fails.
fn count_and_release(mut source: Box<dyn DocumentCursor>) -> Result<u64> {
    let counted = count_rows(source.as_mut());
    let released = source.close();
    let rows = counted?;
    released?;
    Ok(rows)
}

/// Executes query text against the connection's current database.
pub struct Statement {
    session: Session,
    close_flag: CloseFlag,
    current: Option<RowCursor>,
    update_count: Option<u64>,
    fetch_size: Option<u32>,
}

impl Statement {
    pub(crate) fn new(session: Session, close_flag: CloseFlag) -> Self {
        Self {
            session,
            close_flag,
            current: None,
            update_count: None,
            fetch_size: None,
        }
    }

    fn check_open(&self) -> Result<()> {
        self.close_flag.ensure_open("Statement")
    }

    fn close_current(&mut self) -> Result<()> {
        self.update_count = None;
        match self.current.take() {
            Some(mut cursor) => cursor.close(),
            None => Ok(()),
        }
    }

    fn open(&self, query: &str, bind_vars: &BindVars, count: bool) -> Result<Box<dyn DocumentCursor>> {
        let database = self.session.database()?;
        let options = QueryOptions {
            batch_size: self.fetch_size,
            count,
        };
        self.session.store().query(&database, query, bind_vars, &options)
    }

    pub(crate) fn query_with(&mut self, query: &str, bind_vars: &BindVars) -> Result<&mut RowCursor> {
        self.check_open()?;
        self.close_current()?;

        let source = self.open(query, bind_vars, false)?;
        let cursor = RowCursor::new(source, self.close_flag.child())?;
        Ok(self.current.insert(cursor))
    }

    pub(crate) fn update_with(&mut self, query: &str, bind_vars: &BindVars) -> Result<u64> {
        self.check_open()?;
        self.close_current()?;

        let source = self.open(query, bind_vars, true)?;
        let affected = count_and_release(source)?;

        debug!("update affected {} row(s)", affected);
        self.update_count = Some(affected);
        Ok(affected)
    }

    /// Run `query` and open a row cursor over its results. A previous result
    /// of this statement is closed first.
    pub fn execute_query(&mut self, query: &str) -> Result<&mut RowCursor> {
        debug!("execute_query: {}", query);
        self.query_with(query, &BindVars::new())
    }

    /// Run `query` for its effect. Returns the number of result rows, taken
    /// from the store's count when it reports one.
    pub fn execute_update(&mut self, query: &str) -> Result<u64> {
        debug!("execute_update: {}", query);
        self.update_with(query, &BindVars::new())
    }

    /// Run `query`, keeping its results available through [`Statement::result_set`].
    pub fn execute(&mut self, query: &str) -> Result<bool> {
        debug!("execute: {}", query);
        self.query_with(query, &BindVars::new())?;
        Ok(true)
    }

    /// Cursor of the most recent execution, if it is still open.
    pub fn result_set(&mut self) -> Result<Option<&mut RowCursor>> {
        self.check_open()?;
        Ok(self.current.as_mut().filter(|cursor| !cursor.is_closed()))
    }

    pub fn update_count(&self) -> Option<u64> {
        self.update_count
    }

    /// Documents fetched per round trip.
    pub fn set_fetch_size(&mut self, rows: u32) -> Result<()> {
        self.check_open()?;
        self.fetch_size = if rows == 0 { None } else { Some(rows) };
        Ok(())
    }

    pub fn fetch_size(&self) -> Option<u32> {
        self.fetch_size
    }

    pub fn add_batch(&mut self, _query: &str) -> Result<()> {
        self.check_open()?;
        Err(DriverError::unsupported("addBatch"))
    }

    pub fn clear_batch(&mut self) -> Result<()> {
        self.check_open()?;
        Err(DriverError::unsupported("clearBatch"))
    }

    pub fn execute_batch(&mut self) -> Result<Vec<u64>> {
        self.check_open()?;
        Err(DriverError::unsupported("executeBatch"))
    }

    /// Close the statement and its current result. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.close_flag.is_closed() && self.current.is_none() {
            return Ok(());
        }
        debug!("closing statement");
        let result = self.close_current();
        self.close_flag.close();
        result
    }

    pub fn is_closed(&self) -> bool {
        self.close_flag.is_closed()
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
