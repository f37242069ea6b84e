use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use log::debug;

use super::Statement;
use super::params::{ParameterBindings, ParameterMetadata};
use crate::core::{DriverError, Result, Value};
use crate::result::RowCursor;

/// A query template with bindable `@name` placeholders.
///
/// Ordinals follow the first appearance of each distinct name, so in
/// `FILTER d.a == @x OR d.b == @y OR d.c == @x` ordinal 1 is `x` and 2 is `y`.
pub struct PreparedStatement {
    statement: Statement,
    template: String,
    bindings: ParameterBindings,
}

impl PreparedStatement {
    pub(crate) fn new(statement: Statement, template: &str) -> Self {
        let bindings = ParameterBindings::parse(template);
        debug!(
            "prepared statement with {} parameter(s): {:?}",
            bindings.count(),
            bindings.names()
        );
        Self {
            statement,
            template: template.to_string(),
            bindings,
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    fn check_open(&self) -> Result<()> {
        if self.statement.is_closed() {
            return Err(DriverError::closed("PreparedStatement"));
        }
        Ok(())
    }

    /// Bind the parameter at `ordinal` (1-based).
    pub fn bind(&mut self, ordinal: usize, value: impl Into<Value>) -> Result<()> {
        self.check_open()?;
        self.bindings.bind(ordinal, value)
    }

    pub fn bind_null(&mut self, ordinal: usize) -> Result<()> {
        self.bind(ordinal, Value::Null)
    }

    /// Dates travel as `yyyy-mm-dd` text.
    pub fn bind_date(&mut self, ordinal: usize, date: NaiveDate) -> Result<()> {
        self.bind(ordinal, date.format("%Y-%m-%d").to_string())
    }

    pub fn bind_time(&mut self, ordinal: usize, time: NaiveTime) -> Result<()> {
        self.bind(ordinal, time.format("%H:%M:%S").to_string())
    }

    pub fn bind_timestamp(&mut self, ordinal: usize, timestamp: DateTime<Utc>) -> Result<()> {
        self.bind(ordinal, Value::Timestamp(timestamp))
    }

    pub fn bind_named(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        self.check_open()?;
        self.bindings.bind_named(name, value)
    }

    pub fn bind_binary_stream(&mut self, _ordinal: usize, _stream: Box<dyn std::io::Read>) -> Result<()> {
        self.check_open()?;
        Err(DriverError::unsupported("setBinaryStream"))
    }

    pub fn bind_character_stream(&mut self, _ordinal: usize, _stream: Box<dyn std::io::Read>) -> Result<()> {
        self.check_open()?;
        Err(DriverError::unsupported("setCharacterStream"))
    }

    pub fn clear_parameters(&mut self) -> Result<()> {
        self.check_open()?;
        self.bindings.clear();
        Ok(())
    }

    pub fn parameter_metadata(&self) -> Result<ParameterMetadata> {
        self.check_open()?;
        Ok(self.bindings.metadata())
    }

    pub fn bindings(&self) -> &ParameterBindings {
        &self.bindings
    }

    /// Execute the template with the current bindings. Fails before reaching
    /// the store if any parameter is unbound.
    pub fn execute_query(&mut self) -> Result<&mut RowCursor> {
        debug!("execute_query (prepared): {}", self.template);
        self.check_open()?;
        let bind_vars = self.bindings.to_bind_vars()?;
        self.statement.query_with(&self.template, &bind_vars)
    }

    pub fn execute_update(&mut self) -> Result<u64> {
        debug!("execute_update (prepared): {}", self.template);
        self.check_open()?;
        let bind_vars = self.bindings.to_bind_vars()?;
        self.statement.update_with(&self.template, &bind_vars)
    }

    pub fn execute(&mut self) -> Result<bool> {
        debug!("execute (prepared): {}", self.template);
        self.execute_query()?;
        Ok(true)
    }

    pub fn result_set(&mut self) -> Result<Option<&mut RowCursor>> {
        self.statement.result_set()
    }

    pub fn update_count(&self) -> Option<u64> {
        self.statement.update_count()
    }

    pub fn set_fetch_size(&mut self, rows: u32) -> Result<()> {
        self.statement.set_fetch_size(rows)
    }

    pub fn add_batch(&mut self) -> Result<()> {
        self.check_open()?;
        Err(DriverError::unsupported("addBatch"))
    }

    pub fn execute_batch(&mut self) -> Result<Vec<u64>> {
        self.statement.execute_batch()
    }

    pub fn close(&mut self) -> Result<()> {
        self.statement.close()
    }

    pub fn is_closed(&self) -> bool {
        self.statement.is_closed()
    }
}
