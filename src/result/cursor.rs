//! Forward-only row cursor over a single-pass document source.
//!
//! The cursor pulls one document at construction to learn the column set,
//! keeps it as lookahead, and hands it out on the first `advance()`. The
//! source is never rewound and never read twice.

use std::fmt;
use std::io::Read;
use std::mem;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::debug;
use rust_decimal::Decimal;

use super::ResultMetadata;
use crate::core::lifecycle::CloseFlag;
use crate::core::{ColumnDescriptor, Document, DriverError, Result, Value, find_column_index};
use crate::document::FromValue;
use crate::document::schema_inference::columns_of_document;
use crate::store::{DocumentCursor, VecCursor};

/// Anything a column can be addressed by: a 1-based index or a name.
pub trait ColumnIndex {
    /// 0-based position in `columns`.
    fn resolve(&self, columns: &[ColumnDescriptor]) -> Result<usize>;
}

impl ColumnIndex for usize {
    fn resolve(&self, columns: &[ColumnDescriptor]) -> Result<usize> {
        if *self == 0 || *self > columns.len() {
            return Err(DriverError::ColumnError(format!(
                "Column index out of range: {} (1..={})",
                self,
                columns.len()
            )));
        }
        Ok(self - 1)
    }
}

impl ColumnIndex for &str {
    fn resolve(&self, columns: &[ColumnDescriptor]) -> Result<usize> {
        find_column_index(columns, self)
            .ok_or_else(|| DriverError::ColumnError(format!("Column not found: {}", self)))
    }
}

impl ColumnIndex for String {
    fn resolve(&self, columns: &[ColumnDescriptor]) -> Result<usize> {
        self.as_str().resolve(columns)
    }
}

impl ColumnIndex for &String {
    fn resolve(&self, columns: &[ColumnDescriptor]) -> Result<usize> {
        self.as_str().resolve(columns)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchDirection {
    Forward,
    Reverse,
    Unknown,
}

#[derive(Debug)]
enum CursorState {
    /// First document already pulled, not yet handed out
    BeforeFirst { lookahead: Document },
    /// `index` is 0-based
    OnRow { current: Document, index: usize },
    Exhausted { rows: usize },
    Closed,
}

/// Relational view of a document result.
pub struct RowCursor {
    source: Box<dyn DocumentCursor>,
    columns: Vec<ColumnDescriptor>,
    state: CursorState,
    was_null: bool,
    close_flag: CloseFlag,
}

impl RowCursor {
    /// Wrap `source`, reading exactly one document from it.
    pub fn new(mut source: Box<dyn DocumentCursor>, close_flag: CloseFlag) -> Result<Self> {
        let first = match source.next_document() {
            Ok(first) => first,
            Err(e) => {
                if let Err(close_err) = source.close() {
                    debug!("error releasing result source: {}", close_err);
                }
                return Err(e);
            }
        };
        let (columns, state) = match first {
            Some(first) => (
                columns_of_document(&first),
                CursorState::BeforeFirst { lookahead: first },
            ),
            None => (Vec::new(), CursorState::Exhausted { rows: 0 }),
        };
        debug!("row cursor opened with {} column(s)", columns.len());

        Ok(Self {
            source,
            columns,
            state,
            was_null: false,
            close_flag,
        })
    }

    /// Cursor over documents already in memory.
    pub fn from_documents(documents: Vec<Document>, close_flag: CloseFlag) -> Result<Self> {
        Self::new(Box::new(VecCursor::new(documents)), close_flag)
    }

    fn check_open(&mut self) -> Result<()> {
        if matches!(self.state, CursorState::Closed) {
            return Err(DriverError::closed("ResultSet"));
        }
        if self.close_flag.is_closed() {
            // closed from above; release the source on first notice
            self.release();
            return Err(DriverError::closed("ResultSet"));
        }
        Ok(())
    }

    fn release(&mut self) {
        if let Err(e) = self.source.close() {
            debug!("error releasing result source: {}", e);
        }
        self.state = CursorState::Closed;
    }

    /// Move to the next row. Returns false once the source is exhausted,
    /// and keeps returning false afterwards.
    pub fn advance(&mut self) -> Result<bool> {
        self.check_open()?;

        let pulled = match &self.state {
            CursorState::BeforeFirst { .. } => None,
            CursorState::OnRow { .. } => Some(self.source.next_document()?),
            CursorState::Exhausted { .. } | CursorState::Closed => return Ok(false),
        };

        self.state = match (mem::replace(&mut self.state, CursorState::Closed), pulled) {
            (CursorState::BeforeFirst { lookahead }, _) => CursorState::OnRow {
                current: lookahead,
                index: 0,
            },
            (CursorState::OnRow { index, .. }, Some(Some(doc))) => CursorState::OnRow {
                current: doc,
                index: index + 1,
            },
            (CursorState::OnRow { index, .. }, _) => CursorState::Exhausted { rows: index + 1 },
            (other, _) => other,
        };

        Ok(matches!(self.state, CursorState::OnRow { .. }))
    }

    /// Terminal. Releases the underlying source; closing twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if matches!(self.state, CursorState::Closed) {
            return Ok(());
        }
        self.close_flag.close();
        self.state = CursorState::Closed;
        self.source.close()
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, CursorState::Closed) || self.close_flag.is_closed()
    }

    /// Whether the last value read was null or absent. False before any read.
    pub fn was_null(&mut self) -> Result<bool> {
        self.check_open()?;
        Ok(self.was_null)
    }

    pub fn columns(&mut self) -> Result<&[ColumnDescriptor]> {
        self.check_open()?;
        Ok(&self.columns)
    }

    /// 1-based index of the column called `name`.
    pub fn find_column(&mut self, name: &str) -> Result<usize> {
        self.check_open()?;
        name.resolve(&self.columns).map(|i| i + 1)
    }

    pub fn metadata(&mut self) -> Result<ResultMetadata> {
        self.check_open()?;
        Ok(ResultMetadata::new(self.columns.clone()))
    }

    /// 1-based number of the current row; 0 before the first row, and the
    /// number of rows read once the cursor is exhausted.
    pub fn row(&mut self) -> Result<usize> {
        self.check_open()?;
        Ok(match &self.state {
            CursorState::BeforeFirst { .. } | CursorState::Closed => 0,
            CursorState::OnRow { index, .. } => index + 1,
            CursorState::Exhausted { rows } => *rows,
        })
    }

    pub fn is_before_first(&mut self) -> Result<bool> {
        self.check_open()?;
        Ok(matches!(self.state, CursorState::BeforeFirst { .. }))
    }

    pub fn is_first(&mut self) -> Result<bool> {
        self.check_open()?;
        Ok(matches!(self.state, CursorState::OnRow { index: 0, .. }))
    }

    /// True only when on a row and the source reports nothing more. A source
    /// that cannot tell yet makes this false even on the actual last row.
    pub fn is_last(&mut self) -> Result<bool> {
        self.check_open()?;
        Ok(matches!(self.state, CursorState::OnRow { .. }) && !self.source.has_next())
    }

    /// Past the last row of a non-empty result.
    pub fn is_after_last(&mut self) -> Result<bool> {
        self.check_open()?;
        Ok(matches!(self.state, CursorState::Exhausted { rows } if rows > 0))
    }

    /// Current row as a document.
    pub fn current_document(&mut self) -> Result<&Document> {
        self.check_open()?;
        match &self.state {
            CursorState::OnRow { current, .. } => Ok(current),
            _ => Err(DriverError::StateError("No current row".into())),
        }
    }

    /// Read a column of the current row, coerced to `T`.
    pub fn get<T: FromValue, C: ColumnIndex>(&mut self, column: C) -> Result<T> {
        self.check_open()?;
        let current = match &self.state {
            CursorState::OnRow { current, .. } => current,
            _ => return Err(DriverError::StateError("No current row".into())),
        };
        let index = column.resolve(&self.columns)?;
        let value = current
            .get(&self.columns[index].name)
            .unwrap_or(&Value::Null);
        self.was_null = value.is_null();
        T::from_value(value)
    }

    pub fn get_string<C: ColumnIndex>(&mut self, column: C) -> Result<Option<String>> {
        self.get(column)
    }

    pub fn get_bool<C: ColumnIndex>(&mut self, column: C) -> Result<bool> {
        self.get(column)
    }

    pub fn get_i8<C: ColumnIndex>(&mut self, column: C) -> Result<i8> {
        self.get(column)
    }

    pub fn get_i16<C: ColumnIndex>(&mut self, column: C) -> Result<i16> {
        self.get(column)
    }

    pub fn get_i32<C: ColumnIndex>(&mut self, column: C) -> Result<i32> {
        self.get(column)
    }

    pub fn get_i64<C: ColumnIndex>(&mut self, column: C) -> Result<i64> {
        self.get(column)
    }

    pub fn get_f32<C: ColumnIndex>(&mut self, column: C) -> Result<f32> {
        self.get(column)
    }

    pub fn get_f64<C: ColumnIndex>(&mut self, column: C) -> Result<f64> {
        self.get(column)
    }

    pub fn get_decimal<C: ColumnIndex>(&mut self, column: C) -> Result<Option<Decimal>> {
        self.get(column)
    }

    pub fn get_bytes<C: ColumnIndex>(&mut self, column: C) -> Result<Option<Vec<u8>>> {
        self.get(column)
    }

    pub fn get_date<C: ColumnIndex>(&mut self, column: C) -> Result<Option<NaiveDate>> {
        self.get(column)
    }

    pub fn get_time<C: ColumnIndex>(&mut self, column: C) -> Result<Option<NaiveTime>> {
        self.get(column)
    }

    pub fn get_timestamp<C: ColumnIndex>(&mut self, column: C) -> Result<Option<NaiveDateTime>> {
        self.get(column)
    }

    pub fn get_value<C: ColumnIndex>(&mut self, column: C) -> Result<Option<Value>> {
        self.get(column)
    }

    pub fn get_binary_stream<C: ColumnIndex>(&mut self, _column: C) -> Result<Box<dyn Read>> {
        self.check_open()?;
        Err(DriverError::unsupported("getBinaryStream"))
    }

    pub fn get_character_stream<C: ColumnIndex>(&mut self, _column: C) -> Result<Box<dyn Read>> {
        self.check_open()?;
        Err(DriverError::unsupported("getCharacterStream"))
    }

    pub fn absolute(&mut self, _row: i64) -> Result<bool> {
        self.forward_only("absolute positioning")
    }

    pub fn relative(&mut self, _rows: i64) -> Result<bool> {
        self.forward_only("relative positioning")
    }

    pub fn previous(&mut self) -> Result<bool> {
        self.forward_only("previous")
    }

    pub fn first(&mut self) -> Result<bool> {
        self.forward_only("first")
    }

    pub fn last(&mut self) -> Result<bool> {
        self.forward_only("last")
    }

    pub fn before_first(&mut self) -> Result<()> {
        self.forward_only("beforeFirst").map(|_| ())
    }

    pub fn after_last(&mut self) -> Result<()> {
        self.forward_only("afterLast").map(|_| ())
    }

    pub fn fetch_direction(&self) -> FetchDirection {
        FetchDirection::Forward
    }

    pub fn set_fetch_direction(&mut self, direction: FetchDirection) -> Result<()> {
        self.check_open()?;
        match direction {
            FetchDirection::Forward => Ok(()),
            _ => Err(DriverError::CapabilityError(
                "only forward fetching is supported".into(),
            )),
        }
    }

    pub fn update_row(&mut self) -> Result<()> {
        self.read_only("updateRow")
    }

    pub fn insert_row(&mut self) -> Result<()> {
        self.read_only("insertRow")
    }

    pub fn delete_row(&mut self) -> Result<()> {
        self.read_only("deleteRow")
    }

    fn forward_only(&mut self, operation: &str) -> Result<bool> {
        self.check_open()?;
        Err(DriverError::CapabilityError(format!(
            "{} is not supported by a forward-only result",
            operation
        )))
    }

    fn read_only(&mut self, operation: &str) -> Result<()> {
        self.check_open()?;
        Err(DriverError::CapabilityError(format!(
            "{} is not supported by a read-only result",
            operation
        )))
    }
}

impl fmt::Debug for RowCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowCursor")
            .field("columns", &self.columns)
            .field("state", &self.state)
            .field("was_null", &self.was_null)
            .finish()
    }
}

impl Drop for RowCursor {
    fn drop(&mut self) {
        if !matches!(self.state, CursorState::Closed) {
            let _ = self.source.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Source that counts pulls and can hide what remains from `has_next`.
    struct CountingCursor {
        inner: VecCursor,
        pulls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
        opaque: bool,
    }

    impl DocumentCursor for CountingCursor {
        fn has_next(&self) -> bool {
            self.opaque || self.inner.has_next()
        }

        fn next_value(&mut self) -> Result<Option<Value>> {
            self.pulls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.next_value()
        }

        fn close(&mut self) -> Result<()> {
            self.inner.close()
        }
    }

    /// Source that counts how often it is released.
    struct ReleaseTracking {
        inner: VecCursor,
        closes: std::sync::Arc<std::sync::atomic::AtomicUsize>,
    }

    impl DocumentCursor for ReleaseTracking {
        fn has_next(&self) -> bool {
            self.inner.has_next()
        }

        fn next_value(&mut self) -> Result<Option<Value>> {
            self.inner.next_value()
        }

        fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.inner.close()
        }
    }

    fn docs(values: &[serde_json::Value]) -> Vec<Document> {
        values
            .iter()
            .map(|v| Value::document_from_json(v.clone()).unwrap())
            .collect()
    }

    fn cursor(values: &[serde_json::Value]) -> RowCursor {
        RowCursor::from_documents(docs(values), CloseFlag::new()).unwrap()
    }

    fn counting(
        values: &[serde_json::Value],
        opaque: bool,
    ) -> (RowCursor, std::sync::Arc<std::sync::atomic::AtomicUsize>) {
        let pulls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let source = CountingCursor {
            inner: VecCursor::new(docs(values)),
            pulls: pulls.clone(),
            opaque,
        };
        let cursor = RowCursor::new(Box::new(source), CloseFlag::new()).unwrap();
        (cursor, pulls)
    }

    fn pulls(counter: &std::sync::Arc<std::sync::atomic::AtomicUsize>) -> usize {
        counter.load(std::sync::atomic::Ordering::SeqCst)
    }

    #[test]
    fn test_lookahead_is_consumed_once() {
        let (mut rs, counter) = counting(&[json!({"n": 1}), json!({"n": 2})], false);
        assert_eq!(pulls(&counter), 1);

        assert!(rs.advance().unwrap());
        assert_eq!(pulls(&counter), 1);
        assert_eq!(rs.get_i32("n").unwrap(), 1);

        assert!(rs.advance().unwrap());
        assert_eq!(pulls(&counter), 2);
        assert_eq!(rs.get_i32(1).unwrap(), 2);

        assert!(!rs.advance().unwrap());
        assert!(!rs.advance().unwrap());
    }

    #[test]
    fn test_columns_from_first_document() {
        let mut rs = cursor(&[json!({"b": "x", "a": 1}), json!({"a": 2, "c": true})]);
        let names: Vec<&str> = rs.columns().unwrap().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);

        assert!(rs.advance().unwrap());
        assert!(rs.advance().unwrap());
        // "b" is absent in the second document
        assert_eq!(rs.get_string("b").unwrap(), None);
        assert!(rs.was_null().unwrap());
        // "c" was not in the first document
        assert!(matches!(rs.get_bool("c"), Err(DriverError::ColumnError(_))));
    }

    #[test]
    fn test_empty_source() {
        let mut rs = cursor(&[]);
        assert!(rs.columns().unwrap().is_empty());
        assert!(!rs.is_before_first().unwrap());
        assert!(!rs.advance().unwrap());
        assert!(!rs.is_after_last().unwrap());
        assert_eq!(rs.row().unwrap(), 0);
    }

    #[test]
    fn test_positions() {
        let mut rs = cursor(&[json!({"n": 1}), json!({"n": 2})]);
        assert!(rs.is_before_first().unwrap());
        assert_eq!(rs.row().unwrap(), 0);

        rs.advance().unwrap();
        assert!(rs.is_first().unwrap());
        assert!(!rs.is_last().unwrap());
        assert_eq!(rs.row().unwrap(), 1);

        rs.advance().unwrap();
        assert!(!rs.is_first().unwrap());
        assert!(rs.is_last().unwrap());
        assert_eq!(rs.row().unwrap(), 2);

        rs.advance().unwrap();
        assert!(rs.is_after_last().unwrap());
        assert!(!rs.is_last().unwrap());
        assert_eq!(rs.row().unwrap(), 2);
    }

    #[test]
    fn test_is_last_is_conservative() {
        let (mut rs, _) = counting(&[json!({"n": 1})], true);
        rs.advance().unwrap();
        assert!(!rs.is_last().unwrap());
    }

    #[test]
    fn test_was_null_tracks_latest_access() {
        let mut rs = cursor(&[json!({"a": null, "b": 0})]);
        assert!(!rs.was_null().unwrap());
        rs.advance().unwrap();

        assert_eq!(rs.get_i32("a").unwrap(), 0);
        assert!(rs.was_null().unwrap());
        assert_eq!(rs.get_i32("b").unwrap(), 0);
        assert!(!rs.was_null().unwrap());
    }

    #[test]
    fn test_access_without_current_row() {
        let mut rs = cursor(&[json!({"a": 1})]);
        assert!(matches!(rs.get_i32(1), Err(DriverError::StateError(_))));
        rs.advance().unwrap();
        rs.advance().unwrap();
        assert!(matches!(rs.get_i32(1), Err(DriverError::StateError(_))));
    }

    #[test]
    fn test_column_index_out_of_range() {
        let mut rs = cursor(&[json!({"a": 1, "b": 2})]);
        rs.advance().unwrap();
        assert!(matches!(rs.get_i32(0_usize), Err(DriverError::ColumnError(_))));
        assert!(matches!(rs.get_i32(3_usize), Err(DriverError::ColumnError(_))));
        assert_eq!(rs.find_column("b").unwrap(), 2);
        assert!(rs.find_column("z").is_err());
    }

    #[test]
    fn test_close_is_terminal() {
        let mut rs = cursor(&[json!({"a": 1})]);
        rs.close().unwrap();
        assert!(rs.is_closed());
        assert!(rs.close().is_ok());
        assert!(matches!(rs.advance(), Err(DriverError::StateError(_))));
        assert!(matches!(rs.row(), Err(DriverError::StateError(_))));
        assert!(matches!(rs.get_i32(1), Err(DriverError::StateError(_))));
    }

    #[test]
    fn test_accessors_fail_after_close() {
        let mut rs = cursor(&[json!({"a": null})]);
        rs.advance().unwrap();
        rs.get_i32("a").unwrap();
        rs.close().unwrap();

        assert!(matches!(rs.was_null(), Err(DriverError::StateError(_))));
        assert!(matches!(rs.columns(), Err(DriverError::StateError(_))));
        assert!(matches!(rs.metadata(), Err(DriverError::StateError(_))));
    }

    #[test]
    fn test_failed_first_pull_releases_source() {
        let closes = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let source = ReleaseTracking {
            inner: VecCursor::from_values(vec![Value::Integer(1), Value::Integer(2)]),
            closes: closes.clone(),
        };

        let result = RowCursor::new(Box::new(source), CloseFlag::new());
        assert!(matches!(result, Err(DriverError::QueryError(_))));
        assert_eq!(pulls(&closes), 1);
    }

    #[test]
    fn test_decimal_column() {
        let mut rs = cursor(&[json!({"price": "19.99", "qty": 3, "none": null})]);
        rs.advance().unwrap();
        assert_eq!(rs.get_decimal("price").unwrap(), Some(Decimal::new(1999, 2)));
        assert_eq!(rs.get_decimal("qty").unwrap(), Some(Decimal::from(3)));
        assert_eq!(rs.get_decimal("none").unwrap(), None);
        assert!(rs.was_null().unwrap());
    }

    #[test]
    fn test_parent_close_reaches_cursor() {
        let parent = CloseFlag::new();
        let mut rs = RowCursor::from_documents(docs(&[json!({"a": 1})]), parent.child()).unwrap();
        parent.close();
        assert!(rs.is_closed());
        assert!(matches!(rs.advance(), Err(DriverError::StateError(_))));
    }

    #[test]
    fn test_forward_only_capabilities() {
        let mut rs = cursor(&[json!({"a": 1})]);
        assert!(matches!(rs.previous(), Err(DriverError::CapabilityError(_))));
        assert!(matches!(rs.absolute(1), Err(DriverError::CapabilityError(_))));
        assert!(matches!(rs.relative(-1), Err(DriverError::CapabilityError(_))));
        assert!(matches!(rs.first(), Err(DriverError::CapabilityError(_))));
        assert!(matches!(rs.last(), Err(DriverError::CapabilityError(_))));
        assert!(matches!(rs.before_first(), Err(DriverError::CapabilityError(_))));
        assert!(matches!(rs.after_last(), Err(DriverError::CapabilityError(_))));
        assert!(matches!(rs.update_row(), Err(DriverError::CapabilityError(_))));
        assert!(matches!(rs.get_binary_stream(1), Err(DriverError::CapabilityError(_))));
        assert!(rs.set_fetch_direction(FetchDirection::Forward).is_ok());
        assert!(matches!(
            rs.set_fetch_direction(FetchDirection::Reverse),
            Err(DriverError::CapabilityError(_))
        ));
    }

    #[test]
    fn test_typed_access() {
        let mut rs = cursor(&[json!({
            "name": "Alice",
            "age": 30,
            "score": 9.5,
            "active": true,
            "born": "1990-05-17",
            "tags": ["a", "b"]
        })]);
        rs.advance().unwrap();

        assert_eq!(rs.get_string("name").unwrap().as_deref(), Some("Alice"));
        assert_eq!(rs.get_i64("age").unwrap(), 30);
        assert_eq!(rs.get_f64("score").unwrap(), 9.5);
        assert!(rs.get_bool("active").unwrap());
        assert_eq!(rs.get_date("born").unwrap(), NaiveDate::from_ymd_opt(1990, 5, 17));
        assert_eq!(rs.get_string("tags").unwrap().as_deref(), Some(r#"["a","b"]"#));
        assert!(matches!(rs.get_i32("name"), Err(DriverError::FormatError(_))));
    }
}
