use crate::core::{ColumnDescriptor, DriverError, Result, TypeTag};

/// Whether a column may hold nulls. Document attributes can always be
/// absent, so projected columns report `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Nullability {
    NoNulls,
    Nullable,
    Unknown,
}

/// Column metadata of one result, addressed by 1-based column index.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultMetadata {
    columns: Vec<ColumnDescriptor>,
}

impl ResultMetadata {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Self {
        Self { columns }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    fn column(&self, index: usize) -> Result<&ColumnDescriptor> {
        index
            .checked_sub(1)
            .and_then(|i| self.columns.get(i))
            .ok_or_else(|| {
                DriverError::ColumnError(format!(
                    "Column index out of range: {} (1..={})",
                    index,
                    self.columns.len()
                ))
            })
    }

    pub fn column_name(&self, index: usize) -> Result<&str> {
        self.column(index).map(|c| c.name.as_str())
    }

    /// Same as the name; documents carry no separate display label.
    pub fn column_label(&self, index: usize) -> Result<&str> {
        self.column_name(index)
    }

    pub fn column_type(&self, index: usize) -> Result<TypeTag> {
        self.column(index).map(|c| c.type_tag)
    }

    /// Relational type code of the column.
    pub fn column_sql_type(&self, index: usize) -> Result<i32> {
        self.column_type(index).map(|t| t.sql_code())
    }

    pub fn column_type_name(&self, index: usize) -> Result<&'static str> {
        self.column_type(index).map(|t| t.sql_name())
    }

    /// Document-native kind the type was inferred from.
    pub fn native_type_name(&self, index: usize) -> Result<&'static str> {
        self.column(index).map(|c| c.native_type)
    }

    pub fn is_signed(&self, index: usize) -> Result<bool> {
        self.column_type(index).map(|t| t.is_signed())
    }

    pub fn nullability(&self, index: usize) -> Result<Nullability> {
        self.column(index).map(|_| Nullability::Unknown)
    }

    pub fn is_read_only(&self, index: usize) -> Result<bool> {
        self.column(index).map(|_| true)
    }

    pub fn is_auto_increment(&self, index: usize) -> Result<bool> {
        self.column(index).map(|_| false)
    }

    pub fn is_case_sensitive(&self, index: usize) -> Result<bool> {
        self.column(index).map(|_| true)
    }
}
