use std::fmt;

use super::Value;

/// Relational type projected from a runtime value kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Null,
    Boolean,
    Integer,
    Long,
    Double,
    String,
    Timestamp,
    Other,
}

impl TypeTag {
    /// Numeric type code in the `java.sql.Types` numbering most relational tools expect.
    pub fn sql_code(&self) -> i32 {
        match self {
            Self::Null => 0,
            Self::Boolean => 16,
            Self::Integer => 4,
            Self::Long => -5,
            Self::Double => 8,
            Self::String => 12,
            Self::Timestamp => 93,
            Self::Other => 1111,
        }
    }

    pub fn sql_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Boolean => "BOOLEAN",
            Self::Integer => "INTEGER",
            Self::Long => "BIGINT",
            Self::Double => "DOUBLE",
            Self::String => "VARCHAR",
            Self::Timestamp => "TIMESTAMP",
            Self::Other => "OTHER",
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, Self::Integer | Self::Long | Self::Double)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_name())
    }
}

/// Relational projection of one document attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    /// 1-based position, assigned in first-observation order.
    pub ordinal: usize,
    pub type_tag: TypeTag,
    /// Kind name of the value the type was taken from (`number`, `string`, ...).
    pub native_type: &'static str,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, ordinal: usize, value: &Value) -> Self {
        Self {
            name: name.into(),
            ordinal,
            type_tag: value.type_tag(),
            native_type: value.type_name(),
        }
    }

    pub fn with_type(mut self, type_tag: TypeTag) -> Self {
        self.type_tag = type_tag;
        self
    }
}

pub fn find_column_index(columns: &[ColumnDescriptor], name: &str) -> Option<usize> {
    columns.iter().position(|col| col.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sql_names() {
        assert_eq!(TypeTag::Long.sql_name(), "BIGINT");
        assert_eq!(TypeTag::String.to_string(), "VARCHAR");
        assert_eq!(TypeTag::Other.sql_code(), 1111);
    }

    #[test]
    fn test_descriptor_from_value() {
        let col = ColumnDescriptor::new("age", 2, &Value::Integer(30));
        assert_eq!(col.ordinal, 2);
        assert_eq!(col.type_tag, TypeTag::Integer);
        assert_eq!(col.native_type, "number");
    }

    #[test]
    fn test_find_column_index() {
        let columns = vec![
            ColumnDescriptor::new("a", 1, &Value::Null),
            ColumnDescriptor::new("b", 2, &Value::Null),
        ];
        assert_eq!(find_column_index(&columns, "b"), Some(1));
        assert_eq!(find_column_index(&columns, "c"), None);
    }
}
