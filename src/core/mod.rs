pub mod error;
pub mod lifecycle;
pub mod types;
pub mod value;

pub use error::{DriverError, Result};
pub use types::{ColumnDescriptor, TypeTag, find_column_index};
pub use value::{Document, Value};
