pub mod cursor;
pub mod metadata;
pub mod table;

pub use cursor::{ColumnIndex, FetchDirection, RowCursor};
pub use metadata::{Nullability, ResultMetadata};
pub use table::ResultTable;
