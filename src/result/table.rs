use super::RowCursor;
use crate::core::Result;

/// A fully drained result, held as display strings.
#[derive(Debug)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultTable {
    /// Read every remaining row of `cursor`. Nulls render as `NULL`.
    pub fn from_cursor(cursor: &mut RowCursor) -> Result<Self> {
        let columns: Vec<String> = cursor.columns()?.iter().map(|c| c.name.clone()).collect();
        let mut rows = Vec::new();

        while cursor.advance()? {
            let mut row = Vec::with_capacity(columns.len());
            for index in 1..=columns.len() {
                let cell = cursor
                    .get_string(index)?
                    .unwrap_or_else(|| "NULL".to_string());
                row.push(cell);
            }
            rows.push(row);
        }

        Ok(Self { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        if self.columns.is_empty() {
            return "Empty result set\n".to_string();
        }

        // Calculate column widths
        let mut widths: Vec<usize> = self.columns.iter().map(|c| c.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }

        let line = |cells: &[String]| {
            cells
                .iter()
                .enumerate()
                .map(|(i, cell)| format!("{:width$}", cell, width = widths[i]))
                .collect::<Vec<_>>()
                .join(" | ")
        };

        let mut out = String::new();
        out.push_str(line(&self.columns).trim_end());
        out.push('\n');

        let separator: String = widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-");
        out.push_str(&separator);
        out.push('\n');

        for row in &self.rows {
            out.push_str(line(row).trim_end());
            out.push('\n');
        }

        out.push_str(&format!("\n{} row(s)\n", self.rows.len()));
        out
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::core::lifecycle::CloseFlag;
    use serde_json::json;

    #[test]
    fn test_render() {
        let docs = vec![
            Value::document_from_json(json!({"name": "Alice", "age": 30})).unwrap(),
            Value::document_from_json(json!({"name": "Bob", "age": null})).unwrap(),
        ];
        let mut cursor = RowCursor::from_documents(docs, CloseFlag::new()).unwrap();
        let table = ResultTable::from_cursor(&mut cursor).unwrap();

        assert_eq!(table.row_count(), 2);
        assert_eq!(table.rows[1], vec!["Bob".to_string(), "NULL".to_string()]);

        let text = table.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "name  | age");
        assert_eq!(lines[1], "------+-----");
        assert_eq!(lines[2], "Alice | 30");
        assert!(text.ends_with("2 row(s)\n"));
    }

    #[test]
    fn test_render_empty() {
        let mut cursor = RowCursor::from_documents(vec![], CloseFlag::new()).unwrap();
        let table = ResultTable::from_cursor(&mut cursor).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.render(), "Empty result set\n");
    }
}
