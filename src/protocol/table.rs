// src/protocol/table.rs — Analysis result rows shaped for display

use serde_json::{Map, Value};

/// Column rendered as a whole number instead of a 4-decimal value.
pub const YEAR_COLUMN: &str = "Year";

/// Decimal places for numeric cells.
const DECIMALS: usize = 4;

/// `file_processed` results, already formatted cell by cell.
///
/// Columns are the keys of the first row in that row's order; every row is
/// read through the same columns, so a key missing from a later row shows
/// as an empty cell and extra keys are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ResultTable {
    /// Build a table from the `results` value. Returns `None` unless it is an
    /// array whose elements are all objects.
    pub fn from_rows(results: &Value) -> Option<Self> {
        let rows = results
            .as_array()?
            .iter()
            .map(Value::as_object)
            .collect::<Option<Vec<&Map<String, Value>>>>()?;

        let Some(first) = rows.first() else {
            return Some(Self::default());
        };
        let columns: Vec<String> = first.keys().cloned().collect();

        let rows = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| format_cell(column, row.get(column)))
                    .collect()
            })
            .collect();

        Some(Self { columns, rows })
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (row, column name), if both exist.
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let col = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(col).map(String::as_str)
    }
}

fn format_cell(column: &str, value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::Number(n)) => {
            let Some(f) = n.as_f64() else {
                return n.to_string();
            };
            if column == YEAR_COLUMN {
                (f.trunc() as i64).to_string()
            } else {
                format!("{:.*}", DECIMALS, f)
            }
        }
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => other.to_string(),
    }
}
