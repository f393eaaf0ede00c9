use crate::error::{Error, Result};
use crate::row::{Column, Row, Value};
use crate::task::ExportFormat;

/// Incremental per-format row serializer.
///
/// Emits the bytes to append for the header, each row, and the trailer,
/// holding no more than one row in memory. The caller owns the sink and
/// tracks cumulative bytes written.
pub struct RowEncoder {
    format: ExportFormat,
    rows_encoded: u64,
}

impl RowEncoder {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            rows_encoded: 0,
        }
    }

    /// Fixed leading output emitted before any data row.
    pub fn header(&mut self, columns: &[Column]) -> String {
        match self.format {
            ExportFormat::Csv => {
                let fields: Vec<String> =
                    columns.iter().map(|c| csv_field(&c.name)).collect();
                format!("{}\n", fields.join(","))
            }
            ExportFormat::Json => "[".to_string(),
            ExportFormat::Markdown => {
                let names: Vec<String> =
                    columns.iter().map(|c| markdown_cell(&c.name)).collect();
                let separators = vec!["---"; columns.len()];
                format!(
                    "| {} |\n| {} |\n",
                    names.join(" | "),
                    separators.join(" | ")
                )
            }
        }
    }

    /// Serialize one row. Values must match the column schema in count and
    /// order.
    pub fn row(&mut self, columns: &[Column], row: &Row) -> Result<String> {
        if row.len() != columns.len() {
            return Err(Error::Encoding(format!(
                "row has {} values for {} columns",
                row.len(),
                columns.len()
            )));
        }

        let encoded = match self.format {
            ExportFormat::Csv => {
                let mut fields = Vec::with_capacity(row.len());
                for value in row {
                    fields.push(csv_field(&scalar_text(value)?));
                }
                format!("{}\n", fields.join(","))
            }
            ExportFormat::Json => {
                let mut object = serde_json::Map::with_capacity(row.len());
                for (column, value) in columns.iter().zip(row) {
                    object.insert(column.name.clone(), json_value(value)?);
                }
                let body = serde_json::to_string(&serde_json::Value::Object(object))
                    .map_err(|e| Error::Encoding(e.to_string()))?;
                if self.rows_encoded == 0 {
                    format!("\n{}", body)
                } else {
                    format!(",\n{}", body)
                }
            }
            ExportFormat::Markdown => {
                let mut cells = Vec::with_capacity(row.len());
                for value in row {
                    cells.push(markdown_cell(&scalar_text(value)?));
                }
                format!("| {} |\n", cells.join(" | "))
            }
        };

        self.rows_encoded += 1;
        Ok(encoded)
    }

    /// Fixed trailing output emitted after the last row.
    pub fn finish(&mut self) -> String {
        match self.format {
            ExportFormat::Csv | ExportFormat::Markdown => String::new(),
            ExportFormat::Json => {
                if self.rows_encoded == 0 {
                    "]\n".to_string()
                } else {
                    "\n]\n".to_string()
                }
            }
        }
    }

    pub fn rows_encoded(&self) -> u64 {
        self.rows_encoded
    }

    /// Bytes a file with no data rows would occupy: header plus trailer.
    pub fn empty_overhead(format: ExportFormat, columns: &[Column]) -> u64 {
        let mut encoder = RowEncoder::new(format);
        (encoder.header(columns).len() + encoder.finish().len()) as u64
    }
}

/// Plain-text rendering shared by CSV and Markdown.
fn scalar_text(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::Text(s) => Ok(s.clone()),
        Value::DateTime(dt) => Ok(dt.to_rfc3339()),
        Value::Bytes(_) => Err(Error::Encoding(
            "binary value cannot be represented in a text export".to_string(),
        )),
    }
}

/// Quote a CSV field when it contains the delimiter, a quote, or a newline;
/// embedded quotes are doubled.
fn csv_field(text: &str) -> String {
    if text.contains(',') || text.contains('"') || text.contains('\n') || text.contains('\r') {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

/// Escape literal pipes so cell values cannot break the table structure.
fn markdown_cell(text: &str) -> String {
    text.replace('|', "\\|")
}

fn json_value(value: &Value) -> Result<serde_json::Value> {
    match value {
        Value::Null => Ok(serde_json::Value::Null),
        Value::Bool(b) => Ok(serde_json::Value::Bool(*b)),
        Value::Int(i) => Ok(serde_json::Value::from(*i)),
        Value::Float(f) => Ok(serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)),
        Value::Text(s) => Ok(serde_json::Value::String(s.clone())),
        Value::DateTime(dt) => Ok(serde_json::Value::String(dt.to_rfc3339())),
        Value::Bytes(_) => Err(Error::Encoding(
            "binary value cannot be represented as JSON".to_string(),
        )),
    }
}
