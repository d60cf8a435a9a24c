use super::domain::{Dataset, RosterRow, SchemaError, EMAIL_COLUMN};
use super::normalizer::{normalize_email, normalize_header};
use super::parser::RawTable;
use std::collections::HashMap;

/// An export whose headers were validated and whose email column was normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterTable {
    pub dataset: Dataset,
    pub headers: Vec<String>,
    pub rows: Vec<RosterRow>,
}

impl RosterTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Validates the schema of `raw` and lower-cases its email column. Cells arrive already
/// trimmed from [`RawTable::from_reader`]; short rows are padded with empty cells.
pub fn normalize_table(dataset: Dataset, raw: &RawTable) -> Result<RosterTable, SchemaError> {
    let headers: Vec<String> = raw.headers.iter().map(|h| normalize_header(h)).collect();

    for required in dataset.required_columns() {
        if !headers.iter().any(|header| header == required) {
            return Err(SchemaError {
                dataset,
                column: (*required).to_string(),
            });
        }
    }

    let rows = raw
        .rows
        .iter()
        .enumerate()
        .map(|(index, cells)| {
            let mut fields: HashMap<String, String> = headers
                .iter()
                .enumerate()
                .map(|(column, header)| {
                    let value = cells.get(column).cloned().unwrap_or_default();
                    (header.clone(), value)
                })
                .collect();

            let email = normalize_email(fields.get(EMAIL_COLUMN).map_or("", String::as_str));
            fields.insert(EMAIL_COLUMN.to_string(), email.clone());

            RosterRow::new(index + 1, email, fields)
        })
        .collect();

    Ok(RosterTable {
        dataset,
        headers,
        rows,
    })
}
