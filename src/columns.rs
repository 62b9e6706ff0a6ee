//! Resolution of the column holding gene stable IDs.
//!
//! The column is chosen either by header name or by 1-based position. Both
//! modes validate up front and return a tagged error instead of indexing
//! blindly.

use std::path::Path;

use log::debug;

use crate::{error::AnnotateError, table::Table};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSelector {
    Name(String),
    /// 1-based; anything outside `[1, column_count]` is rejected.
    Index(i64),
}

impl Default for ColumnSelector {
    fn default() -> Self {
        ColumnSelector::Index(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedColumn {
    pub name: String,
    /// Zero-based position in the table.
    pub position: usize,
    pub values: Vec<String>,
}

pub fn select(
    table: &Table,
    selector: &ColumnSelector,
    input: &Path,
) -> Result<SelectedColumn, AnnotateError> {
    let position = match selector {
        ColumnSelector::Name(name) => {
            table
                .column_index(name)
                .ok_or_else(|| AnnotateError::ColumnNotFound {
                    column: name.clone(),
                    input: input.to_path_buf(),
                })?
        }
        ColumnSelector::Index(index) => {
            let count = table.column_count();
            if *index < 1 || *index as u64 > count as u64 {
                return Err(AnnotateError::IndexOutOfRange {
                    index: *index,
                    count,
                });
            }
            (*index - 1) as usize
        }
    };
    let name = table.headers()[position].clone();
    debug!("Reading gene IDs from column '{name}' (#{})", position + 1);
    Ok(SelectedColumn {
        name,
        position,
        values: table.column_values(position),
    })
}
