//! In-memory delimited table and the input loader.
//!
//! A [`Table`] is an ordered header row plus rows of string cells, every row
//! exactly as wide as the header. Cells are kept verbatim; nothing is parsed
//! into numbers, so values are written back exactly as they were read.

use std::{collections::HashSet, io::Read, path::Path};

use anyhow::{Context, Result, anyhow};
use encoding_rs::Encoding;
use log::debug;

use crate::{error::AnnotateError, io_utils};

/// Header given to blank header cells, followed by the zero-based position.
pub const PLACEHOLDER_PREFIX: &str = "Unnamed:";

/// Column written by this tool; a copy found in the input is stale output.
pub const GENE_NAME_COLUMN: &str = "Gene name";

/// Cell contents treated as missing values.
pub const MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

pub fn is_missing(value: &str) -> bool {
    MISSING_MARKERS.contains(&value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Builds a table, padding short rows with empty cells.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self> {
        let width = headers.len();
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(idx, mut row)| {
                if row.len() > width {
                    return Err(anyhow!(
                        "Row {} has {} field(s) but the header has {}",
                        idx + 2,
                        row.len(),
                        width
                    ));
                }
                row.resize(width, String::new());
                Ok(row)
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { headers, rows })
    }

    /// Loads the input table, dropping a stale `Gene name` column and every
    /// row that has a missing value in any column.
    pub fn load(path: &Path, delimiter: u8, encoding: &'static Encoding) -> Result<Self> {
        if !path.exists() {
            return Err(AnnotateError::FileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }
        debug!(
            "Reading '{}' with delimiter '{}'",
            path.display(),
            io_utils::printable_delimiter(delimiter)
        );
        let reader = io_utils::open_csv_reader_from_path(path, delimiter)?;
        let mut table =
            Self::read(reader, encoding).with_context(|| format!("Reading table {path:?}"))?;

        if table.drop_column(GENE_NAME_COLUMN) {
            debug!("Dropped existing '{GENE_NAME_COLUMN}' column");
        }
        let before = table.row_count();
        table.drop_incomplete_rows();
        debug!(
            "Loaded {} row(s) across {} column(s) ({} incomplete row(s) dropped)",
            table.row_count(),
            table.column_count(),
            before - table.row_count()
        );
        Ok(table)
    }

    pub fn read<R>(mut reader: csv::Reader<R>, encoding: &'static Encoding) -> Result<Self>
    where
        R: Read,
    {
        let headers = normalize_headers(io_utils::reader_headers(&mut reader, encoding)?);
        let mut rows = Vec::new();
        for (idx, record) in reader.byte_records().enumerate() {
            let record = record.with_context(|| format!("Reading row {}", idx + 2))?;
            rows.push(
                io_utils::decode_record(&record, encoding)
                    .with_context(|| format!("Decoding row {}", idx + 2))?,
            );
        }
        Self::new(headers, rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn column_values(&self, index: usize) -> Vec<String> {
        self.rows
            .iter()
            .map(|row| row.get(index).cloned().unwrap_or_default())
            .collect()
    }

    /// Removes the named column, returning whether it existed.
    pub fn drop_column(&mut self, name: &str) -> bool {
        let Some(index) = self.column_index(name) else {
            return false;
        };
        self.headers.remove(index);
        for row in &mut self.rows {
            row.remove(index);
        }
        true
    }

    pub fn drop_incomplete_rows(&mut self) {
        self.rows.retain(|row| !row.iter().any(|cell| is_missing(cell)));
    }

    /// Inserts a column at `position`; `values` must have one entry per row.
    pub fn insert_column(&mut self, position: usize, name: &str, values: Vec<String>) -> Result<()> {
        if values.len() != self.rows.len() {
            return Err(anyhow!(
                "Column '{name}' has {} value(s) for {} row(s)",
                values.len(),
                self.rows.len()
            ));
        }
        if position > self.headers.len() {
            return Err(anyhow!(
                "Cannot insert column '{name}' at position {position} of {}",
                self.headers.len()
            ));
        }
        self.headers.insert(position, name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(position, value);
        }
        Ok(())
    }

    pub fn blank_placeholder_headers(&mut self) {
        for header in &mut self.headers {
            if header.starts_with(PLACEHOLDER_PREFIX) {
                header.clear();
            }
        }
    }

    pub fn write_to<W>(&self, writer: &mut csv::Writer<W>) -> Result<()>
    where
        W: std::io::Write,
    {
        writer
            .write_record(&self.headers)
            .context("Writing output headers")?;
        for (idx, row) in self.rows.iter().enumerate() {
            writer
                .write_record(row)
                .with_context(|| format!("Writing output row {}", idx + 2))?;
        }
        writer.flush().context("Flushing output writer")?;
        Ok(())
    }
}

/// Names blank header cells `Unnamed: <n>` and suffixes repeated names with
/// `.1`, `.2`, ... so every column can be addressed by name.
fn normalize_headers(raw: Vec<String>) -> Vec<String> {
    let named = raw
        .into_iter()
        .enumerate()
        .map(|(idx, header)| {
            if header.is_empty() {
                format!("{PLACEHOLDER_PREFIX} {idx}")
            } else {
                header
            }
        })
        .collect::<Vec<_>>();

    let mut seen: HashSet<String> = named.iter().cloned().collect();
    let mut emitted: HashSet<String> = HashSet::new();
    let mut headers = Vec::with_capacity(named.len());
    for header in named {
        if emitted.insert(header.clone()) {
            headers.push(header);
            continue;
        }
        let mut counter = 1usize;
        let mut candidate = format!("{header}.{counter}");
        while seen.contains(&candidate) {
            counter += 1;
            candidate = format!("{header}.{counter}");
        }
        seen.insert(candidate.clone());
        emitted.insert(candidate.clone());
        headers.push(candidate);
    }
    headers
}
