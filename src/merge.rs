//! Joins resolved gene names back onto the input table.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use log::info;

use crate::{
    resolve::GeneMapping,
    table::{GENE_NAME_COLUMN, Table},
};

/// Left-joins `mapping` onto `table` by the mapping's ID column and places
/// `Gene name` directly to the right of it. Every row is kept exactly once;
/// IDs without a match get an empty name, and an ID with several names takes
/// the first one returned.
pub fn merge_gene_names(mut table: Table, mapping: &GeneMapping) -> Result<Table> {
    let position = table.column_index(&mapping.id_column).ok_or_else(|| {
        anyhow!(
            "Column '{}' is missing from the table being annotated",
            mapping.id_column
        )
    })?;

    let mut names: HashMap<&str, &str> = HashMap::with_capacity(mapping.records.len());
    for record in &mapping.records {
        names
            .entry(record.id.as_str())
            .or_insert(record.name.as_str());
    }

    let mut matched = 0usize;
    let values = table
        .column_values(position)
        .iter()
        .map(|id| match names.get(id.as_str()) {
            Some(name) => {
                matched += 1;
                name.to_string()
            }
            None => String::new(),
        })
        .collect::<Vec<_>>();

    table.insert_column(position + 1, GENE_NAME_COLUMN, values)?;
    table.blank_placeholder_headers();
    info!(
        "Matched gene names for {} of {} row(s)",
        matched,
        table.row_count()
    );
    Ok(table)
}
