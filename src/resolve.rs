//! Batched resolution of gene stable IDs into gene names.
//!
//! IDs are looked up in consecutive batches of [`BATCH_SIZE`]. A batch that
//! contains any versioned ID (`ENSG00000139618.15`) is queried by bare IDs,
//! and the full original IDs are put back afterwards. The service answers
//! with rows sorted by bare ID, so the sorted originals line up with the
//! returned rows position by position. That pairing is checked; when it does
//! not hold (duplicate or unknown IDs in the batch) each original ID is
//! matched to the name returned for its bare form instead.

use std::collections::HashMap;

use itertools::Itertools;
use log::{debug, info, warn};

use crate::{
    biomart::{GeneNameSource, GeneRecord},
    error::AnnotateError,
    gene_id,
};

pub const BATCH_SIZE: usize = 250;

/// ID to name pairs for every resolved ID, in batch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneMapping {
    /// Name of the input column the IDs were read from.
    pub id_column: String,
    pub records: Vec<GeneRecord>,
}

pub fn resolve<S>(source: &S, ids: &[String], id_column: &str) -> Result<GeneMapping, AnnotateError>
where
    S: GeneNameSource + ?Sized,
{
    let batches = ids.len().div_ceil(BATCH_SIZE);
    info!(
        "Finding gene names for {} ID(s) in {} batch(es)",
        ids.len(),
        batches
    );
    let mut records = Vec::with_capacity(ids.len());
    for (idx, batch) in ids.chunks(BATCH_SIZE).enumerate() {
        let resolved = resolve_batch(source, batch)
            .map_err(|err| AnnotateError::query_failed(idx + 1, err))?;
        debug!(
            "Batch {}/{}: {} ID(s) -> {} record(s)",
            idx + 1,
            batches,
            batch.len(),
            resolved.len()
        );
        records.extend(resolved);
    }
    Ok(GeneMapping {
        id_column: id_column.to_string(),
        records,
    })
}

pub fn resolve_batch<S>(source: &S, batch: &[String]) -> anyhow::Result<Vec<GeneRecord>>
where
    S: GeneNameSource + ?Sized,
{
    if !batch.iter().any(|id| gene_id::is_versioned(id)) {
        return source.lookup(batch);
    }

    let query = batch.iter().map(|id| gene_id::bare_id(id)).collect::<Vec<_>>();
    let returned = source.lookup(&query)?;
    let originals = batch.iter().cloned().sorted().collect::<Vec<_>>();
    Ok(restore_versions(originals, returned))
}

/// Replaces returned bare IDs with the sorted original IDs.
fn restore_versions(originals: Vec<String>, returned: Vec<GeneRecord>) -> Vec<GeneRecord> {
    let aligned = originals.len() == returned.len()
        && originals
            .iter()
            .zip(&returned)
            .all(|(original, record)| gene_id::bare_id(original) == record.id);
    if aligned {
        return originals
            .into_iter()
            .zip(returned)
            .map(|(id, record)| GeneRecord {
                id,
                name: record.name,
            })
            .collect();
    }

    warn!(
        "{} versioned ID(s) do not line up with {} returned row(s); matching by bare ID",
        originals.len(),
        returned.len()
    );
    let mut names: HashMap<String, String> = HashMap::new();
    for record in returned {
        names.entry(record.id).or_insert(record.name);
    }
    originals
        .into_iter()
        .dedup()
        .filter_map(|id| {
            names
                .get(&gene_id::bare_id(&id))
                .map(|name| GeneRecord::new(id.clone(), name.clone()))
        })
        .collect()
}
