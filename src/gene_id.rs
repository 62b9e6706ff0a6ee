//! Shape checks for Ensembl gene stable IDs.

use std::sync::OnceLock;

use log::debug;
use regex::Regex;

use crate::error::AnnotateError;

/// Length of an unversioned ID: `ENSG` plus eleven digits.
pub const BARE_ID_LEN: usize = 15;

static GENE_ID_PATTERN: OnceLock<Regex> = OnceLock::new();

fn gene_id_pattern() -> &'static Regex {
    GENE_ID_PATTERN.get_or_init(|| {
        Regex::new(r"^ENSG[0-9]{11}(\.[0-9]+)?$").expect("gene ID pattern is valid")
    })
}

pub fn is_gene_id(value: &str) -> bool {
    gene_id_pattern().is_match(value)
}

pub fn is_versioned(id: &str) -> bool {
    id.chars().count() > BARE_ID_LEN
}

/// First fifteen characters of `id`, surrounding whitespace stripped.
pub fn bare_id(id: &str) -> String {
    let prefix: String = id.chars().take(BARE_ID_LEN).collect();
    prefix.trim().to_string()
}

/// Only the first value is inspected; later rows are not checked.
pub fn validate_first(values: &[String]) -> Result<(), AnnotateError> {
    match values.first() {
        Some(first) if is_gene_id(first) => Ok(()),
        Some(first) => {
            debug!("First value '{first}' is not an Ensembl gene ID");
            Err(AnnotateError::InvalidFormat {
                value: first.clone(),
            })
        }
        None => Err(AnnotateError::InvalidFormat {
            value: String::new(),
        }),
    }
}
