//! Terminal failures of the annotation pipeline.
//!
//! Each variant renders as the one-line message shown to the user; `main`
//! prints it and exits. I/O and parse failures that have no dedicated variant
//! travel as `anyhow` errors with context instead.

use std::path::PathBuf;

use thiserror::Error;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error("{} could not be found.", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("There was an issue connecting to {host}. Try again later.")]
    Connection {
        host: String,
        #[source]
        source: BoxedSource,
    },

    #[error(
        "Index value of {index} is too {}. Values must be in range [1,{count}].",
        direction(.index, .count)
    )]
    IndexOutOfRange { index: i64, count: usize },

    #[error("Column name '{column}' is not defined in the input file ({}).", .input.display())]
    ColumnNotFound { column: String, input: PathBuf },

    #[error("Input row is not valid.")]
    InvalidFormat { value: String },

    #[error("No complete rows remain in {}.", .input.display())]
    EmptyInput { input: PathBuf },

    #[error("Gene name query for batch {batch} failed: {source}")]
    QueryFailed {
        batch: usize,
        #[source]
        source: BoxedSource,
    },
}

fn direction(index: &i64, count: &usize) -> &'static str {
    if *index > 0 && *index as u64 > *count as u64 {
        "large"
    } else {
        "small"
    }
}

impl AnnotateError {
    pub fn connection(host: &str, source: anyhow::Error) -> Self {
        AnnotateError::Connection {
            host: host.to_string(),
            source: source.into(),
        }
    }

    pub fn query_failed(batch: usize, source: anyhow::Error) -> Self {
        AnnotateError::QueryFailed {
            batch,
            source: source.into(),
        }
    }
}
