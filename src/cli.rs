use std::path::PathBuf;

use clap::Parser;

use crate::{biomart::DEFAULT_HOST, columns::ColumnSelector};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Annotate a CSV column of Ensembl gene stable IDs with gene names",
    long_about = None
)]
pub struct Cli {
    /// The .csv file, which contains a column with Ensembl gene IDs
    pub input: PathBuf,
    /// Output file
    #[arg(short, long, default_value = "output.csv")]
    pub output: PathBuf,
    /// Column name for the Ensembl ID list
    #[arg(short, long, conflicts_with = "index")]
    pub name: Option<String>,
    /// Column index for the Ensembl ID list (1-indexed)
    #[arg(short, long, default_value_t = 1, allow_negative_numbers = true)]
    pub index: i64,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
    /// BioMart host to query
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,
}

impl Cli {
    pub fn column_selector(&self) -> ColumnSelector {
        match &self.name {
            Some(name) => ColumnSelector::Name(name.clone()),
            None => ColumnSelector::Index(self.index),
        }
    }
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
