pub mod annotate;
pub mod biomart;
pub mod cli;
pub mod columns;
pub mod error;
pub mod gene_id;
pub mod io_utils;
pub mod merge;
pub mod resolve;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::{LevelFilter, debug};

use crate::cli::Cli;

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("ensembl_gene_names", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    debug!("Arguments: {:?}", cli);
    annotate::execute(&cli)?;
    println!("Done!");
    Ok(())
}
