//! The annotation pipeline: load, select, validate, resolve, merge, write.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    biomart::{GeneNameSource, MartDataset},
    cli::Cli,
    columns,
    error::AnnotateError,
    gene_id, io_utils, merge, resolve,
    table::Table,
};

pub fn execute(args: &Cli) -> Result<()> {
    let input_delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let input_encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;

    let table = Table::load(&args.input, input_delimiter, input_encoding)?;
    let selected = columns::select(&table, &args.column_selector(), &args.input)?;
    if table.row_count() == 0 {
        return Err(AnnotateError::EmptyInput {
            input: args.input.clone(),
        }
        .into());
    }
    gene_id::validate_first(&selected.values)?;

    let mart = MartDataset::connect(&args.host).map_err(|err| {
        debug!("Connecting to {}: {err:#}", args.host);
        AnnotateError::connection(&args.host, err)
    })?;
    let annotated = annotate(table, &selected.name, &selected.values, &mart)?;

    let output_delimiter = io_utils::resolve_output_delimiter(&args.output, input_delimiter);
    write_table(&annotated, &args.output, output_delimiter)?;
    info!(
        "Wrote {} row(s) across {} column(s) to {:?}",
        annotated.row_count(),
        annotated.column_count(),
        args.output
    );
    Ok(())
}

/// Resolves `ids` through `source` and joins the names onto `table`.
pub fn annotate<S>(table: Table, id_column: &str, ids: &[String], source: &S) -> Result<Table>
where
    S: GeneNameSource + ?Sized,
{
    let mapping = resolve::resolve(source, ids, id_column)?;
    merge::merge_gene_names(table, &mapping)
}

/// Writes next to `path` first and renames into place, so a failed write
/// never leaves a partial output file behind.
pub fn write_table(table: &Table, path: &Path, delimiter: u8) -> Result<()> {
    let staging = staging_path(path);
    let written = io_utils::create_csv_writer(&staging, delimiter)
        .and_then(|mut writer| table.write_to(&mut writer));
    if let Err(err) = written {
        let _ = fs::remove_file(&staging);
        return Err(err);
    }
    if let Err(err) = fs::rename(&staging, path) {
        let _ = fs::remove_file(&staging);
        return Err(err).with_context(|| format!("Moving {staging:?} into place at {path:?}"));
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}
