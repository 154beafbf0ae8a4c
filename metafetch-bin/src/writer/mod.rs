//! Files produced from a [`BatchResult`]
mod json;
mod tsv;

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};
use log::info;
use metafetch_lib::BatchResult;

pub(crate) use tsv::{FieldPath, load_fields, tsv_path};

fn create(path: &Path) -> Result<BufWriter<File>> {
    let file =
        File::create(path).with_context(|| format!("Cannot create `{}`", path.display()))?;
    Ok(BufWriter::new(file))
}

/// Write the JSON document to `output`
pub(crate) fn write_json(output: &Path, result: &BatchResult, indent: Option<usize>) -> Result<()> {
    let mut writer = create(output)?;
    json::write(&mut writer, result, indent)?;
    writer.flush()?;
    info!("Wrote {} result(s) to {}", result.len(), output.display());
    Ok(())
}

/// Write the metadata as TSV next to `output`
pub(crate) fn write_tsv(output: &Path, result: &BatchResult, fields: &[FieldPath]) -> Result<()> {
    let path = tsv_path(output);
    let writer = create(&path)?;
    tsv::write(writer, fields, result.metadata())
        .with_context(|| format!("Cannot write TSV to `{}`", path.display()))?;
    info!("Wrote {} row(s) to {}", result.metadata().len(), path.display());
    Ok(())
}
