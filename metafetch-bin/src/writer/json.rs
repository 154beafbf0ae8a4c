use std::io::Write;

use anyhow::{Context, Result};
use metafetch_lib::BatchResult;
use serde::Serialize;
use serde_json::ser::{CompactFormatter, PrettyFormatter, Serializer};

/// Serialize the batch result as `{"metadata": [...], "errors": [...]}`.
///
/// With `indent` the document is pretty-printed with that many spaces per
/// level; without it the output is compact.
pub(crate) fn write<W: Write>(writer: W, result: &BatchResult, indent: Option<usize>) -> Result<()> {
    match indent {
        Some(width) => {
            let indent = " ".repeat(width);
            let mut serializer =
                Serializer::with_formatter(writer, PrettyFormatter::with_indent(indent.as_bytes()));
            result.serialize(&mut serializer)
        }
        None => {
            let mut serializer = Serializer::with_formatter(writer, CompactFormatter);
            result.serialize(&mut serializer)
        }
    }
    .context("Cannot serialize results as JSON")
}
