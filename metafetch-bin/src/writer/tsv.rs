//! Tab-separated export of the fetched metadata.
//!
//! Columns are selected with dotted field paths like `owners.[].emailAddress`.
//! A `[]` segment expects an array and joins the value of the remaining path
//! for each element with `,`.

use std::{
    fmt::{self, Display},
    fs,
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result, bail};
use serde_json::Value;

const ARRAY_SEGMENT: &str = "[]";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Field(String),
    Array,
}

/// A dotted path into a metadata object
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FromStr for FieldPath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = s.trim();
        // `owners[].name` is accepted as well as `owners.[].name`
        let segments: Vec<Segment> = raw
            .replace(ARRAY_SEGMENT, &format!(".{ARRAY_SEGMENT}."))
            .split('.')
            .filter(|segment| !segment.is_empty())
            .map(|segment| match segment {
                ARRAY_SEGMENT => Segment::Array,
                field => Segment::Field(field.to_string()),
            })
            .collect();

        if segments.is_empty() {
            bail!("Empty field path `{s}`");
        }
        Ok(FieldPath {
            raw: raw.to_string(),
            segments,
        })
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FieldPath {
    /// Render the value at this path, or an empty string if it is missing
    pub(crate) fn extract(&self, data: &Value) -> String {
        extract(data, &self.segments)
    }
}

fn extract(data: &Value, segments: &[Segment]) -> String {
    let mut current = data;
    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Array => {
                let Value::Array(items) = current else {
                    return String::new();
                };
                let rest = &segments[i + 1..];
                return items
                    .iter()
                    .map(|item| extract(item, rest))
                    .collect::<Vec<_>>()
                    .join(",");
            }
            Segment::Field(name) => match current.get(name) {
                Some(value) => current = value,
                None => return String::new(),
            },
        }
    }
    render(current)
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read field paths from a file, one per line. Blank lines are skipped.
pub(crate) fn load_fields(path: &Path) -> Result<Vec<FieldPath>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Cannot read TSV fields from `{}`", path.display()))?;
    let fields = contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(FieldPath::from_str)
        .collect::<Result<Vec<_>>>()?;
    if fields.is_empty() {
        bail!("No TSV fields in `{}`", path.display());
    }
    Ok(fields)
}

/// The TSV file belonging to a JSON output, e.g. `out.tsv` for `out.json`
pub(crate) fn tsv_path(output: &Path) -> PathBuf {
    output.with_extension("tsv")
}

/// Write a header row and one row per metadata object
pub(crate) fn write<W: Write>(writer: W, fields: &[FieldPath], metadata: &[Value]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_writer(writer);

    writer.write_record(fields.iter().map(ToString::to_string))?;
    for data in metadata {
        writer.write_record(fields.iter().map(|field| field.extract(data)))?;
    }
    writer.flush()?;
    Ok(())
}
