//! CSV library format.
//!
//! ```text
//! <name>,<v0>,<v1>,...,<v_{D-1}>
//! ```
//!
//! One identity per line, comma-delimited. Numeric fields may be padded with
//! whitespace; names are taken verbatim. Values are written with the shortest
//! representation that parses back to the same `f32`, so export then import
//! reproduces the library exactly.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use super::BuildReport;
use crate::error::{LibraryError, SkipReason};
use crate::library::IdentityLibrary;
use crate::types::Embedding;

const DELIMITER: char = ',';

/// Load a library from a CSV file.
pub fn build_from_csv(path: &Path) -> Result<(IdentityLibrary, BuildReport), LibraryError> {
    if !path.is_file() {
        tracing::error!(path = %path.display(), "face library CSV does not exist");
        return Err(LibraryError::SourceNotFound(path.to_path_buf()));
    }

    let file = File::open(path)?;
    let (library, mut report) = read_csv(BufReader::new(file))?;
    report.source = path.to_path_buf();
    report.log();
    Ok((library, report))
}

/// Load a library from any line-oriented reader.
///
/// Each line stands alone: a bad line is recorded in the report and the next
/// line is read. Only reader I/O failures abort.
pub fn read_csv<R: BufRead>(reader: R) -> Result<(IdentityLibrary, BuildReport), LibraryError> {
    let mut library = IdentityLibrary::new();
    let mut report = BuildReport::default();

    for (idx, raw) in reader.split(b'\n').enumerate() {
        let raw = raw?;
        let location = format!("line {}", idx + 1);

        let Ok(line) = std::str::from_utf8(&raw) else {
            report.records_seen += 1;
            report.skip(location, SkipReason::Malformed("line is not valid UTF-8".into()));
            continue;
        };
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            continue;
        }
        report.records_seen += 1;

        let (name, embedding) = match parse_record(line, library.dimension()) {
            Ok(record) => record,
            Err(reason) => {
                report.skip(location, reason);
                continue;
            }
        };

        tracing::debug!(name, dim = embedding.dim(), "loaded identity");
        library.insert(name, embedding)?;
        report.entries_added += 1;
    }

    Ok((library, report))
}

/// Parse one `name,v0,...` record. `expected_dim` is the library's
/// established dimensionality, if any.
fn parse_record(line: &str, expected_dim: Option<usize>) -> Result<(&str, Embedding), SkipReason> {
    let (name, rest) = line
        .split_once(DELIMITER)
        .ok_or_else(|| SkipReason::Malformed("no embedding components".into()))?;
    if name.trim().is_empty() {
        return Err(SkipReason::Malformed("empty identity name".into()));
    }

    let embedding = parse_embedding(rest)?;
    if let Some(expected) = expected_dim {
        if embedding.dim() != expected {
            return Err(SkipReason::Malformed(format!(
                "expected {expected} components, got {}",
                embedding.dim()
            )));
        }
    }

    Ok((name, embedding))
}

/// Parse a comma-separated list of finite numbers into an embedding.
pub fn parse_embedding(fields: &str) -> Result<Embedding, SkipReason> {
    let values = fields
        .split(DELIMITER)
        .enumerate()
        .map(|(i, field)| {
            let field = field.trim();
            match field.parse::<f32>() {
                Ok(v) if v.is_finite() => Ok(v),
                Ok(_) => Err(SkipReason::Malformed(format!(
                    "component {i} is not finite: {field:?}"
                ))),
                Err(_) => Err(SkipReason::Malformed(format!(
                    "component {i} is not a number: {field:?}"
                ))),
            }
        })
        .collect::<Result<Vec<f32>, SkipReason>>()?;

    Ok(Embedding::new(values))
}

/// Serialize a library in the CSV format, one line per entry in insertion order.
pub fn write_csv<W: Write>(library: &IdentityLibrary, mut writer: W) -> Result<(), LibraryError> {
    for entry in library {
        if entry.name.contains([DELIMITER, '\n', '\r']) {
            return Err(LibraryError::InvalidEntry(format!(
                "name {:?} cannot be written as a CSV field",
                entry.name
            )));
        }

        write!(writer, "{}", entry.name)?;
        for v in entry.embedding.as_slice() {
            write!(writer, "{DELIMITER}{v}")?;
        }
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a library to `path`, replacing any existing file.
pub fn save_csv(library: &IdentityLibrary, path: &Path) -> Result<(), LibraryError> {
    let file = File::create(path)?;
    write_csv(library, BufWriter::new(file))?;
    tracing::info!(path = %path.display(), entries = library.len(), "face library saved");
    Ok(())
}
