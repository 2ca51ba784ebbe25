//! FASTA input handling.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{FoldError, Result};
use crate::run_id::short_token;
use crate::store::ArtifactStore;

/// Prefix of a FASTA record marker line.
pub const RECORD_MARKER: char = '>';

/// Identifier used when the caller supplies none.
pub const DEFAULT_RECORD_NAME: &str = "PROTEIN";

/// Subfolder of the inputs store holding FASTA files.
pub const FASTA_DIR: &str = "fasta";

/// Used when an empty sequence is submitted.
pub const EXAMPLE_FASTA: &str = ">protein|name=example-protein\nAGSHSMRYFSTSVSRPGRGEPRFIAVGYVDDTQFVRFD";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FastaRecord {
    pub header: String,
    pub sequence: String,
}

/// Normalise raw sequence text into FASTA.
///
/// Surrounding whitespace is trimmed and line breaks are preserved. If the
/// first line is not a record marker, `>{name}` is prepended. Blank input
/// yields [`EXAMPLE_FASTA`].
pub fn normalize_fasta(raw: &str, name: Option<&str>) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        debug!("Empty sequence submitted, using example input");
        return Ok(EXAMPLE_FASTA.to_string());
    }

    let content = if trimmed.starts_with(RECORD_MARKER) {
        trimmed.to_string()
    } else {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(DEFAULT_RECORD_NAME);
        format!("{RECORD_MARKER}{name}\n{trimmed}")
    };

    parse_records(&content)?;
    Ok(content)
}

/// Split FASTA text into records, rejecting markers without sequence data.
pub fn parse_records(content: &str) -> Result<Vec<FastaRecord>> {
    let mut records: Vec<FastaRecord> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix(RECORD_MARKER) {
            records.push(FastaRecord {
                header: header.trim().to_string(),
                sequence: String::new(),
            });
        } else {
            let Some(current) = records.last_mut() else {
                return Err(FoldError::InvalidInput(
                    "sequence data found before the first record marker".to_string(),
                ));
            };
            current.sequence.push_str(line);
        }
    }

    if records.is_empty() {
        return Err(FoldError::InvalidInput("no FASTA records found".to_string()));
    }
    if let Some(empty) = records.iter().find(|r| r.sequence.is_empty()) {
        return Err(FoldError::InvalidInput(format!(
            "record {:?} has no sequence data",
            empty.header
        )));
    }

    Ok(records)
}

/// Normalise `sequence` and persist it as `fasta/chai1_{token}_input.fasta`.
///
/// Returns the file name (without the `fasta/` prefix) for later use with
/// the pipeline.
pub async fn create_fasta_file(
    store: &dyn ArtifactStore,
    sequence: &str,
    name: Option<&str>,
) -> Result<String> {
    let content = normalize_fasta(sequence, name)?;
    let file_name = format!("chai1_{}_input.fasta", short_token());
    store
        .write(&format!("{FASTA_DIR}/{file_name}"), content.as_bytes())
        .await?;
    info!(file = %file_name, "Created FASTA file");
    Ok(file_name)
}
