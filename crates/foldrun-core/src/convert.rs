//! mmCIF → PDB conversion for display.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{FoldError, Result};

/// Converts a structure file from one text format into another.
pub trait StructureConverter: Send + Sync {
    fn convert(&self, source: &Path, target: &Path) -> Result<()>;
}

/// Reads mmCIF (or PDB) with `pdbtbx` and writes a PDB file.
#[derive(Debug, Default, Clone)]
pub struct PdbtbxConverter;

fn utf8_path(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| FoldError::Conversion(format!("path {} is not valid UTF-8", path.display())))
}

impl StructureConverter for PdbtbxConverter {
    fn convert(&self, source: &Path, target: &Path) -> Result<()> {
        let (structure, warnings) = pdbtbx::open(utf8_path(source)?).map_err(|errors| {
            FoldError::Conversion(format!(
                "could not read {}: {}",
                source.display(),
                join_errors(&errors)
            ))
        })?;
        if !warnings.is_empty() {
            warn!(source = %source.display(), warnings = warnings.len(), "Structure read with warnings");
        }

        pdbtbx::save_pdb(&structure, utf8_path(target)?, pdbtbx::StrictnessLevel::Loose).map_err(
            |errors| {
                FoldError::Conversion(format!(
                    "could not write {}: {}",
                    target.display(),
                    join_errors(&errors)
                ))
            },
        )?;
        Ok(())
    }
}

fn join_errors<E: std::fmt::Display>(errors: &[E]) -> String {
    errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")
}

/// Output path for a converted structure: same stem, `.pdb` extension.
pub fn pdb_path_for(source: &Path) -> PathBuf {
    source.with_extension("pdb")
}

/// Convert `source` unless the `.pdb` next to it already exists.
///
/// Presence is the only check, so a stale output is never regenerated.
pub fn convert_cached(converter: &dyn StructureConverter, source: &Path) -> Result<PathBuf> {
    let target = pdb_path_for(source);
    if target.exists() {
        debug!(target = %target.display(), "Converted structure already present");
        return Ok(target);
    }
    converter.convert(source, &target)?;
    info!(source = %source.display(), target = %target.display(), "Converted structure");
    Ok(target)
}
