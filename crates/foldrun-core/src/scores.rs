//! Score bundles stored as NumPy `.npz` archives.
//!
//! An `.npz` file is a zip archive whose members are `.npy` arrays. Chai-1
//! writes one archive per candidate with at least:
//!
//! | Member | dtype | Meaning |
//! |--------|-------|---------|
//! | `aggregate_score` | float | overall ranking score, higher is better |
//! | `ptm` | float | predicted TM-score |
//! | `iptm` | float | interface predicted TM-score |
//! | `has_inter_chain_clashes` | bool, shape `(1,)` | hard exclusion flag |
//!
//! Every other member is kept as an opaque [`NpyArray`].

use std::collections::BTreeMap;
use std::io::Cursor;

use ndarray::{arr1, ArrayD, IxDyn, OwnedRepr};
use ndarray_npy::{NpzReader, NpzWriter, ReadNpyError, ReadNpzError, ReadableElement};
use serde::{Deserialize, Serialize};
use zip::ZipArchive;

use crate::error::{FoldError, Result};

pub const AGGREGATE_SCORE: &str = "aggregate_score";
pub const PTM: &str = "ptm";
pub const IPTM: &str = "iptm";
pub const HAS_INTER_CHAIN_CLASHES: &str = "has_inter_chain_clashes";

const CORE_FIELDS: [&str; 4] = [AGGREGATE_SCORE, PTM, IPTM, HAS_INTER_CHAIN_CLASHES];

/// Upper bound on the uncompressed size of one archive member.
pub const MAX_MEMBER_BYTES: u64 = 64 * 1024 * 1024;

/// A decoded `.npy` array, flattened to `f64` in C order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpyArray {
    pub shape: Vec<usize>,
    pub values: Vec<f64>,
}

impl NpyArray {
    pub fn first(&self) -> Option<f64> {
        self.values.first().copied()
    }

    fn to_ndarray(&self) -> Result<ArrayD<f64>> {
        ArrayD::from_shape_vec(IxDyn(&self.shape), self.values.clone()).map_err(|e| {
            FoldError::ScoreArchive(format!("shape {:?} does not fit {} values: {e}", self.shape, self.values.len()))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreBundle {
    pub aggregate_score: f64,
    pub ptm: f64,
    pub iptm: f64,
    pub has_inter_chain_clashes: bool,
    /// Non-core members, keyed by array name.
    #[serde(default)]
    pub extra: BTreeMap<String, NpyArray>,
}

impl ScoreBundle {
    pub fn new(aggregate_score: f64, ptm: f64, iptm: f64, has_inter_chain_clashes: bool) -> Self {
        Self {
            aggregate_score,
            ptm,
            iptm,
            has_inter_chain_clashes,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, name: impl Into<String>, array: NpyArray) -> Self {
        self.extra.insert(name.into(), array);
        self
    }

    /// First element of a named field, core or extra.
    pub fn field(&self, name: &str) -> Option<f64> {
        match name {
            AGGREGATE_SCORE => Some(self.aggregate_score),
            PTM => Some(self.ptm),
            IPTM => Some(self.iptm),
            HAS_INTER_CHAIN_CLASHES => Some(if self.has_inter_chain_clashes { 1.0 } else { 0.0 }),
            other => self.extra.get(other).and_then(NpyArray::first),
        }
    }

    pub fn from_npz(bytes: &[u8]) -> Result<Self> {
        check_member_sizes(bytes)?;

        let mut npz = NpzReader::new(Cursor::new(bytes)).map_err(|e| archive_error("archive", e))?;
        let names = npz.names().map_err(|e| archive_error("archive", e))?;

        let mut arrays = BTreeMap::new();
        for member in names {
            let array = read_member(&mut npz, &member)?;
            arrays.insert(member.trim_end_matches(".npy").to_string(), array);
        }

        let mut take = |name: &str| -> Result<f64> {
            arrays
                .remove(name)
                .and_then(|a| a.first())
                .ok_or_else(|| FoldError::ScoreArchive(format!("missing field {name}")))
        };

        let aggregate_score = take(AGGREGATE_SCORE)?;
        let ptm = take(PTM)?;
        let iptm = take(IPTM)?;
        let has_inter_chain_clashes = take(HAS_INTER_CHAIN_CLASHES)? != 0.0;

        Ok(Self {
            aggregate_score,
            ptm,
            iptm,
            has_inter_chain_clashes,
            extra: arrays,
        })
    }

    /// Encode as an uncompressed `.npz` archive.
    pub fn to_npz(&self) -> Result<Vec<u8>> {
        let mut npz = NpzWriter::new(Cursor::new(Vec::new()));
        let write_error = |name: &str, e: ndarray_npy::WriteNpzError| {
            FoldError::ScoreArchive(format!("member {name}: {e}"))
        };

        for (name, value) in [(AGGREGATE_SCORE, self.aggregate_score), (PTM, self.ptm), (IPTM, self.iptm)] {
            npz.add_array(name, &arr1(&[value])).map_err(|e| write_error(name, e))?;
        }
        npz.add_array(HAS_INTER_CHAIN_CLASHES, &arr1(&[self.has_inter_chain_clashes]))
            .map_err(|e| write_error(HAS_INTER_CHAIN_CLASHES, e))?;

        for (name, array) in &self.extra {
            if CORE_FIELDS.contains(&name.as_str()) {
                continue;
            }
            npz.add_array(name.as_str(), &array.to_ndarray()?)
                .map_err(|e| write_error(name.as_str(), e))?;
        }

        let cursor = npz.finish().map_err(|e| write_error("archive", e))?;
        Ok(cursor.into_inner())
    }
}

fn archive_error(name: &str, err: ReadNpzError) -> FoldError {
    FoldError::ScoreArchive(format!("member {name}: {err}"))
}

/// Reject archives whose members declare more than [`MAX_MEMBER_BYTES`].
fn check_member_sizes(bytes: &[u8]) -> Result<()> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    for i in 0..archive.len() {
        let member = archive.by_index_raw(i)?;
        if member.size() > MAX_MEMBER_BYTES {
            return Err(FoldError::ScoreArchive(format!(
                "member {} declares {} bytes, limit is {MAX_MEMBER_BYTES}",
                member.name(),
                member.size()
            )));
        }
    }
    Ok(())
}

/// Read one member whatever its dtype, widening every element to `f64`.
fn read_member(npz: &mut NpzReader<Cursor<&[u8]>>, name: &str) -> Result<NpyArray> {
    if let Some(a) = read_as::<f64>(npz, name, |v| v)? {
        return Ok(a);
    }
    if let Some(a) = read_as::<f32>(npz, name, f64::from)? {
        return Ok(a);
    }
    if let Some(a) = read_as::<bool>(npz, name, |v| if v { 1.0 } else { 0.0 })? {
        return Ok(a);
    }
    if let Some(a) = read_as::<i64>(npz, name, |v| v as f64)? {
        return Ok(a);
    }
    if let Some(a) = read_as::<i32>(npz, name, f64::from)? {
        return Ok(a);
    }
    if let Some(a) = read_as::<i16>(npz, name, f64::from)? {
        return Ok(a);
    }
    if let Some(a) = read_as::<i8>(npz, name, f64::from)? {
        return Ok(a);
    }
    if let Some(a) = read_as::<u64>(npz, name, |v| v as f64)? {
        return Ok(a);
    }
    if let Some(a) = read_as::<u32>(npz, name, f64::from)? {
        return Ok(a);
    }
    if let Some(a) = read_as::<u16>(npz, name, f64::from)? {
        return Ok(a);
    }
    if let Some(a) = read_as::<u8>(npz, name, f64::from)? {
        return Ok(a);
    }
    Err(FoldError::ScoreArchive(format!("member {name}: unsupported dtype")))
}

/// `Ok(None)` when the member is stored with another dtype.
fn read_as<T>(
    npz: &mut NpzReader<Cursor<&[u8]>>,
    name: &str,
    widen: fn(T) -> f64,
) -> Result<Option<NpyArray>>
where
    T: ReadableElement + Copy,
{
    match npz.by_name::<OwnedRepr<T>, IxDyn>(name) {
        Ok(array) => Ok(Some(NpyArray {
            shape: array.shape().to_vec(),
            values: array.iter().copied().map(widen).collect(),
        })),
        Err(ReadNpzError::Npy(ReadNpyError::WrongDescriptor(_))) => Ok(None),
        Err(e) => Err(archive_error(name, e)),
    }
}
