//! On-disk artifacts for the vector index.
//!
//! Two files, produced by the same build and loaded together:
//! - a binary index file (header + row-major f32 data),
//! - a JSON identity map `{"0": "name", ...}` keyed by row index.
//!
//! Binary layout:
//! - 8 bytes: magic "TOOLRIDX"
//! - 4 bytes: version (u32 LE)
//! - 32 bytes: catalog hash (SHA-256)
//! - 8 bytes: rows (u64 LE)
//! - 8 bytes: dim (u64 LE)
//! - rows*dim*4 bytes: f32 LE, row-major

use crate::error::{AppError, Result};
use crate::index::{FlatIndex, VectorIndex};
use ndarray::Array2;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const INDEX_MAGIC: &[u8; 8] = b"TOOLRIDX";
const INDEX_VERSION: u32 = 1;

/// Write both artifacts. The identity map is keyed by the row index as
/// a decimal string, matching the external interface contract.
pub fn save_vector_index(
    vector_index: &VectorIndex,
    index_path: &Path,
    mapping_path: &Path,
) -> Result<()> {
    vector_index.validate()?;

    if let Some(parent) = index_path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            AppError::IndexLoad(format!("failed to create index directory: {}", e))
        })?;
    }

    let file = File::create(index_path)
        .map_err(|e| AppError::IndexLoad(format!("failed to create index file: {}", e)))?;
    let mut writer = BufWriter::new(file);

    let write_err =
        |e: std::io::Error| AppError::IndexLoad(format!("failed to write index file: {}", e));

    writer.write_all(INDEX_MAGIC).map_err(write_err)?;
    writer
        .write_all(&INDEX_VERSION.to_le_bytes())
        .map_err(write_err)?;
    writer
        .write_all(&vector_index.catalog_hash)
        .map_err(write_err)?;
    writer
        .write_all(&(vector_index.index.rows() as u64).to_le_bytes())
        .map_err(write_err)?;
    writer
        .write_all(&(vector_index.index.dim() as u64).to_le_bytes())
        .map_err(write_err)?;

    let data = vector_index.index.vectors().as_slice().ok_or_else(|| {
        AppError::IndexLoad("index vectors not contiguous".to_string())
    })?;
    for &val in data {
        writer.write_all(&val.to_le_bytes()).map_err(write_err)?;
    }
    writer.flush().map_err(write_err)?;

    let mapping: BTreeMap<String, &str> = vector_index
        .names
        .iter()
        .enumerate()
        .map(|(i, name)| (i.to_string(), name.as_str()))
        .collect();
    let mapping_json = serde_json::to_string_pretty(&mapping)
        .map_err(|e| AppError::IndexLoad(format!("failed to encode identity map: {}", e)))?;
    fs::write(mapping_path, mapping_json)
        .map_err(|e| AppError::IndexLoad(format!("failed to write identity map: {}", e)))?;

    tracing::info!(
        index = %index_path.display(),
        mapping = %mapping_path.display(),
        rows = vector_index.index.rows(),
        dim = vector_index.index.dim(),
        "Vector index saved"
    );
    Ok(())
}

/// Load both artifacts and validate that they belong together.
/// A row-count/mapping-length mismatch is a fatal inconsistency.
pub fn load_vector_index(index_path: &Path, mapping_path: &Path) -> Result<VectorIndex> {
    let file = File::open(index_path)
        .map_err(|e| AppError::IndexLoad(format!("cannot open {}: {}", index_path.display(), e)))?;
    let mut reader = BufReader::new(file);

    let read_err =
        |e: std::io::Error| AppError::IndexLoad(format!("failed to read index file: {}", e));

    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic).map_err(read_err)?;
    if &magic != INDEX_MAGIC {
        return Err(AppError::IndexLoad(format!(
            "{} is not a vector index artifact",
            index_path.display()
        )));
    }

    let mut version_bytes = [0u8; 4];
    reader.read_exact(&mut version_bytes).map_err(read_err)?;
    let version = u32::from_le_bytes(version_bytes);
    if version != INDEX_VERSION {
        return Err(AppError::IndexLoad(format!(
            "unsupported index version {} (expected {})",
            version, INDEX_VERSION
        )));
    }

    let mut catalog_hash = [0u8; 32];
    reader.read_exact(&mut catalog_hash).map_err(read_err)?;

    let mut rows_bytes = [0u8; 8];
    reader.read_exact(&mut rows_bytes).map_err(read_err)?;
    let rows = u64::from_le_bytes(rows_bytes) as usize;

    let mut dim_bytes = [0u8; 8];
    reader.read_exact(&mut dim_bytes).map_err(read_err)?;
    let dim = u64::from_le_bytes(dim_bytes) as usize;

    let mut data = vec![0f32; rows * dim];
    for val in &mut data {
        let mut bytes = [0u8; 4];
        reader.read_exact(&mut bytes).map_err(read_err)?;
        *val = f32::from_le_bytes(bytes);
    }

    let vectors = Array2::from_shape_vec((rows, dim), data)
        .map_err(|e| AppError::IndexLoad(format!("failed to reshape index data: {}", e)))?;

    let mapping_raw = fs::read_to_string(mapping_path).map_err(|e| {
        AppError::IndexLoad(format!("cannot read {}: {}", mapping_path.display(), e))
    })?;
    let mapping: BTreeMap<String, String> = serde_json::from_str(&mapping_raw).map_err(|e| {
        AppError::IndexLoad(format!("cannot parse {}: {}", mapping_path.display(), e))
    })?;

    let mut names = vec![String::new(); mapping.len()];
    for (key, name) in mapping {
        let row: usize = key.parse().map_err(|_| {
            AppError::IndexMismatch(format!("identity map has non-numeric row key {:?}", key))
        })?;
        if row >= names.len() {
            return Err(AppError::IndexMismatch(format!(
                "identity map row {} out of range for {} entries",
                row,
                names.len()
            )));
        }
        names[row] = name;
    }

    let vector_index = VectorIndex {
        index: FlatIndex::new(vectors),
        names,
        catalog_hash,
    };
    vector_index.validate()?;

    tracing::info!(
        index = %index_path.display(),
        rows = vector_index.index.rows(),
        dim = vector_index.index.dim(),
        "Vector index loaded"
    );
    Ok(vector_index)
}
