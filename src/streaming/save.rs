//! Persistence of per-column block overrides
//!
//! Only player edits are persisted; terrain is regenerated from the seed.
//! [`FileSaveStore`] writes one lz4-compressed rkyv archive per column.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use glam::IVec3;
use parking_lot::Mutex;
use rkyv::{Archive, Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::Result;
use crate::voxel::block::{BlockRecord, BlockType};
use crate::voxel::column::ColumnPos;

/// Load/save collaborator for column overrides.
pub trait SaveCollaborator: Send + Sync {
    /// Overrides saved for a column, None if it was never saved.
    fn load(&self, pos: ColumnPos) -> Result<Option<Vec<BlockRecord>>>;

    /// Persist a column's overrides. Callers skip empty sets.
    fn save(&self, pos: ColumnPos, overrides: &[BlockRecord]) -> Result<()>;
}

/// In-memory store, for tests and sessions that need no persistence.
#[derive(Debug, Default)]
pub struct MemorySaveStore {
    columns: Mutex<HashMap<ColumnPos, Vec<BlockRecord>>>,
}

impl MemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of columns with saved overrides.
    pub fn len(&self) -> usize {
        self.columns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.lock().is_empty()
    }
}

impl SaveCollaborator for MemorySaveStore {
    fn load(&self, pos: ColumnPos) -> Result<Option<Vec<BlockRecord>>> {
        Ok(self.columns.lock().get(&pos).cloned())
    }

    fn save(&self, pos: ColumnPos, overrides: &[BlockRecord]) -> Result<()> {
        self.columns.lock().insert(pos, overrides.to_vec());
        Ok(())
    }
}

/// Archived override record
#[derive(Archive, Deserialize, Serialize)]
struct OverrideData {
    x: i32,
    y: i32,
    z: i32,
    block: u8,
}

/// Archived column overrides
#[derive(Archive, Deserialize, Serialize)]
pub struct ColumnOverrideData {
    pub column_x: i32,
    pub column_z: i32,
    overrides: Vec<OverrideData>,
}

/// Serialize a column's overrides to bytes (uncompressed)
pub fn serialize_overrides(pos: ColumnPos, overrides: &[BlockRecord]) -> Result<Vec<u8>> {
    let data = ColumnOverrideData {
        column_x: pos.x,
        column_z: pos.z,
        overrides: overrides
            .iter()
            .map(|r| OverrideData {
                x: r.position.x,
                y: r.position.y,
                z: r.position.z,
                block: r.block.to_id(),
            })
            .collect(),
    };

    let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(&data)
        .map_err(|e| Error::Storage(e.to_string()))?;
    Ok(bytes.to_vec())
}

/// Deserialize column overrides from bytes (uncompressed)
pub fn deserialize_overrides(data: &[u8]) -> Result<(ColumnPos, Vec<BlockRecord>)> {
    let archived = rkyv::access::<ArchivedColumnOverrideData, rkyv::rancor::Error>(data)
        .map_err(|e| Error::Storage(e.to_string()))?;
    let data: ColumnOverrideData =
        rkyv::deserialize::<ColumnOverrideData, rkyv::rancor::Error>(archived)
            .map_err(|e| Error::Storage(e.to_string()))?;

    let records = data
        .overrides
        .into_iter()
        .map(|o| BlockRecord::new(IVec3::new(o.x, o.y, o.z), BlockType::from_id(o.block)))
        .collect();
    Ok((ColumnPos::new(data.column_x, data.column_z), records))
}

/// Get the file path for a column's overrides
pub fn column_path(base_dir: &Path, pos: ColumnPos) -> PathBuf {
    // Bucket by x to keep directories small: base_dir/x_{x}/column_{x}_{z}.rko
    base_dir
        .join(format!("x_{}", pos.x))
        .join(format!("column_{}_{}.rko", pos.x, pos.z))
}

/// Directory-backed store, one compressed file per column.
#[derive(Debug, Clone)]
pub struct FileSaveStore {
    base_dir: PathBuf,
}

impl FileSaveStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

impl SaveCollaborator for FileSaveStore {
    fn load(&self, pos: ColumnPos) -> Result<Option<Vec<BlockRecord>>> {
        let path = column_path(&self.base_dir, pos);
        let compressed = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let bytes = lz4_flex::decompress_size_prepended(&compressed)
            .map_err(|e| Error::Storage(format!("LZ4 decompression failed: {}", e)))?;
        let (stored, records) = deserialize_overrides(&bytes)?;
        if stored != pos {
            return Err(Error::Storage(format!(
                "{} holds column {:?}, expected {:?}",
                path.display(),
                stored,
                pos
            )));
        }
        Ok(Some(records))
    }

    fn save(&self, pos: ColumnPos, overrides: &[BlockRecord]) -> Result<()> {
        let path = column_path(&self.base_dir, pos);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let compressed = lz4_flex::compress_prepend_size(&serialize_overrides(pos, overrides)?);
        std::fs::write(&path, compressed)?;
        log::debug!("Saved {} overrides for column {:?}", overrides.len(), pos);
        Ok(())
    }
}
