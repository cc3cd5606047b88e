//! Deduplicated FIFO of chunk keys, used for the bake and unload queues

use std::collections::{HashMap, HashSet, VecDeque};

use crate::voxel::chunk::ChunkKey;
use crate::voxel::column::ColumnPos;

#[derive(Debug, Default)]
pub struct ChunkQueue {
    order: VecDeque<ChunkKey>,
    members: HashSet<ChunkKey>,
    /// Queued chunk count per column
    columns: HashMap<ColumnPos, usize>,
}

impl ChunkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk. Returns false if it is already queued.
    pub fn push(&mut self, key: ChunkKey) -> bool {
        if !self.members.insert(key) {
            return false;
        }
        *self.columns.entry(key.column).or_default() += 1;
        self.order.push_back(key);
        true
    }

    pub fn pop(&mut self) -> Option<ChunkKey> {
        while let Some(key) = self.order.pop_front() {
            if self.remove(key) {
                return Some(key);
            }
        }
        None
    }

    /// Cancel one queued chunk. Its stale entry is skipped by `pop`.
    pub fn remove(&mut self, key: ChunkKey) -> bool {
        if !self.members.remove(&key) {
            return false;
        }
        if let Some(count) = self.columns.get_mut(&key.column) {
            *count -= 1;
            if *count == 0 {
                self.columns.remove(&key.column);
            }
        }
        true
    }

    /// Cancel every queued chunk of a column. Returns how many were removed.
    pub fn remove_column(&mut self, column: ColumnPos) -> usize {
        let Some(count) = self.columns.remove(&column) else {
            return 0;
        };
        self.members.retain(|k| k.column != column);
        self.order.retain(|k| k.column != column);
        count
    }

    pub fn contains(&self, key: ChunkKey) -> bool {
        self.members.contains(&key)
    }

    /// Whether any chunk of the column is queued.
    pub fn contains_column(&self, column: ColumnPos) -> bool {
        self.columns.contains_key(&column)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}
