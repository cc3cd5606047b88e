//! Generation queue ordered by distance to the viewpoint

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use glam::Vec3;

use crate::voxel::column::ColumnPos;

/// Queued column and its distance (in columns) to the viewpoint
#[derive(Clone, Copy, Debug)]
pub struct ColumnPriority {
    pub pos: ColumnPos,
    pub distance: f32,
}

// Implement Ord/PartialOrd for BinaryHeap (max-heap by default)
impl Eq for ColumnPriority {}

impl PartialEq for ColumnPriority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for ColumnPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        // Nearest first; ties broken by position so pop order is deterministic
        other
            .distance
            .total_cmp(&self.distance)
            .then_with(|| other.pos.cmp(&self.pos))
    }
}

impl PartialOrd for ColumnPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Nearest-first queue of columns awaiting generation.
///
/// Each position is queued at most once.
#[derive(Debug, Default)]
pub struct GenerateQueue {
    heap: BinaryHeap<ColumnPriority>,
    members: HashSet<ColumnPos>,
}

impl GenerateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all queued columns
    pub fn clear(&mut self) {
        self.heap.clear();
        self.members.clear();
    }

    /// Queue a column. Returns false if it was already queued.
    pub fn push(&mut self, pos: ColumnPos, distance: f32) -> bool {
        if !self.members.insert(pos) {
            return false;
        }
        self.heap.push(ColumnPriority { pos, distance });
        true
    }

    /// Take the nearest queued column
    pub fn pop(&mut self) -> Option<ColumnPriority> {
        while let Some(entry) = self.heap.pop() {
            // Entries removed via `remove` stay in the heap until popped
            if self.members.remove(&entry.pos) {
                return Some(entry);
            }
        }
        None
    }

    /// Cancel a queued column
    pub fn remove(&mut self, pos: ColumnPos) -> bool {
        self.members.remove(&pos)
    }

    pub fn contains(&self, pos: ColumnPos) -> bool {
        self.members.contains(&pos)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Rebuild the queue from every column within `radius` of `center`
    /// (world space) that `skip` does not exclude.
    pub fn update(
        &mut self,
        center: Vec3,
        radius: i32,
        chunk_size: i32,
        skip: impl Fn(ColumnPos) -> bool,
    ) {
        self.clear();

        let center_column = ColumnPos::from_world(center.floor().as_ivec3(), chunk_size);
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                let pos = center_column.offset(dx, dz);
                if skip(pos) {
                    continue;
                }
                let distance = pos.distance_to(center, chunk_size);
                if distance <= radius as f32 {
                    self.push(pos, distance);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_nearest_first() {
        let mut queue = GenerateQueue::new();
        queue.push(ColumnPos::new(5, 0), 5.0);
        queue.push(ColumnPos::new(1, 0), 1.0);
        queue.push(ColumnPos::new(3, 0), 3.0);

        let order: Vec<_> = std::iter::from_fn(|| queue.pop()).map(|e| e.pos.x).collect();
        assert_eq!(order, vec![1, 3, 5]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_duplicate_push_ignored() {
        let mut queue = GenerateQueue::new();
        assert!(queue.push(ColumnPos::new(0, 0), 1.0));
        assert!(!queue.push(ColumnPos::new(0, 0), 0.5));
        assert_eq!(queue.len(), 1);
        assert!(queue.pop().is_some());
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_remove_cancels_entry() {
        let mut queue = GenerateQueue::new();
        queue.push(ColumnPos::new(0, 0), 1.0);
        queue.push(ColumnPos::new(1, 0), 2.0);
        assert!(queue.remove(ColumnPos::new(0, 0)));
        assert_eq!(queue.pop().unwrap().pos, ColumnPos::new(1, 0));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_update_covers_radius_and_skips() {
        let mut queue = GenerateQueue::new();
        let skip = ColumnPos::new(0, 0);
        queue.update(Vec3::new(8.0, 70.0, 8.0), 2, 16, |p| p == skip);

        assert!(!queue.contains(skip));
        assert!(queue.contains(ColumnPos::new(2, 0)));
        assert!(queue.contains(ColumnPos::new(-1, 1)));
        // Corner lies at distance 2.83, outside the radius
        assert!(!queue.contains(ColumnPos::new(2, 2)));
        assert_eq!(queue.pop().unwrap().distance, 1.0);
    }

    #[test]
    fn test_update_replaces_previous_contents() {
        let mut queue = GenerateQueue::new();
        queue.push(ColumnPos::new(100, 100), 0.0);
        queue.update(Vec3::ZERO, 1, 16, |_| false);
        assert!(!queue.contains(ColumnPos::new(100, 100)));
    }
}
