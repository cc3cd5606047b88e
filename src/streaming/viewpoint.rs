//! Viewpoint supplied to the scheduler once per tick

use glam::Vec3;
use parking_lot::RwLock;

/// Position the world streams around and how far it reaches.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewpoint {
    /// World-space position in blocks
    pub position: Vec3,
    /// Radius in columns
    pub render_distance: i32,
}

impl Viewpoint {
    pub fn new(position: Vec3, render_distance: i32) -> Self {
        Self {
            position,
            render_distance,
        }
    }
}

pub trait ViewpointProvider: Send + Sync {
    fn viewpoint(&self) -> Viewpoint;
}

/// Viewpoint written by the consumer thread and read by the worker.
#[derive(Debug)]
pub struct SharedViewpoint {
    inner: RwLock<Viewpoint>,
}

impl SharedViewpoint {
    pub fn new(viewpoint: Viewpoint) -> Self {
        Self {
            inner: RwLock::new(viewpoint),
        }
    }

    pub fn set_position(&self, position: Vec3) {
        self.inner.write().position = position;
    }

    pub fn set_render_distance(&self, render_distance: i32) {
        self.inner.write().render_distance = render_distance.max(1);
    }
}

impl ViewpointProvider for SharedViewpoint {
    fn viewpoint(&self) -> Viewpoint {
        *self.inner.read()
    }
}

/// A viewpoint that never moves.
impl ViewpointProvider for Viewpoint {
    fn viewpoint(&self) -> Viewpoint {
        *self
    }
}
