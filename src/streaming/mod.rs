//! Column streaming around a moving viewpoint

pub mod save;
pub mod priority;
pub mod queue;
pub mod scheduler;
pub mod viewpoint;
pub mod manager;
pub mod worker;

pub use save::{
    SaveCollaborator, MemorySaveStore, FileSaveStore,
    serialize_overrides, deserialize_overrides, column_path,
};
pub use priority::{ColumnPriority, GenerateQueue};
pub use queue::ChunkQueue;
pub use scheduler::{Phase, PhaseScheduler};
pub use viewpoint::{Viewpoint, ViewpointProvider, SharedViewpoint};
pub use manager::{ChunkManager, DrawableChunk, PhaseWork, StreamingStats, TickOutcome};
pub use worker::StreamingWorker;
