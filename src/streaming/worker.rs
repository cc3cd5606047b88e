//! Background thread driving the chunk manager at a fixed tick rate

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use super::manager::ChunkManager;
use crate::core::types::Result;

/// Owns the streaming thread. Dropping the worker stops and joins it.
pub struct StreamingWorker {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StreamingWorker {
    /// Start ticking `manager` on a dedicated thread.
    pub fn spawn(manager: Arc<ChunkManager>) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let interval = Duration::from_secs_f64(1.0 / manager.config().ticks_per_second.max(1) as f64);

        let thread_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name("chunk-streaming".into())
            .spawn(move || {
                log::info!("Streaming worker started, tick interval {:?}", interval);
                while thread_running.load(Ordering::Acquire) {
                    let started = Instant::now();
                    manager.tick();
                    if let Some(rest) = interval.checked_sub(started.elapsed()) {
                        thread::sleep(rest);
                    }
                }
                log::info!("Streaming worker stopped");
            })?;

        Ok(Self {
            running,
            handle: Some(handle),
        })
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Signal the thread to exit after its current tick and wait for it.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Streaming worker panicked");
            }
        }
    }
}

impl Drop for StreamingWorker {
    fn drop(&mut self) {
        self.stop();
    }
}
