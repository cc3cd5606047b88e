//! Cyclic Generate -> Bake -> Unload phase scheduler

/// Work performed during one tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Phase {
    Generate,
    Bake,
    Unload,
}

impl Phase {
    pub fn next(self) -> Phase {
        match self {
            Phase::Generate => Phase::Bake,
            Phase::Bake => Phase::Unload,
            Phase::Unload => Phase::Generate,
        }
    }
}

/// Tracks the active phase; exactly one phase runs per tick.
#[derive(Debug)]
pub struct PhaseScheduler {
    current: Phase,
}

impl Default for PhaseScheduler {
    fn default() -> Self {
        Self {
            current: Phase::Generate,
        }
    }
}

impl PhaseScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    /// Return the phase to run this tick and move on to the next one.
    pub fn advance(&mut self) -> Phase {
        let phase = self.current;
        self.current = phase.next();
        phase
    }
}
