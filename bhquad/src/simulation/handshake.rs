//! Shared handle for a stepping thread and a rendering thread.
//!
//! Both sides go through one mutex, so a render never observes a step in
//! progress. On top of that the two sides alternate:
//!
//! - [`SharedSimulation::advance`] waits until the frame it published last has
//!   been released by a render, then steps and publishes a new frame.
//! - [`SharedSimulation::render`] reads the current state and releases the frame.
//!
//! The stepper therefore can never run more than one frame ahead of the
//! renderer, and no work queues up behind a slow renderer.

use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::simulation::driver::{RenderView, Simulation};
use crate::simulation::error::{ConcurrencyFault, SimError};

struct Gate {
    sim: Simulation,
    frame_pending: bool,
    frames: u64,
}

struct Shared {
    gate: Mutex<Gate>,
    changed: Condvar,
}

/// Cloneable handle to a simulation shared between a stepper and a renderer.
#[derive(Clone)]
pub struct SharedSimulation {
    inner: Arc<Shared>,
}

impl SharedSimulation {
    pub fn new(sim: Simulation) -> Self {
        Self {
            inner: Arc::new(Shared {
                gate: Mutex::new(Gate {
                    sim,
                    frame_pending: false,
                    frames: 0,
                }),
                changed: Condvar::new(),
            }),
        }
    }

    /// Step once, after waiting up to `wait` for the previous frame to be rendered.
    pub fn advance(&self, wait: Duration) -> Result<usize, SimError> {
        let (mut gate, timeout) = self
            .inner
            .changed
            .wait_timeout_while(self.lock(), wait, |g| g.frame_pending)
            .unwrap_or_else(PoisonError::into_inner);
        if timeout.timed_out() && gate.frame_pending {
            return Err(ConcurrencyFault::RenderStalled(wait).into());
        }

        let processed = gate.sim.step()?;
        gate.frame_pending = true;
        gate.frames += 1;
        self.inner.changed.notify_all();
        Ok(processed)
    }

    /// Read the current state through `f` and release the pending frame.
    pub fn render<R>(&self, f: impl FnOnce(RenderView<'_>) -> R) -> R {
        let mut gate = self.lock();
        let out = f(gate.sim.view());
        gate.frame_pending = false;
        self.inner.changed.notify_all();
        out
    }

    /// Block up to `wait` until a frame is waiting to be rendered.
    /// Returns the number of frames published so far, or `None` on timeout.
    pub fn next_frame(&self, wait: Duration) -> Option<u64> {
        let (gate, _) = self
            .inner
            .changed
            .wait_timeout_while(self.lock(), wait, |g| !g.frame_pending)
            .unwrap_or_else(PoisonError::into_inner);
        gate.frame_pending.then_some(gate.frames)
    }

    /// Exclusive access outside the frame protocol, e.g. to reseed.
    pub fn with_simulation<R>(&self, f: impl FnOnce(&mut Simulation) -> R) -> R {
        f(&mut self.lock().sim)
    }

    /// Frames published so far.
    pub fn frames(&self) -> u64 {
        self.lock().frames
    }

    fn lock(&self) -> MutexGuard<'_, Gate> {
        self.inner.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
