//! Error taxonomy for configuring and stepping a simulation.
//!
//! Near-zero separations are not an error: the softening term in the force
//! law keeps them finite.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    /// Tree construction ran out of transient (aggregate) body slots.
    #[error(
        "out of space for transient bodies ({capacity} slots); \
         increase `transient_factor` (currently {factor})"
    )]
    CapacityExceeded { capacity: usize, factor: usize },

    /// Requested counts or constants are inconsistent. Callers may clamp and retry.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    ConcurrencyFault(#[from] ConcurrencyFault),
}

#[derive(Debug, Error)]
pub enum ConcurrencyFault {
    #[error("{} force worker(s) failed: {}", .0.len(), FaultList(.0))]
    WorkersFailed(Vec<WorkerFault>),

    #[error("force barrier timed out after {waited:?} with {pending} of {dispatched} worker(s) outstanding")]
    BarrierTimeout {
        waited: Duration,
        pending: usize,
        dispatched: usize,
    },

    /// Workers from an earlier, timed-out step still hold the shared state.
    #[error("simulation state is still shared with workers from an earlier step")]
    StateBusy,

    #[error("previous frame was not released by the renderer within {0:?}")]
    RenderStalled(Duration),

    #[error("could not start worker pool: {0}")]
    PoolUnavailable(String),
}

/// A single worker that did not finish its slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFault {
    pub worker: usize,
    pub reason: String,
}

impl fmt::Display for WorkerFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker {}: {}", self.worker, self.reason)
    }
}

struct FaultList<'a>(&'a [WorkerFault]);

impl fmt::Display for FaultList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, fault) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{fault}")?;
        }
        Ok(())
    }
}
