//! Numerical and physical parameters for the simulation
//!
//! `Parameters` holds runtime settings:
//! - gravitational constant and softening length (`g`, `eps`),
//! - opening angle `theta` and fixed step size `dt`,
//! - transient capacity multiplier and the force-barrier timeout

use std::time::Duration;

use crate::simulation::bodies::Gravity;
use crate::simulation::error::SimError;

pub const G: f64 = 6.673e-11;
pub const SOLAR_MASS: f64 = 1.98892e30;

#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    pub g: f64, // gravitational constant
    pub eps: f64, // softening
    pub theta: f64, // opening angle
    pub dt: f64, // step size
    pub transient_factor: usize, // aggregate slots per persistent body
    pub worker_timeout: Duration, // bound on the force barrier
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            g: G,
            eps: 3e4,
            theta: 2.0,
            dt: 1e11,
            transient_factor: 15,
            worker_timeout: Duration::from_secs(10),
        }
    }
}

impl Parameters {
    pub fn gravity(&self) -> Gravity {
        Gravity {
            g: self.g,
            eps: self.eps,
        }
    }

    /// Reject values the step pipeline cannot work with.
    pub fn validate(&self) -> Result<(), SimError> {
        let invalid = |msg: String| Err(SimError::InvalidConfiguration(msg));
        if !(self.g.is_finite() && self.g > 0.0) {
            return invalid(format!("gravitational constant must be positive, got {}", self.g));
        }
        if !(self.eps.is_finite() && self.eps >= 0.0) {
            return invalid(format!("softening must be non-negative, got {}", self.eps));
        }
        if !(self.theta.is_finite() && self.theta >= 0.0) {
            return invalid(format!("opening angle must be non-negative, got {}", self.theta));
        }
        if !self.dt.is_finite() {
            return invalid(format!("time step must be finite, got {}", self.dt));
        }
        if self.transient_factor == 0 {
            return invalid("`transient_factor` must be at least 1".into());
        }
        Ok(())
    }
}
