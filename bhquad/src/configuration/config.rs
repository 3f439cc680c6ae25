//! Configuration types for loading simulation scenarios from YAML.
//!
//! A scenario consists of:
//!
//! - [`EngineConfig`]     – worker pool and tree capacity settings
//! - [`UniverseConfig`]   – the square region bodies are simulated in
//! - [`ParametersConfig`] – physical constants and step size
//! - [`BodiesConfig`]     – how many bodies to seed, and from which seed
//! - [`ScenarioConfig`]   – top-level wrapper used to load a scenario from YAML
//!
//! Every field is optional; missing values fall back to the defaults of the
//! classic galaxy-disk demo.
//!
//! # YAML format
//!
//! ```yaml
//! engine:
//!   workers: 8               # defaults to the number of cores
//!   transient_factor: 15     # aggregate slots per body
//!   worker_timeout_ms: 10000 # bound on the force barrier
//!
//! universe:
//!   center: [0.0, 0.0]
//!   size: 2.0e18             # edge length
//!
//! parameters:
//!   G: 6.673e-11             # gravitational constant
//!   eps: 3.0e4               # softening length
//!   theta: 2.0               # opening angle
//!   dt: 1.0e11               # fixed time step
//!
//! bodies:
//!   max: 30000               # store capacity
//!   count: 30000             # bodies seeded at start
//!   seed: 3735928559
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::simulation::params::Parameters;

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub workers: Option<usize>, // force workers, `None` = one per core
    pub transient_factor: Option<usize>, // aggregate slots per persistent body
    pub worker_timeout_ms: Option<u64>, // how long the driver waits for the force pass
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct UniverseConfig {
    pub center: [f64; 2],
    pub size: f64,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            center: [0.0, 0.0],
            size: 2.0e18,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ParametersConfig {
    #[serde(rename = "G")]
    pub g: Option<f64>, // gravitational constant
    pub eps: Option<f64>, // softening
    pub theta: Option<f64>, // opening angle
    pub dt: Option<f64>, // time step size
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct BodiesConfig {
    pub max: Option<usize>, // capacity, defaults to `count`
    pub count: usize, // bodies seeded at start
    pub seed: u64, // deterministic seed to make runs reproducible
}

impl Default for BodiesConfig {
    fn default() -> Self {
        Self {
            max: None,
            count: 30_000,
            seed: 0xdead_beef,
        }
    }
}

/// Top-level scenario configuration loaded from YAML.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct ScenarioConfig {
    pub engine: EngineConfig,
    pub universe: UniverseConfig,
    pub parameters: ParametersConfig,
    pub bodies: BodiesConfig,
}

impl ScenarioConfig {
    /// Runtime parameters, with defaults for anything left out.
    pub fn parameters(&self) -> Parameters {
        let defaults = Parameters::default();
        let p = &self.parameters;
        Parameters {
            g: p.g.unwrap_or(defaults.g),
            eps: p.eps.unwrap_or(defaults.eps),
            theta: p.theta.unwrap_or(defaults.theta),
            dt: p.dt.unwrap_or(defaults.dt),
            transient_factor: self.engine.transient_factor.unwrap_or(defaults.transient_factor),
            worker_timeout: self
                .engine
                .worker_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.worker_timeout),
        }
    }

    pub fn workers(&self) -> usize {
        self.engine.workers.unwrap_or_else(num_cpus::get)
    }

    /// Store capacity; never below the seeded count unless set explicitly.
    pub fn max_bodies(&self) -> usize {
        self.bodies.max.unwrap_or(self.bodies.count)
    }
}
