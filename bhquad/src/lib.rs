pub mod simulation;
pub mod configuration;
pub mod benchmark;

pub use simulation::region::{Region, Quadrant};
pub use simulation::bodies::{BodyStore, ForceHandle, Gravity, NVec2};
pub use simulation::quadtree::Quadtree;
pub use simulation::forces::{direct_force, direct_forces};
pub use simulation::params::Parameters;
pub use simulation::error::{SimError, ConcurrencyFault, WorkerFault};
pub use simulation::scenario::{build_scenario, disk_distribution, InitialBody};
pub use simulation::driver::{Simulation, RenderView};
pub use simulation::handshake::SharedSimulation;

pub use configuration::config::{ScenarioConfig, EngineConfig, UniverseConfig, ParametersConfig, BodiesConfig};

pub use benchmark::benchmark::{bench_steps, bench_worker_scaling, bench_tree_vs_direct};
