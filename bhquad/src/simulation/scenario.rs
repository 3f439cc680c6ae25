//! Initial conditions and scenario construction
//!
//! [`disk_distribution`] generates the classic demo: a dominant central mass
//! at the universe center surrounded by lighter bodies on circular orbits,
//! their radii drawn from an exponential profile so the disk is dense near the
//! center and thins out towards the edge.
//!
//! [`build_scenario`] turns a `ScenarioConfig` (YAML-facing) into a configured
//! and seeded [`Simulation`].

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::configuration::config::ScenarioConfig;
use crate::simulation::driver::Simulation;
use crate::simulation::error::SimError;
use crate::simulation::params::{Parameters, SOLAR_MASS};
use crate::simulation::region::Region;

/// Mass of the body placed at the center of the disk.
pub const CENTRAL_MASS: f64 = 1e6 * SOLAR_MASS;

/// Rate of the exponential radius profile.
const RADIAL_FALLOFF: f64 = 1.8;

/// Initial state of one persistent body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialBody {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub mass: f64,
}

/// `count` bodies orbiting a central mass at the center of `universe`.
///
/// Body 0 is the central mass; the others get a circular-orbit velocity
/// around it, clockwise or counter-clockwise at random. The result depends
/// only on `count`, `seed`, the universe and `params.g`.
pub fn disk_distribution(count: usize, seed: u64, universe: &Region, params: &Parameters) -> Vec<InitialBody> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let center = universe.center();
    let half = universe.size() / 2.0;

    let mut bodies: Vec<InitialBody> = (0..count)
        .map(|_| {
            let rx = half * exponential(&mut rng, RADIAL_FALLOFF) * (0.5 - rng.gen::<f64>());
            let ry = half * exponential(&mut rng, RADIAL_FALLOFF) * (0.5 - rng.gen::<f64>());
            let (mut vx, mut vy) = circular_velocity(rx, ry, params.g);

            // randomly flip the direction of rotation
            if rng.gen::<f64>() <= 0.5 {
                vx = -vx;
                vy = -vy;
            }

            let mass = 1e20 + rng.gen::<f64>() * SOLAR_MASS * 10.0;
            InitialBody {
                x: center.x + rx,
                y: center.y + ry,
                vx,
                vy,
                mass,
            }
        })
        .collect();

    if let Some(central) = bodies.first_mut() {
        *central = InitialBody {
            x: center.x,
            y: center.y,
            vx: 0.0,
            vy: 0.0,
            mass: CENTRAL_MASS,
        };
    }
    bodies
}

/// Velocity of a circular orbit around the central mass at offset `(rx, ry)`.
fn circular_velocity(rx: f64, ry: f64, g: f64) -> (f64, f64) {
    let r = rx.hypot(ry);
    if r == 0.0 {
        return (0.0, 0.0);
    }
    let speed = (g * CENTRAL_MASS / r).sqrt();

    // perpendicular to the radius vector
    (-ry / r * speed, rx / r * speed)
}

/// Sample of an exponential distribution with rate `lambda`.
fn exponential(rng: &mut ChaCha8Rng, lambda: f64) -> f64 {
    -(1.0 - rng.gen::<f64>()).ln() / lambda
}

/// Configure a simulation from `cfg` and seed its initial disk.
pub fn build_scenario(cfg: &ScenarioConfig) -> Result<Simulation, SimError> {
    let [cx, cy] = cfg.universe.center;
    let universe = Region::from_center([cx, cy].into(), cfg.universe.size);

    let mut sim = Simulation::with_parameters(cfg.max_bodies(), universe, cfg.workers(), cfg.parameters())?;
    sim.seed_distribution(cfg.bodies.count, cfg.bodies.seed)?;
    Ok(sim)
}
