//! Structure-of-arrays body store.
//!
//! One store holds two disjoint index ranges:
//! - persistent bodies `[0, N)`, one per simulated particle,
//! - transient aggregates `[N, N + N·K)`, bump-allocated while the quadtree
//!   is built and discarded wholesale by [`BodyStore::reset_transient`].
//!
//! Positions, velocities and masses are plain vectors: they are only written
//! in single-threaded phases (`&mut self`). Force accumulators sit behind one
//! mutex per body so the parallel force pass can write them through a shared
//! `&BodyStore`; [`BodyStore::lock_force`] hands out the exclusive
//! [`ForceHandle`] for one body.

use std::iter;
use std::sync::{Mutex, MutexGuard, PoisonError};

use nalgebra::Vector2;

use crate::simulation::error::SimError;
use crate::simulation::region::{Quadrant, Region};

pub type NVec2 = Vector2<f64>;

/// Constants of the softened Newtonian force law.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gravity {
    pub g: f64,   // gravitational constant
    pub eps: f64, // softening length, added in quadrature to the separation
}

pub struct BodyStore {
    pos: Vec<NVec2>,
    vel: Vec<NVec2>,
    mass: Vec<f64>,
    force: Vec<Mutex<NVec2>>,
    persistent: usize,
    transient_factor: usize,
    next_transient: usize,
    gravity: Gravity,
}

/// Exclusive write access to one body's force accumulator.
pub struct ForceHandle<'a> {
    index: usize,
    force: MutexGuard<'a, NVec2>,
}

impl ForceHandle<'_> {
    pub fn index(&self) -> usize {
        self.index
    }

    /// Zero the accumulator.
    pub fn reset(&mut self) {
        *self.force = NVec2::zeros();
    }

    pub fn value(&self) -> NVec2 {
        *self.force
    }
}

impl BodyStore {
    /// Allocate a store for `max_bodies` persistent bodies and
    /// `max_bodies * transient_factor` aggregates.
    pub fn new(max_bodies: usize, transient_factor: usize, gravity: Gravity) -> Result<Self, SimError> {
        if max_bodies == 0 {
            return Err(SimError::InvalidConfiguration("body capacity must be at least 1".into()));
        }
        if transient_factor == 0 {
            return Err(SimError::InvalidConfiguration("`transient_factor` must be at least 1".into()));
        }
        let total = max_bodies
            .checked_mul(transient_factor)
            .and_then(|t| t.checked_add(max_bodies))
            .ok_or_else(|| {
                SimError::InvalidConfiguration(format!(
                    "{max_bodies} bodies with `transient_factor` {transient_factor} overflows the store"
                ))
            })?;

        Ok(Self {
            pos: slots(total, NVec2::zeros)?,
            vel: slots(total, NVec2::zeros)?,
            mass: slots(total, || 0.0)?,
            force: slots(total, || Mutex::new(NVec2::zeros()))?,
            persistent: max_bodies,
            transient_factor,
            next_transient: max_bodies,
            gravity,
        })
    }

    /// Initialise persistent body `index`; its force is zeroed.
    pub fn set(&mut self, index: usize, x: f64, y: f64, vx: f64, vy: f64, mass: f64) {
        debug_assert!(index < self.persistent, "body {index} is not a persistent slot");
        self.write(index, x, y, vx, vy, mass);
    }

    /// Release every transient body. Runs once per step before any insertion.
    pub fn reset_transient(&mut self) {
        self.next_transient = self.persistent;
    }

    /// Append a transient body and return its index.
    pub fn allocate(&mut self, x: f64, y: f64, vx: f64, vy: f64, mass: f64) -> Result<usize, SimError> {
        let index = self.next_transient;
        if index >= self.pos.len() {
            return Err(SimError::CapacityExceeded {
                capacity: self.transient_capacity(),
                factor: self.transient_factor,
            });
        }
        self.next_transient += 1;
        self.write(index, x, y, vx, vy, mass);
        Ok(index)
    }

    /// Allocate an aggregate at the mass-weighted centroid of `a` and `b`.
    pub fn merge(&mut self, a: usize, b: usize) -> Result<usize, SimError> {
        let (ma, mb) = (self.mass[a], self.mass[b]);
        let mass = ma + mb;
        let centroid = (self.pos[a] * ma + self.pos[b] * mb) / mass;
        self.allocate(centroid.x, centroid.y, 0.0, 0.0, mass)
    }

    /// Take the exclusive force-accumulator lock of body `index`.
    ///
    /// A poisoned lock only means an earlier worker panicked mid-update; the
    /// accumulator is reset before every use, so the guard is recovered.
    pub fn lock_force(&self, index: usize) -> ForceHandle<'_> {
        let force = self.force[index].lock().unwrap_or_else(PoisonError::into_inner);
        ForceHandle { index, force }
    }

    /// Zero one body's force under its lock.
    pub fn reset_force(&self, index: usize) {
        self.lock_force(index).reset();
    }

    /// Zero the forces of bodies `[0, count)` without locking.
    pub fn reset_forces_bulk(&mut self, count: usize) {
        for slot in &mut self.force[..count] {
            *slot.get_mut().unwrap_or_else(PoisonError::into_inner) = NVec2::zeros();
        }
    }

    /// Force exerted on `target` by `source`.
    ///
    /// `F = G·m_t·m_s / (d² + EPS²)` along the unit vector from target to
    /// source. Coincident bodies have no direction and contribute nothing.
    pub fn pair_force(&self, target: usize, source: usize) -> NVec2 {
        let r = self.pos[source] - self.pos[target];
        let d2 = r.norm_squared();
        if d2 == 0.0 {
            return NVec2::zeros();
        }
        let Gravity { g, eps } = self.gravity;
        let f = g * self.mass[target] * self.mass[source] / (d2 + eps * eps);
        r * (f / d2.sqrt())
    }

    /// Add the pull of `source` onto the locked target.
    pub fn accumulate_force(&self, target: &mut ForceHandle<'_>, source: usize) {
        *target.force += self.pair_force(target.index, source);
    }

    /// Semi-implicit Euler: velocity first, then position with the new velocity.
    pub fn integrate(&mut self, index: usize, dt: f64) {
        let f = *self.force[index].get_mut().unwrap_or_else(PoisonError::into_inner);
        self.vel[index] += f * (dt / self.mass[index]);
        self.pos[index] += self.vel[index] * dt;
    }

    pub fn distance_squared(&self, a: usize, b: usize) -> f64 {
        (self.pos[a] - self.pos[b]).norm_squared()
    }

    pub fn in_region(&self, index: usize, region: &Region) -> bool {
        let p = self.pos[index];
        region.contains(p.x, p.y)
    }

    pub fn in_quadrant(&self, index: usize, region: &Region, which: Quadrant) -> bool {
        let p = self.pos[index];
        region.contains_in_quadrant(which, p.x, p.y)
    }

    pub fn quadrant_of(&self, index: usize, region: &Region) -> Option<Quadrant> {
        let p = self.pos[index];
        region.quadrant_of(p.x, p.y)
    }

    pub fn position(&self, index: usize) -> NVec2 {
        self.pos[index]
    }

    pub fn velocity(&self, index: usize) -> NVec2 {
        self.vel[index]
    }

    pub fn mass(&self, index: usize) -> f64 {
        self.mass[index]
    }

    /// Current accumulator value (takes the body's lock briefly).
    pub fn force(&self, index: usize) -> NVec2 {
        self.lock_force(index).value()
    }

    pub fn gravity(&self) -> Gravity {
        self.gravity
    }

    /// `N`, the number of persistent slots.
    pub fn persistent_capacity(&self) -> usize {
        self.persistent
    }

    /// `N·K`, the number of aggregate slots.
    pub fn transient_capacity(&self) -> usize {
        self.pos.len() - self.persistent
    }

    /// Aggregates allocated since the last reset.
    pub fn transient_used(&self) -> usize {
        self.next_transient - self.persistent
    }

    pub fn transient_factor(&self) -> usize {
        self.transient_factor
    }

    fn write(&mut self, index: usize, x: f64, y: f64, vx: f64, vy: f64, mass: f64) {
        self.pos[index] = NVec2::new(x, y);
        self.vel[index] = NVec2::new(vx, vy);
        self.mass[index] = mass;
        *self.force[index].get_mut().unwrap_or_else(PoisonError::into_inner) = NVec2::zeros();
    }
}

/// `total` slots filled by `fill`, or an error if they cannot be allocated.
fn slots<T>(total: usize, fill: impl FnMut() -> T) -> Result<Vec<T>, SimError> {
    let mut v = Vec::new();
    v.try_reserve_exact(total).map_err(|e| {
        SimError::InvalidConfiguration(format!("cannot allocate {total} body slots: {e}"))
    })?;
    v.extend(iter::repeat_with(fill).take(total));
    Ok(v)
}
