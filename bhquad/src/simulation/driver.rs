//! Step driver: owns the body store, the quadtree and the worker pool, and
//! advances the simulation one fixed time step per [`Simulation::step`].
//!
//! A step runs in three phases:
//!
//! 1. **Build** (single-threaded): rewind the transient bodies, clear the
//!    tree, insert every live body inside the universe and record it in the
//!    worklist.
//! 2. **Force pass** (parallel): the worklist is cut into one contiguous slice
//!    per worker. Each worker locks, resets and accumulates the force of every
//!    body in its slice while reading the now-frozen tree.
//! 3. **Integrate** (single-threaded): once every worker has reported back,
//!    move all worklist bodies by `dt`.
//!
//! The store, tree and worklist are shared with the workers through `Arc`s.
//! The single-threaded phases need them exclusively and get them with
//! `Arc::get_mut`, which also proves that no worker can still be reading.
//! If the force barrier times out, the stragglers keep their handles until
//! they finish and the next step reports [`ConcurrencyFault::StateBusy`]
//! instead of racing them.

use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, info, warn};

use crate::simulation::bodies::BodyStore;
use crate::simulation::error::{ConcurrencyFault, SimError, WorkerFault};
use crate::simulation::params::Parameters;
use crate::simulation::quadtree::Quadtree;
use crate::simulation::region::Region;
use crate::simulation::scenario::disk_distribution;

/// A configured Barnes–Hut simulation.
///
/// `&mut self` methods are the exclusive stepping capability; read-only
/// consumers go through [`Simulation::view`].
pub struct Simulation {
    bodies: Arc<BodyStore>,
    tree: Arc<Quadtree>,
    worklist: Arc<Vec<usize>>,
    universe: Region,
    params: Parameters,
    body_count: usize,
    seed: u64,
    workers: usize,
    pool: ThreadPool,
}

/// Read-only snapshot access to the simulated bodies.
pub struct RenderView<'a> {
    bodies: &'a BodyStore,
    count: usize,
    universe: Region,
}

impl RenderView<'_> {
    /// Call `visitor(x, y)` for every live body inside the universe.
    pub fn for_each_visible_body<F: FnMut(f64, f64)>(&self, mut visitor: F) {
        for i in 0..self.count {
            let p = self.bodies.position(i);
            if self.universe.contains(p.x, p.y) {
                visitor(p.x, p.y);
            }
        }
    }

    pub fn visible_count(&self) -> usize {
        let mut n = 0;
        self.for_each_visible_body(|_, _| n += 1);
        n
    }

    pub fn body_count(&self) -> usize {
        self.count
    }
}

impl Simulation {
    /// Allocate capacity for `max_bodies` bodies in `universe` with a pool of
    /// `workers` force workers, using default [`Parameters`].
    pub fn configure(max_bodies: usize, universe: Region, workers: usize) -> Result<Self, SimError> {
        Self::with_parameters(max_bodies, universe, workers, Parameters::default())
    }

    pub fn with_parameters(
        max_bodies: usize,
        universe: Region,
        workers: usize,
        params: Parameters,
    ) -> Result<Self, SimError> {
        if workers == 0 {
            return Err(SimError::InvalidConfiguration("at least one worker is required".into()));
        }
        let size = universe.size();
        if !(size.is_finite() && size > 0.0) {
            return Err(SimError::InvalidConfiguration(format!(
                "universe size must be positive and finite, got {size}"
            )));
        }
        params.validate()?;

        let bodies = BodyStore::new(max_bodies, params.transient_factor, params.gravity())?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("bhquad-force-{i}"))
            .build()
            .map_err(|e| ConcurrencyFault::PoolUnavailable(e.to_string()))?;

        info!(
            max_bodies,
            workers,
            transient_slots = bodies.transient_capacity(),
            "configured simulation"
        );

        Ok(Self {
            bodies: Arc::new(bodies),
            tree: Arc::new(Quadtree::new(universe, params.theta)),
            worklist: Arc::new(Vec::with_capacity(max_bodies)),
            universe,
            params,
            body_count: 0,
            seed: 0,
            workers,
            pool,
        })
    }

    /// Replace all bodies with the seeded disk distribution of `count` bodies.
    pub fn seed_distribution(&mut self, count: usize, seed: u64) -> Result<(), SimError> {
        let capacity = self.capacity();
        if count > capacity {
            return Err(SimError::InvalidConfiguration(format!(
                "{count} bodies requested but capacity is {capacity}"
            )));
        }
        let initial = disk_distribution(count, seed, &self.universe, &self.params);
        let bodies = exclusive(&mut self.bodies)?;
        for (i, b) in initial.iter().enumerate() {
            bodies.set(i, b.x, b.y, b.vx, b.vy, b.mass);
        }
        self.body_count = count;
        self.seed = seed;
        info!(count, seed, "seeded disk distribution");
        Ok(())
    }

    /// Reseed with `count` bodies, reusing the last seed.
    pub fn resize(&mut self, count: usize) -> Result<(), SimError> {
        self.seed_distribution(count, self.seed)
    }

    /// Overwrite live body `index`.
    pub fn set_body(&mut self, index: usize, x: f64, y: f64, vx: f64, vy: f64, mass: f64) -> Result<(), SimError> {
        if index >= self.body_count {
            return Err(SimError::InvalidConfiguration(format!(
                "body {index} is not live ({} bodies)",
                self.body_count
            )));
        }
        if !(mass.is_finite() && mass > 0.0) {
            return Err(SimError::InvalidConfiguration(format!("body mass must be positive, got {mass}")));
        }
        exclusive(&mut self.bodies)?.set(index, x, y, vx, vy, mass);
        Ok(())
    }

    /// Advance one fixed time step; returns how many bodies were simulated.
    ///
    /// On error nothing has been integrated: positions and velocities are
    /// exactly as before the call.
    pub fn step(&mut self) -> Result<usize, SimError> {
        self.build()?;
        let processed = self.worklist.len();
        if processed == 0 {
            return Ok(0);
        }

        self.compute_forces()?;

        let bodies = exclusive(&mut self.bodies)?;
        for &i in self.worklist.iter() {
            bodies.integrate(i, self.params.dt);
        }

        debug!(
            processed,
            transient = bodies.transient_used(),
            nodes = self.tree.node_count(),
            "step complete"
        );
        Ok(processed)
    }

    /// Phase 1: rebuild the tree and the worklist from scratch.
    fn build(&mut self) -> Result<(), SimError> {
        let bodies = exclusive(&mut self.bodies)?;
        let tree = exclusive(&mut self.tree)?;
        let worklist = exclusive(&mut self.worklist)?;

        bodies.reset_transient();
        tree.clear();
        worklist.clear();

        for i in 0..self.body_count {
            if bodies.in_region(i, &self.universe) {
                if let Err(e) = tree.insert(i, bodies) {
                    warn!(body = i, "tree build aborted: {e}");
                    return Err(e);
                }
                worklist.push(i);
            }
        }
        Ok(())
    }

    /// Phase 2: reset and accumulate the force of every worklist body.
    fn compute_forces(&self) -> Result<(), SimError> {
        self.run_slices(|bodies, tree, i| {
            let mut force = bodies.lock_force(i);
            force.reset();
            tree.update_force(i, bodies, &mut force);
        })
    }

    /// Fan the worklist out to the pool, running `job` once per body, and
    /// wait for every slice.
    fn run_slices<F>(&self, job: F) -> Result<(), SimError>
    where
        F: Fn(&BodyStore, &Quadtree, usize) + Send + Sync + 'static,
    {
        let job = Arc::new(job);
        let (tx, rx) = mpsc::channel();
        let mut dispatched = Vec::with_capacity(self.workers);

        for (worker, range) in partition(self.worklist.len(), self.workers).enumerate() {
            if range.is_empty() {
                continue;
            }
            let bodies = Arc::clone(&self.bodies);
            let tree = Arc::clone(&self.tree);
            let worklist = Arc::clone(&self.worklist);
            let job = Arc::clone(&job);
            let tx = tx.clone();

            self.pool.spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    for &i in &worklist[range] {
                        (*job)(&bodies, &tree, i);
                    }
                }));
                // Release the shared state before reporting so the driver's
                // exclusive phases never see a finished worker's handle.
                drop((bodies, tree, worklist));
                // The driver may have stopped listening after a timeout
                let _ = tx.send((worker, outcome.map_err(panic_message)));
            });
            dispatched.push(worker);
        }
        drop(tx);

        self.await_workers(&rx, &dispatched)
    }

    /// Barrier: collect one report per dispatched slice, bounded by the
    /// worker timeout. All failures are reported together.
    fn await_workers(
        &self,
        rx: &mpsc::Receiver<(usize, Result<(), String>)>,
        dispatched: &[usize],
    ) -> Result<(), SimError> {
        let started = Instant::now();
        let deadline = started + self.params.worker_timeout;
        let mut reported = Vec::with_capacity(dispatched.len());
        let mut faults = Vec::new();

        while reported.len() < dispatched.len() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((worker, outcome)) => {
                    reported.push(worker);
                    if let Err(reason) = outcome {
                        faults.push(WorkerFault { worker, reason });
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    let fault = ConcurrencyFault::BarrierTimeout {
                        waited: started.elapsed(),
                        pending: dispatched.len() - reported.len(),
                        dispatched: dispatched.len(),
                    };
                    warn!("{fault}");
                    return Err(fault.into());
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let missing = dispatched.iter().filter(|w| !reported.contains(w));
                    faults.extend(missing.map(|&worker| WorkerFault {
                        worker,
                        reason: "exited without reporting".to_string(),
                    }));
                    break;
                }
            }
        }

        if faults.is_empty() {
            return Ok(());
        }
        let fault = ConcurrencyFault::WorkersFailed(faults);
        warn!("{fault}");
        Err(fault.into())
    }

    pub fn view(&self) -> RenderView<'_> {
        RenderView {
            bodies: &self.bodies,
            count: self.body_count,
            universe: self.universe,
        }
    }

    /// Call `visitor(x, y)` for every live body inside the universe.
    pub fn for_each_visible_body<F: FnMut(f64, f64)>(&self, visitor: F) {
        self.view().for_each_visible_body(visitor);
    }

    pub fn set_worker_timeout(&mut self, timeout: Duration) {
        self.params.worker_timeout = timeout;
    }

    pub fn body_count(&self) -> usize {
        self.body_count
    }

    /// Largest body count this simulation can hold.
    pub fn capacity(&self) -> usize {
        self.bodies.persistent_capacity()
    }

    pub fn worker_count(&self) -> usize {
        self.workers
    }

    pub fn universe(&self) -> Region {
        self.universe
    }

    pub fn parameters(&self) -> &Parameters {
        &self.params
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn bodies(&self) -> &BodyStore {
        &self.bodies
    }

    pub fn tree(&self) -> &Quadtree {
        &self.tree
    }

    /// Bodies simulated by the last step.
    pub fn worklist(&self) -> &[usize] {
        &self.worklist
    }
}

/// `len` items cut into `parts` contiguous slices whose sizes differ by at most one.
pub fn partition(len: usize, parts: usize) -> impl Iterator<Item = Range<usize>> {
    (0..parts).map(move |i| (i * len / parts)..((i + 1) * len / parts))
}

fn exclusive<T>(shared: &mut Arc<T>) -> Result<&mut T, SimError> {
    Arc::get_mut(shared).ok_or(SimError::ConcurrencyFault(ConcurrencyFault::StateBusy))
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}
