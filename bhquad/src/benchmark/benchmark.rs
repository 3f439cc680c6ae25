use std::hint::black_box;
use std::time::Instant;

use crate::simulation::bodies::BodyStore;
use crate::simulation::driver::Simulation;
use crate::simulation::error::SimError;
use crate::simulation::forces::direct_forces;
use crate::simulation::params::Parameters;
use crate::simulation::quadtree::Quadtree;
use crate::simulation::region::Region;
use crate::simulation::scenario::disk_distribution;

/// Run `steps` steps and return the mean wall time per step in milliseconds.
pub fn bench_steps(sim: &mut Simulation, steps: usize) -> Result<f64, SimError> {
    let t0 = Instant::now();
    for _ in 0..steps {
        sim.step()?;
    }
    Ok(t0.elapsed().as_secs_f64() * 1000.0 / steps.max(1) as f64)
}

/// Same disk, same number of steps, increasing worker counts.
/// Paste output directly into a spreadsheet to graph.
pub fn bench_worker_scaling(
    bodies: usize,
    universe: Region,
    params: &Parameters,
    steps: usize,
    max_workers: usize,
) -> Result<(), SimError> {
    println!("workers,ms_per_step");

    let mut workers = 1;
    while workers <= max_workers {
        let mut sim = Simulation::with_parameters(bodies, universe, workers, params.clone())?;
        sim.seed_distribution(bodies, 42)?;

        // Warm up
        sim.step()?;

        let ms = bench_steps(&mut sim, steps)?;
        println!("{workers},{ms:.6}");
        workers *= 2;
    }
    Ok(())
}

/// Time one tree build + force pass against the direct all-pairs sum.
pub fn bench_tree_vs_direct(universe: Region, params: &Parameters) -> Result<(), SimError> {
    let ns = [200, 400, 800, 1600, 3200, 6400];

    for n in ns {
        let mut bodies = BodyStore::new(n, params.transient_factor, params.gravity())?;
        for (i, b) in disk_distribution(n, 42, &universe, params).iter().enumerate() {
            bodies.set(i, b.x, b.y, b.vx, b.vy, b.mass);
        }
        let worklist: Vec<usize> = (0..n).filter(|&i| bodies.in_region(i, &universe)).collect();

        // Time direct
        let t0 = Instant::now();
        black_box(direct_forces(&bodies, &worklist));
        let dt_direct = t0.elapsed().as_secs_f64();

        // Time barnes-hut, build included
        let t1 = Instant::now();
        let mut tree = Quadtree::new(universe, params.theta);
        for &i in &worklist {
            tree.insert(i, &mut bodies)?;
        }
        for &i in &worklist {
            let mut force = bodies.lock_force(i);
            force.reset();
            tree.update_force(i, &bodies, &mut force);
        }
        let dt_bh = t1.elapsed().as_secs_f64();

        println!("N = {n:5}, direct = {dt_direct:8.6} s, BH = {dt_bh:8.6} s");
    }
    Ok(())
}
