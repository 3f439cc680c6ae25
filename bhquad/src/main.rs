use bhquad::{build_scenario, bench_steps, bench_tree_vs_direct, bench_worker_scaling};
use bhquad::{ScenarioConfig, SharedSimulation};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const FRAME_WAIT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
struct Args {
    /// Scenario file under `scenarios/`
    #[arg(short, default_value = "default.yaml")]
    file_name: String,

    /// Override the number of bodies
    #[arg(long)]
    bodies: Option<usize>,

    /// Override the number of force workers
    #[arg(long)]
    workers: Option<usize>,

    /// Steps to run
    #[arg(long, default_value_t = 1000)]
    steps: usize,

    /// Time the step loop instead of running the frame loop
    #[arg(long)]
    benchmark: bool,
}

// load here to keep main clean
fn load_scenario_from_yaml(args: &Args) -> Result<ScenarioConfig> {
    let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenarios").join(&args.file_name);
    let file = File::open(&config_path).with_context(|| format!("opening {}", config_path.display()))?;
    let reader = BufReader::new(file);
    let mut scenario_cfg: ScenarioConfig = serde_yaml::from_reader(reader)?;

    if let Some(n) = args.bodies {
        scenario_cfg.bodies.count = n;
        scenario_cfg.bodies.max = Some(scenario_cfg.max_bodies().max(n));
    }
    if args.workers.is_some() {
        scenario_cfg.engine.workers = args.workers;
    }
    Ok(scenario_cfg)
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let scenario_cfg = load_scenario_from_yaml(&args)?;

    if args.benchmark {
        return run_benchmark(&scenario_cfg, args.steps);
    }
    run_frames(&scenario_cfg, args.steps)
}

fn run_benchmark(cfg: &ScenarioConfig, steps: usize) -> Result<()> {
    let mut sim = build_scenario(cfg)?;
    info!(bodies = sim.body_count(), workers = sim.worker_count(), steps, "running benchmark");

    let ms = bench_steps(&mut sim, steps)?;
    println!("{} bodies, {} workers: {ms:.3} ms/step", sim.body_count(), sim.worker_count());

    bench_tree_vs_direct(sim.universe(), sim.parameters())?;
    bench_worker_scaling(cfg.bodies.count, sim.universe(), sim.parameters(), 10, sim.worker_count())?;
    Ok(())
}

/// Step on this thread, "render" on another: the renderer only counts the
/// visible bodies, standing in for a real viewer.
fn run_frames(cfg: &ScenarioConfig, steps: usize) -> Result<()> {
    let shared = SharedSimulation::new(build_scenario(cfg)?);
    let done = Arc::new(AtomicBool::new(false));

    let renderer = {
        let shared = shared.clone();
        let done = Arc::clone(&done);
        thread::spawn(move || {
            while !done.load(Ordering::Acquire) {
                let Some(frame) = shared.next_frame(Duration::from_millis(100)) else {
                    continue;
                };
                let visible = shared.render(|view| view.visible_count());
                if frame % 60 == 0 {
                    info!(frame, visible, "rendered");
                }
            }
        })
    };

    let start = Instant::now();
    let result = (0..steps).try_for_each(|_| shared.advance(FRAME_WAIT).map(|_| ()));
    let elapsed = start.elapsed();

    done.store(true, Ordering::Release);
    renderer.join().map_err(|_| anyhow::anyhow!("renderer thread panicked"))?;
    result?;

    info!(frames = shared.frames(), ?elapsed, "finished");
    Ok(())
}
