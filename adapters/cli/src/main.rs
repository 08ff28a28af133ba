#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that drives the Lane Rush generation core headlessly.
//!
//! This binary is the composition root: it loads the static manifest,
//! constructs the world and each system exactly once, and runs the
//! fixed-timestep loop with motion integration upstream of the generation
//! pass. No component reaches for ambient global state.

mod config;

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use config::{SimulationConfig, TrackTuning};
use lane_rush_core::{Command, Event, PoolKey};
use lane_rush_system_difficulty::Difficulty;
use lane_rush_system_obstacles::{Config as ObstacleConfig, Obstacles};
use lane_rush_system_scheduling::{Config as SchedulingConfig, Scheduling};
use lane_rush_world::{self as world, query, World};

/// Headless driver for the endless lane-runner generation core.
#[derive(Debug, Parser)]
#[command(name = "lane-rush")]
struct Args {
    /// Number of fixed-timestep ticks to simulate.
    #[arg(long, default_value_t = 3_600)]
    ticks: u32,
    /// Fixed timestep in milliseconds.
    #[arg(long, default_value_t = 100)]
    dt_ms: u64,
    /// Master seed from which every system's seed stream is derived.
    #[arg(long, default_value_t = 0x4d59_5df4_d0f3_3173)]
    seed: u64,
    /// Path to a TOML manifest overriding the embedded configuration.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Entry point for the Lane Rush command-line interface.
fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let contents = match &args.config {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?,
        None => config::DEFAULT_MANIFEST.to_owned(),
    };
    let config = SimulationConfig::from_toml(&contents)?;

    let mut seed_stream = ChaCha8Rng::seed_from_u64(args.seed);
    let scheduling_seed: u64 = seed_stream.gen();
    let obstacle_seed: u64 = seed_stream.gen();

    let mut world = World::new(&config.registrations)?;
    let difficulty = Difficulty::new(config.difficulty);
    let mut scheduling = Scheduling::new(SchedulingConfig::new(
        config.section_catalog.clone(),
        scheduling_seed,
    ));
    let mut obstacles = Obstacles::new(ObstacleConfig::new(
        config.obstacle_catalogs.clone(),
        config.track.spawn_offset,
        config.track.visible_length,
        obstacle_seed,
    ));

    let dt = Duration::from_millis(args.dt_ms);
    let summary = run(
        &mut world,
        &difficulty,
        &mut scheduling,
        &mut obstacles,
        config.track,
        dt,
        args.ticks,
    )?;

    println!(
        "simulated {} ticks covering {:.1} units of track",
        args.ticks,
        query::progress(&world)
    );
    println!("sections completed: {}", summary.sections_completed);
    println!("obstacles spawned: {}", summary.obstacles_spawned);
    println!("instances retired offscreen: {}", summary.instances_retired);
    for (index, name) in config.names.iter().enumerate() {
        if let Some(counts) = query::pool_counts(&world, PoolKey::new(index as u32)) {
            println!(
                "  pool {name}: {} active / {} pooled",
                counts.active, counts.inactive
            );
        }
    }

    Ok(())
}

#[derive(Debug, Default)]
struct RunSummary {
    sections_completed: usize,
    obstacles_spawned: usize,
    instances_retired: usize,
}

impl RunSummary {
    fn observe(&mut self, events: &[Event]) {
        for event in events {
            match event {
                Event::SectionCompleted { .. } => self.sections_completed += 1,
                Event::ObstacleSpawned { .. } => self.obstacles_spawned += 1,
                Event::InstanceRetired { .. } => self.instances_retired += 1,
                _ => {}
            }
        }
    }
}

fn run(
    world: &mut World,
    difficulty: &Difficulty,
    scheduling: &mut Scheduling,
    obstacles: &mut Obstacles,
    track: TrackTuning,
    dt: Duration,
    ticks: u32,
) -> Result<RunSummary> {
    let mut summary = RunSummary::default();
    let mut events = Vec::new();
    world::apply(world, Command::StartRun, &mut events)?;

    let mut vehicle_speed = 0.0_f32;
    let mut carried: Vec<Event> = Vec::new();
    let dt_secs = dt.as_secs_f32();

    for _ in 0..ticks {
        // One difficulty sample per tick, shared by everything below.
        let sample = difficulty.sample(query::elapsed(world));

        // Motion integration runs upstream of the generation pass.
        let acceleration = sample.top_speed * dt_secs / track.acceleration_time;
        vehicle_speed = (vehicle_speed + acceleration).clamp(0.0, sample.top_speed);
        let position = query::progress(world) + vehicle_speed * dt_secs;

        let mut tick_events = std::mem::take(&mut carried);
        let carried_len = tick_events.len();
        world::apply(world, Command::AdvanceProgress { position }, &mut tick_events)?;
        world::apply(world, Command::Tick { dt }, &mut tick_events)?;

        let mut commands = Vec::new();
        scheduling.handle(
            &tick_events,
            query::run_state(world),
            sample,
            &mut commands,
        )?;
        for command in commands.drain(..) {
            world::apply(world, command, &mut tick_events)?;
        }

        let view = query::instance_view(world);
        let progress = query::progress(world);
        let margin = track.offscreen_margin;
        obstacles.handle(
            &tick_events,
            query::run_state(world),
            progress,
            sample,
            &view,
            |snapshot| snapshot.position + snapshot.extent < progress - margin,
            &mut commands,
        )?;
        // Late events (completions, retirements) surface to the scheduler on
        // the next tick.
        for command in commands.drain(..) {
            world::apply(world, command, &mut carried)?;
        }

        summary.observe(&tick_events[carried_len..]);
        summary.observe(&carried);
    }

    log::info!(
        "run finished: {} sections, {} obstacles, {} retirements",
        summary.sections_completed,
        summary.obstacles_spawned,
        summary.instances_retired
    );
    Ok(summary)
}
