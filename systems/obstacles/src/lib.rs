#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic per-section obstacle spawner and offscreen retirement.

use std::collections::HashMap;

use lane_rush_core::{
    Command, DifficultySample, Event, InstanceId, InstanceSnapshot, InstanceView,
    NoEligibleEntryError, ObstacleDescriptor, PoolKey, RunState, SectionParams, WeightedTable,
};

/// Configuration parameters required to construct the obstacle system.
#[derive(Clone, Debug)]
pub struct Config {
    catalogs: HashMap<PoolKey, WeightedTable<ObstacleDescriptor>>,
    spawn_offset: f32,
    visible_length: f32,
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration.
    ///
    /// `catalogs` maps each section type to its weighted obstacle catalog;
    /// `spawn_offset` is the distance ahead of the vehicle at which obstacles
    /// materialize; `visible_length` is the length of road covered by the
    /// viewport, used to budget clearance behind moving obstacles.
    #[must_use]
    pub const fn new(
        catalogs: HashMap<PoolKey, WeightedTable<ObstacleDescriptor>>,
        spawn_offset: f32,
        visible_length: f32,
        rng_seed: u64,
    ) -> Self {
        Self {
            catalogs,
            spawn_offset,
            visible_length,
            rng_seed,
        }
    }
}

/// Pure system that generates obstacles for the active section.
///
/// One section generates at a time: activation installs a spacing/length
/// state machine, each runnable tick consumes the progress delta, and when
/// the assigned length is exhausted and the final spacing obligation honored
/// the system emits [`Command::CompleteSection`]. The same pass retires any
/// active instance the provided viewport test reports as offscreen.
#[derive(Debug)]
pub struct Obstacles {
    catalogs: HashMap<PoolKey, WeightedTable<ObstacleDescriptor>>,
    spawn_offset: f32,
    visible_length: f32,
    rng: SplitMix64,
    active: Option<SectionRun>,
}

#[derive(Clone, Copy, Debug)]
struct SectionRun {
    instance: InstanceId,
    section: PoolKey,
    params: SectionParams,
    last_observed: f32,
    remaining: f32,
    last_spawn: f32,
    clearance: f32,
}

impl Obstacles {
    /// Creates a new obstacle system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            catalogs: config.catalogs,
            spawn_offset: config.spawn_offset,
            visible_length: config.visible_length,
            rng: SplitMix64::new(config.rng_seed),
            active: None,
        }
    }

    /// Reports whether a section is currently generating.
    #[must_use]
    pub const fn is_generating(&self) -> bool {
        self.active.is_some()
    }

    /// Consumes world events, the tick's progress and difficulty, and the
    /// active-instance view to emit spawn, completion, and retirement
    /// commands.
    ///
    /// `is_offscreen` is the viewport test supplied by the excluded camera
    /// collaborator: it must report whether an instance's topmost rendered
    /// extent has fully passed the visible region. Instances with no visible
    /// extent at all are expected to report offscreen as well.
    pub fn handle<F>(
        &mut self,
        events: &[Event],
        run_state: RunState,
        progress: f32,
        difficulty: DifficultySample,
        instances: &InstanceView,
        is_offscreen: F,
        out: &mut Vec<Command>,
    ) -> Result<(), NoEligibleEntryError>
    where
        F: Fn(&InstanceSnapshot) -> bool,
    {
        let mut tick_observed = false;
        for event in events {
            match event {
                Event::SectionActivated {
                    instance,
                    section,
                    origin,
                    params,
                } => {
                    self.active = Some(SectionRun {
                        instance: *instance,
                        section: *section,
                        params: *params,
                        last_observed: *origin,
                        remaining: params.length(),
                        last_spawn: *origin,
                        clearance: 0.0,
                    });
                }
                Event::RunReset => self.active = None,
                Event::TimeAdvanced { .. } => tick_observed = true,
                _ => {}
            }
        }

        if !tick_observed || !run_state.is_runnable() {
            return Ok(());
        }

        self.step_section(progress, difficulty, out)?;

        // Retirement covers every active instance, the section object
        // included; the pool absorbs a same-tick completion/retirement
        // double release.
        for snapshot in instances.iter() {
            if is_offscreen(snapshot) {
                out.push(Command::RetireInstance {
                    instance: snapshot.id,
                });
            }
        }

        Ok(())
    }

    fn step_section(
        &mut self,
        progress: f32,
        difficulty: DifficultySample,
        out: &mut Vec<Command>,
    ) -> Result<(), NoEligibleEntryError> {
        let spawn_offset = self.spawn_offset;
        let visible_length = self.visible_length;
        let Some(run) = self.active.as_mut() else {
            return Ok(());
        };

        let delta = progress - run.last_observed;
        run.remaining -= delta;
        run.last_observed = progress;

        if progress - run.last_spawn < run.params.spacing() + run.clearance {
            return Ok(());
        }

        let mut completed = false;
        if run.remaining > 0.0 {
            // The window's roll is consumed whether or not it spawns.
            run.last_spawn = progress;
            run.clearance = 0.0;

            if self.rng.next_unit() <= run.params.spawn_chance() {
                let catalog = self
                    .catalogs
                    .get(&run.section)
                    .ok_or(NoEligibleEntryError)?;
                let roll = self.rng.next_unit() * catalog.total_weight();
                let descriptor = *catalog.pick_exclusive(roll)?;
                let speed = if descriptor.moving() {
                    run.params.obstacle_speed()
                } else {
                    0.0
                };
                out.push(Command::SpawnObstacle {
                    obstacle: descriptor.obstacle(),
                    position: progress + spawn_offset,
                    speed,
                });
                run.clearance =
                    clearance_distance(spawn_offset, visible_length, speed, difficulty.top_speed);
            }
        } else {
            out.push(Command::CompleteSection {
                instance: run.instance,
            });
            completed = true;
        }

        if completed {
            self.active = None;
        }
        Ok(())
    }
}

/// Length of road a moving obstacle occupies before clearing the viewport.
///
/// The obstacle falls behind at `top_speed - obstacle_speed`, so it stays in
/// view for `(visible_length + spawn_offset) / speed_diff` and travels
/// `obstacle_speed` times that long. Static obstacles (and the degenerate
/// case of an obstacle at least as fast as the vehicle) need no clearance.
fn clearance_distance(
    spawn_offset: f32,
    visible_length: f32,
    obstacle_speed: f32,
    top_speed: f32,
) -> f32 {
    let speed_diff = top_speed - obstacle_speed;
    if obstacle_speed <= 0.0 || speed_diff <= 0.0 {
        return 0.0;
    }
    (visible_length + spawn_offset) / speed_diff * obstacle_speed
}

#[derive(Debug)]
struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    fn new(seed: u64) -> Self {
        let seed = if seed == 0 { 0x9e37_79b9_7f4a_7c15 } else { seed };
        Self { state: seed }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    fn next_unit(&mut self) -> f32 {
        const SCALE: f32 = 1.0 / (1u64 << 24) as f32;
        ((self.next_u64() >> 40) as f32) * SCALE
    }
}
