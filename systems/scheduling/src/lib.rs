#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Deterministic section scheduler that activates one road section at a time.

use lane_rush_core::{
    Command, DifficultySample, Event, NoEligibleEntryError, RunState, SectionDescriptor,
    SectionParams, WeightedTable,
};

/// Configuration parameters required to construct the scheduling system.
#[derive(Clone, Debug)]
pub struct Config {
    catalog: WeightedTable<SectionDescriptor>,
    rng_seed: u64,
}

impl Config {
    /// Creates a new configuration from a section catalog and RNG seed.
    #[must_use]
    pub const fn new(catalog: WeightedTable<SectionDescriptor>, rng_seed: u64) -> Self {
        Self { catalog, rng_seed }
    }
}

/// Activation state of the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    /// No section is generating; the next runnable tick picks one.
    Idle,
    /// A section is generating; activation waits for its completion signal.
    SectionActive,
}

/// Pure system that weighted-draws sections and reacts to completion events.
///
/// The scheduler never polls the spawner's internal state: it transitions
/// back to [`SchedulerState::Idle`] only when the world broadcasts
/// [`Event::SectionCompleted`] (or [`Event::RunReset`]), which keeps the two
/// systems independently testable.
#[derive(Debug)]
pub struct Scheduling {
    state: SchedulerState,
    catalog: WeightedTable<SectionDescriptor>,
    rng: SplitMix64,
}

impl Scheduling {
    /// Creates a new scheduling system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            state: SchedulerState::Idle,
            catalog: config.catalog,
            rng: SplitMix64::new(config.rng_seed),
        }
    }

    /// Current activation state, exposed for diagnostics and tests.
    #[must_use]
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    /// Consumes world events and the tick's difficulty sample to emit at most
    /// one [`Command::ActivateSection`].
    pub fn handle(
        &mut self,
        events: &[Event],
        run_state: RunState,
        difficulty: DifficultySample,
        out: &mut Vec<Command>,
    ) -> Result<(), NoEligibleEntryError> {
        let mut tick_observed = false;
        for event in events {
            match event {
                Event::SectionCompleted { .. } | Event::RunReset => {
                    self.state = SchedulerState::Idle;
                }
                Event::TimeAdvanced { .. } => tick_observed = true,
                _ => {}
            }
        }

        if !tick_observed || self.state != SchedulerState::Idle || !run_state.is_runnable() {
            return Ok(());
        }

        let roll = self.rng.next_unit() * self.catalog.total_weight();
        let descriptor = *self.catalog.pick_inclusive(roll)?;

        let span = descriptor.max_length() - descriptor.min_length();
        let length = (descriptor.min_length() + self.rng.next_unit() * span) * difficulty.length_scale;
        let spacing = descriptor.base_spacing() * difficulty.length_scale;
        let params = SectionParams::new(
            length,
            spacing,
            difficulty.obstacle_speed,
            difficulty.spawn_chance,
        );

        out.push(Command::ActivateSection {
            section: descriptor.section(),
            params,
        });
        self.state = SchedulerState::SectionActive;
        Ok(())
    }
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
