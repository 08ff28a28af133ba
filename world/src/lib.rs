#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative world state management for Lane Rush.
//!
//! The world owns the object pool, the tracked vehicle's forward progress,
//! the elapsed play clock, and the at-most-one-active-section bookkeeping.
//! It is mutated exclusively through [`apply`] and read exclusively through
//! the [`query`] module.

mod pool;

use std::time::Duration;

use lane_rush_core::{
    Command, ConfigurationError, Event, InstanceId, PoolKey, RunState, SpawnPrototype,
    UnknownKeyError,
};
use pool::ObjectPool;

/// Static description of one pool bucket registered at startup.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoolRegistration {
    key: PoolKey,
    prototype: SpawnPrototype,
    initial_count: usize,
}

impl PoolRegistration {
    /// Creates a registration for `initial_count` pre-populated instances.
    #[must_use]
    pub const fn new(key: PoolKey, prototype: SpawnPrototype, initial_count: usize) -> Self {
        Self {
            key,
            prototype,
            initial_count,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct ActiveSection {
    instance: InstanceId,
    section: PoolKey,
}

/// Represents the authoritative Lane Rush world state.
#[derive(Debug)]
pub struct World {
    pool: ObjectPool,
    progress: f32,
    elapsed: Duration,
    run_state: RunState,
    active_section: Option<ActiveSection>,
}

impl World {
    /// Creates a new world with every configured pool bucket pre-populated.
    pub fn new(registrations: &[PoolRegistration]) -> Result<Self, ConfigurationError> {
        let mut pool = ObjectPool::new();
        for registration in registrations {
            pool.register(
                registration.key,
                registration.prototype,
                registration.initial_count,
            )?;
        }
        Ok(Self {
            pool,
            progress: 0.0,
            elapsed: Duration::ZERO,
            run_state: RunState::Pending,
            active_section: None,
        })
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Errors are programming defects (an acquire against an unregistered key)
/// and must halt the caller rather than be retried.
pub fn apply(
    world: &mut World,
    command: Command,
    out_events: &mut Vec<Event>,
) -> Result<(), UnknownKeyError> {
    match command {
        Command::AdvanceProgress { position } => {
            if position < world.progress {
                log::warn!(
                    "ignoring non-monotonic progress update {position} behind {}",
                    world.progress
                );
                return Ok(());
            }
            let delta = position - world.progress;
            world.progress = position;
            out_events.push(Event::ProgressAdvanced { position, delta });
        }
        Command::Tick { dt } => {
            if world.run_state.is_runnable() {
                world.elapsed = world.elapsed.saturating_add(dt);
                world.pool.advance_active(dt.as_secs_f32());
            }
            out_events.push(Event::TimeAdvanced { dt });
        }
        Command::StartRun => {
            if world.run_state == RunState::Pending {
                world.run_state = RunState::Running;
                out_events.push(Event::RunStateChanged {
                    state: RunState::Running,
                });
            } else {
                log::warn!("ignoring start request in state {:?}", world.run_state);
            }
        }
        Command::EndRun => {
            if world.run_state == RunState::Running {
                world.run_state = RunState::GameOver;
                out_events.push(Event::RunStateChanged {
                    state: RunState::GameOver,
                });
            } else {
                log::warn!("ignoring end request in state {:?}", world.run_state);
            }
        }
        Command::ResetRun => {
            let released = world.pool.force_release_all();
            log::debug!("reset released {released} active instances");
            world.active_section = None;
            world.progress = 0.0;
            world.elapsed = Duration::ZERO;
            world.run_state = RunState::Pending;
            out_events.push(Event::RunReset);
        }
        Command::ActivateSection { section, params } => {
            if world.active_section.is_some() {
                log::warn!("ignoring section activation while one is pending completion");
                return Ok(());
            }
            let instance = world.pool.acquire(section)?;
            let origin = world.progress;
            world.pool.place(instance, origin, 0.0);
            world.active_section = Some(ActiveSection { instance, section });
            out_events.push(Event::SectionActivated {
                instance,
                section,
                origin,
                params,
            });
        }
        Command::SpawnObstacle {
            obstacle,
            position,
            speed,
        } => {
            let instance = world.pool.acquire(obstacle)?;
            world.pool.place(instance, position, speed);
            out_events.push(Event::ObstacleSpawned {
                instance,
                obstacle,
                position,
                speed,
            });
        }
        Command::CompleteSection { instance } => {
            // The offscreen check may already have returned the handle;
            // release is idempotent either way.
            let _ = world.pool.release(instance);
            match world.active_section.take() {
                Some(active) if active.instance == instance => {
                    out_events.push(Event::SectionCompleted {
                        instance,
                        section: active.section,
                    });
                }
                Some(active) => {
                    world.active_section = Some(active);
                    log::warn!("ignoring completion signal from a non-active section");
                }
                None => log::warn!("ignoring completion signal with no active section"),
            }
        }
        Command::RetireInstance { instance } => {
            if let Some(key) = world.pool.release(instance) {
                out_events.push(Event::InstanceRetired { instance, key });
            }
        }
    }
    Ok(())
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use std::time::Duration;

    use super::World;
    use lane_rush_core::{InstanceId, InstanceSnapshot, InstanceView, PoolKey, RunState};

    /// Longitudinal position of the tracked vehicle.
    #[must_use]
    pub fn progress(world: &World) -> f32 {
        world.progress
    }

    /// Play time accumulated while the run was live.
    #[must_use]
    pub fn elapsed(world: &World) -> Duration {
        world.elapsed
    }

    /// Current lifecycle state of the run.
    #[must_use]
    pub fn run_state(world: &World) -> RunState {
        world.run_state
    }

    /// Reports whether generation logic should execute this tick.
    #[must_use]
    pub fn is_runnable(world: &World) -> bool {
        world.run_state.is_runnable()
    }

    /// The section currently pending completion, if any.
    #[must_use]
    pub fn active_section(world: &World) -> Option<ActiveSectionSnapshot> {
        world.active_section.map(|active| ActiveSectionSnapshot {
            instance: active.instance,
            section: active.section,
        })
    }

    /// Active/inactive instance counts for one registered bucket.
    #[must_use]
    pub fn pool_counts(world: &World, key: PoolKey) -> Option<PoolCounts> {
        world
            .pool
            .counts(key)
            .map(|(active, inactive)| PoolCounts { active, inactive })
    }

    /// Captures a read-only view of every active instance.
    #[must_use]
    pub fn instance_view(world: &World) -> InstanceView {
        let snapshots: Vec<InstanceSnapshot> = world
            .pool
            .iter_active()
            .map(|(id, instance)| InstanceSnapshot {
                id,
                key: instance.key(),
                position: instance.position(),
                speed: instance.speed(),
                extent: instance.extent(),
            })
            .collect();
        InstanceView::from_snapshots(snapshots)
    }

    /// Identifies the pooled instance backing the active section.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ActiveSectionSnapshot {
        /// Pooled instance pending completion.
        pub instance: InstanceId,
        /// Pool key of the active section type.
        pub section: PoolKey,
    }

    /// Instance counts of one pool bucket.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PoolCounts {
        /// Instances currently owned by the simulation.
        pub active: usize,
        /// Instances currently owned by the pool.
        pub inactive: usize,
    }
}

#[cfg(test)]
mod tests {
    use super::{apply, query, PoolRegistration, World};
    use lane_rush_core::{
        Command, Event, PoolKey, RunState, SectionParams, SpawnPrototype,
    };
    use std::time::Duration;

    const SECTION: PoolKey = PoolKey::new(0);
    const OBSTACLE: PoolKey = PoolKey::new(1);

    fn world() -> World {
        World::new(&[
            PoolRegistration::new(SECTION, SpawnPrototype::new(500.0).expect("extent"), 2),
            PoolRegistration::new(OBSTACLE, SpawnPrototype::new(4.0).expect("extent"), 4),
        ])
        .expect("world")
    }

    fn params() -> SectionParams {
        SectionParams::new(200.0, 20.0, 6.0, 0.5)
    }

    #[test]
    fn progress_updates_are_monotonic() {
        let mut world = world();
        let mut events = Vec::new();

        apply(
            &mut world,
            Command::AdvanceProgress { position: 50.0 },
            &mut events,
        )
        .expect("apply");
        apply(
            &mut world,
            Command::AdvanceProgress { position: 30.0 },
            &mut events,
        )
        .expect("apply");

        assert_eq!(query::progress(&world), 50.0);
        assert_eq!(
            events,
            vec![Event::ProgressAdvanced {
                position: 50.0,
                delta: 50.0
            }]
        );
    }

    #[test]
    fn clock_accrues_only_while_running() {
        let mut world = world();
        let mut events = Vec::new();
        let dt = Duration::from_millis(16);

        apply(&mut world, Command::Tick { dt }, &mut events).expect("apply");
        assert_eq!(query::elapsed(&world), Duration::ZERO);

        apply(&mut world, Command::StartRun, &mut events).expect("apply");
        apply(&mut world, Command::Tick { dt }, &mut events).expect("apply");
        assert_eq!(query::elapsed(&world), dt);
    }

    #[test]
    fn run_state_transitions_follow_the_table() {
        let mut world = world();
        let mut events = Vec::new();

        assert_eq!(query::run_state(&world), RunState::Pending);
        apply(&mut world, Command::EndRun, &mut events).expect("apply");
        assert_eq!(query::run_state(&world), RunState::Pending);

        apply(&mut world, Command::StartRun, &mut events).expect("apply");
        assert_eq!(query::run_state(&world), RunState::Running);
        assert!(query::is_runnable(&world));

        apply(&mut world, Command::StartRun, &mut events).expect("apply");
        assert_eq!(query::run_state(&world), RunState::Running);

        apply(&mut world, Command::EndRun, &mut events).expect("apply");
        assert_eq!(query::run_state(&world), RunState::GameOver);
        assert!(!query::is_runnable(&world));
    }

    #[test]
    fn second_activation_is_ignored_while_one_is_pending() {
        let mut world = world();
        let mut events = Vec::new();

        apply(
            &mut world,
            Command::ActivateSection {
                section: SECTION,
                params: params(),
            },
            &mut events,
        )
        .expect("apply");
        apply(
            &mut world,
            Command::ActivateSection {
                section: SECTION,
                params: params(),
            },
            &mut events,
        )
        .expect("apply");

        let activations = events
            .iter()
            .filter(|event| matches!(event, Event::SectionActivated { .. }))
            .count();
        assert_eq!(activations, 1);
        assert_eq!(query::pool_counts(&world, SECTION).expect("counts").active, 1);
    }

    #[test]
    fn completion_releases_the_active_section() {
        let mut world = world();
        let mut events = Vec::new();

        apply(
            &mut world,
            Command::ActivateSection {
                section: SECTION,
                params: params(),
            },
            &mut events,
        )
        .expect("apply");
        let instance = match query::active_section(&world) {
            Some(active) => active.instance,
            None => panic!("expected an active section"),
        };

        events.clear();
        apply(&mut world, Command::CompleteSection { instance }, &mut events).expect("apply");

        assert_eq!(
            events,
            vec![Event::SectionCompleted {
                instance,
                section: SECTION
            }]
        );
        assert!(query::active_section(&world).is_none());
        assert_eq!(query::pool_counts(&world, SECTION).expect("counts").active, 0);
    }

    #[test]
    fn ticking_integrates_moving_instances() {
        let mut world = world();
        let mut events = Vec::new();

        apply(&mut world, Command::StartRun, &mut events).expect("apply");
        apply(
            &mut world,
            Command::SpawnObstacle {
                obstacle: OBSTACLE,
                position: 100.0,
                speed: 6.0,
            },
            &mut events,
        )
        .expect("apply");
        apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_secs(2),
            },
            &mut events,
        )
        .expect("apply");

        let view = query::instance_view(&world);
        let snapshot = view.iter().next().expect("one active instance");
        assert_eq!(snapshot.position, 112.0);
        assert_eq!(snapshot.speed, 6.0);
    }

    #[test]
    fn retiring_an_inactive_instance_emits_nothing() {
        let mut world = world();
        let mut events = Vec::new();

        apply(
            &mut world,
            Command::SpawnObstacle {
                obstacle: OBSTACLE,
                position: 10.0,
                speed: 0.0,
            },
            &mut events,
        )
        .expect("apply");
        let instance = match events.last() {
            Some(Event::ObstacleSpawned { instance, .. }) => *instance,
            other => panic!("expected a spawn event, got {other:?}"),
        };

        events.clear();
        apply(&mut world, Command::RetireInstance { instance }, &mut events).expect("apply");
        apply(&mut world, Command::RetireInstance { instance }, &mut events).expect("apply");

        assert_eq!(
            events,
            vec![Event::InstanceRetired {
                instance,
                key: OBSTACLE
            }]
        );
    }

    #[test]
    fn reset_returns_everything_to_the_pool() {
        let mut world = world();
        let mut events = Vec::new();

        apply(&mut world, Command::StartRun, &mut events).expect("apply");
        apply(
            &mut world,
            Command::AdvanceProgress { position: 250.0 },
            &mut events,
        )
        .expect("apply");
        apply(
            &mut world,
            Command::ActivateSection {
                section: SECTION,
                params: params(),
            },
            &mut events,
        )
        .expect("apply");
        apply(
            &mut world,
            Command::SpawnObstacle {
                obstacle: OBSTACLE,
                position: 300.0,
                speed: 6.0,
            },
            &mut events,
        )
        .expect("apply");

        events.clear();
        apply(&mut world, Command::ResetRun, &mut events).expect("apply");

        assert_eq!(events, vec![Event::RunReset]);
        assert_eq!(query::run_state(&world), RunState::Pending);
        assert_eq!(query::progress(&world), 0.0);
        assert_eq!(query::elapsed(&world), Duration::ZERO);
        assert!(query::active_section(&world).is_none());
        assert!(query::instance_view(&world).is_empty());
    }
}
