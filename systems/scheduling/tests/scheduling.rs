use std::time::Duration;

use lane_rush_core::{
    Command, DifficultySample, Event, PoolKey, SectionDescriptor, SpawnPrototype, WeightedEntry,
    WeightedTable,
};
use lane_rush_system_scheduling::{Config, SchedulerState, Scheduling};
use lane_rush_world::{self as world, query, PoolRegistration, World};

const HIGHWAY: PoolKey = PoolKey::new(0);
const TUNNEL: PoolKey = PoolKey::new(1);

fn build_world() -> World {
    let mut world = World::new(&[
        PoolRegistration::new(HIGHWAY, SpawnPrototype::new(400.0).expect("extent"), 2),
        PoolRegistration::new(TUNNEL, SpawnPrototype::new(400.0).expect("extent"), 2),
    ])
    .expect("world construction");
    let mut events = Vec::new();
    world::apply(&mut world, Command::StartRun, &mut events).expect("start");
    world
}

fn scheduling(weights: [f32; 2]) -> Scheduling {
    let catalog = WeightedTable::new(vec![
        WeightedEntry::new(
            weights[0],
            SectionDescriptor::new(HIGHWAY, 100.0, 400.0, 20.0).expect("descriptor"),
        ),
        WeightedEntry::new(
            weights[1],
            SectionDescriptor::new(TUNNEL, 150.0, 300.0, 30.0).expect("descriptor"),
        ),
    ])
    .expect("catalog");
    Scheduling::new(Config::new(catalog, 0x9d2c_5680_1a2b_3c4d))
}

fn flat_sample() -> DifficultySample {
    DifficultySample {
        factor: 0.0,
        top_speed: 5.0,
        obstacle_speed: 4.0,
        spawn_chance: 0.2,
        length_scale: 1.0,
    }
}

#[test]
fn at_most_one_section_is_active_for_any_tick_sequence() {
    let mut world = build_world();
    let mut scheduling = scheduling([3.0, 1.0]);
    let mut carried: Vec<Event> = Vec::new();
    let mut activations = 0usize;
    let mut completions = 0usize;

    for tick in 0..300u32 {
        let mut events = std::mem::take(&mut carried);
        world::apply(
            &mut world,
            Command::AdvanceProgress {
                position: tick as f32 * 10.0,
            },
            &mut events,
        )
        .expect("progress");
        world::apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_millis(100),
            },
            &mut events,
        )
        .expect("tick");

        let was_active = query::active_section(&world).is_some();
        let mut commands = Vec::new();
        scheduling
            .handle(&events, query::run_state(&world), flat_sample(), &mut commands)
            .expect("handle");
        if was_active {
            assert!(
                commands.is_empty(),
                "scheduler activated while a section was pending at tick {tick}"
            );
        }
        for command in commands {
            world::apply(&mut world, command, &mut events).expect("apply");
        }
        activations += events
            .iter()
            .filter(|event| matches!(event, Event::SectionActivated { .. }))
            .count();

        // Stand in for the spawner: finish the running section every so often.
        if tick % 7 == 6 {
            if let Some(active) = query::active_section(&world) {
                world::apply(
                    &mut world,
                    Command::CompleteSection {
                        instance: active.instance,
                    },
                    &mut carried,
                )
                .expect("complete");
                completions += 1;
            }
        }
    }

    assert!(completions > 10, "expected steady section turnover");
    assert!(activations >= completions);
    assert!(
        activations - completions <= 1,
        "activations must trail completions by at most the pending section"
    );
}

#[test]
fn scheduler_state_mirrors_the_world_between_ticks() {
    let mut world = build_world();
    let mut scheduling = scheduling([1.0, 1.0]);
    let mut events = Vec::new();

    world::apply(
        &mut world,
        Command::Tick {
            dt: Duration::from_millis(100),
        },
        &mut events,
    )
    .expect("tick");
    let mut commands = Vec::new();
    scheduling
        .handle(&events, query::run_state(&world), flat_sample(), &mut commands)
        .expect("handle");
    for command in commands {
        world::apply(&mut world, command, &mut events).expect("apply");
    }
    assert_eq!(scheduling.state(), SchedulerState::SectionActive);
    assert!(query::active_section(&world).is_some());

    let active = query::active_section(&world).expect("active section");
    events.clear();
    world::apply(
        &mut world,
        Command::CompleteSection {
            instance: active.instance,
        },
        &mut events,
    )
    .expect("complete");
    let mut commands = Vec::new();
    scheduling
        .handle(&events, query::run_state(&world), flat_sample(), &mut commands)
        .expect("handle");
    assert_eq!(scheduling.state(), SchedulerState::Idle);
    assert!(query::active_section(&world).is_none());
}

#[test]
fn zero_weight_entries_never_win_the_inclusive_draw() {
    let mut world = build_world();
    let mut scheduling = scheduling([1.0, 0.0]);

    for tick in 0..50u32 {
        let mut events = Vec::new();
        world::apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_millis(100),
            },
            &mut events,
        )
        .expect("tick");
        let mut commands = Vec::new();
        scheduling
            .handle(&events, query::run_state(&world), flat_sample(), &mut commands)
            .expect("handle");
        for command in commands {
            match &command {
                Command::ActivateSection { section, .. } => assert_eq!(*section, HIGHWAY),
                other => panic!("unexpected command {other:?} at tick {tick}"),
            }
            world::apply(&mut world, command, &mut events).expect("apply");
        }
        if let Some(active) = query::active_section(&world) {
            let mut completion_events = Vec::new();
            world::apply(
                &mut world,
                Command::CompleteSection {
                    instance: active.instance,
                },
                &mut completion_events,
            )
            .expect("complete");
            let mut commands = Vec::new();
            scheduling
                .handle(
                    &completion_events,
                    query::run_state(&world),
                    flat_sample(),
                    &mut commands,
                )
                .expect("handle");
            assert!(commands.is_empty(), "completion alone must not activate");
        }
    }
}
