#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Lane Rush engine.
//!
//! This crate defines the message surface that connects the adapter, the
//! authoritative world, and the pure generation systems. The adapter and the
//! systems submit [`Command`] values describing desired mutations, the world
//! executes those commands via its `apply` entry point, and then broadcasts
//! [`Event`] values for systems to react to deterministically. Systems consume
//! event streams, query immutable snapshots, and respond exclusively with new
//! command batches.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque identifier naming a class of reusable spawnable entity.
///
/// Keys are interned from configuration names at startup and stay stable for
/// the process lifetime; the world never resolves names at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PoolKey(u32);

impl PoolKey {
    /// Creates a new pool key with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the key.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Stable handle to a single pooled instance.
///
/// Instances are created at registration time (or during rare pool growth)
/// and are never destroyed, so identifiers remain valid until teardown.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(u32);

impl InstanceId {
    /// Creates a new instance identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// Lifecycle state of the overall run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RunState {
    /// The run has not started; generation is paused.
    Pending,
    /// The run is live and generation should proceed.
    Running,
    /// The run ended; generation is paused until a reset.
    GameOver,
}

impl RunState {
    /// Reports whether generation logic should execute this tick.
    #[must_use]
    pub const fn is_runnable(&self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Commands that express all permissible world mutations.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Publishes the tracked vehicle's new longitudinal position.
    ///
    /// Issued by the motion integration upstream of the generation pass; the
    /// position is monotonically non-decreasing.
    AdvanceProgress {
        /// Longitudinal world position after this tick's motion step.
        position: f32,
    },
    /// Advances the simulation clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Transitions the run from `Pending` to `Running`.
    StartRun,
    /// Transitions the run from `Running` to `GameOver`.
    EndRun,
    /// Force-releases every active instance and returns the run to `Pending`.
    ResetRun,
    /// Activates a pooled section instance at the current world progress.
    ActivateSection {
        /// Pool key of the section type to activate.
        section: PoolKey,
        /// Parameters assigned to the section for its whole lifetime.
        params: SectionParams,
    },
    /// Materializes a pooled obstacle instance on the track.
    SpawnObstacle {
        /// Pool key of the obstacle type to spawn.
        obstacle: PoolKey,
        /// Longitudinal position the instance is placed at.
        position: f32,
        /// Forward speed assigned to the instance.
        speed: f32,
    },
    /// Signals that the active section consumed its length and spacing.
    CompleteSection {
        /// Pooled instance of the section that finished generating.
        instance: InstanceId,
    },
    /// Returns an instance to its pool after it left the visible region.
    RetireInstance {
        /// Instance to release; releasing an inactive instance is a no-op.
        instance: InstanceId,
    },
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the simulation clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that the tracked vehicle's position advanced.
    ProgressAdvanced {
        /// Longitudinal position after the motion step.
        position: f32,
        /// Distance covered since the previous position.
        delta: f32,
    },
    /// Announces that the run entered a new lifecycle state.
    RunStateChanged {
        /// State that became active after processing commands.
        state: RunState,
    },
    /// Confirms that a section was activated and anchored at an origin.
    SectionActivated {
        /// Pooled instance backing the section.
        instance: InstanceId,
        /// Pool key of the activated section type.
        section: PoolKey,
        /// World progress at the moment of activation.
        origin: f32,
        /// Parameters assigned to the section for its whole lifetime.
        params: SectionParams,
    },
    /// Confirms that an obstacle instance was placed on the track.
    ObstacleSpawned {
        /// Pooled instance backing the obstacle.
        instance: InstanceId,
        /// Pool key of the spawned obstacle type.
        obstacle: PoolKey,
        /// Longitudinal position the instance was placed at.
        position: f32,
        /// Forward speed assigned to the instance.
        speed: f32,
    },
    /// Confirms that the active section finished and returned to its pool.
    SectionCompleted {
        /// Pooled instance that backed the section.
        instance: InstanceId,
        /// Pool key of the completed section type.
        section: PoolKey,
    },
    /// Confirms that an instance was released back to its pool.
    InstanceRetired {
        /// Instance that transitioned back to the inactive state.
        instance: InstanceId,
        /// Pool key of the retired instance's bucket.
        key: PoolKey,
    },
    /// Confirms that the run state, pool, and progress were reset.
    RunReset,
}

/// Parameters assigned to a section at activation time.
///
/// All values are sampled once from the difficulty snapshot of the activating
/// tick so a section's character stays consistent for its whole lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionParams {
    length: f32,
    spacing: f32,
    obstacle_speed: f32,
    spawn_chance: f32,
}

impl SectionParams {
    /// Creates a new parameter bundle for one section activation.
    #[must_use]
    pub const fn new(length: f32, spacing: f32, obstacle_speed: f32, spawn_chance: f32) -> Self {
        Self {
            length,
            spacing,
            obstacle_speed,
            spawn_chance,
        }
    }

    /// Total track length the section is allowed to generate over.
    #[must_use]
    pub const fn length(&self) -> f32 {
        self.length
    }

    /// Minimum longitudinal distance between consecutive spawn windows.
    #[must_use]
    pub const fn spacing(&self) -> f32 {
        self.spacing
    }

    /// Forward speed assigned to every obstacle spawned by the section.
    #[must_use]
    pub const fn obstacle_speed(&self) -> f32 {
        self.obstacle_speed
    }

    /// Probability that an eligible spawn window produces an obstacle.
    #[must_use]
    pub const fn spawn_chance(&self) -> f32 {
        self.spawn_chance
    }
}

/// Per-key descriptor applied to every instance acquired from a bucket.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnPrototype {
    extent: f32,
}

impl SpawnPrototype {
    /// Creates a descriptor with the provided rendered longitudinal extent.
    pub fn new(extent: f32) -> Result<Self, ConfigurationError> {
        if !extent.is_finite() || extent < 0.0 {
            return Err(ConfigurationError::InvalidExtent { value: extent });
        }
        Ok(Self { extent })
    }

    /// Rendered longitudinal extent used by the viewport retirement test.
    #[must_use]
    pub const fn extent(&self) -> f32 {
        self.extent
    }
}

/// Configuration of one section type available to the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SectionDescriptor {
    section: PoolKey,
    min_length: f32,
    max_length: f32,
    base_spacing: f32,
}

impl SectionDescriptor {
    /// Creates a descriptor after validating its bounds.
    pub fn new(
        section: PoolKey,
        min_length: f32,
        max_length: f32,
        base_spacing: f32,
    ) -> Result<Self, ConfigurationError> {
        if !min_length.is_finite()
            || !max_length.is_finite()
            || min_length < 0.0
            || min_length > max_length
        {
            return Err(ConfigurationError::InvalidSectionBounds {
                min: min_length,
                max: max_length,
            });
        }
        if !base_spacing.is_finite() || base_spacing < 0.0 {
            return Err(ConfigurationError::InvalidSpacing {
                value: base_spacing,
            });
        }
        Ok(Self {
            section,
            min_length,
            max_length,
            base_spacing,
        })
    }

    /// Pool key of the section type this descriptor configures.
    #[must_use]
    pub const fn section(&self) -> PoolKey {
        self.section
    }

    /// Shortest length the section may be assigned before difficulty scaling.
    #[must_use]
    pub const fn min_length(&self) -> f32 {
        self.min_length
    }

    /// Longest length the section may be assigned before difficulty scaling.
    #[must_use]
    pub const fn max_length(&self) -> f32 {
        self.max_length
    }

    /// Base obstacle spacing before difficulty scaling.
    #[must_use]
    pub const fn base_spacing(&self) -> f32 {
        self.base_spacing
    }
}

/// Configuration of one obstacle type within a section's catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObstacleDescriptor {
    obstacle: PoolKey,
    moving: bool,
}

impl ObstacleDescriptor {
    /// Creates a descriptor for a static or moving obstacle type.
    #[must_use]
    pub const fn new(obstacle: PoolKey, moving: bool) -> Self {
        Self { obstacle, moving }
    }

    /// Pool key of the obstacle type.
    #[must_use]
    pub const fn obstacle(&self) -> PoolKey {
        self.obstacle
    }

    /// Whether spawned instances travel forward at the section's obstacle
    /// speed; static obstacles stay where they are placed.
    #[must_use]
    pub const fn moving(&self) -> bool {
        self.moving
    }
}

/// Single weighted entry of a [`WeightedTable`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightedEntry<T> {
    weight: f32,
    payload: T,
}

impl<T> WeightedEntry<T> {
    /// Creates an entry pairing a selection weight with its payload.
    pub const fn new(weight: f32, payload: T) -> Self {
        Self { weight, payload }
    }

    /// Selection weight of the entry.
    #[must_use]
    pub const fn weight(&self) -> f32 {
        self.weight
    }

    /// Payload selected when the entry wins a draw.
    #[must_use]
    pub const fn payload(&self) -> &T {
        &self.payload
    }
}

/// Ordered weighted catalog with a precomputed total weight.
///
/// Selection is proportional to weight with a deterministic first-match
/// tie-break: a roll is drawn in `[0, total_weight)` and entries are walked
/// in declaration order subtracting each weight until the remainder crosses
/// the boundary. Two boundary rules exist deliberately (see
/// [`Self::pick_exclusive`] and [`Self::pick_inclusive`]) and every call
/// site must keep using its own rule, since swapping them shifts which entry
/// wins rolls that land exactly on a cumulative weight boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct WeightedTable<T> {
    entries: Vec<WeightedEntry<T>>,
    total_weight: f32,
}

impl<T> WeightedTable<T> {
    /// Builds a table from the provided entries, validating every weight.
    pub fn new(entries: Vec<WeightedEntry<T>>) -> Result<Self, ConfigurationError> {
        let mut total_weight = 0.0_f32;
        for entry in &entries {
            if !entry.weight.is_finite() || entry.weight < 0.0 {
                return Err(ConfigurationError::InvalidWeight {
                    weight: entry.weight,
                });
            }
            total_weight += entry.weight;
        }
        Ok(Self {
            entries,
            total_weight,
        })
    }

    /// Sum of all entry weights.
    #[must_use]
    pub const fn total_weight(&self) -> f32 {
        self.total_weight
    }

    /// Number of entries in the catalog.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether the catalog holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterator over the entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &WeightedEntry<T>> {
        self.entries.iter()
    }

    /// Selects the first entry whose running remainder drops strictly below
    /// zero.
    ///
    /// A roll equal to a leading cumulative weight falls through to the next
    /// entry, so zero-weight entries can never win at this call site.
    pub fn pick_exclusive(&self, roll: f32) -> Result<&T, NoEligibleEntryError> {
        if self.entries.is_empty() || self.total_weight <= 0.0 {
            return Err(NoEligibleEntryError);
        }
        let mut remainder = roll;
        for entry in &self.entries {
            remainder -= entry.weight;
            if remainder < 0.0 {
                return Ok(&entry.payload);
            }
        }
        Err(NoEligibleEntryError)
    }

    /// Selects the first entry whose running remainder reaches zero or below.
    ///
    /// A roll landing exactly on a cumulative weight boundary selects the
    /// entry that closed the boundary, so a leading zero-weight entry wins a
    /// zero roll at this call site.
    pub fn pick_inclusive(&self, roll: f32) -> Result<&T, NoEligibleEntryError> {
        if self.entries.is_empty() || self.total_weight <= 0.0 {
            return Err(NoEligibleEntryError);
        }
        let mut remainder = roll;
        for entry in &self.entries {
            remainder -= entry.weight;
            if remainder <= 0.0 {
                return Ok(&entry.payload);
            }
        }
        Err(NoEligibleEntryError)
    }
}

/// Time window over which difficulty ramps from zero to one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RampWindow {
    start: f32,
    end: f32,
}

impl RampWindow {
    /// Creates a ramp window, requiring the end to come after the start.
    pub fn new(start: f32, end: f32) -> Result<Self, ConfigurationError> {
        if !start.is_finite() || !end.is_finite() || end <= start {
            return Err(ConfigurationError::InvalidRampWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Elapsed play time at which the ramp begins.
    #[must_use]
    pub const fn start(&self) -> f32 {
        self.start
    }

    /// Elapsed play time at which the ramp saturates.
    #[must_use]
    pub const fn end(&self) -> f32 {
        self.end
    }
}

/// Ordered speed interval interpolated by the difficulty factor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpeedRange {
    min: f32,
    max: f32,
}

impl SpeedRange {
    /// Creates a speed range, requiring ordered non-negative bounds.
    pub fn new(min: f32, max: f32) -> Result<Self, ConfigurationError> {
        if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max {
            return Err(ConfigurationError::InvalidRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Speed applied at zero difficulty.
    #[must_use]
    pub const fn min(&self) -> f32 {
        self.min
    }

    /// Speed applied at full difficulty.
    #[must_use]
    pub const fn max(&self) -> f32 {
        self.max
    }
}

/// Ordered probability interval interpolated by the difficulty factor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChanceRange {
    min: f32,
    max: f32,
}

impl ChanceRange {
    /// Creates a chance range, requiring ordered bounds within `[0, 1]`.
    pub fn new(min: f32, max: f32) -> Result<Self, ConfigurationError> {
        if !min.is_finite() || !max.is_finite() || min < 0.0 || min > max || max > 1.0 {
            return Err(ConfigurationError::InvalidChanceRange { min, max });
        }
        Ok(Self { min, max })
    }

    /// Probability applied at zero difficulty.
    #[must_use]
    pub const fn min(&self) -> f32 {
        self.min
    }

    /// Probability applied at full difficulty.
    #[must_use]
    pub const fn max(&self) -> f32 {
        self.max
    }
}

/// Static tuning of the time-based difficulty model.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DifficultyConfig {
    ramp: RampWindow,
    top_speed: SpeedRange,
    obstacle_speed: SpeedRange,
    spawn_chance: ChanceRange,
}

impl DifficultyConfig {
    /// Assembles a difficulty configuration from pre-validated components.
    #[must_use]
    pub const fn new(
        ramp: RampWindow,
        top_speed: SpeedRange,
        obstacle_speed: SpeedRange,
        spawn_chance: ChanceRange,
    ) -> Self {
        Self {
            ramp,
            top_speed,
            obstacle_speed,
            spawn_chance,
        }
    }

    /// Window over which the difficulty factor climbs from zero to one.
    #[must_use]
    pub const fn ramp(&self) -> RampWindow {
        self.ramp
    }

    /// Vehicle top-speed interval.
    #[must_use]
    pub const fn top_speed(&self) -> SpeedRange {
        self.top_speed
    }

    /// Obstacle forward-speed interval.
    #[must_use]
    pub const fn obstacle_speed(&self) -> SpeedRange {
        self.obstacle_speed
    }

    /// Spawn-probability interval.
    #[must_use]
    pub const fn spawn_chance(&self) -> ChanceRange {
        self.spawn_chance
    }
}

/// Difficulty-derived quantities sampled once per tick.
///
/// Every consumer within a tick must use the same sample so a section is
/// never activated with a different difficulty than the obstacles spawned
/// into it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DifficultySample {
    /// Normalized ramp progress in `[0, 1]`.
    pub factor: f32,
    /// Vehicle top speed at this difficulty.
    pub top_speed: f32,
    /// Obstacle forward speed at this difficulty.
    pub obstacle_speed: f32,
    /// Probability that an eligible spawn window produces an obstacle.
    pub spawn_chance: f32,
    /// Multiplier widening section lengths and obstacle spacing.
    pub length_scale: f32,
}

/// Immutable representation of a single active instance used for queries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InstanceSnapshot {
    /// Stable handle of the pooled instance.
    pub id: InstanceId,
    /// Pool key of the instance's bucket.
    pub key: PoolKey,
    /// Longitudinal position of the instance.
    pub position: f32,
    /// Forward speed assigned to the instance.
    pub speed: f32,
    /// Rendered longitudinal extent from the instance's prototype.
    pub extent: f32,
}

/// Read-only snapshot describing all active instances.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstanceView {
    snapshots: Vec<InstanceSnapshot>,
}

impl InstanceView {
    /// Creates a new view from the provided snapshots.
    #[must_use]
    pub fn from_snapshots(mut snapshots: Vec<InstanceSnapshot>) -> Self {
        snapshots.sort_by_key(|snapshot| snapshot.id);
        Self { snapshots }
    }

    /// Iterator over the captured snapshots in deterministic order.
    pub fn iter(&self) -> impl Iterator<Item = &InstanceSnapshot> {
        self.snapshots.iter()
    }

    /// Number of active instances captured by the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Reports whether no instance was active when the view was captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Consumes the view, yielding the underlying snapshots.
    #[must_use]
    pub fn into_vec(self) -> Vec<InstanceSnapshot> {
        self.snapshots
    }
}

/// Fatal startup error caused by invalid static configuration.
#[derive(Clone, Copy, Debug, Error, PartialEq)]
pub enum ConfigurationError {
    /// A pool key was registered twice.
    #[error("pool key {key:?} is already registered")]
    DuplicatePoolKey {
        /// Key that collided with an existing bucket.
        key: PoolKey,
    },
    /// A catalog entry carried a negative or non-finite weight.
    #[error("catalog weight {weight} must be finite and non-negative")]
    InvalidWeight {
        /// Offending weight value.
        weight: f32,
    },
    /// The difficulty ramp does not end after it starts.
    #[error("difficulty ramp must end after it starts (start {start}, end {end})")]
    InvalidRampWindow {
        /// Configured ramp start.
        start: f32,
        /// Configured ramp end.
        end: f32,
    },
    /// A speed interval was unordered, negative, or non-finite.
    #[error("range minimum {min} must be non-negative and not exceed maximum {max}")]
    InvalidRange {
        /// Configured interval minimum.
        min: f32,
        /// Configured interval maximum.
        max: f32,
    },
    /// A probability interval left `[0, 1]` or was unordered.
    #[error("spawn chance bounds ({min}, {max}) must be ordered and lie within [0, 1]")]
    InvalidChanceRange {
        /// Configured interval minimum.
        min: f32,
        /// Configured interval maximum.
        max: f32,
    },
    /// Section length bounds were unordered, negative, or non-finite.
    #[error("section length bounds ({min}, {max}) must be finite, non-negative, and ordered")]
    InvalidSectionBounds {
        /// Configured minimum section length.
        min: f32,
        /// Configured maximum section length.
        max: f32,
    },
    /// A base spacing value was negative or non-finite.
    #[error("obstacle spacing {value} must be finite and non-negative")]
    InvalidSpacing {
        /// Offending spacing value.
        value: f32,
    },
    /// A prototype extent was negative or non-finite.
    #[error("instance extent {value} must be finite and non-negative")]
    InvalidExtent {
        /// Offending extent value.
        value: f32,
    },
}

/// Programming defect: an acquire targeted a key that was never registered.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("pool key {key:?} was never registered")]
pub struct UnknownKeyError {
    /// Key that failed to resolve to a registered bucket.
    pub key: PoolKey,
}

/// A weighted draw found no entry to select.
///
/// Raised for empty catalogs and zero total weight. Never swallowed: an
/// undiagnosed draw failure would manifest as the world silently ceasing to
/// generate.
#[derive(Clone, Copy, Debug, Default, Error, PartialEq, Eq)]
#[error("weighted catalog has no eligible entry (empty or zero total weight)")]
pub struct NoEligibleEntryError;
