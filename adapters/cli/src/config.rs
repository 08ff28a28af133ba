//! Static TOML configuration surface for the simulation.
//!
//! The manifest is loaded once at startup and translated into the validated
//! catalog types the world and systems consume; pool names only exist here,
//! interned into dense [`PoolKey`] values before anything else runs.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use lane_rush_core::{
    ChanceRange, DifficultyConfig, ObstacleDescriptor, PoolKey, RampWindow, SectionDescriptor,
    SpawnPrototype, SpeedRange, WeightedEntry, WeightedTable,
};
use lane_rush_world::PoolRegistration;

/// Manifest compiled into the binary and used when `--config` is absent.
pub(crate) const DEFAULT_MANIFEST: &str = r#"
[difficulty]
ramp_start = 10.0
ramp_end = 120.0
min_top_speed = 5.0
max_top_speed = 10.0
min_obstacle_speed = 4.0
max_obstacle_speed = 8.0
min_spawn_chance = 0.25
max_spawn_chance = 0.85

[track]
spawn_offset = 60.0
visible_length = 40.0
offscreen_margin = 5.0
acceleration_time = 2.0

[[pools]]
name = "city-street"
extent = 400.0
initial_count = 2

[[pools]]
name = "overpass"
extent = 300.0
initial_count = 2

[[pools]]
name = "parked-van"
extent = 5.0
initial_count = 12

[[pools]]
name = "roadblock"
extent = 3.0
initial_count = 8

[[pools]]
name = "drifting-sedan"
extent = 5.0
initial_count = 10
moving = true

[[sections]]
name = "city-street"
weight = 3.0
min_length = 80.0
max_length = 400.0
spacing = 12.0

[[sections.obstacles]]
name = "parked-van"
weight = 2.0

[[sections.obstacles]]
name = "drifting-sedan"
weight = 3.0

[[sections.obstacles]]
name = "roadblock"
weight = 1.0

[[sections]]
name = "overpass"
weight = 1.0
min_length = 100.0
max_length = 250.0
spacing = 20.0

[[sections.obstacles]]
name = "roadblock"
weight = 1.0

[[sections.obstacles]]
name = "drifting-sedan"
weight = 1.0
"#;

#[derive(Debug, Deserialize)]
struct Manifest {
    difficulty: DifficultyManifest,
    track: TrackManifest,
    #[serde(default)]
    pools: Vec<PoolManifest>,
    #[serde(default)]
    sections: Vec<SectionManifest>,
}

#[derive(Debug, Deserialize)]
struct DifficultyManifest {
    ramp_start: f32,
    ramp_end: f32,
    min_top_speed: f32,
    max_top_speed: f32,
    min_obstacle_speed: f32,
    max_obstacle_speed: f32,
    min_spawn_chance: f32,
    max_spawn_chance: f32,
}

#[derive(Debug, Deserialize)]
struct TrackManifest {
    spawn_offset: f32,
    visible_length: f32,
    offscreen_margin: f32,
    acceleration_time: f32,
}

#[derive(Debug, Deserialize)]
struct PoolManifest {
    name: String,
    extent: f32,
    initial_count: usize,
    #[serde(default)]
    moving: bool,
}

#[derive(Debug, Deserialize)]
struct SectionManifest {
    name: String,
    weight: f32,
    min_length: f32,
    max_length: f32,
    spacing: f32,
    #[serde(default)]
    obstacles: Vec<ObstacleChanceManifest>,
}

#[derive(Debug, Deserialize)]
struct ObstacleChanceManifest {
    name: String,
    weight: f32,
}

/// Track-level tuning shared by motion integration and the spawner.
#[derive(Clone, Copy, Debug)]
pub(crate) struct TrackTuning {
    pub(crate) spawn_offset: f32,
    pub(crate) visible_length: f32,
    pub(crate) offscreen_margin: f32,
    pub(crate) acceleration_time: f32,
}

/// Fully translated, validated configuration ready for the composition root.
#[derive(Clone, Debug)]
pub(crate) struct SimulationConfig {
    pub(crate) difficulty: DifficultyConfig,
    pub(crate) registrations: Vec<PoolRegistration>,
    pub(crate) section_catalog: WeightedTable<SectionDescriptor>,
    pub(crate) obstacle_catalogs: HashMap<PoolKey, WeightedTable<ObstacleDescriptor>>,
    pub(crate) track: TrackTuning,
    pub(crate) names: Vec<String>,
}

impl SimulationConfig {
    pub(crate) fn from_toml(contents: &str) -> Result<Self> {
        let manifest: Manifest =
            toml::from_str(contents).context("failed to parse simulation manifest")?;
        Self::from_manifest(manifest)
    }

    fn from_manifest(manifest: Manifest) -> Result<Self> {
        let mut keys: HashMap<String, PoolKey> = HashMap::new();
        let mut moving_flags: HashMap<PoolKey, bool> = HashMap::new();
        let mut names = Vec::with_capacity(manifest.pools.len());
        let mut registrations = Vec::with_capacity(manifest.pools.len());

        for pool in &manifest.pools {
            if keys.contains_key(&pool.name) {
                bail!("pool {} is declared twice", pool.name);
            }
            let key = PoolKey::new(names.len() as u32);
            let prototype = SpawnPrototype::new(pool.extent)
                .with_context(|| format!("pool {}", pool.name))?;
            registrations.push(PoolRegistration::new(key, prototype, pool.initial_count));
            let _ = keys.insert(pool.name.clone(), key);
            let _ = moving_flags.insert(key, pool.moving);
            names.push(pool.name.clone());
        }

        let mut section_entries = Vec::with_capacity(manifest.sections.len());
        let mut obstacle_catalogs = HashMap::new();
        for section in &manifest.sections {
            let key = *keys
                .get(&section.name)
                .with_context(|| format!("section {} has no pool entry", section.name))?;
            let descriptor =
                SectionDescriptor::new(key, section.min_length, section.max_length, section.spacing)
                    .with_context(|| format!("section {}", section.name))?;
            section_entries.push(WeightedEntry::new(section.weight, descriptor));

            let mut obstacle_entries = Vec::with_capacity(section.obstacles.len());
            for obstacle in &section.obstacles {
                let obstacle_key = *keys.get(&obstacle.name).with_context(|| {
                    format!(
                        "obstacle {} of section {} has no pool entry",
                        obstacle.name, section.name
                    )
                })?;
                let moving = moving_flags.get(&obstacle_key).copied().unwrap_or(false);
                obstacle_entries.push(WeightedEntry::new(
                    obstacle.weight,
                    ObstacleDescriptor::new(obstacle_key, moving),
                ));
            }
            let catalog = WeightedTable::new(obstacle_entries)
                .with_context(|| format!("obstacle catalog of section {}", section.name))?;
            if catalog.is_empty() || catalog.total_weight() <= 0.0 {
                bail!(
                    "obstacle catalog of section {} must carry positive total weight",
                    section.name
                );
            }
            let _ = obstacle_catalogs.insert(key, catalog);
        }

        let section_catalog =
            WeightedTable::new(section_entries).context("section catalog")?;
        if section_catalog.is_empty() || section_catalog.total_weight() <= 0.0 {
            bail!("section catalog must carry at least one positively weighted section");
        }

        let difficulty = DifficultyConfig::new(
            RampWindow::new(manifest.difficulty.ramp_start, manifest.difficulty.ramp_end)
                .context("difficulty ramp")?,
            SpeedRange::new(
                manifest.difficulty.min_top_speed,
                manifest.difficulty.max_top_speed,
            )
            .context("top speed range")?,
            SpeedRange::new(
                manifest.difficulty.min_obstacle_speed,
                manifest.difficulty.max_obstacle_speed,
            )
            .context("obstacle speed range")?,
            ChanceRange::new(
                manifest.difficulty.min_spawn_chance,
                manifest.difficulty.max_spawn_chance,
            )
            .context("spawn chance range")?,
        );

        let track = manifest.track;
        for (label, value) in [
            ("spawn_offset", track.spawn_offset),
            ("visible_length", track.visible_length),
            ("offscreen_margin", track.offscreen_margin),
            ("acceleration_time", track.acceleration_time),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("track.{label} must be finite and non-negative, got {value}");
            }
        }
        if track.acceleration_time == 0.0 {
            bail!("track.acceleration_time must be positive");
        }

        Ok(Self {
            difficulty,
            registrations,
            section_catalog,
            obstacle_catalogs,
            track: TrackTuning {
                spawn_offset: track.spawn_offset,
                visible_length: track.visible_length,
                offscreen_margin: track.offscreen_margin,
                acceleration_time: track.acceleration_time,
            },
            names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{SimulationConfig, DEFAULT_MANIFEST};

    #[test]
    fn default_manifest_translates_cleanly() {
        let config = SimulationConfig::from_toml(DEFAULT_MANIFEST).expect("default manifest");
        assert_eq!(config.registrations.len(), 5);
        assert_eq!(config.names.len(), 5);
        assert_eq!(config.section_catalog.len(), 2);
        assert_eq!(config.obstacle_catalogs.len(), 2);
    }

    #[test]
    fn unknown_obstacle_reference_fails_fast() {
        let manifest = r#"
[difficulty]
ramp_start = 0.0
ramp_end = 10.0
min_top_speed = 5.0
max_top_speed = 10.0
min_obstacle_speed = 4.0
max_obstacle_speed = 8.0
min_spawn_chance = 0.2
max_spawn_chance = 0.8

[track]
spawn_offset = 60.0
visible_length = 40.0
offscreen_margin = 5.0
acceleration_time = 2.0

[[pools]]
name = "straightaway"
extent = 100.0
initial_count = 1

[[sections]]
name = "straightaway"
weight = 1.0
min_length = 50.0
max_length = 100.0
spacing = 10.0

[[sections.obstacles]]
name = "ghost"
weight = 1.0
"#;
        assert!(SimulationConfig::from_toml(manifest).is_err());
    }

    #[test]
    fn duplicate_pool_names_fail_fast() {
        let manifest = r#"
[difficulty]
ramp_start = 0.0
ramp_end = 10.0
min_top_speed = 5.0
max_top_speed = 10.0
min_obstacle_speed = 4.0
max_obstacle_speed = 8.0
min_spawn_chance = 0.2
max_spawn_chance = 0.8

[track]
spawn_offset = 60.0
visible_length = 40.0
offscreen_margin = 5.0
acceleration_time = 2.0

[[pools]]
name = "straightaway"
extent = 100.0
initial_count = 1

[[pools]]
name = "straightaway"
extent = 120.0
initial_count = 1
"#;
        assert!(SimulationConfig::from_toml(manifest).is_err());
    }

    #[test]
    fn zero_weight_section_catalog_fails_fast() {
        let manifest = r#"
[difficulty]
ramp_start = 0.0
ramp_end = 10.0
min_top_speed = 5.0
max_top_speed = 10.0
min_obstacle_speed = 4.0
max_obstacle_speed = 8.0
min_spawn_chance = 0.2
max_spawn_chance = 0.8

[track]
spawn_offset = 60.0
visible_length = 40.0
offscreen_margin = 5.0
acceleration_time = 2.0

[[pools]]
name = "straightaway"
extent = 100.0
initial_count = 1

[[pools]]
name = "cone"
extent = 2.0
initial_count = 4

[[sections]]
name = "straightaway"
weight = 0.0
min_length = 50.0
max_length = 100.0
spacing = 10.0

[[sections.obstacles]]
name = "cone"
weight = 1.0
"#;
        assert!(SimulationConfig::from_toml(manifest).is_err());
    }
}
