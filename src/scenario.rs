//! Scenario loading, parsing, and validation logic.
//!
//! Contains all data structures for scenario configuration and provides
//! functions for loading a scenario from JSON, validating it, and
//! assembling the world it describes.

use anyhow::Context;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::field::{FieldConfig, FieldSampler, GaussianField};
use crate::signal_calculations::PathLossParameters;
use crate::simulation::controller::{ControlLaw, ControllerKind, PController, SpeedLimits};
use crate::simulation::physics::SlopePhysics;
use crate::simulation::radio::{Radio, RadioConfig};
use crate::simulation::rover::Rover;
use crate::simulation::sampler::{SamplerConfig, SamplerState};
use crate::simulation::world::World;

/// Error type for scenario loading failures.
#[derive(Debug)]
pub enum ScenarioLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for ScenarioLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScenarioLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            ScenarioLoadError::ParseError(msg) => write!(f, "Failed to parse JSON: {}", msg),
            ScenarioLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ScenarioLoadError {}

/// What the swarm is out there to do.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MissionConfig {
    /// Drive a straight south-to-north column sweep, one column per rover.
    LineSweep,
    /// The column sweep plus adaptive along-track sampling of a scalar field.
    AdaptiveSampling {
        sampler: SamplerConfig,
        field: FieldConfig,
    },
}

/// Which control law regulates the commanded speed.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControllerConfig {
    /// Pure goal tracking from the rover's own pose error.
    GoalDriven { gains: [f64; 2] },
    /// Goal tracking plus a decay-weighted pull toward the last-heard
    /// neighbour's northing.
    PassiveCooperative {
        gains: [f64; 2],
        neighbour_gain: f64,
    },
}

/// Swarm placement over the western edge of the map.
#[derive(Debug, Clone, Deserialize)]
pub struct PlacementConfig {
    /// Easting of the first rover's column, meters from the west edge.
    pub x_offset: f64,
    /// Margin kept from the south and north map edges, meters.
    pub y_offset: f64,
    /// Column spacing between adjacent rovers, meters.
    pub rover_separation: f64,
}

/// Complete description of one simulation run.
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub num_rovers: usize,
    /// Tick duration in seconds.
    pub dt: f64,
    /// Tick limit; `null` runs until completion or fault.
    pub max_steps: Option<u64>,
    #[serde(default)]
    pub seed: u64,
    /// Path to the elevation raster (Esri ASCII grid).
    pub terrain: String,
    /// Path to the land-cover class raster, aligned with the terrain.
    pub landcover: String,
    /// Land-cover class codes no rover may enter.
    #[serde(default)]
    pub impassable_classes: Vec<i64>,
    pub placement: PlacementConfig,
    pub mission: MissionConfig,
    pub controller: ControllerConfig,
    pub limits: SpeedLimits,
    /// Goal switch margin: a waypoint counts as reached this far south of it.
    #[serde(default = "default_goal_offset")]
    pub goal_offset: f64,
    /// Optional JSON file with one waypoint list per rover, overriding the
    /// generated line-sweep columns.
    #[serde(default)]
    pub waypoints: Option<String>,
    /// Omitting the radio runs the swarm silent.
    pub radio: Option<RadioConfig>,
    /// Required whenever a radio is configured.
    pub path_loss: Option<PathLossParameters>,
}

fn default_goal_offset() -> f64 {
    5.0
}

/// Load and validate a scenario from a JSON file.
///
/// Raster paths inside the scenario are resolved relative to the scenario
/// file's directory.
pub fn load_scenario(path: &str) -> Result<Scenario, ScenarioLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file: {}", path))
        .map_err(|e| ScenarioLoadError::FileReadError(e.to_string()))?;

    let mut scenario: Scenario = serde_json::from_str(&data)
        .context("Invalid JSON format")
        .map_err(|e| ScenarioLoadError::ParseError(e.to_string()))?;

    if let Some(parent_dir) = Path::new(path).parent() {
        scenario.terrain = parent_dir.join(&scenario.terrain).to_string_lossy().to_string();
        scenario.landcover = parent_dir.join(&scenario.landcover).to_string_lossy().to_string();
        if let Some(waypoints) = &scenario.waypoints {
            scenario.waypoints = Some(parent_dir.join(waypoints).to_string_lossy().to_string());
        }
    }

    validate_scenario(&scenario).map_err(ScenarioLoadError::ValidationError)?;

    Ok(scenario)
}

/// Validate scenario configuration.
///
/// # Returns
///
/// `Ok(())` if validation passes, `Err(String)` with error description otherwise.
pub fn validate_scenario(scenario: &Scenario) -> Result<(), String> {
    const MAX_ROVERS: usize = 1000;

    if scenario.num_rovers == 0 {
        return Err("Scenario must contain at least one rover".to_string());
    }
    if scenario.num_rovers > MAX_ROVERS {
        return Err(format!(
            "Rover count {} exceeds maximum of {}",
            scenario.num_rovers, MAX_ROVERS
        ));
    }
    if scenario.dt <= 0.0 {
        return Err(format!("Tick duration {} must be positive", scenario.dt));
    }
    if scenario.num_rovers > 1 && scenario.placement.rover_separation <= 0.0 {
        return Err("Rover separation must be positive for more than one rover".to_string());
    }
    if scenario.limits.v_max <= 0.0 || scenario.limits.v_min > scenario.limits.v_max {
        return Err(format!(
            "Speed limits ({}, {}) are not an ordered positive range",
            scenario.limits.v_min, scenario.limits.v_max
        ));
    }
    if scenario.goal_offset < 0.0 {
        return Err(format!("Goal offset {} must not be negative", scenario.goal_offset));
    }

    if let Some(radio) = &scenario.radio {
        let lora = &radio.lora;
        if !(5..=12).contains(&lora.spreading_factor) {
            return Err(format!(
                "Spreading factor {} outside supported range (5 to 12)",
                lora.spreading_factor
            ));
        }
        if lora.bandwidth == 0 {
            return Err("Bandwidth must be positive".to_string());
        }
        if !(1..=4).contains(&lora.coding_rate) {
            return Err(format!(
                "Coding rate {} outside supported range (1 to 4, for 4/5 to 4/8)",
                lora.coding_rate
            ));
        }
        if radio.duty_cycle <= 0.0 || radio.duty_cycle > 1.0 {
            return Err(format!(
                "Duty cycle {} must be within (0, 1]",
                radio.duty_cycle
            ));
        }
        if radio.payload_length == 0 {
            return Err("Payload length must be at least one byte".to_string());
        }
        if scenario.path_loss.is_none() {
            return Err("A radio configuration requires path loss parameters".to_string());
        }
    } else if matches!(scenario.controller, ControllerConfig::PassiveCooperative { .. }) {
        return Err("The passive-cooperative controller requires a radio".to_string());
    }

    if let MissionConfig::AdaptiveSampling { sampler, field } = &scenario.mission {
        if sampler.num_samples < 2 {
            return Err(format!(
                "Sample count {} must be at least 2",
                sampler.num_samples
            ));
        }
        if sampler.sampling_time < 0.0 {
            return Err(format!(
                "Sampling time {} must not be negative",
                sampler.sampling_time
            ));
        }
        if sampler.dist_floor <= 0.0 {
            return Err("Sampling distance floor must be positive".to_string());
        }
        if field.sigma_fraction <= 0.0 {
            return Err(format!(
                "Field sigma fraction {} must be positive",
                field.sigma_fraction
            ));
        }
        if field.baseline <= 0.0 {
            return Err("Field baseline must be positive".to_string());
        }
    }

    Ok(())
}

/// A field for scenarios that never sample: constantly zero.
struct SilentField;

impl FieldSampler for SilentField {
    fn sample(&self, _x: i64, _y: i64) -> f64 {
        0.0
    }
}

/// Free-space propagation, used only when no radio is configured and the
/// channel model therefore never runs.
fn default_path_loss() -> PathLossParameters {
    PathLossParameters {
        path_loss_exponent: 2.0,
        shadowing_sigma: 0.0,
        path_loss_at_reference_distance: 40.0,
    }
}

/// Assemble a world from a validated scenario: load the rasters, place the
/// rovers in their columns and wire up radios, controllers and samplers.
pub fn build_world(scenario: &Scenario) -> anyhow::Result<World> {
    let terrain = crate::terrain::GridMap::load(Path::new(&scenario.terrain))
        .with_context(|| format!("Failed to load terrain raster: {}", scenario.terrain))?;
    let landcover = crate::terrain::GridMap::load(Path::new(&scenario.landcover))
        .with_context(|| format!("Failed to load land-cover raster: {}", scenario.landcover))?;

    let x_min = terrain.x_llcorner;
    let y_min = terrain.y_llcorner;
    let x_max = x_min + terrain.x_range();
    let y_max = y_min + terrain.y_range();

    let field: Box<dyn FieldSampler> = match &scenario.mission {
        MissionConfig::AdaptiveSampling { field, .. } => {
            Box::new(GaussianField::new(field, x_min, x_max, y_min, y_max))
        }
        MissionConfig::LineSweep => Box::new(SilentField),
    };

    let path_loss = scenario.path_loss.clone().unwrap_or_else(default_path_loss);

    let mut world = World::new(
        terrain,
        landcover,
        scenario.dt,
        field,
        Box::new(SlopePhysics::new(scenario.impassable_classes.clone())),
        path_loss,
        scenario.seed,
    )
    .map_err(|e| anyhow::anyhow!(e))?;

    let y_start = y_min + scenario.placement.y_offset;
    let y_goal = y_max - scenario.placement.y_offset;

    let waypoint_lists = match &scenario.waypoints {
        Some(path) => Some(load_waypoints(path, scenario.num_rovers)?),
        None => None,
    };

    for index in 0..scenario.num_rovers {
        let id = index + 1;
        let waypoints = match &waypoint_lists {
            Some(lists) => lists[index].clone(),
            None => {
                let x = x_min + scenario.placement.x_offset
                    + index as f64 * scenario.placement.rover_separation;
                vec![(x, y_start), (x, y_goal)]
            }
        };
        let (x0, y0) = waypoints[0];
        let first_goal = waypoints[1];
        let sweep_end = waypoints[waypoints.len() - 1].1;
        let mut rover = Rover::new(id, x0, y0, waypoints);

        let (kind, gains) = match &scenario.controller {
            ControllerConfig::GoalDriven { gains } => (ControllerKind::GoalDriven, *gains),
            ControllerConfig::PassiveCooperative { gains, neighbour_gain } => (
                ControllerKind::PassiveCooperative { neighbour_gain: *neighbour_gain },
                *gains,
            ),
        };
        rover.config_controller(
            ControlLaw {
                kind,
                speed: PController::new(gains, first_goal),
                limits: scenario.limits.clone(),
            },
            scenario.goal_offset,
        );

        if let Some(radio) = &scenario.radio {
            rover.config_radio(Radio::new(
                radio.clone(),
                index,
                scenario.num_rovers,
                scenario.dt,
            ));
        }

        if let MissionConfig::AdaptiveSampling { sampler, .. } = &scenario.mission {
            let initial_dist = initial_sample_dist(y0, sweep_end, sampler.num_samples);
            let req_steps = (sampler.sampling_time / scenario.dt).ceil() as u64;
            rover.config_sampler(SamplerState::new(
                initial_dist,
                req_steps,
                sampler.num_samples,
                sampler,
            ));
        }

        world.add_rover(rover);
    }

    Ok(world)
}

/// One waypoint list per rover, in rover order: `[[[x, y], ...], ...]`. The
/// first entry is the start pose, the rest are goals in visit order.
fn load_waypoints(path: &str, num_rovers: usize) -> anyhow::Result<Vec<Vec<(f64, f64)>>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read waypoints file: {}", path))?;
    let lists: Vec<Vec<(f64, f64)>> =
        serde_json::from_str(&data).context("Invalid waypoints JSON")?;
    if lists.len() != num_rovers {
        anyhow::bail!(
            "Waypoints file holds {} rover entries, scenario has {}",
            lists.len(),
            num_rovers
        );
    }
    for (index, list) in lists.iter().enumerate() {
        if list.len() < 2 {
            anyhow::bail!("Rover {} needs a start pose and at least one goal", index + 1);
        }
    }
    Ok(lists)
}

/// Default along-track spacing: the sweep length divided evenly across the
/// configured sample count, rounded to millimeters.
fn initial_sample_dist(y_start: f64, y_goal: f64, num_samples: u32) -> f64 {
    let dist = (y_goal - y_start) / (num_samples - 1) as f64;
    (dist * 1000.0).round() / 1000.0
}
