//! Motion control laws.
//!
//! Two per-mission variants share a proportional speed controller:
//! goal-driven control tracks the current waypoint alone, while
//! passive-cooperative control additionally lets the most recently heard
//! neighbour pull the along-track speed, scaled by the radio's decay weight
//! so stale observations stop perturbing motion once fully decayed.

use serde::Deserialize;
use std::f64::consts::FRAC_PI_2;

/// Proportional speed controller: scalar output from the absolute easting and
/// northing errors against its reference point.
#[derive(Debug, Clone)]
pub struct PController {
    gains: [f64; 2],
    reference: (f64, f64),
}

impl PController {
    pub fn new(gains: [f64; 2], reference: (f64, f64)) -> Self {
        PController { gains, reference }
    }

    pub fn set_ref(&mut self, reference: (f64, f64)) {
        self.reference = reference;
    }

    /// Unclamped control input for the controlled object at `(x, y)`.
    pub fn execute(&self, x: f64, y: f64) -> f64 {
        self.gains[0] * (self.reference.0 - x).abs() + self.gains[1] * (self.reference.1 - y).abs()
    }
}

/// Which control law a rover runs. Decoded once at setup, matched
/// exhaustively afterwards.
#[derive(Debug, Clone)]
pub enum ControllerKind {
    GoalDriven,
    PassiveCooperative {
        /// Gain on the neighbour's northing offset.
        neighbour_gain: f64,
    },
}

/// Scalar speed saturation bounds.
#[derive(Debug, Clone, Deserialize)]
pub struct SpeedLimits {
    pub v_min: f64,
    pub v_max: f64,
}

/// A rover's configured control law.
#[derive(Debug, Clone)]
pub struct ControlLaw {
    pub kind: ControllerKind,
    pub speed: PController,
    pub limits: SpeedLimits,
}

impl ControlLaw {
    /// Commanded scalar speed at `(x, y)`, clamped to the saturation bounds.
    ///
    /// For the passive-cooperative law, `neighbour` carries the decayed
    /// weight and the neighbour's northing; a neighbour ahead speeds the
    /// rover up, one behind slows it down, and the term vanishes with the
    /// weight.
    pub fn commanded_speed(&self, x: f64, y: f64, neighbour: Option<(f64, f64)>) -> f64 {
        let mut input = self.speed.execute(x, y);
        if let ControllerKind::PassiveCooperative { neighbour_gain } = self.kind {
            if let Some((weight, neighbour_y)) = neighbour {
                input += weight * neighbour_gain * (neighbour_y - y);
            }
        }
        input.clamp(self.limits.v_min, self.limits.v_max)
    }
}

/// Bearing angle toward a goal offset `(dx, dy)`: `atan(dy / |dx|)`, with the
/// degenerate easting-aligned case resolved to ±π/2.
pub fn bearing_to(dx: f64, dy: f64) -> f64 {
    if dx == 0.0 {
        if dy >= 0.0 { FRAC_PI_2 } else { -FRAC_PI_2 }
    } else {
        (dy / dx.abs()).atan()
    }
}

/// Decompose a scalar speed along the bearing to the goal:
/// `vx = sign(dx) * v * cos(angle)`, `vy = v * sin(angle)`, both rounded to
/// three decimals. Returns `(vx, vy, angle)`.
pub fn decompose_velocity(v: f64, dx: f64, dy: f64) -> (f64, f64, f64) {
    let angle = bearing_to(dx, dy);
    let direction = if dx >= 0.0 { 1.0 } else { -1.0 };
    let vx = round3(direction * v * angle.cos());
    let vy = round3(v * angle.sin());
    (vx, vy, angle)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
