//! Swarm simulation core module.
//!
//! This module provides the complete simulation infrastructure for a
//! multi-rover swarm. It integrates:
//! - A tick-synchronous kernel with a fixed per-tick phase order
//! - Slotted LoRa-style pose broadcasts over a shared channel
//! - Goal-driven and passive-cooperative velocity controllers
//! - Adaptive along-track environmental sampling
//! - Slope-aware kinematics over raster terrain
//!
//! ## Module Organization
//!
//! - `world`: The kernel; owns the rovers, channel, clock and rasters
//! - `rover`: Per-rover state machine tying radio, controller and sampler
//! - `radio`: TDMA slot schedule, reception model and decay weighting
//! - `channel`: The shared single-tick broadcast medium
//! - `controller`: Speed regulation and velocity decomposition
//! - `sampler`: Adaptive sampling trigger, dwell and spacing adjustment
//! - `physics`: Motion integration and land-cover checks
//!
//! ## Public API
//!
//! The main entry point is `World`: add configured `Rover`s, then drive it
//! with `step` or `run` and inspect the `Termination` it reports.

pub mod channel;
pub mod controller;
pub mod physics;
pub mod radio;
pub mod rover;
pub mod sampler;
pub mod world;

// Re-export commonly used types
pub use channel::{Channel, Packet};
pub use controller::{ControlLaw, ControllerKind, PController, SpeedLimits};
pub use physics::{DynamicsEngine, SlopePhysics};
pub use radio::{Radio, RadioConfig};
pub use rover::Rover;
pub use sampler::{SampleRecord, SamplerConfig, SamplerState};
pub use world::{Termination, World};
