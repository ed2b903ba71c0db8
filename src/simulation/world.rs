//! The world and its tick-synchronous kernel.
//!
//! `World::step` advances every rover by exactly one tick in a strict phase
//! order: motion, transmit, receive, channel clear, control, time advance.
//! Execution is single-threaded and ordering across rovers follows index
//! order, so a fixed scenario and seed reproduce a run tick-for-tick.

use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::field::FieldSampler;
use crate::signal_calculations::PathLossParameters;
use crate::simulation::channel::Channel;
use crate::simulation::physics::DynamicsEngine;
use crate::simulation::rover::Rover;
use crate::terrain::GridMap;

/// Why (or whether) a run has ended. The numeric codes double as the process
/// exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// All rovers completed their missions.
    Completed,
    /// A rover entered impassable land cover; the scenario is invalid as a
    /// whole, so this ends the run for every rover.
    LandcoverFault,
    /// The configured tick limit was reached.
    TickLimit,
    /// The run is still in progress.
    NotTerminated,
}

impl Termination {
    pub fn code(self) -> i32 {
        match self {
            Termination::Completed => 0,
            Termination::LandcoverFault => 1,
            Termination::TickLimit => 2,
            Termination::NotTerminated => -1,
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Termination::Completed => "Mission completed",
            Termination::LandcoverFault => "Rover entered impassable land cover",
            Termination::TickLimit => "Set time limit reached",
            Termination::NotTerminated => "Unknown",
        }
    }
}

pub struct World {
    terrain: GridMap,
    landcover: GridMap,
    rovers: Vec<Rover>,
    channel: Channel,
    /// Tick index; simulated time is `tn * dt`.
    tn: u64,
    dt: f64,
    completed_rovers: usize,
    field: Box<dyn FieldSampler>,
    engine: Box<dyn DynamicsEngine>,
    path_loss: PathLossParameters,
    rng: StdRng,
}

impl World {
    /// Build a world over a pair of aligned rasters. Misaligned terrain and
    /// land-cover grids are a fatal configuration error.
    pub fn new(
        terrain: GridMap,
        landcover: GridMap,
        dt: f64,
        field: Box<dyn FieldSampler>,
        engine: Box<dyn DynamicsEngine>,
        path_loss: PathLossParameters,
        seed: u64,
    ) -> Result<Self, String> {
        if !terrain.is_aligned(&landcover) {
            return Err("Terrain and land-cover rasters are not aligned".to_string());
        }
        if dt <= 0.0 {
            return Err("Tick duration must be positive".to_string());
        }
        Ok(World {
            terrain,
            landcover,
            rovers: Vec::new(),
            channel: Channel::new(),
            tn: 0,
            dt,
            completed_rovers: 0,
            field,
            engine,
            path_loss,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn add_rover(&mut self, rover: Rover) {
        self.rovers.push(rover);
    }

    pub fn rovers(&self) -> &[Rover] {
        &self.rovers
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn tn(&self) -> u64 {
        self.tn
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Simulated time in seconds: exactly `tn * dt`, no accumulation drift.
    pub fn time(&self) -> f64 {
        self.tn as f64 * self.dt
    }

    pub fn completed_rovers(&self) -> usize {
        self.completed_rovers
    }

    pub fn path_loss(&self) -> &PathLossParameters {
        &self.path_loss
    }

    /// Step forward one tick.
    pub fn step(&mut self) {
        let tn = self.tn;
        debug!("Time: {:.1} (s)", self.time());

        // Phase 1: motion. Rovers without a radio still move.
        for rover in &mut self.rovers {
            self.engine.integrate(rover, &self.terrain, &self.landcover, self.dt);
        }

        // Phase 2: transmit. Under correct slot assignment at most one rover
        // transmits per tick; coinciding slots still append every packet so
        // none is silently dropped.
        for rover in &mut self.rovers {
            if let Some(packet) = rover.transmit_if_scheduled(tn) {
                debug!("Currently transmitting: Rover {}", packet.sender_id);
                self.channel.add_packet(packet);
            }
        }

        // Phase 3: receive. Every non-transmitting rover with a radio
        // attempts each packet independently.
        if !self.channel.is_empty() {
            for rover in &mut self.rovers {
                let transmitted = self.channel.packets().iter().any(|p| p.sender_id == rover.id());
                if transmitted {
                    continue;
                }
                rover.receive_all(self.channel.packets(), tn, &self.path_loss, &mut self.rng);
            }
        }

        // Phase 4: the channel never carries state across ticks
        self.channel.clear();

        // Phase 5: sampling and control decisions
        for rover in &mut self.rovers {
            if rover.step_decision(tn, self.field.as_ref()) {
                self.completed_rovers += 1;
            }
            rover.log_tick(tn);
        }

        self.tn += 1;
    }

    /// Check the run state against the configured step limit. Checked in the
    /// original priority order: completion, land-cover fault, tick limit.
    pub fn termination(&self, max_steps: Option<u64>) -> Termination {
        if self.completed_rovers == self.rovers.len() && !self.rovers.is_empty() {
            return Termination::Completed;
        }
        if self.rovers.iter().any(|r| r.landcover_termination()) {
            return Termination::LandcoverFault;
        }
        if let Some(limit) = max_steps {
            if self.tn >= limit {
                return Termination::TickLimit;
            }
        }
        Termination::NotTerminated
    }

    /// Run until a terminal condition holds, checking at tick boundaries
    /// only, never mid-tick.
    pub fn run(&mut self, max_steps: Option<u64>) -> Termination {
        loop {
            self.step();
            let termination = self.termination(max_steps);
            if termination != Termination::NotTerminated {
                return termination;
            }
        }
    }

    /// Root-mean-square formation error: the spread of adjacent rovers'
    /// northing positions. `None` with fewer than two rovers.
    pub fn formation_rmse(&self) -> Option<f64> {
        if self.rovers.len() < 2 {
            return None;
        }
        let mut error = 0.0;
        for pair in self.rovers.windows(2) {
            let (_, y0) = pair[0].pose();
            let (_, y1) = pair[1].pose();
            error += (y1 - y0).powi(2);
        }
        Some((error / (self.rovers.len() - 1) as f64).sqrt())
    }
}
