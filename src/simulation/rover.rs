//! Rover state and per-tick decisions.
//!
//! A rover owns its pose, waypoint sequence, control vector, optional radio,
//! optional control law and optional sampling state. All mutation flows
//! through methods here; other components never poke at fields directly, and
//! rovers never touch each other's state except through the channel.

use rand::Rng;

use crate::field::FieldSampler;
use crate::signal_calculations::PathLossParameters;
use crate::simulation::channel::Packet;
use crate::simulation::controller::{ControlLaw, decompose_velocity};
use crate::simulation::radio::Radio;
use crate::simulation::sampler::{SampleRecord, SamplerState, step_sampler};

/// Per-tick motion history, consumed read-only by the report at end of run.
#[derive(Debug, Default)]
pub struct PoseLog {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    /// Northing velocity per tick.
    pub velocity: Vec<f64>,
    /// Neighbour decay weight per tick (0.0 without a radio).
    pub connectivity: Vec<f64>,
    /// Tick at which the rover completed its mission.
    pub completion_tick: Option<u64>,
}

pub struct Rover {
    id: usize,
    x: f64,
    y: f64,
    heading: f64,
    /// `(vx, vy, v)` command produced by the control law.
    control: [f64; 3],
    waypoints: Vec<(f64, f64)>,
    /// Index of the current goal; starts at 1, index 0 is the start pose.
    goal_index: usize,
    goal_offset: f64,
    radio: Option<Radio>,
    controller: Option<ControlLaw>,
    sampler: Option<SamplerState>,
    measured_samples: Vec<SampleRecord>,
    landcover_termination: bool,
    completed: bool,
    pose_log: PoseLog,
}

impl Rover {
    /// Create a rover at the first waypoint's position. The second waypoint,
    /// when present, becomes the initial goal.
    pub fn new(id: usize, x: f64, y: f64, waypoints: Vec<(f64, f64)>) -> Self {
        Rover {
            id,
            x,
            y,
            heading: 0.0,
            control: [0.0; 3],
            waypoints,
            goal_index: 1,
            goal_offset: 0.0,
            radio: None,
            controller: None,
            sampler: None,
            measured_samples: Vec::new(),
            landcover_termination: false,
            completed: false,
            pose_log: PoseLog::default(),
        }
    }

    pub fn config_radio(&mut self, radio: Radio) {
        self.radio = Some(radio);
    }

    pub fn config_controller(&mut self, law: ControlLaw, goal_offset: f64) {
        self.controller = Some(law);
        self.goal_offset = goal_offset;
    }

    pub fn config_sampler(&mut self, state: SamplerState) {
        self.sampler = Some(state);
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn pose(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn velocity(&self) -> (f64, f64) {
        (self.control[0], self.control[1])
    }

    pub fn control(&self) -> [f64; 3] {
        self.control
    }

    pub fn goal(&self) -> Option<(f64, f64)> {
        self.waypoints.get(self.goal_index).copied()
    }

    pub fn radio(&self) -> Option<&Radio> {
        self.radio.as_ref()
    }

    pub fn sampler(&self) -> Option<&SamplerState> {
        self.sampler.as_ref()
    }

    pub fn measured_samples(&self) -> &[SampleRecord] {
        &self.measured_samples
    }

    pub fn pose_log(&self) -> &PoseLog {
        &self.pose_log
    }

    pub fn landcover_termination(&self) -> bool {
        self.landcover_termination
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn set_pose(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn set_control(&mut self, vx: f64, vy: f64, v: f64) {
        self.control = [vx, vy, v];
    }

    pub fn set_landcover_termination(&mut self, value: bool) {
        self.landcover_termination = value;
    }

    /// Transmit phase: emit a packet when this tick is the radio's slot.
    pub fn transmit_if_scheduled(&mut self, tn: u64) -> Option<Packet> {
        let radio = self.radio.as_mut()?;
        if radio.is_tx_slot(tn) {
            Some(radio.transmit(self.id, self.x, self.y))
        } else {
            None
        }
    }

    /// Receive phase: independently attempt every packet in the channel.
    pub fn receive_all<R: Rng>(&mut self, packets: &[Packet], tn: u64, path_loss: &PathLossParameters, rng: &mut R) {
        let Some(radio) = self.radio.as_mut() else { return };
        for packet in packets {
            if packet.sender_id == self.id {
                continue;
            }
            radio.receive(packet, self.x, self.y, tn, path_loss, rng);
        }
    }

    /// Decision phase: advance the sampler state machine, then recompute the
    /// control vector. Returns `true` on the single tick the rover completes
    /// its mission.
    pub fn step_decision(&mut self, tn: u64, field: &dyn FieldSampler) -> bool {
        if let Some(state) = self.sampler.as_mut() {
            step_sampler(state, &mut self.measured_samples, self.x, self.y, tn, field, self.id);
        }
        self.apply_control(tn)
    }

    fn apply_control(&mut self, tn: u64) -> bool {
        if self.completed {
            self.control = [0.0; 3];
            return false;
        }
        // Acquiring a sample takes a fixed dwell; the rover holds position
        if self.sampler.as_ref().is_some_and(|s| s.is_sampling) {
            self.control = [0.0; 3];
            return false;
        }
        let Some(law) = self.controller.as_mut() else {
            return false;
        };

        let mut goal = match self.waypoints.get(self.goal_index) {
            Some(goal) => *goal,
            None => return self.complete(tn),
        };
        // Within the northing offset of the goal: advance to the next waypoint
        if self.y > goal.1 - self.goal_offset {
            self.goal_index += 1;
            match self.waypoints.get(self.goal_index) {
                Some(next) => {
                    goal = *next;
                    law.speed.set_ref(goal);
                }
                None => return self.complete(tn),
            }
        }

        let neighbour = self
            .radio
            .as_ref()
            .and_then(|radio| radio.neighbour().map(|n| (radio.decay_weight(tn), n.y)));
        let v = law.commanded_speed(self.x, self.y, neighbour);
        let (vx, vy, angle) = decompose_velocity(v, goal.0 - self.x, goal.1 - self.y);
        self.control = [vx, vy, v];
        self.heading = angle;
        false
    }

    fn complete(&mut self, tn: u64) -> bool {
        self.completed = true;
        self.control = [0.0; 3];
        self.pose_log.completion_tick = Some(tn);
        true
    }

    /// Append this tick's history entries.
    pub fn log_tick(&mut self, tn: u64) {
        self.pose_log.x.push(self.x);
        self.pose_log.y.push(self.y);
        self.pose_log.velocity.push(self.control[1]);
        let connectivity = self.radio.as_ref().map_or(0.0, |radio| radio.decay_weight(tn));
        self.pose_log.connectivity.push(connectivity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldSampler;
    use crate::simulation::controller::{ControllerKind, PController, SpeedLimits};

    struct NullField;

    impl FieldSampler for NullField {
        fn sample(&self, _x: i64, _y: i64) -> f64 {
            1.0
        }
    }

    fn goal_driven_rover(waypoints: Vec<(f64, f64)>) -> Rover {
        let start = waypoints[0];
        let goal = waypoints[1];
        let mut rover = Rover::new(1, start.0, start.1, waypoints);
        rover.config_controller(
            ControlLaw {
                kind: ControllerKind::GoalDriven,
                speed: PController::new([0.1, 0.1], goal),
                limits: SpeedLimits { v_min: 0.0, v_max: 2.0 },
            },
            5.0,
        );
        rover
    }

    #[test]
    fn drives_north_toward_goal() {
        let mut rover = goal_driven_rover(vec![(100.0, 0.0), (100.0, 200.0)]);
        let completed = rover.step_decision(0, &NullField);
        assert!(!completed);
        let [vx, vy, v] = rover.control();
        assert_eq!(vx, 0.0);
        assert_eq!(vy, 2.0);
        assert_eq!(v, 2.0);
        assert!((rover.heading() - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn completes_exactly_once_after_last_waypoint() {
        let mut rover = goal_driven_rover(vec![(0.0, 0.0), (0.0, 100.0)]);
        rover.set_pose(0.0, 96.0); // within the 5 m goal offset
        assert!(rover.step_decision(10, &NullField));
        assert!(rover.completed());
        assert_eq!(rover.pose_log().completion_tick, Some(10));
        // Subsequent ticks do not complete again and hold zero control
        assert!(!rover.step_decision(11, &NullField));
        assert_eq!(rover.control(), [0.0; 3]);
    }

    #[test]
    fn advances_to_intermediate_waypoint() {
        let mut rover = goal_driven_rover(vec![(0.0, 0.0), (0.0, 100.0), (50.0, 300.0)]);
        rover.set_pose(0.0, 97.0);
        let completed = rover.step_decision(5, &NullField);
        assert!(!completed);
        assert_eq!(rover.goal(), Some((50.0, 300.0)));
        // Heading now points north-east toward the new goal
        let [vx, vy, _] = rover.control();
        assert!(vx > 0.0 && vy > 0.0);
    }

    #[test]
    fn sampling_dwell_zeroes_control() {
        use crate::simulation::sampler::{SamplerConfig, SamplerState};
        let mut rover = goal_driven_rover(vec![(0.0, 0.0), (0.0, 500.0)]);
        let config = SamplerConfig {
            num_samples: 20,
            sampling_time: 600.0,
            adjust_step: 50.0,
            dist_floor: 100.0,
        };
        rover.config_sampler(SamplerState::new(200.0, 100, 20, &config));

        // First tick triggers sampling; the rover must hold still while dwelling
        rover.step_decision(0, &NullField);
        assert!(rover.sampler().unwrap().is_sampling);
        assert_eq!(rover.control(), [0.0; 3]);
    }

    #[test]
    fn rover_without_controller_keeps_zero_control() {
        let mut rover = Rover::new(1, 0.0, 0.0, vec![(0.0, 0.0), (0.0, 100.0)]);
        assert!(!rover.step_decision(0, &NullField));
        assert_eq!(rover.control(), [0.0; 3]);
    }
}
