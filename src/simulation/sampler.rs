//! Adaptive field sampling.
//!
//! Each sampling rover runs a two-state machine: traveling until its northing
//! progress since the last recorded sample reaches the current sample
//! distance, then dwelling in place for a fixed number of ticks before the
//! measurement is taken. After every measurement the sample distance
//! self-tunes from the trend of the most recent measurements: a field that is
//! changing faster gets sampled more densely, a flat trend widens the
//! spacing.

use log::debug;
use serde::Deserialize;

use crate::field::FieldSampler;

/// One completed measurement: the integer-rounded grid position and the field
/// value rounded to five decimals. Chronological order is significant, the
/// adjustment policy looks at the trailing three records.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub x: f64,
    pub y: f64,
    pub value: f64,
}

/// Adaptive sampler configuration, shared by every sampling rover.
#[derive(Debug, Clone, Deserialize)]
pub struct SamplerConfig {
    /// Number of samples that determines the default sampling distance over
    /// the map extent.
    pub num_samples: u32,
    /// Dwell time for one sample acquisition, in seconds.
    pub sampling_time: f64,
    /// Step applied to the sample distance by the adjustment policy, meters.
    #[serde(default = "default_adjust_step")]
    pub adjust_step: f64,
    /// Lower bound on the sample distance, meters.
    #[serde(default = "default_dist_floor")]
    pub dist_floor: f64,
}

fn default_adjust_step() -> f64 {
    50.0
}

fn default_dist_floor() -> f64 {
    100.0
}

/// Per-rover sampling state machine.
#[derive(Debug, Clone)]
pub struct SamplerState {
    pub is_sampling: bool,
    pub num_samples: u32,
    pub max_num_samples: u32,
    /// Along-track spacing to the next sample point, meters.
    pub sample_dist: f64,
    /// Dwell length of one acquisition, in ticks.
    pub req_sampling_steps: u64,
    pub sampling_steps_passed: u64,
    adjust_step: f64,
    dist_floor: f64,
}

impl SamplerState {
    pub fn new(initial_sample_dist: f64, req_sampling_steps: u64, max_num_samples: u32, config: &SamplerConfig) -> Self {
        SamplerState {
            is_sampling: false,
            num_samples: 0,
            max_num_samples,
            sample_dist: initial_sample_dist,
            req_sampling_steps,
            sampling_steps_passed: 0,
            adjust_step: config.adjust_step,
            dist_floor: config.dist_floor,
        }
    }
}

/// Advance the sampling state machine by one tick.
///
/// Entering `sampling` happens on the very first tick of the run, or once the
/// northing progress since the last recorded sample reaches the current
/// sample distance, provided the rover still has samples left to take. The
/// measurement itself is taken after `req_sampling_steps` ticks of dwell: the
/// pose is rounded to integer grid coordinates, the field queried there and
/// the value rounded to five decimals before being appended.
pub fn step_sampler(state: &mut SamplerState, samples: &mut Vec<SampleRecord>, x: f64, y: f64, tn: u64, field: &dyn FieldSampler, rover_id: usize) {
    let progress_due = samples.last().is_some_and(|last| y - last.y >= state.sample_dist);
    if (tn == 0 || progress_due) && state.num_samples < state.max_num_samples && !state.is_sampling {
        state.is_sampling = true;
        state.num_samples += 1;
        state.sampling_steps_passed = 0;
        debug!("Rover {} is taking a sample", rover_id);
    }

    if !state.is_sampling {
        return;
    }
    if state.sampling_steps_passed == state.req_sampling_steps {
        let grid_x = x.round();
        let grid_y = y.round();
        let value = round5(field.sample(grid_x as i64, grid_y as i64));
        samples.push(SampleRecord { x: grid_x, y: grid_y, value });
        state.sample_dist = adjust_sample_dist(samples, state.sample_dist, state.adjust_step, state.dist_floor);
        state.sampling_steps_passed = 0;
        state.is_sampling = false;
    } else {
        state.sampling_steps_passed += 1;
    }
}

/// Directional sample-distance adjustment.
///
/// With at least three samples, compare the two most recent successive
/// measurement ratios by their deviation from unity. A growing deviation
/// means the field is changing faster, so the spacing shrinks by one step
/// (bounded by the floor); otherwise it grows by one step. The magnitude of
/// the trend does not scale the step.
pub fn adjust_sample_dist(samples: &[SampleRecord], sample_dist: f64, step: f64, floor: f64) -> f64 {
    let n = samples.len();
    if n < 3 {
        return sample_dist;
    }
    let r_prev = samples[n - 2].value / samples[n - 3].value;
    let r_last = samples[n - 1].value / samples[n - 2].value;
    let change_prev = (1.0 - r_prev).abs();
    let change_last = (1.0 - r_last).abs();
    if change_last > change_prev {
        (sample_dist - step).max(floor)
    } else {
        sample_dist + step
    }
}

fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ConstantField(f64);

    impl FieldSampler for ConstantField {
        fn sample(&self, _x: i64, _y: i64) -> f64 {
            self.0
        }
    }

    fn records(values: &[f64]) -> Vec<SampleRecord> {
        values.iter().map(|&value| SampleRecord { x: 0.0, y: 0.0, value }).collect()
    }

    fn state(req_steps: u64) -> SamplerState {
        let config = SamplerConfig {
            num_samples: 20,
            sampling_time: 600.0,
            adjust_step: 50.0,
            dist_floor: 100.0,
        };
        SamplerState::new(200.0, req_steps, 20, &config)
    }

    #[test]
    fn faster_change_shrinks_sample_dist() {
        // Ratios 0.9 then ~0.78: the deviation from unity grows, sample denser
        let samples = records(&[100.0, 90.0, 70.0]);
        assert_eq!(adjust_sample_dist(&samples, 200.0, 50.0, 100.0), 150.0);
    }

    #[test]
    fn slower_change_grows_sample_dist() {
        // Ratios 0.95 then ~0.97: the deviation from unity shrinks, spread out
        let samples = records(&[100.0, 95.0, 92.0]);
        assert_eq!(adjust_sample_dist(&samples, 200.0, 50.0, 100.0), 250.0);
    }

    #[test]
    fn shrink_never_passes_the_floor() {
        let samples = records(&[100.0, 90.0, 70.0]);
        assert_eq!(adjust_sample_dist(&samples, 120.0, 50.0, 100.0), 100.0);
        assert_eq!(adjust_sample_dist(&samples, 100.0, 50.0, 100.0), 100.0);
    }

    #[test]
    fn fewer_than_three_samples_leave_dist_unchanged() {
        let samples = records(&[100.0, 90.0]);
        assert_eq!(adjust_sample_dist(&samples, 200.0, 50.0, 100.0), 200.0);
    }

    #[test]
    fn first_tick_triggers_a_sample_after_the_dwell() {
        let mut state = state(3);
        let mut samples = Vec::new();
        let field = ConstantField(42.0);

        step_sampler(&mut state, &mut samples, 10.4, 20.6, 0, &field, 1);
        assert!(state.is_sampling);
        assert!(samples.is_empty());

        // Dwell: req_sampling_steps ticks pass before the measurement lands
        for tn in 1..=3 {
            step_sampler(&mut state, &mut samples, 10.4, 20.6, tn, &field, 1);
        }
        assert!(!state.is_sampling);
        assert_eq!(samples.len(), 1);
        // Pose rounded to the grid
        assert_eq!(samples[0].x, 10.0);
        assert_eq!(samples[0].y, 21.0);
        assert_eq!(samples[0].value, 42.0);
        assert_eq!(state.sampling_steps_passed, 0);
    }

    #[test]
    fn progress_below_sample_dist_does_not_trigger() {
        let mut state = state(0);
        let mut samples = Vec::new();
        let field = ConstantField(1.0);

        // First sample at tn 0 (instant dwell)
        step_sampler(&mut state, &mut samples, 0.0, 0.0, 0, &field, 1);
        assert_eq!(samples.len(), 1);

        // 150 m of progress is below the 200 m sample distance
        step_sampler(&mut state, &mut samples, 0.0, 150.0, 1, &field, 1);
        assert_eq!(samples.len(), 1);

        step_sampler(&mut state, &mut samples, 0.0, 200.0, 2, &field, 1);
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn stops_at_max_num_samples() {
        let config = SamplerConfig {
            num_samples: 20,
            sampling_time: 0.0,
            adjust_step: 50.0,
            dist_floor: 100.0,
        };
        let mut state = SamplerState::new(100.0, 0, 2, &config);
        let mut samples = Vec::new();
        let field = ConstantField(1.0);

        let mut y = 0.0;
        for tn in 0..10 {
            step_sampler(&mut state, &mut samples, 0.0, y, tn, &field, 1);
            y += 500.0;
        }
        assert_eq!(state.num_samples, 2);
        assert_eq!(samples.len(), 2);
    }
}
