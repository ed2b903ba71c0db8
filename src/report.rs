//! End-of-run reporting: the console summary and the on-disk run logs.
//!
//! The summary aggregates motion and communication statistics per rover.
//! When logging is enabled, a timestamped directory receives the summary
//! text plus per-rover pose, connectivity and sample tables as CSV.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;
use serde::Deserialize;

use crate::signal_calculations::calculate_effective_distance;
use crate::simulation::world::{Termination, World};

/// Reporting configuration, loaded from a TOML file next to the scenario.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ReportOptions {
    /// 0 disables file logging, 1 and above writes the run directory.
    pub log_level: u8,
    /// Root directory for run logs.
    pub log_dir: String,
    /// Run title, becomes a directory component.
    pub title: String,
    /// Free-form notes recorded verbatim in the parameter file.
    #[serde(default)]
    pub notes: String,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            log_level: 0,
            log_dir: "logs".to_string(),
            title: "run".to_string(),
            notes: String::new(),
        }
    }
}

impl ReportOptions {
    /// Load reporting options from a TOML file.
    ///
    /// # Returns
    /// * `Ok(ReportOptions)` if the file was successfully loaded and parsed
    /// * `Err(String)` with a descriptive error message otherwise
    pub fn load(options_path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(options_path).map_err(|e| format!("Failed to read report options: {}", e))?;

        toml::from_str(&content).map_err(|e| format!("Failed to parse report options: {}", e))
    }

    /// Derive the options path from a scenario file path.
    ///
    /// Replaces the scenario filename with "report.toml" in the same directory.
    pub fn options_path_from_scenario(scenario_path: &str) -> PathBuf {
        let scenario = Path::new(scenario_path);
        scenario.parent().unwrap_or(Path::new(".")).join("report.toml")
    }
}

fn separator(out: &mut String, c: char) {
    for _ in 0..50 {
        out.push(c);
    }
    out.push('\n');
}

/// Render the end-of-run summary text.
///
/// `formation_errors` holds one RMSE value per tick; it is empty for swarms
/// of fewer than two rovers.
pub fn render_summary(world: &World, termination: Termination, formation_errors: &[f64], wall_seconds: f64) -> String {
    let mut out = String::new();
    let dt = world.dt();

    out.push('\n');
    separator(&mut out, '=');
    let _ = writeln!(out, "Time elapse: {:.1} (s)", world.time());
    separator(&mut out, '=');
    out.push_str("Motion information:\n");

    if let Some((peak_tick, peak)) = formation_errors
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
    {
        let mean = formation_errors.iter().sum::<f64>() / formation_errors.len() as f64;
        let _ = writeln!(out, "\nMax RMSE: {:.2} (m) @ {}s", peak, peak_tick as f64 * dt);
        let _ = writeln!(out, "Mean RMSE: {:.2} (m)", mean);
    }
    let total_samples: usize = world.rovers().iter().map(|r| r.measured_samples().len()).sum();
    let _ = writeln!(out, "Total No. Samples: {}", total_samples);

    for rover in world.rovers() {
        let log = rover.pose_log();
        separator(&mut out, '-');
        let _ = writeln!(out, "Rover ID: {}", rover.id());
        if let (Some(first), Some(last)) = (log.y.first(), log.y.last()) {
            let _ = writeln!(out, "Distance marched in northing: {} (m)", (last - first).round());
            let mean_speed = log.velocity.iter().sum::<f64>() / log.velocity.len() as f64;
            let _ = writeln!(out, "Average speed in northing: {:.2} (m/s)", mean_speed);
        }
        match log.completion_tick {
            None => out.push_str("Task not completed.\n"),
            Some(tick) => {
                let _ = writeln!(out, "Time to Complete the Task: {:.1} (s)", tick as f64 * dt);
            }
        }
    }

    separator(&mut out, '=');
    out.push_str("Communication performance:\n");
    for rover in world.rovers() {
        separator(&mut out, '-');
        let _ = writeln!(out, "Rover ID: {}", rover.id());
        match rover.radio() {
            None => out.push_str("No radio settings.\n"),
            Some(radio) => {
                let config = radio.config();
                let _ = writeln!(out, "Swarm Size: {}", radio.swarm_size());
                let _ = writeln!(out, "Bandwidth: {} (KHz)", config.lora.bandwidth / 1000);
                let _ = writeln!(out, "Spreading Factor: {}", config.lora.spreading_factor);
                let _ = writeln!(out, "Coding Rate: 4/{}", 4 + config.lora.coding_rate);
                let _ = writeln!(out, "Sensitivity: {:.1} (dBm)", radio.sensitivity());
                let effective = calculate_effective_distance(
                    config.tx_power,
                    config.antenna_gain,
                    &config.lora,
                    world.path_loss(),
                );
                let _ = writeln!(out, "Effective Distance: {:.0} (m)", effective);
                let _ = writeln!(out, "Transmission Power: {} (dBm)", config.tx_power);
                let _ = writeln!(out, "Antenna Gain: {} (dBi)", config.antenna_gain);
                let _ = writeln!(out, "Payload Length: {} (byte)", config.payload_length);
                let _ = writeln!(out, "Duty Cycle: {:.1}%", radio.actual_duty_cycle() * 100.0);
                let _ = writeln!(out, "Airtime: {:.4} (sec)", radio.airtime());
                let _ = writeln!(out, "Silent time: {:.1} (sec)", radio.silent_time());
                let _ = writeln!(out, "Transmitted Packets: {}", radio.num_tx());
                let _ = writeln!(out, "Received Packets: {}", radio.num_rx());
                let _ = writeln!(out, "Discarded Packets: {}", radio.num_disc());
                match radio.packet_loss_ratio() {
                    Some(ratio) => {
                        let _ = writeln!(out, "Packet Loss Ratio: {:.2}%", ratio * 100.0);
                    }
                    None => out.push_str("Packet Loss Ratio: N/A\n"),
                }
                if radio.airtime_exceeds_slot() {
                    let _ = writeln!(
                        out,
                        "\nWARNING: Airtime ({:.4}) > Tick duration ({}), reduces accuracy of simulation.",
                        radio.airtime(),
                        dt
                    );
                }
            }
        }
    }
    separator(&mut out, '=');

    let _ = writeln!(out, "\nTermination reason: {}", termination.describe());
    let _ = writeln!(out, "Simulation running time: {:.1} (s)", wall_seconds);

    out
}

/// Write the run logs to a timestamped directory under the configured root.
///
/// Layout: `<log-dir>/<title>/<timestamp>/` containing `parameters.txt`,
/// `rmse.csv`, and per-rover `rover_<id>.csv` plus `rover_<id>_samples.csv`
/// where samples were taken.
pub fn write_logs(
    world: &World,
    options: &ReportOptions,
    summary: &str,
    formation_errors: &[f64],
) -> anyhow::Result<PathBuf> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let directory = Path::new(&options.log_dir).join(&options.title).join(timestamp);
    fs::create_dir_all(&directory)
        .with_context(|| format!("Failed to create log directory: {}", directory.display()))?;

    let mut parameters = String::new();
    let _ = writeln!(parameters, "Run: {}", options.title);
    if !options.notes.is_empty() {
        let _ = writeln!(parameters, "\nNotes: {}", options.notes);
    }
    parameters.push_str(summary);
    fs::write(directory.join("parameters.txt"), parameters)
        .context("Failed to write parameter file")?;

    let dt = world.dt();
    if !formation_errors.is_empty() {
        let mut table = String::from("time,rmse\n");
        for (tick, error) in formation_errors.iter().enumerate() {
            let _ = writeln!(table, "{},{}", tick as f64 * dt, error);
        }
        fs::write(directory.join("rmse.csv"), table).context("Failed to write RMSE table")?;
    }

    for rover in world.rovers() {
        let log = rover.pose_log();
        let mut table = String::from("time,x,y,velocity,connectivity\n");
        for tick in 0..log.x.len() {
            let _ = writeln!(
                table,
                "{},{},{},{},{}",
                tick as f64 * dt,
                log.x[tick],
                log.y[tick],
                log.velocity[tick],
                log.connectivity[tick]
            );
        }
        let name = format!("rover_{}.csv", rover.id());
        fs::write(directory.join(name), table)
            .with_context(|| format!("Failed to write pose log for rover {}", rover.id()))?;

        if !rover.measured_samples().is_empty() {
            let mut table = String::from("x,y,value\n");
            for sample in rover.measured_samples() {
                let _ = writeln!(table, "{},{},{}", sample.x, sample.y, sample.value);
            }
            let name = format!("rover_{}_samples.csv", rover.id());
            fs::write(directory.join(name), table)
                .with_context(|| format!("Failed to write samples for rover {}", rover.id()))?;
        }
    }

    Ok(directory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldSampler;
    use crate::signal_calculations::{LoraParameters, PathLossParameters};
    use crate::simulation::controller::{ControlLaw, ControllerKind, PController, SpeedLimits};
    use crate::simulation::physics::SlopePhysics;
    use crate::simulation::radio::{DecayConfig, Radio, RadioConfig};
    use crate::simulation::rover::Rover;
    use crate::terrain::GridMap;

    struct NullField;

    impl FieldSampler for NullField {
        fn sample(&self, _x: i64, _y: i64) -> f64 {
            1.0
        }
    }

    fn small_world(with_radio: bool) -> World {
        let grid = || GridMap::from_cells(10, 10, 0.0, 0.0, 100.0, vec![0.0; 100]).unwrap();
        let mut world = World::new(
            grid(),
            grid(),
            0.1,
            Box::new(NullField),
            Box::new(SlopePhysics::new(vec![])),
            PathLossParameters {
                path_loss_exponent: 2.0,
                shadowing_sigma: 0.0,
                path_loss_at_reference_distance: 40.0,
            },
            0,
        )
        .unwrap();
        for id in 1..=2 {
            let x = 300.0 * id as f64;
            let mut rover = Rover::new(id, x, 100.0, vec![(x, 100.0), (x, 900.0)]);
            rover.config_controller(
                ControlLaw {
                    kind: ControllerKind::GoalDriven,
                    speed: PController::new([0.1, 0.1], (x, 900.0)),
                    limits: SpeedLimits { v_min: 0.0, v_max: 2.0 },
                },
                5.0,
            );
            if with_radio {
                let config = RadioConfig {
                    lora: LoraParameters {
                        frequency: 869.525,
                        bandwidth: 125_000,
                        spreading_factor: 9,
                        coding_rate: 4,
                        preamble_symbols: 8.0,
                        crc_enabled: true,
                        low_data_rate_optimization: false,
                    },
                    tx_power: 14.0,
                    antenna_gain: 2.15,
                    duty_cycle: 0.01,
                    payload_length: 20,
                    decay: DecayConfig::default(),
                };
                rover.config_radio(Radio::new(config, id - 1, 2, 0.1));
            }
            world.add_rover(rover);
        }
        world
    }

    #[test]
    fn summary_reports_radio_statistics() {
        let mut world = small_world(true);
        let mut errors = Vec::new();
        for _ in 0..200 {
            world.step();
            errors.push(world.formation_rmse().unwrap());
        }
        let summary = render_summary(&world, Termination::TickLimit, &errors, 0.5);
        assert!(summary.contains("Time elapse: 20.0 (s)"));
        assert!(summary.contains("Bandwidth: 125 (KHz)"));
        assert!(summary.contains("Spreading Factor: 9"));
        assert!(summary.contains("Coding Rate: 4/8"));
        assert!(summary.contains("Effective Distance:"));
        assert!(summary.contains("Transmitted Packets:"));
        assert!(summary.contains("Max RMSE:"));
        assert!(summary.contains("Termination reason: Set time limit reached"));
    }

    #[test]
    fn summary_without_radio_reports_na_loss() {
        let mut world = small_world(false);
        world.step();
        let summary = render_summary(&world, Termination::NotTerminated, &[], 0.0);
        assert!(summary.contains("No radio settings."));
        assert!(!summary.contains("Max RMSE"));
    }

    #[test]
    fn report_options_parse_with_defaults() {
        let options: ReportOptions =
            toml::from_str("log-level = 1\nlog-dir = \"logs\"\ntitle = \"sweep\"\n").unwrap();
        assert_eq!(options.log_level, 1);
        assert_eq!(options.title, "sweep");
        assert!(options.notes.is_empty());
    }

    #[test]
    fn missing_options_file_is_an_error() {
        assert!(ReportOptions::load(Path::new("/nonexistent/report.toml")).is_err());
    }
}
