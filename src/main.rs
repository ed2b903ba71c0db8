use std::process::ExitCode;
use std::time::Instant;

use env_logger::Builder;
use log::{LevelFilter, error, info, warn};

mod field;
mod report;
mod scenario;
mod signal_calculations;
mod simulation;
mod terrain;

use report::ReportOptions;
use simulation::world::Termination;

fn main() -> ExitCode {
    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("rover_swarm_simulator"), LevelFilter::Debug)
        .init();

    let Some(scenario_path) = std::env::args().nth(1) else {
        error!("Usage: rover-swarm-simulator <scenario.json>");
        return ExitCode::from(64);
    };

    match run(&scenario_path) {
        Ok(termination) => ExitCode::from(termination.code() as u8),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(65)
        }
    }
}

fn run(scenario_path: &str) -> anyhow::Result<Termination> {
    info!("Starting up");

    let scenario = scenario::load_scenario(scenario_path)
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    let mut world = scenario::build_world(&scenario)?;
    info!(
        "Scenario loaded: {} rovers, dt {} s, {} radio",
        scenario.num_rovers,
        scenario.dt,
        if scenario.radio.is_some() { "with" } else { "without" }
    );

    let options_path = ReportOptions::options_path_from_scenario(scenario_path);
    let options = if options_path.exists() {
        ReportOptions::load(&options_path).map_err(|e| anyhow::anyhow!("{}", e))?
    } else {
        ReportOptions::default()
    };

    info!("Simulating...");
    let start = Instant::now();
    let mut formation_errors = Vec::new();
    let termination = loop {
        world.step();
        if let Some(error) = world.formation_rmse() {
            formation_errors.push(error);
        }
        let termination = world.termination(scenario.max_steps);
        if termination != Termination::NotTerminated {
            break termination;
        }
    };
    let wall_seconds = start.elapsed().as_secs_f64();

    let summary = report::render_summary(&world, termination, &formation_errors, wall_seconds);
    print!("{}", summary);

    if options.log_level >= 1 {
        match report::write_logs(&world, &options, &summary, &formation_errors) {
            Ok(directory) => info!("Run logs written to {}", directory.display()),
            Err(e) => warn!("Could not write run logs: {:#}", e),
        }
    }

    if termination == Termination::LandcoverFault {
        if let Some(rover) = world.rovers().iter().find(|r| r.landcover_termination()) {
            let (x, y) = rover.pose();
            warn!("Rover {} stopped on impassable ground at ({:.1}, {:.1})", rover.id(), x, y);
        }
    }

    Ok(termination)
}
