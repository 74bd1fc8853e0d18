use anyhow::{Context, Result};
use blowout_common::RunConfig;
use blowout_engine::SimulationRun;
use log::{debug, info};
use std::time::Instant;

fn main() -> Result<()> {
    env_logger::init();

    info!("Starting blowout simulation...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = RunConfig::load(&config_path)?;
    debug!("Configuration: {:#?}", config);

    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Initialize ---
    let mut run = SimulationRun::from_config(&config)
        .with_context(|| format!("Failed to set up run from '{}'", config_path))?;
    info!(
        "Initialized {} electrons over {} slices.",
        run.swarm().num_parts(),
        run.swarm().num_steps()
    );

    // --- Run ---
    let start_time = Instant::now();
    run.run().context("Simulation aborted")?;
    info!("Simulation finished in {:.3} seconds.", start_time.elapsed().as_secs_f64());

    if let Some(best) = run.tracker().snapshots().last().and_then(|s| s.best_physical()) {
        info!(
            "Final cavity: a = {:.3e} m, b = {:.3e} m, orientation = {:.3} rad",
            best.a, best.b, best.orientation
        );
    }

    // --- Save Recorded Data ---
    let saved = run.save(&config.output).context("Failed to save run records")?;
    info!("Records written with base name '{}'.", saved.base);

    info!("Simulation Complete.");
    Ok(())
}
