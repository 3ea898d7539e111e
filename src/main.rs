use anyhow::{Context as _, Result};
use std::sync::Arc;
use tracing::info;

use building_energy_sim::config::Config;
use building_energy_sim::data::synthetic::generate;
use building_energy_sim::runner::run_episode;
use building_energy_sim::telemetry::init_tracing;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cfg = Config::load()?;

    let dataset = cfg.dataset();
    let context = Arc::new(generate(&dataset).context("generating synthetic dataset")?);
    info!(horizon = context.horizon(), seed = dataset.seed, "Dataset ready");

    let mut building = cfg
        .build_building(context)
        .context("constructing building")?;
    let mut controller = cfg.controller.controller();

    let summary = run_episode(&mut building, &mut controller)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
