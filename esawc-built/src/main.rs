use anyhow::{Context, Result};
use env_logger::Env;

use esawc_built::collect::ee::EeSession;
use esawc_built::collect::global_variables::{get_input_path, get_output_path};
use esawc_built::geo_core::GeoCore;
use esawc_built::{BatchDriver, BuiltupExtractor, VectorDataset};

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    println!("EE Authentication...");
    let session = EeSession::initialize().context("Earth Engine initialization failed")?;
    println!("Done");

    println!("Loading data file...");
    let mut dataset = VectorDataset::load(&get_input_path(), &GeoCore::default())?;
    println!("Done");

    println!("Calculation will start soon...");
    let driver = BatchDriver::new(&session, BuiltupExtractor::default());
    let outcome = driver.run(&dataset)?;

    println!("Adding new column...");
    dataset.add_column(driver.column(), &outcome.areas)?;
    println!("Done");

    println!("Saving new file...");
    dataset.to_file(&get_output_path())?;
    println!("Done");

    println!(
        "{} regions, {} with built-up area, {} written as null",
        outcome.areas.len(),
        outcome.resolved(),
        outcome.failures.len()
    );
    for failure in &outcome.failures {
        log::debug!("Region {}: {}", failure.index, failure.error);
    }
    Ok(())
}
