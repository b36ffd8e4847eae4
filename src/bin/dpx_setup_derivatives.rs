//! Create the derivatives directory tree of the study.
//!
//! Fails when the derivatives directory already exists.
use anyhow::Result;
use clap::Parser;

use dpx::{stages, StudyConfig};

#[derive(Parser, Debug)]
#[command(name = "dpx_setup_derivatives", about = "Set up the DPX derivatives tree")]
struct Args {}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let _args = Args::parse();

    let cfg = StudyConfig::from_env()?;
    let created = stages::setup_derivatives(&cfg)?;
    println!("Created {} directories under {}", created.len(), cfg.paths.derivatives.display());
    Ok(())
}
