//! Recode one subject's markers, write the RT table and extract cue epochs.
use anyhow::Result;
use clap::{ArgAction, Parser};

use dpx::{stages, StudyConfig};

#[derive(Parser, Debug)]
#[command(name = "dpx_extract_epochs", about = "Cue-locked epochs with trial metadata")]
struct Args {
    /// Subject ID.
    #[arg(long, default_value_t = 1)]
    subj: u32,

    /// Replace an existing epochs file.
    #[arg(long, action = ArgAction::Set, default_value_t = false)]
    overwrite: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = StudyConfig::from_env()?;
    let epochs = stages::extract_epochs(&cfg, args.subj, args.overwrite)?;
    println!(
        "Kept {} epochs ({} dropped), {} channels × {} samples @ {} Hz",
        epochs.len(),
        epochs.drop_log.len(),
        epochs.ch_names.len(),
        epochs.times.len(),
        epochs.sfreq
    );
    Ok(())
}
