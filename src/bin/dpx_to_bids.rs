//! Convert one subject's BioSemi recording into the BIDS dataset.
use anyhow::Result;
use clap::{ArgAction, Parser};

use dpx::{stages, StudyConfig};

#[derive(Parser, Debug)]
#[command(name = "dpx_to_bids", about = "BDF sourcedata → BIDS")]
struct Args {
    /// Subject ID.
    #[arg(long, default_value_t = 1)]
    subj: u32,

    /// Replace existing BIDS files of the subject.
    #[arg(long, action = ArgAction::Set, default_value_t = false)]
    overwrite: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = StudyConfig::from_env()?;
    let written = stages::data_to_bids(&cfg, args.subj, args.overwrite)?;
    for path in &written {
        println!("Written → {}", path.display());
    }
    Ok(())
}
