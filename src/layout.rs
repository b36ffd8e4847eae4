//! On-disk layout of the study: sourcedata, BIDS and derivatives paths.
//!
//! ```text
//! sourcedata/sub-001/eeg/sub-001_dpx_eeg.bdf
//! sourcedata/sub-001/demographics/sub-001_dpx_demographics.tsv
//! derivatives/
//! ├── preprocessing/{bad_channels,preprocessed,ICA}/
//! ├── rt/sub-001/sub-001_rt.tsv
//! └── epochs/sub-001/sub-001_cue-epo.safetensors
//! ```
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

/// Subdirectories created under `derivatives/`.
pub const DERIVATIVE_DIRS: [&str; 5] = [
    "preprocessing/bad_channels",
    "preprocessing/preprocessed",
    "preprocessing/ICA",
    "rt",
    "epochs",
];

/// `sub-001` style label.
pub fn subject_label(subject: u32) -> String {
    format!("sub-{subject:03}")
}

/// Create the derivatives tree.  Fails if `derivatives` already exists.
pub fn setup_derivatives(derivatives: &Path) -> Result<Vec<PathBuf>> {
    if derivatives.exists() {
        bail!(
            "The derivatives directory is already there, stopping execution.\n>>> {}",
            derivatives.display()
        );
    }
    let mut created = Vec::with_capacity(DERIVATIVE_DIRS.len());
    for sub in DERIVATIVE_DIRS {
        let dir = derivatives.join(sub);
        std::fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        created.push(dir);
    }
    Ok(created)
}

/// `sourcedata/sub-XXX/{dtype}/sub-XXX_dpx_{dtype}{ext}`.
pub fn sourcedata_file(sourcedata: &Path, subject: u32, dtype: &str, ext: &str) -> PathBuf {
    let sub = subject_label(subject);
    sourcedata.join(&sub).join(dtype).join(format!("{sub}_dpx_{dtype}{ext}"))
}

pub fn preprocessed_fif(derivatives: &Path, subject: u32) -> PathBuf {
    let sub = subject_label(subject);
    derivatives
        .join("preprocessing/preprocessed")
        .join(&sub)
        .join(format!("{sub}_preprocessed-raw.fif"))
}

pub fn rt_table(derivatives: &Path, subject: u32) -> PathBuf {
    let sub = subject_label(subject);
    derivatives.join("rt").join(&sub).join(format!("{sub}_rt.tsv"))
}

pub fn epochs_file(derivatives: &Path, subject: u32) -> PathBuf {
    let sub = subject_label(subject);
    derivatives.join("epochs").join(&sub).join(format!("{sub}_cue-epo.safetensors"))
}
