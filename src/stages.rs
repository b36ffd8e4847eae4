//! The three pipeline stages, one per binary.
//!
//! ```text
//! setup_derivatives   derivatives/ tree
//! data_to_bids        sourcedata BDF + demographics → BIDS
//! extract_epochs      preprocessed FIF (or BIDS BDF) → RT table + cue epochs
//! ```
use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::bdf::{open_bdf, STATUS_CHANNEL};
use crate::bids::{write_raw_bids, BidsInput, BidsPath};
use crate::codes::RecodedCode;
use crate::config::StudyConfig;
use crate::demographics::{approx_birthday, read_demographics};
use crate::epoch::{segment, Epochs};
use crate::io::write_epochs;
use crate::layout::{self, sourcedata_file};
use crate::markers::Taxonomy;
use crate::metadata::{derive_metadata, write_rt_table};
use crate::montage::Montage;
use crate::recode::recode;
use crate::recording::Recording;
use crate::triggers::{find_events, keep_known, STATUS_MASK};

/// Create the derivatives tree.
pub fn setup_derivatives(cfg: &StudyConfig) -> Result<Vec<PathBuf>> {
    let created = layout::setup_derivatives(&cfg.paths.derivatives)?;
    for dir in &created {
        log::info!("created {}", dir.display());
    }
    Ok(created)
}

/// Convert one subject's BDF recording into the BIDS dataset.
pub fn data_to_bids(cfg: &StudyConfig, subject: u32, overwrite: bool) -> Result<Vec<PathBuf>> {
    cfg.validate_subject(subject)?;
    let sourcedata = cfg.require_sourcedata()?;
    if overwrite {
        log::info!("`overwrite` is set to `true`");
    }

    let source = sourcedata_file(sourcedata, subject, "eeg", ".bdf");
    let raw = open_bdf(&source)?;
    let names = raw.ch_names();
    let channel_types = Montage::biosemi64().classify_all(&names);

    let demo_path = sourcedata_file(sourcedata, subject, "demographics", ".tsv");
    let demographics = read_demographics(&demo_path, subject)?;
    let birthday = approx_birthday(raw.meas_date().date_naive(), demographics.age)?;

    let status = raw.read_digital(STATUS_CHANNEL)?;
    let found = find_events(&status, STATUS_MASK, 0);
    let n_found = found.len();
    let events = keep_known(found, &cfg.markers);
    log::info!("{} trigger events, {} with known codes", n_found, events.len());

    let input = BidsInput {
        source: &source,
        raw: &raw,
        channel_types: &channel_types,
        events: &events,
        event_id: &cfg.markers,
        demographics,
        birthday,
        line_freq: cfg.epochs.line_freq,
    };
    write_raw_bids(&BidsPath::new(&cfg.paths.bidsdata, subject), &input, overwrite)
}

/// Load the recording the epoch stage works on: the preprocessed FIF when
/// present, else the BIDS BDF and its events.
pub fn load_recording(cfg: &StudyConfig, subject: u32) -> Result<Recording> {
    let fif = layout::preprocessed_fif(&cfg.paths.derivatives, subject);
    if fif.exists() {
        return Recording::from_fif(&fif);
    }
    let bids = BidsPath::new(&cfg.paths.bidsdata, subject);
    if !bids.recording().exists() {
        bail!(
            "no recording for subject {subject}: neither {} nor {} exists",
            fif.display(),
            bids.recording().display()
        );
    }
    log::info!("{} not found, reading the BIDS recording", fif.display());
    Recording::from_bids(&bids.recording(), &bids.events_tsv(), &Montage::biosemi64())
}

/// Recode the subject's markers, write the RT table and save cue epochs.
pub fn extract_epochs(cfg: &StudyConfig, subject: u32, overwrite: bool) -> Result<Epochs> {
    cfg.validate_subject(subject)?;
    let derivatives = cfg.require_derivatives()?;
    if overwrite {
        log::info!("`overwrite` is set to `true`");
    }
    let epochs_path = layout::epochs_file(derivatives, subject);
    if epochs_path.exists() && !overwrite {
        bail!(
            "{} already exists. Use `--overwrite true` to replace it.",
            epochs_path.display()
        );
    }

    let recording = load_recording(cfg, subject)?;
    let (markers, event_id) = recording.events();
    let taxonomy = Taxonomy::from_event_id(&event_id, &cfg.epochs.boundary_names)?;
    let recoding = recode(&markers, &taxonomy, recording.sfreq)?;
    let broken = recoding.broken();
    if !broken.is_empty() {
        log::warn!("{} broken trial(s) removed: {:?}", broken.len(), broken);
    }

    let metadata = derive_metadata(&recoding.trials)?;
    let rt_path = layout::rt_table(derivatives, subject);
    write_rt_table(&rt_path, &metadata, subject)?;
    log::info!("wrote {} ({} trials)", rt_path.display(), metadata.len());

    let anchors = recoding.cue_markers();
    let epochs = segment(&recording, &anchors, &metadata, &RecodedCode::cue_event_id(), &cfg.epochs)?;
    write_epochs(&epochs, &epochs_path)?;
    Ok(epochs)
}
