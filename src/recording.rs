//! In-memory recording used by the epoch stage.
//!
//! Two sources produce the same [`Recording`]:
//!
//! * a preprocessed MNE raw FIF (annotations from the file, bad channels from
//!   the measurement info);
//! * the BIDS BDF with its `_events.tsv` (annotations from the event rows,
//!   bad channels from `_channels.tsv` when present).
//!
//! Only good EEG channels are kept, in volts.
use std::collections::BTreeMap;
use std::ops::Range;
use std::path::Path;

use anyhow::{ensure, Context, Result};
use ndarray::{Array2, Axis};
use serde::Deserialize;

use crate::annotations::{bad_segments, events_from_annotations, Annotation};
use crate::bdf::open_bdf;
use crate::fiff::open_raw;
use crate::markers::Marker;
use crate::montage::{ChannelType, Montage};

#[derive(Debug, Clone)]
pub struct Recording {
    /// `[C, T]` EEG data in volts.
    pub data: Array2<f32>,
    pub ch_names: Vec<String>,
    pub sfreq: f64,
    /// Absolute sample index of `data[.., 0]`.
    pub first_samp: i64,
    pub annotations: Vec<Annotation>,
    /// EEG channels excluded as bad.
    pub bads: Vec<String>,
}

impl Recording {
    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    /// Marker stream and `description → code` mapping of the annotations.
    pub fn events(&self) -> (Vec<Marker>, BTreeMap<String, i32>) {
        events_from_annotations(&self.annotations, self.sfreq, self.first_samp)
    }

    pub fn bad_segments(&self) -> Vec<Range<i64>> {
        bad_segments(&self.annotations, self.sfreq, self.first_samp)
    }

    /// Read a preprocessed raw FIF.
    pub fn from_fif(path: &Path) -> Result<Self> {
        let raw = open_raw(path)?;
        let picks = raw.info.good_eeg();
        ensure!(!picks.is_empty(), "{} has no good EEG channels", path.display());

        let all = raw.read_data()?;
        let data = all.select(Axis(0), &picks).mapv(|v| v as f32);
        let ch_names = picks.iter().map(|&i| raw.info.chs[i].name.clone()).collect();
        let annotations = raw.annotations();

        log::info!(
            "read {}: {} EEG channels, {} samples @ {} Hz, {} annotations",
            path.display(),
            picks.len(),
            data.ncols(),
            raw.info.sfreq,
            annotations.len()
        );
        Ok(Self {
            data,
            ch_names,
            sfreq: raw.info.sfreq,
            first_samp: raw.first_samp,
            annotations,
            bads: raw.info.bads.clone(),
        })
    }

    /// Read a BIDS BDF plus its `_events.tsv` (and `_channels.tsv` if it
    /// sits next to the events file).
    pub fn from_bids(bdf_path: &Path, events_tsv: &Path, montage: &Montage) -> Result<Self> {
        let raw = open_bdf(bdf_path)?;
        let names = raw.ch_names();
        let channels_tsv = sibling(events_tsv, "_events.tsv", "_channels.tsv");
        let bads = match channels_tsv.filter(|p| p.exists()) {
            Some(p) => read_bad_channels(&p)?,
            None => Vec::new(),
        };

        let picks: Vec<usize> = names
            .iter()
            .enumerate()
            .filter(|(_, n)| montage.classify(n) == ChannelType::Eeg && !bads.contains(*n))
            .map(|(i, _)| i)
            .collect();
        ensure!(!picks.is_empty(), "{} has no good EEG channels", bdf_path.display());

        let all = raw.read_all_data()?;
        let data = all.select(Axis(0), &picks).mapv(|v| v as f32);
        let ch_names = picks.iter().map(|&i| names[i].clone()).collect();
        let annotations = read_events_tsv(events_tsv)?;

        log::info!(
            "read {}: {} EEG channels, {} samples @ {} Hz, {} events",
            bdf_path.display(),
            picks.len(),
            data.ncols(),
            raw.sfreq(),
            annotations.len()
        );
        Ok(Self { data, ch_names, sfreq: raw.sfreq(), first_samp: 0, annotations, bads })
    }
}

fn sibling(path: &Path, suffix: &str, replacement: &str) -> Option<std::path::PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(suffix)?;
    Some(path.with_file_name(format!("{stem}{replacement}")))
}

#[derive(Debug, Deserialize)]
struct EventRow {
    onset: f64,
    #[serde(deserialize_with = "csv::invalid_option")]
    duration: Option<f64>,
    trial_type: String,
}

/// Annotations from a BIDS `_events.tsv` (`onset`, `duration`,
/// `trial_type`; `n/a` durations read as 0).
pub fn read_events_tsv(path: &Path) -> Result<Vec<Annotation>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let mut out = Vec::new();
    for row in rdr.deserialize::<EventRow>() {
        let row = row.with_context(|| format!("parse {}", path.display()))?;
        out.push(Annotation::new(row.onset, row.duration.unwrap_or(0.0), row.trial_type));
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
struct ChannelRow {
    name: String,
    #[serde(default)]
    status: Option<String>,
}

/// Channel names whose `status` column is `bad`.
pub fn read_bad_channels(path: &Path) -> Result<Vec<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("open {}", path.display()))?;
    let mut bads = Vec::new();
    for row in rdr.deserialize::<ChannelRow>() {
        let row = row.with_context(|| format!("parse {}", path.display()))?;
        if row.status.as_deref() == Some("bad") {
            bads.push(row.name);
        }
    }
    Ok(bads)
}
