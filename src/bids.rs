//! BIDS-EEG writer for one subject.
//!
//! ```text
//! bids/
//! ├── dataset_description.json        (created once)
//! ├── participants.tsv / .json        (row upserted per subject)
//! └── sub-001/
//!     ├── sub-001_scans.tsv
//!     └── eeg/
//!         ├── sub-001_task-dpx_eeg.bdf      (byte copy of the source)
//!         ├── sub-001_task-dpx_eeg.json
//!         ├── sub-001_task-dpx_channels.tsv
//!         └── sub-001_task-dpx_events.tsv
//! ```
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::bdf::RawBdf;
use crate::demographics::Demographics;
use crate::layout::subject_label;
use crate::markers::Marker;
use crate::montage::ChannelType;

pub const TASK: &str = "dpx";
pub const BIDS_VERSION: &str = "1.7.0";

/// Location of one subject's EEG recording in the BIDS tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidsPath {
    pub root: PathBuf,
    pub subject: u32,
}

impl BidsPath {
    pub fn new(root: &Path, subject: u32) -> Self {
        Self { root: root.to_path_buf(), subject }
    }

    pub fn subject_dir(&self) -> PathBuf {
        self.root.join(subject_label(self.subject))
    }

    pub fn eeg_dir(&self) -> PathBuf {
        self.subject_dir().join("eeg")
    }

    /// `sub-XXX_task-dpx`.
    pub fn basename(&self) -> String {
        format!("{}_task-{TASK}", subject_label(self.subject))
    }

    /// `eeg/sub-XXX_task-dpx_{suffix}`.
    pub fn file(&self, suffix: &str) -> PathBuf {
        self.eeg_dir().join(format!("{}_{suffix}", self.basename()))
    }

    pub fn recording(&self) -> PathBuf {
        self.file("eeg.bdf")
    }

    pub fn events_tsv(&self) -> PathBuf {
        self.file("events.tsv")
    }

    pub fn channels_tsv(&self) -> PathBuf {
        self.file("channels.tsv")
    }

    pub fn sidecar(&self) -> PathBuf {
        self.file("eeg.json")
    }

    pub fn scans_tsv(&self) -> PathBuf {
        self.subject_dir().join(format!("{}_scans.tsv", subject_label(self.subject)))
    }
}

/// Everything written for one subject.
pub struct BidsInput<'a> {
    pub source: &'a Path,
    pub raw: &'a RawBdf,
    pub channel_types: &'a [ChannelType],
    /// Events to export, already filtered to known codes.
    pub events: &'a [Marker],
    pub event_id: &'a BTreeMap<String, i32>,
    pub demographics: Demographics,
    pub birthday: NaiveDate,
    pub line_freq: f64,
}

/// Write the subject's recording and sidecars.  Returns the written files.
pub fn write_raw_bids(bids: &BidsPath, input: &BidsInput, overwrite: bool) -> Result<Vec<PathBuf>> {
    let outputs = [
        bids.recording(),
        bids.sidecar(),
        bids.channels_tsv(),
        bids.events_tsv(),
        bids.scans_tsv(),
    ];
    if !overwrite {
        if let Some(existing) = outputs.iter().find(|p| p.exists()) {
            bail!(
                "{} already exists. Use `--overwrite true` to replace it.",
                existing.display()
            );
        }
    }
    let eeg_dir = bids.eeg_dir();
    std::fs::create_dir_all(&eeg_dir).with_context(|| format!("create {}", eeg_dir.display()))?;

    write_dataset_description(&bids.root)?;
    upsert_participant(&bids.root, bids.subject, input.demographics, input.birthday, input.raw.meas_date())?;

    std::fs::copy(input.source, bids.recording())
        .with_context(|| format!("copy {} to {}", input.source.display(), bids.recording().display()))?;
    write_sidecar(&bids.sidecar(), input)?;
    write_channels(&bids.channels_tsv(), input)?;
    write_events(&bids.events_tsv(), input)?;
    write_scans(&bids.scans_tsv(), bids, input.raw.meas_date())?;

    log::info!("wrote {} ({} events)", bids.recording().display(), input.events.len());
    Ok(outputs.to_vec())
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(path, text + "\n").with_context(|| format!("write {}", path.display()))
}

fn tsv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("create {}", path.display()))
}

fn write_dataset_description(root: &Path) -> Result<()> {
    let path = root.join("dataset_description.json");
    if path.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(root).with_context(|| format!("create {}", root.display()))?;
    write_json(
        &path,
        &json!({
            "Name": "DPX task EEG",
            "BIDSVersion": BIDS_VERSION,
            "DatasetType": "raw",
            "Authors": ["[Unspecified]"],
        }),
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ParticipantRow {
    participant_id: String,
    age: String,
    sex: String,
}

/// Completed years between `birthday` and `on`.
pub fn age_on(birthday: NaiveDate, on: NaiveDate) -> u32 {
    let mut years = on.year() - birthday.year();
    if (on.month(), on.day()) < (birthday.month(), birthday.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

fn upsert_participant(
    root: &Path,
    subject: u32,
    demo: Demographics,
    birthday: NaiveDate,
    meas_date: DateTime<Utc>,
) -> Result<()> {
    let path = root.join("participants.tsv");
    let mut rows: Vec<ParticipantRow> = Vec::new();
    if path.exists() {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .from_path(&path)
            .with_context(|| format!("open {}", path.display()))?;
        for row in rdr.deserialize() {
            rows.push(row.with_context(|| format!("parse {}", path.display()))?);
        }
    }

    let id = subject_label(subject);
    rows.retain(|r| r.participant_id != id);
    rows.push(ParticipantRow {
        participant_id: id,
        age: age_on(birthday, meas_date.date_naive()).to_string(),
        sex: demo.sex.bids().to_string(),
    });
    rows.sort_by(|a, b| a.participant_id.cmp(&b.participant_id));

    let mut w = tsv_writer(&path)?;
    for row in &rows {
        w.serialize(row)?;
    }
    w.flush()?;

    let sidecar = root.join("participants.json");
    if !sidecar.exists() {
        write_json(
            &sidecar,
            &json!({
                "participant_id": {"Description": "Unique participant identifier"},
                "age": {"Description": "Age of the participant at time of testing", "Units": "years"},
                "sex": {"Description": "Biological sex of the participant",
                        "Levels": {"F": "female", "M": "male"}},
            }),
        )?;
    }
    Ok(())
}

fn write_sidecar(path: &Path, input: &BidsInput) -> Result<()> {
    let count = |t: ChannelType| input.channel_types.iter().filter(|&&c| c == t).count();
    let duration = input.raw.n_times() as f64 / input.raw.sfreq();
    write_json(
        path,
        &json!({
            "TaskName": TASK,
            "Manufacturer": "BioSemi",
            "PowerLineFrequency": input.line_freq,
            "SamplingFrequency": input.raw.sfreq(),
            "SoftwareFilters": "n/a",
            "RecordingDuration": duration,
            "RecordingType": "continuous",
            "EEGReference": "n/a",
            "EEGGround": "n/a",
            "EEGPlacementScheme": "based on the extended 10/20 system",
            "EEGChannelCount": count(ChannelType::Eeg),
            "EOGChannelCount": count(ChannelType::Eog),
            "TriggerChannelCount": count(ChannelType::Stim),
        }),
    )
}

#[derive(Serialize)]
struct ChannelRow<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    units: &'static str,
    sampling_frequency: f64,
    status: &'static str,
}

fn write_channels(path: &Path, input: &BidsInput) -> Result<()> {
    let mut w = tsv_writer(path)?;
    for (sig, &t) in input.raw.header.signals.iter().zip(input.channel_types) {
        w.serialize(ChannelRow {
            name: &sig.label,
            kind: t.bids(),
            units: if t == ChannelType::Stim { "n/a" } else { "µV" },
            sampling_frequency: input.raw.sfreq(),
            status: "good",
        })?;
    }
    w.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct EventRow<'a> {
    onset: f64,
    duration: f64,
    trial_type: &'a str,
    value: i32,
    sample: i64,
}

fn write_events(path: &Path, input: &BidsInput) -> Result<()> {
    let names: BTreeMap<i32, &str> = input.event_id.iter().map(|(k, &v)| (v, k.as_str())).collect();
    let sfreq = input.raw.sfreq();
    let mut w = tsv_writer(path)?;
    for ev in input.events {
        let trial_type = names.get(&ev.code).copied().unwrap_or("n/a");
        w.serialize(EventRow {
            onset: ev.sample as f64 / sfreq,
            duration: 0.0,
            trial_type,
            value: ev.code,
            sample: ev.sample,
        })?;
    }
    w.flush()?;
    Ok(())
}

fn write_scans(path: &Path, bids: &BidsPath, meas_date: DateTime<Utc>) -> Result<()> {
    let mut w = tsv_writer(path)?;
    w.write_record(["filename", "acq_time"])?;
    let filename = format!("eeg/{}_eeg.bdf", bids.basename());
    let acq_time = meas_date.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string();
    w.write_record([filename.as_str(), acq_time.as_str()])?;
    w.flush()?;
    Ok(())
}
