//! Study configuration.
//!
//! Two JSON files in the configuration directory drive every stage:
//!
//! * `paths.json`: data locations and the subject set,
//!   ```json
//!   { "root": "../data", "sourcedata": "../data/sourcedata",
//!     "bidsdata": "../data/bids", "derivatives": "../data/derivatives",
//!     "subjects": { "first": 1, "last": 52, "exclude": [] } }
//!   ```
//!   Relative paths are resolved against the configuration directory.
//! * `eeg_markers.json`: `{"dpx": {"markers": {name: code, ...}}}`.
//!
//! The configuration directory is `$DPX_CONFIG_DIR`, or the `config/`
//! directory shipped with the crate.
//!
//! Epoching parameters live in [`EpochConfig`], whose [`Default`] holds the
//! values used for the published analyses.
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::markers::Taxonomy;

/// Environment variable naming the configuration directory.
pub const CONFIG_DIR_ENV: &str = "DPX_CONFIG_DIR";

const NOT_FOUND_MSG: &str = "Did not find the path:\n\n>>> {path}\n\n\
    >>Did you define the path to the data on your system in `paths.json`? \
    See the `{key}` entry!<<\n";

// ── Epoching ─────────────────────────────────────────────────────────────

/// Parameters of the cue-locked epoch extraction.
///
/// ```
/// use dpx::EpochConfig;
///
/// let cfg = EpochConfig {
///     reject_eeg: Some(150e-6), // stricter amplitude rejection
///     ..EpochConfig::default()
/// };
/// assert_eq!(cfg.tmin, -2.0);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct EpochConfig {
    /// Window start relative to the cue, in seconds.
    ///
    /// Default: `-2.0` s.
    pub tmin: f64,

    /// Window end relative to the cue, in seconds (inclusive).
    ///
    /// Default: `5.0` s.
    pub tmax: f64,

    /// Peak-to-peak rejection threshold on EEG channels, in volts.
    ///
    /// An epoch is dropped when any EEG channel's peak-to-peak amplitude
    /// within the (decimated) window exceeds this value.  `None` disables
    /// amplitude rejection.
    ///
    /// Default: `300 µV`.
    pub reject_eeg: Option<f64>,

    /// Drop epochs that overlap a `BAD…` annotation.
    ///
    /// Default: `true`.
    pub reject_by_annotation: bool,

    /// Marker names that mark the block boundary.  The first marker with
    /// any of these names splits block 0 from block 1.
    ///
    /// Default: `["EDGE boundary", "pause_record"]`.
    pub boundary_names: Vec<String>,

    /// Power-line frequency written to the BIDS sidecar, in Hz.
    ///
    /// Default: `50.0`.
    pub line_freq: f64,
}

impl Default for EpochConfig {
    fn default() -> Self {
        Self {
            tmin: -2.0,
            tmax: 5.0,
            reject_eeg: Some(300e-6),
            reject_by_annotation: true,
            boundary_names: vec!["EDGE boundary".to_string(), "pause_record".to_string()],
            line_freq: 50.0,
        }
    }
}

/// Decimation factor for a native sampling rate: 256 → 2, 512 → 4,
/// 1024 → 8, anything else → 1.
pub fn decimation_factor(sfreq: f64) -> usize {
    const TABLE: [(f64, usize); 3] = [(256.0, 2), (512.0, 4), (1024.0, 8)];
    TABLE
        .iter()
        .find(|(rate, _)| (sfreq - rate).abs() < 1e-6)
        .map_or(1, |&(_, decim)| decim)
}

// ── Paths and subjects ───────────────────────────────────────────────────

/// Inclusive subject range minus exclusions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubjectSet {
    pub first: u32,
    pub last: u32,
    #[serde(default)]
    pub exclude: Vec<u32>,
}

impl Default for SubjectSet {
    fn default() -> Self {
        Self { first: 1, last: 52, exclude: Vec::new() }
    }
}

impl SubjectSet {
    pub fn contains(&self, subject: u32) -> bool {
        (self.first..=self.last).contains(&subject) && !self.exclude.contains(&subject)
    }

    pub fn ids(&self) -> Vec<u32> {
        (self.first..=self.last).filter(|s| !self.exclude.contains(s)).collect()
    }
}

#[derive(Debug, Deserialize)]
struct PathsFile {
    root: PathBuf,
    sourcedata: PathBuf,
    bidsdata: PathBuf,
    derivatives: PathBuf,
    #[serde(default)]
    subjects: SubjectSet,
}

#[derive(Debug, Deserialize)]
struct MarkersFile {
    dpx: MarkerSection,
}

#[derive(Debug, Deserialize)]
struct MarkerSection {
    markers: BTreeMap<String, i32>,
}

/// Absolute data locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyPaths {
    pub root: PathBuf,
    pub sourcedata: PathBuf,
    pub bidsdata: PathBuf,
    pub derivatives: PathBuf,
}

/// Everything a stage needs to know about the study.
#[derive(Debug, Clone)]
pub struct StudyConfig {
    pub paths: StudyPaths,
    pub subjects: SubjectSet,
    /// Task marker names to codes.
    pub markers: BTreeMap<String, i32>,
    pub epochs: EpochConfig,
}

impl StudyConfig {
    /// Load `paths.json` and `eeg_markers.json` from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let paths_file = dir.join("paths.json");
        let text = std::fs::read_to_string(&paths_file)
            .with_context(|| format!("read {}", paths_file.display()))?;
        let raw: PathsFile = serde_json::from_str(&text)
            .with_context(|| format!("parse {}", paths_file.display()))?;

        let markers_file = dir.join("eeg_markers.json");
        let text = std::fs::read_to_string(&markers_file)
            .with_context(|| format!("read {}", markers_file.display()))?;
        let markers: MarkersFile = serde_json::from_str(&text)
            .with_context(|| format!("parse {}", markers_file.display()))?;

        let resolve = |p: &Path| if p.is_absolute() { p.to_path_buf() } else { dir.join(p) };
        let cfg = Self {
            paths: StudyPaths {
                root: resolve(&raw.root),
                sourcedata: resolve(&raw.sourcedata),
                bidsdata: resolve(&raw.bidsdata),
                derivatives: resolve(&raw.derivatives),
            },
            subjects: raw.subjects,
            markers: markers.dpx.markers,
            epochs: EpochConfig::default(),
        };
        cfg.check_markers()?;
        log::debug!("loaded configuration from {}", dir.display());
        Ok(cfg)
    }

    /// Load from `$DPX_CONFIG_DIR`, else from the crate's `config/`.
    pub fn from_env() -> Result<Self> {
        let dir = std::env::var_os(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/config")));
        Self::load(&dir)
    }

    /// Codes must be unique across names.
    fn check_markers(&self) -> Result<()> {
        let mut seen: HashMap<i32, &str> = HashMap::new();
        for (name, &code) in &self.markers {
            if let Some(prev) = seen.insert(code, name) {
                bail!("marker code {code} is assigned to both '{prev}' and '{name}' in eeg_markers.json");
            }
        }
        Ok(())
    }

    pub fn validate_subject(&self, subject: u32) -> Result<()> {
        if !self.subjects.contains(subject) {
            bail!("'{subject}' is not a valid subject ID.\nUse: {:?}", self.subjects.ids());
        }
        Ok(())
    }

    pub fn require_sourcedata(&self) -> Result<&Path> {
        require(&self.paths.sourcedata, "sourcedata")
    }

    pub fn require_bidsdata(&self) -> Result<&Path> {
        require(&self.paths.bidsdata, "bidsdata")
    }

    pub fn require_derivatives(&self) -> Result<&Path> {
        require(&self.paths.derivatives, "derivatives")
    }

    /// Taxonomy over the configured task markers.
    pub fn taxonomy(&self) -> Result<Taxonomy> {
        Taxonomy::from_event_id(&self.markers, &self.epochs.boundary_names)
    }
}

fn require<'a>(path: &'a Path, key: &str) -> Result<&'a Path> {
    if !path.exists() {
        bail!(
            "{}",
            NOT_FOUND_MSG
                .replace("{path}", &path.display().to_string())
                .replace("{key}", key)
        );
    }
    Ok(path)
}
