//! # dpx: EEG pipeline for the DPX (dot-pattern expectancy) task
//!
//! Converts BioSemi recordings of the DPX paradigm into a BIDS dataset and
//! extracts cue-locked epochs annotated with per-trial behaviour.
//!
//! ## Pipeline overview
//!
//! ```text
//! sourcedata/sub-XXX/eeg/sub-XXX_dpx_eeg.bdf
//!   │
//!   ├─ bdf::open_bdf()            native BDF reader (24-bit samples)
//!   ├─ triggers::find_events()    Status channel → (sample, code) markers
//!   ├─ bids::write_raw_bids()     BIDS-EEG files + participants.tsv
//!   │
//! derivatives/preprocessing/preprocessed/sub-XXX_preprocessed-raw.fif
//!   │   (or the BIDS recording when no preprocessed file exists)
//!   │
//!   ├─ fiff::open_raw()           native FIFF reader with annotations
//!   ├─ recode::recode()           cue/probe/response grammar → codes 118–139
//!   ├─ metadata::derive_metadata  block, trial, run, reactions, RT
//!   ├─ epoch::segment()           [-2, 5] s around each cue, decimated,
//!   │                             300 µV peak-to-peak rejection
//!   └─ io::write_epochs()         safetensors + JSON metadata
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use dpx::{recode, Taxonomy};
//! use dpx::recording::Recording;
//!
//! let rec = Recording::from_fif("sub-001_preprocessed-raw.fif".as_ref()).unwrap();
//! let (markers, event_id) = rec.events();
//! let taxonomy = Taxonomy::from_event_id(&event_id, &["EDGE boundary".into()]).unwrap();
//! let recoding = recode(&markers, &taxonomy, rec.sfreq).unwrap();
//! println!("{} trials, broken: {:?}", recoding.trials.len(), recoding.broken());
//! ```
//!
//! The three binaries (`dpx_setup_derivatives`, `dpx_to_bids`,
//! `dpx_extract_epochs`) wrap the functions in [`stages`].

pub mod annotations;
pub mod bdf;
pub mod bids;
pub mod codes;
pub mod config;
pub mod demographics;
pub mod epoch;
pub mod fiff;
pub mod io;
pub mod layout;
pub mod markers;
pub mod metadata;
pub mod montage;
pub mod recode;
pub mod recording;
pub mod stages;
pub mod triggers;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// config
pub use config::{EpochConfig, StudyConfig, SubjectSet};

// markers and recoding
pub use codes::{Outcome, RecodedCode};
pub use markers::{Cue, Marker, Probe, Role, Taxonomy};
pub use metadata::{derive_metadata, MetadataRow};
pub use recode::{recode, Broken, ReactionTime, Recoding, Trial};

// data
pub use annotations::Annotation;
pub use bdf::{open_bdf, RawBdf};
pub use epoch::{segment, DropReason, Epochs};
pub use fiff::{open_raw, RawFif};
pub use recording::Recording;

// io
pub use io::{write_epochs, StFile, StWriter};
