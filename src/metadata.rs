//! Per-trial metadata and the reaction-time table.
//!
//! Rows are derived from the recoded cue/probe code pair of every surviving
//! trial, decoded through the fixed reverse mapping of [`RecodedCode`]:
//!
//! | column            | source                                             |
//! |-------------------|----------------------------------------------------|
//! | `block`, `trial`  | trial record                                       |
//! | `cue`             | stimulus label of the cue code (`A`/`B`)           |
//! | `probe`           | stimulus label of the probe code (`X`, `AY`, …)    |
//! | `run`             | stimulus-repetition run length (see below)         |
//! | `reaction_cues`   | outcome label of the cue code                      |
//! | `reaction_probes` | outcome label of the probe code                    |
//! | `cond_reaction`   | condition matching the response given              |
//! | `rt`              | reaction time, `99999.0` timed out, empty if none  |
//!
//! `run` counts how often the same probe combination was answered correctly
//! in a row: it is the previous row's `run + 1` when the probe label repeats
//! and both this row and the previous row were correct, else 0.
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::codes::{Outcome, RecodedCode};
use crate::recode::Trial;

/// One row of the epoch metadata table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataRow {
    pub block: u8,
    pub trial: usize,
    pub cue: &'static str,
    pub probe: &'static str,
    pub run: u32,
    pub reaction_cues: &'static str,
    pub reaction_probes: &'static str,
    pub cond_reaction: Option<&'static str>,
    /// `None` where the trial kind has no latency (too-soon).
    pub rt: Option<f64>,
}

/// Condition label of the response actually given.
///
/// Correct responses keep the probe combination.  An incorrect response to
/// `AX` is the non-target answer and is labelled `AY`; an incorrect response
/// to `AY`, `BX` or `BY` is the target answer and is labelled `AX`.
pub fn conditional_reaction(outcome: Outcome, probe: &'static str) -> Option<&'static str> {
    match outcome {
        Outcome::Correct => Some(probe),
        Outcome::Incorrect => match probe {
            "AX" => Some("AY"),
            "AY" | "BX" | "BY" => Some("AX"),
            _ => None,
        },
        Outcome::TooSoon | Outcome::Missed => None,
    }
}

/// Build the metadata table from the recoder's trials.
///
/// Broken trials are skipped.  Fails if a surviving trial lacks a recoded
/// cue or probe code, which the recoder never produces.
pub fn derive_metadata(trials: &[Trial]) -> Result<Vec<MetadataRow>> {
    let mut rows: Vec<MetadataRow> = Vec::new();
    for trial in trials.iter().filter(|t| !t.is_broken()) {
        let cue_code = trial
            .cue_code()
            .with_context(|| format!("trial {} has no recoded cue", trial.index))?;
        let probe_code = trial
            .probe_code()
            .with_context(|| format!("trial {} has no recoded probe", trial.index))?;

        let (cue_outcome, cue) = cue_code.decode();
        let (probe_outcome, probe) = probe_code.decode();

        let run = match rows.last() {
            Some(prev)
                if prev.probe == probe
                    && probe_outcome == Outcome::Correct
                    && prev.reaction_probes == Outcome::Correct.label() =>
            {
                prev.run + 1
            }
            _ => 0,
        };

        rows.push(MetadataRow {
            block: trial.block,
            trial: trial.index,
            cue,
            probe,
            run,
            reaction_cues: cue_outcome.label(),
            reaction_probes: probe_outcome.label(),
            cond_reaction: conditional_reaction(probe_outcome, probe),
            rt: trial.rt.as_option(),
        });
    }
    Ok(rows)
}

/// `RecodedCode` of the cue and probe for a row, re-encoded from its labels.
pub fn row_codes(row: &MetadataRow) -> Option<(RecodedCode, RecodedCode)> {
    let find = |outcome: &str, stim: &str, cue: bool| {
        RecodedCode::ALL.iter().copied().find(|c| {
            let (o, s) = c.decode();
            c.is_cue() == cue && o.label() == outcome && s == stim
        })
    };
    Some((
        find(row.reaction_cues, row.cue, true)?,
        find(row.reaction_probes, row.probe, false)?,
    ))
}

// csv cannot serialize flattened structs, so the row is spelled out.
#[derive(Serialize)]
struct RtRow {
    block: u8,
    trial: usize,
    cue: &'static str,
    probe: &'static str,
    run: u32,
    reaction_cues: &'static str,
    reaction_probes: &'static str,
    cond_reaction: Option<&'static str>,
    rt: Option<f64>,
    subject: u32,
}

impl RtRow {
    fn new(row: &MetadataRow, subject: u32) -> Self {
        Self {
            block: row.block,
            trial: row.trial,
            cue: row.cue,
            probe: row.probe,
            run: row.run,
            reaction_cues: row.reaction_cues,
            reaction_probes: row.reaction_probes,
            cond_reaction: row.cond_reaction,
            rt: row.rt,
            subject,
        }
    }
}

/// Write the reaction-time table (tab-separated, one row per trial).
///
/// Missing values are empty fields.  Parent directories are created.
pub fn write_rt_table(path: &Path, rows: &[MetadataRow], subject: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let mut w = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    for row in rows {
        w.serialize(RtRow::new(row, subject))?;
    }
    w.flush().with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
