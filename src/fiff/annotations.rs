//! `FIFFB_MNE_ANNOTATIONS` block.
//!
//! MNE stores annotations as parallel arrays: onsets (`FIFF_MNE_BASELINE_MIN`),
//! end times (`FIFF_MNE_BASELINE_MAX`), descriptions joined by `:` with `;`
//! standing in for a literal colon (`FIFF_COMMENT`), and an optional
//! `orig_time` (`FIFF_MEAS_DATE`).  With `orig_time` set, onsets count from
//! that instant; without it they count from the first sample.
use std::io::{Read, Seek};

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};

use super::constants::*;
use super::info::stamp_to_datetime;
use super::tag::FifReader;
use super::tree::Block;
use crate::annotations::Annotation;

/// Annotation arrays as stored on disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredAnnotations {
    pub onsets: Vec<f64>,
    pub ends: Vec<f64>,
    pub descriptions: Vec<String>,
    pub orig_time: Option<DateTime<Utc>>,
}

impl StoredAnnotations {
    /// Annotations with onsets relative to the first sample.
    ///
    /// `meas_date` is the recording's measurement date; when `orig_time`
    /// differs from it the difference is folded into the onsets.
    pub fn relative_to_first_sample(
        &self,
        meas_date: Option<DateTime<Utc>>,
        first_samp: i64,
        sfreq: f64,
    ) -> Vec<Annotation> {
        let shift = match self.orig_time {
            None => 0.0,
            Some(orig) => {
                let drift = meas_date
                    .map(|m| (orig - m).num_microseconds().unwrap_or(0) as f64 * 1e-6)
                    .unwrap_or(0.0);
                drift - first_samp as f64 / sfreq
            }
        };
        self.onsets
            .iter()
            .zip(&self.ends)
            .zip(&self.descriptions)
            .map(|((&onset, &end), desc)| Annotation::new(onset + shift, end - onset, desc.clone()))
            .collect()
    }
}

/// Split a stored description list.
pub fn split_descriptions(joined: &str) -> Vec<String> {
    if joined.is_empty() {
        return Vec::new();
    }
    joined.split(':').map(|s| s.replace(';', ":")).collect()
}

impl<R: Read + Seek> FifReader<R> {
    /// Read the first annotation block, if the file has one.
    pub fn read_annotations(&mut self, tree: &Block) -> Result<Option<StoredAnnotations>> {
        let Some(block) = tree.find_block(FIFFB_MNE_ANNOTATIONS) else {
            return Ok(None);
        };
        let mut out = StoredAnnotations::default();
        for tag in &block.tags {
            match tag.kind {
                FIFF_MNE_BASELINE_MIN => out.onsets = self.numbers(tag)?,
                FIFF_MNE_BASELINE_MAX => out.ends = self.numbers(tag)?,
                FIFF_COMMENT => out.descriptions = split_descriptions(&self.string(tag)?),
                FIFF_MEAS_DATE => {
                    let stamp = self.numbers(tag)?;
                    if let [secs, usecs, ..] = stamp[..] {
                        out.orig_time = stamp_to_datetime(secs, usecs);
                    }
                }
                _ => {}
            }
        }
        let n = out.onsets.len();
        if out.ends.len() != n || out.descriptions.len() != n {
            bail!(
                "annotation block is inconsistent: {} onsets, {} end times, {} descriptions",
                n,
                out.ends.len(),
                out.descriptions.len()
            );
        }
        Ok(Some(out))
    }
}
