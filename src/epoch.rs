//! Event-locked epoching.
//!
//! Cuts a fixed window `[tmin, tmax]` (both ends inclusive, rounded to the
//! nearest sample) around each anchor marker, decimates it, and drops it
//! when it
//!
//! 1. runs past either edge of the recording ([`DropReason::TooShort`]),
//! 2. overlaps a `BAD…` annotation ([`DropReason::BadSegment`]), or
//! 3. exceeds the peak-to-peak threshold on any channel
//!    ([`DropReason::Amplitude`]),
//!
//! checked in that order.  Decimation keeps every `decim`-th sample with
//! the phase that keeps the anchor sample itself (t = 0); the amplitude
//! check runs on the decimated window.  No baseline correction is applied.
use std::collections::BTreeMap;
use std::ops::Range;

use anyhow::{ensure, Result};
use ndarray::{s, Array3, ArrayView1, Axis};

use crate::config::{decimation_factor, EpochConfig};
use crate::markers::Marker;
use crate::metadata::MetadataRow;
use crate::recording::Recording;

/// Why an epoch was dropped.
#[derive(Debug, Clone, PartialEq)]
pub enum DropReason {
    TooShort,
    BadSegment,
    /// First channel over the threshold and its peak-to-peak value (V).
    Amplitude { channel: String, ptp: f64 },
}

/// Surviving epochs plus the bookkeeping needed to trace them back.
#[derive(Debug, Clone)]
pub struct Epochs {
    /// `[E, C, T]` in volts.
    pub data: Array3<f32>,
    /// Seconds relative to the anchor, `[T]`.
    pub times: Vec<f64>,
    /// Sampling rate after decimation.
    pub sfreq: f64,
    pub decim: usize,
    pub ch_names: Vec<String>,
    /// Anchor markers of the kept epochs.
    pub events: Vec<Marker>,
    pub event_id: BTreeMap<String, i32>,
    /// Metadata rows of the kept epochs.
    pub metadata: Vec<MetadataRow>,
    /// Trial index of each kept epoch.
    pub selection: Vec<usize>,
    /// Trial index and reason for each dropped epoch.
    pub drop_log: Vec<(usize, DropReason)>,
}

impl Epochs {
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn tmin(&self) -> f64 {
        self.times.first().copied().unwrap_or(0.0)
    }
}

/// Sample offsets (relative to the anchor) kept by the decimated window.
pub fn window_offsets(tmin: f64, tmax: f64, sfreq: f64, decim: usize) -> Vec<i64> {
    let start = (tmin * sfreq).round() as i64;
    let stop = (tmax * sfreq).round() as i64;
    let decim = decim.max(1) as i64;
    let first = start.div_euclid(decim) * decim;
    let first = if first < start { first + decim } else { first };
    (first..=stop).step_by(decim as usize).collect()
}

/// Epoch `recording` around `anchors`, one metadata row per anchor.
pub fn segment(
    recording: &Recording,
    anchors: &[Marker],
    metadata: &[MetadataRow],
    event_id: &BTreeMap<String, i32>,
    cfg: &EpochConfig,
) -> Result<Epochs> {
    ensure!(
        anchors.len() == metadata.len(),
        "{} anchors but {} metadata rows",
        anchors.len(),
        metadata.len()
    );
    ensure!(cfg.tmax >= cfg.tmin, "tmax {} is before tmin {}", cfg.tmax, cfg.tmin);

    let sfreq = recording.sfreq;
    let decim = decimation_factor(sfreq);
    let offsets = window_offsets(cfg.tmin, cfg.tmax, sfreq, decim);
    // Full, undecimated extent used for the edge and annotation checks.
    let start = (cfg.tmin * sfreq).round() as i64;
    let stop = (cfg.tmax * sfreq).round() as i64;

    let first = recording.first_samp;
    let last = first + recording.n_times() as i64; // exclusive
    let bad = if cfg.reject_by_annotation { recording.bad_segments() } else { Vec::new() };
    let n_ch = recording.data.nrows();

    let mut kept: Vec<usize> = Vec::new();
    let mut drop_log = Vec::new();
    let mut windows: Vec<Array3<f32>> = Vec::new();

    for (k, (anchor, row)) in anchors.iter().zip(metadata).enumerate() {
        let lo = anchor.sample + start;
        let hi = anchor.sample + stop + 1;
        if lo < first || hi > last {
            drop_log.push((row.trial, DropReason::TooShort));
            continue;
        }
        if overlaps_any(&bad, lo..hi) {
            drop_log.push((row.trial, DropReason::BadSegment));
            continue;
        }

        let mut win = Array3::<f32>::zeros((1, n_ch, offsets.len()));
        for (t, off) in offsets.iter().enumerate() {
            let col = (anchor.sample + off - first) as usize;
            win.slice_mut(s![0, .., t]).assign(&recording.data.column(col));
        }

        if let Some(threshold) = cfg.reject_eeg {
            let over = win
                .index_axis(Axis(0), 0)
                .outer_iter()
                .map(peak_to_peak)
                .enumerate()
                .find(|&(_, ptp)| ptp > threshold);
            if let Some((ch, ptp)) = over {
                let channel = recording.ch_names[ch].clone();
                log::debug!("trial {}: {channel} peak-to-peak {:.1} µV", row.trial, ptp * 1e6);
                drop_log.push((row.trial, DropReason::Amplitude { channel, ptp }));
                continue;
            }
        }

        kept.push(k);
        windows.push(win);
    }

    let data = if windows.is_empty() {
        Array3::<f32>::zeros((0, n_ch, offsets.len()))
    } else {
        let views: Vec<_> = windows.iter().map(|w| w.view()).collect();
        ndarray::concatenate(Axis(0), &views)?
    };

    log::info!(
        "{} of {} epochs kept ({} dropped), decim {decim}",
        kept.len(),
        anchors.len(),
        drop_log.len()
    );

    Ok(Epochs {
        data,
        times: offsets.iter().map(|&o| o as f64 / sfreq).collect(),
        sfreq: sfreq / decim as f64,
        decim,
        ch_names: recording.ch_names.clone(),
        events: kept.iter().map(|&k| anchors[k]).collect(),
        event_id: event_id.clone(),
        metadata: kept.iter().map(|&k| metadata[k].clone()).collect(),
        selection: kept.iter().map(|&k| metadata[k].trial).collect(),
        drop_log,
    })
}

fn overlaps_any(segments: &[Range<i64>], window: Range<i64>) -> bool {
    segments.iter().any(|r| r.start < window.end && window.start < r.end)
}

fn peak_to_peak(x: ArrayView1<f32>) -> f64 {
    let (lo, hi) = x
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    f64::from(hi - lo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::Array1;

    #[test]
    fn offsets_keep_zero() {
        let off = window_offsets(-2.0, 5.0, 256.0, 2);
        assert_eq!(off.first(), Some(&-512));
        assert_eq!(off.last(), Some(&1280));
        assert_eq!(off.len(), 897);
        assert!(off.contains(&0));
    }

    #[test]
    fn offsets_odd_start_phase() {
        // start -3 with decim 2: -3 is skipped so that 0 stays on the grid.
        assert_eq!(window_offsets(-0.3, 0.3, 10.0, 2), vec![-2, 0, 2]);
        assert_eq!(window_offsets(-0.3, 0.3, 10.0, 1), vec![-3, -2, -1, 0, 1, 2, 3]);
    }

    #[test]
    fn ptp_of_signal() {
        let x = Array1::from(vec![1e-6_f32, -2e-6, 4e-6]);
        assert_abs_diff_eq!(peak_to_peak(x.view()), 6e-6, epsilon = 1e-12);
    }

    #[test]
    fn overlap_is_half_open() {
        assert!(!overlaps_any(&[10..20], 0..10));
        assert!(overlaps_any(&[10..20], 0..11));
        assert!(!overlaps_any(&[10..20], 20..30));
    }
}
