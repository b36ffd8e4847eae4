//! Measurement info read from `FIFFB_MEAS_INFO`.
//!
//! Only the fields needed to pick EEG channels, calibrate them and place
//! annotations on the sample axis are parsed.
use std::io::{Read, Seek};

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};

use super::constants::*;
use super::tag::FifReader;
use super::tree::Block;

// ── Channel info ─────────────────────────────────────────────────────────

/// One `FIFFT_CH_INFO_STRUCT` record.
///
/// ```text
///  0  scanno    i32      16  cal        f32
///  4  logno     i32      20  coil_type  i32
///  8  kind      i32      24  loc        12 × f32
/// 12  range     f32      72  unit, unit_mul  i32
///                        80  ch_name    16 bytes, NUL padded
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub kind: i32,
    pub range: f32,
    pub cal: f32,
    pub unit: i32,
    pub name: String,
}

impl Channel {
    pub const STRUCT_LEN: usize = 96;

    /// Factor from stored sample values to SI units.
    #[inline]
    pub fn calibration(&self) -> f64 {
        f64::from(self.cal) * f64::from(self.range)
    }

    pub fn is_eeg(&self) -> bool {
        self.kind == FIFFV_EEG_CH
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() < Self::STRUCT_LEN {
            bail!("ch_info payload too short: {} bytes (need {})", raw.len(), Self::STRUCT_LEN);
        }
        let word = |at: usize| [raw[at], raw[at + 1], raw[at + 2], raw[at + 3]];
        let name = &raw[80..96];
        let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
        Ok(Self {
            kind: i32::from_be_bytes(word(8)),
            range: f32::from_be_bytes(word(12)),
            cal: f32::from_be_bytes(word(16)),
            unit: i32::from_be_bytes(word(72)),
            name: name[..end].iter().copied().map(char::from).collect(),
        })
    }
}

// ── Measurement info ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MeasInfo {
    pub sfreq: f64,
    pub chs: Vec<Channel>,
    pub bads: Vec<String>,
    pub meas_date: Option<DateTime<Utc>>,
    pub line_freq: Option<f64>,
}

impl MeasInfo {
    pub fn n_chan(&self) -> usize {
        self.chs.len()
    }

    pub fn ch_names(&self) -> Vec<&str> {
        self.chs.iter().map(|c| c.name.as_str()).collect()
    }

    /// Indices of EEG channels not listed as bad.
    pub fn good_eeg(&self) -> Vec<usize> {
        self.chs
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_eeg() && !self.bads.contains(&c.name))
            .map(|(i, _)| i)
            .collect()
    }
}

/// `(seconds, microseconds)` pair to a UTC timestamp.
pub fn stamp_to_datetime(secs: f64, usecs: f64) -> Option<DateTime<Utc>> {
    let nanos = (usecs * 1e3).round();
    if !(0.0..1e9).contains(&nanos) {
        return None;
    }
    DateTime::from_timestamp(secs as i64, nanos as u32)
}

impl<R: Read + Seek> FifReader<R> {
    /// Parse the measurement info below `FIFFB_MEAS`.
    pub fn read_meas_info(&mut self, tree: &Block) -> Result<MeasInfo> {
        let info = tree
            .find_block(FIFFB_MEAS)
            .and_then(|m| m.find_block(FIFFB_MEAS_INFO))
            .ok_or_else(|| anyhow!("FIFFB_MEAS_INFO block not found"))?;

        let mut n_chan = None;
        let mut sfreq = None;
        let mut chs = Vec::new();
        let mut bads = Vec::new();
        let mut meas_date = None;
        let mut line_freq = None;

        for tag in &info.tags {
            match tag.kind {
                FIFF_NCHAN => n_chan = Some(self.int(tag)?.max(0) as usize),
                FIFF_SFREQ => sfreq = Some(f64::from(self.float(tag)?)),
                FIFF_CH_INFO => chs.push(Channel::from_bytes(&self.payload(tag)?)?),
                FIFF_BAD_CHS => {
                    bads = self
                        .string(tag)?
                        .split(':')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                }
                FIFF_MEAS_DATE => {
                    let stamp = self.numbers(tag)?;
                    if let [secs, usecs, ..] = stamp[..] {
                        meas_date = stamp_to_datetime(secs, usecs);
                    }
                }
                FIFF_LINE_FREQ => {
                    let v = f64::from(self.float(tag)?);
                    line_freq = v.is_finite().then_some(v);
                }
                _ => {}
            }
        }

        let n_chan = n_chan.ok_or_else(|| anyhow!("FIFF_NCHAN not found"))?;
        let sfreq = sfreq.ok_or_else(|| anyhow!("FIFF_SFREQ not found"))?;
        if chs.len() != n_chan {
            bail!("expected {n_chan} ch_info structs, got {}", chs.len());
        }
        Ok(MeasInfo { sfreq, chs, bads, meas_date, line_freq })
    }
}
