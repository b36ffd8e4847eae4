//! BioSemi BDF reader.
//!
//! BDF is EDF with 24-bit samples.  Layout:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ 256-byte main header (ASCII) │  version = 0xFF "BIOSEMI"
//! ├──────────────────────────────┤
//! │ 256 bytes × n_signals        │  field-major: all labels, all units, …
//! ├──────────────────────────────┤
//! │ data records                 │  per record, per signal:
//! │                              │  samples_per_record × 3 bytes,
//! │                              │  little-endian two's complement
//! └──────────────────────────────┘
//! ```
//!
//! Data channels are scaled to volts (`gain × digital + offset`, then the
//! unit prefix); the `Status` channel is returned as raw digital values.
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, ensure, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use ndarray::Array2;

/// Name of the BioSemi trigger channel.
pub const STATUS_CHANNEL: &str = "Status";

const BDF_MAGIC: &[u8; 8] = b"\xffBIOSEMI";

// ── Header ───────────────────────────────────────────────────────────────

/// Per-signal header fields.
#[derive(Debug, Clone, PartialEq)]
pub struct BdfSignal {
    pub label: String,
    pub transducer: String,
    /// Physical dimension, e.g. `uV` or `Boolean`.
    pub unit: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i64,
    pub digital_max: i64,
    pub prefilter: String,
    pub samples_per_record: usize,
}

impl BdfSignal {
    pub fn gain(&self) -> f64 {
        (self.physical_max - self.physical_min) / (self.digital_max - self.digital_min) as f64
    }

    pub fn offset(&self) -> f64 {
        self.physical_min - self.gain() * self.digital_min as f64
    }

    /// Factor from the physical dimension to SI units.
    pub fn unit_scale(&self) -> f64 {
        match self.unit.as_str() {
            "uV" | "µV" => 1e-6,
            "mV" => 1e-3,
            "nV" => 1e-9,
            _ => 1.0,
        }
    }

    pub fn is_status(&self) -> bool {
        self.label == STATUS_CHANNEL
    }
}

#[derive(Debug, Clone)]
pub struct BdfHeader {
    pub patient: String,
    pub recording: String,
    pub start: NaiveDateTime,
    pub header_bytes: usize,
    pub n_records: usize,
    /// Seconds per data record.
    pub record_duration: f64,
    pub signals: Vec<BdfSignal>,
}

impl BdfHeader {
    /// Bytes of one data record.
    pub fn record_bytes(&self) -> usize {
        self.signals.iter().map(|s| s.samples_per_record * 3).sum()
    }
}

// ── Reader ───────────────────────────────────────────────────────────────

/// An opened BDF file; samples stay on disk until read.
#[derive(Debug, Clone)]
pub struct RawBdf {
    pub header: BdfHeader,
    pub path: PathBuf,
}

/// Parse the header of a BDF file.
pub fn open_bdf<P: AsRef<Path>>(path: P) -> Result<RawBdf> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let file_len = file.metadata().with_context(|| format!("stat {}", path.display()))?.len();
    let mut reader = BufReader::new(file);
    let mut header = read_header(&mut reader).with_context(|| format!("parse BDF header of {}", path.display()))?;

    let spr = header.signals[0].samples_per_record;
    if let Some(odd) = header.signals.iter().find(|s| s.samples_per_record != spr) {
        bail!(
            "{}: channel '{}' has {} samples per record, expected {spr}; mixed sampling rates are not supported",
            path.display(),
            odd.label,
            odd.samples_per_record
        );
    }

    let available = (file_len.saturating_sub(header.header_bytes as u64) / header.record_bytes() as u64) as usize;
    if header.n_records == 0 || header.n_records > available {
        if header.n_records > available {
            log::warn!(
                "{}: header declares {} records but only {available} are stored",
                path.display(),
                header.n_records
            );
        }
        header.n_records = available;
    }

    log::debug!(
        "BDF header parsed: {} signals, {} records of {} s, {} Hz",
        header.signals.len(),
        header.n_records,
        header.record_duration,
        spr as f64 / header.record_duration
    );
    Ok(RawBdf { header, path: path.to_path_buf() })
}

impl RawBdf {
    pub fn sfreq(&self) -> f64 {
        self.header.signals[0].samples_per_record as f64 / self.header.record_duration
    }

    pub fn n_times(&self) -> usize {
        self.header.n_records * self.header.signals[0].samples_per_record
    }

    pub fn ch_names(&self) -> Vec<String> {
        self.header.signals.iter().map(|s| s.label.clone()).collect()
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.header.signals.iter().position(|s| s.label == name)
    }

    /// Recording start, taken as UTC.
    pub fn meas_date(&self) -> DateTime<Utc> {
        self.header.start.and_utc()
    }

    /// Digital values `[n_chan, n_times]`.
    pub fn read_digital_all(&self) -> Result<Array2<i32>> {
        let n_ch = self.header.signals.len();
        let spr = self.header.signals[0].samples_per_record;
        let mut out = Array2::<i32>::zeros((n_ch, self.n_times()));

        let file = File::open(&self.path).with_context(|| format!("open {}", self.path.display()))?;
        let mut reader = BufReader::new(file);
        reader
            .seek(SeekFrom::Start(self.header.header_bytes as u64))
            .with_context(|| format!("seek to data in {}", self.path.display()))?;

        let mut record = vec![0u8; self.header.record_bytes()];
        for r in 0..self.header.n_records {
            reader
                .read_exact(&mut record)
                .with_context(|| format!("read record {r} of {}", self.path.display()))?;
            for (c, chunk) in record.chunks_exact(spr * 3).enumerate() {
                for (i, b) in chunk.chunks_exact(3).enumerate() {
                    out[[c, r * spr + i]] = i24_le(b[0], b[1], b[2]);
                }
            }
        }
        Ok(out)
    }

    /// Digital values of one channel, reading only that channel's bytes.
    pub fn read_digital(&self, name: &str) -> Result<Vec<i32>> {
        let ch = self
            .channel_index(name)
            .ok_or_else(|| anyhow!("channel '{name}' not found in {}", self.path.display()))?;
        let spr = self.header.signals[0].samples_per_record;
        let record_bytes = self.header.record_bytes() as u64;
        let start = self.header.header_bytes as u64 + (ch * spr * 3) as u64;

        let file = File::open(&self.path).with_context(|| format!("open {}", self.path.display()))?;
        let mut reader = BufReader::new(file);
        let mut chunk = vec![0u8; spr * 3];
        let mut out = Vec::with_capacity(self.n_times());
        for r in 0..self.header.n_records as u64 {
            reader
                .seek(SeekFrom::Start(start + r * record_bytes))
                .with_context(|| format!("seek to record {r} of {}", self.path.display()))?;
            reader
                .read_exact(&mut chunk)
                .with_context(|| format!("read record {r} of {}", self.path.display()))?;
            out.extend(chunk.chunks_exact(3).map(|b| i24_le(b[0], b[1], b[2])));
        }
        Ok(out)
    }

    /// All channels `[n_chan, n_times]`: volts for data channels, digital
    /// values for `Status`.
    pub fn read_all_data(&self) -> Result<Array2<f64>> {
        let digital = self.read_digital_all()?;
        let mut out = digital.mapv(f64::from);
        for (sig, mut row) in self.header.signals.iter().zip(out.rows_mut()) {
            if sig.is_status() {
                continue;
            }
            let (gain, offset, scale) = (sig.gain(), sig.offset(), sig.unit_scale());
            row.mapv_inplace(|d| (gain * d + offset) * scale);
        }
        Ok(out)
    }
}

/// Sign-extend a little-endian 24-bit sample.
#[inline]
pub fn i24_le(b0: u8, b1: u8, b2: u8) -> i32 {
    i32::from_le_bytes([0, b0, b1, b2]) >> 8
}

// ── Header parsing ───────────────────────────────────────────────────────

fn read_header<R: Read>(reader: &mut R) -> Result<BdfHeader> {
    let mut version = [0u8; 8];
    reader.read_exact(&mut version).context("read version field")?;
    if &version != BDF_MAGIC {
        bail!("not a BioSemi BDF file (version field {:?})", String::from_utf8_lossy(&version));
    }
    let patient = field(reader, 80)?;
    let recording = field(reader, 80)?;
    let start_date = field(reader, 8)?;
    let start_time = field(reader, 8)?;
    let header_bytes: usize = parse(&field(reader, 8)?, "header bytes")?;
    let _reserved = field(reader, 44)?;
    let n_records: i64 = parse(&field(reader, 8)?, "number of records")?;
    let record_duration: f64 = parse(&field(reader, 8)?, "record duration")?;
    let n_signals: usize = parse(&field(reader, 4)?, "number of signals")?;

    ensure!(n_signals > 0, "BDF file has no signals");
    ensure!(record_duration > 0.0, "record duration must be positive, got {record_duration}");
    ensure!(
        header_bytes == 256 * (n_signals + 1),
        "header size {header_bytes} does not match {n_signals} signals"
    );

    let labels = fields(reader, n_signals, 16)?;
    let transducers = fields(reader, n_signals, 80)?;
    let units = fields(reader, n_signals, 8)?;
    let physical_min: Vec<f64> = parsed(reader, n_signals, 8, "physical minimum")?;
    let physical_max: Vec<f64> = parsed(reader, n_signals, 8, "physical maximum")?;
    let digital_min: Vec<i64> = parsed(reader, n_signals, 8, "digital minimum")?;
    let digital_max: Vec<i64> = parsed(reader, n_signals, 8, "digital maximum")?;
    let prefilters = fields(reader, n_signals, 80)?;
    let spr: Vec<usize> = parsed(reader, n_signals, 8, "samples per record")?;
    let _reserved = fields(reader, n_signals, 32)?;

    let mut signals = Vec::with_capacity(n_signals);
    for i in 0..n_signals {
        let sig = BdfSignal {
            label: labels[i].clone(),
            transducer: transducers[i].clone(),
            unit: units[i].clone(),
            physical_min: physical_min[i],
            physical_max: physical_max[i],
            digital_min: digital_min[i],
            digital_max: digital_max[i],
            prefilter: prefilters[i].clone(),
            samples_per_record: spr[i],
        };
        ensure!(sig.digital_max != sig.digital_min, "channel '{}' has an empty digital range", sig.label);
        ensure!(sig.samples_per_record > 0, "channel '{}' has no samples per record", sig.label);
        signals.push(sig);
    }

    Ok(BdfHeader {
        patient,
        recording,
        start: parse_start(&start_date, &start_time)?,
        header_bytes,
        n_records: n_records.max(0) as usize,
        record_duration,
        signals,
    })
}

/// `dd.mm.yy` + `hh.mm.ss`; two-digit years from 85 on are 19xx.
pub fn parse_start(date: &str, time: &str) -> Result<NaiveDateTime> {
    let nums = |s: &str, what: &str| -> Result<[u32; 3]> {
        let parts: Vec<u32> = s
            .split('.')
            .map(|p| p.trim().parse::<u32>())
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("invalid {what} '{s}'"))?;
        match parts[..] {
            [a, b, c] => Ok([a, b, c]),
            _ => bail!("invalid {what} '{s}'"),
        }
    };
    let [day, month, yy] = nums(date, "start date")?;
    let [h, m, s] = nums(time, "start time")?;
    let year = if yy >= 85 { 1900 + yy } else { 2000 + yy };
    let d = NaiveDate::from_ymd_opt(year as i32, month, day)
        .ok_or_else(|| anyhow!("invalid start date '{date}'"))?;
    let t = NaiveTime::from_hms_opt(h, m, s).ok_or_else(|| anyhow!("invalid start time '{time}'"))?;
    Ok(d.and_time(t))
}

fn field<R: Read>(reader: &mut R, len: usize) -> Result<String> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).context("BDF header truncated")?;
    Ok(String::from_utf8_lossy(&buf).trim().to_string())
}

fn fields<R: Read>(reader: &mut R, n: usize, len: usize) -> Result<Vec<String>> {
    (0..n).map(|_| field(reader, len)).collect()
}

fn parse<T: std::str::FromStr>(s: &str, what: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    s.parse::<T>().with_context(|| format!("invalid {what} '{s}'"))
}

fn parsed<R: Read, T: std::str::FromStr>(reader: &mut R, n: usize, len: usize, what: &str) -> Result<Vec<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    (0..n).map(|_| parse(&field(reader, len)?, what)).collect()
}
