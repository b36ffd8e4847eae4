//! Raw FIF recording reader.
//!
//! # Algorithm
//! 1. Load the tag directory (embedded directory, else a scan of the chain).
//! 2. Build the block tree.
//! 3. Read `MeasInfo` and the optional annotation block.
//! 4. Walk `FIFFB_RAW_DATA` (or `FIFFB_CONTINUOUS_DATA`) collecting data
//!    buffers; `FIFF_DATA_SKIP` gaps become zero-filled buffers.
//!
//! Samples on disk are `[n_samp, n_chan]` interleaved; the reader returns
//! `[n_chan, n_times]` calibrated with `cal × range` per channel.
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, ensure, Context, Result};
use ndarray::{s, Array2};

use super::annotations::StoredAnnotations;
use super::constants::*;
use super::info::MeasInfo;
use super::tag::{FifReader, Tag};
use crate::annotations::Annotation;

/// One stretch of samples: a stored buffer, or a skipped gap.
#[derive(Debug, Clone, Copy)]
pub enum Buffer {
    Data { tag: Tag, n_samp: usize },
    Gap { n_samp: usize },
}

impl Buffer {
    pub fn n_samp(&self) -> usize {
        match *self {
            Buffer::Data { n_samp, .. } | Buffer::Gap { n_samp } => n_samp,
        }
    }
}

/// An opened raw FIF file; data stays on disk until read.
#[derive(Debug, Clone)]
pub struct RawFif {
    pub info: MeasInfo,
    pub first_samp: i64,
    pub path: PathBuf,
    pub buffers: Vec<Buffer>,
    pub annotations: Option<StoredAnnotations>,
}

impl RawFif {
    pub fn n_times(&self) -> usize {
        self.buffers.iter().map(Buffer::n_samp).sum()
    }

    /// Annotations with onsets relative to the first sample.
    pub fn annotations(&self) -> Vec<Annotation> {
        self.annotations
            .as_ref()
            .map(|a| a.relative_to_first_sample(self.info.meas_date, self.first_samp, self.info.sfreq))
            .unwrap_or_default()
    }

    /// All channels, calibrated, `[n_chan, n_times]`.
    pub fn read_data(&self) -> Result<Array2<f64>> {
        let n_ch = self.info.n_chan();
        let cals: Vec<f64> = self.info.chs.iter().map(|c| c.calibration()).collect();
        let file = File::open(&self.path).with_context(|| format!("open {}", self.path.display()))?;
        let mut reader = FifReader::new(BufReader::new(file));

        let mut out = Array2::<f64>::zeros((n_ch, self.n_times()));
        let mut offset = 0;
        for buf in &self.buffers {
            let n = buf.n_samp();
            if let Buffer::Data { tag, .. } = buf {
                let block = read_buffer(&mut reader, tag, n, &cals)?;
                out.slice_mut(s![.., offset..offset + n]).assign(&block);
            }
            offset += n;
        }
        Ok(out)
    }
}

/// Open a raw FIF file without loading its samples.
pub fn open_raw<P: AsRef<Path>>(path: P) -> Result<RawFif> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut reader = FifReader::new(BufReader::new(file));

    let directory = reader.load_directory()?;
    let tree = reader.read_tree(&directory)?;
    let info = reader.read_meas_info(&tree)?;
    let annotations = reader.read_annotations(&tree)?;

    let meas = tree
        .find_block(FIFFB_MEAS)
        .ok_or_else(|| anyhow!("FIFFB_MEAS not found"))?;
    let data = meas
        .find_block(FIFFB_RAW_DATA)
        .or_else(|| meas.find_block(FIFFB_CONTINUOUS_DATA))
        .ok_or_else(|| anyhow!("no raw-data block in {}", path.display()))?;

    let n_chan = info.n_chan();
    ensure!(n_chan > 0, "raw file has no channels");

    let mut first_samp = match data.find_tag(FIFF_FIRST_SAMPLE) {
        Some(tag) => i64::from(reader.int(tag)?),
        None => 0,
    };
    let mut buffers = Vec::new();
    let mut pending_skip = 0usize;
    let mut leading_skip = true;

    for tag in &data.tags {
        match tag.kind {
            FIFF_DATA_SKIP => pending_skip += reader.int(tag)?.max(0) as usize,
            FIFF_DATA_BUFFER => {
                let bps = bytes_per_sample(tag.ftype)
                    .ok_or_else(|| anyhow!("unsupported buffer type {}", tag.ftype))?;
                let n_samp = tag.len() / (bps * n_chan);
                if pending_skip > 0 {
                    // A skip before the first buffer moves first_samp; later
                    // skips are gaps in the data.
                    if leading_skip {
                        first_samp += (pending_skip * n_samp) as i64;
                    } else {
                        buffers.push(Buffer::Gap { n_samp: pending_skip * n_samp });
                    }
                    pending_skip = 0;
                }
                leading_skip = false;
                buffers.push(Buffer::Data { tag: *tag, n_samp });
            }
            _ => {}
        }
    }
    if buffers.is_empty() {
        bail!("no FIFF_DATA_BUFFER tags in {}", path.display());
    }

    log::debug!(
        "{}: {} channels @ {} Hz, first_samp {}, {} buffers",
        path.display(),
        n_chan,
        info.sfreq,
        first_samp,
        buffers.len()
    );

    Ok(RawFif { info, first_samp, path: path.to_path_buf(), buffers, annotations })
}

fn read_buffer<R: Read + Seek>(
    reader: &mut FifReader<R>,
    tag: &Tag,
    n_samp: usize,
    cals: &[f64],
) -> Result<Array2<f64>> {
    let n_chan = cals.len();
    let values: Vec<f64> = match tag.ftype {
        FIFFT_FLOAT => reader.floats(tag)?.into_iter().map(f64::from).collect(),
        FIFFT_DOUBLE => reader.doubles(tag)?,
        FIFFT_INT => reader.ints(tag)?.into_iter().map(f64::from).collect(),
        FIFFT_SHORT | FIFFT_DAU_PACK16 => reader
            .payload(tag)?
            .chunks_exact(2)
            .map(|c| f64::from(i16::from_be_bytes([c[0], c[1]])))
            .collect(),
        other => bail!("unsupported buffer type {other}"),
    };
    ensure!(
        values.len() >= n_samp * n_chan,
        "data buffer @ {:#x} holds {} values, expected {}",
        tag.pos,
        values.len(),
        n_samp * n_chan
    );
    Ok(Array2::from_shape_fn((n_chan, n_samp), |(c, t)| values[t * n_chan + c] * cals[c]))
}
