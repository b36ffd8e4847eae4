//! Safetensors I/O for epochs.
//!
//! File layout: `u64` little-endian header length, a JSON header mapping
//! tensor names to `{dtype, shape, data_offsets}` (plus an optional
//! `__metadata__` string map), padded with spaces to 8 bytes, then the
//! concatenated little-endian tensor bytes.
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use serde_json::{json, Value};

use crate::epoch::Epochs;

// ── Writer ────────────────────────────────────────────────────────────────────

/// Safetensors writer for F32, F64 and I32 tensors.
///
/// ```rust,no_run
/// use dpx::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f32("data", &[1.0f32, 2.0, 3.0], &[1, 3]);
/// w.add_metadata("sfreq", "128");
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
    metadata: BTreeMap<String, String>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f64(&mut self, name: &str, data: &[f64], shape: &[usize]) {
        let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F64", shape.to_vec()));
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    /// Free-form string entry of the `__metadata__` map.
    pub fn add_metadata(&mut self, key: &str, value: impl Into<String>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut header = serde_json::Map::new();
        if !self.metadata.is_empty() {
            header.insert("__metadata__".into(), json!(self.metadata));
        }
        let mut offset = 0usize;
        for (name, data, dtype, shape) in &self.entries {
            header.insert(
                name.clone(),
                json!({
                    "dtype": dtype,
                    "shape": shape,
                    "data_offsets": [offset, offset + data.len()],
                }),
            );
            offset += data.len();
        }
        let mut hdr = serde_json::to_vec(&header)?;
        let pad = (8 - hdr.len() % 8) % 8;
        hdr.extend(std::iter::repeat(b' ').take(pad));

        let mut f = std::fs::File::create(path).with_context(|| format!("create {}", path.display()))?;
        f.write_all(&(hdr.len() as u64).to_le_bytes())?;
        f.write_all(&hdr)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        f.flush().with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}

// ── Reader ────────────────────────────────────────────────────────────────────

/// A safetensors file held in memory.
#[derive(Debug)]
pub struct StFile {
    header: serde_json::Map<String, Value>,
    bytes: Vec<u8>,
    data_start: usize,
}

impl StFile {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let len: [u8; 8] = bytes
            .get(..8)
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| anyhow!("{}: safetensors file too small", path.display()))?;
        let n = u64::from_le_bytes(len) as usize;
        let raw = bytes
            .get(8..8 + n)
            .ok_or_else(|| anyhow!("{}: truncated safetensors header", path.display()))?;
        let header = serde_json::from_slice(raw)
            .with_context(|| format!("{}: failed to parse safetensors header", path.display()))?;
        Ok(Self { header, bytes, data_start: 8 + n })
    }

    /// `__metadata__` entry.
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.header.get("__metadata__")?.get(key)?.as_str()
    }

    pub fn shape(&self, name: &str) -> Result<Vec<usize>> {
        let entry = self.entry(name)?;
        entry["shape"]
            .as_array()
            .ok_or_else(|| anyhow!("tensor '{name}' has no shape"))?
            .iter()
            .map(|v| v.as_u64().map(|d| d as usize).ok_or_else(|| anyhow!("bad shape of '{name}'")))
            .collect()
    }

    pub fn f32s(&self, name: &str) -> Result<Vec<f32>> {
        Ok(self.raw(name, "F32")?.chunks_exact(4).map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])).collect())
    }

    pub fn f64s(&self, name: &str) -> Result<Vec<f64>> {
        Ok(self
            .raw(name, "F64")?
            .chunks_exact(8)
            .map(|b| f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
            .collect())
    }

    pub fn i32s(&self, name: &str) -> Result<Vec<i32>> {
        Ok(self.raw(name, "I32")?.chunks_exact(4).map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]])).collect())
    }

    fn entry(&self, name: &str) -> Result<&Value> {
        self.header.get(name).ok_or_else(|| anyhow!("missing tensor '{name}'"))
    }

    fn raw(&self, name: &str, dtype: &str) -> Result<&[u8]> {
        let entry = self.entry(name)?;
        if entry["dtype"] != dtype {
            bail!("tensor '{name}' is {}, expected {dtype}", entry["dtype"]);
        }
        let off = |i: usize| {
            entry["data_offsets"][i]
                .as_u64()
                .map(|v| self.data_start + v as usize)
                .ok_or_else(|| anyhow!("bad data_offsets of '{name}'"))
        };
        let (s, e) = (off(0)?, off(1)?);
        self.bytes.get(s..e).ok_or_else(|| anyhow!("tensor '{name}' runs past end of file"))
    }
}

// ── Epochs ────────────────────────────────────────────────────────────────────

/// Write epochs as `data` `[E, C, T]` F32, `times` F64, `selection` I32,
/// `events` I32 `[E, 3]` (sample, 0, code) and string metadata.
pub fn write_epochs(epochs: &Epochs, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let (n_e, n_c, n_t) = epochs.data.dim();
    let mut w = StWriter::new();
    let data: Vec<f32> = epochs.data.iter().copied().collect();
    w.add_f32("data", &data, &[n_e, n_c, n_t]);
    w.add_f64("times", &epochs.times, &[n_t]);
    let selection: Vec<i32> = epochs.selection.iter().map(|&s| s as i32).collect();
    w.add_i32("selection", &selection, &[n_e]);
    let events: Vec<i32> = epochs
        .events
        .iter()
        .flat_map(|m| [m.sample as i32, 0, m.code])
        .collect();
    w.add_i32("events", &events, &[n_e, 3]);

    w.add_metadata("ch_names", serde_json::to_string(&epochs.ch_names)?);
    w.add_metadata("sfreq", epochs.sfreq.to_string());
    w.add_metadata("tmin", epochs.tmin().to_string());
    w.add_metadata("decim", epochs.decim.to_string());
    w.add_metadata("event_id", serde_json::to_string(&epochs.event_id)?);
    w.add_metadata("metadata", serde_json::to_string(&epochs.metadata)?);
    w.write(path)?;

    log::info!("wrote {} epochs to {}", n_e, path.display());
    Ok(())
}
