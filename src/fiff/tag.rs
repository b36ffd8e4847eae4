//! FIFF tag I/O.
//!
//! Every tag is a 16-byte big-endian header followed by its payload:
//!
//! ```text
//! ┌────────────┬──────────────┬─────────────┬────────────┐
//! │ kind : i32 │ type : u32   │ size : i32  │ next : i32 │  ← 16 bytes
//! ├────────────┴──────────────┴─────────────┴────────────┤
//! │ <size bytes of payload>                              │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! `next == 0` → the next tag follows immediately, `next > 0` → absolute
//! offset of the next tag, `next == -1` → last tag.
use std::io::{Read, Seek, SeekFrom};

use anyhow::{bail, Context, Result};

use super::constants::*;

/// Tag header; the payload stays on disk until asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    pub kind: i32,
    pub ftype: u32,
    pub size: i32,
    pub next: i32,
    /// Byte offset of the header.
    pub pos: u64,
}

impl Tag {
    #[inline]
    pub fn data_pos(&self) -> u64 {
        self.pos + 16
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size.max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Offset of the following tag, `None` after the last one.
    pub fn next_pos(&self) -> Option<u64> {
        match self.next {
            FIFFV_NEXT_SEQ => Some(self.data_pos() + self.len() as u64),
            n if n > 0 => Some(n as u64),
            _ => None,
        }
    }
}

/// Seekable FIFF stream with typed payload accessors.
pub struct FifReader<R> {
    inner: R,
}

impl<R: Read + Seek> FifReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Read the header at `pos`.
    pub fn header(&mut self, pos: u64) -> Result<Tag> {
        self.inner
            .seek(SeekFrom::Start(pos))
            .with_context(|| format!("seek to tag header @ {pos:#x}"))?;
        let mut buf = [0u8; 16];
        self.inner
            .read_exact(&mut buf)
            .with_context(|| format!("read tag header @ {pos:#x}"))?;
        let w = be_words(&buf);
        Ok(Tag { kind: w[0], ftype: w[1] as u32, size: w[2], next: w[3], pos })
    }

    /// Whole payload as raw bytes.
    pub fn payload(&mut self, tag: &Tag) -> Result<Vec<u8>> {
        self.inner
            .seek(SeekFrom::Start(tag.data_pos()))
            .with_context(|| format!("seek to tag data @ {:#x}", tag.data_pos()))?;
        let mut buf = vec![0u8; tag.len()];
        self.inner
            .read_exact(&mut buf)
            .with_context(|| format!("read {} payload bytes of tag {}", tag.len(), tag.kind))?;
        Ok(buf)
    }

    pub fn int(&mut self, tag: &Tag) -> Result<i32> {
        first(self.ints(tag)?, tag)
    }

    pub fn ints(&mut self, tag: &Tag) -> Result<Vec<i32>> {
        Ok(be_words(&self.payload(tag)?))
    }

    pub fn float(&mut self, tag: &Tag) -> Result<f32> {
        first(self.floats(tag)?, tag)
    }

    pub fn floats(&mut self, tag: &Tag) -> Result<Vec<f32>> {
        Ok(self
            .payload(tag)?
            .chunks_exact(4)
            .map(|c| f32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect())
    }

    pub fn doubles(&mut self, tag: &Tag) -> Result<Vec<f64>> {
        Ok(self
            .payload(tag)?
            .chunks_exact(8)
            .map(|c| f64::from_be_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect())
    }

    /// Numeric payload widened to f64, whatever its stored type.
    pub fn numbers(&mut self, tag: &Tag) -> Result<Vec<f64>> {
        match tag.ftype {
            FIFFT_INT => Ok(self.ints(tag)?.into_iter().map(f64::from).collect()),
            FIFFT_FLOAT => Ok(self.floats(tag)?.into_iter().map(f64::from).collect()),
            FIFFT_DOUBLE => self.doubles(tag),
            other => bail!("tag {} has non-numeric type {other}", tag.kind),
        }
    }

    /// Latin-1 string payload.
    pub fn string(&mut self, tag: &Tag) -> Result<String> {
        Ok(self.payload(tag)?.into_iter().map(char::from).collect())
    }

    /// Entries of a `FIFFT_DIR_ENTRY_STRUCT` tag.  Each entry is a header
    /// whose last word is the absolute position of the tag it describes.
    pub fn directory(&mut self, tag: &Tag) -> Result<Vec<Tag>> {
        if tag.ftype != FIFFT_DIR_ENTRY_STRUCT {
            bail!("expected FIFFT_DIR_ENTRY_STRUCT, got {}", tag.ftype);
        }
        let words = self.ints(tag)?;
        Ok(words
            .chunks_exact(4)
            .map(|w| Tag {
                kind: w[0],
                ftype: w[1] as u32,
                size: w[2],
                next: FIFFV_NEXT_NONE,
                pos: w[3] as u32 as u64,
            })
            .collect())
    }
}

fn be_words(bytes: &[u8]) -> Vec<i32> {
    bytes
        .chunks_exact(4)
        .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

fn first<T: Copy>(values: Vec<T>, tag: &Tag) -> Result<T> {
    match values.first() {
        Some(&v) => Ok(v),
        None => bail!("tag {} @ {:#x} has an empty payload", tag.kind, tag.pos),
    }
}
