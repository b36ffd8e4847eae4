//! FIFF block tree.
//!
//! Tags are grouped into nested blocks delimited by `FIFF_BLOCK_START` /
//! `FIFF_BLOCK_END`.  The flat tag list comes either from the directory
//! embedded near the end of the file or, when that is missing, from walking
//! the `next` chain from offset 0.
use std::io::{Read, Seek};

use anyhow::{bail, Result};

use super::constants::*;
use super::tag::{FifReader, Tag};

/// One block of the tree.  The root has kind 0.
#[derive(Debug, Default, Clone)]
pub struct Block {
    pub kind: i32,
    /// Non-structural tags directly inside this block.
    pub tags: Vec<Tag>,
    pub children: Vec<Block>,
}

impl Block {
    /// Depth-first search for the first block of `kind` (self included).
    pub fn find_block(&self, kind: i32) -> Option<&Block> {
        if self.kind == kind {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_block(kind))
    }

    /// First tag of `kind` directly inside this block.
    pub fn find_tag(&self, kind: i32) -> Option<&Tag> {
        self.tags.iter().find(|t| t.kind == kind)
    }
}

impl<R: Read + Seek> FifReader<R> {
    /// Flat tag list of the file.
    pub fn load_directory(&mut self) -> Result<Vec<Tag>> {
        let id = self.header(0)?;
        if id.kind != FIFF_FILE_ID {
            bail!("not a FIFF file: first tag kind is {}, expected {FIFF_FILE_ID}", id.kind);
        }
        match self.embedded_directory(&id)? {
            Some(dir) => Ok(dir),
            None => self.scan_directory(),
        }
    }

    /// Directory referenced by `FIFF_DIR_POINTER`, if the writer stored one.
    fn embedded_directory(&mut self, id: &Tag) -> Result<Option<Vec<Tag>>> {
        let Some(next) = id.next_pos() else { return Ok(None) };
        let ptr = self.header(next)?;
        if ptr.kind != FIFF_DIR_POINTER {
            return Ok(None);
        }
        let dirpos = self.int(&ptr)?;
        if dirpos <= 0 {
            return Ok(None);
        }
        let dir = self.header(dirpos as u64)?;
        if dir.ftype != FIFFT_DIR_ENTRY_STRUCT {
            return Ok(None);
        }
        self.directory(&dir).map(Some)
    }

    fn scan_directory(&mut self) -> Result<Vec<Tag>> {
        let mut tags = Vec::new();
        let mut pos = Some(0);
        while let Some(p) = pos {
            let tag = self.header(p)?;
            pos = tag.next_pos();
            tags.push(tag);
        }
        Ok(tags)
    }

    /// Group a flat tag list into blocks, reading each block's kind.
    pub fn read_tree(&mut self, directory: &[Tag]) -> Result<Block> {
        let mut stack = vec![Block::default()];
        for tag in directory {
            match tag.kind {
                FIFF_BLOCK_START => {
                    let kind = self.int(tag)?;
                    stack.push(Block { kind, ..Block::default() });
                }
                FIFF_BLOCK_END => {
                    if stack.len() < 2 {
                        bail!("unbalanced FIFF_BLOCK_END @ {:#x}", tag.pos);
                    }
                    if let Some(done) = stack.pop() {
                        if let Some(parent) = stack.last_mut() {
                            parent.children.push(done);
                        }
                    }
                }
                _ => {
                    if let Some(block) = stack.last_mut() {
                        block.tags.push(*tag);
                    }
                }
            }
        }
        // Unterminated blocks (truncated writes) hang off their parent.
        while stack.len() > 1 {
            if let Some(open) = stack.pop() {
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(open);
                }
            }
        }
        Ok(stack.pop().unwrap_or_default())
    }
}
