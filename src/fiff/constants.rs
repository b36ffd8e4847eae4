//! FIFF constants used by the raw and annotation readers.
//!
//! Values follow `mne/_fiff/constants.py`.  Only the subset needed to read an
//! EEG raw file with MNE annotations is listed.
#![allow(dead_code)]

// ── Block kinds ──────────────────────────────────────────────────────────

pub const FIFFB_ROOT: i32 = 999;
pub const FIFFB_MEAS: i32 = 100;
pub const FIFFB_MEAS_INFO: i32 = 101;
pub const FIFFB_RAW_DATA: i32 = 102;
pub const FIFFB_CONTINUOUS_DATA: i32 = 112;
/// MNE annotations (onsets, end times, descriptions, orig_time).
pub const FIFFB_MNE_ANNOTATIONS: i32 = 3810;

// ── File structure tags ─────────────────────────────────────────────────

pub const FIFF_FILE_ID: i32 = 100;
pub const FIFF_DIR_POINTER: i32 = 101;
pub const FIFF_BLOCK_START: i32 = 104;
pub const FIFF_BLOCK_END: i32 = 105;

// ── Measurement info tags ───────────────────────────────────────────────

pub const FIFF_NCHAN: i32 = 200;
pub const FIFF_SFREQ: i32 = 201;
pub const FIFF_CH_INFO: i32 = 203;
/// `int[2]` (seconds, microseconds) in the info block, `double[2]` in the
/// annotation block.
pub const FIFF_MEAS_DATE: i32 = 204;
/// Colon-separated strings; MNE writes `;` for a literal `:`.
pub const FIFF_COMMENT: i32 = 206;
pub const FIFF_FIRST_SAMPLE: i32 = 208;
pub const FIFF_BAD_CHS: i32 = 220;
pub const FIFF_LINE_FREQ: i32 = 235;

// ── Raw data tags ───────────────────────────────────────────────────────

pub const FIFF_DATA_BUFFER: i32 = 300;
pub const FIFF_DATA_SKIP: i32 = 301;

// ── Annotation tags ─────────────────────────────────────────────────────

/// Annotation onsets (float32 seconds).
pub const FIFF_MNE_BASELINE_MIN: i32 = 3583;
/// Annotation end times, onset + duration (float32 seconds).
pub const FIFF_MNE_BASELINE_MAX: i32 = 3584;

// ── Data types ──────────────────────────────────────────────────────────

pub const FIFFT_SHORT: u32 = 2;
pub const FIFFT_INT: u32 = 3;
pub const FIFFT_FLOAT: u32 = 4;
pub const FIFFT_DOUBLE: u32 = 5;
pub const FIFFT_STRING: u32 = 10;
pub const FIFFT_DAU_PACK16: u32 = 16;
pub const FIFFT_CH_INFO_STRUCT: u32 = 30;
pub const FIFFT_ID_STRUCT: u32 = 31;
pub const FIFFT_DIR_ENTRY_STRUCT: u32 = 32;

// ── Tag chaining ────────────────────────────────────────────────────────

pub const FIFFV_NEXT_SEQ: i32 = 0;
pub const FIFFV_NEXT_NONE: i32 = -1;

// ── Channel kinds ───────────────────────────────────────────────────────

pub const FIFFV_EEG_CH: i32 = 2;
pub const FIFFV_STIM_CH: i32 = 3;
pub const FIFFV_EOG_CH: i32 = 202;
pub const FIFFV_MISC_CH: i32 = 502;

/// Bytes per sample for a raw-buffer data type.
pub fn bytes_per_sample(ftype: u32) -> Option<usize> {
    match ftype {
        FIFFT_SHORT | FIFFT_DAU_PACK16 => Some(2),
        FIFFT_INT | FIFFT_FLOAT => Some(4),
        FIFFT_DOUBLE => Some(8),
        _ => None,
    }
}
