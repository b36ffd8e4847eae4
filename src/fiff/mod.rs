//! FIFF reader for raw recordings written by MNE-Python.
//!
//! ```no_run
//! use dpx::fiff::open_raw;
//!
//! let raw = open_raw("sub-001_preprocessed-raw.fif").unwrap();
//! println!("{} channels @ {} Hz", raw.info.n_chan(), raw.info.sfreq);
//! let data = raw.read_data().unwrap(); // [n_chan, n_times] f64
//! ```
pub mod annotations;
pub mod constants;
pub mod info;
pub mod raw;
pub mod tag;
pub mod tree;

pub use annotations::StoredAnnotations;
pub use info::{Channel, MeasInfo};
pub use raw::{open_raw, Buffer, RawFif};
pub use tag::{FifReader, Tag};
pub use tree::Block;
