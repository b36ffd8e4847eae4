//! Trigger extraction from a stimulus channel.
//!
//! Matches MNE's `find_events(consecutive='increasing', output='onset',
//! min_duration=0)`: after masking, an event is emitted wherever the value
//! changes to a non-zero value that is larger than the previous one.
//! Sample 0 never produces an event.
use std::collections::BTreeMap;

use crate::markers::Marker;

/// BioSemi trigger bits live in the low 16 bits of `Status`.
pub const STATUS_MASK: i32 = 0xFFFF;

/// Onsets of increasing non-zero steps.  `first_samp` is added to every
/// sample index.
pub fn find_events(stim: &[i32], mask: i32, first_samp: i64) -> Vec<Marker> {
    let mut events = Vec::new();
    let mut prev = match stim.first() {
        Some(&v) => v & mask,
        None => return events,
    };
    for (i, &raw) in stim.iter().enumerate().skip(1) {
        let v = raw & mask;
        if v > prev && v > 0 {
            events.push(Marker::new(i as i64 + first_samp, v));
        }
        prev = v;
    }
    events
}

/// Keep only events whose code appears in `event_id`.
pub fn keep_known(events: Vec<Marker>, event_id: &BTreeMap<String, i32>) -> Vec<Marker> {
    events
        .into_iter()
        .filter(|m| event_id.values().any(|&c| c == m.code))
        .collect()
}
