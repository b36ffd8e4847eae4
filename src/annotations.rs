//! Annotations and their conversion to a marker stream.
//!
//! Onsets are stored in seconds relative to the recording's first sample,
//! whatever the source format.  [`events_from_annotations`] numbers the
//! distinct descriptions `1..=N` in sorted order, the way MNE's
//! `events_from_annotations(raw, regexp=None)` does, so the resulting codes
//! depend only on which descriptions occur.
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use crate::markers::Marker;

/// One annotated span of the recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    /// Seconds from the first sample.
    pub onset: f64,
    pub duration: f64,
    pub description: String,
}

impl Annotation {
    pub fn new(onset: f64, duration: f64, description: impl Into<String>) -> Self {
        Self { onset, duration, description: description.into() }
    }

    /// `BAD…` annotations mark segments excluded from epoching.
    pub fn is_bad(&self) -> bool {
        self.description
            .get(..3)
            .is_some_and(|p| p.eq_ignore_ascii_case("bad"))
    }
}

/// Sample index of an onset, counted from `first_samp`.
#[inline]
pub fn onset_to_sample(onset: f64, sfreq: f64, first_samp: i64) -> i64 {
    (onset * sfreq).round() as i64 + first_samp
}

/// Marker stream plus the `description → code` mapping that produced it.
///
/// Markers are stably sorted by sample, so annotations sharing a sample keep
/// their original order.
pub fn events_from_annotations(
    annotations: &[Annotation],
    sfreq: f64,
    first_samp: i64,
) -> (Vec<Marker>, BTreeMap<String, i32>) {
    let names: BTreeSet<&str> = annotations.iter().map(|a| a.description.as_str()).collect();
    let event_id: BTreeMap<String, i32> = names
        .into_iter()
        .zip(1..)
        .map(|(name, code)| (name.to_string(), code))
        .collect();

    let mut markers: Vec<Marker> = annotations
        .iter()
        .map(|a| Marker::new(onset_to_sample(a.onset, sfreq, first_samp), event_id[&a.description]))
        .collect();
    markers.sort_by_key(|m| m.sample);
    (markers, event_id)
}

/// Half-open absolute sample ranges covered by `BAD…` annotations.
///
/// Zero-length annotations still cover their onset sample.
pub fn bad_segments(annotations: &[Annotation], sfreq: f64, first_samp: i64) -> Vec<Range<i64>> {
    annotations
        .iter()
        .filter(|a| a.is_bad())
        .map(|a| {
            let start = onset_to_sample(a.onset, sfreq, first_samp);
            let len = ((a.duration * sfreq).round() as i64).max(1);
            start..start + len
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_sorted_descriptions() {
        let annots = vec![
            Annotation::new(2.0, 0.0, "probe_x"),
            Annotation::new(1.0, 0.0, "cue_a"),
            Annotation::new(3.0, 0.0, "correct_target_button"),
            Annotation::new(11.0, 0.0, "cue_a"),
        ];
        let (markers, ids) = events_from_annotations(&annots, 100.0, 0);
        assert_eq!(ids["correct_target_button"], 1);
        assert_eq!(ids["cue_a"], 2);
        assert_eq!(ids["probe_x"], 3);
        assert_eq!(
            markers,
            vec![Marker::new(100, 2), Marker::new(200, 3), Marker::new(300, 1), Marker::new(1100, 2)]
        );
    }

    #[test]
    fn first_samp_offsets_samples() {
        let annots = vec![Annotation::new(0.5, 0.0, "cue_a")];
        let (markers, _) = events_from_annotations(&annots, 256.0, 1000);
        assert_eq!(markers[0].sample, 1128);
    }

    #[test]
    fn ties_keep_input_order() {
        let annots = vec![
            Annotation::new(1.0, 0.0, "b"),
            Annotation::new(1.0, 0.0, "a"),
        ];
        let (markers, _) = events_from_annotations(&annots, 10.0, 0);
        assert_eq!(markers.iter().map(|m| m.code).collect::<Vec<_>>(), vec![2, 1]);
    }

    #[test]
    fn bad_segments_are_case_insensitive() {
        let annots = vec![
            Annotation::new(1.0, 0.5, "BAD_muscle"),
            Annotation::new(4.0, 0.0, "bad"),
            Annotation::new(6.0, 1.0, "EDGE boundary"),
            Annotation::new(7.0, 1.0, "ba"),
        ];
        let segs = bad_segments(&annots, 100.0, 10);
        assert_eq!(segs, vec![110..160, 410..411]);
    }
}
