/// Cue-locked segmentation: window, decimation and rejection.
use std::collections::BTreeMap;

use approx::assert_abs_diff_eq;
use dpx::epoch::{segment, DropReason};
use dpx::recording::Recording;
use dpx::{Annotation, EpochConfig, Marker, MetadataRow, RecodedCode};
use ndarray::Array2;

const SFREQ: f64 = 256.0;

/// Two channels, 20 s at 256 Hz: channel 0 is the sample index in µV,
/// channel 1 is flat.
fn recording(first_samp: i64) -> Recording {
    let n = 20 * 256;
    let data = Array2::from_shape_fn((2, n), |(c, t)| if c == 0 { (t % 100) as f32 * 1e-6 } else { 0.0 });
    Recording {
        data,
        ch_names: vec!["Fz".into(), "Cz".into()],
        sfreq: SFREQ,
        first_samp,
        annotations: Vec::new(),
        bads: Vec::new(),
    }
}

fn row(trial: usize) -> MetadataRow {
    MetadataRow {
        block: 0,
        trial,
        cue: "A",
        probe: "AX",
        run: 0,
        reaction_cues: "Correct",
        reaction_probes: "Correct",
        cond_reaction: Some("AX"),
        rt: Some(0.4),
    }
}

fn event_id() -> BTreeMap<String, i32> {
    RecodedCode::cue_event_id()
}

fn short_window() -> EpochConfig {
    EpochConfig { tmin: -0.5, tmax: 1.0, ..EpochConfig::default() }
}

#[test]
fn window_is_inclusive_and_decimated() {
    let rec = recording(0);
    let anchors = [Marker::new(1024, 122)];
    let epochs = segment(&rec, &anchors, &[row(0)], &event_id(), &EpochConfig::default()).unwrap();

    // 256 Hz → decim 2; [-2, 5] s is 1793 samples, 897 after decimation.
    assert_eq!(epochs.decim, 2);
    assert_eq!(epochs.sfreq, 128.0);
    assert_eq!(epochs.data.dim(), (1, 2, 897));
    assert_abs_diff_eq!(epochs.tmin(), -2.0, epsilon = 1e-12);
    assert_abs_diff_eq!(*epochs.times.last().unwrap(), 5.0, epsilon = 1e-12);
    assert!(epochs.times.contains(&0.0));

    // Sample at t = 0 is the anchor sample itself.
    let zero = epochs.times.iter().position(|&t| t == 0.0).unwrap();
    assert_abs_diff_eq!(epochs.data[[0, 0, zero]], (1024 % 100) as f32 * 1e-6, epsilon = 1e-12);
    assert_abs_diff_eq!(epochs.data[[0, 0, zero + 1]], (1026 % 100) as f32 * 1e-6, epsilon = 1e-12);
}

#[test]
fn edges_drop_too_short_epochs() {
    let rec = recording(1000);
    let anchors = [
        Marker::new(1000 + 100, 122),  // 0.39 s in: window starts before the data
        Marker::new(1000 + 2560, 125), // middle
        Marker::new(1000 + 5100, 128), // 20 samples before the end
    ];
    let rows = [row(0), row(3), row(4)];
    let epochs = segment(&rec, &anchors, &rows, &event_id(), &short_window()).unwrap();

    assert_eq!(epochs.len(), 1);
    assert_eq!(epochs.selection, vec![3]);
    assert_eq!(epochs.events, vec![Marker::new(3560, 125)]);
    assert_eq!(epochs.metadata[0].trial, 3);
    assert_eq!(epochs.drop_log, vec![(0, DropReason::TooShort), (4, DropReason::TooShort)]);
}

#[test]
fn bad_annotations_drop_overlapping_epochs() {
    let mut rec = recording(0);
    // 5.0 to 5.5 s.
    rec.annotations = vec![Annotation::new(5.0, 0.5, "BAD_blink"), Annotation::new(9.0, 0.0, "cue_a")];
    let anchors = [Marker::new(1024, 122), Marker::new(1536, 122), Marker::new(2560, 122)];
    let rows = [row(0), row(1), row(2)];

    let epochs = segment(&rec, &anchors, &rows, &event_id(), &short_window()).unwrap();
    // 1536 (6 s): window starts at 5.5 s, the half-open bad span ends there.
    assert_eq!(epochs.selection, vec![1, 2]);
    let drop: Vec<usize> = epochs.drop_log.iter().map(|(t, _)| *t).collect();
    assert_eq!(drop, vec![0]);

    let keep_all = EpochConfig { reject_by_annotation: false, ..short_window() };
    let epochs = segment(&rec, &anchors, &rows, &event_id(), &keep_all).unwrap();
    assert_eq!(epochs.len(), 3);
}

#[test]
fn amplitude_rejection() {
    let mut rec = recording(0);
    // Artifact on Cz around 10 s.
    for t in 2560..2570 {
        rec.data[[1, t]] = if t < 2565 { 200e-6 } else { -200e-6 };
    }
    let anchors = [Marker::new(1024, 122), Marker::new(2600, 125)];
    let rows = [row(0), row(1)];

    let epochs = segment(&rec, &anchors, &rows, &event_id(), &short_window()).unwrap();
    assert_eq!(epochs.selection, vec![0]);
    match &epochs.drop_log[0] {
        (1, DropReason::Amplitude { channel, ptp }) => {
            assert_eq!(channel, "Cz");
            assert_abs_diff_eq!(*ptp, 400e-6, epsilon = 1e-9);
        }
        other => panic!("unexpected drop {other:?}"),
    }

    let lenient = EpochConfig { reject_eeg: None, ..short_window() };
    assert_eq!(segment(&rec, &anchors, &rows, &event_id(), &lenient).unwrap().len(), 2);
}

#[test]
fn metadata_must_match_anchors() {
    let rec = recording(0);
    let anchors = [Marker::new(1024, 122), Marker::new(2048, 122)];
    assert!(segment(&rec, &anchors, &[row(0)], &event_id(), &short_window()).is_err());
}

#[test]
fn all_dropped_gives_empty_epochs() {
    let rec = recording(0);
    let anchors = [Marker::new(10, 122)];
    let epochs = segment(&rec, &anchors, &[row(0)], &event_id(), &short_window()).unwrap();
    assert!(epochs.is_empty());
    assert_eq!(epochs.data.dim(), (0, 2, 193));
}
