/// All three stages on a temporary study.
mod common;

use common::{dpx_session, marker_name, BdfFixture, FifFixture, Study};
use dpx::io::StFile;
use dpx::{layout, stages};

const EEG: [&str; 4] = ["Fp1", "Fz", "Cz", "Pz"];

fn prepared_study() -> Study {
    let study = Study::new();
    study.add_source(1, &BdfFixture::with_triggers(&EEG, 256, 70, &dpx_session()), 24, 2);
    stages::setup_derivatives(&study.cfg).unwrap();
    study
}

#[test]
fn setup_creates_tree_once() {
    let study = Study::new();
    let created = stages::setup_derivatives(&study.cfg).unwrap();
    assert_eq!(created.len(), 5);
    assert!(study.data().join("derivatives/preprocessing/bad_channels").is_dir());
    let err = stages::setup_derivatives(&study.cfg).unwrap_err().to_string();
    assert!(err.starts_with("The derivatives directory is already there"), "{err}");
}

#[test]
fn bids_to_epochs() {
    let study = prepared_study();
    stages::data_to_bids(&study.cfg, 1, false).unwrap();
    let epochs = stages::extract_epochs(&study.cfg, 1, false).unwrap();

    assert_eq!(epochs.len(), 6);
    assert_eq!(epochs.ch_names, EEG.to_vec());
    assert_eq!(epochs.selection, vec![0, 1, 2, 3, 4, 5]);
    let codes: Vec<i32> = epochs.events.iter().map(|m| m.code).collect();
    assert_eq!(codes, vec![122, 131, 118, 137, 122, 122]);

    let derivatives = &study.cfg.paths.derivatives;
    let rt = std::fs::read_to_string(layout::rt_table(derivatives, 1)).unwrap();
    assert_eq!(rt.lines().count(), 7);
    assert!(rt.lines().all(|l| l.ends_with("\t1") || l.ends_with("subject")));

    let st = StFile::load(&layout::epochs_file(derivatives, 1)).unwrap();
    assert_eq!(st.shape("data").unwrap(), vec![6, 4, 897]);
    assert_eq!(st.metadata("decim"), Some("2"));
    assert_eq!(st.metadata("sfreq"), Some("128"));
    assert_eq!(st.i32s("selection").unwrap(), vec![0, 1, 2, 3, 4, 5]);
    let events = st.i32s("events").unwrap();
    assert_eq!(&events[..3], &[768, 0, 122]);

    let event_id: serde_json::Value = serde_json::from_str(st.metadata("event_id").unwrap()).unwrap();
    assert_eq!(event_id["Missed B"], 137);
    let metadata: serde_json::Value = serde_json::from_str(st.metadata("metadata").unwrap()).unwrap();
    assert_eq!(metadata[2]["reaction_cues"], "Too_soon");
    assert!(metadata[2]["rt"].is_null());
    assert_eq!(metadata[3]["block"], 1);

    let err = stages::extract_epochs(&study.cfg, 1, false).unwrap_err().to_string();
    assert!(err.contains("already exists"), "{err}");
    assert!(stages::extract_epochs(&study.cfg, 1, true).is_ok());
}

#[test]
fn preprocessed_fif_is_preferred() {
    let study = prepared_study();
    let sfreq = 256.0;
    let mut fx = FifFixture::eeg(&["Fz", "Cz", "Pz"], sfreq, 70 * 256);
    fx.buffer = 2560;
    fx.annotations = dpx_session()
        .into_iter()
        .map(|(sec, code)| {
            let name = if code == common::codes::PAUSE_RECORD { "EDGE boundary" } else { marker_name(code) };
            (sec as f32, 0.0, name.to_string())
        })
        .collect();
    // Overlaps the window of the cue at 53 s.
    fx.annotations.push((57.0, 1.0, "BAD_muscle".into()));
    fx.write(&layout::preprocessed_fif(&study.cfg.paths.derivatives, 1));

    let epochs = stages::extract_epochs(&study.cfg, 1, false).unwrap();
    assert_eq!(epochs.ch_names, vec!["Fz", "Cz", "Pz"]);
    assert_eq!(epochs.selection, vec![0, 1, 2, 3, 5]);
    assert_eq!(epochs.drop_log, vec![(4, dpx::DropReason::BadSegment)]);
    assert_eq!(epochs.metadata[3].block, 1);
}

#[test]
fn extract_requires_derivatives_and_recording() {
    let study = Study::new();
    let err = stages::extract_epochs(&study.cfg, 1, false).unwrap_err().to_string();
    assert!(err.contains("`derivatives`"), "{err}");

    stages::setup_derivatives(&study.cfg).unwrap();
    let err = stages::extract_epochs(&study.cfg, 1, false).unwrap_err().to_string();
    assert!(err.starts_with("no recording for subject 1"), "{err}");

    assert!(stages::extract_epochs(&study.cfg, 9, false).is_err());
}
