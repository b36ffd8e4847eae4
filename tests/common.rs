/// Shared fixtures: synthetic BDF and FIF recordings and a temporary study.
use std::path::{Path, PathBuf};

use dpx::StudyConfig;
use tempfile::TempDir;

// ── Marker codes of the shipped eeg_markers.json ─────────────────────────

#[allow(unused)]
pub mod codes {
    pub const CUE_A: i32 = 1;
    pub const CUE_B1: i32 = 2;
    pub const CUE_B3: i32 = 4;
    pub const PROBE_X: i32 = 7;
    pub const PROBE_Y1: i32 = 8;
    pub const PROBE_Y4: i32 = 11;
    pub const CORRECT_TARGET: i32 = 13;
    pub const CORRECT_NON_TARGET: i32 = 14;
    pub const INCORRECT_TARGET: i32 = 15;
    pub const INCORRECT_NON_TARGET: i32 = 16;
    pub const START_RECORD: i32 = 17;
    pub const PAUSE_RECORD: i32 = 18;
}

#[allow(unused)]
/// Name of a shipped marker code.
pub fn marker_name(code: i32) -> &'static str {
    match code {
        1 => "cue_a",
        2 => "cue_b1",
        4 => "cue_b3",
        7 => "probe_x",
        8 => "probe_y1",
        11 => "probe_y4",
        13 => "correct_target_button",
        14 => "correct_non_target_button",
        15 => "incorrect_target_button",
        16 => "incorrect_non_target_button",
        17 => "start_record",
        18 => "pause_record",
        _ => "unknown",
    }
}

#[allow(unused)]
/// A short DPX session as `(seconds, code)` pairs, 10 s per trial:
///
/// | trial | block | kind                 |
/// |-------|-------|----------------------|
/// | 0     | 0     | correct AX, rt 0.5   |
/// | 1     | 0     | incorrect BY, rt 0.6 |
/// | 2     | 0     | too-soon A, probe X  |
/// | 3     | 1     | missed BX            |
/// | 4     | 1     | correct AY, rt 0.4   |
/// | 5     | 1     | correct AY, rt 0.5   |
///
/// `pause_record` at 33 s separates the blocks.
pub fn dpx_session() -> Vec<(f64, i32)> {
    use codes::*;
    vec![
        (1.0, START_RECORD),
        (3.0, CUE_A),
        (5.0, PROBE_X),
        (5.5, CORRECT_TARGET),
        (13.0, CUE_B1),
        (15.0, PROBE_Y1),
        (15.6, INCORRECT_TARGET),
        (23.0, CUE_A),
        (23.5, INCORRECT_TARGET),
        (25.0, PROBE_X),
        (33.0, PAUSE_RECORD),
        (43.0, CUE_B3),
        (45.0, PROBE_X),
        (53.0, CUE_A),
        (55.0, PROBE_Y4),
        (55.4, CORRECT_NON_TARGET),
        (63.0, CUE_A),
        (65.0, PROBE_Y1),
        (65.5, CORRECT_NON_TARGET),
    ]
}

// ── BDF writer ───────────────────────────────────────────────────────────

/// Synthetic BioSemi file: one-second records, physical ±1000 µV over
/// digital ±2000 (0.5 µV per step) for data channels.
#[allow(unused)]
pub struct BdfFixture {
    pub labels: Vec<String>,
    pub sfreq: usize,
    /// Digital samples per channel, all of equal length (a multiple of
    /// `sfreq`).
    pub digital: Vec<Vec<i32>>,
    /// `dd.mm.yy`.
    pub date: String,
    /// `hh.mm.ss`.
    pub time: String,
}

#[allow(unused)]
impl BdfFixture {
    /// EEG channels with a small sine, `EXG1`, and `Status` carrying the
    /// given `(seconds, code)` triggers as 5-sample pulses.
    pub fn with_triggers(eeg: &[&str], sfreq: usize, seconds: usize, triggers: &[(f64, i32)]) -> Self {
        let n = sfreq * seconds;
        let mut labels: Vec<String> = eeg.iter().map(|s| s.to_string()).collect();
        labels.push("EXG1".into());
        labels.push("Status".into());

        let mut digital: Vec<Vec<i32>> = (0..eeg.len())
            .map(|c| {
                (0..n)
                    .map(|t| (40.0 * (t as f64 * 0.05 + c as f64).sin()).round() as i32)
                    .collect()
            })
            .collect();
        digital.push(vec![0; n]);

        let mut status = vec![0i32; n];
        for &(sec, code) in triggers {
            let at = (sec * sfreq as f64).round() as usize;
            for s in status.iter_mut().skip(at).take(5) {
                // High bits carry BioSemi status flags, masked off on read.
                *s = code | 0x10_0000;
            }
        }
        digital.push(status);

        Self { labels, sfreq, digital, date: "03.11.21".into(), time: "14.05.09".into() }
    }

    pub fn write(&self, path: &Path) {
        let n_sig = self.labels.len();
        let n_times = self.digital[0].len();
        assert_eq!(n_times % self.sfreq, 0);
        let n_records = n_times / self.sfreq;

        let mut h = Vec::new();
        let put = |s: &str, len: usize, h: &mut Vec<u8>| {
            let mut b = s.as_bytes().to_vec();
            b.resize(len, b' ');
            h.extend_from_slice(&b[..len]);
        };
        h.push(0xff);
        put("BIOSEMI", 7, &mut h);
        put("X X X X", 80, &mut h);
        put("Startdate 03-NOV-2021 X X BioSemi", 80, &mut h);
        put(&self.date, 8, &mut h);
        put(&self.time, 8, &mut h);
        put(&(256 * (n_sig + 1)).to_string(), 8, &mut h);
        put("24BIT", 44, &mut h);
        put(&n_records.to_string(), 8, &mut h);
        put("1", 8, &mut h);
        put(&n_sig.to_string(), 4, &mut h);

        let status = |l: &String| l == "Status";
        for l in &self.labels {
            put(l, 16, &mut h);
        }
        for l in &self.labels {
            put(if status(l) { "Triggers and Status" } else { "Active Electrode" }, 80, &mut h);
        }
        for l in &self.labels {
            put(if status(l) { "Boolean" } else { "uV" }, 8, &mut h);
        }
        for l in &self.labels {
            put(if status(l) { "-8388608" } else { "-1000" }, 8, &mut h);
        }
        for l in &self.labels {
            put(if status(l) { "8388607" } else { "1000" }, 8, &mut h);
        }
        for l in &self.labels {
            put(if status(l) { "-8388608" } else { "-2000" }, 8, &mut h);
        }
        for l in &self.labels {
            put(if status(l) { "8388607" } else { "2000" }, 8, &mut h);
        }
        for _ in &self.labels {
            put("HP:DC; LP:417 Hz", 80, &mut h);
        }
        for _ in &self.labels {
            put(&self.sfreq.to_string(), 8, &mut h);
        }
        for _ in &self.labels {
            put("", 32, &mut h);
        }
        assert_eq!(h.len(), 256 * (n_sig + 1));

        for r in 0..n_records {
            for ch in &self.digital {
                for &v in &ch[r * self.sfreq..(r + 1) * self.sfreq] {
                    h.extend_from_slice(&v.to_le_bytes()[..3]);
                }
            }
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, h).unwrap();
    }
}

// ── FIF writer ───────────────────────────────────────────────────────────

#[allow(unused)]
pub mod fif {
    pub const FIFFB_MEAS: i32 = 100;
    pub const FIFFB_MEAS_INFO: i32 = 101;
    pub const FIFFB_RAW_DATA: i32 = 102;
    pub const FIFFB_MNE_ANNOTATIONS: i32 = 3810;
    pub const FIFF_FILE_ID: i32 = 100;
    pub const FIFF_DIR_POINTER: i32 = 101;
    pub const FIFF_BLOCK_START: i32 = 104;
    pub const FIFF_BLOCK_END: i32 = 105;
    pub const FIFF_NCHAN: i32 = 200;
    pub const FIFF_SFREQ: i32 = 201;
    pub const FIFF_CH_INFO: i32 = 203;
    pub const FIFF_MEAS_DATE: i32 = 204;
    pub const FIFF_COMMENT: i32 = 206;
    pub const FIFF_FIRST_SAMPLE: i32 = 208;
    pub const FIFF_BAD_CHS: i32 = 220;
    pub const FIFF_DATA_BUFFER: i32 = 300;
    pub const FIFF_DATA_SKIP: i32 = 301;
    pub const FIFF_MNE_BASELINE_MIN: i32 = 3583;
    pub const FIFF_MNE_BASELINE_MAX: i32 = 3584;
    pub const FIFFT_INT: u32 = 3;
    pub const FIFFT_FLOAT: u32 = 4;
    pub const FIFFT_DOUBLE: u32 = 5;
    pub const FIFFT_STRING: u32 = 10;
    pub const FIFFT_CH_INFO_STRUCT: u32 = 30;
    pub const FIFFT_ID_STRUCT: u32 = 31;
    pub const FIFFV_EEG_CH: i32 = 2;
    pub const FIFFV_STIM_CH: i32 = 3;
}

/// Sequentially chained FIFF tags (`next = 0`, last tag `next = -1`), no
/// embedded directory.
#[derive(Default)]
pub struct FifWriter {
    buf: Vec<u8>,
    last: Option<usize>,
}

#[allow(unused)]
impl FifWriter {
    pub fn tag(&mut self, kind: i32, ftype: u32, payload: &[u8]) -> &mut Self {
        self.last = Some(self.buf.len());
        for w in [kind, ftype as i32, payload.len() as i32, 0] {
            self.buf.extend_from_slice(&w.to_be_bytes());
        }
        self.buf.extend_from_slice(payload);
        self
    }

    pub fn int(&mut self, kind: i32, v: i32) -> &mut Self {
        self.tag(kind, fif::FIFFT_INT, &v.to_be_bytes())
    }

    pub fn ints(&mut self, kind: i32, v: &[i32]) -> &mut Self {
        let bytes: Vec<u8> = v.iter().flat_map(|x| x.to_be_bytes()).collect();
        self.tag(kind, fif::FIFFT_INT, &bytes)
    }

    pub fn floats(&mut self, kind: i32, v: &[f32]) -> &mut Self {
        let bytes: Vec<u8> = v.iter().flat_map(|x| x.to_be_bytes()).collect();
        self.tag(kind, fif::FIFFT_FLOAT, &bytes)
    }

    pub fn doubles(&mut self, kind: i32, v: &[f64]) -> &mut Self {
        let bytes: Vec<u8> = v.iter().flat_map(|x| x.to_be_bytes()).collect();
        self.tag(kind, fif::FIFFT_DOUBLE, &bytes)
    }

    pub fn string(&mut self, kind: i32, s: &str) -> &mut Self {
        self.tag(kind, fif::FIFFT_STRING, s.as_bytes())
    }

    pub fn start(&mut self, block: i32) -> &mut Self {
        self.int(fif::FIFF_BLOCK_START, block)
    }

    pub fn end(&mut self, block: i32) -> &mut Self {
        self.int(fif::FIFF_BLOCK_END, block)
    }

    pub fn finish(mut self) -> Vec<u8> {
        if let Some(at) = self.last {
            self.buf[at + 12..at + 16].copy_from_slice(&(-1i32).to_be_bytes());
        }
        self.buf
    }
}

/// 96-byte `ch_info` struct.
#[allow(unused)]
pub fn ch_info(name: &str, kind: i32, cal: f32) -> Vec<u8> {
    let mut raw = vec![0u8; 96];
    raw[8..12].copy_from_slice(&kind.to_be_bytes());
    raw[12..16].copy_from_slice(&1f32.to_be_bytes());
    raw[16..20].copy_from_slice(&cal.to_be_bytes());
    raw[72..76].copy_from_slice(&107i32.to_be_bytes()); // volts
    let n = name.len().min(15);
    raw[80..80 + n].copy_from_slice(&name.as_bytes()[..n]);
    raw
}

/// Raw FIF recording as MNE writes it after preprocessing.
#[allow(unused)]
pub struct FifFixture {
    pub sfreq: f32,
    /// `(name, kind)` per channel.
    pub chs: Vec<(String, i32)>,
    /// `[C][T]` values in volts.
    pub data: Vec<Vec<f32>>,
    pub first_samp: i32,
    pub bads: Vec<String>,
    /// Measurement date `(seconds, microseconds)`.
    pub meas_date: (i32, i32),
    /// `(onset, duration, description)`; onsets follow `orig_time`.
    pub annotations: Vec<(f32, f32, String)>,
    /// `orig_time` of the annotations; `None` leaves onsets relative to the
    /// first sample.
    pub orig_time: Option<(f64, f64)>,
    /// Samples per data buffer.
    pub buffer: usize,
}

#[allow(unused)]
impl FifFixture {
    /// EEG channels with a small sine in volts; no annotations.
    pub fn eeg(names: &[&str], sfreq: f32, n_times: usize) -> Self {
        let data = (0..names.len())
            .map(|c| {
                (0..n_times)
                    .map(|t| 20e-6 * ((t as f32) * 0.05 + c as f32).sin())
                    .collect()
            })
            .collect();
        Self {
            sfreq,
            chs: names.iter().map(|n| (n.to_string(), fif::FIFFV_EEG_CH)).collect(),
            data,
            first_samp: 0,
            bads: Vec::new(),
            meas_date: (1_635_948_309, 0),
            annotations: Vec::new(),
            orig_time: None,
            buffer: 100,
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        use fif::*;
        let mut w = FifWriter::default();
        w.tag(FIFF_FILE_ID, FIFFT_ID_STRUCT, &[0u8; 20]);
        w.int(FIFF_DIR_POINTER, -1);

        w.start(FIFFB_MEAS);
        w.start(FIFFB_MEAS_INFO);
        w.int(FIFF_NCHAN, self.chs.len() as i32);
        w.floats(FIFF_SFREQ, &[self.sfreq]);
        w.ints(FIFF_MEAS_DATE, &[self.meas_date.0, self.meas_date.1]);
        if !self.bads.is_empty() {
            w.string(FIFF_BAD_CHS, &self.bads.join(":"));
        }
        for (name, kind) in &self.chs {
            w.tag(FIFF_CH_INFO, FIFFT_CH_INFO_STRUCT, &ch_info(name, *kind, 1.0));
        }
        w.end(FIFFB_MEAS_INFO);

        if !self.annotations.is_empty() {
            w.start(FIFFB_MNE_ANNOTATIONS);
            let onsets: Vec<f32> = self.annotations.iter().map(|a| a.0).collect();
            let ends: Vec<f32> = self.annotations.iter().map(|a| a.0 + a.1).collect();
            let desc: Vec<String> = self.annotations.iter().map(|a| a.2.replace(':', ";")).collect();
            w.floats(FIFF_MNE_BASELINE_MIN, &onsets);
            w.floats(FIFF_MNE_BASELINE_MAX, &ends);
            w.string(FIFF_COMMENT, &desc.join(":"));
            if let Some((s, us)) = self.orig_time {
                w.doubles(FIFF_MEAS_DATE, &[s, us]);
            }
            w.end(FIFFB_MNE_ANNOTATIONS);
        }

        w.start(FIFFB_RAW_DATA);
        w.int(FIFF_FIRST_SAMPLE, self.first_samp);
        let n_times = self.data[0].len();
        let mut t0 = 0;
        while t0 < n_times {
            let t1 = (t0 + self.buffer).min(n_times);
            let mut interleaved = Vec::with_capacity((t1 - t0) * self.chs.len());
            for t in t0..t1 {
                for ch in &self.data {
                    interleaved.push(ch[t]);
                }
            }
            w.floats(FIFF_DATA_BUFFER, &interleaved);
            t0 = t1;
        }
        w.end(FIFFB_RAW_DATA);
        w.end(FIFFB_MEAS);
        w.finish()
    }

    pub fn write(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, self.bytes()).unwrap();
    }
}

// ── Study ────────────────────────────────────────────────────────────────

/// Temporary study: config directory plus `data/{sourcedata,bids,derivatives}`
/// paths.  Only `sourcedata` is created.
#[allow(unused)]
pub struct Study {
    pub tmp: TempDir,
    pub cfg: StudyConfig,
}

#[allow(unused)]
impl Study {
    pub fn new() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let config = tmp.path().join("config");
        std::fs::create_dir_all(&config).unwrap();
        std::fs::write(
            config.join("paths.json"),
            r#"{"root": "../data", "sourcedata": "../data/sourcedata",
                "bidsdata": "../data/bids", "derivatives": "../data/derivatives",
                "subjects": {"first": 1, "last": 4, "exclude": [2]}}"#,
        )
        .unwrap();
        let shipped = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/eeg_markers.json");
        std::fs::copy(shipped, config.join("eeg_markers.json")).unwrap();
        std::fs::create_dir_all(tmp.path().join("data/sourcedata")).unwrap();

        let cfg = StudyConfig::load(&config).unwrap();
        Self { tmp, cfg }
    }

    pub fn data(&self) -> PathBuf {
        self.tmp.path().join("data")
    }

    /// Write the subject's BDF and demographics sheet into sourcedata.
    pub fn add_source(&self, subject: u32, bdf: &BdfFixture, age: u32, sex: i32) {
        let src = &self.cfg.paths.sourcedata;
        bdf.write(&dpx::layout::sourcedata_file(src, subject, "eeg", ".bdf"));
        let demo = dpx::layout::sourcedata_file(src, subject, "demographics", ".tsv");
        std::fs::create_dir_all(demo.parent().unwrap()).unwrap();
        std::fs::write(&demo, format!("subject_id\tage\tsex\nsub-{subject:03}\t{age}\t{sex}\n")).unwrap();
    }
}
