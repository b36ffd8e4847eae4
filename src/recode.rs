//! Trial recoder: rebuilds DPX trial structure from a flat marker stream.
//!
//! One forward pass over the stream, driven by an explicit state machine:
//!
//! ```text
//!                  cue
//!   AwaitCue ───────────────▶ AwaitProbeOrTimeout
//!      ▲                        │ incorrect      │ probe        │ other / end
//!      │                        ▼                ▼              ▼
//!      │              TooSoonSeekProbe   AwaitResponseOrTimeout  broken (unresolved)
//!      │               │ probe  │ cue/end   │ response  │ other / end
//!      └───────────────┴────────┴───────────┴───────────┘
//!                    too-soon  broken     answered    missed
//! ```
//!
//! Every cue opens exactly one [`Trial`].  A cue that arrives while a trial
//! is still open closes that trial first and is then replayed in `AwaitCue`,
//! so no cue is ever swallowed.
//!
//! Reaction time is always the probe-to-response latency.  Too-soon trials
//! have no latency ([`ReactionTime::NotApplicable`], NaN on the wire) and
//! missed trials carry the [`TIMED_OUT_RT`] sentinel.
//!
//! The input stream must hold raw task codes only; recoding an already
//! recoded stream is rejected.
use std::collections::HashSet;

use anyhow::{bail, ensure, Result};

use crate::codes::{Outcome, RecodedCode};
use crate::markers::{Cue, Marker, Probe, Role, Taxonomy};

/// Reaction time written for trials with no response after the probe.
pub const TIMED_OUT_RT: f64 = 99999.0;

/// Reaction time of one trial.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReactionTime {
    /// Probe-to-response latency in seconds.
    Measured(f64),
    /// No response followed the probe.
    TimedOut,
    /// The trial kind has no latency (too-soon or broken).
    NotApplicable,
}

impl ReactionTime {
    /// Wire value: latency, [`TIMED_OUT_RT`], or NaN.
    pub fn seconds(self) -> f64 {
        match self {
            ReactionTime::Measured(rt) => rt,
            ReactionTime::TimedOut => TIMED_OUT_RT,
            ReactionTime::NotApplicable => f64::NAN,
        }
    }

    /// Like [`seconds`](Self::seconds) with NaN mapped to `None`.
    pub fn as_option(self) -> Option<f64> {
        match self {
            ReactionTime::NotApplicable => None,
            other => Some(other.seconds()),
        }
    }
}

/// Why a trial could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Broken {
    /// Too-soon trial whose probe search ran into the next cue or the end
    /// of the stream.
    ProbeNotFound,
    /// The marker after the cue was neither an incorrect response nor a
    /// probe.
    Unresolved,
}

/// One cue and everything the recoder resolved for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    /// Ordinal of the cue in the stream, counting broken trials.
    pub index: usize,
    /// 0 before the first boundary marker, 1 from it onwards.
    pub block: u8,
    pub cue: Cue,
    /// Position of the cue marker in the stream.
    pub cue_pos: usize,
    pub cue_sample: i64,
    pub probe: Option<Probe>,
    pub probe_pos: Option<usize>,
    pub probe_sample: Option<i64>,
    pub outcome: Option<Outcome>,
    pub rt: ReactionTime,
    pub broken: Option<Broken>,
}

impl Trial {
    fn open(index: usize, block: u8, cue: Cue, cue_pos: usize, cue_sample: i64) -> Self {
        Self {
            index,
            block,
            cue,
            cue_pos,
            cue_sample,
            probe: None,
            probe_pos: None,
            probe_sample: None,
            outcome: None,
            rt: ReactionTime::NotApplicable,
            broken: None,
        }
    }

    #[inline]
    pub fn is_broken(&self) -> bool {
        self.broken.is_some()
    }

    /// 1/0 correctness; `None` for too-soon, missed and broken trials.
    pub fn correct(&self) -> Option<bool> {
        match self.outcome {
            Some(Outcome::Correct) => Some(true),
            Some(Outcome::Incorrect) => Some(false),
            _ => None,
        }
    }

    /// Recoded cue code, if the cue was recoded.
    pub fn cue_code(&self) -> Option<RecodedCode> {
        self.outcome.map(|o| RecodedCode::cue(o, self.cue))
    }

    /// Recoded probe code, if a probe was attached.
    pub fn probe_code(&self) -> Option<RecodedCode> {
        match (self.outcome, self.probe) {
            (Some(o), Some(p)) => Some(RecodedCode::probe(o, self.cue, p)),
            _ => None,
        }
    }
}

/// Output of [`recode`].
#[derive(Debug, Clone)]
pub struct Recoding {
    /// The input stream with cue and probe codes replaced.
    pub markers: Vec<Marker>,
    /// One record per cue, in stream order.
    pub trials: Vec<Trial>,
    /// Time (s) of the first boundary marker, if any.
    pub boundary: Option<f64>,
}

impl Recoding {
    /// Indices of broken trials.
    pub fn broken(&self) -> Vec<usize> {
        self.trials.iter().filter(|t| t.is_broken()).map(|t| t.index).collect()
    }

    /// Trials that survive into the metadata table and the epoch set.
    pub fn surviving(&self) -> impl Iterator<Item = &Trial> {
        self.trials.iter().filter(|t| !t.is_broken())
    }

    /// Recoded cue markers of the surviving trials, in trial order.
    pub fn cue_markers(&self) -> Vec<Marker> {
        self.surviving().map(|t| self.markers[t.cue_pos]).collect()
    }
}

/// Split a recoded stream into its recoded-cue and recoded-probe subsets.
pub fn partition(markers: &[Marker]) -> (Vec<Marker>, Vec<Marker>) {
    let mut cues = Vec::new();
    let mut probes = Vec::new();
    for &m in markers {
        match RecodedCode::from_code(m.code) {
            Some(c) if c.is_cue() => cues.push(m),
            Some(_) => probes.push(m),
            None => {}
        }
    }
    (cues, probes)
}

/// Sample time (s) of the first boundary marker.
pub fn boundary_time(markers: &[Marker], taxonomy: &Taxonomy, sfreq: f64) -> Option<f64> {
    markers
        .iter()
        .find(|m| taxonomy.is_boundary(m.code))
        .map(|m| m.time(sfreq))
}

/// Recode a time-ordered marker stream.
///
/// # Errors
/// * `sfreq` is not positive.
/// * The stream already contains recoded codes (118–139).
/// * The recoded cue and probe subsets do not line up after removing broken
///   trials (internal invariant).
pub fn recode(markers: &[Marker], taxonomy: &Taxonomy, sfreq: f64) -> Result<Recoding> {
    ensure!(sfreq > 0.0, "sampling rate must be positive, got {sfreq}");
    if let Some(m) = markers.iter().find(|m| RecodedCode::from_code(m.code).is_some()) {
        bail!(
            "marker stream already contains recoded code {} at sample {}; \
             recoding expects raw task codes",
            m.code,
            m.sample
        );
    }

    let boundary = boundary_time(markers, taxonomy, sfreq);
    let mut recoder = Recoder {
        taxonomy,
        sfreq,
        boundary,
        markers: markers.to_vec(),
        trials: Vec::new(),
    };

    let mut state = State::AwaitCue;
    let mut pos = 0;
    while pos < recoder.markers.len() {
        match recoder.step(state, pos) {
            Step::Consume(next) => {
                state = next;
                pos += 1;
            }
            Step::Replay(next) => state = next,
        }
    }
    recoder.finish(state);

    let Recoder { markers, trials, .. } = recoder;
    check_alignment(&markers, &trials)?;

    for t in trials.iter().filter(|t| t.is_broken()) {
        log::debug!(
            "trial {} (cue at sample {}) is broken: {:?}",
            t.index, t.cue_sample, t.broken
        );
    }

    Ok(Recoding { markers, trials, boundary })
}

// ── State machine ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitCue,
    AwaitProbeOrTimeout { trial: usize },
    AwaitResponseOrTimeout { trial: usize, probe_sample: i64 },
    TooSoonSeekProbe { trial: usize },
}

/// Transition result: move past the current marker, or hand it to the next
/// state unchanged.
enum Step {
    Consume(State),
    Replay(State),
}

struct Recoder<'a> {
    taxonomy: &'a Taxonomy,
    sfreq: f64,
    boundary: Option<f64>,
    markers: Vec<Marker>,
    trials: Vec<Trial>,
}

impl Recoder<'_> {
    fn step(&mut self, state: State, pos: usize) -> Step {
        let role = self.taxonomy.role(self.markers[pos].code);
        match (state, role) {
            (State::AwaitCue, Role::Cue(cue)) => {
                let trial = self.open_trial(pos, cue);
                Step::Consume(State::AwaitProbeOrTimeout { trial })
            }
            (State::AwaitCue, _) => Step::Consume(State::AwaitCue),

            (State::AwaitProbeOrTimeout { trial }, Role::Response { correct: false }) => {
                self.resolve_cue(trial, Outcome::TooSoon);
                Step::Consume(State::TooSoonSeekProbe { trial })
            }
            (State::AwaitProbeOrTimeout { trial }, Role::Probe(probe)) => {
                self.attach_probe(trial, pos, probe);
                let probe_sample = self.markers[pos].sample;
                Step::Consume(State::AwaitResponseOrTimeout { trial, probe_sample })
            }
            (State::AwaitProbeOrTimeout { trial }, other) => {
                self.trials[trial].broken = Some(Broken::Unresolved);
                close(other)
            }

            (State::TooSoonSeekProbe { trial }, Role::Probe(probe)) => {
                self.attach_probe(trial, pos, probe);
                self.resolve_probe(trial, Outcome::TooSoon);
                Step::Consume(State::AwaitCue)
            }
            (State::TooSoonSeekProbe { trial }, Role::Cue(_)) => {
                self.trials[trial].broken = Some(Broken::ProbeNotFound);
                Step::Replay(State::AwaitCue)
            }
            (State::TooSoonSeekProbe { .. }, _) => Step::Consume(state),

            (State::AwaitResponseOrTimeout { trial, probe_sample }, Role::Response { correct }) => {
                let outcome = if correct { Outcome::Correct } else { Outcome::Incorrect };
                let rt = self.markers[pos].sample - probe_sample;
                self.trials[trial].rt = ReactionTime::Measured(rt as f64 / self.sfreq);
                self.resolve_cue(trial, outcome);
                self.resolve_probe(trial, outcome);
                Step::Consume(State::AwaitCue)
            }
            (State::AwaitResponseOrTimeout { trial, .. }, other) => {
                self.miss(trial);
                close(other)
            }
        }
    }

    /// End of stream: settle whatever trial is still open.
    fn finish(&mut self, state: State) {
        match state {
            State::AwaitCue => {}
            State::AwaitProbeOrTimeout { trial } => {
                self.trials[trial].broken = Some(Broken::Unresolved);
            }
            State::TooSoonSeekProbe { trial } => {
                self.trials[trial].broken = Some(Broken::ProbeNotFound);
            }
            State::AwaitResponseOrTimeout { trial, .. } => self.miss(trial),
        }
    }

    fn open_trial(&mut self, pos: usize, cue: Cue) -> usize {
        let sample = self.markers[pos].sample;
        let block = match self.boundary {
            Some(t) if sample as f64 / self.sfreq >= t => 1,
            _ => 0,
        };
        let index = self.trials.len();
        self.trials.push(Trial::open(index, block, cue, pos, sample));
        index
    }

    fn attach_probe(&mut self, trial: usize, pos: usize, probe: Probe) {
        let t = &mut self.trials[trial];
        t.probe = Some(probe);
        t.probe_pos = Some(pos);
        t.probe_sample = Some(self.markers[pos].sample);
    }

    fn resolve_cue(&mut self, trial: usize, outcome: Outcome) {
        let t = &mut self.trials[trial];
        t.outcome = Some(outcome);
        self.markers[t.cue_pos].code = RecodedCode::cue(outcome, t.cue).code();
    }

    fn resolve_probe(&mut self, trial: usize, outcome: Outcome) {
        let t = &self.trials[trial];
        if let (Some(pos), Some(probe)) = (t.probe_pos, t.probe) {
            self.markers[pos].code = RecodedCode::probe(outcome, t.cue, probe).code();
        }
    }

    fn miss(&mut self, trial: usize) {
        self.trials[trial].rt = ReactionTime::TimedOut;
        self.resolve_cue(trial, Outcome::Missed);
        self.resolve_probe(trial, Outcome::Missed);
    }
}

/// Leave the current trial: a cue starts the next trial, anything else is
/// consumed.
fn close(role: Role) -> Step {
    if matches!(role, Role::Cue(_)) {
        Step::Replay(State::AwaitCue)
    } else {
        Step::Consume(State::AwaitCue)
    }
}

/// Recoded cue markers minus the cues of broken trials must pair one-to-one
/// with recoded probe markers.
fn check_alignment(markers: &[Marker], trials: &[Trial]) -> Result<()> {
    let broken_cues: HashSet<usize> = trials
        .iter()
        .filter(|t| t.is_broken())
        .map(|t| t.cue_pos)
        .collect();
    let n_cues = markers
        .iter()
        .enumerate()
        .filter(|(pos, m)| {
            !broken_cues.contains(pos)
                && RecodedCode::from_code(m.code).is_some_and(RecodedCode::is_cue)
        })
        .count();
    let (_, probes) = partition(markers);
    ensure!(
        n_cues == probes.len(),
        "recoded cue/probe mismatch: {n_cues} cues vs {} probes after removing broken trials",
        probes.len()
    );
    Ok(())
}
