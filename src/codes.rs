//! Recoded trial event codes (118–139).
//!
//! Each code names one trial role (cue or probe) combined with one trial
//! outcome.  The integer values are shared with downstream analyses and must
//! not change:
//!
//! ```text
//! 118 Too_soon A    123 Correct AX   129 Incorrect AX   134 Missed A
//! 119 Too_soon B    124 Correct AY   130 Incorrect AY   135 Missed AX
//! 120 Too_soon X    125 Correct B    131 Incorrect B    136 Missed AY
//! 121 Too_soon Y    126 Correct BX   132 Incorrect BX   137 Missed B
//! 122 Correct A     127 Correct BY   133 Incorrect BY   138 Missed BX
//!                   128 Incorrect A                     139 Missed BY
//! ```
use std::collections::BTreeMap;

use crate::markers::{Cue, Probe};

/// How a trial was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// Incorrect response before the probe appeared.
    TooSoon,
    Correct,
    Incorrect,
    /// No response after the probe.
    Missed,
}

impl Outcome {
    /// Label used in event names and the metadata table.
    pub fn label(self) -> &'static str {
        match self {
            Outcome::TooSoon => "Too_soon",
            Outcome::Correct => "Correct",
            Outcome::Incorrect => "Incorrect",
            Outcome::Missed => "Missed",
        }
    }
}

/// The 22 recoded event codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(i32)]
pub enum RecodedCode {
    TooSoonCueA = 118,
    TooSoonCueB = 119,
    TooSoonProbeX = 120,
    TooSoonProbeY = 121,
    CorrectCueA = 122,
    CorrectAX = 123,
    CorrectAY = 124,
    CorrectCueB = 125,
    CorrectBX = 126,
    CorrectBY = 127,
    IncorrectCueA = 128,
    IncorrectAX = 129,
    IncorrectAY = 130,
    IncorrectCueB = 131,
    IncorrectBX = 132,
    IncorrectBY = 133,
    MissedCueA = 134,
    MissedAX = 135,
    MissedAY = 136,
    MissedCueB = 137,
    MissedBX = 138,
    MissedBY = 139,
}

impl RecodedCode {
    pub const ALL: [RecodedCode; 22] = [
        Self::TooSoonCueA, Self::TooSoonCueB, Self::TooSoonProbeX, Self::TooSoonProbeY,
        Self::CorrectCueA, Self::CorrectAX, Self::CorrectAY,
        Self::CorrectCueB, Self::CorrectBX, Self::CorrectBY,
        Self::IncorrectCueA, Self::IncorrectAX, Self::IncorrectAY,
        Self::IncorrectCueB, Self::IncorrectBX, Self::IncorrectBY,
        Self::MissedCueA, Self::MissedAX, Self::MissedAY,
        Self::MissedCueB, Self::MissedBX, Self::MissedBY,
    ];

    /// Wire value.
    #[inline]
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }

    /// Code for a cue marker of the given identity and outcome.
    pub fn cue(outcome: Outcome, cue: Cue) -> Self {
        match (outcome, cue) {
            (Outcome::TooSoon, Cue::A) => Self::TooSoonCueA,
            (Outcome::TooSoon, Cue::B) => Self::TooSoonCueB,
            (Outcome::Correct, Cue::A) => Self::CorrectCueA,
            (Outcome::Correct, Cue::B) => Self::CorrectCueB,
            (Outcome::Incorrect, Cue::A) => Self::IncorrectCueA,
            (Outcome::Incorrect, Cue::B) => Self::IncorrectCueB,
            (Outcome::Missed, Cue::A) => Self::MissedCueA,
            (Outcome::Missed, Cue::B) => Self::MissedCueB,
        }
    }

    /// Code for a probe marker.  Too-soon probes ignore the cue identity.
    pub fn probe(outcome: Outcome, cue: Cue, probe: Probe) -> Self {
        match (outcome, cue, probe) {
            (Outcome::TooSoon, _, Probe::X) => Self::TooSoonProbeX,
            (Outcome::TooSoon, _, Probe::Y) => Self::TooSoonProbeY,
            (Outcome::Correct, Cue::A, Probe::X) => Self::CorrectAX,
            (Outcome::Correct, Cue::A, Probe::Y) => Self::CorrectAY,
            (Outcome::Correct, Cue::B, Probe::X) => Self::CorrectBX,
            (Outcome::Correct, Cue::B, Probe::Y) => Self::CorrectBY,
            (Outcome::Incorrect, Cue::A, Probe::X) => Self::IncorrectAX,
            (Outcome::Incorrect, Cue::A, Probe::Y) => Self::IncorrectAY,
            (Outcome::Incorrect, Cue::B, Probe::X) => Self::IncorrectBX,
            (Outcome::Incorrect, Cue::B, Probe::Y) => Self::IncorrectBY,
            (Outcome::Missed, Cue::A, Probe::X) => Self::MissedAX,
            (Outcome::Missed, Cue::A, Probe::Y) => Self::MissedAY,
            (Outcome::Missed, Cue::B, Probe::X) => Self::MissedBX,
            (Outcome::Missed, Cue::B, Probe::Y) => Self::MissedBY,
        }
    }

    /// `true` for the eight cue codes.
    pub fn is_cue(self) -> bool {
        matches!(
            self,
            Self::TooSoonCueA | Self::TooSoonCueB
                | Self::CorrectCueA | Self::CorrectCueB
                | Self::IncorrectCueA | Self::IncorrectCueB
                | Self::MissedCueA | Self::MissedCueB
        )
    }

    /// `true` for the fourteen probe codes.
    pub fn is_probe(self) -> bool {
        !self.is_cue()
    }

    /// Reverse mapping: outcome plus stimulus label (`"A"`, `"X"`, `"BY"`, …).
    pub fn decode(self) -> (Outcome, &'static str) {
        use Outcome::*;
        match self {
            Self::TooSoonCueA => (TooSoon, "A"),
            Self::TooSoonCueB => (TooSoon, "B"),
            Self::TooSoonProbeX => (TooSoon, "X"),
            Self::TooSoonProbeY => (TooSoon, "Y"),
            Self::CorrectCueA => (Correct, "A"),
            Self::CorrectAX => (Correct, "AX"),
            Self::CorrectAY => (Correct, "AY"),
            Self::CorrectCueB => (Correct, "B"),
            Self::CorrectBX => (Correct, "BX"),
            Self::CorrectBY => (Correct, "BY"),
            Self::IncorrectCueA => (Incorrect, "A"),
            Self::IncorrectAX => (Incorrect, "AX"),
            Self::IncorrectAY => (Incorrect, "AY"),
            Self::IncorrectCueB => (Incorrect, "B"),
            Self::IncorrectBX => (Incorrect, "BX"),
            Self::IncorrectBY => (Incorrect, "BY"),
            Self::MissedCueA => (Missed, "A"),
            Self::MissedAX => (Missed, "AX"),
            Self::MissedAY => (Missed, "AY"),
            Self::MissedCueB => (Missed, "B"),
            Self::MissedBX => (Missed, "BX"),
            Self::MissedBY => (Missed, "BY"),
        }
    }

    /// Event name, e.g. `"Too_soon A"` or `"Correct BX"`.
    pub fn label(self) -> String {
        let (outcome, stim) = self.decode();
        format!("{} {stim}", outcome.label())
    }

    /// `label → code` for the cue codes (the epoch event mapping).
    pub fn cue_event_id() -> BTreeMap<String, i32> {
        Self::ALL
            .iter()
            .filter(|c| c.is_cue())
            .map(|c| (c.label(), c.code()))
            .collect()
    }

    /// `label → code` for the probe codes.
    pub fn probe_event_id() -> BTreeMap<String, i32> {
        Self::ALL
            .iter()
            .filter(|c| c.is_probe())
            .map(|c| (c.label(), c.code()))
            .collect()
    }
}
