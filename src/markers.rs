//! Marker stream primitives and the DPX code taxonomy.
//!
//! A [`Marker`] is one `(sample, code)` pair decoded from a recording.  The
//! integer codes carry no meaning on their own: the [`Taxonomy`] maps each
//! code to its role in the trial grammar (cue, probe, response, boundary)
//! using the symbolic names from the marker configuration.
//!
//! Name prefixes decide the role, exactly as the task's trigger naming was
//! designed:
//!
//! ```text
//! cue_a            → cue A
//! cue_*            → cue B   (cue_b1 … cue_b5)
//! probe_x          → probe X
//! probe_*          → probe Y (probe_y1 … probe_y5)
//! correct_*        → correct response
//! incorrect_*      → incorrect response
//! <boundary names> → block boundary (default "EDGE boundary", "pause_record")
//! ```
use std::collections::{BTreeMap, HashMap};

use anyhow::{bail, Result};

use crate::codes::RecodedCode;

/// One discrete event in the recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker {
    /// Absolute sample index (includes the recording's `first_samp`).
    pub sample: i64,
    /// Event code.
    pub code: i32,
}

impl Marker {
    pub fn new(sample: i64, code: i32) -> Self {
        Self { sample, code }
    }

    /// Onset in seconds for the given sampling rate.
    #[inline]
    pub fn time(&self, sfreq: f64) -> f64 {
        self.sample as f64 / sfreq
    }
}

/// Cue identity. B covers all five B variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    A,
    B,
}

/// Probe identity. Y covers all five Y variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Probe {
    X,
    Y,
}

/// Role of a raw code in the trial grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Cue(Cue),
    Probe(Probe),
    Response { correct: bool },
    Boundary,
    Other,
}

/// Lookup from raw event codes to trial-grammar roles.
#[derive(Debug, Clone)]
pub struct Taxonomy {
    roles: HashMap<i32, Role>,
}

impl Taxonomy {
    /// Build the taxonomy from a `name → code` mapping.
    ///
    /// Fails if `cue_a` or `probe_x` is missing, if two names with different
    /// roles share a code, or if any task code collides with the recoded
    /// range 118–139 (the recoder could not tell raw from recoded markers).
    pub fn from_event_id(event_id: &BTreeMap<String, i32>, boundary_names: &[String]) -> Result<Self> {
        if !event_id.contains_key("cue_a") {
            bail!("event mapping has no 'cue_a' entry");
        }
        if !event_id.contains_key("probe_x") {
            bail!("event mapping has no 'probe_x' entry");
        }

        let mut roles: HashMap<i32, Role> = HashMap::new();
        let mut owners: HashMap<i32, &str> = HashMap::new();
        for (name, &code) in event_id {
            let role = role_of_name(name, boundary_names);
            if role == Role::Other {
                continue;
            }
            if RecodedCode::from_code(code).is_some() {
                bail!("event '{name}' uses code {code}, which is reserved for recoded trial events (118-139)");
            }
            if let Some(prev) = roles.insert(code, role) {
                if prev != role {
                    bail!(
                        "code {code} is assigned to both '{}' and '{name}'",
                        owners.get(&code).copied().unwrap_or("?")
                    );
                }
            }
            owners.entry(code).or_insert(name.as_str());
        }
        Ok(Self { roles })
    }

    /// Role of a raw code; unknown codes are [`Role::Other`].
    #[inline]
    pub fn role(&self, code: i32) -> Role {
        self.roles.get(&code).copied().unwrap_or(Role::Other)
    }

    pub fn is_cue(&self, code: i32) -> bool {
        matches!(self.role(code), Role::Cue(_))
    }

    pub fn is_probe(&self, code: i32) -> bool {
        matches!(self.role(code), Role::Probe(_))
    }

    pub fn is_boundary(&self, code: i32) -> bool {
        self.role(code) == Role::Boundary
    }
}

fn role_of_name(name: &str, boundary_names: &[String]) -> Role {
    if boundary_names.iter().any(|b| b == name) {
        Role::Boundary
    } else if name == "cue_a" {
        Role::Cue(Cue::A)
    } else if name.starts_with("cue") {
        Role::Cue(Cue::B)
    } else if name == "probe_x" {
        Role::Probe(Probe::X)
    } else if name.starts_with("probe") {
        Role::Probe(Probe::Y)
    } else if name.starts_with("incorrect") {
        Role::Response { correct: false }
    } else if name.starts_with("correct") {
        Role::Response { correct: true }
    } else {
        Role::Other
    }
}
