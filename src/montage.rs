//! Channel classification against the BioSemi 64-channel layout.
//!
//! Rule, first match wins: a name in the layout is EEG, a name starting
//! with `EOG` or `EXG` is EOG, anything else is a stimulus channel.

/// Electrode names of the `biosemi64` layout, in cap order.
pub const BIOSEMI64: [&str; 64] = [
    "Fp1", "AF7", "AF3", "F1", "F3", "F5", "F7", "FT7", "FC5", "FC3", "FC1", "C1", "C3", "C5",
    "T7", "TP7", "CP5", "CP3", "CP1", "P1", "P3", "P5", "P7", "P9", "PO7", "PO3", "O1", "Iz",
    "Oz", "POz", "Pz", "CPz", "Fpz", "Fp2", "AF8", "AF4", "AFz", "Fz", "F2", "F4", "F6", "F8",
    "FT8", "FC6", "FC4", "FC2", "FCz", "Cz", "C2", "C4", "C6", "T8", "TP8", "CP6", "CP4", "CP2",
    "P2", "P4", "P6", "P8", "P10", "PO8", "PO4", "O2",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    Eeg,
    Eog,
    Stim,
}

impl ChannelType {
    /// Value of the `type` column in a BIDS `_channels.tsv`.
    pub fn bids(self) -> &'static str {
        match self {
            ChannelType::Eeg => "EEG",
            ChannelType::Eog => "EOG",
            ChannelType::Stim => "TRIG",
        }
    }
}

/// Reference electrode layout.
#[derive(Debug, Clone)]
pub struct Montage {
    names: Vec<String>,
}

impl Montage {
    pub fn biosemi64() -> Self {
        Self::from_names(BIOSEMI64)
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { names: names.into_iter().map(Into::into).collect() }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn classify(&self, name: &str) -> ChannelType {
        if self.contains(name) {
            ChannelType::Eeg
        } else if name.starts_with("EOG") || name.starts_with("EXG") {
            ChannelType::Eog
        } else {
            ChannelType::Stim
        }
    }

    pub fn classify_all<S: AsRef<str>>(&self, names: &[S]) -> Vec<ChannelType> {
        names.iter().map(|n| self.classify(n.as_ref())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn biosemi_names_are_unique() {
        let mut v = BIOSEMI64.to_vec();
        v.sort_unstable();
        v.dedup();
        assert_eq!(v.len(), 64);
    }

    #[test]
    fn classification_rule() {
        let m = Montage::biosemi64();
        let types = m.classify_all(&["Fp1", "Iz", "EXG3", "EOG_left", "Status", "fp1"]);
        assert_eq!(
            types,
            vec![
                ChannelType::Eeg,
                ChannelType::Eeg,
                ChannelType::Eog,
                ChannelType::Eog,
                ChannelType::Stim,
                ChannelType::Stim,
            ]
        );
        assert_eq!(ChannelType::Stim.bids(), "TRIG");
    }
}
