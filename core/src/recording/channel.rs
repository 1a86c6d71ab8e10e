use serde::{Deserialize, Serialize};

/// Sensor type of a channel, following the usual MEG/EEG naming.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Mag,
    Grad,
    Eeg,
    Seeg,
    Ecog,
    Eog,
    Ecg,
    Emg,
    Stim,
    Resp,
    RefMeg,
    Misc,
}

impl ChannelType {
    pub const ALL: [ChannelType; 12] = [
        ChannelType::Mag,
        ChannelType::Grad,
        ChannelType::Eeg,
        ChannelType::Seeg,
        ChannelType::Ecog,
        ChannelType::Eog,
        ChannelType::Ecg,
        ChannelType::Emg,
        ChannelType::Stim,
        ChannelType::Resp,
        ChannelType::RefMeg,
        ChannelType::Misc,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::Mag => "mag",
            ChannelType::Grad => "grad",
            ChannelType::Eeg => "eeg",
            ChannelType::Seeg => "seeg",
            ChannelType::Ecog => "ecog",
            ChannelType::Eog => "eog",
            ChannelType::Ecg => "ecg",
            ChannelType::Emg => "emg",
            ChannelType::Stim => "stim",
            ChannelType::Resp => "resp",
            ChannelType::RefMeg => "ref_meg",
            ChannelType::Misc => "misc",
        }
    }

    /// Channels that carry brain signal and are filtered by default.
    pub fn is_data(&self) -> bool {
        matches!(
            self,
            ChannelType::Mag
                | ChannelType::Grad
                | ChannelType::Eeg
                | ChannelType::Seeg
                | ChannelType::Ecog
        )
    }

    pub fn is_meg(&self) -> bool {
        matches!(self, ChannelType::Mag | ChannelType::Grad)
    }

    /// Whether `tag` names this type. Besides the type names themselves,
    /// `meg` covers magnetometers and gradiometers and `data` covers every
    /// data channel type.
    pub fn matches_tag(&self, tag: &str) -> bool {
        match tag {
            "meg" => self.is_meg(),
            "data" => self.is_data(),
            other => self.as_str() == other,
        }
    }

    pub fn is_type_tag(tag: &str) -> bool {
        tag == "meg" || tag == "data" || Self::ALL.iter().any(|kind| kind.as_str() == tag)
    }
}

/// Descriptor for one row of a recording.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelInfo {
    pub name: String,
    pub kind: ChannelType,
    #[serde(default)]
    pub bad: bool,
}

impl ChannelInfo {
    pub fn new(name: impl Into<String>, kind: ChannelType) -> Self {
        Self {
            name: name.into(),
            kind,
            bad: false,
        }
    }

    pub fn bad(mut self) -> Self {
        self.bad = true;
        self
    }
}
