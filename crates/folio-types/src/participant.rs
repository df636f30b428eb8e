//! Participant and track descriptors reported by the transport.

use serde::{Deserialize, Serialize};

/// Snapshot of a room participant at the time an event was delivered.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub identity: String,
    /// Display name, if the participant set one.
    pub name: Option<String>,
    pub is_local: bool,
    pub is_speaking: bool,
    pub is_microphone_enabled: bool,
}

impl ParticipantInfo {
    /// A remote participant with the given identity and no speaking flags set.
    pub fn remote(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            ..Default::default()
        }
    }

    /// The local participant with the given identity, microphone enabled.
    pub fn local(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            is_local: true,
            is_microphone_enabled: true,
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn speaking(mut self, is_speaking: bool) -> Self {
        self.is_speaking = is_speaking;
        self
    }
}

/// Media kind of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
}

/// A subscribed remote track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    /// Transport-assigned track id.
    pub sid: String,
    pub kind: TrackKind,
}

impl TrackInfo {
    pub fn audio(sid: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            kind: TrackKind::Audio,
        }
    }
}

/// A local audio track publication.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalAudioTrack {
    pub sid: String,
    pub is_muted: bool,
}
