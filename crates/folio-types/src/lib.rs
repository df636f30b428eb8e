//! Shared types for the portfolio voice-call core.
//!
//! This crate holds the wire shapes exchanged between the credential
//! endpoint and its callers, the call lifecycle states, the conversational
//! indicator published to the presentation layer, and the participant and
//! track descriptors the transport reports.
//!
//! It has no behavior of its own beyond small helpers; both `folio-voice`
//! and `folio-server` depend on it so the JSON contract is defined once.

use serde::{Deserialize, Serialize};

mod credential;
mod participant;

pub use credential::{Credential, ErrorBody};
pub use participant::{LocalAudioTrack, ParticipantInfo, TrackInfo, TrackKind};

/// Lifecycle of one voice call as seen by the presentation layer.
///
/// `Disconnected` is transient: the controller passes through it when a
/// session ends and settles back on `Idle`, ready for a fresh credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallState {
    /// No session exists.
    #[default]
    Idle,
    /// A credential is being requested or the transport handshake is running.
    Connecting,
    /// Joined the room, audio flowing.
    Connected,
    /// The session has ended.
    Disconnected,
}

impl CallState {
    /// Returns `true` while a call occupies the controller.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Connected)
    }
}

/// Connection state reported by the real-time transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Conversational turn-taking indicator.
///
/// The presentation layer receives `Option<Indicator>`; `None` covers idle,
/// connecting and "thinking".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Indicator {
    /// The local user is producing speech and the agent is silent.
    Listening,
    /// The agent's audio is playing.
    Talking,
}

impl Indicator {
    /// Derives the indicator from the two speaking facts.
    ///
    /// Agent speech always wins over user speech.
    pub fn from_speaking(user_speaking: bool, agent_speaking: bool) -> Option<Self> {
        if agent_speaking {
            Some(Self::Talking)
        } else if user_speaking {
            Some(Self::Listening)
        } else {
            None
        }
    }

    /// Returns the lowercase label used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Listening => "listening",
            Self::Talking => "talking",
        }
    }
}
