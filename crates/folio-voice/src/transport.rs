//! Contract of the real-time transport consumed by the call controller.
//!
//! The transport is a black box: a LiveKit room client, or an in-memory
//! double in tests. The controller only relies on the operations of
//! [`Transport`], the [`TransportEvent`] stream, and one [`AudioPlayback`]
//! element per session.

use crate::error::TransportError;
use async_trait::async_trait;
use folio_types::{ConnectionState, LocalAudioTrack, ParticipantInfo, TrackInfo};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Events emitted by a transport session, delivered in order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    ConnectionStateChanged(ConnectionState),
    Connected,
    /// The session closed. The reason is diagnostic only.
    Disconnected {
        reason: Option<String>,
    },
    TrackSubscribed {
        track: TrackInfo,
        participant: ParticipantInfo,
    },
    TrackUnsubscribed {
        track: TrackInfo,
        participant: ParticipantInfo,
    },
    /// The full new active-speaker set.
    ActiveSpeakersChanged(Vec<ParticipantInfo>),
    ParticipantConnected(ParticipantInfo),
}

/// One session with the real-time transport.
///
/// A session is bound to a single credential and is never reconnected after
/// it has been disconnected.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Joins the room. Handshake timeouts are the transport's concern.
    async fn connect(&self, url: &str, token: &str) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError>;

    async fn set_microphone_enabled(&self, enabled: bool) -> Result<(), TransportError>;

    /// Current snapshot of the local participant.
    fn local_participant(&self) -> ParticipantInfo;

    fn local_audio_tracks(&self) -> Vec<LocalAudioTrack>;

    fn remote_participants(&self) -> Vec<ParticipantInfo>;

    /// Registers a listener. Dropping the receiver deregisters it.
    fn subscribe(&self) -> broadcast::Receiver<TransportEvent>;
}

/// Playback state of an [`AudioPlayback`] element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackStatus {
    pub paused: bool,
    /// Elapsed playback time.
    pub current_time: Duration,
    pub ended: bool,
}

impl PlaybackStatus {
    /// Playing, past the start, and not ended.
    pub fn is_audible(&self) -> bool {
        !self.paused && !self.current_time.is_zero() && !self.ended
    }
}

/// A local element that renders a remote audio track.
pub trait AudioPlayback: Send + Sync {
    /// Points the element at `track`, replacing any previous source, and
    /// starts playback.
    fn attach(&self, track: &TrackInfo) -> Result<(), TransportError>;

    fn status(&self) -> PlaybackStatus;

    /// Pauses playback and clears the source.
    fn detach(&self);
}

/// Creates the per-call transport resources.
pub trait TransportConnector: Send + Sync {
    /// Opens a fresh, unconnected session.
    fn open(&self) -> Arc<dyn Transport>;

    /// Creates the playback element owned by one session.
    fn playback(&self) -> Arc<dyn AudioPlayback>;
}
