//! Voice-call core for the portfolio site.
//!
//! Two halves live here. The server half, [`CredentialIssuer`], mints a
//! single-use LiveKit join token for a freshly named room on every request.
//! The client half, [`CallController`], fetches such a credential through a
//! [`CredentialSource`], drives a [`Transport`] session, and reduces the
//! transport's events into the conversational [`Indicator`] shown next to
//! the call controls.
//!
//! [`Indicator`]: folio_types::Indicator

pub mod agent;
pub mod config;
pub mod controller;
pub mod error;
pub mod issuer;
pub mod source;
pub mod speaking;
pub mod transport;

pub use agent::{AgentMatcher, IdentityMarkers, DEFAULT_AGENT_MARKERS};
pub use config::{LiveKitConfig, LIVEKIT_API_KEY_ENV, LIVEKIT_API_SECRET_ENV, LIVEKIT_URL_ENV};
pub use controller::{CallController, CallEvent, DisconnectReason, DEFAULT_POLL_INTERVAL};
pub use error::{CallError, IssueError, TransportError};
pub use issuer::{normalize_url, CredentialIssuer};
pub use source::{CredentialSource, HttpCredentialSource, TOKEN_PATH};
pub use speaking::SpeakingState;
pub use transport::{AudioPlayback, PlaybackStatus, Transport, TransportConnector, TransportEvent};
