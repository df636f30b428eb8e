//! Call session controller.
//!
//! Drives one voice call at a time through `Idle → Connecting → Connected
//! → Disconnected → Idle`, and derives the conversational indicator from
//! the transport's events and a short poll of local and agent audio.
//!
//! Every session owns two tasks, the event pump and the poll ticker. They
//! are aborted when the session is dropped, which happens on every exit
//! path: user end-call, transport disconnect, setup failure, or dropping
//! the controller itself.

use crate::agent::{AgentMatcher, IdentityMarkers};
use crate::error::CallError;
use crate::source::CredentialSource;
use crate::speaking::{local_producing_speech, SpeakingState};
use crate::transport::{AudioPlayback, Transport, TransportConnector, TransportEvent};
use folio_types::{CallState, ConnectionState, Indicator, TrackInfo, TrackKind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::AbortHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Interval of the local/agent speaking poll.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Capacity of the call event broadcast channel.
const DEFAULT_CALL_EVENT_CAPACITY: usize = 32;

/// Why a call attempt returned to idle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The user ended the call.
    UserEnded,
    /// The transport closed the session. The reason is diagnostic only.
    TransportClosed(Option<String>),
    /// The credential request or the transport handshake failed.
    SetupFailed {
        error: String,
        details: Option<String>,
    },
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    /// Call setup failed. Emitted just before the matching `Disconnected`.
    Failed {
        error: String,
        details: Option<String>,
    },
    /// Emitted exactly once per call attempt, when it ends.
    Disconnected {
        room_name: Option<String>,
        reason: DisconnectReason,
    },
}

/// Controls one voice call at a time.
///
/// Cloning yields another handle to the same controller.
#[derive(Clone)]
pub struct CallController {
    inner: Arc<Shared>,
}

struct Shared {
    source: Arc<dyn CredentialSource>,
    connector: Arc<dyn TransportConnector>,
    matcher: Arc<dyn AgentMatcher>,
    poll_interval: Duration,
    state_tx: watch::Sender<CallState>,
    indicator_tx: Arc<watch::Sender<Option<Indicator>>>,
    events_tx: broadcast::Sender<CallEvent>,
    slot: Mutex<Slot>,
}

#[derive(Default)]
struct Slot {
    /// Incremented on every accepted start; stale async work compares
    /// against it to learn it was cancelled.
    attempt: u64,
    session: Option<ActiveSession>,
}

enum Teardown {
    AlreadyEnded,
    Ended(Option<ActiveSession>),
}

impl CallController {
    pub fn new(
        source: Arc<dyn CredentialSource>,
        connector: Arc<dyn TransportConnector>,
    ) -> Self {
        Self::with_options(
            source,
            connector,
            Arc::new(IdentityMarkers::default()),
            DEFAULT_POLL_INTERVAL,
        )
    }

    pub fn with_options(
        source: Arc<dyn CredentialSource>,
        connector: Arc<dyn TransportConnector>,
        matcher: Arc<dyn AgentMatcher>,
        poll_interval: Duration,
    ) -> Self {
        let (state_tx, _) = watch::channel(CallState::Idle);
        let (indicator_tx, _) = watch::channel(None);
        let (events_tx, _) = broadcast::channel(DEFAULT_CALL_EVENT_CAPACITY);
        Self {
            inner: Arc::new(Shared {
                source,
                connector,
                matcher,
                poll_interval,
                state_tx,
                indicator_tx: Arc::new(indicator_tx),
                events_tx,
                slot: Mutex::new(Slot::default()),
            }),
        }
    }

    /// Watches the call lifecycle.
    pub fn state(&self) -> watch::Receiver<CallState> {
        self.inner.state_tx.subscribe()
    }

    pub fn current_state(&self) -> CallState {
        *self.inner.state_tx.borrow()
    }

    /// Watches the conversational indicator. Only real changes are sent.
    pub fn indicator(&self) -> watch::Receiver<Option<Indicator>> {
        self.inner.indicator_tx.subscribe()
    }

    pub fn current_indicator(&self) -> Option<Indicator> {
        *self.inner.indicator_tx.borrow()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CallEvent> {
        self.inner.events_tx.subscribe()
    }

    /// Whether the local microphone is currently disabled. `false` without a session.
    pub fn is_muted(&self) -> bool {
        lock(&self.inner.slot)
            .session
            .as_ref()
            .is_some_and(|s| !s.media.microphone_enabled.load(Ordering::SeqCst))
    }

    /// Starts a call with a freshly issued credential.
    ///
    /// A no-op while a call is connecting or connected. On failure the
    /// controller is back in `Idle` before this returns, and subscribers
    /// receive [`CallEvent::Failed`] followed by [`CallEvent::Disconnected`].
    /// Returns `Ok(())` if the call was ended while still setting up.
    pub async fn start_call(&self) -> Result<(), CallError> {
        let attempt = {
            let mut slot = lock(&self.inner.slot);
            if self.current_state().is_active() {
                debug!("call already in progress; ignoring start");
                return Ok(());
            }
            slot.attempt += 1;
            self.inner.set_state(CallState::Connecting);
            slot.attempt
        };
        info!(attempt, "starting voice call");

        let credential = match self.inner.source.fetch_credential().await {
            Ok(credential) => credential,
            Err(e) => {
                return if self.inner.fail(attempt, &e, None).await {
                    Err(e)
                } else {
                    Ok(())
                };
            }
        };

        if !self.inner.is_current(attempt) {
            debug!(attempt, "call ended while the credential was in flight");
            return Ok(());
        }

        let transport = self.inner.connector.open();
        // Listen before connecting so no early event is missed.
        let events = transport.subscribe();
        {
            let mut slot = lock(&self.inner.slot);
            if slot.attempt != attempt || !self.current_state().is_active() {
                return Ok(());
            }
            let media = Arc::new(SessionMedia::new(
                self.inner.connector.playback(),
                self.inner.indicator_tx.clone(),
            ));
            let tasks = SessionTasks::spawn(
                Arc::downgrade(&self.inner),
                attempt,
                transport.clone(),
                media.clone(),
                self.inner.matcher.clone(),
                self.inner.poll_interval,
                events,
            );
            slot.session = Some(ActiveSession {
                room_name: credential.room_name.clone(),
                transport: transport.clone(),
                media,
                _tasks: tasks,
            });
        }

        info!(room = %credential.room_name, url = %credential.url, "connecting to voice server");
        if let Err(e) = transport.connect(&credential.url, &credential.token).await {
            let err = CallError::TransportConnect(e);
            return if self.inner.fail(attempt, &err, Some(&transport)).await {
                Err(err)
            } else {
                Ok(())
            };
        }

        if !self.inner.is_current(attempt) {
            // Ended during the handshake; make sure nothing stays joined.
            if let Err(e) = transport.disconnect().await {
                warn!(error = %e, "failed to close transport after cancelled start");
            }
            return Ok(());
        }

        self.inner.mark_connected(attempt);
        Ok(())
    }

    /// Flips the local microphone. A no-op without a session.
    ///
    /// A transport failure is logged and returned; the call continues.
    pub async fn toggle_mute(&self) -> Result<(), CallError> {
        let session = {
            let slot = lock(&self.inner.slot);
            slot.session
                .as_ref()
                .map(|s| (s.transport.clone(), s.media.clone()))
        };
        let Some((transport, media)) = session else {
            debug!("no active call; ignoring mute toggle");
            return Ok(());
        };

        let enable = !media.microphone_enabled.load(Ordering::SeqCst);
        if let Err(e) = transport.set_microphone_enabled(enable).await {
            warn!(error = %e, enable, "failed to toggle microphone");
            return Err(CallError::Transport(e));
        }
        media.microphone_enabled.store(enable, Ordering::SeqCst);

        let local_speaking = transport.local_participant().is_speaking;
        media.update(|s| s.on_microphone_toggled(enable, local_speaking));
        info!(microphone_enabled = enable, "microphone toggled");
        Ok(())
    }

    /// Ends the current call, if any. Always succeeds; transport errors
    /// during teardown are logged.
    pub async fn end_call(&self) {
        match self.inner.finish(None, DisconnectReason::UserEnded) {
            Teardown::AlreadyEnded => debug!("no active call to end"),
            Teardown::Ended(None) => info!("call cancelled before the transport was opened"),
            Teardown::Ended(Some(session)) => {
                let transport = session.transport.clone();
                drop(session);
                if let Err(e) = transport.disconnect().await {
                    warn!(error = %e, "transport teardown failed");
                }
                info!("call ended by user");
            }
        }
    }
}

impl Shared {
    fn set_state(&self, state: CallState) {
        self.state_tx.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                debug!(from = ?*current, to = ?state, "call state changed");
                *current = state;
                true
            }
        });
    }

    fn is_current(&self, attempt: u64) -> bool {
        let slot = lock(&self.slot);
        slot.attempt == attempt && self.state_tx.borrow().is_active()
    }

    /// Moves a connecting attempt to `Connected` and starts it neutral.
    fn mark_connected(&self, attempt: u64) {
        let slot = lock(&self.slot);
        if slot.attempt != attempt || *self.state_tx.borrow() != CallState::Connecting {
            return;
        }
        self.set_state(CallState::Connected);
        match &slot.session {
            Some(session) => {
                info!(room = %session.room_name, "voice call connected");
                session.media.update(SpeakingState::reset);
            }
            None => publish(&self.indicator_tx, None),
        }
    }

    /// Ends `attempt` (or whatever attempt is current) and notifies
    /// subscribers. Only the first caller for an attempt gets `Ended`.
    fn finish(&self, attempt: Option<u64>, reason: DisconnectReason) -> Teardown {
        let mut slot = lock(&self.slot);
        if attempt.is_some_and(|a| a != slot.attempt) || !self.state_tx.borrow().is_active() {
            return Teardown::AlreadyEnded;
        }

        let session = slot.session.take();
        if let Some(session) = &session {
            session.media.close();
        }
        self.set_state(CallState::Disconnected);
        publish(&self.indicator_tx, None);
        self.set_state(CallState::Idle);

        if let DisconnectReason::SetupFailed { error, details } = &reason {
            let _ = self.events_tx.send(CallEvent::Failed {
                error: error.clone(),
                details: details.clone(),
            });
        }
        let _ = self.events_tx.send(CallEvent::Disconnected {
            room_name: session.as_ref().map(|s| s.room_name.clone()),
            reason,
        });

        Teardown::Ended(session)
    }

    /// Fails a starting attempt. Returns `false` if it had already ended.
    async fn fail(
        &self,
        attempt: u64,
        err: &CallError,
        transport: Option<&Arc<dyn Transport>>,
    ) -> bool {
        let reason = DisconnectReason::SetupFailed {
            error: err.to_string(),
            details: err.details().map(str::to_string),
        };
        match self.finish(Some(attempt), reason) {
            Teardown::AlreadyEnded => false,
            Teardown::Ended(session) => {
                error!(error = %err, "voice call setup failed");
                drop(session);
                if let Some(transport) = transport {
                    if let Err(e) = transport.disconnect().await {
                        warn!(error = %e, "failed to release transport after setup failure");
                    }
                }
                true
            }
        }
    }
}

/// Resources bound to one connected (or connecting) call.
struct ActiveSession {
    room_name: String,
    transport: Arc<dyn Transport>,
    media: Arc<SessionMedia>,
    _tasks: SessionTasks,
}

impl Drop for ActiveSession {
    fn drop(&mut self) {
        self.media.close();
    }
}

/// Abort handles of the per-session tasks; aborts them on drop.
struct SessionTasks {
    handles: Vec<AbortHandle>,
}

impl SessionTasks {
    fn spawn(
        shared: Weak<Shared>,
        attempt: u64,
        transport: Arc<dyn Transport>,
        media: Arc<SessionMedia>,
        matcher: Arc<dyn AgentMatcher>,
        poll_interval: Duration,
        events: broadcast::Receiver<TransportEvent>,
    ) -> Self {
        let pump = tokio::spawn(run_event_pump(
            shared,
            attempt,
            transport.clone(),
            media.clone(),
            matcher,
            events,
        ));
        let poller = tokio::spawn(run_poller(transport, media, poll_interval));

        Self {
            handles: vec![pump.abort_handle(), poller.abort_handle()],
        }
    }
}

impl Drop for SessionTasks {
    fn drop(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

/// Speaking facts and the agent playback element of one session.
struct SessionMedia {
    state: Mutex<MediaState>,
    playback: Arc<dyn AudioPlayback>,
    microphone_enabled: AtomicBool,
    indicator_tx: Arc<watch::Sender<Option<Indicator>>>,
}

#[derive(Default)]
struct MediaState {
    speaking: SpeakingState,
    agent_track: Option<TrackInfo>,
    closed: bool,
}

impl SessionMedia {
    fn new(
        playback: Arc<dyn AudioPlayback>,
        indicator_tx: Arc<watch::Sender<Option<Indicator>>>,
    ) -> Self {
        Self {
            state: Mutex::new(MediaState::default()),
            playback,
            microphone_enabled: AtomicBool::new(true),
            indicator_tx,
        }
    }

    /// Mutates the speaking facts and publishes the resulting indicator.
    fn update(&self, f: impl FnOnce(&mut SpeakingState)) {
        let mut state = lock(&self.state);
        if state.closed {
            return;
        }
        f(&mut state.speaking);
        publish(&self.indicator_tx, state.speaking.indicator());
    }

    /// Applies one poll sample of local speech and agent playback.
    fn sample(&self, local_producing: bool) {
        let mut state = lock(&self.state);
        if state.closed {
            return;
        }
        if state.agent_track.is_some() {
            let audible = self.playback.status().is_audible();
            state.speaking.on_agent_sample(audible);
        }
        let local_producing = local_producing && self.microphone_enabled.load(Ordering::SeqCst);
        state.speaking.on_local_sample(local_producing);
        publish(&self.indicator_tx, state.speaking.indicator());
    }

    /// Routes the agent's track to the playback element, replacing any
    /// previous one.
    fn attach_agent_track(&self, track: &TrackInfo) {
        let mut state = lock(&self.state);
        if state.closed {
            return;
        }
        if let Err(e) = self.playback.attach(track) {
            warn!(error = %e, track = %track.sid, "failed to play agent audio");
            return;
        }
        if let Some(previous) = state.agent_track.replace(track.clone()) {
            debug!(previous = %previous.sid, current = %track.sid, "replaced agent audio track");
        }
        info!(track = %track.sid, "agent audio attached");
    }

    fn release_agent_track(&self, track: &TrackInfo) {
        let mut state = lock(&self.state);
        if state.closed {
            return;
        }
        if state.agent_track.as_ref().is_some_and(|t| t.sid == track.sid) {
            self.playback.detach();
            state.agent_track = None;
            info!(track = %track.sid, "agent audio detached");
        }
        state.speaking.on_agent_track_removed();
        publish(&self.indicator_tx, state.speaking.indicator());
    }

    /// Stops all further updates and releases the playback element.
    fn close(&self) {
        let mut state = lock(&self.state);
        if state.closed {
            return;
        }
        state.closed = true;
        state.agent_track = None;
        state.speaking.reset();
        self.playback.detach();
    }
}

async fn run_event_pump(
    shared: Weak<Shared>,
    attempt: u64,
    transport: Arc<dyn Transport>,
    media: Arc<SessionMedia>,
    matcher: Arc<dyn AgentMatcher>,
    mut events: broadcast::Receiver<TransportEvent>,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "transport events dropped; speaking state may lag");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => TransportEvent::Disconnected {
                reason: Some("transport event stream closed".to_string()),
            },
        };
        let Some(controller) = shared.upgrade() else {
            return;
        };

        match event {
            TransportEvent::ConnectionStateChanged(state) => {
                debug!(?state, "transport connection state changed");
                if state == ConnectionState::Connected {
                    controller.mark_connected(attempt);
                }
            }
            TransportEvent::Connected => controller.mark_connected(attempt),
            TransportEvent::Disconnected { reason } => {
                info!(reason = reason.as_deref().unwrap_or("unspecified"), "transport disconnected");
                controller.finish(Some(attempt), DisconnectReason::TransportClosed(reason));
                return;
            }
            TransportEvent::TrackSubscribed { track, participant } => {
                if track.kind == TrackKind::Audio
                    && !participant.is_local
                    && matcher.is_agent(&participant)
                {
                    media.attach_agent_track(&track);
                }
            }
            TransportEvent::TrackUnsubscribed { track, participant } => {
                if track.kind == TrackKind::Audio && !participant.is_local {
                    media.release_agent_track(&track);
                }
            }
            TransportEvent::ActiveSpeakersChanged(speakers) => {
                let local = transport.local_participant();
                let microphone_enabled = media.microphone_enabled.load(Ordering::SeqCst);
                media.update(|s| {
                    s.on_active_speakers(&speakers, &local, microphone_enabled, matcher.as_ref())
                });
            }
            TransportEvent::ParticipantConnected(participant) => {
                info!(
                    identity = %participant.identity,
                    name = participant.name.as_deref().unwrap_or(""),
                    agent = matcher.is_agent(&participant),
                    "participant joined"
                );
            }
        }
    }
}

async fn run_poller(transport: Arc<dyn Transport>, media: Arc<SessionMedia>, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let local = transport.local_participant();
        let tracks = transport.local_audio_tracks();
        media.sample(local_producing_speech(&local, &tracks));
    }
}

fn publish(tx: &watch::Sender<Option<Indicator>>, indicator: Option<Indicator>) {
    tx.send_if_modified(|current| {
        if *current == indicator {
            false
        } else {
            debug!(
                indicator = indicator.map_or("none", Indicator::as_str),
                "indicator changed"
            );
            *current = indicator;
            true
        }
    });
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            error!("call controller lock poisoned, recovering");
            poisoned.into_inner()
        }
    }
}
