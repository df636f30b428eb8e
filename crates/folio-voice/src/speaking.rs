//! Speaking facts and the conversational indicator derived from them.
//!
//! [`SpeakingState`] is a pure reducer: the controller feeds it transport
//! events and poll samples, and reads [`SpeakingState::indicator`] after
//! every update. It holds no timers and performs no I/O.

use crate::agent::AgentMatcher;
use folio_types::{Indicator, LocalAudioTrack, ParticipantInfo};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeakingState {
    user_speaking: bool,
    agent_speaking: bool,
}

impl SpeakingState {
    pub fn user_speaking(&self) -> bool {
        self.user_speaking
    }

    pub fn agent_speaking(&self) -> bool {
        self.agent_speaking
    }

    /// `Talking` if the agent speaks, else `Listening` if the user speaks.
    pub fn indicator(&self) -> Option<Indicator> {
        Indicator::from_speaking(self.user_speaking, self.agent_speaking)
    }

    /// Recomputes both facts from a new active-speaker set. A muted
    /// microphone never counts as user speech.
    pub fn on_active_speakers(
        &mut self,
        speakers: &[ParticipantInfo],
        local: &ParticipantInfo,
        microphone_enabled: bool,
        matcher: &dyn AgentMatcher,
    ) {
        self.agent_speaking = speakers
            .iter()
            .filter(|p| !p.is_local)
            .any(|p| matcher.is_agent(p));
        let local_in_set = speakers.iter().any(|p| p.is_local);
        self.user_speaking =
            microphone_enabled && (local.is_speaking || local_in_set) && !self.agent_speaking;
    }

    /// Muting clears user speech at once; unmuting seeds it from the local
    /// participant's current speaking flag.
    pub fn on_microphone_toggled(&mut self, enabled: bool, local_speaking: bool) {
        self.user_speaking = enabled && local_speaking;
    }

    /// Applies a poll sample of the local participant. Ignored while the
    /// agent is speaking.
    pub fn on_local_sample(&mut self, producing_speech: bool) {
        if !self.agent_speaking {
            self.user_speaking = producing_speech;
        }
    }

    /// Applies a poll sample of the agent playback element.
    pub fn on_agent_sample(&mut self, audible: bool) {
        self.agent_speaking = audible;
    }

    pub fn on_agent_track_removed(&mut self) {
        self.agent_speaking = false;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Whether the local participant is producing audible speech right now:
/// speaking, microphone enabled, and its first audio track not muted.
pub fn local_producing_speech(local: &ParticipantInfo, tracks: &[LocalAudioTrack]) -> bool {
    let muted = tracks.first().is_some_and(|t| t.is_muted);
    local.is_speaking && local.is_microphone_enabled && !muted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::IdentityMarkers;

    fn local(speaking: bool) -> ParticipantInfo {
        ParticipantInfo::local("user-abc123").speaking(speaking)
    }

    #[test]
    fn agent_in_active_set_wins_over_user() {
        let matcher = IdentityMarkers::default();
        let mut state = SpeakingState::default();
        let speakers = vec![ParticipantInfo::remote("agent-42"), local(true)];

        state.on_active_speakers(&speakers, &local(true), true, &matcher);

        assert!(state.agent_speaking());
        assert!(!state.user_speaking());
        assert_eq!(state.indicator(), Some(Indicator::Talking));
    }

    #[test]
    fn local_in_active_set_means_listening() {
        let matcher = IdentityMarkers::default();
        let mut state = SpeakingState::default();

        state.on_active_speakers(&[local(false)], &local(false), true, &matcher);
        assert_eq!(state.indicator(), Some(Indicator::Listening));

        state.on_active_speakers(&[], &local(true), true, &matcher);
        assert_eq!(state.indicator(), Some(Indicator::Listening));

        state.on_active_speakers(&[], &local(false), true, &matcher);
        assert_eq!(state.indicator(), None);
    }

    #[test]
    fn non_agent_remote_speakers_are_ignored() {
        let matcher = IdentityMarkers::default();
        let mut state = SpeakingState::default();
        state.on_active_speakers(
            &[ParticipantInfo::remote("observer-1")],
            &local(false),
            true,
            &matcher,
        );
        assert_eq!(state.indicator(), None);
    }

    #[test]
    fn muted_microphone_ignores_active_speaker_updates() {
        let matcher = IdentityMarkers::default();
        let mut state = SpeakingState::default();
        state.on_microphone_toggled(false, true);

        state.on_active_speakers(&[local(true)], &local(true), false, &matcher);
        assert!(!state.user_speaking());
        assert_eq!(state.indicator(), None);

        let speakers = vec![ParticipantInfo::remote("agent-42"), local(true)];
        state.on_active_speakers(&speakers, &local(true), false, &matcher);
        assert_eq!(state.indicator(), Some(Indicator::Talking));
    }

    #[test]
    fn mute_forces_user_silent() {
        let mut state = SpeakingState::default();
        state.on_local_sample(true);
        assert_eq!(state.indicator(), Some(Indicator::Listening));

        state.on_microphone_toggled(false, true);
        assert_eq!(state.indicator(), None);

        state.on_microphone_toggled(true, true);
        assert_eq!(state.indicator(), Some(Indicator::Listening));
    }

    #[test]
    fn local_samples_suppressed_while_agent_speaks() {
        let mut state = SpeakingState::default();
        state.on_agent_sample(true);
        state.on_local_sample(true);
        assert!(!state.user_speaking());
        assert_eq!(state.indicator(), Some(Indicator::Talking));

        state.on_agent_track_removed();
        state.on_local_sample(true);
        assert_eq!(state.indicator(), Some(Indicator::Listening));
    }

    #[test]
    fn reset_clears_both_facts() {
        let mut state = SpeakingState::default();
        state.on_local_sample(true);
        state.on_agent_sample(true);
        state.reset();
        assert_eq!(state, SpeakingState::default());
    }

    #[test]
    fn muted_track_is_not_speech() {
        let speaking = local(true);
        assert!(local_producing_speech(&speaking, &[]));
        assert!(!local_producing_speech(
            &speaking,
            &[LocalAudioTrack {
                sid: "TR_1".into(),
                is_muted: true
            }]
        ));

        let mut mic_off = speaking.clone();
        mic_off.is_microphone_enabled = false;
        assert!(!local_producing_speech(&mic_off, &[]));
    }
}
