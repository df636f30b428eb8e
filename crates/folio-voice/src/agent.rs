use folio_types::ParticipantInfo;

/// Markers matched by [`IdentityMarkers::default`]. The portfolio agent
/// joins under its generic role or under the site owner's first name.
pub const DEFAULT_AGENT_MARKERS: &[&str] = &["agent", "john"];

/// Decides whether a remote participant is the voice agent.
///
/// Only participants classified as the agent feed the "talking" side of the
/// indicator; every other remote participant is ignored.
pub trait AgentMatcher: Send + Sync {
    fn is_agent(&self, participant: &ParticipantInfo) -> bool;
}

impl<F> AgentMatcher for F
where
    F: Fn(&ParticipantInfo) -> bool + Send + Sync,
{
    fn is_agent(&self, participant: &ParticipantInfo) -> bool {
        self(participant)
    }
}

/// Case-insensitive substring match of any marker against a remote
/// participant's identity or display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMarkers {
    markers: Vec<String>,
}

impl IdentityMarkers {
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.as_ref().trim().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    fn matches(&self, value: &str) -> bool {
        let value = value.to_lowercase();
        self.markers.iter().any(|m| value.contains(m.as_str()))
    }
}

impl Default for IdentityMarkers {
    fn default() -> Self {
        Self::new(DEFAULT_AGENT_MARKERS)
    }
}

impl AgentMatcher for IdentityMarkers {
    fn is_agent(&self, participant: &ParticipantInfo) -> bool {
        if participant.is_local {
            return false;
        }
        self.matches(&participant.identity)
            || participant.name.as_deref().is_some_and(|n| self.matches(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_identity_case_insensitively() {
        let matcher = IdentityMarkers::default();
        assert!(matcher.is_agent(&ParticipantInfo::remote("agent-42")));
        assert!(matcher.is_agent(&ParticipantInfo::remote("Voice-AGENT")));
        assert!(!matcher.is_agent(&ParticipantInfo::remote("user-x1y2z3")));
    }

    #[test]
    fn default_markers_match_owner_name() {
        let matcher = IdentityMarkers::default();
        assert!(matcher.is_agent(&ParticipantInfo::remote("john-voice")));
        assert!(!matcher.is_agent(&ParticipantInfo::local("john")));
    }

    #[test]
    fn matches_display_name() {
        let matcher = IdentityMarkers::new(["john"]);
        let participant = ParticipantInfo::remote("PA_8sd7f").with_name("John's Assistant");
        assert!(matcher.is_agent(&participant));
    }

    #[test]
    fn never_matches_local_participant() {
        let matcher = IdentityMarkers::default();
        assert!(!matcher.is_agent(&ParticipantInfo::local("agent-local")));
    }

    #[test]
    fn blank_markers_are_dropped() {
        let matcher = IdentityMarkers::new(["", "  "]);
        assert!(!matcher.is_agent(&ParticipantInfo::remote("anyone")));
    }

    #[test]
    fn closures_are_matchers() {
        let matcher = |p: &ParticipantInfo| p.identity == "bot";
        assert!(matcher.is_agent(&ParticipantInfo::remote("bot")));
        assert!(!matcher.is_agent(&ParticipantInfo::remote("bot-2")));
    }
}
