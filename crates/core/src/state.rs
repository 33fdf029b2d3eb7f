// Player session lifecycle states

use std::fmt;

/// Lifecycle state of the player session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No engine and no render target exist
    Uninitialized,
    /// Engine and render target exist; nothing is playing
    Ready,
    /// New media is being loaded and prepared
    Loading,
    /// Play intent is set
    Playing,
    /// Play intent is cleared after having played
    Paused,
    /// Resources are being torn down; left immediately for `Uninitialized`
    Disposed,
}

impl SessionState {
    /// True while an engine and a render target are owned
    pub fn has_session(self) -> bool {
        !matches!(self, SessionState::Uninitialized | SessionState::Disposed)
    }

    /// States from which play/pause/switch may be issued
    pub fn accepts_transport(self) -> bool {
        matches!(
            self,
            SessionState::Ready | SessionState::Playing | SessionState::Paused
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Ready => "ready",
            SessionState::Loading => "loading",
            SessionState::Playing => "playing",
            SessionState::Paused => "paused",
            SessionState::Disposed => "disposed",
        }
    }

    /// Check whether moving from `self` to `to` is a legal transition
    pub fn can_transition_to(self, to: SessionState) -> bool {
        use SessionState::*;

        match (self, to) {
            // Dispose is reachable from anywhere
            (_, Disposed) => true,

            // From Uninitialized
            (Uninitialized, Ready) => true,

            // From Ready
            (Ready, Loading) => true,
            (Ready, Playing) => true,
            (Ready, Paused) => true,

            // From Loading
            (Loading, Ready) => true,
            (Loading, Playing) => true,

            // From Playing
            (Playing, Paused) => true,
            (Playing, Ready) => true, // stopped for a switch
            (Playing, Loading) => true,

            // From Paused
            (Paused, Playing) => true,
            (Paused, Ready) => true, // stopped for a switch
            (Paused, Loading) => true,

            // From Disposed
            (Disposed, Uninitialized) => true,

            _ => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ownership_by_state() {
        assert!(!SessionState::Uninitialized.has_session());
        assert!(!SessionState::Disposed.has_session());
        assert!(SessionState::Loading.has_session());
        assert!(!SessionState::Loading.accepts_transport());
        assert!(SessionState::Paused.accepts_transport());
    }

    #[test]
    fn test_dispose_reachable_from_every_state() {
        for state in [
            SessionState::Uninitialized,
            SessionState::Ready,
            SessionState::Loading,
            SessionState::Playing,
            SessionState::Paused,
        ] {
            assert!(state.can_transition_to(SessionState::Disposed), "{state}");
        }
    }

    #[test]
    fn test_restart_goes_through_uninitialized() {
        assert!(!SessionState::Disposed.can_transition_to(SessionState::Ready));
        assert!(SessionState::Disposed.can_transition_to(SessionState::Uninitialized));
        assert!(SessionState::Uninitialized.can_transition_to(SessionState::Ready));
    }

    #[test]
    fn test_loading_only_resolves_to_ready_or_playing() {
        assert!(SessionState::Loading.can_transition_to(SessionState::Ready));
        assert!(SessionState::Loading.can_transition_to(SessionState::Playing));
        assert!(!SessionState::Loading.can_transition_to(SessionState::Paused));
    }
}
