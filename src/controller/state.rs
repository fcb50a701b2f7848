//! Controller transition table

use crate::types::ControllerState;

impl ControllerState {
    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(self, next: ControllerState) -> bool {
        use ControllerState::*;

        if next == Disconnected {
            return true;
        }

        matches!(
            (self, next),
            (Init, Waiting)
                | (Disconnected, Waiting)
                | (Waiting, Connected)
                | (Connected, Waiting)
                | (Waiting, InLobby)
                | (InLobby, InLobby)
                | (InLobby, Waiting)
                | (Waiting, Ready)
                | (Waiting, InGame)
                | (Ready, InGame)
                | (Ready, InLobby)
                | (InGame, InLobby)
        )
    }

    /// Matching policy and profile may only change between attempts
    pub fn allows_policy_change(self) -> bool {
        matches!(
            self,
            ControllerState::Init | ControllerState::InLobby | ControllerState::Disconnected
        )
    }

    /// Whether the participant sits in a joined session
    pub fn in_session(self) -> bool {
        matches!(self, ControllerState::Ready | ControllerState::InGame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ControllerState::*;

    const ALL: [ControllerState; 7] = [Init, Connected, InLobby, Ready, InGame, Disconnected, Waiting];

    #[test]
    fn test_happy_path_is_legal() {
        let path = [Init, Waiting, Connected, Waiting, InLobby, InLobby, Waiting, Ready, InGame];
        for pair in path.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{} -> {} should be legal",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_any_state_can_disconnect() {
        for state in ALL {
            assert!(state.can_transition_to(Disconnected));
        }
    }

    #[test]
    fn test_no_skipping_or_backtracking() {
        assert!(!Init.can_transition_to(Connected));
        assert!(!Init.can_transition_to(InLobby));
        assert!(!Connected.can_transition_to(InLobby));
        assert!(!InLobby.can_transition_to(Ready));
        assert!(!InLobby.can_transition_to(InGame));
        assert!(!InGame.can_transition_to(Ready));
        assert!(!Ready.can_transition_to(Waiting));
        assert!(!Disconnected.can_transition_to(InLobby));
        assert!(!InGame.can_transition_to(Init));
    }

    #[test]
    fn test_session_leave_reenters_lobby() {
        assert!(Ready.can_transition_to(InLobby));
        assert!(InGame.can_transition_to(InLobby));
    }

    #[test]
    fn test_policy_guard() {
        assert!(Init.allows_policy_change());
        assert!(InLobby.allows_policy_change());
        assert!(Disconnected.allows_policy_change());
        assert!(!Waiting.allows_policy_change());
        assert!(!Ready.allows_policy_change());
        assert!(!InGame.allows_policy_change());
    }
}
