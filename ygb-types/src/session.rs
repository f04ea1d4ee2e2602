//! Session state machine.
//!
//! ```text
//! Shutdown --start--> Running
//! Running  --pause--> Paused
//! Running  --error--> Aborted
//! Running  --shutdown--> Shutdown
//! Paused   --start--> Running
//! Paused   --error--> Aborted
//! Paused   --shutdown--> Shutdown
//! Aborted  --shutdown--> Shutdown
//! ```
//!
//! The executor owns the only authoritative copy. Everything else mirrors it
//! from broadcasts.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    /// Powered off, no emulation.
    #[default]
    Shutdown,
    Running,
    /// Frozen, single-stepping allowed.
    Paused,
    /// A core fault happened. Only `shutdown` leaves this state.
    Aborted,
}

/// Control requests that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Start,
    Pause,
    Step,
    Shutdown,
}

/// Outcome of applying a [`Control`] to a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Enter this state (possibly the current one).
    Move(SessionState),
    /// Keep the current state and warn.
    Stay(&'static str),
    /// Keep the current state and fail the request.
    Reject(&'static str),
}

const ABORTED: &str = "emulator has been aborted! restart first!";

impl SessionState {
    pub const ALL: [SessionState; 4] = [
        SessionState::Shutdown,
        SessionState::Running,
        SessionState::Paused,
        SessionState::Aborted,
    ];

    /// Numeric value used by the save file format.
    pub fn as_u64(self) -> u64 {
        match self {
            SessionState::Shutdown => 0,
            SessionState::Running => 1,
            SessionState::Paused => 2,
            SessionState::Aborted => 3,
        }
    }

    pub fn from_u64(value: u64) -> Option<Self> {
        Self::ALL.get(usize::try_from(value).ok()?).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            SessionState::Shutdown => "shutdown",
            SessionState::Running => "running",
            SessionState::Paused => "paused",
            SessionState::Aborted => "aborted",
        }
    }

    pub fn is_running(self) -> bool {
        self == SessionState::Running
    }

    pub fn apply(self, control: Control) -> Transition {
        use SessionState::*;
        match (control, self) {
            (Control::Start, Aborted) => Transition::Reject(ABORTED),
            (Control::Start, Running) => Transition::Stay("emulator has been started!"),
            (Control::Start, Shutdown | Paused) => Transition::Move(Running),

            (Control::Pause, Aborted) => Transition::Stay(ABORTED),
            (Control::Pause, Shutdown) => Transition::Stay("emulator has been shutdown! boot first!"),
            (Control::Pause, Paused) => Transition::Stay("emulator has been paused!"),
            (Control::Pause, Running) => Transition::Move(Paused),

            (Control::Step, Aborted) => Transition::Stay("step when aborted! restart first!"),
            (Control::Step, _) => Transition::Move(Paused),

            (Control::Shutdown, _) => Transition::Move(Shutdown),
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_values_round_trip() {
        for state in SessionState::ALL {
            assert_eq!(SessionState::from_u64(state.as_u64()), Some(state));
        }
        assert_eq!(SessionState::Paused.as_u64(), 2);
        assert_eq!(SessionState::from_u64(4), None);
        assert_eq!(SessionState::from_u64(u64::MAX), None);
    }

    #[test]
    fn start_pause_table() {
        use SessionState::*;
        assert_eq!(Shutdown.apply(Control::Start), Transition::Move(Running));
        assert_eq!(Paused.apply(Control::Start), Transition::Move(Running));
        assert!(matches!(Running.apply(Control::Start), Transition::Stay(_)));
        assert!(matches!(Aborted.apply(Control::Start), Transition::Reject(_)));

        assert_eq!(Running.apply(Control::Pause), Transition::Move(Paused));
        for state in [Shutdown, Paused, Aborted] {
            assert!(matches!(state.apply(Control::Pause), Transition::Stay(_)));
        }
    }

    #[test]
    fn only_shutdown_leaves_aborted() {
        let aborted = SessionState::Aborted;
        for control in [Control::Start, Control::Pause, Control::Step] {
            assert!(!matches!(aborted.apply(control), Transition::Move(_)));
        }
        assert_eq!(
            aborted.apply(Control::Shutdown),
            Transition::Move(SessionState::Shutdown)
        );
    }

    #[test]
    fn serializes_lowercase() {
        let json = serde_json::to_string(&SessionState::Aborted).unwrap();
        assert_eq!(json, "\"aborted\"");
    }
}
