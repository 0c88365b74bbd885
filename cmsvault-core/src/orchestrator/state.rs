//! Run state machine.

use serde::{Deserialize, Serialize};

/// Position of a run in the backup pipeline.
///
/// Runs move forward one step at a time; any state may jump to `Done`
/// when a fatal failure ends the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Init,
    Validating,
    Discovering,
    BackingUp,
    Reporting,
    Done,
}

impl RunState {
    /// The state following this one in a successful run
    pub fn next(self) -> Option<Self> {
        match self {
            RunState::Init => Some(RunState::Validating),
            RunState::Validating => Some(RunState::Discovering),
            RunState::Discovering => Some(RunState::BackingUp),
            RunState::BackingUp => Some(RunState::Reporting),
            RunState::Reporting => Some(RunState::Done),
            RunState::Done => None,
        }
    }

    /// True when `target` is reachable from this state in one step
    pub fn can_transition_to(self, target: Self) -> bool {
        self.next() == Some(target) || (target == RunState::Done && self != RunState::Done)
    }

    /// True for the terminal state
    pub fn is_terminal(self) -> bool {
        self == RunState::Done
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunState::Init => write!(f, "init"),
            RunState::Validating => write!(f, "validating"),
            RunState::Discovering => write!(f, "discovering"),
            RunState::BackingUp => write!(f, "backing_up"),
            RunState::Reporting => write!(f, "reporting"),
            RunState::Done => write!(f, "done"),
        }
    }
}
