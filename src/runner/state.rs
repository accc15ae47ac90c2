//! Run lifecycle.
//!
//! ```text
//! Idle -> FrequencyResolved -> PasswordObtained -> Connected -> PerScriptLoop -> Closed
//!   |             |  \                |
//!   v             v   `-> NothingScheduled (empty catalog)
//! Failed <--------+-------------------+
//! ```

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    FrequencyResolved,
    PasswordObtained,
    Connected,
    PerScriptLoop,
    Closed,
    /// Empty catalog; nothing to do
    NothingScheduled,
    /// A precondition failed
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunState::Closed | RunState::NothingScheduled | RunState::Failed
        )
    }

    /// Status code for a terminal state; `None` while the run is in flight.
    pub fn status_code(self) -> Option<i32> {
        match self {
            RunState::Closed | RunState::NothingScheduled => Some(0),
            RunState::Failed => Some(1),
            _ => None,
        }
    }

    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        matches!(
            (self, next),
            (Idle, FrequencyResolved)
                | (Idle, Failed)
                | (FrequencyResolved, NothingScheduled)
                | (FrequencyResolved, PasswordObtained)
                | (FrequencyResolved, Failed)
                | (PasswordObtained, Connected)
                | (PasswordObtained, Failed)
                | (Connected, PerScriptLoop)
                | (PerScriptLoop, Closed)
        )
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Idle => "idle",
            RunState::FrequencyResolved => "frequency_resolved",
            RunState::PasswordObtained => "password_obtained",
            RunState::Connected => "connected",
            RunState::PerScriptLoop => "per_script_loop",
            RunState::Closed => "closed",
            RunState::NothingScheduled => "nothing_scheduled",
            RunState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidTransition {
    pub from: RunState,
    pub to: RunState,
}

impl fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid run transition {} -> {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

/// Current state plus every state visited, in order.
#[derive(Debug, Clone)]
pub struct StateMachine {
    current: RunState,
    history: Vec<RunState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            current: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    pub fn current(&self) -> RunState {
        self.current
    }

    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    pub fn advance(&mut self, next: RunState) -> Result<(), InvalidTransition> {
        if !self.current.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.current,
                to: next,
            });
        }
        tracing::debug!(from = %self.current, to = %next, "Run state transition");
        self.current = next;
        self.history.push(next);
        Ok(())
    }
}
