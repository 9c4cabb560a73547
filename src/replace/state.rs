use std::fmt;

/// Progress of one replacement. States only move forward; `Failed` can be
/// entered from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementState {
    Resolved,
    Stopping,
    Stopped,
    Creating,
    Running,
    Failed,
}

impl ReplacementState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Running | Self::Failed)
    }

    /// Returns `true` if `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: ReplacementState) -> bool {
        use ReplacementState::*;
        match (self, next) {
            (Running | Failed, _) => false,
            (_, Failed) => true,
            (Resolved, Stopping)
            | (Stopping, Stopped)
            | (Stopped, Creating)
            | (Creating, Running) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ReplacementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Resolved => "resolved",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Creating => "creating",
            Self::Running => "running",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Tracks and logs the state of a single replacement.
#[derive(Debug)]
pub(crate) struct ReplacementTracker {
    instance_id: String,
    state: ReplacementState,
}

impl ReplacementTracker {
    pub fn new(instance_id: &str) -> Self {
        tracing::info!(instance_id, state = %ReplacementState::Resolved, "replacement started");
        Self {
            instance_id: instance_id.to_string(),
            state: ReplacementState::Resolved,
        }
    }

    pub fn state(&self) -> ReplacementState {
        self.state
    }

    pub fn advance(&mut self, next: ReplacementState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal replacement transition {} -> {}",
            self.state,
            next
        );
        tracing::info!(
            instance_id = %self.instance_id,
            from = %self.state,
            to = %next,
            "replacement state changed"
        );
        self.state = next;
    }

    pub fn fail(&mut self, error: &dyn std::error::Error) {
        if self.state.is_terminal() {
            return;
        }
        tracing::error!(
            instance_id = %self.instance_id,
            from = %self.state,
            error = %error,
            "replacement failed"
        );
        self.state = ReplacementState::Failed;
    }
}
