//! Per-request lifecycle.

use std::fmt;

use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

/// Where a request is in its lifecycle.
///
/// `Received → Classified → PlanBuilt → Executing → Succeeded | PartiallyFailed | Failed`.
/// Any non-terminal state may also move straight to `Failed`, and commands
/// finish directly from `Classified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Received,
    Classified,
    PlanBuilt,
    Executing,
    Succeeded,
    PartiallyFailed,
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::PartiallyFailed | Self::Failed)
    }

    /// Whether `next` is a legal successor of this state.
    pub fn can_transition_to(self, next: RequestState) -> bool {
        use RequestState::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Received, Classified) => true,
            (Classified, PlanBuilt) => true,
            (Classified, Succeeded) => true,
            (PlanBuilt, Executing) => true,
            (Executing, Succeeded) | (Executing, PartiallyFailed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::Classified => "classified",
            Self::PlanBuilt => "plan_built",
            Self::Executing => "executing",
            Self::Succeeded => "succeeded",
            Self::PartiallyFailed => "partially_failed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks one request's state transitions and elapsed time.
#[derive(Debug)]
pub struct RequestTrace {
    sender: String,
    state: RequestState,
    history: Vec<RequestState>,
    started: Instant,
}

impl RequestTrace {
    pub fn start(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            state: RequestState::Received,
            history: vec![RequestState::Received],
            started: Instant::now(),
        }
    }

    pub fn state(&self) -> RequestState {
        self.state
    }

    pub fn history(&self) -> &[RequestState] {
        &self.history
    }

    pub fn started(&self) -> Instant {
        self.started
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Move to `next`. Illegal transitions are ignored and logged.
    pub fn advance(&mut self, next: RequestState) {
        if !self.state.can_transition_to(next) {
            debug!(
                "Ignoring illegal transition {} -> {} for {}",
                self.state, next, self.sender
            );
            return;
        }
        debug!("Request from {}: {} -> {}", self.sender, self.state, next);
        self.state = next;
        self.history.push(next);
    }
}
