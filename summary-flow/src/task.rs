use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{context::RequestContext, error::Result};

/// Repair re-prompts allowed per request, on top of the first generation.
pub const MAX_REPAIR_ATTEMPTS: u8 = 1;

/// One state of the request machine. Each phase is served by exactly one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    BuildPrompt,
    Generate,
    Parse,
    RepairRetry,
    Success,
    DegradedFallback,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BuildPrompt => "build_prompt",
            Self::Generate => "generate",
            Self::Parse => "parse",
            Self::RepairRetry => "repair_retry",
            Self::Success => "success",
            Self::DegradedFallback => "degraded_fallback",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a task execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskResult {
    /// Next action to take
    pub next_action: NextAction,
    /// Optional progress note, logged by the graph
    pub status_message: Option<String>,
}

impl TaskResult {
    pub fn new(next_action: NextAction) -> Self {
        Self {
            next_action,
            status_message: None,
        }
    }

    pub fn new_with_status(next_action: NextAction, status_message: impl Into<String>) -> Self {
        Self {
            next_action,
            status_message: Some(status_message.into()),
        }
    }
}

/// Defines what should happen after a task completes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextAction {
    /// Follow the default edge out of the current phase
    Continue,
    /// Jump to a specific phase
    GoTo(Phase),
    /// End the request
    End,
}

/// Core trait that all tasks must implement
#[async_trait]
pub trait Task: Send + Sync {
    /// The phase this task serves
    fn phase(&self) -> Phase;

    /// Execute the task against the request context
    async fn run(&self, ctx: &mut RequestContext<'_>) -> Result<TaskResult>;
}
