use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;

use crate::backend::GenerationBackend;
use crate::conversation::ConversationState;
use crate::models::{FieldIssue, GenerationRequest, GenerationResult, ReasonCode, Reply, StructuredSummary};
use crate::profile::ResolvedProfile;
use crate::prompt::{PromptKind, PromptTemplates};
use crate::task::Phase;

/// Everything a request needs that outlives the request: the backend, the prompt
/// templates and the resolved profile. Immutable once built.
pub struct FlowEnv {
    pub backend: Arc<dyn GenerationBackend>,
    pub templates: PromptTemplates,
    pub profile: ResolvedProfile,
}

impl FlowEnv {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        templates: PromptTemplates,
        profile: ResolvedProfile,
    ) -> Self {
        Self {
            backend,
            templates,
            profile,
        }
    }
}

/// Side-channel progress flag for one orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FlowStatus {
    #[default]
    Idle,
    Running { phase: Phase, attempt: u8 },
}

impl FlowStatus {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// Pollable view of a [`FlowStatus`]. Cheap to clone, never blocks.
#[derive(Debug, Clone)]
pub struct StatusHandle(watch::Receiver<FlowStatus>);

impl StatusHandle {
    pub(crate) fn new(receiver: watch::Receiver<FlowStatus>) -> Self {
        Self(receiver)
    }

    pub fn current(&self) -> FlowStatus {
        *self.0.borrow()
    }

    pub fn is_busy(&self) -> bool {
        self.current().is_busy()
    }

    /// Wait for the next status change.
    pub async fn changed(&mut self) -> bool {
        self.0.changed().await.is_ok()
    }
}

/// Why the last generation could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub reason: ReasonCode,
    pub issues: Vec<FieldIssue>,
}

/// Typed state shared by the tasks of one request.
pub struct RequestContext<'a> {
    pub env: &'a FlowEnv,
    pub conversation: &'a mut ConversationState,
    status: &'a watch::Sender<FlowStatus>,
    pub kind: PromptKind,
    /// The prompt built for this request, before any repair amendment.
    pub prompt: Option<String>,
    pub request: Option<GenerationRequest>,
    pub generation: Option<GenerationResult>,
    pub summary: Option<StructuredSummary>,
    pub answer: Option<(String, bool)>,
    pub failure: Option<Failure>,
    pub repair_attempts: u8,
    /// Most recent non-blank generation of this request.
    pub last_raw: Option<String>,
    pub reply: Option<Reply>,
}

impl<'a> RequestContext<'a> {
    pub fn new(
        env: &'a FlowEnv,
        conversation: &'a mut ConversationState,
        status: &'a watch::Sender<FlowStatus>,
    ) -> Self {
        Self {
            env,
            conversation,
            status,
            kind: PromptKind::InitialSynthesis,
            prompt: None,
            request: None,
            generation: None,
            summary: None,
            answer: None,
            failure: None,
            repair_attempts: 0,
            last_raw: None,
            reply: None,
        }
    }

    /// 1-based generation attempt the request is on.
    pub fn attempt(&self) -> u8 {
        self.repair_attempts + 1
    }

    pub(crate) fn enter(&self, phase: Phase) {
        self.status.send_replace(FlowStatus::Running {
            phase,
            attempt: self.attempt(),
        });
    }
}
