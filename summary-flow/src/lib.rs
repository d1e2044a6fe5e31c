pub mod backend;
pub mod context;
pub mod conversation;
pub mod error;
pub mod extract;
pub mod graph;
pub mod models;
pub mod orchestrator;
pub mod profile;
pub mod prompt;
pub mod storage;
pub mod task;
pub mod tasks;
pub mod workflow;

// Re-export commonly used types
pub use backend::{GenerationBackend, SingleFlight};
pub use context::{FlowEnv, FlowStatus, RequestContext, StatusHandle};
pub use conversation::{ConversationState, Role, SourceDocument, Turn};
pub use error::{BackendError, FlowError, Result};
pub use extract::extract;
pub use graph::{Graph, GraphBuilder};
pub use models::{
    FieldIssue, GenerationRequest, GenerationResult, IssueKind, Medication, ParseOutcome,
    ReasonCode, Reply, StopCondition, StructuredSummary,
};
pub use orchestrator::Orchestrator;
pub use profile::{GenerationStrategy, ModelMode, ResolvedProfile, ResourceProfile, resolve_profile};
pub use prompt::{PromptKind, PromptTemplates};
pub use storage::{InMemorySessionStorage, Session, SessionStorage};
pub use task::{MAX_REPAIR_ATTEMPTS, NextAction, Phase, Task, TaskResult};
pub use workflow::build_request_graph;
