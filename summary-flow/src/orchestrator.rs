use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::context::{FlowEnv, FlowStatus, RequestContext, StatusHandle};
use crate::conversation::{ConversationState, SourceDocument};
use crate::error::{FlowError, Result};
use crate::graph::Graph;
use crate::models::Reply;
use crate::workflow::build_request_graph;

/// Drives one document session: the initial summary and every follow-up after it.
///
/// Operations take `&mut self`, so a session never runs two requests at once.
/// Sharing one backend across sessions is the backend's concern (see
/// [`SingleFlight`](crate::backend::SingleFlight)).
pub struct Orchestrator {
    env: Arc<FlowEnv>,
    graph: Arc<Graph>,
    conversation: Option<ConversationState>,
    status: watch::Sender<FlowStatus>,
}

impl Orchestrator {
    pub fn new(env: Arc<FlowEnv>) -> Self {
        Self::with_graph(env, Arc::new(build_request_graph()))
    }

    pub fn with_graph(env: Arc<FlowEnv>, graph: Arc<Graph>) -> Self {
        let (status, _) = watch::channel(FlowStatus::Idle);
        Self {
            env,
            graph,
            conversation: None,
            status,
        }
    }

    /// Start a new conversation for `text`, discarding any previous one, and
    /// summarise it.
    pub async fn submit_document(
        &mut self,
        text: impl Into<String>,
        image: Option<PathBuf>,
    ) -> Result<Reply> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(FlowError::EmptyInput("document text"));
        }

        let document = SourceDocument::new(text, image);
        info!(document_id = %document.id, chars = document.text.len(), "Document submitted");
        self.conversation = Some(ConversationState::new(document));
        self.run().await
    }

    /// Ask a question about the active document.
    pub async fn ask(&mut self, question: &str) -> Result<Reply> {
        let question = question.trim();
        if question.is_empty() {
            return Err(FlowError::EmptyInput("question"));
        }
        let conversation = self
            .conversation
            .as_mut()
            .ok_or(FlowError::NoActiveDocument)?;
        conversation.add_user_message(question);
        self.run().await
    }

    pub fn conversation(&self) -> Option<&ConversationState> {
        self.conversation.as_ref()
    }

    pub fn env(&self) -> &Arc<FlowEnv> {
        &self.env
    }

    pub fn status_handle(&self) -> StatusHandle {
        StatusHandle::new(self.status.subscribe())
    }

    async fn run(&mut self) -> Result<Reply> {
        let conversation = self
            .conversation
            .as_mut()
            .ok_or(FlowError::NoActiveDocument)?;

        let mut ctx = RequestContext::new(&self.env, conversation, &self.status);
        let outcome = self.graph.execute(&mut ctx).await;
        let reply = ctx.reply.take();
        self.status.send_replace(FlowStatus::Idle);

        outcome?;
        reply.ok_or(FlowError::NoReply)
    }
}
