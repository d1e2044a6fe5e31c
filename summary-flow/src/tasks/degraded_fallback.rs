use async_trait::async_trait;
use tracing::warn;

use crate::context::RequestContext;
use crate::error::{FlowError, Result};
use crate::models::Reply;
use crate::task::{NextAction, Phase, Task, TaskResult};

/// Hands back the raw text, flagged as unstructured. Nothing is appended to the
/// conversation.
pub struct DegradedFallbackTask;

#[async_trait]
impl Task for DegradedFallbackTask {
    fn phase(&self) -> Phase {
        Phase::DegradedFallback
    }

    async fn run(&self, ctx: &mut RequestContext<'_>) -> Result<TaskResult> {
        let failure = ctx.failure.take().ok_or(FlowError::MissingState {
            phase: Phase::DegradedFallback,
            missing: "a failure diagnosis",
        })?;

        warn!(
            reason = %failure.reason,
            attempts = ctx.attempt(),
            document_id = %ctx.conversation.document().id,
            "Returning unstructured output"
        );

        ctx.reply = Some(Reply::Degraded {
            raw_text: ctx.last_raw.take().unwrap_or_default(),
            reason: failure.reason,
            issues: failure.issues,
            attempts: ctx.attempt(),
        });
        Ok(TaskResult::new(NextAction::End))
    }
}
