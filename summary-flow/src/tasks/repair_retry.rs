use async_trait::async_trait;
use tracing::info;

use crate::context::RequestContext;
use crate::error::{FlowError, Result};
use crate::models::GenerationRequest;
use crate::prompt::render_repair;
use crate::task::{NextAction, Phase, Task, TaskResult};

/// Amends the original prompt with the diagnosis and the rejected output.
pub struct RepairRetryTask;

#[async_trait]
impl Task for RepairRetryTask {
    fn phase(&self) -> Phase {
        Phase::RepairRetry
    }

    async fn run(&self, ctx: &mut RequestContext<'_>) -> Result<TaskResult> {
        let missing = |what| FlowError::MissingState {
            phase: Phase::RepairRetry,
            missing: what,
        };
        let original = ctx.prompt.as_deref().ok_or_else(|| missing("a prompt"))?;
        let reason = ctx
            .failure
            .as_ref()
            .map(|failure| failure.reason)
            .ok_or_else(|| missing("a failure diagnosis"))?;
        let image = ctx.request.as_ref().and_then(|request| request.image.clone());

        let prompt = render_repair(
            original,
            ctx.kind,
            reason,
            ctx.last_raw.as_deref().unwrap_or_default(),
        );
        ctx.request = Some(
            GenerationRequest::new(prompt, ctx.env.profile.max_new_tokens()).with_image(image),
        );
        ctx.repair_attempts += 1;

        info!(%reason, attempt = ctx.attempt(), "Re-prompting with repair instructions");
        Ok(TaskResult::new(NextAction::Continue))
    }
}
