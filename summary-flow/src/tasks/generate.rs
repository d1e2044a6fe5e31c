use async_trait::async_trait;
use tracing::{error, info};

use crate::context::RequestContext;
use crate::error::{FlowError, Result};
use crate::task::{NextAction, Phase, Task, TaskResult};

/// The only suspension point of a request. Backend failures escalate unchanged.
pub struct GenerateTask;

#[async_trait]
impl Task for GenerateTask {
    fn phase(&self) -> Phase {
        Phase::Generate
    }

    async fn run(&self, ctx: &mut RequestContext<'_>) -> Result<TaskResult> {
        let request = ctx.request.as_ref().ok_or(FlowError::MissingState {
            phase: Phase::Generate,
            missing: "a generation request",
        })?;

        let generation = ctx.env.backend.generate(request).await.map_err(|e| {
            error!(error = %e, attempt = ctx.attempt(), "Generation backend failed");
            FlowError::from(e)
        })?;

        info!(
            chars = generation.raw_text.len(),
            truncated = generation.truncated,
            "Generation finished"
        );

        if !generation.raw_text.trim().is_empty() {
            ctx.last_raw = Some(generation.raw_text.clone());
        }
        ctx.generation = Some(generation);

        Ok(TaskResult::new(NextAction::Continue))
    }
}
