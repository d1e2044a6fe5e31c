use async_trait::async_trait;

use crate::context::RequestContext;
use crate::error::{FlowError, Result};
use crate::models::Reply;
use crate::task::{NextAction, Phase, Task, TaskResult};

/// Records the accepted output as an assistant turn and ends the request.
pub struct SuccessTask;

#[async_trait]
impl Task for SuccessTask {
    fn phase(&self) -> Phase {
        Phase::Success
    }

    async fn run(&self, ctx: &mut RequestContext<'_>) -> Result<TaskResult> {
        let reply = if let Some(summary) = ctx.summary.take() {
            ctx.conversation.add_assistant_summary(summary.clone());
            Reply::Summary(summary)
        } else if let Some((text, truncated)) = ctx.answer.take() {
            ctx.conversation.add_assistant_message(text.clone());
            Reply::Answer { text, truncated }
        } else {
            return Err(FlowError::MissingState {
                phase: Phase::Success,
                missing: "an accepted output",
            });
        };

        ctx.reply = Some(reply);
        Ok(TaskResult::new(NextAction::End))
    }
}
