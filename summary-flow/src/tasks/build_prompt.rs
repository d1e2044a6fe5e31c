use async_trait::async_trait;
use tracing::{info, warn};

use crate::context::RequestContext;
use crate::error::{FlowError, Result};
use crate::models::GenerationRequest;
use crate::prompt::PromptKind;
use crate::task::{NextAction, Phase, Task, TaskResult};

/// Picks the template from conversation state and builds the first request.
pub struct BuildPromptTask;

#[async_trait]
impl Task for BuildPromptTask {
    fn phase(&self) -> Phase {
        Phase::BuildPrompt
    }

    async fn run(&self, ctx: &mut RequestContext<'_>) -> Result<TaskResult> {
        let env = ctx.env;
        let document = ctx.conversation.document().clone();

        // A follow-up needs a summary to embed. Without one the request falls back to
        // initial synthesis over the same document.
        let prompt = match ctx.conversation.latest_summary() {
            Some(summary) => {
                let question =
                    ctx.conversation
                        .last_user_message()
                        .ok_or(FlowError::MissingState {
                            phase: Phase::BuildPrompt,
                            missing: "a user question",
                        })?;
                ctx.kind = PromptKind::FollowUp;
                env.templates.render_follow_up(
                    &document,
                    summary,
                    &ctx.conversation.history_transcript(),
                    question,
                )
            }
            None => {
                ctx.kind = PromptKind::InitialSynthesis;
                env.templates.render_initial(&document)
            }
        };

        let image = match &document.image {
            Some(path) if env.profile.accepts_images => Some(path.clone()),
            Some(path) => {
                warn!(
                    image = %path.display(),
                    mode = ?env.profile.mode,
                    "Model mode does not accept images, ignoring image reference"
                );
                None
            }
            None => None,
        };

        info!(
            kind = %ctx.kind,
            prompt_chars = prompt.len(),
            has_image = image.is_some(),
            "Prompt built"
        );

        ctx.request = Some(
            GenerationRequest::new(prompt.clone(), env.profile.max_new_tokens()).with_image(image),
        );
        ctx.prompt = Some(prompt);

        Ok(TaskResult::new(NextAction::Continue))
    }
}
