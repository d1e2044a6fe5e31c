use async_trait::async_trait;
use tracing::{info, warn};

use crate::context::{Failure, RequestContext};
use crate::error::{FlowError, Result};
use crate::extract::{extract, strip_wrapping_tag};
use crate::models::{ParseOutcome, ReasonCode};
use crate::prompt::PromptKind;
use crate::task::{MAX_REPAIR_ATTEMPTS, NextAction, Phase, Task, TaskResult};

/// Runs the extractor and chooses between success, repair and fallback.
pub struct ParseTask;

#[async_trait]
impl Task for ParseTask {
    fn phase(&self) -> Phase {
        Phase::Parse
    }

    async fn run(&self, ctx: &mut RequestContext<'_>) -> Result<TaskResult> {
        let generation = ctx.generation.take().ok_or(FlowError::MissingState {
            phase: Phase::Parse,
            missing: "a generation",
        })?;

        let failure = match ctx.kind {
            PromptKind::InitialSynthesis => match extract(&generation.raw_text, generation.truncated) {
                ParseOutcome::Success(summary) => {
                    ctx.summary = Some(summary);
                    None
                }
                ParseOutcome::Degraded { reason, issues, .. } => Some(Failure { reason, issues }),
                ParseOutcome::Empty(reason) => Some(Failure {
                    reason,
                    issues: Vec::new(),
                }),
            },
            PromptKind::FollowUp => {
                let text = strip_wrapping_tag(&generation.raw_text);
                if text.is_empty() {
                    let reason = if generation.truncated {
                        ReasonCode::TruncatedBeforeClose
                    } else {
                        ReasonCode::EmptyOutput
                    };
                    Some(Failure {
                        reason,
                        issues: Vec::new(),
                    })
                } else {
                    ctx.answer = Some((text.to_string(), generation.truncated));
                    None
                }
            }
        };

        let Some(failure) = failure else {
            info!(kind = %ctx.kind, attempt = ctx.attempt(), "Output accepted");
            return Ok(TaskResult::new(NextAction::GoTo(Phase::Success)));
        };

        let retry = failure.reason.is_repairable() && ctx.repair_attempts < MAX_REPAIR_ATTEMPTS;
        warn!(
            reason = %failure.reason,
            issues = failure.issues.len(),
            attempt = ctx.attempt(),
            retry,
            "Output rejected"
        );
        ctx.failure = Some(failure);

        let next = if retry {
            Phase::RepairRetry
        } else {
            Phase::DegradedFallback
        };
        Ok(TaskResult::new_with_status(
            NextAction::GoTo(next),
            format!("routing to {next}"),
        ))
    }
}
