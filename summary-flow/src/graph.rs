use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    context::RequestContext,
    error::{FlowError, Result},
    task::{NextAction, Phase, Task},
};

/// Hard ceiling on task executions per request, whatever the edges say.
pub const DEFAULT_MAX_STEPS: usize = 16;

/// Default transition between phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edge {
    pub from: Phase,
    pub to: Phase,
}

/// A graph of tasks that can be executed
pub struct Graph {
    pub id: String,
    tasks: HashMap<Phase, Arc<dyn Task>>,
    edges: Vec<Edge>,
    start: Option<Phase>,
    max_steps: usize,
}

impl Graph {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tasks: HashMap::new(),
            edges: Vec::new(),
            start: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Run tasks from the start phase until one ends the request.
    pub async fn execute(&self, ctx: &mut RequestContext<'_>) -> Result<()> {
        let mut phase = self.start.ok_or(FlowError::TaskNotFound(Phase::BuildPrompt))?;
        let mut steps = 0;

        loop {
            steps += 1;
            if steps > self.max_steps {
                return Err(FlowError::StepLimitExceeded(self.max_steps));
            }

            let task = self
                .tasks
                .get(&phase)
                .ok_or(FlowError::TaskNotFound(phase))?;

            ctx.enter(phase);
            info!(
                graph = %self.id,
                %phase,
                attempt = ctx.attempt(),
                document_id = %ctx.conversation.document().id,
                "Entering phase"
            );

            let result = task.run(ctx).await?;
            if let Some(message) = &result.status_message {
                debug!(%phase, message = %message, "Phase finished");
            }

            match result.next_action {
                NextAction::Continue => match self.find_next_task(phase) {
                    Some(next) => phase = next,
                    None => return Ok(()),
                },
                NextAction::GoTo(target) => {
                    if !self.tasks.contains_key(&target) {
                        return Err(FlowError::TaskNotFound(target));
                    }
                    phase = target;
                }
                NextAction::End => return Ok(()),
            }
        }
    }

    /// Find the default successor of a phase
    pub fn find_next_task(&self, current: Phase) -> Option<Phase> {
        self.edges
            .iter()
            .find(|edge| edge.from == current)
            .map(|edge| edge.to)
    }

    pub fn start_phase(&self) -> Option<Phase> {
        self.start
    }

    pub fn get_task(&self, phase: Phase) -> Option<Arc<dyn Task>> {
        self.tasks.get(&phase).cloned()
    }
}

/// Builder for creating graphs
pub struct GraphBuilder {
    graph: Graph,
}

impl GraphBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            graph: Graph::new(id),
        }
    }

    /// Add a task. The first task added becomes the start phase.
    pub fn add_task(mut self, task: Arc<dyn Task>) -> Self {
        let phase = task.phase();
        if self.graph.tasks.is_empty() {
            self.graph.start = Some(phase);
        }
        self.graph.tasks.insert(phase, task);
        self
    }

    pub fn add_edge(mut self, from: Phase, to: Phase) -> Self {
        self.graph.edges.push(Edge { from, to });
        self
    }

    pub fn set_start_task(mut self, phase: Phase) -> Self {
        if self.graph.tasks.contains_key(&phase) {
            self.graph.start = Some(phase);
        }
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.graph.max_steps = max_steps;
        self
    }

    pub fn build(self) -> Graph {
        self.graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{FlowEnv, FlowStatus};
    use crate::conversation::{ConversationState, SourceDocument};
    use crate::error::BackendError;
    use crate::backend::GenerationBackend;
    use crate::models::{GenerationRequest, GenerationResult, Reply};
    use crate::profile::ResolvedProfile;
    use crate::prompt::PromptTemplates;
    use crate::task::TaskResult;
    use async_trait::async_trait;
    use tokio::sync::watch;

    struct NoBackend;

    #[async_trait]
    impl GenerationBackend for NoBackend {
        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> std::result::Result<GenerationResult, BackendError> {
            Err(BackendError::Unavailable("not wired".into()))
        }
    }

    struct StepTask {
        phase: Phase,
        next: NextAction,
    }

    #[async_trait]
    impl Task for StepTask {
        fn phase(&self) -> Phase {
            self.phase
        }

        async fn run(&self, ctx: &mut RequestContext<'_>) -> Result<TaskResult> {
            if self.next == NextAction::End {
                ctx.reply = Some(Reply::Answer {
                    text: format!("ended in {}", self.phase),
                    truncated: false,
                });
            }
            Ok(TaskResult::new(self.next))
        }
    }

    fn step(phase: Phase, next: NextAction) -> Arc<dyn Task> {
        Arc::new(StepTask { phase, next })
    }

    fn env() -> FlowEnv {
        FlowEnv::new(
            Arc::new(NoBackend),
            PromptTemplates::builtin(),
            ResolvedProfile::default(),
        )
    }

    #[tokio::test]
    async fn follows_edges_and_goto() {
        let graph = GraphBuilder::new("test")
            .add_task(step(Phase::BuildPrompt, NextAction::Continue))
            .add_task(step(Phase::Generate, NextAction::GoTo(Phase::Success)))
            .add_task(step(Phase::Success, NextAction::End))
            .add_edge(Phase::BuildPrompt, Phase::Generate)
            .build();

        let env = env();
        let mut conversation = ConversationState::new(SourceDocument::new("doc", None));
        let (status, receiver) = watch::channel(FlowStatus::Idle);
        let mut ctx = RequestContext::new(&env, &mut conversation, &status);

        graph.execute(&mut ctx).await.unwrap();

        assert_eq!(
            ctx.reply,
            Some(Reply::Answer {
                text: "ended in success".into(),
                truncated: false
            })
        );
        assert_eq!(
            *receiver.borrow(),
            FlowStatus::Running {
                phase: Phase::Success,
                attempt: 1
            }
        );
    }

    #[tokio::test]
    async fn cycles_hit_the_step_ceiling() {
        let graph = GraphBuilder::new("loop")
            .add_task(step(Phase::Generate, NextAction::Continue))
            .add_task(step(Phase::Parse, NextAction::Continue))
            .add_edge(Phase::Generate, Phase::Parse)
            .add_edge(Phase::Parse, Phase::Generate)
            .max_steps(5)
            .build();

        let env = env();
        let mut conversation = ConversationState::new(SourceDocument::new("doc", None));
        let (status, _receiver) = watch::channel(FlowStatus::Idle);
        let mut ctx = RequestContext::new(&env, &mut conversation, &status);

        let err = graph.execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, FlowError::StepLimitExceeded(5)));
    }

    #[tokio::test]
    async fn goto_unknown_phase_fails() {
        let graph = GraphBuilder::new("broken")
            .add_task(step(Phase::Parse, NextAction::GoTo(Phase::RepairRetry)))
            .build();

        let env = env();
        let mut conversation = ConversationState::new(SourceDocument::new("doc", None));
        let (status, _receiver) = watch::channel(FlowStatus::Idle);
        let mut ctx = RequestContext::new(&env, &mut conversation, &status);

        let err = graph.execute(&mut ctx).await.unwrap_err();
        assert!(matches!(err, FlowError::TaskNotFound(Phase::RepairRetry)));
    }
}
