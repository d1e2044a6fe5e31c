use std::sync::Arc;

use crate::graph::{Graph, GraphBuilder};
use crate::task::Phase;
use crate::tasks::*;

/// The request machine: build, generate, parse, then success, one repair, or fallback.
pub fn build_request_graph() -> Graph {
    GraphBuilder::new("summary_request")
        .add_task(Arc::new(BuildPromptTask))
        .add_task(Arc::new(GenerateTask))
        .add_task(Arc::new(ParseTask))
        .add_task(Arc::new(RepairRetryTask))
        .add_task(Arc::new(SuccessTask))
        .add_task(Arc::new(DegradedFallbackTask))
        .add_edge(Phase::BuildPrompt, Phase::Generate)
        .add_edge(Phase::Generate, Phase::Parse)
        .add_edge(Phase::RepairRetry, Phase::Generate)
        .set_start_task(Phase::BuildPrompt)
        .build()
}
