use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use summary_flow::{FlowStatus, Reply, StructuredSummary};

#[derive(Debug, Serialize, Deserialize)]
pub struct SummarizeRequest {
    pub text: String,
    #[serde(default)]
    pub image_path: Option<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FollowUpRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct ReplyResponse {
    pub session_id: String,
    /// False when the reply is unstructured fallback text.
    pub structured: bool,
    pub reply: Reply,
}

impl ReplyResponse {
    pub fn new(session_id: impl Into<String>, reply: Reply) -> Self {
        Self {
            session_id: session_id.into(),
            structured: reply.is_structured(),
            reply,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub status: FlowStatus,
    pub created_at: DateTime<Utc>,
    /// Absent while a request is running.
    pub turns: Option<usize>,
    pub document_id: Option<String>,
    pub latest_summary: Option<StructuredSummary>,
}
