use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::Arc;
use summary_flow::{
    BackendError, FlowEnv, FlowError, InMemorySessionStorage, Orchestrator, Session, SessionStorage,
    SingleFlight,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::{
    backend::OpenRouterBackend,
    config::ServiceConfig,
    models::{FollowUpRequest, ReplyResponse, SessionResponse, SummarizeRequest},
    templates::load_templates,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<Value>)>;
type ApiError = (StatusCode, Json<Value>);

fn bad_request_error(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message })))
}

fn not_found_error(message: &str, id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": message,
            "session_id": id
        })),
    )
}

fn bad_gateway_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::BAD_GATEWAY,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn internal_error(message: &str, details: &str) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": message,
            "details": details
        })),
    )
}

fn flow_error(e: FlowError, session_id: &str) -> ApiError {
    match &e {
        FlowError::Backend(BackendError::ImageUnreadable { .. }) => {
            warn!(session_id = %session_id, error = %e, "Rejected image reference");
            bad_request_error(&e.to_string())
        }
        FlowError::Backend(_) => {
            error!(session_id = %session_id, error = %e, "Generation backend failed");
            bad_gateway_error("Generation backend unavailable", &e.to_string())
        }
        FlowError::EmptyInput(_) | FlowError::NoActiveDocument => {
            warn!(session_id = %session_id, error = %e, "Rejected request");
            bad_request_error(&e.to_string())
        }
        FlowError::SessionNotFound(_) => not_found_error("Session not found", session_id),
        _ => {
            error!(session_id = %session_id, error = %e, "Request failed");
            internal_error("Request failed", &e.to_string())
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub session_storage: Arc<dyn SessionStorage>,
    pub env: Arc<FlowEnv>,
    /// Directory that request image paths must resolve into. `None` rejects images.
    pub image_dir: Option<PathBuf>,
}

impl AppState {
    pub fn new(env: Arc<FlowEnv>) -> Self {
        Self {
            session_storage: Arc::new(InMemorySessionStorage::new()),
            env,
            image_dir: None,
        }
    }

    pub fn with_image_dir(mut self, image_dir: Option<PathBuf>) -> Self {
        self.image_dir = image_dir;
        self
    }
}

pub fn create_app(config: &ServiceConfig) -> anyhow::Result<Router> {
    let backend = OpenRouterBackend::new(config)?;
    let env = FlowEnv::new(
        Arc::new(SingleFlight::new(backend)),
        load_templates(&config.prompt_dir),
        config.profile,
    );
    let state = AppState::new(Arc::new(env)).with_image_dir(config.image_dir.clone());
    Ok(build_router(state))
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/summaries", post(create_summary))
        .route(
            "/summaries/{session_id}",
            get(get_session_status).delete(delete_session),
        )
        .route("/summaries/{session_id}/follow-up", post(follow_up))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> Json<Value> {
    Json(json!({
        "service": "Medical Summary Service",
        "version": "0.1.0",
        "description": "Plain-language summaries of medical documents with grounded follow-up questions",
        "endpoints": {
            "POST /summaries": "Submit a document and get its summary",
            "POST /summaries/{session_id}/follow-up": "Ask a question about the document",
            "GET /summaries/{session_id}": "Get session status and latest summary",
            "DELETE /summaries/{session_id}": "Discard a session",
            "GET /health": "Health check"
        }
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

async fn create_summary(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> ApiResult<ReplyResponse> {
    if request.text.trim().is_empty() {
        return Err(bad_request_error("No text was provided to analyze"));
    }
    let image = resolve_image(&state, request.image_path).await?;

    let session = Session::new(Orchestrator::new(state.env.clone()));
    let session_id = session.id.clone();
    let orchestrator = session.orchestrator.clone();

    state.session_storage.save(session).await.map_err(|e| {
        error!("Failed to create session: {}", e);
        internal_error("Failed to create session", &e.to_string())
    })?;
    info!(session_id = %session_id, chars = request.text.len(), "Session created");

    let reply = orchestrator
        .lock()
        .await
        .submit_document(request.text, image)
        .await
        .map_err(|e| flow_error(e, &session_id))?;

    info!(session_id = %session_id, structured = reply.is_structured(), "Summary request finished");
    Ok(Json(ReplyResponse::new(session_id, reply)))
}

async fn follow_up(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(request): Json<FollowUpRequest>,
) -> ApiResult<ReplyResponse> {
    let session = find_session(&state, &session_id).await?;

    let reply = session
        .orchestrator
        .lock()
        .await
        .ask(&request.question)
        .await
        .map_err(|e| flow_error(e, &session_id))?;

    info!(session_id = %session_id, structured = reply.is_structured(), "Follow-up answered");
    Ok(Json(ReplyResponse::new(session_id, reply)))
}

async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let session = find_session(&state, &session_id).await?;
    let status = session.status.current();

    // A running request holds the lock; report status alone rather than wait for it.
    let (turns, document_id, latest_summary) = match session.orchestrator.try_lock() {
        Ok(orchestrator) => match orchestrator.conversation() {
            Some(conversation) => (
                Some(conversation.len()),
                Some(conversation.document().id.to_string()),
                conversation.latest_summary().cloned(),
            ),
            None => (Some(0), None, None),
        },
        Err(_) => (None, None, None),
    };

    Ok(Json(SessionResponse {
        session_id,
        status,
        created_at: session.created_at,
        turns,
        document_id,
        latest_summary,
    }))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> ApiResult<Value> {
    match state.session_storage.delete(&session_id).await {
        Ok(true) => {
            info!(session_id = %session_id, "Session deleted");
            Ok(Json(json!({ "session_id": session_id, "deleted": true })))
        }
        Ok(false) => Err(not_found_error("Session not found", &session_id)),
        Err(e) => Err(internal_error("Failed to delete session", &e.to_string())),
    }
}

/// Confine a client-supplied image path to the configured image directory.
/// Relative paths are taken relative to that directory.
async fn resolve_image(
    state: &AppState,
    requested: Option<PathBuf>,
) -> Result<Option<PathBuf>, ApiError> {
    let Some(requested) = requested else {
        return Ok(None);
    };
    let Some(image_dir) = &state.image_dir else {
        warn!(path = %requested.display(), "Image supplied but IMAGE_DIR is not configured");
        return Err(bad_request_error("Image input is not enabled on this server"));
    };

    let unreadable = |path: &PathBuf, source: std::io::Error| {
        let e = BackendError::ImageUnreadable {
            path: path.clone(),
            source,
        };
        warn!(error = %e, "Rejected image reference");
        bad_request_error(&e.to_string())
    };

    let root = tokio::fs::canonicalize(image_dir).await.map_err(|e| {
        error!(image_dir = %image_dir.display(), error = %e, "Image directory is unavailable");
        internal_error("Image directory is unavailable", &e.to_string())
    })?;
    let resolved = tokio::fs::canonicalize(root.join(&requested))
        .await
        .map_err(|e| unreadable(&requested, e))?;

    if !resolved.starts_with(&root) {
        warn!(path = %requested.display(), "Image path escapes IMAGE_DIR");
        return Err(bad_request_error(
            "Image path is outside the configured image directory",
        ));
    }
    Ok(Some(resolved))
}

async fn find_session(state: &AppState, session_id: &str) -> Result<Session, ApiError> {
    match state.session_storage.get(session_id).await {
        Ok(Some(session)) => Ok(session),
        Ok(None) => Err(not_found_error("Session not found", session_id)),
        Err(e) => {
            error!("Failed to load session {}: {}", session_id, e);
            Err(internal_error("Failed to load session", &e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use summary_flow::{
        GenerationBackend, GenerationRequest, GenerationResult, PromptTemplates, ResolvedProfile,
        resolve_profile,
    };
    use tower::ServiceExt;

    const VALID: &str = r#"{"key_takeaways": ["Cholesterol is slightly high"], "medications": [{"name": "Atorvastatin", "explanation": "Lowers cholesterol"}], "term_definitions": {"LDL": "The cholesterol that clogs arteries"}, "follow_up_questions": ["Should I change my diet?"]}"#;

    struct ScriptedBackend {
        script: Mutex<VecDeque<Result<GenerationResult, BackendError>>>,
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> Result<GenerationResult, BackendError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::Unavailable("connection refused".into())))
        }
    }

    fn app_state(
        script: Vec<Result<GenerationResult, BackendError>>,
        profile: ResolvedProfile,
    ) -> AppState {
        let backend = ScriptedBackend {
            script: Mutex::new(script.into()),
        };
        let env = FlowEnv::new(
            Arc::new(SingleFlight::new(backend)),
            PromptTemplates::builtin(),
            profile,
        );
        AppState::new(Arc::new(env))
    }

    fn app(script: Vec<Result<GenerationResult, BackendError>>) -> Router {
        build_router(app_state(script, ResolvedProfile::default()))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    #[tokio::test]
    async fn health_and_root() {
        let app = app(vec![]);
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = send(&app, "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["endpoints"]["POST /summaries"].is_string());
    }

    #[tokio::test]
    async fn summary_follow_up_and_delete() {
        let app = app(vec![
            Ok(GenerationResult::complete(VALID)),
            Ok(GenerationResult::complete("<answer>Yes, less saturated fat.</answer>")),
        ]);

        let (status, body) = send(
            &app,
            "POST",
            "/summaries",
            Some(json!({ "text": "LDL 160 mg/dL. Start atorvastatin 20mg." })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["structured"], true);
        assert_eq!(body["reply"]["kind"], "summary");
        assert_eq!(body["reply"]["medications"][0]["name"], "Atorvastatin");
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "POST",
            &format!("/summaries/{session_id}/follow-up"),
            Some(json!({ "question": "Should I change my diet?" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reply"]["kind"], "answer");
        assert_eq!(body["reply"]["text"], "Yes, less saturated fat.");

        let (status, body) = send(&app, "GET", &format!("/summaries/{session_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"]["state"], "idle");
        assert_eq!(body["turns"], 4);
        assert_eq!(
            body["latest_summary"]["key_takeaways"][0],
            "Cholesterol is slightly high"
        );

        let (status, _) = send(&app, "DELETE", &format!("/summaries/{session_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, "GET", &format!("/summaries/{session_id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn degraded_reply_is_ok_but_unstructured() {
        let app = app(vec![
            Ok(GenerationResult::complete("I cannot produce JSON.")),
            Ok(GenerationResult::complete("Still prose.")),
        ]);

        let (status, body) = send(&app, "POST", "/summaries", Some(json!({ "text": "Report" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["structured"], false);
        assert_eq!(body["reply"]["kind"], "degraded");
        assert_eq!(body["reply"]["reason"], "unparseable");
        assert_eq!(body["reply"]["raw_text"], "Still prose.");
        assert_eq!(body["reply"]["attempts"], 2);
    }

    #[tokio::test]
    async fn error_statuses() {
        let app = app(vec![]);

        let (status, body) = send(&app, "POST", "/summaries", Some(json!({ "text": "  " }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No text was provided to analyze");

        let (status, _) = send(&app, "POST", "/summaries", Some(json!({ "text": "Report" }))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let (status, body) = send(
            &app,
            "POST",
            "/summaries/unknown/follow-up",
            Some(json!({ "question": "Why?" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["session_id"], "unknown");

        let (status, _) = send(&app, "DELETE", "/summaries/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let vlm = build_router(app_state(
            vec![Err(BackendError::ImageUnreadable {
                path: PathBuf::from("/scans/missing.png"),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            })],
            resolve_profile("LOW", "VLM"),
        ));
        let (status, body) = send(&vlm, "POST", "/summaries", Some(json!({ "text": "Report" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("/scans/missing.png"));
    }

    #[tokio::test]
    async fn image_paths_are_confined_to_image_dir() {
        let dir = std::env::temp_dir().join(format!("images-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("scan.png"), b"png").await.unwrap();

        let vlm = build_router(
            app_state(
                vec![Ok(GenerationResult::complete(VALID))],
                resolve_profile("LOW", "VLM"),
            )
            .with_image_dir(Some(dir.clone())),
        );

        let (status, _) = send(
            &vlm,
            "POST",
            "/summaries",
            Some(json!({ "text": "Report", "image_path": "missing.png" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &vlm,
            "POST",
            "/summaries",
            Some(json!({ "text": "Report", "image_path": "../" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Image path is outside the configured image directory");

        let (status, body) = send(
            &vlm,
            "POST",
            "/summaries",
            Some(json!({ "text": "Report", "image_path": "scan.png" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["structured"], true);

        let disabled = app(vec![]);
        let (status, body) = send(
            &disabled,
            "POST",
            "/summaries",
            Some(json!({ "text": "Report", "image_path": dir.join("scan.png") })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Image input is not enabled on this server");

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn blank_question_is_rejected() {
        let app = app(vec![Ok(GenerationResult::complete(VALID))]);
        let (_, body) = send(&app, "POST", "/summaries", Some(json!({ "text": "Report" }))).await;
        let session_id = body["session_id"].as_str().unwrap().to_string();

        let (status, _) = send(
            &app,
            "POST",
            &format!("/summaries/{session_id}/follow-up"),
            Some(json!({ "question": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
