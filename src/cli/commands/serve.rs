//! HTTP API server for the video tutor front end.
//!
//! Provides REST endpoints for processing videos, asking questions, searching
//! the transcript index and evaluating quiz answers.

use crate::cli::Output;
use crate::config::Settings;
use crate::error::GlimpseError;
use crate::orchestrator::{Orchestrator, ProcessResult};
use crate::retrieval::StoreState;
use crate::tutor::AskRequest;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let orchestrator = Orchestrator::new(settings).await?;
    let state = Arc::new(AppState { orchestrator });

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Glimpse API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /api/health");
    Output::kv("Process video", "POST /api/process-video");
    Output::kv("Process local", "POST /api/process-local-video");
    Output::kv("Ask", "POST /api/ask-question");
    Output::kv("Search", "POST /api/search");
    Output::kv("Evaluate", "POST /api/evaluate-answer");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, router(state)).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/process-video", post(process_video))
        .route("/api/process-local-video", post(process_local_video))
        .route("/api/ask-question", post(ask_question))
        .route("/api/search", post(search))
        .route("/api/evaluate-answer", post(evaluate_answer))
        .layer(cors)
        .with_state(state)
}

// === Errors ===

/// An error rendered as `{"error": "..."}` with a matching status code.
struct ApiError(GlimpseError);

impl From<GlimpseError> for ApiError {
    fn from(e: GlimpseError) -> Self {
        Self(e)
    }
}

fn status_for(e: &GlimpseError) -> StatusCode {
    match e {
        GlimpseError::InvalidInput(_)
        | GlimpseError::InvalidQuery(_)
        | GlimpseError::InvalidConfiguration(_)
        | GlimpseError::NoRelevantContext => StatusCode::BAD_REQUEST,
        GlimpseError::TranscriptNotFound(_) => StatusCode::NOT_FOUND,
        GlimpseError::NotInitialized => StatusCode::CONFLICT,
        GlimpseError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        GlimpseError::OpenAI(_)
        | GlimpseError::OpenAIRejected(_)
        | GlimpseError::Embedding(_)
        | GlimpseError::Http(_)
        | GlimpseError::TranscriptSource(_)
        | GlimpseError::ToolFailed(_)
        | GlimpseError::Tutor(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

// === Request/Response Types ===

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    index: StoreState,
}

#[derive(Deserialize)]
struct ProcessVideoRequest {
    #[serde(default)]
    url: Option<String>,
}

/// `path` is a bare `.txt`/`.vtt` file name in the transcript directory.
#[derive(Deserialize, Default)]
struct ProcessLocalRequest {
    #[serde(default)]
    path: Option<String>,
}

#[derive(Serialize)]
struct AnswerResponse {
    answer: String,
}

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<SearchHit>,
}

#[derive(Serialize)]
struct SearchHit {
    position: usize,
    content: String,
    distance: f32,
}

#[derive(Deserialize)]
struct EvaluateRequest {
    #[serde(default)]
    question: String,
    #[serde(default)]
    answer: String,
    #[serde(default)]
    context: String,
}

#[derive(Serialize)]
struct FeedbackResponse {
    feedback: String,
}

// === Handlers ===

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        index: state.orchestrator.state().await,
    })
}

async fn process_video(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ProcessVideoRequest>,
) -> ApiResult<ProcessResult> {
    let url = req
        .url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| GlimpseError::InvalidInput("No URL provided".to_string()))?;

    info!("Processing video {}", url);
    Ok(Json(state.orchestrator.process_youtube(&url).await?))
}

async fn process_local_video(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> ApiResult<ProcessResult> {
    let req: ProcessLocalRequest = if body.iter().all(u8::is_ascii_whitespace) {
        ProcessLocalRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| GlimpseError::InvalidInput(format!("Invalid request body: {}", e)))?
    };
    Ok(Json(
        state
            .orchestrator
            .process_local_named(req.path.as_deref())
            .await?,
    ))
}

async fn ask_question(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> ApiResult<AnswerResponse> {
    if req.question.trim().is_empty() || req.summary.trim().is_empty() {
        return Err(GlimpseError::InvalidInput("Question or summary missing".to_string()).into());
    }

    let answer = state.orchestrator.ask(&req).await?;
    Ok(Json(AnswerResponse { answer }))
}

async fn search(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SearchRequest>,
) -> ApiResult<SearchResponse> {
    let hits = state.orchestrator.search(&req.query, req.k).await?;
    Ok(Json(SearchResponse {
        results: hits
            .into_iter()
            .map(|n| SearchHit {
                position: n.position,
                content: n.text,
                distance: n.distance,
            })
            .collect(),
    }))
}

async fn evaluate_answer(
    State(state): State<Arc<AppState>>,
    Json(req): Json<EvaluateRequest>,
) -> ApiResult<FeedbackResponse> {
    let feedback = state
        .orchestrator
        .evaluate(&req.question, &req.answer, &req.context)
        .await?;
    Ok(Json(FeedbackResponse { feedback }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexBackendKind;
    use crate::embedding::testing::FakeEmbedder;
    use crate::retrieval::{IndexBackend, RetrievalStore};
    use crate::transcript::Transcript;
    use crate::tutor::{StudyGuide, Tutor};
    use crate::vector_store::DistanceMetric;
    use async_trait::async_trait;

    struct CannedTutor;

    #[async_trait]
    impl Tutor for CannedTutor {
        async fn study_guide(&self, _transcript: &Transcript) -> crate::Result<StudyGuide> {
            Ok(StudyGuide {
                summary: "summary".to_string(),
                quiz_questions: Vec::new(),
            })
        }

        async fn answer(&self, _request: &AskRequest, chunks: &[String]) -> crate::Result<String> {
            Ok(chunks.join(" / "))
        }

        async fn evaluate(&self, _q: &str, _a: &str, _c: &str) -> crate::Result<String> {
            Ok("well done".to_string())
        }
    }

    fn state() -> Arc<AppState> {
        state_with(Settings::default())
    }

    fn state_with(mut settings: Settings) -> Arc<AppState> {
        settings.retrieval.chunk_size = 4;
        settings.retrieval.chunk_overlap = 2;
        settings.retrieval.backend = IndexBackendKind::Memory;

        let store = RetrievalStore::new(
            Arc::new(FakeEmbedder::new(&["a", "b", "c", "d", "e", "f", "g", "h"])),
            IndexBackend::memory(DistanceMetric::Cosine),
            &settings,
        )
        .unwrap();

        Arc::new(AppState {
            orchestrator: Orchestrator::with_components(settings, store, Arc::new(CannedTutor)),
        })
    }

    fn ask(question: &str) -> AskRequest {
        AskRequest {
            summary: "summary".to_string(),
            current_screenshot: Some("aGVsbG8=".to_string()),
            ..AskRequest::new(question)
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status_for(&GlimpseError::NotInitialized), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&GlimpseError::InvalidQuery("k".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&GlimpseError::Timeout("slow".to_string())),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&GlimpseError::BuildFailed("x".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&GlimpseError::OpenAI("quota".to_string())),
            StatusCode::BAD_GATEWAY
        );
    }

    #[tokio::test]
    async fn test_ask_before_processing_is_conflict() {
        let response = ask_question(State(state()), Json(ask("a b")))
            .await
            .map(|_| ())
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_process_then_ask_and_search() {
        let state = state();
        state
            .orchestrator
            .process_transcript(Transcript::from_text("t", "A B C D E F G H"))
            .await
            .unwrap();

        let Json(health) = health(State(state.clone())).await;
        assert!(matches!(
            health.index,
            StoreState::Ready { chunk_count: 3, .. }
        ));

        let Json(answer) = ask_question(State(state.clone()), Json(ask("g h")))
            .await
            .map_err(|e| e.0)
            .unwrap();
        assert!(answer.answer.starts_with("E F G H"));

        let Json(found) = search(
            State(state.clone()),
            Json(SearchRequest {
                query: "a b".to_string(),
                k: Some(1),
            }),
        )
        .await
        .map_err(|e| e.0)
        .unwrap();
        assert_eq!(found.results.len(), 1);
        assert_eq!(found.results[0].content, "A B C D");
    }

    #[tokio::test]
    async fn test_missing_url_is_bad_request() {
        let response = process_video(State(state()), Json(ProcessVideoRequest { url: None }))
            .await
            .map(|_| ())
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_local_video_rejects_bad_body() {
        let response = process_local_video(State(state()), Bytes::from_static(b"{not json"))
            .await
            .map(|_| ())
            .unwrap_err()
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_process_video_rejects_local_paths() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "A B C D").unwrap();

        for url in ["/etc/passwd", file.path().to_str().unwrap()] {
            let response = process_video(
                State(state()),
                Json(ProcessVideoRequest {
                    url: Some(url.to_string()),
                }),
            )
            .await
            .map(|_| ())
            .unwrap_err()
            .into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[tokio::test]
    async fn test_local_video_is_confined_to_transcript_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lecture.txt"), "A B C D E F G H").unwrap();
        let outside = tempfile::tempdir().unwrap();
        let secret = outside.path().join("secret.txt");
        std::fs::write(&secret, "E F G H").unwrap();

        let mut settings = Settings::default();
        settings.transcript.local_path =
            dir.path().join("transcript.txt").to_string_lossy().into_owned();
        let state = state_with(settings);

        for path in [secret.to_str().unwrap(), "/etc/passwd", "../secret.txt"] {
            let body = serde_json::to_vec(&serde_json::json!({ "path": path })).unwrap();
            let response = process_local_video(State(state.clone()), Bytes::from(body))
                .await
                .map(|_| ())
                .unwrap_err()
                .into_response();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", path);
        }
        assert!(matches!(state.orchestrator.state().await, StoreState::Empty));

        let Json(result) = process_local_video(
            State(state.clone()),
            Bytes::from_static(br#"{"path": "lecture.txt"}"#),
        )
        .await
        .map_err(|e| e.0)
        .unwrap();
        assert_eq!(result.video_id, "lecture.txt");
        assert_eq!(result.chunks_indexed, 3);
    }

    #[tokio::test]
    async fn test_evaluate_answer() {
        let Json(feedback) = evaluate_answer(
            State(state()),
            Json(EvaluateRequest {
                question: "Q".to_string(),
                answer: "A".to_string(),
                context: String::new(),
            }),
        )
        .await
        .map_err(|e| e.0)
        .unwrap();
        assert_eq!(feedback.feedback, "well done");
    }

    #[test]
    fn test_router_builds() {
        let _ = router(state());
    }
}
