use crate::{
    create_success_response, display_text,
    error::{validation_error, ApiResult},
};
use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use bearmobile_common::{ApiResponse, ConversationTurn, ModelChoice, ModelProvider};
use bearmobile_core::SupportCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub const MAX_MESSAGE_CHARS: usize = 10_000;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateSessionRequest {
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub model: ModelChoice,
    pub model_label: &'static str,
    pub first_question: bool,
    pub messages: Vec<ConversationTurn>,
}

#[derive(Debug, Deserialize)]
pub struct SetModelRequest {
    pub model: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<Uuid>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub display: String,
    pub session_id: Uuid,
    pub cached: bool,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: ModelChoice,
    pub label: &'static str,
    pub model_id: &'static str,
    pub provider: ModelProvider,
    pub default: bool,
}

pub fn routes() -> Router<Arc<SupportCore>> {
    Router::new()
        .route("/chat", post(chat))
        .route("/models", get(list_models))
        .route("/sessions", post(create_session))
        .route("/sessions/:session_id", axum::routing::delete(delete_session))
        .route("/sessions/:session_id/reset", post(reset_session))
        .route("/sessions/:session_id/history", get(get_history))
        .route("/sessions/:session_id/model", put(set_model))
}

pub(crate) fn parse_model(model: Option<&str>) -> ApiResult<Option<ModelChoice>> {
    match model {
        Some(name) if !name.trim().is_empty() => Ok(Some(name.trim().parse()?)),
        _ => Ok(None),
    }
}

pub(crate) fn validate_message(message: &str) -> ApiResult<()> {
    if message.trim().is_empty() {
        return Err(validation_error("Message cannot be empty"));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(validation_error("Message too long (max 10000 characters)"));
    }
    Ok(())
}

async fn session_view(core: &SupportCore, session_id: Uuid) -> ApiResult<SessionView> {
    let sessions = core.sessions.read().await;
    let session = sessions.get_session(session_id).await?;
    Ok(SessionView {
        session_id,
        model: session.model,
        model_label: session.model.label(),
        first_question: session.first_question,
        messages: session.messages.clone(),
    })
}

async fn create_session(
    State(core): State<Arc<SupportCore>>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<Json<ApiResponse<SessionView>>> {
    let model = parse_model(request.model.as_deref())?.unwrap_or(core.config.default_model);
    let session_id = core.sessions.write().await.create_session(model).await?;
    Ok(create_success_response(session_view(&core, session_id).await?))
}

async fn reset_session(
    State(core): State<Arc<SupportCore>>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<SessionView>>> {
    let new_id = core.sessions.write().await.reset_session(session_id).await?;
    Ok(create_success_response(session_view(&core, new_id).await?))
}

async fn get_history(
    State(core): State<Arc<SupportCore>>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<Vec<ConversationTurn>>>> {
    let history = core.sessions.read().await.history(session_id).await?;
    Ok(create_success_response(history))
}

async fn set_model(
    State(core): State<Arc<SupportCore>>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<SetModelRequest>,
) -> ApiResult<Json<ApiResponse<SessionView>>> {
    let model = parse_model(Some(&request.model))?
        .ok_or_else(|| validation_error("Model cannot be empty"))?;
    core.sessions.write().await.set_model(session_id, model).await?;
    Ok(create_success_response(session_view(&core, session_id).await?))
}

async fn delete_session(
    State(core): State<Arc<SupportCore>>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<ApiResponse<serde_json::Value>>> {
    core.sessions.write().await.delete_session(session_id).await?;
    Ok(create_success_response(serde_json::json!({ "deleted": session_id })))
}

async fn list_models(State(core): State<Arc<SupportCore>>) -> Json<ApiResponse<Vec<ModelInfo>>> {
    let models = ModelChoice::ALL
        .iter()
        .map(|choice| ModelInfo {
            id: *choice,
            label: choice.label(),
            model_id: choice.model_id(),
            provider: choice.provider(),
            default: *choice == core.config.default_model,
        })
        .collect();
    create_success_response(models)
}

// Main chat endpoint
async fn chat(
    State(core): State<Arc<SupportCore>>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ApiResponse<ChatResponse>>> {
    let start_time = std::time::Instant::now();
    validate_message(&request.message)?;
    let model = parse_model(request.model.as_deref())?;

    debug!("Chat request for session {:?}", request.session_id);
    let outcome = core
        .orchestrator
        .handle_turn(request.session_id, &request.message, model, None)
        .await?;

    info!(
        "Chat response for session {} in {}ms (cached={})",
        outcome.session_id,
        start_time.elapsed().as_millis(),
        outcome.cached
    );

    Ok(create_success_response(ChatResponse {
        display: display_text(&outcome.response, outcome.cached),
        response: outcome.response,
        session_id: outcome.session_id,
        cached: outcome.cached,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_core, ANSWER};
    use crate::ApiConfig;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use bearmobile_core::WELCOME_MESSAGE;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app(core: Arc<SupportCore>) -> Router {
        crate::routes::create_routes(core, &ApiConfig::default())
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_create_session_returns_welcome() {
        let app = app(test_core());
        let (status, body) = send(&app, Method::POST, "/api/v1/sessions", Some(json!({}))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["first_question"], true);
        assert_eq!(body["data"]["model"], "gpt-5-mini");
        assert_eq!(body["data"]["messages"][0]["content"], WELCOME_MESSAGE);
    }

    #[tokio::test]
    async fn test_chat_then_cached_chat() {
        let app = app(test_core());

        let (status, first) = send(
            &app,
            Method::POST,
            "/api/v1/chat",
            Some(json!({"message": "가까운 매장 알려주세요"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["data"]["response"], ANSWER);
        assert_eq!(first["data"]["cached"], false);

        let (_, second) = send(
            &app,
            Method::POST,
            "/api/v1/chat",
            Some(json!({"message": "가까운 매장 알려주세요"})),
        )
        .await;
        assert_eq!(second["data"]["cached"], true);
        assert_eq!(second["data"]["response"], ANSWER);
        assert_eq!(second["data"]["display"], format!("(cache) {}", ANSWER));
        assert_ne!(second["data"]["session_id"], first["data"]["session_id"]);
    }

    #[tokio::test]
    async fn test_reset_issues_new_session() {
        let app = app(test_core());
        let (_, created) = send(&app, Method::POST, "/api/v1/sessions", Some(json!({}))).await;
        let session_id = created["data"]["session_id"].as_str().unwrap().to_string();

        send(
            &app,
            Method::POST,
            "/api/v1/chat",
            Some(json!({"session_id": session_id, "message": "요금제"})),
        )
        .await;

        let (status, reset) = send(
            &app,
            Method::POST,
            &format!("/api/v1/sessions/{}/reset", session_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_ne!(reset["data"]["session_id"], session_id.as_str());
        assert_eq!(reset["data"]["first_question"], true);
        assert_eq!(reset["data"]["messages"].as_array().unwrap().len(), 1);

        let (status, _) = send(
            &app,
            Method::GET,
            &format!("/api/v1/sessions/{}/history", session_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_set_model_and_reject_unknown_model() {
        let app = app(test_core());
        let (_, created) = send(&app, Method::POST, "/api/v1/sessions", Some(json!({}))).await;
        let session_id = created["data"]["session_id"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/sessions/{}/model", session_id);

        let (status, body) = send(&app, Method::PUT, &uri, Some(json!({"model": "Claude Sonnet 4.5"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["model"], "claude-sonnet-4-5");

        let (status, body) = send(&app, Method::PUT, &uri, Some(json!({"model": "gpt-2"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error_code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_blank_message_is_rejected() {
        let app = app(test_core());
        let (status, body) = send(&app, Method::POST, "/api/v1/chat", Some(json!({"message": "   "}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_models_and_health() {
        let app = app(test_core());
        let (status, models) = send(&app, Method::GET, "/api/v1/models", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(models["data"].as_array().unwrap().len(), 4);
        assert_eq!(models["data"][0]["default"], true);

        let (status, health) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["data"]["status"], "healthy");

        let (status, _) = send(&app, Method::DELETE, &format!("/api/v1/sessions/{}", Uuid::new_v4()), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
