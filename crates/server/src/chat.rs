use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use cotizador_agent::{AgentRuntime, ChatTurn};
use cotizador_core::errors::InterfaceError;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

pub const HISTORY_REQUIRED: &str = "Chat history is required.";
pub const METHOD_NOT_ALLOWED: &str = "Method Not Allowed";

#[derive(Clone)]
pub struct ChatState {
    runtime: Arc<AgentRuntime>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub history: Option<Vec<ChatTurn>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatError {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Customer-facing wording the chat widget can show in place of an assistant message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ChatError {
    fn plain(message: &str) -> Self {
        Self { error: message.to_string(), correlation_id: None, text: None }
    }
}

pub fn router(runtime: Arc<AgentRuntime>) -> Router {
    Router::new()
        .route("/api/chat", post(chat).fallback(method_not_allowed))
        .with_state(ChatState { runtime })
}

pub async fn chat(
    State(state): State<ChatState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    let history = match payload {
        Ok(Json(ChatRequest { history: Some(history) })) if !history.is_empty() => history,
        Ok(_) => {
            return (StatusCode::BAD_REQUEST, Json(ChatError::plain(HISTORY_REQUIRED)))
                .into_response()
        }
        Err(rejection) => {
            warn!(
                event_name = "server.chat.rejected_body",
                correlation_id = %correlation_id,
                error = %rejection.body_text(),
                "chat request body could not be decoded"
            );
            return (StatusCode::BAD_REQUEST, Json(ChatError::plain(HISTORY_REQUIRED)))
                .into_response();
        }
    };

    info!(
        event_name = "server.chat.received",
        correlation_id = %correlation_id,
        turns = history.len(),
        "chat request received"
    );

    match state.runtime.handle_chat(history, &correlation_id).await {
        Ok(reply) => (StatusCode::OK, Json(ChatResponse { text: reply.into_text() })).into_response(),
        Err(failure) => {
            let interface = failure.into_interface(correlation_id);
            let status = match &interface {
                InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
                InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let body = ChatError {
                error: interface.user_message().to_string(),
                correlation_id: Some(interface.correlation_id().to_string()),
                text: Some(state.runtime.engine().assembler().service_unavailable()),
            };
            (status, Json(body)).into_response()
        }
    }
}

pub async fn method_not_allowed() -> (StatusCode, Json<ChatError>) {
    (StatusCode::METHOD_NOT_ALLOWED, Json(ChatError::plain(METHOD_NOT_ALLOWED)))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use cotizador_agent::{AgentRuntime, CompletionRequest, LlmClient};
    use cotizador_core::cpq::QuotationEngine;
    use cotizador_core::errors::QuotationError;
    use tower::ServiceExt;

    use super::{router, ChatError, ChatResponse, HISTORY_REQUIRED, METHOD_NOT_ALLOWED};

    struct ScriptedLlm(Result<String, String>);

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            self.0.clone().map_err(|message| anyhow!(message))
        }
    }

    fn app(reply: Result<&str, &str>) -> Router {
        let llm = Arc::new(ScriptedLlm(reply.map(str::to_string).map_err(str::to_string)));
        let runtime = AgentRuntime::new(llm, Arc::new(QuotationEngine::default()))
            .with_timeout(Duration::from_secs(5));
        router(Arc::new(runtime))
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn read<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    const HISTORY: &str = r#"{"history":[{"role":"user","parts":[{"text":"Hola"}]}]}"#;

    #[tokio::test]
    async fn chat_returns_model_text() {
        let response = app(Ok("¿Qué producto quieres diseñar hoy? 😊"))
            .oneshot(post_json(HISTORY))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body: ChatResponse = read(response).await;
        assert_eq!(body.text, "¿Qué producto quieres diseñar hoy? 😊");
    }

    #[tokio::test]
    async fn chat_replaces_marker_payload_with_quotation() {
        let response = app(Ok(
            "COTIZACION_JSON: {\"producto\":\"placas\",\"largo\":10,\"ancho\":10,\"espesor\":\"estandar\"}",
        ))
        .oneshot(post_json(HISTORY))
        .await
        .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        let body: ChatResponse = read(response).await;
        assert!(body.text.contains("Costo de Elaboración: $1,750"));
        assert!(!body.text.contains("COTIZACION_JSON"));
    }

    #[tokio::test]
    async fn missing_or_empty_history_is_bad_request() {
        for payload in ["{}", r#"{"history":[]}"#, r#"{"history":null}"#, "not json"] {
            let response = app(Ok("unused")).oneshot(post_json(payload)).await.expect("response");

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "payload {payload}");
            let body: ChatError = read(response).await;
            assert_eq!(body.error, HISTORY_REQUIRED);
        }
    }

    #[tokio::test]
    async fn other_methods_are_rejected() {
        let request = Request::builder()
            .method("GET")
            .uri("/api/chat")
            .body(Body::empty())
            .expect("request");
        let response = app(Ok("unused")).oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        let body: ChatError = read(response).await;
        assert_eq!(body.error, METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn upstream_failure_is_service_unavailable_with_correlation_id() {
        let response = app(Err("upstream rejected key AIza-leak-123"))
            .oneshot(post_json(HISTORY))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: ChatError = read(response).await;
        let expected = QuotationError::upstream("unused").into_interface("req");
        assert_eq!(body.error, expected.user_message());
        assert!(!body.error.contains("AIza-leak-123"));
        assert!(body.correlation_id.is_some_and(|id| !id.is_empty()));
        assert!(body.text.is_some());
    }
}
