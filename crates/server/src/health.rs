use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use cotizador_agent::AgentRuntime;
use serde::Serialize;

#[derive(Clone)]
pub struct HealthState {
    runtime: Arc<AgentRuntime>,
    llm_configured: bool,
    model: String,
}

impl HealthState {
    pub fn new(runtime: Arc<AgentRuntime>, llm_configured: bool, model: impl Into<String>) -> Self {
        Self { runtime, llm_configured, model: model.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub rules: HealthCheck,
    pub llm: HealthCheck,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let rules = rules_check(&state.runtime);
    let llm = if state.llm_configured {
        HealthCheck { status: "ready", detail: format!("model `{}` configured", state.model) }
    } else {
        HealthCheck {
            status: "degraded",
            detail: "llm api key missing; set GEMINI_API_KEY".to_string(),
        }
    };
    let ready = rules.status == "ready" && llm.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "cotizador-server runtime initialized".to_string(),
        },
        rules,
        llm,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

fn rules_check(runtime: &AgentRuntime) -> HealthCheck {
    match runtime.engine().rules().validate() {
        Ok(()) => HealthCheck {
            status: "ready",
            detail: format!("sale margin x{}", runtime.engine().rules().sale_margin),
        },
        Err(error) => HealthCheck { status: "degraded", detail: error.to_string() },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{extract::State, http::StatusCode, Json};
    use cotizador_agent::{AgentRuntime, UnconfiguredLlm};
    use cotizador_core::cpq::QuotationEngine;

    use crate::health::{health, HealthState};

    fn runtime() -> Arc<AgentRuntime> {
        Arc::new(AgentRuntime::new(Arc::new(UnconfiguredLlm), Arc::new(QuotationEngine::default())))
    }

    #[tokio::test]
    async fn health_returns_ready_when_llm_is_configured() {
        let (status, Json(payload)) =
            health(State(HealthState::new(runtime(), true, "gemini-test"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.rules.status, "ready");
        assert_eq!(payload.rules.detail, "sale margin x1.3");
        assert!(payload.llm.detail.contains("gemini-test"));
    }

    #[tokio::test]
    async fn health_returns_service_unavailable_without_api_key() {
        let (status, Json(payload)) =
            health(State(HealthState::new(runtime(), false, "gemini-test"))).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.llm.status, "degraded");
        assert_eq!(payload.service.status, "ready");
    }
}
