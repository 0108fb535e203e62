use std::sync::Arc;
use std::time::Duration;

use cotizador_core::cpq::{EngineReply, QuotationEngine};
use cotizador_core::errors::QuotationError;
use tokio::time::timeout;
use tracing::{error, info};

use crate::llm::{ChatTurn, CompletionRequest, LlmClient};
use crate::prompt::system_prompt;

pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// One chat round trip: ask the model for its next message, then let the engine decide whether
/// that message is conversation or a finished specification.
pub struct AgentRuntime {
    llm: Arc<dyn LlmClient>,
    engine: Arc<QuotationEngine>,
    system_prompt: String,
    upstream_timeout: Duration,
}

impl AgentRuntime {
    pub fn new(llm: Arc<dyn LlmClient>, engine: Arc<QuotationEngine>) -> Self {
        let system_prompt = system_prompt(engine.extractor().marker());
        Self { llm, engine, system_prompt, upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT }
    }

    pub fn with_timeout(mut self, upstream_timeout: Duration) -> Self {
        self.upstream_timeout = upstream_timeout;
        self
    }

    pub fn engine(&self) -> &QuotationEngine {
        &self.engine
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    pub async fn handle_chat(
        &self,
        history: Vec<ChatTurn>,
        correlation_id: &str,
    ) -> Result<EngineReply, QuotationError> {
        let request = CompletionRequest { system_prompt: self.system_prompt.clone(), history };

        let raw = match timeout(self.upstream_timeout, self.llm.complete(&request)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(upstream_error)) => {
                error!(
                    event_name = "agent.upstream.failed",
                    correlation_id = %correlation_id,
                    error = %upstream_error,
                    "conversational upstream call failed"
                );
                return Err(QuotationError::upstream(upstream_error.to_string()));
            }
            Err(_) => {
                error!(
                    event_name = "agent.upstream.timeout",
                    correlation_id = %correlation_id,
                    timeout_ms = self.upstream_timeout.as_millis() as u64,
                    "conversational upstream call timed out"
                );
                return Err(QuotationError::upstream(format!(
                    "no answer within {}s",
                    self.upstream_timeout.as_secs_f32()
                )));
            }
        };

        let reply = self.engine.respond(&raw, correlation_id);
        info!(
            event_name = "agent.chat.replied",
            correlation_id = %correlation_id,
            outcome = reply.outcome(),
            "chat turn answered"
        );
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use cotizador_core::cpq::{EngineReply, QuotationEngine};
    use cotizador_core::errors::QuotationError;

    use super::AgentRuntime;
    use crate::llm::{ChatTurn, CompletionRequest, LlmClient};

    struct ScriptedLlm {
        reply: Result<String, String>,
        delay: Duration,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedLlm {
        fn answering(reply: &str) -> Self {
            Self { reply: Ok(reply.to_string()), delay: Duration::ZERO, seen: Mutex::new(Vec::new()) }
        }

        fn failing(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(request.clone());
            }
            tokio::time::sleep(self.delay).await;
            self.reply.clone().map_err(|message| anyhow!(message))
        }
    }

    fn runtime(llm: Arc<ScriptedLlm>) -> AgentRuntime {
        AgentRuntime::new(llm, Arc::new(QuotationEngine::default()))
    }

    #[tokio::test]
    async fn conversation_turns_pass_through() {
        let llm = Arc::new(ScriptedLlm::answering("¿Será fijo o desmontable?"));
        let reply = runtime(llm.clone())
            .handle_chat(vec![ChatTurn::user("un molde de 30x20x5")], "corr-1")
            .await
            .expect("reply");

        assert_eq!(reply, EngineReply::Passthrough("¿Será fijo o desmontable?".to_string()));

        let seen = llm.seen.lock().expect("lock");
        assert_eq!(seen.len(), 1);
        assert!(seen[0].system_prompt.contains("COTIZACION_JSON:"));
        assert_eq!(seen[0].history, vec![ChatTurn::user("un molde de 30x20x5")]);
    }

    #[tokio::test]
    async fn completed_interview_is_priced_by_the_engine() {
        let llm = Arc::new(ScriptedLlm::answering(
            "¡Anotado! COTIZACION_JSON: {\"producto\":\"panquequera\",\"forma\":\"redonda\",\"diametro\":5,\"espesor\":\"estandar\"}",
        ));
        let reply = runtime(llm)
            .handle_chat(vec![ChatTurn::user("redonda de 5 cm")], "corr-2")
            .await
            .expect("reply");

        let EngineReply::Quotation { result, text } = reply else {
            panic!("expected quotation");
        };
        assert_eq!(result.formatted_cost, "$2,000");
        assert!(text.starts_with("¡Anotado!"));
    }

    #[tokio::test]
    async fn upstream_failure_maps_to_upstream_unavailable() {
        let llm = Arc::new(ScriptedLlm::failing("connection reset"));
        let error = runtime(llm)
            .handle_chat(vec![ChatTurn::user("hola")], "corr-3")
            .await
            .expect_err("upstream failure");

        assert!(matches!(error, QuotationError::UpstreamUnavailable { ref reason } if reason.contains("connection reset")));
    }

    #[tokio::test(start_paused = true)]
    async fn slow_upstream_times_out() {
        let llm = Arc::new(ScriptedLlm {
            reply: Ok("tarde".to_string()),
            delay: Duration::from_secs(60),
            seen: Mutex::new(Vec::new()),
        });
        let error = runtime(llm)
            .with_timeout(Duration::from_secs(5))
            .handle_chat(vec![ChatTurn::user("hola")], "corr-4")
            .await
            .expect_err("timeout");

        assert_eq!(error.reason_code(), "upstream_unavailable");
    }
}
