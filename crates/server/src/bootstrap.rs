use std::sync::Arc;
use std::time::Duration;

use cotizador_agent::{AgentRuntime, GeminiClient, LlmClient, LlmError, UnconfiguredLlm};
use cotizador_core::config::{AppConfig, ConfigError, LoadOptions};
use cotizador_core::cpq::rules::RuleSetError;
use thiserror::Error;
use tracing::{info, warn};

pub struct Application {
    pub config: AppConfig,
    pub agent_runtime: Arc<AgentRuntime>,
    pub llm_configured: bool,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("pricing rules could not be loaded: {0}")]
    Rules(#[from] RuleSetError),
    #[error("llm client could not be created: {0}")]
    Llm(#[from] LlmError),
}

pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    let engine = config.build_engine()?;
    info!(
        event_name = "system.bootstrap.rules_loaded",
        correlation_id = "bootstrap",
        rules_source = %config
            .quotation
            .rules_path
            .as_ref()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "built-in".to_string()),
        sale_margin = %engine.rules().sale_margin,
        "pricing rules loaded"
    );

    let llm_configured = config.llm.has_api_key();
    let llm: Arc<dyn LlmClient> = if llm_configured {
        Arc::new(GeminiClient::from_config(&config.llm)?)
    } else {
        warn!(
            event_name = "system.bootstrap.llm_unconfigured",
            correlation_id = "bootstrap",
            "no llm api key configured; chat requests will answer 503 until GEMINI_API_KEY is set"
        );
        Arc::new(UnconfiguredLlm)
    };

    let agent_runtime = AgentRuntime::new(llm, Arc::new(engine))
        .with_timeout(Duration::from_secs(config.llm.timeout_secs));

    Ok(Application { config, agent_runtime: Arc::new(agent_runtime), llm_configured })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use cotizador_core::config::{AppConfig, ConfigOverrides, LoadOptions};
    use tempfile::TempDir;

    use super::{bootstrap, bootstrap_with_config, BootstrapError};

    #[test]
    fn bootstrap_fails_fast_on_invalid_overrides() {
        let result = bootstrap(LoadOptions {
            overrides: ConfigOverrides {
                log_level: Some("verbose".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });

        let message = result.err().expect("error").to_string();
        assert!(message.contains("logging.level"));
    }

    #[test]
    fn bootstrap_without_api_key_degrades_instead_of_failing() {
        let mut config = AppConfig::default();
        config.llm.api_key = None;

        let app = bootstrap_with_config(config).expect("bootstrap should succeed");

        assert!(!app.llm_configured);
        assert!(app.agent_runtime.system_prompt().contains("COTIZACION_JSON:"));
    }

    #[test]
    fn bootstrap_with_api_key_uses_configured_marker() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("test-key".to_string().into());
        config.quotation.marker = "QUOTE_DATA:".to_string();

        let app = bootstrap_with_config(config).expect("bootstrap should succeed");

        assert!(app.llm_configured);
        assert!(app.agent_runtime.system_prompt().contains("QUOTE_DATA:"));
    }

    #[test]
    fn broken_rules_file_is_a_bootstrap_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("rules.toml");
        fs::write(&path, "sale_margin = \"-1\"\n").expect("write rules");

        let mut config = AppConfig::default();
        config.quotation.rules_path = Some(path);

        let result = bootstrap_with_config(config);

        assert!(matches!(result, Err(BootstrapError::Rules(_))));
    }
}
