use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use cotizador_core::config::{detect_config_file, AppConfig};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{load_config, CommandResult};

/// Where the effective value of one key came from.
struct SourceLookup {
    file_path: Option<PathBuf>,
    file_doc: Option<Value>,
}

impl SourceLookup {
    fn detect() -> Self {
        let file_path = detect_config_file();
        let file_doc = file_path.as_deref().and_then(load_config_file_doc);
        Self { file_path, file_doc }
    }

    fn source(&self, key_path: &str, env_keys: &[&str]) -> String {
        if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
            return format!("env ({env_key})");
        }

        if let Some(doc) = &self.file_doc {
            if contains_path(doc, key_path) {
                let file_path = self
                    .file_path
                    .as_ref()
                    .map(|path| path.display().to_string())
                    .unwrap_or_else(|| "config file".to_string());
                return format!("file ({file_path})");
            }
        }

        "default".to_string()
    }
}

pub fn run() -> CommandResult {
    match load_config("config") {
        Ok(config) => CommandResult::text(render(&config)),
        Err(result) => result,
    }
}

pub fn render(config: &AppConfig) -> String {
    let lookup = SourceLookup::detect();

    let entries = [
        entry(
            "llm.api_key",
            redact_secret(config.llm.api_key.as_ref().map(|key| key.expose_secret())),
            &["COTIZADOR_LLM_API_KEY", "GEMINI_API_KEY"],
        ),
        entry("llm.base_url", config.llm.base_url.clone(), &["COTIZADOR_LLM_BASE_URL"]),
        entry("llm.model", config.llm.model.clone(), &["COTIZADOR_LLM_MODEL"]),
        entry(
            "llm.timeout_secs",
            config.llm.timeout_secs.to_string(),
            &["COTIZADOR_LLM_TIMEOUT_SECS"],
        ),
        entry(
            "llm.temperature",
            config.llm.temperature.to_string(),
            &["COTIZADOR_LLM_TEMPERATURE"],
        ),
        entry("llm.top_p", config.llm.top_p.to_string(), &["COTIZADOR_LLM_TOP_P"]),
        entry("llm.top_k", config.llm.top_k.to_string(), &["COTIZADOR_LLM_TOP_K"]),
        entry(
            "server.bind_address",
            config.server.bind_address.clone(),
            &["COTIZADOR_SERVER_BIND_ADDRESS"],
        ),
        entry("server.port", config.server.port.to_string(), &["COTIZADOR_SERVER_PORT"]),
        entry(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["COTIZADOR_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        entry(
            "quotation.marker",
            config.quotation.marker.clone(),
            &["COTIZADOR_QUOTATION_MARKER"],
        ),
        entry(
            "quotation.rules_path",
            config
                .quotation
                .rules_path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<built-in>".to_string()),
            &["COTIZADOR_QUOTATION_RULES_PATH"],
        ),
        entry("currency.locale", config.currency.locale.clone(), &["COTIZADOR_CURRENCY_LOCALE"]),
        entry(
            "currency.symbol",
            format!("{:?}", config.currency.symbol),
            &["COTIZADOR_CURRENCY_SYMBOL"],
        ),
        entry("contact.scheme", config.contact.scheme.clone(), &["COTIZADOR_CONTACT_SCHEME"]),
        entry(
            "contact.target",
            config.contact.target.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["COTIZADOR_CONTACT_TARGET"],
        ),
        entry(
            "logging.level",
            config.logging.level.clone(),
            &["COTIZADOR_LOGGING_LEVEL", "COTIZADOR_LOG_LEVEL"],
        ),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["COTIZADOR_LOGGING_FORMAT", "COTIZADOR_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(entries.into_iter().map(|entry| {
        render_line(entry.key, &entry.value, lookup.source(entry.key, entry.env_keys))
    }));
    lines.join("\n")
}

struct Entry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn entry(key: &'static str, value: String, env_keys: &'static [&'static str]) -> Entry {
    Entry { key, value, env_keys }
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Keeps the first four characters of long keys so operators can tell credentials apart.
fn redact_secret(secret: Option<&str>) -> String {
    match secret.map(str::trim) {
        None => "<unset>".to_string(),
        Some("") => "<empty>".to_string(),
        Some(value) if value.chars().count() > 12 => {
            format!("{}***", value.chars().take(4).collect::<String>())
        }
        Some(_) => "<redacted>".to_string(),
    }
}
