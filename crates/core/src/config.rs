use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cpq::extraction::{SpecificationExtractor, DEFAULT_MARKER};
use crate::cpq::format::CurrencyFormatter;
use crate::cpq::response::ContactLink;
use crate::cpq::rules::{RuleSet, RuleSetError};
use crate::cpq::QuotationEngine;

pub const DEFAULT_CONFIG_FILE: &str = "cotizador.toml";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-preview-05-20";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub quotation: QuotationConfig,
    pub currency: CurrencyConfig,
    pub contact: ContactConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct QuotationConfig {
    pub marker: String,
    /// Optional TOML rule file; built-in catalogue constants are used when unset.
    pub rules_path: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct CurrencyConfig {
    pub locale: String,
    pub symbol: String,
}

/// Where the "write to us" link points. No link is rendered while `target` is unset.
#[derive(Clone, Debug)]
pub struct ContactConfig {
    pub scheme: String,
    pub target: Option<String>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub server_port: Option<u16>,
    pub quotation_marker: Option<String>,
    pub rules_path: Option<PathBuf>,
    pub currency_locale: Option<String>,
    pub contact_target: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: None,
                base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
                model: DEFAULT_GEMINI_MODEL.to_string(),
                timeout_secs: 30,
                temperature: 0.7,
                top_p: 1.0,
                top_k: 1,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            quotation: QuotationConfig { marker: DEFAULT_MARKER.to_string(), rules_path: None },
            currency: CurrencyConfig { locale: "en-US".to_string(), symbol: "$".to_string() },
            contact: ContactConfig { scheme: "https".to_string(), target: None },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LlmConfig {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty())
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Reads `quotation.rules_path` when set, otherwise the built-in catalogue.
    pub fn load_rules(&self) -> Result<RuleSet, RuleSetError> {
        match &self.quotation.rules_path {
            Some(path) => RuleSet::load(path),
            None => Ok(RuleSet::default()),
        }
    }

    pub fn contact_link(&self) -> Option<ContactLink> {
        self.contact
            .target
            .as_deref()
            .map(str::trim)
            .filter(|target| !target.is_empty())
            .map(|target| ContactLink::new(self.contact.scheme.trim(), target))
    }

    pub fn currency_formatter(&self) -> CurrencyFormatter {
        CurrencyFormatter::for_locale(&self.currency.locale, self.currency.symbol.clone())
    }

    pub fn build_engine(&self) -> Result<QuotationEngine, RuleSetError> {
        let rules = self.load_rules()?;
        Ok(QuotationEngine::new(
            Arc::new(rules),
            SpecificationExtractor::new(self.quotation.marker.clone()),
            self.currency_formatter(),
            self.contact_link(),
        ))
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(top_p) = llm.top_p {
                self.llm.top_p = top_p;
            }
            if let Some(top_k) = llm.top_k {
                self.llm.top_k = top_k;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(quotation) = patch.quotation {
            if let Some(marker) = quotation.marker {
                self.quotation.marker = marker;
            }
            if let Some(rules_path) = quotation.rules_path {
                self.quotation.rules_path = Some(rules_path);
            }
        }

        if let Some(currency) = patch.currency {
            if let Some(locale) = currency.locale {
                self.currency.locale = locale;
            }
            if let Some(symbol) = currency.symbol {
                self.currency.symbol = symbol;
            }
        }

        if let Some(contact) = patch.contact {
            if let Some(scheme) = contact.scheme {
                self.contact.scheme = scheme;
            }
            if let Some(target) = contact.target {
                self.contact.target = Some(target);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        let api_key = read_env("COTIZADOR_LLM_API_KEY").or_else(|| read_env("GEMINI_API_KEY"));
        if let Some(value) = api_key {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("COTIZADOR_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("COTIZADOR_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("COTIZADOR_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("COTIZADOR_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("COTIZADOR_LLM_TEMPERATURE") {
            self.llm.temperature = parse_f32("COTIZADOR_LLM_TEMPERATURE", &value)?;
        }
        if let Some(value) = read_env("COTIZADOR_LLM_TOP_P") {
            self.llm.top_p = parse_f32("COTIZADOR_LLM_TOP_P", &value)?;
        }
        if let Some(value) = read_env("COTIZADOR_LLM_TOP_K") {
            self.llm.top_k = parse_u32("COTIZADOR_LLM_TOP_K", &value)?;
        }

        if let Some(value) = read_env("COTIZADOR_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("COTIZADOR_SERVER_PORT") {
            self.server.port = parse_u16("COTIZADOR_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("COTIZADOR_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("COTIZADOR_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("COTIZADOR_QUOTATION_MARKER") {
            self.quotation.marker = value;
        }
        if let Some(value) = read_env("COTIZADOR_QUOTATION_RULES_PATH") {
            self.quotation.rules_path = Some(PathBuf::from(value));
        }

        if let Some(value) = read_env("COTIZADOR_CURRENCY_LOCALE") {
            self.currency.locale = value;
        }
        if let Some(value) = read_env("COTIZADOR_CURRENCY_SYMBOL") {
            self.currency.symbol = value;
        }

        if let Some(value) = read_env("COTIZADOR_CONTACT_SCHEME") {
            self.contact.scheme = value;
        }
        if let Some(value) = read_env("COTIZADOR_CONTACT_TARGET") {
            self.contact.target = Some(value);
        }

        let log_level =
            read_env("COTIZADOR_LOGGING_LEVEL").or_else(|| read_env("COTIZADOR_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("COTIZADOR_LOGGING_FORMAT").or_else(|| read_env("COTIZADOR_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(server_port) = overrides.server_port {
            self.server.port = server_port;
        }
        if let Some(marker) = overrides.quotation_marker {
            self.quotation.marker = marker;
        }
        if let Some(rules_path) = overrides.rules_path {
            self.quotation.rules_path = Some(rules_path);
        }
        if let Some(locale) = overrides.currency_locale {
            self.currency.locale = locale;
        }
        if let Some(target) = overrides.contact_target {
            self.contact.target = Some(target);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_quotation(&self.quotation)?;
        validate_currency(&self.currency)?;
        validate_contact(&self.contact)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// The config file `AppConfig::load` would read without an explicit path, if any exists.
pub fn detect_config_file() -> Option<PathBuf> {
    resolve_config_path(None)
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), Path::new("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    let base_url = llm.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "llm.model must not be empty (default: `{DEFAULT_GEMINI_MODEL}`)"
        )));
    }

    if !(0.0..=2.0).contains(&llm.temperature) {
        return Err(ConfigError::Validation(
            "llm.temperature must be in range 0.0..=2.0".to_string(),
        ));
    }

    if !(llm.top_p > 0.0 && llm.top_p <= 1.0) {
        return Err(ConfigError::Validation("llm.top_p must be in range (0.0, 1.0]".to_string()));
    }

    if llm.top_k == 0 {
        return Err(ConfigError::Validation("llm.top_k must be greater than zero".to_string()));
    }

    if llm.api_key.is_some() && !llm.has_api_key() {
        return Err(ConfigError::Validation(
            "llm.api_key is set but empty. Set GEMINI_API_KEY or remove the key".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_quotation(quotation: &QuotationConfig) -> Result<(), ConfigError> {
    if quotation.marker.trim().is_empty() {
        return Err(ConfigError::Validation(format!(
            "quotation.marker must not be empty (default: `{DEFAULT_MARKER}`)"
        )));
    }

    if let Some(path) = &quotation.rules_path {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "quotation.rules_path must not be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_currency(currency: &CurrencyConfig) -> Result<(), ConfigError> {
    if currency.locale.trim().is_empty() {
        return Err(ConfigError::Validation(
            "currency.locale must not be empty (e.g. `en-US`, `es-CL`)".to_string(),
        ));
    }

    if currency.symbol.is_empty() {
        return Err(ConfigError::Validation("currency.symbol must not be empty".to_string()));
    }

    Ok(())
}

fn validate_contact(contact: &ContactConfig) -> Result<(), ConfigError> {
    let scheme = contact.scheme.trim();
    let valid_scheme = scheme.chars().next().is_some_and(|first| first.is_ascii_alphabetic())
        && scheme.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'));
    if !valid_scheme {
        return Err(ConfigError::Validation(format!(
            "contact.scheme `{scheme}` is not a valid URL scheme (e.g. `https`, `whatsapp`)"
        )));
    }

    if let Some(target) = &contact.target {
        if target.contains("://") {
            return Err(ConfigError::Validation(
                "contact.target must not include the scheme; set contact.scheme instead"
                    .to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f32(key: &str, value: &str) -> Result<f32, ConfigError> {
    value.trim().parse::<f32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    quotation: Option<QuotationPatch>,
    currency: Option<CurrencyPatch>,
    contact: Option<ContactPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
    top_p: Option<f32>,
    top_k: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct QuotationPatch {
    marker: Option<String>,
    rules_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct CurrencyPatch {
    locale: Option<String>,
    symbol: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ContactPatch {
    scheme: Option<String>,
    target: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
