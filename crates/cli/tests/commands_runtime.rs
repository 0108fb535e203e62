use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use cotizador_cli::commands::{config, doctor, quote, rules};
use serde_json::Value;
use tempfile::TempDir;

const PLATE_PAYLOAD: &str = r#"{"producto":"placas","largo":10,"ancho":10,"espesor":"estandar"}"#;

#[test]
fn quote_prices_bare_payload_with_default_config() {
    with_env(&[], || {
        let result = quote::run(PLATE_PAYLOAD, false);
        assert_eq!(result.exit_code, 0, "expected a priced quotation");
        assert!(result.output.contains("Costo de Elaboración: $1,750"));
        assert!(result.output.contains("Precio Venta Sugerido: $2,275"));
    });
}

#[test]
fn quote_honours_env_marker_and_locale() {
    with_env(
        &[("COTIZADOR_QUOTATION_MARKER", "QUOTE:"), ("COTIZADOR_CURRENCY_LOCALE", "es-CL")],
        || {
            let result = quote::run(&format!("Aquí va.\nQUOTE: {PLATE_PAYLOAD}"), true);
            assert_eq!(result.exit_code, 0, "expected a priced quotation");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "quote");
            assert_eq!(payload["marker_found"], true);
            assert_eq!(payload["quotation"]["formatted_cost"], "$1.750");
            assert_eq!(payload["quotation"]["formatted_price"], "$2.275");
        },
    );
}

#[test]
fn quote_reports_config_failure() {
    with_env(&[("COTIZADOR_LOGGING_LEVEL", "verbose")], || {
        let result = quote::run(PLATE_PAYLOAD, false);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "quote");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn quote_reports_malformed_payload() {
    with_env(&[], || {
        let result = quote::run("COTIZACION_JSON: {\"producto\": ", false);
        assert_eq!(result.exit_code, 4);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "extraction_failed");
    });
}

#[test]
fn rules_reads_operator_rules_file() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("rules.toml");
    fs::write(&path, "sale_margin = \"1.5\"\n").expect("write rules");
    let path = path.display().to_string();

    with_env(&[("COTIZADOR_QUOTATION_RULES_PATH", path.as_str())], || {
        let result = rules::run(true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["rules"]["sale_margin"], "1.5");
        assert_eq!(payload["source"], format!("file ({path})"));

        let priced = quote::run(PLATE_PAYLOAD, false);
        assert!(priced.output.contains("Precio Venta Sugerido: $2,625"));
    });
}

#[test]
fn config_attributes_env_sources_and_redacts_key() {
    with_env(
        &[("GEMINI_API_KEY", "AIzaSyExampleExampleExample"), ("COTIZADOR_SERVER_PORT", "9090")],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);
            let output = result.output;

            assert!(output.contains("- server.port = 9090 (source: env (COTIZADOR_SERVER_PORT))"));
            assert!(output.contains("- llm.api_key = AIza*** (source: env (GEMINI_API_KEY))"));
            assert!(output.contains("- currency.locale = en-US (source: default)"));
            assert!(!output.contains("AIzaSyExampleExampleExample"));
        },
    );
}

#[test]
fn doctor_warns_without_api_key() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "a missing key is not fatal");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "warn");
        assert_eq!(payload["checks"][1]["name"], "llm_credentials");
        assert_eq!(payload["checks"][1]["status"], "warn");
    });
}

#[test]
fn doctor_fails_on_invalid_config() {
    with_env(&[("COTIZADOR_LLM_TIMEOUT_SECS", "soon")], || {
        let result = doctor::run(false);
        assert_eq!(result.exit_code, 6, "expected doctor failure code");
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [skip] engine_smoke"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "GEMINI_API_KEY",
        "COTIZADOR_LLM_API_KEY",
        "COTIZADOR_LLM_BASE_URL",
        "COTIZADOR_LLM_MODEL",
        "COTIZADOR_LLM_TIMEOUT_SECS",
        "COTIZADOR_LLM_TEMPERATURE",
        "COTIZADOR_LLM_TOP_P",
        "COTIZADOR_LLM_TOP_K",
        "COTIZADOR_SERVER_BIND_ADDRESS",
        "COTIZADOR_SERVER_PORT",
        "COTIZADOR_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "COTIZADOR_QUOTATION_MARKER",
        "COTIZADOR_QUOTATION_RULES_PATH",
        "COTIZADOR_CURRENCY_LOCALE",
        "COTIZADOR_CURRENCY_SYMBOL",
        "COTIZADOR_CONTACT_SCHEME",
        "COTIZADOR_CONTACT_TARGET",
        "COTIZADOR_LOGGING_LEVEL",
        "COTIZADOR_LOGGING_FORMAT",
        "COTIZADOR_LOG_LEVEL",
        "COTIZADOR_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
