use cotizador_core::config::{AppConfig, LoadOptions};
use cotizador_core::cpq::QuotationEngine;
use serde::Serialize;

use crate::commands::{escape_json, CommandResult};

/// Reference payload priced by `engine_smoke`; a 10x10 standard plate.
const SMOKE_PAYLOAD: &str =
    r#"{"producto":"placas","largo":10,"ancho":10,"espesor":"estandar"}"#;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Warn,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, details: impl Into<String>) -> Self {
        Self { name, status, details: details.into() }
    }

    fn skipped(name: &'static str, cause: &str) -> Self {
        Self::new(name, CheckStatus::Skipped, format!("skipped because {cause}"))
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report(AppConfig::load(LoadOptions::default()));
    let exit_code = if report.overall_status == CheckStatus::Fail { 6 } else { 0 };

    if json_output {
        let output = serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
        return CommandResult { exit_code, output };
    }

    CommandResult { exit_code, output: render_human(&report) }
}

fn build_report<E: std::fmt::Display>(loaded: Result<AppConfig, E>) -> DoctorReport {
    let mut checks = Vec::new();

    match loaded {
        Ok(config) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Pass,
                "configuration loaded and validated",
            ));
            checks.push(check_llm_credentials(&config));
            match config.build_engine() {
                Ok(engine) => {
                    checks.push(DoctorCheck::new(
                        "rules_loaded",
                        CheckStatus::Pass,
                        format!(
                            "{} rules with sale margin x{}",
                            config
                                .quotation
                                .rules_path
                                .as_ref()
                                .map(|path| path.display().to_string())
                                .unwrap_or_else(|| "built-in".to_string()),
                            engine.rules().sale_margin
                        ),
                    ));
                    checks.push(check_engine_smoke(&engine));
                }
                Err(error) => {
                    checks.push(DoctorCheck::new(
                        "rules_loaded",
                        CheckStatus::Fail,
                        error.to_string(),
                    ));
                    checks.push(DoctorCheck::skipped("engine_smoke", "pricing rules did not load"));
                }
            }
        }
        Err(error) => {
            checks.push(DoctorCheck::new(
                "config_validation",
                CheckStatus::Fail,
                error.to_string(),
            ));
            for name in ["llm_credentials", "rules_loaded", "engine_smoke"] {
                checks.push(DoctorCheck::skipped(name, "configuration did not load"));
            }
        }
    }

    let failed = checks.iter().any(|check| check.status == CheckStatus::Fail);
    let warned = checks.iter().any(|check| check.status == CheckStatus::Warn);
    let (overall_status, summary) = match (failed, warned) {
        (true, _) => (CheckStatus::Fail, "doctor: one or more readiness checks failed"),
        (false, true) => (CheckStatus::Warn, "doctor: ready with warnings"),
        (false, false) => (CheckStatus::Pass, "doctor: all readiness checks passed"),
    };

    DoctorReport { overall_status, summary: summary.to_string(), checks }
}

/// A missing key only degrades the chat endpoint; offline quoting still works.
fn check_llm_credentials(config: &AppConfig) -> DoctorCheck {
    if config.llm.has_api_key() {
        DoctorCheck::new(
            "llm_credentials",
            CheckStatus::Pass,
            format!("api key present for model `{}`", config.llm.model),
        )
    } else {
        DoctorCheck::new(
            "llm_credentials",
            CheckStatus::Warn,
            "no api key configured; set GEMINI_API_KEY or COTIZADOR_LLM_API_KEY",
        )
    }
}

fn check_engine_smoke(engine: &QuotationEngine) -> DoctorCheck {
    let priced = engine.extractor().parse(SMOKE_PAYLOAD).and_then(|spec| engine.quote(&spec));

    match priced {
        Ok(result) => DoctorCheck::new(
            "engine_smoke",
            CheckStatus::Pass,
            format!(
                "reference plate priced at {} (sale {})",
                result.formatted_cost, result.formatted_price
            ),
        ),
        Err(error) => DoctorCheck::new("engine_smoke", CheckStatus::Fail, error.to_string()),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Warn => "warn",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}
