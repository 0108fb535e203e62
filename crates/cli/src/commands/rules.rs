use cotizador_core::config::AppConfig;
use cotizador_core::cpq::rules::RuleSet;
use serde::Serialize;

use crate::commands::{load_config, CommandResult};

const COMMAND: &str = "rules";

#[derive(Debug, Serialize)]
struct RulesReport<'a> {
    command: &'static str,
    status: &'static str,
    source: String,
    rules: &'a RuleSet,
}

pub fn run(json_output: bool) -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };
    render(&config, json_output)
}

pub fn render(config: &AppConfig, json_output: bool) -> CommandResult {
    let rules = match config.load_rules() {
        Ok(rules) => rules,
        Err(error) => return CommandResult::failure(COMMAND, "rules", error.to_string(), 3),
    };
    let source = rules_source(config);

    if json_output {
        let report = RulesReport { command: COMMAND, status: "ok", source, rules: &rules };
        return CommandResult::document(COMMAND, 0, &report);
    }

    match toml::to_string_pretty(&rules) {
        Ok(body) => {
            CommandResult::text(format!("# effective pricing rules (source: {source})\n{body}"))
        }
        Err(error) => CommandResult::failure(COMMAND, "serialization", error.to_string(), 1),
    }
}

fn rules_source(config: &AppConfig) -> String {
    config
        .quotation
        .rules_path
        .as_ref()
        .map(|path| format!("file ({})", path.display()))
        .unwrap_or_else(|| "built-in".to_string())
}
