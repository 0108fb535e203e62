use cotizador_core::cpq::QuotationEngine;
use cotizador_core::domain::quotation::QuotationResult;
use serde::Serialize;

use crate::commands::{load_config, CommandResult};

const COMMAND: &str = "quote";

#[derive(Debug, Serialize)]
struct QuoteReport<'a> {
    command: &'static str,
    status: &'static str,
    marker_found: bool,
    quotation: &'a QuotationResult,
}

pub fn run(input: &str, json_output: bool) -> CommandResult {
    let config = match load_config(COMMAND) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let engine = match config.build_engine() {
        Ok(engine) => engine,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "rules",
                format!("pricing rules could not be loaded: {error}"),
                3,
            )
        }
    };

    quote_with_engine(&engine, input, json_output)
}

/// Accepts either assistant text carrying the marker or a bare JSON payload.
pub fn quote_with_engine(
    engine: &QuotationEngine,
    input: &str,
    json_output: bool,
) -> CommandResult {
    let input = input.trim();
    if input.is_empty() {
        return CommandResult::failure(COMMAND, "input", "no specification was provided", 1);
    }

    let embedded = engine.extractor().locate(input);
    let (preamble, payload) = match embedded {
        Some(found) => (found.preamble, found.payload),
        None => ("", input),
    };

    let priced = engine.extractor().parse(payload).and_then(|spec| engine.quote(&spec));
    match priced {
        Ok(quotation) if json_output => CommandResult::document(
            COMMAND,
            0,
            &QuoteReport {
                command: COMMAND,
                status: "ok",
                marker_found: embedded.is_some(),
                quotation: &quotation,
            },
        ),
        Ok(quotation) => CommandResult::text(engine.assembler().quotation(preamble, &quotation)),
        Err(error) => CommandResult::failure(COMMAND, error.reason_code(), error.to_string(), 4),
    }
}
