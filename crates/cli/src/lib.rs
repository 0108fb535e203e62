pub mod commands;

use std::io::{self, Read};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "cotizador",
    about = "Cotizador operator CLI",
    long_about = "Price product specifications offline, inspect pricing rules and configuration, and run readiness diagnostics.",
    after_help = "Examples:\n  cotizador quote --text '{\"producto\":\"placas\",\"largo\":10,\"ancho\":10,\"espesor\":\"estandar\"}'\n  echo 'COTIZACION_JSON: {...}' | cotizador quote --json\n  cotizador rules\n  cotizador doctor --json"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(
        about = "Price a specification given as marker text or a bare JSON object (reads stdin without --text)"
    )]
    Quote {
        #[arg(long, help = "Assistant text or JSON payload to price")]
        text: Option<String>,
        #[arg(long, help = "Emit the priced result and its trace as JSON")]
        json: bool,
    },
    #[command(about = "Print the effective pricing rules")]
    Rules {
        #[arg(long, help = "Emit JSON instead of TOML")]
        json: bool,
    },
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, pricing rules, and LLM credential readiness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Quote { text, json } => match text.map(Ok).unwrap_or_else(read_stdin) {
            Ok(input) => commands::quote::run(&input, json),
            Err(error) => {
                commands::CommandResult::failure("quote", "input", format!("{error:#}"), 1)
            }
        },
        Command::Rules { json } => commands::rules::run(json),
        Command::Config => commands::config::run(),
        Command::Doctor { json } => commands::doctor::run(json),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}

fn read_stdin() -> Result<String> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input).context("failed to read specification from stdin")?;
    Ok(input)
}
