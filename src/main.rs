//! CLI entry point for the spec-fetch tool.

use std::io::{self, IsTerminal, Read, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use spec_fetch_core::pipeline::{Envelope, FailureEnvelope, FetchMeta, Pipeline, PipelineError};
use spec_fetch_core::{resolve_spec_url, server};
use tokio::net::TcpListener;
use tracing::{debug, info};

mod app_config;
mod cli;

use cli::{Args, Command, DEFAULT_BIND};

/// Rate limit identifier for local invocations.
const CLI_IDENTIFIER: &str = "cli";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr; stdout carries the JSON result.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let loaded = app_config::load_config(args.config.as_deref())?;
    if loaded.loaded_from_file {
        debug!(path = ?loaded.path, "config loaded");
    }

    let mut settings = loaded.config.pipeline_settings();
    if args.allow_private_hosts {
        settings.fetch.allow_private_hosts = true;
    }

    match args.command {
        Command::Resolve { url } => {
            println!("{}", resolve_spec_url(&url));
            Ok(ExitCode::SUCCESS)
        }
        Command::Fetch {
            url,
            authorization,
            output,
        } => {
            let pipeline = Pipeline::from_settings(&settings)?;
            let result = pipeline
                .fetch_by_url_with_authorization(CLI_IDENTIFIER, &url, authorization.as_deref())
                .await;
            match (result, output) {
                (Ok(fetched), Some(path)) => {
                    write_document(&path, &fetched.document)?;
                    info!(path = %path.display(), "collection written");
                    print_json(&Envelope::<(), FetchMeta> {
                        ok: true,
                        data: None,
                        meta: Some(fetched.meta),
                        error: None,
                    })
                }
                (Ok(fetched), None) => print_json(&Envelope::from(fetched)),
                (Err(error), _) => report_failure(&error),
            }
        }
        Command::Parse { file } => {
            let content = read_input(file.as_deref())?;
            let pipeline = Pipeline::from_settings(&settings)?;
            match pipeline.fetch_by_text(CLI_IDENTIFIER, &content) {
                Ok(parsed) => print_json(&Envelope::from(parsed)),
                Err(error) => report_failure(&error),
            }
        }
        Command::Serve { bind } => {
            let addr = match bind.or(loaded.config.bind) {
                Some(addr) => addr,
                None => DEFAULT_BIND.parse()?,
            };
            let server_settings = loaded.config.server_settings(&settings);
            let pipeline = Pipeline::from_settings(&settings)?;
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("Failed to bind {addr}"))?;
            info!(%addr, "spec-fetch server starting");
            server::serve(listener, server::router(pipeline, &server_settings)).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn read_input(file: Option<&Path>) -> Result<String> {
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    if io::stdin().is_terminal() {
        info!("No input provided. Pass a spec file or pipe one via stdin.");
        info!("Example: cat openapi.yaml | spec-fetch parse");
    }
    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    Ok(buffer)
}

fn write_document(path: &Path, document: &serde_json::Value) -> Result<()> {
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(&mut file, document)?;
    file.write_all(b"\n")?;
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<ExitCode> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    stdout.write_all(b"\n")?;
    Ok(ExitCode::SUCCESS)
}

fn report_failure(error: &PipelineError) -> Result<ExitCode> {
    print_json(&FailureEnvelope::failure(error))?;
    Ok(ExitCode::FAILURE)
}
