use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use report_relay::chat::DiscordClient;
use report_relay::config::RelayConfig;
use report_relay::errors::RelayError;
use report_relay::orchestrator::Relay;
use report_relay::report_trigger::ReportfyBridge;
use report_relay::summarizer::GeminiSummarizer;

/// Generate the developer stats report, summarize it with Gemini and post
/// the summary to a Discord channel. Runs once and exits.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding one sub-directory per report run (overrides REPORTS_DIR)
    #[arg(long)]
    reports_dir: Option<PathBuf>,

    /// Report generator executable (overrides REPORTFY_BIN)
    #[arg(long)]
    generator_bin: Option<String>,

    /// Gemini model name (overrides GEMINI_MODEL)
    #[arg(long)]
    model: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut config = match RelayConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            let e = RelayError::from(e);
            error!(class = %e.class(), "Relay could not start: {e}");
            return Err(e.into());
        }
    };
    if let Some(dir) = args.reports_dir {
        config.reports_dir = dir;
    }
    if let Some(bin) = args.generator_bin {
        config.generator.bin = bin;
    }
    if let Some(model) = args.model {
        config.gemini.model = model;
    }

    info!(
        channel_id = config.discord.channel_id,
        reports_dir = %config.reports_dir.display(),
        generator = %config.generator.bin,
        model = %config.gemini.model,
        "Report relay starting"
    );

    let platform = DiscordClient::new(&config.discord, config.http_timeout)
        .context("Failed to build Discord client")?;
    let summarizer = GeminiSummarizer::new(&config.gemini, config.http_timeout)
        .context("Failed to build Gemini client")?;
    let generator = ReportfyBridge::new(config.generator.clone());

    let relay = Relay::new(
        &config,
        Arc::new(platform),
        Arc::new(generator),
        Arc::new(summarizer),
    );

    let report = match relay.run().await {
        Ok(report) => report,
        Err(e) => {
            error!(class = %e.class(), "Relay could not start: {e}");
            return Err(e.into());
        }
    };

    if report.is_success() {
        info!("Summary delivered");
    } else if let Some(failure) = &report.failure {
        warn!(class = %failure.class, "Run ended without a summary: {}", failure.message);
    }

    Ok(if report.exited_cleanly() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
