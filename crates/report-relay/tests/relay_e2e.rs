//! End-to-end relay runs against mocked Discord and Gemini HTTP endpoints.
//!
//! The report generator is replaced by an in-process fake that writes (or
//! doesn't write) a report run under a temp directory; everything else is
//! the production wiring used by the binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use httpmock::Method::{GET, POST};
use httpmock::{Mock, MockServer};
use serde_json::json;
use tempfile::TempDir;

use report_relay::chat::DiscordClient;
use report_relay::config::RelayConfig;
use report_relay::errors::RelayError;
use report_relay::orchestrator::{notices, Relay};
use report_relay::report_trigger::{GenerationOutcome, ReportGenerator};
use report_relay::state_machine::PipelineState;
use report_relay::summarizer::GeminiSummarizer;

const CHANNEL: &str = "555000111222333444";
const GEMINI_PATH: &str = "/v1beta/models/gemini-2.5-flash:generateContent";

/// Writes one report run, or nothing, then exits like the real tool would.
struct FakeGenerator {
    reports_dir: PathBuf,
    write_report: bool,
}

impl ReportGenerator for FakeGenerator {
    fn generate(&self) -> GenerationOutcome {
        if !self.write_report {
            return GenerationOutcome::Aborted { code: Some(1) };
        }
        let run = self.reports_dir.join("2025-06-02_09-30-00");
        fs::create_dir_all(&run).unwrap();
        fs::write(
            run.join("developer_stats_ana.md"),
            "| Issues fechadas | 5 |\n",
        )
        .unwrap();
        fs::write(
            run.join("developer_stats_bruno.md"),
            "| Issues fechadas | 2 |\n",
        )
        .unwrap();
        GenerationOutcome::Completed
    }
}

fn config(discord: &MockServer, gemini: &MockServer, reports_dir: &Path) -> RelayConfig {
    let discord_base = discord.base_url();
    let gemini_base = gemini.base_url();
    let reports = reports_dir.display().to_string();
    RelayConfig::from_lookup(move |key| match key {
        "MY_API_REPORTFY" => Some("bot-token".into()),
        "DISCORD_CHANNEL_ID" => Some(CHANNEL.into()),
        "GEMINI_API_KEY" => Some("gemini-key".into()),
        "DISCORD_API_BASE" => Some(discord_base.clone()),
        "GEMINI_API_BASE" => Some(gemini_base.clone()),
        "REPORTS_DIR" => Some(reports.clone()),
        "RELAY_HTTP_TIMEOUT_SECS" => Some("5".into()),
        _ => None,
    })
    .unwrap()
}

fn relay(config: &RelayConfig, write_report: bool) -> Relay {
    let platform = DiscordClient::new(&config.discord, config.http_timeout).unwrap();
    let summarizer = GeminiSummarizer::new(&config.gemini, config.http_timeout).unwrap();
    let generator = FakeGenerator {
        reports_dir: config.reports_dir.clone(),
        write_report,
    };
    Relay::new(
        config,
        Arc::new(platform),
        Arc::new(generator),
        Arc::new(summarizer),
    )
}

async fn mock_login_and_channel(discord: &MockServer) {
    discord
        .mock_async(|when, then| {
            when.method(GET)
                .path("/users/@me")
                .header("authorization", "Bot bot-token");
            then.status(200)
                .json_body(json!({"id": "1", "username": "reportfy"}));
        })
        .await;
    discord
        .mock_async(|when, then| {
            when.method(GET).path(format!("/channels/{CHANNEL}"));
            then.status(200)
                .json_body(json!({"id": CHANNEL, "name": "status", "type": 0}));
        })
        .await;
}

async fn mock_post<'a>(discord: &'a MockServer, content: &str) -> Mock<'a> {
    let body = json!({ "content": content });
    discord
        .mock_async(|when, then| {
            when.method(POST)
                .path(format!("/channels/{CHANNEL}/messages"))
                .json_body(body);
            then.status(200).json_body(json!({"id": "m"}));
        })
        .await
}

#[tokio::test]
async fn full_run_posts_notices_and_summary() {
    let discord = MockServer::start_async().await;
    let gemini = MockServer::start_async().await;
    let tmp = TempDir::new().unwrap();
    mock_login_and_channel(&discord).await;

    let summary = "**[Ana]** fechou 5 issues.\n**[Bruno]** fechou 2 issues.";
    let generate = gemini
        .mock_async(|when, then| {
            when.method(POST)
                .path(GEMINI_PATH)
                .query_param("key", "gemini-key")
                .body_includes("## developer_stats_ana")
                .body_includes("## developer_stats_bruno");
            then.status(200).json_body(json!({
                "candidates": [{"content": {"parts": [{"text": summary}], "role": "model"}}]
            }));
        })
        .await;

    let starting = mock_post(&discord, notices::STARTING).await;
    let generated = mock_post(&discord, notices::GENERATED).await;
    let summarizing = mock_post(&discord, notices::SUMMARIZING).await;
    let body = mock_post(&discord, summary).await;
    let complete = mock_post(&discord, notices::COMPLETE).await;

    let config = config(&discord, &gemini, &tmp.path().join("Reports"));
    let report = relay(&config, true).run().await.unwrap();

    assert_eq!(report.final_state, PipelineState::Done);
    generate.assert_calls_async(1).await;
    for mock in [&starting, &generated, &summarizing, &body, &complete] {
        mock.assert_calls_async(1).await;
    }
}

#[tokio::test]
async fn no_reports_directory_posts_three_notices_and_skips_gemini() {
    let discord = MockServer::start_async().await;
    let gemini = MockServer::start_async().await;
    let tmp = TempDir::new().unwrap();
    mock_login_and_channel(&discord).await;

    let generate = gemini
        .mock_async(|when, then| {
            when.method(POST).path(GEMINI_PATH);
            then.status(200).json_body(json!({}));
        })
        .await;
    let any_post = discord
        .mock_async(|when, then| {
            when.method(POST).path(format!("/channels/{CHANNEL}/messages"));
            then.status(200).json_body(json!({"id": "m"}));
        })
        .await;

    let config = config(&discord, &gemini, &tmp.path().join("Reports"));
    let report = relay(&config, false).run().await.unwrap();

    assert_eq!(report.final_state, PipelineState::Failed);
    assert!(report.exited_cleanly());
    any_post.assert_calls_async(3).await;
    generate.assert_calls_async(0).await;

    let states: Vec<PipelineState> = report.transitions.iter().map(|t| t.to).collect();
    assert_eq!(
        states,
        vec![
            PipelineState::Triggering,
            PipelineState::Locating,
            PipelineState::Failed
        ]
    );
}

#[tokio::test]
async fn gemini_outage_is_posted_as_summary_text() {
    let discord = MockServer::start_async().await;
    let gemini = MockServer::start_async().await;
    let tmp = TempDir::new().unwrap();
    mock_login_and_channel(&discord).await;

    gemini
        .mock_async(|when, then| {
            when.method(POST).path(GEMINI_PATH);
            then.status(503).body("Service Unavailable");
        })
        .await;
    let api_error = mock_post(&discord, "❌ Erro na API: 503").await;
    let others = discord
        .mock_async(|when, then| {
            when.method(POST).path(format!("/channels/{CHANNEL}/messages"));
            then.status(200).json_body(json!({"id": "m"}));
        })
        .await;

    let config = config(&discord, &gemini, &tmp.path().join("Reports"));
    let report = relay(&config, true).run().await.unwrap();

    assert!(report.is_success());
    api_error.assert_calls_async(1).await;
    others.assert_calls_async(4).await;
}

#[tokio::test]
async fn unknown_channel_fails_before_posting() {
    let discord = MockServer::start_async().await;
    let gemini = MockServer::start_async().await;
    let tmp = TempDir::new().unwrap();

    discord
        .mock_async(|when, then| {
            when.method(GET).path("/users/@me");
            then.status(200)
                .json_body(json!({"id": "1", "username": "reportfy"}));
        })
        .await;
    discord
        .mock_async(|when, then| {
            when.method(GET).path(format!("/channels/{CHANNEL}"));
            then.status(403)
                .json_body(json!({"message": "Missing Access", "code": 50001}));
        })
        .await;
    let any_post = discord
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200);
        })
        .await;

    let config = config(&discord, &gemini, &tmp.path().join("Reports"));
    let err = relay(&config, true).run().await.unwrap_err();

    assert!(matches!(err, RelayError::ChannelUnavailable { .. }));
    assert!(err.is_fatal_startup());
    any_post.assert_calls_async(0).await;
}
