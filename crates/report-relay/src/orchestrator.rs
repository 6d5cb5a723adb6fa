//! Single-shot relay run: generate → locate → summarize → post.
//!
//! `Relay::run` connects to the chat platform, resolves the target channel
//! and walks the pipeline once. Every exit path closes the platform, and
//! once the channel is known every exit path leaves a final message in it.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::chat::{split_message, ChatChannel, ChatPlatform, MAX_MESSAGE_CHARS};
use crate::config::RelayConfig;
use crate::errors::{ErrorClass, RelayError};
use crate::prompts::{summary_prompt, PROMPT_VERSION};
use crate::report_locator::ReportLocator;
use crate::report_trigger::{run_offloaded, GenerationOutcome, ReportGenerator};
use crate::state_machine::{PipelineState, StateMachine, TransitionRecord};
use crate::summarizer::Summarizer;

/// Status messages posted to the channel, in the order a full run posts them.
pub mod notices {
    pub const STARTING: &str = "🚀 Iniciando geração de relatório...";
    pub const GENERATED: &str = "📊 Relatório gerado com sucesso!";
    pub const NO_REPORT: &str = "⚠️ Nenhum relatório encontrado.";
    pub const SUMMARIZING: &str = "📝 Gerando resumo com a IA Gemini...";
    pub const COMPLETE: &str = "✅ Processo completo: relatório + resumo enviado!";

    /// Final message for any error caught by the top-level handler.
    pub fn execution_error(error: &dyn std::fmt::Display) -> String {
        format!("❌ Erro durante execução: {error}")
    }
}

/// Why a run ended in `Failed`.
#[derive(Debug, Clone, Serialize)]
pub struct RunFailure {
    pub class: ErrorClass,
    pub message: String,
}

/// Result of a run that got as far as the channel.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub final_state: PipelineState,
    pub transitions: Vec<TransitionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<RunFailure>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.final_state == PipelineState::Done
    }

    /// Done, or stopped because there was nothing to summarize.
    pub fn exited_cleanly(&self) -> bool {
        self.failure
            .as_ref()
            .map_or(true, |f| f.class == ErrorClass::Terminal)
    }
}

/// The wired-up relay: one chat platform, one generator, one summarizer.
pub struct Relay {
    channel_id: u64,
    platform: Arc<dyn ChatPlatform>,
    generator: Arc<dyn ReportGenerator>,
    summarizer: Arc<dyn Summarizer>,
    locator: ReportLocator,
}

impl Relay {
    pub fn new(
        config: &RelayConfig,
        platform: Arc<dyn ChatPlatform>,
        generator: Arc<dyn ReportGenerator>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            channel_id: config.discord.channel_id,
            platform,
            generator,
            summarizer,
            locator: ReportLocator::new(&config.reports_dir),
        }
    }

    /// Connect, run the pipeline once, disconnect.
    ///
    /// Returns `Err` only for startup failures (login or channel lookup),
    /// before anything is posted. Pipeline failures are reported in the
    /// channel and in the returned `RunReport`.
    pub async fn run(&self) -> Result<RunReport, RelayError> {
        let identity = match self.platform.connect().await {
            Ok(identity) => identity,
            Err(e) => {
                self.platform.close().await;
                return Err(RelayError::Login(e));
            }
        };
        info!(bot = %identity, channel_id = self.channel_id, "Ready, looking up channel");

        let channel = match self.platform.channel(self.channel_id).await {
            Ok(channel) => channel,
            Err(source) => {
                self.platform.close().await;
                return Err(RelayError::ChannelUnavailable {
                    channel_id: self.channel_id,
                    source,
                });
            }
        };

        let mut machine = StateMachine::new();
        let failure = match self.pipeline(channel.as_ref(), &mut machine).await {
            Ok(()) => None,
            Err(err) => {
                self.handle_failure(channel.as_ref(), &err).await;
                if !machine.is_terminal() {
                    let _ = machine.fail(&err.to_string());
                }
                Some(RunFailure {
                    class: err.class(),
                    message: err.to_string(),
                })
            }
        };

        self.platform.close().await;
        info!(history = %machine.summary(), "Relay run finished");

        Ok(RunReport {
            final_state: machine.current(),
            transitions: machine.into_transitions(),
            failure,
        })
    }

    async fn pipeline(
        &self,
        channel: &dyn ChatChannel,
        machine: &mut StateMachine,
    ) -> Result<(), RelayError> {
        machine.advance(PipelineState::Triggering, None)?;
        channel.send(notices::STARTING).await?;
        let outcome = run_offloaded(Arc::clone(&self.generator)).await;
        channel.send(notices::GENERATED).await?;

        machine.advance(PipelineState::Locating, Some(outcome_label(&outcome)))?;
        let Some(document) = self.locator.locate() else {
            channel.send(notices::NO_REPORT).await?;
            return Err(RelayError::NoReport);
        };

        let reason = format!("{} report sections", document.sections.len());
        machine.advance(PipelineState::Summarizing, Some(&reason))?;
        let prompt = summary_prompt(&document.render());
        info!(
            source = %document.source.display(),
            prompt_chars = prompt.chars().count(),
            prompt_version = PROMPT_VERSION,
            "Requesting summary"
        );
        channel.send(notices::SUMMARIZING).await?;
        let summary = self.summarizer.summarize(&prompt).await?;

        let chunks = split_message(&summary, MAX_MESSAGE_CHARS);
        machine.advance(
            PipelineState::Posting,
            Some(&format!("{} chunks", chunks.len())),
        )?;
        for chunk in chunks {
            channel.send(chunk).await?;
        }
        channel.send(notices::COMPLETE).await?;

        machine.advance(PipelineState::Done, None)?;
        Ok(())
    }

    async fn handle_failure(&self, channel: &dyn ChatChannel, err: &RelayError) {
        // A terminal stop already posted its own notice.
        if err.class() == ErrorClass::Terminal {
            warn!("{err}");
            return;
        }
        error!(class = %err.class(), "Relay run failed: {err}");
        if let Err(send_err) = channel.send(&notices::execution_error(err)).await {
            error!("Could not post failure notice: {send_err}");
        }
    }
}

fn outcome_label(outcome: &GenerationOutcome) -> &'static str {
    match outcome {
        GenerationOutcome::Completed => "generator completed",
        GenerationOutcome::Aborted { .. } => "generator aborted",
        GenerationOutcome::Failed { .. } => "generator failed",
    }
}
