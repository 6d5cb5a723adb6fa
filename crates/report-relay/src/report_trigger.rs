//! Bridge to the external report generator (`reportify`).
//!
//! The generator is an interactive, binary-only tool, so we shell out and
//! answer its prompts from a script: `0` selects every developer, an empty
//! line leaves the prompt loop. Whatever happens, the result is a
//! `GenerationOutcome`; a failed run never stops the pipeline because an
//! older report may still be on disk.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::GeneratorConfig;

/// Scripted answers fed to the generator's prompts, in order.
pub const SCRIPTED_ANSWERS: [&str; 2] = ["0", ""];

/// How a generator run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Completed,
    /// The tool exited on its own with a failure code (it does this when
    /// the selection ends up empty).
    Aborted { code: Option<i32> },
    /// The tool could not be run at all, or the worker died.
    Failed { reason: String },
}

impl GenerationOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// Abstraction over report generators.
///
/// `ReportfyBridge` runs the real CLI; tests provide fakes. Implementations
/// block, so callers go through `run_offloaded`.
#[cfg_attr(test, mockall::automock)]
pub trait ReportGenerator: Send + Sync {
    fn generate(&self) -> GenerationOutcome;
}

/// Runs the configured generator command with scripted stdin.
pub struct ReportfyBridge {
    config: GeneratorConfig,
}

impl ReportfyBridge {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    fn scripted_input() -> String {
        SCRIPTED_ANSWERS
            .iter()
            .map(|answer| format!("{answer}\n"))
            .collect()
    }
}

impl ReportGenerator for ReportfyBridge {
    fn generate(&self) -> GenerationOutcome {
        let mut command = Command::new(&self.config.bin);
        command
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return GenerationOutcome::Failed {
                    reason: format!("failed to run `{}`: {e}", self.config.bin),
                }
            }
        };

        // Dropping stdin afterwards closes it, so any extra prompt reads EOF.
        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(Self::scripted_input().as_bytes()) {
                warn!("Could not script {} prompts: {e}", self.config.bin);
            }
        }

        let output = match child.wait_with_output() {
            Ok(output) => output,
            Err(e) => {
                return GenerationOutcome::Failed {
                    reason: format!("`{}` did not finish: {e}", self.config.bin),
                }
            }
        };

        if let Some(stdout) = captured_text(&output.stdout) {
            debug!(bin = %self.config.bin, "Generator stdout:\n{stdout}");
        }
        let stderr = captured_text(&output.stderr);

        if output.status.success() {
            if let Some(stderr) = stderr {
                debug!(bin = %self.config.bin, "Generator stderr:\n{stderr}");
            }
            GenerationOutcome::Completed
        } else {
            warn!(
                code = ?output.status.code(),
                stderr = stderr.as_deref().unwrap_or(""),
                "{} exited abnormally",
                self.config.bin
            );
            GenerationOutcome::Aborted {
                code: output.status.code(),
            }
        }
    }
}

/// Trimmed, lossily decoded process output; `None` when there was none.
fn captured_text(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Run `generator` on the blocking pool and wait for it without stalling
/// the async runtime. Never fails: a panicking worker becomes `Failed`.
pub async fn run_offloaded(generator: Arc<dyn ReportGenerator>) -> GenerationOutcome {
    let outcome = match tokio::task::spawn_blocking(move || generator.generate()).await {
        Ok(outcome) => outcome,
        Err(e) => GenerationOutcome::Failed {
            reason: format!("report worker stopped: {e}"),
        },
    };

    match &outcome {
        GenerationOutcome::Completed => info!("Report generation finished"),
        GenerationOutcome::Aborted { code } => warn!(
            ?code,
            "No selection made or generator aborted, continuing with whatever report is on disk"
        ),
        GenerationOutcome::Failed { reason } => {
            warn!(%reason, "Report generation failed, continuing")
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge(bin: &str, args: &[&str]) -> ReportfyBridge {
        ReportfyBridge::new(GeneratorConfig {
            bin: bin.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            working_dir: None,
        })
    }

    #[test]
    fn scripted_input_selects_all_then_exits() {
        assert_eq!(ReportfyBridge::scripted_input(), "0\n\n");
    }

    #[test]
    fn missing_binary_is_failed_not_panic() {
        let outcome = bridge("reportify-does-not-exist-4f2a", &[]).generate();
        match outcome {
            GenerationOutcome::Failed { reason } => {
                assert!(reason.contains("reportify-does-not-exist-4f2a"))
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn reads_scripted_answers_from_stdin() {
        // Succeeds only if the first line is "0" and the second is empty.
        let script = r#"read a; read b; [ "$a" = "0" ] && [ -z "$b" ]"#;
        assert_eq!(bridge("sh", &["-c", script]).generate(), GenerationOutcome::Completed);
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_aborted() {
        let outcome = bridge("sh", &["-c", "echo 'nothing selected' >&2; exit 3"]).generate();
        assert_eq!(outcome, GenerationOutcome::Aborted { code: Some(3) });
        assert!(!outcome.is_completed());
    }

    #[test]
    fn captured_output_is_trimmed_and_blank_is_dropped() {
        assert_eq!(
            captured_text(b"Relatorio salvo em Reports/2025-06-02\n").as_deref(),
            Some("Relatorio salvo em Reports/2025-06-02")
        );
        assert_eq!(captured_text(b"  \n\t"), None);
        assert_eq!(captured_text(&[b'o', b'k', 0xff]).as_deref(), Some("ok\u{fffd}"));
    }

    #[cfg(unix)]
    #[test]
    fn chatty_generator_still_completes() {
        let script = "echo 'Selecione os desenvolvedores'; echo 'aviso' >&2; exit 0";
        assert_eq!(bridge("sh", &["-c", script]).generate(), GenerationOutcome::Completed);
    }

    #[tokio::test]
    async fn offloaded_run_returns_generator_outcome() {
        let mut generator = MockReportGenerator::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|| GenerationOutcome::Aborted { code: Some(1) });

        let outcome = run_offloaded(Arc::new(generator)).await;
        assert_eq!(outcome, GenerationOutcome::Aborted { code: Some(1) });
    }

    struct PanickingGenerator;

    impl ReportGenerator for PanickingGenerator {
        fn generate(&self) -> GenerationOutcome {
            panic!("generator blew up");
        }
    }

    #[tokio::test]
    async fn panicking_worker_is_absorbed() {
        let outcome = run_offloaded(Arc::new(PanickingGenerator)).await;
        assert!(matches!(outcome, GenerationOutcome::Failed { .. }));
    }
}
