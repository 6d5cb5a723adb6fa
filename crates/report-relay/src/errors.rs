//! Relay error taxonomy.
//!
//! Failures the pipeline absorbs (generator exiting early, an unreadable
//! report file, a non-200 or malformed summarizer reply) never become a
//! `RelayError`; they are logged where they happen and the run continues.
//! Everything else lands here and is classified so the orchestrator and
//! `main` can decide what to do without string matching.
//!
//! | Class          | Effect                                          |
//! |----------------|-------------------------------------------------|
//! | FatalStartup   | nothing is posted, process exits non-zero       |
//! | Terminal       | user-visible notice, run ends in `Failed`       |
//! | Unhandled      | generic error notice, run ends in `Failed`      |

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::chat::ChatError;
use crate::config::ConfigError;
use crate::state_machine::IllegalTransition;
use crate::summarizer::SummarizerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Invalid configuration or an unreachable chat target.
    FatalStartup,
    /// Expected end of the pipeline with a dedicated notice.
    Terminal,
    /// Caught by the top-level handler.
    Unhandled,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FatalStartup => write!(f, "fatal_startup"),
            Self::Terminal => write!(f, "terminal"),
            Self::Unhandled => write!(f, "unhandled"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Authenticating against the chat platform failed.
    #[error("Chat login failed: {0}")]
    Login(#[source] ChatError),

    /// The configured channel id does not resolve (wrong id or no access).
    #[error("Channel {channel_id} could not be resolved: {source}")]
    ChannelUnavailable {
        channel_id: u64,
        #[source]
        source: ChatError,
    },

    #[error("No report document found")]
    NoReport,

    #[error("{0}")]
    Chat(#[from] ChatError),

    #[error("{0}")]
    Summarizer(#[from] SummarizerError),

    #[error(transparent)]
    IllegalTransition(#[from] IllegalTransition),
}

impl RelayError {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Config(_) | Self::Login(_) | Self::ChannelUnavailable { .. } => {
                ErrorClass::FatalStartup
            }
            Self::NoReport => ErrorClass::Terminal,
            Self::Chat(_) | Self::Summarizer(_) | Self::IllegalTransition(_) => {
                ErrorClass::Unhandled
            }
        }
    }

    pub fn is_fatal_startup(&self) -> bool {
        self.class() == ErrorClass::FatalStartup
    }
}
