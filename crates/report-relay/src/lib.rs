pub mod chat;
pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod prompts;
pub mod report_locator;
pub mod report_trigger;
pub mod state_machine;
pub mod summarizer;
