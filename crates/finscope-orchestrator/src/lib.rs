pub mod chat;
pub mod context;
pub mod entry;
pub mod error;
pub mod forecast;
pub mod orchestrator;
pub mod steps;

pub use context::OrchestratorContext;
pub use entry::start_or_reuse_message;
pub use orchestrator::run;
pub use steps::step_schedule;
