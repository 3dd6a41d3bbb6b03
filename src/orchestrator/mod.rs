pub mod orchestrator;

pub use orchestrator::{CommandOutcome, CommandRecord, Operation, apply_batch};
