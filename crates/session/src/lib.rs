//! Session orchestration.
//!
//! The [`SessionMachine`] is the top-level per-session orchestrator. It
//! routes operator input through the guided [`interpreter`] or hands
//! control to the autonomous [`engine`], owns the transcript, and exposes
//! an ordered event stream plus the Markdown [`export`].

pub mod engine;
pub mod export;
pub mod interpreter;
pub mod machine;
pub mod visits;

pub use engine::EngineControl;
pub use export::export_markdown;
pub use interpreter::{interpret, OperatorInput};
pub use machine::{CommandOutcome, SessionCommand, SessionEvent, SessionMachine, StartOptions};
