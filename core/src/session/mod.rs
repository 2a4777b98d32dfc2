pub mod lifecycle;
pub mod state;
pub mod termination;

pub use lifecycle::{Session, SessionSummary, TickOutcome};
pub use state::RunState;
pub use termination::{ProgressReport, RunController, StopReason, TerminationPolicy, Verdict};
