//! Detection-to-actor correlation and bounded population control for the
//! radar labeling logger.
//!
//! A [`Session`] owns the simulation host connection, keeps a bounded set of
//! vehicles alive near the sensor, attributes each radar return to the first
//! live vehicle within the match radius and appends labeled rows to a
//! [`sink::RecordSink`].

pub mod clock;
pub mod config;
pub mod host_interface;
pub mod math;
pub mod population;
pub mod prelude;
pub mod processing;
pub mod session;
pub mod sink;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{DrivingProfile, SessionConfig, TerminationStrategy};
pub use session::{Session, SessionSummary, StopReason, TickOutcome};
