pub mod controller;
pub mod registry;

pub use controller::{PopulationController, PopulationSettings, SpawnOutcome, StepReport};
pub use registry::{ActorRegistry, CleanupReport, LiveActor, ReleaseReport, SpawnRequest};
