use crate::host_interface::ActorId;

/// Failures reported by the simulation host collaborator.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("connection to simulation host lost")]
    Disconnected,
    #[error("world load failed: {0}")]
    WorldLoad(String),
    #[error("sensor failure: {0}")]
    Sensor(String),
    #[error("spawn collision: {0}")]
    SpawnCollision(String),
    #[error("invalid placement: {0}")]
    InvalidPlacement(String),
    #[error("actor {0} no longer exists")]
    ActorGone(ActorId),
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl HostError {
    /// Fatal errors abort the session; everything else is retried or skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            HostError::Connection(_)
                | HostError::Disconnected
                | HostError::WorldLoad(_)
                | HostError::Sensor(_)
        )
    }
}

/// A detection payload that cannot be converted to a world position.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DetectionError {
    #[error("malformed detection: {field} = {value}")]
    Malformed { field: &'static str, value: f64 },
}

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("sink i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv encoding: {0}")]
    Csv(#[from] csv::Error),
    #[error("sink already closed")]
    Closed,
}

/// Common error type for a logging session.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Host(#[from] HostError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("session used before prepare()")]
    NotPrepared,
}

pub type HostResult<T> = Result<T, HostError>;
pub type SinkResult<T> = Result<T, SinkError>;
pub type SessionResult<T> = Result<T, SessionError>;
