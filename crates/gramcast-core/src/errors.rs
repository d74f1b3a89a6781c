/// Core error type for gramcast.
///
/// The adapter crate maps its platform-specific errors into this type so the
/// orchestrator can handle failures consistently (fatal-to-job vs absorbed).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("cannot resolve group: {0}")]
    Resolution(String),

    #[error("migration capacity exceeded: {active} jobs already running (max {max})")]
    Capacity { active: usize, max: usize },

    #[error("quota persistence error: {0}")]
    Persistence(String),

    #[error("failed to enumerate destinations: {0}")]
    Enumeration(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
