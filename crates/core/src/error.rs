use thiserror::Error;

/// Failures starting the master timer's tick thread
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to build tick runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("failed to spawn tick thread: {0}")]
    ThreadSpawn(#[source] std::io::Error),
}
