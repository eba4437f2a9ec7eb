use thiserror::Error;

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("service not found: {0}")]
    NotFound(String),

    #[error("failed to start {0}")]
    StartFailed(String),

    #[error("dependency cycle detected at {0}")]
    Cycle(String),
}
