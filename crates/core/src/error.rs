use crate::phase::Phase;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Missing required swing phase: {0}")]
    MissingPhase(Phase),
}
