use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Fatal to a user's run: bad portfolio weights, bad weight tables, bad thresholds.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A user's run could not complete (worker panicked or was cancelled).
    #[error("Pipeline execution failed: {0}")]
    Execution(String),
}

impl AnalysisError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, AnalysisError::Configuration(_))
    }
}
