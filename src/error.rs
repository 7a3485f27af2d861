use std::fmt;

/// Result type for training pipeline operations
pub type Result<T> = std::result::Result<T, DqnError>;

/// Main error type for the n-step DQN pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum DqnError {
    /// The environment adapter failed on `reset` or `step`. Fatal, never retried.
    EnvironmentFailure(String),

    /// A batch was requested before the replay buffer was warmed up
    InsufficientData {
        requested: usize,
        available: usize,
    },

    /// A hyperparameter or constructor argument is out of range
    InvalidConfiguration {
        name: String,
        reason: String,
    },

    /// Invalid dimensions for operations
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Action index outside the action space
    InvalidAction {
        action: usize,
        num_actions: usize,
    },

    /// Numerical computation errors
    NumericalError(String),

    /// IO errors (file operations)
    IoError(String),

    /// Serialization/deserialization errors
    SerializationError(String),

    /// The trainer already stopped and cannot run more iterations
    TrainingTerminated(String),
}

impl fmt::Display for DqnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DqnError::EnvironmentFailure(msg) => write!(f, "Environment failure: {}", msg),
            DqnError::InsufficientData { requested, available } => {
                write!(f, "Insufficient data: requested {} experiences, {} available", requested, available)
            }
            DqnError::InvalidConfiguration { name, reason } => {
                write!(f, "Invalid configuration '{}': {}", name, reason)
            }
            DqnError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            DqnError::InvalidAction { action, num_actions } => {
                write!(f, "Invalid action {}: must be less than {}", action, num_actions)
            }
            DqnError::NumericalError(msg) => write!(f, "Numerical error: {}", msg),
            DqnError::IoError(msg) => write!(f, "IO error: {}", msg),
            DqnError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            DqnError::TrainingTerminated(reason) => write!(f, "Training terminated: {}", reason),
        }
    }
}

impl std::error::Error for DqnError {}

impl From<std::io::Error> for DqnError {
    fn from(err: std::io::Error) -> Self {
        DqnError::IoError(err.to_string())
    }
}

impl From<bincode::Error> for DqnError {
    fn from(err: bincode::Error) -> Self {
        DqnError::SerializationError(err.to_string())
    }
}

impl From<serde_json::Error> for DqnError {
    fn from(err: serde_json::Error) -> Self {
        DqnError::SerializationError(err.to_string())
    }
}

// Helper functions for common error patterns
impl DqnError {
    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        DqnError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn invalid_configuration<N: Into<String>, R: Into<String>>(name: N, reason: R) -> Self {
        DqnError::InvalidConfiguration {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn environment<S: Into<String>>(msg: S) -> Self {
        DqnError::EnvironmentFailure(msg.into())
    }

    /// Whether the error must stop training immediately.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, DqnError::InsufficientData { .. })
    }
}
