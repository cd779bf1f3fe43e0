use thiserror::Error;

/// Main error type for the supervisor
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    #[error("Process error: {0}")]
    Process(#[from] ProcessError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_yaml::Error),
}

/// Process-specific error types
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Script not found: {name} - {path}")]
    ScriptNotFound { name: String, path: String },

    #[error("Script not executable: {name} - {path}")]
    ScriptNotExecutable { name: String, path: String },

    #[error("Process spawn failed: {name} - {reason}")]
    SpawnFailed { name: String, reason: String },

    #[error("Process stop failed: {name} - {reason}")]
    StopFailed { name: String, reason: String },

    #[error("Process state error: {name} - expected {expected}, got {actual}")]
    InvalidState {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("Restart limit exceeded: {name} - {attempts} consecutive restarts (max {max})")]
    RestartLimitExceeded {
        name: String,
        attempts: u32,
        max: u32,
    },

    #[error("Log capture setup failed: {name} - {path}: {reason}")]
    LogSetup {
        name: String,
        path: String,
        reason: String,
    },
}

// Helper functions for creating specific error types
impl ProcessError {
    pub fn script_not_found(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::ScriptNotFound {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn script_not_executable(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::ScriptNotExecutable {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn spawn_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SpawnFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn stop_failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StopFailed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_state(
        name: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self::InvalidState {
            name: name.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn log_setup(
        name: impl Into<String>,
        path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::LogSetup {
            name: name.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }
}

// Result type aliases for convenience
pub type Result<T> = std::result::Result<T, SupervisorError>;
pub type ProcessResult<T> = std::result::Result<T, ProcessError>;
