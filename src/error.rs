
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Process error: {0}")]
    ProcessError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("PID file error: {0}")]
    PidFileError(String),

    #[error("User lookup error: {0}")]
    UserLookupError(String),

    #[error("No such process: {0}")]
    NoSuchProcess(u32),

    #[error("Unsupported on this platform: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<toml::de::Error> for SupervisorError {
    fn from(error: toml::de::Error) -> Self {
        SupervisorError::ConfigError(error.to_string())
    }
}

impl SupervisorError {
    /// The platform cannot introspect or signal foreign processes.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, SupervisorError::Unsupported(_))
    }

    /// The target process is already gone.
    pub fn is_no_such_process(&self) -> bool {
        matches!(self, SupervisorError::NoSuchProcess(_))
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            SupervisorError::ProcessError(_) => "PROCESS_ERROR",
            SupervisorError::ConfigError(_) => "CONFIG_ERROR",
            SupervisorError::PidFileError(_) => "PID_FILE_ERROR",
            SupervisorError::UserLookupError(_) => "USER_LOOKUP_ERROR",
            SupervisorError::NoSuchProcess(_) => "NO_SUCH_PROCESS",
            SupervisorError::Unsupported(_) => "UNSUPPORTED",
            SupervisorError::IoError(_) => "IO_ERROR",
            SupervisorError::JsonError(_) => "JSON_ERROR",
            SupervisorError::SerializationError(_) => "SERIALIZATION_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
