use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Unknown job: {name}")]
    UnknownJobError { name: String },

    #[error("Input path does not exist: {}", path.display())]
    InputNotFoundError { path: PathBuf },

    #[error("Failed to launch '{program}': {source}")]
    LaunchError {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    Input,
    Launch,
    Io,
    Serialization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RunnerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RunnerError::ConfigValidationError { .. }
            | RunnerError::InvalidConfigValueError { .. }
            | RunnerError::UnknownJobError { .. } => ErrorCategory::Config,
            RunnerError::InputNotFoundError { .. } => ErrorCategory::Input,
            RunnerError::LaunchError { .. } => ErrorCategory::Launch,
            RunnerError::IoError(_) => ErrorCategory::Io,
            RunnerError::SerializationError(_) => ErrorCategory::Serialization,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Serialization => ErrorSeverity::Medium,
            ErrorCategory::Config | ErrorCategory::Input => ErrorSeverity::High,
            ErrorCategory::Launch | ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    /// 對應 shell 的退出碼慣例
    pub fn exit_code(&self) -> i32 {
        match self {
            RunnerError::LaunchError { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                127
            }
            _ => match self.category() {
                ErrorCategory::Config | ErrorCategory::Input => 1,
                ErrorCategory::Launch | ErrorCategory::Io | ErrorCategory::Serialization => 3,
            },
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            RunnerError::InputNotFoundError { path } => {
                format!("找不到輸入路徑: {}", path.display())
            }
            RunnerError::UnknownJobError { name } => format!("設定檔中沒有名為 '{}' 的任務", name),
            RunnerError::LaunchError { program, .. } => format!("無法啟動外部程式 '{}'", program),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            RunnerError::LaunchError { source, .. }
                if source.kind() == std::io::ErrorKind::NotFound =>
            {
                "Check that the interpreter is on PATH or set [runner].python"
            }
            _ => match self.category() {
                ErrorCategory::Config => "Fix the configuration file and run `endo-runner list` to check it",
                ErrorCategory::Input => "Make sure the input folder or file exists before running the job",
                ErrorCategory::Launch => "Check the interpreter and scripts_dir settings",
                ErrorCategory::Io => "Check file system permissions and free disk space",
                ErrorCategory::Serialization => "Check that the report path is writable",
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, RunnerError>;
