use thiserror::Error;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Failures of a single inversion run.
///
/// These abort the run for one spectrum only. Soft outcomes (iteration budget
/// exhausted, stalled step length) are reported through `RunStatus` instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InversionError {
    #[error("non-finite model parameter at index {index}: {value}")]
    InvalidParameter { index: usize, value: f64 },

    #[error("lambda search failed: no candidate produced a finite objective ({candidates} tried)")]
    LambdaSearch { candidates: usize },

    #[error("normal equations are singular (lambda={lambda:e})")]
    SingularSystem { lambda: f64 },

    #[error("invalid inversion settings: {0}")]
    InvalidConfig(String),

    #[error("invalid spectrum: {0}")]
    InvalidSpectrum(String),
}

impl From<InversionError> for AppError {
    fn from(err: InversionError) -> Self {
        let code = match err {
            InversionError::InvalidConfig(_) | InversionError::InvalidSpectrum(_) => 2,
            _ => 4,
        };
        AppError::new(code, err.to_string())
    }
}
