use fever_client::ClientError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("The Fever server rejected the username or API password.")]
    InvalidCredentials,
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error(transparent)]
    Client(ClientError),

    #[error("{0}")]
    GeneralError(String),
}

impl From<ClientError> for AppError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Authentication => AppError::InvalidCredentials,
            ClientError::Config(msg) => AppError::ConfigError(msg),
            ClientError::ConfigValidation { field, message } => {
                AppError::ConfigError(format!("invalid {field}: {message}"))
            },
            other => AppError::Client(other),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::GeneralError(format!("Failed to encode output: {e}"))
    }
}
