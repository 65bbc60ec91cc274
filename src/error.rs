use thiserror::Error;

pub type Result<T, E = SpeedTestError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SpeedTestError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server responded with status {0}")]
    Status(u16),
    #[error("phase deadline reached")]
    TimeoutAbort,
    #[error("host boundary error: {0}")]
    Host(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SpeedTestError {
    pub fn is_timeout_abort(&self) -> bool {
        matches!(self, SpeedTestError::TimeoutAbort)
    }
}

impl From<reqwest::Error> for SpeedTestError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => SpeedTestError::Status(status.as_u16()),
            None => SpeedTestError::Network(err.to_string()),
        }
    }
}
