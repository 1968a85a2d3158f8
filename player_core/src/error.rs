use thiserror::Error;

/// Player errors
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Audio output unavailable: {0}")]
    Output(String),

    #[error("Audio stream read failed: {0}")]
    Stream(#[source] anyhow::Error),
}

impl PlayerError {
    pub fn output(msg: impl Into<String>) -> Self {
        PlayerError::Output(msg.into())
    }
}
