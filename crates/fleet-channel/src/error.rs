//! Channel error types

use thiserror::Error;

/// Live update channel errors
#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("Connection failed after {attempts} attempt(s): {last_error}")]
    ConnectFailed { attempts: u32, last_error: String },

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ChannelResult<T> = Result<T, ChannelError>;
