use thiserror::Error;
use tokio_tungstenite::tungstenite;
use url::ParseError;

pub type Result<T, E = PushError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("WebSocket Error: {0}")]
    WebsocketError(String),

    #[error("JSON Serialization/Deserialization Error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("URL Parsing Error: {0}")]
    UrlParseError(#[from] ParseError),

    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<tungstenite::Error> for PushError {
    fn from(e: tungstenite::Error) -> Self {
        PushError::WebsocketError(e.to_string())
    }
}
