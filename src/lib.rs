pub mod config;
pub mod error;
pub mod types;
pub mod websocket;
pub use error::{PushError, Result};
