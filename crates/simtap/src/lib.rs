pub mod automation;
pub mod device;
pub mod mcp;
pub mod screenshot;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no usable backend for {0}")]
    BackendUnavailable(String),

    #[error("element not found: {0}")]
    ElementNotFound(String),

    #[error("simulator window bounds unavailable: {0}")]
    WindowBounds(String),

    #[error("action timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Automation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
