use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Logic error: {0}")]
    Logic(String),
    #[error("Compression error: {0}")]
    Compress(#[from] flate2::CompressError),
}
