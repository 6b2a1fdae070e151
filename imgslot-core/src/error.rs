use thiserror::Error;

pub type Result<T> = std::result::Result<T, ImgSlotError>;

#[derive(Error, Debug)]
pub enum ImgSlotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid API key")]
    Unauthorized,

    #[error("File must be an image, got content type: {0}")]
    InvalidContentType(String),

    #[error("No image has been uploaded and no placeholder is available")]
    NotFound,

    #[error("Upload failed: {0}")]
    WriteFailure(String),

    #[error("Read failed: {0}")]
    ReadFailure(String),

    #[error("Placeholder synthesis failed: {0}")]
    PlaceholderSynthesis(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP error: {0}")]
    Http(String),
}
