use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO Error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image Error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Json Error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Font Error: {0}")]
    FontError(#[from] ab_glyph::InvalidFont),

    #[error("Invalid size: {0}x{1}")]
    InvalidSize(u32, u32),

    #[error("Malformed detection #{index}: {reason}")]
    MalformedDetection { index: usize, reason: &'static str },

    #[error("Associator Error: {0}")]
    Associator(String),

    #[error("Detector Error: {0}")]
    Detector(String),
}
