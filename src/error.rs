use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Descriptor buffer holds {actual} values, expected {expected}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    #[error("Image buffer of {len} values cannot hold a {width}x{height} view with stride {stride}")]
    InvalidImage {
        len: usize,
        width: usize,
        height: usize,
        stride: usize,
    },

    #[error(
        "Region {width}x{height} at ({x}, {y}) out of bounds for {image_width}x{image_height} image"
    )]
    RegionOutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
        image_width: usize,
        image_height: usize,
    },

    #[error("Vector length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("Cannot parse {value:?} on line {line} as a number")]
    Parse { line: usize, value: String },
}

pub type Result<T> = std::result::Result<T, Error>;
