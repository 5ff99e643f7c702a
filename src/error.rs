/// Result alias for YOLOv5 post-processing.
pub type Result<T> = std::result::Result<T, YoloV5Error>;

/// YOLOv5 error enum.
#[derive(thiserror::Error, Debug)]
pub enum YoloV5Error {
    /// The raw prediction buffer does not match the configured layout.
    #[error("Invalid prediction shape: expected {expected}, got {actual}")]
    InvalidShape {
        /// Description of the expected shape.
        expected: String,
        /// Description of the shape that was received.
        actual: String,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The class-name list contains no labels.
    #[error("Class-name list is empty")]
    EmptyClassNames,

    /// Internal candle error.
    #[error(transparent)]
    CandleError(#[from] candle_core::Error),

    /// Kornia image error.
    #[error(transparent)]
    KorniaImageError(#[from] kornia_image::ImageError),

    /// I/O error while reading auxiliary files.
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}
