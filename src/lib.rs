pub mod frames;
pub mod util;
pub mod video;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("frame buffer contains no pixels")]
    EmptyFrame,
    #[error("frame buffer has invalid length: width={width} height={height} len={len}")]
    InvalidFrameBuffer { width: u32, height: u32, len: usize },
    #[error("no frame samples provided to analyzer")]
    NoSamples,
    #[error("minimum loop window of {min_duration_samples} samples does not fit in {available} samples")]
    InsufficientSamples {
        min_duration_samples: usize,
        available: usize,
    },
    #[error("similarity matrix has {rows} rows but {samples} samples were provided")]
    MatrixMismatch { rows: usize, samples: usize },
    #[error("invalid analysis config: {0}")]
    InvalidConfig(String),
    #[error("analysis cancelled")]
    Cancelled,
    #[error("an analysis is already running on this session")]
    AnalysisInProgress,
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("serde_json error: {0}")]
    SerdeJSONError(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
