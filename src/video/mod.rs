mod analyzer;
mod checkpoint;
mod data;
mod features;
mod matrix;
mod search;

pub use analyzer::{Analysis, AnalysisConfig, AnalysisSession};
pub use checkpoint::{CancellationToken, Checkpoint, Progress, Stage};
pub use data::{FrameSample, FrameView, LoopWindow, ManualSelection, RenderRequest, Timeline};
pub use features::{extract, similarity, FeatureVector, RgbColor, HISTOGRAM_BINS};
pub use matrix::SimilarityMatrix;
pub use search::{rescore, search};

/// Default sampling rate (samples per second).
///
/// This is the rate at which the decode collaborator should capture frames from the clip.
pub const DEFAULT_FRAMES_PER_SECOND: f32 = 4.0;

/// Default thumbnail size (pixels).
///
/// Frames are downsampled to a square of this size before feature extraction. The features
/// are resolution independent, so larger buffers only add cost.
pub const DEFAULT_THUMBNAIL_SIZE: u32 = 64;

/// Default minimum loop duration (seconds).
pub const DEFAULT_MIN_LOOP_DURATION: f64 = 1.0;

/// Default maximum loop duration (seconds).
///
/// This also bounds the cost of the boundary search.
pub const DEFAULT_MAX_LOOP_DURATION: f64 = 10.0;

/// Default yield interval.
///
/// Extraction and matrix construction hit a yield point once every this many frames (or
/// matrix rows). Cancellation is checked at every yield point.
pub const DEFAULT_YIELD_INTERVAL: usize = 10;

/// Default number of back-to-back repetitions requested from the renderer.
pub const DEFAULT_RENDER_REPEAT: u32 = 3;

/// Weight of the histogram term in [similarity]. The colour term gets the remainder.
const HISTOGRAM_WEIGHT: f64 = 0.7;
const COLOR_WEIGHT: f64 = 0.3;

/// Weights of the seam frame and its two neighbor comparisons in the interior search score.
const SEAM_WEIGHT: f64 = 0.5;
const NEIGHBOR_WEIGHT: f64 = 0.25;
