use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{
    extract, search, Checkpoint, FrameSample, FrameView, LoopWindow, ManualSelection,
    SimilarityMatrix, Stage, Timeline,
};
use crate::util;
use crate::{Error, Result};

/// Tunables for one [AnalysisSession].
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Sampling rate of the frames handed to the session.
    pub frames_per_second: f32,
    /// Side of the square thumbnail frames are downsampled to before analysis.
    pub thumbnail_size: u32,
    pub min_loop_duration: Duration,
    pub max_loop_duration: Duration,
    /// Number of frames (or matrix rows) between two yield points.
    pub yield_interval: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            frames_per_second: super::DEFAULT_FRAMES_PER_SECOND,
            thumbnail_size: super::DEFAULT_THUMBNAIL_SIZE,
            min_loop_duration: Duration::from_secs_f64(super::DEFAULT_MIN_LOOP_DURATION),
            max_loop_duration: Duration::from_secs_f64(super::DEFAULT_MAX_LOOP_DURATION),
            yield_interval: super::DEFAULT_YIELD_INTERVAL,
        }
    }
}

impl AnalysisConfig {
    /// Returns a new [AnalysisConfig] with the provided `frames_per_second`.
    pub fn with_frames_per_second(mut self, frames_per_second: f32) -> Self {
        self.frames_per_second = frames_per_second;
        self
    }

    /// Returns a new [AnalysisConfig] with the provided `thumbnail_size`.
    pub fn with_thumbnail_size(mut self, thumbnail_size: u32) -> Self {
        self.thumbnail_size = thumbnail_size;
        self
    }

    /// Returns a new [AnalysisConfig] with the provided `min_loop_duration`.
    pub fn with_min_loop_duration(mut self, min_loop_duration: Duration) -> Self {
        self.min_loop_duration = min_loop_duration;
        self
    }

    /// Returns a new [AnalysisConfig] with the provided `max_loop_duration`.
    pub fn with_max_loop_duration(mut self, max_loop_duration: Duration) -> Self {
        self.max_loop_duration = max_loop_duration;
        self
    }

    /// Returns a new [AnalysisConfig] with the provided `yield_interval`.
    pub fn with_yield_interval(mut self, yield_interval: usize) -> Self {
        self.yield_interval = yield_interval;
        self
    }

    /// Minimum loop length in samples, `floor(min_loop_duration * fps)`.
    pub fn min_duration_samples(&self) -> usize {
        Self::duration_samples(self.min_loop_duration, self.frames_per_second)
    }

    /// Maximum loop length in samples, `floor(max_loop_duration * fps)`.
    pub fn max_duration_samples(&self) -> usize {
        Self::duration_samples(self.max_loop_duration, self.frames_per_second)
    }

    // Durations built from f32 seconds sit a few nanoseconds below the decimal value
    // (0.7s becomes 0.699999988s), so products within SAMPLE_EPSILON of the next whole
    // sample count as that sample.
    fn duration_samples(duration: Duration, fps: f32) -> usize {
        const SAMPLE_EPSILON: f64 = 1e-6;
        (duration.as_secs_f64() * fps as f64 + SAMPLE_EPSILON).floor() as usize
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.frames_per_second.is_finite() && self.frames_per_second > 0.0) {
            return Err(Error::InvalidConfig(format!(
                "frames_per_second must be a positive number, got {}",
                self.frames_per_second
            )));
        }
        if self.thumbnail_size == 0 {
            return Err(Error::InvalidConfig(
                "thumbnail_size must be at least 1 pixel".to_string(),
            ));
        }
        if self.min_duration_samples() == 0 {
            return Err(Error::InvalidConfig(format!(
                "min_loop_duration ({:?}) must span at least one sample at {} fps",
                self.min_loop_duration, self.frames_per_second
            )));
        }
        if self.max_loop_duration < self.min_loop_duration {
            return Err(Error::InvalidConfig(format!(
                "max_loop_duration ({:?}) must not be shorter than min_loop_duration ({:?})",
                self.max_loop_duration, self.min_loop_duration
            )));
        }
        Ok(())
    }
}

/// The committed result of one analysis run: the samples, their similarity matrix and the
/// best loop window.
///
/// An [Analysis] is immutable. Manual adjustments produce new [ManualSelection] values
/// instead of touching the search result.
#[derive(Debug)]
pub struct Analysis {
    samples: Vec<FrameSample>,
    matrix: SimilarityMatrix,
    best: LoopWindow,
    frames_per_second: f32,
    min_loop_duration: Duration,
}

impl Analysis {
    pub fn samples(&self) -> &[FrameSample] {
        &self.samples
    }

    pub fn matrix(&self) -> &SimilarityMatrix {
        &self.matrix
    }

    pub fn best_loop(&self) -> LoopWindow {
        self.best
    }

    /// Copies out the data needed to draw the similarity timeline.
    pub fn timeline(&self) -> Timeline {
        Timeline {
            times: self.samples.iter().map(|s| s.time).collect(),
            similarity_to_first: self.matrix.similarity_to_first(),
            start_index: self.best.start_index,
            end_index: self.best.end_index,
        }
    }

    /// Raw seam similarity for a manual `(start, end)` pair, in seconds. See [super::rescore].
    pub fn rescore(&self, start: f64, end: f64) -> Option<f64> {
        super::rescore(&self.matrix, self.frames_per_second, start, end)
    }

    /// Turns a user-chosen pair of timestamps into a [ManualSelection].
    ///
    /// A window shorter than the minimum loop duration is widened by moving `start` back,
    /// or, when that would cross zero, by pinning `start` to zero and pushing `end` out.
    /// Returns `None` if the resulting window does not fit inside the analyzed samples.
    pub fn select(&self, start: f64, end: f64) -> Option<ManualSelection> {
        let min = self.min_loop_duration.as_secs_f64();
        let mut start = start.max(0.0);
        let mut end = end;
        if end - start < min {
            if end >= min {
                start = end - min;
            } else {
                start = 0.0;
                end = min;
            }
        }

        let start_index = util::sample_index(start, self.frames_per_second)?;
        let end_index = util::sample_index(end, self.frames_per_second)?;
        if start_index >= self.matrix.len() || end_index >= self.matrix.len() {
            return None;
        }

        Some(ManualSelection {
            start: Duration::from_secs_f64(start),
            end: Duration::from_secs_f64(end),
            start_index,
            end_index,
            score: self.matrix.get(end_index, start_index),
        })
    }
}

// Clears the busy flag when an analysis run ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Owns the state of loop analysis for one clip.
///
/// A session runs at most one analysis at a time: calling [AnalysisSession::analyze] while
/// another run is in flight fails fast with [Error::AnalysisInProgress] and leaves the session
/// untouched. A run commits its [Analysis] only when every phase succeeds, so a failed or
/// cancelled run keeps the previous result in place.
///
/// At a high-level, an analysis does the following:
///
/// 1. Extracts a [FeatureVector](super::FeatureVector) from every frame
/// 2. Builds the pairwise [SimilarityMatrix]
/// 3. Searches all windows within the configured duration bounds for the smoothest seam
///
/// Extraction and matrix construction hit a yield point every `yield_interval` frames or
/// rows; the search runs to completion without yielding.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use seamloop::util;
/// use seamloop::video::{AnalysisConfig, AnalysisSession, FrameView, DEFAULT_FRAMES_PER_SECOND};
///
/// let pixels = vec![0u8; 64 * 64 * 4];
/// let frames: Vec<(Duration, FrameView)> =
///     util::sample_times(Duration::from_secs(2), DEFAULT_FRAMES_PER_SECOND)
///         .into_iter()
///         .map(|t| (t, FrameView::new(64, 64, &pixels)))
///         .collect();
///
/// let session = AnalysisSession::new(AnalysisConfig::default()).unwrap();
/// let best = session.analyze(&frames).unwrap();
/// assert_eq!((best.start_index, best.end_index), (0, 4));
/// ```
#[derive(Debug)]
pub struct AnalysisSession {
    config: AnalysisConfig,
    busy: AtomicBool,
    current: Mutex<Option<Arc<Analysis>>>,
}

impl AnalysisSession {
    /// Constructs a new [AnalysisSession], validating `config`.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            busy: AtomicBool::new(false),
            current: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Returns true while an analysis is running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Returns a [Checkpoint] using this session's yield interval.
    pub fn checkpoint<'a>(&self) -> Checkpoint<'a> {
        Checkpoint::new(self.config.yield_interval)
    }

    /// Analyzes `frames` without progress reporting or cancellation.
    pub fn analyze(&self, frames: &[(Duration, FrameView<'_>)]) -> Result<LoopWindow> {
        self.analyze_with(frames, &mut self.checkpoint())
    }

    /// Analyzes `frames`, a time-ordered list of decoded frames, and returns the best loop.
    pub fn analyze_with(
        &self,
        frames: &[(Duration, FrameView<'_>)],
        checkpoint: &mut Checkpoint<'_>,
    ) -> Result<LoopWindow> {
        let _busy = match BusyGuard::acquire(&self.busy) {
            Some(guard) => guard,
            None => {
                tracing::warn!("ignoring analysis request; session is busy");
                return Err(Error::AnalysisInProgress);
            }
        };

        let span = tracing::span!(tracing::Level::TRACE, "analyze");
        let _enter = span.enter();

        if frames.is_empty() {
            return Err(Error::NoSamples);
        }
        let min_duration_samples = self.config.min_duration_samples();
        if min_duration_samples > frames.len() - 1 {
            return Err(Error::InsufficientSamples {
                min_duration_samples,
                available: frames.len(),
            });
        }

        tracing::debug!(num_samples = frames.len(), "starting feature extraction");

        let mut samples = Vec::with_capacity(frames.len());
        for (i, (time, frame)) in frames.iter().enumerate() {
            samples.push(FrameSample {
                time: *time,
                features: extract(frame)?,
            });
            checkpoint.tick(Stage::Extracting, (i + 1) as f32 / frames.len() as f32)?;
        }

        let matrix = SimilarityMatrix::build(&samples, checkpoint)?;
        checkpoint.check()?;

        checkpoint.report(Stage::Searching, 0.0);
        let best = search(
            &matrix,
            &samples,
            min_duration_samples,
            self.config.max_duration_samples(),
        )?;
        checkpoint.report(Stage::Done, 1.0);

        tracing::info!(
            start = %util::format_time(best.start),
            end = %util::format_time(best.end),
            score = best.score,
            "found loop window"
        );

        let analysis = Analysis {
            samples,
            matrix,
            best,
            frames_per_second: self.config.frames_per_second,
            min_loop_duration: self.config.min_loop_duration,
        };
        *self.lock() = Some(Arc::new(analysis));

        Ok(best)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Arc<Analysis>>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a handle to the last committed analysis, if any.
    pub fn analysis(&self) -> Option<Arc<Analysis>> {
        self.lock().clone()
    }

    pub fn best_loop(&self) -> Option<LoopWindow> {
        self.analysis().map(|a| a.best_loop())
    }

    pub fn timeline(&self) -> Option<Timeline> {
        self.analysis().map(|a| a.timeline())
    }

    /// See [Analysis::rescore]. Returns `None` if nothing has been analyzed yet.
    pub fn rescore(&self, start: f64, end: f64) -> Option<f64> {
        self.analysis().and_then(|a| a.rescore(start, end))
    }

    /// See [Analysis::select]. Returns `None` if nothing has been analyzed yet.
    pub fn select(&self, start: f64, end: f64) -> Option<ManualSelection> {
        self.analysis().and_then(|a| a.select(start, end))
    }

    /// Discards the committed analysis, e.g. when a new clip is loaded.
    pub fn reset(&self) {
        *self.lock() = None;
    }
}
