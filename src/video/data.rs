use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::FeatureVector;

/// Borrowed view of one decoded RGBA frame, as handed over by the decode collaborator.
#[derive(Copy, Clone, Debug)]
pub struct FrameView<'a> {
    pub width: u32,
    pub height: u32,
    pub data: &'a [u8],
}

impl<'a> FrameView<'a> {
    pub fn new(width: u32, height: u32, data: &'a [u8]) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// A sampled frame reduced to its [FeatureVector]. Samples are ordered by time and indexed
/// by their position in the analysis.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FrameSample {
    pub time: Duration,
    pub features: FeatureVector,
}

/// The best loop window found by the boundary search.
///
/// Timestamps are looked up from the samples at `start_index` and `end_index`, so the two
/// representations always agree.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct LoopWindow {
    pub start_index: usize,
    pub end_index: usize,
    pub start: Duration,
    pub end: Duration,
    pub score: f64,
}

impl LoopWindow {
    /// Window length in samples.
    pub fn duration_samples(&self) -> usize {
        self.end_index - self.start_index
    }

    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }

    /// Builds the hand-off for the render collaborator, playing the window `repeat` times
    /// back to back.
    pub fn render_request(&self, repeat: u32) -> RenderRequest {
        RenderRequest {
            start: self.start,
            end: self.end,
            score: self.score,
            repeat,
        }
    }
}

/// A user-chosen loop window, derived from a [LoopWindow] but never written back into it.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ManualSelection {
    pub start: Duration,
    pub end: Duration,
    pub start_index: usize,
    pub end_index: usize,
    /// Raw seam similarity `M[end_index][start_index]`.
    pub score: f64,
}

impl ManualSelection {
    pub fn render_request(&self, repeat: u32) -> RenderRequest {
        RenderRequest {
            start: self.start,
            end: self.end,
            score: self.score,
            repeat,
        }
    }
}

/// Time range the renderer should turn into the output clip.
#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct RenderRequest {
    pub start: Duration,
    pub end: Duration,
    pub score: f64,
    pub repeat: u32,
}

/// Read-only snapshot for timeline visualization: the similarity of every sample to sample
/// 0, plus the winning window.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Timeline {
    pub times: Vec<Duration>,
    pub similarity_to_first: Vec<f64>,
    pub start_index: usize,
    pub end_index: usize,
}
