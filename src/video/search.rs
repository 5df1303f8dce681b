use super::{FrameSample, LoopWindow, SimilarityMatrix, NEIGHBOR_WEIGHT, SEAM_WEIGHT};
use crate::util;
use crate::{Error, Result};

// Scores the window `[start, end]`.
//
// When both boundaries are interior, the seam frame pair is blended with the two neighboring
// comparisons (the frame before the end against the start, and the end against the frame after
// the start). Windows touching either edge of the clip only have the seam pair to go on.
#[inline(always)]
fn window_score(matrix: &SimilarityMatrix, start: usize, end: usize) -> f64 {
    let seam = matrix.get(end, start);
    if start == 0 || end == matrix.len() - 1 {
        return seam;
    }
    SEAM_WEIGHT * seam
        + NEIGHBOR_WEIGHT * matrix.get(end - 1, start)
        + NEIGHBOR_WEIGHT * matrix.get(end, start + 1)
}

/// Runs an exhaustive search for the loop window with the smoothest seam.
///
/// Every window of `d` samples, for `d` in `[min_duration_samples, min(max_duration_samples, n - 1)]`,
/// is scored once. This is `O(n^2)` candidates when the maximum duration approaches `n`, each
/// scored in constant time from the precomputed matrix; after the matrix build it is the
/// dominant cost of an analysis.
///
/// Candidates are visited by ascending duration, then ascending start, and a candidate only
/// replaces the current best if its score is strictly greater. Ties therefore resolve to the
/// shortest window, and among equally long windows to the earliest one.
///
/// If no candidate scores above zero, the whole clip (`0..=n-1`) is returned with a score of 0.
pub fn search(
    matrix: &SimilarityMatrix,
    samples: &[FrameSample],
    min_duration_samples: usize,
    max_duration_samples: usize,
) -> Result<LoopWindow> {
    let span = tracing::span!(tracing::Level::TRACE, "search");
    let _enter = span.enter();

    let n = samples.len();
    if n == 0 {
        return Err(Error::NoSamples);
    }
    if matrix.len() != n {
        return Err(Error::MatrixMismatch {
            rows: matrix.len(),
            samples: n,
        });
    }
    if min_duration_samples == 0 {
        return Err(Error::InvalidConfig(
            "minimum loop duration must cover at least one sample".to_string(),
        ));
    }
    if max_duration_samples < min_duration_samples {
        return Err(Error::InvalidConfig(format!(
            "maximum loop duration ({} samples) is shorter than the minimum ({} samples)",
            max_duration_samples, min_duration_samples
        )));
    }
    if min_duration_samples > n - 1 {
        return Err(Error::InsufficientSamples {
            min_duration_samples,
            available: n,
        });
    }

    let mut best_score = 0.0;
    let mut best_start = 0;
    let mut best_end = n - 1;

    for duration in min_duration_samples..=max_duration_samples.min(n - 1) {
        for start in 0..n - duration {
            let end = start + duration;
            let score = window_score(matrix, start, end);
            if score > best_score {
                best_score = score;
                best_start = start;
                best_end = end;
            }
        }
    }

    tracing::debug!(
        start_index = best_start,
        end_index = best_end,
        score = best_score,
        "finished loop search"
    );

    Ok(LoopWindow {
        start_index: best_start,
        end_index: best_end,
        start: samples[best_start].time,
        end: samples[best_end].time,
        score: best_score,
    })
}

/// Returns the raw seam similarity of a user-chosen window, `M[end][start]`.
///
/// Both timestamps are mapped to sample indices with `floor(seconds * fps)`. If either index
/// falls outside the matrix, `None` is returned and the caller should keep whatever score it
/// was displaying.
pub fn rescore(matrix: &SimilarityMatrix, fps: f32, start: f64, end: f64) -> Option<f64> {
    let start_index = util::sample_index(start, fps)?;
    let end_index = util::sample_index(end, fps)?;
    if start_index >= matrix.len() || end_index >= matrix.len() {
        return None;
    }
    Some(matrix.get(end_index, start_index))
}
