use serde::{Deserialize, Serialize};

use super::{similarity, Checkpoint, FrameSample, Stage};
use crate::Result;

/// Pairwise similarity of all frame samples of one analysis.
///
/// The matrix is square, has an exact 1 on the diagonal and is symmetric: only the upper
/// triangle is scored, the lower triangle is mirrored from it.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct SimilarityMatrix {
    n: usize,
    data: Vec<f64>,
}

impl SimilarityMatrix {
    /// Builds the matrix for `samples`, hitting `checkpoint` once per row.
    ///
    /// This is the most expensive phase of an analysis: it runs `n * (n - 1) / 2` similarity
    /// computations.
    pub fn build(samples: &[FrameSample], checkpoint: &mut Checkpoint<'_>) -> Result<Self> {
        let span = tracing::span!(tracing::Level::TRACE, "build_matrix");
        let _enter = span.enter();

        let n = samples.len();
        let mut data = vec![0.0; n * n];

        for i in 0..n {
            for j in 0..n {
                data[i * n + j] = if i == j {
                    1.0
                } else if j < i {
                    data[j * n + i]
                } else {
                    similarity(&samples[i].features, &samples[j].features)
                };
            }
            checkpoint.tick(Stage::Comparing, (i + 1) as f32 / n as f32)?;
        }

        tracing::debug!(rows = n, "finished similarity matrix");

        Ok(Self { n, data })
    }

    /// Number of samples (rows) in the matrix.
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Returns `M[i][j]`.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    #[inline(always)]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        assert!(i < self.n && j < self.n, "matrix index out of bounds");
        self.data[i * self.n + j]
    }

    /// Returns row `i` of the matrix.
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// Similarity of every sample to sample 0, i.e. the first column.
    pub fn similarity_to_first(&self) -> Vec<f64> {
        (0..self.n).map(|i| self.get(i, 0)).collect()
    }

    #[cfg(test)]
    pub(crate) fn from_rows(rows: Vec<Vec<f64>>) -> Self {
        let n = rows.len();
        let data: Vec<f64> = rows.into_iter().flatten().collect();
        assert_eq!(data.len(), n * n);
        Self { n, data }
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::time::Duration;

    use super::*;
    use crate::video::features::test::two_tone_frame;
    use crate::video::{extract, CancellationToken, FrameView, Progress};
    use crate::Error;

    pub(crate) fn samples_from_counts(counts: &[usize]) -> Vec<FrameSample> {
        counts
            .iter()
            .enumerate()
            .map(|(i, &white)| {
                let data = two_tone_frame(16, white);
                FrameSample {
                    time: Duration::from_millis(250 * i as u64),
                    features: extract(&FrameView::new(16, 16, &data)).unwrap(),
                }
            })
            .collect()
    }

    #[test]
    fn test_diagonal_and_symmetry() {
        let samples = samples_from_counts(&[0, 3, 40, 41, 99, 128, 200, 255, 256]);
        let matrix = SimilarityMatrix::build(&samples, &mut Checkpoint::new(10)).unwrap();
        assert_eq!(matrix.len(), samples.len());
        for i in 0..matrix.len() {
            assert_eq!(matrix.get(i, i), 1.0);
            for j in 0..matrix.len() {
                assert_eq!(matrix.get(i, j), matrix.get(j, i));
                assert!((0.0..=1.0 + 1e-12).contains(&matrix.get(i, j)));
            }
        }
        assert_eq!(
            matrix.get(2, 5),
            similarity(&samples[2].features, &samples[5].features)
        );
        assert_eq!(matrix.row(3)[4], matrix.get(3, 4));
    }

    #[test]
    fn test_similarity_to_first() {
        let samples = samples_from_counts(&[10, 20, 30]);
        let matrix = SimilarityMatrix::build(&samples, &mut Checkpoint::new(1)).unwrap();
        let column = matrix.similarity_to_first();
        assert_eq!(column.len(), 3);
        assert_eq!(column[0], 1.0);
        assert_eq!(column[2], matrix.get(0, 2));
    }

    #[test]
    fn test_reports_row_progress() {
        let samples = samples_from_counts(&[10, 20, 30, 40]);
        let mut fractions = Vec::new();
        let mut on_progress = |p: Progress| fractions.push(p.fraction);
        let mut checkpoint = Checkpoint::new(10).with_progress(&mut on_progress);
        SimilarityMatrix::build(&samples, &mut checkpoint).unwrap();
        drop(checkpoint);
        assert_eq!(fractions, vec![0.25, 0.5, 0.75, 1.0]);
    }

    #[test]
    fn test_cancelled_build() {
        let samples = samples_from_counts(&[10, 20, 30, 40]);
        let token = CancellationToken::new();
        token.cancel();
        let mut checkpoint = Checkpoint::new(10).with_cancellation(&token);
        assert!(matches!(
            SimilarityMatrix::build(&samples, &mut checkpoint),
            Err(Error::Cancelled)
        ));
    }

    #[test]
    fn test_empty() {
        let matrix = SimilarityMatrix::build(&[], &mut Checkpoint::new(10)).unwrap();
        assert!(matrix.is_empty());
        assert!(matrix.similarity_to_first().is_empty());
    }
}
