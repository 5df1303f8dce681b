use serde::{Deserialize, Serialize};

use super::FrameView;
use crate::{Error, Result};

/// Number of luma bins in a [FeatureVector] histogram.
pub const HISTOGRAM_BINS: usize = 256;

/// Largest possible Euclidean distance between two RGB colours.
const MAX_COLOR_DISTANCE: f64 = 255.0 * 1.732_050_807_568_877_2; // 255 * sqrt(3)

/// Mean colour of a frame. Each channel is in `[0, 255]`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct RgbColor {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl RgbColor {
    fn distance(&self, other: &RgbColor) -> f64 {
        let (dr, dg, db) = (self.r - other.r, self.g - other.g, self.b - other.b);
        (dr * dr + dg * dg + db * db).sqrt()
    }
}

/// Compact descriptor of a single frame: a normalized luma histogram and the mean colour.
///
/// The histogram is a probability mass function: every bin is non-negative and the bins sum
/// to 1.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct FeatureVector {
    histogram: Vec<f64>,
    avg_color: RgbColor,
}

impl FeatureVector {
    pub fn histogram(&self) -> &[f64] {
        &self.histogram
    }

    pub fn avg_color(&self) -> RgbColor {
        self.avg_color
    }
}

// Rec. 601 luma, truncated to a bin index.
#[inline(always)]
fn luma(r: u8, g: u8, b: u8) -> usize {
    let gray = (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64).floor() as usize;
    gray.min(HISTOGRAM_BINS - 1)
}

/// Converts one RGBA frame into a [FeatureVector].
///
/// Every pixel contributes one count to the histogram bin of its luma and its channels to the
/// running colour sums; both are divided by the pixel count at the end. The alpha channel is
/// ignored.
pub fn extract(frame: &FrameView<'_>) -> Result<FeatureVector> {
    let pixel_count = frame.pixel_count();
    if pixel_count == 0 {
        return Err(Error::EmptyFrame);
    }
    if frame.data.len() != pixel_count * 4 {
        return Err(Error::InvalidFrameBuffer {
            width: frame.width,
            height: frame.height,
            len: frame.data.len(),
        });
    }

    let mut counts = [0u32; HISTOGRAM_BINS];
    let (mut total_r, mut total_g, mut total_b) = (0u64, 0u64, 0u64);

    for rgba in frame.data.chunks_exact(4) {
        let (r, g, b) = (rgba[0], rgba[1], rgba[2]);
        counts[luma(r, g, b)] += 1;
        total_r += r as u64;
        total_g += g as u64;
        total_b += b as u64;
    }

    let n = pixel_count as f64;
    let histogram = counts.iter().map(|&c| c as f64 / n).collect();
    let avg_color = RgbColor {
        r: total_r as f64 / n,
        g: total_g as f64 / n,
        b: total_b as f64 / n,
    };

    Ok(FeatureVector {
        histogram,
        avg_color,
    })
}

/// Computes the similarity of two frames, in `[0, 1]`.
///
/// The score is `0.7 * H + 0.3 * C`, where `H` is the Bhattacharyya coefficient of the two
/// luma histograms and `C` is one minus the Euclidean distance of the mean colours,
/// normalized by the largest possible distance. The function is symmetric and returns
/// exactly 1 for identical descriptors.
pub fn similarity(a: &FeatureVector, b: &FeatureVector) -> f64 {
    if a == b {
        return 1.0;
    }

    let histogram_sim = a
        .histogram
        .iter()
        .zip(b.histogram.iter())
        .map(|(x, y)| (x * y).sqrt())
        .sum::<f64>()
        .min(1.0);

    // The computed distance of opposite corners can land an ULP above the constant.
    let color_sim = (1.0 - a.avg_color.distance(&b.avg_color) / MAX_COLOR_DISTANCE).max(0.0);

    super::HISTOGRAM_WEIGHT * histogram_sim + super::COLOR_WEIGHT * color_sim
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;

    pub(crate) fn solid_frame(size: u32, rgb: [u8; 3]) -> Vec<u8> {
        let mut data = Vec::with_capacity((size * size * 4) as usize);
        for _ in 0..size * size {
            data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 0xFF]);
        }
        data
    }

    /// A frame whose first `white` pixels are white and the rest black.
    pub(crate) fn two_tone_frame(size: u32, white: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity((size * size * 4) as usize);
        for i in 0..(size * size) as usize {
            let v = if i < white { 0xFF } else { 0x00 };
            data.extend_from_slice(&[v, v, v, 0xFF]);
        }
        data
    }

    fn features(size: u32, data: &[u8]) -> FeatureVector {
        extract(&FrameView::new(size, size, data)).unwrap()
    }

    #[test]
    fn test_histogram_is_normalized() {
        let mut data = Vec::new();
        for i in 0..64u32 * 64 {
            let v = (i % 251) as u8;
            data.extend_from_slice(&[v, v.wrapping_mul(3), v.wrapping_add(17), 0xFF]);
        }
        let f = features(64, &data);
        assert_eq!(f.histogram().len(), HISTOGRAM_BINS);
        assert!(f.histogram().iter().all(|&v| v >= 0.0));
        let total: f64 = f.histogram().iter().sum();
        assert!((total - 1.0).abs() < 1e-6);

        let c = f.avg_color();
        for channel in [c.r, c.g, c.b] {
            assert!((0.0..=255.0).contains(&channel));
        }
    }

    #[test]
    fn test_solid_frame_has_one_bin() {
        let f = features(8, &solid_frame(8, [10, 200, 30]));
        let non_zero: Vec<usize> = f
            .histogram()
            .iter()
            .enumerate()
            .filter(|(_, v)| **v > 0.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(non_zero, vec![luma(10, 200, 30)]);
        assert_eq!(f.histogram()[non_zero[0]], 1.0);
        assert_eq!(
            f.avg_color(),
            RgbColor {
                r: 10.0,
                g: 200.0,
                b: 30.0
            }
        );
    }

    #[test]
    fn test_half_black_half_white() {
        let f = features(16, &two_tone_frame(16, 128));
        assert_eq!(f.histogram()[0], 0.5);
        assert_eq!(f.histogram()[255], 0.5);
        let c = f.avg_color();
        assert!((c.r - 127.5).abs() < 1e-9);
        assert!((c.g - 127.5).abs() < 1e-9);
        assert!((c.b - 127.5).abs() < 1e-9);
    }

    #[test]
    fn test_alpha_is_ignored() {
        let mut data = solid_frame(4, [50, 60, 70]);
        let opaque = features(4, &data);
        for px in data.chunks_exact_mut(4) {
            px[3] = 0;
        }
        assert_eq!(features(4, &data), opaque);
    }

    #[test]
    fn test_extract_rejects_bad_buffers() {
        assert!(matches!(
            extract(&FrameView::new(0, 0, &[])),
            Err(Error::EmptyFrame)
        ));
        assert!(matches!(
            extract(&FrameView::new(2, 2, &[0u8; 15])),
            Err(Error::InvalidFrameBuffer {
                width: 2,
                height: 2,
                len: 15
            })
        ));
    }

    #[test]
    fn test_similarity_is_bounded() {
        let mut frames: Vec<FeatureVector> = [0usize, 1, 128, 255, 256]
            .iter()
            .map(|&w| features(16, &two_tone_frame(16, w)))
            .collect();
        for rgb in [[0, 0, 0], [255, 255, 255], [255, 0, 0], [0, 255, 255]] {
            frames.push(features(4, &solid_frame(4, rgb)));
        }
        for a in &frames {
            for b in &frames {
                let sim = similarity(a, b);
                assert!((0.0..=1.0).contains(&sim), "similarity out of range: {}", sim);
            }
        }
    }

    #[test]
    fn test_similarity_self_is_one() {
        let f = features(16, &two_tone_frame(16, 77));
        assert_eq!(similarity(&f, &f), 1.0);
        let g = f.clone();
        assert_eq!(similarity(&f, &g), 1.0);
    }

    #[test]
    fn test_similarity_is_symmetric() {
        let frames: Vec<FeatureVector> = [0usize, 13, 64, 128, 200, 256]
            .iter()
            .map(|&w| features(16, &two_tone_frame(16, w)))
            .collect();
        for a in &frames {
            for b in &frames {
                assert_eq!(similarity(a, b), similarity(b, a));
            }
        }
    }

    #[test]
    fn test_similarity_extremes() {
        let black = features(4, &solid_frame(4, [0, 0, 0]));
        let white = features(4, &solid_frame(4, [255, 255, 255]));
        // Disjoint histograms and maximally distant colours.
        let sim = similarity(&black, &white);
        assert!(sim >= 0.0);
        assert!(sim < 1e-9);
        assert_eq!(sim, similarity(&white, &black));

        let gray = features(4, &solid_frame(4, [100, 100, 100]));
        let lighter = features(4, &solid_frame(4, [110, 110, 110]));
        let expected = 0.3 * (1.0 - 10.0 / 255.0);
        assert!((similarity(&gray, &lighter) - expected).abs() < 1e-9);
    }
}
