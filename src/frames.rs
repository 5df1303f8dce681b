use std::path::{Path, PathBuf};
use std::time::Duration;

use image::imageops::FilterType;

use crate::util;
use crate::video::FrameView;
use crate::{Error, Result};

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

/// One still frame of an image sequence, downsampled to a square RGBA thumbnail.
#[derive(Clone, Debug)]
pub struct Thumbnail {
    pub time: Duration,
    pub size: u32,
    pub data: Vec<u8>,
}

impl Thumbnail {
    pub fn view(&self) -> FrameView<'_> {
        FrameView::new(self.size, self.size, &self.data)
    }
}

/// Returns the image files in `dir`, sorted by file name.
pub fn find_frame_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_image = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if is_image {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Loads a single image and downsamples it to a `size` x `size` RGBA thumbnail.
pub fn load_thumbnail(path: impl AsRef<Path>, time: Duration, size: u32) -> Result<Thumbnail> {
    let img = image::open(path.as_ref())?;
    let resized = img.resize_exact(size, size, FilterType::Triangle);
    Ok(Thumbnail {
        time,
        size,
        data: resized.to_rgba8().into_raw(),
    })
}

/// Loads an image sequence captured at `fps` frames per second from `dir`.
///
/// Frames are taken in file-name order; the `i`-th frame is stamped `i / fps` seconds.
pub fn load_image_sequence(dir: impl AsRef<Path>, fps: f32, size: u32) -> Result<Vec<Thumbnail>> {
    if !(fps.is_finite() && fps > 0.0) {
        return Err(Error::InvalidConfig(format!(
            "frames_per_second must be a positive number, got {}",
            fps
        )));
    }
    if size == 0 {
        return Err(Error::InvalidConfig(
            "thumbnail_size must be at least 1 pixel".to_string(),
        ));
    }

    let dir = dir.as_ref();
    let span = tracing::span!(tracing::Level::TRACE, "load_image_sequence");
    let _enter = span.enter();

    let files = find_frame_files(dir)?;
    tracing::debug!(num_frames = files.len(), "loading frames from {}", dir.display());

    files
        .iter()
        .enumerate()
        .map(|(i, path)| load_thumbnail(path, util::sample_time(i, fps), size))
        .collect()
}

/// Pairs each thumbnail with its timestamp, the input format of
/// [AnalysisSession::analyze](crate::video::AnalysisSession::analyze).
pub fn as_frames(thumbnails: &[Thumbnail]) -> Vec<(Duration, FrameView<'_>)> {
    thumbnails.iter().map(|t| (t.time, t.view())).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "seamloop-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_frame(dir: &Path, name: &str, value: u8) {
        let img = image::RgbaImage::from_pixel(20, 10, image::Rgba([value, value, value, 0xFF]));
        img.save(dir.join(name)).unwrap();
    }

    #[test]
    fn test_load_image_sequence() {
        let dir = scratch_dir("sequence");
        write_frame(&dir, "frame_002.png", 200);
        write_frame(&dir, "frame_000.png", 0);
        write_frame(&dir, "frame_001.png", 100);
        std::fs::write(dir.join("notes.txt"), b"not a frame").unwrap();

        let thumbnails = load_image_sequence(&dir, 4.0, 8).unwrap();
        assert_eq!(thumbnails.len(), 3);
        assert_eq!(thumbnails[1].time, Duration::from_millis(250));
        for t in &thumbnails {
            assert_eq!(t.size, 8);
            assert_eq!(t.data.len(), 8 * 8 * 4);
        }
        // File-name order, not creation order.
        assert_eq!(thumbnails[0].data[0], 0);
        assert_eq!(thumbnails[2].data[0], 200);

        let frames = as_frames(&thumbnails);
        assert_eq!(frames[2].0, Duration::from_millis(500));
        assert_eq!(frames[2].1.pixel_count(), 64);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_dir() {
        let dir = std::env::temp_dir().join("seamloop-does-not-exist");
        assert!(matches!(
            load_image_sequence(&dir, 4.0, 8),
            Err(crate::Error::IOError(_))
        ));
    }

    #[test]
    fn test_rejects_bad_settings() {
        // Checked before the directory is touched.
        let dir = std::env::temp_dir().join("seamloop-does-not-exist");
        for fps in [0.0, -4.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                load_image_sequence(&dir, fps, 8),
                Err(Error::InvalidConfig(_))
            ));
        }
        assert!(matches!(
            load_image_sequence(&dir, 4.0, 0),
            Err(Error::InvalidConfig(_))
        ));
    }
}
