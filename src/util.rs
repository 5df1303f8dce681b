use std::time::Duration;

/// Formats the given [Duration] as "M:SS.d", truncated to tenths of a second.
pub fn format_time(t: Duration) -> String {
    let minutes = t.as_secs() / 60;
    let seconds = t.as_secs() % 60;
    let tenths = t.subsec_millis() / 100;
    format!("{}:{:02}.{}", minutes, seconds, tenths)
}

/// Timestamp of the `index`-th sample when sampling at `fps` samples per second.
///
/// Callers must pass a finite, positive `fps`.
pub fn sample_time(index: usize, fps: f32) -> Duration {
    Duration::from_secs_f64(index as f64 / fps as f64)
}

/// Returns the timestamps at which a clip of `clip_duration` should be sampled when
/// analyzing it at `fps` samples per second.
///
/// The clip yields `floor(duration * fps)` samples, the `i`-th one taken at `i / fps`
/// seconds. A non-positive `fps` yields no samples.
pub fn sample_times(clip_duration: Duration, fps: f32) -> Vec<Duration> {
    if fps <= 0.0 || !fps.is_finite() {
        return Vec::new();
    }
    let count = (clip_duration.as_secs_f64() * fps as f64).floor() as usize;
    (0..count).map(|i| sample_time(i, fps)).collect()
}

/// Maps a timestamp to the index of the sample covering it, i.e. `floor(t * fps)`.
///
/// Returns `None` for negative or non-finite inputs.
pub fn sample_index(seconds: f64, fps: f32) -> Option<usize> {
    let idx = (seconds * fps as f64).floor();
    if !idx.is_finite() || idx < 0.0 {
        return None;
    }
    Some(idx as usize)
}
