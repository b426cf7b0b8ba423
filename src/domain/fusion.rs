//! Temporal fusion: align the three event streams on a fixed-step grid.
//!
//! Bucket `k` covers `[k * step, (k + 1) * step)` for every `k` with
//! `k * step < duration`, so there are `ceil(duration / step)` candidates and
//! the last one may run past `duration`. Speech segments are matched with a
//! half-open overlap test and can land in two neighbouring buckets; OCR and
//! motion events are instants and land in exactly one.

use super::timeline::{MotionDescription, OcrDetection, TimeBucket, TranscriptSegment};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FusionError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Merge the three streams into non-empty buckets in start-time order.
pub fn fuse(
    spoken_segments: &[TranscriptSegment],
    ocr_detections: &[OcrDetection],
    motion_descriptions: &[MotionDescription],
    duration: f64,
    step: f64,
) -> Result<Vec<TimeBucket>, FusionError> {
    if !step.is_finite() || step <= 0.0 {
        return Err(FusionError::InvalidInput(format!(
            "step must be a positive number of seconds, got {}",
            step
        )));
    }
    if !duration.is_finite() || duration < 0.0 {
        return Err(FusionError::InvalidInput(format!(
            "duration must be a non-negative number of seconds, got {}",
            duration
        )));
    }

    // Visuals are joined in timestamp order; the sort is stable so equal
    // timestamps keep their input order.
    let mut motion: Vec<&MotionDescription> = motion_descriptions.iter().collect();
    motion.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));

    let candidates = (duration / step).ceil() as u64;
    let mut buckets = Vec::new();

    for k in 0..candidates {
        let start = k as f64 * step;
        let end = start + step;

        let spoken = join_text(
            spoken_segments
                .iter()
                .filter(|seg| seg.start < end && seg.end > start)
                .map(|seg| seg.text.as_str()),
        );

        let on_screen_text: HashSet<String> = ocr_detections
            .iter()
            .filter(|det| in_range(det.timestamp, start, end))
            .map(|det| det.text.trim())
            .filter(|text| !text.is_empty())
            .map(str::to_string)
            .collect();

        let visuals = join_text(
            motion
                .iter()
                .filter(|m| in_range(m.timestamp, start, end))
                .map(|m| m.text.as_str()),
        );

        let bucket = TimeBucket {
            start,
            end,
            spoken,
            on_screen_text,
            visuals,
        };
        if !bucket.is_empty() {
            buckets.push(bucket);
        }
    }

    Ok(buckets)
}

fn in_range(timestamp: f64, start: f64, end: f64) -> bool {
    start <= timestamp && timestamp < end
}

// Parts are trimmed one by one: whisper segments start with a space, and a
// blank part must not leave a double space or make a bucket look non-empty.
fn join_text<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    parts
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
