//! Timestamped events produced by the analysis passes, and the fused buckets.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A transcribed span of speech, `[start, end)` in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// A piece of on-screen text seen at an instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrDetection {
    pub timestamp: f64,
    pub text: String,
    pub confidence: f64,
}

/// A one-sentence caption of a sampled frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotionDescription {
    pub timestamp: f64,
    #[serde(alias = "description")]
    pub text: String,
}

/// One fixed-width window of the fused timeline, `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBucket {
    pub start: f64,
    pub end: f64,
    pub spoken: String,
    pub on_screen_text: HashSet<String>,
    pub visuals: String,
}

impl TimeBucket {
    pub fn is_empty(&self) -> bool {
        self.spoken.is_empty() && self.on_screen_text.is_empty() && self.visuals.is_empty()
    }

    pub fn time_chunk(&self) -> String {
        format!("{:.1}s - {:.1}s", self.start, self.end)
    }
}

/// Serialized form of a [`TimeBucket`] in the fused timeline artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedChunk {
    pub time_chunk: String,
    pub spoken: String,
    pub on_screen_text: Vec<String>,
    pub visuals: String,
}

impl From<&TimeBucket> for FusedChunk {
    fn from(bucket: &TimeBucket) -> Self {
        let mut on_screen_text: Vec<String> = bucket.on_screen_text.iter().cloned().collect();
        // Sorted so the artifact bytes are stable across runs
        on_screen_text.sort();
        Self {
            time_chunk: bucket.time_chunk(),
            spoken: bucket.spoken.clone(),
            on_screen_text,
            visuals: bucket.visuals.clone(),
        }
    }
}
