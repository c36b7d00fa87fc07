//! Keyframe timestamp selection.
//!
//! Phase boundaries are unknown until poses have been extracted, so frames
//! are sampled at fixed proportions of the clip tuned to typical golf-swing
//! timing, denser around the top and impact.

use crate::error::CoreError;
use crate::types::Millis;

/// Sample positions as per-mille of the clip duration.
pub const SAMPLE_PER_MILLE: [i64; 10] = [50, 150, 300, 450, 550, 650, 720, 780, 850, 950];

/// Number of keyframes sampled per capture.
pub const SAMPLE_COUNT: usize = SAMPLE_PER_MILLE.len();

/// Shortest clip that can hold [`SAMPLE_COUNT`] distinct millisecond offsets.
pub const MIN_DURATION_MS: Millis = SAMPLE_COUNT as Millis;

/// Compute the keyframe offsets for a clip of `duration_ms`.
///
/// Each offset is `floor(duration_ms * p)`. Offsets are strictly increasing
/// and strictly less than `duration_ms`; on very short clips where flooring
/// collides, later offsets are nudged forward and then pulled back under the
/// end of the clip.
pub fn timestamps(duration_ms: Millis) -> Result<Vec<Millis>, CoreError> {
    if duration_ms < MIN_DURATION_MS {
        return Err(CoreError::Validation(format!(
            "Video duration {duration_ms}ms is too short; at least {MIN_DURATION_MS}ms required"
        )));
    }

    let mut offsets = SAMPLE_PER_MILLE
        .iter()
        .map(|pm| duration_ms.checked_mul(*pm).map(|scaled| scaled / 1000))
        .collect::<Option<Vec<Millis>>>()
        .ok_or_else(|| {
            CoreError::Validation(format!("Video duration {duration_ms}ms is too long"))
        })?;

    for i in 1..offsets.len() {
        if offsets[i] <= offsets[i - 1] {
            offsets[i] = offsets[i - 1] + 1;
        }
    }

    let last = offsets.len() - 1;
    offsets[last] = offsets[last].min(duration_ms - 1);
    for i in (0..last).rev() {
        if offsets[i] >= offsets[i + 1] {
            offsets[i] = offsets[i + 1] - 1;
        }
    }

    Ok(offsets)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
