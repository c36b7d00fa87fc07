//! Heuristic swing-phase tagging.
//!
//! Tags are derived purely from the lead wrist's height across the sampled
//! frames: the highest wrist position is the top of the backswing and the
//! lowest position after it is impact. Everything else is bucketed around
//! those two anchors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::landmarks::{Handedness, PoseFrame};

// ---------------------------------------------------------------------------
// Phase
// ---------------------------------------------------------------------------

/// A named segment of the golf swing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Address,
    Takeaway,
    Backswing,
    Top,
    Transition,
    Downswing,
    Impact,
    FollowThrough,
}

impl Phase {
    /// All phases in swing order.
    pub const ALL: [Phase; 8] = [
        Phase::Address,
        Phase::Takeaway,
        Phase::Backswing,
        Phase::Top,
        Phase::Transition,
        Phase::Downswing,
        Phase::Impact,
        Phase::FollowThrough,
    ];

    /// Database / wire name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Address => "address",
            Self::Takeaway => "takeaway",
            Self::Backswing => "backswing",
            Self::Top => "top",
            Self::Transition => "transition",
            Self::Downswing => "downswing",
            Self::Impact => "impact",
            Self::FollowThrough => "follow_through",
        }
    }

    /// Parse from the database `phase` column.
    pub fn from_name(name: &str) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|p| p.name() == name)
            .ok_or_else(|| CoreError::Validation(format!("Unknown swing phase '{name}'")))
    }

    /// Phases counted on the backswing side of the tempo ratio.
    pub fn is_backswing_side(self) -> bool {
        matches!(self, Self::Takeaway | Self::Backswing | Self::Top)
    }

    /// Phases counted on the downswing side of the tempo ratio.
    pub fn is_downswing_side(self) -> bool {
        matches!(self, Self::Transition | Self::Downswing | Self::Impact)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Tagging
// ---------------------------------------------------------------------------

/// Anchor indices found in a sequence of frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseAnchors {
    pub top: usize,
    pub impact: usize,
}

/// Locate the top (highest lead wrist, i.e. smallest y) and impact (lowest
/// lead wrist at or after the top). The first occurrence wins on ties.
/// Returns `None` for an empty sequence.
pub fn find_anchors(frames: &[PoseFrame], handedness: Handedness) -> Option<PhaseAnchors> {
    let wrist = handedness.lead().wrist;
    let heights: Vec<f64> = frames.iter().map(|f| f.landmarks.get(wrist).y).collect();
    if heights.is_empty() {
        return None;
    }

    let mut top = 0;
    for (i, y) in heights.iter().enumerate().skip(1) {
        if *y < heights[top] {
            top = i;
        }
    }

    let mut impact = top;
    for (i, y) in heights.iter().enumerate().skip(top + 1) {
        if *y > heights[impact] {
            impact = i;
        }
    }

    Some(PhaseAnchors { top, impact })
}

/// Tag every frame with a swing phase. The output has the same length as
/// `frames` and the first frame is always [`Phase::Address`].
///
/// Frames between address and top are split at their midpoint index into
/// takeaway and backswing; frames between top and impact are split the same
/// way into transition and downswing; anything after impact is follow-through.
/// Degenerate anchor layouts (top on the first frame, impact on the top)
/// simply leave the corresponding buckets empty.
pub fn tag(frames: &[PoseFrame], handedness: Handedness) -> Vec<Phase> {
    let Some(anchors) = find_anchors(frames, handedness) else {
        return Vec::new();
    };

    let last = frames.len() - 1;
    let address = 0;
    let top = anchors.top.min(last);
    let impact = anchors.impact.clamp(top, last);
    let backswing_from = address + (top - address) / 2;
    let downswing_from = top + (impact - top) / 2;

    (0..frames.len())
        .map(|i| {
            if i == address {
                Phase::Address
            } else if i < top {
                if i < backswing_from {
                    Phase::Takeaway
                } else {
                    Phase::Backswing
                }
            } else if i == top {
                Phase::Top
            } else if i < impact {
                if i < downswing_from {
                    Phase::Transition
                } else {
                    Phase::Downswing
                }
            } else if i == impact {
                Phase::Impact
            } else {
                Phase::FollowThrough
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
