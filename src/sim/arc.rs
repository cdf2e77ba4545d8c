//! Zone arc geometry
//!
//! A zone is an angular interval on the pointer's circle:
//! - start, end: angular extent, both normalized to [0, 2π)
//! - the interval runs counter-clockwise from start to end and may
//!   straddle the 0/2π boundary

use serde::{Deserialize, Serialize};

use crate::normalize_angle;

/// An angular arc in polar space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneArc {
    /// Start angle (radians, normalized to [0, 2π))
    pub start: f32,
    /// End angle (radians, normalized to [0, 2π))
    pub end: f32,
}

impl ZoneArc {
    pub fn new(start: f32, end: f32) -> Self {
        Self {
            start: normalize_angle(start),
            end: normalize_angle(end),
        }
    }

    /// Arc starting at `start` and spanning `span` radians
    pub fn with_span(start: f32, span: f32) -> Self {
        Self::new(start, start + span)
    }

    /// Angular span of the arc (handles wraparound)
    pub fn angular_span(&self) -> f32 {
        let mut span = self.end - self.start;
        if span < 0.0 {
            span += std::f32::consts::TAU;
        }
        span
    }

    /// Check if an angle is within the arc's angular extent
    pub fn contains_angle(&self, theta: f32) -> bool {
        let theta = normalize_angle(theta);
        let start = self.start;
        let end = self.end;

        if start <= end {
            // No wraparound
            theta >= start && theta <= end
        } else {
            // Wraparound case (e.g., start=350°, end=10°)
            theta >= start || theta <= end
        }
    }

    /// Mid-angle of the arc
    pub fn center(&self) -> f32 {
        normalize_angle(self.start + self.angular_span() / 2.0)
    }

    /// Rotate the arc by `delta` radians, keeping its span
    pub fn rotate(&mut self, delta: f32) {
        self.start = normalize_angle(self.start + delta);
        self.end = normalize_angle(self.end + delta);
    }
}
