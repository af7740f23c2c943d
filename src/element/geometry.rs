//! Geometry primitives
//!
//! Bounding boxes derived from protocol box-model quads, and the pure
//! visibility decision over in-browser measurements. Both are plain value
//! math so the decisions are unit-testable without a browser.

use serde::Deserialize;

/// Axis-aligned rectangle derived from a box-model quad.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Build from a quad of 4 corner points, `[x1,y1, x2,y2, x3,y3, x4,y4]`.
    ///
    /// The browser reports corners in drawing order, which is not axis
    /// aligned under CSS transforms; the box is the min/max envelope.
    pub fn from_quad(quad: &[f64]) -> Option<Self> {
        if quad.len() != 8 {
            return None;
        }

        let xs = [quad[0], quad[2], quad[4], quad[6]];
        let ys = [quad[1], quad[3], quad[5], quad[7]];
        let min_x = xs.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_x = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let min_y = ys.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_y = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            x: min_x,
            y: min_y,
            width: max_x - min_x,
            height: max_y - min_y,
        })
    }

    /// Midpoint, where interactions are aimed.
    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }
}

/// In-browser measurements the visibility decision is made from.
///
/// For a text node the probe script substitutes the parent element before
/// measuring; a bare text node has no box of its own.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilitySnapshot {
    #[serde(default)]
    pub offset_height: f64,
    #[serde(default)]
    pub offset_width: f64,
    #[serde(default)]
    pub client_rect_count: usize,
}

impl VisibilitySnapshot {
    /// A node is visible when it occupies any space at all.
    pub fn is_visible(&self) -> bool {
        self.offset_height > 0.0 || self.offset_width > 0.0 || self.client_rect_count > 0
    }
}
