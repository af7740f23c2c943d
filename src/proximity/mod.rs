//! Proximity resolver
//!
//! Directional predicates over client rectangles, plus the edge-distance
//! metric used to rank the candidates a predicate lets through. Sorting is
//! stable so equidistant candidates keep their DOM order.

use serde::Deserialize;

/// Default pixel radius for [`ProximityRelation::Near`].
pub const DEFAULT_NEAR_OFFSET: f64 = 30.0;

/// Viewport rectangle as reported by `getBoundingClientRect`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ClientRect {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

/// Directional relation of a candidate to a reference rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProximityRelation {
    Above,
    Below,
    ToLeftOf,
    ToRightOf,
    Near { offset: f64 },
}

impl ProximityRelation {
    pub fn near() -> Self {
        ProximityRelation::Near {
            offset: DEFAULT_NEAR_OFFSET,
        }
    }

    /// Whether `candidate` stands in this relation to `reference`.
    pub fn accepts(&self, reference: &ClientRect, candidate: &ClientRect) -> bool {
        match self {
            ProximityRelation::Above => candidate.bottom <= reference.top,
            ProximityRelation::Below => candidate.top >= reference.bottom,
            ProximityRelation::ToLeftOf => candidate.right <= reference.left,
            ProximityRelation::ToRightOf => candidate.left >= reference.right,
            ProximityRelation::Near { offset } => {
                edge_distance(reference, candidate) <= *offset
            }
        }
    }
}

/// Summed absolute edge differences, the ranking key.
///
/// TODO: the fourth term reuses the bottom edges instead of the right
/// edges. Ranking behavior is pinned by test below; switching the term to
/// `|right-right|` changes which candidate wins for horizontally offset
/// elements and needs the near() callers re-verified first.
pub fn edge_distance(a: &ClientRect, b: &ClientRect) -> f64 {
    (a.top - b.top).abs()
        + (a.left - b.left).abs()
        + (a.bottom - b.bottom).abs()
        + (a.bottom - b.bottom).abs()
}

/// Filter candidates by the relation and rank them by ascending edge
/// distance. The sort is stable; ties keep their input (DOM) order.
pub fn resolve<T>(
    relation: &ProximityRelation,
    reference: &ClientRect,
    candidates: Vec<(T, ClientRect)>,
) -> Vec<T> {
    let mut accepted: Vec<(T, f64)> = candidates
        .into_iter()
        .filter(|(_, rect)| relation.accepts(reference, rect))
        .map(|(item, rect)| {
            let distance = edge_distance(reference, &rect);
            (item, distance)
        })
        .collect();

    accepted.sort_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    accepted.into_iter().map(|(item, _)| item).collect()
}
