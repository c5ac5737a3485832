//! # Geometric Utilities
//!
//! Planar geometry used by the map matcher.
//!
//! All lengths and distances are measured in the coordinate space of the
//! road network (degrees of longitude/latitude treated as planar units),
//! which is the unit every matching threshold is expressed in.
//!
//! ## Overview
//!
//! | Item | Description |
//! |------|-------------|
//! | [`segment_length`] | Length of a straight segment |
//! | [`polyline_length`] | Total length of a (multi-part) polyline |
//! | [`point_segment_distance`] | Distance from a point to a segment |
//! | [`segment_distance`] | Minimum distance between two segments |
//! | [`Corridor`] | Minkowski dilation of a segment by a radius |
//!
//! ## Corridor intersection
//!
//! The matcher needs the length of a road edge that lies inside the
//! tolerance corridor around a trace segment. For a straight piece of the
//! edge parameterised by `t` in `[0, 1]`, the distance from `P(t)` to the
//! trace segment is convex in `t`, so the part of the piece inside the
//! corridor is a single interval. It is found by minimising the distance and
//! bisecting outward to the corridor boundary on both sides. This gives the
//! exact overlap up to floating point, without approximating the corridor by
//! a polygon.

use geo::{Coord, Distance, Euclidean, Intersects, Line, LineString, MultiLineString, Point};

use crate::Bounds;

/// Iterations used to bracket the closest approach along a piece.
const MINIMISE_ITERATIONS: usize = 100;

/// Iterations used to locate a corridor boundary crossing.
const BISECT_ITERATIONS: usize = 64;

// =============================================================================
// Distance Functions
// =============================================================================

/// Length of the straight segment from `a` to `b`.
#[inline]
pub fn segment_length(a: Coord, b: Coord) -> f64 {
    Euclidean::distance(Point::from(a), Point::from(b))
}

/// Total length of a line string.
pub fn line_string_length(line: &LineString) -> f64 {
    line.lines().map(|l| segment_length(l.start, l.end)).sum()
}

/// Total length of every part of a multi-part polyline.
pub fn polyline_length(lines: &MultiLineString) -> f64 {
    lines.iter().map(line_string_length).sum()
}

/// Shortest distance from `p` to the segment `a`-`b`.
///
/// A zero-length segment degrades to point distance.
pub fn point_segment_distance(p: Coord, a: Coord, b: Coord) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return segment_length(p, a);
    }

    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    segment_length(p, lerp(a, b, t))
}

/// Shortest distance between segments `a0`-`a1` and `b0`-`b1`.
pub fn segment_distance(a0: Coord, a1: Coord, b0: Coord, b1: Coord) -> f64 {
    if Line::new(a0, a1).intersects(&Line::new(b0, b1)) {
        return 0.0;
    }

    point_segment_distance(a0, b0, b1)
        .min(point_segment_distance(a1, b0, b1))
        .min(point_segment_distance(b0, a0, a1))
        .min(point_segment_distance(b1, a0, a1))
}

#[inline]
fn lerp(a: Coord, b: Coord, t: f64) -> Coord {
    Coord {
        x: a.x + t * (b.x - a.x),
        y: a.y + t * (b.y - a.y),
    }
}

// =============================================================================
// Corridor
// =============================================================================

/// The region within `radius` of a straight segment (a capsule).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corridor {
    start: Coord,
    end: Coord,
    radius: f64,
}

impl Corridor {
    pub fn new(start: Coord, end: Coord, radius: f64) -> Self {
        Self { start, end, radius }
    }

    /// Length of the central segment.
    pub fn segment_length(&self) -> f64 {
        segment_length(self.start, self.end)
    }

    /// Axis-aligned bounds of the whole corridor, caps included.
    pub fn bounds(&self) -> Bounds {
        Bounds {
            min_lat: self.start.y.min(self.end.y),
            max_lat: self.start.y.max(self.end.y),
            min_lng: self.start.x.min(self.end.x),
            max_lng: self.start.x.max(self.end.x),
        }
        .expanded(self.radius)
    }

    /// Whether `p` lies inside the corridor (boundary included).
    pub fn contains(&self, p: Coord) -> bool {
        self.distance_to(p) <= self.radius
    }

    #[inline]
    fn distance_to(&self, p: Coord) -> f64 {
        point_segment_distance(p, self.start, self.end)
    }

    /// Length of `lines` lying inside the corridor.
    ///
    /// Each straight piece is clipped exactly against the capsule, so a
    /// piece that enters and leaves the corridor contributes only its
    /// inside part.
    ///
    /// # Arguments
    ///
    /// * `lines` - Edge geometry in planar degrees (x = longitude)
    ///
    /// # Returns
    ///
    /// Overlap length in degrees; `0.0` when `lines` stays outside.
    ///
    /// # Example
    ///
    /// ```rust
    /// use geo::{Coord, LineString, MultiLineString};
    /// use trace_matcher::geo_utils::Corridor;
    ///
    /// let corridor = Corridor::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 0.0 }, 0.1);
    /// let crossing = LineString::from(vec![(0.5, -1.0), (0.5, 1.0)]);
    /// let overlap = corridor.overlap_length(&MultiLineString::new(vec![crossing]));
    /// assert!((overlap - 0.2).abs() < 1e-9);
    /// ```
    pub fn overlap_length(&self, lines: &MultiLineString) -> f64 {
        lines
            .iter()
            .flat_map(|line| line.lines())
            .map(|piece| self.piece_overlap(piece.start, piece.end))
            .sum()
    }

    /// Length of the straight piece `a`-`b` inside the corridor.
    fn piece_overlap(&self, a: Coord, b: Coord) -> f64 {
        let piece_length = segment_length(a, b);
        if piece_length == 0.0 {
            return 0.0;
        }

        let a_inside = self.contains(a);
        let b_inside = self.contains(b);
        if a_inside && b_inside {
            // convex distance: both ends inside means the whole piece is
            return piece_length;
        }

        if segment_distance(a, b, self.start, self.end) > self.radius {
            return 0.0;
        }

        let distance_at = |t: f64| self.distance_to(lerp(a, b, t));

        let closest = self.closest_parameter(&distance_at);
        if distance_at(closest) > self.radius {
            return 0.0;
        }

        let enter = if a_inside {
            0.0
        } else {
            self.boundary_crossing(&distance_at, 0.0, closest)
        };
        let exit = if b_inside {
            1.0
        } else {
            self.boundary_crossing(&distance_at, 1.0, closest)
        };

        (exit - enter).max(0.0) * piece_length
    }

    /// Ternary search for the parameter of closest approach.
    fn closest_parameter(&self, distance_at: &impl Fn(f64) -> f64) -> f64 {
        let mut lo = 0.0;
        let mut hi = 1.0;
        for _ in 0..MINIMISE_ITERATIONS {
            let m1 = lo + (hi - lo) / 3.0;
            let m2 = hi - (hi - lo) / 3.0;
            if distance_at(m1) <= distance_at(m2) {
                hi = m2;
            } else {
                lo = m1;
            }
        }
        (lo + hi) / 2.0
    }

    /// Bisect between `outside` (distance > radius) and `inside` for the
    /// parameter where the piece crosses the corridor boundary.
    fn boundary_crossing(
        &self,
        distance_at: &impl Fn(f64) -> f64,
        outside: f64,
        inside: f64,
    ) -> f64 {
        let mut out = outside;
        let mut inn = inside;
        for _ in 0..BISECT_ITERATIONS {
            let mid = (out + inn) / 2.0;
            if distance_at(mid) <= self.radius {
                inn = mid;
            } else {
                out = mid;
            }
        }
        (out + inn) / 2.0
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
