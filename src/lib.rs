//! # Trace Matcher
//!
//! Batch map matching of vehicle GPS traces onto a road network, and
//! per-edge traffic counting over the matched routes.
//!
//! This library provides:
//! - Two-stage trace reduction (stillness filter + spatial down-sampling)
//! - An R-tree index over road network edges
//! - Deterministic corridor-based map matching with return-journey suppression
//! - Traffic count aggregation and consolidated route export
//! - A batch driver that skips and reports bad files instead of aborting
//!
//! ## Features
//!
//! - **`parallel`** - Process trace files in parallel with rayon
//! - **`cli`** - Build the `trace-matcher` command-line driver
//!
//! ## Quick Start
//!
//! ```rust
//! use geo::{LineString, MultiLineString};
//! use trace_matcher::{
//!     Edge, MapMatcher, MatchConfig, NetworkIndex, RoadNetwork, TracePoint,
//! };
//!
//! // One east-west road along the equator
//! let road = MultiLineString::new(vec![LineString::from(vec![(0.0, 0.0), (0.01, 0.0)])]);
//! let network = RoadNetwork::from_edges(vec![Edge::new(1, road).unwrap()]).unwrap();
//! let index = NetworkIndex::build(&network).unwrap();
//!
//! let trace = vec![
//!     TracePoint::new(0.0001, 0.001, 100),
//!     TracePoint::new(0.0001, 0.008, 160),
//! ];
//!
//! let config = MatchConfig::default();
//! let matcher = MapMatcher::new(&network, &index, &config);
//! let route = matcher.match_trace(&trace).unwrap();
//! assert_eq!(route.edge_ids(), vec![1]);
//! ```

use geo::Coord;
use rstar::AABB;

pub mod batch;
pub mod collect;
pub mod config;
pub mod error;
pub mod geo_utils;
pub mod index;
pub mod matcher;
pub mod network;
pub mod records;
pub mod reduce;
pub mod source;
pub mod traffic;

pub use batch::{BatchReport, SkippedFile, Stage};
pub use collect::RouteCollector;
pub use config::{MatchConfig, NetworkConfig, PipelineConfig, ReduceConfig, TraceFormat};
pub use error::{ErrorKind, MatchError};
pub use index::NetworkIndex;
pub use matcher::MapMatcher;
pub use network::{Edge, RoadNetwork};
pub use reduce::reduce_points;
pub use source::{TraceDirectory, TraceFile};
pub use traffic::{TrafficAggregator, TrafficCount};

/// Unique identifier of a road network edge.
pub type EdgeId = i64;

// ============================================================================
// Core Types
// ============================================================================

/// One GPS sample: position plus the timestamp recorded with it.
///
/// # Example
/// ```
/// use trace_matcher::TracePoint;
/// let point = TracePoint::new(21.0285, 105.8542, 1501545600); // Hanoi
/// assert_eq!(point.coord().x, 105.8542);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TracePoint {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: i64,
}

impl TracePoint {
    /// Create a new trace point.
    pub fn new(latitude: f64, longitude: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp,
        }
    }

    /// Planar coordinate (x = longitude, y = latitude), matching the
    /// axis order of the road network.
    pub fn coord(&self) -> Coord {
        Coord {
            x: self.longitude,
            y: self.latitude,
        }
    }

    /// Whether the point moved more than `threshold` degrees along either
    /// axis relative to `other`.
    pub fn moved_beyond(&self, other: &TracePoint, threshold: f64) -> bool {
        (self.latitude - other.latitude).abs() > threshold
            || (self.longitude - other.longitude).abs() > threshold
    }
}

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl Bounds {
    /// Create bounds from planar coordinates (x = longitude, y = latitude).
    pub fn from_coords(coords: impl IntoIterator<Item = Coord>) -> Option<Self> {
        let mut coords = coords.into_iter();
        let first = coords.next()?;
        let mut bounds = Self {
            min_lat: first.y,
            max_lat: first.y,
            min_lng: first.x,
            max_lng: first.x,
        };

        for c in coords {
            bounds.min_lat = bounds.min_lat.min(c.y);
            bounds.max_lat = bounds.max_lat.max(c.y);
            bounds.min_lng = bounds.min_lng.min(c.x);
            bounds.max_lng = bounds.max_lng.max(c.x);
        }

        Some(bounds)
    }

    /// Grow the bounds by `margin` degrees on every side.
    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            min_lat: self.min_lat - margin,
            max_lat: self.max_lat + margin,
            min_lng: self.min_lng - margin,
            max_lng: self.max_lng + margin,
        }
    }

    /// R-tree envelope in `[lng, lat]` order.
    pub fn envelope(&self) -> AABB<[f64; 2]> {
        AABB::from_corners([self.min_lng, self.min_lat], [self.max_lng, self.max_lat])
    }
}

/// One matched edge with the timestamp of the segment end that matched it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteEntry {
    pub edge_id: EdgeId,
    pub timestamp: i64,
}

/// The ordered sequence of edges a trace was matched to.
///
/// Routes built with [`Route::with_window`] refuse to append an edge that
/// already appears among the last `window` entries (return-journey
/// suppression), so the invariant holds for every route the matcher
/// produces. Routes read back from disk are taken as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route {
    entries: Vec<RouteEntry>,
    window: usize,
}

impl Route {
    /// An empty route enforcing a suppression window of `window` entries.
    pub fn with_window(window: usize) -> Self {
        Self {
            entries: Vec::new(),
            window,
        }
    }

    /// Wrap already-built entries without re-checking suppression.
    pub fn from_entries(entries: Vec<RouteEntry>) -> Self {
        Self { entries, window: 0 }
    }

    /// Append `edge_id` unless it occurs among the last `window` entries.
    /// Returns whether the entry was appended.
    pub fn push(&mut self, edge_id: EdgeId, timestamp: i64) -> bool {
        if self.recently_visited(edge_id) {
            return false;
        }
        self.entries.push(RouteEntry { edge_id, timestamp });
        true
    }

    /// Whether `edge_id` is inside the suppression window.
    pub fn recently_visited(&self, edge_id: EdgeId) -> bool {
        let start = self.entries.len().saturating_sub(self.window);
        self.entries[start..].iter().any(|e| e.edge_id == edge_id)
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Edge identifiers in match order.
    pub fn edge_ids(&self) -> Vec<EdgeId> {
        self.entries.iter().map(|e| e.edge_id).collect()
    }

    /// Timestamps in match order, parallel to [`Route::edge_ids`].
    pub fn timestamps(&self) -> Vec<i64> {
        self.entries.iter().map(|e| e.timestamp).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
