//! # Corridor Map Matching
//!
//! Assigns a reduced trace to road network edges with deterministic
//! geometric rules.
//!
//! ## Algorithm
//! For each consecutive pair of trace points `(previous, current)`:
//! 1. Build the segment `S` and its corridor `B` (all points within
//!    `buffer_tolerance` of `S`)
//! 2. Query the [`NetworkIndex`] with the bounds of `B` for candidate edges
//! 3. Accept a candidate `E` when
//!    - **long-edge rule**: `len(E ∩ B) > long_edge_ratio * len(S)`, or
//!    - **short-edge rule**: `len(E) < len(S)` and
//!      `len(E ∩ B) > short_edge_ratio * len(E)`
//! 4. Append each accepted edge with the timestamp of `current`, unless it
//!    is among the last `return_journey_window` route entries
//!
//! Candidates of a segment are evaluated in ascending edge identifier order
//! and all of them are appended before moving to the next segment.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;

use crate::geo_utils::Corridor;
use crate::records::{read_trace, write_route};
use crate::source::write_atomically;
use crate::{
    Edge, MatchConfig, MatchError, NetworkIndex, RoadNetwork, Route, TraceFormat, TracePoint,
};

/// Matches traces against a shared network and index.
///
/// Holds only shared references, so one matcher can be used from many
/// threads at once.
#[derive(Debug, Clone, Copy)]
pub struct MapMatcher<'a> {
    network: &'a RoadNetwork,
    index: &'a NetworkIndex,
    config: &'a MatchConfig,
}

impl<'a> MapMatcher<'a> {
    pub fn new(network: &'a RoadNetwork, index: &'a NetworkIndex, config: &'a MatchConfig) -> Self {
        Self {
            network,
            index,
            config,
        }
    }

    /// Match a trace to a route.
    ///
    /// # Arguments
    ///
    /// * `points` - Reduced trace, in recording order
    ///
    /// # Returns
    ///
    /// The route of accepted edges, each stamped with the timestamp of the
    /// segment end that matched it. A trace that never comes near the
    /// network yields an empty route.
    ///
    /// # Errors
    ///
    /// A trace with fewer than two points is [`MatchError::UnroutableTrace`].
    pub fn match_trace(&self, points: &[TracePoint]) -> Result<Route, MatchError> {
        if points.len() < 2 {
            return Err(MatchError::UnroutableTrace(format!(
                "trace has {} point(s), at least 2 are required",
                points.len()
            )));
        }

        let mut route = Route::with_window(self.config.return_journey_window);

        for pair in points.windows(2) {
            let (previous, current) = (&pair[0], &pair[1]);
            let corridor =
                Corridor::new(previous.coord(), current.coord(), self.config.buffer_tolerance);

            let accepted: Vec<&Edge> = self
                .index
                .query(&corridor.bounds())
                .into_iter()
                .filter_map(|id| self.network.edge(id))
                .filter(|edge| self.accepts(&corridor, edge))
                .collect();

            for edge in accepted {
                route.push(edge.id(), current.timestamp);
            }
        }

        Ok(route)
    }

    /// Apply the long-edge and short-edge rules to one candidate.
    pub fn accepts(&self, corridor: &Corridor, edge: &Edge) -> bool {
        let segment_length = corridor.segment_length();
        let overlap = corridor.overlap_length(edge.geometry());

        if overlap > segment_length * self.config.long_edge_ratio {
            return true;
        }

        edge.length() < segment_length && overlap > edge.length() * self.config.short_edge_ratio
    }

    /// Match the reduced trace at `source` and write its route to
    /// `destination` atomically.
    ///
    /// # Arguments
    ///
    /// * `source` - Headerless `latitude,longitude,timestamp` file
    /// * `destination` - Route file to write as `edge_id,timestamp` rows;
    ///   parent directories are created
    ///
    /// # Returns
    ///
    /// The number of route entries written. On error nothing is written to
    /// `destination`.
    ///
    /// # Example
    ///
    /// ```rust
    /// use geo::{LineString, MultiLineString};
    /// use trace_matcher::{Edge, MapMatcher, MatchConfig, NetworkIndex, RoadNetwork};
    ///
    /// let road = MultiLineString::new(vec![LineString::from(vec![(0.0, 0.0), (0.01, 0.0)])]);
    /// let network = RoadNetwork::from_edges(vec![Edge::new(1, road).unwrap()]).unwrap();
    /// let index = NetworkIndex::build(&network).unwrap();
    ///
    /// let dir = std::env::temp_dir().join("trace_matcher_doc_match_file");
    /// std::fs::create_dir_all(&dir).unwrap();
    /// let source = dir.join("29C12345.csv");
    /// let destination = dir.join("routes").join("29C12345.csv");
    /// std::fs::write(&source, "0.0001,0.001,100\n0.0001,0.008,160\n").unwrap();
    ///
    /// let config = MatchConfig::default();
    /// let matcher = MapMatcher::new(&network, &index, &config);
    /// assert_eq!(matcher.match_trace_file(&source, &destination).unwrap(), 1);
    /// assert_eq!(std::fs::read_to_string(&destination).unwrap(), "1,160\n");
    /// # std::fs::remove_dir_all(&dir).unwrap();
    /// ```
    pub fn match_trace_file(&self, source: &Path, destination: &Path) -> Result<usize, MatchError> {
        let reader = BufReader::new(File::open(source)?);
        let points = read_trace(reader, &TraceFormat::reduced(), false)?;
        let route = self.match_trace(&points)?;

        write_atomically(destination, |out| write_route(out, &route))?;

        debug!(
            "Matched {}: {} points -> {} edges",
            source.display(),
            points.len(),
            route.len()
        );
        Ok(route.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EdgeId;
    use geo::{LineString, MultiLineString};

    fn edge(id: EdgeId, coords: Vec<(f64, f64)>) -> Edge {
        Edge::new(id, MultiLineString::new(vec![LineString::from(coords)])).unwrap()
    }

    fn p(lat: f64, lon: f64, t: i64) -> TracePoint {
        TracePoint::new(lat, lon, t)
    }

    fn match_with(
        edges: Vec<Edge>,
        config: &MatchConfig,
        trace: &[TracePoint],
    ) -> Result<Route, MatchError> {
        let network = RoadNetwork::from_edges(edges).unwrap();
        let index = NetworkIndex::build(&network).unwrap();
        MapMatcher::new(&network, &index, config).match_trace(trace)
    }

    #[test]
    fn test_long_edge_rule() {
        // Road runs along the equator; trace drives along it 0.0005 north
        let edges = vec![edge(1, vec![(0.0, 0.0), (0.1, 0.0)])];
        let trace = [p(0.0005, 0.01, 10), p(0.0005, 0.03, 20), p(0.0005, 0.05, 30)];

        let route = match_with(edges, &MatchConfig::default(), &trace).unwrap();
        assert_eq!(route.edge_ids(), vec![1]);
        assert_eq!(route.timestamps(), vec![20]);
    }

    #[test]
    fn test_short_edge_rule() {
        // Segment of 0.003 degrees along the equator. The edge is shorter
        // than the segment and 75% of it lies within the 0.002 corridor
        // (it leaves the corridor at latitude 0.002).
        let short = edge(7, vec![(0.0005, 0.0014), (0.0025, 0.0022)]);
        let trace = [p(0.0, 0.0, 100), p(0.0, 0.003, 160)];
        let config = MatchConfig::default();

        let network = RoadNetwork::from_edges(vec![short]).unwrap();
        let index = NetworkIndex::build(&network).unwrap();
        let matcher = MapMatcher::new(&network, &index, &config);

        let corridor = Corridor::new(trace[0].coord(), trace[1].coord(), config.buffer_tolerance);
        let candidate = network.edge(7).unwrap();
        let overlap = corridor.overlap_length(candidate.geometry());
        assert!((overlap / candidate.length() - 0.75).abs() < 1e-6);
        assert!(overlap < corridor.segment_length() * config.long_edge_ratio);

        let route = matcher.match_trace(&trace).unwrap();
        assert_eq!(route.edge_ids(), vec![7]);
        assert_eq!(route.timestamps(), vec![160]);
    }

    #[test]
    fn test_bbox_only_candidate_rejected() {
        // Diagonal road whose bounding box covers the trace but whose line
        // stays far from it
        let edges = vec![edge(3, vec![(0.0, 0.1), (0.1, 0.0)])];
        let trace = [p(0.001, 0.001, 1), p(0.001, 0.02, 2)];

        let route = match_with(edges, &MatchConfig::default(), &trace).unwrap();
        assert!(route.is_empty());
    }

    #[test]
    fn test_trace_outside_network_is_empty_route() {
        let edges = vec![edge(1, vec![(105.0, 21.0), (105.1, 21.0)])];
        let trace = [p(10.0, 106.0, 1), p(10.1, 106.0, 2), p(10.2, 106.0, 3)];

        let route = match_with(edges, &MatchConfig::default(), &trace).unwrap();
        assert!(route.is_empty());
    }

    #[test]
    fn test_too_short_trace_unroutable() {
        let edges = vec![edge(1, vec![(0.0, 0.0), (0.1, 0.0)])];
        let err =
            match_with(edges.clone(), &MatchConfig::default(), &[p(0.0, 0.01, 1)]).unwrap_err();
        assert!(matches!(err, MatchError::UnroutableTrace(_)));

        let err = match_with(edges, &MatchConfig::default(), &[]).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::UnroutableTrace);
    }

    #[test]
    fn test_multiple_short_edges_per_segment() {
        // One long trace segment straddling three consecutive short edges
        let edges = vec![
            edge(1, vec![(0.00, 0.0), (0.01, 0.0)]),
            edge(2, vec![(0.01, 0.0), (0.02, 0.0)]),
            edge(3, vec![(0.02, 0.0), (0.03, 0.0)]),
        ];
        let trace = [p(0.0, 0.0, 5), p(0.0, 0.03, 50)];

        let route = match_with(edges, &MatchConfig::default(), &trace).unwrap();
        assert_eq!(route.edge_ids(), vec![1, 2, 3]);
        assert!(route.timestamps().iter().all(|&t| t == 50));
    }

    #[test]
    fn test_oscillation_suppressed() {
        // Trace jitters back and forth along a single edge
        let edges = vec![edge(1, vec![(0.0, 0.0), (0.1, 0.0)])];
        let trace: Vec<TracePoint> = (0..10)
            .map(|i| p(0.0, if i % 2 == 0 { 0.02 } else { 0.05 }, i))
            .collect();

        let route = match_with(edges, &MatchConfig::default(), &trace).unwrap();
        assert_eq!(route.edge_ids(), vec![1]);
    }

    #[test]
    fn test_return_journey_counted_after_window() {
        // Out along six edges and back along the same six
        let edges: Vec<Edge> = (0..6)
            .map(|i| edge(i, vec![(i as f64 * 0.02, 0.0), ((i + 1) as f64 * 0.02, 0.0)]))
            .collect();
        let mut trace: Vec<TracePoint> = (0..=6).map(|i| p(0.0, i as f64 * 0.02, i)).collect();
        trace.extend((0..6).rev().map(|i| p(0.0, i as f64 * 0.02, 20 - i)));

        let config = MatchConfig {
            buffer_tolerance: 0.001,
            ..MatchConfig::default()
        };
        let route = match_with(edges, &config, &trace).unwrap();
        let ids = route.edge_ids();

        assert_eq!(&ids[..6], &[0, 1, 2, 3, 4, 5]);
        // Edges 5..1 are too recent on the way back; edge 0 is six entries back
        assert!(ids[6..].contains(&0));
        assert_suppression_invariant(&ids, config.return_journey_window);
    }

    #[test]
    fn test_suppression_invariant_on_dense_grid() {
        // Zig-zag trace over a small grid of short edges
        let mut edges = Vec::new();
        for row in 0..5 {
            for col in 0..5 {
                let (x, y) = (col as f64 * 0.005, row as f64 * 0.005);
                edges.push(edge(row * 10 + col, vec![(x, y), (x + 0.005, y)]));
            }
        }
        let trace: Vec<TracePoint> = (0..60)
            .map(|i| {
                let t = i as f64;
                p((t * 0.37).sin().abs() * 0.02, (t * 0.11).cos().abs() * 0.025, i)
            })
            .collect();

        for window in [1, 3, 5, 8] {
            let config = MatchConfig {
                buffer_tolerance: 0.001,
                return_journey_window: window,
                ..MatchConfig::default()
            };
            let route = match_with(edges.clone(), &config, &trace).unwrap();
            assert_suppression_invariant(&route.edge_ids(), window);
        }
    }

    fn assert_suppression_invariant(ids: &[EdgeId], window: usize) {
        for (i, id) in ids.iter().enumerate() {
            let start = i.saturating_sub(window);
            assert!(
                !ids[start..i].contains(id),
                "edge {id} repeated within {window} entries at position {i}: {ids:?}"
            );
        }
    }

    #[test]
    fn test_match_trace_file() {
        let dir = crate::source::tests::scratch_dir("match_file");
        let source = dir.join("veh.csv");
        let destination = dir.join("routes").join("veh.csv");
        std::fs::write(&source, "0.0005,0.01,10\n0.0005,0.03,20\n").unwrap();

        let network = RoadNetwork::from_edges(vec![edge(9, vec![(0.0, 0.0), (0.1, 0.0)])]).unwrap();
        let index = NetworkIndex::build(&network).unwrap();
        let config = MatchConfig::default();
        let matcher = MapMatcher::new(&network, &index, &config);

        assert_eq!(matcher.match_trace_file(&source, &destination).unwrap(), 1);
        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "9,20\n");

        std::fs::write(&source, "0.0005,east,10\n0.0005,0.03,20\n").unwrap();
        let err = matcher.match_trace_file(&source, &dir.join("bad.csv")).unwrap_err();
        assert!(matches!(err, MatchError::MalformedInput { line: 1, .. }));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
