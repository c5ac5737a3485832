//! Reduce and match a single trace against a small street grid.
//!
//! Run with: cargo run --example match_trace

use geo::{LineString, MultiLineString};
use trace_matcher::{
    reduce_points, Edge, MapMatcher, MatchConfig, NetworkIndex, ReduceConfig, RoadNetwork,
    TracePoint, TrafficAggregator,
};

fn main() {
    // 4 x 4 grid of streets around Hoan Kiem, 0.01 degrees apart
    let mut edges = Vec::new();
    let mut next_id = 1;
    for i in 0..4 {
        for j in 0..3 {
            let (lat, lon) = (21.02 + i as f64 * 0.01, 105.84 + j as f64 * 0.01);
            // east-west street
            edges.push(street(next_id, (lon, lat), (lon + 0.01, lat)));
            // north-south street
            let (lat, lon) = (21.02 + j as f64 * 0.01, 105.84 + i as f64 * 0.01);
            edges.push(street(next_id + 1, (lon, lat), (lon, lat + 0.01)));
            next_id += 2;
        }
    }
    let network = RoadNetwork::from_edges(edges).unwrap();
    let index = NetworkIndex::build(&network).unwrap();

    // Drive east along the southern street, then north, with a stop and jitter
    let mut raw = Vec::new();
    let mut t = 1_501_545_600;
    for step in 0..=30 {
        raw.push(TracePoint::new(21.0202, 105.84 + step as f64 * 0.001, t));
        t += 10;
    }
    for _ in 0..20 {
        raw.push(TracePoint::new(21.0203, 105.8701, t)); // waiting at the light
        t += 10;
    }
    for step in 1..=20 {
        raw.push(TracePoint::new(21.02 + step as f64 * 0.001, 105.8698, t));
        t += 10;
    }

    let reduced = reduce_points(&raw, &ReduceConfig::default());
    println!("Trace Matching Example\n");
    println!("Network: {} edges", network.len());
    println!("Raw samples: {}, reduced samples: {}\n", raw.len(), reduced.len());

    let config = MatchConfig::default();
    let matcher = MapMatcher::new(&network, &index, &config);
    let route = match matcher.match_trace(&reduced) {
        Ok(route) => route,
        Err(e) => {
            println!("Could not match trace: {e}");
            return;
        }
    };

    println!("Matched route ({} edges):", route.len());
    for entry in route.entries() {
        println!("  edge {:>3} at t={}", entry.edge_id, entry.timestamp);
    }

    let mut aggregator = TrafficAggregator::new(&network);
    aggregator.add_route(&route).unwrap();
    let counts = aggregator.finish();
    let busy: Vec<_> = counts.iter().filter(|(_, count)| *count > 0).collect();
    println!("\nEdges with traffic: {busy:?}");
}

fn street(id: i64, from: (f64, f64), to: (f64, f64)) -> Edge {
    Edge::new(id, MultiLineString::new(vec![LineString::from(vec![from, to])])).unwrap()
}
