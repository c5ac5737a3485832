//! Traffic counting over matched routes.
//!
//! Counts start at zero for every edge of the network and only ever grow.
//! Every route entry adds one vehicle pass to its edge; repeated entries in
//! one route are separate passes, since the matcher already suppressed
//! jitter-induced repeats.
//!
//! A route is validated as a whole before it is counted: if any entry
//! references an edge outside the network the route contributes nothing
//! and [`MatchError::DanglingReference`] is returned.
//!
//! For parallel aggregation each worker folds its routes into a
//! [`PartialCount`]; partials are merged into the single
//! [`TrafficAggregator`] that owns the final table.

use std::collections::{BTreeMap, HashMap};

use crate::{EdgeId, MatchError, RoadNetwork, Route};

/// Vehicle passes per edge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrafficCount {
    counts: BTreeMap<EdgeId, u64>,
}

impl TrafficCount {
    /// Zero count for every edge of `network`.
    pub fn seeded(network: &RoadNetwork) -> Self {
        Self {
            counts: network.edges().iter().map(|e| (e.id(), 0)).collect(),
        }
    }

    pub fn get(&self, edge_id: EdgeId) -> Option<u64> {
        self.counts.get(&edge_id).copied()
    }

    /// Add `passes` to an edge.
    pub fn increment(&mut self, edge_id: EdgeId, passes: u64) {
        *self.counts.entry(edge_id).or_insert(0) += passes;
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// `(edge_id, count)` in ascending edge order.
    pub fn iter(&self) -> impl Iterator<Item = (EdgeId, u64)> + '_ {
        self.counts.iter().map(|(&id, &count)| (id, count))
    }
}

/// Counts accumulated by one worker, merged into a [`TrafficAggregator`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartialCount {
    counts: HashMap<EdgeId, u64>,
    routes: usize,
    entries: u64,
}

impl PartialCount {
    /// Count one route, or reject it whole if it references an unknown
    /// edge. Returns the number of entries counted.
    pub fn add_route(&mut self, network: &RoadNetwork, route: &Route) -> Result<usize, MatchError> {
        validate_route(network, route)?;
        for entry in route.entries() {
            *self.counts.entry(entry.edge_id).or_insert(0) += 1;
        }
        self.routes += 1;
        self.entries += route.len() as u64;
        Ok(route.len())
    }

    /// Combine two partials.
    pub fn merge(mut self, other: PartialCount) -> PartialCount {
        for (edge_id, passes) in other.counts {
            *self.counts.entry(edge_id).or_insert(0) += passes;
        }
        self.routes += other.routes;
        self.entries += other.entries;
        self
    }
}

/// Owner of the traffic table for one network.
#[derive(Debug)]
pub struct TrafficAggregator<'a> {
    network: &'a RoadNetwork,
    counts: TrafficCount,
    routes: usize,
    entries: u64,
}

impl<'a> TrafficAggregator<'a> {
    pub fn new(network: &'a RoadNetwork) -> Self {
        Self {
            network,
            counts: TrafficCount::seeded(network),
            routes: 0,
            entries: 0,
        }
    }

    /// Fold one route into the table. On
    /// [`MatchError::DanglingReference`] nothing is counted.
    pub fn add_route(&mut self, route: &Route) -> Result<usize, MatchError> {
        validate_route(self.network, route)?;
        for entry in route.entries() {
            self.counts.increment(entry.edge_id, 1);
        }
        self.routes += 1;
        self.entries += route.len() as u64;
        Ok(route.len())
    }

    /// Fold a worker's partial counts into the table.
    pub fn merge(&mut self, partial: PartialCount) {
        for (edge_id, passes) in partial.counts {
            self.counts.increment(edge_id, passes);
        }
        self.routes += partial.routes;
        self.entries += partial.entries;
    }

    pub fn counts(&self) -> &TrafficCount {
        &self.counts
    }

    /// Number of routes counted so far.
    pub fn routes(&self) -> usize {
        self.routes
    }

    /// Number of route entries counted so far; always equals the sum of
    /// all counts.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn finish(self) -> TrafficCount {
        self.counts
    }
}

fn validate_route(network: &RoadNetwork, route: &Route) -> Result<(), MatchError> {
    match route.entries().iter().find(|e| !network.contains(e.edge_id)) {
        Some(dangling) => Err(MatchError::DanglingReference {
            edge_id: dangling.edge_id,
        }),
        None => Ok(()),
    }
}
