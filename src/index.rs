//! R-tree spatial index over road network edges.

use log::info;
use rstar::{RTree, RTreeObject, AABB};

use crate::{Bounds, EdgeId, MatchError, RoadNetwork};

/// Bounding box of one edge (used for spatial indexing).
#[derive(Debug, Clone)]
struct EdgeBounds {
    edge_id: EdgeId,
    bounds: Bounds,
}

impl RTreeObject for EdgeBounds {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.bounds.envelope()
    }
}

/// Read-only index answering "which edges have a bounding box intersecting
/// this box". Built once per batch and shared by every matching task.
#[derive(Debug)]
pub struct NetworkIndex {
    tree: RTree<EdgeBounds>,
}

impl NetworkIndex {
    /// Bulk-load the index. Fails if any edge has no coordinates to bound.
    pub fn build(network: &RoadNetwork) -> Result<Self, MatchError> {
        let entries = network
            .edges()
            .iter()
            .map(|edge| {
                edge.bounds()
                    .map(|bounds| EdgeBounds {
                        edge_id: edge.id(),
                        bounds,
                    })
                    .ok_or(MatchError::DegenerateGeometry { edge_id: edge.id() })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let tree = RTree::bulk_load(entries);
        info!("Built spatial index over {} edges", tree.size());
        Ok(Self { tree })
    }

    /// Identifiers of edges whose bounding box intersects `bounds`, in
    /// ascending order. This is a candidate superset for matching.
    pub fn query(&self, bounds: &Bounds) -> Vec<EdgeId> {
        let mut ids: Vec<EdgeId> = self
            .tree
            .locate_in_envelope_intersecting(&bounds.envelope())
            .map(|entry| entry.edge_id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}
