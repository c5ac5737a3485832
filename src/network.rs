//! Road network model and GeoJSON I/O.
//!
//! The network is loaded once per batch and shared read-only by the index,
//! the matcher and the traffic aggregator. Loading validates the network
//! completely (unique identifiers, non-degenerate geometries) because every
//! later stage depends on it.

use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use geo::MultiLineString;
use geojson::{Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use log::info;

use crate::geo_utils::polyline_length;
use crate::source::write_atomically;
use crate::traffic::TrafficCount;
use crate::{Bounds, EdgeId, MatchError, NetworkConfig};

/// One road segment.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    id: EdgeId,
    geometry: MultiLineString,
    length: f64,
    properties: JsonObject,
}

impl Edge {
    /// Create an edge, rejecting geometries with a part of fewer than two
    /// coordinates.
    pub fn new(id: EdgeId, geometry: MultiLineString) -> Result<Self, MatchError> {
        if geometry.0.is_empty() || geometry.iter().any(|part| part.0.len() < 2) {
            return Err(MatchError::DegenerateGeometry { edge_id: id });
        }

        let length = polyline_length(&geometry);
        Ok(Self {
            id,
            geometry,
            length,
            properties: JsonObject::new(),
        })
    }

    /// Attach the attribute record carried through to the annotated output.
    pub fn with_properties(mut self, properties: JsonObject) -> Self {
        self.properties = properties;
        self
    }

    pub fn id(&self) -> EdgeId {
        self.id
    }

    pub fn geometry(&self) -> &MultiLineString {
        &self.geometry
    }

    /// Planar length in degrees.
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn properties(&self) -> &JsonObject {
        &self.properties
    }

    /// Bounding box of every part of the geometry.
    pub fn bounds(&self) -> Option<Bounds> {
        Bounds::from_coords(self.geometry.iter().flat_map(|part| part.0.iter().copied()))
    }
}

/// Immutable collection of edges with lookup by identifier.
#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    edges: Vec<Edge>,
    lookup: HashMap<EdgeId, usize>,
}

impl RoadNetwork {
    /// Build a network, rejecting duplicate identifiers.
    pub fn from_edges(edges: Vec<Edge>) -> Result<Self, MatchError> {
        let mut lookup = HashMap::with_capacity(edges.len());
        for (i, edge) in edges.iter().enumerate() {
            if lookup.insert(edge.id, i).is_some() {
                return Err(MatchError::DuplicateEdge { edge_id: edge.id });
            }
        }
        Ok(Self { edges, lookup })
    }

    /// Load a GeoJSON `FeatureCollection` (or single `Feature`) of line
    /// features. Each feature must carry an integer identifier in
    /// `config.id_property`; its other properties are kept for the
    /// annotated output.
    pub fn load(path: impl AsRef<Path>, config: &NetworkConfig) -> Result<Self, MatchError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let network = Self::from_geojson_str(&text, &config.id_property)?;
        info!(
            "Loaded {} road edges from {}",
            network.len(),
            path.display()
        );
        Ok(network)
    }

    /// Parse a GeoJSON document into a network.
    pub fn from_geojson_str(text: &str, id_property: &str) -> Result<Self, MatchError> {
        let features = match GeoJson::from_str(text)? {
            GeoJson::FeatureCollection(collection) => collection.features,
            GeoJson::Feature(feature) => vec![feature],
            GeoJson::Geometry(_) => {
                return Err(MatchError::MissingEdgeId {
                    feature: 0,
                    property: id_property.to_string(),
                })
            }
        };

        let edges = features
            .into_iter()
            .enumerate()
            .map(|(i, feature)| edge_from_feature(i, feature, id_property))
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_edges(edges)
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.lookup.get(&id).map(|&i| &self.edges[i])
    }

    pub fn contains(&self, id: EdgeId) -> bool {
        self.lookup.contains_key(&id)
    }

    /// Render the network as GeoJSON with each edge's traffic count stored
    /// under `count_property`. Edges missing from `counts` get 0.
    pub fn to_annotated_geojson(
        &self,
        counts: &TrafficCount,
        count_property: &str,
    ) -> FeatureCollection {
        let features = self
            .edges
            .iter()
            .map(|edge| {
                let mut properties = edge.properties.clone();
                properties.insert(
                    count_property.to_string(),
                    serde_json::Value::from(counts.get(edge.id).unwrap_or(0)),
                );
                Feature {
                    bbox: None,
                    geometry: Some(Geometry::new(geometry_value(&edge.geometry))),
                    id: None,
                    properties: Some(properties),
                    foreign_members: None,
                }
            })
            .collect();

        FeatureCollection {
            bbox: None,
            features,
            foreign_members: None,
        }
    }

    /// Write the annotated network to `path` atomically.
    pub fn write_annotated(
        &self,
        counts: &TrafficCount,
        path: impl AsRef<Path>,
        config: &NetworkConfig,
    ) -> Result<(), MatchError> {
        let collection = self.to_annotated_geojson(counts, &config.count_property);
        write_atomically(path.as_ref(), |out| {
            out.write_all(collection.to_string().as_bytes())?;
            Ok(())
        })
    }
}

fn edge_from_feature(
    index: usize,
    feature: Feature,
    id_property: &str,
) -> Result<Edge, MatchError> {
    let properties = feature.properties.unwrap_or_default();
    let id = properties
        .get(id_property)
        .and_then(json_edge_id)
        .ok_or_else(|| MatchError::MissingEdgeId {
            feature: index,
            property: id_property.to_string(),
        })?;

    let geometry = feature
        .geometry
        .ok_or(MatchError::DegenerateGeometry { edge_id: id })?;

    Ok(Edge::new(id, multi_line_string(index, geometry)?)?.with_properties(properties))
}

/// Accept integers, integral floats and numeric strings as identifiers.
fn json_edge_id(value: &serde_json::Value) -> Option<EdgeId> {
    match value {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Convert a feature geometry to a polyline; a `LineString` becomes a
/// single-part `MultiLineString`.
fn multi_line_string(feature: usize, geometry: Geometry) -> Result<MultiLineString, MatchError> {
    let unsupported = |reason: String| MatchError::UnsupportedGeometry { feature, reason };

    let geometry: geo::Geometry<f64> = geometry
        .try_into()
        .map_err(|e: geojson::Error| unsupported(e.to_string()))?;

    match geometry {
        geo::Geometry::LineString(line) => Ok(MultiLineString::new(vec![line])),
        geo::Geometry::MultiLineString(lines) => Ok(lines),
        _ => Err(unsupported(
            "expected LineString or MultiLineString".to_string(),
        )),
    }
}

/// Single-part edges are written back as `LineString`.
fn geometry_value(lines: &MultiLineString) -> Value {
    match lines.0.as_slice() {
        [single] => Value::from(single),
        _ => Value::from(lines),
    }
}
