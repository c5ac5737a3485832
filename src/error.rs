//! Error types shared by every pipeline stage.
//!
//! Errors scoped to a single trace file (`MalformedInput`, `UnroutableTrace`,
//! `DanglingReference`) are recovered by the batch driver: the file is logged,
//! recorded in the [`BatchReport`](crate::batch::BatchReport) and skipped.
//! Errors scoped to the road network are fatal because every later stage
//! depends on it.

use std::fmt;
use std::io;

use crate::EdgeId;

/// Coarse classification of a [`MatchError`], used to group skipped files
/// in batch summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    MalformedInput,
    UnroutableTrace,
    DanglingReference,
    DegenerateGeometry,
    InvalidNetwork,
    Config,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MalformedInput => "MalformedInput",
            Self::UnroutableTrace => "UnroutableTrace",
            Self::DanglingReference => "DanglingReference",
            Self::DegenerateGeometry => "DegenerateGeometry",
            Self::InvalidNetwork => "InvalidNetwork",
            Self::Config => "Config",
            Self::Io => "Io",
        };
        f.write_str(name)
    }
}

/// Errors produced while loading, matching and aggregating traces.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// A record could not be parsed into latitude, longitude and timestamp
    /// (or edge identifier and timestamp for route files).
    #[error("malformed record on line {line}: {reason}")]
    MalformedInput { line: u64, reason: String },

    /// The trace is too short to form a single segment.
    #[error("unroutable trace: {0}")]
    UnroutableTrace(String),

    /// A route references an edge that is not part of the road network.
    #[error("route references unknown edge {edge_id}")]
    DanglingReference { edge_id: EdgeId },

    /// An edge geometry has fewer than two coordinates.
    #[error("edge {edge_id} has a degenerate geometry")]
    DegenerateGeometry { edge_id: EdgeId },

    /// Two edges share the same identifier.
    #[error("duplicate edge identifier {edge_id}")]
    DuplicateEdge { edge_id: EdgeId },

    /// A network feature has no usable integer identifier.
    #[error("feature {feature} has no integer `{property}` property")]
    MissingEdgeId { feature: usize, property: String },

    /// A network feature is not a line geometry.
    #[error("feature {feature} has unsupported geometry: {reason}")]
    UnsupportedGeometry { feature: usize, reason: String },

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl MatchError {
    /// Classify this error for batch reporting.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedInput { .. } => ErrorKind::MalformedInput,
            Self::UnroutableTrace(_) => ErrorKind::UnroutableTrace,
            Self::DanglingReference { .. } => ErrorKind::DanglingReference,
            Self::DegenerateGeometry { .. } => ErrorKind::DegenerateGeometry,
            Self::DuplicateEdge { .. }
            | Self::MissingEdgeId { .. }
            | Self::UnsupportedGeometry { .. }
            | Self::GeoJson(_) => ErrorKind::InvalidNetwork,
            Self::InvalidConfig(_) | Self::ConfigParse(_) => ErrorKind::Config,
            Self::Csv(_) | Self::Io(_) => ErrorKind::Io,
        }
    }

    pub(crate) fn malformed(line: u64, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            line,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            MatchError::malformed(3, "bad latitude").kind(),
            ErrorKind::MalformedInput
        );
        assert_eq!(
            MatchError::DanglingReference { edge_id: 7 }.kind(),
            ErrorKind::DanglingReference
        );
        assert_eq!(
            MatchError::DuplicateEdge { edge_id: 1 }.kind(),
            ErrorKind::InvalidNetwork
        );
        let io = MatchError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(io.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_error_messages() {
        let err = MatchError::malformed(4, "latitude `abc` is not numeric");
        assert_eq!(
            err.to_string(),
            "malformed record on line 4: latitude `abc` is not numeric"
        );
        assert_eq!(ErrorKind::UnroutableTrace.to_string(), "UnroutableTrace");
    }
}
