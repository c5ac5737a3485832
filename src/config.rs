//! Pipeline configuration.
//!
//! Every threshold used by the reducer and the matcher is tunable. A
//! [`PipelineConfig`] can be built in code, or loaded from a TOML file where
//! any omitted field keeps its default:
//!
//! ```toml
//! [reduce]
//! stillness_threshold = 0.001
//! sampling_threshold = 0.01
//!
//! [matching]
//! buffer_tolerance = 0.00015   # local-scale network
//! return_journey_window = 5
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::MatchError;

/// Configuration for the two-stage trace reduction filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceConfig {
    /// Minimum latitude or longitude change (degrees) from the preceding raw
    /// point for a point to count as movement. Smaller changes are GPS jitter
    /// while stationary.
    /// Default: 0.001
    pub stillness_threshold: f64,

    /// Minimum latitude or longitude change (degrees) from the last emitted
    /// point before another point is emitted. Must not be below
    /// `stillness_threshold`.
    /// Default: 0.01 (suitable for national road analysis)
    pub sampling_threshold: f64,

    /// Skip unparseable records with a warning instead of failing the file.
    /// Default: false
    pub skip_malformed_records: bool,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            stillness_threshold: 0.001,
            sampling_threshold: 0.01,
            skip_malformed_records: false,
        }
    }
}

/// Configuration for geometric map matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Corridor radius around each trace segment (degrees).
    /// Default: 0.002 (national scale). Around 0.00015 suits local networks.
    pub buffer_tolerance: f64,

    /// Number of most recent route entries an edge must be absent from
    /// before it can be appended again.
    /// Default: 5
    pub return_journey_window: usize,

    /// Long-edge rule: accept when the corridor overlap exceeds this share
    /// of the trace segment length.
    /// Default: 0.8
    pub long_edge_ratio: f64,

    /// Short-edge rule: accept an edge shorter than the segment when the
    /// corridor overlap exceeds this share of the edge length.
    /// Default: 0.7
    pub short_edge_ratio: f64,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            buffer_tolerance: 0.002,
            return_journey_window: 5,
            long_edge_ratio: 0.8,
            short_edge_ratio: 0.7,
        }
    }
}

/// Column layout of a trace CSV file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceFormat {
    /// Zero-based latitude column. Default: 2
    pub latitude_column: usize,
    /// Zero-based longitude column. Default: 3
    pub longitude_column: usize,
    /// Zero-based timestamp column. Default: 8
    pub timestamp_column: usize,
    /// Whether the first row is a header. Default: true
    pub has_header: bool,
    /// File extension (without dot) of trace files. Default: "csv"
    pub extension: String,
}

impl Default for TraceFormat {
    /// Layout of raw CVTS exports.
    fn default() -> Self {
        Self {
            latitude_column: 2,
            longitude_column: 3,
            timestamp_column: 8,
            has_header: true,
            extension: "csv".to_string(),
        }
    }
}

impl TraceFormat {
    /// Layout of reduced trace files: headerless `latitude,longitude,timestamp`.
    pub fn reduced() -> Self {
        Self {
            latitude_column: 0,
            longitude_column: 1,
            timestamp_column: 2,
            has_header: false,
            extension: "csv".to_string(),
        }
    }
}

/// Attribute names used when reading and writing the road network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Feature property holding the unique integer edge identifier.
    /// Default: "g_id"
    pub id_property: String,
    /// Property added to each edge of the annotated network.
    /// Default: "vehicle_count"
    pub count_property: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            id_property: "g_id".to_string(),
            count_property: "vehicle_count".to_string(),
        }
    }
}

/// Complete configuration for a batch run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub reduce: ReduceConfig,
    pub matching: MatchConfig,
    pub raw_format: TraceFormat,
    pub network: NetworkConfig,
}

impl PipelineConfig {
    /// Parse a TOML document. Missing sections and fields keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, MatchError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, MatchError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject values that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<(), MatchError> {
        let non_negative = [
            ("reduce.stillness_threshold", self.reduce.stillness_threshold),
            ("reduce.sampling_threshold", self.reduce.sampling_threshold),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(MatchError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }

        // reduction is only a fixed point when sampling is at least as coarse
        if self.reduce.sampling_threshold < self.reduce.stillness_threshold {
            return Err(MatchError::InvalidConfig(format!(
                "reduce.sampling_threshold ({}) is below reduce.stillness_threshold ({})",
                self.reduce.sampling_threshold, self.reduce.stillness_threshold
            )));
        }

        let tolerance = self.matching.buffer_tolerance;
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(MatchError::InvalidConfig(format!(
                "matching.buffer_tolerance must be positive, got {tolerance}"
            )));
        }

        let ratios = [
            ("matching.long_edge_ratio", self.matching.long_edge_ratio),
            ("matching.short_edge_ratio", self.matching.short_edge_ratio),
        ];
        for (name, value) in ratios {
            if !(value > 0.0 && value <= 1.0) {
                return Err(MatchError::InvalidConfig(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }

        let fmt = &self.raw_format;
        if fmt.latitude_column == fmt.longitude_column
            || fmt.latitude_column == fmt.timestamp_column
            || fmt.longitude_column == fmt.timestamp_column
        {
            return Err(MatchError::InvalidConfig(
                "raw_format columns must be distinct".to_string(),
            ));
        }

        if self.network.id_property.is_empty() || self.network.count_property.is_empty() {
            return Err(MatchError::InvalidConfig(
                "network property names must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
