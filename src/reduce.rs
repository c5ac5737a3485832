//! Trace reduction.
//!
//! Raw traces contain long runs of near-identical samples while a vehicle
//! stands still, and far more samples than matching at network scale needs.
//! Reduction is a two-stage filter over consecutive samples:
//!
//! 1. **Stillness**: a sample is a movement candidate only if it moved more
//!    than `stillness_threshold` along either axis from the preceding raw
//!    sample. The first sample has no predecessor and always counts as the
//!    first candidate, anchoring the reduced trace.
//! 2. **Sampling**: a candidate is emitted only if it moved more than
//!    `sampling_threshold` along either axis from the last emitted sample.
//!
//! Every emitted sample differs from the previous emitted one by more than
//! the sampling threshold, so reducing a reduced trace again returns it
//! unchanged. This needs `sampling_threshold >= stillness_threshold`, which
//! [`PipelineConfig::validate`](crate::PipelineConfig::validate) enforces.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::debug;

use crate::records::{read_trace, write_trace};
use crate::source::write_atomically;
use crate::{MatchError, ReduceConfig, TraceFormat, TracePoint};

/// Reduce one trace. Order and timestamps are preserved.
///
/// # Example
/// ```
/// use trace_matcher::{reduce_points, ReduceConfig, TracePoint};
///
/// let raw = vec![
///     TracePoint::new(21.0000, 105.0000, 0),
///     TracePoint::new(21.0002, 105.0001, 10), // jitter
///     TracePoint::new(21.0200, 105.0000, 20),
/// ];
/// let reduced = reduce_points(&raw, &ReduceConfig::default());
/// assert_eq!(reduced.len(), 2);
/// assert_eq!(reduced[1].timestamp, 20);
/// ```
pub fn reduce_points(points: &[TracePoint], config: &ReduceConfig) -> Vec<TracePoint> {
    let Some(first) = points.first() else {
        return Vec::new();
    };

    let mut reduced = vec![*first];

    for pair in points.windows(2) {
        let (previous, current) = (&pair[0], &pair[1]);

        if !current.moved_beyond(previous, config.stillness_threshold) {
            continue;
        }

        let last_emitted = reduced[reduced.len() - 1];
        if current.moved_beyond(&last_emitted, config.sampling_threshold) {
            reduced.push(*current);
        }
    }

    reduced
}

/// Reduce the trace file at `source` into `destination`.
///
/// # Arguments
///
/// * `source` - Raw trace in the layout described by `format`
/// * `destination` - Written atomically as headerless
///   `latitude,longitude,timestamp` rows
/// * `format` - Column layout of `source`
/// * `config` - Thresholds and malformed-record policy
///
/// # Returns
///
/// The number of samples kept.
pub fn reduce_trace_file(
    source: &Path,
    destination: &Path,
    format: &TraceFormat,
    config: &ReduceConfig,
) -> Result<usize, MatchError> {
    let reader = BufReader::new(File::open(source)?);
    let raw = read_trace(reader, format, config.skip_malformed_records)?;
    let reduced = reduce_points(&raw, config);

    write_atomically(destination, |out| write_trace(out, &reduced))?;

    debug!(
        "Reduced {}: {} -> {} samples",
        source.display(),
        raw.len(),
        reduced.len()
    );
    Ok(reduced.len())
}
