//! CSV record formats for trace and route files.
//!
//! - Raw and reduced traces: one sample per row, column layout given by a
//!   [`TraceFormat`].
//! - Route files: headerless `edge_id,timestamp` rows in match order.

use std::io::{Read, Write};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use log::warn;

use crate::{EdgeId, MatchError, Route, RouteEntry, TraceFormat, TracePoint};

/// Read every sample of a trace.
///
/// A record that is missing a column or has a non-numeric field fails the
/// whole trace with [`MatchError::MalformedInput`], unless `skip_malformed`
/// is set, in which case it is logged and dropped.
pub fn read_trace<R: Read>(
    reader: R,
    format: &TraceFormat,
    skip_malformed: bool,
) -> Result<Vec<TracePoint>, MatchError> {
    let mut csv = ReaderBuilder::new()
        .has_headers(format.has_header)
        .flexible(true)
        .from_reader(reader);

    let mut points = Vec::new();
    for (i, record) in csv.records().enumerate() {
        let parsed = record
            .map_err(|e| MatchError::malformed(error_line(&e, i, format.has_header), e.to_string()))
            .and_then(|record| {
                let line = record_line(&record, i, format.has_header);
                parse_trace_record(&record, format, line)
            });

        match parsed {
            Ok(point) => points.push(point),
            Err(e) if skip_malformed => warn!("Skipping record: {e}"),
            Err(e) => return Err(e),
        }
    }
    Ok(points)
}

/// Write samples as headerless `latitude,longitude,timestamp` rows.
///
/// Coordinates are written with the shortest representation that parses
/// back to the same value, so no precision is lost.
pub fn write_trace<W: Write>(writer: W, points: &[TracePoint]) -> Result<(), MatchError> {
    let mut csv = WriterBuilder::new().has_headers(false).from_writer(writer);
    for p in points {
        csv.write_record([
            p.latitude.to_string(),
            p.longitude.to_string(),
            p.timestamp.to_string(),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

/// Read a route file back into a [`Route`].
pub fn read_route<R: Read>(reader: R) -> Result<Route, MatchError> {
    let mut csv = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut entries = Vec::new();
    for (i, record) in csv.records().enumerate() {
        let record =
            record.map_err(|e| MatchError::malformed(error_line(&e, i, false), e.to_string()))?;
        let line = record_line(&record, i, false);
        let edge_id: EdgeId = parse_integral(record.get(0), "edge id", line)?;
        let timestamp = parse_integral(record.get(1), "timestamp", line)?;
        entries.push(RouteEntry { edge_id, timestamp });
    }
    Ok(Route::from_entries(entries))
}

/// Write a route as headerless `edge_id,timestamp` rows.
pub fn write_route<W: Write>(writer: W, route: &Route) -> Result<(), MatchError> {
    let mut csv = WriterBuilder::new().has_headers(false).from_writer(writer);
    for entry in route.entries() {
        csv.write_record([entry.edge_id.to_string(), entry.timestamp.to_string()])?;
    }
    csv.flush()?;
    Ok(())
}

fn parse_trace_record(
    record: &StringRecord,
    format: &TraceFormat,
    line: u64,
) -> Result<TracePoint, MatchError> {
    let latitude = parse_coordinate(record.get(format.latitude_column), "latitude", line)?;
    let longitude = parse_coordinate(record.get(format.longitude_column), "longitude", line)?;
    let timestamp = parse_integral(record.get(format.timestamp_column), "timestamp", line)?;
    Ok(TracePoint::new(latitude, longitude, timestamp))
}

fn parse_coordinate(field: Option<&str>, name: &str, line: u64) -> Result<f64, MatchError> {
    let field = field.ok_or_else(|| MatchError::malformed(line, format!("missing {name} column")))?;
    field
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| MatchError::malformed(line, format!("{name} `{field}` is not numeric")))
}

/// Parse an integer field. Floats with no fractional part (`1501545600.0`)
/// are accepted since some exports write every number as a float.
pub(crate) fn parse_integral(
    field: Option<&str>,
    name: &str,
    line: u64,
) -> Result<i64, MatchError> {
    let field = field.ok_or_else(|| MatchError::malformed(line, format!("missing {name} column")))?;
    let trimmed = field.trim();

    if let Ok(value) = trimmed.parse::<i64>() {
        return Ok(value);
    }

    trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && v.fract() == 0.0 && v.abs() < i64::MAX as f64)
        .map(|v| v as i64)
        .ok_or_else(|| MatchError::malformed(line, format!("{name} `{field}` is not an integer")))
}

/// 1-based line number of a record, falling back to its ordinal.
fn record_line(record: &StringRecord, index: usize, has_header: bool) -> u64 {
    record
        .position()
        .map(|p| p.line())
        .unwrap_or_else(|| fallback_line(index, has_header))
}

fn error_line(error: &csv::Error, index: usize, has_header: bool) -> u64 {
    error
        .position()
        .map(|p| p.line())
        .unwrap_or_else(|| fallback_line(index, has_header))
}

fn fallback_line(index: usize, has_header: bool) -> u64 {
    index as u64 + if has_header { 2 } else { 1 }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = "\
id,plate,lat,lon,speed,heading,status,driver,time
1,29C,21.0001,105.8001,0,0,1,x,1501545600
2,29C,21.0002,105.8002,0,0,1,x,1501545610.0
";

    #[test]
    fn test_read_raw_columns() {
        let points = read_trace(RAW.as_bytes(), &TraceFormat::default(), false).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], TracePoint::new(21.0001, 105.8001, 1501545600));
        assert_eq!(points[1].timestamp, 1501545610);
    }

    #[test]
    fn test_non_numeric_latitude_fails_trace() {
        let text = "21.0,105.0,10\nabc,105.1,20\n";
        let err = read_trace(text.as_bytes(), &TraceFormat::reduced(), false).unwrap_err();
        match err {
            MatchError::MalformedInput { line, reason } => {
                assert_eq!(line, 2);
                assert!(reason.contains("latitude"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_skip_malformed_records() {
        let text = "21.0,105.0,10\nabc,105.1,20\n21.2,105.2,30\n21.3\n";
        let points = read_trace(text.as_bytes(), &TraceFormat::reduced(), true).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].timestamp, 30);
    }

    #[test]
    fn test_nan_is_malformed() {
        let text = "NaN,105.0,10\n";
        assert!(read_trace(text.as_bytes(), &TraceFormat::reduced(), false).is_err());
    }

    #[test]
    fn test_fractional_timestamp_rejected() {
        let text = "21.0,105.0,10.5\n";
        assert!(read_trace(text.as_bytes(), &TraceFormat::reduced(), false).is_err());
    }

    #[test]
    fn test_trace_write_preserves_values() {
        let points = vec![
            TracePoint::new(21.123456789, 105.000001, 1),
            TracePoint::new(-0.5, 106.25, 2),
        ];
        let mut buf = Vec::new();
        write_trace(&mut buf, &points).unwrap();
        assert_eq!(
            String::from_utf8(buf.clone()).unwrap(),
            "21.123456789,105.000001,1\n-0.5,106.25,2\n"
        );

        let back = read_trace(buf.as_slice(), &TraceFormat::reduced(), false).unwrap();
        assert_eq!(back, points);
    }

    #[test]
    fn test_route_file_format() {
        let mut route = Route::with_window(5);
        route.push(42, 100);
        route.push(7, 100);
        route.push(9, 160);

        let mut buf = Vec::new();
        write_route(&mut buf, &route).unwrap();
        assert_eq!(String::from_utf8(buf.clone()).unwrap(), "42,100\n7,100\n9,160\n");

        let back = read_route(buf.as_slice()).unwrap();
        assert_eq!(back.entries(), route.entries());
    }

    #[test]
    fn test_route_with_bad_edge_id() {
        let err = read_route("1,10\nx,20\n".as_bytes()).unwrap_err();
        assert!(matches!(err, MatchError::MalformedInput { line: 2, .. }));
    }

    #[test]
    fn test_empty_route_file() {
        let route = read_route("".as_bytes()).unwrap();
        assert!(route.is_empty());
    }
}
