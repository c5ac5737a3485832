//! Consolidated route dataset.
//!
//! One CSV row per trace, streamed as routes are read:
//!
//! ```text
//! vehicle_id,edge_path,time_stamp
//! 29C12345,"[4, 9, 12]","[1501545600, 1501545660, 1501545720]"
//! ```

use std::fmt::Display;
use std::io::Write;

use csv::Writer;

use crate::{MatchError, Route};

const HEADER: [&str; 3] = ["vehicle_id", "edge_path", "time_stamp"];

/// Streams routes into a single CSV dataset, one row per trace, in the
/// order they are pushed.
pub struct RouteCollector<W: Write> {
    writer: Writer<W>,
    rows: usize,
}

impl<W: Write> RouteCollector<W> {
    /// Start a dataset on `writer` and emit the header row.
    pub fn new(writer: W) -> Result<Self, MatchError> {
        let mut writer = Writer::from_writer(writer);
        writer.write_record(HEADER)?;
        Ok(Self { writer, rows: 0 })
    }

    /// Append one trace's route. Empty routes produce a row with empty lists.
    pub fn push(&mut self, trace_id: &str, route: &Route) -> Result<(), MatchError> {
        let edges = format_list(route.edge_ids());
        let timestamps = format_list(route.timestamps());
        self.writer.write_record([trace_id, edges.as_str(), timestamps.as_str()])?;
        self.rows += 1;
        Ok(())
    }

    /// Flush the dataset and return the number of rows written.
    pub fn finish(mut self) -> Result<usize, MatchError> {
        self.writer.flush()?;
        Ok(self.rows)
    }
}

/// Render values as `[a, b, c]`.
pub fn format_list<T: Display>(values: impl IntoIterator<Item = T>) -> String {
    let items: Vec<String> = values.into_iter().map(|v| v.to_string()).collect();
    format!("[{}]", items.join(", "))
}
