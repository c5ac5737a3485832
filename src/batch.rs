//! Batch driver.
//!
//! Runs each stage over a directory of trace files. A file that fails is
//! logged, recorded in the [`BatchReport`] and skipped; the batch goes on
//! with the next file. Only network-scoped failures (loading the network or
//! building its index) abort a run.
//!
//! With the `parallel` feature, files are processed with rayon. The network
//! and its index are shared read-only across tasks, and traffic counts are
//! combined with a fold/reduce of per-task partial tables.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{info, warn};

use crate::records::read_route;
use crate::reduce::reduce_trace_file;
use crate::source::{remove_stale, reset_dir, write_atomically};
use crate::traffic::PartialCount;
use crate::{
    ErrorKind, MapMatcher, MatchError, NetworkIndex, PipelineConfig, ReduceConfig, RoadNetwork,
    Route, RouteCollector, TraceDirectory, TraceFile, TraceFormat, TrafficAggregator, TrafficCount,
};

/// Sub-directory of the work directory holding reduced traces.
pub const REDUCED_DIR: &str = "reduced";
/// Sub-directory of the work directory holding per-trace routes.
pub const ROUTES_DIR: &str = "routes";
/// Location of the annotated network inside the work directory.
pub const ANNOTATED_NETWORK: &str = "traffic_count/road_network.geojson";
/// Location of the consolidated route dataset inside the work directory.
pub const COLLECTED_ROUTES: &str = "routes_collected/routes.csv";

// ============================================================================
// Report
// ============================================================================

/// Pipeline stage a file was processed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Reduce,
    Match,
    Count,
    Collect,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Reduce => "reduce",
            Self::Match => "match",
            Self::Count => "count",
            Self::Collect => "collect",
        };
        f.write_str(name)
    }
}

/// A file left out of a stage, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    /// Trace identifier, empty when a whole directory could not be read.
    pub trace_id: String,
    pub path: PathBuf,
    pub stage: Stage,
    pub kind: ErrorKind,
    pub reason: String,
}

/// Outcome of one or more batch stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Number of successful (file, stage) operations.
    pub processed: usize,
    /// Files that were skipped, ordered by path then stage.
    pub skipped: Vec<SkippedFile>,
}

impl BatchReport {
    pub fn record_success(&mut self) {
        self.processed += 1;
    }

    /// Record a skipped file and log it.
    pub fn record_failure(&mut self, stage: Stage, file: &TraceFile, error: &MatchError) {
        warn!("Skipping {} in {stage} stage: {error}", file.path.display());
        self.skipped.push(SkippedFile {
            trace_id: file.id.clone(),
            path: file.path.clone(),
            stage,
            kind: error.kind(),
            reason: error.to_string(),
        });
    }

    /// Record a directory that could not be enumerated.
    fn record_unreadable(&mut self, stage: Stage, dir: &Path, error: &MatchError) {
        warn!("Cannot read {} in {stage} stage: {error}", dir.display());
        self.skipped.push(SkippedFile {
            trace_id: String::new(),
            path: dir.to_path_buf(),
            stage,
            kind: error.kind(),
            reason: error.to_string(),
        });
    }

    /// Append another report, keeping skipped files ordered.
    pub fn merge(&mut self, other: BatchReport) {
        self.processed += other.processed;
        self.skipped.extend(other.skipped);
        self.sort();
    }

    /// Number of skipped files per error kind.
    pub fn counts_by_kind(&self) -> BTreeMap<ErrorKind, usize> {
        let mut counts = BTreeMap::new();
        for skipped in &self.skipped {
            *counts.entry(skipped.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Whether nothing was skipped.
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }

    fn sort(&mut self) {
        self.skipped
            .sort_by(|a, b| a.path.cmp(&b.path).then(a.stage.cmp(&b.stage)));
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "processed: {}, skipped: {}", self.processed, self.skipped.len())?;
        for (kind, count) in self.counts_by_kind() {
            writeln!(f, "  {kind}: {count}")?;
        }
        for skipped in &self.skipped {
            writeln!(
                f,
                "  [{}] {}: {}",
                skipped.stage,
                skipped.path.display(),
                skipped.reason
            )?;
        }
        Ok(())
    }
}

// ============================================================================
// Stages
// ============================================================================

/// Reduce every raw trace under `raw` into `out_root`, mirroring the layout.
pub fn reduce_directory(
    raw: &TraceDirectory,
    out_root: &Path,
    format: &TraceFormat,
    config: &ReduceConfig,
) -> BatchReport {
    let start = Instant::now();
    let mut report = BatchReport::default();
    let files = enumerate(raw, Stage::Reduce, &mut report);

    let outcomes = process_files(&files, |file| {
        reduce_trace_file(&file.path, &file.output_path(out_root), format, config)
    });
    let failed = record_outcomes(&mut report, Stage::Reduce, files.iter().zip(outcomes));
    discard_outputs(&mut report, Stage::Reduce, &failed, out_root);

    info!(
        "Reduced {} of {} traces in {:?}",
        report.processed,
        files.len(),
        start.elapsed()
    );
    report
}

/// Match every reduced trace under `reduced` and write one route file per
/// trace under `routes_root`. A trace that fails leaves no route file
/// behind, even one from an earlier run.
pub fn match_directory(
    matcher: &MapMatcher<'_>,
    reduced: &TraceDirectory,
    routes_root: &Path,
) -> BatchReport {
    let start = Instant::now();
    let mut report = BatchReport::default();
    let files = enumerate(reduced, Stage::Match, &mut report);

    let outcomes = process_files(&files, |file| {
        matcher.match_trace_file(&file.path, &file.output_path(routes_root))
    });
    let failed = record_outcomes(&mut report, Stage::Match, files.iter().zip(outcomes));
    discard_outputs(&mut report, Stage::Match, &failed, routes_root);

    info!(
        "Matched {} of {} traces in {:?}",
        report.processed,
        files.len(),
        start.elapsed()
    );
    report
}

/// Count vehicle passes per edge over every route file under `routes`.
///
/// # Arguments
///
/// * `network` - Network the routes were matched against
/// * `routes` - Directory of `edge_id,timestamp` route files
///
/// # Returns
///
/// The traffic table, seeded with zero for every edge, and the report of
/// skipped files. Route files that fail to parse or reference unknown
/// edges contribute nothing.
///
/// # Example
///
/// ```rust
/// use geo::{LineString, MultiLineString};
/// use trace_matcher::batch::count_directory;
/// use trace_matcher::{Edge, RoadNetwork, TraceDirectory};
///
/// let edge = |id: i64, x: f64| {
///     let line = LineString::from(vec![(x, 0.0), (x + 0.01, 0.0)]);
///     Edge::new(id, MultiLineString::new(vec![line])).unwrap()
/// };
/// let network = RoadNetwork::from_edges(vec![edge(1, 0.0), edge(2, 0.01)]).unwrap();
///
/// let dir = std::env::temp_dir().join("trace_matcher_doc_count");
/// # let _ = std::fs::remove_dir_all(&dir);
/// std::fs::create_dir_all(&dir).unwrap();
/// std::fs::write(dir.join("a.csv"), "1,100\n2,160\n").unwrap();
/// std::fs::write(dir.join("b.csv"), "1,300\n").unwrap();
///
/// let (counts, report) = count_directory(&network, &TraceDirectory::new(&dir, "csv"));
/// assert_eq!(counts.get(1), Some(2));
/// assert_eq!(counts.get(2), Some(1));
/// assert!(report.is_clean());
/// # std::fs::remove_dir_all(&dir).unwrap();
/// ```
pub fn count_directory(
    network: &RoadNetwork,
    routes: &TraceDirectory,
) -> (TrafficCount, BatchReport) {
    let start = Instant::now();
    let mut report = BatchReport::default();
    let files = enumerate(routes, Stage::Count, &mut report);

    #[cfg(feature = "parallel")]
    let (partial, outcomes) = {
        use rayon::prelude::*;
        files
            .par_iter()
            .fold(
                || (PartialCount::default(), Vec::new()),
                |(mut partial, mut outcomes), file| {
                    let outcome =
                        load_route(file).and_then(|route| partial.add_route(network, &route));
                    outcomes.push((file, outcome));
                    (partial, outcomes)
                },
            )
            .reduce(
                || (PartialCount::default(), Vec::new()),
                |(left, mut left_outcomes), (right, right_outcomes)| {
                    left_outcomes.extend(right_outcomes);
                    (left.merge(right), left_outcomes)
                },
            )
    };

    #[cfg(not(feature = "parallel"))]
    let (partial, outcomes) = {
        let mut partial = PartialCount::default();
        let outcomes: Vec<_> = files
            .iter()
            .map(|file| {
                let outcome = load_route(file).and_then(|route| partial.add_route(network, &route));
                (file, outcome)
            })
            .collect();
        (partial, outcomes)
    };

    let mut aggregator = TrafficAggregator::new(network);
    aggregator.merge(partial);
    record_outcomes(&mut report, Stage::Count, outcomes);

    info!(
        "Counted {} route entries from {} routes in {:?}",
        aggregator.entries(),
        aggregator.routes(),
        start.elapsed()
    );
    (aggregator.finish(), report)
}

/// Stream every route file under `routes` into one dataset at `output`.
///
/// Rows follow the enumeration order of `routes`. The dataset is written
/// atomically; per-file failures are reported, not fatal.
pub fn collect_directory(
    routes: &TraceDirectory,
    output: &Path,
) -> Result<BatchReport, MatchError> {
    let start = Instant::now();
    let mut report = BatchReport::default();

    write_atomically(output, |out| {
        let mut collector = RouteCollector::new(out)?;
        for entry in routes.files() {
            let file = match entry {
                Ok(file) => file,
                Err(e) => {
                    report.record_unreadable(Stage::Collect, routes.root(), &e);
                    continue;
                }
            };
            match load_route(&file) {
                Ok(route) => {
                    collector.push(&file.id, &route)?;
                    report.record_success();
                }
                Err(e) => report.record_failure(Stage::Collect, &file, &e),
            }
        }
        collector.finish()?;
        Ok(())
    })?;

    report.sort();
    info!(
        "Collected {} routes into {} in {:?}",
        report.processed,
        output.display(),
        start.elapsed()
    );
    Ok(report)
}

/// Result of [`run_pipeline`].
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub counts: TrafficCount,
    pub report: BatchReport,
}

/// Run every stage end to end.
///
/// Outputs land under `work_dir`: reduced traces in [`REDUCED_DIR`], route
/// files in [`ROUTES_DIR`], the annotated network at [`ANNOTATED_NETWORK`]
/// and the consolidated dataset at [`COLLECTED_ROUTES`]. Reduced traces
/// and routes left by an earlier run are cleared first.
///
/// # Arguments
///
/// * `network_path` - GeoJSON road network
/// * `raw_root` - Directory tree of raw trace files
/// * `work_dir` - Directory receiving every output
/// * `config` - Validated before anything is read
///
/// # Returns
///
/// The traffic table and the merged report of all stages.
///
/// # Errors
///
/// Only run-scoped failures: an invalid config, an unreadable network,
/// an index that cannot be built or an output that cannot be written.
/// Bad trace files are reported, not returned.
pub fn run_pipeline(
    network_path: &Path,
    raw_root: &Path,
    work_dir: &Path,
    config: &PipelineConfig,
) -> Result<PipelineRun, MatchError> {
    config.validate()?;
    let start = Instant::now();

    let network = RoadNetwork::load(network_path, &config.network)?;
    let index = NetworkIndex::build(&network)?;
    let matcher = MapMatcher::new(&network, &index, &config.matching);

    let extension = config.raw_format.extension.as_str();
    let reduced_root = work_dir.join(REDUCED_DIR);
    let routes_root = work_dir.join(ROUTES_DIR);
    // outputs of earlier runs must not leak into this run's counts
    reset_dir(&reduced_root)?;
    reset_dir(&routes_root)?;

    let mut report = reduce_directory(
        &TraceDirectory::new(raw_root, extension),
        &reduced_root,
        &config.raw_format,
        &config.reduce,
    );

    report.merge(match_directory(
        &matcher,
        &TraceDirectory::new(&reduced_root, extension),
        &routes_root,
    ));

    let routes = TraceDirectory::new(&routes_root, extension);
    let (counts, count_report) = count_directory(&network, &routes);
    report.merge(count_report);
    network.write_annotated(&counts, work_dir.join(ANNOTATED_NETWORK), &config.network)?;

    report.merge(collect_directory(&routes, &work_dir.join(COLLECTED_ROUTES))?);

    info!(
        "Pipeline finished in {:?}: {} operations, {} skipped",
        start.elapsed(),
        report.processed,
        report.skipped.len()
    );
    Ok(PipelineRun { counts, report })
}

// ============================================================================
// Helpers
// ============================================================================

fn enumerate(source: &TraceDirectory, stage: Stage, report: &mut BatchReport) -> Vec<TraceFile> {
    let mut files = Vec::new();
    for entry in source.files() {
        match entry {
            Ok(file) => files.push(file),
            Err(e) => report.record_unreadable(stage, source.root(), &e),
        }
    }
    files
}

/// Run `task` over every file, in parallel when enabled. Outcomes are
/// returned in file order.
fn process_files<F>(files: &[TraceFile], task: F) -> Vec<Result<usize, MatchError>>
where
    F: Fn(&TraceFile) -> Result<usize, MatchError> + Sync + Send,
{
    #[cfg(feature = "parallel")]
    let outcomes = {
        use rayon::prelude::*;
        files.par_iter().map(task).collect()
    };

    #[cfg(not(feature = "parallel"))]
    let outcomes = files.iter().map(task).collect();

    outcomes
}

/// Record every outcome and return the files that failed.
fn record_outcomes<'f>(
    report: &mut BatchReport,
    stage: Stage,
    outcomes: impl IntoIterator<Item = (&'f TraceFile, Result<usize, MatchError>)>,
) -> Vec<&'f TraceFile> {
    let mut failed = Vec::new();
    for (file, outcome) in outcomes {
        match outcome {
            Ok(_) => report.record_success(),
            Err(e) => {
                report.record_failure(stage, file, &e);
                failed.push(file);
            }
        }
    }
    report.sort();
    failed
}

/// Remove whatever output failed files left from an earlier run. A file
/// whose stale output cannot be removed is reported a second time, since
/// later stages would otherwise pick that output up.
fn discard_outputs(
    report: &mut BatchReport,
    stage: Stage,
    failed: &[&TraceFile],
    output_root: &Path,
) {
    for file in failed {
        let output = file.output_path(output_root);
        if let Err(e) = remove_stale(&output) {
            let error = MatchError::Io(io::Error::new(
                e.kind(),
                format!("cannot remove stale output {}: {e}", output.display()),
            ));
            report.record_failure(stage, file, &error);
        }
    }
    report.sort();
}

fn load_route(file: &TraceFile) -> Result<Route, MatchError> {
    read_route(BufReader::new(File::open(&file.path)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::tests::scratch_dir;
    use std::fs;

    const NETWORK: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": { "g_id": 1, "name": "north road" },
                "geometry": { "type": "LineString", "coordinates": [[105.0, 21.0], [105.0, 21.1]] }
            },
            {
                "type": "Feature",
                "properties": { "g_id": 2 },
                "geometry": { "type": "LineString", "coordinates": [[106.0, 20.0], [106.1, 20.0]] }
            }
        ]
    }"#;

    /// Raw CVTS-style trace driving north along edge 1, optionally with a
    /// garbled latitude on one row.
    fn raw_trace(vehicle: &str, garbled_row: Option<usize>) -> String {
        let mut text = String::from("id,plate,lat,lon,speed,heading,status,driver,time\n");
        for i in 0..6 {
            let lat = match garbled_row {
                Some(row) if row == i => "north".to_string(),
                _ => (21.0 + i as f64 * 0.02).to_string(),
            };
            text.push_str(&format!("{i},{vehicle},{lat},105.0005,40,0,1,x,{}\n", 1000 + i * 60));
        }
        text
    }

    fn file(root: &Path, name: &str) -> TraceFile {
        TraceFile {
            id: name.to_string(),
            path: root.join(format!("{name}.csv")),
            relative_path: PathBuf::from(format!("{name}.csv")),
        }
    }

    #[test]
    fn test_report_counts_and_order() {
        let root = Path::new("/traces");
        let mut report = BatchReport::default();
        report.record_success();
        let unroutable = MatchError::UnroutableTrace("short".into());
        report.record_failure(Stage::Match, &file(root, "b"), &unroutable);

        let mut other = BatchReport::default();
        other.record_failure(Stage::Reduce, &file(root, "a"), &MatchError::malformed(3, "bad"));
        other.record_failure(Stage::Reduce, &file(root, "c"), &MatchError::malformed(9, "bad"));
        report.merge(other);

        assert_eq!(report.processed, 1);
        let ids: Vec<&str> = report.skipped.iter().map(|s| s.trace_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(report.counts_by_kind()[&ErrorKind::MalformedInput], 2);
        assert_eq!(report.counts_by_kind()[&ErrorKind::UnroutableTrace], 1);
        assert!(!report.is_clean());

        let summary = report.to_string();
        assert!(summary.starts_with("processed: 1, skipped: 3"));
        assert!(summary.contains("MalformedInput: 2"));
        assert!(summary.contains("[match]"));
    }

    #[test]
    fn test_stale_route_removed_on_failure() {
        let dir = scratch_dir("batch_stale");
        let reduced = dir.join("reduced");
        let routes = dir.join("routes");
        fs::create_dir_all(&reduced).unwrap();
        fs::create_dir_all(&routes).unwrap();
        fs::write(reduced.join("parked.csv"), "21.0,105.0,10\n").unwrap();
        fs::write(routes.join("parked.csv"), "1,10\n").unwrap();

        let network = RoadNetwork::from_geojson_str(NETWORK, "g_id").unwrap();
        let index = NetworkIndex::build(&network).unwrap();
        let config = crate::MatchConfig::default();
        let matcher = MapMatcher::new(&network, &index, &config);

        let report = match_directory(&matcher, &TraceDirectory::new(&reduced, "csv"), &routes);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].kind, ErrorKind::UnroutableTrace);
        assert!(!routes.join("parked.csv").exists());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_unremovable_stale_output_is_reported() {
        let dir = scratch_dir("batch_stale_dir");
        let reduced = dir.join("reduced");
        let routes = dir.join("routes");
        fs::create_dir_all(&reduced).unwrap();
        fs::write(reduced.join("parked.csv"), "21.0,105.0,10\n").unwrap();
        // a directory where the route file should be cannot be removed as a file
        fs::create_dir_all(routes.join("parked.csv")).unwrap();
        fs::write(routes.join("parked.csv").join("keep"), "").unwrap();

        let network = RoadNetwork::from_geojson_str(NETWORK, "g_id").unwrap();
        let index = NetworkIndex::build(&network).unwrap();
        let config = crate::MatchConfig::default();
        let matcher = MapMatcher::new(&network, &index, &config);

        let report = match_directory(&matcher, &TraceDirectory::new(&reduced, "csv"), &routes);
        let kinds: Vec<ErrorKind> = report.skipped.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![ErrorKind::UnroutableTrace, ErrorKind::Io]);
        assert!(report.skipped[1].reason.contains("cannot remove stale output"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_count_directory_drops_bad_routes() {
        let dir = scratch_dir("batch_count");
        fs::write(dir.join("a.csv"), "1,10\n2,20\n1,30\n").unwrap();
        fs::write(dir.join("b.csv"), "1,10\n77,20\n").unwrap();
        fs::write(dir.join("c.csv"), "2,10\noops\n").unwrap();
        fs::write(dir.join("d.csv"), "").unwrap();

        let network = RoadNetwork::from_geojson_str(NETWORK, "g_id").unwrap();
        let (counts, report) = count_directory(&network, &TraceDirectory::new(&dir, "csv"));

        assert_eq!(counts.get(1), Some(2));
        assert_eq!(counts.get(2), Some(1));
        assert_eq!(counts.total(), 3);
        assert_eq!(report.processed, 2);

        let kinds: Vec<(&str, ErrorKind)> = report
            .skipped
            .iter()
            .map(|s| (s.trace_id.as_str(), s.kind))
            .collect();
        assert_eq!(
            kinds,
            vec![("b", ErrorKind::DanglingReference), ("c", ErrorKind::MalformedInput)]
        );

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_pipeline_skips_malformed_file_and_continues() {
        let dir = scratch_dir("batch_pipeline");
        let raw = dir.join("raw");
        let work = dir.join("work");
        fs::create_dir_all(&raw).unwrap();

        let network_path = dir.join("network.geojson");
        fs::write(&network_path, NETWORK).unwrap();

        fs::write(raw.join("a.csv"), raw_trace("29A", None)).unwrap();
        fs::write(raw.join("b.csv"), raw_trace("29B", Some(1))).unwrap();
        fs::write(raw.join("c.csv"), raw_trace("29C", None)).unwrap();

        let run = run_pipeline(&network_path, &raw, &work, &PipelineConfig::default()).unwrap();

        // b fails during reduction and never reaches later stages
        assert_eq!(run.report.skipped.len(), 1);
        let skipped = &run.report.skipped[0];
        assert_eq!(skipped.trace_id, "b");
        assert_eq!(skipped.stage, Stage::Reduce);
        assert_eq!(skipped.kind, ErrorKind::MalformedInput);
        assert_eq!(run.report.processed, 8);

        assert!(work.join(ROUTES_DIR).join("a.csv").exists());
        assert!(!work.join(ROUTES_DIR).join("b.csv").exists());
        assert_eq!(
            fs::read_to_string(work.join(ROUTES_DIR).join("c.csv")).unwrap(),
            "1,1060\n"
        );

        assert_eq!(run.counts.get(1), Some(2));
        assert_eq!(run.counts.get(2), Some(0));

        let collected = fs::read_to_string(work.join(COLLECTED_ROUTES)).unwrap();
        assert_eq!(
            collected,
            "vehicle_id,edge_path,time_stamp\na,[1],[1060]\nc,[1],[1060]\n"
        );

        let annotated = RoadNetwork::from_geojson_str(
            &fs::read_to_string(work.join(ANNOTATED_NETWORK)).unwrap(),
            "g_id",
        )
        .unwrap();
        let edge = annotated.edge(1).unwrap();
        assert_eq!(edge.properties()["vehicle_count"], serde_json::json!(2));
        assert_eq!(edge.properties()["name"], serde_json::json!("north road"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_rerun_ignores_outputs_of_earlier_runs() {
        let dir = scratch_dir("batch_rerun");
        let raw = dir.join("raw");
        let work = dir.join("work");
        fs::create_dir_all(&raw).unwrap();

        let network_path = dir.join("network.geojson");
        fs::write(&network_path, NETWORK).unwrap();

        for name in ["a", "b", "c"] {
            fs::write(raw.join(format!("{name}.csv")), raw_trace(name, None)).unwrap();
        }
        let first = run_pipeline(&network_path, &raw, &work, &PipelineConfig::default()).unwrap();
        assert!(first.report.is_clean());
        assert_eq!(first.counts.get(1), Some(3));

        // b is now corrupted and c was withdrawn
        fs::write(raw.join("b.csv"), raw_trace("b", Some(1))).unwrap();
        fs::remove_file(raw.join("c.csv")).unwrap();

        let second = run_pipeline(&network_path, &raw, &work, &PipelineConfig::default()).unwrap();
        let skipped: Vec<(&str, Stage, ErrorKind)> = second
            .report
            .skipped
            .iter()
            .map(|s| (s.trace_id.as_str(), s.stage, s.kind))
            .collect();
        assert_eq!(skipped, vec![("b", Stage::Reduce, ErrorKind::MalformedInput)]);

        assert_eq!(second.counts.get(1), Some(1));
        for stale in ["b.csv", "c.csv"] {
            assert!(!work.join(REDUCED_DIR).join(stale).exists());
            assert!(!work.join(ROUTES_DIR).join(stale).exists());
        }
        assert_eq!(
            fs::read_to_string(work.join(COLLECTED_ROUTES)).unwrap(),
            "vehicle_id,edge_path,time_stamp\na,[1],[1060]\n"
        );

        fs::remove_dir_all(&dir).unwrap();
    }
}
