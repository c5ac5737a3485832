//! Command-line driver for batch trace matching.
//!
//! Set `RUST_LOG=info` to see stage progress and skipped files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use log::info;

use trace_matcher::batch::{
    collect_directory, count_directory, match_directory, reduce_directory, run_pipeline,
    ANNOTATED_NETWORK, COLLECTED_ROUTES,
};
use trace_matcher::{
    BatchReport, MapMatcher, NetworkIndex, PipelineConfig, RoadNetwork, TraceDirectory,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Map-match GPS traces and count traffic per road edge",
    long_about = None
)]
struct Cli {
    /// TOML configuration file. Omitted fields keep their defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Corridor radius around each trace segment, in degrees.
    #[arg(long, global = true)]
    buffer_tolerance: Option<f64>,

    /// Route entries an edge must be absent from before it is appended again.
    #[arg(long, global = true)]
    return_journey_window: Option<usize>,

    /// Minimum per-axis movement (degrees) for a sample to count as moving.
    #[arg(long, global = true)]
    stillness_threshold: Option<f64>,

    /// Minimum per-axis distance (degrees) between emitted samples.
    #[arg(long, global = true)]
    sampling_threshold: Option<f64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Reduce raw traces into sparse movement samples
    Reduce {
        /// Directory of raw trace files
        raw: PathBuf,
        /// Output directory for reduced traces
        out: PathBuf,
    },
    /// Match reduced traces onto the road network
    Match {
        /// GeoJSON road network
        network: PathBuf,
        /// Directory of reduced traces
        reduced: PathBuf,
        /// Output directory for per-trace route files
        routes: PathBuf,
    },
    /// Count vehicle passes per edge and write the annotated network
    Count {
        /// GeoJSON road network
        network: PathBuf,
        /// Directory of route files
        routes: PathBuf,
        /// Annotated GeoJSON output
        out: PathBuf,
    },
    /// Consolidate route files into one CSV dataset
    Collect {
        /// Directory of route files
        routes: PathBuf,
        /// CSV output
        out: PathBuf,
    },
    /// Run every stage end to end
    Run {
        /// GeoJSON road network
        network: PathBuf,
        /// Directory of raw trace files
        raw: PathBuf,
        /// Work directory receiving all outputs
        workdir: PathBuf,
    },
}

impl Cli {
    fn pipeline_config(&self) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_toml_file(path)?,
            None => PipelineConfig::default(),
        };

        if let Some(value) = self.buffer_tolerance {
            config.matching.buffer_tolerance = value;
        }
        if let Some(value) = self.return_journey_window {
            config.matching.return_journey_window = value;
        }
        if let Some(value) = self.stillness_threshold {
            config.reduce.stillness_threshold = value;
        }
        if let Some(value) = self.sampling_threshold {
            config.reduce.sampling_threshold = value;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(&cli) {
        Ok(report) => {
            print!("{report}");
            if report.is_clean() {
                ExitCode::SUCCESS
            } else {
                // completed, but some files were skipped
                ExitCode::from(2)
            }
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<BatchReport, Box<dyn std::error::Error>> {
    let config = cli.pipeline_config()?;
    let extension = config.raw_format.extension.as_str();

    let report = match &cli.command {
        Command::Reduce { raw, out } => reduce_directory(
            &TraceDirectory::new(raw, extension),
            out,
            &config.raw_format,
            &config.reduce,
        ),
        Command::Match { network, reduced, routes } => {
            let network = RoadNetwork::load(network, &config.network)?;
            let index = NetworkIndex::build(&network)?;
            let matcher = MapMatcher::new(&network, &index, &config.matching);
            match_directory(&matcher, &TraceDirectory::new(reduced, extension), routes)
        }
        Command::Count { network, routes, out } => {
            let network = RoadNetwork::load(network, &config.network)?;
            let (counts, report) =
                count_directory(&network, &TraceDirectory::new(routes, extension));
            network.write_annotated(&counts, out, &config.network)?;
            info!("Wrote {} edge counts to {}", counts.len(), out.display());
            report
        }
        Command::Collect { routes, out } => {
            collect_directory(&TraceDirectory::new(routes, extension), out)?
        }
        Command::Run { network, raw, workdir } => {
            let run = run_pipeline(network, raw, workdir, &config)?;
            print_outputs(workdir);
            run.report
        }
    };

    Ok(report)
}

fn print_outputs(workdir: &Path) {
    println!("annotated network: {}", workdir.join(ANNOTATED_NETWORK).display());
    println!("route dataset: {}", workdir.join(COLLECTED_ROUTES).display());
}
