//! Run the full batch pipeline over a generated set of trace files.
//!
//! Run with: cargo run --example batch_pipeline
//!
//! Writes a small road network and a directory of raw traces (one of them
//! corrupted) to a temporary directory, runs every stage and prints the
//! report.

use std::fs;
use std::time::Instant;

use trace_matcher::batch::{run_pipeline, ANNOTATED_NETWORK, COLLECTED_ROUTES};
use trace_matcher::PipelineConfig;

const NETWORK: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    { "type": "Feature", "properties": { "g_id": 10, "name": "QL1A south" },
      "geometry": { "type": "LineString", "coordinates": [[105.80, 20.90], [105.80, 21.00]] } },
    { "type": "Feature", "properties": { "g_id": 11, "name": "QL1A north" },
      "geometry": { "type": "LineString", "coordinates": [[105.80, 21.00], [105.80, 21.10]] } },
    { "type": "Feature", "properties": { "g_id": 20, "name": "QL5" },
      "geometry": { "type": "MultiLineString", "coordinates": [
        [[105.80, 21.00], [105.90, 21.00]],
        [[105.90, 21.00], [106.00, 21.00]]
      ] } }
  ]
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let root = std::env::temp_dir().join("trace_matcher_batch_demo");
    let _ = fs::remove_dir_all(&root);
    let raw = root.join("raw").join("2017-08-01");
    fs::create_dir_all(&raw)?;

    let network_path = root.join("network.geojson");
    fs::write(&network_path, NETWORK)?;

    // Northbound trucks on QL1A
    for v in 0..8 {
        let text = trace(v, |i| (20.91 + i * 0.02, 105.8004));
        fs::write(raw.join(format!("north_{v:02}.csv")), text)?;
    }
    // Eastbound trucks turning onto QL5
    for v in 0..4 {
        let text = trace(v, |i| (21.0003, 105.81 + i * 0.02));
        fs::write(raw.join(format!("east_{v:02}.csv")), text)?;
    }
    // Corrupted export
    fs::write(
        raw.join("broken.csv"),
        "id,plate,lat,lon,speed,heading,status,driver,time\n1,29C,??,105.8,0,0,0,x,0\n",
    )?;

    let work = root.join("work");
    let start = Instant::now();
    let run = run_pipeline(&network_path, &root.join("raw"), &work, &PipelineConfig::default())?;

    println!("Batch Pipeline Example\n");
    println!("Finished in {:?}\n", start.elapsed());
    print!("{}", run.report);

    println!("\nTraffic per edge:");
    for (edge_id, count) in run.counts.iter() {
        println!("  edge {edge_id}: {count} vehicles");
    }

    println!("\nOutputs:");
    println!("  {}", work.join(ANNOTATED_NETWORK).display());
    println!("  {}", work.join(COLLECTED_ROUTES).display());
    Ok(())
}

/// Ten samples a minute apart, positions given by `at(step)`.
fn trace(vehicle: i64, at: impl Fn(f64) -> (f64, f64)) -> String {
    let mut text = String::from("id,plate,lat,lon,speed,heading,status,driver,time\n");
    for step in 0..10 {
        let (lat, lon) = at(step as f64);
        let time = 1_501_545_600 + vehicle * 300 + step * 60;
        text.push_str(&format!("{step},29C{vehicle:03},{lat},{lon},45,0,1,x,{time}\n"));
    }
    text
}
