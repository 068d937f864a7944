//! demo - end-to-end synthetic run for the YOLO workbench

use anyhow::{bail, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

use yolo_workbench::{
    EngineConfig, FramePipeline, InferenceEngine, MediaDescriptor, SessionAccumulator,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of synthetic frames to process.
    #[arg(long, default_value_t = 25)]
    frames: u64,
    /// Confidence threshold for kept boxes.
    #[arg(long, default_value_t = 0.25)]
    conf: f32,
    /// Output directory for demo artifacts.
    #[arg(long, default_value = "demo_out")]
    out: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let out_dir = PathBuf::from(&args.out);
    fs::create_dir_all(&out_dir)?;

    stage("load stub engine");
    let mut engine = InferenceEngine::load(EngineConfig::default())?;
    engine.warm_up()?;

    stage("open synthetic stream");
    let mut pipeline = FramePipeline::new();
    pipeline.set_confidence_threshold(args.conf);
    pipeline.open(&MediaDescriptor::Url("stub://demo".to_string()))?;

    stage("run detection ticks");
    let mut session = SessionAccumulator::new();
    let mut boxes_total = 0u64;
    let mut last_annotated = None;
    for _ in 0..args.frames {
        let Some(result) = pipeline.tick(&mut engine) else {
            break;
        };
        boxes_total += result.boxes.len() as u64;
        let label = pipeline.source_label().unwrap_or("stub://demo").to_string();
        session.append(&label, &result.boxes);
        if result.annotated_frame.is_some() {
            last_annotated = result.annotated_frame;
        }
    }

    stage("write artifacts");
    let annotated_path = out_dir.join("annotated.png");
    match &last_annotated {
        Some(frame) => frame.save_png(&annotated_path)?,
        None => bail!("no annotated frame produced"),
    }
    let csv_path = out_dir.join("session.csv");
    session.export_csv(&csv_path)?;

    println!("demo summary:");
    println!("  frames processed: {}", pipeline.ticks());
    println!("  boxes detected: {}", boxes_total);
    println!("  records accumulated: {}", session.len());
    println!("  backend: {}", engine.backend_name());
    println!("  annotated frame: {}", annotated_path.display());
    println!("  csv export: {}", csv_path.display());
    println!("next steps:");
    println!("  cargo run --bin workbench -- --source stub://cam --ticks 100 --csv session.csv");
    println!("  cargo run --bin workbench -- --source photos/ --slideshow");
    println!("  cargo run --bin make_dataset -- --root datasets/my_set");

    Ok(())
}

fn stage(msg: &str) {
    eprintln!("demo: {}", msg);
}
