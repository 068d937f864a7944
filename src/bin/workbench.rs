//! workbench - headless detection runner
//!
//! This runner:
//! 1. Loads workbench settings and a detection engine
//! 2. Opens one media source (path, camera:N, or URL)
//! 3. Runs the tick loop: pull frame, detect, accumulate
//! 4. Optionally writes annotated frames and a CSV export
//! 5. Prints a session summary on exit

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use yolo_workbench::{
    DatasetDescriptor, FramePipeline, InferenceEngine, MediaDescriptor, SessionAccumulator,
    WorkbenchConfig,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Weights descriptor: an .onnx path or a stub:// URL.
    #[arg(long)]
    weights: Option<String>,
    /// Media source: a path, camera:N, or a URL.
    #[arg(long)]
    source: String,
    /// Treat a folder source as a cyclic slideshow.
    #[arg(long, default_value_t = false)]
    slideshow: bool,
    /// Mirror streaming frames horizontally (cameras default to on).
    #[arg(long, overrides_with = "no_mirror")]
    mirror: bool,
    /// Disable mirroring.
    #[arg(long)]
    no_mirror: bool,
    /// Confidence threshold for kept boxes.
    #[arg(long)]
    conf: Option<f32>,
    /// IoU threshold for overlap suppression.
    #[arg(long)]
    iou: Option<f32>,
    /// Stop after this many processed frames (0 = until exhausted).
    #[arg(long, default_value_t = 0)]
    ticks: u64,
    /// Delay between ticks; defaults to the source's suggested interval.
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Class list from a data.yaml (required for .onnx weights).
    #[arg(long)]
    data: Option<PathBuf>,
    /// Write the session ledger here on exit.
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Write annotated frames into this directory as PNG.
    #[arg(long)]
    annotated_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = WorkbenchConfig::load()?;
    if let Some(weights) = args.weights.clone() {
        config.weights = weights;
    }
    if let Some(conf) = args.conf {
        config.confidence_threshold = conf;
    }
    if let Some(iou) = args.iou {
        config.iou_threshold = iou;
    }

    let descriptor: MediaDescriptor = args.source.parse()?;

    // Camera feeds preview better mirrored; files keep their pixels.
    let mirror = if args.no_mirror {
        false
    } else if args.mirror {
        true
    } else {
        config.mirror || matches!(descriptor, MediaDescriptor::Camera(_))
    };

    let class_names = match &args.data {
        Some(path) => {
            DatasetDescriptor::load(path)
                .with_context(|| format!("loading class list from {}", path.display()))?
                .names
        }
        None => Vec::new(),
    };

    let mut engine = InferenceEngine::load(config.engine_config(class_names))?;
    engine.warm_up()?;
    log::info!(
        "engine: backend={} device={} classes={}",
        engine.backend_name(),
        engine.device(),
        engine.classes().len()
    );

    let mut pipeline = FramePipeline::new();
    pipeline.set_confidence_threshold(config.confidence_threshold);
    pipeline.set_iou_threshold(config.iou_threshold);
    pipeline.set_mirror(mirror);

    if args.slideshow {
        let MediaDescriptor::Path(dir) = &descriptor else {
            bail!("--slideshow needs a folder path source");
        };
        pipeline.open_slideshow(dir, Some(config.slideshow_interval_ms))?;
    } else {
        pipeline.open(&descriptor)?;
    }

    if let Some(dir) = &args.annotated_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating {}", dir.display()))?;
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })
        .expect("error setting Ctrl-C handler");
    }

    let interval = Duration::from_millis(
        args.interval_ms
            .unwrap_or_else(|| pipeline.suggested_interval_ms()),
    );
    log::info!(
        "running: source={} interval={}ms ticks={}",
        pipeline.source_label().unwrap_or("<none>"),
        interval.as_millis(),
        args.ticks
    );

    let mut session = SessionAccumulator::new();
    let mut produced = 0u64;
    let mut boxes_total = 0u64;

    while running.load(Ordering::SeqCst) {
        let Some(result) = pipeline.tick(&mut engine) else {
            log::info!("source exhausted after {} tick(s)", pipeline.ticks());
            break;
        };
        produced += 1;
        boxes_total += result.boxes.len() as u64;

        let label = pipeline.source_label().unwrap_or("<closed>").to_string();
        session.append(&label, &result.boxes);

        if let Some(dir) = &args.annotated_dir {
            if let Some(annotated) = &result.annotated_frame {
                let path = dir.join(format!("frame_{:06}.png", produced));
                annotated.save_png(&path)?;
            }
        }

        if args.ticks != 0 && produced >= args.ticks {
            break;
        }
        if !interval.is_zero() {
            std::thread::sleep(interval);
        }
    }

    pipeline.close();

    println!("workbench summary:");
    println!("  source: {}", args.source);
    println!("  frames processed: {}", produced);
    println!("  degraded frames: {}", pipeline.degraded_frames());
    println!("  boxes detected: {}", boxes_total);
    println!("  records accumulated: {}", session.len());
    if let Some(path) = &args.csv {
        session
            .export_csv(path)
            .with_context(|| format!("exporting session to {}", path.display()))?;
        println!("  csv export: {}", path.display());
    }
    if let Some(dir) = &args.annotated_dir {
        println!("  annotated frames: {}", dir.display());
    }

    Ok(())
}
