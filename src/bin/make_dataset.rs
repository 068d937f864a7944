//! make_dataset - author a data.yaml for a class-per-folder dataset root

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use yolo_workbench::DatasetDescriptor;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Dataset root whose immediate subfolders name the classes.
    #[arg(long)]
    root: PathBuf,
    /// Where to write data.yaml (defaults to the root itself).
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let descriptor = DatasetDescriptor::from_root(&args.root)
        .with_context(|| format!("describing dataset root {}", args.root.display()))?;
    let out_dir = args.out.as_ref().unwrap_or(&args.root);
    let path = descriptor.save(out_dir)?;

    println!("dataset descriptor written: {}", path.display());
    println!("  classes ({}):", descriptor.nc);
    for name in &descriptor.names {
        println!("    {}", name);
    }

    Ok(())
}
