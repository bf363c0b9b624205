//! CLI application for dense LBP descriptor extraction.
//!
//! Usage:
//!   lbp-describe <image>                          # CSV vector on stdout
//!   lbp-describe <image> --json                   # JSON report
//!   lbp-describe <image> --region 16,16,64,64 -o features.csv
//!   lbp-describe <image> --mean mean.txt --std std.txt

use clap::Parser;
use lbp_face::{Descriptor, DescriptorConfig, GrayImage, PatternClassifier, Region};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "lbp-describe")]
#[command(author, version, about = "Dense uniform LBP descriptors", long_about = None)]
struct Args {
    /// Input image file
    #[arg(required = true)]
    image: PathBuf,

    /// JSON settings file; flags given on the command line take precedence
    #[arg(long)]
    config: Option<PathBuf>,

    /// Cell side in pixels
    #[arg(long)]
    cell_size: Option<usize>,

    /// Use the transposed pattern orientation
    #[arg(long)]
    transposed: bool,

    /// Describe only this region, as x,y,width,height
    #[arg(long)]
    region: Option<Region>,

    /// Mean statistics for standardization, one value per line
    #[arg(long, requires = "std")]
    mean: Option<PathBuf>,

    /// Standard deviation statistics for standardization, one value per line
    #[arg(long, requires = "mean")]
    std: Option<PathBuf>,

    /// Output as JSON
    #[arg(short, long)]
    json: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Output structure for JSON serialization
#[derive(Serialize)]
struct Output {
    image: String,
    width: usize,
    height: usize,
    region: Option<Region>,
    cell_size: usize,
    transposed: bool,
    classes: usize,
    cols: usize,
    rows: usize,
    standardized: bool,
    features: Vec<f32>,
}

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn resolve_config(args: &Args) -> lbp_face::Result<DescriptorConfig> {
    let mut config = match &args.config {
        Some(path) => {
            debug!("Loading settings from {:?}", path);
            DescriptorConfig::load(path)?
        }
        None => DescriptorConfig::default(),
    };

    if let Some(cell_size) = args.cell_size {
        config.cell_size = cell_size;
    }
    if args.transposed {
        config.transposed = true;
    }
    if args.region.is_some() {
        config.region = args.region;
    }
    if args.mean.is_some() {
        config.mean = args.mean.clone();
        config.std = args.std.clone();
    }
    config.validate()?;
    Ok(config)
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    let mapper = config.mapper();
    let standardizer = config.standardizer()?;

    info!("Loading image {:?}", args.image);
    let img = image::open(&args.image)?;
    let gray = GrayImage::from_luma(&img.to_luma8());

    let full = gray.view();
    let view = match &config.region {
        Some(region) => full.region(region)?,
        None => full,
    };

    debug!(
        "Describing {}x{} pixels with {}x{} cells",
        view.width(),
        view.height(),
        config.cell_size,
        config.cell_size
    );
    let mut descriptor = Descriptor::compute(&mapper, &view, config.cell_size)?;
    let grid = descriptor.grid();
    info!(
        "Extracted {} features ({} classes x {} cols x {} rows)",
        descriptor.len(),
        mapper.class_count(),
        grid.cols,
        grid.rows
    );

    if let Some(stats) = &standardizer {
        stats.apply(descriptor.as_mut_slice())?;
        debug!("Applied standardization over {} dimensions", stats.len());
    }

    let output_str = if args.json {
        let output = Output {
            image: args.image.display().to_string(),
            width: gray.width(),
            height: gray.height(),
            region: config.region,
            cell_size: config.cell_size,
            transposed: config.transposed,
            classes: grid.classes,
            cols: grid.cols,
            rows: grid.rows,
            standardized: standardizer.is_some(),
            features: descriptor.into_vec(),
        };
        serde_json::to_string_pretty(&output)?
    } else {
        let mut buf = Vec::new();
        lbp_face::write_csv(&mut buf, descriptor.as_slice())?;
        String::from_utf8(buf)?
    };

    // Write output
    if let Some(ref path) = args.output {
        std::fs::write(path, &output_str)?;
        info!("Output written to {:?}", path);
    } else {
        println!("{}", output_str);
    }

    Ok(())
}
