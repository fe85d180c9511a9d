// img2stl - Turn an image into a printable relief mesh
//
// Modes:
//   mask    non-zero pixels are raised, the rest is base
//   gray    height follows the gray value
//   cutout  background removal (U^2-Net), then the gray path
//   photo   quantize to N colors, one height tier per color
//
// Defaults come from RELIEF_* environment variables; flags override them.
//
// Usage: cargo run --bin img2stl -- photo <image> --colors 4 --out relief.json

mod ai;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use relief_engine::color::parse_palette;
use relief_engine::pipeline;
use relief_engine::{CancelToken, MaskRaster, ReliefConfig, Rgb, RgbRaster};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "img2stl", about = "Convert images into relief meshes")]
struct Cli {
    #[command(subcommand)]
    mode: Mode,

    #[command(flatten)]
    shape: ShapeArgs,

    /// Output JSON path
    #[arg(short, long, global = true, default_value = "relief.json")]
    out: PathBuf,

    /// Abort if the pipeline runs longer than this many seconds
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Mode {
    Mask { image: PathBuf },
    Gray { image: PathBuf },
    Cutout {
        image: PathBuf,
        /// ONNX background-removal model
        #[arg(long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/models/u2net.onnx"))]
        model: PathBuf,
    },
    Photo {
        image: PathBuf,
        /// Number of colors to cluster into
        #[arg(short, long)]
        colors: Option<usize>,
        /// Target palette as hex colors, e.g. 1a1a2e,e94560,f5f5dc
        #[arg(long, value_delimiter = ',')]
        palette: Vec<String>,
        /// Keep the cluster colors instead of remapping to --palette
        #[arg(long)]
        no_remap: bool,
        /// Lightest color gets the lowest tier
        #[arg(long)]
        reverse: bool,
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Args)]
struct ShapeArgs {
    #[arg(long, global = true)]
    width: Option<f32>,
    #[arg(long, global = true)]
    height: Option<f32>,
    #[arg(long, global = true)]
    base_height: Option<f32>,
    #[arg(long, global = true)]
    image_height: Option<f32>,
    #[arg(long, global = true)]
    bend: Option<f32>,
    /// Fraction of faces to remove, in [0, 1)
    #[arg(long, global = true)]
    reduction: Option<f32>,
    /// Grid scale before meshing, e.g. 0.5 halves both axes
    #[arg(long, global = true)]
    resolution: Option<f32>,
    /// Keep every 2^N-th grid sample
    #[arg(long, global = true)]
    simplification_level: Option<u32>,
}

impl ShapeArgs {
    fn apply(&self, config: &mut ReliefConfig) {
        let overrides = [
            (self.width, &mut config.object_width),
            (self.height, &mut config.object_height),
            (self.base_height, &mut config.base_height),
            (self.image_height, &mut config.image_height),
            (self.bend, &mut config.bend_factor),
            (self.reduction, &mut config.target_reduction),
            (self.resolution, &mut config.resolution),
        ];
        for (value, slot) in overrides {
            if let Some(v) = value {
                *slot = v;
            }
        }
        if let Some(level) = self.simplification_level {
            config.simplification_level = level;
        }
    }
}

fn load_rgb(path: &PathBuf) -> anyhow::Result<RgbRaster> {
    let img = image::open(path).with_context(|| format!("opening {}", path.display()))?.to_rgb8();
    let (w, h) = img.dimensions();
    let pixels = img.pixels().map(|p| Rgb::new(p[0], p[1], p[2])).collect();
    Ok(RgbRaster::new(w as usize, h as usize, pixels)?)
}

fn load_gray(path: &PathBuf) -> anyhow::Result<MaskRaster> {
    let img = image::open(path).with_context(|| format!("opening {}", path.display()))?.to_luma8();
    let (w, h) = img.dimensions();
    Ok(MaskRaster::new(w as usize, h as usize, img.into_raw())?)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = ReliefConfig::from_env().context("reading RELIEF_* environment")?;
    cli.shape.apply(&mut config);

    let cancel = match cli.timeout {
        Some(secs) => CancelToken::with_deadline(Duration::from_secs(secs)),
        None => CancelToken::new(),
    };

    let (mesh, palette) = match &cli.mode {
        Mode::Mask { image } => {
            println!("Processing {} as mask...", image.display());
            let mask = load_gray(image)?;
            (pipeline::relief_from_mask(&mask, &config, &cancel)?, Vec::new())
        }
        Mode::Gray { image } => {
            println!("Processing {} as heightmap...", image.display());
            let gray = load_gray(image)?;
            (pipeline::relief_from_grayscale(&gray, &config, &cancel)?, Vec::new())
        }
        Mode::Cutout { image, model } => {
            println!("Processing {} with background removal...", image.display());
            let photo = load_rgb(image)?;
            println!("  Loading background model...");
            if !ai::init(model)? {
                println!("    Model not found, using plain grayscale");
            }
            (pipeline::relief_from_cutout(&photo, &ai::U2Net, &config, &cancel)?, Vec::new())
        }
        Mode::Photo { image, colors, palette, no_remap, reverse, seed } => {
            if let Some(k) = colors {
                config.cluster.k = *k;
            }
            if let Some(seed) = seed {
                config.cluster.seed = *seed;
            }
            config.remap_palette &= !no_remap;
            config.reverse_palette |= *reverse;

            println!("Processing {} ({} colors)...", image.display(), config.cluster.k);
            let photo = load_rgb(image)?;
            let target = if palette.is_empty() { None } else { Some(parse_palette(palette)?) };
            println!("  Quantizing and building mesh...");
            let relief = pipeline::relief_from_photo(&photo, target.as_deref(), &config, &cancel)?;
            (relief.mesh, relief.palette)
        }
    };

    if !palette.is_empty() {
        println!("  Palette: {}", palette.join(" "));
    }
    println!("  Mesh: {} vertices, {} faces", mesh.vertex_count(), mesh.face_count());

    let doc = output::ReliefDocument::new(&mesh, &palette);
    output::write_json(&cli.out, &doc)?;

    println!("Done! Wrote {}", cli.out.display());
    Ok(())
}
