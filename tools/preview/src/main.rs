/// Preview tool: composes a layered noise terrain with the strata mixer,
/// optionally erodes it, and writes the normalized result as a grayscale PNG.
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use image::{GrayImage, Luma};
use strata_core::source::{OpenSimplexNoise, PerlinNoise, SimplexNoise};
use strata_core::{ErosionParams, FractalKind, FractalNoise, FractalParams, Grid, Mixer};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "preview", about = "Render a layered noise terrain to a grayscale PNG")]
struct Args {
    /// Output PNG path
    #[arg(short, long, default_value = "preview.png")]
    output: PathBuf,

    #[arg(long, default_value = "512")]
    width: usize,

    #[arg(long, default_value = "512")]
    height: usize,

    /// Seed for the noise layers and the erosion droplets
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Octaves for the fractal layers
    #[arg(long, default_value = "6")]
    octaves: u32,

    /// Base sampling frequency (noise units per cell)
    #[arg(long, default_value = "0.004")]
    frequency: f64,

    /// Snap the result to this many tiers (0 = no tiering)
    #[arg(long, default_value = "0")]
    tiers: u32,

    /// Droplet count for hydraulic erosion (0 = no erosion)
    #[arg(long, default_value = "0")]
    erosion_iterations: u32,

    /// JSON file with erosion parameters; missing fields use defaults
    #[arg(long)]
    erosion_config: Option<PathBuf>,

    /// Worker budget for the chunked pass (0 = compute on this thread only)
    #[arg(long, default_value = "0")]
    threads: usize,
}

// ── Pipeline ─────────────────────────────────────────────────────────────────

fn load_erosion_params(path: Option<&Path>) -> Result<ErosionParams> {
    let Some(path) = path else {
        return Ok(ErosionParams::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse erosion config {}", path.display()))
}

fn build_mixer(args: &Args) -> Result<Mixer> {
    let seed = args.seed as f64;
    let base = FractalParams::new(args.octaves);

    let mut mixer = Mixer::new(args.width, args.height, -0.2)
        .context("Cannot create mixer")?;

    // Rolling continents.
    mixer.add_layer(
        FractalNoise::new(PerlinNoise::new(seed), FractalKind::Sum, base),
        args.frequency,
    );

    // Ridges where the mask noise is low.
    mixer
        .combine_layer(
            FractalNoise::new(
                SimplexNoise::new(seed + 17.0),
                FractalKind::RidgedMultifractal { offset: 1.0 },
                base.with_persistence(0.55),
            ),
            args.frequency * 2.0,
        )
        .mask_source(OpenSimplexNoise::new(seed + 31.0).normalized(true), args.frequency);

    // Soft valleys.
    mixer
        .subtract_layer(
            FractalNoise::new(PerlinNoise::new(seed + 53.0), FractalKind::Billow, base),
            args.frequency * 4.0,
        )
        .scale(0.25)
        .shift(-0.1);

    if args.tiers > 0 {
        mixer.tier(args.tiers, 0.3);
    }

    if args.erosion_iterations > 0 {
        let params = load_erosion_params(args.erosion_config.as_deref())?;
        log::debug!("erosion params: {params:?}");
        mixer
            .attach_erosion_with(args.erosion_iterations, args.seed, params)
            .context("Cannot attach erosion")?;
    }

    Ok(mixer)
}

fn compute(mixer: &mut Mixer, threads: usize) -> Result<Grid> {
    if threads == 0 {
        return mixer.apply(true).context("Mixer pass failed");
    }
    if !mixer.apply_async(threads) {
        bail!("Mixer is already running a background pass");
    }
    loop {
        if let Some(grid) = mixer.try_get_result(true) {
            return Ok(grid);
        }
        thread::sleep(Duration::from_millis(5));
    }
}

fn write_png(grid: &Grid, path: &Path) -> Result<()> {
    let img = GrayImage::from_fn(grid.width as u32, grid.height as u32, |x, y| {
        let v = grid.get(y as usize, x as usize).clamp(0.0, 1.0);
        Luma([(v * 255.0).round() as u8])
    });
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    img.save(path)
        .with_context(|| format!("Write failed: {}", path.display()))
}

// ── Entry point ──────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    eprintln!(
        "[preview] {}x{} seed={} octaves={} erosion={}",
        args.width, args.height, args.seed, args.octaves, args.erosion_iterations
    );

    let mut mixer = build_mixer(&args)?;
    let started = Instant::now();
    let grid = compute(&mut mixer, args.threads)?;
    eprintln!(
        "[preview] computed in {:.2?} (range {:.3}..{:.3})",
        started.elapsed(),
        grid.min_value(),
        grid.max_value()
    );

    write_png(&grid, &args.output)?;
    eprintln!("[preview] wrote {}", args.output.display());
    Ok(())
}
