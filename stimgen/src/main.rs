//! Stimulus image normalizer.
//!
//! Brings a folder of stimulus images to a common mean brightness and applies
//! a shared color tint, so no condition is brighter or more saturated than
//! another. Transparency is flattened over white first, matching the white
//! task background the images are shown on.
//!
//! Examples:
//!
//!   cargo run -p stimgen -- emoticons
//!   cargo run -p stimgen -- emoticons --out assets/emoticons --target-luminance 140
//!   cargo run -p stimgen -- shapes --tint 1.0,1.0,1.0

use image::{DynamicImage, Rgb, RgbImage};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{error, info};

const DEFAULT_TARGET_LUMINANCE: f32 = 120.0;
/// The yellow stimulus tint: lift red and green, cut blue.
const DEFAULT_TINT: [f32; 3] = [1.1, 1.1, 0.3];

fn usage() -> ! {
    eprintln!("stimgen: normalize stimulus images to a common brightness and tint");
    eprintln!();
    eprintln!("Usage: stimgen <input-dir> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --out <dir>               output directory (default: normalized)");
    eprintln!("  --target-luminance <0-255> mean luminance to scale toward (default: 120)");
    eprintln!("  --tint <r,g,b>            per-channel multipliers applied after scaling");
    eprintln!("                            (default: 1.1,1.1,0.3)");
    process::exit(2);
}

#[derive(Debug, Clone)]
struct ToolConfig {
    input: PathBuf,
    out_dir: PathBuf,
    target_luminance: f32,
    tint: [f32; 3],
}

fn parse_args() -> ToolConfig {
    let mut input: Option<PathBuf> = None;
    let mut out_dir = PathBuf::from("normalized");
    let mut target_luminance = DEFAULT_TARGET_LUMINANCE;
    let mut tint = DEFAULT_TINT;

    let mut args = env::args().skip(1);
    while let Some(a) = args.next() {
        match a.as_str() {
            "--out" => match args.next() {
                Some(v) => out_dir = PathBuf::from(v),
                None => usage(),
            },
            "--target-luminance" => match args.next().and_then(|v| v.parse::<f32>().ok()) {
                Some(v) if (0.0..=255.0).contains(&v) => target_luminance = v,
                _ => usage(),
            },
            "--tint" => match args.next().as_deref().and_then(parse_tint) {
                Some(v) => tint = v,
                None => usage(),
            },
            "--help" | "-h" => usage(),
            _ if input.is_none() && !a.starts_with('-') => input = Some(PathBuf::from(a)),
            _ => usage(),
        }
    }

    let Some(input) = input else { usage() };
    ToolConfig {
        input,
        out_dir,
        target_luminance,
        tint,
    }
}

fn parse_tint(raw: &str) -> Option<[f32; 3]> {
    let mut parts = raw.split(',');
    let mut tint = [0.0f32; 3];
    for slot in &mut tint {
        *slot = parts.next()?.trim().parse().ok()?;
        if !slot.is_finite() || *slot < 0.0 {
            return None;
        }
    }
    parts.next().is_none().then_some(tint)
}

/// Mean Rec.601 luminance over all pixels, in [0, 255].
fn mean_luminance(img: &RgbImage) -> f32 {
    let count = f64::from(img.width()) * f64::from(img.height());
    if count == 0.0 {
        return 0.0;
    }
    let mut sum = 0.0f64;
    for pixel in img.pixels() {
        let Rgb([r, g, b]) = *pixel;
        sum += 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    }
    (sum / count) as f32
}

/// Multiply every channel by its factor, saturating at the channel bounds.
fn scale_channels(img: &mut RgbImage, factors: [f32; 3]) {
    for pixel in img.pixels_mut() {
        for (value, factor) in pixel.0.iter_mut().zip(factors) {
            *value = (f32::from(*value) * factor).clamp(0.0, 255.0) as u8;
        }
    }
}

/// Alpha-blend onto a white background. Stimuli are presented on a white
/// screen, so transparent input regions must read as white, not black.
fn flatten_over_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let image::Rgba([r, g, b, a]) = *pixel;
        let alpha = f32::from(a) / 255.0;
        let blend =
            |c: u8| (f32::from(c) * alpha + 255.0 * (1.0 - alpha)).round().clamp(0.0, 255.0) as u8;
        out.put_pixel(x, y, Rgb([blend(r), blend(g), blend(b)]));
    }
    out
}

fn is_image_file(path: &Path) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    matches!(ext.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg")
}

fn collect_inputs(dir: &Path) -> Result<Vec<PathBuf>, String> {
    let entries = fs::read_dir(dir).map_err(|e| format!("{}: {e}", dir.display()))?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_image_file(path))
        .collect();
    files.sort();
    Ok(files)
}

fn normalize_file(path: &Path, cfg: &ToolConfig) -> Result<(), String> {
    let img = image::open(path).map_err(|e| format!("{}: {e}", path.display()))?;
    let mut rgb = flatten_over_white(&img);

    let before = mean_luminance(&rgb);
    // A black image has nothing to scale; it passes through to the tint.
    if before > 0.0 {
        scale_channels(&mut rgb, [cfg.target_luminance / before; 3]);
    }
    scale_channels(&mut rgb, cfg.tint);
    let after = mean_luminance(&rgb);

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("stimulus");
    let out = cfg.out_dir.join(format!("{stem}.png"));
    rgb.save(&out).map_err(|e| format!("{}: {e}", out.display()))?;
    info!(
        "{} -> {} (luminance {:.1} -> {:.1})",
        path.display(),
        out.display(),
        before,
        after
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt::init();

    let cfg = parse_args();
    if let Err(e) = fs::create_dir_all(&cfg.out_dir) {
        error!("Cannot create {}: {e}", cfg.out_dir.display());
        process::exit(1);
    }

    let files = match collect_inputs(&cfg.input) {
        Ok(files) => files,
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    };
    if files.is_empty() {
        error!("No images found in {}", cfg.input.display());
        process::exit(1);
    }

    let mut failed = 0usize;
    for path in &files {
        if let Err(e) = normalize_file(path, &cfg) {
            error!("{e}");
            failed += 1;
        }
    }

    info!(
        "Normalized {} of {} image(s) into {}",
        files.len() - failed,
        files.len(),
        cfg.out_dir.display()
    );
    if failed > 0 {
        process::exit(1);
    }
}
