//! Pixel metric engine.
//!
//! Pure function over two encoded image byte streams. Produces a normalized
//! difference score in [0, 1] (higher = more different) plus two PNG
//! artifacts: a red-channel difference heatmap and a 40% heatmap-over-baseline
//! overlay. Identical inputs yield identical scores and byte-identical
//! artifacts.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{ImageFormat, Rgb, RgbImage};

use crate::error::{CoreError, CoreResult};
use crate::scoring::{clamp01, round4};

/// Weight of the SSIM-derived difference in the blended score.
const SSIM_WEIGHT: f64 = 0.65;
/// Weight of the histogram distance in the blended score.
const HIST_WEIGHT: f64 = 0.35;
/// Histogram bins per channel.
const HIST_BINS: usize = 64;
/// Overlay blend factor (heatmap over baseline).
const OVERLAY_ALPHA: f64 = 0.40;

// SSIM stabilizers: (0.01)^2 and (0.03)^2 on the unit dynamic range.
const SSIM_C1: f64 = 1.0e-4;
const SSIM_C2: f64 = 9.0e-4;

/// Result of a pixel comparison: the score and the encoded artifacts.
#[derive(Debug, Clone)]
pub struct PixelComparison {
    pub pixel_diff_score: f64,
    pub heatmap_png: Vec<u8>,
    pub overlay_png: Vec<u8>,
}

/// Compare two encoded images.
///
/// The candidate is resized to the baseline's dimensions when they differ.
/// Decode or encode failures surface as [`CoreError::ComparePipeline`] — the
/// pixel signal is the one compare signal whose loss is fatal.
pub fn compare_images(baseline_bytes: &[u8], candidate_bytes: &[u8]) -> CoreResult<PixelComparison> {
    let baseline = decode_rgb(baseline_bytes, "baseline")?;
    let mut candidate = decode_rgb(candidate_bytes, "candidate")?;

    if candidate.dimensions() != baseline.dimensions() {
        candidate = image::imageops::resize(
            &candidate,
            baseline.width(),
            baseline.height(),
            FilterType::Lanczos3,
        );
    }

    let width = baseline.width() as usize;
    let height = baseline.height() as usize;
    let pixel_count = width * height;

    // Per-pixel mean absolute channel difference on the unit range, plus
    // grayscale planes for SSIM.
    let mut diff_map = vec![0.0f64; pixel_count];
    let mut gray_baseline = vec![0.0f64; pixel_count];
    let mut gray_candidate = vec![0.0f64; pixel_count];

    for (index, (bp, cp)) in baseline.pixels().zip(candidate.pixels()).enumerate() {
        let mut channel_diff = 0.0f64;
        let mut b_sum = 0.0f64;
        let mut c_sum = 0.0f64;
        for channel in 0..3 {
            let b = bp.0[channel] as f64 / 255.0;
            let c = cp.0[channel] as f64 / 255.0;
            channel_diff += (b - c).abs();
            b_sum += b;
            c_sum += c;
        }
        diff_map[index] = channel_diff / 3.0;
        gray_baseline[index] = b_sum / 3.0;
        gray_candidate[index] = c_sum / 3.0;
    }

    let ssim_diff = clamp01(1.0 - global_ssim(&gray_baseline, &gray_candidate));
    let hist_distance = histogram_distance(&baseline, &candidate);
    let pixel_diff_score = clamp01(SSIM_WEIGHT * ssim_diff + HIST_WEIGHT * hist_distance);

    let heatmap = render_heatmap(&diff_map, baseline.width(), baseline.height());
    let overlay = blend(&baseline, &heatmap, OVERLAY_ALPHA);

    Ok(PixelComparison {
        pixel_diff_score: round4(pixel_diff_score),
        heatmap_png: encode_png(&heatmap)?,
        overlay_png: encode_png(&overlay)?,
    })
}

fn decode_rgb(bytes: &[u8], which: &str) -> CoreResult<RgbImage> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgb8())
        .map_err(|e| CoreError::ComparePipeline(format!("Failed to decode {which} image: {e}")))
}

/// Single-window SSIM over the full grayscale planes.
fn global_ssim(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    if n == 0.0 {
        return 1.0;
    }

    let mu_x: f64 = x.iter().sum::<f64>() / n;
    let mu_y: f64 = y.iter().sum::<f64>() / n;

    let sigma_x: f64 = x.iter().map(|v| (v - mu_x).powi(2)).sum::<f64>() / n;
    let sigma_y: f64 = y.iter().map(|v| (v - mu_y).powi(2)).sum::<f64>() / n;
    let sigma_xy: f64 = x
        .iter()
        .zip(y)
        .map(|(a, b)| (a - mu_x) * (b - mu_y))
        .sum::<f64>()
        / n;

    let numerator = (2.0 * mu_x * mu_y + SSIM_C1) * (2.0 * sigma_xy + SSIM_C2);
    let denominator = (mu_x * mu_x + mu_y * mu_y + SSIM_C1) * (sigma_x + sigma_y + SSIM_C2);

    if denominator == 0.0 {
        return 1.0;
    }
    clamp01(numerator / denominator)
}

/// Mean per-channel L1 distance between normalized 64-bin histograms.
fn histogram_distance(baseline: &RgbImage, candidate: &RgbImage) -> f64 {
    let mut total = 0.0f64;
    for channel in 0..3 {
        let hist_b = channel_histogram(baseline, channel);
        let hist_c = channel_histogram(candidate, channel);
        let distance: f64 = hist_b
            .iter()
            .zip(&hist_c)
            .map(|(a, b)| (a - b).abs())
            .sum::<f64>()
            * 0.5;
        total += clamp01(distance);
    }
    clamp01(total / 3.0)
}

fn channel_histogram(img: &RgbImage, channel: usize) -> Vec<f64> {
    let mut counts = vec![0u64; HIST_BINS];
    for pixel in img.pixels() {
        let value = pixel.0[channel] as usize;
        let bin = (value * HIST_BINS / 256).min(HIST_BINS - 1);
        counts[bin] += 1;
    }
    let total = ((img.width() as u64) * (img.height() as u64)).max(1) as f64;
    counts.into_iter().map(|c| c as f64 / total).collect()
}

/// Red-channel heatmap of the difference map.
fn render_heatmap(diff_map: &[f64], width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let diff = clamp01(diff_map[(y as usize) * (width as usize) + x as usize]);
        let red = (diff * 255.0).round() as u8;
        let blue = ((1.0 - diff) * 70.0).round() as u8;
        Rgb([red, 0, blue])
    })
}

/// Alpha blend `top` over `base` (`alpha` = share of `top`).
fn blend(base: &RgbImage, top: &RgbImage, alpha: f64) -> RgbImage {
    RgbImage::from_fn(base.width(), base.height(), |x, y| {
        let b = base.get_pixel(x, y).0;
        let t = top.get_pixel(x, y).0;
        let mut out = [0u8; 3];
        for channel in 0..3 {
            let mixed = b[channel] as f64 * (1.0 - alpha) + t[channel] as f64 * alpha;
            out[channel] = mixed.round().clamp(0.0, 255.0) as u8;
        }
        Rgb(out)
    })
}

fn encode_png(img: &RgbImage) -> CoreResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| CoreError::ComparePipeline(format!("Failed to encode artifact: {e}")))?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(rgb));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    fn gradient_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 11 % 256) as u8, ((x + y) * 3 % 256) as u8])
        });
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn identical_images_score_zero() {
        let png = gradient_png(16, 16);
        let result = compare_images(&png, &png).unwrap();
        assert!(result.pixel_diff_score <= 0.05, "got {}", result.pixel_diff_score);
    }

    #[test]
    fn identical_inputs_give_byte_identical_artifacts() {
        let png = gradient_png(16, 16);
        let a = compare_images(&png, &png).unwrap();
        let b = compare_images(&png, &png).unwrap();
        assert_eq!(a.pixel_diff_score, b.pixel_diff_score);
        assert_eq!(a.heatmap_png, b.heatmap_png);
        assert_eq!(a.overlay_png, b.overlay_png);
    }

    #[test]
    fn opposite_images_score_high() {
        let white = solid_png(16, 16, [255, 255, 255]);
        let black = solid_png(16, 16, [0, 0, 0]);
        let result = compare_images(&white, &black).unwrap();
        assert!(result.pixel_diff_score > 0.9, "got {}", result.pixel_diff_score);
    }

    #[test]
    fn mismatched_dimensions_are_resized() {
        let a = gradient_png(16, 16);
        let b = gradient_png(32, 32);
        let result = compare_images(&a, &b).unwrap();
        assert!((0.0..=1.0).contains(&result.pixel_diff_score));
    }

    #[test]
    fn artifacts_decode_to_baseline_dimensions() {
        let a = gradient_png(16, 12);
        let b = solid_png(8, 8, [10, 20, 30]);
        let result = compare_images(&a, &b).unwrap();
        let heatmap = image::load_from_memory(&result.heatmap_png).unwrap();
        assert_eq!((heatmap.width(), heatmap.height()), (16, 12));
        let overlay = image::load_from_memory(&result.overlay_png).unwrap();
        assert_eq!((overlay.width(), overlay.height()), (16, 12));
    }

    #[test]
    fn undecodable_input_is_a_pipeline_error() {
        let png = gradient_png(8, 8);
        let err = compare_images(b"not an image", &png).unwrap_err();
        assert_eq!(err.code(), "COMPARE_PIPELINE_FAILED");
        let err = compare_images(&png, &[]).unwrap_err();
        assert_eq!(err.code(), "COMPARE_PIPELINE_FAILED");
    }

    #[test]
    fn score_is_rounded_to_four_places() {
        let a = gradient_png(16, 16);
        let b = solid_png(16, 16, [128, 64, 32]);
        let score = compare_images(&a, &b).unwrap().pixel_diff_score;
        assert_eq!(score, round4(score));
    }
}
