//! Scalar quality metrics for a grayscale scan.
//!
//! All accumulation is done in integers: intensities and Laplacian responses
//! are small integers, so their sums and sums of squares are exact. Only the
//! final divisions and the square root are floating point, which keeps the
//! output bit-identical across runs and platforms.

use crate::error::{MediqError, Result};
use crate::image_input::{decode_grayscale, load_grayscale};
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The four quality metrics of one image, each rounded to 2 decimals
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    /// Population mean of pixel intensities (0-255)
    #[serde(rename = "Brightness")]
    pub brightness: f64,
    /// Population standard deviation of pixel intensities
    #[serde(rename = "Contrast")]
    pub contrast: f64,
    /// Population variance of the 4-neighbour Laplacian response
    #[serde(rename = "Sharpness")]
    pub sharpness: f64,
    /// Brightness / Contrast, 0 for a flat image
    #[serde(rename = "SNR")]
    pub snr: f64,
}

/// Population mean and variance from exact integer sums
#[derive(Debug, Default)]
struct Moments {
    n: u64,
    sum: i128,
    sum_sq: i128,
}

impl Moments {
    fn push(&mut self, value: i64) {
        let v = value as i128;
        self.n += 1;
        self.sum += v;
        self.sum_sq += v * v;
    }

    fn mean(&self) -> f64 {
        self.sum as f64 / self.n as f64
    }

    /// Variance divided by N, not N-1
    fn variance(&self) -> f64 {
        let n = self.n as i128;
        // n * sum_sq - sum^2 is n^2 times the variance, and never negative
        let scaled = n * self.sum_sq - self.sum * self.sum;
        scaled as f64 / (n * n) as f64
    }
}

/// Round to 2 decimals, ties to even (numpy `round` semantics)
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Index into a row/column of length `len` with reflect-101 borders
/// (`gfedcb|abcdefgh|gfedcba`). Only offsets of one pixel are ever requested.
fn reflect_101(index: i64, len: i64) -> u32 {
    if len == 1 {
        return 0;
    }
    let reflected = if index < 0 {
        -index
    } else if index >= len {
        2 * len - 2 - index
    } else {
        index
    };
    reflected as u32
}

/// Response of the kernel `[[0,1,0],[1,-4,1],[0,1,0]]` at (x, y)
fn laplacian_at(image: &GrayImage, x: u32, y: u32) -> i64 {
    let (w, h) = (image.width() as i64, image.height() as i64);
    let (xi, yi) = (x as i64, y as i64);
    let px = |x: u32, y: u32| image.get_pixel(x, y)[0] as i64;

    let up = px(x, reflect_101(yi - 1, h));
    let down = px(x, reflect_101(yi + 1, h));
    let left = px(reflect_101(xi - 1, w), y);
    let right = px(reflect_101(xi + 1, w), y);

    up + down + left + right - 4 * px(x, y)
}

/// Compute the metric set for a decoded grayscale image
pub fn compute(image: &GrayImage) -> Result<MetricSet> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(MediqError::decode(
            "image",
            format!("empty pixel grid ({width}x{height})"),
        ));
    }

    let mut intensity = Moments::default();
    let mut laplacian = Moments::default();
    for (x, y, pixel) in image.enumerate_pixels() {
        intensity.push(pixel[0] as i64);
        laplacian.push(laplacian_at(image, x, y));
    }

    let brightness = intensity.mean();
    let contrast = intensity.variance().sqrt();
    let sharpness = laplacian.variance();
    let snr = if contrast != 0.0 {
        brightness / contrast
    } else {
        0.0
    };

    Ok(MetricSet {
        brightness: round2(brightness),
        contrast: round2(contrast),
        sharpness: round2(sharpness),
        snr: round2(snr),
    })
}

/// Decode an encoded image (PNG, JPEG, ...) and compute its metrics
pub fn compute_from_bytes(bytes: &[u8], source_name: &str) -> Result<MetricSet> {
    let image = decode_grayscale(bytes, source_name)?;
    compute(&image)
}

/// Load an image file and compute its metrics
pub fn compute_from_path(path: impl AsRef<Path>) -> Result<MetricSet> {
    let image = load_grayscale(path.as_ref())?;
    compute(&image)
}
