//! Drawing comparison against a reference silhouette.
//!
//! Both images are flattened onto white, scaled to 256x256 and thresholded.
//! The largest 8-connected blob of each is reduced to its seven Hu moment
//! invariants, and the two moment vectors are compared on a log scale.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma};

pub const SIDE: u32 = 256;
pub const THRESHOLD: u8 = 127;
const MOMENT_EPS: f64 = 1e-5;

#[derive(Debug, thiserror::Error)]
pub enum ShapeError
{
    #[error("image data is not a base64 data URL")]
    InvalidDataUrl,

    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("could not decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("reference image {path} unavailable: {source}")]
    Reference
    {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Returns the raw bytes behind `data:<mime>;base64,<payload>`. A bare
/// base64 payload is accepted too.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>, ShapeError>
{
    let payload = match url.split_once(',') {
        Some((header, payload)) => {
            if !header.starts_with("data:") || !header.ends_with(";base64") {
                return Err(ShapeError::InvalidDataUrl);
            }
            payload
        }
        None => url,
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(ShapeError::InvalidDataUrl);
    }
    Ok(STANDARD.decode(payload)?)
}

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, ShapeError>
{
    Ok(image::load_from_memory(bytes)?)
}

pub fn load_reference(path: &Path) -> Result<DynamicImage, ShapeError>
{
    image::open(path).map_err(|source| ShapeError::Reference {
        path: path.to_path_buf(),
        source,
    })
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ShapeError>
{
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)?;
    Ok(bytes)
}

/// Grayscale with transparent pixels treated as white paper.
fn flatten(image: &DynamicImage) -> GrayImage
{
    let rgba = image.to_rgba8();
    let mut gray = GrayImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let [r, g, b, a] = pixel.0;
        let luma = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
        let alpha = a as f64 / 255.0;
        let value = luma * alpha + 255.0 * (1.0 - alpha);
        gray.put_pixel(x, y, Luma([value.round() as u8]));
    }
    gray
}

/// Foreground mask: dark ink on light paper, after resizing.
pub fn binarize(image: &DynamicImage) -> Vec<bool>
{
    let gray = flatten(image);
    let resized = imageops::resize(&gray, SIDE, SIDE, FilterType::Triangle);
    resized.pixels().map(|pixel| pixel.0[0] <= THRESHOLD).collect()
}

/// Pixel indices of the largest 8-connected foreground region.
pub fn largest_component(mask: &[bool], width: usize, height: usize) -> Vec<usize>
{
    let mut seen = vec![false; mask.len()];
    let mut best: Vec<usize> = Vec::new();
    let mut stack = Vec::new();

    for start in 0..mask.len() {
        if !mask[start] || seen[start] {
            continue;
        }
        let mut region = Vec::new();
        seen[start] = true;
        stack.push(start);
        while let Some(index) = stack.pop() {
            region.push(index);
            let (x, y) = ((index % width) as isize, (index / width) as isize);
            for dy in -1..=1isize {
                for dx in -1..=1isize {
                    let (nx, ny) = (x + dx, y + dy);
                    if nx < 0 || ny < 0 || nx >= width as isize || ny >= height as isize {
                        continue;
                    }
                    let next = ny as usize * width + nx as usize;
                    if mask[next] && !seen[next] {
                        seen[next] = true;
                        stack.push(next);
                    }
                }
            }
        }
        if region.len() > best.len() {
            best = region;
        }
    }
    best
}

pub fn hu_moments(region: &[usize], width: usize) -> Option<[f64; 7]>
{
    if region.is_empty() {
        return None;
    }
    let coords: Vec<(f64, f64)> = region
        .iter()
        .map(|index| ((index % width) as f64, (index / width) as f64))
        .collect();

    let m00 = coords.len() as f64;
    let cx = coords.iter().map(|(x, _)| x).sum::<f64>() / m00;
    let cy = coords.iter().map(|(_, y)| y).sum::<f64>() / m00;

    let central = |p: i32, q: i32| -> f64 {
        coords
            .iter()
            .map(|(x, y)| (x - cx).powi(p) * (y - cy).powi(q))
            .sum()
    };
    let normalized = |p: i32, q: i32| -> f64 {
        let exponent = 1.0 + (p + q) as f64 / 2.0;
        central(p, q) / m00.powf(exponent)
    };

    let n20 = normalized(2, 0);
    let n02 = normalized(0, 2);
    let n11 = normalized(1, 1);
    let n30 = normalized(3, 0);
    let n03 = normalized(0, 3);
    let n21 = normalized(2, 1);
    let n12 = normalized(1, 2);

    let a = n30 + n12;
    let b = n21 + n03;
    let c = n30 - 3.0 * n12;
    let d = 3.0 * n21 - n03;

    Some([
        n20 + n02,
        (n20 - n02).powi(2) + 4.0 * n11.powi(2),
        c.powi(2) + d.powi(2),
        a.powi(2) + b.powi(2),
        c * a * (a.powi(2) - 3.0 * b.powi(2)) + d * b * (3.0 * a.powi(2) - b.powi(2)),
        (n20 - n02) * (a.powi(2) - b.powi(2)) + 4.0 * n11 * a * b,
        d * a * (a.powi(2) - 3.0 * b.powi(2)) - c * b * (3.0 * a.powi(2) - b.powi(2)),
    ])
}

/// Sum of absolute differences of sign-preserving log10 moments.
pub fn match_shapes_i2(first: &[f64; 7], second: &[f64; 7]) -> f64
{
    let signed_log = |value: f64| value.signum() * value.abs().log10();
    first
        .iter()
        .zip(second.iter())
        .filter(|(a, b)| a.abs() > MOMENT_EPS && b.abs() > MOMENT_EPS)
        .map(|(a, b)| (signed_log(*a) - signed_log(*b)).abs())
        .sum()
}

pub fn shape_signature(image: &DynamicImage) -> Option<[f64; 7]>
{
    let mask = binarize(image);
    let side = SIDE as usize;
    let region = largest_component(&mask, side, side);
    hu_moments(&region, side)
}

/// Percentage similarity in `0.0..=100.0`, rounded to two decimals. Blank
/// inputs score zero.
pub fn compare_images(drawn: &DynamicImage, reference: &DynamicImage) -> f64
{
    let (Some(drawn), Some(reference)) = (shape_signature(drawn), shape_signature(reference))
    else {
        return 0.0;
    };
    let distance = match_shapes_i2(&drawn, &reference);
    let score = (100.0 - distance * 100.0).max(0.0);
    (score * 100.0).round() / 100.0
}

pub fn compare_data_url(url: &str, reference: &DynamicImage) -> Result<f64, ShapeError>
{
    let drawn = decode_image(&decode_data_url(url)?)?;
    Ok(compare_images(&drawn, reference))
}
