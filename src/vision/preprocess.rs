//! Image preprocessing for PaddleOCR models
//!
//! Turns decoded images into normalized NCHW tensors for the detection and
//! recognition networks.

use image::DynamicImage;
use ndarray::{Array3, Array4, Axis};

use super::postprocess::TextBox;

/// Model input settings
#[derive(Debug, Clone)]
pub struct ModelInputConfig {
    /// Longest side of the detection input (typically 640 or 960)
    pub det_target_size: u32,
    /// Fixed height of the recognition input
    pub rec_target_height: u32,
    /// Widest recognition input
    pub rec_max_width: u32,
    /// Per-channel mean [R, G, B]
    pub mean: [f32; 3],
    /// Per-channel std [R, G, B]
    pub std: [f32; 3],
}

impl Default for ModelInputConfig {
    fn default() -> Self {
        Self {
            det_target_size: 960,
            rec_target_height: 48,
            rec_max_width: 640,
            // maps [0, 1] onto [-1, 1]
            mean: [0.5, 0.5, 0.5],
            std: [0.5, 0.5, 0.5],
        }
    }
}

/// Decoded image as an HWC RGB array with values in [0, 1]
pub fn image_to_rgb_f32(image: &DynamicImage) -> Array3<f32> {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    Array3::from_shape_fn((height as usize, width as usize, 3), |(y, x, c)| {
        rgb.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    })
}

/// Apply `(v - mean) / std` per channel
pub fn normalize(image: &Array3<f32>, mean: &[f32; 3], std: &[f32; 3]) -> Array3<f32> {
    let mut normalized = image.clone();
    for (c, mut channel) in normalized.axis_iter_mut(Axis(2)).enumerate() {
        channel.mapv_inplace(|v| (v - mean[c]) / std[c]);
    }
    normalized
}

/// HWC image to a batch-of-one NCHW tensor
pub fn hwc_to_nchw(image: &Array3<f32>) -> Array4<f32> {
    image
        .view()
        .permuted_axes([2, 0, 1])
        .insert_axis(Axis(0))
        .as_standard_layout()
        .into_owned()
}

/// Bilinear sample of channel `c` at fractional source coordinates
fn sample_bilinear(image: &Array3<f32>, src_y: f32, src_x: f32, c: usize) -> f32 {
    let (h, w, _) = image.dim();
    let src_y = src_y.clamp(0.0, (h - 1) as f32);
    let src_x = src_x.clamp(0.0, (w - 1) as f32);

    let y0 = src_y.floor() as usize;
    let x0 = src_x.floor() as usize;
    let y1 = (y0 + 1).min(h - 1);
    let x1 = (x0 + 1).min(w - 1);
    let fy = src_y - y0 as f32;
    let fx = src_x - x0 as f32;

    let top = image[[y0, x0, c]] * (1.0 - fx) + image[[y0, x1, c]] * fx;
    let bottom = image[[y1, x0, c]] * (1.0 - fx) + image[[y1, x1, c]] * fx;
    top * (1.0 - fy) + bottom * fy
}

/// Resize so the longest side is `target_size`, zero-padding both sides up
/// to a multiple of 32. Returns the padded image and the applied scale.
pub fn resize_for_detection(image: &Array3<f32>, target_size: u32) -> (Array3<f32>, f32) {
    let (h, w, c) = image.dim();
    let scale = target_size as f32 / h.max(w) as f32;
    let new_h = ((h as f32 * scale) as usize).max(1);
    let new_w = ((w as f32 * scale) as usize).max(1);

    let padded_h = new_h.div_ceil(32) * 32;
    let padded_w = new_w.div_ceil(32) * 32;

    let mut resized = Array3::<f32>::zeros((padded_h, padded_w, c));
    for y in 0..new_h {
        for x in 0..new_w {
            for ch in 0..c {
                resized[[y, x, ch]] =
                    sample_bilinear(image, y as f32 / scale, x as f32 / scale, ch);
            }
        }
    }

    (resized, scale)
}

/// Resize to a fixed height, keeping aspect ratio, capped at `max_width`
pub fn resize_for_recognition(
    image: &Array3<f32>,
    target_height: u32,
    max_width: u32,
) -> Array3<f32> {
    let (h, w, c) = image.dim();
    let scale = target_height as f32 / h as f32;
    let new_w = ((w as f32 * scale).ceil() as u32).clamp(1, max_width) as usize;
    let new_h = target_height as usize;

    Array3::from_shape_fn((new_h, new_w, c), |(y, x, ch)| {
        sample_bilinear(image, y as f32 / scale, x as f32 / scale, ch)
    })
}

/// Cut the axis-aligned region covered by `text_box` out of the image
pub fn crop_box(image: &Array3<f32>, text_box: &TextBox) -> Array3<f32> {
    let (img_h, img_w, c) = image.dim();
    let polygon = text_box.polygon();

    let min_x = polygon.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
    let min_y = polygon.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
    let max_x = polygon.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
    let max_y = polygon.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);

    let x1 = (min_x.max(0.0) as usize).min(img_w.saturating_sub(1));
    let y1 = (min_y.max(0.0) as usize).min(img_h.saturating_sub(1));
    let x2 = (max_x.max(0.0).ceil() as usize).min(img_w);
    let y2 = (max_y.max(0.0).ceil() as usize).min(img_h);

    if x2 <= x1 || y2 <= y1 {
        return Array3::<f32>::zeros((1, 1, c));
    }

    image
        .slice(ndarray::s![y1..y2, x1..x2, ..])
        .to_owned()
}

/// Detection input tensor and the scale applied to reach it
pub fn preprocess_for_detection(
    rgb: &Array3<f32>,
    config: &ModelInputConfig,
) -> (Array4<f32>, f32) {
    let (resized, scale) = resize_for_detection(rgb, config.det_target_size);
    let normalized = normalize(&resized, &config.mean, &config.std);
    (hwc_to_nchw(&normalized), scale)
}

/// Recognition input tensor for one cropped text line
pub fn preprocess_for_recognition(line: &Array3<f32>, config: &ModelInputConfig) -> Array4<f32> {
    let resized = resize_for_recognition(line, config.rec_target_height, config.rec_max_width);
    let normalized = normalize(&resized, &config.mean, &config.std);
    hwc_to_nchw(&normalized)
}
