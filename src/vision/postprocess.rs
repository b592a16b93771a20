//! Decoding of PaddleOCR model outputs
//!
//! Detection produces a per-pixel text probability map that is turned into
//! boxes; recognition produces per-timestep class probabilities that are
//! CTC-decoded against the character dictionary.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use ndarray::ArrayView2;
use std::collections::HashMap;

/// Axis-aligned text box in image coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Mean detection probability inside the box
    pub score: f32,
}

impl TextBox {
    /// Corner points, clockwise from top-left
    pub fn polygon(&self) -> [(f32, f32); 4] {
        [
            (self.x, self.y),
            (self.x + self.width, self.y),
            (self.x + self.width, self.y + self.height),
            (self.x, self.y + self.height),
        ]
    }

    /// Divide all coordinates by `scale` (detection space back to image space)
    pub fn unscaled(&self, scale: f32) -> Self {
        Self {
            x: self.x / scale,
            y: self.y / scale,
            width: self.width / scale,
            height: self.height / scale,
            score: self.score,
        }
    }

    /// Restrict the box to a `width` x `height` image
    pub fn clamped(&self, width: f32, height: f32) -> Self {
        let x0 = self.x.clamp(0.0, width);
        let y0 = self.y.clamp(0.0, height);
        let x1 = (self.x + self.width).clamp(0.0, width);
        let y1 = (self.y + self.height).clamp(0.0, height);
        Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
            score: self.score,
        }
    }
}

/// Thresholds for turning a probability map into boxes
#[derive(Debug, Clone, Copy)]
pub struct BoxOptions {
    pub threshold: f32,
    pub box_threshold: f32,
    pub min_size: f32,
    pub unclip_ratio: f32,
}

impl Default for BoxOptions {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            box_threshold: 0.6,
            min_size: 3.0,
            unclip_ratio: 1.5,
        }
    }
}

#[derive(Default)]
struct Region {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    score_sum: f32,
    pixels: u32,
}

/// Extract text boxes from a detection probability map of shape (H, W)
pub fn extract_boxes(prob: ArrayView2<f32>, options: &BoxOptions) -> Vec<TextBox> {
    let (h, w) = prob.dim();
    if h == 0 || w == 0 {
        return Vec::new();
    }

    let mask = GrayImage::from_fn(w as u32, h as u32, |x, y| {
        if prob[[y as usize, x as usize]] > options.threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    let mut regions: HashMap<u32, Region> = HashMap::new();
    for (x, y, label) in labels.enumerate_pixels() {
        let label = label[0];
        if label == 0 {
            continue;
        }
        let region = regions.entry(label).or_insert_with(|| Region {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            ..Default::default()
        });
        region.min_x = region.min_x.min(x);
        region.min_y = region.min_y.min(y);
        region.max_x = region.max_x.max(x);
        region.max_y = region.max_y.max(y);
        region.score_sum += prob[[y as usize, x as usize]];
        region.pixels += 1;
    }

    let mut boxes: Vec<TextBox> = regions
        .into_values()
        .filter_map(|region| {
            let width = (region.max_x - region.min_x + 1) as f32;
            let height = (region.max_y - region.min_y + 1) as f32;
            if width.min(height) < options.min_size {
                return None;
            }
            let score = region.score_sum / region.pixels as f32;
            if score < options.box_threshold {
                return None;
            }
            let raw = TextBox {
                x: region.min_x as f32,
                y: region.min_y as f32,
                width,
                height,
                score,
            };
            Some(unclip(&raw, options.unclip_ratio).clamped(w as f32, h as f32))
        })
        .collect();

    sort_reading_order(&mut boxes);
    boxes
}

/// Grow a box outward by `area * ratio / perimeter`, the DB-net unclip offset
fn unclip(text_box: &TextBox, ratio: f32) -> TextBox {
    let area = text_box.width * text_box.height;
    let perimeter = 2.0 * (text_box.width + text_box.height);
    if perimeter <= 0.0 {
        return *text_box;
    }
    let distance = area * ratio / perimeter;
    TextBox {
        x: text_box.x - distance,
        y: text_box.y - distance,
        width: text_box.width + 2.0 * distance,
        height: text_box.height + 2.0 * distance,
        score: text_box.score,
    }
}

/// Top-to-bottom, then left-to-right for boxes on the same line
pub fn sort_reading_order(boxes: &mut [TextBox]) {
    const SAME_LINE_TOLERANCE: f32 = 10.0;

    boxes.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

    // bubble boxes that sit on the same line into x order
    for i in 0..boxes.len() {
        let mut j = i;
        while j > 0
            && (boxes[j].y - boxes[j - 1].y).abs() < SAME_LINE_TOLERANCE
            && boxes[j].x < boxes[j - 1].x
        {
            boxes.swap(j, j - 1);
            j -= 1;
        }
    }
}

/// Greedy CTC decode of a (T, C) probability matrix.
///
/// Class 0 is the blank, class `i` maps to `dictionary[i - 1]` and the class
/// right after the dictionary is a space. Returns the text and its mean
/// per-character confidence.
pub fn ctc_greedy_decode(probs: ArrayView2<f32>, dictionary: &[String]) -> (String, f32) {
    let mut text = String::new();
    let mut confidence_sum = 0.0;
    let mut emitted = 0usize;
    let mut previous: Option<usize> = None;

    for step in probs.rows() {
        let Some((class, &p)) = step
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
        else {
            continue;
        };

        if class != 0 && previous != Some(class) {
            let symbol = match dictionary.get(class - 1) {
                Some(s) => Some(s.as_str()),
                None if class - 1 == dictionary.len() => Some(" "),
                None => None,
            };
            if let Some(symbol) = symbol {
                text.push_str(symbol);
                confidence_sum += p;
                emitted += 1;
            }
        }
        previous = Some(class);
    }

    let confidence = if emitted > 0 {
        confidence_sum / emitted as f32
    } else {
        0.0
    };
    (text, confidence)
}
