use std::convert::Infallible;

use image::RgbImage;

use crate::{CaptionModel, config::CaptionConfig};

/// Returns the same caption for every image.
#[derive(Clone, Debug)]
pub struct FixedCaptionModel {
    caption: String,
}

impl FixedCaptionModel {
    pub fn new(caption: impl Into<String>) -> Self {
        Self {
            caption: caption.into(),
        }
    }
}

impl CaptionModel for FixedCaptionModel {
    type Error = Infallible;

    fn generate_caption(&mut self, _image: &RgbImage) -> Result<String, Self::Error> {
        Ok(self.caption.clone())
    }
}

// reference colors used to name the average pixel
const PALETTE: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("gray", [128, 128, 128]),
    ("red", [220, 20, 20]),
    ("green", [30, 160, 40]),
    ("blue", [30, 60, 220]),
    ("yellow", [240, 220, 30]),
    ("orange", [250, 140, 20]),
    ("purple", [130, 40, 170]),
    ("pink", [250, 160, 190]),
    ("brown", [120, 70, 30]),
    ("cyan", [30, 200, 220]),
];

/// Heuristic captioner naming the average color and the shape of the image.
///
/// Runs on the CPU whatever device it is given.
#[derive(Clone, Debug)]
pub struct DominantColorModel;

impl DominantColorModel {
    pub fn new(config: &CaptionConfig) -> Self {
        if config.device.is_cuda() {
            log::info!(
                "{} requested, dominant color captioning runs on cpu",
                config.device
            );
        }
        Self
    }
}

fn mean_color(image: &RgbImage) -> [u8; 3] {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return [0, 0, 0];
    }
    let mut sums = [0u64; 3];
    for pixel in image.pixels() {
        for (sum, channel) in sums.iter_mut().zip(pixel.0) {
            *sum += u64::from(channel);
        }
    }
    sums.map(|sum| (sum / count) as u8)
}

fn color_name(rgb: [u8; 3]) -> &'static str {
    let distance = |reference: &[u8; 3]| -> u32 {
        rgb.iter()
            .zip(reference)
            .map(|(a, b)| u32::from(a.abs_diff(*b)).pow(2))
            .sum()
    };
    PALETTE
        .iter()
        .min_by_key(|(_, reference)| distance(reference))
        .map(|(name, _)| *name)
        .unwrap_or("gray")
}

impl CaptionModel for DominantColorModel {
    type Error = Infallible;

    fn generate_caption(&mut self, image: &RgbImage) -> Result<String, Self::Error> {
        let color = color_name(mean_color(image));
        let shape = match image.width().cmp(&image.height()) {
            std::cmp::Ordering::Equal => "square",
            std::cmp::Ordering::Greater => "landscape image",
            std::cmp::Ordering::Less => "portrait image",
        };
        Ok(format!("a {color} {shape}"))
    }
}
