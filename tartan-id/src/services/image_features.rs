//! Image region statistics
//!
//! Cheap per-region measurements used as face/image features: grayscale
//! brightness mean and spread, contrast, Laplacian sharpness, dimensions and
//! mean color. Values are deterministic for a given decoded image, which is
//! what the untoleranced face fingerprint relies on.

use crate::services::face_detector::BoundingBox;
use image::{DynamicImage, GenericImageView};
use tartan_common::FeatureSet;

/// Decode an uploaded image (format guessed from content)
pub fn decode_image(data: &[u8]) -> Result<DynamicImage, image::ImageError> {
    image::load_from_memory(data)
}

/// Features for the whole frame
pub fn analyze_image(image: &DynamicImage) -> FeatureSet {
    let (width, height) = image.dimensions();
    analyze_region(
        image,
        BoundingBox {
            x: 0,
            y: 0,
            width,
            height,
        },
    )
}

/// Features for one region; the box is clipped to the image bounds
///
/// An empty region (after clipping) falls back to the whole frame.
pub fn analyze_region(image: &DynamicImage, region: BoundingBox) -> FeatureSet {
    let (img_width, img_height) = image.dimensions();
    let region = region.clamp_to(img_width, img_height);
    let region = if region.is_empty() {
        BoundingBox {
            x: 0,
            y: 0,
            width: img_width,
            height: img_height,
        }
    } else {
        region
    };

    let view = image.crop_imm(region.x, region.y, region.width, region.height);
    let gray = view.to_luma8();
    let rgb = view.to_rgb8();

    let (mean, std) = mean_and_std(gray.pixels().map(|p| p[0] as f64));
    let sharpness = laplacian_variance(&gray);

    let pixel_count = (rgb.width() as f64 * rgb.height() as f64).max(1.0);
    let mut sums = [0f64; 3];
    for pixel in rgb.pixels() {
        for (sum, channel) in sums.iter_mut().zip(pixel.0.iter()) {
            *sum += *channel as f64;
        }
    }

    let aspect_ratio = if region.height > 0 {
        region.width as f64 / region.height as f64
    } else {
        0.0
    };

    FeatureSet::new()
        .with("mean_brightness", mean)
        .with("brightness_std", std)
        .with("contrast", std / (mean + 1e-7))
        .with("sharpness", sharpness)
        .with("width", region.width)
        .with("height", region.height)
        .with("aspect_ratio", aspect_ratio)
        .with("color_mean_r", sums[0] / pixel_count)
        .with("color_mean_g", sums[1] / pixel_count)
        .with("color_mean_b", sums[2] / pixel_count)
}

fn mean_and_std(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut count = 0usize;
    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for v in values {
        count += 1;
        sum += v;
        sum_sq += v * v;
    }
    if count == 0 {
        return (0.0, 0.0);
    }
    let n = count as f64;
    let mean = sum / n;
    let variance = (sum_sq / n - mean * mean).max(0.0);
    (mean, variance.sqrt())
}

/// Variance of the 4-neighbour Laplacian over interior pixels
fn laplacian_variance(gray: &image::GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 {
        return 0.0;
    }

    let px = |x: u32, y: u32| gray.get_pixel(x, y)[0] as f64;
    let responses = (1..h - 1).flat_map(|y| {
        (1..w - 1).map(move |x| {
            px(x - 1, y) + px(x + 1, y) + px(x, y - 1) + px(x, y + 1) - 4.0 * px(x, y)
        })
    });

    let (_, std) = mean_and_std(responses);
    std * std
}
