//! Face detection port
//!
//! Detectors report face regions in pixel coordinates. The default
//! [`FullFrameDetector`] treats the whole frame as a single subject, which
//! suits cropped portrait uploads.

use crate::services::image_features::analyze_region;
use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use tartan_common::FeatureSet;

/// Pixel-space rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Build from relative coordinates (0.0-1.0), clipped to the image
    pub fn from_relative(
        xmin: f64,
        ymin: f64,
        width: f64,
        height: f64,
        img_width: u32,
        img_height: u32,
    ) -> Self {
        let to_px = |v: f64, dim: u32| (v.clamp(0.0, 1.0) * dim as f64).round() as u32;
        Self {
            x: to_px(xmin, img_width),
            y: to_px(ymin, img_height),
            width: to_px(width, img_width),
            height: to_px(height, img_height),
        }
        .clamp_to(img_width, img_height)
    }

    /// Clip so the box lies inside `img_width` x `img_height`
    pub fn clamp_to(self, img_width: u32, img_height: u32) -> Self {
        let x = self.x.min(img_width);
        let y = self.y.min(img_height);
        Self {
            x,
            y,
            width: self.width.min(img_width - x),
            height: self.height.min(img_height - y),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One detected face
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedFace {
    /// Index within the frame, in detection order
    pub id: usize,
    pub bbox: BoundingBox,
    /// Detector score (0.0-1.0)
    pub confidence: f64,
}

impl DetectedFace {
    /// Region features for this face, tagged with its position and score
    ///
    /// This is the feature set a recognized face is cached under.
    pub fn features(&self, image: &DynamicImage) -> FeatureSet {
        let mut features = analyze_region(image, self.bbox);
        features.insert("bbox_x", self.bbox.x);
        features.insert("bbox_y", self.bbox.y);
        features.insert("detector_confidence", self.confidence);
        features
    }
}

/// Face detection capability
pub trait FaceDetector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Faces in the frame, possibly none
    fn detect(&self, image: &DynamicImage) -> Vec<DetectedFace>;
}

/// Reports the whole frame as one face
///
/// Frames smaller than `min_dimension` on either side report no face.
#[derive(Debug, Clone)]
pub struct FullFrameDetector {
    min_dimension: u32,
}

impl FullFrameDetector {
    pub fn new(min_dimension: u32) -> Self {
        Self { min_dimension }
    }
}

impl Default for FullFrameDetector {
    fn default() -> Self {
        Self::new(16)
    }
}

impl FaceDetector for FullFrameDetector {
    fn name(&self) -> &'static str {
        "full-frame"
    }

    fn detect(&self, image: &DynamicImage) -> Vec<DetectedFace> {
        let (width, height) = image.dimensions();
        if width < self.min_dimension || height < self.min_dimension {
            return Vec::new();
        }

        vec![DetectedFace {
            id: 0,
            bbox: BoundingBox {
                x: 0,
                y: 0,
                width,
                height,
            },
            confidence: 1.0,
        }]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn test_relative_box_is_clipped() {
        let bbox = BoundingBox::from_relative(0.5, 0.5, 0.8, 0.8, 100, 200);
        assert_eq!(
            bbox,
            BoundingBox {
                x: 50,
                y: 100,
                width: 50,
                height: 100
            }
        );
    }

    #[test]
    fn test_clamp_outside_image_is_empty() {
        let bbox = BoundingBox {
            x: 150,
            y: 10,
            width: 20,
            height: 20,
        }
        .clamp_to(100, 100);
        assert!(bbox.is_empty());
    }

    #[test]
    fn test_full_frame_detector() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(64, 48));
        let faces = FullFrameDetector::default().detect(&image);

        assert_eq!(faces.len(), 1);
        assert_eq!(faces[0].bbox.width, 64);
        assert_eq!(faces[0].bbox.height, 48);
    }

    #[test]
    fn test_tiny_frame_has_no_face() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        assert!(FullFrameDetector::default().detect(&image).is_empty());
    }

    #[test]
    fn test_face_features_carry_position() {
        let image = DynamicImage::ImageRgb8(RgbImage::new(32, 32));
        let face = DetectedFace {
            id: 0,
            bbox: BoundingBox {
                x: 4,
                y: 8,
                width: 16,
                height: 16,
            },
            confidence: 0.75,
        };

        let features = face.features(&image);
        assert_eq!(features.number("bbox_x"), Some(4.0));
        assert_eq!(features.number("bbox_y"), Some(8.0));
        assert_eq!(features.number("detector_confidence"), Some(0.75));
        assert_eq!(features.number("width"), Some(16.0));
    }
}
