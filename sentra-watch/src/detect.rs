//! Per-frame detection types and noise filtering
//!
//! The vision model itself is an external collaborator; this module
//! defines its wire contract (`FrameClassifier`), the camera and blob
//! store seams, and the validity gates that separate a real weapon
//! detection from model noise.

use sentra_common::config::DetectionConfig;
use sentra_common::Result;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// A raw camera frame (encoded image bytes)
#[derive(Debug, Clone)]
pub struct Frame {
    pub bytes: Vec<u8>,
    pub captured_at: chrono::DateTime<chrono::Utc>,
}

impl Frame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            captured_at: chrono::Utc::now(),
        }
    }
}

/// Axis-aligned detection box, pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Width over height; 0.0 for a degenerate zero-height box
    pub fn aspect_ratio(&self) -> f32 {
        let height = self.height();
        if height == 0.0 {
            0.0
        } else {
            self.width() / height
        }
    }
}

/// One labeled detection from the model's per-frame output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// Model confidence in [0, 1]
    pub confidence: f32,
    pub bounding_box: BoundingBox,
}

/// Validity gates applied to raw detections
///
/// A detection must clear the confidence threshold, have a plausible
/// weapon aspect ratio, and exceed the minimum box size on both
/// edges. Anything else is discarded as noise and never stored.
#[derive(Debug, Clone)]
pub struct DetectionFilter {
    confidence_threshold: f32,
    min_box_size: f32,
    aspect_ratio_min: f32,
    aspect_ratio_max: f32,
}

impl DetectionFilter {
    pub fn new(config: &DetectionConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            min_box_size: config.min_box_size as f32,
            aspect_ratio_min: config.aspect_ratio_min,
            aspect_ratio_max: config.aspect_ratio_max,
        }
    }

    /// True when a detection clears every gate
    pub fn qualifies(&self, detection: &Detection) -> bool {
        if detection.confidence <= self.confidence_threshold {
            return false;
        }

        let bbox = &detection.bounding_box;
        let aspect_ratio = bbox.aspect_ratio();

        aspect_ratio > self.aspect_ratio_min
            && aspect_ratio < self.aspect_ratio_max
            && bbox.width() > self.min_box_size
            && bbox.height() > self.min_box_size
    }
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self::new(&DetectionConfig::default())
    }
}

/// Camera feed contract: yields the next frame
pub trait FrameSource: Send + Sync {
    fn next_frame(&self) -> impl Future<Output = Result<Frame>> + Send;
}

/// Pretrained vision model contract
pub trait FrameClassifier: Send + Sync {
    fn detect(&self, frame: &Frame) -> impl Future<Output = Result<Vec<Detection>>> + Send;
}

/// Evidence blob store contract
pub trait EvidenceStore: Send + Sync {
    /// Upload bytes to `path`, returning the stored object's URI
    fn put(&self, bytes: &[u8], path: &str) -> impl Future<Output = Result<String>> + Send;

    /// Public URI for an already-stored path
    fn public_url(&self, path: &str) -> String;
}
