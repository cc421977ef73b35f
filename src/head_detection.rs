// src/head_detection.rs
//
// Head localization capability.
//
// The pipeline depends only on the `HeadLocator` trait so a deployment can
// swap detectors without touching any scoring logic. Two backends:
//   - OnnxHeadDetector (feature `detector-onnx`): YOLO-family head/face
//     model via onnxruntime
//   - FixedRegionLocator: returns a pre-configured region list; the stub
//     backend for tests and model-less deployments
//
// Contract: an empty result means "no people in the image" and is success.
// Any internal backend failure surfaces as DetectionUnavailable so callers
// can tell "no people" from "detector broke".

use crate::error::PipelineError;
use crate::types::{Frame, HeadRegion};

pub trait HeadLocator {
    /// Locate candidate head rectangles in the frame. Never mutates the
    /// frame; overlapping rectangles are all returned (each is treated as a
    /// distinct person downstream).
    fn locate(&mut self, frame: &Frame) -> Result<Vec<HeadRegion>, PipelineError>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

// ============================================================================
// STUB BACKEND
// ============================================================================

/// Returns a fixed set of regions, clipped against each frame. Useful as a
/// test double and as the fallback backend when no model is available.
pub struct FixedRegionLocator {
    regions: Vec<HeadRegion>,
}

impl FixedRegionLocator {
    pub fn new(regions: Vec<HeadRegion>) -> Self {
        Self { regions }
    }

    /// A locator that always reports zero people.
    pub fn empty() -> Self {
        Self {
            regions: Vec::new(),
        }
    }
}

impl HeadLocator for FixedRegionLocator {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<HeadRegion>, PipelineError> {
        Ok(self
            .regions
            .iter()
            .filter(|r| {
                r.x < frame.width as i32
                    && r.y < frame.height as i32
                    && r.x + r.width as i32 > 0
                    && r.y + r.height as i32 > 0
            })
            .copied()
            .collect())
    }

    fn name(&self) -> &'static str {
        "fixed-region"
    }
}

// ============================================================================
// ONNX BACKEND
// ============================================================================

#[cfg(feature = "detector-onnx")]
pub use onnx::OnnxHeadDetector;

#[cfg(feature = "detector-onnx")]
mod onnx {
    use super::*;
    use crate::preprocessing::resize_bilinear;
    use crate::types::ModelConfig;
    use anyhow::Result;
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use tracing::{debug, info};

    /// Raw detection in original image coordinates, corner format.
    #[derive(Debug, Clone)]
    struct Detection {
        bbox: [f32; 4],
        confidence: f32,
    }

    /// YOLO-family head detector. Expects a model with output layout
    /// `[1, 4 + num_classes, num_anchors]` where every class is a head/face
    /// class (a dedicated head model, num_classes = 1, is the common case).
    pub struct OnnxHeadDetector {
        session: Session,
        input_size: usize,
        num_classes: usize,
        confidence_threshold: f32,
        nms_iou_threshold: f32,
    }

    impl OnnxHeadDetector {
        pub fn new(config: &ModelConfig) -> Result<Self> {
            info!("Loading head detection model: {}", config.path);

            let session = Session::builder()?
                .with_optimization_level(GraphOptimizationLevel::Level3)?
                .with_intra_threads(4)?
                .commit_from_file(&config.path)?;

            info!("✓ Head detector initialized");
            Ok(Self {
                session,
                input_size: config.input_size,
                num_classes: config.num_classes.max(1),
                confidence_threshold: config.confidence_threshold,
                nms_iou_threshold: config.nms_iou_threshold,
            })
        }

        fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>> {
            let (input, scale, pad_x, pad_y) = self.preprocess(frame);
            let output = self.infer(&input)?;
            let detections = self.postprocess(&output, scale, pad_x, pad_y);
            debug!("Detected {} head candidates", detections.len());
            Ok(detections)
        }

        /// Letterbox into a square model input: resize preserving aspect
        /// ratio, center on a gray canvas, normalize, HWC -> CHW.
        fn preprocess(&self, frame: &Frame) -> (Vec<f32>, f32, f32, f32) {
            let target_size = self.input_size;

            let scale = (target_size as f32 / frame.width as f32)
                .min(target_size as f32 / frame.height as f32);
            let scaled_w = (frame.width as f32 * scale) as usize;
            let scaled_h = (frame.height as f32 * scale) as usize;

            let pad_x = (target_size - scaled_w) as f32 / 2.0;
            let pad_y = (target_size - scaled_h) as f32 / 2.0;

            let resized = resize_bilinear(&frame.data, frame.width, frame.height, scaled_w, scaled_h);

            let mut canvas = vec![114u8; target_size * target_size * 3];
            for y in 0..scaled_h {
                for x in 0..scaled_w {
                    let src_idx = (y * scaled_w + x) * 3;
                    let dst_x = x + pad_x as usize;
                    let dst_y = y + pad_y as usize;
                    let dst_idx = (dst_y * target_size + dst_x) * 3;
                    canvas[dst_idx..dst_idx + 3].copy_from_slice(&resized[src_idx..src_idx + 3]);
                }
            }

            let mut input = vec![0.0f32; 3 * target_size * target_size];
            for c in 0..3 {
                for h in 0..target_size {
                    for w in 0..target_size {
                        let hwc_idx = (h * target_size + w) * 3 + c;
                        let chw_idx = c * target_size * target_size + h * target_size + w;
                        input[chw_idx] = canvas[hwc_idx] as f32 / 255.0;
                    }
                }
            }

            (input, scale, pad_x, pad_y)
        }

        fn infer(&mut self, input: &[f32]) -> Result<Vec<f32>> {
            let shape = [1usize, 3, self.input_size, self.input_size];
            let input_value = ort::value::Value::from_array((
                shape.as_slice(),
                input.to_vec().into_boxed_slice(),
            ))?;

            let outputs = self.session.run(ort::inputs!["images" => input_value])?;
            let output = &outputs[0];
            let (_, data) = output.try_extract_tensor::<f32>()?;

            Ok(data.to_vec())
        }

        fn postprocess(&self, output: &[f32], scale: f32, pad_x: f32, pad_y: f32) -> Vec<Detection> {
            let stride = 4 + self.num_classes;
            let num_anchors = output.len() / stride;
            let mut detections = Vec::new();

            // Output layout: [1, 4+C, A] -> channel-major over anchors.
            for i in 0..num_anchors {
                let cx = output[i];
                let cy = output[num_anchors + i];
                let w = output[num_anchors * 2 + i];
                let h = output[num_anchors * 3 + i];

                let mut max_conf = 0.0f32;
                for c in 0..self.num_classes {
                    let conf = output[num_anchors * (4 + c) + i];
                    if conf > max_conf {
                        max_conf = conf;
                    }
                }

                if max_conf < self.confidence_threshold {
                    continue;
                }

                // Center format -> corner format, then reverse letterbox.
                let x1 = (cx - w / 2.0 - pad_x) / scale;
                let y1 = (cy - h / 2.0 - pad_y) / scale;
                let x2 = (cx + w / 2.0 - pad_x) / scale;
                let y2 = (cy + h / 2.0 - pad_y) / scale;

                detections.push(Detection {
                    bbox: [x1, y1, x2, y2],
                    confidence: max_conf,
                });
            }

            nms(detections, self.nms_iou_threshold)
        }
    }

    impl HeadLocator for OnnxHeadDetector {
        fn locate(&mut self, frame: &Frame) -> Result<Vec<HeadRegion>, PipelineError> {
            let detections = self
                .detect(frame)
                .map_err(|e| PipelineError::DetectionUnavailable(e.to_string()))?;

            Ok(detections
                .iter()
                .filter_map(|d| region_from_bbox(&d.bbox, frame.width, frame.height))
                .collect())
        }

        fn name(&self) -> &'static str {
            "onnx"
        }
    }

    /// Convert a corner-format float bbox to an integer region, dropping
    /// boxes that do not intersect the image at all.
    fn region_from_bbox(bbox: &[f32; 4], width: usize, height: usize) -> Option<HeadRegion> {
        let x1 = bbox[0].max(0.0).min(width as f32);
        let y1 = bbox[1].max(0.0).min(height as f32);
        let x2 = bbox[2].max(0.0).min(width as f32);
        let y2 = bbox[3].max(0.0).min(height as f32);
        if x2 - x1 < 1.0 || y2 - y1 < 1.0 {
            return None;
        }
        Some(HeadRegion::new(
            x1 as i32,
            y1 as i32,
            (x2 - x1) as u32,
            (y2 - y1) as u32,
        ))
    }

    fn nms(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
        if detections.is_empty() {
            return detections;
        }

        detections.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut keep = Vec::new();
        while !detections.is_empty() {
            let current = detections.remove(0);
            detections.retain(|det| calculate_iou(&current.bbox, &det.bbox) < iou_threshold);
            keep.push(current);
        }
        keep
    }

    fn calculate_iou(box1: &[f32; 4], box2: &[f32; 4]) -> f32 {
        let x1 = box1[0].max(box2[0]);
        let y1 = box1[1].max(box2[1]);
        let x2 = box1[2].min(box2[2]);
        let y2 = box1[3].min(box2[3]);

        let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        let area1 = (box1[2] - box1[0]) * (box1[3] - box1[1]);
        let area2 = (box2[2] - box2[0]) * (box2[3] - box2[1]);
        let union = area1 + area2 - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: usize, height: usize) -> Frame {
        Frame::new(vec![0u8; width * height * 3], width, height)
    }

    #[test]
    fn test_fixed_locator_returns_configured_regions() {
        let mut locator = FixedRegionLocator::new(vec![
            HeadRegion::new(10, 10, 40, 40),
            HeadRegion::new(100, 20, 30, 30),
        ]);
        let regions = locator.locate(&frame(640, 480)).unwrap();
        assert_eq!(regions.len(), 2);
    }

    #[test]
    fn test_fixed_locator_drops_regions_outside_frame() {
        let mut locator = FixedRegionLocator::new(vec![
            HeadRegion::new(10, 10, 40, 40),
            HeadRegion::new(700, 10, 40, 40), // right of a 640-wide frame
        ]);
        let regions = locator.locate(&frame(640, 480)).unwrap();
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn test_empty_locator_reports_zero_people() {
        let mut locator = FixedRegionLocator::empty();
        let regions = locator.locate(&frame(640, 480)).unwrap();
        assert!(regions.is_empty());
    }
}
