use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub model: ModelConfig,
    pub region: RegionConfig,
    pub scoring: ScoringConfig,
    pub input: InputConfig,
    pub ocr: OcrConfig,
    pub notification: NotificationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: String,
    pub input_size: usize,
    pub num_classes: usize,
    pub confidence_threshold: f32,
    pub nms_iou_threshold: f32,
}

/// Geometry of the helmet region relative to a detected head rectangle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionConfig {
    /// Fraction of head height the region extends above the head top.
    pub up_ratio: f32,
    /// Total region height below the head top, as a fraction of head height.
    pub down_ratio: f32,
}

/// Tunable thresholds for the color/shape helmet heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub helmet_threshold: f32,
    pub min_contour_area: f32,
    pub circularity_min: f32,
    pub circularity_max: f32,
    pub canny_low: f32,
    pub canny_high: f32,
    pub color_weight: f32,
    pub shape_weight: f32,
    pub max_confidence: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub image_dir: String,
    pub output_dir: String,
    /// Treat all discovered images as one ordered frame sequence.
    pub treat_as_sequence: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    pub enabled: bool,
    pub api_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub default_phone: String,
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelConfig {
                path: "models/head_detector.onnx".to_string(),
                input_size: 640,
                num_classes: 1,
                confidence_threshold: 0.25,
                nms_iou_threshold: 0.45,
            },
            region: RegionConfig {
                up_ratio: 0.8,
                down_ratio: 1.2,
            },
            scoring: ScoringConfig::default(),
            input: InputConfig {
                image_dir: "input".to_string(),
                output_dir: "output".to_string(),
                treat_as_sequence: true,
            },
            ocr: OcrConfig {
                enabled: false,
                api_url: "https://api.ocr.space/parse/image".to_string(),
            },
            notification: NotificationConfig {
                enabled: false,
                default_phone: String::new(),
                location: "Unknown".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            helmet_threshold: 0.15,
            min_contour_area: 100.0,
            circularity_min: 0.3,
            circularity_max: 0.9,
            canny_low: 50.0,
            canny_high: 150.0,
            color_weight: 0.6,
            shape_weight: 0.4,
            max_confidence: 95.0,
        }
    }
}

/// One decoded RGB image. `data` is HWC, 3 bytes per pixel.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp: f64,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: usize, height: usize) -> Self {
        Self {
            data,
            width,
            height,
            timestamp: 0.0,
        }
    }
}

/// Axis-aligned rectangle in pixel coordinates, origin top-left.
/// `x`/`y` may be negative (detector boxes can start off-image); width and
/// height are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadRegion {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl HeadRegion {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Helmet verdict for a single detected head.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelmetAssessment {
    pub head: HeadRegion,
    pub has_helmet: bool,
    /// Capped at 95; the heuristic never claims certainty.
    pub confidence: f32,
    pub color_coverage: f32,
    pub shape_score: f32,
}

/// Per-image analysis summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameResult {
    pub person_count: usize,
    pub people_with_helmets: usize,
    pub people_without_helmets: usize,
    pub has_violation: bool,
    pub aggregate_confidence: f32,
    pub assessments: Vec<HelmetAssessment>,
    pub timestamp: DateTime<Utc>,
}

impl FrameResult {
    /// Success result for an image with no detected people.
    pub fn empty() -> Self {
        Self {
            person_count: 0,
            people_with_helmets: 0,
            people_without_helmets: 0,
            has_violation: false,
            aggregate_confidence: 0.0,
            assessments: Vec::new(),
            timestamp: Utc::now(),
        }
    }
}
