// src/report.rs
//
// Top-level report assembly for the surrounding service. Three user-visible
// outcomes are kept distinct:
//   (a) valid image, zero people: success, no violation
//   (b) valid image, N people with per-person helmet status: success
//   (c) unusable input or detector failure: explicit error, no fabricated
//       violation data
//
// Field names and nesting mirror the service exchange format so any
// transport can serialize these as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::plate_ocr::PlateResult;
use crate::types::FrameResult;
use crate::violations::{violations_for_frame, SequenceReport, ViolationKind, ViolationTable};

/// Report for a single analyzed image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    pub report_id: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helmet_detection: Option<FrameResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_plate: Option<PlateResult>,
    pub violations: Vec<ViolationKind>,
    pub total_violations: usize,
    pub estimated_fine: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DetectionReport {
    /// Success report: combine the frame analysis with optional collaborator
    /// outputs (plate OCR, externally detected violation kinds).
    pub fn success(
        result: FrameResult,
        plate: Option<PlateResult>,
        external_violations: &[ViolationKind],
        table: &ViolationTable,
    ) -> Self {
        let mut violations = violations_for_frame(&result);
        violations.extend(external_violations.iter().copied());

        let estimated_fine = table.total_fine(&violations);

        Self {
            report_id: Uuid::new_v4().to_string(),
            success: true,
            timestamp: Utc::now(),
            helmet_detection: Some(result),
            number_plate: plate,
            total_violations: violations.len(),
            estimated_fine,
            violations,
            error: None,
        }
    }

    /// Error report: explicit failure, no violation data is invented.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            report_id: Uuid::new_v4().to_string(),
            success: false,
            timestamp: Utc::now(),
            helmet_detection: None,
            number_plate: None,
            violations: Vec::new(),
            total_violations: 0,
            estimated_fine: 0,
            error: Some(error.into()),
        }
    }
}

/// Report for an ordered frame sequence analyzed as one incident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoReport {
    pub report_id: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub total_frames: usize,
    pub summary: SequenceReport,
}

impl VideoReport {
    pub fn new(summary: SequenceReport) -> Self {
        Self {
            report_id: Uuid::new_v4().to_string(),
            success: true,
            timestamp: Utc::now(),
            total_frames: summary.frame_results.len(),
            summary,
        }
    }
}
