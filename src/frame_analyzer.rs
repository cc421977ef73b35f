// src/frame_analyzer.rs
//
// Per-image orchestration: head location -> helmet region extraction ->
// helmet scoring -> FrameResult. Zero detected heads is a success outcome
// distinct from detector failure; locator errors propagate unchanged.

use chrono::Utc;
use tracing::{debug, info};

use crate::error::PipelineError;
use crate::head_detection::HeadLocator;
use crate::helmet_region::extract_helmet_region;
use crate::helmet_score::HelmetScorer;
use crate::types::{Config, Frame, FrameResult, HelmetAssessment};

pub struct FrameAnalyzer {
    locator: Box<dyn HeadLocator>,
    scorer: HelmetScorer,
    config: Config,
}

impl FrameAnalyzer {
    pub fn new(locator: Box<dyn HeadLocator>, config: Config) -> Self {
        info!("Frame analyzer using '{}' head locator", locator.name());
        let scorer = HelmetScorer::new(config.scoring.clone());
        Self {
            locator,
            scorer,
            config,
        }
    }

    /// Analyze one image. Holds no state across calls; each invocation gets
    /// its own buffers and runs to completion synchronously.
    pub fn analyze(&mut self, frame: &Frame) -> Result<FrameResult, PipelineError> {
        let heads = self.locator.locate(frame)?;

        if heads.is_empty() {
            debug!("No person detected in image");
            return Ok(FrameResult::empty());
        }

        let mut assessments = Vec::with_capacity(heads.len());
        for head in &heads {
            let region =
                extract_helmet_region(frame.width, frame.height, head, &self.config.region);
            let score = self.scorer.score(frame, region.as_ref());
            assessments.push(HelmetAssessment {
                head: *head,
                has_helmet: score.has_helmet,
                confidence: score.confidence,
                color_coverage: score.color_coverage,
                shape_score: score.shape_score,
            });
        }

        let person_count = assessments.len();
        let people_with_helmets = assessments.iter().filter(|a| a.has_helmet).count();
        let people_without_helmets = person_count - people_with_helmets;

        let aggregate_confidence = round2(
            assessments.iter().map(|a| a.confidence).sum::<f32>() / person_count as f32,
        );

        info!(
            "👥 {} person(s): {} with helmet, {} without (confidence {:.2})",
            person_count, people_with_helmets, people_without_helmets, aggregate_confidence,
        );

        Ok(FrameResult {
            person_count,
            people_with_helmets,
            people_without_helmets,
            has_violation: people_without_helmets > 0,
            aggregate_confidence,
            assessments,
            timestamp: Utc::now(),
        })
    }
}

fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}
