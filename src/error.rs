// src/error.rs
//
// Typed failures for the analysis pipeline.
//
// Only two things can abort an analysis call: the input bytes were not an
// image, or the head-locating capability itself broke. "Zero heads found"
// is NOT an error: FrameAnalyzer returns an empty success result for it,
// and callers must be able to tell the two apart.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The supplied bytes could not be interpreted as an image.
    /// Fatal for the call; surfaced before any head location runs.
    #[error("image decode failed: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The head locator itself failed (model error, backend unavailable).
    /// Distinct from the zero-person success case.
    #[error("head detection unavailable: {0}")]
    DetectionUnavailable(String),
}
