// src/plate_ocr.rs
//
// Number-plate extraction via an external OCR service (ocr.space-compatible
// API). The core pipeline never depends on this: OCR failures degrade to the
// UNKNOWN sentinel and must not abort a violation report.

use anyhow::{Context, Result};
use base64::Engine;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// Sentinel plate value when nothing matched.
pub const UNKNOWN_PLATE: &str = "UNKNOWN";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateResult {
    pub number_plate: String,
    pub confidence: f32,
    pub raw_text: String,
}

impl PlateResult {
    pub fn unknown() -> Self {
        Self {
            number_plate: UNKNOWN_PLATE.to_string(),
            confidence: 0.0,
            raw_text: String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(rename = "ParsedResults", default)]
    parsed_results: Vec<OcrParsedResult>,
    #[serde(rename = "IsErroredOnProcessing", default)]
    is_errored: bool,
    #[serde(rename = "ErrorMessage", default)]
    error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct OcrParsedResult {
    #[serde(rename = "ParsedText", default)]
    parsed_text: String,
}

pub struct PlateReader {
    http_client: reqwest::Client,
    api_url: String,
    api_key: String,
    patterns: Vec<Regex>,
}

impl PlateReader {
    pub fn new(api_url: String, api_key: String) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build OCR HTTP client")?;

        // Standard Indian plate format, the no-space variant, and a general
        // alphanumeric fallback, tried in that order.
        let patterns = vec![
            Regex::new(r"[A-Z]{2}\s*\d{2}\s*[A-Z]{1,2}\s*\d{4}")?,
            Regex::new(r"[A-Z]{2}\d{2}[A-Z]{1,2}\d{4}")?,
            Regex::new(r"\b[A-Z0-9]{6,10}\b")?,
        ];

        Ok(Self {
            http_client,
            api_url,
            api_key,
            patterns,
        })
    }

    /// OCR the image and pick the best plate-shaped string out of the text.
    /// Network or parse failures log and return UNKNOWN.
    pub async fn extract_number_plate(&self, jpeg_bytes: &[u8]) -> PlateResult {
        let b64 = base64::engine::general_purpose::STANDARD.encode(jpeg_bytes);

        let form = [
            ("apikey", self.api_key.as_str()),
            ("language", "eng"),
            ("isOverlayRequired", "false"),
            ("detectOrientation", "true"),
            ("scale", "true"),
            ("OCREngine", "2"),
        ];
        let base64_image = format!("data:image/jpeg;base64,{}", b64);
        let mut params: Vec<(&str, &str)> = form.to_vec();
        params.push(("base64Image", base64_image.as_str()));

        let response = match self
            .http_client
            .post(&self.api_url)
            .form(&params)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                error!("❌ OCR request failed: {}", e);
                return PlateResult::unknown();
            }
        };

        let parsed: OcrResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                error!("❌ Failed to parse OCR response: {}", e);
                return PlateResult::unknown();
            }
        };

        if parsed.is_errored {
            error!("❌ OCR error: {:?}", parsed.error_message);
            return PlateResult::unknown();
        }

        let extracted_text = parsed
            .parsed_results
            .first()
            .map(|r| r.parsed_text.clone())
            .unwrap_or_default();

        debug!("OCR extracted {} chars of text", extracted_text.len());
        let result = self.match_plate(&extracted_text);
        if result.number_plate != UNKNOWN_PLATE {
            info!("🔢 Number plate: {}", result.number_plate);
        }
        result
    }

    /// Pattern-match a plate out of raw OCR text.
    pub fn match_plate(&self, text: &str) -> PlateResult {
        let upper = text.to_uppercase();
        for pattern in &self.patterns {
            if let Some(m) = pattern.find(&upper) {
                return PlateResult {
                    number_plate: m.as_str().replace(' ', ""),
                    confidence: 0.8,
                    raw_text: text.to_string(),
                };
            }
        }
        PlateResult {
            number_plate: UNKNOWN_PLATE.to_string(),
            confidence: 0.0,
            raw_text: text.to_string(),
        }
    }
}
