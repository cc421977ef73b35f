// src/main.rs

mod config;
mod error;
mod frame_analyzer;
mod head_detection;
mod helmet_region;
mod helmet_score;
mod notification;
mod plate_ocr;
mod preprocessing;
mod report;
mod types;
mod violations;

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use walkdir::WalkDir;

use frame_analyzer::FrameAnalyzer;
use head_detection::HeadLocator;
use notification::{ChallanDetails, ChallanNotifier};
use plate_ocr::{PlateReader, PlateResult};
use report::{DetectionReport, VideoReport};
use types::{Config, FrameResult};
use violations::{ViolationAggregator, ViolationTable};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "helmet_detection=info".to_string()),
        )
        .init();

    info!("🪖 Helmet Violation Detection System Starting");

    let config = match Config::load("config.yaml") {
        Ok(config) => {
            info!("✓ Configuration loaded");
            config
        }
        Err(e) => {
            warn!("Could not load config.yaml ({}), using defaults", e);
            Config::default()
        }
    };

    info!(
        "Scoring thresholds: helmet={:.2}, circularity=({:.1}, {:.1}), min_area={:.0}",
        config.scoring.helmet_threshold,
        config.scoring.circularity_min,
        config.scoring.circularity_max,
        config.scoring.min_contour_area,
    );

    // The fine table is built once here and only ever passed by reference.
    let violation_table = ViolationTable::standard();

    let locator = build_locator(&config);
    let mut analyzer = FrameAnalyzer::new(locator, config.clone());

    let plate_reader = if config.ocr.enabled {
        match std::env::var("OCR_API_KEY") {
            Ok(key) => Some(PlateReader::new(config.ocr.api_url.clone(), key)?),
            Err(_) => {
                warn!("OCR enabled but OCR_API_KEY not set, skipping plate extraction");
                None
            }
        }
    } else {
        None
    };

    let notifier = if config.notification.enabled {
        Some(ChallanNotifier::from_env()?)
    } else {
        None
    };

    let image_files = find_image_files(&config.input.image_dir);
    if image_files.is_empty() {
        error!("No image files found in {}", config.input.image_dir);
        return Ok(());
    }
    info!("Found {} image file(s) to analyze", image_files.len());

    std::fs::create_dir_all(&config.input.output_dir)?;

    let mut stats = ProcessingStats::default();
    let mut frame_results: Vec<FrameResult> = Vec::new();

    for (idx, path) in image_files.iter().enumerate() {
        info!(
            "Analyzing image {}/{}: {}",
            idx + 1,
            image_files.len(),
            path.display(),
        );

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                stats.failed += 1;
                continue;
            }
        };

        let report = match analyze_image(&mut analyzer, &bytes, plate_reader.as_ref()).await {
            Ok((result, plate)) => {
                stats.people += result.person_count;
                stats.people_without_helmets += result.people_without_helmets;
                if result.has_violation {
                    stats.violation_frames += 1;
                }
                frame_results.push(result.clone());
                DetectionReport::success(result, plate, &[], &violation_table)
            }
            Err(e) => {
                error!("Analysis failed for {}: {}", path.display(), e);
                stats.failed += 1;
                DetectionReport::failure(e.to_string())
            }
        };

        write_report(&config.input.output_dir, path, &report)?;
    }

    // A single image is just a sequence of length 1.
    if !frame_results.is_empty() {
        let aggregator = ViolationAggregator::new(&violation_table);
        let summary = aggregator.aggregate(&frame_results);
        let video_report = VideoReport::new(summary);

        if config.input.treat_as_sequence {
            let out_path = Path::new(&config.input.output_dir).join("sequence_report.json");
            std::fs::write(&out_path, serde_json::to_string_pretty(&video_report)?)?;
            info!("Sequence report written to {}", out_path.display());
        }

        if let Some(notifier) = &notifier {
            dispatch_challans(notifier, &video_report, &config, &violation_table).await;
        }
    }

    info!("\n========================================");
    info!("✓ Analysis complete");
    info!("  Images analyzed: {}", image_files.len() - stats.failed);
    info!("  Failed images: {}", stats.failed);
    info!("  People seen: {}", stats.people);
    info!("  People without helmets: {}", stats.people_without_helmets);
    info!("  Frames with violations: {}", stats.violation_frames);
    info!("========================================");

    Ok(())
}

#[derive(Default)]
struct ProcessingStats {
    failed: usize,
    people: usize,
    people_without_helmets: usize,
    violation_frames: usize,
}

#[cfg(feature = "detector-onnx")]
fn build_locator(config: &Config) -> Box<dyn HeadLocator> {
    match head_detection::OnnxHeadDetector::new(&config.model) {
        Ok(detector) => Box::new(detector),
        Err(e) => {
            warn!(
                "Could not load ONNX head detector ({}), falling back to stub locator",
                e,
            );
            Box::new(head_detection::FixedRegionLocator::empty())
        }
    }
}

#[cfg(not(feature = "detector-onnx"))]
fn build_locator(_config: &Config) -> Box<dyn HeadLocator> {
    warn!("Built without `detector-onnx`; using stub locator (zero people reported)");
    Box::new(head_detection::FixedRegionLocator::empty())
}

/// Decode, analyze, and optionally OCR one image. Decode failures surface
/// before any head location is attempted.
async fn analyze_image(
    analyzer: &mut FrameAnalyzer,
    bytes: &[u8],
    plate_reader: Option<&PlateReader>,
) -> Result<(FrameResult, Option<PlateResult>)> {
    let frame = preprocessing::decode_image_bytes(bytes)?;
    let result = analyzer.analyze(&frame)?;

    let plate = match plate_reader {
        Some(reader) => Some(reader.extract_number_plate(bytes).await),
        None => None,
    };

    Ok((result, plate))
}

/// One challan per unique violation kind in the sequence, each carrying that
/// kind's fine from the fixed table.
async fn dispatch_challans(
    notifier: &ChallanNotifier,
    report: &VideoReport,
    config: &Config,
    table: &ViolationTable,
) {
    if report.summary.unique_violations.is_empty() {
        return;
    }
    if config.notification.default_phone.is_empty() {
        warn!("Violations found but no challan phone number configured");
        return;
    }

    for &kind in &report.summary.unique_violations {
        let details = ChallanDetails {
            violation: kind,
            fine_amount: table.fine_for(kind),
            location: config.notification.location.clone(),
            timestamp: report.timestamp,
        };
        match notifier
            .send_challan(&config.notification.default_phone, &details, table)
            .await
        {
            Ok(receipt) => {
                if let Some(sid) = receipt.message_sid {
                    info!("Challan for {} delivered, SID {}", kind.as_str(), sid);
                }
            }
            Err(e) => error!("Failed to send challan for {}: {}", kind.as_str(), e),
        }
    }
}

fn find_image_files(dir: &str) -> Vec<PathBuf> {
    let image_extensions = ["jpg", "jpeg", "png", "bmp", "JPG", "JPEG", "PNG", "BMP"];

    let mut images: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map(|ext| image_extensions.contains(&ext.to_str().unwrap_or("")))
                .unwrap_or(false)
        })
        .map(|e| e.path().to_path_buf())
        .collect();

    // Frame order in a sequence follows sorted path order.
    images.sort();
    images
}

fn write_report(output_dir: &str, image_path: &Path, report: &DetectionReport) -> Result<()> {
    let stem = image_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("image");
    let out_path = Path::new(output_dir).join(format!("{}_report.json", stem));
    std::fs::write(&out_path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}
