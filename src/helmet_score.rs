// src/helmet_score.rs
//
// HSV-based helmet scoring for head regions.
//
// Combines two independent signals over the candidate headgear region:
//   - COLOR: fraction of pixels falling inside fixed HSV bands for common
//     helmet colors (black, white, red, blue, yellow)
//   - SHAPE: accumulated circularity of dome-like edge contours
//
// The result is an explicit, auditable heuristic: every threshold lives in
// ScoringConfig rather than inside a trained model.

use image::GrayImage;
use imageproc::contours::find_contours;
use imageproc::edges::canny;
use imageproc::point::Point;
use tracing::debug;

use crate::preprocessing::{crop_region, rgb_to_gray};
use crate::types::{Frame, HeadRegion, ScoringConfig};

// ============================================================================
// COLOR BANDS
// ============================================================================

/// One closed HSV range in OpenCV scale (H 0-180, S 0-255, V 0-255).
struct ColorBand {
    name: &'static str,
    h: (u8, u8),
    s: (u8, u8),
    v: (u8, u8),
}

/// Common helmet colors. A pixel is counted once per band it falls in;
/// overlapping bands may double-count; accepted heuristic behavior.
const HELMET_BANDS: [ColorBand; 5] = [
    ColorBand {
        name: "black",
        h: (0, 180),
        s: (0, 255),
        v: (0, 50),
    },
    ColorBand {
        name: "white",
        h: (0, 180),
        s: (0, 30),
        v: (200, 255),
    },
    ColorBand {
        name: "red",
        h: (0, 10),
        s: (120, 255),
        v: (70, 255),
    },
    ColorBand {
        name: "blue",
        h: (100, 130),
        s: (150, 255),
        v: (0, 255),
    },
    ColorBand {
        name: "yellow",
        h: (20, 30),
        s: (100, 255),
        v: (100, 255),
    },
];

impl ColorBand {
    fn contains(&self, h: u8, s: u8, v: u8) -> bool {
        h >= self.h.0
            && h <= self.h.1
            && s >= self.s.0
            && s <= self.s.1
            && v >= self.v.0
            && v <= self.v.1
    }
}

// ============================================================================
// HSV CONVERSION
// ============================================================================

/// Convert RGB to HSV in OpenCV scale: H 0-180, S 0-255, V 0-255.
#[inline]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let r_n = r as f32 / 255.0;
    let g_n = g as f32 / 255.0;
    let b_n = b as f32 / 255.0;

    let max = r_n.max(g_n).max(b_n);
    let min = r_n.min(g_n).min(b_n);
    let delta = max - min;

    let h = if delta < 1e-6 {
        0.0
    } else if (max - r_n).abs() < 1e-6 {
        60.0 * (((g_n - b_n) / delta) % 6.0)
    } else if (max - g_n).abs() < 1e-6 {
        60.0 * (((b_n - r_n) / delta) + 2.0)
    } else {
        60.0 * (((r_n - g_n) / delta) + 4.0)
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    let s = if max < 1e-6 { 0.0 } else { delta / max };

    (
        (h / 2.0).round().min(180.0) as u8,
        (s * 255.0).round() as u8,
        (max * 255.0).round() as u8,
    )
}

// ============================================================================
// SCORE RESULT
// ============================================================================

/// Outcome of scoring one helmet-candidate region.
#[derive(Debug, Clone)]
pub struct HelmetScore {
    pub has_helmet: bool,
    /// Percentage confidence, capped below certainty.
    pub confidence: f32,
    /// Fraction of region pixels matching any helmet color band.
    /// Not clamped; overlapping bands can push it past 1.0.
    pub color_coverage: f32,
    /// Accumulated circularity of dome-like contours.
    pub shape_score: f32,
}

impl HelmetScore {
    fn none() -> Self {
        Self {
            has_helmet: false,
            confidence: 0.0,
            color_coverage: 0.0,
            shape_score: 0.0,
        }
    }
}

// ============================================================================
// SCORER
// ============================================================================

pub struct HelmetScorer {
    config: ScoringConfig,
}

impl HelmetScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Score a helmet-candidate region. An empty (collapsed) region is a
    /// valid input and deterministically yields "no helmet, confidence 0".
    /// This function is total: per-contour anomalies are dropped locally and
    /// never abort the call.
    pub fn score(&self, frame: &Frame, region: Option<&HeadRegion>) -> HelmetScore {
        let region = match region {
            Some(r) if r.area() > 0 => r,
            _ => return HelmetScore::none(),
        };

        let rgb = crop_region(frame, region);
        let width = region.width as usize;
        let height = region.height as usize;
        let total_pixels = width * height;
        if total_pixels == 0 || rgb.len() < total_pixels * 3 {
            return HelmetScore::none();
        }

        let color_coverage = self.color_coverage(&rgb, total_pixels);
        let shape_score = self.shape_score(&rgb, width, height);

        let (has_helmet, confidence) = self.combine(color_coverage, shape_score);

        debug!(
            "🪖 region {}x{}: coverage={:.3} shape={:.3} -> helmet={} conf={:.1}",
            width, height, color_coverage, shape_score, has_helmet, confidence,
        );

        HelmetScore {
            has_helmet,
            confidence,
            color_coverage,
            shape_score,
        }
    }

    fn color_coverage(&self, rgb: &[u8], total_pixels: usize) -> f32 {
        let mut band_counts = [0u64; HELMET_BANDS.len()];
        for px in rgb.chunks_exact(3) {
            let (h, s, v) = rgb_to_hsv(px[0], px[1], px[2]);
            for (band, count) in HELMET_BANDS.iter().zip(band_counts.iter_mut()) {
                if band.contains(h, s, v) {
                    *count += 1;
                }
            }
        }

        for (band, count) in HELMET_BANDS.iter().zip(band_counts.iter()) {
            if *count > 0 {
                debug!("  band {}: {} px", band.name, count);
            }
        }

        let matched: u64 = band_counts.iter().sum();
        matched as f32 / total_pixels as f32
    }

    /// Edge-contour dome heuristic: Canny edges, external contours, and
    /// circularity accumulation for rounded shapes of meaningful size.
    fn shape_score(&self, rgb: &[u8], width: usize, height: usize) -> f32 {
        let gray = rgb_to_gray(rgb, width, height);
        let gray_img = match GrayImage::from_raw(width as u32, height as u32, gray) {
            Some(img) => img,
            None => return 0.0,
        };

        let edges = canny(&gray_img, self.config.canny_low, self.config.canny_high);
        let contours = find_contours::<i32>(&edges);

        let mut score = 0.0f32;
        for contour in &contours {
            if contour.parent.is_some() {
                // Only external contours, matching RETR_EXTERNAL behavior.
                continue;
            }
            let area = polygon_area(&contour.points);
            if area <= self.config.min_contour_area {
                continue;
            }
            // Degenerate perimeters are skipped instead of aborting the call.
            if let Some(circularity) = contour_circularity(&contour.points) {
                if circularity > self.config.circularity_min
                    && circularity < self.config.circularity_max
                {
                    score += circularity;
                }
            }
        }
        score
    }

    /// Weighted combination and thresholding. Kept separate so the monotonic
    /// threshold relation between the raw score and the boolean verdict is
    /// directly testable.
    fn combine(&self, color_coverage: f32, shape_score: f32) -> (bool, f32) {
        let raw = self.config.color_weight * color_coverage
            + self.config.shape_weight * shape_score.min(1.0);
        let has_helmet = raw > self.config.helmet_threshold;
        (has_helmet, (raw * 100.0).min(self.config.max_confidence))
    }
}

// ============================================================================
// CONTOUR GEOMETRY
// ============================================================================

/// Shoelace area of a closed contour.
fn polygon_area(points: &[Point<i32>]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum: i64 = 0;
    for i in 0..points.len() {
        let p = points[i];
        let q = points[(i + 1) % points.len()];
        sum += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    (sum.abs() as f32) / 2.0
}

fn polygon_perimeter(points: &[Point<i32>]) -> f32 {
    if points.len() < 2 {
        return 0.0;
    }
    let mut total = 0.0f32;
    for i in 0..points.len() {
        let p = points[i];
        let q = points[(i + 1) % points.len()];
        let dx = (p.x - q.x) as f32;
        let dy = (p.y - q.y) as f32;
        total += (dx * dx + dy * dy).sqrt();
    }
    total
}

/// `4π·area / perimeter²`, peaking near 1 for a perfect circle.
/// Returns None for degenerate contours (zero or near-zero perimeter).
fn contour_circularity(points: &[Point<i32>]) -> Option<f32> {
    let perimeter = polygon_perimeter(points);
    if perimeter <= f32::EPSILON {
        return None;
    }
    let area = polygon_area(points);
    let circularity = 4.0 * std::f32::consts::PI * area / (perimeter * perimeter);
    if circularity.is_finite() {
        Some(circularity)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> HelmetScorer {
        HelmetScorer::new(ScoringConfig::default())
    }

    /// Frame whose top rows are one color and bottom rows another.
    fn split_frame(
        width: usize,
        height: usize,
        top_rows: usize,
        top: [u8; 3],
        bottom: [u8; 3],
    ) -> Frame {
        let mut data = Vec::with_capacity(width * height * 3);
        for y in 0..height {
            for _x in 0..width {
                data.extend_from_slice(if y < top_rows { &top } else { &bottom });
            }
        }
        Frame::new(data, width, height)
    }

    #[test]
    fn test_hsv_black_white_primaries() {
        let (_, s, v) = rgb_to_hsv(0, 0, 0);
        assert_eq!((s, v), (0, 0));

        let (_, s, v) = rgb_to_hsv(255, 255, 255);
        assert_eq!((s, v), (0, 255));

        let (h, s, v) = rgb_to_hsv(255, 0, 0);
        assert_eq!((h, s, v), (0, 255, 255));

        let (h, _, _) = rgb_to_hsv(0, 0, 255);
        assert_eq!(h, 120); // OpenCV blue hue

        let (h, _, _) = rgb_to_hsv(255, 255, 0);
        assert_eq!(h, 30); // OpenCV yellow hue
    }

    #[test]
    fn test_empty_region_scores_zero() {
        let frame = split_frame(20, 20, 10, [0, 0, 0], [0, 0, 0]);
        let result = scorer().score(&frame, None);
        assert!(!result.has_helmet);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_black_helmet_block_scores_42() {
        // 70% of the region is black-band, the rest mid-gray (matches no
        // band). The single color boundary is too small a contour to add any
        // shape score, so raw = 0.6 * 0.7 = 0.42 -> confidence 42.0.
        let frame = split_frame(20, 20, 14, [0, 0, 0], [120, 120, 120]);
        let region = HeadRegion::new(0, 0, 20, 20);
        let result = scorer().score(&frame, Some(&region));

        assert!((result.color_coverage - 0.7).abs() < 1e-6);
        assert_eq!(result.shape_score, 0.0);
        assert!(result.has_helmet);
        assert!((result.confidence - 42.0).abs() < 1e-3);
    }

    #[test]
    fn test_featureless_region_scores_zero() {
        // Uniform mid-gray: no band matches, no edges at all.
        let frame = split_frame(20, 20, 20, [120, 120, 120], [120, 120, 120]);
        let region = HeadRegion::new(0, 0, 20, 20);
        let result = scorer().score(&frame, Some(&region));

        assert!(!result.has_helmet);
        assert_eq!(result.confidence, 0.0);
        assert_eq!(result.color_coverage, 0.0);
        assert_eq!(result.shape_score, 0.0);
    }

    #[test]
    fn test_confidence_capped_below_certainty() {
        // Full-coverage color plus saturated shape would exceed 100 raw.
        let s = scorer();
        let (has_helmet, confidence) = s.combine(1.2, 5.0);
        assert!(has_helmet);
        assert_eq!(confidence, 95.0);
    }

    #[test]
    fn test_threshold_is_monotonic_on_raw_score() {
        let s = scorer();
        // Just below: raw = 0.6 * 0.25 = 0.15, not strictly greater.
        let (below, conf_below) = s.combine(0.25, 0.0);
        assert!(!below);
        assert!((conf_below - 15.0).abs() < 1e-3);

        // Just above.
        let (above, _) = s.combine(0.2501, 0.0);
        assert!(above);
    }

    #[test]
    fn test_square_contour_circularity() {
        let points = vec![
            Point::new(0, 0),
            Point::new(20, 0),
            Point::new(20, 20),
            Point::new(0, 20),
        ];
        assert_eq!(polygon_area(&points), 400.0);
        assert_eq!(polygon_perimeter(&points), 80.0);
        let circ = contour_circularity(&points).unwrap();
        assert!((circ - std::f32::consts::FRAC_PI_4).abs() < 1e-4);
    }

    #[test]
    fn test_degenerate_contour_is_skipped_not_fatal() {
        assert!(contour_circularity(&[Point::new(5, 5)]).is_none());
        assert!(contour_circularity(&[Point::new(5, 5), Point::new(5, 5)]).is_none());
    }

    #[test]
    fn test_scoring_is_total_on_noisy_region() {
        // Checkerboard-ish noise: lots of edges, many tiny contours. The
        // call must produce finite, bounded values no matter what.
        let mut data = Vec::new();
        for y in 0..40usize {
            for x in 0..40usize {
                let v = if (x / 2 + y / 2) % 2 == 0 { 230 } else { 20 };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        let frame = Frame::new(data, 40, 40);
        let region = HeadRegion::new(0, 0, 40, 40);
        let result = scorer().score(&frame, Some(&region));

        assert!(result.confidence.is_finite());
        assert!(result.confidence >= 0.0 && result.confidence <= 95.0);
        assert!(result.shape_score.is_finite());
    }
}
