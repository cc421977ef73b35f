// src/helmet_region.rs
//
// Maps a detected head rectangle to the sub-region expected to contain
// headgear: same horizontal span as the head, extending 0.8·h above the
// head top and reaching 1.2·h below it. All coordinates are clamped to the
// image; a region that collapses to zero area yields None, which the scorer
// treats as "no helmet, confidence 0".

use crate::types::{HeadRegion, RegionConfig};

pub fn extract_helmet_region(
    image_width: usize,
    image_height: usize,
    head: &HeadRegion,
    geometry: &RegionConfig,
) -> Option<HeadRegion> {
    let head_h = head.height as i64;

    let top = head.y as i64 - (head_h as f32 * geometry.up_ratio) as i64;
    let bottom = head.y as i64 + (head_h as f32 * geometry.down_ratio) as i64;

    let x0 = (head.x as i64).clamp(0, image_width as i64);
    let x1 = (head.x as i64 + head.width as i64).clamp(0, image_width as i64);
    let y0 = top.clamp(0, image_height as i64);
    let y1 = bottom.clamp(0, image_height as i64);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(HeadRegion::new(
        x0 as i32,
        y0 as i32,
        (x1 - x0) as u32,
        (y1 - y0) as u32,
    ))
}
