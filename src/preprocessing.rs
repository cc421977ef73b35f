// src/preprocessing.rs
//
// Image intake and pixel-level helpers shared by the pipeline:
// decoding caller-supplied bytes (raw or base64 data URLs) into RGB frames,
// cropping head regions, grayscale conversion, and JPEG encoding for
// outbound HTTP payloads.

use crate::error::PipelineError;
use crate::types::{Frame, HeadRegion};
use base64::Engine;

/// Decode encoded image bytes (JPEG/PNG/...) into an RGB frame.
/// Undecodable bytes fail with `ImageDecode` before any detection runs.
pub fn decode_image_bytes(bytes: &[u8]) -> Result<Frame, PipelineError> {
    let img = image::load_from_memory(bytes)?;
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();
    Ok(Frame::new(
        rgb.into_raw(),
        width as usize,
        height as usize,
    ))
}

/// Decode a base64 image string, tolerating a `data:image/...;base64,` prefix
/// the way upstream clients send it.
pub fn decode_base64_image(data: &str) -> Result<Frame, PipelineError> {
    let payload = match data.split_once(',') {
        Some((_prefix, rest)) => rest,
        None => data,
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(payload.trim())
        .map_err(|e| {
            PipelineError::ImageDecode(image::ImageError::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid base64 image data: {}", e),
            )))
        })?;
    decode_image_bytes(&bytes)
}

/// Copy the pixels of `region` out of the frame into a standalone RGB buffer.
/// The region must already be clamped to frame bounds.
pub fn crop_region(frame: &Frame, region: &HeadRegion) -> Vec<u8> {
    let x0 = region.x.max(0) as usize;
    let y0 = region.y.max(0) as usize;
    let w = region.width as usize;
    let h = region.height as usize;

    let mut out = Vec::with_capacity(w * h * 3);
    for y in y0..(y0 + h).min(frame.height) {
        let row_start = (y * frame.width + x0) * 3;
        let row_end = row_start + w.min(frame.width - x0) * 3;
        out.extend_from_slice(&frame.data[row_start..row_end]);
    }
    out
}

/// RGB → single-channel luma, same weights OpenCV uses for grayscale.
pub fn rgb_to_gray(rgb: &[u8], width: usize, height: usize) -> Vec<u8> {
    let mut gray = vec![0u8; width * height];
    for i in 0..width * height {
        let r = rgb[i * 3] as f32;
        let g = rgb[i * 3 + 1] as f32;
        let b = rgb[i * 3 + 2] as f32;
        gray[i] = (0.299 * r + 0.587 * g + 0.114 * b).round() as u8;
    }
    gray
}

/// Bilinear image resize on raw RGB data.
pub fn resize_bilinear(
    src: &[u8],
    src_w: usize,
    src_h: usize,
    dst_w: usize,
    dst_h: usize,
) -> Vec<u8> {
    let mut dst = vec![0u8; dst_h * dst_w * 3];

    let x_ratio = src_w as f32 / dst_w as f32;
    let y_ratio = src_h as f32 / dst_h as f32;

    for dy in 0..dst_h {
        for dx in 0..dst_w {
            let sx = dx as f32 * x_ratio;
            let sy = dy as f32 * y_ratio;

            let sx0 = sx.floor() as usize;
            let sy0 = sy.floor() as usize;
            let sx1 = (sx0 + 1).min(src_w - 1);
            let sy1 = (sy0 + 1).min(src_h - 1);

            let fx = sx - sx0 as f32;
            let fy = sy - sy0 as f32;

            for c in 0..3 {
                let p00 = src[(sy0 * src_w + sx0) * 3 + c] as f32;
                let p10 = src[(sy0 * src_w + sx1) * 3 + c] as f32;
                let p01 = src[(sy1 * src_w + sx0) * 3 + c] as f32;
                let p11 = src[(sy1 * src_w + sx1) * 3 + c] as f32;

                let val = p00 * (1.0 - fx) * (1.0 - fy)
                    + p10 * fx * (1.0 - fy)
                    + p01 * (1.0 - fx) * fy
                    + p11 * fx * fy;

                dst[(dy * dst_w + dx) * 3 + c] = val.round() as u8;
            }
        }
    }

    dst
}

/// Encode raw RGB bytes into a JPEG. Returns None on failure.
pub fn encode_rgb_to_jpeg(
    rgb_data: &[u8],
    width: usize,
    height: usize,
    quality: u8,
) -> Option<Vec<u8>> {
    use image::{ImageBuffer, RgbImage};

    let expected_len = width * height * 3;
    if rgb_data.len() < expected_len {
        return None;
    }

    let img: RgbImage = ImageBuffer::from_raw(
        width as u32,
        height as u32,
        rgb_data[..expected_len].to_vec(),
    )?;

    let mut buf = std::io::Cursor::new(Vec::new());
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, quality);
    img.write_with_encoder(encoder).ok()?;

    Some(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: usize, height: usize, rgb: [u8; 3]) -> Frame {
        let mut data = Vec::with_capacity(width * height * 3);
        for _ in 0..width * height {
            data.extend_from_slice(&rgb);
        }
        Frame::new(data, width, height)
    }

    #[test]
    fn test_decode_rejects_garbage_bytes() {
        let result = decode_image_bytes(b"definitely not an image");
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn test_decode_roundtrip_via_jpeg() {
        let frame = solid_frame(32, 24, [200, 50, 50]);
        let jpeg = encode_rgb_to_jpeg(&frame.data, frame.width, frame.height, 90).unwrap();
        let decoded = decode_image_bytes(&jpeg).unwrap();
        assert_eq!(decoded.width, 32);
        assert_eq!(decoded.height, 24);
    }

    #[test]
    fn test_decode_base64_with_data_url_prefix() {
        let frame = solid_frame(16, 16, [10, 20, 30]);
        let jpeg = encode_rgb_to_jpeg(&frame.data, frame.width, frame.height, 90).unwrap();
        let b64 = base64::engine::general_purpose::STANDARD.encode(&jpeg);
        let with_prefix = format!("data:image/jpeg;base64,{}", b64);

        let decoded = decode_base64_image(&with_prefix).unwrap();
        assert_eq!(decoded.width, 16);

        let bare = decode_base64_image(&b64).unwrap();
        assert_eq!(bare.height, 16);
    }

    #[test]
    fn test_decode_base64_garbage_is_decode_error() {
        let result = decode_base64_image("data:image/png;base64,@@not-base64@@");
        assert!(matches!(result, Err(PipelineError::ImageDecode(_))));
    }

    #[test]
    fn test_crop_region_extracts_expected_pixels() {
        // 4x4 frame, left half red, right half blue
        let mut data = Vec::new();
        for _y in 0..4 {
            for x in 0..4 {
                if x < 2 {
                    data.extend_from_slice(&[255, 0, 0]);
                } else {
                    data.extend_from_slice(&[0, 0, 255]);
                }
            }
        }
        let frame = Frame::new(data, 4, 4);
        let region = HeadRegion::new(2, 0, 2, 4);
        let crop = crop_region(&frame, &region);
        assert_eq!(crop.len(), 2 * 4 * 3);
        assert!(crop.chunks(3).all(|px| px == [0, 0, 255]));
    }

    #[test]
    fn test_rgb_to_gray_weights() {
        let gray = rgb_to_gray(&[255, 255, 255, 0, 0, 0], 2, 1);
        assert_eq!(gray, vec![255, 0]);
    }

    #[test]
    fn test_resize() {
        let src = vec![255u8; 100 * 100 * 3];
        let dst = resize_bilinear(&src, 100, 100, 50, 50);
        assert_eq!(dst.len(), 50 * 50 * 3);
    }
}
