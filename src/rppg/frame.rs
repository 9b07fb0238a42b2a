//! Frame views, skin-region localisation and color extraction.
//!
//! Frames are supplied by the capture side and only borrowed for the duration
//! of a call. Nothing here keeps pixel data around.

use crate::rppg::types::{ColorSample, Roi};
use chrono::{DateTime, Utc};

/// Minimum share of sampled pixels that must look like skin.
const MIN_SKIN_FRACTION: f64 = 0.05;

/// Minimum edge length of a usable region, in pixels.
const MIN_ROI_EDGE: u32 = 4;

/// Target number of sampled columns/rows when scanning for skin.
const SCAN_RESOLUTION: u32 = 96;

/// Borrowed view of a packed RGB or RGBA frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub width: u32,
    pub height: u32,
    /// 3 (RGB) or 4 (RGBA)
    pub channels: u8,
    pub pixels: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn new(width: u32, height: u32, channels: u8, pixels: &'a [u8]) -> Self {
        Self {
            width,
            height,
            channels,
            pixels,
        }
    }

    /// Whether the buffer is large enough for the declared geometry.
    pub fn is_readable(&self) -> bool {
        if self.width == 0 || self.height == 0 || !(self.channels == 3 || self.channels == 4) {
            return false;
        }
        let expected = self.width as usize * self.height as usize * self.channels as usize;
        self.pixels.len() >= expected
    }

    fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let idx = (y as usize * self.width as usize + x as usize) * self.channels as usize;
        (self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2])
    }
}

/// Owned frame as handed over by a frame source.
#[derive(Debug, Clone)]
pub struct FrameBuf {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
    pub pixels: Vec<u8>,
}

impl FrameBuf {
    /// A frame filled with a single RGB color.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self {
            width,
            height,
            channels: 3,
            pixels,
        }
    }

    pub fn as_frame(&self) -> Frame<'_> {
        Frame::new(self.width, self.height, self.channels, &self.pixels)
    }
}

/// Rule-based skin classifier for uniform daylight (Kovac et al.).
fn is_skin(r: u8, g: u8, b: u8) -> bool {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    r > 95 && g > 40 && b > 20 && max - min > 15 && (r - g).abs() > 15 && r > g && r > b
}

/// Locate a face-like skin region in the frame.
///
/// Returns `None` when no region of plausible size is found or the frame is
/// unreadable. A `None` only means this frame is skipped for extraction.
pub fn detect_roi(frame: &Frame<'_>) -> Option<Roi> {
    if !frame.is_readable() {
        return None;
    }

    let step = (frame.width.min(frame.height) / SCAN_RESOLUTION).max(1);
    let mut sampled = 0u64;
    let mut skin = 0u64;
    let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
    let (mut max_x, mut max_y) = (0u32, 0u32);

    for y in (0..frame.height).step_by(step as usize) {
        for x in (0..frame.width).step_by(step as usize) {
            sampled += 1;
            let (r, g, b) = frame.pixel(x, y);
            if is_skin(r, g, b) {
                skin += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
    }

    if sampled == 0 || (skin as f64 / sampled as f64) < MIN_SKIN_FRACTION {
        return None;
    }

    let width = (max_x - min_x + 1).min(frame.width - min_x);
    let height = (max_y - min_y + 1).min(frame.height - min_y);
    if width < MIN_ROI_EDGE || height < MIN_ROI_EDGE {
        return None;
    }

    Some(Roi::new(min_x, min_y, width, height))
}

/// Spatial average of the pixel channels inside `roi`.
///
/// Returns `None` when the ROI is absent, falls outside the frame, or the
/// frame buffer is unreadable.
pub fn extract_color(
    frame: &Frame<'_>,
    roi: Option<&Roi>,
    timestamp: DateTime<Utc>,
) -> Option<ColorSample> {
    let roi = roi?;
    if !frame.is_readable() || !roi.fits_within(frame.width, frame.height) {
        return None;
    }

    let (mut sum_r, mut sum_g, mut sum_b) = (0u64, 0u64, 0u64);
    for y in roi.y..roi.y + roi.height {
        for x in roi.x..roi.x + roi.width {
            let (r, g, b) = frame.pixel(x, y);
            sum_r += r as u64;
            sum_g += g as u64;
            sum_b += b as u64;
        }
    }

    let count = roi.area() as f64;
    Some(ColorSample::new(
        sum_r as f64 / count,
        sum_g as f64 / count,
        sum_b as f64 / count,
        timestamp,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SKIN: [u8; 3] = [200, 140, 110];

    fn frame_with_face(width: u32, height: u32, face: Roi) -> FrameBuf {
        let mut buf = FrameBuf::solid(width, height, [20, 60, 30]);
        for y in face.y..face.y + face.height {
            for x in face.x..face.x + face.width {
                let idx = ((y * width + x) * 3) as usize;
                buf.pixels[idx..idx + 3].copy_from_slice(&SKIN);
            }
        }
        buf
    }

    #[test]
    fn test_detects_skin_patch() {
        let face = Roi::new(16, 8, 24, 30);
        let buf = frame_with_face(64, 48, face);

        let roi = detect_roi(&buf.as_frame()).expect("face should be found");
        assert_eq!(roi, face);
    }

    #[test]
    fn test_no_face_in_background() {
        let buf = FrameBuf::solid(64, 48, [20, 60, 30]);
        assert!(detect_roi(&buf.as_frame()).is_none());
    }

    #[test]
    fn test_unreadable_frame() {
        let pixels = vec![0u8; 10];
        let frame = Frame::new(64, 48, 3, &pixels);
        assert!(!frame.is_readable());
        assert!(detect_roi(&frame).is_none());
        assert!(extract_color(&frame, Some(&Roi::new(0, 0, 2, 2)), Utc::now()).is_none());
    }

    #[test]
    fn test_extract_color_average() {
        let face = Roi::new(16, 8, 24, 30);
        let buf = frame_with_face(64, 48, face);

        let sample = extract_color(&buf.as_frame(), Some(&face), Utc::now()).unwrap();
        assert_eq!(sample.r, 200.0);
        assert_eq!(sample.g, 140.0);
        assert_eq!(sample.b, 110.0);
    }

    #[test]
    fn test_extract_color_requires_roi() {
        let buf = FrameBuf::solid(8, 8, SKIN);
        let frame = buf.as_frame();
        assert!(extract_color(&frame, None, Utc::now()).is_none());
        assert!(extract_color(&frame, Some(&Roi::new(4, 4, 8, 8)), Utc::now()).is_none());
    }

    #[test]
    fn test_rgba_frames() {
        let pixels: Vec<u8> = [200u8, 140, 110, 255]
            .iter()
            .copied()
            .cycle()
            .take(16 * 16 * 4)
            .collect();
        let frame = Frame::new(16, 16, 4, &pixels);
        let roi = detect_roi(&frame).unwrap();
        assert_eq!(roi, Roi::new(0, 0, 16, 16));
        let sample = extract_color(&frame, Some(&roi), Utc::now()).unwrap();
        assert_eq!(sample.g, 140.0);
    }
}
