//! Synthetic frame source.
//!
//! Renders a skin-colored patch whose green channel follows a sinusoidal
//! pulse. Used by the `monitor` demo and by session tests, so a full capture
//! pipeline can run without a camera.

use crate::rppg::frame::FrameBuf;
use crate::rppg::session::FrameSource;
use crate::rppg::types::Roi;
use std::f64::consts::PI;

const BACKGROUND: [u8; 3] = [24, 64, 36];
const SKIN_R: u8 = 200;
const SKIN_G: f64 = 140.0;
const SKIN_B: u8 = 110;

/// Frame source producing a pulsing face patch.
#[derive(Debug, Clone)]
pub struct SyntheticFrameSource {
    width: u32,
    height: u32,
    face: Roi,
    bpm: f64,
    fps: f64,
    amplitude: f64,
    /// Every n-th frame shows no face
    dropout_every: Option<u64>,
    frame_index: u64,
}

impl SyntheticFrameSource {
    /// A 64x48 frame with a centered face patch pulsing at `bpm`.
    pub fn new(bpm: f64, fps: f64) -> Self {
        Self {
            width: 64,
            height: 48,
            face: Roi::new(16, 8, 32, 32),
            bpm,
            fps,
            amplitude: 2.0,
            dropout_every: None,
            frame_index: 0,
        }
    }

    /// Peak deviation of the green channel.
    pub fn with_amplitude(mut self, amplitude: f64) -> Self {
        self.amplitude = amplitude;
        self
    }

    /// Hide the face on every `n`-th frame.
    pub fn with_dropout_every(mut self, n: u64) -> Self {
        self.dropout_every = if n == 0 { None } else { Some(n) };
        self
    }

    pub fn face(&self) -> Roi {
        self.face
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frame_index
    }

    fn green_at(&self, index: u64) -> f64 {
        let t = index as f64 / self.fps;
        SKIN_G + self.amplitude * (2.0 * PI * self.bpm / 60.0 * t).sin()
    }

    fn render(&self, index: u64) -> FrameBuf {
        let mut frame = FrameBuf::solid(self.width, self.height, BACKGROUND);

        if let Some(n) = self.dropout_every {
            if (index + 1) % n == 0 {
                return frame;
            }
        }

        // Spread the fractional part of the green level over the patch so the
        // spatial mean carries sub-integer pulse amplitude.
        let green = self.green_at(index);
        let base = green.floor();
        let pixels = self.face.area();
        let raised = ((green - base) * pixels as f64).round() as u64;

        let mut written = 0u64;
        for y in self.face.y..self.face.y + self.face.height {
            for x in self.face.x..self.face.x + self.face.width {
                let idx = ((y * self.width + x) * 3) as usize;
                let g = if written < raised { base + 1.0 } else { base };
                frame.pixels[idx] = SKIN_R;
                frame.pixels[idx + 1] = g as u8;
                frame.pixels[idx + 2] = SKIN_B;
                written += 1;
            }
        }

        frame
    }
}

impl FrameSource for SyntheticFrameSource {
    fn next_frame(&mut self) -> Option<FrameBuf> {
        let frame = self.render(self.frame_index);
        self.frame_index += 1;
        Some(frame)
    }
}
