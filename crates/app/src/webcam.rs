//! Optic feed overlay.
//!
//! Frames are grabbed on the repaint timer, not through the task runner: a
//! missed frame is cosmetic, so there is no delivery contract. A new frame
//! is only grabbed after the previous one was actually rendered; if the UI
//! falls behind, frames are dropped at the source.

use std::time::{Duration, Instant};

pub struct Frame {
    pub width: usize,
    pub height: usize,
    /// RGBA, row-major, `width * height * 4` bytes.
    pub rgba: Vec<u8>,
}

/// Camera acquisition seam. Real capture is a platform integration point;
/// the default source synthesizes a themed test pattern.
pub trait FrameSource: Send {
    fn grab(&mut self) -> Option<Frame>;
}

/// Animated teal gradient with a moving scanline. Stands in for a camera
/// wherever none is wired up.
pub struct SyntheticFrameSource {
    phase: u64,
    width: usize,
    height: usize,
}

impl SyntheticFrameSource {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            phase: 0,
            width,
            height,
        }
    }
}

impl FrameSource for SyntheticFrameSource {
    fn grab(&mut self) -> Option<Frame> {
        self.phase = self.phase.wrapping_add(1);
        let scanline = (self.phase as usize * 3) % self.height;
        let mut rgba = Vec::with_capacity(self.width * self.height * 4);
        for y in 0..self.height {
            for x in 0..self.width {
                let g = (40 + (x * 120 / self.width.max(1))) as u8;
                let b = (60 + (y * 150 / self.height.max(1))) as u8;
                let boost = if y == scanline { 90 } else { 0 };
                rgba.extend_from_slice(&[
                    20u8.saturating_add(boost),
                    g.saturating_add(boost),
                    b.saturating_add(boost),
                    255,
                ]);
            }
        }
        Some(Frame {
            width: self.width,
            height: self.height,
            rgba,
        })
    }
}

pub struct WebcamOverlay {
    source: Box<dyn FrameSource>,
    texture: Option<egui::TextureHandle>,
    last_grab: Instant,
    interval: Duration,
    /// A grabbed frame that the chat screen has not drawn yet.
    frame_pending: bool,
}

impl WebcamOverlay {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            source,
            texture: None,
            last_grab: Instant::now(),
            interval: Duration::from_millis(100),
            frame_pending: false,
        }
    }

    pub fn synthetic() -> Self {
        Self::new(Box::new(SyntheticFrameSource::new(160, 120)))
    }

    fn should_grab(&self) -> bool {
        !self.frame_pending && self.last_grab.elapsed() >= self.interval
    }

    /// Called each frame from the chat screen. Uploads at most one new
    /// texture per render of the previous one.
    pub fn tick(&mut self, ctx: &egui::Context) {
        if !self.should_grab() {
            return;
        }
        let Some(frame) = self.source.grab() else {
            return;
        };
        if frame.rgba.len() != frame.width * frame.height * 4 {
            tracing::warn!("dropping malformed frame from camera source");
            return;
        }
        let image =
            egui::ColorImage::from_rgba_unmultiplied([frame.width, frame.height], &frame.rgba);
        match &mut self.texture {
            Some(tex) => tex.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.texture = Some(ctx.load_texture("optic-feed", image, egui::TextureOptions::LINEAR))
            }
        }
        self.last_grab = Instant::now();
        self.frame_pending = true;
    }

    /// Texture to draw, if any. The caller must call `mark_rendered` once it
    /// has been painted so the next grab is allowed.
    pub fn texture(&self) -> Option<&egui::TextureHandle> {
        self.texture.as_ref()
    }

    pub fn mark_rendered(&mut self) {
        self.frame_pending = false;
    }

    #[cfg(test)]
    fn note_grabbed(&mut self) {
        self.frame_pending = true;
        self.last_grab = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_source_produces_well_formed_frames() {
        let mut src = SyntheticFrameSource::new(32, 24);
        let a = src.grab().unwrap();
        assert_eq!(a.rgba.len(), 32 * 24 * 4);

        // Phase advances, so consecutive frames differ.
        let b = src.grab().unwrap();
        assert_ne!(a.rgba, b.rgba);
    }

    #[test]
    fn test_unrendered_frame_blocks_the_next_grab() {
        let mut overlay = WebcamOverlay::synthetic();
        overlay.interval = Duration::ZERO;
        assert!(overlay.should_grab());

        overlay.note_grabbed();
        assert!(!overlay.should_grab());

        overlay.mark_rendered();
        assert!(overlay.should_grab());
    }
}
