//! Decorative background painters: starfield, particle drift, neural web,
//! and the pulsing status lamp. Pure cosmetics, driven by wall-clock time so
//! they animate across repaints without any stored state.

use crate::types::StatusIndicator;
use egui::{Color32, Painter, Pos2, Rect, Stroke};

/// Deterministic pseudo-random in [0, 1) from an index. Cheap hash, good
/// enough for scattering dots.
fn hash01(i: u64) -> f32 {
    let mut x = i.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    x ^= x >> 33;
    x = x.wrapping_mul(0xFF51_AFD7_ED55_8CCD);
    x ^= x >> 33;
    (x % 10_000) as f32 / 10_000.0
}

/// Falling stars over a faint grid (login screen).
pub fn paint_starfield(painter: &Painter, rect: Rect, time: f64) {
    let grid = Color32::from_rgba_unmultiplied(0, 180, 190, 14);
    let step = 48.0;
    let mut x = rect.left();
    while x < rect.right() {
        painter.line_segment(
            [Pos2::new(x, rect.top()), Pos2::new(x, rect.bottom())],
            Stroke::new(1.0, grid),
        );
        x += step;
    }
    let mut y = rect.top();
    while y < rect.bottom() {
        painter.line_segment(
            [Pos2::new(rect.left(), y), Pos2::new(rect.right(), y)],
            Stroke::new(1.0, grid),
        );
        y += step;
    }

    for i in 0..90u64 {
        let speed = 14.0 + hash01(i * 7 + 1) * 40.0;
        let x = rect.left() + hash01(i) * rect.width();
        let y = rect.top() + ((hash01(i * 3 + 2) * rect.height()) + time as f32 * speed) % rect.height();
        let brightness = (120.0 + hash01(i * 5 + 3) * 135.0) as u8;
        painter.circle_filled(
            Pos2::new(x, y),
            0.8 + hash01(i * 11 + 4) * 1.4,
            Color32::from_rgba_unmultiplied(brightness, brightness, 255, 160),
        );
    }
}

/// Slowly drifting particle field (setup screen).
pub fn paint_particles(painter: &Painter, rect: Rect, time: f64) {
    for i in 0..60u64 {
        let drift_x = (time as f32 * (4.0 + hash01(i) * 10.0)) % rect.width();
        let x = rect.left() + (hash01(i * 13 + 5) * rect.width() + drift_x) % rect.width();
        let y = rect.top()
            + (hash01(i * 17 + 6) * rect.height()
                + (time as f32 * 0.35 * (1.0 + hash01(i * 19 + 7))).sin() * 18.0)
                .rem_euclid(rect.height());
        painter.circle_filled(
            Pos2::new(x, y),
            1.0 + hash01(i * 23 + 8) * 2.0,
            Color32::from_rgba_unmultiplied(0, 200, 210, 70),
        );
    }
}

/// Node-and-edge web behind the chat transcript.
pub fn paint_neural_web(painter: &Painter, rect: Rect, time: f64) {
    const NODES: u64 = 18;
    let mut points = Vec::with_capacity(NODES as usize);
    for i in 0..NODES {
        let wobble = (time as f32 * (0.3 + hash01(i * 29 + 9)) + hash01(i) * 6.28).sin() * 10.0;
        points.push(Pos2::new(
            rect.left() + hash01(i * 31 + 10) * rect.width() + wobble,
            rect.top() + hash01(i * 37 + 11) * rect.height() + wobble * 0.6,
        ));
    }
    for (i, a) in points.iter().enumerate() {
        for b in points.iter().skip(i + 1) {
            let dist = a.distance(*b);
            if dist < rect.width() * 0.22 {
                let alpha = (26.0 * (1.0 - dist / (rect.width() * 0.22))) as u8;
                painter.line_segment(
                    [*a, *b],
                    Stroke::new(1.0, Color32::from_rgba_unmultiplied(0, 160, 180, alpha)),
                );
            }
        }
        painter.circle_filled(*a, 2.0, Color32::from_rgba_unmultiplied(0, 210, 220, 90));
    }
}

pub fn status_color(status: StatusIndicator) -> Color32 {
    match status {
        StatusIndicator::Online => Color32::from_rgb(60, 220, 140),
        StatusIndicator::Connecting => Color32::from_rgb(240, 200, 70),
        StatusIndicator::Thinking => Color32::from_rgb(80, 170, 255),
        StatusIndicator::Offline => Color32::from_rgb(230, 90, 90),
    }
}

/// Pulsing status lamp.
pub fn paint_status_indicator(painter: &Painter, center: Pos2, status: StatusIndicator, time: f64) {
    let pulse = ((time * 2.4).sin() as f32 + 1.0) / 2.0;
    let color = status_color(status);
    painter.circle_filled(
        center,
        7.0 + pulse * 3.0,
        Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), 50),
    );
    painter.circle_filled(center, 5.0, color);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash01_is_deterministic_and_in_range() {
        for i in 0..1000 {
            let v = hash01(i);
            assert!((0.0..1.0).contains(&v), "hash01({i}) = {v}");
            assert_eq!(v, hash01(i));
        }
    }

    #[test]
    fn test_status_colors_are_distinct() {
        let colors = [
            status_color(StatusIndicator::Online),
            status_color(StatusIndicator::Connecting),
            status_color(StatusIndicator::Thinking),
            status_color(StatusIndicator::Offline),
        ];
        for (i, a) in colors.iter().enumerate() {
            for b in colors.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }
}
