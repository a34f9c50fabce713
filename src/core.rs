pub use kurbo::{Affine, Point, Rect, Vec2};

/// Side length of the virtual canvas, in logical units.
///
/// Every stored position and size in the crate is expressed in this coordinate
/// space; pixels only exist at render time, via a [`Scale`].
pub const VIRTUAL_CANVAS: f64 = 1080.0;

/// Half the virtual canvas; positions measured from canvas center are clamped
/// to `±HALF_CANVAS` on both axes.
pub const HALF_CANVAS: f64 = VIRTUAL_CANVAS / 2.0;

/// Uniform mapping from virtual-canvas units to device pixels.
///
/// A scale is never zero or negative: containers that have not been laid out
/// yet (width 0) report scale 1 until a real measurement arrives.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Scale(f64);

impl Default for Scale {
    fn default() -> Self {
        Self(1.0)
    }
}

impl Scale {
    pub fn from_container_width(width_px: f64) -> Self {
        if !width_px.is_finite() || width_px <= 0.0 {
            return Self(1.0);
        }
        Self(width_px / VIRTUAL_CANVAS)
    }

    /// Construct from a raw factor. Non-finite or non-positive factors snap to 1.
    pub fn from_factor(factor: f64) -> Self {
        if !factor.is_finite() || factor <= 0.0 {
            return Self(1.0);
        }
        Self(factor)
    }

    pub fn factor(self) -> f64 {
        self.0
    }

    pub fn to_pixels(self, virtual_units: f64) -> f64 {
        virtual_units * self.0
    }

    pub fn to_virtual(self, pixels: f64) -> f64 {
        pixels / self.0
    }

    pub fn vec_to_virtual(self, px: Vec2) -> Vec2 {
        Vec2::new(px.x / self.0, px.y / self.0)
    }
}

/// Tracks the live container scale across resize notifications.
///
/// Resize updates are ignored while frozen: drag gestures apply deltas in
/// already-scaled pixel space and must convert back with the scale that was
/// current when the gesture started.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScaleTracker {
    scale: Scale,
    frozen: bool,
}

impl ScaleTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scale(&self) -> Scale {
        self.scale
    }

    pub fn observe_container_width(&mut self, width_px: f64) {
        if self.frozen {
            return;
        }
        self.scale = Scale::from_container_width(width_px);
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub fn thaw(&mut self) {
        self.frozen = false;
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}

/// Straight (non-premultiplied) RGBA8.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const WHITE: Self = Self::opaque(255, 255, 255);
    pub const BLACK: Self = Self::opaque(0, 0, 0);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn with_opacity(self, opacity: f64) -> Self {
        let a = (f64::from(self.a) * opacity.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }
}

/// Clamp a center-relative position so its anchor stays on the canvas.
pub fn clamp_to_canvas(pos: Vec2) -> Vec2 {
    Vec2::new(
        pos.x.clamp(-HALF_CANVAS, HALF_CANVAS),
        pos.y.clamp(-HALF_CANVAS, HALF_CANVAS),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_width_container_reports_scale_one() {
        assert_eq!(Scale::from_container_width(0.0).factor(), 1.0);
        assert_eq!(Scale::from_container_width(-4.0).factor(), 1.0);
        assert_eq!(Scale::from_container_width(f64::NAN).factor(), 1.0);
    }

    #[test]
    fn scale_is_linear_in_container_width() {
        let at_1080 = Scale::from_container_width(1080.0);
        let at_2160 = Scale::from_container_width(2160.0);
        assert_eq!(at_1080.to_pixels(270.0) * 2.0, at_2160.to_pixels(270.0));
        assert_eq!(at_2160.to_virtual(540.0), 270.0);
    }

    #[test]
    fn tracker_ignores_resize_while_frozen() {
        let mut tracker = ScaleTracker::new();
        tracker.observe_container_width(540.0);
        assert_eq!(tracker.scale().factor(), 0.5);

        tracker.freeze();
        tracker.observe_container_width(1080.0);
        assert_eq!(tracker.scale().factor(), 0.5);

        tracker.thaw();
        tracker.observe_container_width(1080.0);
        assert_eq!(tracker.scale().factor(), 1.0);
    }

    #[test]
    fn clamp_keeps_positions_on_canvas() {
        let clamped = clamp_to_canvas(Vec2::new(900.0, -900.0));
        assert_eq!(clamped, Vec2::new(540.0, -540.0));
        let inside = clamp_to_canvas(Vec2::new(10.0, 20.0));
        assert_eq!(inside, Vec2::new(10.0, 20.0));
    }
}
