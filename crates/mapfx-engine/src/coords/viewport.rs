/// Drawable size in logical pixels.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[inline]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Finite and non-empty.
    #[inline]
    pub fn is_valid(self) -> bool {
        self.width > 0.0 && self.height > 0.0 && self.width.is_finite() && self.height.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_viewports_are_invalid() {
        assert!(Viewport::new(1280.0, 720.0).is_valid());
        assert!(!Viewport::new(0.0, 720.0).is_valid());
        assert!(!Viewport::new(f32::INFINITY, 1.0).is_valid());
        assert!(!Viewport::default().is_valid());
    }
}
