use std::borrow::Cow;

use crate::uniforms::UniformMap;

/// Size of a backing store in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

const PIXEL_EPSILON: f64 = 1e-6;

/// Rendered (layout) size of a surface in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutSize {
    pub width: f64,
    pub height: f64,
}

impl LayoutSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Scales to device pixels, truncating fractional pixels the way a
    /// canvas backing store does. Products within rounding error of a whole
    /// pixel snap to it, so physical sizes survive a trip through logical
    /// units. Negative or NaN extents collapse to zero.
    pub fn to_pixels(self, pixel_ratio: f64) -> PixelSize {
        let scale = |extent: f64| {
            let scaled = extent * pixel_ratio;
            let nearest = scaled.round();
            if (scaled - nearest).abs() < PIXEL_EPSILON {
                nearest as u32
            } else {
                scaled as u32
            }
        };
        PixelSize::new(scale(self.width), scale(self.height))
    }
}

/// GPU power preference used when picking an adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PowerPreference {
    #[default]
    Low,
    High,
}

/// Optional knobs applied when a surface creates its graphics context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextOptions {
    /// Keep an alpha channel so the page behind the surface shows through.
    pub alpha: bool,
    /// Request multisampled rendering when the surface format supports it.
    pub antialias: bool,
    pub power_preference: PowerPreference,
    /// Refuse software rasterizers instead of running slowly on them.
    pub fail_if_major_performance_caveat: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            alpha: true,
            antialias: false,
            power_preference: PowerPreference::Low,
            fail_if_major_performance_caveat: false,
        }
    }
}

/// Everything a mount needs besides its surface and host.
///
/// Shader sources are immutable once handed over; the uniform map is the
/// initial caller-supplied set that later `set_uniforms` calls merge into.
#[derive(Debug, Clone)]
pub struct MountConfig {
    pub fragment_shader: Cow<'static, str>,
    /// Vertex stage; defaults to the full-screen quad shader.
    pub vertex_shader: Option<Cow<'static, str>>,
    pub uniforms: UniformMap,
    pub context: ContextOptions,
    pub speed: f64,
    pub seed: f64,
}

impl MountConfig {
    pub fn new(fragment_shader: impl Into<Cow<'static, str>>) -> Self {
        Self {
            fragment_shader: fragment_shader.into(),
            vertex_shader: None,
            uniforms: UniformMap::new(),
            context: ContextOptions::default(),
            speed: 1.0,
            seed: 0.0,
        }
    }

    pub fn with_uniforms(mut self, uniforms: UniformMap) -> Self {
        self.uniforms = uniforms;
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_seed(mut self, seed: f64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_context(mut self, context: ContextOptions) -> Self {
        self.context = context;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_scaling_truncates() {
        let layout = LayoutSize::new(333.5, 100.0);
        assert_eq!(layout.to_pixels(1.5), PixelSize::new(500, 150));
        assert_eq!(LayoutSize::new(-4.0, f64::NAN).to_pixels(2.0), PixelSize::new(0, 0));
    }

    #[test]
    fn logical_round_trip_keeps_physical_size() {
        let layout = LayoutSize::new(230.0 / 1.75, 100.0 / 1.75);
        assert_eq!(layout.to_pixels(1.75), PixelSize::new(230, 100));
        for scale in [1.1, 1.25, 1.75, 2.5] {
            for width in 1..4000u32 {
                let layout = LayoutSize::new(width as f64 / scale, 10.0);
                assert_eq!(layout.to_pixels(scale).width, width, "width {width} at {scale}");
            }
        }
    }
}
