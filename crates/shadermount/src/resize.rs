use crate::backend::RenderSurface;
use crate::types::PixelSize;

/// Tracks whether a mount is still observing its surface and which device
/// pixel ratio the backing store was last sized for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizeWatcher {
    observing: bool,
    pixel_ratio: f64,
}

impl Default for ResizeWatcher {
    fn default() -> Self {
        Self {
            observing: false,
            pixel_ratio: 1.0,
        }
    }
}

impl ResizeWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self) {
        self.observing = true;
    }

    pub fn disconnect(&mut self) {
        self.observing = false;
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    pub fn pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    /// Returns the new backing size when the surface's layout, scaled by its
    /// current pixel ratio, no longer matches `current`. An empty layout
    /// (a minimised window) keeps the current backing store.
    pub fn check<S>(&mut self, surface: &S, current: PixelSize) -> Option<PixelSize>
    where
        S: RenderSurface + ?Sized,
    {
        if !self.observing {
            return None;
        }
        let pixel_ratio = surface.device_pixel_ratio();
        let target = surface.layout_size().to_pixels(pixel_ratio);
        if target == current || target.is_empty() {
            return None;
        }
        self.pixel_ratio = pixel_ratio;
        tracing::debug!(
            from = ?current,
            to = ?target,
            pixel_ratio,
            "surface backing store resized"
        );
        Some(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessSurface;
    use crate::types::LayoutSize;

    #[test]
    fn reports_only_changed_sizes() {
        let surface = HeadlessSurface::new(LayoutSize::new(400.0, 300.0), 2.0);
        let mut watcher = ResizeWatcher::new();
        watcher.observe();
        let target = watcher.check(&surface, PixelSize::new(300, 150));
        assert_eq!(target, Some(PixelSize::new(800, 600)));
        assert_eq!(watcher.pixel_ratio(), 2.0);
        assert_eq!(watcher.check(&surface, PixelSize::new(800, 600)), None);
    }

    #[test]
    fn empty_layout_keeps_backing_store() {
        let surface = HeadlessSurface::new(LayoutSize::new(0.0, 300.0), 1.0);
        let mut watcher = ResizeWatcher::new();
        watcher.observe();
        assert_eq!(watcher.check(&surface, PixelSize::new(400, 300)), None);
        surface.set_layout(LayoutSize::new(0.0, 0.0));
        assert_eq!(watcher.check(&surface, PixelSize::new(400, 300)), None);
        surface.set_layout(LayoutSize::new(500.0, 300.0));
        assert_eq!(
            watcher.check(&surface, PixelSize::new(400, 300)),
            Some(PixelSize::new(500, 300))
        );
    }

    #[test]
    fn disconnected_watcher_is_silent() {
        let surface = HeadlessSurface::new(LayoutSize::new(400.0, 300.0), 1.0);
        let mut watcher = ResizeWatcher::new();
        assert_eq!(watcher.check(&surface, PixelSize::default()), None);
        watcher.observe();
        watcher.disconnect();
        assert_eq!(watcher.check(&surface, PixelSize::default()), None);
    }
}
