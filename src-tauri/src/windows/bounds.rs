use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::Serialize;

use super::geometry::{sanitize_scale, MonitorGeometry, WorkArea};

/// Logical-pixel area the mascot may occupy on its current monitor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenBounds {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub taskbar_reserve: f64,
    pub scale_factor: f64,
}

impl ScreenBounds {
    pub fn from_monitor(monitor: &MonitorGeometry, taskbar_reserve: f64) -> Self {
        let scale = sanitize_scale(monitor.scale_factor);
        Self {
            left: monitor.position.x as f64 / scale,
            top: monitor.position.y as f64 / scale,
            width: monitor.size.width as f64 / scale,
            height: monitor.size.height as f64 / scale,
            taskbar_reserve: taskbar_reserve.max(0.0),
            scale_factor: scale,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Resting `y` for a window of the given height.
    pub fn floor_y(&self, window_height: f64) -> f64 {
        self.bottom() - window_height - self.taskbar_reserve
    }

    /// Largest `x` that keeps a window of the given width on screen.
    pub fn max_x(&self, window_width: f64) -> f64 {
        (self.right() - window_width).max(self.left)
    }

    pub fn clamp_x(&self, x: f64, window_width: f64) -> f64 {
        x.clamp(self.left, self.max_x(window_width))
    }

    pub fn work_area(&self) -> WorkArea {
        WorkArea {
            left: self.left,
            top: self.top,
            right: self.right(),
            bottom: self.bottom() - self.taskbar_reserve,
        }
    }
}

/// Outcome of asking the cache for this frame's bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundsLookup {
    Fresh(ScreenBounds),
    RefreshDue,
}

/// Refresh-if-unset-or-every-N-frames cache for the simulation's bounds.
///
/// Owned by the frame loop. The latest value is also published through an
/// `ArcSwapOption` so other readers never contend with the loop.
#[derive(Debug)]
pub struct BoundsCache {
    current: Option<ScreenBounds>,
    frames_since_refresh: u32,
    refresh_every: u32,
    taskbar_reserve: f64,
    failing: bool,
    published: Arc<ArcSwapOption<ScreenBounds>>,
}

impl BoundsCache {
    pub fn new(refresh_every: u32, taskbar_reserve: f64) -> Self {
        Self {
            current: None,
            frames_since_refresh: 0,
            refresh_every: refresh_every.max(1),
            taskbar_reserve,
            failing: false,
            published: Arc::new(ArcSwapOption::empty()),
        }
    }

    /// Handle readers can keep to observe the latest bounds.
    pub fn published(&self) -> Arc<ArcSwapOption<ScreenBounds>> {
        self.published.clone()
    }

    pub fn begin_frame(&mut self) -> BoundsLookup {
        self.frames_since_refresh = self.frames_since_refresh.saturating_add(1);
        match self.current {
            Some(bounds) if self.frames_since_refresh < self.refresh_every => {
                BoundsLookup::Fresh(bounds)
            }
            _ => BoundsLookup::RefreshDue,
        }
    }

    pub fn store(&mut self, monitor: &MonitorGeometry) -> ScreenBounds {
        let bounds = ScreenBounds::from_monitor(monitor, self.taskbar_reserve);
        if self.current != Some(bounds) {
            log::debug!("bounds: refreshed {:?}", bounds);
        }
        self.current = Some(bounds);
        self.frames_since_refresh = 0;
        self.failing = false;
        self.published.store(Some(Arc::new(bounds)));
        bounds
    }

    /// Drop cached bounds so the next frame queries the host again.
    ///
    /// Returns `true` on the first failure of a streak so callers can log once.
    pub fn invalidate(&mut self) -> bool {
        self.current = None;
        self.published.store(None);
        !std::mem::replace(&mut self.failing, true)
    }

    /// Forget cached bounds without treating it as a failure.
    pub fn expire(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<ScreenBounds> {
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::windows::geometry::{PhysicalPoint, PhysicalSize};

    fn monitor(scale_factor: f64) -> MonitorGeometry {
        MonitorGeometry {
            position: PhysicalPoint::new(0, 0),
            size: PhysicalSize {
                width: 2880,
                height: 1620,
            },
            scale_factor,
        }
    }

    #[test]
    fn test_from_monitor_converts_to_logical() {
        let bounds = ScreenBounds::from_monitor(&monitor(1.5), 48.0);
        assert_eq!(bounds.width, 1920.0);
        assert_eq!(bounds.height, 1080.0);
        assert_eq!(bounds.floor_y(160.0), 1080.0 - 160.0 - 48.0);
        assert_eq!(bounds.max_x(160.0), 1760.0);
        assert_eq!(bounds.clamp_x(-20.0, 160.0), 0.0);
        assert_eq!(bounds.clamp_x(5000.0, 160.0), 1760.0);
    }

    #[test]
    fn test_secondary_monitor_offset() {
        let geometry = MonitorGeometry {
            position: PhysicalPoint::new(-1920, 0),
            size: PhysicalSize {
                width: 1920,
                height: 1080,
            },
            scale_factor: 1.0,
        };
        let bounds = ScreenBounds::from_monitor(&geometry, 0.0);
        assert_eq!(bounds.left, -1920.0);
        assert_eq!(bounds.right(), 0.0);
        assert_eq!(bounds.max_x(160.0), -160.0);
    }

    #[test]
    fn test_cache_refreshes_every_n_frames() {
        let mut cache = BoundsCache::new(3, 48.0);
        assert_eq!(cache.begin_frame(), BoundsLookup::RefreshDue);
        let stored = cache.store(&monitor(1.0));
        assert!(cache.published().load().is_some());

        assert_eq!(cache.begin_frame(), BoundsLookup::Fresh(stored));
        assert_eq!(cache.begin_frame(), BoundsLookup::Fresh(stored));
        assert_eq!(cache.begin_frame(), BoundsLookup::RefreshDue);
    }

    #[test]
    fn test_invalidate_reports_first_failure_only() {
        let mut cache = BoundsCache::new(60, 48.0);
        cache.store(&monitor(1.0));
        assert!(cache.invalidate());
        assert!(!cache.invalidate());
        assert!(cache.published().load().is_none());
        assert_eq!(cache.begin_frame(), BoundsLookup::RefreshDue);

        cache.store(&monitor(1.0));
        assert!(cache.invalidate());
    }
}
