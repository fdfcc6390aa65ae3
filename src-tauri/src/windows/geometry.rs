use serde::{Deserialize, Serialize};

/// Position in logical (density independent) pixels, virtual desktop space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogicalPoint {
    pub x: f64,
    pub y: f64,
}

impl LogicalPoint {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Position in physical pixels as the OS window API reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalPoint {
    pub x: i32,
    pub y: i32,
}

impl PhysicalPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorGeometry {
    pub position: PhysicalPoint,
    pub size: PhysicalSize,
    pub scale_factor: f64,
}

pub fn sanitize_scale(scale_factor: f64) -> f64 {
    if scale_factor.is_finite() && scale_factor > 0.0 {
        scale_factor
    } else {
        1.0
    }
}

pub fn to_logical(point: PhysicalPoint, scale_factor: f64) -> LogicalPoint {
    let scale = sanitize_scale(scale_factor);
    LogicalPoint {
        x: point.x as f64 / scale,
        y: point.y as f64 / scale,
    }
}

/// Rounds to the nearest physical pixel.
pub fn to_physical(point: LogicalPoint, scale_factor: f64) -> PhysicalPoint {
    let scale = sanitize_scale(scale_factor);
    PhysicalPoint {
        x: (point.x * scale).round() as i32,
        y: (point.y * scale).round() as i32,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn center_y(&self) -> f64 {
        self.top + self.height * 0.5
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// Usable area, logical pixels.
#[derive(Debug, Clone, Copy)]
pub struct WorkArea {
    pub left: f64,
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
}

/// Place the companion window next to the mascot.
///
/// Prefers the right side, flips to the left when it would overflow, centers
/// vertically on the mascot and finally clamps into the work area.
pub fn place_companion(
    mascot: Rect,
    companion: Size,
    work_area: WorkArea,
    gap: f64,
    edge_margin: f64,
) -> LogicalPoint {
    let gap = gap.max(0.0);
    let margin = edge_margin.max(0.0);

    let min_x = work_area.left + margin;
    let max_x = (work_area.right - margin - companion.width).max(min_x);
    let min_y = work_area.top + margin;
    let max_y = (work_area.bottom - margin - companion.height).max(min_y);

    let mut x = mascot.right() + gap;
    if x > max_x {
        x = mascot.left - gap - companion.width;
    }
    let x = x.clamp(min_x, max_x);
    let y = (mascot.center_y() - companion.height * 0.5).clamp(min_y, max_y);

    LogicalPoint { x, y }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn work_area() -> WorkArea {
        WorkArea {
            left: 0.0,
            top: 0.0,
            right: 1920.0,
            bottom: 1032.0,
        }
    }

    #[test]
    fn test_round_trip_at_fractional_scale() {
        let physical = to_physical(LogicalPoint::new(100.4, 33.3), 1.5);
        assert_eq!(physical, PhysicalPoint::new(151, 50));

        let logical = to_logical(PhysicalPoint::new(300, 150), 1.5);
        assert_eq!(logical, LogicalPoint::new(200.0, 100.0));
    }

    #[test]
    fn test_non_positive_scale_treated_as_one() {
        assert_eq!(
            to_logical(PhysicalPoint::new(40, 80), 0.0),
            LogicalPoint::new(40.0, 80.0)
        );
        assert_eq!(
            to_physical(LogicalPoint::new(40.0, 80.0), f64::NAN),
            PhysicalPoint::new(40, 80)
        );
    }

    #[test]
    fn test_place_companion_prefers_right() {
        let mascot = Rect {
            left: 100.0,
            top: 700.0,
            width: 160.0,
            height: 160.0,
        };
        let placed = place_companion(
            mascot,
            Size {
                width: 380.0,
                height: 520.0,
            },
            work_area(),
            12.0,
            12.0,
        );
        assert_eq!(placed.x, 272.0);
        // Vertical centre would overflow the bottom; clamped.
        assert_eq!(placed.y, 1032.0 - 12.0 - 520.0);
    }

    #[test]
    fn test_place_companion_flips_left_at_right_edge() {
        let mascot = Rect {
            left: 1700.0,
            top: 300.0,
            width: 160.0,
            height: 160.0,
        };
        let placed = place_companion(
            mascot,
            Size {
                width: 380.0,
                height: 520.0,
            },
            work_area(),
            12.0,
            12.0,
        );
        assert_eq!(placed.x, 1700.0 - 12.0 - 380.0);
        assert_eq!(placed.y, 380.0 - 260.0);
    }
}
