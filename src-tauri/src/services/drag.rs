use serde::Serialize;

use crate::windows::geometry::{sanitize_scale, to_logical, LogicalPoint, PhysicalPoint};

/// How a press ended.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum DragRelease {
    /// Pressed on the character and never crossed the threshold.
    Click,
    /// The window was moved by hand.
    Dropped { displacement: LogicalPoint },
    /// Pressed off the character and never crossed the threshold.
    Cancelled,
}

/// One press-move-release episode on the mascot window.
///
/// Movement goes straight to the OS window; the simulation is not stepped
/// while a session is active.
#[derive(Debug, Clone, Copy)]
pub struct DragSession {
    pointer_origin: PhysicalPoint,
    window_origin: LogicalPoint,
    scale_factor: f64,
    on_character: bool,
    displacement: LogicalPoint,
    crossed_threshold: bool,
}

impl DragSession {
    pub fn begin(
        pointer: PhysicalPoint,
        window_origin: PhysicalPoint,
        scale_factor: f64,
        on_character: bool,
    ) -> Self {
        let scale_factor = sanitize_scale(scale_factor);
        Self {
            pointer_origin: pointer,
            window_origin: to_logical(window_origin, scale_factor),
            scale_factor,
            on_character,
            displacement: LogicalPoint::default(),
            crossed_threshold: false,
        }
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    pub fn crossed_threshold(&self) -> bool {
        self.crossed_threshold
    }

    /// Track a pointer move; returns the window's new logical position.
    ///
    /// The second value is `true` on the move that first crosses `threshold`.
    pub fn update(&mut self, pointer: PhysicalPoint, threshold: f64) -> (LogicalPoint, bool) {
        let dx = (pointer.x - self.pointer_origin.x) as f64 / self.scale_factor;
        let dy = (pointer.y - self.pointer_origin.y) as f64 / self.scale_factor;
        self.displacement = LogicalPoint::new(dx, dy);

        let crossed_now =
            !self.crossed_threshold && (dx.abs() > threshold || dy.abs() > threshold);
        if crossed_now {
            self.crossed_threshold = true;
        }

        let position = LogicalPoint::new(self.window_origin.x + dx, self.window_origin.y + dy);
        (position, crossed_now)
    }

    pub fn release(self) -> DragRelease {
        if self.crossed_threshold {
            DragRelease::Dropped {
                displacement: self.displacement,
            }
        } else if self.on_character {
            DragRelease::Click
        } else {
            DragRelease::Cancelled
        }
    }
}
