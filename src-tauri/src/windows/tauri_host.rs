use std::future::{ready, Future};

use tauri::{AppHandle, Manager, WebviewWindow};

use super::geometry::{MonitorGeometry, PhysicalPoint, PhysicalSize};
use super::host::{WindowHost, WindowRole};
use crate::error::HostError;

/// `WindowHost` backed by the running Tauri app.
///
/// Tauri window calls are synchronous proxies to the event loop, so every
/// future here is already resolved.
#[derive(Clone)]
pub struct TauriHost {
    app: AppHandle,
}

impl TauriHost {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }

    fn window(&self, role: WindowRole) -> Result<WebviewWindow, HostError> {
        self.app
            .get_webview_window(role.label())
            .ok_or_else(|| HostError::window_not_found(role.label()))
    }

    fn monitor_of(&self, role: WindowRole) -> Result<Option<MonitorGeometry>, HostError> {
        let window = self.window(role)?;
        let monitor = match window.current_monitor() {
            Ok(Some(monitor)) => Some(monitor),
            Ok(None) => window
                .primary_monitor()
                .map_err(|e| HostError::monitor(e.to_string()))?,
            Err(e) => return Err(HostError::monitor(e.to_string())),
        };
        Ok(monitor.map(|m| MonitorGeometry {
            position: PhysicalPoint::new(m.position().x, m.position().y),
            size: PhysicalSize {
                width: m.size().width,
                height: m.size().height,
            },
            scale_factor: m.scale_factor(),
        }))
    }
}

impl WindowHost for TauriHost {
    fn outer_position(
        &self,
        role: WindowRole,
    ) -> impl Future<Output = Result<PhysicalPoint, HostError>> + Send {
        let result = self.window(role).and_then(|window| {
            window
                .outer_position()
                .map(|p| PhysicalPoint::new(p.x, p.y))
                .map_err(|e| HostError::position(e.to_string()))
        });
        ready(result)
    }

    fn set_outer_position(
        &self,
        role: WindowRole,
        position: PhysicalPoint,
    ) -> impl Future<Output = Result<(), HostError>> + Send {
        let result = self.window(role).and_then(|window| {
            window
                .set_position(tauri::Position::Physical(tauri::PhysicalPosition {
                    x: position.x,
                    y: position.y,
                }))
                .map_err(|e| HostError::position(e.to_string()))
        });
        ready(result)
    }

    fn current_monitor(
        &self,
        role: WindowRole,
    ) -> impl Future<Output = Result<Option<MonitorGeometry>, HostError>> + Send {
        ready(self.monitor_of(role))
    }

    fn scale_factor(&self, role: WindowRole) -> impl Future<Output = Result<f64, HostError>> + Send {
        let result = self.window(role).and_then(|window| {
            window
                .scale_factor()
                .map_err(|e| HostError::unavailable(e.to_string()))
        });
        ready(result)
    }
}
