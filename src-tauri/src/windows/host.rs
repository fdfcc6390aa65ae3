use std::future::Future;

use serde::{Deserialize, Serialize};

use super::geometry::{MonitorGeometry, PhysicalPoint};
use crate::error::HostError;

pub const MASCOT_WINDOW_LABEL: &str = "main";
pub const COMPANION_WINDOW_LABEL: &str = "chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WindowRole {
    Mascot,
    Companion,
}

impl WindowRole {
    pub const fn label(self) -> &'static str {
        match self {
            WindowRole::Mascot => MASCOT_WINDOW_LABEL,
            WindowRole::Companion => COMPANION_WINDOW_LABEL,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            MASCOT_WINDOW_LABEL => Some(WindowRole::Mascot),
            COMPANION_WINDOW_LABEL => Some(WindowRole::Companion),
            _ => None,
        }
    }
}

/// Windowing operations the simulation needs from the OS.
///
/// All positions are physical pixels in virtual desktop coordinates.
pub trait WindowHost: Send + Sync + 'static {
    fn outer_position(
        &self,
        role: WindowRole,
    ) -> impl Future<Output = Result<PhysicalPoint, HostError>> + Send;

    fn set_outer_position(
        &self,
        role: WindowRole,
        position: PhysicalPoint,
    ) -> impl Future<Output = Result<(), HostError>> + Send;

    /// Monitor the window currently sits on, if the host can tell.
    fn current_monitor(
        &self,
        role: WindowRole,
    ) -> impl Future<Output = Result<Option<MonitorGeometry>, HostError>> + Send;

    fn scale_factor(&self, role: WindowRole) -> impl Future<Output = Result<f64, HostError>> + Send;
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::{HashMap, HashSet};
    use std::sync::{Mutex, MutexGuard};
    use std::time::Duration;

    use super::*;
    use crate::windows::geometry::PhysicalSize;

    /// In-memory host used by the simulation tests.
    pub(crate) struct FakeHost {
        state: Mutex<FakeState>,
    }

    struct FakeState {
        positions: HashMap<WindowRole, PhysicalPoint>,
        closed: HashSet<WindowRole>,
        monitor: Option<MonitorGeometry>,
        monitor_fails: bool,
        set_fails: bool,
        set_delay: Option<Duration>,
        set_calls: Vec<(WindowRole, PhysicalPoint)>,
    }

    impl FakeHost {
        pub(crate) fn new(width: u32, height: u32, scale_factor: f64) -> Self {
            let mut positions = HashMap::new();
            positions.insert(WindowRole::Mascot, PhysicalPoint::new(0, 0));
            Self {
                state: Mutex::new(FakeState {
                    positions,
                    closed: HashSet::new(),
                    monitor: Some(MonitorGeometry {
                        position: PhysicalPoint::new(0, 0),
                        size: PhysicalSize { width, height },
                        scale_factor,
                    }),
                    monitor_fails: false,
                    set_fails: false,
                    set_delay: None,
                    set_calls: Vec::new(),
                }),
            }
        }

        fn lock(&self) -> MutexGuard<'_, FakeState> {
            self.state.lock().unwrap()
        }

        pub(crate) fn place(&self, role: WindowRole, position: PhysicalPoint) {
            let mut state = self.lock();
            state.closed.remove(&role);
            state.positions.insert(role, position);
        }

        pub(crate) fn close(&self, role: WindowRole) {
            let mut state = self.lock();
            state.closed.insert(role);
            state.positions.remove(&role);
        }

        pub(crate) fn position(&self, role: WindowRole) -> Option<PhysicalPoint> {
            self.lock().positions.get(&role).copied()
        }

        pub(crate) fn set_monitor_fails(&self, fails: bool) {
            self.lock().monitor_fails = fails;
        }

        pub(crate) fn set_set_fails(&self, fails: bool) {
            self.lock().set_fails = fails;
        }

        pub(crate) fn set_write_delay(&self, delay: Option<Duration>) {
            self.lock().set_delay = delay;
        }

        pub(crate) fn set_calls(&self, role: WindowRole) -> Vec<PhysicalPoint> {
            self.lock()
                .set_calls
                .iter()
                .filter(|(r, _)| *r == role)
                .map(|(_, p)| *p)
                .collect()
        }

        pub(crate) fn clear_calls(&self) {
            self.lock().set_calls.clear();
        }

        fn scale(&self) -> f64 {
            self.lock().monitor.map(|m| m.scale_factor).unwrap_or(1.0)
        }
    }

    impl WindowHost for FakeHost {
        fn outer_position(
            &self,
            role: WindowRole,
        ) -> impl Future<Output = Result<PhysicalPoint, HostError>> + Send {
            let result = self
                .position(role)
                .ok_or_else(|| HostError::window_not_found(role.label()));
            std::future::ready(result)
        }

        fn set_outer_position(
            &self,
            role: WindowRole,
            position: PhysicalPoint,
        ) -> impl Future<Output = Result<(), HostError>> + Send {
            let (result, delay) = {
                let mut state = self.lock();
                state.set_calls.push((role, position));
                let result = if state.closed.contains(&role) {
                    Err(HostError::window_not_found(role.label()))
                } else if state.set_fails {
                    Err(HostError::position("set position rejected"))
                } else {
                    state.positions.insert(role, position);
                    Ok(())
                };
                (result, state.set_delay)
            };
            async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                result
            }
        }

        fn current_monitor(
            &self,
            _role: WindowRole,
        ) -> impl Future<Output = Result<Option<MonitorGeometry>, HostError>> + Send {
            let state = self.lock();
            let result = if state.monitor_fails {
                Err(HostError::monitor("monitor query failed"))
            } else {
                Ok(state.monitor)
            };
            std::future::ready(result)
        }

        fn scale_factor(
            &self,
            _role: WindowRole,
        ) -> impl Future<Output = Result<f64, HostError>> + Send {
            std::future::ready(Ok(self.scale()))
        }
    }
}
