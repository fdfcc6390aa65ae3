use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::bounds::ScreenBounds;
use super::geometry::{place_companion, to_logical, to_physical, LogicalPoint, PhysicalPoint, Rect, Size};
use super::host::{WindowHost, WindowRole};
use crate::error::HostError;
use crate::services::config::CompanionConfig;

/// Companion top-left minus mascot top-left, logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanionOffset {
    pub x: f64,
    pub y: f64,
}

/// Where the companion goes for a mascot at `primary`; never above the top
/// of the desktop.
pub fn companion_target(primary: LogicalPoint, offset: CompanionOffset) -> LogicalPoint {
    LogicalPoint {
        x: primary.x + offset.x,
        y: (primary.y + offset.y).max(0.0),
    }
}

/// OS move notifications lag behind writes; this many recent writes count as
/// echoes.
const RECENT_WRITES: usize = 8;

/// Keeps the chat window glued to the mascot.
///
/// Position updates arrive once per frame; they are coalesced through a
/// `watch` channel so a slow OS write never queues stale targets.
pub struct CompanionFollower<H: WindowHost> {
    inner: Arc<Inner<H>>,
}

impl<H: WindowHost> Clone for CompanionFollower<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<H: WindowHost> {
    host: Arc<H>,
    config: CompanionConfig,
    open: AtomicBool,
    // NOTE: Using std::sync::Mutex since lock is never held across .await
    offset: Mutex<Option<CompanionOffset>>,
    recent_writes: Mutex<SmallVec<[PhysicalPoint; RECENT_WRITES]>>,
    target: watch::Sender<Option<LogicalPoint>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<H: WindowHost> CompanionFollower<H> {
    pub fn new(host: Arc<H>, config: CompanionConfig) -> Self {
        let (target, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                host,
                config,
                open: AtomicBool::new(false),
                offset: Mutex::new(None),
                recent_writes: Mutex::new(SmallVec::new()),
                target,
                task: Mutex::new(None),
            }),
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.open.load(Ordering::SeqCst)
    }

    pub fn offset(&self) -> Option<CompanionOffset> {
        *lock(&self.inner.offset)
    }

    /// Place the companion beside the mascot and start following it.
    ///
    /// Returns the companion's logical position. Must be called from within a
    /// Tokio runtime.
    pub fn open(&self, primary: LogicalPoint, mascot_size: Size, bounds: Option<ScreenBounds>) -> LogicalPoint {
        let config = self.inner.config;
        let mascot = Rect {
            left: primary.x,
            top: primary.y,
            width: mascot_size.width,
            height: mascot_size.height,
        };
        let placed = match bounds {
            Some(bounds) => place_companion(
                mascot,
                Size {
                    width: config.width,
                    height: config.height,
                },
                bounds.work_area(),
                config.gap,
                config.edge_margin,
            ),
            None => LogicalPoint::new(mascot.right() + config.gap, primary.y.max(0.0)),
        };

        *lock(&self.inner.offset) = Some(CompanionOffset {
            x: placed.x - primary.x,
            y: placed.y - primary.y,
        });
        self.inner.open.store(true, Ordering::SeqCst);
        self.ensure_task();
        self.inner.target.send_replace(Some(placed));
        log::info!("companion: opened at ({:.1}, {:.1})", placed.x, placed.y);
        placed
    }

    pub fn close(&self) {
        if !self.inner.open.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = lock(&self.inner.task).take() {
            handle.abort();
        }
        self.inner.target.send_replace(None);
        *lock(&self.inner.offset) = None;
        lock(&self.inner.recent_writes).clear();
        log::info!("companion: closed");
    }

    /// Follow the mascot to `(x, y)`. Ignored while closed.
    pub fn update_position(&self, x: f64, y: f64) {
        if !self.is_open() {
            return;
        }
        let Some(offset) = self.offset() else {
            return;
        };
        let target = companion_target(LogicalPoint::new(x, y), offset);
        self.inner.target.send_if_modified(|current| {
            if *current == Some(target) {
                return false;
            }
            *current = Some(target);
            true
        });
    }

    /// Recompute the offset from where the companion now is, against the
    /// mascot's live position.
    pub async fn update_offset(&self, companion: LogicalPoint) -> Result<CompanionOffset, HostError> {
        let physical = self.inner.host.outer_position(WindowRole::Mascot).await?;
        let scale = self.inner.host.scale_factor(WindowRole::Mascot).await?;
        let primary = to_logical(physical, scale);
        let offset = CompanionOffset {
            x: companion.x - primary.x,
            y: companion.y - primary.y,
        };
        *lock(&self.inner.offset) = Some(offset);
        log::debug!("companion: offset now ({:.1}, {:.1})", offset.x, offset.y);
        Ok(offset)
    }

    /// OS move notification for the companion window.
    ///
    /// Moves that echo one of the follower's recent writes are not user
    /// drags.
    pub async fn handle_companion_moved(&self, position: PhysicalPoint) -> Option<CompanionOffset> {
        if !self.is_open() {
            return None;
        }
        if lock(&self.inner.recent_writes).contains(&position) {
            return None;
        }
        let scale = match self.inner.host.scale_factor(WindowRole::Mascot).await {
            Ok(scale) => scale,
            Err(err) => {
                log::debug!("companion: scale lookup failed: {err}");
                return None;
            }
        };
        match self.update_offset(to_logical(position, scale)).await {
            Ok(offset) => Some(offset),
            Err(err) => {
                log::warn!("companion: offset update failed: {err}");
                None
            }
        }
    }

    fn ensure_task(&self) {
        let mut task = lock(&self.inner.task);
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let inner = self.inner.clone();
        let mut rx = self.inner.target.subscribe();
        *task = Some(tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let Some(target) = *rx.borrow_and_update() else {
                    continue;
                };
                inner.apply(target).await;
            }
        }));
    }
}

impl<H: WindowHost> Inner<H> {
    async fn apply(&self, target: LogicalPoint) {
        let scale = match self.host.scale_factor(WindowRole::Mascot).await {
            Ok(scale) => scale,
            Err(err) => {
                log::debug!("companion: scale lookup failed: {err}");
                return;
            }
        };
        let physical = to_physical(target, scale);
        {
            let mut recent = lock(&self.recent_writes);
            if recent.len() == RECENT_WRITES {
                recent.remove(0);
            }
            recent.push(physical);
        }
        match self.host.set_outer_position(WindowRole::Companion, physical).await {
            Ok(()) => {}
            Err(err) if err.is_window_gone() => {
                log::debug!("companion: window gone, ignoring move: {err}");
            }
            Err(err) => log::warn!("companion: set position failed: {err}"),
        }
    }
}
