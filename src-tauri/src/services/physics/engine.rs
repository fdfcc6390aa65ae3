use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc, Mutex,
};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use tokio::time::MissedTickBehavior;

use super::simulation::{ReachCallback, Simulation, StepOutcome};
use super::{Direction, PhysicsEvent, PhysicsState};
use crate::error::HostError;
use crate::services::config::PhysicsConfig;
use crate::services::observers::{ObserverRegistry, Subscription};
use crate::windows::bounds::{BoundsCache, BoundsLookup, ScreenBounds};
use crate::windows::geometry::{to_logical, to_physical, LogicalPoint};
use crate::windows::host::{WindowHost, WindowRole};

/// Runs the simulation once per frame and writes the result to the mascot
/// window.
///
/// Start and stop are idempotent. Each start bumps a generation counter and a
/// loop only keeps running while its generation is current, so a quick
/// stop/start never leaves two loops stepping the same state.
pub(crate) struct PhysicsEngine<H: WindowHost> {
    inner: Arc<EngineInner<H>>,
}

impl<H: WindowHost> Clone for PhysicsEngine<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct EngineInner<H: WindowHost> {
    host: Arc<H>,
    config: PhysicsConfig,
    // NOTE: Using std::sync::Mutex since lock is never held across .await
    simulation: Mutex<Simulation>,
    bounds: Mutex<BoundsCache>,
    published_bounds: Arc<ArcSwapOption<ScreenBounds>>,
    running: AtomicBool,
    generation: AtomicU64,
    events: ObserverRegistry<PhysicsEvent>,
}

impl<H: WindowHost> PhysicsEngine<H> {
    pub(crate) fn new(host: Arc<H>, config: PhysicsConfig) -> Self {
        let spawn = LogicalPoint::new(config.spawn_x, config.spawn_y);
        let bounds = BoundsCache::new(config.bounds_refresh_frames, config.taskbar_reserve);
        let published_bounds = bounds.published();
        Self {
            inner: Arc::new(EngineInner {
                host,
                config,
                simulation: Mutex::new(Simulation::new(spawn)),
                bounds: Mutex::new(bounds),
                published_bounds,
                running: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                events: ObserverRegistry::new(),
            }),
        }
    }

    /// Must be called from within a Tokio runtime.
    pub(crate) fn start(&self) -> bool {
        // Run state only changes under the simulation lock, so a loop that
        // checked its generation there cannot step after a restart.
        let generation = self.inner.with_simulation(|_| {
            if self.inner.running.swap(true, Ordering::SeqCst) {
                return None;
            }
            Some(self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1)
        });
        let Some(generation) = generation else {
            return false;
        };
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.run(generation).await });
        log::info!("physics: started (generation={generation})");
        true
    }

    pub(crate) fn stop(&self) -> bool {
        let stopped = self.inner.with_simulation(|_| {
            if !self.inner.running.swap(false, Ordering::SeqCst) {
                return false;
            }
            self.inner.generation.fetch_add(1, Ordering::SeqCst);
            true
        });
        if !stopped {
            return false;
        }
        log::info!("physics: stopped");
        true
    }

    pub(crate) fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    pub(crate) fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&PhysicsEvent) + Send + Sync + 'static,
    {
        self.inner.events.subscribe(observer)
    }

    pub(crate) fn state(&self) -> PhysicsState {
        self.inner.with_simulation(|sim| sim.state())
    }

    pub(crate) fn is_grounded(&self) -> bool {
        self.inner.with_simulation(|sim| sim.is_grounded())
    }

    pub(crate) fn walk_direction(&self) -> Option<Direction> {
        self.inner.with_simulation(|sim| sim.walk_direction())
    }

    pub(crate) fn latest_bounds(&self) -> Option<ScreenBounds> {
        self.inner.published_bounds.load_full().map(|b| *b)
    }

    pub(crate) fn config(&self) -> &PhysicsConfig {
        &self.inner.config
    }

    pub(crate) fn apply_force(&self, fx: f64, fy: f64) {
        self.inner.with_simulation(|sim| sim.apply_force(fx, fy));
    }

    pub(crate) fn jump(&self) -> bool {
        let velocity = self.inner.config.jump_velocity;
        self.inner.with_simulation(|sim| sim.jump(velocity))
    }

    pub(crate) fn start_walking(&self, direction: Direction) {
        self.inner.with_simulation(|sim| sim.start_walking(direction));
    }

    pub(crate) fn stop_walking(&self) -> bool {
        self.inner.with_simulation(|sim| sim.stop_walking())
    }

    pub(crate) fn walk_to_x(&self, target_x: f64, on_reach: Option<ReachCallback>) -> Direction {
        self.inner
            .with_simulation(move |sim| sim.walk_to_x(target_x, on_reach))
    }

    /// Re-read the window's real position into the simulation.
    ///
    /// The cached bounds are expired too: a drag may have crossed monitors.
    pub(crate) async fn sync_position(&self, reset_velocity: bool) -> Result<LogicalPoint, HostError> {
        let physical = self.inner.host.outer_position(WindowRole::Mascot).await?;
        let scale = self.inner.host.scale_factor(WindowRole::Mascot).await?;
        let logical = to_logical(physical, scale);
        self.inner
            .with_simulation(|sim| sim.sync_to(logical, reset_velocity));
        if let Ok(mut cache) = self.inner.bounds.lock() {
            cache.expire();
        }
        log::debug!("physics: synced to ({:.1}, {:.1})", logical.x, logical.y);
        Ok(logical)
    }
}

impl<H: WindowHost> EngineInner<H> {
    fn with_simulation<R>(&self, f: impl FnOnce(&mut Simulation) -> R) -> R {
        let mut sim = self
            .simulation
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut sim)
    }

    /// Step under the same lock `start`/`stop` use, so a superseded loop can
    /// never integrate once more.
    fn step_if_current(&self, generation: u64, bounds: &ScreenBounds) -> Option<StepOutcome> {
        self.with_simulation(|sim| {
            self.is_current(generation)
                .then(|| sim.step(&self.config, bounds))
        })
    }

    fn is_current(&self, generation: u64) -> bool {
        self.running.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }

    async fn run(self: Arc<Self>, generation: u64) {
        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.frame_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if !self.is_current(generation) {
                break;
            }

            let Some(bounds) = self.resolve_bounds().await else {
                continue;
            };
            let Some(outcome) = self.step_if_current(generation, &bounds) else {
                break;
            };
            let target = to_physical(outcome.position, bounds.scale_factor);
            self.dispatch(outcome);
            // Observers may have stopped the loop; a restarted loop owns the window now.
            if !self.is_current(generation) {
                break;
            }

            if let Err(err) = self.host.set_outer_position(WindowRole::Mascot, target).await {
                log::warn!("physics: set position failed: {err}");
            }
            // A stop issued while the write was pending must not get one more frame.
            if !self.is_current(generation) {
                break;
            }
        }
        log::debug!("physics: loop exited (generation={generation})");
    }

    async fn resolve_bounds(&self) -> Option<ScreenBounds> {
        let lookup = match self.bounds.lock() {
            Ok(mut cache) => cache.begin_frame(),
            Err(_) => return None,
        };
        if let BoundsLookup::Fresh(bounds) = lookup {
            return Some(bounds);
        }

        let result = match self.host.current_monitor(WindowRole::Mascot).await {
            Ok(Some(monitor)) => Ok(monitor),
            Ok(None) => Err(HostError::monitor("no monitor for mascot window")),
            Err(err) => Err(err),
        };

        let mut cache = self.bounds.lock().ok()?;
        match result {
            Ok(monitor) => Some(cache.store(&monitor)),
            Err(err) => {
                if cache.invalidate() {
                    log::warn!("physics: bounds refresh failed, skipping frames: {err}");
                } else {
                    log::trace!("physics: bounds still unavailable: {err}");
                }
                None
            }
        }
    }

    fn dispatch(&self, outcome: StepOutcome) {
        for event in &outcome.events {
            if !matches!(event, PhysicsEvent::Moved(_)) {
                log::trace!("physics: {:?}", event);
            }
            self.events.emit(event);
        }
        if let Some(on_reach) = outcome.reached {
            on_reach();
        }
    }
}
