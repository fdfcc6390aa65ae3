use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::Serialize;

use super::animation::{AnimationMachine, AnimationState, AvatarSnapshot, Emotion};
use super::auto_walk::{AutoWalkHost, AutoWalkScheduler};
use super::config::MascotConfig;
use super::drag::{DragRelease, DragSession};
use super::observers::{ObserverRegistry, Subscription};
use super::physics::{Direction, PhysicsEngine, PhysicsEvent, PhysicsState, ReachCallback};
use crate::error::MascotError;
use crate::windows::bounds::ScreenBounds;
use crate::windows::companion::{CompanionFollower, CompanionOffset};
use crate::windows::geometry::{to_physical, LogicalPoint, PhysicalPoint, Size};
use crate::windows::host::{WindowHost, WindowRole};

/// Who owns the mascot window's position right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlMode {
    /// Physics drives the window; auto-walk is armed.
    Simulating,
    /// The pointer drives the window; physics is stopped.
    Dragging,
    /// Physics drives the window and the companion follows; no auto-walk.
    ChatOpen,
}

/// Requests for the desktop shell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ShellSignal {
    ContextMenu,
    ChatOpened { position: LogicalPoint },
    ChatClosed,
}

struct ActiveDrag {
    /// `None` until the window origin has been read.
    session: Option<DragSession>,
    resume: ControlMode,
}

struct ControlState {
    mode: ControlMode,
    drag: Option<ActiveDrag>,
    auto_walk_token: Option<u64>,
    next_token: u64,
}

/// Owns the simulation and every component that may move the mascot.
///
/// Engine start/stop is only ever done here, paired with the mode
/// transitions, so drag and chat handling cannot leave the loop in the wrong
/// state.
pub struct MascotController<H: WindowHost> {
    inner: Arc<ControllerInner<H>>,
}

impl<H: WindowHost> Clone for MascotController<H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct ControllerInner<H: WindowHost> {
    config: MascotConfig,
    host: Arc<H>,
    engine: PhysicsEngine<H>,
    animation: AnimationMachine,
    follower: CompanionFollower<H>,
    auto_walk: AutoWalkScheduler,
    // NOTE: Using std::sync::Mutex since lock is never held across .await
    control: Mutex<ControlState>,
    shell: ObserverRegistry<ShellSignal>,
    _physics_subscription: Subscription,
}

impl<H: WindowHost> MascotController<H> {
    pub fn new(host: Arc<H>, config: MascotConfig) -> Self {
        let config = config.sanitized();
        let scheduler = AutoWalkScheduler::new(config.auto_walk);
        Self::with_scheduler(host, config, scheduler)
    }

    fn with_scheduler(host: Arc<H>, config: MascotConfig, auto_walk: AutoWalkScheduler) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<ControllerInner<H>>| {
            let engine = PhysicsEngine::new(host.clone(), config.physics.clone());
            let follower = CompanionFollower::new(host.clone(), config.companion);

            let weak = weak.clone();
            let physics_subscription = engine.subscribe(move |event| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_physics_event(event);
                }
            });

            ControllerInner {
                config,
                host,
                engine,
                animation: AnimationMachine::new(),
                follower,
                auto_walk,
                control: Mutex::new(ControlState {
                    mode: ControlMode::Simulating,
                    drag: None,
                    auto_walk_token: None,
                    next_token: 0,
                }),
                shell: ObserverRegistry::new(),
                _physics_subscription: physics_subscription,
            }
        });
        Self { inner }
    }

    /// Start simulating. Must be called from within a Tokio runtime.
    pub fn start(&self) {
        log::info!("mascot: starting as {}", self.inner.config.kind.as_str());
        self.resume();
    }

    pub fn shutdown(&self) {
        self.inner.engine.stop();
        self.inner.auto_walk.disarm();
        self.inner.follower.close();
        log::info!("mascot: shut down");
    }

    pub fn config(&self) -> &MascotConfig {
        &self.inner.config
    }

    pub fn mode(&self) -> ControlMode {
        self.inner.control().mode
    }

    pub fn is_simulating(&self) -> bool {
        self.inner.engine.is_running()
    }

    pub fn snapshot(&self) -> AvatarSnapshot {
        self.inner.animation.snapshot()
    }

    pub fn physics_state(&self) -> PhysicsState {
        self.inner.engine.state()
    }

    pub fn latest_bounds(&self) -> Option<ScreenBounds> {
        self.inner.engine.latest_bounds()
    }

    pub fn companion_offset(&self) -> Option<CompanionOffset> {
        self.inner.follower.offset()
    }

    pub fn subscribe_avatar<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&AvatarSnapshot) + Send + Sync + 'static,
    {
        self.inner.animation.subscribe(observer)
    }

    pub fn subscribe_shell<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&ShellSignal) + Send + Sync + 'static,
    {
        self.inner.shell.subscribe(observer)
    }

    // --- pointer handlers -------------------------------------------------

    /// Press on the mascot window. `pointer` is in physical screen pixels.
    pub async fn handle_mouse_down(
        &self,
        pointer: PhysicalPoint,
        on_character: bool,
    ) -> Result<(), MascotError> {
        {
            let mut control = self.inner.control();
            if control.mode == ControlMode::Dragging {
                return Err(MascotError::invalid_transition(control.mode, "start a drag"));
            }
            let resume = control.mode;
            control.mode = ControlMode::Dragging;
            control.drag = Some(ActiveDrag {
                session: None,
                resume,
            });
            control.auto_walk_token = None;
        }

        // The origin is only read once no frame can move the window any more.
        self.inner.engine.stop();
        self.inner.auto_walk.disarm();
        self.inner.cancel_walk();

        let session = match self.read_drag_origin(pointer, on_character).await {
            Ok(session) => session,
            Err(err) => {
                self.abandon_pending_drag();
                return Err(err);
            }
        };
        if let Some(drag) = self.inner.control().drag.as_mut() {
            if drag.session.is_none() {
                drag.session = Some(session);
            }
        }
        log::debug!("mascot: drag started at ({}, {})", pointer.x, pointer.y);
        Ok(())
    }

    async fn read_drag_origin(
        &self,
        pointer: PhysicalPoint,
        on_character: bool,
    ) -> Result<DragSession, MascotError> {
        let origin = self.inner.host.outer_position(WindowRole::Mascot).await?;
        let scale = self.inner.host.scale_factor(WindowRole::Mascot).await?;
        Ok(DragSession::begin(pointer, origin, scale, on_character))
    }

    fn abandon_pending_drag(&self) {
        {
            let mut control = self.inner.control();
            let pending = control.drag.as_ref().is_some_and(|d| d.session.is_none());
            if !pending {
                return;
            }
            if let Some(drag) = control.drag.take() {
                control.mode = drag.resume;
            }
        }
        self.resume();
    }

    /// Pointer move while pressed. Moves the OS window directly.
    pub async fn handle_mouse_move(
        &self,
        pointer: PhysicalPoint,
    ) -> Result<Option<LogicalPoint>, MascotError> {
        let threshold = self.inner.config.drag.threshold;
        let (position, crossed, scale) = {
            let mut control = self.inner.control();
            let Some(session) = control.drag.as_mut().and_then(|d| d.session.as_mut()) else {
                return Ok(None);
            };
            let (position, crossed) = session.update(pointer, threshold);
            (position, crossed, session.scale_factor())
        };

        if crossed {
            self.inner.animation.set_state(AnimationState::Falling);
        }
        if let Err(err) = self
            .inner
            .host
            .set_outer_position(WindowRole::Mascot, to_physical(position, scale))
            .await
        {
            log::warn!("mascot: drag move failed: {err}");
        }
        self.inner.follower.update_position(position.x, position.y);
        Ok(Some(position))
    }

    /// Release. A drag hands the window back to physics after re-reading its
    /// real position; a click on the character jumps.
    pub async fn handle_mouse_up(&self) -> Result<DragRelease, MascotError> {
        let release = {
            let mut control = self.inner.control();
            let Some(drag) = control.drag.take() else {
                return Err(MascotError::NoActiveDrag);
            };
            control.mode = drag.resume;
            drag.session
                .map(DragSession::release)
                .unwrap_or(DragRelease::Cancelled)
        };

        if let DragRelease::Dropped { .. } = release {
            match self.inner.engine.sync_position(true).await {
                Ok(position) => {
                    log::info!("mascot: dropped at ({:.1}, {:.1})", position.x, position.y);
                }
                Err(err) => log::warn!("mascot: could not re-read position after drag: {err}"),
            }
        }

        self.resume();
        if release == DragRelease::Click {
            self.handle_click()?;
        }
        Ok(release)
    }

    /// Jump, if grounded.
    pub fn handle_click(&self) -> Result<bool, MascotError> {
        self.inner.ensure_not_dragging("jump")?;
        if !self.inner.engine.jump() {
            return Ok(false);
        }
        self.inner.animation.set_state(AnimationState::Jumping);
        Ok(true)
    }

    /// Toggle the companion. Returns whether it is open afterwards.
    pub fn handle_double_click(&self) -> Result<bool, MascotError> {
        if self.mode() == ControlMode::ChatOpen {
            self.close_chat();
            return Ok(false);
        }
        self.open_chat()?;
        Ok(true)
    }

    pub fn handle_context_menu(&self) {
        self.inner.shell.emit(&ShellSignal::ContextMenu);
    }

    // --- chat -------------------------------------------------------------

    /// Returns `false` when the chat was already open.
    pub fn open_chat(&self) -> Result<bool, MascotError> {
        {
            let mut control = self.inner.control();
            match control.mode {
                ControlMode::Dragging => {
                    return Err(MascotError::invalid_transition(control.mode, "open chat"));
                }
                ControlMode::ChatOpen => return Ok(false),
                ControlMode::Simulating => {
                    control.mode = ControlMode::ChatOpen;
                    control.auto_walk_token = None;
                }
            }
        }

        self.inner.auto_walk.disarm();
        self.inner.cancel_walk();

        let physics = self.inner.engine.config();
        let mascot = Size {
            width: physics.window_width,
            height: physics.window_height,
        };
        let primary = self.inner.engine.state().position();
        let position = self
            .inner
            .follower
            .open(primary, mascot, self.inner.engine.latest_bounds());
        self.inner.shell.emit(&ShellSignal::ChatOpened { position });
        Ok(true)
    }

    /// Returns `false` when the chat was not open.
    pub fn close_chat(&self) -> bool {
        {
            let mut control = self.inner.control();
            if control.mode != ControlMode::ChatOpen {
                return false;
            }
            control.mode = ControlMode::Simulating;
        }
        self.inner.follower.close();
        self.inner.shell.emit(&ShellSignal::ChatClosed);
        self.resume();
        true
    }

    /// The companion window was destroyed by the OS or the user.
    pub fn companion_closed(&self) {
        let reopened_simulation = {
            let mut control = self.inner.control();
            match control.mode {
                ControlMode::ChatOpen => {
                    control.mode = ControlMode::Simulating;
                    true
                }
                ControlMode::Dragging => {
                    if let Some(drag) = control.drag.as_mut() {
                        if drag.resume == ControlMode::ChatOpen {
                            drag.resume = ControlMode::Simulating;
                        }
                    }
                    false
                }
                ControlMode::Simulating => false,
            }
        };
        self.inner.follower.close();
        if reopened_simulation {
            self.resume();
        }
    }

    /// The companion window moved; user drags renegotiate the offset.
    pub async fn companion_moved(&self, position: PhysicalPoint) -> Option<CompanionOffset> {
        self.inner.follower.handle_companion_moved(position).await
    }

    // --- movement commands ------------------------------------------------

    pub fn walk_to_x(
        &self,
        target_x: f64,
        on_reach: Option<ReachCallback>,
    ) -> Result<Direction, MascotError> {
        self.inner.ensure_not_dragging("walk")?;
        self.inner.control().auto_walk_token = None;

        let weak = Arc::downgrade(&self.inner);
        let callback: ReachCallback = Box::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner
                    .animation
                    .transition(AnimationState::Walking, AnimationState::Idle);
            }
            if let Some(on_reach) = on_reach {
                on_reach();
            }
        });

        let direction = self.inner.engine.walk_to_x(target_x, Some(callback));
        self.inner.animation.face(direction);
        self.inner.animation.set_state(AnimationState::Walking);
        log::debug!("mascot: walking {:?} to x={target_x:.1}", direction);
        Ok(direction)
    }

    pub fn start_walking(&self, direction: Direction) -> Result<(), MascotError> {
        self.inner.ensure_not_dragging("walk")?;
        self.inner.control().auto_walk_token = None;
        self.inner.engine.start_walking(direction);
        self.inner.animation.face(direction);
        self.inner.animation.set_state(AnimationState::Walking);
        Ok(())
    }

    /// Cancel any walk; a pending goal's callback is dropped.
    pub fn stop_walking(&self) -> bool {
        self.inner.control().auto_walk_token = None;
        self.inner.cancel_walk()
    }

    pub fn apply_force(&self, fx: f64, fy: f64) -> Result<(), MascotError> {
        self.inner.ensure_not_dragging("apply a force")?;
        self.inner.engine.apply_force(fx, fy);
        Ok(())
    }

    // --- overlays ---------------------------------------------------------

    pub fn set_emotion(&self, emotion: Emotion, duration: Option<Duration>) {
        let duration = duration.unwrap_or(Duration::from_millis(
            self.inner.config.emotion.default_duration_ms,
        ));
        self.inner.animation.set_emotion(emotion, duration);
    }

    pub fn talk(&self, timeout: Option<Duration>) {
        self.inner.animation.talk(timeout);
    }

    pub fn stop_talking(&self) -> bool {
        self.inner
            .animation
            .transition(AnimationState::Talking, AnimationState::Idle)
    }

    /// Hand the window back to physics in whatever mode is current.
    fn resume(&self) {
        let mode = self.mode();
        if mode == ControlMode::Dragging {
            return;
        }
        self.inner.engine.start();
        if mode == ControlMode::Simulating {
            self.inner.auto_walk.arm(Arc::downgrade(&self.inner));
        }
    }
}

impl<H: WindowHost> ControllerInner<H> {
    fn control(&self) -> MutexGuard<'_, ControlState> {
        self.control
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_not_dragging(&self, action: &str) -> Result<(), MascotError> {
        let mode = self.control().mode;
        if mode == ControlMode::Dragging {
            return Err(MascotError::invalid_transition(mode, action));
        }
        Ok(())
    }

    fn cancel_walk(&self) -> bool {
        let cancelled = self.engine.stop_walking();
        if cancelled {
            self.animation
                .transition(AnimationState::Walking, AnimationState::Idle);
        }
        cancelled
    }

    fn on_physics_event(&self, event: &PhysicsEvent) {
        self.animation.on_physics_event(event);
        match event {
            PhysicsEvent::Landed if self.engine.walk_direction().is_some() => {
                self.animation
                    .transition(AnimationState::Idle, AnimationState::Walking);
            }
            PhysicsEvent::EdgeHit(_) => {
                if let Some(direction) = self.engine.walk_direction() {
                    self.animation.face(direction);
                }
            }
            PhysicsEvent::Moved(position) => self.follower.update_position(position.x, position.y),
            _ => {}
        }
    }
}

impl<H: WindowHost> AutoWalkHost for ControllerInner<H> {
    fn can_auto_walk(&self) -> bool {
        {
            let control = self.control();
            if control.mode != ControlMode::Simulating || control.drag.is_some() {
                return false;
            }
        }
        self.animation.state() == AnimationState::Idle
            && self.engine.is_grounded()
            && self.engine.walk_direction().is_none()
    }

    fn begin_auto_walk(&self, direction: Direction) -> Option<u64> {
        let token = {
            let mut control = self.control();
            if control.mode != ControlMode::Simulating {
                return None;
            }
            control.next_token += 1;
            control.auto_walk_token = Some(control.next_token);
            control.next_token
        };
        self.engine.start_walking(direction);
        self.animation.face(direction);
        self.animation.set_state(AnimationState::Walking);
        Some(token)
    }

    fn end_auto_walk(&self, token: u64) {
        {
            let mut control = self.control();
            if control.auto_walk_token != Some(token) {
                return;
            }
            control.auto_walk_token = None;
        }
        self.cancel_walk();
    }
}
