use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use super::observers::{ObserverRegistry, Subscription};
use super::physics::{Direction, PhysicsEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationState {
    #[default]
    Idle,
    Walking,
    Jumping,
    Falling,
    Talking,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Sad,
    Excited,
    Thinking,
    Surprised,
    Love,
}

impl Emotion {
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "neutral" => Some(Self::Neutral),
            "happy" => Some(Self::Happy),
            "sad" => Some(Self::Sad),
            "excited" => Some(Self::Excited),
            "thinking" => Some(Self::Thinking),
            "surprised" => Some(Self::Surprised),
            "love" => Some(Self::Love),
            _ => None,
        }
    }
}

/// Everything the render layer draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarSnapshot {
    pub state: AnimationState,
    pub direction: Direction,
    pub emotion: Emotion,
}

#[derive(Default)]
struct PendingTimer {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl PendingTimer {
    /// Abort whatever is pending and return the generation for its successor.
    fn cancel(&mut self) -> u64 {
        self.generation += 1;
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
        self.generation
    }
}

/// Animation state plus the orthogonal emotion overlay.
///
/// Lock order is always timer before snapshot, so a revert that has already
/// woken up can never overwrite a state set after it was cancelled.
#[derive(Clone, Default)]
pub struct AnimationMachine {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    // NOTE: Using std::sync::Mutex since lock is never held across .await
    current: Mutex<AvatarSnapshot>,
    emotion_timer: Mutex<PendingTimer>,
    talk_timer: Mutex<PendingTimer>,
    changes: ObserverRegistry<AvatarSnapshot>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AnimationMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> AvatarSnapshot {
        *lock(&self.inner.current)
    }

    pub fn state(&self) -> AnimationState {
        self.snapshot().state
    }

    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&AvatarSnapshot) + Send + Sync + 'static,
    {
        self.inner.changes.subscribe(observer)
    }

    /// Explicit state change. Supersedes any pending talk timeout.
    pub fn set_state(&self, state: AnimationState) {
        let mut timer = lock(&self.inner.talk_timer);
        timer.cancel();
        let change = self.inner.update(|s| s.state = state);
        drop(timer);
        self.inner.publish(change);
    }

    /// Like `set_state` but only when the machine is currently in `from`.
    pub fn transition(&self, from: AnimationState, to: AnimationState) -> bool {
        let mut timer = lock(&self.inner.talk_timer);
        let mut current = lock(&self.inner.current);
        if current.state != from {
            return false;
        }
        timer.cancel();
        current.state = to;
        let snapshot = *current;
        drop(current);
        drop(timer);
        self.inner.publish(Some(snapshot));
        true
    }

    pub fn face(&self, direction: Direction) {
        let change = self.inner.update(|s| s.direction = direction);
        self.inner.publish(change);
    }

    /// Physics-driven transitions.
    pub fn on_physics_event(&self, event: &PhysicsEvent) {
        match event {
            PhysicsEvent::Landed => {
                let mut timer = lock(&self.inner.talk_timer);
                let change = self.inner.update(|s| {
                    if matches!(s.state, AnimationState::Jumping | AnimationState::Falling) {
                        s.state = AnimationState::Idle;
                    }
                });
                if change.is_some() {
                    timer.cancel();
                }
                drop(timer);
                self.inner.publish(change);
            }
            PhysicsEvent::Airborne => {
                let mut timer = lock(&self.inner.talk_timer);
                let change = self.inner.update(|s| {
                    if s.state != AnimationState::Jumping {
                        s.state = AnimationState::Falling;
                    }
                });
                if change.is_some() {
                    timer.cancel();
                }
                drop(timer);
                self.inner.publish(change);
            }
            PhysicsEvent::EdgeHit(edge) => self.face(edge.away()),
            PhysicsEvent::Bounced { .. } | PhysicsEvent::GoalReached | PhysicsEvent::Moved(_) => {}
        }
    }

    /// Enter `Talking`; with a timeout, fall back to `Idle` unless something
    /// else changed the state first.
    pub fn talk(&self, timeout: Option<Duration>) {
        let mut timer = lock(&self.inner.talk_timer);
        let generation = timer.cancel();
        let change = self.inner.update(|s| s.state = AnimationState::Talking);
        if let Some(after) = timeout {
            let weak = Arc::downgrade(&self.inner);
            timer.handle = Some(tokio::spawn(async move {
                tokio::time::sleep(after).await;
                Inner::end_talk(weak, generation);
            }));
        }
        drop(timer);
        self.inner.publish(change);
    }

    /// Set the emotion overlay, replacing any pending revert.
    ///
    /// Non-neutral emotions revert to neutral after `duration`.
    pub fn set_emotion(&self, emotion: Emotion, duration: Duration) {
        let mut timer = lock(&self.inner.emotion_timer);
        let generation = timer.cancel();
        let change = self.inner.update(|s| s.emotion = emotion);
        if emotion != Emotion::Neutral {
            let weak = Arc::downgrade(&self.inner);
            timer.handle = Some(tokio::spawn(async move {
                tokio::time::sleep(duration).await;
                Inner::revert_emotion(weak, generation);
            }));
        }
        drop(timer);
        self.inner.publish(change);
    }

    pub fn has_pending_emotion_revert(&self) -> bool {
        lock(&self.inner.emotion_timer).handle.is_some()
    }
}

impl Inner {
    /// Apply `f` and return the new snapshot if anything changed.
    fn update(&self, f: impl FnOnce(&mut AvatarSnapshot)) -> Option<AvatarSnapshot> {
        let mut current = lock(&self.current);
        let before = *current;
        f(&mut current);
        (*current != before).then_some(*current)
    }

    fn publish(&self, change: Option<AvatarSnapshot>) {
        if let Some(snapshot) = change {
            log::debug!(
                "animation: {:?} facing {:?} ({:?})",
                snapshot.state,
                snapshot.direction,
                snapshot.emotion
            );
            self.changes.emit(&snapshot);
        }
    }

    fn revert_emotion(weak: Weak<Self>, generation: u64) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let mut timer = lock(&inner.emotion_timer);
        if timer.generation != generation {
            return;
        }
        timer.handle = None;
        let change = inner.update(|s| s.emotion = Emotion::Neutral);
        drop(timer);
        inner.publish(change);
    }

    fn end_talk(weak: Weak<Self>, generation: u64) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        let mut timer = lock(&inner.talk_timer);
        if timer.generation != generation {
            return;
        }
        timer.handle = None;
        let change = inner.update(|s| {
            if s.state == AnimationState::Talking {
                s.state = AnimationState::Idle;
            }
        });
        drop(timer);
        inner.publish(change);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::physics::Edge;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SECOND: Duration = Duration::from_secs(1);

    #[test]
    fn test_parse_emotion() {
        assert_eq!(Emotion::parse("Happy"), Some(Emotion::Happy));
        assert_eq!(Emotion::parse(" love "), Some(Emotion::Love));
        assert_eq!(Emotion::parse("angry"), None);
    }

    #[test]
    fn test_snapshot_serializes_lowercase() {
        let snapshot = AvatarSnapshot {
            state: AnimationState::Walking,
            direction: Direction::Left,
            emotion: Emotion::Thinking,
        };
        let value = serde_json::to_value(snapshot).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"state": "walking", "direction": "left", "emotion": "thinking"})
        );
    }

    #[test]
    fn test_landing_ends_jump_only() {
        let machine = AnimationMachine::new();
        machine.set_state(AnimationState::Jumping);
        machine.on_physics_event(&PhysicsEvent::Landed);
        assert_eq!(machine.state(), AnimationState::Idle);

        machine.set_state(AnimationState::Walking);
        machine.on_physics_event(&PhysicsEvent::Landed);
        assert_eq!(machine.state(), AnimationState::Walking);
    }

    #[test]
    fn test_airborne_falls_unless_jumping() {
        let machine = AnimationMachine::new();
        machine.set_state(AnimationState::Jumping);
        machine.on_physics_event(&PhysicsEvent::Airborne);
        assert_eq!(machine.state(), AnimationState::Jumping);

        machine.set_state(AnimationState::Idle);
        machine.on_physics_event(&PhysicsEvent::Airborne);
        assert_eq!(machine.state(), AnimationState::Falling);
        machine.on_physics_event(&PhysicsEvent::Landed);
        assert_eq!(machine.state(), AnimationState::Idle);
    }

    #[test]
    fn test_edge_hit_flips_facing() {
        let machine = AnimationMachine::new();
        machine.face(Direction::Right);
        machine.on_physics_event(&PhysicsEvent::EdgeHit(Edge::Right));
        assert_eq!(machine.snapshot().direction, Direction::Left);
    }

    #[test]
    fn test_publishes_only_changes() {
        let machine = AnimationMachine::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let _sub = machine.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        machine.set_state(AnimationState::Walking);
        machine.set_state(AnimationState::Walking);
        machine.face(Direction::Right);
        machine.face(Direction::Left);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_transition_requires_source_state() {
        let machine = AnimationMachine::new();
        assert!(!machine.transition(AnimationState::Walking, AnimationState::Idle));
        machine.set_state(AnimationState::Walking);
        assert!(machine.transition(AnimationState::Walking, AnimationState::Idle));
        assert_eq!(machine.state(), AnimationState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_emotion_reverts_after_duration() {
        let machine = AnimationMachine::new();
        machine.set_emotion(Emotion::Happy, 5 * SECOND);

        tokio::time::sleep(4 * SECOND).await;
        assert_eq!(machine.snapshot().emotion, Emotion::Happy);
        tokio::time::sleep(2 * SECOND).await;
        assert_eq!(machine.snapshot().emotion, Emotion::Neutral);
        assert!(!machine.has_pending_emotion_revert());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_emotion_cancels_first_revert() {
        let machine = AnimationMachine::new();
        machine.set_emotion(Emotion::Happy, 5 * SECOND);
        tokio::time::sleep(SECOND).await;
        machine.set_emotion(Emotion::Sad, 5 * SECOND);

        tokio::time::sleep(4 * SECOND + SECOND / 2).await;
        assert_eq!(machine.snapshot().emotion, Emotion::Sad);

        tokio::time::sleep(SECOND).await;
        assert_eq!(machine.snapshot().emotion, Emotion::Neutral);
    }

    #[tokio::test(start_paused = true)]
    async fn test_neutral_emotion_schedules_nothing() {
        let machine = AnimationMachine::new();
        machine.set_emotion(Emotion::Love, 5 * SECOND);
        machine.set_emotion(Emotion::Neutral, 5 * SECOND);
        assert!(!machine.has_pending_emotion_revert());
    }

    #[tokio::test(start_paused = true)]
    async fn test_talk_timeout_returns_to_idle() {
        let machine = AnimationMachine::new();
        machine.talk(Some(2 * SECOND));
        assert_eq!(machine.state(), AnimationState::Talking);

        tokio::time::sleep(3 * SECOND).await;
        assert_eq!(machine.state(), AnimationState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_state_cancels_talk_timeout() {
        let machine = AnimationMachine::new();
        machine.talk(Some(2 * SECOND));
        machine.set_state(AnimationState::Jumping);

        tokio::time::sleep(3 * SECOND).await;
        assert_eq!(machine.state(), AnimationState::Jumping);
    }

    #[tokio::test(start_paused = true)]
    async fn test_physics_transition_cancels_talk_timeout() {
        let machine = AnimationMachine::new();
        machine.talk(Some(2 * SECOND));
        machine.on_physics_event(&PhysicsEvent::Airborne);
        assert_eq!(machine.state(), AnimationState::Falling);

        tokio::time::sleep(3 * SECOND).await;
        assert_eq!(machine.state(), AnimationState::Falling);
    }
}
