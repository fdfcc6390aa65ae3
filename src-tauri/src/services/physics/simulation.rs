use smallvec::SmallVec;

use super::{Direction, Edge, PhysicsEvent, PhysicsState};
use crate::services::config::PhysicsConfig;
use crate::windows::bounds::ScreenBounds;
use crate::windows::geometry::LogicalPoint;

pub type ReachCallback = Box<dyn FnOnce() + Send + 'static>;

struct WalkGoal {
    target_x: f64,
    direction: Direction,
    on_reach: Option<ReachCallback>,
}

impl WalkGoal {
    /// Direction-aware so a step that overshoots still counts.
    fn is_reached(&self, x: f64, bounds: &ScreenBounds, window_width: f64) -> bool {
        let target = bounds.clamp_x(self.target_x, window_width);
        match self.direction {
            Direction::Right => x >= target,
            Direction::Left => x <= target,
        }
    }
}

/// Result of one frame. The reach callback is handed out rather than run so
/// the caller can invoke it outside any lock.
pub struct StepOutcome {
    pub position: LogicalPoint,
    pub events: SmallVec<[PhysicsEvent; 4]>,
    pub reached: Option<ReachCallback>,
}

/// Owned simulation state and the only code that integrates it.
pub struct Simulation {
    state: PhysicsState,
    walk: Option<Direction>,
    goal: Option<WalkGoal>,
    grounded: Option<bool>,
}

impl Simulation {
    pub fn new(spawn: LogicalPoint) -> Self {
        Self {
            state: PhysicsState {
                x: spawn.x,
                y: spawn.y,
                velocity_x: 0.0,
                velocity_y: 0.0,
            },
            walk: None,
            goal: None,
            grounded: None,
        }
    }

    pub fn state(&self) -> PhysicsState {
        self.state
    }

    pub fn is_grounded(&self) -> bool {
        self.grounded == Some(true)
    }

    pub fn has_goal(&self) -> bool {
        self.goal.is_some()
    }

    /// Direction currently forced by a goal or walk intent.
    pub fn walk_direction(&self) -> Option<Direction> {
        self.goal.as_ref().map(|g| g.direction).or(self.walk)
    }

    pub fn apply_force(&mut self, fx: f64, fy: f64) {
        self.state.velocity_x += fx;
        self.state.velocity_y += fy;
    }

    /// Only takes effect when vertical velocity is exactly zero.
    pub fn jump(&mut self, velocity: f64) -> bool {
        if self.state.velocity_y != 0.0 {
            return false;
        }
        self.state.velocity_y = -velocity.abs();
        true
    }

    /// Continuous walk intent. Replaces any goal without reporting it reached.
    pub fn start_walking(&mut self, direction: Direction) {
        self.goal = None;
        self.walk = Some(direction);
    }

    /// Clears walk intent and goal. The goal's callback is dropped, never run.
    pub fn stop_walking(&mut self) -> bool {
        let had_goal = self.goal.take().is_some();
        let had_walk = self.walk.take().is_some();
        had_goal || had_walk
    }

    pub fn walk_to_x(&mut self, target_x: f64, on_reach: Option<ReachCallback>) -> Direction {
        debug_assert!(target_x.is_finite(), "walk target must be finite");
        let direction = Direction::toward(self.state.x, target_x);
        self.walk = None;
        self.goal = Some(WalkGoal {
            target_x,
            direction,
            on_reach,
        });
        direction
    }

    /// Overwrite the position wholesale, e.g. after a manual drag.
    pub fn sync_to(&mut self, position: LogicalPoint, reset_velocity: bool) {
        self.state.x = position.x;
        self.state.y = position.y;
        if reset_velocity {
            self.state.velocity_x = 0.0;
            self.state.velocity_y = 0.0;
        }
        self.grounded = None;
    }

    fn take_reached_goal(&mut self, bounds: &ScreenBounds, window_width: f64) -> Option<WalkGoal> {
        let reached = self
            .goal
            .as_ref()
            .is_some_and(|goal| goal.is_reached(self.state.x, bounds, window_width));
        if reached { self.goal.take() } else { None }
    }

    pub fn step(&mut self, config: &PhysicsConfig, bounds: &ScreenBounds) -> StepOutcome {
        let mut events = SmallVec::new();
        let width = config.window_width;

        self.state.velocity_y += config.gravity;

        let mut finished = self.take_reached_goal(bounds, width);
        match self.walk_direction() {
            Some(direction) if finished.is_none() => {
                self.state.velocity_x = direction.sign() * config.walk_speed;
            }
            _ => {
                self.state.velocity_x *= config.friction;
                if self.state.velocity_x.abs() < config.min_velocity {
                    self.state.velocity_x = 0.0;
                }
            }
        }
        if finished.is_some() {
            self.state.velocity_x = 0.0;
        }

        self.state.x += self.state.velocity_x;
        self.state.y += self.state.velocity_y;

        if finished.is_none() {
            finished = self.take_reached_goal(bounds, width);
            if finished.is_some() {
                self.state.velocity_x = 0.0;
            }
        }

        let floor_y = bounds.floor_y(config.window_height);
        let mut on_ground = false;
        if self.state.y >= floor_y {
            self.state.y = floor_y;
            let incoming = self.state.velocity_y;
            if incoming > config.min_bounce_velocity {
                self.state.velocity_y = -incoming * config.bounce_factor;
                events.push(PhysicsEvent::Bounced { speed: incoming });
            } else {
                self.state.velocity_y = 0.0;
                on_ground = true;
            }
        }

        match (self.grounded, on_ground) {
            (Some(true), true) | (Some(false), false) => {}
            (_, true) => events.push(PhysicsEvent::Landed),
            (_, false) => events.push(PhysicsEvent::Airborne),
        }
        self.grounded = Some(on_ground);

        let max_x = bounds.max_x(width);
        let edge = if self.state.x < bounds.left {
            self.state.x = bounds.left;
            self.state.velocity_x = self.state.velocity_x.abs() * config.bounce_factor;
            Some(Edge::Left)
        } else if self.state.x > max_x {
            self.state.x = max_x;
            self.state.velocity_x = -self.state.velocity_x.abs() * config.bounce_factor;
            Some(Edge::Right)
        } else {
            None
        };
        if let Some(edge) = edge {
            if self.walk.is_some() {
                self.walk = Some(edge.away());
            }
            events.push(PhysicsEvent::EdgeHit(edge));
        }

        let reached = finished.map(|goal| {
            events.push(PhysicsEvent::GoalReached);
            goal.on_reach
        });

        let position = self.state.position();
        events.push(PhysicsEvent::Moved(position));

        StepOutcome {
            position,
            events,
            reached: reached.flatten(),
        }
    }
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("state", &self.state)
            .field("walk", &self.walk)
            .field("goal_x", &self.goal.as_ref().map(|g| g.target_x))
            .field("grounded", &self.grounded)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Floor at y = 500 for a 100 px window, no taskbar.
    fn bounds() -> ScreenBounds {
        ScreenBounds {
            left: 0.0,
            top: 0.0,
            width: 1000.0,
            height: 600.0,
            taskbar_reserve: 0.0,
            scale_factor: 1.0,
        }
    }

    fn config() -> PhysicsConfig {
        PhysicsConfig {
            window_width: 100.0,
            window_height: 100.0,
            taskbar_reserve: 0.0,
            ..PhysicsConfig::default()
        }
    }

    fn counting_callback() -> (Arc<AtomicUsize>, ReachCallback) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let callback: ReachCallback = Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (hits, callback)
    }

    fn run_callback(outcome: StepOutcome) -> SmallVec<[PhysicsEvent; 4]> {
        if let Some(callback) = outcome.reached {
            callback();
        }
        outcome.events
    }

    #[test]
    fn test_settles_on_floor_with_bounded_bounces() {
        let config = config();
        let bounds = bounds();
        let mut sim = Simulation::new(LogicalPoint::new(100.0, 100.0));

        let mut bounces = 0;
        let mut landings = 0;
        let mut settled_at = None;
        for tick in 0..400 {
            for event in run_callback(sim.step(&config, &bounds)) {
                match event {
                    PhysicsEvent::Bounced { .. } => bounces += 1,
                    PhysicsEvent::Landed => landings += 1,
                    _ => {}
                }
            }
            if settled_at.is_none() && sim.is_grounded() {
                settled_at = Some(tick);
            }
        }

        let state = sim.state();
        assert_eq!(state.y, 500.0);
        assert_eq!(state.velocity_y, 0.0);
        assert!(bounces <= 2, "bounced {bounces} times");
        assert_eq!(landings, 1);
        assert!(settled_at.is_some_and(|t| t < 200));
    }

    #[test]
    fn test_floor_bounce_reflects_incoming_speed() {
        let config = config();
        let bounds = bounds();
        let mut sim = Simulation::new(LogicalPoint::new(100.0, 495.0));
        sim.apply_force(0.0, 11.5);

        let events = run_callback(sim.step(&config, &bounds));
        assert!(events.contains(&PhysicsEvent::Bounced { speed: 12.0 }));
        assert_eq!(sim.state().y, 500.0);
        assert!((sim.state().velocity_y - -7.2).abs() < 1e-9);
    }

    #[test]
    fn test_slow_contact_grounds_once() {
        let config = config();
        let bounds = bounds();
        let mut sim = Simulation::new(LogicalPoint::new(100.0, 499.0));
        sim.apply_force(0.0, 2.0);

        let first = run_callback(sim.step(&config, &bounds));
        assert!(first.contains(&PhysicsEvent::Landed));
        assert_eq!(sim.state().velocity_y, 0.0);

        for _ in 0..20 {
            let events = run_callback(sim.step(&config, &bounds));
            assert!(!events.contains(&PhysicsEvent::Landed));
            assert!(!events.contains(&PhysicsEvent::Airborne));
        }
    }

    #[test]
    fn test_walk_to_x_reaches_after_exact_ticks() {
        let config = config();
        let bounds = bounds();
        let mut sim = Simulation::new(LogicalPoint::new(100.0, 500.0));
        let (hits, callback) = counting_callback();

        assert_eq!(sim.walk_to_x(300.0, Some(callback)), Direction::Right);
        for tick in 1..=100 {
            assert_eq!(sim.walk_direction(), Some(Direction::Right));
            let events = run_callback(sim.step(&config, &bounds));
            if tick < 100 {
                assert_eq!(hits.load(Ordering::SeqCst), 0, "fired early at {tick}");
                assert_eq!(sim.state().velocity_x, 2.0);
            } else {
                assert!(events.contains(&PhysicsEvent::GoalReached));
            }
        }

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(sim.state().x, 300.0);
        assert_eq!(sim.state().velocity_x, 0.0);
        assert!(!sim.has_goal());

        for _ in 0..10 {
            run_callback(sim.step(&config, &bounds));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_goal_overshoot_counts_as_reached() {
        let config = PhysicsConfig {
            walk_speed: 3.0,
            ..config()
        };
        let bounds = bounds();
        let mut sim = Simulation::new(LogicalPoint::new(100.0, 500.0));
        let (hits, callback) = counting_callback();

        assert_eq!(sim.walk_to_x(95.0, Some(callback)), Direction::Left);
        run_callback(sim.step(&config, &bounds));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        run_callback(sim.step(&config, &bounds));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(sim.state().x, 94.0);
    }

    #[test]
    fn test_goal_behind_wall_completes_at_wall() {
        let config = config();
        let bounds = bounds();
        let mut sim = Simulation::new(LogicalPoint::new(880.0, 500.0));
        let (hits, callback) = counting_callback();

        sim.walk_to_x(5_000.0, Some(callback));
        for _ in 0..20 {
            run_callback(sim.step(&config, &bounds));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(sim.state().x, 900.0);
    }

    #[test]
    fn test_already_satisfied_goal_fires_without_moving() {
        let config = config();
        let bounds = bounds();
        let mut sim = Simulation::new(LogicalPoint::new(300.0, 500.0));
        let (hits, callback) = counting_callback();

        sim.walk_to_x(300.0, Some(callback));
        run_callback(sim.step(&config, &bounds));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(sim.state().x, 300.0);
    }

    #[test]
    fn test_stop_walking_cancels_without_callback() {
        let config = config();
        let bounds = bounds();
        let mut sim = Simulation::new(LogicalPoint::new(100.0, 500.0));
        let (hits, callback) = counting_callback();

        sim.walk_to_x(300.0, Some(callback));
        run_callback(sim.step(&config, &bounds));
        assert!(sim.stop_walking());
        for _ in 0..200 {
            run_callback(sim.step(&config, &bounds));
        }
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(!sim.stop_walking());
    }

    #[test]
    fn test_friction_decays_to_exact_zero() {
        let config = config();
        let bounds = bounds();
        let mut sim = Simulation::new(LogicalPoint::new(400.0, 500.0));
        sim.apply_force(6.0, 0.0);

        let mut previous = f64::INFINITY;
        for _ in 0..100 {
            run_callback(sim.step(&config, &bounds));
            let vx = sim.state().velocity_x;
            assert!(vx <= previous);
            previous = vx;
        }
        assert_eq!(sim.state().velocity_x, 0.0);
    }

    #[test]
    fn test_walk_speed_bounds_velocity() {
        let config = config();
        let bounds = bounds();
        let mut sim = Simulation::new(LogicalPoint::new(400.0, 500.0));
        sim.apply_force(40.0, 0.0);
        sim.start_walking(Direction::Left);

        for _ in 0..50 {
            run_callback(sim.step(&config, &bounds));
            assert!(sim.state().velocity_x.abs() <= config.walk_speed);
        }
    }

    #[test]
    fn test_left_wall_clamps_and_reflects() {
        let config = config();
        let bounds = bounds();
        let mut sim = Simulation::new(LogicalPoint::new(3.0, 500.0));
        sim.apply_force(-10.0, 0.0);

        let events = run_callback(sim.step(&config, &bounds));
        assert!(events.contains(&PhysicsEvent::EdgeHit(Edge::Left)));
        assert_eq!(sim.state().x, 0.0);
        assert!(sim.state().velocity_x >= 0.0);
    }

    #[test]
    fn test_right_wall_turns_walk_around() {
        let config = config();
        let bounds = bounds();
        let mut sim = Simulation::new(LogicalPoint::new(899.0, 500.0));
        sim.start_walking(Direction::Right);

        let events = run_callback(sim.step(&config, &bounds));
        assert!(events.contains(&PhysicsEvent::EdgeHit(Edge::Right)));
        assert_eq!(sim.state().x, 900.0);
        assert!(sim.state().velocity_x <= 0.0);
        assert_eq!(sim.walk_direction(), Some(Direction::Left));
    }

    #[test]
    fn test_jump_only_when_grounded() {
        let config = config();
        let bounds = bounds();
        let mut sim = Simulation::new(LogicalPoint::new(100.0, 100.0));
        run_callback(sim.step(&config, &bounds));
        assert!(!sim.jump(config.jump_velocity));

        let mut sim = Simulation::new(LogicalPoint::new(100.0, 500.0));
        run_callback(sim.step(&config, &bounds));
        assert!(sim.is_grounded());
        assert!(sim.jump(config.jump_velocity));
        let events = run_callback(sim.step(&config, &bounds));
        assert!(events.contains(&PhysicsEvent::Airborne));
        assert!(sim.state().y < 500.0);
    }

    #[test]
    fn test_sync_resets_ground_memory() {
        let config = config();
        let bounds = bounds();
        let mut sim = Simulation::new(LogicalPoint::new(100.0, 500.0));
        run_callback(sim.step(&config, &bounds));
        assert!(sim.is_grounded());

        sim.sync_to(LogicalPoint::new(250.0, 200.0), true);
        assert!(!sim.is_grounded());
        assert_eq!(sim.state().x, 250.0);
        let events = run_callback(sim.step(&config, &bounds));
        assert!(events.contains(&PhysicsEvent::Airborne));
    }
}
