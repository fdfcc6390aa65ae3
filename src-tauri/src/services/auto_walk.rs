use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::JoinHandle;

use super::config::AutoWalkConfig;
use super::physics::Direction;

/// What the scheduler needs from whoever owns the mascot.
pub trait AutoWalkHost: Send + Sync + 'static {
    /// Evaluated when the timer fires, never when it is armed.
    fn can_auto_walk(&self) -> bool;

    /// Start a timed walk; `None` if the host refused.
    fn begin_auto_walk(&self, direction: Direction) -> Option<u64>;

    /// End the walk started with `token`. Ignored when something else has
    /// taken over in the meantime.
    fn end_auto_walk(&self, token: u64);
}

/// Re-arming random timer for spontaneous walks.
pub struct AutoWalkScheduler {
    config: AutoWalkConfig,
    rng: Arc<Mutex<StdRng>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl AutoWalkScheduler {
    pub fn new(config: AutoWalkConfig) -> Self {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    pub fn with_seed(config: AutoWalkConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: AutoWalkConfig, rng: StdRng) -> Self {
        Self {
            config,
            rng: Arc::new(Mutex::new(rng)),
            task: Mutex::new(None),
        }
    }

    pub fn is_armed(&self) -> bool {
        self.task
            .lock()
            .map(|task| task.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Start the timer loop. No-op when already armed.
    pub fn arm<T: AutoWalkHost>(&self, host: Weak<T>) -> bool {
        let Ok(mut task) = self.task.lock() else {
            return false;
        };
        if task.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }
        let config = self.config;
        let rng = self.rng.clone();
        *task = Some(tokio::spawn(run(config, rng, host)));
        log::debug!("auto_walk: armed");
        true
    }

    pub fn disarm(&self) -> bool {
        let Ok(mut task) = self.task.lock() else {
            return false;
        };
        let Some(handle) = task.take() else {
            return false;
        };
        handle.abort();
        log::debug!("auto_walk: disarmed");
        true
    }
}

impl Drop for AutoWalkScheduler {
    fn drop(&mut self) {
        if let Ok(mut task) = self.task.lock() {
            if let Some(handle) = task.take() {
                handle.abort();
            }
        }
    }
}

struct Draw {
    proceed: bool,
    direction: Direction,
}

fn next_delay(config: &AutoWalkConfig, rng: &Mutex<StdRng>) -> Duration {
    let ms = match rng.lock() {
        Ok(mut rng) => rng.random_range(config.min_delay_ms..=config.max_delay_ms),
        Err(_) => config.max_delay_ms,
    };
    Duration::from_millis(ms)
}

fn draw(config: &AutoWalkConfig, rng: &Mutex<StdRng>) -> Draw {
    let Ok(mut rng) = rng.lock() else {
        return Draw {
            proceed: false,
            direction: Direction::Right,
        };
    };
    let proceed = rng.random_bool(config.probability.clamp(0.0, 1.0));
    let direction = if rng.random_bool(0.5) {
        Direction::Left
    } else {
        Direction::Right
    };
    Draw { proceed, direction }
}

async fn run<T: AutoWalkHost>(config: AutoWalkConfig, rng: Arc<Mutex<StdRng>>, host: Weak<T>) {
    let walk_for = Duration::from_millis(config.walk_duration_ms);
    loop {
        tokio::time::sleep(next_delay(&config, &rng)).await;

        let Some(strong) = host.upgrade() else {
            break;
        };
        if !strong.can_auto_walk() {
            continue;
        }
        let draw = draw(&config, &rng);
        if !draw.proceed {
            continue;
        }
        let Some(token) = strong.begin_auto_walk(draw.direction) else {
            continue;
        };
        drop(strong);
        log::debug!("auto_walk: walking {:?} for {:?}", draw.direction, walk_for);

        tokio::time::sleep(walk_for).await;
        let Some(strong) = host.upgrade() else {
            break;
        };
        strong.end_auto_walk(token);
    }
}
