//! Tunables for the mascot simulation.
//!
//! Everything has a sane default; `MascotConfig::from_env()` layers a mascot
//! preset and per-field overrides from the environment on top of it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MascotKind {
    #[default]
    Clawd,
    Supiki,
}

impl MascotKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "clawd" => Some(Self::Clawd),
            "supiki" => Some(Self::Supiki),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clawd => "clawd",
            Self::Supiki => "supiki",
        }
    }
}

/// Per-frame integration constants, in logical pixels per frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicsConfig {
    pub gravity: f64,
    pub friction: f64,
    pub bounce_factor: f64,
    pub walk_speed: f64,
    pub min_velocity: f64,
    /// Incoming floor speed at or below this settles instead of bouncing.
    pub min_bounce_velocity: f64,
    pub jump_velocity: f64,
    pub window_width: f64,
    pub window_height: f64,
    pub taskbar_reserve: f64,
    pub bounds_refresh_frames: u32,
    pub frame_interval_ms: u64,
    pub spawn_x: f64,
    pub spawn_y: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: 0.5,
            friction: 0.9,
            bounce_factor: 0.6,
            walk_speed: 2.0,
            min_velocity: 0.1,
            min_bounce_velocity: 8.0,
            jump_velocity: 10.0,
            window_width: 160.0,
            window_height: 160.0,
            taskbar_reserve: 48.0,
            bounds_refresh_frames: 60,
            frame_interval_ms: 16,
            spawn_x: 100.0,
            spawn_y: 100.0,
        }
    }
}

impl PhysicsConfig {
    /// Preset weights for each mascot variant.
    pub fn for_kind(kind: MascotKind) -> Self {
        match kind {
            MascotKind::Clawd => Self::default(),
            MascotKind::Supiki => Self {
                gravity: 0.6,
                bounce_factor: 0.45,
                walk_speed: 1.5,
                jump_velocity: 11.0,
                ..Self::default()
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoWalkConfig {
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub probability: f64,
    pub walk_duration_ms: u64,
}

impl Default for AutoWalkConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: 5_000,
            max_delay_ms: 15_000,
            probability: 0.5,
            walk_duration_ms: 3_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragConfig {
    /// Logical pixels the pointer must travel on either axis before a press
    /// counts as a drag.
    pub threshold: f64,
}

impl Default for DragConfig {
    fn default() -> Self {
        Self { threshold: 5.0 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanionConfig {
    pub width: f64,
    pub height: f64,
    pub gap: f64,
    pub edge_margin: f64,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            width: 380.0,
            height: 520.0,
            gap: 12.0,
            edge_margin: 12.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmotionConfig {
    pub default_duration_ms: u64,
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MascotConfig {
    pub kind: MascotKind,
    pub physics: PhysicsConfig,
    pub auto_walk: AutoWalkConfig,
    pub drag: DragConfig,
    pub companion: CompanionConfig,
    pub emotion: EmotionConfig,
}

impl MascotConfig {
    pub fn for_kind(kind: MascotKind) -> Self {
        Self {
            kind,
            physics: PhysicsConfig::for_kind(kind),
            ..Self::default()
        }
    }

    /// Load configuration from the environment.
    ///
    /// Reads:
    /// - `MASCOT_TYPE` (fallback: `VITE_MASCOT_TYPE`), `clawd` or `supiki`
    /// - `MASCOT_GRAVITY`, `MASCOT_FRICTION`, `MASCOT_BOUNCE`, `MASCOT_WALK_SPEED`
    /// - `MASCOT_AUTO_WALK_MIN_MS`, `MASCOT_AUTO_WALK_MAX_MS`,
    ///   `MASCOT_AUTO_WALK_PROBABILITY`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let kind = lookup("MASCOT_TYPE")
            .or_else(|| lookup("VITE_MASCOT_TYPE"))
            .and_then(|v| MascotKind::parse(&v))
            .unwrap_or_default();

        let mut config = Self::for_kind(kind);
        let physics = &mut config.physics;
        physics.gravity = lookup_f64(&lookup, "MASCOT_GRAVITY", physics.gravity).clamp(0.0, 5.0);
        physics.friction = lookup_f64(&lookup, "MASCOT_FRICTION", physics.friction).clamp(0.0, 1.0);
        physics.bounce_factor =
            lookup_f64(&lookup, "MASCOT_BOUNCE", physics.bounce_factor).clamp(0.0, 1.0);
        physics.walk_speed =
            lookup_f64(&lookup, "MASCOT_WALK_SPEED", physics.walk_speed).clamp(0.1, 20.0);

        let auto_walk = &mut config.auto_walk;
        auto_walk.min_delay_ms =
            lookup_u64(&lookup, "MASCOT_AUTO_WALK_MIN_MS", auto_walk.min_delay_ms)
                .clamp(500, 600_000);
        auto_walk.max_delay_ms =
            lookup_u64(&lookup, "MASCOT_AUTO_WALK_MAX_MS", auto_walk.max_delay_ms)
                .clamp(500, 600_000);
        auto_walk.probability =
            lookup_f64(&lookup, "MASCOT_AUTO_WALK_PROBABILITY", auto_walk.probability);

        config.sanitized()
    }

    /// Repair combinations that would make the simulation misbehave.
    pub fn sanitized(mut self) -> Self {
        let physics = &mut self.physics;
        physics.friction = unit_or(physics.friction, 0.9);
        physics.bounce_factor = unit_or(physics.bounce_factor, 0.6);
        if !physics.gravity.is_finite() || physics.gravity < 0.0 {
            physics.gravity = 0.5;
        }
        if !physics.walk_speed.is_finite() || physics.walk_speed <= 0.0 {
            physics.walk_speed = 2.0;
        }
        physics.bounds_refresh_frames = physics.bounds_refresh_frames.max(1);
        physics.frame_interval_ms = physics.frame_interval_ms.max(1);

        let auto_walk = &mut self.auto_walk;
        if auto_walk.min_delay_ms > auto_walk.max_delay_ms {
            std::mem::swap(&mut auto_walk.min_delay_ms, &mut auto_walk.max_delay_ms);
        }
        auto_walk.probability = unit_or(auto_walk.probability, 0.5);

        if !self.drag.threshold.is_finite() || self.drag.threshold < 0.0 {
            self.drag.threshold = DragConfig::default().threshold;
        }
        self
    }
}

fn unit_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        fallback
    }
}

fn lookup_f64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: f64) -> f64 {
    lookup(key)
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

fn lookup_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> u64 {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}
