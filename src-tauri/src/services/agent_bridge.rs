use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::animation::Emotion;
use super::mascot::MascotController;
use super::physics::Direction;
use crate::error::MascotError;
use crate::windows::bounds::ScreenBounds;
use crate::windows::host::WindowHost;

pub const EVT_AGENT_EMOTION: &str = "agent-emotion";
pub const EVT_WALK_TO_WINDOW: &str = "walk-to-window";
pub const EVT_AGENT_MOVE: &str = "clawd-move";

/// Distance kept from the screen edge for `left`/`right` moves.
const MOVE_EDGE_MARGIN: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionRequest {
    pub emotion: String,
    #[serde(default, alias = "durationMs")]
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkToWindowRequest {
    #[serde(alias = "targetX")]
    pub target_x: f64,
    #[serde(default, alias = "windowTitle")]
    pub window_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRequest {
    pub target: MoveTarget,
    #[serde(default)]
    pub x: Option<f64>,
}

/// A request from the chat agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentCommand {
    Emotion(EmotionRequest),
    WalkToWindow(WalkToWindowRequest),
    Move(MoveRequest),
}

impl AgentCommand {
    /// Parse the payload of a host event. Tool-call payloads carry no `type`
    /// field, so the event name decides the shape.
    pub fn from_event(event: &str, payload: &str) -> Result<Self, serde_json::Error> {
        match event {
            EVT_AGENT_EMOTION => serde_json::from_str(payload).map(Self::Emotion),
            EVT_WALK_TO_WINDOW => serde_json::from_str(payload).map(Self::WalkToWindow),
            EVT_AGENT_MOVE => serde_json::from_str(payload).map(Self::Move),
            _ => serde_json::from_str(payload),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMoveTarget", into = "RawMoveTarget")]
pub enum MoveTarget {
    Left,
    Right,
    Center,
    /// Use the request's `x`.
    Coordinates,
    At(f64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawMoveTarget {
    Number(f64),
    Name(String),
}

impl TryFrom<RawMoveTarget> for MoveTarget {
    type Error = String;

    fn try_from(raw: RawMoveTarget) -> Result<Self, Self::Error> {
        let name = match raw {
            RawMoveTarget::Number(x) if x.is_finite() => return Ok(Self::At(x)),
            RawMoveTarget::Number(x) => return Err(format!("invalid move target: {x}")),
            RawMoveTarget::Name(name) => name,
        };
        match name.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            "center" | "centre" => Ok(Self::Center),
            "coordinates" => Ok(Self::Coordinates),
            other => other
                .parse::<f64>()
                .ok()
                .filter(|x| x.is_finite())
                .map(Self::At)
                .ok_or_else(|| format!("unknown move target: {name}")),
        }
    }
}

impl From<MoveTarget> for RawMoveTarget {
    fn from(target: MoveTarget) -> Self {
        match target {
            MoveTarget::Left => Self::Name("left".into()),
            MoveTarget::Right => Self::Name("right".into()),
            MoveTarget::Center => Self::Name("center".into()),
            MoveTarget::Coordinates => Self::Name("coordinates".into()),
            MoveTarget::At(x) => Self::Number(x),
        }
    }
}

impl MoveTarget {
    /// The x the mascot should walk to, or `None` for `Coordinates` without
    /// an `x`.
    pub fn resolve(self, bounds: &ScreenBounds, window_width: f64, x: Option<f64>) -> Option<f64> {
        let max_x = bounds.max_x(window_width);
        let resolved = match self {
            Self::Left => bounds.left + MOVE_EDGE_MARGIN,
            Self::Right => max_x - MOVE_EDGE_MARGIN,
            Self::Center => bounds.left + (bounds.width - window_width) / 2.0,
            Self::Coordinates => x.filter(|x| x.is_finite())?,
            Self::At(x) => x,
        };
        Some(resolved.clamp(bounds.left, max_x))
    }
}

/// Apply an agent request to the mascot.
pub fn dispatch_agent_command<H: WindowHost>(
    controller: &MascotController<H>,
    command: AgentCommand,
) -> Result<(), MascotError> {
    match command {
        AgentCommand::Emotion(request) => {
            let emotion = Emotion::parse(&request.emotion).unwrap_or_else(|| {
                log::warn!("agent: unknown emotion '{}', using neutral", request.emotion);
                Emotion::Neutral
            });
            controller.set_emotion(emotion, request.duration_ms.map(Duration::from_millis));
            Ok(())
        }
        AgentCommand::WalkToWindow(request) => {
            log::info!(
                "agent: walking to window {:?} at x={:.1}",
                request.window_title.as_deref().unwrap_or("?"),
                request.target_x
            );
            controller.walk_to_x(request.target_x, None).map(|_| ())
        }
        AgentCommand::Move(request) => {
            let bounds = controller
                .latest_bounds()
                .ok_or(MascotError::BoundsUnavailable)?;
            let width = controller.config().physics.window_width;
            let Some(target_x) = request.target.resolve(&bounds, width, request.x) else {
                log::warn!("agent: move to coordinates without x, ignoring");
                return Ok(());
            };
            let direction: Direction = controller.walk_to_x(target_x, None)?;
            log::debug!("agent: moving {direction:?} to x={target_x:.1}");
            Ok(())
        }
    }
}
