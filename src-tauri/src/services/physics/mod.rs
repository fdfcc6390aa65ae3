//! Fixed-step window physics.
//!
//! `Simulation` is the pure per-frame integrator; `PhysicsEngine` drives it
//! from a frame loop and pushes the result to the OS window.

mod engine;
mod simulation;

use serde::{Deserialize, Serialize};

use crate::windows::geometry::LogicalPoint;

pub(crate) use engine::PhysicsEngine;
pub use simulation::{ReachCallback, Simulation, StepOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicsState {
    pub x: f64,
    pub y: f64,
    pub velocity_x: f64,
    pub velocity_y: f64,
}

impl PhysicsState {
    pub fn position(&self) -> LogicalPoint {
        LogicalPoint::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    #[default]
    Right,
}

impl Direction {
    pub fn sign(self) -> f64 {
        match self {
            Direction::Left => -1.0,
            Direction::Right => 1.0,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Direction from `from` toward `to`; ties face right.
    pub fn toward(from: f64, to: f64) -> Self {
        if to < from {
            Direction::Left
        } else {
            Direction::Right
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Left,
    Right,
}

impl Edge {
    /// Direction that walks away from this edge.
    pub fn away(self) -> Direction {
        match self {
            Edge::Left => Direction::Right,
            Edge::Right => Direction::Left,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhysicsEvent {
    /// First frame of a floor contact that settled.
    Landed,
    /// First frame off the ground.
    Airborne,
    /// Floor contact that reflected with the given incoming speed.
    Bounced { speed: f64 },
    EdgeHit(Edge),
    GoalReached,
    Moved(LogicalPoint),
}
