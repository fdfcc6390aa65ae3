use serde::{Deserialize, Serialize};

use crate::services::mascot::ControlMode;

/// Failure reported by the windowing host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostError {
    WindowNotFound { label: String },
    Monitor { message: String },
    Position { message: String },
    Unavailable { message: String },
}

impl HostError {
    pub fn window_not_found(label: impl Into<String>) -> Self {
        Self::WindowNotFound {
            label: label.into(),
        }
    }

    pub fn monitor(message: impl Into<String>) -> Self {
        Self::Monitor {
            message: message.into(),
        }
    }

    pub fn position(message: impl Into<String>) -> Self {
        Self::Position {
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// The window went away underneath the call. Not an error for followers.
    pub fn is_window_gone(&self) -> bool {
        matches!(self, Self::WindowNotFound { .. })
    }
}

impl std::fmt::Display for HostError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WindowNotFound { label } => write!(f, "WindowNotFound: {}", label),
            Self::Monitor { message } => write!(f, "Monitor: {}", message),
            Self::Position { message } => write!(f, "Position: {}", message),
            Self::Unavailable { message } => write!(f, "Unavailable: {}", message),
        }
    }
}

impl std::error::Error for HostError {}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum MascotError {
    InvalidTransition { from: ControlMode, action: String },
    NoActiveDrag,
    BoundsUnavailable,
    Host { error: HostError },
}

impl MascotError {
    pub fn invalid_transition(from: ControlMode, action: impl Into<String>) -> Self {
        Self::InvalidTransition {
            from,
            action: action.into(),
        }
    }
}

impl From<HostError> for MascotError {
    fn from(error: HostError) -> Self {
        Self::Host { error }
    }
}

impl std::fmt::Display for MascotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition { from, action } => {
                write!(f, "InvalidTransition: cannot {} while {:?}", action, from)
            }
            Self::NoActiveDrag => write!(f, "NoActiveDrag: no drag in progress"),
            Self::BoundsUnavailable => write!(f, "BoundsUnavailable: screen bounds not resolved yet"),
            Self::Host { error } => write!(f, "Host: {}", error),
        }
    }
}

impl std::error::Error for MascotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Host { error } => Some(error),
            _ => None,
        }
    }
}
