//! Client configuration.
//!
//! Everything has a default, so an empty JSON object is a valid config.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::board::Color;

/// Milliseconds between walked steps.
pub const DEFAULT_STEP_MS: u64 = 300;

/// Milliseconds a walked token rests on its final square before completion.
pub const DEFAULT_HOLD_MS: u64 = 150;

/// Milliseconds between teleport frames.
pub const DEFAULT_TELEPORT_STEP_MS: u64 = 100;

/// Milliseconds a teleported token rests before completion.
pub const DEFAULT_TELEPORT_HOLD_MS: u64 = 200;

/// Frames in a teleport path, split evenly between origin and destination.
pub const DEFAULT_TELEPORT_FRAMES: usize = 10;

/// Milliseconds the die shows its rolling state.
pub const DEFAULT_DICE_ROLL_MS: u64 = 400;

/// Legacy substring marking an arrow move in the server message.
pub const DEFAULT_ARROW_MARKER: &str = "arrow";

/// Animation kind, which selects the cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnimationMode {
    /// Walked square by square
    Normal,
    /// Fade out at the origin, fade in at the destination
    Teleport,
}

impl AnimationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Teleport => "teleport",
        }
    }
}

/// Animation and dice cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnimationTiming {
    pub step_ms: u64,
    pub hold_ms: u64,
    pub teleport_step_ms: u64,
    pub teleport_hold_ms: u64,
    pub teleport_frames: usize,
    pub dice_roll_ms: u64,
}

impl Default for AnimationTiming {
    fn default() -> Self {
        Self {
            step_ms: DEFAULT_STEP_MS,
            hold_ms: DEFAULT_HOLD_MS,
            teleport_step_ms: DEFAULT_TELEPORT_STEP_MS,
            teleport_hold_ms: DEFAULT_TELEPORT_HOLD_MS,
            teleport_frames: DEFAULT_TELEPORT_FRAMES,
            dice_roll_ms: DEFAULT_DICE_ROLL_MS,
        }
    }
}

impl AnimationTiming {
    /// Delay between frames.
    pub fn step(&self, mode: AnimationMode) -> Duration {
        match mode {
            AnimationMode::Normal => Duration::from_millis(self.step_ms),
            AnimationMode::Teleport => Duration::from_millis(self.teleport_step_ms),
        }
    }

    /// Delay after the last frame.
    pub fn hold(&self, mode: AnimationMode) -> Duration {
        match mode {
            AnimationMode::Normal => Duration::from_millis(self.hold_ms),
            AnimationMode::Teleport => Duration::from_millis(self.teleport_hold_ms),
        }
    }

    pub fn dice_roll(&self) -> Duration {
        Duration::from_millis(self.dice_roll_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step_ms == 0 || self.teleport_step_ms == 0 {
            return Err(ConfigError::Invalid("step durations must be non-zero"));
        }
        if self.teleport_frames < 4 {
            return Err(ConfigError::Invalid("teleport needs at least 4 frames"));
        }
        Ok(())
    }
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientConfig {
    /// Color controlled by this client; `None` for spectators
    pub local_color: Option<Color>,

    pub timing: AnimationTiming,

    /// Substring in the server message that marks an arrow move.
    /// `None` disables message sniffing; `moveKind` is always honored.
    pub arrow_marker: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            local_color: None,
            timing: AnimationTiming::default(),
            arrow_marker: Some(DEFAULT_ARROW_MARKER.to_string()),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_color(color: Color) -> Self {
        Self {
            local_color: Some(color),
            ..Self::default()
        }
    }

    pub fn with_timing(mut self, timing: AnimationTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_arrow_marker(mut self, marker: Option<String>) -> Self {
        self.arrow_marker = marker;
        self
    }

    /// Parse and validate a JSON config.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if matches!(&self.arrow_marker, Some(m) if m.trim().is_empty()) {
            return Err(ConfigError::Invalid("arrow marker must not be blank"));
        }
        self.timing.validate()
    }
}

/// Config errors.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "Malformed config: {}", err),
            Self::Invalid(reason) => write!(f, "Invalid config: {}", reason),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}
