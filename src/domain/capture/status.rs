//! Recorder status state machine

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Lifecycle state of the capture controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderStatus {
    #[default]
    Idle,
    Acquiring,
    Recording,
    Paused,
    Stopped,
    Error,
}

impl RecorderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Acquiring => "acquiring",
            Self::Recording => "recording",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Error => "error",
        }
    }

    /// A session holds device streams or an encoder in these states
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Acquiring | Self::Recording | Self::Paused)
    }
}

impl fmt::Display for RecorderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while {current_state}")]
pub struct InvalidStateTransition {
    pub current_state: RecorderStatus,
    pub action: String,
}

/// Transition table for one controller.
///
/// State machine:
///   IDLE | STOPPED | ERROR -> ACQUIRING (begin_acquiring)
///   ACQUIRING -> RECORDING (acquired)
///   ACQUIRING -> IDLE (cancel_acquiring, user declined a prompt)
///   ACQUIRING | RECORDING | PAUSED -> ERROR (fail)
///   RECORDING -> PAUSED (pause), PAUSED -> RECORDING (resume)
///   RECORDING | PAUSED -> STOPPED (finish)
///   any -> IDLE (reset, on teardown)
#[derive(Debug, Default)]
pub struct RecorderSession {
    status: RecorderStatus,
}

impl RecorderSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> RecorderStatus {
        self.status
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    fn transition(
        &mut self,
        allowed: &[RecorderStatus],
        next: RecorderStatus,
        action: &str,
    ) -> Result<(), InvalidStateTransition> {
        if !allowed.contains(&self.status) {
            return Err(InvalidStateTransition {
                current_state: self.status,
                action: action.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn begin_acquiring(&mut self) -> Result<(), InvalidStateTransition> {
        use RecorderStatus::*;
        self.transition(&[Idle, Stopped, Error], Acquiring, "start a capture")
    }

    pub fn acquired(&mut self) -> Result<(), InvalidStateTransition> {
        use RecorderStatus::*;
        self.transition(&[Acquiring], Recording, "begin recording")
    }

    pub fn cancel_acquiring(&mut self) -> Result<(), InvalidStateTransition> {
        use RecorderStatus::*;
        self.transition(&[Acquiring], Idle, "cancel acquisition")
    }

    pub fn fail(&mut self) -> Result<(), InvalidStateTransition> {
        use RecorderStatus::*;
        self.transition(&[Acquiring, Recording, Paused], Error, "fail")
    }

    pub fn pause(&mut self) -> Result<(), InvalidStateTransition> {
        use RecorderStatus::*;
        self.transition(&[Recording], Paused, "pause")
    }

    pub fn resume(&mut self) -> Result<(), InvalidStateTransition> {
        use RecorderStatus::*;
        self.transition(&[Paused], Recording, "resume")
    }

    pub fn finish(&mut self) -> Result<(), InvalidStateTransition> {
        use RecorderStatus::*;
        self.transition(&[Recording, Paused], Stopped, "stop")
    }

    pub fn reset(&mut self) {
        self.status = RecorderStatus::Idle;
    }
}
