//! ServoState transitions.
//!
//! Per-axis mode: Coasting → RunTime/RunAngle/TrackTarget → back, with
//! Errored on hardware faults.
//!
//! Every command is accepted from every state (a new command always wins
//! immediately). Completion is only meaningful while a run command is
//! active, and a fault is only recorded once.

use serde::Serialize;

/// Mode of one servo axis. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ServoState {
    /// Motor released.
    #[default]
    Coasting,
    /// Windings shorted.
    Braking,
    /// Open-loop voltage set by the user.
    UserVoltage,
    /// Time-based command (`run`, `run_time`, `run_until_stalled`).
    RunTime { foreground: bool },
    /// Angle-based command (`run_target`, `run_angle`).
    RunAngle { foreground: bool },
    /// Holding or tracking a position.
    TrackTarget,
    /// Hardware fault; motor coasted.
    Errored,
}

impl ServoState {
    /// Whether the controller drives the motor in this state.
    #[inline]
    pub const fn is_controlling(&self) -> bool {
        matches!(self, Self::RunTime { .. } | Self::RunAngle { .. } | Self::TrackTarget)
    }

    /// Whether a caller is waiting on the running command.
    #[inline]
    pub const fn is_foreground(&self) -> bool {
        matches!(
            self,
            Self::RunTime { foreground: true } | Self::RunAngle { foreground: true }
        )
    }
}

/// Events that drive the ServoState machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServoEvent {
    /// Explicit coast.
    Coast,
    /// Explicit brake.
    Brake,
    /// Open-loop voltage command.
    UserVoltage,
    /// Time-based command installed.
    StartTime { foreground: bool },
    /// Angle-based command installed.
    StartAngle { foreground: bool },
    /// Track command installed.
    StartTrack,
    /// Run command finished and released the motor.
    CompletedCoast,
    /// Run command finished and shorted the motor.
    CompletedBrake,
    /// Run command finished and holds position.
    CompletedHold,
    /// Encoder or driver failure.
    Fault,
}

/// Result of a ServoState transition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServoTransition {
    /// State changed.
    Ok(ServoState),
    /// Transition rejected.
    Rejected(&'static str),
}

/// Per-axis servo state machine.
#[derive(Debug, Clone, Default)]
pub struct ServoStateMachine {
    state: ServoState,
}

impl ServoStateMachine {
    pub const fn new() -> Self {
        Self {
            state: ServoState::Coasting,
        }
    }

    #[inline]
    pub const fn state(&self) -> ServoState {
        self.state
    }

    /// Handle a servo event.
    pub fn handle_event(&mut self, event: ServoEvent) -> ServoTransition {
        use ServoEvent as E;
        use ServoState as S;

        let next = match (self.state, event) {
            // Explicit commands win from anywhere, including Errored.
            (_, E::Coast) => S::Coasting,
            (_, E::Brake) => S::Braking,
            (_, E::UserVoltage) => S::UserVoltage,
            (_, E::StartTime { foreground }) => S::RunTime { foreground },
            (_, E::StartAngle { foreground }) => S::RunAngle { foreground },
            (_, E::StartTrack) => S::TrackTarget,

            // Completion of a run command applies its after-stop action.
            (S::RunTime { .. } | S::RunAngle { .. }, E::CompletedCoast) => S::Coasting,
            (S::RunTime { .. } | S::RunAngle { .. }, E::CompletedBrake) => S::Braking,
            (S::RunTime { .. } | S::RunAngle { .. }, E::CompletedHold) => S::TrackTarget,

            // Any → Errored
            (_, E::Fault) if self.state != S::Errored => S::Errored,

            (S::Errored, E::Fault) => return ServoTransition::Rejected("already errored"),
            _ => return ServoTransition::Rejected("no run command to complete"),
        };

        self.state = next;
        ServoTransition::Ok(next)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
