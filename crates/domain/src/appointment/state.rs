//! Appointment state machine.

use serde::{Deserialize, Serialize};

/// The state of an appointment in its lifecycle.
///
/// ```text
/// Pending ──► Confirmed ──► InProgress ──► Completed
/// Pending | Confirmed ──► Completed | Cancelled | NoShow
/// Pending | Confirmed ──postpone──► Pending
/// ```
///
/// Completion is accepted without an explicit start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentState {
    #[default]
    Pending,
    Confirmed,
    InProgress,
    /// Terminal.
    Completed,
    /// Terminal.
    Cancelled,
    /// Terminal.
    NoShow,
}

/// Inputs to the appointment state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AppointmentTransition {
    Confirm,
    StartTreatment,
    Complete,
    Cancel,
    MarkNoShow,
    /// Returns the appointment to `Pending`, possibly at a new time.
    Postpone,
}

impl AppointmentTransition {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentTransition::Confirm => "confirm",
            AppointmentTransition::StartTreatment => "start treatment",
            AppointmentTransition::Complete => "complete",
            AppointmentTransition::Cancel => "cancel",
            AppointmentTransition::MarkNoShow => "mark no-show",
            AppointmentTransition::Postpone => "postpone",
        }
    }
}

impl AppointmentState {
    /// The state reached by applying `transition`, or `None` if the
    /// transition is not allowed from this state.
    pub fn transition(self, transition: AppointmentTransition) -> Option<AppointmentState> {
        use AppointmentState::*;

        match transition {
            AppointmentTransition::Confirm => match self {
                Pending => Some(Confirmed),
                Confirmed | InProgress | Completed | Cancelled | NoShow => None,
            },
            AppointmentTransition::StartTreatment => match self {
                Pending | Confirmed => Some(InProgress),
                InProgress | Completed | Cancelled | NoShow => None,
            },
            AppointmentTransition::Complete => match self {
                Pending | Confirmed | InProgress => Some(Completed),
                Completed | Cancelled | NoShow => None,
            },
            AppointmentTransition::Cancel => match self {
                Pending | Confirmed => Some(Cancelled),
                InProgress | Completed | Cancelled | NoShow => None,
            },
            AppointmentTransition::MarkNoShow => match self {
                Pending | Confirmed => Some(NoShow),
                InProgress | Completed | Cancelled | NoShow => None,
            },
            AppointmentTransition::Postpone => match self {
                Pending | Confirmed => Some(Pending),
                InProgress | Completed | Cancelled | NoShow => None,
            },
        }
    }

    pub fn can(self, transition: AppointmentTransition) -> bool {
        self.transition(transition).is_some()
    }

    /// Whether the visit is still open for scheduling changes such as
    /// assigning a professional.
    pub fn is_open(&self) -> bool {
        matches!(self, AppointmentState::Pending | AppointmentState::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentState::Completed | AppointmentState::Cancelled | AppointmentState::NoShow
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentState::Pending => "pending",
            AppointmentState::Confirmed => "confirmed",
            AppointmentState::InProgress => "in_progress",
            AppointmentState::Completed => "completed",
            AppointmentState::Cancelled => "cancelled",
            AppointmentState::NoShow => "no_show",
        }
    }
}

impl std::fmt::Display for AppointmentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
