use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Two-step guard in front of the wholesale clear: the first request arms it,
/// a second request inside the window executes. `Idle → Armed → Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearConfirmation {
    #[default]
    Idle,
    Armed {
        armed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ClearStep {
    Armed { expires_at: DateTime<Utc> },
    Confirmed,
}

impl ClearConfirmation {
    /// Advances the state machine. An expired arm counts as a fresh first request.
    pub fn request(&mut self, now: DateTime<Utc>, window: Duration) -> ClearStep {
        match *self {
            Self::Armed { armed_at } if now - armed_at <= window => {
                *self = Self::Idle;
                ClearStep::Confirmed
            }
            _ => {
                *self = Self::Armed { armed_at: now };
                ClearStep::Armed {
                    expires_at: now + window,
                }
            }
        }
    }

    pub fn disarm(&mut self) {
        *self = Self::Idle;
    }

    pub fn is_armed(&self) -> bool {
        matches!(self, Self::Armed { .. })
    }
}
