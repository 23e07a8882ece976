//! Game simulation modules

pub mod combat;
pub mod math;
pub mod physics;
pub mod pickup;
pub mod reconcile;
pub mod yaw;

pub use combat::{FireDenied, FireGate, RocketPool, RocketSlot};
pub use physics::{Body, GroundPlane, MovementResolver, Vehicle};
pub use pickup::{Pickup, PickupId, PickupKind, PickupState};
pub use reconcile::{Correction, LatencyTracker, MovementSample, RemoteBody};

use serde::{Deserialize, Serialize};

/// Authority-assigned id of a controlled vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity#{}", self.0)
    }
}

/// Input events delivered by the input layer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    /// Analog throttle in `[-1, 1]`
    Throttle(f32),
    /// Analog steering in `[-1, 1]`
    Steer(f32),
    BrakePressed,
    BrakeReleased,
    FirePressed,
    DebugMenuToggled,
}

impl InputEvent {
    /// Clamp analog values into range; non-finite values read as zero
    pub fn sanitized(self) -> Self {
        fn axis(v: f32) -> f32 {
            if v.is_finite() {
                v.clamp(-1.0, 1.0)
            } else {
                0.0
            }
        }
        match self {
            InputEvent::Throttle(v) => InputEvent::Throttle(axis(v)),
            InputEvent::Steer(v) => InputEvent::Steer(axis(v)),
            other => other,
        }
    }
}

/// Simulation invariant violations; the affected entity skips its tick
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error("invalid frame delta {0}")]
    InvalidDelta(f32),

    #[error("invalid movement tuning: {0}")]
    InvalidTuning(&'static str),
}
