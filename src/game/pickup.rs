//! Re-arming world pickups

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::PickupSpawn;

use super::math::pulsating_value;

/// Bob height in world units
pub const BOB_HEIGHT: f32 = 30.0;
/// Bob cycles per second
pub const BOB_PULSES_PER_SECOND: f32 = 0.65;
/// Spin rate in degrees per second
pub const SPIN_DEGREES_PER_SECOND: f32 = 20.0;

/// Index of a pickup in the level layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PickupId(pub u16);

impl std::fmt::Display for PickupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pickup#{}", self.0)
    }
}

/// Which counter a pickup feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PickupKind {
    Ammo,
    Health,
}

impl PickupKind {
    pub fn to_byte(self) -> u8 {
        match self {
            PickupKind::Ammo => 0,
            PickupKind::Health => 1,
        }
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(PickupKind::Ammo),
            1 => Some(PickupKind::Health),
            _ => None,
        }
    }
}

/// Claim state of one pickup
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PickupState {
    Available,
    /// Hidden locally while a claim request is outstanding (clients only)
    Predicted,
    /// Claimed by someone; becomes available when the timer runs out
    Claimed { rearm_in: f32 },
}

#[derive(Debug, Clone)]
pub struct Pickup {
    pub id: PickupId,
    pub kind: PickupKind,
    pub quantity: i32,
    pub position: Vec3,
    pub rearm_time: f32,
    state: PickupState,
}

impl Pickup {
    pub fn from_spawn(id: PickupId, spawn: &PickupSpawn) -> Self {
        Self {
            id,
            kind: spawn.kind,
            quantity: spawn.quantity,
            position: spawn.position,
            rearm_time: spawn.rearm_time,
            state: PickupState::Available,
        }
    }

    /// Build the whole level layout
    pub fn layout(spawns: &[PickupSpawn]) -> Vec<Self> {
        spawns
            .iter()
            .enumerate()
            .map(|(i, spawn)| Self::from_spawn(PickupId(i as u16), spawn))
            .collect()
    }

    pub fn state(&self) -> PickupState {
        self.state
    }

    pub fn is_available(&self) -> bool {
        self.state == PickupState::Available
    }

    pub fn is_claimed(&self) -> bool {
        matches!(self.state, PickupState::Claimed { .. })
    }

    /// Drawn and touchable
    pub fn is_visible(&self) -> bool {
        self.is_available()
    }

    pub fn in_contact(&self, position: Vec3, radius: f32) -> bool {
        self.position.distance_squared(position) <= radius * radius
    }

    /// Authority claim transition; false when already claimed
    pub fn try_claim(&mut self) -> bool {
        if self.is_claimed() {
            return false;
        }
        self.mark_claimed();
        true
    }

    /// Enter `Claimed` and (re)start the re-arm timer
    pub fn mark_claimed(&mut self) {
        self.state = PickupState::Claimed {
            rearm_in: self.rearm_time,
        };
    }

    /// Client-side optimistic hide
    pub fn mark_predicted(&mut self) {
        if self.is_available() {
            self.state = PickupState::Predicted;
        }
    }

    /// Undo an optimistic hide; an authoritative claim stays in force
    pub fn unpredict(&mut self) {
        if self.state == PickupState::Predicted {
            self.state = PickupState::Available;
        }
    }

    /// Advance the re-arm timer. Returns true on the tick it re-arms.
    pub fn tick(&mut self, dt: f32) -> bool {
        if let PickupState::Claimed { rearm_in } = &mut self.state {
            *rearm_in -= dt;
            if *rearm_in <= 0.0 {
                self.state = PickupState::Available;
                return true;
            }
        }
        false
    }

    /// Seconds until re-arm, for the presentation layer
    pub fn rearm_countdown(&self) -> Option<f32> {
        match self.state {
            PickupState::Claimed { rearm_in } => Some(rearm_in.max(0.0)),
            _ => None,
        }
    }

    /// Vertical mesh offset at `world_time`
    pub fn bob_offset(world_time: f32) -> f32 {
        pulsating_value(world_time, BOB_PULSES_PER_SECOND) * BOB_HEIGHT
    }

    /// Mesh spin for a frame of length `dt`
    pub fn spin_degrees(dt: f32) -> f32 {
        SPIN_DEGREES_PER_SECOND * dt
    }
}
