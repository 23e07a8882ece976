//! Protocol message definitions
//! These are the messages exchanged between the authority and its clients

use glam::Vec3;

use crate::game::math::Rotator;
use crate::game::{EntityId, MovementSample, PickupId, PickupKind};

/// Delivery class of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Guaranteed delivery, in order per link
    Reliable,
    /// Best effort; may be dropped or reordered
    Unreliable,
}

/// A rocket in some entity's pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RocketRef {
    pub owner: EntityId,
    pub slot: u8,
}

impl std::fmt::Display for RocketRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/rocket#{}", self.owner, self.slot)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Controller → authority → observers, every tick
    MovementUpdate {
        entity: EntityId,
        sample: MovementSample,
    },

    /// Remote controller asks to launch a rocket it already predicted
    FireRequest {
        rocket: RocketRef,
        start: Vec3,
        facing: Rotator,
    },

    /// Authority approved a launch; facing is the corrected one
    FireApproved {
        rocket: RocketRef,
        start: Vec3,
        facing: Rotator,
    },

    /// Authority refused a launch; sent only to the requester
    FireRejected { rocket: RocketRef },

    /// Controller touched a pickup
    ClaimRequest { pickup: PickupId },

    /// Authority resolved a claim; `value` is the absolute new counter
    ClaimResolved {
        pickup: PickupId,
        entity: EntityId,
        kind: PickupKind,
        value: i32,
    },

    /// The pickup was already claimed when the request arrived
    ClaimDenied { pickup: PickupId },

    /// Authority confirmed a hit; `health` is the absolute new value
    HitConfirmed {
        target: EntityId,
        health: i32,
        rocket: Option<RocketRef>,
    },

    /// First message on a new connection
    Welcome {
        entity: EntityId,
        position: Vec3,
        yaw: f32,
        ammo: i32,
        health: i32,
    },

    EntitySpawned {
        entity: EntityId,
        position: Vec3,
        yaw: f32,
    },

    EntityLeft { entity: EntityId },

    /// Latency probe carrying the sender's session time
    Ping { t: f64 },

    /// Echo of a probe
    Pong { t: f64 },

    /// Periodic authoritative counters for a controller
    StateResync {
        entity: EntityId,
        ammo: i32,
        health: i32,
        /// Bit `i` set when rocket slot `i` is in flight
        in_flight: u8,
    },
}

impl Message {
    /// Which channel the message travels on
    pub fn channel(&self) -> Channel {
        match self {
            Message::MovementUpdate { .. } | Message::Ping { .. } | Message::Pong { .. } => {
                Channel::Unreliable
            }
            _ => Channel::Reliable,
        }
    }

    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Message::MovementUpdate { .. } => "movement_update",
            Message::FireRequest { .. } => "fire_request",
            Message::FireApproved { .. } => "fire_approved",
            Message::FireRejected { .. } => "fire_rejected",
            Message::ClaimRequest { .. } => "claim_request",
            Message::ClaimResolved { .. } => "claim_resolved",
            Message::ClaimDenied { .. } => "claim_denied",
            Message::HitConfirmed { .. } => "hit_confirmed",
            Message::Welcome { .. } => "welcome",
            Message::EntitySpawned { .. } => "entity_spawned",
            Message::EntityLeft { .. } => "entity_left",
            Message::Ping { .. } => "ping",
            Message::Pong { .. } => "pong",
            Message::StateResync { .. } => "state_resync",
        }
    }
}
