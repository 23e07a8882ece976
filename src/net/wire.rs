//! Byte-level wire codec.
//!
//! Every message is one frame: a tag byte followed by the fields in the
//! order listed below, little-endian, no padding. Positions are three
//! `f32`; facings are three `f32` degrees (pitch, yaw, roll); the
//! movement channel carries its heading as a single quantized byte.
//!
//! | tag | message         | fields                                              |
//! |-----|-----------------|-----------------------------------------------------|
//! | 1   | MovementUpdate  | entity u32, position, timestamp f32, throttle f32, yaw u8 |
//! | 2   | FireRequest     | rocket, start position, facing                      |
//! | 3   | FireApproved    | rocket, start position, facing                      |
//! | 4   | FireRejected    | rocket                                              |
//! | 5   | ClaimRequest    | pickup u16                                          |
//! | 6   | ClaimResolved   | pickup u16, entity u32, kind u8, value i32          |
//! | 7   | ClaimDenied     | pickup u16                                          |
//! | 8   | HitConfirmed    | target u32, health i32, has_rocket u8, [rocket]     |
//! | 16  | Welcome         | entity u32, position, yaw f32, ammo i32, health i32 |
//! | 17  | EntitySpawned   | entity u32, position, yaw f32                       |
//! | 18  | EntityLeft      | entity u32                                          |
//! | 19  | Ping            | t f64                                               |
//! | 20  | Pong            | t f64                                               |
//! | 21  | StateResync     | entity u32, ammo i32, health i32, in_flight u8      |
//!
//! A rocket reference is the owning entity (u32) followed by the slot (u8).

use bytes::{Buf, BufMut, Bytes, BytesMut};
use glam::Vec3;

use crate::game::math::Rotator;
use crate::game::{EntityId, MovementSample, PickupId, PickupKind};

use super::protocol::{Message, RocketRef};

const TAG_MOVEMENT_UPDATE: u8 = 1;
const TAG_FIRE_REQUEST: u8 = 2;
const TAG_FIRE_APPROVED: u8 = 3;
const TAG_FIRE_REJECTED: u8 = 4;
const TAG_CLAIM_REQUEST: u8 = 5;
const TAG_CLAIM_RESOLVED: u8 = 6;
const TAG_CLAIM_DENIED: u8 = 7;
const TAG_HIT_CONFIRMED: u8 = 8;
const TAG_WELCOME: u8 = 16;
const TAG_ENTITY_SPAWNED: u8 = 17;
const TAG_ENTITY_LEFT: u8 = 18;
const TAG_PING: u8 = 19;
const TAG_PONG: u8 = 20;
const TAG_STATE_RESYNC: u8 = 21;

/// Size of an encoded `MovementUpdate` frame
pub const MOVEMENT_UPDATE_LEN: usize = 1 + 4 + 12 + 4 + 4 + 1;

/// Wire decoding errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WireError {
    #[error("empty frame")]
    Empty,

    #[error("unknown message tag {0}")]
    UnknownTag(u8),

    #[error("frame truncated: needed {needed} more bytes for {message}")]
    Truncated { message: &'static str, needed: usize },

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    #[error("invalid pickup kind {0}")]
    InvalidPickupKind(u8),

    #[error("invalid flag byte {0}")]
    InvalidFlag(u8),
}

/// Encode one message into a standalone frame
pub fn encode(msg: &Message) -> Bytes {
    let mut buf = BytesMut::with_capacity(48);
    match msg {
        Message::MovementUpdate { entity, sample } => {
            buf.put_u8(TAG_MOVEMENT_UPDATE);
            buf.put_u32_le(entity.0);
            put_vec3(&mut buf, sample.position);
            buf.put_f32_le(sample.timestamp);
            buf.put_f32_le(sample.throttle);
            buf.put_u8(sample.yaw);
        }
        Message::FireRequest {
            rocket,
            start,
            facing,
        } => {
            buf.put_u8(TAG_FIRE_REQUEST);
            put_rocket(&mut buf, *rocket);
            put_vec3(&mut buf, *start);
            put_rotator(&mut buf, *facing);
        }
        Message::FireApproved {
            rocket,
            start,
            facing,
        } => {
            buf.put_u8(TAG_FIRE_APPROVED);
            put_rocket(&mut buf, *rocket);
            put_vec3(&mut buf, *start);
            put_rotator(&mut buf, *facing);
        }
        Message::FireRejected { rocket } => {
            buf.put_u8(TAG_FIRE_REJECTED);
            put_rocket(&mut buf, *rocket);
        }
        Message::ClaimRequest { pickup } => {
            buf.put_u8(TAG_CLAIM_REQUEST);
            buf.put_u16_le(pickup.0);
        }
        Message::ClaimResolved {
            pickup,
            entity,
            kind,
            value,
        } => {
            buf.put_u8(TAG_CLAIM_RESOLVED);
            buf.put_u16_le(pickup.0);
            buf.put_u32_le(entity.0);
            buf.put_u8(kind.to_byte());
            buf.put_i32_le(*value);
        }
        Message::ClaimDenied { pickup } => {
            buf.put_u8(TAG_CLAIM_DENIED);
            buf.put_u16_le(pickup.0);
        }
        Message::HitConfirmed {
            target,
            health,
            rocket,
        } => {
            buf.put_u8(TAG_HIT_CONFIRMED);
            buf.put_u32_le(target.0);
            buf.put_i32_le(*health);
            match rocket {
                Some(rocket) => {
                    buf.put_u8(1);
                    put_rocket(&mut buf, *rocket);
                }
                None => buf.put_u8(0),
            }
        }
        Message::Welcome {
            entity,
            position,
            yaw,
            ammo,
            health,
        } => {
            buf.put_u8(TAG_WELCOME);
            buf.put_u32_le(entity.0);
            put_vec3(&mut buf, *position);
            buf.put_f32_le(*yaw);
            buf.put_i32_le(*ammo);
            buf.put_i32_le(*health);
        }
        Message::EntitySpawned {
            entity,
            position,
            yaw,
        } => {
            buf.put_u8(TAG_ENTITY_SPAWNED);
            buf.put_u32_le(entity.0);
            put_vec3(&mut buf, *position);
            buf.put_f32_le(*yaw);
        }
        Message::EntityLeft { entity } => {
            buf.put_u8(TAG_ENTITY_LEFT);
            buf.put_u32_le(entity.0);
        }
        Message::Ping { t } => {
            buf.put_u8(TAG_PING);
            buf.put_f64_le(*t);
        }
        Message::Pong { t } => {
            buf.put_u8(TAG_PONG);
            buf.put_f64_le(*t);
        }
        Message::StateResync {
            entity,
            ammo,
            health,
            in_flight,
        } => {
            buf.put_u8(TAG_STATE_RESYNC);
            buf.put_u32_le(entity.0);
            buf.put_i32_le(*ammo);
            buf.put_i32_le(*health);
            buf.put_u8(*in_flight);
        }
    }
    buf.freeze()
}

/// Decode exactly one message from a frame
pub fn decode(frame: &[u8]) -> Result<Message, WireError> {
    let mut buf = frame;
    if !buf.has_remaining() {
        return Err(WireError::Empty);
    }

    let msg = match buf.get_u8() {
        TAG_MOVEMENT_UPDATE => {
            need(&buf, "movement_update", MOVEMENT_UPDATE_LEN - 1)?;
            let entity = EntityId(buf.get_u32_le());
            let position = get_vec3(&mut buf);
            let timestamp = buf.get_f32_le();
            let throttle = buf.get_f32_le();
            let yaw = buf.get_u8();
            Message::MovementUpdate {
                entity,
                sample: MovementSample {
                    position,
                    timestamp,
                    throttle,
                    yaw,
                },
            }
        }
        TAG_FIRE_REQUEST => {
            need(&buf, "fire_request", ROCKET_LEN + 24)?;
            Message::FireRequest {
                rocket: get_rocket(&mut buf),
                start: get_vec3(&mut buf),
                facing: get_rotator(&mut buf),
            }
        }
        TAG_FIRE_APPROVED => {
            need(&buf, "fire_approved", ROCKET_LEN + 24)?;
            Message::FireApproved {
                rocket: get_rocket(&mut buf),
                start: get_vec3(&mut buf),
                facing: get_rotator(&mut buf),
            }
        }
        TAG_FIRE_REJECTED => {
            need(&buf, "fire_rejected", ROCKET_LEN)?;
            Message::FireRejected {
                rocket: get_rocket(&mut buf),
            }
        }
        TAG_CLAIM_REQUEST => {
            need(&buf, "claim_request", 2)?;
            Message::ClaimRequest {
                pickup: PickupId(buf.get_u16_le()),
            }
        }
        TAG_CLAIM_RESOLVED => {
            need(&buf, "claim_resolved", 2 + 4 + 1 + 4)?;
            let pickup = PickupId(buf.get_u16_le());
            let entity = EntityId(buf.get_u32_le());
            let kind_byte = buf.get_u8();
            let kind =
                PickupKind::from_byte(kind_byte).ok_or(WireError::InvalidPickupKind(kind_byte))?;
            Message::ClaimResolved {
                pickup,
                entity,
                kind,
                value: buf.get_i32_le(),
            }
        }
        TAG_CLAIM_DENIED => {
            need(&buf, "claim_denied", 2)?;
            Message::ClaimDenied {
                pickup: PickupId(buf.get_u16_le()),
            }
        }
        TAG_HIT_CONFIRMED => {
            need(&buf, "hit_confirmed", 4 + 4 + 1)?;
            let target = EntityId(buf.get_u32_le());
            let health = buf.get_i32_le();
            let rocket = match buf.get_u8() {
                0 => None,
                1 => {
                    need(&buf, "hit_confirmed", ROCKET_LEN)?;
                    Some(get_rocket(&mut buf))
                }
                other => return Err(WireError::InvalidFlag(other)),
            };
            Message::HitConfirmed {
                target,
                health,
                rocket,
            }
        }
        TAG_WELCOME => {
            need(&buf, "welcome", 4 + 12 + 4 + 4 + 4)?;
            Message::Welcome {
                entity: EntityId(buf.get_u32_le()),
                position: get_vec3(&mut buf),
                yaw: buf.get_f32_le(),
                ammo: buf.get_i32_le(),
                health: buf.get_i32_le(),
            }
        }
        TAG_ENTITY_SPAWNED => {
            need(&buf, "entity_spawned", 4 + 12 + 4)?;
            Message::EntitySpawned {
                entity: EntityId(buf.get_u32_le()),
                position: get_vec3(&mut buf),
                yaw: buf.get_f32_le(),
            }
        }
        TAG_ENTITY_LEFT => {
            need(&buf, "entity_left", 4)?;
            Message::EntityLeft {
                entity: EntityId(buf.get_u32_le()),
            }
        }
        TAG_PING => {
            need(&buf, "ping", 8)?;
            Message::Ping {
                t: buf.get_f64_le(),
            }
        }
        TAG_PONG => {
            need(&buf, "pong", 8)?;
            Message::Pong {
                t: buf.get_f64_le(),
            }
        }
        TAG_STATE_RESYNC => {
            need(&buf, "state_resync", 4 + 4 + 4 + 1)?;
            Message::StateResync {
                entity: EntityId(buf.get_u32_le()),
                ammo: buf.get_i32_le(),
                health: buf.get_i32_le(),
                in_flight: buf.get_u8(),
            }
        }
        other => return Err(WireError::UnknownTag(other)),
    };

    if buf.has_remaining() {
        return Err(WireError::TrailingBytes(buf.remaining()));
    }
    Ok(msg)
}

const ROCKET_LEN: usize = 4 + 1;

fn need(buf: &&[u8], message: &'static str, len: usize) -> Result<(), WireError> {
    if buf.remaining() < len {
        return Err(WireError::Truncated {
            message,
            needed: len - buf.remaining(),
        });
    }
    Ok(())
}

fn put_vec3(buf: &mut BytesMut, v: Vec3) {
    buf.put_f32_le(v.x);
    buf.put_f32_le(v.y);
    buf.put_f32_le(v.z);
}

fn get_vec3(buf: &mut &[u8]) -> Vec3 {
    let x = buf.get_f32_le();
    let y = buf.get_f32_le();
    let z = buf.get_f32_le();
    Vec3::new(x, y, z)
}

fn put_rotator(buf: &mut BytesMut, r: Rotator) {
    buf.put_f32_le(r.pitch);
    buf.put_f32_le(r.yaw);
    buf.put_f32_le(r.roll);
}

fn get_rotator(buf: &mut &[u8]) -> Rotator {
    let pitch = buf.get_f32_le();
    let yaw = buf.get_f32_le();
    let roll = buf.get_f32_le();
    Rotator::new(pitch, yaw, roll)
}

fn put_rocket(buf: &mut BytesMut, rocket: RocketRef) {
    buf.put_u32_le(rocket.owner.0);
    buf.put_u8(rocket.slot);
}

fn get_rocket(buf: &mut &[u8]) -> RocketRef {
    let owner = EntityId(buf.get_u32_le());
    let slot = buf.get_u8();
    RocketRef { owner, slot }
}
