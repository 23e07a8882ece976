//! Gameplay tuning, optionally loaded from a TOML file

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::game::pickup::PickupKind;

/// All gameplay tuning shared by the authority and its clients
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GameSettings {
    pub movement: MovementSettings,
    pub weapon: WeaponSettings,
    pub player: PlayerSettings,
    pub net: NetSettings,
    /// Level placement of pickups; a pickup's id is its index here
    pub pickups: Vec<PickupSpawn>,
}

/// Vehicle handling
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementSettings {
    /// Top forward/reverse speed (units per second)
    pub max_velocity: f32,
    /// Speed gained per second at full throttle
    pub acceleration: f32,
    /// Per-second speed retention while coasting
    pub default_friction: f32,
    /// Per-second speed retention while braking
    pub braking_friction: f32,
    /// Turn rate in degrees per second reached at high speed
    pub turn_speed_default: f32,
    /// Downward acceleration handed to the movement resolver
    pub gravity: f32,
}

impl Default for MovementSettings {
    fn default() -> Self {
        Self {
            max_velocity: 2000.0,
            acceleration: 1200.0,
            default_friction: 0.75,
            braking_friction: 0.001,
            turn_speed_default: 110.0,
            gravity: 980.0,
        }
    }
}

/// Rocket pool and fire gate
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct WeaponSettings {
    /// Rockets created per entity at spawn
    pub pool_size: usize,
    /// In-flight cap; 0 disables the cap
    pub max_active_rockets: usize,
    /// Seconds between accepted fire attempts
    pub fire_cooldown: f32,
    pub unlimited_rockets: bool,
    /// Distance in front of the vehicle where rockets start
    pub muzzle_offset: f32,
    pub rocket_speed: f32,
    /// Seconds a rocket flies before returning to the pool
    pub rocket_lifetime: f32,
    pub hit_radius: f32,
    pub damage: i32,
}

impl Default for WeaponSettings {
    fn default() -> Self {
        Self {
            pool_size: 8,
            max_active_rockets: 3,
            fire_cooldown: 0.5,
            unlimited_rockets: false,
            muzzle_offset: 100.0,
            rocket_speed: 3000.0,
            rocket_lifetime: 2.0,
            hit_radius: 80.0,
            damage: 10,
        }
    }
}

/// Per-entity counters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    pub starting_ammo: i32,
    pub starting_health: i32,
    pub max_health: i32,
    /// Radius used for pickup contact
    pub contact_radius: f32,
    /// Spawn points are scattered within this distance of the origin
    pub spawn_radius: f32,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            starting_ammo: 0,
            starting_health: 100,
            max_health: 100,
            contact_radius: 60.0,
            spawn_radius: 1500.0,
        }
    }
}

/// Reconciliation and relay tuning
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct NetSettings {
    /// Positional error above which an observer corrects
    pub correction_threshold: f32,
    /// Largest catch-up a single movement packet may apply (seconds)
    pub max_catch_up: f32,
    /// Hold corrections in a decaying visual offset instead of snapping
    pub network_smoothing: bool,
    /// Floor for the smoothing time constant (seconds)
    pub min_smoothing_time: f32,
    /// Seconds between latency probes
    pub ping_interval: f32,
    /// Seconds between authoritative counter resyncs; 0 disables them
    pub resync_interval: f32,
    /// Withhold implausible movement candidates instead of relaying them
    pub validate_relay: bool,
    /// Multiplier on `max_velocity × elapsed` when validating
    pub relay_speed_tolerance: f32,
    /// Extra distance always allowed when validating
    pub relay_slack: f32,
}

impl Default for NetSettings {
    fn default() -> Self {
        Self {
            correction_threshold: 40.0,
            max_catch_up: 0.125,
            network_smoothing: true,
            min_smoothing_time: 0.05,
            ping_interval: 1.0,
            resync_interval: 2.0,
            validate_relay: true,
            relay_speed_tolerance: 1.5,
            relay_slack: 200.0,
        }
    }
}

/// One pickup placed in the level
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PickupSpawn {
    pub kind: PickupKind,
    pub quantity: i32,
    pub position: Vec3,
    /// Seconds before a claimed pickup becomes available again
    #[serde(default = "default_rearm_time")]
    pub rearm_time: f32,
}

fn default_rearm_time() -> f32 {
    5.0
}

impl GameSettings {
    /// Default tuning with a small pickup layout around the origin
    pub fn with_default_layout() -> Self {
        Self {
            pickups: vec![
                PickupSpawn {
                    kind: PickupKind::Ammo,
                    quantity: 5,
                    position: Vec3::new(500.0, 0.0, 0.0),
                    rearm_time: default_rearm_time(),
                },
                PickupSpawn {
                    kind: PickupKind::Ammo,
                    quantity: 5,
                    position: Vec3::new(-500.0, 0.0, 0.0),
                    rearm_time: default_rearm_time(),
                },
                PickupSpawn {
                    kind: PickupKind::Health,
                    quantity: 25,
                    position: Vec3::new(0.0, 500.0, 0.0),
                    rearm_time: default_rearm_time(),
                },
            ],
            ..Self::default()
        }
    }

    /// Load tuning from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::SettingsRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject tuning the simulation cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let m = &self.movement;
        if !(m.max_velocity > 0.0) {
            return Err(ConfigError::InvalidSetting("movement.max_velocity must be positive"));
        }
        if !(0.0..=1.0).contains(&m.default_friction) || !(0.0..=1.0).contains(&m.braking_friction) {
            return Err(ConfigError::InvalidSetting("movement friction must be within [0, 1]"));
        }
        if self.weapon.pool_size == 0 || self.weapon.pool_size > 8 {
            return Err(ConfigError::InvalidSetting("weapon.pool_size must be within 1..=8"));
        }
        if self.pickups.len() > u16::MAX as usize {
            return Err(ConfigError::InvalidSetting("too many pickups"));
        }
        if !(self.net.max_catch_up > 0.0) {
            return Err(ConfigError::InvalidSetting("net.max_catch_up must be positive"));
        }
        Ok(())
    }
}
