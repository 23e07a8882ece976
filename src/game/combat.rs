//! Rocket pool, fire gate and hit resolution

use glam::Vec3;

use crate::config::WeaponSettings;

use super::EntityId;

/// Rocket travelling along its launch vector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Flight {
    pub origin: Vec3,
    /// Unit travel direction
    pub direction: Vec3,
    /// Seconds since launch
    pub elapsed: f32,
}

impl Flight {
    pub fn position(&self, speed: f32) -> Vec3 {
        self.origin + self.direction * speed * self.elapsed
    }
}

/// One reusable rocket
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RocketSlot {
    #[default]
    Free,
    InFlight(Flight),
}

impl RocketSlot {
    pub fn is_free(&self) -> bool {
        matches!(self, RocketSlot::Free)
    }
}

/// Fixed set of rockets owned by one entity, created once at spawn
#[derive(Debug, Clone)]
pub struct RocketPool {
    owner: EntityId,
    slots: Vec<RocketSlot>,
}

impl RocketPool {
    pub fn new(owner: EntityId, size: usize) -> Self {
        Self {
            owner,
            slots: vec![RocketSlot::Free; size],
        }
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: u8) -> Option<&RocketSlot> {
        self.slots.get(index as usize)
    }

    /// Index of the first free rocket
    pub fn free_slot(&self) -> Option<u8> {
        self.free_slot_except(|_| false)
    }

    /// Index of the first free rocket not held back by `reserved`
    pub fn free_slot_except(&self, reserved: impl Fn(u8) -> bool) -> Option<u8> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| (i as u8, slot))
            .find(|(i, slot)| slot.is_free() && !reserved(*i))
            .map(|(i, _)| i)
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| !s.is_free()).count()
    }

    /// In-flight slots as a bitmask, bit `i` for slot `i`
    pub fn in_flight_mask(&self) -> u8 {
        self.slots
            .iter()
            .enumerate()
            .take(8)
            .filter(|(_, s)| !s.is_free())
            .fold(0u8, |mask, (i, _)| mask | (1 << i))
    }

    /// Launch (or relaunch) a rocket. Returns false for an unknown slot.
    pub fn start_moving(&mut self, index: u8, direction: Vec3, origin: Vec3) -> bool {
        let Some(slot) = self.slots.get_mut(index as usize) else {
            return false;
        };
        *slot = RocketSlot::InFlight(Flight {
            origin,
            direction: direction.normalize_or_zero(),
            elapsed: 0.0,
        });
        true
    }

    /// Re-aim an already flying rocket without restarting it; the rocket
    /// keeps its current position and continues along `direction`
    pub fn apply_correction(&mut self, index: u8, direction: Vec3, speed: f32) -> bool {
        match self.slots.get_mut(index as usize) {
            Some(RocketSlot::InFlight(flight)) => {
                let here = flight.position(speed);
                let direction = direction.normalize_or_zero();
                flight.origin = here - direction * speed * flight.elapsed;
                flight.direction = direction;
                true
            }
            _ => false,
        }
    }

    /// Return a rocket to the pool. Freeing a free rocket is a no-op;
    /// returns whether anything changed.
    pub fn make_free(&mut self, index: u8) -> bool {
        match self.slots.get_mut(index as usize) {
            Some(slot) if !slot.is_free() => {
                *slot = RocketSlot::Free;
                true
            }
            _ => false,
        }
    }

    /// Advance all flights; rockets past their lifetime return to the pool.
    /// Returns the slots that expired this tick.
    pub fn tick(&mut self, dt: f32, weapon: &WeaponSettings) -> Vec<u8> {
        let mut expired = Vec::new();
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let RocketSlot::InFlight(flight) = slot {
                flight.elapsed += dt;
                if flight.elapsed >= weapon.rocket_lifetime {
                    *slot = RocketSlot::Free;
                    expired.push(index as u8);
                }
            }
        }
        expired
    }

    /// Current positions of every in-flight rocket
    pub fn flights(&self, speed: f32) -> impl Iterator<Item = (u8, Vec3)> + '_ {
        self.slots.iter().enumerate().filter_map(move |(i, slot)| match slot {
            RocketSlot::InFlight(flight) => Some((i as u8, flight.position(speed))),
            RocketSlot::Free => None,
        })
    }
}

/// Why a fire attempt was silently dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDenied {
    /// Nothing is spawned to fire from
    NoVehicle,
    Cooldown,
    OutOfAmmo,
    TooManyActive,
    NoFreeRocket,
}

/// Requester-side gate evaluated before any fire request leaves the process
pub struct FireGate;

impl FireGate {
    /// Pick the rocket to launch, or say why not
    pub fn check(
        cooldown_remaining: f32,
        ammo: i32,
        pool: &RocketPool,
        weapon: &WeaponSettings,
    ) -> Result<u8, FireDenied> {
        Self::check_reserving(cooldown_remaining, ammo, pool, weapon, |_| false)
    }

    /// As [`FireGate::check`], but free slots for which `reserved` holds
    /// are passed over
    pub fn check_reserving(
        cooldown_remaining: f32,
        ammo: i32,
        pool: &RocketPool,
        weapon: &WeaponSettings,
        reserved: impl Fn(u8) -> bool,
    ) -> Result<u8, FireDenied> {
        if cooldown_remaining > 0.0 {
            return Err(FireDenied::Cooldown);
        }
        if ammo <= 0 && !weapon.unlimited_rockets {
            return Err(FireDenied::OutOfAmmo);
        }
        if weapon.max_active_rockets > 0 && pool.active_count() >= weapon.max_active_rockets {
            return Err(FireDenied::TooManyActive);
        }
        pool.free_slot_except(reserved).ok_or(FireDenied::NoFreeRocket)
    }
}

/// Sphere overlap between a rocket and a vehicle
pub fn rocket_hits(rocket: Vec3, target: Vec3, hit_radius: f32) -> bool {
    rocket.distance_squared(target) <= hit_radius * hit_radius
}

/// Apply damage to health, clamped at zero
pub fn apply_damage(health: i32, damage: i32) -> i32 {
    health.saturating_sub(damage).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weapon() -> WeaponSettings {
        WeaponSettings::default()
    }

    #[test]
    fn gate_checks_in_order() {
        let weapon = weapon();
        let mut pool = RocketPool::new(EntityId(1), 8);

        assert_eq!(FireGate::check(0.2, 5, &pool, &weapon), Err(FireDenied::Cooldown));
        assert_eq!(FireGate::check(0.0, 0, &pool, &weapon), Err(FireDenied::OutOfAmmo));
        assert_eq!(FireGate::check(0.0, 5, &pool, &weapon), Ok(0));

        for i in 0..3 {
            pool.start_moving(i, Vec3::X, Vec3::ZERO);
        }
        assert_eq!(FireGate::check(0.0, 5, &pool, &weapon), Err(FireDenied::TooManyActive));
    }

    #[test]
    fn zero_cap_means_uncapped_until_pool_is_exhausted() {
        let weapon = WeaponSettings {
            max_active_rockets: 0,
            ..weapon()
        };
        let mut pool = RocketPool::new(EntityId(1), 2);
        pool.start_moving(0, Vec3::X, Vec3::ZERO);
        assert_eq!(FireGate::check(0.0, 5, &pool, &weapon), Ok(1));
        pool.start_moving(1, Vec3::X, Vec3::ZERO);
        assert_eq!(FireGate::check(0.0, 5, &pool, &weapon), Err(FireDenied::NoFreeRocket));
    }

    #[test]
    fn unlimited_ignores_ammo() {
        let weapon = WeaponSettings {
            unlimited_rockets: true,
            ..weapon()
        };
        let pool = RocketPool::new(EntityId(1), 8);
        assert_eq!(FireGate::check(0.0, 0, &pool, &weapon), Ok(0));
    }

    #[test]
    fn reserved_slots_are_skipped() {
        let weapon = weapon();
        let pool = RocketPool::new(EntityId(1), 2);
        assert_eq!(FireGate::check_reserving(0.0, 5, &pool, &weapon, |slot| slot == 0), Ok(1));
        assert_eq!(
            FireGate::check_reserving(0.0, 5, &pool, &weapon, |_| true),
            Err(FireDenied::NoFreeRocket)
        );
    }

    #[test]
    fn make_free_is_idempotent() {
        let mut pool = RocketPool::new(EntityId(1), 8);
        pool.start_moving(3, Vec3::Y, Vec3::ZERO);
        assert!(pool.make_free(3));
        assert!(!pool.make_free(3));
        assert!(!pool.make_free(42));
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn flights_expire_after_lifetime() {
        let weapon = weapon();
        let mut pool = RocketPool::new(EntityId(1), 8);
        pool.start_moving(0, Vec3::X, Vec3::ZERO);
        assert!(pool.tick(weapon.rocket_lifetime * 0.5, &weapon).is_empty());
        assert_eq!(pool.tick(weapon.rocket_lifetime, &weapon), vec![0]);
        assert!(pool.slot(0).unwrap().is_free());
    }

    #[test]
    fn correction_keeps_position_and_changes_heading() {
        let speed = 100.0;
        let mut pool = RocketPool::new(EntityId(1), 1);
        pool.start_moving(0, Vec3::X, Vec3::ZERO);
        let weapon = WeaponSettings {
            rocket_lifetime: 10.0,
            ..weapon()
        };
        pool.tick(1.0, &weapon);
        let before = pool.flights(speed).next().unwrap().1;
        assert!(pool.apply_correction(0, Vec3::Y, speed));
        let after = pool.flights(speed).next().unwrap().1;
        assert!(before.abs_diff_eq(after, 1e-3));

        pool.tick(1.0, &weapon);
        let later = pool.flights(speed).next().unwrap().1;
        assert!(later.abs_diff_eq(Vec3::new(100.0, 100.0, 0.0), 1e-2));
    }

    #[test]
    fn mask_tracks_in_flight_slots() {
        let mut pool = RocketPool::new(EntityId(1), 8);
        pool.start_moving(0, Vec3::X, Vec3::ZERO);
        pool.start_moving(5, Vec3::X, Vec3::ZERO);
        assert_eq!(pool.in_flight_mask(), 0b0010_0001);
    }

    #[test]
    fn damage_floors_at_zero() {
        assert_eq!(apply_damage(15, 10), 5);
        assert_eq!(apply_damage(5, 10), 0);
    }
}
