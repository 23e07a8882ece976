//! A controlling client: predicts its own vehicle, dead-reckons everyone
//! else, and keeps optimistic display counters that converge to the
//! authority's values.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use glam::Vec3;
use tracing::{debug, info, warn};

use crate::config::GameSettings;
use crate::game::math::Rotator;
use crate::game::{
    yaw, Body, Correction, EntityId, FireDenied, FireGate, InputEvent, LatencyTracker,
    MovementSample, Pickup, PickupId, PickupKind, RemoteBody, RocketPool,
};
use crate::net::{Message, RocketRef};

use super::hud::{HudEvent, HudState};

/// The vehicle this client drives
#[derive(Debug, Clone)]
pub struct Controlled {
    pub entity: EntityId,
    pub body: Body,
    pub pool: RocketPool,
    /// Local simulation clock stamped on movement updates
    clock: f32,
    fire_cooldown: f32,
}

impl Controlled {
    pub fn clock(&self) -> f32 {
        self.clock
    }
}

/// A vehicle driven by someone else
#[derive(Debug, Clone)]
pub struct Observed {
    pub motion: RemoteBody,
    pub pool: RocketPool,
    /// Last authoritative health seen, if any
    pub health: Option<i32>,
}

#[derive(Debug, Clone, Copy)]
struct PendingClaim {
    kind: PickupKind,
    /// Amount added to the display counter when the claim was predicted
    delta: i32,
}

pub struct Client {
    settings: GameSettings,
    controlled: Option<Controlled>,
    remotes: BTreeMap<EntityId, Observed>,
    pickups: Vec<Pickup>,
    /// Pickups the vehicle currently overlaps
    touching: HashSet<PickupId>,
    display_ammo: i32,
    display_health: i32,
    /// Unanswered fire requests by slot, with the ammo they spent
    pending_fires: BTreeSet<u8>,
    pending_claims: HashMap<PickupId, PendingClaim>,
    latency: LatencyTracker,
    session_time: f64,
    ping_timer: f32,
    debug_menu: bool,
    hud_events: Vec<HudEvent>,
    outbox: Vec<Message>,
}

impl Client {
    pub fn new(settings: GameSettings) -> Self {
        let pickups = Pickup::layout(&settings.pickups);
        Self {
            settings,
            controlled: None,
            remotes: BTreeMap::new(),
            pickups,
            touching: HashSet::new(),
            display_ammo: 0,
            display_health: 0,
            pending_fires: BTreeSet::new(),
            pending_claims: HashMap::new(),
            latency: LatencyTracker::new(),
            session_time: 0.0,
            ping_timer: 0.0,
            debug_menu: false,
            hud_events: Vec::new(),
            outbox: Vec::new(),
        }
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn entity(&self) -> Option<EntityId> {
        self.controlled.as_ref().map(|c| c.entity)
    }

    pub fn controlled(&self) -> Option<&Controlled> {
        self.controlled.as_ref()
    }

    pub fn controlled_mut(&mut self) -> Option<&mut Controlled> {
        self.controlled.as_mut()
    }

    pub fn position(&self) -> Option<Vec3> {
        self.controlled.as_ref().map(|c| c.body.position())
    }

    pub fn remote(&self, entity: EntityId) -> Option<&Observed> {
        self.remotes.get(&entity)
    }

    pub fn remotes(&self) -> impl Iterator<Item = (&EntityId, &Observed)> {
        self.remotes.iter()
    }

    pub fn pickups(&self) -> &[Pickup] {
        &self.pickups
    }

    pub fn display_ammo(&self) -> i32 {
        self.display_ammo
    }

    pub fn display_health(&self) -> i32 {
        self.display_health
    }

    pub fn latency(&self) -> &LatencyTracker {
        &self.latency
    }

    pub fn pending_fires(&self) -> usize {
        self.pending_fires.len()
    }

    pub fn pending_claims(&self) -> usize {
        self.pending_claims.len()
    }

    /// Any optimistic action still waiting on the authority
    pub fn has_pending(&self) -> bool {
        !self.pending_fires.is_empty() || !self.pending_claims.is_empty()
    }

    pub fn hud(&self) -> HudState {
        HudState {
            ammo: self.display_ammo,
            health: self.display_health,
            ping_ms: (self.latency.average() * 1000.0).round() as u32,
            debug_menu: self.debug_menu,
        }
    }

    pub fn drain_hud_events(&mut self) -> Vec<HudEvent> {
        std::mem::take(&mut self.hud_events)
    }

    /// Messages for the authority queued since the last drain
    pub fn drain_outbox(&mut self) -> Vec<Message> {
        std::mem::take(&mut self.outbox)
    }

    /// Debug-menu cheat: raises the local display counter only
    pub fn cheat_add_ammo(&mut self, amount: i32) {
        self.set_ammo(self.display_ammo.saturating_add(amount));
    }

    fn set_ammo(&mut self, value: i32) {
        if value != self.display_ammo {
            self.display_ammo = value;
            self.hud_events.push(HudEvent::AmmoChanged(value));
        }
    }

    fn set_health(&mut self, value: i32) {
        if value != self.display_health {
            self.display_health = value;
            self.hud_events.push(HudEvent::HealthChanged(value));
        }
    }

    fn counter(&self, kind: PickupKind) -> i32 {
        match kind {
            PickupKind::Ammo => self.display_ammo,
            PickupKind::Health => self.display_health,
        }
    }

    fn set_counter(&mut self, kind: PickupKind, value: i32) {
        match kind {
            PickupKind::Ammo => self.set_ammo(value),
            PickupKind::Health => self.set_health(value),
        }
    }

    /// Optimistic change still riding on top of the authority's value
    fn outstanding(&self, kind: PickupKind) -> i32 {
        let claimed: i32 = self
            .pending_claims
            .values()
            .filter(|c| c.kind == kind)
            .map(|c| c.delta)
            .sum();
        match kind {
            PickupKind::Ammo => claimed - self.pending_fires.len() as i32,
            PickupKind::Health => claimed,
        }
    }

    pub fn handle_input(&mut self, event: InputEvent) {
        match event.sanitized() {
            InputEvent::FirePressed => {
                if let Err(reason) = self.fire() {
                    debug!(?reason, "fire denied");
                }
            }
            InputEvent::DebugMenuToggled => {
                self.debug_menu = !self.debug_menu;
                self.hud_events.push(if self.debug_menu {
                    HudEvent::DebugMenuShown
                } else {
                    HudEvent::DebugMenuHidden
                });
            }
            event => {
                let Some(controlled) = self.controlled.as_mut() else {
                    return;
                };
                let vehicle = &mut controlled.body.vehicle;
                match event {
                    InputEvent::Throttle(v) => vehicle.throttle = v,
                    InputEvent::Steer(v) => vehicle.steer = v,
                    InputEvent::BrakePressed => vehicle.braking = true,
                    InputEvent::BrakeReleased => vehicle.braking = false,
                    _ => {}
                }
            }
        }
    }

    /// Launch a rocket locally and ask the authority to confirm it
    pub fn fire(&mut self) -> Result<RocketRef, FireDenied> {
        let weapon = self.settings.weapon;
        let controlled = self.controlled.as_mut().ok_or(FireDenied::NoVehicle)?;

        // A slot stays reserved until the authority answers for it, even if
        // its local flight has already ended
        let pending = &self.pending_fires;
        let slot = FireGate::check_reserving(
            controlled.fire_cooldown,
            self.display_ammo,
            &controlled.pool,
            &weapon,
            |slot| pending.contains(&slot),
        )?;
        controlled.fire_cooldown = weapon.fire_cooldown;

        let facing = Rotator::from_yaw(controlled.body.vehicle.yaw);
        let start = controlled.body.position() + controlled.body.forward() * weapon.muzzle_offset;
        controlled.pool.start_moving(slot, facing.direction(), start);
        let rocket = RocketRef {
            owner: controlled.entity,
            slot,
        };

        self.pending_fires.insert(slot);
        self.set_ammo(self.display_ammo - 1);

        debug!(rocket = %rocket, ammo = self.display_ammo, "fire predicted");
        self.outbox.push(Message::FireRequest {
            rocket,
            start,
            facing,
        });
        Ok(rocket)
    }

    /// Handle one message from the authority
    pub fn receive(&mut self, msg: Message) {
        match msg {
            Message::Welcome {
                entity,
                position,
                yaw,
                ammo,
                health,
            } => {
                info!(entity = %entity, "spawned");
                self.controlled = Some(Controlled {
                    entity,
                    body: Body::spawn(position, yaw),
                    pool: RocketPool::new(entity, self.settings.weapon.pool_size),
                    clock: 0.0,
                    fire_cooldown: 0.0,
                });
                self.remotes.remove(&entity);
                self.pending_fires.clear();
                self.pending_claims.clear();
                self.set_ammo(ammo);
                self.set_health(health);
            }
            Message::EntitySpawned {
                entity,
                position,
                yaw,
            } => {
                if self.entity() == Some(entity) {
                    return;
                }
                debug!(entity = %entity, "remote vehicle spawned");
                self.remotes.insert(
                    entity,
                    Observed {
                        motion: RemoteBody::new(position, yaw),
                        pool: RocketPool::new(entity, self.settings.weapon.pool_size),
                        health: None,
                    },
                );
            }
            Message::EntityLeft { entity } => {
                self.remotes.remove(&entity);
            }
            Message::MovementUpdate { entity, sample } => self.apply_movement(entity, &sample),
            Message::FireApproved {
                rocket,
                start,
                facing,
            } => self.on_fire_approved(rocket, start, facing),
            Message::FireRejected { rocket } => self.on_fire_rejected(rocket),
            Message::ClaimResolved {
                pickup,
                entity,
                kind,
                value,
            } => self.on_claim_resolved(pickup, entity, kind, value),
            Message::ClaimDenied { pickup } => self.on_claim_denied(pickup),
            Message::HitConfirmed {
                target,
                health,
                rocket,
            } => self.on_hit(target, health, rocket),
            Message::Pong { t } => {
                self.latency.record((self.session_time - t) as f32);
            }
            Message::StateResync {
                entity,
                ammo,
                health,
                in_flight,
            } => self.on_resync(entity, ammo, health, in_flight),
            other => {
                warn!(message = other.name(), "unexpected message from authority");
            }
        }
    }

    fn apply_movement(&mut self, entity: EntityId, sample: &MovementSample) {
        if self.entity() == Some(entity) {
            return;
        }
        let Some(observed) = self.remotes.get_mut(&entity) else {
            debug!(entity = %entity, "movement for unknown entity");
            return;
        };
        match observed
            .motion
            .apply_update(sample, &self.settings.movement, &self.settings.net)
        {
            Ok(Correction::Stale) => debug!(entity = %entity, "dropped stale movement update"),
            Ok(_) => {}
            Err(err) => warn!(entity = %entity, error = %err, "skipping movement update"),
        }
    }

    fn on_fire_approved(&mut self, rocket: RocketRef, start: Vec3, facing: Rotator) {
        let speed = self.settings.weapon.rocket_speed;
        let direction = facing.direction();

        if let Some(controlled) = self.controlled.as_mut().filter(|c| c.entity == rocket.owner) {
            if self.pending_fires.remove(&rocket.slot) {
                // Already flying since the press; only steer it onto the approved line
                if !controlled.pool.apply_correction(rocket.slot, direction, speed) {
                    debug!(rocket = %rocket, "approved rocket already retired");
                }
            } else {
                controlled.pool.start_moving(rocket.slot, direction, start);
            }
            return;
        }

        match self.remotes.get_mut(&rocket.owner) {
            Some(observed) => {
                observed.pool.start_moving(rocket.slot, direction, start);
            }
            None => debug!(rocket = %rocket, "approval for unknown owner"),
        }
    }

    fn on_fire_rejected(&mut self, rocket: RocketRef) {
        let Some(controlled) = self.controlled.as_mut().filter(|c| c.entity == rocket.owner) else {
            warn!(rocket = %rocket, "rejection for a rocket this client does not own");
            return;
        };
        let freed = controlled.pool.make_free(rocket.slot);

        if self.pending_fires.remove(&rocket.slot) {
            self.set_ammo(self.display_ammo + 1);
            debug!(rocket = %rocket, freed, ammo = self.display_ammo, "fire rolled back");
        } else {
            debug!(rocket = %rocket, "repeated rejection ignored");
        }
    }

    fn on_claim_resolved(&mut self, pickup: PickupId, entity: EntityId, kind: PickupKind, value: i32) {
        match self.pickups.get_mut(pickup.0 as usize) {
            Some(p) => p.mark_claimed(),
            None => warn!(pickup = %pickup, "claim resolved for unknown pickup"),
        }

        if self.entity() == Some(entity) {
            self.pending_claims.remove(&pickup);
            let display = value + self.outstanding(kind);
            self.set_counter(kind, display);
            debug!(pickup = %pickup, value, "claim confirmed");
        } else if kind == PickupKind::Health {
            if let Some(observed) = self.remotes.get_mut(&entity) {
                observed.health = Some(value);
            }
        }
    }

    fn on_claim_denied(&mut self, pickup: PickupId) {
        let Some(claim) = self.pending_claims.remove(&pickup) else {
            debug!(pickup = %pickup, "denial without a pending claim");
            return;
        };
        let restored = self.counter(claim.kind) - claim.delta;
        self.set_counter(claim.kind, restored);
        if let Some(p) = self.pickups.get_mut(pickup.0 as usize) {
            p.unpredict();
        }
        debug!(pickup = %pickup, restored, "claim rolled back");
    }

    fn on_hit(&mut self, target: EntityId, health: i32, rocket: Option<RocketRef>) {
        if self.entity() == Some(target) {
            let display = health + self.outstanding(PickupKind::Health);
            self.set_health(display);
        } else if let Some(observed) = self.remotes.get_mut(&target) {
            observed.health = Some(health);
        }

        let Some(rocket) = rocket else {
            return;
        };
        match self.controlled.as_mut().filter(|c| c.entity == rocket.owner) {
            Some(controlled) => {
                controlled.pool.make_free(rocket.slot);
            }
            None => {
                if let Some(observed) = self.remotes.get_mut(&rocket.owner) {
                    observed.pool.make_free(rocket.slot);
                }
            }
        }
    }

    fn on_resync(&mut self, entity: EntityId, ammo: i32, health: i32, in_flight: u8) {
        if self.entity() != Some(entity) {
            warn!(entity = %entity, "resync for an entity this client does not own");
            return;
        }
        if self.has_pending() {
            debug!("resync deferred while optimistic actions are pending");
            return;
        }

        if ammo != self.display_ammo || health != self.display_health {
            info!(ammo, health, "display counters resynced");
        }
        self.set_ammo(ammo);
        self.set_health(health);

        if let Some(controlled) = self.controlled.as_mut() {
            for slot in 0..controlled.pool.len().min(8) as u8 {
                if in_flight & (1 << slot) == 0 && controlled.pool.make_free(slot) {
                    debug!(slot, "resync retired rocket");
                }
            }
        }
    }

    /// Advance the local simulation by `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        if !dt.is_finite() || dt < 0.0 {
            warn!(dt, "ignoring invalid tick delta");
            return;
        }
        self.session_time += dt as f64;

        self.tick_controlled(dt);
        self.tick_pickups(dt);
        self.tick_remotes(dt);
        self.tick_ping(dt);
    }

    fn tick_controlled(&mut self, dt: f32) {
        let tuning = self.settings.movement;
        let weapon = self.settings.weapon;
        let Some(controlled) = self.controlled.as_mut() else {
            return;
        };

        controlled.fire_cooldown = (controlled.fire_cooldown - dt).max(0.0);
        controlled.pool.tick(dt, &weapon);
        if let Err(err) = controlled.body.drive(dt, &tuning) {
            warn!(entity = %controlled.entity, error = %err, "skipping entity tick");
            return;
        }
        controlled.clock += dt;

        let vehicle = &controlled.body.vehicle;
        self.outbox.push(Message::MovementUpdate {
            entity: controlled.entity,
            sample: MovementSample {
                position: controlled.body.position(),
                timestamp: controlled.clock,
                throttle: vehicle.throttle,
                yaw: yaw::encode(vehicle.yaw),
            },
        });
    }

    fn tick_pickups(&mut self, dt: f32) {
        for pickup in &mut self.pickups {
            if pickup.tick(dt) {
                // Standing on a pickup as it re-arms counts as fresh contact
                self.touching.remove(&pickup.id);
            }
        }

        let Some(position) = self.position() else {
            return;
        };
        let radius = self.settings.player.contact_radius;

        let mut claims = Vec::new();
        for pickup in &mut self.pickups {
            if !pickup.in_contact(position, radius) {
                self.touching.remove(&pickup.id);
                continue;
            }
            if self.touching.insert(pickup.id) && pickup.is_available() {
                pickup.mark_predicted();
                claims.push((pickup.id, pickup.kind, pickup.quantity));
            }
        }

        for (pickup, kind, quantity) in claims {
            self.predict_claim(pickup, kind, quantity);
        }
    }

    fn predict_claim(&mut self, pickup: PickupId, kind: PickupKind, quantity: i32) {
        let current = self.counter(kind);
        let target = match kind {
            PickupKind::Ammo => current.saturating_add(quantity),
            PickupKind::Health => current
                .saturating_add(quantity)
                .min(self.settings.player.max_health)
                .max(current),
        };
        let delta = target - current;

        self.set_counter(kind, target);
        self.pending_claims.insert(pickup, PendingClaim { kind, delta });
        debug!(pickup = %pickup, kind = ?kind, delta, "claim predicted");
        self.outbox.push(Message::ClaimRequest { pickup });
    }

    fn tick_remotes(&mut self, dt: f32) {
        let tuning = self.settings.movement;
        let net = self.settings.net;
        let weapon = self.settings.weapon;
        let average_rtt = self.latency.average();

        for (entity, observed) in self.remotes.iter_mut() {
            if let Err(err) = observed.motion.tick(dt, &tuning, &net, average_rtt) {
                warn!(entity = %entity, error = %err, "skipping entity tick");
            }
            observed.pool.tick(dt, &weapon);
        }
    }

    fn tick_ping(&mut self, dt: f32) {
        let interval = self.settings.net.ping_interval;
        if interval <= 0.0 || self.controlled.is_none() {
            return;
        }
        self.ping_timer += dt;
        if self.ping_timer >= interval {
            self.ping_timer = 0.0;
            self.outbox.push(Message::Ping {
                t: self.session_time,
            });
        }
    }
}
