//! The authority: ground truth for counters, rocket pools and pickup claims
//!
//! Driven by `join`/`leave`, `receive` and `tick`; every effect on other
//! participants is queued in the outbox as an [`Outbound`].

use std::collections::{BTreeMap, HashMap};

use glam::Vec3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::config::GameSettings;
use crate::game::combat::{apply_damage, rocket_hits};
use crate::game::math::{find_delta_angle_degrees, Rotator};
use crate::game::{
    yaw, EntityId, FireDenied, FireGate, InputEvent, MovementSample, Pickup, PickupId, PickupKind,
    RemoteBody, RocketPool,
};
use crate::net::{Message, Outbound, PeerId, RocketRef};

/// Who steers an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Controller {
    /// Driven by the process that runs the authority
    Host,
    Remote(PeerId),
}

/// Authoritative record of one vehicle
#[derive(Debug, Clone)]
pub struct ServerEntity {
    pub id: EntityId,
    pub controller: Controller,
    pub motion: RemoteBody,
    pub ammo: i32,
    pub health: i32,
    pub pool: RocketPool,
    fire_cooldown: f32,
    /// Timestamp of the last movement candidate accepted for relay
    last_accepted: Option<f32>,
    /// Authority session time when that candidate was accepted
    accepted_at: f64,
}

impl ServerEntity {
    pub fn position(&self) -> Vec3 {
        self.motion.position()
    }
}

pub struct Authority {
    settings: GameSettings,
    entities: BTreeMap<EntityId, ServerEntity>,
    peers: HashMap<PeerId, EntityId>,
    host: Option<EntityId>,
    host_clock: f32,
    pickups: Vec<Pickup>,
    next_entity: u32,
    rng: ChaCha8Rng,
    resync_timer: f32,
    tick: u64,
    /// Seconds simulated since startup
    session_time: f64,
    outbox: Vec<Outbound>,
}

impl Authority {
    pub fn new(settings: GameSettings, seed: u64) -> Self {
        let pickups = Pickup::layout(&settings.pickups);
        Self {
            settings,
            entities: BTreeMap::new(),
            peers: HashMap::new(),
            host: None,
            host_clock: 0.0,
            pickups,
            next_entity: 1,
            rng: ChaCha8Rng::seed_from_u64(seed),
            resync_timer: 0.0,
            tick: 0,
            session_time: 0.0,
            outbox: Vec::new(),
        }
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn connected_peers(&self) -> usize {
        self.peers.len()
    }

    pub fn entity_of(&self, peer: PeerId) -> Option<EntityId> {
        self.peers.get(&peer).copied()
    }

    pub fn entity(&self, id: EntityId) -> Option<&ServerEntity> {
        self.entities.get(&id)
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut ServerEntity> {
        self.entities.get_mut(&id)
    }

    pub fn host(&self) -> Option<EntityId> {
        self.host
    }

    pub fn pickups(&self) -> &[Pickup] {
        &self.pickups
    }

    /// Take everything queued for delivery since the last drain
    pub fn drain_outbox(&mut self) -> Vec<Outbound> {
        std::mem::take(&mut self.outbox)
    }

    fn spawn_entity(&mut self, controller: Controller) -> EntityId {
        let id = EntityId(self.next_entity);
        self.next_entity += 1;

        let radius = self.settings.player.spawn_radius.max(0.0);
        let angle = self.rng.gen_range(0.0..std::f32::consts::TAU);
        let distance = self.rng.gen_range(0.0..=radius);
        let position = Vec3::new(angle.cos() * distance, angle.sin() * distance, 0.0);
        let spawn_yaw = self.rng.gen_range(0.0..360.0);

        let player = self.settings.player;
        self.entities.insert(
            id,
            ServerEntity {
                id,
                controller,
                motion: RemoteBody::new(position, spawn_yaw),
                ammo: player.starting_ammo,
                health: player.starting_health,
                pool: RocketPool::new(id, self.settings.weapon.pool_size),
                fire_cooldown: 0.0,
                last_accepted: None,
                accepted_at: 0.0,
            },
        );
        id
    }

    fn spawned_message(entity: &ServerEntity) -> Message {
        Message::EntitySpawned {
            entity: entity.id,
            position: entity.position(),
            yaw: entity.motion.yaw(),
        }
    }

    /// Give the authority process its own vehicle (listen server)
    pub fn spawn_host(&mut self) -> EntityId {
        if let Some(host) = self.host {
            return host;
        }
        let id = self.spawn_entity(Controller::Host);
        self.host = Some(id);
        if let Some(entity) = self.entities.get(&id) {
            self.outbox.push(Outbound::all(Self::spawned_message(entity)));
        }
        info!(entity = %id, "host vehicle spawned");
        id
    }

    /// Register a new connection and spawn its vehicle
    pub fn join(&mut self, peer: PeerId) -> EntityId {
        if let Some(&existing) = self.peers.get(&peer) {
            warn!(peer = %peer, entity = %existing, "peer joined twice");
            return existing;
        }

        let id = self.spawn_entity(Controller::Remote(peer));
        self.peers.insert(peer, id);

        if let Some(entity) = self.entities.get(&id) {
            self.outbox.push(Outbound::to(
                peer,
                Message::Welcome {
                    entity: id,
                    position: entity.position(),
                    yaw: entity.motion.yaw(),
                    ammo: entity.ammo,
                    health: entity.health,
                },
            ));
            self.outbox
                .push(Outbound::all_except(peer, Self::spawned_message(entity)));
        }
        for other in self.entities.values().filter(|e| e.id != id) {
            self.outbox
                .push(Outbound::to(peer, Self::spawned_message(other)));
        }

        info!(peer = %peer, entity = %id, peers = self.peers.len(), "peer joined");
        id
    }

    pub fn leave(&mut self, peer: PeerId) {
        let Some(id) = self.peers.remove(&peer) else {
            return;
        };
        self.entities.remove(&id);
        self.outbox
            .push(Outbound::all(Message::EntityLeft { entity: id }));
        info!(peer = %peer, entity = %id, peers = self.peers.len(), "peer left");
    }

    /// Handle one message from a connected peer
    pub fn receive(&mut self, peer: PeerId, msg: Message) {
        let Some(&owned) = self.peers.get(&peer) else {
            warn!(peer = %peer, message = msg.name(), "message from unknown peer");
            return;
        };

        match msg {
            Message::MovementUpdate { entity, sample } => {
                if entity != owned {
                    warn!(peer = %peer, entity = %entity, "movement for an entity the peer does not own");
                    return;
                }
                self.accept_movement(peer, entity, sample);
            }
            Message::FireRequest {
                rocket,
                start,
                facing,
            } => {
                if rocket.owner != owned {
                    warn!(peer = %peer, rocket = %rocket, "fire request for a rocket the peer does not own");
                    return;
                }
                self.resolve_fire_request(peer, rocket, start, facing);
            }
            Message::ClaimRequest { pickup } => {
                self.resolve_claim(Some(peer), owned, pickup);
            }
            Message::Ping { t } => {
                self.outbox.push(Outbound::to(peer, Message::Pong { t }));
            }
            other => {
                warn!(peer = %peer, message = other.name(), "unexpected message from peer");
            }
        }
    }

    fn accept_movement(&mut self, peer: PeerId, id: EntityId, sample: MovementSample) {
        let tuning = self.settings.movement;
        let net = self.settings.net;
        let Some(entity) = self.entities.get_mut(&id) else {
            return;
        };

        if !sample.position.is_finite() || !sample.timestamp.is_finite() || !sample.throttle.is_finite() {
            warn!(entity = %id, "withheld non-finite movement update");
            return;
        }

        if net.validate_relay {
            if let Some(last) = entity.last_accepted {
                let claimed = sample.timestamp - last;
                if claimed <= 0.0 {
                    debug!(entity = %id, elapsed = claimed, "withheld stale movement update");
                    return;
                }
                // The controller's clock may not outrun ours by more than one catch-up window
                let observed = (self.session_time - entity.accepted_at) as f32;
                let elapsed = claimed.min(observed + net.max_catch_up);
                let moved = sample.position.distance(entity.motion.replicated_location());
                let allowed = tuning.max_velocity * elapsed * net.relay_speed_tolerance + net.relay_slack;
                if moved > allowed {
                    warn!(entity = %id, moved, allowed, "withheld implausible movement update");
                    return;
                }
            }
        }

        entity.last_accepted = Some(sample.timestamp);
        entity.accepted_at = self.session_time;
        entity.motion.accept_authoritative(&sample);
        self.outbox.push(Outbound::all_except(
            peer,
            Message::MovementUpdate { entity: id, sample },
        ));
    }

    fn resolve_fire_request(&mut self, peer: PeerId, rocket: RocketRef, start: Vec3, facing: Rotator) {
        let weapon = self.settings.weapon;
        let Some(entity) = self.entities.get_mut(&rocket.owner) else {
            return;
        };
        if rocket.slot as usize >= entity.pool.len() {
            warn!(rocket = %rocket, "fire request for a slot outside the pool");
            return;
        }

        if !weapon.unlimited_rockets && entity.ammo - 1 < 0 {
            debug!(rocket = %rocket, ammo = entity.ammo, "fire rejected");
            self.outbox
                .push(Outbound::to(peer, Message::FireRejected { rocket }));
            return;
        }
        // Unlimited rockets skip the check, not the spend; the counter may go negative
        entity.ammo -= 1;

        // Align the requested facing with where the authority sees the vehicle pointing
        let delta = find_delta_angle_degrees(facing.yaw, entity.motion.yaw());
        let corrected = facing.with_yaw_offset(delta);
        entity.pool.start_moving(rocket.slot, corrected.direction(), start);

        debug!(rocket = %rocket, ammo = entity.ammo, correction = delta, "fire approved");
        self.outbox.push(Outbound::all(Message::FireApproved {
            rocket,
            start,
            facing: corrected,
        }));
    }

    /// Settle a claim for `entity`; `requester` is `None` for contact the
    /// authority detected itself
    fn resolve_claim(&mut self, requester: Option<PeerId>, id: EntityId, pickup_id: PickupId) {
        let max_health = self.settings.player.max_health;
        let Some(pickup) = self.pickups.get_mut(pickup_id.0 as usize) else {
            warn!(pickup = %pickup_id, "claim for unknown pickup");
            return;
        };
        let Some(entity) = self.entities.get_mut(&id) else {
            return;
        };

        if !pickup.try_claim() {
            debug!(pickup = %pickup_id, entity = %id, "claim lost, pickup already claimed");
            if let Some(peer) = requester {
                self.outbox.push(Outbound::to(
                    peer,
                    Message::ClaimDenied { pickup: pickup_id },
                ));
            }
            return;
        }

        let value = match pickup.kind {
            PickupKind::Ammo => {
                entity.ammo = entity.ammo.saturating_add(pickup.quantity);
                entity.ammo
            }
            PickupKind::Health => {
                entity.health = entity.health.saturating_add(pickup.quantity).min(max_health);
                entity.health
            }
        };

        info!(pickup = %pickup_id, entity = %id, kind = ?pickup.kind, value, "pickup claimed");
        self.outbox.push(Outbound::all(Message::ClaimResolved {
            pickup: pickup_id,
            entity: id,
            kind: pickup.kind,
            value,
        }));
    }

    /// Input for the host vehicle
    pub fn host_input(&mut self, event: InputEvent) {
        let Some(entity) = self.host.and_then(|id| self.entities.get_mut(&id)) else {
            return;
        };
        let vehicle = &mut entity.motion.body.vehicle;
        match event.sanitized() {
            InputEvent::Throttle(v) => vehicle.throttle = v,
            InputEvent::Steer(v) => vehicle.steer = v,
            InputEvent::BrakePressed => vehicle.braking = true,
            InputEvent::BrakeReleased => vehicle.braking = false,
            InputEvent::FirePressed => {
                if let Err(reason) = self.host_fire() {
                    debug!(?reason, "host fire denied");
                }
            }
            InputEvent::DebugMenuToggled => {}
        }
    }

    /// The requester is the authority: spend ammo and broadcast at once
    pub fn host_fire(&mut self) -> Result<RocketRef, FireDenied> {
        let weapon = self.settings.weapon;
        let id = self.host.ok_or(FireDenied::NoVehicle)?;
        let entity = self.entities.get_mut(&id).ok_or(FireDenied::NoVehicle)?;

        let slot = FireGate::check(entity.fire_cooldown, entity.ammo, &entity.pool, &weapon)?;
        entity.fire_cooldown = weapon.fire_cooldown;
        entity.ammo -= 1;

        let body = &entity.motion.body;
        let facing = Rotator::from_yaw(body.vehicle.yaw);
        let start = body.position() + body.forward() * weapon.muzzle_offset;
        entity.pool.start_moving(slot, facing.direction(), start);

        let rocket = RocketRef { owner: id, slot };
        self.outbox.push(Outbound::all(Message::FireApproved {
            rocket,
            start,
            facing,
        }));
        Ok(rocket)
    }

    /// Advance the authoritative simulation by `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        self.tick += 1;
        if !dt.is_finite() || dt < 0.0 {
            warn!(dt, "ignoring invalid tick delta");
            return;
        }
        self.session_time += dt as f64;

        self.tick_host(dt);
        self.tick_remotes(dt);
        for pickup in &mut self.pickups {
            if pickup.tick(dt) {
                debug!(pickup = %pickup.id, "pickup re-armed");
            }
        }
        self.tick_rockets(dt);
        self.tick_resync(dt);
    }

    fn tick_host(&mut self, dt: f32) {
        let tuning = self.settings.movement;
        let contact_radius = self.settings.player.contact_radius;
        let Some(id) = self.host else {
            return;
        };
        let Some(entity) = self.entities.get_mut(&id) else {
            return;
        };

        entity.fire_cooldown = (entity.fire_cooldown - dt).max(0.0);
        if let Err(err) = entity.motion.body.drive(dt, &tuning) {
            warn!(entity = %id, error = %err, "skipping entity tick");
            return;
        }
        self.host_clock += dt;

        let body = &entity.motion.body;
        let position = body.position();
        self.outbox.push(Outbound::all(Message::MovementUpdate {
            entity: id,
            sample: MovementSample {
                position,
                timestamp: self.host_clock,
                throttle: body.vehicle.throttle,
                yaw: yaw::encode(body.vehicle.yaw),
            },
        }));

        let touched: Vec<PickupId> = self
            .pickups
            .iter()
            .filter(|p| p.is_available() && p.in_contact(position, contact_radius))
            .map(|p| p.id)
            .collect();
        for pickup in touched {
            self.resolve_claim(None, id, pickup);
        }
    }

    fn tick_remotes(&mut self, dt: f32) {
        let tuning = self.settings.movement;
        let net = self.settings.net;
        for entity in self.entities.values_mut() {
            if entity.controller == Controller::Host {
                continue;
            }
            if let Err(err) = entity.motion.tick(dt, &tuning, &net, 0.0) {
                warn!(entity = %entity.id, error = %err, "skipping entity tick");
            }
        }
    }

    fn tick_rockets(&mut self, dt: f32) {
        let weapon = self.settings.weapon;
        for entity in self.entities.values_mut() {
            for slot in entity.pool.tick(dt, &weapon) {
                debug!(owner = %entity.id, slot, "rocket expired");
            }
        }

        let targets: Vec<(EntityId, Vec3)> = self
            .entities
            .values()
            .filter(|e| e.health > 0)
            .map(|e| (e.id, e.position()))
            .collect();

        let mut hits = Vec::new();
        for entity in self.entities.values() {
            for (slot, rocket_at) in entity.pool.flights(weapon.rocket_speed) {
                let hit = targets
                    .iter()
                    .find(|(target, at)| *target != entity.id && rocket_hits(rocket_at, *at, weapon.hit_radius));
                if let Some(&(target, _)) = hit {
                    hits.push((RocketRef { owner: entity.id, slot }, target));
                }
            }
        }

        for (rocket, target) in hits {
            if let Some(owner) = self.entities.get_mut(&rocket.owner) {
                owner.pool.make_free(rocket.slot);
            }
            let Some(victim) = self.entities.get_mut(&target) else {
                continue;
            };
            victim.health = apply_damage(victim.health, weapon.damage);
            info!(target = %target, rocket = %rocket, health = victim.health, "hit confirmed");
            self.outbox.push(Outbound::all(Message::HitConfirmed {
                target,
                health: victim.health,
                rocket: Some(rocket),
            }));
        }
    }

    fn tick_resync(&mut self, dt: f32) {
        let interval = self.settings.net.resync_interval;
        if interval <= 0.0 {
            return;
        }
        self.resync_timer += dt;
        if self.resync_timer < interval {
            return;
        }
        self.resync_timer = 0.0;

        for entity in self.entities.values() {
            if let Controller::Remote(peer) = entity.controller {
                self.outbox.push(Outbound::to(
                    peer,
                    Message::StateResync {
                        entity: entity.id,
                        ammo: entity.ammo,
                        health: entity.health,
                        in_flight: entity.pool.in_flight_mask(),
                    },
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PickupSpawn;
    use crate::net::Target;
    use uuid::Uuid;

    fn settings() -> GameSettings {
        let mut settings = GameSettings::default();
        settings.player.starting_ammo = 1;
        settings.net.resync_interval = 0.0;
        settings
    }

    fn with_pickup(mut settings: GameSettings, kind: PickupKind, quantity: i32) -> GameSettings {
        settings.pickups.push(PickupSpawn {
            kind,
            quantity,
            position: Vec3::new(10_000.0, 0.0, 0.0),
            rearm_time: 5.0,
        });
        settings
    }

    fn fire_request(owner: EntityId, slot: u8) -> Message {
        Message::FireRequest {
            rocket: RocketRef { owner, slot },
            start: Vec3::ZERO,
            facing: Rotator::from_yaw(0.0),
        }
    }

    #[test]
    fn join_welcomes_and_announces() {
        let mut authority = Authority::new(settings(), 7);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ea = authority.join(a);
        authority.drain_outbox();
        let eb = authority.join(b);

        let out = authority.drain_outbox();
        assert!(matches!(
            &out[0],
            Outbound { target: Target::Peer(p), message: Message::Welcome { entity, ammo: 1, .. } }
                if *p == b && *entity == eb
        ));
        assert!(out.iter().any(|o| o.target == Target::AllExcept(b)
            && matches!(o.message, Message::EntitySpawned { entity, .. } if entity == eb)));
        assert!(out.iter().any(|o| o.target == Target::Peer(b)
            && matches!(o.message, Message::EntitySpawned { entity, .. } if entity == ea)));
    }

    #[test]
    fn last_rocket_goes_to_the_first_request() {
        let mut authority = Authority::new(settings(), 7);
        let peer = Uuid::new_v4();
        let id = authority.join(peer);
        authority.drain_outbox();

        authority.receive(peer, fire_request(id, 0));
        authority.receive(peer, fire_request(id, 1));

        let out = authority.drain_outbox();
        assert_eq!(out.len(), 2);
        assert!(matches!(out[0], Outbound { target: Target::All, message: Message::FireApproved { .. } }));
        assert_eq!(
            out[1],
            Outbound::to(peer, Message::FireRejected { rocket: RocketRef { owner: id, slot: 1 } })
        );
        assert_eq!(authority.entity(id).unwrap().ammo, 0);
    }

    #[test]
    fn unlimited_rockets_are_approved_and_still_counted() {
        let mut settings = settings();
        settings.player.starting_ammo = 0;
        settings.weapon.unlimited_rockets = true;
        let mut authority = Authority::new(settings, 7);
        let peer = Uuid::new_v4();
        let id = authority.join(peer);
        authority.drain_outbox();

        authority.receive(peer, fire_request(id, 0));
        let out = authority.drain_outbox();
        assert!(matches!(out[..], [Outbound { message: Message::FireApproved { .. }, .. }]));
        assert_eq!(authority.entity(id).unwrap().ammo, -1);
    }

    #[test]
    fn approval_corrects_facing_to_authority_view() {
        let mut authority = Authority::new(settings(), 7);
        let peer = Uuid::new_v4();
        let id = authority.join(peer);
        authority.drain_outbox();
        let seen = authority.entity(id).unwrap().motion.yaw();

        authority.receive(
            peer,
            Message::FireRequest {
                rocket: RocketRef { owner: id, slot: 0 },
                start: Vec3::ZERO,
                facing: Rotator::from_yaw(seen + 30.0),
            },
        );
        let out = authority.drain_outbox();
        let Message::FireApproved { facing, .. } = out[0].message else {
            panic!("expected approval, got {:?}", out[0]);
        };
        assert!(find_delta_angle_degrees(facing.yaw, seen).abs() < 1e-3);
    }

    #[test]
    fn peers_cannot_drive_other_entities() {
        let mut authority = Authority::new(settings(), 7);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        authority.join(a);
        let eb = authority.join(b);
        authority.drain_outbox();

        authority.receive(a, fire_request(eb, 0));
        authority.receive(
            a,
            Message::MovementUpdate {
                entity: eb,
                sample: MovementSample {
                    position: Vec3::ZERO,
                    timestamp: 1.0,
                    throttle: 0.0,
                    yaw: 0,
                },
            },
        );
        assert!(authority.drain_outbox().is_empty());
        assert_eq!(authority.entity(eb).unwrap().ammo, 1);
    }

    #[test]
    fn implausible_and_stale_movement_is_withheld() {
        let mut authority = Authority::new(settings(), 7);
        let peer = Uuid::new_v4();
        let id = authority.join(peer);
        authority.drain_outbox();
        let origin = authority.entity(id).unwrap().position();

        let sample = |dx: f32, timestamp: f32| Message::MovementUpdate {
            entity: id,
            sample: MovementSample {
                position: origin + Vec3::new(dx, 0.0, 0.0),
                timestamp,
                throttle: 1.0,
                yaw: 0,
            },
        };

        authority.receive(peer, sample(0.0, 1.0));
        authority.receive(peer, sample(10.0, 1.1));
        authority.receive(peer, sample(5.0, 1.05));
        authority.receive(peer, sample(50_000.0, 1.2));

        let relayed = authority.drain_outbox();
        assert_eq!(relayed.len(), 2);
        assert!(relayed.iter().all(|o| o.target == Target::AllExcept(peer)));
    }

    #[test]
    fn inflated_timestamp_does_not_widen_the_allowance() {
        let mut authority = Authority::new(settings(), 7);
        let peer = Uuid::new_v4();
        let id = authority.join(peer);
        authority.drain_outbox();
        let origin = authority.entity(id).unwrap().position();

        let sample = |dx: f32, timestamp: f32| Message::MovementUpdate {
            entity: id,
            sample: MovementSample {
                position: origin + Vec3::new(dx, 0.0, 0.0),
                timestamp,
                throttle: 1.0,
                yaw: 0,
            },
        };

        authority.receive(peer, sample(0.0, 1.0));
        authority.receive(peer, sample(5_000_000.0, 3600.0));
        assert_eq!(authority.drain_outbox().len(), 1);
        assert!(authority.entity(id).unwrap().position().distance(origin) < 1.0);

        // A long stall that really happened on our side still goes through
        for _ in 0..120 {
            authority.tick(1.0 / 60.0);
        }
        authority.drain_outbox();
        authority.receive(peer, sample(3_000.0, 3.0));
        assert_eq!(authority.drain_outbox().len(), 1);
        let moved_to = origin + Vec3::new(3_000.0, 0.0, 0.0);
        assert!(authority.entity(id).unwrap().position().distance(moved_to) < 1.0);
    }

    #[test]
    fn second_claim_is_denied_to_its_requester() {
        let mut authority = Authority::new(with_pickup(settings(), PickupKind::Ammo, 5), 7);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ea = authority.join(a);
        authority.join(b);
        authority.drain_outbox();

        authority.receive(a, Message::ClaimRequest { pickup: PickupId(0) });
        authority.receive(b, Message::ClaimRequest { pickup: PickupId(0) });

        let out = authority.drain_outbox();
        assert_eq!(
            out,
            vec![
                Outbound::all(Message::ClaimResolved {
                    pickup: PickupId(0),
                    entity: ea,
                    kind: PickupKind::Ammo,
                    value: 6,
                }),
                Outbound::to(b, Message::ClaimDenied { pickup: PickupId(0) }),
            ]
        );
    }

    #[test]
    fn health_pickup_is_clamped_to_max() {
        let mut authority = Authority::new(with_pickup(settings(), PickupKind::Health, 25), 7);
        let peer = Uuid::new_v4();
        let id = authority.join(peer);
        authority.entity_mut(id).unwrap().health = 90;
        authority.drain_outbox();

        authority.receive(peer, Message::ClaimRequest { pickup: PickupId(0) });
        assert!(matches!(
            authority.drain_outbox()[0].message,
            Message::ClaimResolved { value: 100, .. }
        ));
    }

    #[test]
    fn pickup_rearms_after_its_timer() {
        let mut authority = Authority::new(with_pickup(settings(), PickupKind::Ammo, 5), 7);
        let peer = Uuid::new_v4();
        authority.join(peer);
        authority.receive(peer, Message::ClaimRequest { pickup: PickupId(0) });
        assert!(authority.pickups()[0].is_claimed());

        for _ in 0..320 {
            authority.tick(1.0 / 60.0);
        }
        assert!(authority.pickups()[0].is_available());
    }

    #[test]
    fn host_fires_through_the_authority_path() {
        let mut authority = Authority::new(settings(), 7);
        let host = authority.spawn_host();
        authority.drain_outbox();

        let rocket = authority.host_fire().unwrap();
        assert_eq!(rocket.owner, host);
        assert_eq!(authority.entity(host).unwrap().ammo, 0);
        assert_eq!(authority.host_fire(), Err(FireDenied::Cooldown));

        for _ in 0..60 {
            authority.tick(1.0 / 60.0);
        }
        assert_eq!(authority.host_fire(), Err(FireDenied::OutOfAmmo));
    }

    #[test]
    fn rocket_hit_broadcasts_absolute_health() {
        let mut authority = Authority::new(settings(), 7);
        let peer = Uuid::new_v4();
        let shooter = authority.join(peer);
        let target_peer = Uuid::new_v4();
        let target = authority.join(target_peer);
        authority.drain_outbox();

        let target_at = authority.entity(target).unwrap().position();
        authority.receive(
            peer,
            Message::FireRequest {
                rocket: RocketRef { owner: shooter, slot: 0 },
                start: target_at,
                facing: Rotator::from_yaw(0.0),
            },
        );
        authority.drain_outbox();
        authority.tick(1.0 / 60.0);

        let out = authority.drain_outbox();
        let hit = out
            .iter()
            .find(|o| matches!(o.message, Message::HitConfirmed { .. }))
            .expect("hit broadcast");
        assert_eq!(
            hit.message,
            Message::HitConfirmed {
                target,
                health: 90,
                rocket: Some(RocketRef { owner: shooter, slot: 0 }),
            }
        );
        assert_eq!(authority.entity(shooter).unwrap().pool.active_count(), 0);
    }

    #[test]
    fn resync_goes_to_each_remote_controller() {
        let mut s = settings();
        s.net.resync_interval = 0.5;
        let mut authority = Authority::new(s, 7);
        let peer = Uuid::new_v4();
        let id = authority.join(peer);
        authority.spawn_host();
        authority.drain_outbox();

        for _ in 0..31 {
            authority.tick(1.0 / 60.0);
        }
        let resyncs: Vec<_> = authority
            .drain_outbox()
            .into_iter()
            .filter(|o| matches!(o.message, Message::StateResync { .. }))
            .collect();
        assert_eq!(
            resyncs,
            vec![Outbound::to(
                peer,
                Message::StateResync { entity: id, ammo: 1, health: 100, in_flight: 0 }
            )]
        );
    }

    #[test]
    fn ping_is_echoed_to_sender() {
        let mut authority = Authority::new(settings(), 7);
        let peer = Uuid::new_v4();
        authority.join(peer);
        authority.drain_outbox();
        authority.receive(peer, Message::Ping { t: 1.25 });
        assert_eq!(authority.drain_outbox(), vec![Outbound::to(peer, Message::Pong { t: 1.25 })]);
    }
}
