//! Observer-side reconciliation of remotely controlled vehicles

use std::collections::VecDeque;

use glam::Vec3;
use tracing::debug;

use crate::config::{MovementSettings, NetSettings};

use super::math::facing_from_yaw;
use super::physics::{Body, MovementResolver};
use super::yaw;
use super::SimError;

/// Visual offsets shorter than this are dropped
const OFFSET_EPSILON: f32 = 0.01;

/// Number of round-trip samples averaged for the smoothing time constant
pub const LATENCY_SAMPLES: usize = 3;

/// One movement candidate as sent by a controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovementSample {
    pub position: Vec3,
    /// Controller's local simulation clock (seconds)
    pub timestamp: f32,
    pub throttle: f32,
    /// Quantized heading
    pub yaw: u8,
}

/// Running average over the most recent round-trip samples
#[derive(Debug, Clone, Default)]
pub struct LatencyTracker {
    samples: VecDeque<f32>,
}

impl LatencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a round trip in seconds; only the last three are kept
    pub fn record(&mut self, rtt: f32) {
        if !rtt.is_finite() || rtt < 0.0 {
            return;
        }
        if self.samples.len() == LATENCY_SAMPLES {
            self.samples.pop_front();
        }
        self.samples.push_back(rtt);
    }

    /// Mean of the current and up to two prior samples; 0 with no samples
    pub fn average(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f32>() / self.samples.len() as f32
    }

    pub fn latest(&self) -> Option<f32> {
        self.samples.back().copied()
    }
}

/// Rendered-mesh offset that absorbs corrections and eases back to zero
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VisualOffset {
    offset: Vec3,
}

impl VisualOffset {
    pub fn get(&self) -> Vec3 {
        self.offset
    }

    /// Hold the mesh where it was drawn while the body jumps
    pub fn absorb(&mut self, drawn_from: Vec3, snapped_to: Vec3) {
        self.offset += drawn_from - snapped_to;
    }

    /// Exponential decay toward zero with time constant `tau` seconds
    pub fn decay(&mut self, dt: f32, tau: f32) {
        if self.offset == Vec3::ZERO {
            return;
        }
        self.offset *= (-dt / tau).exp();
        if self.offset.length() < OFFSET_EPSILON {
            self.offset = Vec3::ZERO;
        }
    }

    pub fn clear(&mut self) {
        self.offset = Vec3::ZERO;
    }
}

/// Outcome of applying one movement packet
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Correction {
    /// Packet not newer than the local clock; ignored
    Stale,
    /// Error within threshold; dead reckoning continues undisturbed
    Within { error: f32 },
    /// Body snapped and the mesh eases in from the old spot
    Smoothed { error: f32 },
    /// Body and mesh snapped together
    Snapped { error: f32 },
}

/// An observer's dead-reckoned copy of a vehicle controlled elsewhere
#[derive(Debug, Clone)]
pub struct RemoteBody {
    pub body: Body,
    /// Simulation clock in the controller's time base; seeded from the
    /// first packet and only moved by later packets
    clock: Option<f32>,
    /// Body as it stood at `clock`, before local frames reckoned past it
    anchor: Body,
    /// Seconds dead-reckoned locally past `clock`
    reckoned: f32,
    /// Packets that moved the body past the threshold gate
    corrections: u64,
    /// Catch-up applied by the most recent accepted packet
    last_correction_delta: f32,
    visual: VisualOffset,
    /// Last heading received, decoded
    replicated_yaw: f32,
    /// Last position received
    replicated_location: Vec3,
}

impl RemoteBody {
    pub fn new(position: Vec3, yaw: f32) -> Self {
        let body = Body::spawn(position, yaw);
        Self {
            anchor: body.clone(),
            body,
            clock: None,
            reckoned: 0.0,
            corrections: 0,
            last_correction_delta: 0.0,
            visual: VisualOffset::default(),
            replicated_yaw: yaw,
            replicated_location: position,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.body.position()
    }

    /// Where the mesh is drawn: logical position plus visual offset
    pub fn render_position(&self) -> Vec3 {
        self.body.position() + self.visual.get()
    }

    pub fn visual_offset(&self) -> Vec3 {
        self.visual.get()
    }

    pub fn yaw(&self) -> f32 {
        self.body.vehicle.yaw
    }

    pub fn replicated_yaw(&self) -> f32 {
        self.replicated_yaw
    }

    pub fn replicated_location(&self) -> Vec3 {
        self.replicated_location
    }

    pub fn clock(&self) -> Option<f32> {
        self.clock
    }

    pub fn last_correction_delta(&self) -> f32 {
        self.last_correction_delta
    }

    pub fn corrections(&self) -> u64 {
        self.corrections
    }

    /// Per-frame dead reckoning between packets; also eases the visual
    /// offset with a time constant derived from `average_rtt`
    pub fn tick(
        &mut self,
        dt: f32,
        tuning: &MovementSettings,
        net: &NetSettings,
        average_rtt: f32,
    ) -> Result<(), SimError> {
        self.body.coast(dt, tuning)?;
        if self.clock.is_some() {
            self.reckoned += dt;
        } else {
            self.anchor = self.body.clone();
        }
        self.visual.decay(dt, average_rtt.max(net.min_smoothing_time));
        Ok(())
    }

    /// Observer handling of a relayed movement packet
    pub fn apply_update(
        &mut self,
        sample: &MovementSample,
        tuning: &MovementSettings,
        net: &NetSettings,
    ) -> Result<Correction, SimError> {
        let clock = *self.clock.get_or_insert(sample.timestamp);
        let behind = sample.timestamp - clock;
        if behind < 0.0 {
            return Ok(Correction::Stale);
        }

        // A single packet may only pull the clock forward so far
        let delta = behind.min(net.max_catch_up);
        self.clock = Some(clock + delta);
        self.last_correction_delta = delta;

        // Replay from the last packet under the throttle this one reports;
        // frames already reckoned past it are redone afterwards
        let ahead = (self.reckoned - delta).max(0.0);
        self.body = self.anchor.clone();
        self.body.vehicle.throttle = sample.throttle;
        self.body.coast(delta, tuning)?;

        let decoded_yaw = yaw::decode(sample.yaw);
        self.replicated_yaw = decoded_yaw;
        self.replicated_location = sample.position;
        self.body.vehicle.yaw = decoded_yaw;
        self.body.resolver.set_facing(facing_from_yaw(decoded_yaw));

        let predicted = self.body.position();
        let error = predicted.distance(sample.position);
        let outcome = if error <= net.correction_threshold {
            Correction::Within { error }
        } else {
            self.corrections += 1;
            self.body.resolver.teleport(sample.position);
            if net.network_smoothing {
                self.visual.absorb(predicted, sample.position);
                debug!(error, "smoothed movement correction");
                Correction::Smoothed { error }
            } else {
                self.visual.clear();
                debug!(error, "snapped movement correction");
                Correction::Snapped { error }
            }
        };

        self.anchor = self.body.clone();
        self.reckoned = 0.0;
        if ahead > 0.0 {
            self.body.coast(ahead, tuning)?;
            self.reckoned = ahead;
        }
        Ok(outcome)
    }

    /// Authority handling of an accepted candidate: take it verbatim
    pub fn accept_authoritative(&mut self, sample: &MovementSample) {
        let decoded_yaw = yaw::decode(sample.yaw);
        if let Some(clock) = self.clock {
            self.last_correction_delta = sample.timestamp - clock;
        }
        self.clock = Some(sample.timestamp);
        self.body.vehicle.throttle = sample.throttle;
        self.body.vehicle.yaw = decoded_yaw;
        self.body.resolver.set_facing(facing_from_yaw(decoded_yaw));
        self.body.resolver.teleport(sample.position);
        self.replicated_yaw = decoded_yaw;
        self.replicated_location = sample.position;
        self.anchor = self.body.clone();
        self.reckoned = 0.0;
    }
}
