//! Vehicle movement prediction and the movement-resolution seam

use glam::{Quat, Vec3};

use crate::config::MovementSettings;

use super::math::{facing_from_yaw, interp_ease_out};
use super::SimError;

/// Exponent of the speed-to-turn-rate ease curve
pub const TURN_EASE_EXPONENT: f32 = 5.0;

/// Fraction of top speed at which full turn authority is reached
pub const TURN_SPEED_FRACTION: f32 = 0.75;

/// Collision and gravity primitive the predictor drives with desired deltas.
///
/// Implementations own the body's pose; the predictor never writes the
/// position directly, it only submits a per-tick displacement.
pub trait MovementResolver {
    /// Accumulate this frame's gravity, applied on the next `move_by`
    fn apply_gravity(&mut self, dt: f32, gravity: f32);
    /// Apply a displacement and return the resolved position
    fn move_by(&mut self, delta: Vec3) -> Vec3;
    fn position(&self) -> Vec3;
    /// Place the body without sweeping (network corrections)
    fn teleport(&mut self, position: Vec3);
    fn facing(&self) -> Quat;
    fn set_facing(&mut self, facing: Quat);
}

/// Flat infinite ground at a fixed height
#[derive(Debug, Clone)]
pub struct GroundPlane {
    position: Vec3,
    facing: Quat,
    ground_height: f32,
    vertical_speed: f32,
    pending_fall: f32,
}

impl GroundPlane {
    pub fn new(position: Vec3, yaw: f32) -> Self {
        Self {
            position,
            facing: facing_from_yaw(yaw),
            ground_height: 0.0,
            vertical_speed: 0.0,
            pending_fall: 0.0,
        }
    }

    pub fn with_ground_height(mut self, height: f32) -> Self {
        self.ground_height = height;
        self
    }

    fn grounded(&self) -> bool {
        self.position.z <= self.ground_height && self.vertical_speed >= 0.0
    }
}

impl MovementResolver for GroundPlane {
    fn apply_gravity(&mut self, dt: f32, gravity: f32) {
        if self.grounded() {
            return;
        }
        self.vertical_speed -= gravity * dt;
        self.pending_fall += self.vertical_speed * dt;
    }

    fn move_by(&mut self, delta: Vec3) -> Vec3 {
        self.position += delta + Vec3::Z * self.pending_fall;
        self.pending_fall = 0.0;
        if self.position.z <= self.ground_height {
            self.position.z = self.ground_height;
            self.vertical_speed = 0.0;
        }
        self.position
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn teleport(&mut self, position: Vec3) {
        self.position = position;
        self.pending_fall = 0.0;
    }

    fn facing(&self) -> Quat {
        self.facing
    }

    fn set_facing(&mut self, facing: Quat) {
        self.facing = facing;
    }
}

/// Input and motion state of one vehicle
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vehicle {
    /// Longitudinal input in `[-1, 1]`
    pub throttle: f32,
    /// Steering input in `[-1, 1]`
    pub steer: f32,
    pub braking: bool,
    /// Signed forward speed
    pub speed: f32,
    /// Heading in degrees; an unbounded accumulator
    pub yaw: f32,
}

impl Vehicle {
    pub fn new(yaw: f32) -> Self {
        Self {
            yaw,
            ..Self::default()
        }
    }

    /// Turn rate for the current speed: none at rest, full authority from
    /// three quarters of top speed upwards
    pub fn turn_rate(&self, tuning: &MovementSettings) -> f32 {
        let alpha = (self.speed / (tuning.max_velocity * TURN_SPEED_FRACTION))
            .abs()
            .clamp(0.0, 1.0);
        interp_ease_out(0.0, tuning.turn_speed_default, alpha, TURN_EASE_EXPONENT)
    }

    fn friction(&self, tuning: &MovementSettings) -> f32 {
        if self.braking {
            tuning.braking_friction
        } else {
            tuning.default_friction
        }
    }

    /// Throttle, clamp, then frame-rate independent friction decay
    pub fn integrate_speed(&mut self, dt: f32, tuning: &MovementSettings) {
        self.speed += self.throttle * tuning.acceleration * dt;
        self.speed = self.speed.clamp(-tuning.max_velocity, tuning.max_velocity);
        self.speed *= self.friction(tuning).powf(dt);
    }

    /// Full predictor step for a locally controlled vehicle.
    /// Returns the resolved position.
    pub fn drive<R: MovementResolver>(
        &mut self,
        dt: f32,
        tuning: &MovementSettings,
        resolver: &mut R,
    ) -> Result<Vec3, SimError> {
        check_step(dt, tuning)?;

        // Steering follows the direction of travel when reversing
        let turn_rate = self.turn_rate(tuning);
        let direction = if self.speed > 0.0 { self.steer } else { -self.steer };
        self.yaw += direction * turn_rate * dt;
        resolver.set_facing(facing_from_yaw(self.yaw));

        self.integrate_speed(dt, tuning);
        Ok(self.displace(dt, tuning, resolver))
    }

    /// Dead-reckoning step for a vehicle steered elsewhere: heading is left
    /// to the network, only speed and displacement advance
    pub fn coast<R: MovementResolver>(
        &mut self,
        dt: f32,
        tuning: &MovementSettings,
        resolver: &mut R,
    ) -> Result<Vec3, SimError> {
        check_step(dt, tuning)?;
        resolver.set_facing(facing_from_yaw(self.yaw));
        self.integrate_speed(dt, tuning);
        Ok(self.displace(dt, tuning, resolver))
    }

    fn displace<R: MovementResolver>(
        &self,
        dt: f32,
        tuning: &MovementSettings,
        resolver: &mut R,
    ) -> Vec3 {
        resolver.apply_gravity(dt, tuning.gravity);
        let forward = resolver.facing() * Vec3::X;
        resolver.move_by(forward * self.speed * dt)
    }
}

fn check_step(dt: f32, tuning: &MovementSettings) -> Result<(), SimError> {
    if !dt.is_finite() || dt < 0.0 {
        return Err(SimError::InvalidDelta(dt));
    }
    if !(tuning.max_velocity > 0.0) || !tuning.max_velocity.is_finite() {
        return Err(SimError::InvalidTuning("max_velocity"));
    }
    Ok(())
}

/// A vehicle together with the primitive that resolves its moves
#[derive(Debug, Clone)]
pub struct Body<R: MovementResolver = GroundPlane> {
    pub vehicle: Vehicle,
    pub resolver: R,
}

impl Body<GroundPlane> {
    /// Vehicle at rest on the ground plane
    pub fn spawn(position: Vec3, yaw: f32) -> Self {
        Self {
            vehicle: Vehicle::new(yaw),
            resolver: GroundPlane::new(position, yaw),
        }
    }
}

impl<R: MovementResolver> Body<R> {
    pub fn position(&self) -> Vec3 {
        self.resolver.position()
    }

    pub fn forward(&self) -> Vec3 {
        self.resolver.facing() * Vec3::X
    }

    pub fn drive(&mut self, dt: f32, tuning: &MovementSettings) -> Result<Vec3, SimError> {
        self.vehicle.drive(dt, tuning, &mut self.resolver)
    }

    pub fn coast(&mut self, dt: f32, tuning: &MovementSettings) -> Result<Vec3, SimError> {
        self.vehicle.coast(dt, tuning, &mut self.resolver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> MovementSettings {
        MovementSettings::default()
    }

    #[test]
    fn speed_never_exceeds_max() {
        let tuning = tuning();
        let mut body = Body::spawn(Vec3::ZERO, 0.0);
        let throttles = [1.0, 1.0, -1.0, 0.3, 1.0, -0.7, 0.0, 1.0];
        for i in 0..2_000 {
            body.vehicle.throttle = throttles[i % throttles.len()];
            body.vehicle.steer = if i % 3 == 0 { 1.0 } else { -0.5 };
            body.vehicle.braking = i % 97 == 0;
            let dt = if i % 5 == 0 { 0.1 } else { 1.0 / 60.0 };
            body.drive(dt, &tuning).unwrap();
            assert!(body.vehicle.speed.abs() <= tuning.max_velocity);
        }
    }

    #[test]
    fn zero_throttle_decays_exponentially_without_reversing() {
        let tuning = tuning();
        let mut vehicle = Vehicle::new(0.0);
        vehicle.speed = 1000.0;
        let mut plane = GroundPlane::new(Vec3::ZERO, 0.0);

        let dt = 1.0 / 60.0;
        for _ in 0..120 {
            vehicle.coast(dt, &tuning, &mut plane).unwrap();
            assert!(vehicle.speed > 0.0);
        }
        let expected = 1000.0 * tuning.default_friction.powf(2.0);
        assert!((vehicle.speed - expected).abs() < 0.5, "{} vs {}", vehicle.speed, expected);
    }

    #[test]
    fn no_turning_at_rest() {
        let tuning = tuning();
        let mut body = Body::spawn(Vec3::ZERO, 30.0);
        body.vehicle.steer = 1.0;
        body.drive(0.5, &tuning).unwrap();
        assert_eq!(body.vehicle.yaw, 30.0);
    }

    #[test]
    fn steering_flips_when_reversing() {
        let tuning = tuning();
        let mut forward = Vehicle::new(0.0);
        forward.speed = 1000.0;
        forward.steer = 1.0;
        let mut reverse = forward;
        reverse.speed = -1000.0;

        let mut plane = GroundPlane::new(Vec3::ZERO, 0.0);
        forward.drive(0.1, &tuning, &mut plane).unwrap();
        reverse.drive(0.1, &tuning, &mut plane).unwrap();

        assert!(forward.yaw > 0.0);
        assert!(reverse.yaw < 0.0);
    }

    #[test]
    fn drive_moves_along_heading() {
        let tuning = tuning();
        let mut body = Body::spawn(Vec3::ZERO, 90.0);
        body.vehicle.throttle = 1.0;
        for _ in 0..30 {
            body.drive(1.0 / 60.0, &tuning).unwrap();
        }
        let pos = body.position();
        assert!(pos.y > 0.0);
        assert!(pos.x.abs() < 1e-2);
    }

    #[test]
    fn airborne_body_falls_to_ground() {
        let tuning = tuning();
        let mut body = Body {
            vehicle: Vehicle::new(0.0),
            resolver: GroundPlane::new(Vec3::new(0.0, 0.0, 200.0), 0.0),
        };
        for _ in 0..240 {
            body.coast(1.0 / 60.0, &tuning).unwrap();
        }
        assert_eq!(body.position().z, 0.0);
    }

    #[test]
    fn invalid_step_is_reported() {
        let mut tuning = tuning();
        let mut body = Body::spawn(Vec3::ZERO, 0.0);
        assert!(matches!(body.drive(f32::NAN, &tuning), Err(SimError::InvalidDelta(_))));
        tuning.max_velocity = 0.0;
        assert!(matches!(body.drive(0.1, &tuning), Err(SimError::InvalidTuning(_))));
    }
}
