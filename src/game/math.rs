//! Small math helpers shared by the simulation modules

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Euler facing in degrees (pitch, yaw, roll), Z up
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotator {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Rotator {
    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Facing with only a heading component
    pub fn from_yaw(yaw: f32) -> Self {
        Self::new(0.0, yaw, 0.0)
    }

    /// Unit direction this rotator points along
    pub fn direction(&self) -> Vec3 {
        let (sp, cp) = self.pitch.to_radians().sin_cos();
        let (sy, cy) = self.yaw.to_radians().sin_cos();
        Vec3::new(cp * cy, cp * sy, sp)
    }

    /// Rotate only the heading by `delta_yaw` degrees
    pub fn with_yaw_offset(self, delta_yaw: f32) -> Self {
        Self {
            yaw: self.yaw + delta_yaw,
            ..self
        }
    }
}

/// Forward unit vector on the ground plane for a heading in degrees
pub fn forward_from_yaw(yaw_degrees: f32) -> Vec3 {
    let (s, c) = yaw_degrees.to_radians().sin_cos();
    Vec3::new(c, s, 0.0)
}

/// Heading of a direction vector, in degrees
pub fn yaw_of(direction: Vec3) -> f32 {
    direction.y.atan2(direction.x).to_degrees()
}

/// Facing quaternion about the up axis
pub fn facing_from_yaw(yaw_degrees: f32) -> Quat {
    Quat::from_axis_angle(Vec3::Z, yaw_degrees.to_radians())
}

/// Heading in degrees of a facing quaternion
pub fn yaw_from_facing(facing: Quat) -> f32 {
    yaw_of(facing * Vec3::X)
}

/// Ease-out interpolation from `a` to `b`: fast start, slow finish
pub fn interp_ease_out(a: f32, b: f32, alpha: f32, exponent: f32) -> f32 {
    let alpha = alpha.clamp(0.0, 1.0);
    let eased = 1.0 - (1.0 - alpha).powf(exponent);
    a + (b - a) * eased
}

/// Signed shortest rotation from heading `a` to heading `b`, in `(-180, 180]`
pub fn find_delta_angle_degrees(a: f32, b: f32) -> f32 {
    let mut delta = (b - a).rem_euclid(360.0);
    if delta > 180.0 {
        delta -= 360.0;
    }
    delta
}

/// Value in `[0, 1]` pulsing `pulses_per_second` times a second
pub fn pulsating_value(time: f32, pulses_per_second: f32) -> f32 {
    0.5 + 0.5 * ((0.25 + time * pulses_per_second) * std::f32::consts::TAU).sin()
}
