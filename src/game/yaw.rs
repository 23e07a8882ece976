//! Single-byte heading quantization for the movement channel

/// Angular resolution of one quantization step, in degrees
pub const YAW_STEP_DEGREES: f32 = 360.0 / 256.0;

/// Quantize a heading in degrees to one byte.
///
/// Any real input is accepted: the result wraps modulo 256, so headings
/// outside `[0, 360)` (the movement accumulator is unbounded) and negative
/// headings land on the same byte as their wrapped equivalent.
pub fn encode(angle_degrees: f32) -> u8 {
    if !angle_degrees.is_finite() {
        return 0;
    }
    let steps = (angle_degrees * 256.0 / 360.0).round();
    (steps as i64).rem_euclid(256) as u8
}

/// Expand a quantized heading back to degrees in `[0, 360)`
pub fn decode(byte: u8) -> f32 {
    byte as f32 * 360.0 / 256.0
}

/// Smallest angular distance between two headings, in degrees
pub fn angular_distance(a: f32, b: f32) -> f32 {
    let d = (a - b).rem_euclid(360.0);
    d.min(360.0 - d)
}
