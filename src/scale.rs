//! Pure conversions from raw register counts to physical units.
//!
//! Nothing in this module touches the bus; every function is a
//! deterministic map from raw values and calibration constants to doubles.

use crate::registers::mpu9250;

/// Decode a big-endian i16 pair (primary device sample format).
pub fn i16_be(buf: &[u8], offset: usize) -> i16 {
    i16::from_be_bytes([buf[offset], buf[offset + 1]])
}

/// Decode a little-endian i16 pair (AK8963 sample format).
///
/// The two devices disagree on byte order; the decode paths are kept
/// separate on purpose.
pub fn i16_le(buf: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([buf[offset], buf[offset + 1]])
}

/// Reciprocal of the accelerometer counts-per-g factor for a full-scale
/// index, or 1 when raw counts are requested.
pub fn accel_scalar_inv(fs: u8, scale_values: bool) -> f64 {
    if scale_values {
        1.0 / mpu9250::ACCEL_SCALE_FACTOR[fs as usize]
    } else {
        1.0
    }
}

/// Reciprocal of the gyro counts-per-°/s factor for a full-scale index,
/// or 1 when raw counts are requested.
pub fn gyro_scalar_inv(fs: u8, scale_values: bool) -> f64 {
    if scale_values {
        1.0 / mpu9250::GYRO_SCALE_FACTOR[fs as usize]
    } else {
        1.0
    }
}

/// Two-sided linear accelerometer calibration.
///
/// Anchored at the measured `offset` (reading with the axis horizontal)
/// and the measured extremes `scale = [down, up]`; output hits exactly
/// -1.0 at the negative extreme and +1.0 at the positive one.
pub fn scale_accel(val: f64, offset: f64, scale: [f64; 2]) -> f64 {
    if val < 0.0 {
        -(val - offset) / (scale[0] - offset)
    } else {
        (val - offset) / (scale[1] - offset)
    }
}

/// AK8963 fuse-ROM sensitivity adjustment: `((asa - 128) * 0.5 / 128) + 1`.
pub fn sensitivity_adjustment(fuse: u8) -> f64 {
    ((fuse as f64 - 128.0) * 0.5 / 128.0) + 1.0
}

/// Die temperature in °C, or `None` when the sensor was never read
/// (a raw count of zero is the no-data marker, not a valid reading).
pub fn temperature_celsius(raw: i16) -> Option<f64> {
    if raw == 0 {
        None
    } else {
        Some(raw as f64 / mpu9250::TEMP_SENSITIVITY + mpu9250::TEMP_OFFSET_CELSIUS)
    }
}

/// Pitch in degrees from a scaled accelerometer triple.
pub fn pitch(accel: [f64; 3]) -> f64 {
    (accel[0].atan2(accel[2]) + std::f64::consts::PI).to_degrees() - 180.0
}

/// Roll in degrees from a scaled accelerometer triple.
pub fn roll(accel: [f64; 3]) -> f64 {
    (accel[1].atan2(accel[2]) + std::f64::consts::PI).to_degrees() - 180.0
}
