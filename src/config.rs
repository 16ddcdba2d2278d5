//! Driver configuration and calibration value types.
//!
//! Calibration outputs serialize to the same shape they are consumed in, so
//! a run of the calibration demos can be pasted straight back into the
//! configuration for the next run. `#[serde(default)]` merges documented
//! defaults beneath whatever the caller supplies.

use crate::registers::{ak8963, mpu9250};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Per-axis triple used for offsets, biases and mag scale factors.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f64; 3]> for Vec3 {
    fn from(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Accelerometer two-sided calibration: a measured near-zero offset per axis
/// and the `[negative extreme, positive extreme]` readings per axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccelCalibration {
    #[serde(default)]
    pub offset: Vec3,
    #[serde(default = "AxisScale::default")]
    pub scale: AxisScale,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisScale {
    pub x: [f64; 2],
    pub y: [f64; 2],
    pub z: [f64; 2],
}

impl Default for AxisScale {
    fn default() -> Self {
        Self {
            x: [-1.0, 1.0],
            y: [-1.0, 1.0],
            z: [-1.0, 1.0],
        }
    }
}

impl Default for AccelCalibration {
    fn default() -> Self {
        Self {
            offset: Vec3::default(),
            scale: AxisScale::default(),
        }
    }
}

/// Magnetometer hard-iron offset and per-axis sphere-correction scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagCalibration {
    #[serde(default)]
    pub offset: Vec3,
    #[serde(default = "MagCalibration::unit_scale")]
    pub scale: Vec3,
}

impl MagCalibration {
    fn unit_scale() -> Vec3 {
        Vec3::new(1.0, 1.0, 1.0)
    }
}

impl Default for MagCalibration {
    fn default() -> Self {
        Self {
            offset: Vec3::default(),
            scale: Self::unit_scale(),
        }
    }
}

/// Driver configuration.
///
/// Unspecified options take the documented defaults; `device` must name a
/// bus path or construction fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bus path, e.g. `/dev/i2c-1`.
    pub device: String,
    /// Primary device address (0x68 with AD0 low).
    pub address: u16,
    /// AK8963 magnetometer address, reachable once bypass mode is on.
    pub mag_address: u16,
    /// Bring up the magnetometer during initialization.
    pub enable_mag: bool,
    /// Emit a settings dump through `log` after initialization.
    pub debug: bool,
    /// Convert raw counts to physical units; when false every scale
    /// reciprocal and sensitivity factor is 1 and reads stay in counts.
    pub scale_values: bool,
    /// Gyro full-scale index: 0=±250, 1=±500, 2=±1000, 3=±2000 °/s.
    pub gyro_fs: u8,
    /// Accel full-scale index: 0=±2g, 1=±4g, 2=±8g, 3=±16g.
    pub accel_fs: u8,
    /// Additive per-axis gyro bias, in output units (see `calibrate`).
    pub gyro_bias_offset: Vec3,
    pub accel_calibration: AccelCalibration,
    pub mag_calibration: MagCalibration,
    /// Sample rate in Hz written to SMPLRT_DIV when within device bounds.
    pub sample_rate: Option<u32>,
    /// Gyro/temp digital low-pass filter setting (CONFIG register).
    pub dlpf_cfg: Option<u8>,
    /// Accelerometer digital low-pass filter setting (ACCEL_CONFIG_2).
    pub accel_dlpf_cfg: Option<u8>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: "/dev/i2c-1".to_string(),
            address: mpu9250::I2C_ADDRESS_AD0_LOW,
            mag_address: ak8963::ADDRESS,
            enable_mag: false,
            debug: false,
            scale_values: false,
            gyro_fs: 0,
            accel_fs: 2,
            gyro_bias_offset: Vec3::default(),
            accel_calibration: AccelCalibration::default(),
            mag_calibration: MagCalibration::default(),
            sample_rate: None,
            dlpf_cfg: None,
            accel_dlpf_cfg: None,
        }
    }
}

impl Config {
    /// Check the required fields. Fatal at construction, never retried.
    pub fn validate(&self) -> Result<()> {
        if self.device.is_empty() {
            return Err(Error::MissingDevice);
        }
        if self.gyro_fs > 3 {
            return Err(Error::InvalidFullScale {
                name: "gyro_fs",
                value: self.gyro_fs,
            });
        }
        if self.accel_fs > 3 {
            return Err(Error::InvalidFullScale {
                name: "accel_fs",
                value: self.accel_fs,
            });
        }
        Ok(())
    }

    /// Whether `sample_rate` is set and within the device's divider range.
    pub fn has_sample_rate(&self) -> bool {
        self.sample_rate
            .map(|r| r > mpu9250::SAMPLERATE_MIN && r < mpu9250::SAMPLERATE_MAX)
            .unwrap_or(false)
    }
}
