//! MPU-9250/9255 primary device driver.
//!
//! Initialization is a strictly ordered sequence; each step gets a fixed
//! settle delay because the hardware needs time to apply a configuration
//! before the next command. The stage reached is tracked so a partial
//! failure is queryable instead of silently ignored.

use crate::bus::{Bus, RegisterClient};
use crate::compass::Ak8963;
use crate::config::Config;
use crate::i2c::LinuxI2c;
use crate::registers::mpu9250 as reg;
use crate::scale;
use crate::{Error, Result};
use std::time::Duration;

const SETTLE: Duration = Duration::from_micros(10_000);
const SETTLE_LONG: Duration = Duration::from_micros(100_000);

/// How far initialization progressed. The sequence never reorders; a
/// failed step leaves the device at the last completed stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum InitStage {
    /// No initialization attempted yet.
    Cold,
    Reset,
    ClockConfigured,
    RangeConfigured,
    Awake,
    MagEnabled,
    Ready,
}

pub struct Mpu9250<B: Bus> {
    client: RegisterClient<B>,
    config: Config,
    accel_inv: f64,
    gyro_inv: f64,
    mag: Option<Ak8963<B>>,
    stage: InitStage,
}

impl Mpu9250<LinuxI2c> {
    /// Open the configured Linux I2C bus and bind both device addresses.
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let bus = LinuxI2c::open(&config.device, config.address)?;
        let mag_bus = if config.enable_mag {
            Some(LinuxI2c::open(&config.device, config.mag_address)?)
        } else {
            None
        };
        Self::with_bus(config, bus, mag_bus)
    }
}

impl<B: Bus> Mpu9250<B> {
    /// Build a driver over caller-supplied transports. `mag_bus` is the
    /// handle bound to the AK8963 address, if the magnetometer is wanted.
    pub fn with_bus(config: Config, bus: B, mag_bus: Option<B>) -> Result<Self> {
        config.validate()?;
        let accel_inv = scale::accel_scalar_inv(config.accel_fs, config.scale_values);
        let gyro_inv = scale::gyro_scalar_inv(config.gyro_fs, config.scale_values);
        let mag = mag_bus.map(|b| Ak8963::new(b, &config));
        Ok(Self {
            client: RegisterClient::new(bus),
            config,
            accel_inv,
            gyro_inv,
            mag,
            stage: InitStage::Cold,
        })
    }

    /// Run the full initialization sequence.
    ///
    /// Returns `Ok(true)` when the device identity checks out. An unknown
    /// identity yields `Ok(false)` without touching the magnetometer; a
    /// failed magnetometer bring-up only degrades (`motion9` reports
    /// zeros) and never fails the primary device. Transport errors abort
    /// with `Err` and leave [`stage`](Self::stage) at the point reached.
    pub fn initialize(&mut self) -> Result<bool> {
        log::info!("Initializing MPU-9250");
        self.reset()?;
        self.stage = InitStage::Reset;

        if self.config.has_sample_rate() {
            self.set_sample_rate(self.config.sample_rate.unwrap_or(0))?;
            std::thread::sleep(SETTLE_LONG);
        }
        if let Some(cfg) = self.config.dlpf_cfg {
            self.set_dlpf(cfg)?;
            std::thread::sleep(SETTLE_LONG);
        }
        if let Some(cfg) = self.config.accel_dlpf_cfg {
            self.set_accel_dlpf(cfg)?;
            std::thread::sleep(SETTLE_LONG);
        }

        self.set_clock_source(reg::CLOCK_PLL_XGYRO)?;
        std::thread::sleep(SETTLE);
        self.stage = InitStage::ClockConfigured;

        self.set_gyro_full_scale(self.config.gyro_fs)?;
        std::thread::sleep(SETTLE);
        self.set_accel_full_scale(self.config.accel_fs)?;
        std::thread::sleep(SETTLE);
        self.stage = InitStage::RangeConfigured;

        self.set_sleep_enabled(false)?;
        std::thread::sleep(SETTLE);
        self.stage = InitStage::Awake;

        if !self.test_device()? {
            log::warn!("WHO_AM_I mismatch, not an MPU-9250/9255");
            return Ok(false);
        }

        if self.config.enable_mag {
            log::info!("Enabling magnetometer");
            if self.enable_mag()? {
                self.stage = InitStage::MagEnabled;
            } else {
                log::warn!("Magnetometer unavailable, continuing without it");
            }
        }

        self.stage = InitStage::Ready;
        if self.config.debug {
            self.log_settings();
        }
        log::info!("MPU-9250 initialization complete");
        Ok(true)
    }

    /// Initialization stage reached so far.
    pub fn stage(&self) -> InitStage {
        self.stage
    }

    /// Pulse the device-reset bit and wait for the part to settle.
    pub fn reset(&mut self) -> Result<()> {
        self.client
            .write_bit(reg::RA_PWR_MGMT_1, reg::PWR1_DEVICE_RESET_BIT, 1)?;
        std::thread::sleep(SETTLE);
        log::debug!("MPU-9250 reset");
        Ok(())
    }

    /// Compare WHO_AM_I against the accepted id set (9250 and 9255
    /// revisions share the model line).
    pub fn test_device(&mut self) -> Result<bool> {
        let id = self.device_id()?;
        Ok(reg::ACCEPTED_DEVICE_IDS.contains(&id))
    }

    /// Route the auxiliary bus to the host and bring up the AK8963.
    ///
    /// Master mode off, bypass on, then the bypass bit is read back: only
    /// an observed bypass hands control to the magnetometer's own init.
    /// `Ok(false)` covers every non-transport failure.
    pub fn enable_mag(&mut self) -> Result<bool> {
        self.set_i2c_master_mode(false)?;
        std::thread::sleep(SETTLE_LONG);
        self.set_bypass(true)?;
        std::thread::sleep(SETTLE_LONG);

        if !self.bypass_enabled()? {
            log::warn!("Bypass bit not set after write; cannot reach AK8963");
            return Ok(false);
        }
        match self.mag.as_mut() {
            Some(mag) => mag.initialize(),
            None => {
                log::warn!("No magnetometer bus handle configured");
                Ok(false)
            }
        }
    }

    /// Magnetometer driver, when a handle was configured.
    pub fn mag(&mut self) -> Option<&mut Ak8963<B>> {
        self.mag.as_mut()
    }

    // -- Getters --

    pub fn device_id(&mut self) -> Result<u8> {
        self.client.read_byte(reg::WHO_AM_I)
    }

    /// Raw die temperature count.
    pub fn temperature_raw(&mut self) -> Result<i16> {
        let mut buf = [0u8; 2];
        self.client.read_bytes(reg::TEMP_OUT_H, &mut buf)?;
        Ok(scale::i16_be(&buf, 0))
    }

    /// Die temperature in °C; `None` when the sensor has no data yet.
    pub fn temperature_celsius(&mut self) -> Result<Option<f64>> {
        Ok(scale::temperature_celsius(self.temperature_raw()?))
    }

    /// Calibrated accelerometer triple in g.
    pub fn accel(&mut self) -> Result<[f64; 3]> {
        let mut buf = [0u8; 6];
        self.client.read_bytes(reg::ACCEL_XOUT_H, &mut buf)?;
        Ok(self.scale_accel_block(&buf))
    }

    /// Bias-corrected gyro triple in °/s.
    pub fn gyro(&mut self) -> Result<[f64; 3]> {
        let mut buf = [0u8; 6];
        self.client.read_bytes(reg::GYRO_XOUT_H, &mut buf)?;
        Ok(self.scale_gyro_block(&buf))
    }

    /// One-transaction accel + gyro sample, fully scaled.
    ///
    /// Reads the 14-byte block starting at ACCEL_XOUT_H; the temperature
    /// pair in the middle is skipped. Either every axis is scaled or the
    /// whole read fails — there is no partial output.
    pub fn motion6(&mut self) -> Result<[f64; 6]> {
        let mut buf = [0u8; 14];
        self.client.read_bytes(reg::ACCEL_XOUT_H, &mut buf)?;
        let a = self.scale_accel_block(&buf[0..6]);
        let g = self.scale_gyro_block(&buf[8..14]);
        Ok([a[0], a[1], a[2], g[0], g[1], g[2]])
    }

    /// `motion6` plus the magnetometer triple.
    ///
    /// When the magnetometer was never enabled or never came up, the last
    /// three elements are exactly `[0, 0, 0]` — degraded mode, not an
    /// error.
    pub fn motion9(&mut self) -> Result<[f64; 9]> {
        let m6 = self.motion6()?;
        let m = match self.mag.as_mut() {
            Some(mag) if mag.is_ready() => mag.mag()?,
            _ => [0.0, 0.0, 0.0],
        };
        Ok([
            m6[0], m6[1], m6[2], m6[3], m6[4], m6[5], m[0], m[1], m[2],
        ])
    }

    pub fn sleep_enabled(&mut self) -> Result<bool> {
        Ok(self
            .client
            .read_bit(reg::RA_PWR_MGMT_1, reg::PWR1_SLEEP_BIT)?
            == 1)
    }

    /// CLKSEL field of PWR_MGMT_1.
    pub fn clock_source(&mut self) -> Result<u8> {
        Ok(self.client.read_byte(reg::RA_PWR_MGMT_1)? & 0x07)
    }

    pub fn gyro_full_scale(&mut self) -> Result<u8> {
        Ok((self.client.read_byte(reg::RA_GYRO_CONFIG)? & 0x18) >> 3)
    }

    pub fn accel_full_scale(&mut self) -> Result<u8> {
        Ok((self.client.read_byte(reg::RA_ACCEL_CONFIG_1)? & 0x18) >> 3)
    }

    /// Per-axis gyro disable bits from PWR_MGMT_2 (1 = standby).
    pub fn gyro_power_settings(&mut self) -> Result<[u8; 3]> {
        let byte = self.client.read_byte(reg::RA_PWR_MGMT_2)? & 0x07;
        Ok([(byte >> 2) & 1, (byte >> 1) & 1, byte & 1])
    }

    /// Per-axis accel disable bits from PWR_MGMT_2 (1 = standby).
    pub fn accel_power_settings(&mut self) -> Result<[u8; 3]> {
        let byte = self.client.read_byte(reg::RA_PWR_MGMT_2)? & 0x38;
        Ok([(byte >> 5) & 1, (byte >> 4) & 1, (byte >> 3) & 1])
    }

    pub fn bypass_enabled(&mut self) -> Result<bool> {
        Ok(self
            .client
            .read_bit(reg::RA_INT_PIN_CFG, reg::INTCFG_BYPASS_EN_BIT)?
            == 1)
    }

    pub fn i2c_master_mode(&mut self) -> Result<bool> {
        Ok(self
            .client
            .read_bit(reg::RA_USER_CTRL, reg::USERCTRL_I2C_MST_EN_BIT)?
            == 1)
    }

    // -- Setters; each returns the value written --

    pub fn set_clock_source(&mut self, source: u8) -> Result<u8> {
        self.client.write_bits(
            reg::RA_PWR_MGMT_1,
            reg::PWR1_CLKSEL_BIT,
            reg::PWR1_CLKSEL_LENGTH,
            source,
        )?;
        log::debug!("Clock source set to 0x{:02x}", source);
        Ok(source)
    }

    /// Select the gyro full-scale range and cache the matching reciprocal
    /// for later scaling.
    pub fn set_gyro_full_scale(&mut self, fs: u8) -> Result<u8> {
        if fs > 3 {
            return Err(Error::InvalidFullScale {
                name: "gyro_fs",
                value: fs,
            });
        }
        self.gyro_inv = scale::gyro_scalar_inv(fs, self.config.scale_values);
        self.client.write_bits(
            reg::RA_GYRO_CONFIG,
            reg::GCONFIG_FS_SEL_BIT,
            reg::GCONFIG_FS_SEL_LENGTH,
            fs,
        )?;
        Ok(fs)
    }

    /// Select the accel full-scale range and cache the matching
    /// reciprocal.
    pub fn set_accel_full_scale(&mut self, fs: u8) -> Result<u8> {
        if fs > 3 {
            return Err(Error::InvalidFullScale {
                name: "accel_fs",
                value: fs,
            });
        }
        self.accel_inv = scale::accel_scalar_inv(fs, self.config.scale_values);
        self.client.write_bits(
            reg::RA_ACCEL_CONFIG_1,
            reg::ACONFIG_FS_SEL_BIT,
            reg::ACONFIG_FS_SEL_LENGTH,
            fs,
        )?;
        Ok(fs)
    }

    pub fn set_sleep_enabled(&mut self, enable: bool) -> Result<u8> {
        let val = enable as u8;
        self.client
            .write_bit(reg::RA_PWR_MGMT_1, reg::PWR1_SLEEP_BIT, val)?;
        Ok(val)
    }

    pub fn set_i2c_master_mode(&mut self, enable: bool) -> Result<u8> {
        let val = enable as u8;
        self.client
            .write_bit(reg::RA_USER_CTRL, reg::USERCTRL_I2C_MST_EN_BIT, val)?;
        Ok(val)
    }

    pub fn set_bypass(&mut self, enable: bool) -> Result<u8> {
        let val = enable as u8;
        self.client
            .write_bit(reg::RA_INT_PIN_CFG, reg::INTCFG_BYPASS_EN_BIT, val)?;
        Ok(val)
    }

    /// Gyro/temperature digital low-pass filter setting.
    pub fn set_dlpf(&mut self, cfg: u8) -> Result<u8> {
        self.client
            .write_bits(reg::RA_CONFIG, reg::DLPF_CFG_BIT, reg::DLPF_CFG_LENGTH, cfg)?;
        Ok(cfg)
    }

    /// Accelerometer digital low-pass filter setting.
    pub fn set_accel_dlpf(&mut self, cfg: u8) -> Result<u8> {
        self.client.write_bits(
            reg::RA_ACCEL_CONFIG_2,
            reg::A_DLPF_CFG_BIT,
            reg::A_DLPF_CFG_LENGTH,
            cfg,
        )?;
        Ok(cfg)
    }

    /// Program SMPLRT_DIV for the requested output rate in Hz.
    pub fn set_sample_rate(&mut self, rate: u32) -> Result<u32> {
        self.client
            .write_byte(reg::SMPLRT_DIV, smplrt_div_value(rate))?;
        Ok(rate)
    }

    /// Dump the live device configuration through `log`.
    pub fn log_settings(&mut self) {
        log::info!("MPU-9250:");
        log::info!("--> Device address: 0x{:02x}", self.config.address);
        match self.device_id() {
            Ok(id) => log::info!("--> Device ID: 0x{:02x}", id),
            Err(e) => log::warn!("--> Device ID unavailable: {}", e),
        }
        if let Ok(b) = self.bypass_enabled() {
            log::info!("--> Bypass enabled: {}", if b { "Yes" } else { "No" });
        }
        if let Ok(s) = self.sleep_enabled() {
            log::info!("--> Sleep mode: {}", if s { "On" } else { "Off" });
        }
        if let Ok(m) = self.i2c_master_mode() {
            log::info!("--> I2C master mode: {}", if m { "Enabled" } else { "Disabled" });
        }
        if let Ok(c) = self.clock_source() {
            log::info!("--> Clock source: 0x{:02x}", c);
        }
        if let Ok(fs) = self.accel_full_scale() {
            log::info!(
                "--> Accel range: {} (1/{} counts per g)",
                fs,
                reg::ACCEL_SCALE_FACTOR[fs as usize]
            );
        }
        if let Ok(fs) = self.gyro_full_scale() {
            log::info!(
                "--> Gyro range: {} (1/{} counts per deg/s)",
                fs,
                reg::GYRO_SCALE_FACTOR[fs as usize]
            );
        }
        let cal = &self.config.accel_calibration;
        log::info!(
            "--> Accel calibration: offset=({}, {}, {}) scale=({:?}, {:?}, {:?})",
            cal.offset.x,
            cal.offset.y,
            cal.offset.z,
            cal.scale.x,
            cal.scale.y,
            cal.scale.z
        );
        let bias = &self.config.gyro_bias_offset;
        log::info!("--> Gyro bias: ({}, {}, {})", bias.x, bias.y, bias.z);
        if let Some(mag) = self.mag.as_mut() {
            mag.log_settings();
        }
    }

    fn scale_accel_block(&self, buf: &[u8]) -> [f64; 3] {
        let cal = &self.config.accel_calibration;
        let x = scale::i16_be(buf, 0) as f64 * self.accel_inv;
        let y = scale::i16_be(buf, 2) as f64 * self.accel_inv;
        let z = scale::i16_be(buf, 4) as f64 * self.accel_inv;
        [
            scale::scale_accel(x, cal.offset.x, cal.scale.x),
            scale::scale_accel(y, cal.offset.y, cal.scale.y),
            scale::scale_accel(z, cal.offset.z, cal.scale.z),
        ]
    }

    fn scale_gyro_block(&self, buf: &[u8]) -> [f64; 3] {
        let bias = &self.config.gyro_bias_offset;
        [
            scale::i16_be(buf, 0) as f64 * self.gyro_inv + bias.x,
            scale::i16_be(buf, 2) as f64 * self.gyro_inv + bias.y,
            scale::i16_be(buf, 4) as f64 * self.gyro_inv + bias.z,
        ]
    }

    #[cfg(test)]
    pub(crate) fn bus(&self) -> &B {
        self.client.bus()
    }
}

/// Map a requested sample rate in Hz onto the SMPLRT_DIV register value.
pub(crate) fn smplrt_div_value(rate: u32) -> u8 {
    let rate = if (8000..reg::SAMPLERATE_MAX).contains(&rate) {
        8000
    } else if (1001..8000).contains(&rate) {
        1000
    } else {
        1000 / rate.saturating_add(1)
    };
    rate.min(255) as u8
}
