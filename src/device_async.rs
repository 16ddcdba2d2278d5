//! Async mirror of the MPU-9250 driver.
//!
//! Identical initialization sequence, stage tracking and scaling as
//! [`crate::device::Mpu9250`]; settle delays suspend the task through the
//! transport's `delay_us` instead of blocking the thread.

use crate::bus::{AsyncBus, AsyncRegisterClient};
use crate::compass_async::AsyncAk8963;
use crate::config::Config;
use crate::device::InitStage;
use crate::registers::mpu9250 as reg;
use crate::scale;
use crate::{Error, Result};

const SETTLE_US: u64 = 10_000;
const SETTLE_LONG_US: u64 = 100_000;

pub struct AsyncMpu9250<B: AsyncBus> {
    client: AsyncRegisterClient<B>,
    config: Config,
    accel_inv: f64,
    gyro_inv: f64,
    mag: Option<AsyncAk8963<B>>,
    stage: InitStage,
}

impl<B: AsyncBus> AsyncMpu9250<B> {
    /// Build a driver over caller-supplied transports; see
    /// [`Mpu9250::with_bus`](crate::device::Mpu9250::with_bus).
    pub fn with_bus(config: Config, bus: B, mag_bus: Option<B>) -> Result<Self> {
        config.validate()?;
        let accel_inv = scale::accel_scalar_inv(config.accel_fs, config.scale_values);
        let gyro_inv = scale::gyro_scalar_inv(config.gyro_fs, config.scale_values);
        let mag = mag_bus.map(|b| AsyncAk8963::new(b, &config));
        Ok(Self {
            client: AsyncRegisterClient::new(bus),
            config,
            accel_inv,
            gyro_inv,
            mag,
            stage: InitStage::Cold,
        })
    }

    /// Run the full initialization sequence; same contract as the
    /// blocking driver.
    pub async fn initialize(&mut self) -> Result<bool> {
        log::info!("Initializing MPU-9250");
        self.reset().await?;
        self.stage = InitStage::Reset;

        if self.config.has_sample_rate() {
            self.set_sample_rate(self.config.sample_rate.unwrap_or(0)).await?;
            self.client.delay_us(SETTLE_LONG_US).await;
        }
        if let Some(cfg) = self.config.dlpf_cfg {
            self.set_dlpf(cfg).await?;
            self.client.delay_us(SETTLE_LONG_US).await;
        }
        if let Some(cfg) = self.config.accel_dlpf_cfg {
            self.set_accel_dlpf(cfg).await?;
            self.client.delay_us(SETTLE_LONG_US).await;
        }

        self.set_clock_source(reg::CLOCK_PLL_XGYRO).await?;
        self.client.delay_us(SETTLE_US).await;
        self.stage = InitStage::ClockConfigured;

        self.set_gyro_full_scale(self.config.gyro_fs).await?;
        self.client.delay_us(SETTLE_US).await;
        self.set_accel_full_scale(self.config.accel_fs).await?;
        self.client.delay_us(SETTLE_US).await;
        self.stage = InitStage::RangeConfigured;

        self.set_sleep_enabled(false).await?;
        self.client.delay_us(SETTLE_US).await;
        self.stage = InitStage::Awake;

        if !self.test_device().await? {
            log::warn!("WHO_AM_I mismatch, not an MPU-9250/9255");
            return Ok(false);
        }

        if self.config.enable_mag {
            log::info!("Enabling magnetometer");
            if self.enable_mag().await? {
                self.stage = InitStage::MagEnabled;
            } else {
                log::warn!("Magnetometer unavailable, continuing without it");
            }
        }

        self.stage = InitStage::Ready;
        if self.config.debug {
            self.log_settings().await;
        }
        log::info!("MPU-9250 initialization complete");
        Ok(true)
    }

    /// Dump the live device configuration through `log`.
    pub async fn log_settings(&mut self) {
        log::info!("MPU-9250:");
        log::info!("--> Device address: 0x{:02x}", self.config.address);
        match self.device_id().await {
            Ok(id) => log::info!("--> Device ID: 0x{:02x}", id),
            Err(e) => log::warn!("--> Device ID unavailable: {}", e),
        }
        if let Ok(b) = self.bypass_enabled().await {
            log::info!("--> Bypass enabled: {}", if b { "Yes" } else { "No" });
        }
        if let Ok(s) = self.sleep_enabled().await {
            log::info!("--> Sleep mode: {}", if s { "On" } else { "Off" });
        }
        if let Ok(m) = self.i2c_master_mode().await {
            log::info!("--> I2C master mode: {}", if m { "Enabled" } else { "Disabled" });
        }
        if let Ok(c) = self.clock_source().await {
            log::info!("--> Clock source: 0x{:02x}", c);
        }
        if let Ok(fs) = self.accel_full_scale().await {
            log::info!(
                "--> Accel range: {} (1/{} counts per g)",
                fs,
                reg::ACCEL_SCALE_FACTOR[fs as usize]
            );
        }
        if let Ok(fs) = self.gyro_full_scale().await {
            log::info!(
                "--> Gyro range: {} (1/{} counts per deg/s)",
                fs,
                reg::GYRO_SCALE_FACTOR[fs as usize]
            );
        }
        let bias = &self.config.gyro_bias_offset;
        log::info!("--> Gyro bias: ({}, {}, {})", bias.x, bias.y, bias.z);
    }

    pub fn stage(&self) -> InitStage {
        self.stage
    }

    pub async fn reset(&mut self) -> Result<()> {
        self.client
            .write_bit(reg::RA_PWR_MGMT_1, reg::PWR1_DEVICE_RESET_BIT, 1)
            .await?;
        self.client.delay_us(SETTLE_US).await;
        log::debug!("MPU-9250 reset");
        Ok(())
    }

    pub async fn test_device(&mut self) -> Result<bool> {
        let id = self.device_id().await?;
        Ok(reg::ACCEPTED_DEVICE_IDS.contains(&id))
    }

    pub async fn enable_mag(&mut self) -> Result<bool> {
        self.set_i2c_master_mode(false).await?;
        self.client.delay_us(SETTLE_LONG_US).await;
        self.set_bypass(true).await?;
        self.client.delay_us(SETTLE_LONG_US).await;

        if !self.bypass_enabled().await? {
            log::warn!("Bypass bit not set after write; cannot reach AK8963");
            return Ok(false);
        }
        match self.mag.as_mut() {
            Some(mag) => mag.initialize().await,
            None => {
                log::warn!("No magnetometer bus handle configured");
                Ok(false)
            }
        }
    }

    pub fn mag(&mut self) -> Option<&mut AsyncAk8963<B>> {
        self.mag.as_mut()
    }

    pub async fn device_id(&mut self) -> Result<u8> {
        self.client.read_byte(reg::WHO_AM_I).await
    }

    pub async fn temperature_raw(&mut self) -> Result<i16> {
        let mut buf = [0u8; 2];
        self.client.read_bytes(reg::TEMP_OUT_H, &mut buf).await?;
        Ok(scale::i16_be(&buf, 0))
    }

    pub async fn temperature_celsius(&mut self) -> Result<Option<f64>> {
        Ok(scale::temperature_celsius(self.temperature_raw().await?))
    }

    pub async fn accel(&mut self) -> Result<[f64; 3]> {
        let mut buf = [0u8; 6];
        self.client.read_bytes(reg::ACCEL_XOUT_H, &mut buf).await?;
        Ok(self.scale_accel_block(&buf))
    }

    pub async fn gyro(&mut self) -> Result<[f64; 3]> {
        let mut buf = [0u8; 6];
        self.client.read_bytes(reg::GYRO_XOUT_H, &mut buf).await?;
        Ok(self.scale_gyro_block(&buf))
    }

    pub async fn motion6(&mut self) -> Result<[f64; 6]> {
        let mut buf = [0u8; 14];
        self.client.read_bytes(reg::ACCEL_XOUT_H, &mut buf).await?;
        let a = self.scale_accel_block(&buf[0..6]);
        let g = self.scale_gyro_block(&buf[8..14]);
        Ok([a[0], a[1], a[2], g[0], g[1], g[2]])
    }

    pub async fn motion9(&mut self) -> Result<[f64; 9]> {
        let m6 = self.motion6().await?;
        let m = match self.mag.as_mut() {
            Some(mag) if mag.is_ready() => mag.mag().await?,
            _ => [0.0, 0.0, 0.0],
        };
        Ok([
            m6[0], m6[1], m6[2], m6[3], m6[4], m6[5], m[0], m[1], m[2],
        ])
    }

    pub async fn sleep_enabled(&mut self) -> Result<bool> {
        Ok(self
            .client
            .read_bit(reg::RA_PWR_MGMT_1, reg::PWR1_SLEEP_BIT)
            .await?
            == 1)
    }

    /// CLKSEL field of PWR_MGMT_1.
    pub async fn clock_source(&mut self) -> Result<u8> {
        Ok(self.client.read_byte(reg::RA_PWR_MGMT_1).await? & 0x07)
    }

    pub async fn gyro_full_scale(&mut self) -> Result<u8> {
        Ok((self.client.read_byte(reg::RA_GYRO_CONFIG).await? & 0x18) >> 3)
    }

    pub async fn accel_full_scale(&mut self) -> Result<u8> {
        Ok((self.client.read_byte(reg::RA_ACCEL_CONFIG_1).await? & 0x18) >> 3)
    }

    /// Per-axis gyro disable bits from PWR_MGMT_2 (1 = standby).
    pub async fn gyro_power_settings(&mut self) -> Result<[u8; 3]> {
        let byte = self.client.read_byte(reg::RA_PWR_MGMT_2).await? & 0x07;
        Ok([(byte >> 2) & 1, (byte >> 1) & 1, byte & 1])
    }

    /// Per-axis accel disable bits from PWR_MGMT_2 (1 = standby).
    pub async fn accel_power_settings(&mut self) -> Result<[u8; 3]> {
        let byte = self.client.read_byte(reg::RA_PWR_MGMT_2).await? & 0x38;
        Ok([(byte >> 5) & 1, (byte >> 4) & 1, (byte >> 3) & 1])
    }

    pub async fn i2c_master_mode(&mut self) -> Result<bool> {
        Ok(self
            .client
            .read_bit(reg::RA_USER_CTRL, reg::USERCTRL_I2C_MST_EN_BIT)
            .await?
            == 1)
    }

    pub async fn bypass_enabled(&mut self) -> Result<bool> {
        Ok(self
            .client
            .read_bit(reg::RA_INT_PIN_CFG, reg::INTCFG_BYPASS_EN_BIT)
            .await?
            == 1)
    }

    pub async fn set_clock_source(&mut self, source: u8) -> Result<u8> {
        self.client
            .write_bits(
                reg::RA_PWR_MGMT_1,
                reg::PWR1_CLKSEL_BIT,
                reg::PWR1_CLKSEL_LENGTH,
                source,
            )
            .await?;
        Ok(source)
    }

    pub async fn set_gyro_full_scale(&mut self, fs: u8) -> Result<u8> {
        if fs > 3 {
            return Err(Error::InvalidFullScale {
                name: "gyro_fs",
                value: fs,
            });
        }
        self.gyro_inv = scale::gyro_scalar_inv(fs, self.config.scale_values);
        self.client
            .write_bits(
                reg::RA_GYRO_CONFIG,
                reg::GCONFIG_FS_SEL_BIT,
                reg::GCONFIG_FS_SEL_LENGTH,
                fs,
            )
            .await?;
        Ok(fs)
    }

    pub async fn set_accel_full_scale(&mut self, fs: u8) -> Result<u8> {
        if fs > 3 {
            return Err(Error::InvalidFullScale {
                name: "accel_fs",
                value: fs,
            });
        }
        self.accel_inv = scale::accel_scalar_inv(fs, self.config.scale_values);
        self.client
            .write_bits(
                reg::RA_ACCEL_CONFIG_1,
                reg::ACONFIG_FS_SEL_BIT,
                reg::ACONFIG_FS_SEL_LENGTH,
                fs,
            )
            .await?;
        Ok(fs)
    }

    pub async fn set_sleep_enabled(&mut self, enable: bool) -> Result<u8> {
        let val = enable as u8;
        self.client
            .write_bit(reg::RA_PWR_MGMT_1, reg::PWR1_SLEEP_BIT, val)
            .await?;
        Ok(val)
    }

    pub async fn set_i2c_master_mode(&mut self, enable: bool) -> Result<u8> {
        let val = enable as u8;
        self.client
            .write_bit(reg::RA_USER_CTRL, reg::USERCTRL_I2C_MST_EN_BIT, val)
            .await?;
        Ok(val)
    }

    pub async fn set_bypass(&mut self, enable: bool) -> Result<u8> {
        let val = enable as u8;
        self.client
            .write_bit(reg::RA_INT_PIN_CFG, reg::INTCFG_BYPASS_EN_BIT, val)
            .await?;
        Ok(val)
    }

    pub async fn set_dlpf(&mut self, cfg: u8) -> Result<u8> {
        self.client
            .write_bits(reg::RA_CONFIG, reg::DLPF_CFG_BIT, reg::DLPF_CFG_LENGTH, cfg)
            .await?;
        Ok(cfg)
    }

    pub async fn set_accel_dlpf(&mut self, cfg: u8) -> Result<u8> {
        self.client
            .write_bits(
                reg::RA_ACCEL_CONFIG_2,
                reg::A_DLPF_CFG_BIT,
                reg::A_DLPF_CFG_LENGTH,
                cfg,
            )
            .await?;
        Ok(cfg)
    }

    pub async fn set_sample_rate(&mut self, rate: u32) -> Result<u32> {
        self.client
            .write_byte(reg::SMPLRT_DIV, crate::device::smplrt_div_value(rate))
            .await?;
        Ok(rate)
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::MockBus;
    use crate::registers::ak8963;

    fn ready_bus() -> MockBus {
        let mut bus = MockBus::new();
        bus.set(reg::WHO_AM_I, 0x71);
        bus
    }

    #[tokio::test]
    async fn initialize_reaches_ready() {
        let mut dev = AsyncMpu9250::with_bus(Config::default(), ready_bus(), None).unwrap();
        assert!(dev.initialize().await.unwrap());
        assert_eq!(dev.stage(), InitStage::Ready);
    }

    #[tokio::test]
    async fn unknown_id_returns_false() {
        let mut bus = MockBus::new();
        bus.set(reg::WHO_AM_I, 0x68);
        let mut dev = AsyncMpu9250::with_bus(Config::default(), bus, None).unwrap();
        assert!(!dev.initialize().await.unwrap());
        assert!(dev.stage() < InitStage::Ready);
    }

    #[tokio::test]
    async fn motion9_with_magnetometer() {
        let mut mag_bus = MockBus::new();
        mag_bus.set(ak8963::WHO_AM_I, ak8963::WHO_AM_I_RESPONSE);
        mag_bus
            .set_i16_le(ak8963::XOUT_L, 25)
            .set_i16_le(ak8963::XOUT_L + 2, -30)
            .set_i16_le(ak8963::XOUT_L + 4, 7);
        let config = Config {
            enable_mag: true,
            ..Config::default()
        };
        let mut dev = AsyncMpu9250::with_bus(config, ready_bus(), Some(mag_bus)).unwrap();
        assert!(dev.initialize().await.unwrap());
        let m9 = dev.motion9().await.unwrap();
        assert_eq!(&m9[6..], &[25.0, -30.0, 7.0]);
    }

    #[tokio::test]
    async fn motion6_scaling_matches_blocking_driver() {
        let mut bus = ready_bus();
        bus.set_i16_be(reg::ACCEL_XOUT_H, 16384)
            .set_i16_be(reg::GYRO_XOUT_H, 131);
        let config = Config {
            scale_values: true,
            gyro_fs: 0,
            accel_fs: 0,
            ..Config::default()
        };
        let mut dev = AsyncMpu9250::with_bus(config, bus, None).unwrap();
        dev.initialize().await.unwrap();
        let m = dev.motion6().await.unwrap();
        assert!((m[0] - 1.0).abs() < 1e-9);
        assert!((m[3] - 1.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn getters_report_initialized_state() {
        let mut bus = ready_bus();
        // X accel and Y gyro axes in standby.
        bus.set(reg::RA_PWR_MGMT_2, 0b0010_0010);
        let mut dev = AsyncMpu9250::with_bus(Config::default(), bus, None).unwrap();
        dev.initialize().await.unwrap();
        assert_eq!(dev.clock_source().await.unwrap(), reg::CLOCK_PLL_XGYRO);
        assert_eq!(dev.gyro_full_scale().await.unwrap(), 0);
        assert_eq!(dev.accel_full_scale().await.unwrap(), 2);
        assert!(!dev.i2c_master_mode().await.unwrap());
        assert_eq!(dev.accel_power_settings().await.unwrap(), [1, 0, 0]);
        assert_eq!(dev.gyro_power_settings().await.unwrap(), [0, 1, 0]);
    }

    #[tokio::test]
    async fn debug_config_dumps_settings_during_initialize() {
        let config = Config {
            debug: true,
            ..Config::default()
        };
        let mut dev = AsyncMpu9250::with_bus(config, ready_bus(), None).unwrap();
        assert!(dev.initialize().await.unwrap());
        assert_eq!(dev.stage(), InitStage::Ready);
    }

    #[tokio::test]
    async fn temperature_mirrors_blocking_semantics() {
        let mut bus = ready_bus();
        bus.set_i16_be(reg::TEMP_OUT_H, 3339);
        let mut dev = AsyncMpu9250::with_bus(Config::default(), bus, None).unwrap();
        let t = dev.temperature_celsius().await.unwrap().unwrap();
        assert!((t - (3339.0 / 333.87 + 21.0)).abs() < 1e-9);
    }
}
