//! Async mirror of the AK8963 driver.
//!
//! Same register traffic and semantics as [`crate::compass::Ak8963`];
//! settle delays go through the transport's `delay_us` so nothing blocks
//! the executor.

use crate::bus::{AsyncBus, AsyncRegisterClient};
use crate::config::{Config, MagCalibration};
use crate::registers::{ak8963, MagStatus2};
use crate::scale;
use crate::Result;

const SETTLE_US: u64 = 10_000;

pub struct AsyncAk8963<B: AsyncBus> {
    client: AsyncRegisterClient<B>,
    cal: MagCalibration,
    scale_values: bool,
    asa: [f64; 3],
    ready: bool,
}

impl<B: AsyncBus> AsyncAk8963<B> {
    pub fn new(bus: B, config: &Config) -> Self {
        Self {
            client: AsyncRegisterClient::new(bus),
            cal: config.mag_calibration,
            scale_values: config.scale_values,
            asa: [1.0; 3],
            ready: false,
        }
    }

    /// Bring the magnetometer into continuous measurement mode.
    pub async fn initialize(&mut self) -> Result<bool> {
        if self.ready {
            return Ok(true);
        }
        self.client.delay_us(SETTLE_US).await;
        let id = self.device_id().await?;
        if id != ak8963::WHO_AM_I_RESPONSE {
            log::warn!(
                "AK8963 device id is 0x{:02x}, expected 0x{:02x}",
                id,
                ak8963::WHO_AM_I_RESPONSE
            );
            return Ok(false);
        }
        log::info!("AK8963: configuring magnetometer");
        self.read_sensitivity_adjustment().await?;
        self.client.delay_us(SETTLE_US).await;
        self.set_mode(ak8963::CNTL_MODE_CONTINUE_MEASURE_2).await?;
        self.client.delay_us(SETTLE_US).await;
        self.ready = true;
        Ok(true)
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub async fn device_id(&mut self) -> Result<u8> {
        self.client.read_byte(ak8963::WHO_AM_I).await
    }

    pub async fn data_ready(&mut self) -> Result<bool> {
        Ok(self.client.read_bit(ak8963::ST1, ak8963::ST1_DRDY_BIT).await? == 1)
    }

    pub async fn mode(&mut self) -> Result<u8> {
        Ok(self.client.read_byte(ak8963::CNTL).await? & 0x0F)
    }

    pub async fn set_mode(&mut self, mode: u8) -> Result<u8> {
        self.client.write_byte(ak8963::CNTL, mode).await?;
        Ok(mode)
    }

    pub fn sensitivity(&self) -> [f64; 3] {
        self.asa
    }

    async fn read_sensitivity_adjustment(&mut self) -> Result<()> {
        if !self.scale_values {
            self.asa = [1.0; 3];
            return Ok(());
        }

        let previous = self.mode().await?;
        self.set_mode(ak8963::CNTL_MODE_FUSE_ROM_ACCESS).await?;
        self.client.delay_us(SETTLE_US).await;

        self.asa = [
            scale::sensitivity_adjustment(self.client.read_byte(ak8963::ASAX).await?),
            scale::sensitivity_adjustment(self.client.read_byte(ak8963::ASAY).await?),
            scale::sensitivity_adjustment(self.client.read_byte(ak8963::ASAZ).await?),
        ];

        self.set_mode(previous).await?;
        Ok(())
    }

    /// Calibrated field vector; overflow yields the `[0, 0, 0]` sentinel.
    pub async fn mag(&mut self) -> Result<[f64; 3]> {
        let mut buf = [0u8; 7];
        self.client.read_bytes(ak8963::XOUT_L, &mut buf).await?;

        let st2 = MagStatus2::from_bits_truncate(buf[6]);
        if st2.contains(MagStatus2::HOFL) {
            log::debug!("AK8963 overflow, dropping sample");
            return Ok([0.0, 0.0, 0.0]);
        }

        let cal = &self.cal;
        Ok([
            (scale::i16_le(&buf, 0) as f64 * self.asa[0] - cal.offset.x) * cal.scale.x,
            (scale::i16_le(&buf, 2) as f64 * self.asa[1] - cal.offset.y) * cal.scale.y,
            (scale::i16_le(&buf, 4) as f64 * self.asa[2] - cal.offset.z) * cal.scale.z,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::MockBus;

    fn responding_bus() -> MockBus {
        let mut bus = MockBus::new();
        bus.set(ak8963::WHO_AM_I, ak8963::WHO_AM_I_RESPONSE);
        bus
    }

    #[tokio::test]
    async fn initialize_and_read_match_blocking_driver() {
        let mut bus = responding_bus();
        bus.set_i16_le(ak8963::XOUT_L, 100)
            .set_i16_le(ak8963::XOUT_L + 2, -50)
            .set_i16_le(ak8963::XOUT_L + 4, 7);
        let mut mag = AsyncAk8963::new(bus, &Config::default());
        assert!(mag.initialize().await.unwrap());
        assert!(mag.is_ready());
        assert_eq!(mag.mode().await.unwrap(), ak8963::CNTL_MODE_CONTINUE_MEASURE_2);
        assert_eq!(mag.mag().await.unwrap(), [100.0, -50.0, 7.0]);
    }

    #[tokio::test]
    async fn wrong_identity_is_rejected() {
        let mut bus = MockBus::new();
        bus.set(ak8963::WHO_AM_I, 0x22);
        let mut mag = AsyncAk8963::new(bus, &Config::default());
        assert!(!mag.initialize().await.unwrap());
        assert!(!mag.is_ready());
    }

    #[tokio::test]
    async fn fuse_rom_sensitivity_applied_to_samples() {
        let mut bus = responding_bus();
        bus.set(ak8963::ASAX, 144)
            .set(ak8963::ASAY, 128)
            .set(ak8963::ASAZ, 128);
        bus.set_i16_le(ak8963::XOUT_L, 64)
            .set_i16_le(ak8963::XOUT_L + 2, 64)
            .set_i16_le(ak8963::XOUT_L + 4, 0);
        let config = Config {
            scale_values: true,
            ..Config::default()
        };
        let mut mag = AsyncAk8963::new(bus, &config);
        mag.initialize().await.unwrap();
        let v = mag.mag().await.unwrap();
        assert!((v[0] - 64.0 * 1.0625).abs() < 1e-9);
        assert!((v[1] - 64.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn overflow_returns_zero_sentinel() {
        let mut bus = responding_bus();
        bus.set_i16_le(ak8963::XOUT_L, 4000);
        bus.set(ak8963::ST2, 0x08);
        let mut mag = AsyncAk8963::new(bus, &Config::default());
        mag.initialize().await.unwrap();
        assert_eq!(mag.mag().await.unwrap(), [0.0, 0.0, 0.0]);
    }
}
