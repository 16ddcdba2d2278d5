//! AK8963 magnetometer companion driver.
//!
//! Reachable only after the primary device puts the bus in bypass mode;
//! see [`crate::device::Mpu9250::enable_mag`]. Sample pairs are
//! little-endian, unlike the primary device.

use crate::bus::{Bus, RegisterClient};
use crate::config::{Config, MagCalibration};
use crate::registers::{ak8963, MagStatus2};
use crate::scale;
use crate::Result;
use std::time::Duration;

const SETTLE: Duration = Duration::from_micros(10_000);

pub struct Ak8963<B: Bus> {
    client: RegisterClient<B>,
    cal: MagCalibration,
    scale_values: bool,
    /// Fuse-ROM sensitivity adjustment per axis; 1.0 until read.
    asa: [f64; 3],
    ready: bool,
}

impl<B: Bus> Ak8963<B> {
    pub fn new(bus: B, config: &Config) -> Self {
        Self {
            client: RegisterClient::new(bus),
            cal: config.mag_calibration,
            scale_values: config.scale_values,
            asa: [1.0; 3],
            ready: false,
        }
    }

    /// Bring the magnetometer into continuous measurement mode.
    ///
    /// Verifies the device identity, loads the factory sensitivity values,
    /// then selects continuous mode 2 (100 Hz). Returns `Ok(false)` on an
    /// identity mismatch; transport failures propagate.
    pub fn initialize(&mut self) -> Result<bool> {
        if self.ready {
            return Ok(true);
        }
        std::thread::sleep(SETTLE);
        let id = self.device_id()?;
        if id != ak8963::WHO_AM_I_RESPONSE {
            log::warn!(
                "AK8963 device id is 0x{:02x}, expected 0x{:02x}",
                id,
                ak8963::WHO_AM_I_RESPONSE
            );
            return Ok(false);
        }
        log::info!("AK8963: configuring magnetometer");
        self.read_sensitivity_adjustment()?;
        std::thread::sleep(SETTLE);
        self.set_mode(ak8963::CNTL_MODE_CONTINUE_MEASURE_2)?;
        std::thread::sleep(SETTLE);
        self.ready = true;
        Ok(true)
    }

    /// Whether initialization completed successfully.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn device_id(&mut self) -> Result<u8> {
        self.client.read_byte(ak8963::WHO_AM_I)
    }

    /// ST1 data-ready bit.
    pub fn data_ready(&mut self) -> Result<bool> {
        Ok(self.client.read_bit(ak8963::ST1, ak8963::ST1_DRDY_BIT)? == 1)
    }

    /// Current CNTL operating mode (low nibble).
    pub fn mode(&mut self) -> Result<u8> {
        Ok(self.client.read_byte(ak8963::CNTL)? & 0x0F)
    }

    pub fn set_mode(&mut self, mode: u8) -> Result<u8> {
        self.client.write_byte(ak8963::CNTL, mode)?;
        Ok(mode)
    }

    /// Per-axis sensitivity adjustment factors currently in effect.
    pub fn sensitivity(&self) -> [f64; 3] {
        self.asa
    }

    /// Load the factory sensitivity values from fuse ROM.
    ///
    /// The ROM is only readable in fuse-access mode, so the current mode is
    /// saved and restored around the read. With `scale_values` off the
    /// factors stay at 1 and no bus traffic happens.
    fn read_sensitivity_adjustment(&mut self) -> Result<()> {
        if !self.scale_values {
            self.asa = [1.0; 3];
            return Ok(());
        }

        let previous = self.mode()?;
        self.set_mode(ak8963::CNTL_MODE_FUSE_ROM_ACCESS)?;
        std::thread::sleep(SETTLE);

        self.asa = [
            scale::sensitivity_adjustment(self.client.read_byte(ak8963::ASAX)?),
            scale::sensitivity_adjustment(self.client.read_byte(ak8963::ASAY)?),
            scale::sensitivity_adjustment(self.client.read_byte(ak8963::ASAZ)?),
        ];

        self.set_mode(previous)?;
        Ok(())
    }

    /// Calibrated field vector in µT (or raw counts with `scale_values`
    /// off).
    ///
    /// Reads the six data bytes plus ST2 in one transaction; reading ST2
    /// tells the device the sample was consumed so the next one is fresh.
    /// A set overflow flag yields the `[0, 0, 0]` sentinel, not an error —
    /// the condition clears at the sensor's own output rate.
    pub fn mag(&mut self) -> Result<[f64; 3]> {
        let mut buf = [0u8; 7];
        self.client.read_bytes(ak8963::XOUT_L, &mut buf)?;

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

    pub fn log_settings(&mut self) {
        log::info!("Magnetometer (compass):");
        match self.device_id() {
            Ok(id) => log::info!("--> Device ID: 0x{:02x}", id),
            Err(e) => log::warn!("--> Device ID unavailable: {}", e),
        }
        if let Ok(mode) = self.mode() {
            log::info!("--> Mode: 0x{:02x}", mode);
        }
        log::info!(
            "--> Sensitivity: x={} y={} z={}",
            self.asa[0],
            self.asa[1],
            self.asa[2]
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::MockBus;

    fn mag_config(scale_values: bool) -> Config {
        Config {
            scale_values,
            ..Config::default()
        }
    }

    fn responding_bus() -> MockBus {
        let mut bus = MockBus::new();
        bus.set(ak8963::WHO_AM_I, ak8963::WHO_AM_I_RESPONSE);
        bus
    }

    #[test]
    fn initialize_checks_identity_then_sets_continuous_mode() {
        let mut mag = Ak8963::new(responding_bus(), &mag_config(false));
        assert!(mag.initialize().unwrap());
        assert!(mag.is_ready());
        assert_eq!(mag.mode().unwrap(), ak8963::CNTL_MODE_CONTINUE_MEASURE_2);
    }

    #[test]
    fn initialize_rejects_wrong_identity_without_configuring() {
        let mut bus = MockBus::new();
        bus.set(ak8963::WHO_AM_I, 0x11);
        let mut mag = Ak8963::new(bus, &mag_config(false));
        assert!(!mag.initialize().unwrap());
        assert!(!mag.is_ready());
    }

    #[test]
    fn sensitivity_comes_from_fuse_rom() {
        let mut bus = responding_bus();
        // ASA 128 -> 1.0, 144 -> 1.0625, 112 -> 0.9375
        bus.set(ak8963::ASAX, 128)
            .set(ak8963::ASAY, 144)
            .set(ak8963::ASAZ, 112);
        let mut mag = Ak8963::new(bus, &mag_config(true));
        assert!(mag.initialize().unwrap());
        let asa = mag.sensitivity();
        assert!((asa[0] - 1.0).abs() < 1e-12);
        assert!((asa[1] - 1.0625).abs() < 1e-12);
        assert!((asa[2] - 0.9375).abs() < 1e-12);
        // Continuous mode restored after the fuse-ROM excursion.
        assert_eq!(mag.mode().unwrap(), ak8963::CNTL_MODE_CONTINUE_MEASURE_2);
    }

    #[test]
    fn sensitivity_is_unity_when_scaling_disabled() {
        let mut mag = Ak8963::new(responding_bus(), &mag_config(false));
        assert!(mag.initialize().unwrap());
        assert_eq!(mag.sensitivity(), [1.0; 3]);
    }

    #[test]
    fn mag_decodes_little_endian_pairs() {
        let mut bus = responding_bus();
        bus.set_i16_le(ak8963::XOUT_L, 100)
            .set_i16_le(ak8963::XOUT_L + 2, -50)
            .set_i16_le(ak8963::XOUT_L + 4, 0x1234);
        let mut mag = Ak8963::new(bus, &mag_config(false));
        mag.initialize().unwrap();
        let v = mag.mag().unwrap();
        assert_eq!(v, [100.0, -50.0, 0x1234 as f64]);
    }

    #[test]
    fn overflow_returns_zero_sentinel() {
        let mut bus = responding_bus();
        bus.set_i16_le(ak8963::XOUT_L, 4000);
        bus.set(ak8963::ST2, 0x08);
        let mut mag = Ak8963::new(bus, &mag_config(false));
        mag.initialize().unwrap();
        assert_eq!(mag.mag().unwrap(), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn calibration_applies_offset_then_scale() {
        let mut bus = responding_bus();
        bus.set_i16_le(ak8963::XOUT_L, 110)
            .set_i16_le(ak8963::XOUT_L + 2, 10)
            .set_i16_le(ak8963::XOUT_L + 4, -40);
        let mut config = mag_config(false);
        config.mag_calibration = MagCalibration {
            offset: crate::config::Vec3::new(10.0, 10.0, 10.0),
            scale: crate::config::Vec3::new(2.0, 1.0, 0.5),
        };
        let mut mag = Ak8963::new(bus, &config);
        mag.initialize().unwrap();
        let v = mag.mag().unwrap();
        assert_eq!(v, [200.0, 0.0, -25.0]);
    }
}
