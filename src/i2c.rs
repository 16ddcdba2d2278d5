//! Linux I2C transport over `/dev/i2c-*` character devices.

use crate::bus::Bus;
use crate::Result;
use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;

/// Blocking transport bound to one slave address on a Linux I2C bus.
///
/// Exclusive access for the duration of a read-modify-write bit operation
/// is assumed; the kernel serializes individual transfers but not the
/// read-then-write pair, so keep one handle per device and one caller.
pub struct LinuxI2c {
    device: LinuxI2CDevice,
}

impl LinuxI2c {
    /// Open the bus at `path` and bind to `address`.
    pub fn open(path: &str, address: u16) -> Result<Self> {
        let device = LinuxI2CDevice::new(path, address)?;
        log::debug!("Opened {} at address 0x{:02x}", path, address);
        Ok(Self { device })
    }
}

impl Bus for LinuxI2c {
    fn read_bytes(&mut self, reg: u8, buf: &mut [u8]) -> Result<()> {
        let data = self.device.smbus_read_i2c_block_data(reg, buf.len() as u8)?;
        if data.len() != buf.len() {
            return Err(crate::Error::Transport(format!(
                "short read at 0x{:02x}: expected {} bytes, got {}",
                reg,
                buf.len(),
                data.len()
            )));
        }
        buf.copy_from_slice(&data);
        Ok(())
    }

    fn write_bytes(&mut self, reg: u8, data: &[u8]) -> Result<()> {
        self.device.smbus_write_i2c_block_data(reg, data)?;
        Ok(())
    }
}
