/// Errors that can occur when talking to the MPU-9250 or its AK8963 companion.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I2C error: {0}")]
    I2c(#[from] i2cdev::linux::LinuxI2CError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Device parameter required (bus path is empty)")]
    MissingDevice,

    #[error("Invalid {name} index {value} (expected 0..=3)")]
    InvalidFullScale { name: &'static str, value: u8 },

    #[error("Bus transport failed: {0}")]
    Transport(String),
}
