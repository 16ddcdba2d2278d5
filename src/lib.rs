//! Linux userspace driver for the MPU-9250/9255 9-axis IMU.
//!
//! Talks to the part over an I2C character device (`/dev/i2c-*`): the
//! accelerometer/gyro die directly, and the on-package AK8963
//! magnetometer through bypass mode. Readings come back either as raw
//! counts or scaled to g, °/s and µT with the configured calibration
//! applied.
//!
//! ```no_run
//! use mpu9250_linux::{Config, Mpu9250};
//!
//! fn main() -> mpu9250_linux::Result<()> {
//!     let config = Config {
//!         enable_mag: true,
//!         scale_values: true,
//!         ..Config::default()
//!     };
//!     let mut imu = Mpu9250::open(config)?;
//!     if !imu.initialize()? {
//!         eprintln!("device did not identify as an MPU-9250");
//!         return Ok(());
//!     }
//!     let m9 = imu.motion9()?;
//!     println!("accel {:?} gyro {:?} mag {:?}", &m9[0..3], &m9[3..6], &m9[6..9]);
//!     Ok(())
//! }
//! ```
//!
//! The driver is generic over a [`bus::Bus`] transport (or [`bus::AsyncBus`]
//! for the [`AsyncMpu9250`] mirror), so everything above the wire is
//! testable against an in-memory register file.

pub mod bus;
pub mod calibrate;
pub mod compass;
pub mod compass_async;
pub mod config;
pub mod device;
pub mod device_async;
pub mod error;
pub mod i2c;
pub mod kalman;
pub mod registers;
pub mod scale;
pub mod stats;

pub use compass::Ak8963;
pub use compass_async::AsyncAk8963;
pub use config::{AccelCalibration, Config, MagCalibration, Vec3};
pub use device::{InitStage, Mpu9250};
pub use device_async::AsyncMpu9250;
pub use error::Error;
pub use kalman::Kalman;
pub use stats::RunningStats;

/// Result type alias for driver operations.
pub type Result<T> = std::result::Result<T, Error>;
