//! Measure the at-rest gyro bias and print it as JSON.
//!
//! Keep the device completely still for the duration. Paste the output
//! into `Config::gyro_bias_offset` for subsequent runs.

use mpu9250_linux::calibrate::calibrate_gyro_bias;
use mpu9250_linux::{Config, Mpu9250};
use std::time::Duration;

const SAMPLES: u32 = 500;

fn main() {
    env_logger::init();

    let config = Config {
        scale_values: true,
        ..Config::default()
    };

    let mut imu = match Mpu9250::open(config) {
        Ok(dev) => dev,
        Err(e) => {
            eprintln!("Failed to open I2C bus: {e}");
            std::process::exit(1);
        }
    };
    match imu.initialize() {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("Device did not identify as an MPU-9250/9255");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Initialization failed: {e}");
            std::process::exit(1);
        }
    }

    println!("Keep the device still...");
    match calibrate_gyro_bias(&mut imu, SAMPLES, Duration::from_millis(2)) {
        Ok(bias) => {
            println!("gyro_bias_offset:");
            println!("{}", serde_json::to_string_pretty(&bias).unwrap());
        }
        Err(e) => {
            eprintln!("Calibration failed: {e}");
            std::process::exit(1);
        }
    }
}
