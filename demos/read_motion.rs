//! Stream scaled 9-axis readings to stdout.
//!
//! Run with `RUST_LOG=info` to see the initialization log.

use mpu9250_linux::{Config, Mpu9250};
use std::time::Duration;

fn main() {
    env_logger::init();

    let config = Config {
        enable_mag: true,
        scale_values: true,
        debug: true,
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

    loop {
        match imu.motion9() {
            Ok(m) => {
                let temp = imu
                    .temperature_celsius()
                    .ok()
                    .flatten()
                    .map(|t| format!("{t:6.2} C"))
                    .unwrap_or_else(|| "  --  ".to_string());
                println!(
                    "accel {:7.3} {:7.3} {:7.3} g | gyro {:8.3} {:8.3} {:8.3} dps | mag {:7.1} {:7.1} {:7.1} uT | {}",
                    m[0], m[1], m[2], m[3], m[4], m[5], m[6], m[7], m[8], temp
                );
            }
            Err(e) => eprintln!("Read failed: {e}"),
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}
