//! Magnetometer min/max sweep calibration, printed as JSON.
//!
//! Wave the device in slow figure-eights, rotating it through as many
//! orientations as possible, until the sweep completes. Paste the output
//! into `Config::mag_calibration`.

use mpu9250_linux::calibrate::MagCalibrationSession;
use mpu9250_linux::{Config, Mpu9250};
use std::time::Duration;

const SAMPLES: u32 = 1500;

fn main() {
    env_logger::init();

    let config = Config {
        enable_mag: true,
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

    let mag = match imu.mag() {
        Some(mag) if mag.is_ready() => mag,
        _ => {
            eprintln!("Magnetometer did not come up; cannot calibrate");
            std::process::exit(1);
        }
    };

    println!("Wave the device in figure-eights...");
    let mut session = MagCalibrationSession::new();
    for i in 0..SAMPLES {
        if let Err(e) = session.sample(mag) {
            eprintln!("Read failed: {e}");
            std::process::exit(1);
        }
        if i % 100 == 0 {
            println!("  {i}/{SAMPLES}");
        }
        std::thread::sleep(Duration::from_millis(10));
    }

    let cal = session.finish();
    println!("mag_calibration:");
    println!("{}", serde_json::to_string_pretty(&cal).unwrap());
}
