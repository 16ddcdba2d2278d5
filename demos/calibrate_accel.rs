//! Six-position accelerometer calibration, printed as JSON.
//!
//! You will be prompted to rest the device with each axis pointing
//! straight down and straight up. Paste the output into
//! `Config::accel_calibration`.

use mpu9250_linux::calibrate::{AccelCalibrationSession, Axis, Direction};
use mpu9250_linux::{Config, Mpu9250};
use std::io::{BufRead, Write};
use std::time::Duration;

const SAMPLES_PER_POSITION: u32 = 200;

fn wait_for_enter(prompt: &str) {
    print!("{prompt} Press enter when ready... ");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);
}

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

    let positions = [
        (Axis::X, Direction::Down, "X axis pointing DOWN."),
        (Axis::X, Direction::Up, "X axis pointing UP."),
        (Axis::Y, Direction::Down, "Y axis pointing DOWN."),
        (Axis::Y, Direction::Up, "Y axis pointing UP."),
        (Axis::Z, Direction::Down, "Z axis pointing DOWN."),
        (Axis::Z, Direction::Up, "Z axis pointing UP."),
    ];

    let mut session = AccelCalibrationSession::new(SAMPLES_PER_POSITION);
    for (axis, direction, prompt) in positions {
        wait_for_enter(prompt);
        if let Err(e) = session.capture(&mut imu, axis, direction, Duration::from_millis(5)) {
            eprintln!("Capture failed: {e}");
            std::process::exit(1);
        }
        println!("  done.");
    }

    let cal = session.finish();
    println!("accel_calibration:");
    println!("{}", serde_json::to_string_pretty(&cal).unwrap());
}
