//! Kalman-filtered pitch and roll from accel + gyro.
//!
//! The accelerometer supplies an absolute but noisy angle, the gyro a
//! smooth but drifting rate; one filter per axis fuses them.

use mpu9250_linux::{scale, Config, Kalman, Mpu9250};
use std::time::{Duration, Instant};

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

    let mut pitch_filter = Kalman::new();
    let mut roll_filter = Kalman::new();

    // Seed both filters from the first accel reading so they don't have
    // to converge from zero.
    match imu.accel() {
        Ok(a) => {
            pitch_filter.set_angle(scale::pitch(a));
            roll_filter.set_angle(scale::roll(a));
        }
        Err(e) => {
            eprintln!("First read failed: {e}");
            std::process::exit(1);
        }
    }

    let mut last = Instant::now();
    loop {
        let m6 = match imu.motion6() {
            Ok(m) => m,
            Err(e) => {
                eprintln!("Read failed: {e}");
                continue;
            }
        };
        let now = Instant::now();
        let dt = now.duration_since(last).as_secs_f64();
        last = now;

        let accel = [m6[0], m6[1], m6[2]];
        // Pitch rotates about Y, roll about X.
        let pitch = pitch_filter.update(scale::pitch(accel), m6[4], dt);
        let roll = roll_filter.update(scale::roll(accel), m6[3], dt);

        println!("pitch {pitch:7.2}  roll {roll:7.2}  (dt {:.4}s)", dt);
        std::thread::sleep(Duration::from_millis(20));
    }
}
