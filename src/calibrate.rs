//! Calibration procedures for all three sensor blocks.
//!
//! Each procedure samples a live device and reduces the stream to the
//! constant(s) the [`Config`](crate::config::Config) consumes: an additive
//! gyro bias, a two-sided accelerometer offset/scale set, and a
//! magnetometer hard-iron offset plus sphere-correction scale. The
//! reductions themselves are pure and separately testable; the device only
//! supplies samples.

use crate::bus::Bus;
use crate::compass::Ak8963;
use crate::config::{AccelCalibration, AxisScale, MagCalibration, Vec3};
use crate::device::Mpu9250;
use crate::Result;
use std::time::Duration;

/// Sensor axis being calibrated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Which way the axis under calibration points relative to gravity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Axis pointing down, expecting the negative-extreme reading.
    Down,
    /// Axis pointing up, expecting the positive-extreme reading.
    Up,
}

impl Direction {
    fn index(self) -> usize {
        match self {
            Direction::Down => 0,
            Direction::Up => 1,
        }
    }
}

/// Average `count` gyro readings while the device sits still and return
/// the negated mean, suitable for `Config::gyro_bias_offset`.
pub fn calibrate_gyro_bias<B: Bus>(
    dev: &mut Mpu9250<B>,
    count: u32,
    delay: Duration,
) -> Result<Vec3> {
    log::info!("Gyro calibration: keep the device still ({count} samples)");
    let mut sum = [0.0f64; 3];
    for _ in 0..count {
        let g = dev.gyro()?;
        sum[0] += g[0];
        sum[1] += g[1];
        sum[2] += g[2];
        std::thread::sleep(delay);
    }
    let n = count as f64;
    Ok(Vec3::new(-sum[0] / n, -sum[1] / n, -sum[2] / n))
}

/// Six-position accelerometer calibration.
///
/// One capture per axis/direction pair, with the device resting so the
/// chosen axis points straight up or down. Every capture feeds the
/// pointed axis into that side of its scale pair and the two level axes
/// into the shared offset sum, so each axis ends up with `count` scale
/// samples per side and `4 * count` offset samples.
pub struct AccelCalibrationSession {
    count: u32,
    offset_sum: [f64; 3],
    scale_sum: [[f64; 2]; 3],
    captured: [[bool; 2]; 3],
}

impl AccelCalibrationSession {
    pub fn new(count: u32) -> Self {
        Self {
            count,
            offset_sum: [0.0; 3],
            scale_sum: [[0.0; 2]; 3],
            captured: [[false; 2]; 3],
        }
    }

    /// Sample one resting position from the device.
    pub fn capture<B: Bus>(
        &mut self,
        dev: &mut Mpu9250<B>,
        axis: Axis,
        direction: Direction,
        delay: Duration,
    ) -> Result<()> {
        log::info!(
            "Accel calibration: {:?} axis pointing {:?} ({} samples)",
            axis,
            direction,
            self.count
        );
        for _ in 0..self.count {
            let a = dev.accel()?;
            self.record(axis, direction, a);
            std::thread::sleep(delay);
        }
        Ok(())
    }

    /// Fold one sample into the position's sums. Split out from
    /// [`capture`](Self::capture) so the reduction is testable without a
    /// device.
    pub fn record(&mut self, axis: Axis, direction: Direction, sample: [f64; 3]) {
        let pointed = axis.index();
        self.scale_sum[pointed][direction.index()] += sample[pointed];
        for i in 0..3 {
            if i != pointed {
                self.offset_sum[i] += sample[i];
            }
        }
        self.captured[pointed][direction.index()] = true;
    }

    /// Whether all six positions have been captured.
    pub fn is_complete(&self) -> bool {
        self.captured.iter().all(|pair| pair[0] && pair[1])
    }

    /// Reduce the sums to a calibration record.
    ///
    /// Each axis appears as a level (zero-g) axis in four of the six
    /// positions, so the offset divisor is `4 * count`; the scale sides
    /// are single-position averages over `count`.
    pub fn finish(self) -> AccelCalibration {
        let n = self.count as f64;
        let offset_n = 4.0 * n;
        AccelCalibration {
            offset: Vec3::new(
                self.offset_sum[0] / offset_n,
                self.offset_sum[1] / offset_n,
                self.offset_sum[2] / offset_n,
            ),
            scale: AxisScale {
                x: [self.scale_sum[0][0] / n, self.scale_sum[0][1] / n],
                y: [self.scale_sum[1][0] / n, self.scale_sum[1][1] / n],
                z: [self.scale_sum[2][0] / n, self.scale_sum[2][1] / n],
            },
        }
    }
}

/// Magnetometer min/max sweep calibration.
///
/// Feed it samples while the device is waved through figure-eights; the
/// reduction is the axis-aligned bounding box midpoint (hard-iron offset)
/// and an isotropic rescale of each axis to the average radius. A sphere
/// approximation of the soft-iron ellipsoid, which holds up well for
/// heading use.
#[derive(Debug)]
pub struct MagCalibrationSession {
    min: [f64; 3],
    max: [f64; 3],
    count: u32,
}

impl Default for MagCalibrationSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MagCalibrationSession {
    pub fn new() -> Self {
        Self {
            min: [f64::INFINITY; 3],
            max: [f64::NEG_INFINITY; 3],
            count: 0,
        }
    }

    /// Track one field sample. The all-zero overflow sentinel is skipped
    /// so a saturated swing cannot collapse the bounding box onto the
    /// origin.
    pub fn add(&mut self, sample: [f64; 3]) {
        if sample == [0.0, 0.0, 0.0] {
            return;
        }
        for i in 0..3 {
            self.min[i] = self.min[i].min(sample[i]);
            self.max[i] = self.max[i].max(sample[i]);
        }
        self.count += 1;
    }

    /// Pull one sample from the magnetometer and track it.
    pub fn sample<B: Bus>(&mut self, mag: &mut Ak8963<B>) -> Result<()> {
        let v = mag.mag()?;
        self.add(v);
        Ok(())
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Midpoint offset and average-radius scale from the tracked extremes.
    /// Axes with no observed swing keep a scale of 1.
    pub fn finish(self) -> MagCalibration {
        let mut offset = [0.0f64; 3];
        let mut radius = [0.0f64; 3];
        for i in 0..3 {
            if self.min[i] <= self.max[i] {
                offset[i] = (self.min[i] + self.max[i]) / 2.0;
                radius[i] = (self.max[i] - self.min[i]) / 2.0;
            }
        }
        let avg = (radius[0] + radius[1] + radius[2]) / 3.0;
        let scale_of = |r: f64| if r > 0.0 { avg / r } else { 1.0 };
        MagCalibration {
            offset: Vec3::from(offset),
            scale: Vec3::new(scale_of(radius[0]), scale_of(radius[1]), scale_of(radius[2])),
        }
    }
}

/// Drive a complete magnetometer sweep: `count` samples with `delay`
/// between them while the operator rotates the device.
pub fn calibrate_mag<B: Bus>(
    mag: &mut Ak8963<B>,
    count: u32,
    delay: Duration,
) -> Result<MagCalibration> {
    log::info!("Mag calibration: wave the device in figure-eights ({count} samples)");
    let mut session = MagCalibrationSession::new();
    for _ in 0..count {
        session.sample(mag)?;
        std::thread::sleep(delay);
    }
    Ok(session.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::MockBus;
    use crate::config::Config;
    use crate::registers::mpu9250 as reg;

    fn scaled_device(bus: MockBus) -> Mpu9250<MockBus> {
        let config = Config {
            scale_values: true,
            gyro_fs: 0,
            accel_fs: 0,
            ..Config::default()
        };
        let mut dev = Mpu9250::with_bus(config, bus, None).unwrap();
        dev.initialize().unwrap();
        dev
    }

    #[test]
    fn gyro_bias_is_negated_mean() {
        let mut bus = MockBus::new();
        bus.set(reg::WHO_AM_I, 0x71);
        // Constant 131 raw = 1 deg/s at fs 0; y drifts negative.
        bus.set_i16_be(reg::GYRO_XOUT_H, 131)
            .set_i16_be(reg::GYRO_XOUT_H + 2, -262)
            .set_i16_be(reg::GYRO_XOUT_H + 4, 0);
        let mut dev = scaled_device(bus);
        let bias = calibrate_gyro_bias(&mut dev, 500, Duration::ZERO).unwrap();
        assert!((bias.x + 1.0).abs() < 1e-9);
        assert!((bias.y - 2.0).abs() < 1e-9);
        assert!(bias.z.abs() < 1e-9);
    }

    #[test]
    fn accel_six_positions_on_ideal_sensor() {
        // Perfect part: pointed axis reads exactly +/-1 g, level axes 0.
        let mut session = AccelCalibrationSession::new(10);
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            for dir in [Direction::Down, Direction::Up] {
                let mut sample = [0.0; 3];
                sample[axis.index()] = match dir {
                    Direction::Down => -1.0,
                    Direction::Up => 1.0,
                };
                for _ in 0..10 {
                    session.record(axis, dir, sample);
                }
            }
        }
        assert!(session.is_complete());
        let cal = session.finish();
        assert_eq!(cal.offset, Vec3::default());
        assert_eq!(cal.scale.x, [-1.0, 1.0]);
        assert_eq!(cal.scale.y, [-1.0, 1.0]);
        assert_eq!(cal.scale.z, [-1.0, 1.0]);
    }

    #[test]
    fn accel_six_positions_in_raw_counts() {
        // Unscaled part at +/-2 g: extremes read +/-16384 counts.
        let mut session = AccelCalibrationSession::new(8);
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            for dir in [Direction::Down, Direction::Up] {
                let mut sample = [0.0; 3];
                sample[axis.index()] = match dir {
                    Direction::Down => -16384.0,
                    Direction::Up => 16384.0,
                };
                for _ in 0..8 {
                    session.record(axis, dir, sample);
                }
            }
        }
        let cal = session.finish();
        assert_eq!(cal.offset, Vec3::default());
        assert_eq!(cal.scale.x, [-16384.0, 16384.0]);
        assert_eq!(cal.scale.y, [-16384.0, 16384.0]);
        assert_eq!(cal.scale.z, [-16384.0, 16384.0]);
    }

    #[test]
    fn accel_offset_divisor_spans_four_level_positions() {
        // Every level reading of x is a constant 0.08: x is level in the
        // four non-x positions, so the mean must come out at 0.08 again.
        let mut session = AccelCalibrationSession::new(5);
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            for dir in [Direction::Down, Direction::Up] {
                let mut sample = [0.08, 0.0, 0.0];
                sample[axis.index()] = match dir {
                    Direction::Down => -1.0,
                    Direction::Up => 1.0,
                };
                for _ in 0..5 {
                    session.record(axis, dir, sample);
                }
            }
        }
        let cal = session.finish();
        assert!((cal.offset.x - 0.08).abs() < 1e-12);
        assert_eq!(cal.offset.y, 0.0);
        assert_eq!(cal.offset.z, 0.0);
    }

    #[test]
    fn accel_capture_reads_device_counts() {
        let mut bus = MockBus::new();
        bus.set(reg::WHO_AM_I, 0x71);
        bus.set_i16_be(reg::ACCEL_XOUT_H, 16384)
            .set_i16_be(reg::ACCEL_XOUT_H + 2, 20)
            .set_i16_be(reg::ACCEL_XOUT_H + 4, -12);
        let mut dev = scaled_device(bus);
        let mut session = AccelCalibrationSession::new(4);
        session
            .capture(&mut dev, Axis::X, Direction::Up, Duration::ZERO)
            .unwrap();
        assert!(!session.is_complete());
        let cal = session.finish();
        // At +/-2 g, 16384 counts = 1 g.
        assert!((cal.scale.x[1] - 1.0).abs() < 1e-9);
        assert!((cal.offset.y - (20.0 / 16384.0) / 4.0).abs() < 1e-9);
    }

    #[test]
    fn mag_sweep_midpoint_and_average_radius() {
        let mut session = MagCalibrationSession::new();
        // x swings twice as far as y; z never moves off zero.
        for i in -100i32..=100 {
            session.add([i as f64, (i as f64) / 2.0, 0.0]);
        }
        let cal = session.finish();
        assert_eq!(cal.offset, Vec3::default());
        assert!(cal.scale.x < cal.scale.y);
        // Average radius (100 + 50 + 0) / 3 = 50.
        assert!((cal.scale.x - 0.5).abs() < 1e-12);
        assert!((cal.scale.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mag_sweep_skips_overflow_sentinel() {
        let mut session = MagCalibrationSession::new();
        session.add([30.0, -10.0, 5.0]);
        session.add([0.0, 0.0, 0.0]);
        session.add([40.0, -20.0, 15.0]);
        assert_eq!(session.count(), 2);
        let cal = session.finish();
        assert!((cal.offset.x - 35.0).abs() < 1e-12);
        assert!((cal.offset.y + 15.0).abs() < 1e-12);
    }

    #[test]
    fn mag_sweep_with_hard_iron_shift() {
        let mut session = MagCalibrationSession::new();
        // Circle of radius 40 centered at (25, -10) in the xy plane.
        for step in 0..360 {
            let t = (step as f64).to_radians();
            session.add([25.0 + 40.0 * t.cos(), -10.0 + 40.0 * t.sin(), 3.0]);
        }
        let cal = session.finish();
        assert!((cal.offset.x - 25.0).abs() < 0.1);
        assert!((cal.offset.y + 10.0).abs() < 0.1);
        // z has no swing; its scale stays at 1.
        assert_eq!(cal.scale.z, 1.0);
    }
}
