//! Two-state (angle, gyro bias) Kalman filter.
//!
//! Fuses a noisy absolute angle (e.g. accelerometer-derived pitch or roll)
//! with an independent rate (gyro) into a smoothed angle estimate. The
//! filter does no timing of its own; the caller measures `dt`.

/// Scalar complementary Kalman filter over `[angle, bias]`.
///
/// State persists across [`update`](Kalman::update) calls; there is no
/// reset beyond the explicit setters.
#[derive(Debug, Clone)]
pub struct Kalman {
    q_angle: f64,
    q_bias: f64,
    r_measure: f64,

    angle: f64,
    bias: f64,
    rate: f64,

    p: [[f64; 2]; 2],
}

impl Default for Kalman {
    fn default() -> Self {
        Self::new()
    }
}

impl Kalman {
    pub fn new() -> Self {
        Self {
            q_angle: 0.001,
            q_bias: 0.003,
            r_measure: 0.03,
            angle: 0.0,
            bias: 0.0,
            rate: 0.0,
            p: [[0.0; 2]; 2],
        }
    }

    /// Fold one `(measured angle, measured rate)` pair into the estimate.
    /// `dt` is the elapsed time since the previous call, in seconds.
    /// Returns the filtered angle.
    pub fn update(&mut self, new_angle: f64, new_rate: f64, dt: f64) -> f64 {
        // Predict: integrate the bias-corrected rate.
        self.rate = new_rate - self.bias;
        self.angle += dt * self.rate;

        self.p[0][0] += dt * (dt * self.p[1][1] - self.p[0][1] - self.p[1][0] + self.q_angle);
        self.p[0][1] -= dt * self.p[1][1];
        self.p[1][0] -= dt * self.p[1][1];
        self.p[1][1] += self.q_bias * dt;

        // Update: innovation against the measured angle.
        let s = self.p[0][0] + self.r_measure;
        let k0 = self.p[0][0] / s;
        let k1 = self.p[1][0] / s;

        let y = new_angle - self.angle;
        self.angle += k0 * y;
        self.bias += k1 * y;

        self.p[0][0] -= k0 * self.p[0][0];
        self.p[0][1] -= k0 * self.p[0][1];
        self.p[1][0] -= k1 * self.p[0][0];
        self.p[1][1] -= k1 * self.p[0][1];

        self.angle
    }

    /// Bias-corrected rate from the most recent update.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn q_angle(&self) -> f64 {
        self.q_angle
    }

    pub fn q_bias(&self) -> f64 {
        self.q_bias
    }

    pub fn r_measure(&self) -> f64 {
        self.r_measure
    }

    /// Seed the angle estimate (e.g. from the first accelerometer reading).
    pub fn set_angle(&mut self, angle: f64) {
        self.angle = angle;
    }

    pub fn set_q_angle(&mut self, q: f64) {
        self.q_angle = q;
    }

    pub fn set_q_bias(&mut self, q: f64) {
        self.q_bias = q;
    }

    pub fn set_r_measure(&mut self, r: f64) {
        self.r_measure = r;
    }
}
