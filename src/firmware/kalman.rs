//! Scalar Kalman filter for noisy distance readings

/// One-dimensional constant-value Kalman filter
#[derive(Debug, Clone, PartialEq)]
pub struct KalmanFilter {
    q: f32,
    r: f32,
    p: f32,
    x: f32,
}

impl KalmanFilter {
    pub fn new(initial: f32, process_noise: f32, measurement_noise: f32, estimate_error: f32) -> Self {
        Self {
            q: process_noise,
            r: measurement_noise,
            p: estimate_error,
            x: initial,
        }
    }

    /// Current estimate
    pub fn estimate(&self) -> f32 {
        self.x
    }

    /// Fold in a measurement. A missing one leaves the estimate untouched.
    ///
    /// The result is rounded to two decimals.
    pub fn update(&mut self, measurement: Option<f32>) -> f32 {
        let Some(z) = measurement else {
            return self.x;
        };

        self.p += self.q;
        let k = self.p / (self.p + self.r);
        self.x += k * (z - self.x);
        self.p *= 1.0 - k;
        round2(self.x)
    }
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new(0.0, 1e-2, 1e-1, 1.0)
    }
}

fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_update() {
        // p = 1.01, k = 1.01 / 1.11
        let mut kf = KalmanFilter::default();
        let expected = round2(100.0 * 1.01 / 1.11);
        assert_eq!(kf.update(Some(100.0)), expected);
    }

    #[test]
    fn test_converges_on_constant_input() {
        let mut kf = KalmanFilter::default();
        let mut last = 0.0;
        for _ in 0..50 {
            last = kf.update(Some(42.0));
        }
        assert!((last - 42.0).abs() < 0.5, "estimate {}", last);
    }

    #[test]
    fn test_missing_reading_keeps_estimate() {
        let mut kf = KalmanFilter::default();
        kf.update(Some(30.0));
        let before = kf.estimate();
        assert_eq!(kf.update(None), before);
        assert_eq!(kf.estimate(), before);
    }
}
