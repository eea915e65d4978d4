/// Floor shared by the loudness curve and the spectrum auto-gain.
pub const EPSILON: f32 = 1e-6;

/// Two-speed loudness envelope shown as the colored dot before the bar.
///
/// Red and green follow a fast peak envelope of raw power; blue follows a
/// slow average of log-compressed power.
#[derive(Debug, Default)]
pub struct LoudnessIndicator {
    fast_power: f32,
    slow_power: f32,
}

impl LoudnessIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, total_power: f32) -> (u8, u8, u8) {
        self.fast_power = total_power.max(0.5 * self.fast_power + 0.5 * total_power);
        self.slow_power = 0.9 * self.slow_power + 0.1 * log01(total_power, EPSILON);

        let fast = quantize(log01(self.fast_power, EPSILON));
        (fast, fast, quantize(self.slow_power))
    }
}

/// Maps `x >= 0` so that `0 -> 0` and `1 -> 1`: linear below `e`, logarithmic above.
pub fn log01(x: f32, e: f32) -> f32 {
    ((x + e).ln() - e.ln()) / ((1.0 + e).ln() - e.ln())
}

/// Unit interval to a color channel, saturating at both ends.
pub fn quantize(x: f32) -> u8 {
    (x * 256.0).floor().clamp(0.0, 255.0) as u8
}
