use crate::error::{Error, Result};
use crate::loudness::EPSILON;

/// Blank plus the eight lower-eighth blocks, quietest first.
pub const BAR_CHARS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

const SMOOTHING: f32 = 0.8;

/// Time-smoothed spectrum drawn as one glyph per column on a log frequency axis.
pub struct SpectrumTracker {
    smoothed: Vec<f32>,
    norm: f32,
}

impl SpectrumTracker {
    /// `bins` is the one-sided spectrum length, `W/2 + 1`. It never changes.
    pub fn new(bins: usize) -> Self {
        Self {
            smoothed: vec![0.0; bins],
            norm: 1.0,
        }
    }

    pub fn norm(&self) -> f32 {
        self.norm
    }

    /// Fold one frame of powers into the running average and render `width` glyphs.
    pub fn plot(&mut self, powers: &[f32], width: usize) -> Result<String> {
        if powers.len() != self.smoothed.len() {
            return Err(Error::Mismatch {
                expected: self.smoothed.len(),
                actual: powers.len(),
            });
        }

        for (s, &p) in self.smoothed.iter_mut().zip(powers) {
            *s = SMOOTHING * *s + (1.0 - SMOOTHING) * p;
        }

        if width == 0 {
            return Ok(String::new());
        }

        let edges = bucket_edges(self.smoothed.len(), width);
        let means: Vec<Option<f32>> = edges
            .windows(2)
            .map(|w| mean(&self.smoothed[w[0]..w[1]]))
            .collect();
        let buckets = infill(&means);

        let peak = buckets.iter().copied().fold(0.0f32, f32::max);
        self.norm = (SMOOTHING * self.norm + (1.0 - SMOOTHING) * peak + EPSILON).max(peak);

        Ok(buckets
            .iter()
            .map(|&v| BAR_CHARS[glyph_index(v, self.norm)])
            .collect())
    }
}

/// `width + 1` bin boundaries spaced geometrically from 0 up to `bins`.
pub fn bucket_edges(bins: usize, width: usize) -> Vec<usize> {
    let mut edges = Vec::with_capacity(width + 1);
    edges.push(0);
    for j in 1..=width {
        let exponent = j as f64 / width as f64;
        edges.push((bins as f64).powf(exponent).round() as usize);
    }
    edges
}

fn mean(values: &[f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f32>() / values.len() as f32)
}

/// Forward-fill empty buckets with the last defined value, or 0 before any.
pub fn infill(buckets: &[Option<f32>]) -> Vec<f32> {
    let mut last = 0.0;
    buckets
        .iter()
        .map(|b| {
            if let Some(v) = b {
                last = *v;
            }
            last
        })
        .collect()
}

/// Square-root compression of `value / norm` onto the nine-step ramp.
pub fn glyph_index(value: f32, norm: f32) -> usize {
    let level = (value.max(0.0) / norm).sqrt() * BAR_CHARS.len() as f32;
    (level as usize).min(BAR_CHARS.len() - 1)
}
