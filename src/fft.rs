use std::f32::consts::PI;

use rustfft::num_complex::Complex;

use crate::error::{Error, Result};

/// Radix-2 Fourier transform of a power-of-two length block.
///
/// Every butterfly halves its outputs, so the result is the textbook DFT
/// divided by `N`. Consumers only look at ratios between bins, so the scale
/// just has to stay the same from frame to frame.
pub fn transform<T>(input: &[T]) -> Result<Vec<Complex<f32>>>
where
    T: Copy + Into<Complex<f32>>,
{
    let n = input.len();
    if !n.is_power_of_two() {
        return Err(Error::Length(n));
    }
    if n == 1 {
        return Ok(vec![input[0].into()]);
    }

    // Bit-reversed load, then iterative butterflies from the leaves up.
    let bits = n.trailing_zeros();
    let mut out = vec![Complex::new(0.0, 0.0); n];
    for (i, &x) in input.iter().enumerate() {
        out[i.reverse_bits() >> (usize::BITS - bits)] = x.into();
    }

    let mut len = 2;
    while len <= n {
        let half = len / 2;
        for start in (0..n).step_by(len) {
            for k in 0..half {
                let twiddle = Complex::from_polar(1.0, -2.0 * PI * k as f32 / len as f32);
                let even = out[start + k];
                let odd = twiddle * out[start + k + half];
                out[start + k] = (even + odd) * 0.5;
                out[start + k + half] = (even - odd) * 0.5;
            }
        }
        len *= 2;
    }

    Ok(out)
}

/// One-sided power spectrum: `|X[k]|^2` for `k` in `0..=W/2`.
pub fn power_spectrum(amplitudes: &[Complex<f32>]) -> Vec<f32> {
    amplitudes
        .iter()
        .take(amplitudes.len() / 2 + 1)
        .map(|c| c.norm_sqr())
        .collect()
}
