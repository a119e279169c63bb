use std::f64::consts::PI;

/// Second-order IIR section (RBJ cookbook coefficients, normalised so a0 = 1).
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    pub fn lowpass(cutoff: f64, q: f64, sample_rate: usize) -> Self {
        let w0 = 2.0 * PI * cutoff / sample_rate as f64;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q);
        let a0 = 1.0 + alpha;
        Biquad {
            b0: (1.0 - cos) / 2.0 / a0,
            b1: (1.0 - cos) / a0,
            b2: (1.0 - cos) / 2.0 / a0,
            a1: -2.0 * cos / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    /// Filter `signal` in place (transposed direct form II).
    pub fn process(&self, signal: &mut [f64]) {
        let (mut z1, mut z2) = (0.0, 0.0);
        for x in signal.iter_mut() {
            let input = *x;
            let output = self.b0 * input + z1;
            z1 = self.b1 * input - self.a1 * output + z2;
            z2 = self.b2 * input - self.a2 * output;
            *x = output;
        }
    }
}

/// Q factors of the second-order sections of an `order`-pole Butterworth
/// filter. Odd orders are rounded up.
fn butterworth_q(order: usize) -> Vec<f64> {
    let sections = order.max(2).div_ceil(2);
    let n = (sections * 2) as f64;
    (0..sections)
        .map(|k| 1.0 / (2.0 * (PI * (2 * k + 1) as f64 / (2.0 * n)).cos()))
        .collect()
}

/// Butterworth low-pass built from cascaded biquads. A cutoff outside
/// `(0, nyquist)` leaves the signal untouched.
pub fn butterworth_lowpass(signal: &[f64], cutoff: f64, order: usize, sample_rate: usize) -> Vec<f64> {
    let mut result = signal.to_vec();
    let nyquist = sample_rate as f64 / 2.0;
    if !(cutoff > 0.0 && cutoff < nyquist) {
        return result;
    }
    for q in butterworth_q(order) {
        Biquad::lowpass(cutoff, q, sample_rate).process(&mut result);
    }
    result
}

/// Symmetric Hann window coefficient `i` of `n`.
pub fn hann(n: usize, i: usize) -> f64 {
    if n <= 1 {
        return 1.0;
    }
    0.5 * (1.0 - (2.0 * PI * i as f64 / (n - 1) as f64).cos())
}

/// Copy of `signal` with a Hann window applied.
pub fn hann_windowed(signal: &[f64]) -> Vec<f64> {
    let n = signal.len();
    signal
        .iter()
        .enumerate()
        .map(|(i, &s)| s * hann(n, i))
        .collect()
}
