//! A-weighting, applied in the frequency domain.

use rustfft::FftPlanner;

use crate::detector::internals::forward_fft;

/// IEC 61672 A-weighting gain at `frequency_hz`, in dB (0 dB at 1 kHz).
pub fn a_weighting_db(frequency_hz: f64) -> f64 {
    if frequency_hz <= 0.0 {
        return f64::NEG_INFINITY;
    }
    let f2 = frequency_hz * frequency_hz;
    let numerator = 12194.0_f64.powi(2) * f2 * f2;
    let denominator = (f2 + 20.6_f64.powi(2))
        * ((f2 + 107.7_f64.powi(2)) * (f2 + 737.9_f64.powi(2))).sqrt()
        * (f2 + 12194.0_f64.powi(2));
    20.0 * (numerator / denominator).log10() + 2.0
}

/// Scale every spectral bin of `samples` by the A-weighting gain at its
/// frequency. The DC bin is removed.
pub fn a_weight(samples: &[f64], sample_rate: usize) -> Vec<f64> {
    if samples.is_empty() {
        return Vec::new();
    }
    let size = samples.len().next_power_of_two();
    let mut spectrum = forward_fft(samples, size);

    let bin_hz = sample_rate as f64 / size as f64;
    for k in 0..=size / 2 {
        let gain = match a_weighting_db(k as f64 * bin_hz) {
            db if db.is_finite() => 10f64.powf(db / 20.0),
            _ => 0.0,
        };
        spectrum[k] *= gain;
        // Keep the spectrum Hermitian so the result stays real.
        if k > 0 && k < size - k {
            spectrum[size - k] *= gain;
        }
    }

    let mut planner = FftPlanner::new();
    planner.plan_fft_inverse(size).process(&mut spectrum);

    let scale = 1.0 / size as f64;
    spectrum[..samples.len()].iter().map(|c| c.re * scale).collect()
}
