use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

use crate::config::FrequencyBand;
use crate::detector::PitchEstimate;
use crate::utils::buffer::{copy_complex_to_real, copy_real_to_complex, modulus_squared, square_sum};
use crate::utils::buffer::{new_complex_buffer, new_real_buffer, ComplexComponent};
use crate::utils::filters::hann_windowed;
use crate::utils::peak::{choose_peak, correct_peak, detect_peaks, PeakCorrection};

/// Energy below which a buffer is treated as silent by the lag-domain estimators.
pub const SILENCE_ENERGY: f64 = 1e-10;

/// Forward FFT of `signal`, zero-padded to `size`.
pub fn forward_fft(signal: &[f64], size: usize) -> Vec<Complex<f64>> {
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(size);
    let mut buffer = new_complex_buffer(size);
    copy_real_to_complex(&signal[..signal.len().min(size)], &mut buffer, ComplexComponent::Re);
    fft.process(&mut buffer);
    buffer
}

/// Magnitudes of the non-negative frequency bins of the Hann-windowed
/// `signal`, zero-padded to `fft_size`.
pub fn magnitude_spectrum(signal: &[f64], fft_size: usize) -> Vec<f64> {
    let spectrum = forward_fft(&hann_windowed(signal), fft_size);
    spectrum[..fft_size / 2 + 1].iter().map(|c| c.norm()).collect()
}

/// Linear interpolation of `values` at fractional index `position`; zero
/// outside the slice.
pub fn interpolate(values: &[f64], position: f64) -> f64 {
    if position < 0.0 || values.is_empty() {
        return 0.0;
    }
    let lo = position.floor() as usize;
    if lo + 1 >= values.len() {
        return if lo < values.len() { values[lo] } else { 0.0 };
    }
    let frac = position - lo as f64;
    values[lo] + (values[lo + 1] - values[lo]) * frac
}

/// Compute the linear (non-circular) autocorrelation of `signal` into
/// `result`, for lags `0..result.len()`.
pub fn autocorrelation(signal: &[f64], result: &mut [f64]) {
    let size = (2 * signal.len()).next_power_of_two();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(size);
    let inv_fft = planner.plan_fft_inverse(size);

    let mut signal_complex = new_complex_buffer(size);
    copy_real_to_complex(signal, &mut signal_complex, ComplexComponent::Re);
    fft.process(&mut signal_complex);
    modulus_squared(&mut signal_complex);
    inv_fft.process(&mut signal_complex);

    // rustfft does not normalise, so the round trip is scaled by `size`.
    let scale = 1.0 / size as f64;
    let n = result.len().min(signal.len());
    copy_complex_to_real(&signal_complex[..n], result, ComplexComponent::Re);
    result[..n].iter_mut().for_each(|r| *r *= scale);
}

/// McLeod's normalized square difference function,
///
/// > n(t) = 2 r(t) / m(t),  m(t) = sum_{i=0}^{N-1-t} (x_i^2 + x_{i+t}^2)
///
/// for lags `0..result.len()`. Values lie in `[-1, 1]`.
pub fn normalized_square_difference(signal: &[f64], result: &mut [f64]) {
    autocorrelation(signal, result);

    let n = signal.len();
    let mut m = 2.0 * square_sum(signal);
    for (tau, r) in result.iter_mut().enumerate() {
        if tau >= n {
            *r = 0.0;
            continue;
        }
        if tau > 0 {
            let head = signal[tau - 1];
            let tail = signal[n - tau];
            m -= head * head + tail * tail;
        }
        *r = if m > SILENCE_ENERGY { 2.0 * *r / m } else { 0.0 };
    }
}

/// Compute the windowed autocorrelation of `signal` and put the result in `result`.
/// For a signal _x=(x_0,x_1,...)_, the windowed autocorrelation with window size _w_ is
/// the function
///
/// > r(t) = sum_{i=0}^{w-1} x_i*x_{i+t}
///
/// This function assumes `window_size` is at most half of the length of `signal`.
pub fn windowed_autocorrelation(signal: &[f64], window_size: usize, result: &mut [f64]) {
    assert!(
        2 * window_size <= signal.len(),
        "The window size cannot be more than half the signal length"
    );

    let size = signal.len().next_power_of_two();
    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(size);
    let inv_fft = planner.plan_fft_inverse(size);

    let mut signal_complex = new_complex_buffer(size);
    let mut truncated_signal_complex = new_complex_buffer(size);

    // The windowed autocorrelation is the cross correlation between the
    // original signal and the signal truncated to lie in `0..window_size`.
    copy_real_to_complex(signal, &mut signal_complex, ComplexComponent::Re);
    copy_real_to_complex(
        &signal[..window_size],
        &mut truncated_signal_complex,
        ComplexComponent::Re,
    );
    fft.process(&mut signal_complex);
    fft.process(&mut truncated_signal_complex);
    let normalization_const = 1.0 / size as f64;
    signal_complex
        .iter_mut()
        .zip(truncated_signal_complex.iter())
        .for_each(|(a, b)| {
            *a = *a * normalization_const * b.conj();
        });
    inv_fft.process(&mut signal_complex);

    // The result is valid only for `0..window_size`
    let n = window_size.min(result.len());
    copy_complex_to_real(&signal_complex[..n], result, ComplexComponent::Re);
}

/// Compute the windowed square error, _d(t)_, of `signal`. For a window size of _w_ and a signal
/// _x=(x_0,x_1,...)_, this is defined by
///
///  > d(t) = sum_{i=0}^{w-1} (x_i - x_{i+t})^2
///
/// This function is computed efficiently using an FFT. It is assumed that `window_size` is at most half
/// the length of `signal`, and `result` is at most `window_size` long.
pub fn windowed_square_error(signal: &[f64], window_size: usize, result: &mut [f64]) {
    // d(t) = pow_0^w + pow_t^{t+w} - 2*windowed_autocorrelation(t)
    // where pow_a^b is the sum of the square of `signal` on the window `a..b`
    windowed_autocorrelation(signal, window_size, result);
    let mut windowed_power = square_sum(&signal[..window_size]);
    let power = windowed_power;

    result.iter_mut().enumerate().for_each(|(i, a)| {
        *a = (power + windowed_power - 2.0 * *a).max(0.0);
        // pow_{t+1}^{t+1+w} follows from pow_t^{t+w} by swapping the boundary terms.
        windowed_power = windowed_power - signal[i] * signal[i]
            + signal[i + window_size] * signal[i + window_size];
    })
}

/// Calculate the "cumulative mean normalized difference function" as
/// specified in the YIN paper. If _d(t)_ is the square error function,
/// compute _d'(0) = 1_ and for _t > 0_
///
///  > d'(t) = d(t) / [ (1/t) * sum_{i=1}^t d(i) ]
pub fn yin_normalize_square_error(square_error: &mut [f64]) {
    if square_error.is_empty() {
        return;
    }
    let mut sum = 0.0;
    square_error[0] = 1.0;
    square_error
        .iter_mut()
        .enumerate()
        .skip(1)
        .for_each(|(tau, a)| {
            sum += *a;
            *a = if sum > 0.0 {
                *a * tau as f64 / sum
            } else {
                1.0
            };
        });
}

/// Pick the first key maximum of a lag-domain periodicity function whose
/// value reaches `threshold_ratio` times the highest key maximum in `band`,
/// and refine it by quadratic interpolation. The confidence is the value of
/// the interpolated peak.
pub fn pitch_from_peaks(
    input: &[f64],
    sample_rate: usize,
    band: FrequencyBand,
    threshold_ratio: f64,
    correction: PeakCorrection,
) -> PitchEstimate {
    let (min_lag, max_lag) = (band.min_lag(sample_rate), band.max_lag(sample_rate));
    let in_band = |&(idx, _): &(usize, f64)| idx >= min_lag && idx <= max_lag;

    let global_max = detect_peaks(input)
        .filter(in_band)
        .map(|(_, val)| val)
        .fold(f64::NEG_INFINITY, f64::max);
    if !(global_max > 0.0) {
        return PitchEstimate::none();
    }

    choose_peak(detect_peaks(input).filter(in_band), threshold_ratio * global_max)
        .map(|peak| correct_peak(peak, input, correction))
        .map(|(lag, value)| PitchEstimate::new(sample_rate as f64 / lag, value))
        .unwrap_or_else(PitchEstimate::none)
}

/// A scratch buffer long enough for every lag of interest in `band`, capped
/// at `limit`.
pub fn lag_buffer(band: FrequencyBand, sample_rate: usize, limit: usize) -> Vec<f64> {
    new_real_buffer((band.max_lag(sample_rate) * 2).min(limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windowed_autocorrelation_test() {
        let signal: Vec<f64> = vec![0., 1., 2., 0., -1., -2.];
        let window_size: usize = 3;

        let result: Vec<f64> = (0..window_size)
            .map(|i| {
                signal[..window_size]
                    .iter()
                    .zip(signal[i..(i + window_size)].iter())
                    .map(|(a, b)| *a * *b)
                    .sum()
            })
            .collect();

        let mut computed_result = vec![0.; window_size];
        windowed_autocorrelation(&signal, window_size, &mut computed_result);
        // Using an FFT loses precision; we don't care that much, so round generously.
        computed_result
            .iter_mut()
            .for_each(|x| *x = (*x * 100.).round() / 100.);

        assert_eq!(result, computed_result);
    }

    #[test]
    fn windowed_square_error_test() {
        let signal: Vec<f64> = vec![0., 1., 2., 0., -1., -2.];
        let window_size: usize = 3;

        let result: Vec<f64> = (0..window_size)
            .map(|i| {
                signal[..window_size]
                    .iter()
                    .zip(signal[i..(i + window_size)].iter())
                    .map(|(x_j, x_j_tau)| (*x_j - *x_j_tau) * (*x_j - *x_j_tau))
                    .sum()
            })
            .collect();

        let mut computed_result = vec![0.; window_size];
        windowed_square_error(&signal, window_size, &mut computed_result);
        computed_result
            .iter_mut()
            .for_each(|x| *x = (*x * 100.).round() / 100.);

        assert_eq!(result, computed_result);
    }

    #[test]
    fn yin_normalized_square_error_test() {
        let signal: &mut Vec<f64> = &mut vec![0., 6., 14.];
        let result = vec![1., 1., 2. * 14. / (6. + 14.)];

        yin_normalize_square_error(signal);

        assert_eq!(result, *signal);
    }

    #[test]
    fn autocorrelation_matches_direct_sum() {
        let signal = vec![1.0, -0.5, 0.25, 2.0, -1.0];
        let mut computed = vec![0.0; signal.len()];
        autocorrelation(&signal, &mut computed);
        for (lag, value) in computed.iter().enumerate() {
            let direct: f64 = (0..signal.len() - lag).map(|i| signal[i] * signal[i + lag]).sum();
            assert!((value - direct).abs() < 1e-9);
        }
    }

    #[test]
    fn nsdf_is_one_at_zero_lag_and_bounded() {
        let signal: Vec<f64> = (0..512).map(|i| (i as f64 * 0.3).sin() + 0.2 * (i as f64 * 0.7).cos()).collect();
        let mut nsdf = vec![0.0; 256];
        normalized_square_difference(&signal, &mut nsdf);
        assert!((nsdf[0] - 1.0).abs() < 1e-9);
        assert!(nsdf.iter().all(|v| *v <= 1.0 + 1e-9 && *v >= -1.0 - 1e-9));
    }

    #[test]
    fn interpolation_between_bins() {
        let values = [0.0, 2.0, 4.0];
        assert_eq!(interpolate(&values, 0.5), 1.0);
        assert_eq!(interpolate(&values, 2.0), 4.0);
        assert_eq!(interpolate(&values, 3.5), 0.0);
        assert_eq!(interpolate(&values, -1.0), 0.0);
    }
}
