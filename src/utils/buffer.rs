use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;

pub enum ComplexComponent {
    Re,
    Im,
}

pub fn new_real_buffer(size: usize) -> Vec<f64> {
    vec![0.0; size]
}

pub fn new_complex_buffer(size: usize) -> Vec<Complex<f64>> {
    vec![Complex::zero(); size]
}

/// Copy `input` into one component of `output`, zeroing the other component
/// and everything past `input.len()`.
pub fn copy_real_to_complex(input: &[f64], output: &mut [Complex<f64>], component: ComplexComponent) {
    assert!(input.len() <= output.len());
    match component {
        ComplexComponent::Re => input.iter().zip(output.iter_mut()).for_each(|(i, o)| {
            o.re = *i;
            o.im = 0.0;
        }),
        ComplexComponent::Im => input.iter().zip(output.iter_mut()).for_each(|(i, o)| {
            o.im = *i;
            o.re = 0.0;
        }),
    }
    output[input.len()..]
        .iter_mut()
        .for_each(|o| *o = Complex::zero())
}

pub fn copy_complex_to_real(input: &[Complex<f64>], output: &mut [f64], component: ComplexComponent) {
    let n = input.len().min(output.len());
    match component {
        ComplexComponent::Re => input[..n]
            .iter()
            .map(|c| c.re)
            .zip(output.iter_mut())
            .for_each(|(i, o)| *o = i),
        ComplexComponent::Im => input[..n]
            .iter()
            .map(|c| c.im)
            .zip(output.iter_mut())
            .for_each(|(i, o)| *o = i),
    }

    output[n..].iter_mut().for_each(|o| *o = 0.0);
}

/// Computes |x|^2 for each complex value x in `arr`. This function
/// modifies `arr` in place and leaves the complex component zero.
pub fn modulus_squared(arr: &mut [Complex<f64>]) {
    for s in arr {
        s.re = s.re * s.re + s.im * s.im;
        s.im = 0.0;
    }
}

/// Compute the sum of the square of each element of `arr`.
pub fn square_sum(arr: &[f64]) -> f64 {
    arr.iter().map(|&s| s * s).sum::<f64>()
}

/// Root mean square of `arr`; zero for an empty slice.
pub fn rms(arr: &[f64]) -> f64 {
    if arr.is_empty() {
        return 0.0;
    }
    (square_sum(arr) / arr.len() as f64).sqrt()
}

/// Largest absolute sample value.
pub fn peak_amplitude(arr: &[f64]) -> f64 {
    arr.iter().fold(0.0, |acc: f64, &s| acc.max(s.abs()))
}

/// The centred sub-slice of `signal` that is at most `size` samples long.
pub fn centered_window(signal: &[f64], size: usize) -> &[f64] {
    if signal.len() <= size {
        return signal;
    }
    let start = (signal.len() - size) / 2;
    &signal[start..start + size]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_round_trip_zero_pads() {
        let input = [1.0, -2.0, 3.0];
        let mut complex = new_complex_buffer(5);
        copy_real_to_complex(&input, &mut complex, ComplexComponent::Re);
        assert_eq!(complex[3], Complex::zero());

        let mut output = new_real_buffer(6);
        copy_complex_to_real(&complex, &mut output, ComplexComponent::Re);
        assert_eq!(output, vec![1.0, -2.0, 3.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn modulus_squared_clears_imaginary_part() {
        let mut arr = vec![Complex::new(3.0, 4.0), Complex::new(0.0, -2.0)];
        modulus_squared(&mut arr);
        assert_eq!(arr, vec![Complex::new(25.0, 0.0), Complex::new(4.0, 0.0)]);
    }

    #[test]
    fn rms_and_peak() {
        assert_eq!(rms(&[]), 0.0);
        assert_eq!(rms(&[3.0, -3.0]), 3.0);
        assert_eq!(peak_amplitude(&[0.2, -0.7, 0.5]), 0.7);
    }

    #[test]
    fn centered_window_takes_the_middle() {
        let signal: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert_eq!(centered_window(&signal, 4), &[3.0, 4.0, 5.0, 6.0]);
        assert_eq!(centered_window(&signal, 20).len(), 10);
    }
}
