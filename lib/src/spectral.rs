//! Spectral estimation of the signal phase at the folding frequency
//!
//! The phase-offset correction assumes a single dominant periodic component
//! at the folding frequency and near-uniform sampling. Multi-tone or noisy
//! signals give an unreliable correction; the estimate is not refined.

use crate::error::PhaseAverageError;
use crate::Result;
use num_complex::Complex64;
use realfft::RealFftPlanner;
use std::f64::consts::PI;

/// Maximum distance between the target frequency and a matching FFT bin
pub const FREQUENCY_TOLERANCE: f64 = 1e-3;

/// Degrees added to the FFT angle to obtain the phase correction
const CORRECTION_SHIFT_DEGREES: f64 = 90.0;

/// FFT frequency axis in conventional order: non-negative frequencies first,
/// then negative frequencies in increasing order.
///
/// `spacing` is the sample spacing, so the axis step is `1 / (n * spacing)`.
pub fn fft_frequencies(n: usize, spacing: f64) -> Vec<f64> {
    let scale = 1.0 / (n as f64 * spacing);
    let positive = (n.saturating_sub(1)) / 2 + 1;
    (0..n)
        .map(|k| {
            if k < positive {
                k as f64 * scale
            } else {
                -((n - k) as f64) * scale
            }
        })
        .collect()
}

/// Forward spectrum of a real signal together with its frequency axis
#[derive(Debug, Clone)]
pub struct PhaseSpectrum {
    /// Number of samples analyzed
    len: usize,
    /// Mean sample spacing
    spacing: f64,
    /// Non-negative half of the spectrum (`len / 2 + 1` bins)
    spectrum: Vec<Complex64>,
}

impl PhaseSpectrum {
    /// Analyze `signal` sampled at `time` using the mean time step as the
    /// sample spacing.
    pub fn analyze(time: &[f64], signal: &[f64]) -> Result<Self> {
        if time.len() != signal.len() {
            return Err(PhaseAverageError::length_mismatch(
                "signal",
                time.len(),
                signal.len(),
            ));
        }

        let len = time.len();
        if len < 2 {
            return Err(PhaseAverageError::invalid_parameter(format!(
                "spectral analysis needs at least 2 samples, got {}",
                len
            )));
        }

        let spacing = (time[len - 1] - time[0]) / (len - 1) as f64;
        if !spacing.is_finite() || spacing <= 0.0 {
            return Err(PhaseAverageError::invalid_parameter(format!(
                "time must increase to estimate a spectrum, mean step is {}",
                spacing
            )));
        }

        let mut planner = RealFftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(len);
        let mut input = signal.to_vec();
        let mut spectrum = fft.make_output_vec();
        fft.process(&mut input, &mut spectrum)
            .map_err(|e| PhaseAverageError::invalid_parameter(format!("FFT error: {}", e)))?;

        Ok(Self {
            len,
            spacing,
            spectrum,
        })
    }

    /// Frequency resolution of the analysis
    pub fn resolution(&self) -> f64 {
        1.0 / (self.len as f64 * self.spacing)
    }

    /// Full frequency axis in conventional FFT order
    pub fn frequencies(&self) -> Vec<f64> {
        fft_frequencies(self.len, self.spacing)
    }

    /// Complex FFT value at index `k` of the full (two-sided) spectrum
    fn value_at(&self, k: usize) -> Complex64 {
        if k < self.spectrum.len() {
            self.spectrum[k]
        } else {
            self.spectrum[self.len - k].conj()
        }
    }

    /// Index of the first FFT bin within tolerance of `frequency`
    pub fn resolve(&self, frequency: f64) -> Result<usize> {
        self.frequencies()
            .iter()
            .position(|&f| (f - frequency).abs() < FREQUENCY_TOLERANCE)
            .ok_or(PhaseAverageError::FrequencyNotResolved {
                frequency,
                resolution: self.resolution(),
            })
    }

    /// Angle of the FFT bin at `frequency`, in degrees
    pub fn angle_degrees(&self, frequency: f64) -> Result<f64> {
        let index = self.resolve(frequency)?;
        Ok(self.value_at(index).arg().to_degrees())
    }

    /// Frequency of the strongest non-DC bin, if the spectrum has one
    pub fn dominant_frequency(&self) -> Option<f64> {
        self.spectrum
            .iter()
            .enumerate()
            .skip(1)
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
            .map(|(k, _)| k as f64 * self.resolution())
    }
}

/// Phase correction in degrees to add to every sample phase before binning.
///
/// The correction is the FFT angle at `frequency` plus 90 degrees. Fails
/// with `FrequencyNotResolved` when no FFT bin lies within
/// [`FREQUENCY_TOLERANCE`] of `frequency`.
pub fn estimate_phase_correction(time: &[f64], signal: &[f64], frequency: f64) -> Result<f64> {
    let spectrum = PhaseSpectrum::analyze(time, signal).map_err(|e| match e {
        PhaseAverageError::InvalidParameter { .. }
            if time.len() < 2 && time.len() == signal.len() =>
        {
            PhaseAverageError::FrequencyNotResolved {
                frequency,
                resolution: f64::NAN,
            }
        }
        other => other,
    })?;

    let correction = spectrum.angle_degrees(frequency)? + CORRECTION_SHIFT_DEGREES;
    log::debug!(
        "Spectral phase correction at {} (resolution {:.6}): {:.3} degrees",
        frequency,
        spectrum.resolution(),
        correction
    );
    Ok(correction)
}

/// Amplitude and phase (radians) of `signal` at `frequency` by direct
/// projection onto `exp(-2*pi*i*f*t)`.
///
/// Unlike the FFT path this works for any frequency and any sampling.
pub fn amplitude_and_phase_at_frequency(
    time: &[f64],
    signal: &[f64],
    frequency: f64,
) -> Result<(f64, f64)> {
    if time.len() != signal.len() {
        return Err(PhaseAverageError::length_mismatch(
            "signal",
            time.len(),
            signal.len(),
        ));
    }
    if time.is_empty() {
        return Err(PhaseAverageError::invalid_parameter(
            "cannot project an empty signal",
        ));
    }

    let projection: Complex64 = time
        .iter()
        .zip(signal.iter())
        .map(|(&t, &y)| y * Complex64::from_polar(1.0, -2.0 * PI * frequency * t))
        .sum();

    let amplitude = 2.0 * projection.norm() / time.len() as f64;
    Ok((amplitude, projection.arg()))
}

/// Frequency of the strongest non-DC component of `signal`
pub fn dominant_frequency(time: &[f64], signal: &[f64]) -> Result<f64> {
    let spectrum = PhaseSpectrum::analyze(time, signal)?;
    spectrum.dominant_frequency().ok_or_else(|| {
        PhaseAverageError::invalid_parameter("signal too short to have a non-DC component")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sampled(n: usize, dt: f64, f: impl Fn(f64) -> f64) -> (Vec<f64>, Vec<f64>) {
        let time: Vec<f64> = (0..n).map(|i| i as f64 * dt).collect();
        let values = time.iter().map(|&t| f(t)).collect();
        (time, values)
    }

    #[test]
    fn test_fft_frequencies_even_and_odd() {
        let even = fft_frequencies(4, 0.25);
        assert_eq!(even, vec![0.0, 1.0, -2.0, -1.0]);

        let odd = fft_frequencies(5, 0.2);
        let expected = [0.0, 1.0, 2.0, -2.0, -1.0];
        for (a, e) in odd.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-12);
        }
    }

    #[test]
    fn test_sine_phase_correction() {
        // sin(2*pi*f*t) has FFT angle -90 degrees at f, so the correction is 0
        let (time, values) = sampled(200, 0.01, |t| (2.0 * PI * 2.0 * t).sin());
        let correction = estimate_phase_correction(&time, &values, 2.0).unwrap();
        println!("correction: {}", correction);
        assert!(correction.abs() < 1e-6, "correction {}", correction);
    }

    #[test]
    fn test_cosine_phase_correction() {
        let (time, values) = sampled(200, 0.01, |t| (2.0 * PI * 2.0 * t).cos());
        let correction = estimate_phase_correction(&time, &values, 2.0).unwrap();
        assert!((correction - 90.0).abs() < 1e-6, "correction {}", correction);
    }

    #[test]
    fn test_unresolved_frequency_is_an_error() {
        // Resolution is 0.5, so 1.3 lies between bins
        let (time, values) = sampled(200, 0.01, |t| (2.0 * PI * t).sin());
        let err = estimate_phase_correction(&time, &values, 1.3).unwrap_err();
        assert!(matches!(
            err,
            PhaseAverageError::FrequencyNotResolved { .. }
        ));

        let err = estimate_phase_correction(&[0.0], &[1.0], 1.0).unwrap_err();
        assert!(matches!(
            err,
            PhaseAverageError::FrequencyNotResolved { .. }
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let err = estimate_phase_correction(&[0.0, 1.0], &[1.0], 1.0).unwrap_err();
        assert!(matches!(err, PhaseAverageError::LengthMismatch { .. }));
    }

    #[test]
    fn test_amplitude_and_phase_projection() {
        let (time, values) = sampled(1000, 0.001, |t| 3.0 * (2.0 * PI * 5.0 * t + 0.4).cos());
        let (amplitude, phase) = amplitude_and_phase_at_frequency(&time, &values, 5.0).unwrap();
        assert!((amplitude - 3.0).abs() < 1e-6, "amplitude {}", amplitude);
        assert!((phase - 0.4).abs() < 1e-6, "phase {}", phase);
    }

    #[test]
    fn test_dominant_frequency() {
        let (time, values) = sampled(256, 1.0 / 64.0, |t| {
            1.0 + (2.0 * PI * 8.0 * t).sin() + 0.2 * (2.0 * PI * 3.0 * t).sin()
        });
        let f = dominant_frequency(&time, &values).unwrap();
        assert!((f - 8.0).abs() < 1e-9, "dominant {}", f);
    }
}
