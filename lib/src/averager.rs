//! Phase averaging engine
//!
//! Folds a time record into one representative cycle of a known frequency:
//! samples are mapped to phases, optionally corrected by the spectral phase
//! estimate, assigned to bins and reduced per bin. Every call is a pure
//! function of its inputs.

use crate::error::PhaseAverageError;
use crate::grid::{resolve_bin_center_offset, BinGrid};
use crate::phase::{map_phases, shift_phases, PhaseUnit};
use crate::reduce::{BinnedReducer, EmptyBinPolicy, ReductionMode, StatisticsMode};
use crate::result::{Diagnostics, PhaseAverageResult, PhaseBin};
use crate::series::SampleSeries;
use crate::spectral::estimate_phase_correction;
use crate::Result;

/// Phase averaging configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseAverageConfig {
    /// Repetition frequency in cycles per time unit
    pub frequency: f64,
    /// Phase at t = 0, in `unit`
    pub phase_offset: f64,
    pub number_of_bins: usize,
    /// Shift of the bin centres in `unit`; `None` centres a bin on phase 0
    pub bin_center_offset: Option<f64>,
    /// Append a copy of the bin at phase 0 at one full period
    pub include_wraparound: bool,
    /// Correct phases by the spectral phase estimate at `frequency`
    pub remove_phase_offset: bool,
    pub unit: PhaseUnit,
    pub statistics: StatisticsMode,
    pub reduction: ReductionMode,
    /// `None` picks the convention of the statistics mode
    pub empty_bins: Option<EmptyBinPolicy>,
    /// Bins with fewer samples are reported as sparse
    pub sparse_bin_threshold: usize,
    /// Component fed to the spectral estimate for multi-component values
    pub reference_component: usize,
}

impl Default for PhaseAverageConfig {
    fn default() -> Self {
        Self {
            frequency: 1.0,
            phase_offset: 0.0,
            number_of_bins: 45,
            bin_center_offset: None,
            include_wraparound: true,
            remove_phase_offset: false,
            unit: PhaseUnit::Degrees,
            statistics: StatisticsMode::Scalar,
            reduction: ReductionMode::CountWeighted,
            empty_bins: None,
            sparse_bin_threshold: 2,
            reference_component: 0,
        }
    }
}

impl PhaseAverageConfig {
    /// Create a configuration for `frequency` with default settings
    pub fn new(frequency: f64) -> Result<Self> {
        let config = Self {
            frequency,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_bins(mut self, number_of_bins: usize) -> Self {
        self.number_of_bins = number_of_bins;
        self
    }

    pub fn with_bin_center_offset(mut self, offset: Option<f64>) -> Self {
        self.bin_center_offset = offset;
        self
    }

    pub fn with_phase_offset(mut self, phase_offset: f64) -> Self {
        self.phase_offset = phase_offset;
        self
    }

    pub fn with_unit(mut self, unit: PhaseUnit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_statistics(mut self, statistics: StatisticsMode) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn with_reduction(mut self, reduction: ReductionMode) -> Self {
        self.reduction = reduction;
        self
    }

    pub fn with_wraparound(mut self, include_wraparound: bool) -> Self {
        self.include_wraparound = include_wraparound;
        self
    }

    pub fn with_phase_offset_removal(mut self, remove_phase_offset: bool) -> Self {
        self.remove_phase_offset = remove_phase_offset;
        self
    }

    pub fn with_empty_bins(mut self, policy: EmptyBinPolicy) -> Self {
        self.empty_bins = Some(policy);
        self
    }

    /// Empty-bin convention in effect
    pub fn empty_bin_policy(&self) -> EmptyBinPolicy {
        self.empty_bins
            .unwrap_or_else(|| EmptyBinPolicy::default_for(self.statistics))
    }

    /// Check every parameter that does not depend on the input series
    pub fn validate(&self) -> Result<()> {
        if !self.frequency.is_finite() || self.frequency <= 0.0 {
            return Err(PhaseAverageError::invalid_parameter(format!(
                "frequency must be positive, got {}",
                self.frequency
            )));
        }
        if !self.phase_offset.is_finite() {
            return Err(PhaseAverageError::invalid_parameter(format!(
                "phase_offset must be finite, got {}",
                self.phase_offset
            )));
        }
        resolve_bin_center_offset(self.number_of_bins, self.bin_center_offset, self.unit)?;
        Ok(())
    }

    /// Check the configuration against a concrete series
    pub fn validate_for(&self, series: &SampleSeries<'_>) -> Result<()> {
        self.validate()?;
        if self.reduction == ReductionMode::TimeWeighted && series.dt().is_none() {
            return Err(PhaseAverageError::invalid_parameter(
                "time-weighted reduction requires per-sample dt",
            ));
        }
        if self.remove_phase_offset && self.reference_component >= series.components() {
            return Err(PhaseAverageError::invalid_parameter(format!(
                "reference component {} out of range for {} components",
                self.reference_component,
                series.components()
            )));
        }
        Ok(())
    }
}

/// Phase averager bound to one configuration
#[derive(Debug, Clone)]
pub struct PhaseAverager {
    config: PhaseAverageConfig,
}

impl PhaseAverager {
    /// Create a new averager, validating the configuration
    pub fn new(config: PhaseAverageConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Get the configuration
    pub fn config(&self) -> &PhaseAverageConfig {
        &self.config
    }

    /// Phase of every sample after offset and optional spectral correction.
    ///
    /// Returns the phases and the correction applied, in the configured unit.
    pub fn phases(&self, series: &SampleSeries<'_>) -> Result<(Vec<f64>, Option<f64>)> {
        let config = &self.config;
        let mut phases = map_phases(
            series.time(),
            config.frequency,
            config.phase_offset,
            config.unit,
        );

        if !config.remove_phase_offset || series.is_empty() {
            return Ok((phases, None));
        }

        let signal = series.component(config.reference_component);
        let correction_degrees =
            estimate_phase_correction(series.time(), &signal, config.frequency)?;
        let correction = PhaseUnit::Degrees.convert(correction_degrees, config.unit);
        shift_phases(&mut phases, correction, config.unit);
        Ok((phases, Some(correction)))
    }

    /// Phase average `series`
    pub fn average(&self, series: &SampleSeries<'_>) -> Result<PhaseAverageResult> {
        let config = &self.config;
        config.validate_for(series)?;

        let grid = BinGrid::new(config.number_of_bins, config.bin_center_offset, config.unit)?;
        let mut diagnostics = Diagnostics {
            bin_center_offset: grid.offset(),
            ..Diagnostics::default()
        };

        log::debug!(
            "Phase averaging {} samples ({} components) at frequency {}: {} bins, offset {} {}, {} statistics, {} weighting",
            series.len(),
            series.components(),
            config.frequency,
            grid.number_of_bins(),
            grid.offset(),
            config.unit,
            config.statistics,
            config.reduction
        );

        if series.is_empty() {
            diagnostics.warn("no samples to average; every bin is empty");
            if config.remove_phase_offset {
                diagnostics.warn("phase offset removal skipped for empty input");
            }
        }

        let (phases, correction) = self.phases(series)?;
        diagnostics.phase_correction = correction;

        let assignments = grid.assign(&phases);
        let reducer = BinnedReducer::new(
            config.statistics,
            config.reduction,
            config.empty_bin_policy(),
        );
        let statistics = reducer.reduce(series, &assignments, grid.number_of_bins())?;

        let bins: Vec<PhaseBin> = statistics
            .into_iter()
            .zip(grid.midpoints().iter())
            .map(|(stats, &midpoint)| PhaseBin {
                midpoint,
                mean: stats.mean,
                dispersion: stats.dispersion,
                count: stats.count,
                weight: stats.weight,
            })
            .collect();

        self.record_sparse_bins(&bins, &mut diagnostics);

        let result = PhaseAverageResult::assemble(
            bins,
            config.unit,
            series.components(),
            config.include_wraparound,
            diagnostics,
        );

        log::info!(
            "Phase average complete: {} bins, {} samples, {} empty, {} sparse",
            grid.number_of_bins(),
            result.total_count(),
            result.diagnostics().empty_bins,
            result.diagnostics().sparse_bins
        );

        Ok(result)
    }

    fn record_sparse_bins(&self, bins: &[PhaseBin], diagnostics: &mut Diagnostics) {
        let threshold = self.config.sparse_bin_threshold;
        diagnostics.empty_bins = bins.iter().filter(|bin| bin.count == 0).count();
        diagnostics.sparse_bins = bins.iter().filter(|bin| bin.count < threshold).count();

        if diagnostics.empty_bins > 0 {
            diagnostics.warn(format!(
                "{} of {} bins are empty",
                diagnostics.empty_bins,
                bins.len()
            ));
        }
        let sparse_populated = diagnostics.sparse_bins.saturating_sub(diagnostics.empty_bins);
        if sparse_populated > 0 {
            diagnostics.warn(format!(
                "{} populated bins have fewer than {} samples",
                sparse_populated, threshold
            ));
        }

        let weightless = bins
            .iter()
            .filter(|bin| bin.count > 0 && bin.weight <= 0.0)
            .count();
        if weightless > 0 {
            diagnostics.warn(format!(
                "{} bins have samples but zero total time step",
                weightless
            ));
        }
    }
}

/// Phase average `series` with `config`
pub fn phase_average(
    series: &SampleSeries<'_>,
    config: &PhaseAverageConfig,
) -> Result<PhaseAverageResult> {
    PhaseAverager::new(*config)?.average(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    fn cycles_config(bins: usize) -> PhaseAverageConfig {
        PhaseAverageConfig::new(1.0)
            .unwrap()
            .with_bins(bins)
            .with_bin_center_offset(Some(0.0))
            .with_unit(PhaseUnit::Cycles)
            .with_wraparound(false)
    }

    #[test]
    fn test_four_samples_four_bins() {
        let time = [0.0, 0.25, 0.5, 0.75];
        let values = [1.0, 2.0, 3.0, 4.0];
        let series = SampleSeries::scalar(&time, &values).unwrap();
        let result = phase_average(&series, &cycles_config(4)).unwrap();

        assert_eq!(result.midpoints(), vec![0.125, 0.375, 0.625, 0.875]);
        assert_eq!(result.mean(0), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(result.std(0), vec![0.0; 4]);
        assert_eq!(result.counts(), vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_no_sample_dropped_or_duplicated() {
        let mut rng = StdRng::seed_from_u64(7);
        let time: Vec<f64> = (0..500).map(|i| i as f64 * 0.013).collect();
        let values: Vec<f64> = time.iter().map(|_| rng.random::<f64>()).collect();
        let series = SampleSeries::scalar(&time, &values).unwrap();

        for bins in [1, 2, 5, 45] {
            for offset in [Some(0.0), None] {
                let config = PhaseAverageConfig::new(3.7)
                    .unwrap()
                    .with_bins(bins)
                    .with_bin_center_offset(offset)
                    .with_wraparound(false);
                let result = phase_average(&series, &config).unwrap();
                assert_eq!(result.counts().iter().sum::<usize>(), time.len());
                assert_eq!(result.len(), bins);
            }
        }
    }

    #[test]
    fn test_midpoints_ascending_with_wraparound_duplicate() {
        let time: Vec<f64> = (0..360).map(|i| i as f64 / 90.0).collect();
        let values: Vec<f64> = time.iter().map(|t| (2.0 * PI * t).sin()).collect();
        let series = SampleSeries::scalar(&time, &values).unwrap();
        let config = PhaseAverageConfig::new(1.0).unwrap().with_bins(8);
        let result = phase_average(&series, &config).unwrap();

        let midpoints = result.midpoints();
        assert_eq!(midpoints.len(), 9);
        assert_eq!(midpoints[0], 0.0);
        assert_eq!(midpoints[8], midpoints[0] + 360.0);
        assert!(midpoints[..8].windows(2).all(|w| w[0] < w[1]));
        assert!(result.has_wraparound_duplicate());
        assert_eq!(result.total_count(), time.len());
        assert_eq!(result.mean(0)[8], result.mean(0)[0]);
    }

    #[test]
    fn test_constant_series() {
        let time: Vec<f64> = (0..97).map(|i| i as f64 * 0.031).collect();
        let values = vec![3.7; time.len()];
        let series = SampleSeries::scalar(&time, &values).unwrap();
        let config = PhaseAverageConfig::new(2.3).unwrap().with_bins(12);
        let result = phase_average(&series, &config).unwrap();

        for bin in result.bins().iter().filter(|bin| bin.count > 0) {
            assert_eq!(bin.mean[0], 3.7);
            assert_eq!(bin.dispersion.std(0), 0.0);
        }
    }

    #[test]
    fn test_constant_vector_series_has_zero_covariance() {
        let time: Vec<f64> = (0..200).map(|i| i as f64 * 0.01).collect();
        let values: Vec<f64> = time.iter().flat_map(|_| [1.5, -2.0, 0.25]).collect();
        let series = SampleSeries::vector(&time, &values, 3).unwrap();
        let config = PhaseAverageConfig::new(1.0)
            .unwrap()
            .with_bins(10)
            .with_unit(PhaseUnit::Cycles)
            .with_statistics(StatisticsMode::VectorCovariance);
        let result = phase_average(&series, &config).unwrap();

        for (index, bin) in result.bins().iter().enumerate() {
            assert!(bin.count >= 2);
            let cov = result.covariance(index).unwrap();
            assert_eq!(cov.dim(), 3);
            assert!(cov.as_slice().iter().all(|&v| v == 0.0));
            assert_eq!(bin.mean, vec![1.5, -2.0, 0.25]);
        }
    }

    #[test]
    fn test_idempotent() {
        let mut rng = StdRng::seed_from_u64(11);
        let time: Vec<f64> = (0..300).map(|i| i as f64 * 0.02).collect();
        let values: Vec<f64> = (0..600).map(|_| rng.random::<f64>() - 0.5).collect();
        let series = SampleSeries::vector(&time, &values, 2).unwrap();
        let config = PhaseAverageConfig::new(1.3)
            .unwrap()
            .with_bins(9)
            .with_statistics(StatisticsMode::VectorCovariance);

        let first = phase_average(&series, &config).unwrap();
        let second = phase_average(&series, &config).unwrap();
        let bits = |r: &PhaseAverageResult| -> Vec<u64> {
            r.bins()
                .iter()
                .flat_map(|b| {
                    let mut v: Vec<u64> = b.mean.iter().map(|x| x.to_bits()).collect();
                    v.extend(b.dispersion.covariance().unwrap().as_slice().iter().map(|x| x.to_bits()));
                    v.push(b.midpoint.to_bits());
                    v.push(b.count as u64);
                    v
                })
                .collect()
        };
        assert_eq!(bits(&first), bits(&second));
    }

    #[test]
    fn test_uniform_dt_time_weighting_matches_count_weighting() {
        let mut rng = StdRng::seed_from_u64(3);
        let time: Vec<f64> = (0..400).map(|i| i as f64 * 0.1).collect();
        let values: Vec<f64> = time.iter().map(|_| rng.random::<f64>() * 10.0).collect();
        let dt = vec![0.1; time.len()];
        let series = SampleSeries::scalar(&time, &values)
            .unwrap()
            .with_dt(&dt)
            .unwrap();

        let config = PhaseAverageConfig::new(0.37).unwrap().with_bins(16);
        let counted = phase_average(&series, &config).unwrap();
        let timed =
            phase_average(&series, &config.with_reduction(ReductionMode::TimeWeighted)).unwrap();

        for (a, b) in counted.mean(0).iter().zip(timed.mean(0).iter()) {
            assert!((a - b).abs() < 1e-12, "{} vs {}", a, b);
        }
        assert_eq!(counted.counts(), timed.counts());
    }

    #[test]
    fn test_time_weighting_with_uneven_dt() {
        // Two samples share a bin; the second covers a much longer step
        let time = [0.0, 0.05, 0.5];
        let values = [1.0, 5.0, 9.0];
        let dt = [0.01, 0.3, 0.2];
        let series = SampleSeries::scalar(&time, &values)
            .unwrap()
            .with_dt(&dt)
            .unwrap();
        let config = cycles_config(2);

        let counted = phase_average(&series, &config).unwrap();
        let timed =
            phase_average(&series, &config.with_reduction(ReductionMode::TimeWeighted)).unwrap();
        assert!((counted.mean(0)[0] - 3.0).abs() < 1e-12);
        assert!((timed.mean(0)[0] - (0.01 + 1.5) / 0.31).abs() < 1e-12);
        assert!(counted.mean(0)[0] != timed.mean(0)[0]);
    }

    #[test]
    fn test_single_bin_spans_period() {
        let time: Vec<f64> = (0..50).map(|i| i as f64 * 0.07).collect();
        let values: Vec<f64> = (0..50).map(|i| i as f64).collect();
        let series = SampleSeries::scalar(&time, &values).unwrap();

        let config = PhaseAverageConfig::new(1.0).unwrap().with_bins(1);
        let result = phase_average(&series, &config).unwrap();
        assert_eq!(result.midpoints(), vec![180.0]);
        assert_eq!(result.counts(), vec![50]);
        assert!((result.mean(0)[0] - 24.5).abs() < 1e-12);

        let err = phase_average(&series, &config.with_bin_center_offset(Some(5.0))).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_invalid_parameters_fail_before_computation() {
        assert!(PhaseAverageConfig::new(0.0).is_err());
        assert!(PhaseAverageConfig::new(-2.0).is_err());
        assert!(PhaseAverageConfig::new(f64::NAN).is_err());

        let series = SampleSeries::scalar(&[0.0, 1.0], &[1.0, 2.0]).unwrap();
        let config = PhaseAverageConfig::default().with_bins(0);
        assert!(phase_average(&series, &config).is_err());

        let config = PhaseAverageConfig::default().with_bin_center_offset(Some(-3.0));
        assert!(phase_average(&series, &config).is_err());

        let config = PhaseAverageConfig::default().with_reduction(ReductionMode::TimeWeighted);
        assert!(phase_average(&series, &config).is_err());
    }

    #[test]
    fn test_empty_input_gives_empty_bins() {
        let series = SampleSeries::scalar(&[], &[]).unwrap();
        let config = PhaseAverageConfig::new(1.0)
            .unwrap()
            .with_bins(4)
            .with_phase_offset_removal(true);
        let result = phase_average(&series, &config).unwrap();

        assert_eq!(result.total_count(), 0);
        assert!(result.mean(0).iter().all(|&m| m == 0.0));
        assert!(result.std(0).iter().all(|&s| s == 0.0));
        assert_eq!(result.diagnostics().empty_bins, 4);
        assert!(!result.diagnostics().warnings.is_empty());
    }

    #[test]
    fn test_empty_bin_conventions() {
        // All samples at phase 0, leaving the other bins empty
        let time = [0.0, 1.0, 2.0];
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let series = SampleSeries::vector(&time, &values, 2).unwrap();
        let config = cycles_config(4).with_statistics(StatisticsMode::VectorCovariance);

        let result = phase_average(&series, &config).unwrap();
        assert_eq!(result.counts(), vec![3, 0, 0, 0]);
        assert!(result.mean(0)[1].is_nan());
        assert!(result.covariance(1).unwrap().is_undefined());
        assert_eq!(result.diagnostics().empty_bins, 3);
        assert_eq!(result.diagnostics().sparse_bins, 3);

        let zeroed = phase_average(&series, &config.with_empty_bins(EmptyBinPolicy::Zero)).unwrap();
        assert_eq!(zeroed.mean(1)[2], 0.0);
        assert!(zeroed.covariance(3).unwrap().as_slice().iter().all(|&v| v == 0.0));

        let scalar = phase_average(&series, &config.with_statistics(StatisticsMode::Scalar)).unwrap();
        assert_eq!(scalar.mean(0)[1], 0.0);
        assert_eq!(scalar.std(1), vec![(8.0f64 / 3.0).sqrt(), 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_sparse_bins_are_counted() {
        let time = [0.0, 0.3, 0.55, 0.6];
        let values = [1.0, 2.0, 3.0, 4.0];
        let series = SampleSeries::scalar(&time, &values).unwrap();
        let result = phase_average(&series, &cycles_config(4)).unwrap();
        assert_eq!(result.counts(), vec![1, 1, 2, 0]);
        assert_eq!(result.diagnostics().empty_bins, 1);
        assert_eq!(result.diagnostics().sparse_bins, 3);
    }

    #[test]
    fn test_phase_offset_removal_aligns_shifted_signals() {
        // The same waveform started at two different phases folds onto the
        // same cycle once the spectral correction is applied.
        let n = 400;
        let dt = 0.01;
        let time: Vec<f64> = (0..n).map(|i| i as f64 * dt).collect();
        let signal = |shift: f64| -> Vec<f64> {
            time.iter()
                .map(|&t| (2.0 * PI * 1.0 * t + shift).sin())
                .collect()
        };
        let a = signal(0.0);
        let b = signal(1.1);

        let config = PhaseAverageConfig::new(1.0)
            .unwrap()
            .with_bins(20)
            .with_phase_offset_removal(true);
        let ra = phase_average(&SampleSeries::scalar(&time, &a).unwrap(), &config).unwrap();
        let rb = phase_average(&SampleSeries::scalar(&time, &b).unwrap(), &config).unwrap();

        assert!(ra.diagnostics().phase_correction.unwrap().abs() < 1e-6);
        let expected = 1.1f64.to_degrees();
        let correction = rb.diagnostics().phase_correction.unwrap();
        assert!((correction - expected).abs() < 1e-6, "{} vs {}", correction, expected);

        for (x, y) in ra.mean(0).iter().zip(rb.mean(0).iter()) {
            assert!((x - y).abs() < 0.1, "{} vs {}", x, y);
        }
    }

    #[test]
    fn test_phase_offset_removal_unresolved_frequency() {
        let time: Vec<f64> = (0..200).map(|i| i as f64 * 0.01).collect();
        let values: Vec<f64> = time.iter().map(|t| (2.0 * PI * t).sin()).collect();
        let series = SampleSeries::scalar(&time, &values).unwrap();
        let config = PhaseAverageConfig::new(1.3)
            .unwrap()
            .with_phase_offset_removal(true);
        let err = phase_average(&series, &config).unwrap_err();
        assert!(matches!(err, PhaseAverageError::FrequencyNotResolved { .. }));
    }

    #[test]
    fn test_reference_component_out_of_range() {
        let time = [0.0, 0.5];
        let values = [1.0, 2.0, 3.0, 4.0];
        let series = SampleSeries::vector(&time, &values, 2).unwrap();
        let mut config = PhaseAverageConfig::new(1.0)
            .unwrap()
            .with_phase_offset_removal(true);
        config.reference_component = 2;
        assert!(phase_average(&series, &config).unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_degree_and_cycle_units_agree() {
        let time: Vec<f64> = (0..240).map(|i| i as f64 * 0.017).collect();
        let values: Vec<f64> = time.iter().map(|t| (2.0 * PI * 0.8 * t).cos() + t).collect();
        let series = SampleSeries::scalar(&time, &values).unwrap();

        let degrees = PhaseAverageConfig::new(0.8).unwrap().with_bins(6);
        let cycles = degrees.with_unit(PhaseUnit::Cycles);
        let rd = phase_average(&series, &degrees).unwrap();
        let rc = phase_average(&series, &cycles).unwrap();

        assert_eq!(rd.counts(), rc.counts());
        for (d, c) in rd.normalized_midpoints().iter().zip(rc.midpoints().iter()) {
            assert!((d - c).abs() < 1e-12);
        }
    }
}
