//! Per-bin statistical reduction
//!
//! Samples are grouped by their assigned bin and reduced to a mean plus
//! either independent standard deviations (scalar statistics) or a full
//! covariance matrix (vector-covariance statistics). Sample weights are 1
//! for count-weighted reduction and the local time step for time-weighted
//! reduction.

use crate::error::PhaseAverageError;
use crate::result::{CovarianceMatrix, Dispersion};
use crate::series::SampleSeries;
use crate::Result;
use std::fmt;

/// Statistics computed per bin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatisticsMode {
    /// Mean and population standard deviation of each component
    Scalar,
    /// Mean vector and unbiased covariance matrix across components
    VectorCovariance,
}

impl Default for StatisticsMode {
    fn default() -> Self {
        StatisticsMode::Scalar
    }
}

impl fmt::Display for StatisticsMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatisticsMode::Scalar => write!(f, "scalar"),
            StatisticsMode::VectorCovariance => write!(f, "covariance"),
        }
    }
}

/// How samples are weighted within a bin
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReductionMode {
    /// Every sample counts once
    CountWeighted,
    /// Samples are weighted by their time step, compensating uneven sampling
    TimeWeighted,
}

impl Default for ReductionMode {
    fn default() -> Self {
        ReductionMode::CountWeighted
    }
}

impl fmt::Display for ReductionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReductionMode::CountWeighted => write!(f, "count"),
            ReductionMode::TimeWeighted => write!(f, "time"),
        }
    }
}

/// Value reported for statistics that have no samples to work with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyBinPolicy {
    /// Report zeros, keeping arrays free of NaN
    Zero,
    /// Report NaN
    Nan,
}

impl EmptyBinPolicy {
    /// Default convention for a statistics mode
    pub fn default_for(statistics: StatisticsMode) -> Self {
        match statistics {
            StatisticsMode::Scalar => EmptyBinPolicy::Zero,
            StatisticsMode::VectorCovariance => EmptyBinPolicy::Nan,
        }
    }

    pub fn fill_value(&self) -> f64 {
        match self {
            EmptyBinPolicy::Zero => 0.0,
            EmptyBinPolicy::Nan => f64::NAN,
        }
    }
}

/// Reduced statistics of one bin, before midpoints are attached
#[derive(Debug, Clone, PartialEq)]
pub struct BinStatistics {
    pub mean: Vec<f64>,
    pub dispersion: Dispersion,
    pub count: usize,
    pub weight: f64,
}

/// Reduces grouped samples to per-bin statistics
#[derive(Debug, Clone, Copy)]
pub struct BinnedReducer {
    statistics: StatisticsMode,
    reduction: ReductionMode,
    empty_bins: EmptyBinPolicy,
}

impl BinnedReducer {
    pub fn new(
        statistics: StatisticsMode,
        reduction: ReductionMode,
        empty_bins: EmptyBinPolicy,
    ) -> Self {
        Self {
            statistics,
            reduction,
            empty_bins,
        }
    }

    /// Reduce `series` given the bin of every sample.
    ///
    /// Returns one entry per bin in bin order.
    pub fn reduce(
        &self,
        series: &SampleSeries<'_>,
        assignments: &[usize],
        number_of_bins: usize,
    ) -> Result<Vec<BinStatistics>> {
        if assignments.len() != series.len() {
            return Err(PhaseAverageError::length_mismatch(
                "bin assignments",
                series.len(),
                assignments.len(),
            ));
        }

        let weights: Vec<f64> = match self.reduction {
            ReductionMode::CountWeighted => vec![1.0; series.len()],
            ReductionMode::TimeWeighted => series
                .dt()
                .ok_or_else(|| {
                    PhaseAverageError::invalid_parameter(
                        "time-weighted reduction requires per-sample dt",
                    )
                })?
                .to_vec(),
        };

        let mut groups: Vec<Vec<usize>> = vec![Vec::new(); number_of_bins];
        for (sample, &bin) in assignments.iter().enumerate() {
            let group = groups.get_mut(bin).ok_or_else(|| {
                PhaseAverageError::invalid_parameter(format!(
                    "bin index {} out of range for {} bins",
                    bin, number_of_bins
                ))
            })?;
            group.push(sample);
        }

        Ok(groups
            .iter()
            .map(|members| self.reduce_group(series, &weights, members))
            .collect())
    }

    fn reduce_group(
        &self,
        series: &SampleSeries<'_>,
        weights: &[f64],
        members: &[usize],
    ) -> BinStatistics {
        let k = series.components();
        let fill = self.empty_bins.fill_value();
        let weight: f64 = members.iter().map(|&i| weights[i]).sum();

        let mean = if members.is_empty() || weight <= 0.0 {
            vec![fill; k]
        } else {
            weighted_mean(series, weights, members, weight)
        };

        let dispersion = match self.statistics {
            StatisticsMode::Scalar => {
                Dispersion::Std(self.component_std(series, weights, members, weight, &mean))
            }
            StatisticsMode::VectorCovariance => {
                Dispersion::Covariance(self.covariance(series, weights, members, weight, &mean))
            }
        };

        BinStatistics {
            mean,
            dispersion,
            count: members.len(),
            weight,
        }
    }

    /// Weighted population standard deviation per component
    fn component_std(
        &self,
        series: &SampleSeries<'_>,
        weights: &[f64],
        members: &[usize],
        weight: f64,
        mean: &[f64],
    ) -> Vec<f64> {
        if members.is_empty() || weight <= 0.0 {
            return vec![self.empty_bins.fill_value(); series.components()];
        }

        let mut sum_sq = vec![0.0; series.components()];
        for &i in members {
            for (c, &x) in series.sample(i).iter().enumerate() {
                let d = x - mean[c];
                sum_sq[c] += weights[i] * d * d;
            }
        }
        sum_sq.into_iter().map(|s| (s / weight).sqrt()).collect()
    }

    /// Unbiased covariance of the centred component vectors.
    ///
    /// With uniform weights the normalization is `n - 1`; with general
    /// weights it is `W - sum(w^2) / W`.
    fn covariance(
        &self,
        series: &SampleSeries<'_>,
        weights: &[f64],
        members: &[usize],
        weight: f64,
        mean: &[f64],
    ) -> CovarianceMatrix {
        let k = series.components();
        let fill = self.empty_bins.fill_value();

        let denominator = match self.reduction {
            ReductionMode::CountWeighted => members.len() as f64 - 1.0,
            ReductionMode::TimeWeighted if weight > 0.0 => {
                let sum_sq: f64 = members.iter().map(|&i| weights[i] * weights[i]).sum();
                weight - sum_sq / weight
            }
            ReductionMode::TimeWeighted => 0.0,
        };
        if members.len() < 2 || denominator <= 0.0 {
            return CovarianceMatrix::filled(k, fill);
        }

        let mut data = vec![0.0; k * k];
        let mut centred = vec![0.0; k];
        for &i in members {
            for (c, &x) in series.sample(i).iter().enumerate() {
                centred[c] = x - mean[c];
            }
            for row in 0..k {
                for col in row..k {
                    data[row * k + col] += weights[i] * centred[row] * centred[col];
                }
            }
        }
        for row in 0..k {
            for col in row..k {
                let value = data[row * k + col] / denominator;
                data[row * k + col] = value;
                data[col * k + row] = value;
            }
        }

        CovarianceMatrix::from_row_major(k, data)
    }
}

/// Weighted mean per component, accumulated relative to the first member so
/// constant inputs reproduce their value exactly.
fn weighted_mean(
    series: &SampleSeries<'_>,
    weights: &[f64],
    members: &[usize],
    weight: f64,
) -> Vec<f64> {
    let reference = series.sample(members[0]);
    let mut sum = vec![0.0; series.components()];
    for &i in members {
        for (c, &x) in series.sample(i).iter().enumerate() {
            sum[c] += weights[i] * (x - reference[c]);
        }
    }
    reference
        .iter()
        .zip(sum)
        .map(|(&r, s)| r + s / weight)
        .collect()
}
