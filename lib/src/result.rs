//! Phase-average result types and assembly
//!
//! Results are immutable values. Accessors convert units on demand without
//! touching the stored bins.

use crate::phase::PhaseUnit;
use std::fmt;

/// Square covariance matrix stored row-major
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceMatrix {
    dim: usize,
    data: Vec<f64>,
}

impl CovarianceMatrix {
    /// Matrix of `dim` x `dim` filled with `value`
    pub fn filled(dim: usize, value: f64) -> Self {
        Self {
            dim,
            data: vec![value; dim * dim],
        }
    }

    pub fn zeros(dim: usize) -> Self {
        Self::filled(dim, 0.0)
    }

    /// Undefined covariance (too few samples)
    pub fn nan(dim: usize) -> Self {
        Self::filled(dim, f64::NAN)
    }

    pub(crate) fn from_row_major(dim: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), dim * dim);
        Self { dim, data }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.dim + col]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.dim).map(|i| self.get(i, i)).collect()
    }

    /// Standard deviation per component (square root of the diagonal)
    pub fn std(&self) -> Vec<f64> {
        self.diagonal().into_iter().map(f64::sqrt).collect()
    }

    /// True if every entry is NaN
    pub fn is_undefined(&self) -> bool {
        self.data.iter().all(|v| v.is_nan())
    }
}

/// Spread of the samples in one bin
#[derive(Debug, Clone, PartialEq)]
pub enum Dispersion {
    /// Population standard deviation per component
    Std(Vec<f64>),
    /// Sample covariance across components
    Covariance(CovarianceMatrix),
}

impl Dispersion {
    /// Standard deviation of one component
    pub fn std(&self, component: usize) -> f64 {
        match self {
            Dispersion::Std(std) => std[component],
            Dispersion::Covariance(cov) => cov.get(component, component).sqrt(),
        }
    }

    /// Variance of one component
    pub fn variance(&self, component: usize) -> f64 {
        match self {
            Dispersion::Std(std) => std[component] * std[component],
            Dispersion::Covariance(cov) => cov.get(component, component),
        }
    }

    pub fn covariance(&self) -> Option<&CovarianceMatrix> {
        match self {
            Dispersion::Std(_) => None,
            Dispersion::Covariance(cov) => Some(cov),
        }
    }
}

/// Statistics of one phase bin
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseBin {
    /// Representative phase, in the result unit
    pub midpoint: f64,
    /// Mean per component
    pub mean: Vec<f64>,
    pub dispersion: Dispersion,
    /// Number of samples assigned to the bin
    pub count: usize,
    /// Sum of sample weights (equals `count` for count-weighted reduction)
    pub weight: f64,
}

/// Diagnostics collected while computing a result
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diagnostics {
    pub warnings: Vec<String>,
    /// Bins without any samples
    pub empty_bins: usize,
    /// Bins with fewer samples than the configured sparse threshold
    pub sparse_bins: usize,
    /// Spectral phase correction applied before binning, in the result unit
    pub phase_correction: Option<f64>,
    /// Bin-center offset actually used, in the result unit
    pub bin_center_offset: f64,
}

impl Diagnostics {
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Phase-averaged statistics, sorted by ascending midpoint
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseAverageResult {
    unit: PhaseUnit,
    components: usize,
    bins: Vec<PhaseBin>,
    has_wraparound_duplicate: bool,
    diagnostics: Diagnostics,
}

impl PhaseAverageResult {
    /// Sort bins by midpoint and optionally close the loop.
    ///
    /// With `include_wraparound` set and a bin centred exactly on 0, a copy
    /// of that bin is appended at one full period.
    pub fn assemble(
        mut bins: Vec<PhaseBin>,
        unit: PhaseUnit,
        components: usize,
        include_wraparound: bool,
        diagnostics: Diagnostics,
    ) -> Self {
        bins.sort_by(|a, b| a.midpoint.total_cmp(&b.midpoint));

        let duplicate = if include_wraparound {
            bins.first()
                .filter(|first| first.midpoint == 0.0)
                .map(|first| PhaseBin {
                    midpoint: unit.period(),
                    ..first.clone()
                })
        } else {
            None
        };

        let has_wraparound_duplicate = duplicate.is_some();
        bins.extend(duplicate);

        Self {
            unit,
            components,
            bins,
            has_wraparound_duplicate,
            diagnostics,
        }
    }

    pub fn unit(&self) -> PhaseUnit {
        self.unit
    }

    pub fn components(&self) -> usize {
        self.components
    }

    /// All bins, including the trailing wraparound duplicate if present
    pub fn bins(&self) -> &[PhaseBin] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn has_wraparound_duplicate(&self) -> bool {
        self.has_wraparound_duplicate
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Bin midpoints in the stored unit
    pub fn midpoints(&self) -> Vec<f64> {
        self.bins.iter().map(|bin| bin.midpoint).collect()
    }

    /// Bin midpoints converted to `unit`
    pub fn midpoints_in(&self, unit: PhaseUnit) -> Vec<f64> {
        self.bins
            .iter()
            .map(|bin| self.unit.convert(bin.midpoint, unit))
            .collect()
    }

    /// Bin midpoints as cycle fractions
    pub fn normalized_midpoints(&self) -> Vec<f64> {
        self.midpoints_in(PhaseUnit::Cycles)
    }

    /// Mean of one component per bin
    pub fn mean(&self, component: usize) -> Vec<f64> {
        self.bins.iter().map(|bin| bin.mean[component]).collect()
    }

    /// Standard deviation of one component per bin
    pub fn std(&self, component: usize) -> Vec<f64> {
        self.bins
            .iter()
            .map(|bin| bin.dispersion.std(component))
            .collect()
    }

    /// Variance of one component per bin
    pub fn variance(&self, component: usize) -> Vec<f64> {
        self.bins
            .iter()
            .map(|bin| bin.dispersion.variance(component))
            .collect()
    }

    /// Covariance matrix of bin `index`, for vector-covariance results
    pub fn covariance(&self, index: usize) -> Option<&CovarianceMatrix> {
        self.bins.get(index)?.dispersion.covariance()
    }

    pub fn counts(&self) -> Vec<usize> {
        self.bins.iter().map(|bin| bin.count).collect()
    }

    pub fn weights(&self) -> Vec<f64> {
        self.bins.iter().map(|bin| bin.weight).collect()
    }

    /// Number of samples binned, not counting the wraparound duplicate
    pub fn total_count(&self) -> usize {
        let distinct = if self.has_wraparound_duplicate {
            &self.bins[..self.bins.len() - 1]
        } else {
            &self.bins[..]
        };
        distinct.iter().map(|bin| bin.count).sum()
    }

    /// Human readable description of the result
    pub fn summary(&self) -> String {
        let populated: Vec<usize> = self
            .bins
            .iter()
            .map(|bin| bin.count)
            .filter(|&count| count > 0)
            .collect();
        let (min_count, max_count) = (
            populated.iter().min().copied().unwrap_or(0),
            populated.iter().max().copied().unwrap_or(0),
        );

        let mut text = format!(
            "Phase Average Result:\n\
             - Bins: {}{}\n\
             - Unit: {}\n\
             - Components: {}\n\
             - Samples: {}\n\
             - Samples per populated bin: {}..{}\n\
             - Empty bins: {}\n\
             - Sparse bins: {}\n\
             - Bin center offset: {:.4}",
            self.len(),
            if self.has_wraparound_duplicate {
                " (including wraparound)"
            } else {
                ""
            },
            self.unit,
            self.components,
            self.total_count(),
            min_count,
            max_count,
            self.diagnostics.empty_bins,
            self.diagnostics.sparse_bins,
            self.diagnostics.bin_center_offset,
        );

        if let Some(correction) = self.diagnostics.phase_correction {
            text.push_str(&format!("\n - Phase correction: {:.4}", correction));
        }
        for warning in &self.diagnostics.warnings {
            text.push_str(&format!("\n - Warning: {}", warning));
        }
        text
    }
}

impl fmt::Display for PhaseAverageResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}
