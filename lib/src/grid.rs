//! Phase bin grid construction
//!
//! A grid splits one full period into `number_of_bins` equal bins. With a
//! nonzero bin-center offset every bin is shifted by the offset, which makes
//! one bin straddle the period boundary. That bin is stored as two raw
//! intervals (one at the start and one at the end of the period) that map
//! to the same logical bin, so the raw intervals still partition
//! `[0, period)` without overlap.

use crate::error::PhaseAverageError;
use crate::phase::{normalize_phase, PhaseUnit};
use crate::Result;

/// Relative tolerance used to merge breakpoints and snap midpoints onto 0
const SNAP_TOLERANCE: f64 = 1e-12;

/// Bin edges and midpoints covering one period
#[derive(Debug, Clone)]
pub struct BinGrid {
    unit: PhaseUnit,
    number_of_bins: usize,
    offset: f64,
    /// Raw interval breakpoints, strictly increasing from 0 to the period
    edges: Vec<f64>,
    /// Logical bin of each raw interval `[edges[j], edges[j + 1])`
    interval_bins: Vec<usize>,
    /// Representative phase of each logical bin, in bin order (not sorted)
    midpoints: Vec<f64>,
}

/// Resolve the bin-center offset for a grid, validating explicit values.
///
/// `None` means half a bin width, except for a single bin where no offset is
/// allowed and the result is 0.
pub fn resolve_bin_center_offset(
    number_of_bins: usize,
    bin_center_offset: Option<f64>,
    unit: PhaseUnit,
) -> Result<f64> {
    if number_of_bins == 0 {
        return Err(PhaseAverageError::invalid_parameter(
            "number_of_bins must be at least 1",
        ));
    }

    let period = unit.period();
    let offset = match bin_center_offset {
        None if number_of_bins == 1 => return Ok(0.0),
        None => return Ok(period / (2.0 * number_of_bins as f64)),
        Some(offset) => offset,
    };

    if offset == 0.0 {
        return Ok(0.0);
    }
    if !offset.is_finite() {
        return Err(PhaseAverageError::invalid_parameter(format!(
            "bin_center_offset must be finite, got {}",
            offset
        )));
    }
    if offset < 0.0 {
        return Err(PhaseAverageError::invalid_parameter(format!(
            "bin_center_offset must be positive, got {}",
            offset
        )));
    }
    if number_of_bins == 1 {
        return Err(PhaseAverageError::invalid_parameter(
            "bin_center_offset must be 0 when number_of_bins is 1",
        ));
    }

    let limit = period / (number_of_bins - 1) as f64;
    if offset > limit {
        return Err(PhaseAverageError::invalid_parameter(format!(
            "bin_center_offset {} is larger than the allowed maximum {} {}",
            offset, limit, unit
        )));
    }

    Ok(offset)
}

/// Snap values within rounding distance of 0 or the period onto 0
fn snap_to_zero(value: f64, period: f64) -> f64 {
    let tolerance = SNAP_TOLERANCE * period;
    if value <= tolerance || period - value <= tolerance {
        0.0
    } else {
        value
    }
}

impl BinGrid {
    /// Build a grid of `number_of_bins` bins in `unit`, shifted by the
    /// resolved bin-center offset.
    pub fn new(
        number_of_bins: usize,
        bin_center_offset: Option<f64>,
        unit: PhaseUnit,
    ) -> Result<Self> {
        let offset = resolve_bin_center_offset(number_of_bins, bin_center_offset, unit)?;
        let period = unit.period();
        let count = number_of_bins as f64;

        // Base edges evenly spaced over [0, period]
        let base_edges: Vec<f64> = (0..=number_of_bins)
            .map(|k| {
                if k == number_of_bins {
                    period
                } else {
                    k as f64 * period / count
                }
            })
            .collect();
        let base_midpoints: Vec<f64> = base_edges.windows(2).map(|w| (w[0] + w[1]) * 0.5).collect();

        if offset == 0.0 {
            return Ok(Self {
                unit,
                number_of_bins,
                offset,
                edges: base_edges,
                interval_bins: (0..number_of_bins).collect(),
                midpoints: base_midpoints,
            });
        }

        let midpoints: Vec<f64> = base_midpoints
            .iter()
            .map(|&m| snap_to_zero(normalize_phase(m + offset, period), period))
            .collect();

        // Shifted lower edges, wrapped into the period, plus both period ends
        let mut edges = Vec::with_capacity(number_of_bins + 2);
        edges.push(0.0);
        for &edge in &base_edges[..number_of_bins] {
            let shifted = snap_to_zero(normalize_phase(edge + offset, period), period);
            if shifted > 0.0 {
                edges.push(shifted);
            }
        }
        edges.push(period);
        edges.sort_by(|a, b| a.total_cmp(b));
        edges.dedup_by(|a, b| (*a - *b).abs() <= SNAP_TOLERANCE * period);

        let width = period / count;
        let interval_bins = edges
            .windows(2)
            .map(|w| {
                let centre = (w[0] + w[1]) * 0.5;
                let position = normalize_phase(centre - offset, period) / width;
                (position.floor() as usize).min(number_of_bins - 1)
            })
            .collect();

        log::debug!(
            "Built shifted bin grid: {} bins, offset {} {}, {} raw intervals",
            number_of_bins,
            offset,
            unit,
            edges.len() - 1
        );

        Ok(Self {
            unit,
            number_of_bins,
            offset,
            edges,
            interval_bins,
            midpoints,
        })
    }

    /// Unit of the grid
    pub fn unit(&self) -> PhaseUnit {
        self.unit
    }

    /// Number of logical bins
    pub fn number_of_bins(&self) -> usize {
        self.number_of_bins
    }

    /// Width of every logical bin
    pub fn width(&self) -> f64 {
        self.unit.period() / self.number_of_bins as f64
    }

    /// Resolved bin-center offset
    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Raw interval breakpoints from 0 to the period
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Midpoint of each logical bin, in bin order
    pub fn midpoints(&self) -> &[f64] {
        &self.midpoints
    }

    /// Number of raw intervals (exceeds the bin count when one bin is split)
    pub fn num_intervals(&self) -> usize {
        self.interval_bins.len()
    }

    /// The logical bin split across the period boundary, if any
    pub fn wrap_bin(&self) -> Option<usize> {
        let first = *self.interval_bins.first()?;
        let last = *self.interval_bins.last()?;
        (self.num_intervals() > 1 && first == last).then_some(first)
    }

    /// Raw interval `j` with `edges[j] <= phase < edges[j + 1]`.
    ///
    /// Phases outside `[0, period)` are clamped to the first or last interval.
    pub fn interval_index(&self, phase: f64) -> usize {
        let above = self.edges.partition_point(|&edge| edge <= phase);
        above.saturating_sub(1).min(self.num_intervals() - 1)
    }

    /// Logical bin containing `phase`
    pub fn bin_index(&self, phase: f64) -> usize {
        self.interval_bins[self.interval_index(phase)]
    }

    /// Assign each phase to its logical bin
    pub fn assign(&self, phases: &[f64]) -> Vec<usize> {
        phases.iter().map(|&phase| self.bin_index(phase)).collect()
    }
}
