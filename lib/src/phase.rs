//! Phase mapping from absolute time to a position within one period
//!
//! Phases are expressed either in degrees over `[0, 360)` or as a cycle
//! fraction over `[0, 1)`.

use std::fmt;

/// Unit in which phases, phase offsets and bin midpoints are expressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseUnit {
    /// Full period is 360
    Degrees,
    /// Full period is 1
    Cycles,
}

impl Default for PhaseUnit {
    fn default() -> Self {
        PhaseUnit::Degrees
    }
}

impl fmt::Display for PhaseUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl PhaseUnit {
    /// Get all available units
    pub fn all() -> &'static [PhaseUnit] {
        &[PhaseUnit::Degrees, PhaseUnit::Cycles]
    }

    /// Get the name of the unit
    pub fn name(&self) -> &'static str {
        match self {
            PhaseUnit::Degrees => "degrees",
            PhaseUnit::Cycles => "cycles",
        }
    }

    /// Parse a unit from its name or a common abbreviation
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "degrees" | "degree" | "deg" => Some(PhaseUnit::Degrees),
            "cycles" | "cycle" | "unit" | "fraction" => Some(PhaseUnit::Cycles),
            _ => None,
        }
    }

    /// Length of one full period in this unit
    pub fn period(&self) -> f64 {
        match self {
            PhaseUnit::Degrees => 360.0,
            PhaseUnit::Cycles => 1.0,
        }
    }

    /// Convert a phase value expressed in this unit into `target`
    pub fn convert(&self, value: f64, target: PhaseUnit) -> f64 {
        if *self == target {
            value
        } else {
            value / self.period() * target.period()
        }
    }
}

/// Reduce a phase into `[0, period)`.
pub fn normalize_phase(value: f64, period: f64) -> f64 {
    let wrapped = value.rem_euclid(period);
    // rem_euclid can round up to `period` for tiny negative inputs
    if wrapped >= period {
        0.0
    } else {
        wrapped
    }
}

/// Map sample times to phases.
///
/// `phase[i] = normalize(frequency * time[i] * period + phase_offset)` where
/// `period` is 360 for degrees and 1 for cycles. Negative times wrap through
/// the modulo like any other value.
pub fn map_phases(time: &[f64], frequency: f64, phase_offset: f64, unit: PhaseUnit) -> Vec<f64> {
    let period = unit.period();
    time.iter()
        .map(|&t| normalize_phase(frequency * t * period + phase_offset, period))
        .collect()
}

/// Add a constant correction to already mapped phases, renormalizing in place.
pub fn shift_phases(phases: &mut [f64], correction: f64, unit: PhaseUnit) {
    let period = unit.period();
    for phase in phases.iter_mut() {
        *phase = normalize_phase(*phase + correction, period);
    }
}
