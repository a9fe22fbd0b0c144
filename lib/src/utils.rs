//! Utility functions for formatting, configuration presets and sanity checks
//!
//! Provides helpers used by client applications around the averaging engine.

use crate::averager::PhaseAverageConfig;
use crate::phase::PhaseUnit;
use crate::reduce::StatisticsMode;
use crate::series::SampleSeries;

/// Format a phase value for display
pub fn format_phase(value: f64, unit: PhaseUnit) -> String {
    match unit {
        PhaseUnit::Degrees => format!("{:.2} deg", value),
        PhaseUnit::Cycles => format!("{:.4} cyc", value),
    }
}

/// Format a frequency value for display
pub fn format_frequency(freq_hz: f64) -> String {
    if freq_hz >= 1000.0 {
        format!("{:.2} kHz", freq_hz / 1000.0)
    } else {
        format!("{:.3} Hz", freq_hz)
    }
}

/// Format a time value for display
pub fn format_time(time_sec: f64) -> String {
    if time_sec >= 60.0 {
        let minutes = (time_sec / 60.0).floor();
        let seconds = time_sec % 60.0;
        format!("{:.0}m {:.1}s", minutes, seconds)
    } else {
        format!("{:.3}s", time_sec)
    }
}

/// Number of full periods covered by the time span of a series
pub fn cycles_covered(series: &SampleSeries<'_>, frequency: f64) -> f64 {
    match (series.time().first(), series.time().last()) {
        (Some(first), Some(last)) => (last - first) * frequency,
        _ => 0.0,
    }
}

/// Get a configuration summary string
pub fn config_summary(config: &PhaseAverageConfig) -> String {
    let mut summary = String::new();
    summary.push_str("Phase Average Config:\n");
    summary.push_str(&format!(
        "  Frequency: {}\n",
        format_frequency(config.frequency)
    ));
    summary.push_str(&format!(
        "  Phase offset: {}\n",
        format_phase(config.phase_offset, config.unit)
    ));
    summary.push_str(&format!("  Bins: {}\n", config.number_of_bins));
    match config.bin_center_offset {
        Some(offset) => summary.push_str(&format!(
            "  Bin center offset: {}\n",
            format_phase(offset, config.unit)
        )),
        None => summary.push_str("  Bin center offset: half a bin (centred on 0)\n"),
    }
    summary.push_str(&format!("  Unit: {}\n", config.unit));
    summary.push_str(&format!("  Statistics: {}\n", config.statistics));
    summary.push_str(&format!("  Weighting: {}\n", config.reduction));
    summary.push_str(&format!(
        "  Empty bins: {:?}\n",
        config.empty_bin_policy()
    ));
    summary.push_str(&format!("  Wraparound bin: {}\n", config.include_wraparound));
    summary.push_str(&format!(
        "  Remove phase offset: {}\n",
        config.remove_phase_offset
    ));
    summary
}

/// Log warnings about a configuration that is valid but likely to give
/// unreliable statistics for `series`
pub fn check_config_for_series(config: &PhaseAverageConfig, series: &SampleSeries<'_>) {
    let cycles = cycles_covered(series, config.frequency);
    let samples_per_bin = series.len() as f64 / config.number_of_bins.max(1) as f64;

    log::info!("Phase average check:");
    log::info!("  Samples: {}", series.len());
    log::info!("  Cycles covered: {:.2}", cycles);
    log::info!("  Samples per bin: {:.1}", samples_per_bin);

    if cycles < 1.0 {
        log::warn!(
            "Series covers only {:.2} cycles at {}, bins will not be revisited",
            cycles,
            format_frequency(config.frequency)
        );
    }

    if samples_per_bin < config.sparse_bin_threshold as f64 {
        log::warn!(
            "Only {:.1} samples per bin on average, consider fewer bins",
            samples_per_bin
        );
    }

    let k = series.components();
    if config.statistics == StatisticsMode::VectorCovariance && k > 64 {
        log::warn!(
            "Covariance of {} components stores {} values per bin",
            k,
            k * k
        );
    }
}

/// Create commonly used phase averaging configurations
pub mod presets {
    use super::*;
    use crate::reduce::EmptyBinPolicy;

    /// Preset information structure
    pub struct PresetInfo {
        pub id: usize,
        pub name: &'static str,
        pub description: &'static str,
        pub config: PhaseAverageConfig,
    }

    /// Default
    pub fn default() -> PhaseAverageConfig {
        PhaseAverageConfig::default()
    }

    /// Blade passage time series: degrees, 45 bins centred on 0, closed loop
    pub fn blade_passage() -> PhaseAverageConfig {
        PhaseAverageConfig::default()
            .with_bins(45)
            .with_unit(PhaseUnit::Degrees)
            .with_wraparound(true)
    }

    /// Field samples: cycle fractions, covariance statistics, NaN for empty bins
    pub fn field() -> PhaseAverageConfig {
        PhaseAverageConfig::default()
            .with_bins(36)
            .with_unit(PhaseUnit::Cycles)
            .with_statistics(StatisticsMode::VectorCovariance)
            .with_empty_bins(EmptyBinPolicy::Nan)
            .with_wraparound(false)
    }

    /// Coarse overview with few, well populated bins
    pub fn coarse() -> PhaseAverageConfig {
        PhaseAverageConfig::default().with_bins(12)
    }

    /// List all presets with detailed info
    pub fn list_presets() -> Vec<PresetInfo> {
        vec![
            PresetInfo {
                id: 0,
                name: "default",
                description: "Degrees, 45 bins, scalar statistics",
                config: default(),
            },
            PresetInfo {
                id: 1,
                name: "blade_passage",
                description: "Degrees, 45 bins centred on 0, wraparound bin",
                config: blade_passage(),
            },
            PresetInfo {
                id: 2,
                name: "field",
                description: "Cycles, 36 bins, covariance, NaN empty bins",
                config: field(),
            },
            PresetInfo {
                id: 3,
                name: "coarse",
                description: "Degrees, 12 bins",
                config: coarse(),
            },
        ]
    }

    /// Find a preset by name or id
    pub fn find(key: &str) -> Option<PhaseAverageConfig> {
        let key = key.trim().to_ascii_lowercase();
        list_presets()
            .into_iter()
            .find(|preset| preset.name == key || preset.id.to_string() == key)
            .map(|preset| preset.config)
    }
}
