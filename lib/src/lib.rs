//! Phasefold Library
//!
//! A library for phase averaging periodic time series and time-varying
//! vector or tensor field samples. A long record is folded onto one cycle of
//! a known repetition frequency and reduced to per-phase-bin means,
//! dispersions and sample counts.

pub mod averager;
pub mod column_io;
pub mod error;
pub mod grid;
pub mod phase;
pub mod reduce;
pub mod result;
pub mod series;
pub mod spectral;
pub mod utils;

pub use averager::{phase_average, PhaseAverageConfig, PhaseAverager};
pub use error::PhaseAverageError;
pub use grid::BinGrid;
pub use phase::PhaseUnit;
pub use reduce::{EmptyBinPolicy, ReductionMode, StatisticsMode};
pub use result::{CovarianceMatrix, Diagnostics, Dispersion, PhaseAverageResult, PhaseBin};
pub use series::{OwnedSeries, SampleSeries};

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
///
/// Installs the environment logger when the `env_logger` feature is enabled.
/// Safe to call more than once.
pub fn init() {
    #[cfg(feature = "env_logger")]
    {
        let _ = env_logger::try_init();
    }
}

/// Result type for phase averaging operations
pub type Result<T> = std::result::Result<T, PhaseAverageError>;
