//! Sample series supplied to the phase averaging engine
//!
//! The engine reads a borrowed [`SampleSeries`]: a time column, values
//! stored row-major with a fixed component count, and an optional per-sample
//! time-step column. [`OwnedSeries`] keeps the same columns owned for
//! callers that load or crop data before averaging.

use crate::error::PhaseAverageError;
use crate::Result;

/// Borrowed view of a time series with scalar or multi-component values
#[derive(Debug, Clone, Copy)]
pub struct SampleSeries<'a> {
    time: &'a [f64],
    values: &'a [f64],
    components: usize,
    dt: Option<&'a [f64]>,
}

impl<'a> SampleSeries<'a> {
    /// Scalar series, one value per time sample
    pub fn scalar(time: &'a [f64], values: &'a [f64]) -> Result<Self> {
        Self::vector(time, values, 1)
    }

    /// Multi-component series; `values` holds `components` numbers per sample
    pub fn vector(time: &'a [f64], values: &'a [f64], components: usize) -> Result<Self> {
        if components == 0 {
            return Err(PhaseAverageError::invalid_parameter(
                "component count must be at least 1",
            ));
        }
        let expected = time.len() * components;
        if values.len() != expected {
            return Err(PhaseAverageError::length_mismatch(
                "values",
                expected,
                values.len(),
            ));
        }

        Ok(Self {
            time,
            values,
            components,
            dt: None,
        })
    }

    /// Attach per-sample time-step widths used by time-weighted reduction
    pub fn with_dt(mut self, dt: &'a [f64]) -> Result<Self> {
        if dt.len() != self.time.len() {
            return Err(PhaseAverageError::length_mismatch(
                "dt",
                self.time.len(),
                dt.len(),
            ));
        }
        if let Some(bad) = dt.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(PhaseAverageError::invalid_parameter(format!(
                "dt values must be finite and non-negative, got {}",
                bad
            )));
        }
        self.dt = Some(dt);
        Ok(self)
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    pub fn time(&self) -> &'a [f64] {
        self.time
    }

    /// Flat row-major values
    pub fn values(&self) -> &'a [f64] {
        self.values
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn dt(&self) -> Option<&'a [f64]> {
        self.dt
    }

    /// Value vector of sample `index`
    pub fn sample(&self, index: usize) -> &'a [f64] {
        let start = index * self.components;
        &self.values[start..start + self.components]
    }

    /// One component across all samples
    pub fn component(&self, component: usize) -> Vec<f64> {
        self.values
            .iter()
            .skip(component)
            .step_by(self.components)
            .copied()
            .collect()
    }
}

/// Owned time series columns
#[derive(Debug, Clone, Default)]
pub struct OwnedSeries {
    pub time: Vec<f64>,
    /// Row-major values, `components` per sample
    pub values: Vec<f64>,
    pub components: usize,
    pub dt: Option<Vec<f64>>,
}

impl OwnedSeries {
    pub fn new(time: Vec<f64>, values: Vec<f64>, components: usize) -> Result<Self> {
        SampleSeries::vector(&time, &values, components)?;
        Ok(Self {
            time,
            values,
            components,
            dt: None,
        })
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Borrow as a series for the engine, including `dt` when present
    pub fn as_series(&self) -> Result<SampleSeries<'_>> {
        let series = SampleSeries::vector(&self.time, &self.values, self.components)?;
        match &self.dt {
            Some(dt) => series.with_dt(dt),
            None => Ok(series),
        }
    }

    /// Keep only samples with `lower <= time <= upper`; either limit may be omitted.
    pub fn crop_by_time(&mut self, lower: Option<f64>, upper: Option<f64>) {
        let keep: Vec<bool> = self
            .time
            .iter()
            .map(|&t| lower.map_or(true, |l| t >= l) && upper.map_or(true, |u| t <= u))
            .collect();

        let components = self.components;
        let mut index = 0;
        self.time.retain(|_| {
            index += 1;
            keep[index - 1]
        });

        let mut index = 0;
        self.values.retain(|_| {
            index += 1;
            keep[(index - 1) / components]
        });

        if let Some(dt) = self.dt.as_mut() {
            let mut index = 0;
            dt.retain(|_| {
                index += 1;
                keep[index - 1]
            });
        }

        log::debug!(
            "Cropped series to [{:?}, {:?}]: {} samples remain",
            lower,
            upper,
            self.time.len()
        );
    }

    /// Derive per-sample time steps from the time column.
    ///
    /// Each sample gets the step back to its predecessor; the first sample
    /// reuses the step of the second.
    pub fn time_steps(&self) -> Vec<f64> {
        let mut steps: Vec<f64> = self.time.windows(2).map(|w| w[1] - w[0]).collect();
        match steps.first().copied() {
            Some(first) => steps.insert(0, first),
            None if !self.time.is_empty() => steps.push(0.0),
            None => {}
        }
        steps
    }

    /// Fill `dt` from [`OwnedSeries::time_steps`]
    pub fn derive_dt(&mut self) {
        self.dt = Some(self.time_steps());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_series() {
        let time = [0.0, 1.0, 2.0];
        let values = [5.0, 6.0, 7.0];
        let series = SampleSeries::scalar(&time, &values).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(series.components(), 1);
        assert_eq!(series.sample(1), &[6.0]);
        assert!(series.dt().is_none());
    }

    #[test]
    fn test_vector_series_layout() {
        let time = [0.0, 1.0];
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let series = SampleSeries::vector(&time, &values, 3).unwrap();
        assert_eq!(series.sample(1), &[4.0, 5.0, 6.0]);
        assert_eq!(series.component(2), vec![3.0, 6.0]);
    }

    #[test]
    fn test_series_validation() {
        let time = [0.0, 1.0];
        assert!(SampleSeries::scalar(&time, &[1.0]).is_err());
        assert!(SampleSeries::vector(&time, &[1.0, 2.0], 0).is_err());

        let series = SampleSeries::scalar(&time, &[1.0, 2.0]).unwrap();
        assert!(series.with_dt(&[0.1]).is_err());
        assert!(series.with_dt(&[0.1, -0.1]).is_err());
        assert!(series.with_dt(&[0.1, 0.1]).is_ok());
    }

    #[test]
    fn test_empty_series_is_valid() {
        let series = SampleSeries::scalar(&[], &[]).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_crop_by_time() {
        let mut series = OwnedSeries::new(
            vec![0.0, 1.0, 2.0, 3.0],
            vec![0.0, 10.0, 1.0, 11.0, 2.0, 12.0, 3.0, 13.0],
            2,
        )
        .unwrap();
        series.derive_dt();
        series.crop_by_time(Some(1.0), Some(2.0));

        assert_eq!(series.time, vec![1.0, 2.0]);
        assert_eq!(series.values, vec![1.0, 11.0, 2.0, 12.0]);
        assert_eq!(series.dt, Some(vec![1.0, 1.0]));
        assert!(series.as_series().is_ok());

        series.crop_by_time(None, Some(1.5));
        assert_eq!(series.time, vec![1.0]);
    }

    #[test]
    fn test_time_steps() {
        let series = OwnedSeries::new(vec![0.0, 0.1, 0.3, 0.6], vec![0.0; 4], 1).unwrap();
        let steps = series.time_steps();
        let expected = [0.1, 0.1, 0.2, 0.3];
        for (s, e) in steps.iter().zip(expected.iter()) {
            assert!((s - e).abs() < 1e-12);
        }

        let single = OwnedSeries::new(vec![2.0], vec![1.0], 1).unwrap();
        assert_eq!(single.time_steps(), vec![0.0]);
    }
}
