/// Storage selection (SAS) functions.
///
/// A SAS function maps an age-ranked storage profile `ST` (cumulative volume
/// of water younger than each age) to the cumulative fraction of an outflow
/// drawn from water of at most that age. The integrator only needs the two
/// queries of `SasFunction`; each family implements them on its own.
use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, Zip};

use crate::error::SasError;

/// Capability interface for a per-outflow storage selection function.
pub trait SasFunction {
    /// Cumulative selection fraction for each entry of `st` at time index `i`.
    ///
    /// `out` has the same length as `st`. Implementations must write values in
    /// [0, 1], non-decreasing along the profile, and 0 where `st` is 0.
    fn cdf_i(
        &self,
        st: ArrayView1<'_, f64>,
        i: usize,
        out: ArrayViewMut1<'_, f64>,
    ) -> Result<(), SasError>;

    /// Evaluate over a whole storage record shaped (ages, times).
    ///
    /// Column `t` is evaluated with time index `t`.
    fn cdf_all(&self, st: ArrayView2<'_, f64>) -> Result<Array2<f64>, SasError> {
        let mut out = Array2::zeros(st.raw_dim());
        for (t, (column, out_column)) in st
            .columns()
            .into_iter()
            .zip(out.columns_mut())
            .enumerate()
        {
            self.cdf_i(column, t, out_column)?;
        }
        Ok(out)
    }
}

/// Uniform selection of all water between `ST = lower[t]` and `ST = upper[t]`.
///
/// Water younger than the `lower` storage is never selected; once the
/// profile passes `upper` every older parcel is already accounted for.
#[derive(Debug, Clone, PartialEq)]
pub struct UniformSas {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl UniformSas {
    /// Time-varying bounds, one pair per timestep.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, SasError> {
        if lower.is_empty() {
            return Err(SasError::new("uniform SAS bounds are empty"));
        }
        if lower.len() != upper.len() {
            return Err(SasError::new(format!(
                "lower bound length {} does not match upper bound length {}",
                lower.len(),
                upper.len()
            )));
        }
        for (t, (&lo, &hi)) in lower.iter().zip(&upper).enumerate() {
            if !(lo >= 0.0 && hi > lo) {
                return Err(SasError::new(format!(
                    "uniform SAS bounds at timestep {t} must satisfy 0 <= lower < upper, got ({lo}, {hi})"
                )));
            }
        }
        Ok(Self { lower, upper })
    }

    /// The same bounds for each of `n` timesteps.
    pub fn constant(lower: f64, upper: f64, n: usize) -> Result<Self, SasError> {
        Self::new(vec![lower; n], vec![upper; n])
    }

    /// Number of timesteps the bounds cover.
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    pub fn bounds(&self, i: usize) -> Option<(f64, f64)> {
        Some((*self.lower.get(i)?, *self.upper.get(i)?))
    }
}

impl SasFunction for UniformSas {
    fn cdf_i(
        &self,
        st: ArrayView1<'_, f64>,
        i: usize,
        out: ArrayViewMut1<'_, f64>,
    ) -> Result<(), SasError> {
        let (lo, hi) = self.bounds(i).ok_or_else(|| {
            SasError::new(format!(
                "time index {i} outside uniform SAS bounds of length {}",
                self.len()
            ))
        })?;
        let width = hi - lo;
        Zip::from(out)
            .and(&st)
            .for_each(|o, &s| *o = ((s - lo) / width).clamp(0.0, 1.0));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    fn assert_approx(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected} ± {tol}, got {actual}"
        );
    }

    // -- UniformSas construction --

    #[test]
    fn rejects_mismatched_bounds() {
        let err = UniformSas::new(vec![0.0, 0.0], vec![5.0]).unwrap_err();
        assert!(err.0.contains("does not match"));
    }

    #[test]
    fn rejects_inverted_bounds() {
        assert!(UniformSas::constant(5.0, 5.0, 3).is_err());
        assert!(UniformSas::constant(-1.0, 5.0, 3).is_err());
    }

    #[test]
    fn rejects_empty_bounds() {
        assert!(UniformSas::new(vec![], vec![]).is_err());
    }

    // -- cdf_i --

    #[test]
    fn uniform_cdf_is_linear_between_bounds() {
        let sas = UniformSas::constant(0.0, 10.0, 1).unwrap();
        let st = array![0.0, 2.5, 5.0, 10.0, 20.0];
        let mut out = Array1::zeros(st.len());
        sas.cdf_i(st.view(), 0, out.view_mut()).unwrap();
        assert_approx(out[0], 0.0, 1e-12);
        assert_approx(out[1], 0.25, 1e-12);
        assert_approx(out[2], 0.5, 1e-12);
        assert_approx(out[3], 1.0, 1e-12);
        assert_approx(out[4], 1.0, 1e-12);
    }

    #[test]
    fn uniform_cdf_respects_lower_bound() {
        let sas = UniformSas::constant(4.0, 8.0, 1).unwrap();
        let st = array![0.0, 3.0, 6.0, 9.0];
        let mut out = Array1::zeros(4);
        sas.cdf_i(st.view(), 0, out.view_mut()).unwrap();
        assert_eq!(out, array![0.0, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn uniform_cdf_uses_time_varying_bounds() {
        let sas = UniformSas::new(vec![0.0, 0.0], vec![4.0, 8.0]).unwrap();
        let st = array![0.0, 4.0];
        let mut out = Array1::zeros(2);
        sas.cdf_i(st.view(), 1, out.view_mut()).unwrap();
        assert_approx(out[1], 0.5, 1e-12);
    }

    #[test]
    fn uniform_cdf_out_of_range_time_index() {
        let sas = UniformSas::constant(0.0, 1.0, 2).unwrap();
        let st = array![0.0, 1.0];
        let mut out = Array1::zeros(2);
        let err = sas.cdf_i(st.view(), 2, out.view_mut()).unwrap_err();
        assert!(err.0.contains("outside"));
    }

    // -- cdf_all default --

    #[test]
    fn cdf_all_evaluates_each_column_at_its_time() {
        let sas = UniformSas::new(vec![0.0, 0.0], vec![2.0, 4.0]).unwrap();
        let st = array![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]];
        let out = sas.cdf_all(st.view()).unwrap();
        assert_eq!(out.dim(), (3, 2));
        assert_approx(out[[1, 0]], 0.5, 1e-12);
        assert_approx(out[[1, 1]], 0.25, 1e-12);
        assert_approx(out[[2, 0]], 1.0, 1e-12);
        assert_approx(out[[2, 1]], 0.5, 1e-12);
    }

    #[test]
    fn cdf_all_propagates_errors() {
        let sas = UniformSas::constant(0.0, 1.0, 1).unwrap();
        let st = Array2::<f64>::zeros((3, 2));
        assert!(sas.cdf_all(st.view()).is_err());
    }
}
