/// Convolution of a transit-time distribution with an input concentration series.
///
/// Given the cumulative distribution `PQ` of one outflow, as produced by
/// [`crate::solver::solve`], predicts the outflow concentration of a
/// conservative tracer without re-running the solver.
use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::error::InputError;

/// Outflow concentration series and its components.
#[derive(Debug, Clone, PartialEq)]
pub struct Convolution {
    /// Predicted outflow concentration, including old water.
    pub c_out: Array1<f64>,
    /// Contribution of tracked water only.
    pub c_mod_raw: Array1<f64>,
    /// Fraction of outflow younger than the oldest tracked age.
    pub observed_fraction: Array1<f64>,
}

/// Convolve `c_in` with the per-age increments of `pq`.
///
/// `pq` is (max_age + 1, n + 1) with column `t + 1` describing outflow during
/// timestep `t`. Water older than the tracked ages (or older than the record)
/// carries `c_old`.
pub fn convolve(pq: ArrayView2<'_, f64>, c_in: ArrayView1<'_, f64>, c_old: f64) -> Result<Convolution, InputError> {
    let n = c_in.len();
    let (rows, cols) = pq.dim();
    if rows < 2 {
        return Err(InputError::shape("PQ", format!("needs at least 2 age rows, got {rows}")));
    }
    if cols != n + 1 {
        return Err(InputError::shape(
            "PQ",
            format!("expected {} columns to match C_in, got {cols}", n + 1),
        ));
    }
    if c_in.iter().any(|c| c.is_nan()) {
        return Err(InputError::NonFinite { name: "C_in" });
    }
    let max_age = rows - 1;

    let mut c_mod_raw = Array1::zeros(n);
    let mut observed_fraction = Array1::zeros(n);
    for t in 0..n {
        let column = pq.column(t + 1);
        c_mod_raw[t] = (0..=t.min(max_age - 1))
            .map(|a| c_in[t - a] * (column[a + 1] - column[a]))
            .sum();
        observed_fraction[t] = column[(t + 1).min(max_age)];
    }
    let c_out = &c_mod_raw + &observed_fraction.mapv(|f| (1.0 - f) * c_old);

    Ok(Convolution {
        c_out,
        c_mod_raw,
        observed_fraction,
    })
}
