/// Validated, defaulted inputs for one transport run.
///
/// Every array the integrator touches is reshaped here to its strict
/// time-varying form: outflows are always (n, numflux), solute inflow
/// concentrations (n, numsol), partition coefficients (n, numflux, numsol),
/// and reaction parameters (n, numsol). Callers may pass the shorter
/// constant forms; they are broadcast along time.
use ndarray::{Array1, Array2, Array3, ArrayD, ArrayView, Axis, Dimension, Ix2, Ix3, IxDyn};

use crate::error::InputError;

/// Solute forcing and parameters, present only when inflow concentrations are given.
#[derive(Debug, Clone)]
pub struct SoluteInputs {
    c_j: Array2<f64>,
    ms_init: Array2<f64>,
    alpha: Array3<f64>,
    k1: Array2<f64>,
    c_eq: Array2<f64>,
    c_old: Array1<f64>,
}

impl SoluteInputs {
    pub fn numsol(&self) -> usize {
        self.c_j.ncols()
    }

    /// Inflow concentration, (n, numsol).
    pub fn c_j(&self) -> &Array2<f64> {
        &self.c_j
    }

    /// Initial cumulative age-ranked solute mass, (max_age + 1, numsol).
    pub fn ms_init(&self) -> &Array2<f64> {
        &self.ms_init
    }

    /// Partition coefficients, (n, numflux, numsol).
    pub fn alpha(&self) -> &Array3<f64> {
        &self.alpha
    }

    /// First-order reaction rate, (n, numsol).
    pub fn k1(&self) -> &Array2<f64> {
        &self.k1
    }

    /// Reaction equilibrium concentration, (n, numsol).
    pub fn c_eq(&self) -> &Array2<f64> {
        &self.c_eq
    }

    /// Concentration assigned to water older than the tracked ages.
    pub fn c_old(&self) -> &Array1<f64> {
        &self.c_old
    }
}

/// Strictly shaped inputs consumed by [`crate::solver::solve`].
#[derive(Debug, Clone)]
pub struct TransportInputs {
    j: Array1<f64>,
    q: Array2<f64>,
    st_init: Array1<f64>,
    dt: f64,
    n_substeps: usize,
    full_outputs: bool,
    solute: Option<SoluteInputs>,
}

impl TransportInputs {
    /// Start building inputs from the inflow series and the outflow array.
    ///
    /// `q` may be 1-D (a single outflow) or 2-D (n, numflux).
    pub fn builder(j: impl Into<Array1<f64>>, q: impl Into<ArrayD<f64>>) -> TransportInputsBuilder {
        TransportInputsBuilder {
            j: j.into(),
            q: q.into(),
            st_init: None,
            dt: 1.0,
            n_substeps: 1,
            full_outputs: true,
            c_j: None,
            ms_init: None,
            alpha: None,
            k1: None,
            c_eq: None,
            c_old: None,
        }
    }

    /// Number of timesteps.
    pub fn len(&self) -> usize {
        self.j.len()
    }

    /// Returns `true` if there are no timesteps.
    pub fn is_empty(&self) -> bool {
        self.j.is_empty()
    }

    pub fn numflux(&self) -> usize {
        self.q.ncols()
    }

    pub fn numsol(&self) -> usize {
        self.solute.as_ref().map_or(0, SoluteInputs::numsol)
    }

    /// Oldest tracked age, in timesteps.
    pub fn max_age(&self) -> usize {
        self.st_init.len() - 1
    }

    pub fn j(&self) -> &Array1<f64> {
        &self.j
    }

    /// Outflow rates, (n, numflux).
    pub fn q(&self) -> &Array2<f64> {
        &self.q
    }

    pub fn st_init(&self) -> &Array1<f64> {
        &self.st_init
    }

    pub fn dt(&self) -> f64 {
        self.dt
    }

    pub fn n_substeps(&self) -> usize {
        self.n_substeps
    }

    /// Substep length `dt / n_substeps`.
    pub fn h(&self) -> f64 {
        self.dt / self.n_substeps as f64
    }

    pub fn full_outputs(&self) -> bool {
        self.full_outputs
    }

    pub fn solute(&self) -> Option<&SoluteInputs> {
        self.solute.as_ref()
    }
}

/// Collects optional arguments; [`TransportInputsBuilder::build`] validates them together.
#[derive(Debug, Clone)]
pub struct TransportInputsBuilder {
    j: Array1<f64>,
    q: ArrayD<f64>,
    st_init: Option<Array1<f64>>,
    dt: f64,
    n_substeps: usize,
    full_outputs: bool,
    c_j: Option<ArrayD<f64>>,
    ms_init: Option<Array2<f64>>,
    alpha: Option<ArrayD<f64>>,
    k1: Option<ArrayD<f64>>,
    c_eq: Option<ArrayD<f64>>,
    c_old: Option<Array1<f64>>,
}

impl TransportInputsBuilder {
    /// Initial cumulative age-ranked storage; its length fixes `max_age + 1`.
    pub fn st_init(mut self, st_init: impl Into<Array1<f64>>) -> Self {
        self.st_init = Some(st_init.into());
        self
    }

    pub fn dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    pub fn n_substeps(mut self, n_substeps: usize) -> Self {
        self.n_substeps = n_substeps;
        self
    }

    pub fn full_outputs(mut self, full_outputs: bool) -> Self {
        self.full_outputs = full_outputs;
        self
    }

    /// Inflow solute concentrations: 1-D (one solute) or 2-D (n, numsol).
    pub fn c_j(mut self, c_j: impl Into<ArrayD<f64>>) -> Self {
        self.c_j = Some(c_j.into());
        self
    }

    /// Initial cumulative age-ranked solute mass, (max_age + 1, numsol).
    pub fn ms_init(mut self, ms_init: Array2<f64>) -> Self {
        self.ms_init = Some(ms_init);
        self
    }

    /// Partition coefficients: (numflux, numsol) or (n, numflux, numsol).
    pub fn alpha(mut self, alpha: impl Into<ArrayD<f64>>) -> Self {
        self.alpha = Some(alpha.into());
        self
    }

    /// Reaction rate: (numsol) or (n, numsol).
    pub fn k1(mut self, k1: impl Into<ArrayD<f64>>) -> Self {
        self.k1 = Some(k1.into());
        self
    }

    /// Equilibrium concentration: (numsol) or (n, numsol).
    pub fn c_eq(mut self, c_eq: impl Into<ArrayD<f64>>) -> Self {
        self.c_eq = Some(c_eq.into());
        self
    }

    pub fn c_old(mut self, c_old: impl Into<Array1<f64>>) -> Self {
        self.c_old = Some(c_old.into());
        self
    }

    pub fn build(self) -> Result<TransportInputs, InputError> {
        let n = self.j.len();
        if n == 0 {
            return Err(InputError::shape("J", "inflow series is empty"));
        }
        reject_nan("J", self.j.view())?;

        let q = series_matrix("Q", self.q, n)?;
        if q.ncols() == 0 {
            return Err(InputError::shape("Q", "at least one outflow column is required"));
        }
        reject_nan("Q", q.view())?;
        let numflux = q.ncols();

        let st_init = self.st_init.unwrap_or_else(|| Array1::zeros(n + 1));
        if st_init.len() < 2 {
            return Err(InputError::shape(
                "ST_init",
                format!("needs at least 2 entries (ages 0 and 1), got {}", st_init.len()),
            ));
        }
        reject_nan("ST_init", st_init.view())?;
        if st_init[0] != 0.0 {
            return Err(InputError::InitialCondition {
                name: "ST_init",
                value: st_init[0],
            });
        }
        let max_age = st_init.len() - 1;

        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(InputError::Configuration(format!(
                "dt must be a positive finite number, got {}",
                self.dt
            )));
        }
        if self.n_substeps == 0 {
            return Err(InputError::Configuration(
                "n_substeps must be at least 1".to_string(),
            ));
        }

        let solute = match self.c_j {
            Some(c_j) => {
                let c_j = series_matrix("C_J", c_j, n)?;
                reject_nan("C_J", c_j.view())?;
                let numsol = c_j.ncols();
                if numsol == 0 {
                    return Err(InputError::shape("C_J", "at least one solute column is required"));
                }

                let ms_init = match self.ms_init {
                    Some(ms) => {
                        if ms.dim() != (max_age + 1, numsol) {
                            return Err(InputError::shape(
                                "MS_init",
                                format!(
                                    "expected ({}, {numsol}) to match ST_init and C_J, got {:?}",
                                    max_age + 1,
                                    ms.shape()
                                ),
                            ));
                        }
                        if let Some(&value) = ms.row(0).iter().find(|&&v| v != 0.0) {
                            return Err(InputError::InitialCondition {
                                name: "MS_init",
                                value,
                            });
                        }
                        ms
                    }
                    None => Array2::zeros((max_age + 1, numsol)),
                };

                let alpha = match self.alpha {
                    Some(a) => broadcast_in_time("alpha", a, n, &[numflux, numsol])?
                        .into_dimensionality::<Ix3>()
                        .map_err(|e| InputError::shape("alpha", e.to_string()))?,
                    None => Array3::ones((n, numflux, numsol)),
                };
                let k1 = reaction_matrix("k1", self.k1, n, numsol)?;
                let c_eq = reaction_matrix("C_eq", self.c_eq, n, numsol)?;

                let c_old = self.c_old.unwrap_or_else(|| Array1::zeros(numsol));
                if c_old.len() != numsol {
                    return Err(InputError::shape(
                        "C_old",
                        format!("expected {numsol} entries to match C_J, got {}", c_old.len()),
                    ));
                }

                Some(SoluteInputs {
                    c_j,
                    ms_init,
                    alpha,
                    k1,
                    c_eq,
                    c_old,
                })
            }
            None => {
                let orphaned = [
                    ("MS_init", self.ms_init.is_some()),
                    ("alpha", self.alpha.is_some()),
                    ("k1", self.k1.is_some()),
                    ("C_eq", self.c_eq.is_some()),
                    ("C_old", self.c_old.is_some()),
                ];
                if let Some((name, _)) = orphaned.iter().find(|(_, given)| *given) {
                    return Err(InputError::Configuration(format!(
                        "{name} was given without solute inflow concentrations C_J"
                    )));
                }
                None
            }
        };

        Ok(TransportInputs {
            j: self.j,
            q,
            st_init,
            dt: self.dt,
            n_substeps: self.n_substeps,
            full_outputs: self.full_outputs,
            solute,
        })
    }
}

/// 1-D series of length `n` become a single column; 2-D arrays must have `n` rows.
fn series_matrix(name: &'static str, arr: ArrayD<f64>, n: usize) -> Result<Array2<f64>, InputError> {
    let arr = match arr.ndim() {
        1 => arr.insert_axis(Axis(1)),
        2 => arr,
        d => {
            return Err(InputError::shape(name, format!("expected 1 or 2 dimensions, got {d}")));
        }
    };
    if arr.shape()[0] != n {
        return Err(InputError::shape(
            name,
            format!("expected {n} rows to match J, got {}", arr.shape()[0]),
        ));
    }
    arr.into_dimensionality::<Ix2>()
        .map_err(|e| InputError::shape(name, e.to_string()))
}

/// Accept a per-timestep constant shaped `inner`, or an array already shaped (n, inner..).
fn broadcast_in_time(
    name: &'static str,
    arr: ArrayD<f64>,
    n: usize,
    inner: &[usize],
) -> Result<ArrayD<f64>, InputError> {
    let mut full = Vec::with_capacity(inner.len() + 1);
    full.push(n);
    full.extend_from_slice(inner);

    if arr.shape() == inner {
        reject_nan(name, arr.view())?;
        return arr
            .broadcast(IxDyn(&full))
            .map(|v| v.to_owned())
            .ok_or_else(|| InputError::shape(name, format!("cannot broadcast to {full:?}")));
    }
    if arr.shape() == full.as_slice() {
        reject_nan(name, arr.view())?;
        return Ok(arr);
    }
    Err(InputError::shape(
        name,
        format!("expected {inner:?} or {full:?}, got {:?}", arr.shape()),
    ))
}

fn reaction_matrix(
    name: &'static str,
    arr: Option<ArrayD<f64>>,
    n: usize,
    numsol: usize,
) -> Result<Array2<f64>, InputError> {
    match arr {
        Some(a) => broadcast_in_time(name, a, n, &[numsol])?
            .into_dimensionality::<Ix2>()
            .map_err(|e| InputError::shape(name, e.to_string())),
        None => Ok(Array2::zeros((n, numsol))),
    }
}

fn reject_nan<D: Dimension>(name: &'static str, view: ArrayView<'_, f64, D>) -> Result<(), InputError> {
    if view.iter().any(|v| v.is_nan()) {
        return Err(InputError::NonFinite { name });
    }
    Ok(())
}
