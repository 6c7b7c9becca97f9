use numpy::{PyArray, PyReadonlyArray1, PyReadonlyArray2, PyReadonlyArrayDyn};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::convert::{input_error, owned_1d, owned_2d, owned_dyn, solve_error};
use crate::sas::collect_sas;
use rsas_core::summary::summarize;
use rsas_core::{SasFunction, TransportInputs};

/// Run the age-ranked transport solver and return a dict of named outputs.
///
/// `rSAS_fun` is one SAS object or a list of them, one per column of `Q`.
#[pyfunction]
#[pyo3(signature = (
    J, Q, rSAS_fun, ST_init=None, dt=1.0, n_substeps=1, full_outputs=true,
    C_J=None, MS_init=None, alpha=None, k1=None, C_eq=None, C_old=None, budget=false
))]
#[allow(non_snake_case, clippy::too_many_arguments)]
fn solve<'py>(
    py: Python<'py>,
    J: PyReadonlyArray1<'py, f64>,
    Q: PyReadonlyArrayDyn<'py, f64>,
    rSAS_fun: Bound<'py, PyAny>,
    ST_init: Option<PyReadonlyArray1<'py, f64>>,
    dt: f64,
    n_substeps: usize,
    full_outputs: bool,
    C_J: Option<PyReadonlyArrayDyn<'py, f64>>,
    MS_init: Option<PyReadonlyArray2<'py, f64>>,
    alpha: Option<PyReadonlyArrayDyn<'py, f64>>,
    k1: Option<PyReadonlyArrayDyn<'py, f64>>,
    C_eq: Option<PyReadonlyArrayDyn<'py, f64>>,
    C_old: Option<PyReadonlyArray1<'py, f64>>,
    budget: bool,
) -> PyResult<Bound<'py, PyDict>> {
    let mut builder = TransportInputs::builder(owned_1d(&J), owned_dyn(&Q))
        .dt(dt)
        .n_substeps(n_substeps)
        .full_outputs(full_outputs);
    if let Some(st) = &ST_init {
        builder = builder.st_init(owned_1d(st));
    }
    if let Some(c) = &C_J {
        builder = builder.c_j(owned_dyn(c));
    }
    if let Some(ms) = &MS_init {
        builder = builder.ms_init(owned_2d(ms));
    }
    if let Some(a) = &alpha {
        builder = builder.alpha(owned_dyn(a));
    }
    if let Some(k) = &k1 {
        builder = builder.k1(owned_dyn(k));
    }
    if let Some(c) = &C_eq {
        builder = builder.c_eq(owned_dyn(c));
    }
    if let Some(c) = &C_old {
        builder = builder.c_old(owned_1d(c));
    }
    let inputs = builder.build().map_err(input_error)?;

    let sas = collect_sas(&rSAS_fun)?;
    let sas_refs: Vec<&dyn SasFunction> = sas.iter().map(|s| s as &dyn SasFunction).collect();

    let result = rsas_core::solve(&inputs, &sas_refs).map_err(solve_error)?;

    let dict = PyDict::new(py);
    for (name, arr) in result.arrays() {
        dict.set_item(name, PyArray::from_array(py, &arr))?;
    }

    if budget {
        let series = summarize(&inputs, &result)
            .ok_or_else(|| PyValueError::new_err("budget requires full_outputs=True"))?;
        let budget_dict = series_to_dict!(
            py, series,
            inflow, outflow, tracked_outflow, storage, max_residual,
        );
        dict.set_item("budget", budget_dict)?;
    }
    Ok(dict)
}

pub fn register(parent: &Bound<'_, PyModule>) -> PyResult<()> {
    let m = PyModule::new(parent.py(), "solver")?;
    m.add_function(wrap_pyfunction!(solve, &m)?)?;
    parent.add_submodule(&m)?;
    Ok(())
}
