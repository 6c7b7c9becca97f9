use numpy::{PyArray1, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::prelude::*;

use crate::convert::input_error;
use rsas_core::transport::convolve;

type Arr1<'py> = Bound<'py, PyArray1<f64>>;

/// Convolve an input concentration series with a cumulative transit-time
/// distribution. Returns `(C_out, C_mod_raw, observed_fraction)`.
#[pyfunction]
#[allow(non_snake_case)]
fn transport<'py>(
    py: Python<'py>,
    PQ: PyReadonlyArray2<'py, f64>,
    C_in: PyReadonlyArray1<'py, f64>,
    C_old: f64,
) -> PyResult<(Arr1<'py>, Arr1<'py>, Arr1<'py>)> {
    let conv = convolve(PQ.as_array(), C_in.as_array(), C_old).map_err(input_error)?;
    Ok((
        PyArray1::from_owned_array(py, conv.c_out),
        PyArray1::from_owned_array(py, conv.c_mod_raw),
        PyArray1::from_owned_array(py, conv.observed_fraction),
    ))
}

pub fn register(parent: &Bound<'_, PyModule>) -> PyResult<()> {
    let m = PyModule::new(parent.py(), "transport")?;
    m.add_function(wrap_pyfunction!(transport, &m)?)?;
    parent.add_submodule(&m)?;
    Ok(())
}
