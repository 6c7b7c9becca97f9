use ndarray::{Array1, Array2, ArrayD};
use numpy::{PyReadonlyArray1, PyReadonlyArray2, PyReadonlyArrayDyn};
use pyo3::exceptions::{PyTypeError, PyValueError};
use pyo3::prelude::*;

use rsas_core::{InputError, SolveError};

/// Validate that a numpy array is C-contiguous and return its slice.
pub fn contiguous_slice<'py>(arr: &'py PyReadonlyArray1<'py, f64>) -> PyResult<&'py [f64]> {
    arr.as_slice()
        .map_err(|_| PyValueError::new_err("array must be C-contiguous"))
}

pub fn owned_1d(arr: &PyReadonlyArray1<'_, f64>) -> Array1<f64> {
    arr.as_array().to_owned()
}

pub fn owned_2d(arr: &PyReadonlyArray2<'_, f64>) -> Array2<f64> {
    arr.as_array().to_owned()
}

/// Copy an array of any rank; the solver inputs check ranks themselves.
pub fn owned_dyn(arr: &PyReadonlyArrayDyn<'_, f64>) -> ArrayD<f64> {
    arr.as_array().to_owned()
}

/// A SAS object missing part of its interface is a `TypeError`; every other
/// input problem is a `ValueError`.
pub fn input_error(e: InputError) -> PyErr {
    match e {
        InputError::Contract { .. } => PyTypeError::new_err(e.to_string()),
        _ => PyValueError::new_err(e.to_string()),
    }
}

pub fn solve_error(e: SolveError) -> PyErr {
    match e {
        SolveError::Input(e) => input_error(e),
        other => PyValueError::new_err(other.to_string()),
    }
}
