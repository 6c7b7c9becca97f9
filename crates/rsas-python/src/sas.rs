use ndarray::{ArrayView1, ArrayViewMut1};
use numpy::{PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::{PyList, PyTuple};

use crate::convert::contiguous_slice;
use rsas_core::{InputError, SasError, SasFunction, UniformSas};

/// Uniform selection of stored water between two storage bounds.
#[pyclass(frozen, name = "UniformSas")]
pub struct PyUniformSas {
    inner: UniformSas,
}

#[pymethods]
impl PyUniformSas {
    /// Time-varying bounds: one `(lower, upper)` pair per timestep.
    #[new]
    fn new(lower: PyReadonlyArray1<'_, f64>, upper: PyReadonlyArray1<'_, f64>) -> PyResult<Self> {
        let inner = UniformSas::new(
            contiguous_slice(&lower)?.to_vec(),
            contiguous_slice(&upper)?.to_vec(),
        )
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(Self { inner })
    }

    /// The same bounds for each of `n` timesteps.
    #[staticmethod]
    fn constant(lower: f64, upper: f64, n: usize) -> PyResult<Self> {
        let inner = UniformSas::constant(lower, upper, n)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(Self { inner })
    }

    #[allow(non_snake_case)]
    fn cdf_i<'py>(
        &self,
        py: Python<'py>,
        ST: PyReadonlyArray1<'py, f64>,
        i: usize,
    ) -> PyResult<Bound<'py, PyArray1<f64>>> {
        let st = ST.as_array();
        let mut out = ndarray::Array1::zeros(st.len());
        self.inner
            .cdf_i(st, i, out.view_mut())
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(PyArray1::from_owned_array(py, out))
    }

    #[allow(non_snake_case)]
    fn cdf_all<'py>(
        &self,
        py: Python<'py>,
        ST: PyReadonlyArray2<'py, f64>,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let out = self
            .inner
            .cdf_all(ST.as_array())
            .map_err(|e| PyValueError::new_err(e.to_string()))?;
        Ok(PyArray2::from_owned_array(py, out))
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        match self.inner.bounds(0) {
            Some((lo, hi)) => format!("UniformSas(n={}, lower[0]={lo}, upper[0]={hi})", self.inner.len()),
            None => "UniformSas(n=0)".to_string(),
        }
    }
}

/// A SAS function handed in from Python: either the native uniform family or
/// any object exposing `cdf_i(ST, i)` and `cdf_all(ST)`.
pub enum BoundSas<'py> {
    Native(UniformSas),
    Object(Bound<'py, PyAny>),
}

impl<'py> BoundSas<'py> {
    fn from_object(index: usize, obj: Bound<'py, PyAny>) -> PyResult<Self> {
        if let Ok(native) = obj.downcast::<PyUniformSas>() {
            return Ok(BoundSas::Native(native.get().inner.clone()));
        }
        for method in ["cdf_i", "cdf_all"] {
            if !obj.hasattr(method)? {
                return Err(crate::convert::input_error(InputError::Contract { index, method }));
            }
        }
        Ok(BoundSas::Object(obj))
    }
}

impl SasFunction for BoundSas<'_> {
    fn cdf_i(
        &self,
        st: ArrayView1<'_, f64>,
        i: usize,
        mut out: ArrayViewMut1<'_, f64>,
    ) -> Result<(), SasError> {
        match self {
            BoundSas::Native(sas) => sas.cdf_i(st, i, out),
            BoundSas::Object(obj) => {
                let py = obj.py();
                let values: Vec<f64> = obj
                    .call_method1("cdf_i", (PyArray1::from_array(py, &st), i))
                    .and_then(|r| r.extract())
                    .map_err(|e| SasError::new(format!("cdf_i raised: {e}")))?;
                if values.len() != out.len() {
                    return Err(SasError::new(format!(
                        "cdf_i returned {} values for a profile of length {}",
                        values.len(),
                        out.len()
                    )));
                }
                out.iter_mut().zip(values).for_each(|(o, v)| *o = v);
                Ok(())
            }
        }
    }
}

/// Accept a single SAS object or a list/tuple of them, one per outflow.
pub fn collect_sas<'py>(arg: &Bound<'py, PyAny>) -> PyResult<Vec<BoundSas<'py>>> {
    let items: Vec<Bound<'py, PyAny>> = if arg.is_instance_of::<PyList>() || arg.is_instance_of::<PyTuple>() {
        arg.try_iter()?.collect::<PyResult<_>>()?
    } else {
        vec![arg.clone()]
    };
    items
        .into_iter()
        .enumerate()
        .map(|(index, obj)| BoundSas::from_object(index, obj))
        .collect()
}

pub fn register(parent: &Bound<'_, PyModule>) -> PyResult<()> {
    let m = PyModule::new(parent.py(), "sas")?;
    m.add_class::<PyUniformSas>()?;
    parent.add_submodule(&m)?;
    Ok(())
}
