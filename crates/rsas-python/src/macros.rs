/// Convert a `*Series` struct generated by `#[derive(Timeseries)]` into a
/// `PyDict` of numpy arrays keyed by field name.
macro_rules! series_to_dict {
    ($py:expr, $ts:expr, $($field:ident),+ $(,)?) => {{
        let dict = pyo3::types::PyDict::new($py);
        $(
            dict.set_item(stringify!($field), numpy::PyArray1::from_vec($py, $ts.$field))?;
        )+
        dict
    }};
}
