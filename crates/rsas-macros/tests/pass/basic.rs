use rsas_macros::Timeseries;

#[derive(Debug, Clone, Copy, Timeseries)]
pub struct Budget {
    pub inflow: f64,
    pub outflow: f64,
    pub storage: f64,
}

fn main() {
    let b = Budget { inflow: 2.0, outflow: 1.5, storage: 10.0 };
    let mut series = BudgetSeries::with_capacity(4);
    series.push(&b);
    assert_eq!(series.len(), 1);
    assert!(!series.is_empty());
    assert_eq!(series.column("outflow"), Some(&[1.5][..]));
    assert_eq!(series.column("missing"), None);
    assert_eq!(Budget::field_names(), &["inflow", "outflow", "storage"]);
}
