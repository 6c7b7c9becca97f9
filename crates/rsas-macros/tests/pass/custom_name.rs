use rsas_macros::Timeseries;

#[derive(Debug, Clone, Copy, Timeseries)]
#[timeseries(name = "ResidualTrace")]
pub struct Residual {
    pub water: f64,
    pub solute: f64,
}

fn main() {
    let r = Residual { water: 1e-12, solute: -3e-13 };
    let mut trace = ResidualTrace::with_capacity(2);
    trace.push(&r);
    trace.push(&r);
    assert_eq!(trace.len(), 2);
    assert_eq!(trace.solute[1], -3e-13);
    assert_eq!(Residual::field_names(), &["water", "solute"]);
}
