/// rsas: age-ranked storage and transit-time transport.
///
/// Integrates age-ranked storage `ST`, transit-time distributions `PQ` and
/// optional age-ranked solute mass `MS` of a control volume driven by one
/// inflow and any number of outflows, each releasing water according to its
/// storage selection (SAS) function.
pub mod error;
pub mod inputs;
pub mod sas;
pub mod solver;
pub mod summary;
pub mod transport;

pub use error::{InputError, SasError, SolveError};
pub use inputs::{SoluteInputs, TransportInputs, TransportInputsBuilder};
pub use sas::{SasFunction, UniformSas};
pub use solver::{solve, SoluteResult, TransportResult};
