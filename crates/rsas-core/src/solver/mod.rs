//! Age-ranked storage and transit-time solver.
//!
//! Integrates the age-ranked water balance and, optionally, the age-ranked
//! mass balance of any number of solutes with a fourth-order Runge-Kutta
//! scheme along age characteristics. Each timestep can be split into
//! substeps; outputs are always reported at whole-timestep resolution.

pub mod constants;
pub mod outputs;
pub mod processes;
mod run;
mod state;

pub use outputs::{SoluteResult, TransportResult};
pub use run::solve;
