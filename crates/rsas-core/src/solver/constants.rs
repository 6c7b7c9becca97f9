/// Integrator constants.
///
/// Centralises the fixed values of the RK4 age-ranked scheme.

/// Number of RK4 stages per substep.
pub const N_STAGES: usize = 4;

/// Weights combining the four stage evaluations: (1, 2, 2, 1) / 6.
pub const STAGE_WEIGHTS: [f64; N_STAGES] = [1.0 / 6.0, 2.0 / 6.0, 2.0 / 6.0, 1.0 / 6.0];

/// Fraction of the substep used to build the trial state after stages 1, 2 and 3.
///
/// Stages 1 and 2 advance half a substep, stage 3 a full one. The solute
/// injection at the freshest age follows the same fractions.
pub const TRIAL_FRACTIONS: [f64; N_STAGES - 1] = [0.5, 0.5, 1.0];

/// Output names in the order they are reported.
pub const OUTPUT_NAMES: &[&str] = &[
    "ST",
    "PQ",
    "WaterBalance",
    "MS",
    "MQ",
    "MR",
    "C_Q",
    "SoluteBalance",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_weights_sum_to_one() {
        let sum: f64 = STAGE_WEIGHTS.iter().sum();
        assert!((sum - 1.0).abs() < 1e-15);
    }
}
