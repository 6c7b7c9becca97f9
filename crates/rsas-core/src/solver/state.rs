/// Substep-resolution working state.
///
/// With `N` substeps per timestep and `M = max_age * N`, cumulative storage
/// profiles have `M + 1` entries (entry 0 is the zero-age boundary) and
/// per-bin quantities have `M`. The `*_n` buffers hold the state at the end
/// of the latest substep; `roll` shifts them one cell older into the `*_p`
/// buffers, which every stage of the next substep reads from.
use ndarray::{s, Array1, Array2, Array3, Zip};

use super::constants::N_STAGES;
use super::processes::forward_difference;
use crate::inputs::TransportInputs;

#[derive(Debug)]
pub(crate) struct Workspace {
    /// Cumulative storage before the substep, after the shift.
    pub st_p: Array1<f64>,
    /// Cumulative storage after the substep.
    pub st_n: Array1<f64>,
    /// Trial storage for stages 2-4.
    pub st_t: Array1<f64>,
    pub s_t_p: Array1<f64>,
    pub s_t_n: Array1<f64>,
    pub s_t_t: Array1<f64>,
    /// Scratch for `Σ_q Q · PQ`.
    pub selected: Array1<f64>,
    /// Cumulative selection per stage, (M + 1, numflux).
    pub pq: [Array2<f64>; N_STAGES],
    pub pq_comb: Array2<f64>,
    /// Per-bin selection density, (M, numflux).
    pub pq_density: Array2<f64>,
    pub solute: Option<SoluteWorkspace>,
}

#[derive(Debug)]
pub(crate) struct SoluteWorkspace {
    /// Per-bin solute mass, (M, numsol).
    pub m_s_p: Array2<f64>,
    pub m_s_n: Array2<f64>,
    pub m_s_t: Array2<f64>,
    /// Mass outflow per stage, (M, numflux, numsol).
    pub m_q: [Array3<f64>; N_STAGES],
    pub m_q_comb: Array3<f64>,
    /// Reaction gain per stage, (M, numsol).
    pub m_r: [Array2<f64>; N_STAGES],
    pub m_r_comb: Array2<f64>,
    /// `J · C_J` for the current timestep.
    pub injection: Array1<f64>,
}

impl Workspace {
    pub fn new(inputs: &TransportInputs) -> Self {
        let n_substeps = inputs.n_substeps();
        let m = inputs.max_age() * n_substeps;
        let numflux = inputs.numflux();

        let st_n = refine_profile(inputs.st_init(), n_substeps);
        let mut s_t_n = Array1::zeros(m);
        forward_difference(st_n.view(), s_t_n.view_mut());

        let solute = inputs.solute().map(|sol| {
            let numsol = sol.numsol();
            let mut m_s_n = Array2::zeros((m, numsol));
            Zip::indexed(&mut m_s_n).for_each(|(b, is), v| {
                let a = b / n_substeps;
                *v = (sol.ms_init()[[a + 1, is]] - sol.ms_init()[[a, is]]) / n_substeps as f64;
            });
            SoluteWorkspace {
                m_s_p: Array2::zeros((m, numsol)),
                m_s_n,
                m_s_t: Array2::zeros((m, numsol)),
                m_q: std::array::from_fn(|_| Array3::zeros((m, numflux, numsol))),
                m_q_comb: Array3::zeros((m, numflux, numsol)),
                m_r: std::array::from_fn(|_| Array2::zeros((m, numsol))),
                m_r_comb: Array2::zeros((m, numsol)),
                injection: Array1::zeros(numsol),
            }
        });

        Self {
            st_p: Array1::zeros(m + 1),
            st_n,
            st_t: Array1::zeros(m + 1),
            s_t_p: Array1::zeros(m),
            s_t_n,
            s_t_t: Array1::zeros(m),
            selected: Array1::zeros(m + 1),
            pq: std::array::from_fn(|_| Array2::zeros((m + 1, numflux))),
            pq_comb: Array2::zeros((m + 1, numflux)),
            pq_density: Array2::zeros((m, numflux)),
            solute,
        }
    }

    /// Number of substep-resolution bins, `M`.
    pub fn bins(&self) -> usize {
        self.s_t_n.len()
    }

    /// Age the latest state by one substep.
    ///
    /// The oldest cell falls off the end. The new zero-age cumulative storage
    /// is 0; the freshest bin increment is `fresh_increment` (the inflow
    /// volume of one substep) and the freshest bin carries no solute mass.
    pub fn roll(&mut self, fresh_increment: f64) {
        let m = self.bins();
        self.st_p[0] = 0.0;
        self.st_p.slice_mut(s![1..]).assign(&self.st_n.slice(s![..m]));
        self.s_t_p[0] = fresh_increment;
        self.s_t_p
            .slice_mut(s![1..])
            .assign(&self.s_t_n.slice(s![..m - 1]));
        if let Some(sol) = &mut self.solute {
            sol.m_s_p.row_mut(0).fill(0.0);
            sol.m_s_p
                .slice_mut(s![1.., ..])
                .assign(&sol.m_s_n.slice(s![..m - 1, ..]));
        }
    }
}

/// Linear interpolation of a cumulative profile onto `n_substeps` cells per age.
fn refine_profile(profile: &Array1<f64>, n_substeps: usize) -> Array1<f64> {
    let max_age = profile.len() - 1;
    Array1::from_shape_fn(max_age * n_substeps + 1, |j| {
        let a = j / n_substeps;
        let r = j % n_substeps;
        if r == 0 {
            profile[a]
        } else {
            profile[a] + (profile[a + 1] - profile[a]) * r as f64 / n_substeps as f64
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, IxDyn};

    #[test]
    fn refine_profile_interpolates_between_ages() {
        let refined = refine_profile(&array![0.0, 2.0, 3.0], 2);
        assert_eq!(refined, array![0.0, 1.0, 2.0, 2.5, 3.0]);
    }

    #[test]
    fn refine_profile_single_substep_is_unchanged() {
        let profile = array![0.0, 1.5, 4.0];
        assert_eq!(refine_profile(&profile, 1), profile);
    }

    #[test]
    fn initial_mass_is_split_evenly_across_substeps() {
        let inputs = TransportInputs::builder(array![1.0], array![1.0].into_dyn())
            .st_init(array![0.0, 2.0, 4.0])
            .n_substeps(2)
            .c_j(array![1.0].into_dyn())
            .ms_init(array![[0.0], [4.0], [10.0]])
            .build()
            .unwrap();
        let ws = Workspace::new(&inputs);
        let sol = ws.solute.as_ref().unwrap();
        assert_eq!(sol.m_s_n.column(0), array![2.0, 2.0, 3.0, 3.0]);
        assert_eq!(ws.s_t_n, array![1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn roll_shifts_state_one_cell_older() {
        let inputs = TransportInputs::builder(array![1.0], ndarray::Array::from_elem(IxDyn(&[1]), 1.0))
            .st_init(array![0.0, 1.0, 3.0, 6.0])
            .c_j(array![1.0].into_dyn())
            .ms_init(array![[0.0], [1.0], [2.0], [3.0]])
            .build()
            .unwrap();
        let mut ws = Workspace::new(&inputs);
        ws.roll(0.5);
        assert_eq!(ws.st_p, array![0.0, 0.0, 1.0, 3.0]);
        assert_eq!(ws.s_t_p, array![0.5, 1.0, 2.0]);
        let sol = ws.solute.as_ref().unwrap();
        assert_eq!(sol.m_s_p.column(0), array![0.0, 1.0, 1.0]);
    }
}
