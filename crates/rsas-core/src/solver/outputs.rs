/// Output containers and the per-timestep recorder.
///
/// Outputs are reported at timestep resolution: ages `0..=max_age` along axis
/// 0 and time `0..=n` along axis 1, where column 0 is the initial state.
use ndarray::{
    s, Array2, Array3, Array4, ArrayView1, ArrayView2, ArrayView3, ArrayViewD, ArrayViewMut1, Axis,
    Zip,
};
use smallvec::SmallVec;

use super::constants::OUTPUT_NAMES;
use super::processes::{accumulate_bins, fold_lanes, sample_cumulative};
use crate::inputs::TransportInputs;

/// Results of one transport run.
///
/// Age-resolved water and solute fluxes are only recorded with full outputs;
/// the corresponding fields are `None` otherwise.
#[derive(Debug, Clone)]
pub struct TransportResult {
    /// Cumulative age-ranked storage, (max_age + 1, n + 1).
    pub st: Array2<f64>,
    /// Cumulative selection fraction per outflow, (max_age + 1, n + 1, numflux).
    pub pq: Option<Array3<f64>>,
    /// Per-age water balance residual, (max_age, n).
    pub water_balance: Option<Array2<f64>>,
    pub solute: Option<SoluteResult>,
}

#[derive(Debug, Clone)]
pub struct SoluteResult {
    /// Cumulative age-ranked solute mass, (max_age + 1, n + 1, numsol).
    pub ms: Array3<f64>,
    /// Outflow concentration, (n, numflux, numsol).
    pub c_q: Array3<f64>,
    /// Cumulative mass outflow, (max_age + 1, n + 1, numflux, numsol).
    pub mq: Option<Array4<f64>>,
    /// Cumulative reaction mass gain, (max_age + 1, n + 1, numsol).
    pub mr: Option<Array3<f64>>,
    /// Per-age solute balance residual, (max_age, n, numsol).
    pub solute_balance: Option<Array3<f64>>,
}

impl TransportResult {
    /// Look up an output by its reported name; `None` when it was not computed.
    pub fn get(&self, name: &str) -> Option<ArrayViewD<'_, f64>> {
        let solute = self.solute.as_ref();
        match name {
            "ST" => Some(self.st.view().into_dyn()),
            "PQ" => self.pq.as_ref().map(|a| a.view().into_dyn()),
            "WaterBalance" => self.water_balance.as_ref().map(|a| a.view().into_dyn()),
            "MS" => solute.map(|s| s.ms.view().into_dyn()),
            "MQ" => solute.and_then(|s| s.mq.as_ref()).map(|a| a.view().into_dyn()),
            "MR" => solute.and_then(|s| s.mr.as_ref()).map(|a| a.view().into_dyn()),
            "C_Q" => solute.map(|s| s.c_q.view().into_dyn()),
            "SoluteBalance" => solute
                .and_then(|s| s.solute_balance.as_ref())
                .map(|a| a.view().into_dyn()),
            _ => None,
        }
    }

    /// Every output present in this result, by name, in reporting order.
    pub fn arrays(&self) -> Vec<(&'static str, ArrayViewD<'_, f64>)> {
        OUTPUT_NAMES
            .iter()
            .filter_map(|&name| Some((name, self.get(name)?)))
            .collect()
    }

    /// Largest absolute water balance residual.
    pub fn max_water_residual(&self) -> Option<f64> {
        self.water_balance.as_ref().map(|wb| max_abs(wb.iter()))
    }

    /// Largest absolute solute balance residual over all solutes.
    pub fn max_solute_residual(&self) -> Option<f64> {
        self.solute
            .as_ref()
            .and_then(|sol| sol.solute_balance.as_ref())
            .map(|sb| max_abs(sb.iter()))
    }
}

fn max_abs<'a>(values: impl Iterator<Item = &'a f64>) -> f64 {
    values.fold(0.0, |acc, v| acc.max(v.abs()))
}

/// Per-timestep accumulation state, folded into the result arrays.
#[derive(Debug)]
pub(crate) struct Recorder {
    n_substeps: usize,
    dt: f64,
    st: Array2<f64>,
    water: Option<WaterRecord>,
    solute: Option<SoluteRecord>,
}

#[derive(Debug)]
struct WaterRecord {
    pq: Array3<f64>,
    water_balance: Array2<f64>,
    pq_bins: Array2<f64>,
}

#[derive(Debug)]
struct SoluteRecord {
    ms: Array3<f64>,
    c_q: Array3<f64>,
    full: Option<SoluteFluxRecord>,
}

#[derive(Debug)]
struct SoluteFluxRecord {
    mq: Array4<f64>,
    mr: Array3<f64>,
    solute_balance: Array3<f64>,
    mq_bins: Array3<f64>,
    mr_bins: Array2<f64>,
}

/// One substep's combined fluxes, as handed to the recorder.
pub(crate) struct SubstepFluxes<'a> {
    pub pq_comb: ArrayView2<'a, f64>,
    pub pq_density: ArrayView2<'a, f64>,
    pub m_q_comb: Option<ArrayView3<'a, f64>>,
    pub m_r_comb: Option<ArrayView2<'a, f64>>,
}

impl Recorder {
    pub fn new(inputs: &TransportInputs) -> Self {
        let n = inputs.len();
        let max_age = inputs.max_age();
        let numflux = inputs.numflux();
        let full = inputs.full_outputs();

        let mut st = Array2::zeros((max_age + 1, n + 1));
        st.column_mut(0).assign(inputs.st_init());

        let water = full.then(|| WaterRecord {
            pq: Array3::zeros((max_age + 1, n + 1, numflux)),
            water_balance: Array2::zeros((max_age, n)),
            pq_bins: Array2::zeros((max_age, numflux)),
        });

        let solute = inputs.solute().map(|sol| {
            let numsol = sol.numsol();
            let mut ms = Array3::zeros((max_age + 1, n + 1, numsol));
            ms.index_axis_mut(Axis(1), 0).assign(sol.ms_init());
            SoluteRecord {
                ms,
                c_q: Array3::zeros((n, numflux, numsol)),
                full: full.then(|| SoluteFluxRecord {
                    mq: Array4::zeros((max_age + 1, n + 1, numflux, numsol)),
                    mr: Array3::zeros((max_age + 1, n + 1, numsol)),
                    solute_balance: Array3::zeros((max_age, n, numsol)),
                    mq_bins: Array3::zeros((max_age, numflux, numsol)),
                    mr_bins: Array2::zeros((max_age, numsol)),
                }),
            }
        });

        Self {
            n_substeps: inputs.n_substeps(),
            dt: inputs.dt(),
            st,
            water,
            solute,
        }
    }

    /// Cumulative storage reported at the end of timestep `i`.
    pub fn storage(&self, i: usize) -> ArrayView1<'_, f64> {
        self.st.column(i + 1)
    }

    /// Accumulate substep `k` of timestep `i`.
    pub fn record_substep(&mut self, i: usize, k: usize, q_i: ArrayView1<'_, f64>, fluxes: SubstepFluxes<'_>) {
        let n_substeps = self.n_substeps;
        let scale = 1.0 / n_substeps as f64;

        if let Some(water) = &mut self.water {
            fold_lanes(fluxes.pq_density, k, n_substeps, water.pq_bins.view_mut());
        }

        if let (Some(sol), Some(m_q)) = (&mut self.solute, fluxes.m_q_comb) {
            let mut c_q = sol.c_q.index_axis_mut(Axis(0), i);
            Zip::indexed(&mut c_q).for_each(|(iq, is), c| {
                let flow = q_i[iq];
                if flow != 0.0 {
                    *c += m_q.slice(s![.., iq, is]).sum() / flow * scale;
                }
            });

            if let (Some(full), Some(m_r)) = (&mut sol.full, fluxes.m_r_comb) {
                fold_lanes(m_q, k, n_substeps, full.mq_bins.view_mut());
                fold_lanes(m_r, k, n_substeps, full.mr_bins.view_mut());
            }
        }
    }

    /// Close timestep `i`: sample the end-of-step state and, with full
    /// outputs, fill the cumulative flux columns, the balance columns and the
    /// old-water contribution to concentrations.
    pub fn finish_timestep(
        &mut self,
        i: usize,
        inputs: &TransportInputs,
        st_n: ArrayView1<'_, f64>,
        m_s_n: Option<ArrayView2<'_, f64>>,
    ) {
        let n_substeps = self.n_substeps;
        let dt = self.dt;
        let j_i = inputs.j()[i];
        let q_i = inputs.q().row(i);

        Zip::indexed(self.st.column_mut(i + 1)).for_each(|a, v| *v = st_n[a * n_substeps]);

        if let Some(water) = &mut self.water {
            let mut pq_next = water.pq.index_axis_mut(Axis(1), i + 1);
            Zip::from(pq_next.columns_mut())
                .and(water.pq_bins.columns())
                .for_each(|out, bins| accumulate_bins(bins, out));
            water.pq_bins.fill(0.0);

            let st_prev = self.st.column(i);
            let st_next = self.st.column(i + 1);
            let pq_next = water.pq.index_axis(Axis(1), i + 1);
            balance_column(
                j_i * dt,
                st_prev,
                st_next,
                |a| dt * outflow_increment(pq_next, q_i, a),
                water.water_balance.column_mut(i),
            );
        }

        if let (Some(sol), Some(sol_in), Some(m_s_n)) = (&mut self.solute, inputs.solute(), m_s_n) {
            let mut ms_next = sol.ms.index_axis_mut(Axis(1), i + 1);
            Zip::from(ms_next.columns_mut())
                .and(m_s_n.columns())
                .for_each(|out, bins| sample_cumulative(bins, n_substeps, out));

            if let (Some(full), Some(water)) = (&mut sol.full, &self.water) {
                // outflow older than max_age carries C_old
                let unobserved: SmallVec<[f64; 4]> = q_i
                    .iter()
                    .zip(water.pq.slice(s![inputs.max_age(), i + 1, ..]))
                    .map(|(&flow, &pq)| if flow == 0.0 { 0.0 } else { 1.0 - pq })
                    .collect();
                let alpha = sol_in.alpha().index_axis(Axis(0), i);
                Zip::from(sol.c_q.index_axis_mut(Axis(0), i).rows_mut())
                    .and(alpha.rows())
                    .and(&unobserved[..])
                    .for_each(|c_q, alpha_q, &frac| {
                        Zip::from(c_q)
                            .and(alpha_q)
                            .and(sol_in.c_old())
                            .for_each(|c, &a, &old| *c += a * old * frac);
                    });

                let mut mq_next = full.mq.index_axis_mut(Axis(1), i + 1);
                Zip::from(mq_next.lanes_mut(Axis(0)))
                    .and(full.mq_bins.lanes(Axis(0)))
                    .for_each(|out, bins| accumulate_bins(bins, out));
                full.mq_bins.fill(0.0);

                let mut mr_next = full.mr.index_axis_mut(Axis(1), i + 1);
                Zip::from(mr_next.columns_mut())
                    .and(full.mr_bins.columns())
                    .for_each(|out, bins| accumulate_bins(bins, out));
                full.mr_bins.fill(0.0);

                let c_j = sol_in.c_j().row(i);
                for is in 0..c_j.len() {
                    let ms_prev = sol.ms.slice(s![.., i, is]);
                    let ms_next = sol.ms.slice(s![.., i + 1, is]);
                    let mq_next = full.mq.slice(s![.., i + 1, .., is]);
                    let mr_next = full.mr.slice(s![.., i + 1, is]);
                    balance_column(
                        j_i * c_j[is] * dt,
                        ms_prev,
                        ms_next,
                        |a| {
                            let leaving: f64 = (0..mq_next.ncols())
                                .map(|iq| mq_next[[a + 1, iq]] - mq_next[[a, iq]])
                                .sum();
                            dt * (leaving - (mr_next[a + 1] - mr_next[a]))
                        },
                        full.solute_balance.slice_mut(s![.., i, is]),
                    );
                }
            }
        }
    }

    pub fn into_result(self) -> TransportResult {
        let (pq, water_balance) = match self.water {
            Some(w) => (Some(w.pq), Some(w.water_balance)),
            None => (None, None),
        };
        let solute = self.solute.map(|sol| {
            let (mq, mr, solute_balance) = match sol.full {
                Some(f) => (Some(f.mq), Some(f.mr), Some(f.solute_balance)),
                None => (None, None, None),
            };
            SoluteResult {
                ms: sol.ms,
                c_q: sol.c_q,
                mq,
                mr,
                solute_balance,
            }
        });
        TransportResult {
            st: self.st,
            pq,
            water_balance,
            solute,
        }
    }
}

/// `Σ_q Q[q] · (PQ[a + 1, q] - PQ[a, q])`.
fn outflow_increment(pq: ArrayView2<'_, f64>, q: ArrayView1<'_, f64>, a: usize) -> f64 {
    q.iter()
        .enumerate()
        .map(|(iq, &flow)| flow * (pq[[a + 1, iq]] - pq[[a, iq]]))
        .sum()
}

/// Per-age residual of a cumulative budget over one timestep.
///
/// What enters age bin `a` is the bin `a - 1` content at the start of the
/// step (or `fresh` for `a = 0`); it must equal the bin `a` content at the
/// end of the step plus whatever `removed(a)` reports leaving it.
fn balance_column(
    fresh: f64,
    prev: ArrayView1<'_, f64>,
    next: ArrayView1<'_, f64>,
    removed: impl Fn(usize) -> f64,
    mut out: ArrayViewMut1<'_, f64>,
) {
    for a in 0..out.len() {
        let entering = if a == 0 { fresh } else { prev[a] - prev[a - 1] };
        out[a] = entering - (next[a + 1] - next[a]) - removed(a);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1};

    #[test]
    fn balance_column_is_zero_for_pure_ageing() {
        // 2 units of fresh input, storage [1, 3] shifts one age older, nothing leaves
        let prev = array![0.0, 1.0, 3.0, 3.0];
        let next = array![0.0, 2.0, 3.0, 5.0];
        let mut out = Array1::zeros(3);
        balance_column(2.0, prev.view(), next.view(), |_| 0.0, out.view_mut());
        assert_eq!(out, array![0.0, 0.0, 0.0]);
    }

    #[test]
    fn balance_column_reports_missing_volume() {
        let prev = array![0.0, 1.0];
        let next = array![0.0, 1.0];
        let mut out = Array1::zeros(1);
        balance_column(2.0, prev.view(), next.view(), |_| 0.5, out.view_mut());
        assert_eq!(out[0], 0.5);
    }

    #[test]
    fn outflow_increment_weights_by_rate() {
        let pq = array![[0.0, 0.0], [0.5, 1.0]];
        assert_eq!(outflow_increment(pq.view(), array![2.0, 3.0].view(), 0), 4.0);
    }

    #[test]
    fn arrays_lists_only_present_outputs() {
        let result = TransportResult {
            st: Array2::zeros((2, 2)),
            pq: None,
            water_balance: None,
            solute: Some(SoluteResult {
                ms: Array3::zeros((2, 2, 1)),
                c_q: Array3::zeros((1, 1, 1)),
                mq: None,
                mr: None,
                solute_balance: None,
            }),
        };
        let names: Vec<_> = result.arrays().into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["ST", "MS", "C_Q"]);
        assert!(result.get("PQ").is_none());
        assert!(result.get("unknown").is_none());
        assert!(result.max_water_residual().is_none());
    }
}
