/// Per-stage process functions of the age-ranked RK4 scheme.
///
/// Pure functions over array views. Ages run along axis 0 everywhere:
/// cumulative profiles have M + 1 entries (age 0 included), per-age bins have M.
use ndarray::{
    s, Array, ArrayView, ArrayView1, ArrayView2, ArrayView3, ArrayViewMut, ArrayViewMut1,
    ArrayViewMut2, ArrayViewMut3, Axis, Dimension, Zip,
};

use super::constants::{N_STAGES, STAGE_WEIGHTS};

/// Total selected outflow rate `Σ_q Q[q] · PQ[j, q]` at each age.
pub fn selected_outflow(pq: ArrayView2<'_, f64>, q: ArrayView1<'_, f64>, mut out: ArrayViewMut1<'_, f64>) {
    Zip::from(&mut out)
        .and(pq.rows())
        .for_each(|o, row| *o = row.dot(&q));
}

/// Advance a cumulative storage profile along its characteristics.
///
/// `out[j] = max(0, prev[j] + (inflow - selected[j]) * w)`; the zero-age
/// boundary `out[0]` stays at 0.
pub fn advance_storage(
    prev: ArrayView1<'_, f64>,
    selected: ArrayView1<'_, f64>,
    inflow: f64,
    w: f64,
    mut out: ArrayViewMut1<'_, f64>,
) {
    Zip::from(&mut out)
        .and(&prev)
        .and(&selected)
        .for_each(|o, &p, &sel| *o = (p + (inflow - sel) * w).max(0.0));
    out[0] = 0.0;
}

/// Per-age increments of a cumulative profile: `out[b] = cum[b + 1] - cum[b]`.
pub fn forward_difference(cumulative: ArrayView1<'_, f64>, mut out: ArrayViewMut1<'_, f64>) {
    Zip::from(&mut out)
        .and(cumulative.slice(s![1..]))
        .and(cumulative.slice(s![..-1]))
        .for_each(|d, &hi, &lo| *d = hi - lo);
}

/// Per-age selection density of every outflow, (M, numflux), from cumulative (M + 1, numflux).
pub fn age_density(pq: ArrayView2<'_, f64>, mut out: ArrayViewMut2<'_, f64>) {
    Zip::from(&mut out)
        .and(pq.slice(s![1.., ..]))
        .and(pq.slice(s![..-1, ..]))
        .for_each(|d, &hi, &lo| *d = hi - lo);
}

/// Solute mass flux leaving by each outflow from each age bin, (M, numflux, numsol).
///
/// `mass * alpha * Q * density / increment`, and exactly 0 for bins holding no water.
pub fn solute_outflow(
    density: ArrayView2<'_, f64>,
    increments: ArrayView1<'_, f64>,
    mass: ArrayView2<'_, f64>,
    alpha: ArrayView2<'_, f64>,
    q: ArrayView1<'_, f64>,
    mut out: ArrayViewMut3<'_, f64>,
) {
    Zip::indexed(&mut out).for_each(|(b, iq, is), o| {
        let st = increments[b];
        *o = if st == 0.0 {
            0.0
        } else {
            mass[[b, is]] * alpha[[iq, is]] * q[iq] * density[[b, iq]] / st
        };
    });
}

/// First-order reaction gain per bin: `k1 * (C_eq * increment - mass)`.
pub fn reaction(
    increments: ArrayView1<'_, f64>,
    mass: ArrayView2<'_, f64>,
    k1: ArrayView1<'_, f64>,
    c_eq: ArrayView1<'_, f64>,
    mut out: ArrayViewMut2<'_, f64>,
) {
    Zip::indexed(&mut out)
        .and(&mass)
        .for_each(|(b, is), o, &m| *o = k1[is] * (c_eq[is] * increments[b] - m));
}

/// Advance per-bin solute mass: `prev + (reaction - Σ_q outflow) * w`, with
/// `injection * w` entering the freshest bin.
pub fn advance_mass(
    prev: ArrayView2<'_, f64>,
    outflow: ArrayView3<'_, f64>,
    reaction: ArrayView2<'_, f64>,
    injection: ArrayView1<'_, f64>,
    w: f64,
    mut out: ArrayViewMut2<'_, f64>,
) {
    Zip::indexed(&mut out)
        .and(&prev)
        .and(&reaction)
        .for_each(|(b, is), o, &p, &r| {
            let leaving: f64 = outflow.slice(s![b, .., is]).sum();
            *o = p + (r - leaving) * w;
        });
    Zip::from(out.row_mut(0))
        .and(&injection)
        .for_each(|o, &inj| *o += inj * w);
}

/// Weighted RK4 combination of the four stage evaluations.
pub fn combine_stages<D: Dimension>(stages: &[Array<f64, D>; N_STAGES], mut out: ArrayViewMut<'_, f64, D>) {
    let [w1, w2, w3, w4] = STAGE_WEIGHTS;
    Zip::from(&mut out)
        .and(&stages[0])
        .and(&stages[1])
        .and(&stages[2])
        .and(&stages[3])
        .for_each(|o, &a, &b, &c, &d| *o = w1 * a + w2 * b + w3 * c + w4 * d);
}

/// Fold one substep's per-age densities into output-age bins.
///
/// During substep `k` of `n_substeps`, output bin 0 owns cells `0..=k` and
/// bin `a >= 1` owns cells `(a-1)*n_substeps + k + 1 ..= a*n_substeps + k`.
/// Every contribution is divided by `n_substeps`, so after the last substep
/// each bin holds the time-averaged increment of its cumulative output.
pub fn fold_substep(density: ArrayView1<'_, f64>, k: usize, n_substeps: usize, mut bins: ArrayViewMut1<'_, f64>) {
    let scale = 1.0 / n_substeps as f64;
    bins[0] += density.slice(s![..=k]).sum() * scale;
    for a in 1..bins.len() {
        let first = (a - 1) * n_substeps + k + 1;
        let last = a * n_substeps + k;
        bins[a] += density.slice(s![first..=last]).sum() * scale;
    }
}

/// [`fold_substep`] applied to every lane along the age axis.
pub fn fold_lanes<D: Dimension>(
    density: ArrayView<'_, f64, D>,
    k: usize,
    n_substeps: usize,
    mut bins: ArrayViewMut<'_, f64, D>,
) {
    Zip::from(density.lanes(Axis(0)))
        .and(bins.lanes_mut(Axis(0)))
        .for_each(|d, b| fold_substep(d, k, n_substeps, b));
}

/// Cumulative output profile from per-bin increments: `out[0] = 0`, `out[a + 1] = out[a] + bins[a]`.
pub fn accumulate_bins(bins: ArrayView1<'_, f64>, mut out: ArrayViewMut1<'_, f64>) {
    let mut total = 0.0;
    out[0] = 0.0;
    for (a, &b) in bins.iter().enumerate() {
        total += b;
        out[a + 1] = total;
    }
}

/// Sample a per-bin quantity at output resolution: `out[a] = Σ_{b < a * stride} bins[b]`.
pub fn sample_cumulative(bins: ArrayView1<'_, f64>, stride: usize, mut out: ArrayViewMut1<'_, f64>) {
    let mut total = 0.0;
    out[0] = 0.0;
    for (b, &v) in bins.iter().enumerate() {
        total += v;
        if (b + 1) % stride == 0 {
            out[(b + 1) / stride] = total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array1, Array2, Array3};

    fn assert_approx(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() < tol,
            "expected {expected} ± {tol}, got {actual}"
        );
    }

    // -- Storage --

    #[test]
    fn selected_outflow_sums_over_outflows() {
        let pq = array![[0.0, 0.0], [0.5, 0.25], [1.0, 1.0]];
        let q = array![2.0, 4.0];
        let mut out = Array1::zeros(3);
        selected_outflow(pq.view(), q.view(), out.view_mut());
        assert_eq!(out, array![0.0, 2.0, 6.0]);
    }

    #[test]
    fn advance_storage_clamps_at_zero_and_pins_age_zero() {
        let prev = array![0.0, 1.0, 2.0];
        let selected = array![0.0, 10.0, 1.0];
        let mut out = Array1::zeros(3);
        advance_storage(prev.view(), selected.view(), 2.0, 0.5, out.view_mut());
        assert_eq!(out[0], 0.0);
        assert_eq!(out[1], 0.0);
        assert_approx(out[2], 2.5, 1e-12);
    }

    #[test]
    fn forward_difference_gives_bin_contents() {
        let cum = array![0.0, 1.0, 3.0, 6.0];
        let mut out = Array1::zeros(3);
        forward_difference(cum.view(), out.view_mut());
        assert_eq!(out, array![1.0, 2.0, 3.0]);
    }

    // -- Solute --

    #[test]
    fn solute_outflow_is_zero_for_empty_bins() {
        let density = array![[0.5], [0.5]];
        let increments = array![0.0, 2.0];
        let mass = array![[3.0], [4.0]];
        let alpha = array![[1.0]];
        let q = array![1.0];
        let mut out = Array3::zeros((2, 1, 1));
        solute_outflow(density.view(), increments.view(), mass.view(), alpha.view(), q.view(), out.view_mut());
        assert_eq!(out[[0, 0, 0]], 0.0);
        assert!(out.iter().all(|v| v.is_finite()));
        // concentration 2.0 * alpha 1 * Q 1 * density 0.5
        assert_approx(out[[1, 0, 0]], 1.0, 1e-12);
    }

    #[test]
    fn solute_outflow_scales_with_partition_coefficient() {
        let density = array![[1.0, 1.0]];
        let increments = array![1.0];
        let mass = array![[2.0]];
        let alpha = array![[1.0], [0.5]];
        let q = array![1.0, 1.0];
        let mut out = Array3::zeros((1, 2, 1));
        solute_outflow(density.view(), increments.view(), mass.view(), alpha.view(), q.view(), out.view_mut());
        assert_approx(out[[0, 1, 0]], 0.5 * out[[0, 0, 0]], 1e-12);
    }

    #[test]
    fn reaction_relaxes_towards_equilibrium() {
        let increments = array![2.0, 2.0];
        let mass = array![[1.0], [6.0]];
        let mut out = Array2::zeros((2, 1));
        reaction(increments.view(), mass.view(), array![0.5].view(), array![2.0].view(), out.view_mut());
        // below equilibrium (C = 0.5 < 2): gains mass
        assert_approx(out[[0, 0]], 1.5, 1e-12);
        // above equilibrium (C = 3 > 2): loses mass
        assert_approx(out[[1, 0]], -1.0, 1e-12);
    }

    #[test]
    fn advance_mass_injects_only_into_freshest_bin() {
        let prev = array![[0.0], [1.0]];
        let outflow = Array3::zeros((2, 1, 1));
        let reaction = Array2::zeros((2, 1));
        let mut out = Array2::zeros((2, 1));
        advance_mass(prev.view(), outflow.view(), reaction.view(), array![4.0].view(), 0.5, out.view_mut());
        assert_approx(out[[0, 0]], 2.0, 1e-12);
        assert_approx(out[[1, 0]], 1.0, 1e-12);
    }

    // -- RK4 combination --

    #[test]
    fn combine_stages_uses_classic_weights() {
        let stages = [array![6.0], array![12.0], array![0.0], array![6.0]];
        let mut out = Array1::zeros(1);
        combine_stages(&stages, out.view_mut());
        assert_approx(out[0], 6.0, 1e-12);
    }

    // -- Substep folding --

    #[test]
    fn fold_with_single_substep_is_identity() {
        let density = array![0.1, 0.2, 0.3];
        let mut bins = Array1::zeros(3);
        fold_substep(density.view(), 0, 1, bins.view_mut());
        assert_eq!(bins, density);
    }

    /// Folded bins must equal increments of the substep-averaged cumulative
    /// sampled at `a * n + k + 1`, which is where each trajectory ends up.
    #[test]
    fn fold_matches_sampled_cumulative() {
        let n_substeps = 3;
        let max_age = 4;
        let m = max_age * n_substeps;

        let mut bins = Array1::zeros(max_age);
        let mut expected_cum = Array1::<f64>::zeros(max_age + 1);
        for k in 0..n_substeps {
            // deterministic, uneven densities per substep
            let density = Array1::from_shape_fn(m, |b| ((b * 7 + k * 3) % 5) as f64 + 0.1 * k as f64);
            fold_substep(density.view(), k, n_substeps, bins.view_mut());

            let mut cum = Array1::<f64>::zeros(m + 1);
            accumulate_bins(density.view(), cum.view_mut());
            for a in 0..max_age {
                expected_cum[a + 1] += cum[a * n_substeps + k + 1] / n_substeps as f64;
            }
        }

        let mut folded_cum = Array1::zeros(max_age + 1);
        accumulate_bins(bins.view(), folded_cum.view_mut());
        for a in 0..=max_age {
            assert_approx(folded_cum[a], expected_cum[a], 1e-12);
        }
    }

    #[test]
    fn fold_lanes_handles_each_outflow_independently() {
        let density = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let mut bins = Array2::zeros((2, 2));
        fold_lanes(density.view(), 1, 2, bins.view_mut());
        // k = 1 of 2: bin 0 owns cells 0..=1, bin 1 owns cells 2..=3
        assert_approx(bins[[0, 0]], 1.5, 1e-12);
        assert_approx(bins[[1, 0]], 3.5, 1e-12);
        assert_approx(bins[[0, 1]], 15.0, 1e-12);
        assert_approx(bins[[1, 1]], 35.0, 1e-12);
    }

    // -- Output sampling --

    #[test]
    fn sample_cumulative_reads_every_stride() {
        let bins = array![1.0, 1.0, 2.0, 2.0];
        let mut out = Array1::zeros(3);
        sample_cumulative(bins.view(), 2, out.view_mut());
        assert_eq!(out, array![0.0, 2.0, 6.0]);
    }
}
