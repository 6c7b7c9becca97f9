/// Time and substep loop of the age-ranked RK4 integrator.
use ndarray::{ArrayView1, ArrayView2, Axis, Zip};
use tracing::{debug, debug_span, trace};

use super::constants::{N_STAGES, TRIAL_FRACTIONS};
use super::outputs::{Recorder, SubstepFluxes, TransportResult};
use super::processes::{
    advance_mass, advance_storage, age_density, combine_stages, forward_difference, reaction,
    selected_outflow, solute_outflow,
};
use super::state::{SoluteWorkspace, Workspace};
use crate::error::{InputError, SolveError};
use crate::inputs::TransportInputs;
use crate::sas::SasFunction;

/// Per-timestep solute parameters.
struct SoluteForcing<'a> {
    alpha: ArrayView2<'a, f64>,
    k1: ArrayView1<'a, f64>,
    c_eq: ArrayView1<'a, f64>,
}

/// Integrate age-ranked storage, selection and solute transport over all timesteps.
///
/// `sas` holds one SAS function per outflow column of `inputs.q()`. Each
/// timestep is split into `n_substeps` RK4 substeps at substep age
/// resolution; outputs are reported per timestep and per whole timestep of
/// age.
///
/// # Errors
///
/// [`InputError::Configuration`] when the number of SAS functions does not
/// match the outflow count, and [`SolveError::Sas`] when a SAS function
/// fails to evaluate.
pub fn solve(inputs: &TransportInputs, sas: &[&dyn SasFunction]) -> Result<TransportResult, SolveError> {
    if sas.len() != inputs.numflux() {
        return Err(InputError::Configuration(format!(
            "expected one SAS function per outflow ({}), got {}",
            inputs.numflux(),
            sas.len()
        ))
        .into());
    }

    let n = inputs.len();
    let n_substeps = inputs.n_substeps();
    let _span = debug_span!(
        "solve",
        n,
        numflux = inputs.numflux(),
        numsol = inputs.numsol(),
        max_age = inputs.max_age(),
        n_substeps
    )
    .entered();

    let mut ws = Workspace::new(inputs);
    let mut rec = Recorder::new(inputs);

    for i in 0..n {
        for k in 0..n_substeps {
            substep(&mut ws, inputs, sas, i)?;
            rec.record_substep(
                i,
                k,
                inputs.q().row(i),
                SubstepFluxes {
                    pq_comb: ws.pq_comb.view(),
                    pq_density: ws.pq_density.view(),
                    m_q_comb: ws.solute.as_ref().map(|sw| sw.m_q_comb.view()),
                    m_r_comb: ws.solute.as_ref().map(|sw| sw.m_r_comb.view()),
                },
            );
        }
        rec.finish_timestep(
            i,
            inputs,
            ws.st_n.view(),
            ws.solute.as_ref().map(|sw| sw.m_s_n.view()),
        );
        trace!(timestep = i, storage = rec.storage(i)[inputs.max_age()], "timestep done");
    }

    let result = rec.into_result();
    debug!(
        max_water_residual = result.max_water_residual(),
        max_solute_residual = result.max_solute_residual(),
        "solve finished"
    );
    Ok(result)
}

/// One RK4 substep of timestep `i`, leaving the combined fluxes and the new
/// state in the workspace.
fn substep(
    ws: &mut Workspace,
    inputs: &TransportInputs,
    sas: &[&dyn SasFunction],
    i: usize,
) -> Result<(), SolveError> {
    let h = inputs.h();
    let j_i = inputs.j()[i];
    let q_i = inputs.q().row(i);

    ws.roll(h * j_i);

    let Workspace {
        st_p,
        st_n,
        st_t,
        s_t_p,
        s_t_n,
        s_t_t,
        selected,
        pq,
        pq_comb,
        pq_density,
        solute,
    } = ws;

    let forcing = inputs.solute().map(|sol| SoluteForcing {
        alpha: sol.alpha().index_axis(Axis(0), i),
        k1: sol.k1().row(i),
        c_eq: sol.c_eq().row(i),
    });
    if let (Some(sw), Some(sol)) = (solute.as_mut(), inputs.solute()) {
        Zip::from(&mut sw.injection)
            .and(sol.c_j().row(i))
            .for_each(|inj, &c| *inj = j_i * c);
    }

    for stage in 0..N_STAGES {
        let (profile, increments) = if stage == 0 {
            (st_p.view(), s_t_p.view())
        } else {
            (st_t.view(), s_t_t.view())
        };

        for (iq, f) in sas.iter().enumerate() {
            f.cdf_i(profile, i, pq[stage].column_mut(iq))
                .map_err(|source| SolveError::Sas {
                    outflow: iq,
                    timestep: i,
                    source,
                })?;
        }
        age_density(pq[stage].view(), pq_density.view_mut());

        if let (Some(sw), Some(f)) = (solute.as_mut(), forcing.as_ref()) {
            stage_solute_fluxes(sw, stage, pq_density.view(), increments, q_i, f);
        }

        if stage + 1 < N_STAGES {
            let w = TRIAL_FRACTIONS[stage] * h;
            selected_outflow(pq[stage].view(), q_i, selected.view_mut());
            advance_storage(st_p.view(), selected.view(), j_i, w, st_t.view_mut());
            forward_difference(st_t.view(), s_t_t.view_mut());
            if let Some(sw) = solute.as_mut() {
                advance_mass(
                    sw.m_s_p.view(),
                    sw.m_q[stage].view(),
                    sw.m_r[stage].view(),
                    sw.injection.view(),
                    w,
                    sw.m_s_t.view_mut(),
                );
            }
        }
    }

    combine_stages(pq, pq_comb.view_mut());
    for (iq, &flow) in q_i.iter().enumerate() {
        if flow == 0.0 {
            pq_comb.column_mut(iq).fill(0.0);
        }
    }
    age_density(pq_comb.view(), pq_density.view_mut());

    selected_outflow(pq_comb.view(), q_i, selected.view_mut());
    advance_storage(st_p.view(), selected.view(), j_i, h, st_n.view_mut());
    forward_difference(st_n.view(), s_t_n.view_mut());

    if let Some(sw) = solute.as_mut() {
        combine_stages(&sw.m_q, sw.m_q_comb.view_mut());
        combine_stages(&sw.m_r, sw.m_r_comb.view_mut());
        advance_mass(
            sw.m_s_p.view(),
            sw.m_q_comb.view(),
            sw.m_r_comb.view(),
            sw.injection.view(),
            h,
            sw.m_s_n.view_mut(),
        );
    }
    Ok(())
}

/// Mass outflow and reaction for one stage, from that stage's mass state.
fn stage_solute_fluxes(
    sw: &mut SoluteWorkspace,
    stage: usize,
    density: ArrayView2<'_, f64>,
    increments: ArrayView1<'_, f64>,
    q_i: ArrayView1<'_, f64>,
    forcing: &SoluteForcing<'_>,
) {
    let mass = if stage == 0 {
        sw.m_s_p.view()
    } else {
        sw.m_s_t.view()
    };
    solute_outflow(density, increments, mass, forcing.alpha, q_i, sw.m_q[stage].view_mut());
    reaction(increments, mass, forcing.k1, forcing.c_eq, sw.m_r[stage].view_mut());
}
