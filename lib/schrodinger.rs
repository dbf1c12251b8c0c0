//! Evolution drivers for the Schrödinger equation.
//!
//! Each driver integrates `dψ/dt = -i H ψ` (or the bra analogue
//! `dξ/dt = +i ξ H`) for an [`EvolvableState`] under a generator operator,
//! delivering the state at a caller-specified sequence of output times. The
//! generator is either fixed for the whole run ([`evolve`],
//! [`evolve_reduced`]) or recomputed at every derivative evaluation from a
//! function of time and the current state ([`evolve_fn`],
//! [`evolve_fn_reduced`]).
//!
//! Every driver call makes exactly one working copy of the initial state and
//! one scratch derivative buffer; both are reused in place for all
//! evaluations of the run. Output callbacks receive a [`StateView`] aliasing
//! the integrator's live buffer and must duplicate it explicitly
//! ([`StateView::to_state`]) to keep a persistent record.

use ndarray::{
    self as nd,
    linalg::{ general_mat_mul, general_mat_vec_mul },
};
use num_complex::Complex64 as C64;
use num_traits::Zero;
use crate::{
    error::{ EvolveError, EvolveResult, IncompatibleBases },
    hilbert::{ Basis, EvolvableState, Operator, StateKind, StateView },
    ode::{ self, IntegratorOpts },
};

// describes how the integrator's raw buffer maps back onto the typed state;
// installing a view is the (zero-copy) alias operation, and the reverse is a
// no-op since the typed wrapper never owns a separate buffer
struct StateLayout {
    kind: StateKind,
    basis: Basis,
}

impl StateLayout {
    fn of(state: &EvolvableState) -> Self {
        Self { kind: state.kind(), basis: state.basis().clone() }
    }

    // the single working copy made per driver call
    fn flatten(&self, state: &EvolvableState) -> nd::Array1<C64> {
        match state {
            EvolvableState::Ket(ket) => ket.data().clone(),
            EvolvableState::Bra(bra) => bra.data().clone(),
            EvolvableState::Propagator(op)
                => op.data().iter().copied().collect(),
        }
    }

    fn view<'a>(&'a self, y: &'a nd::Array1<C64>) -> StateView<'a> {
        match self.kind {
            StateKind::Ket => StateView::Ket(&self.basis, y.view()),
            StateKind::Bra => StateView::Bra(&self.basis, y.view()),
            StateKind::Propagator => {
                let n = self.basis.dim();
                StateView::Propagator(
                    &self.basis,
                    y.view().into_shape((n, n)).unwrap(),
                )
            },
        }
    }

    // overwrite `dy` in place with the instantaneous rate of change of `y`
    // under `gen`; kets and propagators evolve as `-i H ψ`, bras as `+i ψ H`
    fn deriv(
        &self,
        gen: &Operator,
        y: &nd::Array1<C64>,
        dy: &mut nd::Array1<C64>,
    ) -> Result<(), IncompatibleBases>
    {
        IncompatibleBases::check(gen, self.kind, &self.basis)?;
        match self.kind {
            StateKind::Ket => {
                general_mat_vec_mul(
                    -C64::i(), gen.data(), y, C64::zero(), dy);
            },
            StateKind::Bra => {
                // right multiplication of a covector: ξ H = Hᵀ ξ
                let ht = gen.data().t();
                general_mat_vec_mul(C64::i(), &ht, y, C64::zero(), dy);
            },
            StateKind::Propagator => {
                let n = self.basis.dim();
                let u = y.view().into_shape((n, n)).unwrap();
                let mut du = dy.view_mut().into_shape((n, n)).unwrap();
                general_mat_mul(
                    -C64::i(), gen.data(), &u, C64::zero(), &mut du);
            },
        }
        Ok(())
    }
}

/// Numerically integrate the Schrödinger equation for a time-independent
/// generator, collecting a snapshot of the state at every element of `t`.
///
/// Note: `state0` is taken as the state at `t[0]`.
///
/// Fails eagerly, with zero snapshots taken, if `H` is not square over
/// `state0`'s basis, or if `state0` is an operator that is itself not
/// square.
pub fn evolve(
    t: &nd::Array1<f64>,
    state0: &EvolvableState,
    H: &Operator,
    opts: &IntegratorOpts,
) -> EvolveResult<Vec<EvolvableState>>
{
    let mut acc: Vec<EvolvableState> = Vec::with_capacity(t.len());
    evolve_reduced(t, state0, H, opts, |_, psi| acc.push(psi.to_state()))?;
    Ok(acc)
}

/// Numerically integrate the Schrödinger equation for a time-independent
/// generator with reduced integration output: `out` is invoked once per
/// element of `t` with a transient view of the evolving state.
///
/// Fails eagerly, with zero `out` invocations, if `H` is not square over
/// `state0`'s basis, or if `state0` is an operator that is itself not
/// square.
pub fn evolve_reduced<X>(
    t: &nd::Array1<f64>,
    state0: &EvolvableState,
    H: &Operator,
    opts: &IntegratorOpts,
    mut out: X,
) -> EvolveResult<()>
where X: FnMut(f64, StateView<'_>)
{
    IncompatibleBases::check_state(state0)?;
    IncompatibleBases::check(H, state0.kind(), state0.basis())?;
    let layout = StateLayout::of(state0);
    let y0 = layout.flatten(state0);
    ode::integrate(
        t, y0,
        |_, y, dy| layout.deriv(H, y, dy).map_err(EvolveError::from),
        |tk, y| out(tk, layout.view(y)),
        opts,
    )
}

/// Numerically integrate the Schrödinger equation for a generator given by a
/// function of time and the current state, collecting a snapshot of the state
/// at every element of `t`.
///
/// See [`evolve_fn_reduced`] for the compatibility contract of `hfn`.
pub fn evolve_fn<F>(
    t: &nd::Array1<f64>,
    state0: &EvolvableState,
    hfn: F,
    opts: &IntegratorOpts,
) -> EvolveResult<Vec<EvolvableState>>
where F: FnMut(f64, StateView<'_>) -> Operator
{
    let mut acc: Vec<EvolvableState> = Vec::with_capacity(t.len());
    evolve_fn_reduced(t, state0, hfn, opts, |_, psi| acc.push(psi.to_state()))?;
    Ok(acc)
}

/// Numerically integrate the Schrödinger equation for a generator given by a
/// function of time and the current state, with reduced integration output:
/// `out` is invoked once per element of `t` with a transient view of the
/// evolving state.
///
/// `hfn` is re-evaluated at every derivative call on the live state view,
/// admitting explicit time dependence as well as state-dependent (e.g.
/// mean-field) generators. No generator compatibility check can happen
/// before the run, since the generator is unknown until first evaluated;
/// instead every returned generator is checked at its own evaluation, and an
/// incompatible one aborts the run at that point. `out` invocations already
/// delivered stand. The state itself is still checked eagerly: an operator
/// state that is not square fails with zero `out` invocations.
pub fn evolve_fn_reduced<F, X>(
    t: &nd::Array1<f64>,
    state0: &EvolvableState,
    mut hfn: F,
    opts: &IntegratorOpts,
    mut out: X,
) -> EvolveResult<()>
where
    F: FnMut(f64, StateView<'_>) -> Operator,
    X: FnMut(f64, StateView<'_>),
{
    IncompatibleBases::check_state(state0)?;
    let layout = StateLayout::of(state0);
    let y0 = layout.flatten(state0);
    ode::integrate(
        t, y0,
        |tk, y, dy| {
            let hk = hfn(tk, layout.view(y));
            layout.deriv(&hk, y, dy).map_err(EvolveError::from)
        },
        |tk, y| out(tk, layout.view(y)),
        opts,
    )
}
