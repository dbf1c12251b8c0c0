//! Collection of all error types.
//!
//! All errors derive [`thiserror::Error`], making them composable when allowed
//! and compatible with application code using [`anyhow`][anyhow].
//!
//! [anyhow]: https://crates.io/crates/anyhow

use thiserror::Error;
use crate::hilbert::{ Basis, EvolvableState, Operator, StateKind };

/// Returned when the operands of an evolution do not share a basis.
///
/// Raised in three situations: the generator is not square (its left and
/// right bases differ), the side of the generator facing the state does not
/// carry the state's basis (the right side for a ket or propagator, the left
/// side for a bra), or an operator placed in the state role is itself not
/// square.
#[derive(Clone, Debug, Error)]
pub enum IncompatibleBases {
    /// The generator cannot act on the evolving state.
    #[error("incompatible bases: generator maps {gen_right} -> {gen_left}, state lives in {state}")]
    Generator {
        /// Left basis of the offending generator.
        gen_left: Basis,
        /// Right basis of the offending generator.
        gen_right: Basis,
        /// Basis of the evolving state.
        state: Basis,
    },

    /// An operator evolved in the state role is not square.
    #[error("incompatible bases: a propagator state must be square; got {left} x {right}")]
    State {
        /// Left basis of the offending propagator.
        left: Basis,
        /// Right basis of the offending propagator.
        right: Basis,
    },
}

impl IncompatibleBases {
    pub(crate) fn check(gen: &Operator, kind: StateKind, state: &Basis)
        -> Result<(), Self>
    {
        let square = gen.left_basis() == gen.right_basis();
        let side_ok
            = match kind {
                StateKind::Ket | StateKind::Propagator
                    => gen.right_basis() == state,
                StateKind::Bra
                    => gen.left_basis() == state,
            };
        (square && side_ok)
            .then_some(())
            .ok_or_else(|| Self::Generator {
                gen_left: gen.left_basis().clone(),
                gen_right: gen.right_basis().clone(),
                state: state.clone(),
            })
    }

    // the `EvolvableState::Propagator` variant is publicly constructible, so
    // squareness cannot be assumed from the checked constructor alone
    pub(crate) fn check_state(state: &EvolvableState) -> Result<(), Self> {
        match state {
            EvolvableState::Propagator(op) if !op.is_square()
                => Err(Self::State {
                    left: op.left_basis().clone(),
                    right: op.right_basis().clone(),
                }),
            _ => Ok(()),
        }
    }
}

/// Returned from the generic ODE integration routine.
#[derive(Clone, Debug, Error)]
pub enum OdeError {
    /// Returned when a non-positive tolerance value is encountered.
    #[error("tolerances must be greater than 0; got rtol = {0:e}, atol = {1:e}")]
    BadTolerance(f64, f64),

    /// Returned when a zero `max_steps` value is encountered.
    #[error("max_steps must be greater than 0")]
    BadMaxSteps,

    /// Returned when the output-time sequence is empty or not strictly
    /// increasing.
    #[error("output times must be non-empty and strictly increasing")]
    BadTimes,

    /// Returned when the step count exceeds the configured maximum before the
    /// final output time is reached.
    #[error("step count exceeded the configured maximum of {0}")]
    MaxSteps(usize),

    /// Returned when the error bound forces the step size below the smallest
    /// representable increment of the current time.
    #[error("step size underflow at t = {0:e}")]
    StepUnderflow(f64),
}

/// Returned from evolution driver functions.
#[derive(Clone, Debug, Error)]
pub enum EvolveError {
    /// [`IncompatibleBases`]
    #[error("bases error: {0}")]
    Bases(#[from] IncompatibleBases),

    /// [`OdeError`]
    #[error("integrator error: {0}")]
    Ode(#[from] OdeError),
}

pub type EvolveResult<T> = Result<T, EvolveError>;
