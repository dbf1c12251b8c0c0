#![allow(non_snake_case)]

//! Numerical integration of the (possibly time-dependent) Schrödinger
//! equation for kets, bras, and propagator operators over identity-tagged
//! Hilbert-space bases.
//!
//! The drivers in [`schrodinger`] validate generator/state compatibility,
//! make one working copy of the initial state, and hand an in-place
//! derivative callback to the generic adaptive Runge-Kutta routine in
//! [`ode`]; output callbacks observe the evolving state through transient
//! borrowed views at each requested time.
//!
//! ```no_run
//! use ndarray::{ self as nd, array };
//! use num_complex::Complex64 as C64;
//! use qevolve::{
//!     hilbert::{ Basis, Ket, Operator },
//!     ode::IntegratorOpts,
//!     schrodinger::evolve,
//! };
//!
//! let basis = Basis::new("qubit", 2);
//! let H = Operator::square(
//!     basis.clone(),
//!     array![
//!         [C64::from(0.0), C64::from(1.0)],
//!         [C64::from(1.0), C64::from(0.0)],
//!     ],
//! ).unwrap();
//! let psi0 = Ket::basis_state(basis, 0).unwrap();
//! let t: nd::Array1<f64> = nd::Array1::linspace(0.0, 10.0, 100);
//! let states = evolve(&t, &psi0.into(), &H, &IntegratorOpts::default())
//!     .expect("evolve: incompatible bases");
//! ```

pub mod error;
pub mod hilbert;
pub mod ode;
pub mod schrodinger;
