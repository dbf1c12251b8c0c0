//! Generic adaptive Runge-Kutta integration over complex-valued buffers.
//!
//! This module is the integration backend consumed by the evolution drivers in
//! [`schrodinger`][crate::schrodinger]: it knows nothing about bases, states,
//! or operators, only about a flat `Array1<C64>` buffer, a derivative
//! callback, and an output callback. Stepping is fifth-order Dormand-Prince
//! with an embedded fourth-order error estimate and FSAL reuse of the last
//! stage.

use itertools::Itertools;
use ndarray as nd;
use num_complex::Complex64 as C64;
use crate::error::OdeError;

/// Step-size adapter used to rescale the step after each error estimate.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepAdapter {
    /// Elementary rescale on the current error estimate alone.
    Basic,
    /// PI-controlled rescale using the current and previous error estimates;
    /// smoother step-size sequences on mildly stiff problems.
    Pi,
}

/// Tuning parameters for [`integrate`], validated up front by
/// [`Self::validate`].
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct IntegratorOpts {
    /// Relative error tolerance. Must be greater than 0.
    pub rtol: f64,
    /// Absolute error tolerance. Must be greater than 0.
    pub atol: f64,
    /// Maximum number of step attempts (accepted or rejected) before the run
    /// is aborted. Must be greater than 0.
    pub max_steps: usize,
    /// If `true`, step freely and deliver output values from a cubic Hermite
    /// interpolant (third-order accurate between steps); if `false`, clamp
    /// steps to land exactly on each requested output time.
    pub dense_output: bool,
    /// Step-size adapter choice.
    pub adapter: StepAdapter,
}

impl Default for IntegratorOpts {
    fn default() -> Self {
        Self {
            rtol: 1e-8,
            atol: 1e-10,
            max_steps: 100_000,
            dense_output: false,
            adapter: StepAdapter::Basic,
        }
    }
}

impl IntegratorOpts {
    /// Check all parameter bounds.
    pub fn validate(&self) -> Result<(), OdeError> {
        if self.rtol <= 0.0 || self.atol <= 0.0 {
            return Err(OdeError::BadTolerance(self.rtol, self.atol));
        }
        if self.max_steps == 0 {
            return Err(OdeError::BadMaxSteps);
        }
        Ok(())
    }
}

// Dormand-Prince 5(4) tableau; row i of `A` holds the coupling coefficients
// for stage i, the last row doubling as the fifth-order solution weights
// (FSAL: stage 7 is the derivative at the accepted solution point)
const A: [[f64; 6]; 7] = [
    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0, 0.0],
    [
        19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0,
        -212.0 / 729.0, 0.0, 0.0,
    ],
    [
        9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0,
        49.0 / 176.0, -5103.0 / 18656.0, 0.0,
    ],
    [
        35.0 / 384.0, 0.0, 500.0 / 1113.0,
        125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0,
    ],
];

const C: [f64; 7] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0, 1.0];

// difference between the fifth- and embedded fourth-order weights
const E: [f64; 7] = [
    35.0 / 384.0 - 5179.0 / 57600.0,
    0.0,
    500.0 / 1113.0 - 7571.0 / 16695.0,
    125.0 / 192.0 - 393.0 / 640.0,
    -2187.0 / 6784.0 + 92097.0 / 339200.0,
    11.0 / 84.0 - 187.0 / 2100.0,
    -1.0 / 40.0,
];

// step-rescale safety factor and growth/shrink limits
const SAFE: f64 = 0.9;
const FAC_MIN: f64 = 0.2;
const FAC_MAX: f64 = 5.0;

fn check_times(t: &nd::Array1<f64>) -> Result<(), OdeError> {
    (
        !t.is_empty()
        && t.iter().tuple_windows().all(|(tk, tkp1)| tkp1 > tk)
    )
    .then_some(())
    .ok_or(OdeError::BadTimes)
}

// scaled RMS norm of the embedded error estimate; <= 1 means acceptable
fn error_norm(
    e_coeffs: &[nd::Array1<C64>],
    h: f64,
    y_old: &nd::Array1<C64>,
    y_new: &nd::Array1<C64>,
    rtol: f64,
    atol: f64,
) -> f64
{
    let n = y_old.len();
    let mut acc: f64 = 0.0;
    for i in 0..n {
        let err: C64
            = h * (0..7).map(|j| E[j] * e_coeffs[j][i]).sum::<C64>();
        let scale: f64
            = atol + rtol * y_old[i].norm().max(y_new[i].norm());
        acc += (err.norm() / scale).powi(2);
    }
    (acc / n as f64).sqrt()
}

fn step_factor(adapter: StepAdapter, err: f64, err_prev: f64) -> f64 {
    if err == 0.0 { return FAC_MAX; }
    let fac
        = match adapter {
            StepAdapter::Basic => SAFE * err.powf(-0.2),
            StepAdapter::Pi
                => SAFE * err.powf(-0.14) * err_prev.powf(0.08),
        };
    fac.clamp(FAC_MIN, FAC_MAX)
}

// cubic Hermite interpolant over an accepted step
fn hermite(
    theta: f64,
    h: f64,
    y0: &nd::Array1<C64>,
    y1: &nd::Array1<C64>,
    f0: &nd::Array1<C64>,
    f1: &nd::Array1<C64>,
    out: &mut nd::Array1<C64>,
)
{
    let h00 = 2.0 * theta.powi(3) - 3.0 * theta.powi(2) + 1.0;
    let h10 = theta.powi(3) - 2.0 * theta.powi(2) + theta;
    let h01 = -2.0 * theta.powi(3) + 3.0 * theta.powi(2);
    let h11 = theta.powi(3) - theta.powi(2);
    nd::Zip::from(out).and(y0).and(y1).and(f0).and(f1)
        .for_each(|o, &y0i, &y1i, &f0i, &f1i| {
            *o = h00 * y0i + h01 * y1i + h * (h10 * f0i + h11 * f1i);
        });
}

/// Integrate `dy/dt = rhs(t, y)` from `t[0]`, delivering the solution buffer
/// to `out` at every element of `t`.
///
/// `rhs` receives the current time, the live solution buffer, and the
/// derivative buffer to overwrite in place; its error type aborts the run
/// unchanged. `out` receives a borrowed buffer that is reused for subsequent
/// evaluations and must be duplicated by the caller if a persistent record is
/// wanted. `out` is always invoked for `t[0]` with the initial buffer.
///
/// The elements of `t` must be strictly increasing. The solution and stage
/// buffers are allocated once up front; the step loop itself is
/// allocation-free.
pub fn integrate<F, G, X>(
    t: &nd::Array1<f64>,
    y0: nd::Array1<C64>,
    mut rhs: F,
    mut out: G,
    opts: &IntegratorOpts,
) -> Result<(), X>
where
    F: FnMut(f64, &nd::Array1<C64>, &mut nd::Array1<C64>) -> Result<(), X>,
    G: FnMut(f64, &nd::Array1<C64>),
    X: From<OdeError>,
{
    opts.validate()?;
    check_times(t)?;
    let nt = t.len();
    let n = y0.len();
    let mut y = y0;
    let mut y_stage: nd::Array1<C64> = nd::Array1::zeros(n);
    let mut y_interp: nd::Array1<C64> = nd::Array1::zeros(n);
    let mut k: Vec<nd::Array1<C64>>
        = (0..7).map(|_| nd::Array1::zeros(n)).collect();
    rhs(t[0], &y, &mut k[0])?;
    out(t[0], &y);
    if nt == 1 { return Ok(()); }

    let t_end = t[nt - 1];
    let mut t_cur = t[0];
    let mut h = t[1] - t[0];
    let mut err_prev: f64 = 1.0;
    let mut nsteps: usize = 0;
    let mut idx: usize = 1;
    while idx < nt {
        nsteps += 1;
        if nsteps > opts.max_steps {
            return Err(OdeError::MaxSteps(opts.max_steps).into());
        }
        let target = if opts.dense_output { t_end } else { t[idx] };
        let dt_left = target - t_cur;
        let clamped = h >= dt_left;
        let h_try = if clamped { dt_left } else { h };

        // stages 2..=7; after the final iteration `y_stage` holds the
        // fifth-order solution and `k[6]` its derivative (FSAL)
        for i in 1..7 {
            y_stage.assign(&y);
            for j in 0..i {
                if A[i][j] != 0.0 {
                    y_stage.scaled_add(C64::from(h_try * A[i][j]), &k[j]);
                }
            }
            rhs(t_cur + C[i] * h_try, &y_stage, &mut k[i])?;
        }
        let err = error_norm(&k, h_try, &y, &y_stage, opts.rtol, opts.atol);
        let fac = step_factor(opts.adapter, err, err_prev);

        if err <= 1.0 {
            let t_new = if clamped { target } else { t_cur + h_try };
            // exact-hit fuzz at the scale of this step; a span-scale
            // allowance would swallow output times closer together than a
            // fixed fraction of the whole run
            let tiny = 4.0 * f64::EPSILON * t_new.abs().max(h_try);
            while idx < nt && t[idx] <= t_new + tiny {
                if (t[idx] - t_new).abs() <= tiny {
                    out(t[idx], &y_stage);
                } else {
                    let theta = (t[idx] - t_cur) / h_try;
                    hermite(
                        theta, h_try,
                        &y, &y_stage, &k[0], &k[6],
                        &mut y_interp,
                    );
                    out(t[idx], &y_interp);
                }
                idx += 1;
            }
            t_cur = t_new;
            std::mem::swap(&mut y, &mut y_stage);
            k.swap(0, 6);
            err_prev = err.max(1e-10);
            if !clamped { h = h_try * fac; }
        } else {
            h = h_try * fac;
            if h <= f64::EPSILON * t_cur.abs().max(1.0) {
                return Err(OdeError::StepUnderflow(t_cur).into());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use ndarray::array;
    use super::*;

    fn collect(
        t: &nd::Array1<f64>,
        y0: nd::Array1<C64>,
        rhs: impl FnMut(f64, &nd::Array1<C64>, &mut nd::Array1<C64>)
            -> Result<(), OdeError>,
        opts: &IntegratorOpts,
    ) -> Result<Vec<nd::Array1<C64>>, OdeError>
    {
        let mut acc: Vec<nd::Array1<C64>> = Vec::new();
        integrate(t, y0, rhs, |_, y| acc.push(y.to_owned()), opts)?;
        Ok(acc)
    }

    fn tight() -> IntegratorOpts {
        IntegratorOpts {
            rtol: 1e-10,
            atol: 1e-12,
            ..IntegratorOpts::default()
        }
    }

    #[test]
    fn exponential_decay() {
        let t: nd::Array1<f64> = nd::Array1::linspace(0.0, 5.0, 11);
        let y0 = array![C64::from(1.0)];
        let sol
            = collect(
                &t, y0,
                |_, y, dy| { dy[0] = -y[0]; Ok(()) },
                &tight(),
            )
            .unwrap();
        assert_eq!(sol.len(), t.len());
        for (tk, yk) in t.iter().zip(&sol) {
            assert!((yk[0] - C64::from((-tk).exp())).norm() < 1e-7);
        }
    }

    #[test]
    fn oscillator_phase() {
        let t: nd::Array1<f64>
            = nd::Array1::linspace(0.0, std::f64::consts::TAU, 25);
        let y0 = array![C64::from(1.0)];
        let sol
            = collect(
                &t, y0,
                |_, y, dy| { dy[0] = C64::i() * y[0]; Ok(()) },
                &tight(),
            )
            .unwrap();
        for (tk, yk) in t.iter().zip(&sol) {
            assert!((yk[0] - C64::cis(*tk)).norm() < 1e-7);
        }
    }

    #[test]
    fn dense_output_matches_clamped() {
        let t: nd::Array1<f64> = nd::Array1::linspace(0.0, 3.0, 31);
        let y0 = array![C64::from(1.0)];
        let rhs
            = |_: f64, y: &nd::Array1<C64>, dy: &mut nd::Array1<C64>| {
                dy[0] = -y[0];
                Ok(())
            };
        let clamped
            = collect(&t, y0.clone(), rhs, &IntegratorOpts::default())
            .unwrap();
        let opts
            = IntegratorOpts {
                dense_output: true,
                adapter: StepAdapter::Pi,
                ..IntegratorOpts::default()
            };
        let dense = collect(&t, y0, rhs, &opts).unwrap();
        assert_eq!(dense.len(), clamped.len());
        // the interpolant is only third-order between steps
        for (a, b) in clamped.iter().zip(&dense) {
            assert!((a[0] - b[0]).norm() < 1e-3);
        }
    }

    #[test]
    fn close_output_times_stay_distinct() {
        // two output times separated by far less than 1e-12 of the span;
        // each must receive its own value, not the nearer step endpoint's
        let t: nd::Array1<f64> = array![0.0, 1.0e6 - 1.0e-7, 1.0e6];
        let sol
            = collect(
                &t,
                array![C64::from(0.0)],
                |_, _, dy| { dy[0] = C64::from(1.0e9); Ok(()) },
                &IntegratorOpts::default(),
            )
            .unwrap();
        assert_eq!(sol.len(), t.len());
        // y(t) = 1e9 t, so the trailing outputs differ by exactly 100
        assert!(((sol[2][0] - sol[1][0]).re - 100.0).abs() < 2.0);
        assert!((sol[2][0] - C64::from(1.0e15)).norm() < 5.0);
    }

    #[test]
    fn step_underflow_on_discontinuity() {
        // a unit jump in the derivative at t = 0.5 cannot be resolved at
        // these tolerances: every step crossing it is rejected, and the
        // shrinking step size hits the representability bound
        let opts
            = IntegratorOpts {
                rtol: 1e-14,
                atol: 1e-300,
                ..IntegratorOpts::default()
            };
        let res
            = collect(
                &array![0.0, 1.0],
                array![C64::from(0.0)],
                |tk, _, dy| {
                    dy[0]
                        = if tk < 0.5 { C64::from(0.0) }
                        else { C64::from(1.0) };
                    Ok(())
                },
                &opts,
            );
        assert!(matches!(res, Err(OdeError::StepUnderflow(_))));
    }

    #[test]
    fn boundary_validation() {
        let y0 = array![C64::from(1.0)];
        let rhs
            = |_: f64, y: &nd::Array1<C64>, dy: &mut nd::Array1<C64>| {
                dy[0] = -y[0];
                Ok(())
            };
        let bad_tol
            = IntegratorOpts { rtol: 0.0, ..IntegratorOpts::default() };
        let res = collect(&array![0.0, 1.0], y0.clone(), rhs, &bad_tol);
        assert!(matches!(res, Err(OdeError::BadTolerance(..))));

        let res
            = collect(
                &array![0.0, 1.0, 0.5],
                y0.clone(),
                rhs,
                &IntegratorOpts::default(),
            );
        assert!(matches!(res, Err(OdeError::BadTimes)));

        let res
            = collect(
                &nd::Array1::from_vec(Vec::new()),
                y0,
                rhs,
                &IntegratorOpts::default(),
            );
        assert!(matches!(res, Err(OdeError::BadTimes)));
    }

    #[test]
    fn max_steps_exceeded() {
        let opts
            = IntegratorOpts { max_steps: 3, ..IntegratorOpts::default() };
        let res
            = collect(
                &array![0.0, 1000.0],
                array![C64::from(1.0)],
                |_, y, dy| { dy[0] = C64::i() * y[0]; Ok(()) },
                &opts,
            );
        assert!(matches!(res, Err(OdeError::MaxSteps(3))));
    }

    #[test]
    fn initial_point_always_delivered() {
        let sol
            = collect(
                &array![0.0],
                array![C64::from(2.0)],
                |_, y, dy| { dy[0] = -y[0]; Ok(()) },
                &IntegratorOpts::default(),
            )
            .unwrap();
        assert_eq!(sol.len(), 1);
        assert_eq!(sol[0][0], C64::from(2.0));
    }
}
