//! Small dense constrained optimizer.
//!
//! Solves
//!
//! ```text
//! minimize    f(x)
//! subject to  g_i(x) >= 0        for every constraint i
//!             lower <= x <= upper
//! ```
//!
//! for a handful of variables with an augmented-Lagrangian outer loop and
//! a projected Newton inner loop. Derivatives are central finite
//! differences; the Hessian is regularized until it factors and the inner
//! loop falls back to the projected gradient when the Newton step does not
//! descend. Constraints are tightened internally by `feasibility_margin` so
//! that converged iterates satisfy the untightened constraints exactly.
//!
//! Convergence is declared only at an approximate KKT point: the iterate is
//! feasible, complementary slackness holds, and the projected gradient of
//! the Lagrangian vanishes (or no descent step exists, as at a kink of the
//! objective). Otherwise the best *feasible* iterate seen is returned with
//! `converged == false`.
use std::time::Instant;

use thiserror::Error;
use tracing::debug;

/// Solver tuning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverSettings {
    /// Outer (multiplier update) iterations.
    pub max_iterations: usize,
    /// Newton / gradient steps per outer iteration.
    pub inner_iterations: usize,
    /// Step size below which the inner loop stops.
    pub tolerance: f64,
    /// Bound on the projected Lagrangian gradient at a converged point.
    pub stationarity_tolerance: f64,
    /// Internal tightening of every inequality constraint.
    pub feasibility_margin: f64,
    pub initial_penalty: f64,
    pub penalty_growth: f64,
    pub max_penalty: f64,
    /// Relative finite-difference step for gradients.
    pub gradient_step: f64,
    /// Relative finite-difference step for the Hessian.
    pub hessian_step: f64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        SolverSettings {
            max_iterations: crate::constants::DEFAULT_MAX_ITERATIONS,
            inner_iterations: 60,
            tolerance: 1e-9,
            stationarity_tolerance: 1e-6,
            feasibility_margin: 1e-6,
            initial_penalty: 10.0,
            penalty_growth: 4.0,
            max_penalty: 1e8,
            gradient_step: 1e-6,
            hessian_step: 1e-4,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolveError {
    #[error("no feasible point found in {iterations} iterations (smallest violation {best_violation:.3e})")]
    NoFeasiblePoint {
        iterations: usize,
        best_violation: f64,
        /// Iterate with the smallest violation.
        closest: Vec<f64>,
    },

    #[error("deadline passed after {iterations} iterations")]
    DeadlineExceeded { iterations: usize },
}

/// Best feasible point found.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution<const N: usize> {
    pub x: [f64; N],
    pub objective: f64,
    pub iterations: usize,
    /// Whether `x` is an approximate KKT point.
    pub converged: bool,
}

type Function<'a, const N: usize> = Box<dyn Fn(&[f64; N]) -> f64 + 'a>;

/// Objective, inequality constraints (`g(x) >= 0`) and box bounds.
pub struct Problem<'a, const N: usize> {
    objective: Function<'a, N>,
    constraints: Vec<Function<'a, N>>,
    lower: [f64; N],
    upper: [f64; N],
}

impl<'a, const N: usize> Problem<'a, N> {
    pub fn new(objective: impl Fn(&[f64; N]) -> f64 + 'a, lower: [f64; N], upper: [f64; N]) -> Self {
        Problem {
            objective: Box::new(objective),
            constraints: Vec::new(),
            lower,
            upper,
        }
    }

    /// Add a constraint `g(x) >= 0`.
    pub fn subject_to(mut self, g: impl Fn(&[f64; N]) -> f64 + 'a) -> Self {
        self.constraints.push(Box::new(g));
        self
    }

    pub fn objective(&self, x: &[f64; N]) -> f64 {
        (self.objective)(x)
    }

    /// Clamp into the box.
    pub fn project(&self, x: &[f64; N]) -> [f64; N] {
        let mut p = *x;
        for k in 0..N {
            p[k] = p[k].clamp(self.lower[k], self.upper[k]);
        }
        p
    }

    /// Largest amount by which any constraint is violated (0 when feasible).
    pub fn violation(&self, x: &[f64; N]) -> f64 {
        self.constraints
            .iter()
            .map(|g| {
                let v = g(x);
                if v.is_nan() { f64::INFINITY } else { (-v).max(0.0) }
            })
            .fold(0.0, f64::max)
    }

    pub fn is_feasible(&self, x: &[f64; N]) -> bool {
        self.violation(x) == 0.0 && self.project(x) == *x
    }

    /// Distance moved by one unit projected-gradient step.
    fn projected_step(&self, x: &[f64; N], grad: &[f64; N]) -> f64 {
        let mut trial = *x;
        for k in 0..N {
            trial[k] -= grad[k];
        }
        distance(&self.project(&trial), x)
    }

    /// Bound-constrained coordinates the gradient pushes outward.
    fn free_coordinates(&self, x: &[f64; N], grad: &[f64; N]) -> [bool; N] {
        let mut free = [true; N];
        for k in 0..N {
            if (x[k] <= self.lower[k] && grad[k] > 0.0) || (x[k] >= self.upper[k] && grad[k] < 0.0) {
                free[k] = false;
            }
        }
        free
    }
}

fn central_gradient<const N: usize>(f: impl Fn(&[f64; N]) -> f64, x: &[f64; N], rel_step: f64) -> [f64; N] {
    let mut grad = [0.0; N];
    for k in 0..N {
        let h = rel_step * x[k].abs().max(1.0);
        let mut fwd = *x;
        let mut back = *x;
        fwd[k] += h;
        back[k] -= h;
        grad[k] = (f(&fwd) - f(&back)) / (2.0 * h);
    }
    grad
}

/// Per-call solver state.
struct Lagrangian<'p, 'a, const N: usize> {
    problem: &'p Problem<'a, N>,
    multipliers: Vec<f64>,
    penalty: f64,
    margin: f64,
}

impl<const N: usize> Lagrangian<'_, '_, N> {
    /// Augmented Lagrangian.
    fn value(&self, x: &[f64; N]) -> f64 {
        let mut total = self.problem.objective(x);
        for (g, &lambda) in self.problem.constraints.iter().zip(&self.multipliers) {
            let c = g(x) - self.margin;
            total += if c < lambda / self.penalty {
                -lambda * c + 0.5 * self.penalty * c * c
            } else {
                -lambda * lambda / (2.0 * self.penalty)
            };
        }
        total
    }

    fn gradient(&self, x: &[f64; N], rel_step: f64) -> [f64; N] {
        central_gradient(|p| self.value(p), x, rel_step)
    }

    /// Symmetrized finite-difference Hessian of `value`.
    fn hessian(&self, x: &[f64; N], settings: &SolverSettings) -> [[f64; N]; N] {
        let mut columns = [[0.0; N]; N];
        for k in 0..N {
            let h = settings.hessian_step * x[k].abs().max(1.0);
            let mut fwd = *x;
            let mut back = *x;
            fwd[k] += h;
            back[k] -= h;
            let gf = self.gradient(&fwd, settings.gradient_step);
            let gb = self.gradient(&back, settings.gradient_step);
            for i in 0..N {
                columns[k][i] = (gf[i] - gb[i]) / (2.0 * h);
            }
        }
        let mut hess = [[0.0; N]; N];
        for i in 0..N {
            for j in 0..N {
                hess[i][j] = 0.5 * (columns[i][j] + columns[j][i]);
            }
        }
        hess
    }

    fn tightened(&self, x: &[f64; N]) -> Vec<f64> {
        self.problem.constraints.iter().map(|g| g(x) - self.margin).collect()
    }

    /// Projected gradient norm of the plain Lagrangian `f - Σ λ (g - margin)`.
    fn stationarity(&self, x: &[f64; N], rel_step: f64) -> f64 {
        let plain = |p: &[f64; N]| {
            let mut total = self.problem.objective(p);
            for (g, &lambda) in self.problem.constraints.iter().zip(&self.multipliers) {
                total -= lambda * (g(p) - self.margin);
            }
            total
        };
        let grad = central_gradient(plain, x, rel_step);
        self.problem.projected_step(x, &grad)
    }

    /// Regularized Newton direction over the free coordinates.
    fn newton_direction(&self, x: &[f64; N], grad: &[f64; N], settings: &SolverSettings) -> Option<[f64; N]> {
        let free = self.problem.free_coordinates(x, grad);
        if !free.contains(&true) {
            return None;
        }
        let hess = self.hessian(x, settings);
        if hess.iter().flatten().any(|h| !h.is_finite()) {
            return None;
        }

        let scale = (0..N)
            .filter(|&k| free[k])
            .map(|k| hess[k][k].abs())
            .fold(1e-12, f64::max);
        let rhs = grad.map(|g| -g);
        let mut shift = 0.0;
        for _ in 0..30 {
            let mut shifted = hess;
            for k in 0..N {
                shifted[k][k] += shift;
            }
            if let Some(direction) = cholesky_solve(&shifted, &rhs, &free) {
                return Some(direction);
            }
            shift = if shift == 0.0 { 1e-8 * scale } else { shift * 10.0 };
        }
        None
    }
}

/// Solve `a d = b` on the `free` rows and columns; other entries of `d` are 0.
/// `None` when the reduced matrix is not positive definite.
fn cholesky_solve<const N: usize>(a: &[[f64; N]; N], b: &[f64; N], free: &[bool; N]) -> Option<[f64; N]> {
    let idx: Vec<usize> = (0..N).filter(|&k| free[k]).collect();
    let m = idx.len();
    let mut l = vec![vec![0.0; m]; m];
    for i in 0..m {
        for j in 0..=i {
            let mut sum = a[idx[i]][idx[j]];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if !sum.is_finite() || sum <= 0.0 {
                    return None;
                }
                l[i][i] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }

    let mut y = vec![0.0; m];
    for i in 0..m {
        let s: f64 = (0..i).map(|k| l[i][k] * y[k]).sum();
        y[i] = (b[idx[i]] - s) / l[i][i];
    }
    let mut z = vec![0.0; m];
    for i in (0..m).rev() {
        let s: f64 = (i + 1..m).map(|k| l[k][i] * z[k]).sum();
        z[i] = (y[i] - s) / l[i][i];
    }

    let mut out = [0.0; N];
    for (i, &k) in idx.iter().enumerate() {
        out[k] = z[i];
    }
    Some(out)
}

/// Tracks the best feasible iterate and the least-infeasible one.
struct Incumbent<const N: usize> {
    feasible: Option<([f64; N], f64)>,
    closest: ([f64; N], f64),
}

impl<const N: usize> Incumbent<N> {
    fn new(problem: &Problem<'_, N>, x: [f64; N]) -> Self {
        let mut incumbent = Incumbent {
            feasible: None,
            closest: (x, f64::INFINITY),
        };
        incumbent.offer(problem, x);
        incumbent
    }

    fn offer(&mut self, problem: &Problem<'_, N>, x: [f64; N]) {
        let violation = problem.violation(&x);
        if violation < self.closest.1 {
            self.closest = (x, violation);
        }
        if violation == 0.0 {
            let f = problem.objective(&x);
            if !f.is_nan() && self.feasible.map_or(true, |(_, best)| f < best) {
                self.feasible = Some((x, f));
            }
        }
    }
}

fn distance<const N: usize>(a: &[f64; N], b: &[f64; N]) -> f64 {
    a.iter().zip(b).map(|(p, q)| (p - q).powi(2)).sum::<f64>().sqrt()
}

/// Armijo backtracking along the projected path `P(x + t d)` from `t = 1`.
fn line_search<const N: usize>(
    lagrangian: &Lagrangian<'_, '_, N>,
    x: &[f64; N],
    grad: &[f64; N],
    direction: &[f64; N],
) -> Option<[f64; N]> {
    let current = lagrangian.value(x);
    let mut t = 1.0;
    for _ in 0..60 {
        let mut trial = *x;
        for k in 0..N {
            trial[k] += t * direction[k];
        }
        let trial = lagrangian.problem.project(&trial);
        let predicted: f64 = (0..N).map(|k| grad[k] * (x[k] - trial[k])).sum();
        if predicted.is_nan() || predicted <= 0.0 {
            return None;
        }
        if current - lagrangian.value(&trial) >= 1e-4 * predicted {
            return Some(trial);
        }
        t *= 0.5;
    }
    None
}

/// Minimize `problem` from `x0`, optionally giving up at `deadline`.
pub fn minimize<const N: usize>(
    problem: &Problem<'_, N>,
    x0: [f64; N],
    settings: &SolverSettings,
    deadline: Option<Instant>,
) -> Result<Solution<N>, SolveError> {
    let mut lagrangian = Lagrangian {
        problem,
        multipliers: vec![0.0; problem.constraints.len()],
        penalty: settings.initial_penalty,
        margin: settings.feasibility_margin,
    };
    // Feasibility and complementarity are judged against a fraction of the
    // margin, so the untightened constraints still hold at convergence.
    let slack = 0.1 * settings.feasibility_margin;

    let mut x = problem.project(&x0);
    let mut incumbent = Incumbent::new(problem, x);
    let mut previous_violation = f64::INFINITY;
    let mut converged = false;
    let mut iterations = 0;

    for outer in 1..=settings.max_iterations {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(SolveError::DeadlineExceeded { iterations });
        }
        iterations = outer;
        let mut stalled = false;

        for _ in 0..settings.inner_iterations {
            let grad = lagrangian.gradient(&x, settings.gradient_step);
            if problem.projected_step(&x, &grad) <= 0.1 * settings.stationarity_tolerance {
                break;
            }

            let steepest = grad.map(|g| -g);
            let next = lagrangian
                .newton_direction(&x, &grad, settings)
                .and_then(|d| line_search(&lagrangian, &x, &grad, &d))
                .or_else(|| line_search(&lagrangian, &x, &grad, &steepest));

            let Some(candidate) = next else {
                stalled = true;
                break;
            };
            let moved = distance(&x, &candidate);
            x = candidate;
            incumbent.offer(problem, x);
            if moved <= settings.tolerance * (1.0 + distance(&x, &[0.0; N])) {
                break;
            }
        }

        let tightened = lagrangian.tightened(&x);
        let violation = tightened.iter().map(|c| (-c).max(0.0)).fold(0.0, f64::max);
        for (lambda, c) in lagrangian.multipliers.iter_mut().zip(&tightened) {
            *lambda = (*lambda - lagrangian.penalty * c).max(0.0);
        }
        let complementarity = tightened
            .iter()
            .zip(&lagrangian.multipliers)
            .map(|(c, lambda)| c.max(0.0).min(*lambda))
            .fold(0.0, f64::max);
        let residual = lagrangian.stationarity(&x, settings.gradient_step);

        if violation <= slack
            && complementarity <= slack
            && (residual <= settings.stationarity_tolerance || stalled)
        {
            converged = true;
            break;
        }
        if violation > slack && violation > 0.25 * previous_violation {
            lagrangian.penalty = (lagrangian.penalty * settings.penalty_growth).min(settings.max_penalty);
        }
        previous_violation = violation;
    }

    debug!(
        iterations,
        converged,
        penalty = lagrangian.penalty,
        feasible = incumbent.feasible.is_some(),
        "augmented Lagrangian finished"
    );

    if converged && problem.is_feasible(&x) {
        return Ok(Solution {
            x,
            objective: problem.objective(&x),
            iterations,
            converged: true,
        });
    }
    match incumbent.feasible {
        Some((best, objective)) => Ok(Solution {
            x: best,
            objective,
            iterations,
            converged: false,
        }),
        None => Err(SolveError::NoFeasiblePoint {
            iterations,
            best_violation: incumbent.closest.1,
            closest: incumbent.closest.0.to_vec(),
        }),
    }
}
