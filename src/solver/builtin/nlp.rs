//! Augmented-Lagrangian solver for polynomial models.
//!
//! Constraints `g(x) <= 0` and `h(x) = 0` (finite variable bounds included)
//! are folded into the PHR augmented Lagrangian
//!
//! ```text
//! L(x) = f(x) + Σ μ_k h_k + ρ/2 Σ h_k² + 1/(2ρ) Σ (max(0, λ_i + ρ g_i)² - λ_i²)
//! ```
//!
//! which is minimized with BFGS. Multipliers are updated after every inner
//! solve and `ρ` grows while the violation does not shrink fast enough.
//! Local solves run from a fixed set of starting points plus seeded random
//! ones, and the best feasible local optimum wins.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::domain::{ConstraintType, Expression, Model, SolveOptions};

use super::branch_bound::{Relaxation, RelaxationResult, RelaxationStatus};

const MAX_OUTER: usize = 60;
const MAX_INNER: u64 = 2_000;
const INITIAL_RHO: f64 = 10.0;
const MAX_RHO: f64 = 1e10;
const GRADIENT_TOLERANCE: f64 = 1e-9;
const COMPLEMENTARITY_TOLERANCE: f64 = 1e-6;
const ARMIJO: f64 = 1e-4;
const MIN_STEP: f64 = 1e-14;
const MAX_EXPANSIONS: usize = 60;
const DIVERGED_POINT: f64 = 1e12;
const DIVERGED_VALUE: f64 = 1e30;
/// Width of the sampling box for unbounded coordinates
const SAMPLE_SPREAD: f64 = 10.0;
/// Models up to this many variables also start from every ±1 corner
const MAX_CORNER_DIMENSION: usize = 6;

/// Polynomial model in minimization form
#[derive(Debug, Clone)]
pub(crate) struct NonlinearProblem {
    objective: Expression,
    /// `g(x) <= 0`
    inequalities: Vec<Expression>,
    /// `h(x) = 0`
    equalities: Vec<Expression>,
    num_variables: usize,
}

impl NonlinearProblem {
    pub fn from_model(model: &Model) -> Self {
        let sign = model.objective().optimization_type.sign();
        let mut inequalities = Vec::new();
        let mut equalities = Vec::new();
        for c in model.constraints() {
            match c.constraint_type {
                ConstraintType::LessThanOrEqual => inequalities.push(c.expression.clone() - c.bound),
                ConstraintType::GreaterThanOrEqual => {
                    inequalities.push(Expression::from_constant(c.bound) - c.expression.clone())
                }
                ConstraintType::Equal => equalities.push(c.expression.clone() - c.bound),
            }
        }
        Self {
            objective: model.objective().expression.clone().scale(sign),
            inequalities,
            equalities,
            num_variables: model.num_variables(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BoundTerm {
    index: usize,
    value: f64,
    upper: bool,
}

/// Augmented Lagrangian at fixed multipliers and penalty
struct Penalty<'p> {
    problem: &'p NonlinearProblem,
    bounds: &'p [BoundTerm],
    lambda: Vec<f64>,
    mu: Vec<f64>,
    rho: f64,
}

impl Penalty<'_> {
    fn num_inequalities(&self) -> usize {
        self.problem.inequalities.len() + self.bounds.len()
    }

    fn inequality(&self, i: usize, x: &[f64]) -> f64 {
        let general = self.problem.inequalities.len();
        if i < general {
            return self.problem.inequalities[i].evaluate(x);
        }
        let b = self.bounds[i - general];
        if b.upper {
            x[b.index] - b.value
        } else {
            b.value - x[b.index]
        }
    }

    fn add_inequality_gradient(&self, i: usize, x: &[f64], weight: f64, grad: &mut [f64]) {
        let general = self.problem.inequalities.len();
        if i < general {
            self.problem.inequalities[i].accumulate_gradient(x, weight, grad);
            return;
        }
        let b = self.bounds[i - general];
        grad[b.index] += if b.upper { weight } else { -weight };
    }

    fn value_and_gradient(&self, x: &[f64], grad: &mut [f64]) -> f64 {
        grad.fill(0.0);
        let mut value = self.problem.objective.evaluate(x);
        self.problem.objective.accumulate_gradient(x, 1.0, grad);

        for (k, h) in self.problem.equalities.iter().enumerate() {
            let hv = h.evaluate(x);
            value += self.mu[k] * hv + 0.5 * self.rho * hv * hv;
            h.accumulate_gradient(x, self.mu[k] + self.rho * hv, grad);
        }
        for i in 0..self.num_inequalities() {
            let gv = self.inequality(i, x);
            let shifted = (self.lambda[i] + self.rho * gv).max(0.0);
            value += (shifted * shifted - self.lambda[i] * self.lambda[i]) / (2.0 * self.rho);
            self.add_inequality_gradient(i, x, shifted, grad);
        }
        value
    }

    fn violation(&self, x: &[f64]) -> f64 {
        let eq = self
            .problem
            .equalities
            .iter()
            .map(|h| h.evaluate(x).abs());
        let ineq = (0..self.num_inequalities()).map(|i| self.inequality(i, x).max(0.0));
        eq.chain(ineq).fold(0.0, f64::max)
    }
}

struct InnerResult {
    x: Vec<f64>,
    iterations: u64,
    converged: bool,
    diverged: bool,
}

enum LocalOutcome {
    Finished {
        x: Vec<f64>,
        objective: f64,
        violation: f64,
    },
    Unbounded,
}

/// Relaxation for polynomial models, also used directly for continuous ones
pub(crate) struct NonlinearRelaxation {
    problem: NonlinearProblem,
    feasibility_tolerance: f64,
    multistart: usize,
    seed: u64,
    iteration_limit: u64,
    deadline: Option<Instant>,
}

impl NonlinearRelaxation {
    pub fn new(problem: NonlinearProblem, options: &SolveOptions, deadline: Option<Instant>) -> Self {
        Self {
            problem,
            feasibility_tolerance: options.feasibility_tolerance,
            multistart: options.multistart,
            seed: options.seed,
            iteration_limit: options.iteration_limit,
            deadline,
        }
    }

    fn starting_points(&self, lower: &[f64], upper: &[f64]) -> Vec<Vec<f64>> {
        let n = self.problem.num_variables;
        let clamp = |point: Vec<f64>| -> Vec<f64> {
            point
                .into_iter()
                .enumerate()
                .map(|(j, v)| v.max(lower[j]).min(upper[j]))
                .collect()
        };

        let mut starts = vec![clamp(vec![0.0; n])];
        if n <= MAX_CORNER_DIMENSION {
            for mask in 0..(1usize << n) {
                let corner = (0..n)
                    .map(|j| if (mask >> j) & 1 == 1 { 1.0 } else { -1.0 })
                    .collect();
                starts.push(clamp(corner));
            }
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        for _ in 0..self.multistart {
            let point = (0..n)
                .map(|j| match (lower[j].is_finite(), upper[j].is_finite()) {
                    (true, true) if lower[j] < upper[j] => rng.gen_range(lower[j]..upper[j]),
                    (true, true) => lower[j],
                    (true, false) => lower[j] + rng.gen_range(0.0..SAMPLE_SPREAD),
                    (false, true) => upper[j] - rng.gen_range(0.0..SAMPLE_SPREAD),
                    (false, false) => rng.gen_range(-SAMPLE_SPREAD..SAMPLE_SPREAD),
                })
                .collect();
            starts.push(point);
        }
        starts
    }

    fn local_solve(&self, start: Vec<f64>, bounds: &[BoundTerm], iterations: &mut u64) -> LocalOutcome {
        let n_ineq = self.problem.inequalities.len() + bounds.len();
        let mut penalty = Penalty {
            problem: &self.problem,
            bounds,
            lambda: vec![0.0; n_ineq],
            mu: vec![0.0; self.problem.equalities.len()],
            rho: INITIAL_RHO,
        };

        let mut x = start;
        let mut previous_violation = f64::INFINITY;
        for _ in 0..MAX_OUTER {
            let inner = minimize(&penalty, &x);
            *iterations += inner.iterations;

            if inner.diverged {
                if penalty.violation(&inner.x) <= self.feasibility_tolerance {
                    return LocalOutcome::Unbounded;
                }
                if penalty.rho >= MAX_RHO {
                    return LocalOutcome::Unbounded;
                }
                penalty.rho = (penalty.rho * 10.0).min(MAX_RHO);
                continue;
            }
            x = inner.x;

            for k in 0..penalty.mu.len() {
                penalty.mu[k] += penalty.rho * self.problem.equalities[k].evaluate(&x);
            }
            let mut complementarity: f64 = 0.0;
            for i in 0..n_ineq {
                let gv = penalty.inequality(i, &x);
                penalty.lambda[i] = (penalty.lambda[i] + penalty.rho * gv).max(0.0);
                complementarity = complementarity.max((-gv).min(penalty.lambda[i]).abs());
            }

            let violation = penalty.violation(&x);
            if violation <= self.feasibility_tolerance
                && complementarity <= COMPLEMENTARITY_TOLERANCE
                && inner.converged
            {
                break;
            }
            if violation > 0.25 * previous_violation {
                penalty.rho = (penalty.rho * 10.0).min(MAX_RHO);
            }
            previous_violation = violation;
        }

        LocalOutcome::Finished {
            objective: self.problem.objective.evaluate(&x),
            violation: penalty.violation(&x),
            x,
        }
    }
}

impl Relaxation for NonlinearRelaxation {
    fn solve(&mut self, lower: &[f64], upper: &[f64]) -> RelaxationResult {
        if lower.iter().zip(upper).any(|(l, u)| l > u) {
            return RelaxationResult::without_point(RelaxationStatus::Infeasible, 0);
        }

        let bounds: Vec<BoundTerm> = (0..self.problem.num_variables)
            .flat_map(|j| {
                let lo = lower[j].is_finite().then_some(BoundTerm {
                    index: j,
                    value: lower[j],
                    upper: false,
                });
                let hi = upper[j].is_finite().then_some(BoundTerm {
                    index: j,
                    value: upper[j],
                    upper: true,
                });
                lo.into_iter().chain(hi)
            })
            .collect();

        let mut iterations = 0;
        let mut exhausted = false;
        let mut best: Option<(Vec<f64>, f64)> = None;
        for (k, start) in self.starting_points(lower, upper).into_iter().enumerate() {
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                return RelaxationResult::without_point(RelaxationStatus::TimeLimit, iterations);
            }
            if iterations >= self.iteration_limit {
                debug!(start = k, iterations, "iteration budget spent, skipping remaining starts");
                exhausted = true;
                break;
            }

            match self.local_solve(start, &bounds, &mut iterations) {
                LocalOutcome::Unbounded => {
                    debug!(start = k, "objective diverged along a feasible path");
                    return RelaxationResult::without_point(RelaxationStatus::Unbounded, iterations);
                }
                LocalOutcome::Finished {
                    x,
                    objective,
                    violation,
                } => {
                    debug!(start = k, objective, violation, "local solve finished");
                    if !objective.is_finite() {
                        return RelaxationResult::without_point(
                            RelaxationStatus::Error(format!("non-finite objective from start {k}")),
                            iterations,
                        );
                    }
                    let feasible = violation <= self.feasibility_tolerance;
                    if feasible && best.as_ref().map_or(true, |(_, b)| objective < *b) {
                        best = Some((x, objective));
                    }
                }
            }
        }

        match best {
            Some((values, objective)) => RelaxationResult {
                status: RelaxationStatus::Optimal,
                values,
                objective,
                iterations,
            },
            None if exhausted => {
                RelaxationResult::without_point(RelaxationStatus::IterationLimit, iterations)
            }
            None => RelaxationResult::without_point(RelaxationStatus::Infeasible, iterations),
        }
    }
}

/// BFGS with Armijo backtracking and step expansion.
fn minimize(penalty: &Penalty<'_>, x0: &[f64]) -> InnerResult {
    let n = x0.len();
    let mut x = x0.to_vec();
    let mut grad = vec![0.0; n];
    let mut f = penalty.value_and_gradient(&x, &mut grad);
    let mut h = identity(n, 1.0);
    let mut scaled = false;
    let mut new_grad = vec![0.0; n];
    let mut iterations = 0;

    let result = |x: Vec<f64>, iterations, converged, diverged| InnerResult {
        x,
        iterations,
        converged,
        diverged,
    };

    loop {
        if !f.is_finite() || f < -DIVERGED_VALUE || norm_inf(&x) > DIVERGED_POINT {
            return result(x, iterations, false, true);
        }
        if norm_inf(&grad) <= GRADIENT_TOLERANCE * (1.0 + f.abs()) {
            return result(x, iterations, true, false);
        }
        if iterations >= MAX_INNER {
            return result(x, iterations, false, false);
        }
        iterations += 1;

        let mut direction: Vec<f64> = mat_vec(&h, &grad).into_iter().map(|v| -v).collect();
        let mut slope = dot(&grad, &direction);
        if slope >= 0.0 {
            h = identity(n, 1.0);
            scaled = false;
            direction = grad.iter().map(|g| -g).collect();
            slope = -dot(&grad, &grad);
        }

        let mut step = 1.0;
        let mut candidate = axpy(&x, step, &direction);
        let mut f_new = penalty.value_and_gradient(&candidate, &mut new_grad);
        let accepted_first = f_new.is_finite() && f_new <= f + ARMIJO * step * slope;
        if accepted_first {
            // Keep doubling while the sufficient decrease condition holds
            let mut trial_grad = vec![0.0; n];
            for _ in 0..MAX_EXPANSIONS {
                let trial = axpy(&x, 2.0 * step, &direction);
                let f_trial = penalty.value_and_gradient(&trial, &mut trial_grad);
                if !(f_trial.is_finite() && f_trial <= f + ARMIJO * 2.0 * step * slope && f_trial < f_new) {
                    break;
                }
                step *= 2.0;
                candidate = trial;
                f_new = f_trial;
                new_grad.copy_from_slice(&trial_grad);
            }
        } else {
            loop {
                step *= 0.5;
                if step < MIN_STEP {
                    // No further decrease along any usable direction
                    return result(x, iterations, true, false);
                }
                candidate = axpy(&x, step, &direction);
                f_new = penalty.value_and_gradient(&candidate, &mut new_grad);
                if f_new.is_finite() && f_new <= f + ARMIJO * step * slope {
                    break;
                }
            }
        }

        let s: Vec<f64> = candidate.iter().zip(&x).map(|(a, b)| a - b).collect();
        let y: Vec<f64> = new_grad.iter().zip(&grad).map(|(a, b)| a - b).collect();
        let sy = dot(&s, &y);
        if sy > 1e-12 * dot(&s, &s).sqrt() * dot(&y, &y).sqrt() {
            if !scaled {
                h = identity(n, sy / dot(&y, &y));
                scaled = true;
            }
            bfgs_update(&mut h, &s, &y, sy);
        }

        x = candidate;
        f = f_new;
        grad.copy_from_slice(&new_grad);
    }
}

fn identity(n: usize, scale: f64) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { scale } else { 0.0 }).collect())
        .collect()
}

fn mat_vec(m: &[Vec<f64>], v: &[f64]) -> Vec<f64> {
    m.iter().map(|row| dot(row, v)).collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn axpy(x: &[f64], alpha: f64, d: &[f64]) -> Vec<f64> {
    x.iter().zip(d).map(|(a, b)| a + alpha * b).collect()
}

fn norm_inf(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

/// Inverse-Hessian update `H ← (I - ρ s yᵀ) H (I - ρ y sᵀ) + ρ s sᵀ`.
fn bfgs_update(h: &mut [Vec<f64>], s: &[f64], y: &[f64], sy: f64) {
    let n = s.len();
    let hy = mat_vec(h, y);
    let yhy = dot(y, &hy);
    let factor = (sy + yhy) / (sy * sy);
    for i in 0..n {
        for j in 0..n {
            h[i][j] += factor * s[i] * s[j] - (hy[i] * s[j] + s[i] * hy[j]) / sy;
        }
    }
}
