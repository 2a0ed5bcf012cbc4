// Built-in engine: simplex or augmented Lagrangian under a common branch and bound

mod branch_bound;
mod cuts;
mod nlp;
mod presolve;
mod problem;
mod simplex;

use std::time::Instant;

use tracing::{debug, info};

use crate::domain::{
    Model, Result, Solution, SolutionStatus, SolveOptions, SolverService, SolverStatistics,
};

use branch_bound::{BranchAndBound, Relaxation, RelaxationResult, RelaxationStatus, SearchOutcome};
use nlp::{NonlinearProblem, NonlinearRelaxation};
use presolve::{presolve, PresolveOutcome};
use problem::{LinearProblem, LinearRow};
use simplex::{LpStatus, Simplex};

/// Engine shipped with the crate; handles linear, integer and polynomial models
#[derive(Debug, Clone, Default)]
pub struct BuiltinSolver;

impl BuiltinSolver {
    pub fn new() -> Self {
        Self
    }

    fn solve_linear<F>(
        &self,
        model: &Model,
        options: &SolveOptions,
        deadline: Option<Instant>,
        accept: F,
    ) -> SearchOutcome
    where
        F: Fn(&[f64]) -> Option<f64>,
    {
        let mut problem = LinearProblem::from_model(model);
        if options.presolve {
            match presolve(&mut problem, options.feasibility_tolerance) {
                PresolveOutcome::Reduced(stats) => debug!(
                    rows_removed = stats.rows_removed,
                    bounds_tightened = stats.bounds_tightened,
                    passes = stats.passes,
                    "presolve finished"
                ),
                PresolveOutcome::Infeasible(reason) => {
                    return SearchOutcome {
                        status: SolutionStatus::Infeasible,
                        values: None,
                        nodes: 0,
                        iterations: 0,
                        message: format!("Presolve proved the model infeasible: {reason}"),
                    };
                }
            }
        }

        let sign = model.objective().optimization_type.sign();
        let mut relaxation = LinearRelaxation {
            problem: &problem,
            cuts: Vec::new(),
            simplex: Simplex::new().with_max_iterations(options.iteration_limit),
            offset: sign * model.objective().expression.constant(),
            tolerance: options.feasibility_tolerance,
            deadline,
        };
        let search = BranchAndBound::new(options, &problem.integer, deadline);
        search.run(
            &mut relaxation,
            problem.lower.clone(),
            problem.upper.clone(),
            accept,
        )
    }

    fn solve_nonlinear<F>(
        &self,
        model: &Model,
        options: &SolveOptions,
        deadline: Option<Instant>,
        accept: F,
    ) -> SearchOutcome
    where
        F: Fn(&[f64]) -> Option<f64>,
    {
        if options.presolve || options.cuts {
            debug!("presolve and cuts only apply to linear models");
        }
        let integer: Vec<bool> = model.variables().iter().map(|v| v.is_integer()).collect();
        let lower = model.variables().iter().map(|v| v.lower_bound).collect();
        let upper = model.variables().iter().map(|v| v.upper_bound).collect();

        let mut relaxation =
            NonlinearRelaxation::new(NonlinearProblem::from_model(model), options, deadline);
        BranchAndBound::new(options, &integer, deadline).run(&mut relaxation, lower, upper, accept)
    }
}

impl SolverService for BuiltinSolver {
    fn solve(&self, model: &Model, options: &SolveOptions) -> Result<Solution> {
        self.validate(model)?;

        let start = Instant::now();
        let deadline = options.time_limit.map(|limit| start + limit);
        let sign = model.objective().optimization_type.sign();
        let violation_limit = 10.0 * options.feasibility_tolerance;

        // Candidates are judged against the model itself, not the engine's view of it
        let accept = |values: &[f64]| -> Option<f64> {
            let feasible = model.max_violation(values) <= violation_limit
                && model.max_integrality_violation(values) <= options.integrality_tolerance;
            feasible.then(|| sign * model.evaluate_objective(values))
        };

        let linear = model.is_linear();
        info!(
            model = model.name(),
            variables = model.num_variables(),
            constraints = model.num_constraints(),
            integers = model.num_integer_variables(),
            linear,
            "solving with the built-in engine"
        );

        let outcome = if linear {
            self.solve_linear(model, options, deadline, accept)
        } else {
            self.solve_nonlinear(model, options, deadline, accept)
        };

        let mut statistics = SolverStatistics::for_model(model);
        statistics.simplex_iterations = outcome.iterations;
        statistics.nodes_explored = outcome.nodes;
        statistics.solve_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        let solution = match outcome.values {
            Some(values) if outcome.status == SolutionStatus::Optimal => {
                Solution::optimal(model, values)
            }
            _ => Solution::new(outcome.status, outcome.message),
        };
        info!(
            status = %solution.status,
            objective = ?solution.optimal_value,
            nodes = statistics.nodes_explored,
            iterations = statistics.simplex_iterations,
            "built-in engine finished"
        );
        Ok(solution.with_statistics(statistics))
    }

    fn name(&self) -> &str {
        "builtin"
    }

    fn supports_mip(&self) -> bool {
        true
    }

    fn supports_nonlinear(&self) -> bool {
        true
    }
}

/// Simplex relaxation over the model rows plus any cover cuts found so far
struct LinearRelaxation<'p> {
    problem: &'p LinearProblem,
    cuts: Vec<LinearRow>,
    simplex: Simplex,
    /// Objective constant in minimization form
    offset: f64,
    tolerance: f64,
    deadline: Option<Instant>,
}

impl Relaxation for LinearRelaxation<'_> {
    fn solve(&mut self, lower: &[f64], upper: &[f64]) -> RelaxationResult {
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return RelaxationResult::without_point(RelaxationStatus::TimeLimit, 0);
        }

        let rows: Vec<LinearRow> = self
            .problem
            .rows
            .iter()
            .chain(&self.cuts)
            .cloned()
            .collect();
        let lp = self.simplex.solve(&self.problem.cost, lower, upper, &rows);
        let status = match lp.status {
            LpStatus::Optimal => RelaxationStatus::Optimal,
            LpStatus::Infeasible => RelaxationStatus::Infeasible,
            LpStatus::Unbounded => RelaxationStatus::Unbounded,
            LpStatus::IterationLimit => RelaxationStatus::IterationLimit,
        };
        RelaxationResult {
            status,
            values: lp.values,
            objective: lp.objective + self.offset,
            iterations: lp.iterations,
        }
    }

    fn separate_cuts(&mut self, lower: &[f64], upper: &[f64], point: &[f64]) -> usize {
        let found = cuts::cover_cuts(self.problem, &self.cuts, lower, upper, point, self.tolerance);
        let added = found.len();
        self.cuts.extend(found);
        added
    }
}
