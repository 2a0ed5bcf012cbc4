// HiGHS Solver Adapter
// Implements the SolverService interface for HiGHS
// This is an adapter pattern - translates a linear Model to the HiGHS API

use crate::domain::{
    ConstraintType, Model, Result, Solution, SolutionStatus, SolveOptions, SolverError,
    SolverService, SolverStatistics, VariableType,
};
use highs::{HighsModelStatus, RowProblem, Sense};
use std::time::Instant;
use tracing::{info, warn};

pub struct HighsSolver;

impl HighsSolver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HighsSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverService for HighsSolver {
    fn solve(&self, model: &Model, options: &SolveOptions) -> Result<Solution> {
        self.validate(model)?;

        let start_time = Instant::now();

        let mut costs = vec![0.0; model.num_variables()];
        for (var, coeff) in model.objective().expression.linear_terms() {
            costs[var.index()] += coeff;
        }

        // Add variables first, then constraints
        let mut pb = RowProblem::default();
        let columns: Vec<_> = model
            .variables()
            .iter()
            .zip(&costs)
            .map(|(def, &cost)| {
                let bounds = def.lower_bound..=def.upper_bound;
                match def.variable_type {
                    VariableType::Integer | VariableType::Binary => {
                        pb.add_integer_column(cost, bounds)
                    }
                    VariableType::Continuous => pb.add_column(cost, bounds),
                }
            })
            .collect();

        for constraint in model.constraints() {
            let terms: Vec<_> = constraint
                .expression
                .linear_terms()
                .into_iter()
                .map(|(var, coeff)| (columns[var.index()], coeff))
                .collect();
            let rhs = constraint.bound - constraint.expression.constant();
            match constraint.constraint_type {
                ConstraintType::LessThanOrEqual => pb.add_row(..=rhs, &terms),
                ConstraintType::Equal => pb.add_row(rhs..=rhs, &terms),
                ConstraintType::GreaterThanOrEqual => pb.add_row(rhs.., &terms),
            }
        }

        let sense = match model.objective().optimization_type {
            crate::domain::OptimizationType::Maximize => Sense::Maximise,
            crate::domain::OptimizationType::Minimize => Sense::Minimise,
        };

        let mut highs_model = pb.optimise(sense);
        highs_model.make_quiet();
        if !options.presolve {
            highs_model.set_option("presolve", "off");
        }
        if !options.heuristics {
            highs_model.set_option("mip_heuristic_effort", 0.0);
        }
        if !options.cuts {
            warn!("HiGHS has no global cut switch; the cuts option is not forwarded");
        }
        if let Some(limit) = options.time_limit {
            highs_model.set_option("time_limit", limit.as_secs_f64());
        }
        highs_model.set_option("mip_rel_gap", options.mip_gap);
        highs_model.set_option("random_seed", (options.seed % i32::MAX as u64) as i32);

        let solved = highs_model.solve();

        let mut statistics = SolverStatistics::for_model(model);
        statistics.solve_time_ms = start_time.elapsed().as_secs_f64() * 1000.0;

        let solution = match solved.status() {
            HighsModelStatus::Optimal => {
                let values = solved.get_solution().columns().to_vec();
                Solution::optimal(model, values)
            }
            status => status_solution(status)?,
        };
        info!(status = %solution.status, objective = ?solution.optimal_value, "HiGHS finished");
        Ok(solution.with_statistics(statistics))
    }

    fn name(&self) -> &str {
        "HiGHS"
    }

    fn supports_mip(&self) -> bool {
        true
    }

    fn supports_nonlinear(&self) -> bool {
        false
    }
}

/// Map a non-optimal HiGHS status to a solution without values
fn status_solution(status: HighsModelStatus) -> Result<Solution> {
    let solution = match status {
        HighsModelStatus::Infeasible => Solution::new(
            SolutionStatus::Infeasible,
            "Problem is infeasible: no solution satisfies all constraints",
        ),
        HighsModelStatus::Unbounded => Solution::new(
            SolutionStatus::Unbounded,
            "Problem is unbounded: objective can be improved infinitely",
        ),
        // Dual infeasibility only; presolve could not tell which
        HighsModelStatus::UnboundedOrInfeasible => Solution::new(
            SolutionStatus::Error,
            "HiGHS could not tell whether the problem is infeasible or unbounded",
        ),
        HighsModelStatus::ReachedTimeLimit => {
            Solution::new(SolutionStatus::TimeLimit, "HiGHS reached the time limit")
        }
        HighsModelStatus::ReachedIterationLimit => Solution::new(
            SolutionStatus::IterationLimit,
            "HiGHS reached the iteration limit",
        ),
        status => {
            return Err(SolverError::ExecutionFailed(format!(
                "HiGHS solver returned status: {:?}",
                status
            )))
        }
    };
    Ok(solution)
}
