// COIN-OR CBC adapter
// Translates a linear Model into a good_lp problem solved by CBC

use crate::domain::{
    ConstraintType, Model, Result, Solution, SolutionStatus, SolveOptions, SolverError,
    SolverService, SolverStatistics, VariableType,
};
use good_lp::{
    solvers::coin_cbc, variable, variables, Expression, ResolutionError,
    Solution as GoodLpSolutionTrait, SolverModel, Variable as GoodLpVariable,
};
use std::time::Instant;
use tracing::{debug, info};

pub struct CoinCbcSolver;

impl CoinCbcSolver {
    pub fn new() -> Self {
        Self
    }

    /// CBC command-line parameters for the given options
    fn parameters(options: &SolveOptions) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if !options.presolve {
            params.push(("preprocess", "off".to_string()));
            params.push(("presolve", "off".to_string()));
        }
        if !options.heuristics {
            params.push(("heuristicsOnOff", "off".to_string()));
        }
        if !options.cuts {
            params.push(("cutsOnOff", "off".to_string()));
        }
        if let Some(limit) = options.time_limit {
            params.push(("seconds", limit.as_secs_f64().to_string()));
        }
        if let Some(nodes) = options.node_limit {
            params.push(("maxNodes", nodes.to_string()));
        }
        params.push(("ratioGap", options.mip_gap.to_string()));
        params.push(("randomCbcSeed", options.seed.to_string()));
        params
    }
}

impl Default for CoinCbcSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl SolverService for CoinCbcSolver {
    fn solve(&self, model: &Model, options: &SolveOptions) -> Result<Solution> {
        self.validate(model)?;

        let start_time = Instant::now();

        let mut vars = variables!();
        let lp_variables: Vec<GoodLpVariable> = model
            .variables()
            .iter()
            .map(|def| {
                let definition = variable().min(def.lower_bound).max(def.upper_bound);
                match def.variable_type {
                    VariableType::Binary | VariableType::Integer => vars.add(definition.integer()),
                    VariableType::Continuous => vars.add(definition),
                }
            })
            .collect();

        // good_lp minimizes, so negate for maximization
        let sign = model.objective().optimization_type.sign();
        let mut objective: Expression = 0.into();
        for (var, coeff) in model.objective().expression.linear_terms() {
            objective += sign * coeff * lp_variables[var.index()];
        }

        let mut lp_model = vars.minimise(objective).using(coin_cbc::coin_cbc);
        for (key, value) in Self::parameters(options) {
            debug!(key, value = %value, "CBC parameter");
            lp_model.set_parameter(key, &value);
        }

        for constraint in model.constraints() {
            let mut lhs: Expression = 0.into();
            for (var, coeff) in constraint.expression.linear_terms() {
                lhs += coeff * lp_variables[var.index()];
            }
            let rhs = constraint.bound - constraint.expression.constant();
            lp_model = match constraint.constraint_type {
                ConstraintType::LessThanOrEqual => lp_model.with(lhs.leq(rhs)),
                ConstraintType::Equal => lp_model.with(lhs.eq(rhs)),
                ConstraintType::GreaterThanOrEqual => lp_model.with(lhs.geq(rhs)),
            };
        }

        let solution_result = lp_model.solve();

        let mut statistics = SolverStatistics::for_model(model);
        statistics.solve_time_ms = start_time.elapsed().as_secs_f64() * 1000.0;

        let solution = match solution_result {
            Ok(sol) => {
                let values = lp_variables.iter().map(|&var| sol.value(var)).collect();
                Solution::optimal(model, values)
            }
            Err(ResolutionError::Infeasible) => Solution::new(
                SolutionStatus::Infeasible,
                "Problem is infeasible: no solution satisfies all constraints",
            ),
            Err(ResolutionError::Unbounded) => Solution::new(
                SolutionStatus::Unbounded,
                "Problem is unbounded: objective can be improved infinitely",
            ),
            Err(e) => return Err(SolverError::ExecutionFailed(format!("{:?}", e))),
        };
        info!(status = %solution.status, objective = ?solution.optimal_value, "CBC finished");
        Ok(solution.with_statistics(statistics))
    }

    fn name(&self) -> &str {
        "COIN-OR CBC"
    }

    fn supports_mip(&self) -> bool {
        true
    }

    fn supports_nonlinear(&self) -> bool {
        false
    }
}
