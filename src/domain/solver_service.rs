// Domain service interface for handing a model to an optimization engine
// Every engine adapter implements this contract, so callers never depend on a concrete engine

use super::models::{Model, ModelError, Solution, SolveOptions};

/// Error types for the solver service
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    #[error("Engine not available: {0}")]
    EngineUnavailable(String),

    #[error("Solver execution failed: {0}")]
    ExecutionFailed(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type Result<T> = std::result::Result<T, SolverError>;

/// Adapter between a [`Model`] and an optimization engine
///
/// Non-optimal outcomes (infeasible, unbounded, limits) are returned as a
/// [`Solution`] status. Errors are reserved for models the engine cannot
/// accept and for engine failures.
pub trait SolverService: Send + Sync {
    /// Solve a model with the given options
    fn solve(&self, model: &Model, options: &SolveOptions) -> Result<Solution>;

    /// Reject models this engine cannot handle
    fn validate(&self, model: &Model) -> Result<()> {
        let mut errors = Vec::new();

        if !self.supports_nonlinear() && !model.is_linear() {
            errors.push(format!(
                "{} only accepts linear objectives and constraints",
                self.name()
            ));
        }

        if !self.supports_mip() && model.is_mixed_integer() {
            errors.push(format!(
                "{} does not support integer variables ({} declared)",
                self.name(),
                model.num_integer_variables()
            ));
        }

        let objective = &model.objective().expression;
        if !objective.constant().is_finite() || objective.terms().any(|(_, c)| !c.is_finite()) {
            errors.push("Objective has a non-finite coefficient".to_string());
        }

        for constraint in model.constraints() {
            if constraint.expression.terms().any(|(_, c)| !c.is_finite()) {
                errors.push(format!(
                    "Constraint '{}' has a non-finite coefficient",
                    constraint.name
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SolverError::InvalidModel(errors.join("; ")))
        }
    }

    /// Get the name of this solver backend
    fn name(&self) -> &str;

    /// Check if this solver supports mixed-integer programming
    fn supports_mip(&self) -> bool;

    /// Check if this solver accepts polynomial objectives and constraints
    fn supports_nonlinear(&self) -> bool;
}
