// Domain layer: model building blocks and the engine contract
pub mod domain;

// Application layer: solve orchestration, reporting, scenarios
pub mod application;

// Infrastructure layer: logging, CLI, LP files
pub mod infrastructure;

// Solver adapters: Concrete implementations of SolverService
pub mod solver;

// Re-export commonly used types
pub use domain::{
    Constraint, ConstraintExpr, ConstraintHandle, ConstraintType, Expression, Model, ModelError,
    Objective, OptimizationType, Solution, SolutionQuality, SolutionStatus, SolveOptions,
    SolverBackend, SolverError, SolverService, SolverStatistics, Variable, VariableDef,
    VariableType,
};

pub use application::{OptimizationService, ReportFormat, Reporter, Scenario};

pub use solver::{BuiltinSolver, SolverFactory};

#[cfg(feature = "coin_cbc")]
pub use solver::CoinCbcSolver;

#[cfg(feature = "highs")]
pub use solver::HighsSolver;
