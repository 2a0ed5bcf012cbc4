// Domain value objects shared by the model builder, the adapters and the reporter

use std::fmt;

/// Value restriction of a decision variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableType {
    /// Continuous real number (x ∈ ℝ)
    Continuous,
    /// Integer number (x ∈ ℤ)
    Integer,
    /// Binary variable (x ∈ {0, 1})
    Binary,
}

impl VariableType {
    pub fn is_integral(self) -> bool {
        matches!(self, VariableType::Integer | VariableType::Binary)
    }
}

impl fmt::Display for VariableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariableType::Continuous => write!(f, "continuous"),
            VariableType::Integer => write!(f, "integer"),
            VariableType::Binary => write!(f, "binary"),
        }
    }
}

/// Relational operator of a constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintType {
    /// Less than or equal (≤)
    LessThanOrEqual,
    /// Equal (=)
    Equal,
    /// Greater than or equal (≥)
    GreaterThanOrEqual,
}

impl ConstraintType {
    /// Amount by which `lhs` misses `rhs` under this operator (0 when satisfied)
    pub fn violation(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            ConstraintType::LessThanOrEqual => (lhs - rhs).max(0.0),
            ConstraintType::GreaterThanOrEqual => (rhs - lhs).max(0.0),
            ConstraintType::Equal => (lhs - rhs).abs(),
        }
    }

    /// Operator obtained by multiplying both sides by -1
    pub fn flipped(self) -> Self {
        match self {
            ConstraintType::LessThanOrEqual => ConstraintType::GreaterThanOrEqual,
            ConstraintType::GreaterThanOrEqual => ConstraintType::LessThanOrEqual,
            ConstraintType::Equal => ConstraintType::Equal,
        }
    }
}

impl fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstraintType::LessThanOrEqual => write!(f, "<="),
            ConstraintType::Equal => write!(f, "="),
            ConstraintType::GreaterThanOrEqual => write!(f, ">="),
        }
    }
}

/// Direction of optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptimizationType {
    /// Minimize the objective function
    Minimize,
    /// Maximize the objective function
    Maximize,
}

impl OptimizationType {
    /// Factor that turns this direction into minimization
    pub fn sign(self) -> f64 {
        match self {
            OptimizationType::Minimize => 1.0,
            OptimizationType::Maximize => -1.0,
        }
    }
}

/// Status of the optimization solution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolutionStatus {
    /// Found optimal solution
    Optimal,
    /// Problem has no feasible solution
    Infeasible,
    /// Objective can be improved infinitely
    Unbounded,
    /// Time limit reached
    TimeLimit,
    /// Iteration limit reached
    IterationLimit,
    /// Node limit reached (MIP)
    NodeLimit,
    /// Solver error occurred
    Error,
}

impl fmt::Display for SolutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolutionStatus::Optimal => write!(f, "Optimal"),
            SolutionStatus::Infeasible => write!(f, "Infeasible"),
            SolutionStatus::Unbounded => write!(f, "Unbounded"),
            SolutionStatus::TimeLimit => write!(f, "Time Limit Reached"),
            SolutionStatus::IterationLimit => write!(f, "Iteration Limit Reached"),
            SolutionStatus::NodeLimit => write!(f, "Node Limit Reached"),
            SolutionStatus::Error => write!(f, "Error"),
        }
    }
}

/// Optimization engine to hand the model to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SolverBackend {
    /// Pick the first engine able to handle the model
    #[default]
    Auto,
    /// Self-contained reference engine shipped with the crate
    Builtin,
    /// COIN-OR CBC through good_lp
    CoinCbc,
    /// HiGHS
    Highs,
}

impl fmt::Display for SolverBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverBackend::Auto => write!(f, "Auto"),
            SolverBackend::Builtin => write!(f, "Builtin"),
            SolverBackend::CoinCbc => write!(f, "COIN-OR CBC"),
            SolverBackend::Highs => write!(f, "HiGHS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn violation_is_zero_when_satisfied() {
        assert_eq!(ConstraintType::LessThanOrEqual.violation(3.0, 4.0), 0.0);
        assert_eq!(ConstraintType::GreaterThanOrEqual.violation(5.0, 4.0), 0.0);
        assert_eq!(ConstraintType::Equal.violation(4.0, 4.0), 0.0);
    }

    #[test]
    fn violation_measures_distance_to_rhs() {
        assert_eq!(ConstraintType::LessThanOrEqual.violation(6.0, 4.0), 2.0);
        assert_eq!(ConstraintType::GreaterThanOrEqual.violation(1.0, 4.0), 3.0);
        assert_eq!(ConstraintType::Equal.violation(3.5, 4.0), 0.5);
    }

    #[test]
    fn flipping_swaps_inequalities() {
        assert_eq!(
            ConstraintType::LessThanOrEqual.flipped(),
            ConstraintType::GreaterThanOrEqual
        );
        assert_eq!(ConstraintType::Equal.flipped(), ConstraintType::Equal);
    }

    #[test]
    fn status_display_matches_labels() {
        assert_eq!(SolutionStatus::TimeLimit.to_string(), "Time Limit Reached");
        assert_eq!(SolverBackend::CoinCbc.to_string(), "COIN-OR CBC");
    }
}
