use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use super::expression::{ConstraintExpr, Expression, Variable};
use super::value_objects::{
    ConstraintType, OptimizationType, SolutionStatus, SolverBackend, VariableType,
};

/// Errors raised while assembling a model
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Variable name '{0}' is already declared")]
    DuplicateName(String),

    #[error("Expression references variable #{index} which is not declared in model '{model}'")]
    UnknownVariable { model: String, index: usize },

    #[error("Variable '{name}' has invalid bounds [{lower}, {upper}]")]
    InvalidBounds { name: String, lower: f64, upper: f64 },

    #[error("Constraint '{name}' has a non-finite right-hand side ({rhs})")]
    InvalidRhs { name: String, rhs: f64 },
}

static NEXT_MODEL_ID: AtomicU32 = AtomicU32::new(1);

/// Declaration of a decision variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDef {
    pub variable_type: VariableType,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub name: String,
}

impl VariableDef {
    pub fn is_integer(&self) -> bool {
        self.variable_type.is_integral()
    }
}

/// Objective function to minimize or maximize
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    pub optimization_type: OptimizationType,
    pub expression: Expression,
}

/// Constraint `expression sense rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub expression: Expression,
    pub constraint_type: ConstraintType,
    pub bound: f64,
}

impl Constraint {
    /// Left-hand side at `values`
    pub fn activity(&self, values: &[f64]) -> f64 {
        self.expression.evaluate(values)
    }

    pub fn violation(&self, values: &[f64]) -> f64 {
        self.constraint_type.violation(self.activity(values), self.bound)
    }
}

/// Position of a constraint inside its model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstraintHandle(usize);

impl ConstraintHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Optimization model: variables, one objective and constraints
#[derive(Debug, Clone)]
pub struct Model {
    id: u32,
    name: String,
    variables: Vec<VariableDef>,
    names: HashMap<String, usize>,
    objective: Objective,
    constraints: Vec<Constraint>,
}

impl Model {
    /// Empty model whose objective is the constant zero, minimized.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: NEXT_MODEL_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            variables: Vec::new(),
            names: HashMap::new(),
            objective: Objective {
                optimization_type: OptimizationType::Minimize,
                expression: Expression::default(),
            },
            constraints: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declare a variable. An empty name is replaced by `C<index>`.
    ///
    /// Binary variables are clamped to `[0, 1]` and integer bounds are rounded
    /// inwards before the bounds are checked.
    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        lower: f64,
        upper: f64,
        domain: VariableType,
    ) -> Result<Variable, ModelError> {
        let def = self.prepare_variable(name.into(), lower, upper, domain)?;
        Ok(self.push_variable(def))
    }

    /// Declare `prefix[i]` for every index, e.g. `x[1]`..`x[5]`.
    ///
    /// Nothing is added when any of the names clashes.
    pub fn add_variables<I, K>(
        &mut self,
        prefix: &str,
        indices: I,
        lower: f64,
        upper: f64,
        domain: VariableType,
    ) -> Result<Vec<Variable>, ModelError>
    where
        I: IntoIterator<Item = K>,
        K: std::fmt::Display,
    {
        let mut defs: Vec<VariableDef> = Vec::new();
        for index in indices {
            let def = self.prepare_variable(format!("{prefix}[{index}]"), lower, upper, domain)?;
            if defs.iter().any(|d| d.name == def.name) {
                return Err(ModelError::DuplicateName(def.name));
            }
            defs.push(def);
        }
        Ok(defs.into_iter().map(|def| self.push_variable(def)).collect())
    }

    /// Replace the objective.
    pub fn set_objective(
        &mut self,
        expression: impl Into<Expression>,
        direction: OptimizationType,
    ) -> Result<(), ModelError> {
        let expression = expression.into();
        self.check_variables(&expression)?;
        self.objective = Objective {
            optimization_type: direction,
            expression,
        };
        Ok(())
    }

    /// Add `expression sense rhs`, auto-named `R<index>`.
    pub fn add_constraint(
        &mut self,
        expression: impl Into<Expression>,
        sense: ConstraintType,
        rhs: f64,
    ) -> Result<ConstraintHandle, ModelError> {
        let name = format!("R{}", self.constraints.len());
        self.add_constr(ConstraintExpr::new(expression, sense, rhs), name)
    }

    /// Add a constraint built with `leq` / `geq` / `equals`.
    pub fn add_constr(
        &mut self,
        constraint: ConstraintExpr,
        name: impl Into<String>,
    ) -> Result<ConstraintHandle, ModelError> {
        let name = name.into();
        self.check_variables(&constraint.expression)?;
        if !constraint.rhs.is_finite() {
            return Err(ModelError::InvalidRhs {
                name,
                rhs: constraint.rhs,
            });
        }
        self.constraints.push(Constraint {
            name,
            expression: constraint.expression,
            constraint_type: constraint.sense,
            bound: constraint.rhs,
        });
        Ok(ConstraintHandle(self.constraints.len() - 1))
    }

    /// Add a family of named constraints; stops at the first invalid one.
    pub fn add_constrs<I, S>(&mut self, constraints: I) -> Result<Vec<ConstraintHandle>, ModelError>
    where
        I: IntoIterator<Item = (S, ConstraintExpr)>,
        S: Into<String>,
    {
        constraints
            .into_iter()
            .map(|(name, c)| self.add_constr(c, name))
            .collect()
    }

    pub fn variables(&self) -> &[VariableDef] {
        &self.variables
    }

    pub fn variable(&self, var: Variable) -> Option<&VariableDef> {
        if var.model_id() != self.id {
            return None;
        }
        self.variables.get(var.index())
    }

    pub fn variable_by_name(&self, name: &str) -> Option<Variable> {
        self.names.get(name).map(|&i| Variable::new(self.id, i))
    }

    /// Handles of every variable in declaration order.
    pub fn handles(&self) -> Vec<Variable> {
        (0..self.variables.len())
            .map(|i| Variable::new(self.id, i))
            .collect()
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn constraint(&self, handle: ConstraintHandle) -> Option<&Constraint> {
        self.constraints.get(handle.0)
    }

    pub fn num_variables(&self) -> usize {
        self.variables.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn num_integer_variables(&self) -> usize {
        self.variables.iter().filter(|v| v.is_integer()).count()
    }

    pub fn num_binary_variables(&self) -> usize {
        self.variables
            .iter()
            .filter(|v| v.variable_type == VariableType::Binary)
            .count()
    }

    pub fn is_mixed_integer(&self) -> bool {
        self.num_integer_variables() > 0
    }

    /// True when the objective and every constraint have degree ≤ 1.
    pub fn is_linear(&self) -> bool {
        self.objective.expression.is_linear()
            && self.constraints.iter().all(|c| c.expression.is_linear())
    }

    pub fn evaluate_objective(&self, values: &[f64]) -> f64 {
        self.objective.expression.evaluate(values)
    }

    /// Largest constraint or bound violation at `values`.
    pub fn max_violation(&self, values: &[f64]) -> f64 {
        let bounds = self
            .variables
            .iter()
            .zip(values)
            .map(|(v, &x)| (v.lower_bound - x).max(x - v.upper_bound).max(0.0));
        let rows = self.constraints.iter().map(|c| c.violation(values));
        bounds.chain(rows).fold(0.0, f64::max)
    }

    /// Largest distance of an integer variable from the nearest integer.
    pub fn max_integrality_violation(&self, values: &[f64]) -> f64 {
        self.variables
            .iter()
            .zip(values)
            .filter(|(v, _)| v.is_integer())
            .map(|(_, x)| (x - x.round()).abs())
            .fold(0.0, f64::max)
    }

    fn prepare_variable(
        &self,
        name: String,
        lower: f64,
        upper: f64,
        domain: VariableType,
    ) -> Result<VariableDef, ModelError> {
        let name = if name.is_empty() {
            format!("C{}", self.variables.len())
        } else {
            name
        };
        if self.names.contains_key(&name) {
            return Err(ModelError::DuplicateName(name));
        }

        let (mut lower, mut upper) = (lower, upper);
        if domain == VariableType::Binary {
            lower = lower.max(0.0);
            upper = upper.min(1.0);
        }
        if domain.is_integral() {
            lower = lower.ceil();
            upper = upper.floor();
        }
        if lower.is_nan() || upper.is_nan() || lower > upper
            || lower == f64::INFINITY
            || upper == f64::NEG_INFINITY
        {
            return Err(ModelError::InvalidBounds { name, lower, upper });
        }

        Ok(VariableDef {
            variable_type: domain,
            lower_bound: lower,
            upper_bound: upper,
            name,
        })
    }

    fn push_variable(&mut self, def: VariableDef) -> Variable {
        let index = self.variables.len();
        self.names.insert(def.name.clone(), index);
        self.variables.push(def);
        Variable::new(self.id, index)
    }

    fn check_variables(&self, expression: &Expression) -> Result<(), ModelError> {
        match expression
            .variables()
            .into_iter()
            .find(|v| v.model_id() != self.id || v.index() >= self.variables.len())
        {
            Some(var) => Err(ModelError::UnknownVariable {
                model: self.name.clone(),
                index: var.index(),
            }),
            None => Ok(()),
        }
    }
}

/// Recognized engine toggles and limits, forwarded explicitly to the adapter
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOptions {
    pub backend: SolverBackend,
    pub presolve: bool,
    pub heuristics: bool,
    pub cuts: bool,
    pub time_limit: Option<Duration>,
    pub node_limit: Option<u64>,
    pub iteration_limit: u64,
    pub feasibility_tolerance: f64,
    pub integrality_tolerance: f64,
    /// Relative gap below which a branch-and-bound node is pruned
    pub mip_gap: f64,
    pub seed: u64,
    /// Random starting points for nonlinear models, on top of the fixed ones
    pub multistart: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            backend: SolverBackend::Auto,
            presolve: true,
            heuristics: true,
            cuts: true,
            time_limit: None,
            node_limit: None,
            iteration_limit: 100_000,
            feasibility_tolerance: 1e-6,
            integrality_tolerance: 1e-6,
            mip_gap: 1e-4,
            seed: 0,
            multistart: 16,
        }
    }
}

impl SolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: SolverBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_presolve(mut self, enabled: bool) -> Self {
        self.presolve = enabled;
        self
    }

    pub fn with_heuristics(mut self, enabled: bool) -> Self {
        self.heuristics = enabled;
        self
    }

    pub fn with_cuts(mut self, enabled: bool) -> Self {
        self.cuts = enabled;
        self
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_node_limit(mut self, nodes: u64) -> Self {
        self.node_limit = Some(nodes);
        self
    }

    pub fn with_iteration_limit(mut self, iterations: u64) -> Self {
        self.iteration_limit = iterations;
        self
    }

    pub fn with_mip_gap(mut self, gap: f64) -> Self {
        self.mip_gap = gap;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_multistart(mut self, starts: usize) -> Self {
        self.multistart = starts;
        self
    }

    /// Presolve, heuristics and cuts all off.
    pub fn without_acceleration(self) -> Self {
        self.with_presolve(false)
            .with_heuristics(false)
            .with_cuts(false)
    }
}

/// Statistics about the solve process
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolverStatistics {
    pub simplex_iterations: u64,
    pub nodes_explored: u64,
    pub solve_time_ms: f64,
    pub num_variables: u32,
    pub num_constraints: u32,
    pub num_integer_vars: u32,
    pub num_binary_vars: u32,
}

impl SolverStatistics {
    pub fn for_model(model: &Model) -> Self {
        Self {
            num_variables: model.num_variables() as u32,
            num_constraints: model.num_constraints() as u32,
            num_integer_vars: (model.num_integer_variables() - model.num_binary_variables())
                as u32,
            num_binary_vars: model.num_binary_variables() as u32,
            ..Self::default()
        }
    }
}

/// Quality metrics for the solution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolutionQuality {
    pub max_constraint_violation: f64,
    pub max_integrality_violation: f64,
}

/// Outcome of a solve
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    pub status: SolutionStatus,
    pub optimal_value: Option<f64>,
    /// Values in variable declaration order (present only when optimal)
    pub variable_values: Option<Vec<f64>>,
    pub variable_names: Vec<String>,
    pub message: String,
    pub statistics: SolverStatistics,
    pub quality: SolutionQuality,
}

impl Solution {
    pub fn new(status: SolutionStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            optimal_value: None,
            variable_values: None,
            variable_names: Vec::new(),
            message: message.into(),
            statistics: SolverStatistics::default(),
            quality: SolutionQuality::default(),
        }
    }

    /// Optimal solution; objective and quality are recomputed from the model.
    pub fn optimal(model: &Model, variable_values: Vec<f64>) -> Self {
        let quality = SolutionQuality {
            max_constraint_violation: model.max_violation(&variable_values),
            max_integrality_violation: model.max_integrality_violation(&variable_values),
        };
        Self {
            status: SolutionStatus::Optimal,
            optimal_value: Some(model.evaluate_objective(&variable_values)),
            variable_values: Some(variable_values),
            variable_names: model.variables().iter().map(|v| v.name.clone()).collect(),
            message: format!("Optimal solution found for '{}'", model.name()),
            statistics: SolverStatistics::default(),
            quality,
        }
    }

    pub fn with_statistics(mut self, statistics: SolverStatistics) -> Self {
        self.statistics = statistics;
        self
    }

    pub fn is_optimal(&self) -> bool {
        self.status == SolutionStatus::Optimal
    }

    /// Solved value of a variable.
    pub fn value(&self, var: Variable) -> Option<f64> {
        self.variable_values
            .as_ref()
            .and_then(|values| values.get(var.index()).copied())
    }

    pub fn value_by_name(&self, name: &str) -> Option<f64> {
        let index = self.variable_names.iter().position(|n| n == name)?;
        self.variable_values
            .as_ref()
            .and_then(|values| values.get(index).copied())
    }

    /// `(name, value)` pairs in declaration order; empty unless optimal.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        let values = self.variable_values.as_deref().unwrap_or(&[]);
        self.variable_names
            .iter()
            .map(String::as_str)
            .zip(values.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_are_rejected() {
        let mut model = Model::new("dup");
        model
            .add_variable("x", 0.0, 1.0, VariableType::Continuous)
            .unwrap();
        let err = model
            .add_variable("x", 0.0, 2.0, VariableType::Integer)
            .unwrap_err();
        assert_eq!(err, ModelError::DuplicateName("x".to_string()));
        assert_eq!(model.num_variables(), 1);
    }

    #[test]
    fn add_variables_is_atomic() {
        let mut model = Model::new("vars");
        model
            .add_variable("x[3]", 0.0, 1.0, VariableType::Binary)
            .unwrap();
        let err = model
            .add_variables("x", 1..=5, 0.0, 1.0, VariableType::Binary)
            .unwrap_err();
        assert_eq!(err, ModelError::DuplicateName("x[3]".to_string()));
        assert_eq!(model.num_variables(), 1);

        let y = model
            .add_variables("y", 1..=3, 0.0, 1.0, VariableType::Binary)
            .unwrap();
        assert_eq!(y.len(), 3);
        assert_eq!(model.variable_by_name("y[2]"), Some(y[1]));
    }

    #[test]
    fn empty_name_is_auto_generated() {
        let mut model = Model::new("anon");
        let v = model
            .add_variable("", 0.0, 1.0, VariableType::Continuous)
            .unwrap();
        assert_eq!(model.variable(v).map(|d| d.name.as_str()), Some("C0"));
    }

    #[test]
    fn binary_bounds_are_clamped() {
        let mut model = Model::new("bin");
        let b = model
            .add_variable("b", f64::NEG_INFINITY, f64::INFINITY, VariableType::Binary)
            .unwrap();
        let def = model.variable(b).unwrap();
        assert_eq!((def.lower_bound, def.upper_bound), (0.0, 1.0));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let mut model = Model::new("bounds");
        let err = model
            .add_variable("z", 0.4, 0.6, VariableType::Integer)
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidBounds { .. }));
    }

    #[test]
    fn foreign_variable_is_unknown() {
        let mut a = Model::new("a");
        let mut b = Model::new("b");
        let x = a
            .add_variable("x", 0.0, 1.0, VariableType::Continuous)
            .unwrap();
        b.add_variable("x", 0.0, 1.0, VariableType::Continuous)
            .unwrap();

        let err = b
            .add_constraint(x * 2.0, ConstraintType::LessThanOrEqual, 1.0)
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownVariable { index: 0, .. }));
        assert_eq!(b.num_constraints(), 0);

        let err = b
            .set_objective(x, OptimizationType::Maximize)
            .unwrap_err();
        assert!(matches!(err, ModelError::UnknownVariable { .. }));
    }

    #[test]
    fn constraints_are_auto_named() {
        let mut model = Model::new("named");
        let x = model
            .add_variable("x", 0.0, 10.0, VariableType::Continuous)
            .unwrap();
        let first = model
            .add_constraint(x, ConstraintType::LessThanOrEqual, 4.0)
            .unwrap();
        let second = model.add_constr(x.geq(1.0), "floor").unwrap();
        assert_eq!(model.constraint(first).unwrap().name, "R0");
        assert_eq!(model.constraint(second).unwrap().name, "floor");
        assert_eq!(second.index(), 1);
    }

    #[test]
    fn non_finite_rhs_is_rejected() {
        let mut model = Model::new("rhs");
        let x = model
            .add_variable("x", 0.0, 10.0, VariableType::Continuous)
            .unwrap();
        let err = model
            .add_constraint(x, ConstraintType::LessThanOrEqual, f64::INFINITY)
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidRhs { .. }));
    }

    #[test]
    fn objective_is_overwritten() {
        let mut model = Model::new("obj");
        let x = model
            .add_variable("x", 0.0, 10.0, VariableType::Continuous)
            .unwrap();
        model.set_objective(x, OptimizationType::Minimize).unwrap();
        model
            .set_objective(2.0 * x, OptimizationType::Maximize)
            .unwrap();
        assert_eq!(
            model.objective().optimization_type,
            OptimizationType::Maximize
        );
        assert_eq!(model.evaluate_objective(&[3.0]), 6.0);
    }

    #[test]
    fn violations_cover_rows_and_bounds() {
        let mut model = Model::new("viol");
        let x = model
            .add_variable("x", 0.0, 1.0, VariableType::Integer)
            .unwrap();
        let y = model
            .add_variable("y", 0.0, 5.0, VariableType::Continuous)
            .unwrap();
        model.add_constr((x + y).leq(3.0), "cap").unwrap();
        assert_eq!(model.max_violation(&[1.0, 2.0]), 0.0);
        assert_eq!(model.max_violation(&[1.0, 4.5]), 2.5);
        assert_eq!(model.max_violation(&[2.0, 0.0]), 1.0);
        assert_eq!(model.max_integrality_violation(&[0.25, 0.5]), 0.25);
    }

    #[test]
    fn solution_values_by_handle_and_name() {
        let mut model = Model::new("sol");
        let x = model
            .add_variable("x", 0.0, 10.0, VariableType::Continuous)
            .unwrap();
        model.set_objective(3.0 * x, OptimizationType::Maximize).unwrap();
        let solution = Solution::optimal(&model, vec![2.0]);
        assert_eq!(solution.value(x), Some(2.0));
        assert_eq!(solution.value_by_name("x"), Some(2.0));
        assert_eq!(solution.optimal_value, Some(6.0));
        assert_eq!(solution.iter().collect::<Vec<_>>(), vec![("x", 2.0)]);

        let failed = Solution::new(SolutionStatus::Infeasible, "no");
        assert_eq!(failed.value(x), None);
        assert_eq!(failed.iter().count(), 0);
    }

    #[test]
    fn options_builder_disables_acceleration() {
        let options = SolveOptions::new().without_acceleration().with_seed(7);
        assert!(!options.presolve && !options.heuristics && !options.cuts);
        assert_eq!(options.seed, 7);
        assert!(SolveOptions::default().presolve);
    }
}
