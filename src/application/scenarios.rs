// Coursework models: a nonconvex quadratic program and a project-selection IP

use crate::domain::{
    ConstraintType, Expression, Model, ModelError, OptimizationType, SolveOptions, Variable,
    VariableType,
};

use super::reporter::ReportFormat;

/// Return of each project
pub const R_COEFF: [f64; 5] = [20.0, 40.0, 20.0, 15.0, 30.0];

/// Spending per year (rows) and project (columns)
pub const A_COEFF: [[f64; 5]; 3] = [
    [5.0, 4.0, 3.0, 7.0, 8.0],
    [1.0, 7.0, 9.0, 4.0, 6.0],
    [8.0, 10.0, 2.0, 1.0, 10.0],
];

/// Budget per year
pub const B_COEFF: [f64; 3] = [25.0, 25.0, 25.0];

/// A model ready to solve, with the options and report layout it is run with
#[derive(Debug, Clone)]
pub struct Scenario {
    pub model: Model,
    pub options: SolveOptions,
    pub format: ReportFormat,
    /// Decision variables in declaration order
    pub variables: Vec<Variable>,
}

/// `max 3 x1² - 4 x2` subject to `x1 x2 <= 4` and `x1² + x2² <= 16`, with free variables.
pub fn nlp1() -> Result<Scenario, ModelError> {
    let mut model = Model::new("Nonlinear_Program");
    let x1 = model.add_variable("x1", f64::NEG_INFINITY, f64::INFINITY, VariableType::Continuous)?;
    let x2 = model.add_variable("x2", f64::NEG_INFINITY, f64::INFINITY, VariableType::Continuous)?;

    model.set_objective(3.0 * x1.pow(2) - 4.0 * x2, OptimizationType::Maximize)?;
    model.add_constr((x1 * x2).leq(4.0), "nonlinear_constraint1")?;
    model.add_constr((x1.pow(2) + x2.pow(2)).leq(16.0), "nonlinear_constraint2")?;

    Ok(Scenario {
        model,
        options: SolveOptions::default(),
        format: ReportFormat::Plain,
        variables: vec![x1, x2],
    })
}

/// Pick projects to maximize return while every yearly budget holds.
///
/// `domain` selects the binary model, its general-integer variant or the
/// continuous relaxation. Presolve, heuristics and cuts are off.
pub fn projectsip1(domain: VariableType) -> Result<Scenario, ModelError> {
    let mut model = Model::new("projectsip1");
    let x = model.add_variables("x", 1..=R_COEFF.len(), 0.0, f64::INFINITY, domain)?;

    // Budget capacity constraints
    for (row, budget) in A_COEFF.iter().zip(B_COEFF) {
        let spend: Expression = row.iter().zip(&x).map(|(&a, &xj)| a * xj).sum();
        model.add_constraint(spend, ConstraintType::LessThanOrEqual, budget)?;
    }
    // Variable upper bound constraints
    for &xj in &x {
        model.add_constraint(xj, ConstraintType::LessThanOrEqual, 1.0)?;
    }

    let objective: Expression = R_COEFF.iter().zip(&x).map(|(&r, &xj)| r * xj).sum();
    model.set_objective(objective, OptimizationType::Maximize)?;

    Ok(Scenario {
        model,
        options: SolveOptions::default().without_acceleration(),
        format: ReportFormat::Table,
        variables: x,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nlp1_is_quadratic_with_free_variables() {
        let scenario = nlp1().unwrap();
        assert_eq!(scenario.model.num_variables(), 2);
        assert_eq!(scenario.model.num_constraints(), 2);
        assert_eq!(scenario.model.objective().expression.degree(), 2);
        assert!(scenario
            .model
            .variables()
            .iter()
            .all(|v| v.lower_bound == f64::NEG_INFINITY && v.upper_bound == f64::INFINITY));
    }

    #[test]
    fn projectsip1_has_budget_and_bound_rows() {
        let scenario = projectsip1(VariableType::Binary).unwrap();
        let model = &scenario.model;
        assert_eq!(model.num_variables(), 5);
        assert_eq!(model.num_constraints(), 8);
        assert_eq!(model.num_binary_variables(), 5);
        assert_eq!(model.variables()[0].name, "x[1]");
        assert!(!scenario.options.presolve);
        assert!(!scenario.options.heuristics);
        assert!(!scenario.options.cuts);
    }

    #[test]
    fn known_selection_is_feasible() {
        let scenario = projectsip1(VariableType::Binary).unwrap();
        let selection = [1.0, 1.0, 1.0, 1.0, 0.0];
        assert_eq!(scenario.model.max_violation(&selection), 0.0);
        assert_eq!(scenario.model.evaluate_objective(&selection), 95.0);
    }
}
