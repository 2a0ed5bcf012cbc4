// Engine-side form of a linear model: minimization, dense bounds, sparse rows

use crate::domain::{ConstraintType, Model};

/// Sparse row `Σ coeff * x[j] sense rhs`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LinearRow {
    pub coeffs: Vec<(usize, f64)>,
    pub sense: ConstraintType,
    pub rhs: f64,
}

/// Linear model in minimization form
#[derive(Debug, Clone)]
pub(crate) struct LinearProblem {
    pub cost: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub integer: Vec<bool>,
    pub rows: Vec<LinearRow>,
}

impl LinearProblem {
    /// Caller guarantees `model.is_linear()`.
    pub fn from_model(model: &Model) -> Self {
        let n = model.num_variables();
        let sign = model.objective().optimization_type.sign();

        let mut cost = vec![0.0; n];
        for (var, coeff) in model.objective().expression.linear_terms() {
            cost[var.index()] += sign * coeff;
        }

        let rows = model
            .constraints()
            .iter()
            .map(|c| LinearRow {
                coeffs: c
                    .expression
                    .linear_terms()
                    .into_iter()
                    .map(|(var, coeff)| (var.index(), coeff))
                    .collect(),
                sense: c.constraint_type,
                rhs: c.bound - c.expression.constant(),
            })
            .collect();

        Self {
            cost,
            lower: model.variables().iter().map(|v| v.lower_bound).collect(),
            upper: model.variables().iter().map(|v| v.upper_bound).collect(),
            integer: model.variables().iter().map(|v| v.is_integer()).collect(),
            rows,
        }
    }

    pub fn num_variables(&self) -> usize {
        self.cost.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OptimizationType, VariableType};

    #[test]
    fn maximization_is_negated() {
        let mut model = Model::new("lp");
        let x = model
            .add_variable("x", 0.0, 4.0, VariableType::Continuous)
            .unwrap();
        let y = model
            .add_variable("y", 0.0, 1.0, VariableType::Binary)
            .unwrap();
        model
            .set_objective(3.0 * x + y, OptimizationType::Maximize)
            .unwrap();
        model.add_constr((x + 2.0 * y).leq(5.0), "cap").unwrap();

        let problem = LinearProblem::from_model(&model);
        assert_eq!(problem.cost, vec![-3.0, -1.0]);
        assert_eq!(problem.integer, vec![false, true]);
        assert_eq!(problem.rows[0].coeffs, vec![(0, 1.0), (1, 2.0)]);
        assert_eq!(problem.rows[0].rhs, 5.0);
        assert_eq!(problem.rows[0].sense, ConstraintType::LessThanOrEqual);
    }
}
