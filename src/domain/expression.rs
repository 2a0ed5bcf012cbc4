//! Polynomial expressions over model variables.
//!
//! An [`Expression`] is a constant plus a sum of `coefficient * monomial`
//! terms, where a [`Monomial`] is a product of variable powers. Like terms are
//! merged on insertion and zero coefficients are dropped, so two expressions
//! describing the same polynomial compare equal.
//!
//! Arithmetic works on any mix of [`Variable`], [`Expression`] and `f64`:
//!
//! ```
//! use classopt::{Model, OptimizationType, VariableType};
//!
//! let mut model = Model::new("demo");
//! let x1 = model.add_variable("x1", f64::NEG_INFINITY, f64::INFINITY, VariableType::Continuous).unwrap();
//! let x2 = model.add_variable("x2", f64::NEG_INFINITY, f64::INFINITY, VariableType::Continuous).unwrap();
//! let objective = 3.0 * x1.pow(2) - 4.0 * x2;
//! assert_eq!(objective.degree(), 2);
//! model.set_objective(objective, OptimizationType::Maximize).unwrap();
//! ```

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

use super::value_objects::ConstraintType;

/// Handle to a decision variable declared in a [`Model`](super::Model).
///
/// Handles are cheap to copy and remember which model created them, so an
/// expression mixing handles from two models is rejected by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable {
    model: u32,
    index: u32,
}

impl Variable {
    pub(crate) fn new(model: u32, index: usize) -> Self {
        Self {
            model,
            index: index as u32,
        }
    }

    /// Position of the variable in declaration order.
    pub fn index(self) -> usize {
        self.index as usize
    }

    pub(crate) fn model_id(self) -> u32 {
        self.model
    }

    /// `self^exponent`; `pow(0)` is the constant 1.
    pub fn pow(self, exponent: u32) -> Expression {
        if exponent == 0 {
            return Expression::from_constant(1.0);
        }
        let mut expr = Expression::default();
        expr.add_term(Monomial(vec![(self, exponent)]), 1.0);
        expr
    }

    pub fn leq(self, rhs: impl Into<Expression>) -> ConstraintExpr {
        Expression::from(self).leq(rhs)
    }

    pub fn geq(self, rhs: impl Into<Expression>) -> ConstraintExpr {
        Expression::from(self).geq(rhs)
    }

    pub fn equals(self, rhs: impl Into<Expression>) -> ConstraintExpr {
        Expression::from(self).equals(rhs)
    }
}

/// Product of variable powers, kept sorted by variable with positive exponents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Monomial(Vec<(Variable, u32)>);

impl Monomial {
    /// The empty product (the constant monomial 1).
    fn unit() -> Self {
        Self(Vec::new())
    }

    fn is_unit(&self) -> bool {
        self.0.is_empty()
    }

    pub fn factors(&self) -> &[(Variable, u32)] {
        &self.0
    }

    /// Sum of the exponents.
    pub fn degree(&self) -> u32 {
        self.0.iter().map(|(_, e)| e).sum()
    }

    /// The single variable of a degree-1 monomial.
    pub fn as_linear(&self) -> Option<Variable> {
        match self.0.as_slice() {
            [(var, 1)] => Some(*var),
            _ => None,
        }
    }

    fn product(&self, other: &Monomial) -> Monomial {
        let mut factors = Vec::with_capacity(self.0.len() + other.0.len());
        let (mut i, mut j) = (0, 0);
        while i < self.0.len() && j < other.0.len() {
            let (a, ea) = self.0[i];
            let (b, eb) = other.0[j];
            if a == b {
                factors.push((a, ea + eb));
                i += 1;
                j += 1;
            } else if a < b {
                factors.push((a, ea));
                i += 1;
            } else {
                factors.push((b, eb));
                j += 1;
            }
        }
        factors.extend_from_slice(&self.0[i..]);
        factors.extend_from_slice(&other.0[j..]);
        Monomial(factors)
    }

    fn evaluate(&self, values: &[f64]) -> f64 {
        self.0
            .iter()
            .map(|(var, e)| values[var.index()].powi(*e as i32))
            .product()
    }

    /// Partial derivative with respect to the `k`-th factor, evaluated at `values`.
    fn partial(&self, k: usize, values: &[f64]) -> f64 {
        self.0
            .iter()
            .enumerate()
            .map(|(i, (var, e))| {
                let x = values[var.index()];
                if i == k {
                    *e as f64 * x.powi(*e as i32 - 1)
                } else {
                    x.powi(*e as i32)
                }
            })
            .product()
    }
}

/// Polynomial in the model variables.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expression {
    constant: f64,
    terms: BTreeMap<Monomial, f64>,
}

impl Expression {
    pub fn from_constant(constant: f64) -> Self {
        Self {
            constant,
            terms: BTreeMap::new(),
        }
    }

    /// Linear expression `Σ coeff * var`.
    pub fn linear<I>(terms: I) -> Self
    where
        I: IntoIterator<Item = (Variable, f64)>,
    {
        let mut expr = Self::default();
        for (var, coeff) in terms {
            expr.add_term(Monomial(vec![(var, 1)]), coeff);
        }
        expr
    }

    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// Non-constant terms in canonical order.
    pub fn terms(&self) -> impl Iterator<Item = (&Monomial, f64)> {
        self.terms.iter().map(|(m, c)| (m, *c))
    }

    pub fn num_terms(&self) -> usize {
        self.terms.len()
    }

    /// Highest monomial degree (0 for a constant).
    pub fn degree(&self) -> u32 {
        self.terms.keys().map(Monomial::degree).max().unwrap_or(0)
    }

    pub fn is_linear(&self) -> bool {
        self.degree() <= 1
    }

    /// Coefficients of the degree-1 terms.
    pub fn linear_terms(&self) -> Vec<(Variable, f64)> {
        self.terms
            .iter()
            .filter_map(|(m, c)| m.as_linear().map(|v| (v, *c)))
            .collect()
    }

    /// Every variable appearing in a term.
    pub fn variables(&self) -> BTreeSet<Variable> {
        self.terms
            .keys()
            .flat_map(|m| m.factors().iter().map(|(v, _)| *v))
            .collect()
    }

    pub fn without_constant(&self) -> Self {
        Self {
            constant: 0.0,
            terms: self.terms.clone(),
        }
    }

    /// Value at a point indexed by variable declaration order.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|(m, c)| c * m.evaluate(values))
                .sum::<f64>()
    }

    /// Adds the gradient at `values`, scaled by `weight`, into `grad`.
    pub fn accumulate_gradient(&self, values: &[f64], weight: f64, grad: &mut [f64]) {
        if weight == 0.0 {
            return;
        }
        for (monomial, coeff) in &self.terms {
            for (k, (var, _)) in monomial.factors().iter().enumerate() {
                grad[var.index()] += weight * coeff * monomial.partial(k, values);
            }
        }
    }

    /// `self^exponent` by repeated multiplication.
    pub fn pow(&self, exponent: u32) -> Self {
        let mut result = Expression::from_constant(1.0);
        for _ in 0..exponent {
            result = result * self.clone();
        }
        result
    }

    pub fn scale(mut self, by: f64) -> Self {
        if by == 0.0 {
            return Self::default();
        }
        self.constant *= by;
        for coeff in self.terms.values_mut() {
            *coeff *= by;
        }
        self
    }

    pub fn leq(self, rhs: impl Into<Expression>) -> ConstraintExpr {
        ConstraintExpr::from_difference(self - rhs, ConstraintType::LessThanOrEqual)
    }

    pub fn geq(self, rhs: impl Into<Expression>) -> ConstraintExpr {
        ConstraintExpr::from_difference(self - rhs, ConstraintType::GreaterThanOrEqual)
    }

    pub fn equals(self, rhs: impl Into<Expression>) -> ConstraintExpr {
        ConstraintExpr::from_difference(self - rhs, ConstraintType::Equal)
    }

    fn add_term(&mut self, monomial: Monomial, coeff: f64) {
        if coeff == 0.0 {
            return;
        }
        if monomial.is_unit() {
            self.constant += coeff;
            return;
        }
        match self.terms.entry(monomial) {
            Entry::Occupied(mut slot) => {
                *slot.get_mut() += coeff;
                if *slot.get() == 0.0 {
                    slot.remove();
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(coeff);
            }
        }
    }

    fn all_terms(&self) -> impl Iterator<Item = (Monomial, f64)> + '_ {
        let constant = (self.constant != 0.0).then(|| (Monomial::unit(), self.constant));
        constant
            .into_iter()
            .chain(self.terms.iter().map(|(m, c)| (m.clone(), *c)))
    }
}

impl From<f64> for Expression {
    fn from(value: f64) -> Self {
        Expression::from_constant(value)
    }
}

impl From<Variable> for Expression {
    fn from(var: Variable) -> Self {
        Expression::linear([(var, 1.0)])
    }
}

impl<R: Into<Expression>> AddAssign<R> for Expression {
    fn add_assign(&mut self, rhs: R) {
        let rhs = rhs.into();
        self.constant += rhs.constant;
        for (monomial, coeff) in rhs.terms {
            self.add_term(monomial, coeff);
        }
    }
}

impl<R: Into<Expression>> SubAssign<R> for Expression {
    fn sub_assign(&mut self, rhs: R) {
        *self += rhs.into().scale(-1.0);
    }
}

impl<R: Into<Expression>> MulAssign<R> for Expression {
    fn mul_assign(&mut self, rhs: R) {
        let rhs = rhs.into();
        let mut product = Expression::default();
        for (ma, ca) in self.all_terms() {
            for (mb, cb) in rhs.all_terms() {
                product.add_term(ma.product(&mb), ca * cb);
            }
        }
        *self = product;
    }
}

impl<R: Into<Expression>> Add<R> for Expression {
    type Output = Expression;

    fn add(mut self, rhs: R) -> Expression {
        self += rhs;
        self
    }
}

impl<R: Into<Expression>> Sub<R> for Expression {
    type Output = Expression;

    fn sub(mut self, rhs: R) -> Expression {
        self -= rhs;
        self
    }
}

impl<R: Into<Expression>> Mul<R> for Expression {
    type Output = Expression;

    fn mul(mut self, rhs: R) -> Expression {
        self *= rhs;
        self
    }
}

impl Div<f64> for Expression {
    type Output = Expression;

    fn div(self, rhs: f64) -> Expression {
        self.scale(1.0 / rhs)
    }
}

impl Neg for Expression {
    type Output = Expression;

    fn neg(self) -> Expression {
        self.scale(-1.0)
    }
}

impl<R: Into<Expression>> Add<R> for Variable {
    type Output = Expression;

    fn add(self, rhs: R) -> Expression {
        Expression::from(self) + rhs
    }
}

impl<R: Into<Expression>> Sub<R> for Variable {
    type Output = Expression;

    fn sub(self, rhs: R) -> Expression {
        Expression::from(self) - rhs
    }
}

impl<R: Into<Expression>> Mul<R> for Variable {
    type Output = Expression;

    fn mul(self, rhs: R) -> Expression {
        Expression::from(self) * rhs
    }
}

impl Neg for Variable {
    type Output = Expression;

    fn neg(self) -> Expression {
        -Expression::from(self)
    }
}

macro_rules! scalar_lhs_ops {
    ($($rhs:ty),*) => {
        $(
            impl Add<$rhs> for f64 {
                type Output = Expression;

                fn add(self, rhs: $rhs) -> Expression {
                    Expression::from(rhs) + self
                }
            }

            impl Sub<$rhs> for f64 {
                type Output = Expression;

                fn sub(self, rhs: $rhs) -> Expression {
                    Expression::from_constant(self) - rhs
                }
            }

            impl Mul<$rhs> for f64 {
                type Output = Expression;

                fn mul(self, rhs: $rhs) -> Expression {
                    Expression::from(rhs).scale(self)
                }
            }
        )*
    };
}

scalar_lhs_ops!(Variable, Expression);

impl Sum for Expression {
    fn sum<I: Iterator<Item = Expression>>(iter: I) -> Self {
        iter.fold(Expression::default(), |acc, e| acc + e)
    }
}

impl Sum<Variable> for Expression {
    fn sum<I: Iterator<Item = Variable>>(iter: I) -> Self {
        iter.fold(Expression::default(), |acc, v| acc + v)
    }
}

/// `expression sense rhs` with every constant moved to the right-hand side.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintExpr {
    pub expression: Expression,
    pub sense: ConstraintType,
    pub rhs: f64,
}

impl ConstraintExpr {
    pub fn new(expression: impl Into<Expression>, sense: ConstraintType, rhs: f64) -> Self {
        ConstraintExpr::from_difference(expression.into() - rhs, sense)
    }

    fn from_difference(difference: Expression, sense: ConstraintType) -> Self {
        Self {
            rhs: -difference.constant(),
            expression: difference.without_constant(),
            sense,
        }
    }
}
