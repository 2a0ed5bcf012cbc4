//! CPLEX LP serialization of a [`Model`].
//!
//! Linear and quadratic models are supported. Quadratic terms are written in
//! `[ ... ]` blocks; in the objective the block carries doubled coefficients
//! followed by `/ 2`, as the format requires.

use std::io::{self, Write};

use crate::domain::{Expression, Model, OptimizationType, Variable, VariableType};

#[derive(Debug, thiserror::Error)]
pub enum LpFormatError {
    #[error("'{name}' has degree {degree}; the LP format holds at most quadratic terms")]
    UnsupportedDegree { name: String, degree: u32 },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, LpFormatError>;

/// Write `model` to `out` in CPLEX LP format.
pub fn write_lp<W: Write>(model: &Model, out: &mut W) -> Result<()> {
    check_degree("objective", &model.objective().expression)?;
    for constraint in model.constraints() {
        check_degree(&constraint.name, &constraint.expression)?;
    }

    let name = |var: Variable| model.variables()[var.index()].name.as_str();

    writeln!(out, "\\ Model {}", model.name())?;
    writeln!(
        out,
        "{}",
        match model.objective().optimization_type {
            OptimizationType::Maximize => "Maximize",
            OptimizationType::Minimize => "Minimize",
        }
    )?;
    let objective = &model.objective().expression;
    writeln!(out, " obj: {}", format_expression(objective, &name, true))?;

    writeln!(out, "Subject To")?;
    for constraint in model.constraints() {
        writeln!(
            out,
            " {}: {} {} {}",
            constraint.name,
            format_expression(&constraint.expression.without_constant(), &name, false),
            constraint.constraint_type,
            constraint.bound - constraint.expression.constant()
        )?;
    }

    writeln!(out, "Bounds")?;
    for def in model.variables() {
        if def.variable_type == VariableType::Binary {
            continue;
        }
        match (def.lower_bound, def.upper_bound) {
            (l, u) if l == f64::NEG_INFINITY && u == f64::INFINITY => {
                writeln!(out, " {} free", def.name)?
            }
            (l, u) => writeln!(out, " {} <= {} <= {}", bound(l), def.name, bound(u))?,
        }
    }

    let generals: Vec<&str> = model
        .variables()
        .iter()
        .filter(|v| v.variable_type == VariableType::Integer)
        .map(|v| v.name.as_str())
        .collect();
    if !generals.is_empty() {
        writeln!(out, "Generals")?;
        writeln!(out, " {}", generals.join(" "))?;
    }

    let binaries: Vec<&str> = model
        .variables()
        .iter()
        .filter(|v| v.variable_type == VariableType::Binary)
        .map(|v| v.name.as_str())
        .collect();
    if !binaries.is_empty() {
        writeln!(out, "Binaries")?;
        writeln!(out, " {}", binaries.join(" "))?;
    }

    writeln!(out, "End")?;
    Ok(())
}

/// LP text of `model` as a `String`.
pub fn to_lp_string(model: &Model) -> Result<String> {
    let mut buffer = Vec::new();
    write_lp(model, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn check_degree(name: &str, expression: &Expression) -> Result<()> {
    let degree = expression.degree();
    if degree > 2 {
        return Err(LpFormatError::UnsupportedDegree {
            name: name.to_string(),
            degree,
        });
    }
    Ok(())
}

fn bound(value: f64) -> String {
    if value == f64::INFINITY {
        "+inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        value.to_string()
    }
}

/// `3 x + 2 y + [ 4 x ^ 2 + 2 x * y ] / 2` style text, signs folded into separators.
fn format_expression<'m, F>(expression: &Expression, name: &F, halve_quadratic: bool) -> String
where
    F: Fn(Variable) -> &'m str,
{
    let mut linear = Vec::new();
    let mut quadratic = Vec::new();
    for (monomial, coeff) in expression.terms() {
        match monomial.factors() {
            [(v, 1)] => linear.push((coeff, name(*v).to_string())),
            [(v, 2)] => quadratic.push((coeff, format!("{} ^ 2", name(*v)))),
            [(a, 1), (b, 1)] => quadratic.push((coeff, format!("{} * {}", name(*a), name(*b)))),
            _ => {}
        }
    }

    let mut text = String::new();
    push_terms(&mut text, &linear, 1.0);
    if !quadratic.is_empty() {
        text.push_str(if text.is_empty() { "[ " } else { " + [ " });
        let scale = if halve_quadratic { 2.0 } else { 1.0 };
        let mut block = String::new();
        push_terms(&mut block, &quadratic, scale);
        text.push_str(&block);
        text.push_str(" ]");
        if halve_quadratic {
            text.push_str(" / 2");
        }
    }
    let constant = expression.constant();
    if constant != 0.0 {
        push_terms(&mut text, &[(constant, String::new())], 1.0);
    }
    if text.is_empty() {
        text.push('0');
    }
    text
}

fn push_terms(text: &mut String, terms: &[(f64, String)], scale: f64) {
    for (coeff, label) in terms {
        let coeff = coeff * scale;
        let magnitude = coeff.abs();
        match (text.is_empty(), coeff < 0.0) {
            (true, true) => text.push('-'),
            (true, false) => {}
            (false, true) => text.push_str(" - "),
            (false, false) => text.push_str(" + "),
        }
        if label.is_empty() {
            text.push_str(&magnitude.to_string());
        } else if magnitude == 1.0 {
            text.push_str(label);
        } else {
            text.push_str(&format!("{magnitude} {label}"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConstraintType;

    #[test]
    fn linear_integer_model() {
        let mut model = Model::new("small");
        let x = model
            .add_variable("x", 0.0, 4.0, VariableType::Integer)
            .unwrap();
        let y = model
            .add_variable("y", 0.0, 1.0, VariableType::Binary)
            .unwrap();
        model
            .set_objective(3.0 * x - y, OptimizationType::Maximize)
            .unwrap();
        model
            .add_constraint(2.0 * x + 5.0 * y, ConstraintType::LessThanOrEqual, 9.0)
            .unwrap();

        let text = to_lp_string(&model).unwrap();
        let expected = "\\ Model small\n\
                        Maximize\n \
                        obj: 3 x - y\n\
                        Subject To\n \
                        R0: 2 x + 5 y <= 9\n\
                        Bounds\n \
                        0 <= x <= 4\n\
                        Generals\n \
                        x\n\
                        Binaries\n \
                        y\n\
                        End\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn quadratic_objective_is_halved() {
        let mut model = Model::new("quad");
        let x = model
            .add_variable("x", f64::NEG_INFINITY, f64::INFINITY, VariableType::Continuous)
            .unwrap();
        let y = model
            .add_variable("y", f64::NEG_INFINITY, f64::INFINITY, VariableType::Continuous)
            .unwrap();
        model
            .set_objective(3.0 * x.pow(2) - 4.0 * y, OptimizationType::Maximize)
            .unwrap();
        model.add_constr((x * y).leq(4.0), "c1").unwrap();

        let text = to_lp_string(&model).unwrap();
        assert!(text.contains(" obj: -4 y + [ 6 x ^ 2 ] / 2\n"), "{text}");
        assert!(text.contains(" c1: [ x * y ] <= 4\n"), "{text}");
        assert!(text.contains(" x free\n"));
    }

    #[test]
    fn cubic_terms_are_rejected() {
        let mut model = Model::new("cubic");
        let x = model
            .add_variable("x", 0.0, 1.0, VariableType::Continuous)
            .unwrap();
        model.set_objective(x.pow(3), OptimizationType::Minimize).unwrap();
        assert!(matches!(
            to_lp_string(&model),
            Err(LpFormatError::UnsupportedDegree { degree: 3, .. })
        ));
    }
}
