//! Text report of a solve.
//!
//! Two layouts are supported. [`ReportFormat::Plain`] prints one
//! `name = value` line per variable followed by the objective:
//!
//! ```text
//! x1 = 3.9440531887330774
//! x2 = -0.6666666666666666
//! Optimal objective value: 49.333333333333336
//! ```
//!
//! [`ReportFormat::Table`] prints fixed-width values and a `%g` objective:
//!
//! ```text
//! --------------------------------
//!
//! Optimal solution:
//!
//! Variable Information:
//! x[1] =     1.00
//!
//! ...
//!
//! Optimal objective value: 95
//! ```
//!
//! Any non-optimal status prints only [`NO_SOLUTION`].

use std::io::{self, Write};

use crate::domain::{Model, Solution};

pub const NO_SOLUTION: &str = "No optimal solution found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Plain,
    Table,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    format: ReportFormat,
}

impl Reporter {
    pub fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> ReportFormat {
        self.format
    }

    /// Write the report for `solution` of `model` to `out`.
    pub fn report<W: Write>(&self, solution: &Solution, model: &Model, out: &mut W) -> io::Result<()> {
        let objective = match (solution.is_optimal(), solution.optimal_value) {
            (true, Some(objective)) => objective,
            _ => return writeln!(out, "{NO_SOLUTION}"),
        };

        // Names come from the model so the report follows declaration order
        let values = solution.variable_values.as_deref().unwrap_or(&[]);
        let rows = model
            .variables()
            .iter()
            .map(|v| v.name.as_str())
            .zip(values.iter().copied());

        match self.format {
            ReportFormat::Plain => {
                for (name, value) in rows {
                    writeln!(out, "{name} = {}", format_float(value))?;
                }
                writeln!(out, "Optimal objective value: {}", format_float(objective))
            }
            ReportFormat::Table => {
                writeln!(out, "--------------------------------")?;
                writeln!(out, "\nOptimal solution:\n")?;
                writeln!(out, "Variable Information:")?;
                for (name, value) in rows {
                    writeln!(out, "{name} = {value:8.2}")?;
                    writeln!(out, " ")?;
                }
                writeln!(out, "\nOptimal objective value: {}", format_general(objective))
            }
        }
    }

    /// Report into a `String`.
    pub fn render(&self, solution: &Solution, model: &Model) -> String {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.report(solution, model, &mut buffer);
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// Shortest round-trip form, always with a fractional part (`95.0`, `-0.5`).
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// printf `%g`: six significant digits, trailing zeros removed, and
/// scientific notation outside `1e-4 <= |value| < 1e6`.
pub fn format_general(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }

    let scientific = format!("{value:.5e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if !(-4..6).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_zeros(mantissa), exponent.abs())
    } else {
        let decimals = (5 - exponent) as usize;
        trim_zeros(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_zeros(number: &str) -> &str {
    if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.')
    } else {
        number
    }
}
