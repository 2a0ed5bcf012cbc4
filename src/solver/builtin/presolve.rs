// Presolve for linear models: rows to bounds, redundant rows, integer rounding

use crate::domain::ConstraintType;

use super::problem::LinearProblem;

const MAX_PASSES: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct PresolveStats {
    pub rows_removed: usize,
    pub bounds_tightened: usize,
    pub passes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PresolveOutcome {
    Reduced(PresolveStats),
    Infeasible(String),
}

/// Tighten `problem` in place. Variables are never removed, so the column
/// order of the model is preserved.
pub(crate) fn presolve(problem: &mut LinearProblem, tolerance: f64) -> PresolveOutcome {
    let mut stats = PresolveStats::default();

    for _ in 0..MAX_PASSES {
        stats.passes += 1;
        let mut changed = false;

        for j in 0..problem.num_variables() {
            if problem.integer[j] {
                let lower = (problem.lower[j] - tolerance).ceil();
                let upper = (problem.upper[j] + tolerance).floor();
                if lower > problem.lower[j] || upper < problem.upper[j] {
                    problem.lower[j] = lower;
                    problem.upper[j] = upper;
                    stats.bounds_tightened += 1;
                    changed = true;
                }
            }
            if problem.lower[j] > problem.upper[j] + tolerance {
                return PresolveOutcome::Infeasible(format!(
                    "variable {j} has empty domain [{}, {}]",
                    problem.lower[j], problem.upper[j]
                ));
            }
        }

        let mut kept = Vec::with_capacity(problem.rows.len());
        for mut row in std::mem::take(&mut problem.rows) {
            row.coeffs.retain(|&(_, a)| a != 0.0);

            match row.coeffs.len() {
                0 => {
                    if row.sense.violation(0.0, row.rhs) > tolerance {
                        return PresolveOutcome::Infeasible(format!(
                            "empty row requires 0 {} {}",
                            row.sense, row.rhs
                        ));
                    }
                    stats.rows_removed += 1;
                    changed = true;
                }
                1 => {
                    let (j, a) = row.coeffs[0];
                    let bound = row.rhs / a;
                    let sense = if a < 0.0 { row.sense.flipped() } else { row.sense };
                    if matches!(sense, ConstraintType::LessThanOrEqual | ConstraintType::Equal)
                        && bound < problem.upper[j]
                    {
                        problem.upper[j] = bound;
                        stats.bounds_tightened += 1;
                    }
                    if matches!(sense, ConstraintType::GreaterThanOrEqual | ConstraintType::Equal)
                        && bound > problem.lower[j]
                    {
                        problem.lower[j] = bound;
                        stats.bounds_tightened += 1;
                    }
                    if problem.lower[j] > problem.upper[j] + tolerance {
                        return PresolveOutcome::Infeasible(format!(
                            "singleton row empties the domain of variable {j}"
                        ));
                    }
                    if problem.lower[j] > problem.upper[j] {
                        problem.upper[j] = problem.lower[j];
                    }
                    stats.rows_removed += 1;
                    changed = true;
                }
                _ => {
                    let (min_activity, max_activity) = activity_range(&row.coeffs, problem);
                    let (always_holds, never_holds) = match row.sense {
                        ConstraintType::LessThanOrEqual => (
                            max_activity <= row.rhs + tolerance,
                            min_activity > row.rhs + tolerance,
                        ),
                        ConstraintType::GreaterThanOrEqual => (
                            min_activity >= row.rhs - tolerance,
                            max_activity < row.rhs - tolerance,
                        ),
                        ConstraintType::Equal => (
                            (max_activity - min_activity).abs() <= tolerance
                                && (max_activity - row.rhs).abs() <= tolerance,
                            min_activity > row.rhs + tolerance
                                || max_activity < row.rhs - tolerance,
                        ),
                    };
                    if never_holds {
                        return PresolveOutcome::Infeasible(format!(
                            "row activity [{min_activity}, {max_activity}] cannot satisfy {} {}",
                            row.sense, row.rhs
                        ));
                    }
                    if always_holds {
                        stats.rows_removed += 1;
                        changed = true;
                    } else {
                        kept.push(row);
                    }
                }
            }
        }
        problem.rows = kept;

        if !changed {
            break;
        }
    }

    PresolveOutcome::Reduced(stats)
}

/// Smallest and largest value of `Σ a_j x_j` over the variable bounds.
fn activity_range(coeffs: &[(usize, f64)], problem: &LinearProblem) -> (f64, f64) {
    coeffs.iter().fold((0.0, 0.0), |(lo, hi), &(j, a)| {
        let (l, u) = (problem.lower[j], problem.upper[j]);
        if a > 0.0 {
            (lo + a * l, hi + a * u)
        } else {
            (lo + a * u, hi + a * l)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::builtin::problem::LinearRow;

    fn problem(rows: Vec<LinearRow>, integer: bool) -> LinearProblem {
        LinearProblem {
            cost: vec![-1.0, -1.0],
            lower: vec![0.0, 0.0],
            upper: vec![f64::INFINITY, f64::INFINITY],
            integer: vec![integer; 2],
            rows,
        }
    }

    fn row(coeffs: &[(usize, f64)], sense: ConstraintType, rhs: f64) -> LinearRow {
        LinearRow {
            coeffs: coeffs.to_vec(),
            sense,
            rhs,
        }
    }

    #[test]
    fn singleton_rows_become_bounds() {
        let mut p = problem(
            vec![
                row(&[(0, 2.0)], ConstraintType::LessThanOrEqual, 3.0),
                row(&[(1, -1.0)], ConstraintType::LessThanOrEqual, -1.0),
            ],
            false,
        );
        let outcome = presolve(&mut p, 1e-9);
        assert!(matches!(outcome, PresolveOutcome::Reduced(ref s) if s.rows_removed == 2));
        assert_eq!(p.upper[0], 1.5);
        assert_eq!(p.lower[1], 1.0);
        assert!(p.rows.is_empty());
    }

    #[test]
    fn integer_bounds_are_rounded_after_singletons() {
        let mut p = problem(
            vec![row(&[(0, 2.0)], ConstraintType::LessThanOrEqual, 3.0)],
            true,
        );
        presolve(&mut p, 1e-9);
        assert_eq!(p.upper[0], 1.0);
    }

    #[test]
    fn redundant_rows_are_dropped() {
        let mut p = problem(
            vec![
                row(&[(0, 1.0)], ConstraintType::LessThanOrEqual, 1.0),
                row(&[(1, 1.0)], ConstraintType::LessThanOrEqual, 1.0),
                row(&[(0, 1.0), (1, 1.0)], ConstraintType::LessThanOrEqual, 5.0),
            ],
            false,
        );
        presolve(&mut p, 1e-9);
        assert!(p.rows.is_empty());
    }

    #[test]
    fn binding_rows_are_kept() {
        let mut p = problem(
            vec![
                row(&[(0, 1.0)], ConstraintType::LessThanOrEqual, 4.0),
                row(&[(0, 1.0), (1, 1.0)], ConstraintType::LessThanOrEqual, 5.0),
            ],
            false,
        );
        presolve(&mut p, 1e-9);
        assert_eq!(p.rows.len(), 1);
    }

    #[test]
    fn conflicting_singletons_are_infeasible() {
        let mut p = problem(
            vec![
                row(&[(0, 1.0)], ConstraintType::GreaterThanOrEqual, 5.0),
                row(&[(0, 1.0)], ConstraintType::LessThanOrEqual, 3.0),
            ],
            false,
        );
        assert!(matches!(presolve(&mut p, 1e-9), PresolveOutcome::Infeasible(_)));
    }

    #[test]
    fn violated_empty_row_is_infeasible() {
        let mut p = problem(
            vec![row(&[(0, 0.0)], ConstraintType::GreaterThanOrEqual, 1.0)],
            false,
        );
        assert!(matches!(presolve(&mut p, 1e-9), PresolveOutcome::Infeasible(_)));
    }
}
