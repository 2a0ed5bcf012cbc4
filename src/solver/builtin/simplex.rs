//! Dense two-phase tableau simplex.
//!
//! Bounded variables are mapped onto non-negative columns first:
//!
//! * finite lower bound: `x = l + y` (and `y <= u - l` as a row when `u` is finite)
//! * only an upper bound: `x = u - y`
//! * free: `x = y⁺ - y⁻`
//!
//! Pivoting follows Bland's rule, which cannot cycle. The tableau is dense,
//! so this is meant for the small models the crate targets.

use crate::domain::ConstraintType;

use super::problem::LinearRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LpStatus {
    Optimal,
    Infeasible,
    Unbounded,
    IterationLimit,
}

#[derive(Debug, Clone)]
pub(crate) struct LpResult {
    pub status: LpStatus,
    /// Values of the original variables (empty unless optimal)
    pub values: Vec<f64>,
    /// `cost · values` (only meaningful when optimal)
    pub objective: f64,
    pub iterations: u64,
}

impl LpResult {
    fn without_point(status: LpStatus, iterations: u64) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective: f64::NAN,
            iterations,
        }
    }
}

/// Simplex solver for linear programs in minimization form
#[derive(Debug, Clone)]
pub(crate) struct Simplex {
    max_iterations: u64,
    tolerance: f64,
}

impl Default for Simplex {
    fn default() -> Self {
        Self {
            max_iterations: 100_000,
            tolerance: 1e-9,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Column {
    Shifted { col: usize, lower: f64 },
    Reflected { col: usize, upper: f64 },
    Split { pos: usize, neg: usize },
}

enum Step {
    Optimal,
    Unbounded,
    Limit,
}

struct Tableau {
    rows: Vec<Vec<f64>>,
    rhs: Vec<f64>,
    /// Reduced costs
    obj: Vec<f64>,
    /// Negated objective value of the current basis
    obj_rhs: f64,
    basis: Vec<usize>,
    allowed: Vec<bool>,
}

impl Tableau {
    fn pivot(&mut self, r: usize, c: usize) {
        let p = self.rows[r][c];
        for v in self.rows[r].iter_mut() {
            *v /= p;
        }
        self.rhs[r] /= p;

        let pivot_row = self.rows[r].clone();
        let pivot_rhs = self.rhs[r];
        for i in 0..self.rows.len() {
            if i == r {
                continue;
            }
            let f = self.rows[i][c];
            if f == 0.0 {
                continue;
            }
            for (v, pv) in self.rows[i].iter_mut().zip(&pivot_row) {
                *v -= f * pv;
            }
            self.rhs[i] -= f * pivot_rhs;
        }

        let f = self.obj[c];
        if f != 0.0 {
            for (v, pv) in self.obj.iter_mut().zip(&pivot_row) {
                *v -= f * pv;
            }
            self.obj_rhs -= f * pivot_rhs;
        }
        self.basis[r] = c;
    }

    /// Replace the objective row with `cost` priced out against the basis.
    fn set_objective(&mut self, cost: &[f64]) {
        self.obj = cost.to_vec();
        self.obj_rhs = 0.0;
        for i in 0..self.rows.len() {
            let f = self.obj[self.basis[i]];
            if f == 0.0 {
                continue;
            }
            for (v, rv) in self.obj.iter_mut().zip(&self.rows[i]) {
                *v -= f * rv;
            }
            self.obj_rhs -= f * self.rhs[i];
        }
    }
}

impl Simplex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max: u64) -> Self {
        self.max_iterations = max;
        self
    }

    /// Minimize `cost · x` subject to `rows` and `lower <= x <= upper`.
    pub fn solve(&self, cost: &[f64], lower: &[f64], upper: &[f64], rows: &[LinearRow]) -> LpResult {
        let n = cost.len();
        if (0..n).any(|j| lower[j] > upper[j] + self.tolerance) {
            return LpResult::without_point(LpStatus::Infeasible, 0);
        }

        // Map variables onto non-negative structural columns
        let mut columns = Vec::with_capacity(n);
        let mut n_struct = 0;
        let mut bound_rows = Vec::new();
        for j in 0..n {
            let (l, u) = (lower[j], upper[j]);
            if l.is_finite() {
                columns.push(Column::Shifted { col: n_struct, lower: l });
                if u.is_finite() {
                    bound_rows.push((n_struct, (u - l).max(0.0)));
                }
                n_struct += 1;
            } else if u.is_finite() {
                columns.push(Column::Reflected { col: n_struct, upper: u });
                n_struct += 1;
            } else {
                columns.push(Column::Split {
                    pos: n_struct,
                    neg: n_struct + 1,
                });
                n_struct += 2;
            }
        }

        // Rows over structural columns, with non-negative right-hand sides
        let mut std_rows: Vec<(Vec<f64>, ConstraintType, f64)> = Vec::new();
        for row in rows {
            let mut coeffs = vec![0.0; n_struct];
            let mut rhs = row.rhs;
            for &(j, a) in &row.coeffs {
                match columns[j] {
                    Column::Shifted { col, lower } => {
                        coeffs[col] += a;
                        rhs -= a * lower;
                    }
                    Column::Reflected { col, upper } => {
                        coeffs[col] -= a;
                        rhs -= a * upper;
                    }
                    Column::Split { pos, neg } => {
                        coeffs[pos] += a;
                        coeffs[neg] -= a;
                    }
                }
            }
            std_rows.push((coeffs, row.sense, rhs));
        }
        for (col, width) in bound_rows {
            let mut coeffs = vec![0.0; n_struct];
            coeffs[col] = 1.0;
            std_rows.push((coeffs, ConstraintType::LessThanOrEqual, width));
        }
        for (coeffs, sense, rhs) in std_rows.iter_mut() {
            if *rhs < 0.0 {
                coeffs.iter_mut().for_each(|a| *a = -*a);
                *sense = sense.flipped();
                *rhs = -*rhs;
            }
        }

        let mut struct_cost = vec![0.0; n_struct];
        for j in 0..n {
            match columns[j] {
                Column::Shifted { col, .. } => struct_cost[col] += cost[j],
                Column::Reflected { col, .. } => struct_cost[col] -= cost[j],
                Column::Split { pos, neg } => {
                    struct_cost[pos] += cost[j];
                    struct_cost[neg] -= cost[j];
                }
            }
        }

        let n_slack = std_rows
            .iter()
            .filter(|(_, s, _)| *s != ConstraintType::Equal)
            .count();
        let n_art = std_rows
            .iter()
            .filter(|(_, s, _)| *s != ConstraintType::LessThanOrEqual)
            .count();
        let width = n_struct + n_slack + n_art;
        let art_start = n_struct + n_slack;

        let m = std_rows.len();
        let mut tableau = Tableau {
            rows: vec![vec![0.0; width]; m],
            rhs: vec![0.0; m],
            obj: vec![0.0; width],
            obj_rhs: 0.0,
            basis: vec![0; m],
            allowed: vec![true; width],
        };

        let mut slack_idx = n_struct;
        let mut art_idx = art_start;
        for (i, (coeffs, sense, rhs)) in std_rows.iter().enumerate() {
            tableau.rows[i][..n_struct].copy_from_slice(coeffs);
            tableau.rhs[i] = *rhs;
            match sense {
                ConstraintType::LessThanOrEqual => {
                    tableau.rows[i][slack_idx] = 1.0;
                    tableau.basis[i] = slack_idx;
                    slack_idx += 1;
                }
                ConstraintType::GreaterThanOrEqual => {
                    tableau.rows[i][slack_idx] = -1.0;
                    slack_idx += 1;
                    tableau.rows[i][art_idx] = 1.0;
                    tableau.basis[i] = art_idx;
                    art_idx += 1;
                }
                ConstraintType::Equal => {
                    tableau.rows[i][art_idx] = 1.0;
                    tableau.basis[i] = art_idx;
                    art_idx += 1;
                }
            }
        }

        let mut iterations = 0;

        // Phase 1: minimize the sum of artificials
        if n_art > 0 {
            let mut phase1_cost = vec![0.0; width];
            phase1_cost[art_start..].iter_mut().for_each(|c| *c = 1.0);
            tableau.set_objective(&phase1_cost);

            match self.iterate(&mut tableau, &mut iterations) {
                Step::Optimal => {}
                Step::Limit => return LpResult::without_point(LpStatus::IterationLimit, iterations),
                // The phase-1 objective is bounded below by zero
                Step::Unbounded => return LpResult::without_point(LpStatus::Infeasible, iterations),
            }

            let scale = 1.0 + std_rows.iter().map(|(_, _, b)| b.abs()).fold(0.0, f64::max);
            if -tableau.obj_rhs > 1e-7 * scale {
                return LpResult::without_point(LpStatus::Infeasible, iterations);
            }

            // Drive remaining zero-level artificials out of the basis
            for i in 0..m {
                if tableau.basis[i] < art_start {
                    continue;
                }
                if let Some(c) = (0..art_start).find(|&c| tableau.rows[i][c].abs() > self.tolerance) {
                    tableau.pivot(i, c);
                    iterations += 1;
                }
            }
            for c in art_start..width {
                tableau.allowed[c] = false;
            }
        }

        // Phase 2: minimize the real cost
        let mut phase2_cost = vec![0.0; width];
        phase2_cost[..n_struct].copy_from_slice(&struct_cost);
        tableau.set_objective(&phase2_cost);

        match self.iterate(&mut tableau, &mut iterations) {
            Step::Optimal => {}
            Step::Unbounded => return LpResult::without_point(LpStatus::Unbounded, iterations),
            Step::Limit => return LpResult::without_point(LpStatus::IterationLimit, iterations),
        }

        let mut y = vec![0.0; n_struct];
        for (i, &b) in tableau.basis.iter().enumerate() {
            if b < n_struct {
                y[b] = tableau.rhs[i].max(0.0);
            }
        }
        let values: Vec<f64> = columns
            .iter()
            .map(|column| match *column {
                Column::Shifted { col, lower } => lower + y[col],
                Column::Reflected { col, upper } => upper - y[col],
                Column::Split { pos, neg } => y[pos] - y[neg],
            })
            .collect();
        let objective = cost.iter().zip(&values).map(|(c, x)| c * x).sum();

        LpResult {
            status: LpStatus::Optimal,
            values,
            objective,
            iterations,
        }
    }

    fn iterate(&self, tableau: &mut Tableau, iterations: &mut u64) -> Step {
        loop {
            if *iterations >= self.max_iterations {
                return Step::Limit;
            }

            // Bland: lowest-index improving column
            let Some(col) = (0..tableau.obj.len())
                .find(|&j| tableau.allowed[j] && tableau.obj[j] < -self.tolerance)
            else {
                return Step::Optimal;
            };

            // Ratio test, ties broken by lowest basic index
            let mut leave: Option<(usize, f64)> = None;
            for i in 0..tableau.rows.len() {
                let a = tableau.rows[i][col];
                if a <= self.tolerance {
                    continue;
                }
                let ratio = tableau.rhs[i].max(0.0) / a;
                leave = match leave {
                    None => Some((i, ratio)),
                    Some((r, best)) => {
                        if ratio < best - self.tolerance
                            || (ratio <= best + self.tolerance
                                && tableau.basis[i] < tableau.basis[r])
                        {
                            Some((i, ratio))
                        } else {
                            Some((r, best))
                        }
                    }
                };
            }
            let Some((row, _)) = leave else {
                return Step::Unbounded;
            };

            tableau.pivot(row, col);
            *iterations += 1;
        }
    }
}
