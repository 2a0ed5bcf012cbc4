// Knapsack cover cuts for all-binary `<=` rows

use crate::domain::ConstraintType;

use super::problem::{LinearProblem, LinearRow};

/// Cover inequalities violated by `point`.
///
/// A row `Σ a_j x_j <= b` qualifies when every coefficient is positive and
/// every variable is binary under `lower`/`upper`. For a cover `C` with
/// `Σ_C a_j > b`, the cut is `Σ_C x_j <= |C| - 1`.
pub(crate) fn cover_cuts(
    problem: &LinearProblem,
    extra_rows: &[LinearRow],
    lower: &[f64],
    upper: &[f64],
    point: &[f64],
    tolerance: f64,
) -> Vec<LinearRow> {
    let is_binary = |j: usize| problem.integer[j] && lower[j] == 0.0 && upper[j] == 1.0;

    let mut cuts: Vec<LinearRow> = Vec::new();
    for row in &problem.rows {
        if row.sense != ConstraintType::LessThanOrEqual
            || row.coeffs.len() < 2
            || !row.coeffs.iter().all(|&(j, a)| a > 0.0 && is_binary(j))
        {
            continue;
        }

        // Greedy cover: prefer variables already close to 1 per unit weight
        let mut order = row.coeffs.clone();
        order.sort_by(|&(i, ai), &(j, aj)| {
            let ki = (1.0 - point[i]) / ai;
            let kj = (1.0 - point[j]) / aj;
            ki.total_cmp(&kj).then(i.cmp(&j))
        });

        let mut cover = Vec::new();
        let mut weight = 0.0;
        for &(j, a) in &order {
            if weight > row.rhs + tolerance {
                break;
            }
            cover.push((j, a));
            weight += a;
        }
        if weight <= row.rhs + tolerance {
            continue;
        }

        // Shrink towards a minimal cover, dropping the least fractional members first
        cover.sort_by(|&(i, _), &(j, _)| point[i].total_cmp(&point[j]).then(i.cmp(&j)));
        let mut k = 0;
        while k < cover.len() {
            if weight - cover[k].1 > row.rhs + tolerance {
                weight -= cover[k].1;
                cover.remove(k);
            } else {
                k += 1;
            }
        }

        let lhs: f64 = cover.iter().map(|&(j, _)| point[j]).sum();
        let rhs = cover.len() as f64 - 1.0;
        if lhs <= rhs + tolerance {
            continue;
        }

        let mut coeffs: Vec<(usize, f64)> = cover.iter().map(|&(j, _)| (j, 1.0)).collect();
        coeffs.sort_by_key(|&(j, _)| j);
        let cut = LinearRow {
            coeffs,
            sense: ConstraintType::LessThanOrEqual,
            rhs,
        };
        if !extra_rows.contains(&cut) && !cuts.contains(&cut) {
            cuts.push(cut);
        }
    }
    cuts
}
