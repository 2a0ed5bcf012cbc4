//! Depth-first branch and bound over variable bounds.
//!
//! The search is independent of the kind of model: every node is solved
//! through a [`Relaxation`], which is the simplex for linear models and the
//! augmented Lagrangian for polynomial ones. A model without integer
//! variables is just the root node.

use std::time::Instant;

use tracing::debug;

use crate::domain::{SolutionStatus, SolveOptions};

const CUT_ROUNDS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RelaxationStatus {
    Optimal,
    Infeasible,
    Unbounded,
    IterationLimit,
    TimeLimit,
    Error(String),
}

#[derive(Debug, Clone)]
pub(crate) struct RelaxationResult {
    pub status: RelaxationStatus,
    pub values: Vec<f64>,
    /// Objective in minimization form
    pub objective: f64,
    pub iterations: u64,
}

impl RelaxationResult {
    pub fn without_point(status: RelaxationStatus, iterations: u64) -> Self {
        Self {
            status,
            values: Vec::new(),
            objective: f64::NAN,
            iterations,
        }
    }
}

/// Continuous subproblem solved at each node
pub(crate) trait Relaxation {
    fn solve(&mut self, lower: &[f64], upper: &[f64]) -> RelaxationResult;

    /// Add cuts separating `point`; returns how many were added.
    fn separate_cuts(&mut self, _lower: &[f64], _upper: &[f64], _point: &[f64]) -> usize {
        0
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SearchOutcome {
    pub status: SolutionStatus,
    pub values: Option<Vec<f64>>,
    pub nodes: u64,
    pub iterations: u64,
    pub message: String,
}

struct Node {
    lower: Vec<f64>,
    upper: Vec<f64>,
    /// Bound inherited from the parent relaxation
    bound: f64,
}

struct Incumbent {
    values: Vec<f64>,
    objective: f64,
}

pub(crate) struct BranchAndBound<'a> {
    options: &'a SolveOptions,
    integer: &'a [bool],
    deadline: Option<Instant>,
}

impl<'a> BranchAndBound<'a> {
    pub fn new(options: &'a SolveOptions, integer: &'a [bool], deadline: Option<Instant>) -> Self {
        Self {
            options,
            integer,
            deadline,
        }
    }

    /// Run the search. `evaluate` returns the minimization-form objective of a
    /// point that satisfies the whole model, or `None` when it does not.
    pub fn run<R, F>(
        &self,
        relaxation: &mut R,
        lower: Vec<f64>,
        upper: Vec<f64>,
        evaluate: F,
    ) -> SearchOutcome
    where
        R: Relaxation,
        F: Fn(&[f64]) -> Option<f64>,
    {
        let mut nodes = 0;
        let mut iterations = 0;
        let mut incumbent: Option<Incumbent> = None;

        let mut root = relaxation.solve(&lower, &upper);
        iterations += root.iterations;
        if root.status != RelaxationStatus::Optimal {
            return self.stopped(root.status, nodes, iterations, "root relaxation");
        }

        if self.options.cuts && self.has_integers() {
            for round in 0..CUT_ROUNDS {
                let added = relaxation.separate_cuts(&lower, &upper, &root.values);
                if added == 0 {
                    break;
                }
                debug!(round, added, "added cover cuts at the root");
                let resolved = relaxation.solve(&lower, &upper);
                iterations += resolved.iterations;
                if resolved.status != RelaxationStatus::Optimal {
                    return self.stopped(resolved.status, nodes, iterations, "root after cuts");
                }
                root = resolved;
            }
        }

        if self.options.heuristics && self.has_integers() {
            if let Some(found) = self.round_heuristic(&root.values, &lower, &upper, &evaluate) {
                debug!(objective = found.objective, "rounding heuristic found an incumbent");
                incumbent = Some(found);
            }
        }

        let mut stack = vec![Node {
            lower,
            upper,
            bound: root.objective,
        }];
        let mut root = Some(root);

        while let Some(node) = stack.pop() {
            if let Some(limit) = self.options.node_limit {
                if nodes >= limit {
                    return self.limit(SolutionStatus::NodeLimit, incumbent, nodes, iterations);
                }
            }
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                return self.limit(SolutionStatus::TimeLimit, incumbent, nodes, iterations);
            }
            if root.is_none() && iterations >= self.options.iteration_limit {
                return self.limit(SolutionStatus::IterationLimit, incumbent, nodes, iterations);
            }
            if self.prunable(node.bound, incumbent.as_ref()) {
                continue;
            }
            nodes += 1;

            let result = match root.take() {
                Some(result) => result,
                None => {
                    let result = relaxation.solve(&node.lower, &node.upper);
                    iterations += result.iterations;
                    result
                }
            };
            match result.status {
                RelaxationStatus::Optimal => {}
                RelaxationStatus::Infeasible => continue,
                status => return self.stopped(status, nodes, iterations, "node relaxation"),
            }
            if self.prunable(result.objective, incumbent.as_ref()) {
                continue;
            }

            match self.branching_variable(&result.values) {
                None => {
                    let candidate = self.snap_integers(&result.values);
                    match evaluate(&candidate) {
                        Some(objective)
                            if incumbent.as_ref().map_or(true, |inc| objective < inc.objective) =>
                        {
                            debug!(node = nodes, objective, "new incumbent");
                            incumbent = Some(Incumbent {
                                values: candidate,
                                objective,
                            });
                        }
                        Some(_) => {}
                        None => debug!(node = nodes, "relaxation point rejected by the model check"),
                    }
                }
                Some(j) => {
                    let value = result.values[j];
                    let mut down = Node {
                        lower: node.lower.clone(),
                        upper: node.upper.clone(),
                        bound: result.objective,
                    };
                    down.upper[j] = value.floor();
                    let mut up = Node {
                        lower: node.lower,
                        upper: node.upper,
                        bound: result.objective,
                    };
                    up.lower[j] = value.ceil();

                    // The child nearest to the relaxation value is explored first
                    if value - value.floor() < 0.5 {
                        stack.push(up);
                        stack.push(down);
                    } else {
                        stack.push(down);
                        stack.push(up);
                    }
                }
            }
        }

        match incumbent {
            Some(inc) => SearchOutcome {
                status: SolutionStatus::Optimal,
                values: Some(inc.values),
                nodes,
                iterations,
                message: format!("Search finished after {nodes} nodes"),
            },
            None => SearchOutcome {
                status: SolutionStatus::Infeasible,
                values: None,
                nodes,
                iterations,
                message: "Problem is infeasible: no solution satisfies all constraints".to_string(),
            },
        }
    }

    fn has_integers(&self) -> bool {
        self.integer.iter().any(|&i| i)
    }

    fn prunable(&self, bound: f64, incumbent: Option<&Incumbent>) -> bool {
        match incumbent {
            Some(inc) => {
                let gap = (self.options.mip_gap * inc.objective.abs()).max(1e-9);
                bound >= inc.objective - gap
            }
            None => false,
        }
    }

    /// Most fractional integer variable.
    fn branching_variable(&self, values: &[f64]) -> Option<usize> {
        let tolerance = self.options.integrality_tolerance;
        self.integer
            .iter()
            .enumerate()
            .filter(|&(_, &is_int)| is_int)
            .map(|(j, _)| (j, (values[j] - values[j].round()).abs()))
            .filter(|&(_, frac)| frac > tolerance)
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(j, _)| j)
    }

    fn snap_integers(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(self.integer)
            .map(|(&x, &is_int)| if is_int { x.round() } else { x })
            .collect()
    }

    /// Round the root point to nearest, down and up; keep the best feasible one.
    fn round_heuristic<F>(
        &self,
        values: &[f64],
        lower: &[f64],
        upper: &[f64],
        evaluate: &F,
    ) -> Option<Incumbent>
    where
        F: Fn(&[f64]) -> Option<f64>,
    {
        let roundings: [fn(f64) -> f64; 3] = [f64::round, f64::floor, f64::ceil];
        roundings
            .iter()
            .filter_map(|round| {
                let candidate: Vec<f64> = values
                    .iter()
                    .enumerate()
                    .map(|(j, &x)| {
                        if self.integer[j] {
                            round(x).clamp(lower[j], upper[j])
                        } else {
                            x
                        }
                    })
                    .collect();
                evaluate(&candidate).map(|objective| Incumbent {
                    values: candidate,
                    objective,
                })
            })
            .min_by(|a, b| a.objective.total_cmp(&b.objective))
    }

    /// Search hit a limit; values are only reported for proven optima.
    fn limit(
        &self,
        status: SolutionStatus,
        incumbent: Option<Incumbent>,
        nodes: u64,
        iterations: u64,
    ) -> SearchOutcome {
        let message = match incumbent {
            Some(inc) => format!(
                "{status} after {nodes} nodes; best objective found {}",
                inc.objective
            ),
            None => format!("{status} after {nodes} nodes; no feasible point found"),
        };
        SearchOutcome {
            status,
            values: None,
            nodes,
            iterations,
            message,
        }
    }

    fn stopped(&self, status: RelaxationStatus, nodes: u64, iterations: u64, at: &str) -> SearchOutcome {
        let (status, message) = match status {
            RelaxationStatus::Optimal => (
                SolutionStatus::Error,
                format!("Search stopped in {at} on an optimal relaxation"),
            ),
            RelaxationStatus::Infeasible => (
                SolutionStatus::Infeasible,
                "Problem is infeasible: no solution satisfies all constraints".to_string(),
            ),
            RelaxationStatus::Unbounded => (
                SolutionStatus::Unbounded,
                "Problem is unbounded: objective can be improved infinitely".to_string(),
            ),
            RelaxationStatus::IterationLimit => (
                SolutionStatus::IterationLimit,
                format!("Iteration limit reached in {at}"),
            ),
            RelaxationStatus::TimeLimit => {
                (SolutionStatus::TimeLimit, format!("Time limit reached in {at}"))
            }
            RelaxationStatus::Error(reason) => {
                (SolutionStatus::Error, format!("Engine failure in {at}: {reason}"))
            }
        };
        SearchOutcome {
            status,
            values: None,
            nodes,
            iterations,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Relaxation of `max Σ v_j x_j  s.t.  Σ w_j x_j <= cap` over boxes (fractional knapsack).
    struct Knapsack {
        values: Vec<f64>,
        weights: Vec<f64>,
        capacity: f64,
        solves: usize,
    }

    impl Relaxation for Knapsack {
        fn solve(&mut self, lower: &[f64], upper: &[f64]) -> RelaxationResult {
            self.solves += 1;
            let n = self.values.len();
            let mut x = lower.to_vec();
            let mut room = self.capacity - (0..n).map(|j| self.weights[j] * x[j]).sum::<f64>();
            if room < -1e-9 {
                return RelaxationResult::without_point(RelaxationStatus::Infeasible, 1);
            }
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&a, &b| {
                (self.values[b] / self.weights[b]).total_cmp(&(self.values[a] / self.weights[a]))
            });
            for j in order {
                let take = (upper[j] - x[j]).min(room / self.weights[j]).max(0.0);
                x[j] += take;
                room -= take * self.weights[j];
            }
            let objective = -(0..n).map(|j| self.values[j] * x[j]).sum::<f64>();
            RelaxationResult {
                status: RelaxationStatus::Optimal,
                values: x,
                objective,
                iterations: 1,
            }
        }
    }

    fn knapsack() -> Knapsack {
        Knapsack {
            values: vec![150.0, 90.0, 120.0, 100.0, 80.0],
            weights: vec![7.0, 3.0, 4.0, 5.0, 2.0],
            capacity: 15.0,
            solves: 0,
        }
    }

    fn evaluator(k: &Knapsack) -> impl Fn(&[f64]) -> Option<f64> + '_ {
        move |x: &[f64]| {
            let weight: f64 = x.iter().zip(&k.weights).map(|(a, b)| a * b).sum();
            (weight <= k.capacity + 1e-9).then(|| -x.iter().zip(&k.values).map(|(a, b)| a * b).sum::<f64>())
        }
    }

    #[test]
    fn solves_binary_knapsack() {
        let mut relaxation = knapsack();
        let reference = knapsack();
        let options = SolveOptions::default().without_acceleration();
        let integer = vec![true; 5];
        let outcome = BranchAndBound::new(&options, &integer, None).run(
            &mut relaxation,
            vec![0.0; 5],
            vec![1.0; 5],
            evaluator(&reference),
        );
        assert_eq!(outcome.status, SolutionStatus::Optimal);
        // Everything but the tent
        assert_eq!(outcome.values, Some(vec![0.0, 1.0, 1.0, 1.0, 1.0]));
        assert!(outcome.nodes > 1);
    }

    #[test]
    fn rounding_heuristic_does_not_change_the_optimum() {
        let mut relaxation = knapsack();
        let reference = knapsack();
        let options = SolveOptions::default();
        let integer = vec![true; 5];
        let outcome = BranchAndBound::new(&options, &integer, None).run(
            &mut relaxation,
            vec![0.0; 5],
            vec![1.0; 5],
            evaluator(&reference),
        );
        assert_eq!(outcome.values, Some(vec![0.0, 1.0, 1.0, 1.0, 1.0]));
    }

    #[test]
    fn continuous_model_is_a_single_node() {
        let mut relaxation = knapsack();
        let reference = knapsack();
        let options = SolveOptions::default();
        let integer = vec![false; 5];
        let outcome = BranchAndBound::new(&options, &integer, None).run(
            &mut relaxation,
            vec![0.0; 5],
            vec![1.0; 5],
            evaluator(&reference),
        );
        assert_eq!(outcome.status, SolutionStatus::Optimal);
        assert_eq!(outcome.nodes, 1);
        assert_eq!(relaxation.solves, 1);
    }

    #[test]
    fn node_limit_drops_the_incumbent() {
        let mut relaxation = knapsack();
        let reference = knapsack();
        let options = SolveOptions::default()
            .without_acceleration()
            .with_node_limit(1);
        let integer = vec![true; 5];
        let outcome = BranchAndBound::new(&options, &integer, None).run(
            &mut relaxation,
            vec![0.0; 5],
            vec![1.0; 5],
            evaluator(&reference),
        );
        assert_eq!(outcome.status, SolutionStatus::NodeLimit);
        assert!(outcome.values.is_none());
    }

    #[test]
    fn infeasible_root_is_reported() {
        let mut relaxation = knapsack();
        let reference = knapsack();
        let options = SolveOptions::default();
        let integer = vec![true; 5];
        let outcome = BranchAndBound::new(&options, &integer, None).run(
            &mut relaxation,
            vec![1.0; 5],
            vec![1.0; 5],
            evaluator(&reference),
        );
        assert_eq!(outcome.status, SolutionStatus::Infeasible);
    }
}
