// Use case: hand one model to the engine picked for it

use std::thread;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;

use tracing::{info, warn};

use crate::domain::{Model, Result, Solution, SolutionStatus, SolveOptions, SolverError};
use crate::solver::SolverFactory;

/// Orchestrates a single solve: adapter selection, logging, optional wall-clock limit
#[derive(Debug, Clone, Default)]
pub struct OptimizationService;

impl OptimizationService {
    pub fn new() -> Self {
        Self
    }

    /// Solve synchronously on the calling thread.
    pub fn solve(&self, model: &Model, options: &SolveOptions) -> Result<Solution> {
        let solver = SolverFactory::create(options.backend, model)?;
        info!(
            model = model.name(),
            solver = solver.name(),
            presolve = options.presolve,
            heuristics = options.heuristics,
            cuts = options.cuts,
            "solving model"
        );

        let started = Instant::now();
        let solution = solver.solve(model, options)?;
        info!(
            status = %solution.status,
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            "solve finished"
        );
        Ok(solution)
    }

    /// Solve on a worker thread, giving up once `options.time_limit` has passed.
    ///
    /// Running out of time is reported as a [`SolutionStatus::TimeLimit`]
    /// solution rather than an error. The worker is detached: an engine that
    /// ignores the deadline keeps its thread until it returns, but neither the
    /// caller nor runtime shutdown waits for it.
    pub async fn solve_with_time_limit(&self, model: Model, options: SolveOptions) -> Result<Solution> {
        let Some(limit) = options.time_limit else {
            return self.solve(&model, &options);
        };

        let service = self.clone();
        run_with_limit(limit, move || service.solve(&model, &options)).await
    }
}

async fn run_with_limit<F>(limit: Duration, job: F) -> Result<Solution>
where
    F: FnOnce() -> Result<Solution> + Send + 'static,
{
    let (sender, receiver) = oneshot::channel();
    thread::Builder::new()
        .name("classopt-solve".to_string())
        .spawn(move || {
            // The receiver is gone once the limit has fired
            let _ = sender.send(job());
        })
        .map_err(|e| SolverError::ExecutionFailed(format!("failed to start solver thread: {e}")))?;

    match tokio::time::timeout(limit, receiver).await {
        Ok(Ok(result)) => result,
        Ok(Err(_)) => Err(SolverError::ExecutionFailed(
            "solver thread exited without a result".to_string(),
        )),
        Err(_) => {
            warn!(?limit, "time limit reached before the engine returned");
            Ok(Solution::new(
                SolutionStatus::TimeLimit,
                format!("Time limit of {limit:?} reached"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OptimizationType, SolverBackend, VariableType};
    use approx::assert_abs_diff_eq;

    fn small_lp() -> Model {
        let mut model = Model::new("small");
        let x = model
            .add_variable("x", 0.0, 3.0, VariableType::Continuous)
            .unwrap();
        let y = model
            .add_variable("y", 0.0, 3.0, VariableType::Continuous)
            .unwrap();
        model.set_objective(x + 2.0 * y, OptimizationType::Maximize).unwrap();
        model.add_constr((x + y).leq(4.0), "sum").unwrap();
        model
    }

    #[test]
    fn solves_through_the_builtin_backend() {
        let options = SolveOptions::default().with_backend(SolverBackend::Builtin);
        let solution = OptimizationService::new().solve(&small_lp(), &options).unwrap();
        assert!(solution.is_optimal());
        assert_abs_diff_eq!(solution.optimal_value.unwrap(), 7.0, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn without_a_limit_the_async_path_solves_directly() {
        let options = SolveOptions::default().with_backend(SolverBackend::Builtin);
        let solution = OptimizationService::new()
            .solve_with_time_limit(small_lp(), options)
            .await
            .unwrap();
        assert!(solution.is_optimal());
    }

    #[tokio::test]
    async fn expired_limit_is_a_time_limit_status() {
        let options = SolveOptions::default()
            .with_backend(SolverBackend::Builtin)
            .with_time_limit(Duration::ZERO);
        let solution = OptimizationService::new()
            .solve_with_time_limit(small_lp(), options)
            .await
            .unwrap();
        assert_eq!(solution.status, SolutionStatus::TimeLimit);
        assert!(solution.variable_values.is_none());
    }

    #[tokio::test]
    async fn limit_does_not_wait_for_a_stuck_engine() {
        let started = Instant::now();
        let solution = run_with_limit(Duration::from_millis(20), || {
            thread::sleep(Duration::from_secs(30));
            Ok(Solution::new(SolutionStatus::Optimal, "late"))
        })
        .await
        .unwrap();
        assert_eq!(solution.status, SolutionStatus::TimeLimit);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn panicking_engine_is_an_execution_failure() {
        let err = run_with_limit(Duration::from_secs(5), || panic!("engine crashed"))
            .await
            .unwrap_err();
        assert!(matches!(err, SolverError::ExecutionFailed(_)));
    }
}
