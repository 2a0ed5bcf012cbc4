use crate::domain::{Model, Result, SolverBackend, SolverService};
use crate::solver::BuiltinSolver;
#[cfg(feature = "coin_cbc")]
use crate::solver::CoinCbcSolver;
#[cfg(feature = "highs")]
use crate::solver::HighsSolver;
use std::sync::Arc;
use tracing::debug;

/// Factory for creating solver instances based on configuration
pub struct SolverFactory;

impl SolverFactory {
    /// Create a solver for `backend` that can handle `model`
    pub fn create(backend: SolverBackend, model: &Model) -> Result<Arc<dyn SolverService>> {
        let solver: Arc<dyn SolverService> = match backend {
            SolverBackend::Auto => Self::auto(model),
            SolverBackend::Builtin => Arc::new(BuiltinSolver::new()),
            SolverBackend::CoinCbc => Self::coin_cbc()?,
            SolverBackend::Highs => Self::highs()?,
        };
        debug!(%backend, solver = solver.name(), "solver selected");
        Ok(solver)
    }

    /// Backends compiled into this build
    pub fn available_backends() -> Vec<SolverBackend> {
        let mut backends = vec![SolverBackend::Builtin];
        if cfg!(feature = "highs") {
            backends.push(SolverBackend::Highs);
        }
        if cfg!(feature = "coin_cbc") {
            backends.push(SolverBackend::CoinCbc);
        }
        backends
    }

    /// External engines for linear models, the built-in engine otherwise
    fn auto(model: &Model) -> Arc<dyn SolverService> {
        if model.is_linear() {
            if let Ok(solver) = Self::highs() {
                return solver;
            }
            if let Ok(solver) = Self::coin_cbc() {
                return solver;
            }
        }
        Arc::new(BuiltinSolver::new())
    }

    #[cfg(feature = "highs")]
    fn highs() -> Result<Arc<dyn SolverService>> {
        Ok(Arc::new(HighsSolver::new()))
    }

    #[cfg(not(feature = "highs"))]
    fn highs() -> Result<Arc<dyn SolverService>> {
        Err(crate::domain::SolverError::EngineUnavailable(
            "HiGHS support is not compiled in (enable the `highs` feature)".to_string(),
        ))
    }

    #[cfg(feature = "coin_cbc")]
    fn coin_cbc() -> Result<Arc<dyn SolverService>> {
        Ok(Arc::new(CoinCbcSolver::new()))
    }

    #[cfg(not(feature = "coin_cbc"))]
    fn coin_cbc() -> Result<Arc<dyn SolverService>> {
        Err(crate::domain::SolverError::EngineUnavailable(
            "COIN-OR CBC support is not compiled in (enable the `coin_cbc` feature)".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OptimizationType, SolverError, VariableType};

    fn quadratic_model() -> Model {
        let mut model = Model::new("quadratic");
        let x = model
            .add_variable("x", -1.0, 1.0, VariableType::Continuous)
            .unwrap();
        model.set_objective(x.pow(2), OptimizationType::Minimize).unwrap();
        model
    }

    #[test]
    fn auto_uses_builtin_for_nonlinear_models() {
        let solver = SolverFactory::create(SolverBackend::Auto, &quadratic_model()).unwrap();
        assert_eq!(solver.name(), "builtin");
    }

    #[test]
    fn builtin_is_always_available() {
        assert!(SolverFactory::available_backends().contains(&SolverBackend::Builtin));
        let solver = SolverFactory::create(SolverBackend::Builtin, &quadratic_model()).unwrap();
        assert!(solver.supports_nonlinear());
    }

    #[cfg(not(feature = "highs"))]
    #[test]
    fn missing_highs_is_engine_unavailable() {
        let err = SolverFactory::create(SolverBackend::Highs, &quadratic_model()).err();
        assert!(matches!(err, Some(SolverError::EngineUnavailable(_))));
    }

    #[cfg(not(feature = "coin_cbc"))]
    #[test]
    fn missing_cbc_is_engine_unavailable() {
        let err = SolverFactory::create(SolverBackend::CoinCbc, &quadratic_model()).err();
        assert!(matches!(err, Some(SolverError::EngineUnavailable(_))));
    }
}
