use std::time::Duration;

use approx::assert_relative_eq;
use classopt::infrastructure::lp_format::to_lp_string;
use classopt::{
    ConstraintType, Model, ModelError, OptimizationService, OptimizationType, ReportFormat,
    Reporter, SolutionStatus, SolveOptions, SolverBackend, SolverError, SolverFactory,
    VariableType,
};

fn builtin() -> SolveOptions {
    SolveOptions::default().with_backend(SolverBackend::Builtin)
}

#[test]
fn duplicate_variable_names_are_rejected() {
    let mut model = Model::new("dup");
    model
        .add_variable("x", 0.0, 1.0, VariableType::Continuous)
        .unwrap();
    let err = model
        .add_variable("x", 0.0, 2.0, VariableType::Integer)
        .unwrap_err();
    assert_eq!(err, ModelError::DuplicateName("x".to_string()));
    assert_eq!(model.num_variables(), 1);
}

#[test]
fn foreign_variables_are_rejected() {
    let mut other = Model::new("other");
    let foreign = other
        .add_variable("y", 0.0, 1.0, VariableType::Continuous)
        .unwrap();

    let mut model = Model::new("main");
    model
        .add_variable("x", 0.0, 1.0, VariableType::Continuous)
        .unwrap();
    let err = model
        .add_constraint(2.0 * foreign, ConstraintType::LessThanOrEqual, 1.0)
        .unwrap_err();
    assert!(matches!(err, ModelError::UnknownVariable { .. }));
    assert_eq!(model.num_constraints(), 0);
}

#[test]
fn infeasible_lp_is_a_status() {
    let mut model = Model::new("infeasible");
    let x = model
        .add_variable("x", 0.0, f64::INFINITY, VariableType::Continuous)
        .unwrap();
    let y = model
        .add_variable("y", 0.0, f64::INFINITY, VariableType::Continuous)
        .unwrap();
    model.set_objective(x + y, OptimizationType::Minimize).unwrap();
    model.add_constr((x + y).leq(1.0), "cap").unwrap();
    model.add_constr((x + 2.0 * y).geq(3.0), "demand").unwrap();

    for presolve in [true, false] {
        let solution = OptimizationService::new()
            .solve(&model, &builtin().with_presolve(presolve))
            .unwrap();
        assert_eq!(solution.status, SolutionStatus::Infeasible);
        assert!(solution.optimal_value.is_none());
        assert_eq!(
            Reporter::new(ReportFormat::Plain).render(&solution, &model),
            "No optimal solution found.\n"
        );
    }
}

#[test]
fn unbounded_lp_is_a_status() {
    let mut model = Model::new("unbounded");
    let x = model
        .add_variable("x", 0.0, f64::INFINITY, VariableType::Continuous)
        .unwrap();
    let y = model
        .add_variable("y", 0.0, f64::INFINITY, VariableType::Continuous)
        .unwrap();
    model.set_objective(x + y, OptimizationType::Maximize).unwrap();
    model.add_constr((x - y).leq(1.0), "spread").unwrap();

    let solution = OptimizationService::new().solve(&model, &builtin()).unwrap();
    assert_eq!(solution.status, SolutionStatus::Unbounded);
}

#[test]
fn unbounded_nlp_is_a_status() {
    let mut model = Model::new("unbounded nlp");
    let x = model
        .add_variable("x", f64::NEG_INFINITY, f64::INFINITY, VariableType::Continuous)
        .unwrap();
    let y = model
        .add_variable("y", f64::NEG_INFINITY, f64::INFINITY, VariableType::Continuous)
        .unwrap();
    model
        .set_objective(3.0 * x.pow(2) - 4.0 * y, OptimizationType::Maximize)
        .unwrap();
    model.add_constr((x * y).leq(4.0), "hyperbola").unwrap();

    let solution = OptimizationService::new().solve(&model, &builtin()).unwrap();
    assert_eq!(solution.status, SolutionStatus::Unbounded);
}

#[test]
fn general_integers_branch_to_the_optimum() {
    // max 5x + 4y  s.t.  6x + 4y <= 24,  x + 2y <= 6  over integers: (4, 0) -> 20
    let mut model = Model::new("textbook ip");
    let x = model
        .add_variable("x", 0.0, f64::INFINITY, VariableType::Integer)
        .unwrap();
    let y = model
        .add_variable("y", 0.0, f64::INFINITY, VariableType::Integer)
        .unwrap();
    model
        .set_objective(5.0 * x + 4.0 * y, OptimizationType::Maximize)
        .unwrap();
    model.add_constr((6.0 * x + 4.0 * y).leq(24.0), "c1").unwrap();
    model.add_constr((x + 2.0 * y).leq(6.0), "c2").unwrap();

    let solution = OptimizationService::new()
        .solve(&model, &builtin().without_acceleration())
        .unwrap();
    assert!(solution.is_optimal());
    assert_relative_eq!(solution.optimal_value.unwrap(), 20.0, epsilon = 1e-9);
    assert_eq!(solution.quality.max_integrality_violation, 0.0);
}

#[test]
fn equality_constraints_hold() {
    let mut model = Model::new("blend");
    let a = model
        .add_variable("a", 0.0, f64::INFINITY, VariableType::Continuous)
        .unwrap();
    let b = model
        .add_variable("b", 0.0, f64::INFINITY, VariableType::Continuous)
        .unwrap();
    model
        .set_objective(2.0 * a + 3.0 * b, OptimizationType::Minimize)
        .unwrap();
    model.add_constr((a + b).equals(10.0), "total").unwrap();
    model.add_constr(b.geq(2.0), "minimum b").unwrap();

    let solution = OptimizationService::new().solve(&model, &builtin()).unwrap();
    assert_relative_eq!(solution.value(a).unwrap(), 8.0, epsilon = 1e-9);
    assert_relative_eq!(solution.value_by_name("b").unwrap(), 2.0, epsilon = 1e-9);
    assert_relative_eq!(solution.optimal_value.unwrap(), 22.0, epsilon = 1e-9);
}

#[test]
fn unavailable_backends_are_engine_errors() {
    let model = classopt::application::scenarios::nlp1().unwrap().model;
    let err = OptimizationService::new()
        .solve(&model, &SolveOptions::default().with_backend(SolverBackend::Highs))
        .unwrap_err();
    // Without the feature the engine is missing; with it, HiGHS refuses the quadratic model
    assert!(matches!(
        err,
        SolverError::EngineUnavailable(_) | SolverError::InvalidModel(_)
    ));
}

#[test]
fn auto_backend_always_solves_nonlinear_models() {
    let model = classopt::application::scenarios::nlp1().unwrap().model;
    let solver = SolverFactory::create(SolverBackend::Auto, &model).unwrap();
    assert!(solver.supports_nonlinear());
}

#[tokio::test]
async fn time_limit_is_reported_as_a_status() {
    let model = classopt::application::scenarios::nlp1().unwrap().model;
    let options = builtin().with_time_limit(Duration::ZERO);
    let solution = OptimizationService::new()
        .solve_with_time_limit(model, options)
        .await
        .unwrap();
    assert_eq!(solution.status, SolutionStatus::TimeLimit);
    assert!(solution.variable_values.is_none());
}

#[tokio::test]
async fn generous_time_limit_still_solves() {
    let scenario = classopt::application::scenarios::projectsip1(VariableType::Binary).unwrap();
    let options = scenario
        .options
        .clone()
        .with_backend(SolverBackend::Builtin)
        .with_time_limit(Duration::from_secs(60));
    let solution = OptimizationService::new()
        .solve_with_time_limit(scenario.model, options)
        .await
        .unwrap();
    assert!(solution.is_optimal());
    assert_relative_eq!(solution.optimal_value.unwrap(), 95.0, epsilon = 1e-6);
}

#[test]
fn scenario_models_serialize_to_lp() {
    let scenario = classopt::application::scenarios::projectsip1(VariableType::Binary).unwrap();
    let text = to_lp_string(&scenario.model).unwrap();
    assert!(text.starts_with("\\ Model projectsip1\nMaximize\n"));
    assert!(text.contains(" R0: 5 x[1] + 4 x[2] + 3 x[3] + 7 x[4] + 8 x[5] <= 25\n"));
    assert!(text.contains("Binaries\n x[1] x[2] x[3] x[4] x[5]\n"));
    assert!(text.ends_with("End\n"));
}
