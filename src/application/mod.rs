// Application layer: solve orchestration, reporting and the bundled scenarios

pub mod reporter;
pub mod scenarios;
pub mod service;

pub use reporter::{ReportFormat, Reporter};
pub use scenarios::Scenario;
pub use service::OptimizationService;
