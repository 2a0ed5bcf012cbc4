// Domain module: model building blocks and the engine contract

pub mod expression;
pub mod models;
pub mod solver_service;
pub mod value_objects;

pub use expression::*;
pub use models::*;
pub use solver_service::*;
pub use value_objects::*;
