//! Optimizer
//!
//! Installs op back-pointers (file path, block) and folds pure ops whose
//! inputs are known literals.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::{OptimizeStats, OptimizeUseCase};
pub use domain::Scalar;
pub use infrastructure::ConstantFolder;
