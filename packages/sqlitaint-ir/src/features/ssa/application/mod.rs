//! SSA use cases

mod simplify;

pub use simplify::{SimplifyStats, SimplifyUseCase};
