mod feasibility;

pub use feasibility::{FeasibilityChecker, FeasibilityStats};
