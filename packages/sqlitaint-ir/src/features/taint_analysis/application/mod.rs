mod analyze;

pub use analyze::{AnalyzeTaintUseCase, TaintOutcome, TaintStats};
