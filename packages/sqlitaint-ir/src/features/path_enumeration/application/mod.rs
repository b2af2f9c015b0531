mod enumerate;

pub use enumerate::{EnumeratePathsUseCase, EnumerationOutcome};
