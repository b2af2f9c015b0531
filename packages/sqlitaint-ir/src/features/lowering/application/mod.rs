//! Lowering use cases

mod lower_file;

pub use lower_file::{LowerFileUseCase, PreparedFile};
