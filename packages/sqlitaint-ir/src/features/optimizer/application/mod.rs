mod optimize;

pub use optimize::{OptimizeStats, OptimizeUseCase};
