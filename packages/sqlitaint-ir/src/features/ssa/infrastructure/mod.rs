//! SSA clean-up passes

pub mod jump_coalescer;
pub mod phi_optimizer;

pub use jump_coalescer::{CoalesceStats, JumpCoalescer};
pub use phi_optimizer::{PhiOptimizer, PhiOptimizerStats};
