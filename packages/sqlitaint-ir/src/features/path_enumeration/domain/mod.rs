mod exec_path;

pub use exec_path::{ExecPath, Frame, PathCondition, PathEvent};
