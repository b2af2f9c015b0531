mod finding;
mod role;

pub use finding::TaintFinding;
pub use role::{OpRole, SinkArgs};
