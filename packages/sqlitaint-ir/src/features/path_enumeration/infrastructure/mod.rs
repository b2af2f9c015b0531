mod call_resolver;
mod enumerator;

pub use call_resolver::CallResolver;
pub use enumerator::{EnumerationStats, PathEnumerator};
