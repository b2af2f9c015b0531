//! Typed arena indices
//!
//! Every cross-reference in the IR is one of these u32 newtypes.

use std::fmt;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn new(index: usize) -> Self {
                Self(index as u32)
            }

            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.0)
            }
        }
    };
}

arena_id!(
    /// Index into `IrArena::operands`
    OperandId,
    "%"
);
arena_id!(
    /// Index into `IrArena::ops`
    OpId,
    "op"
);
arena_id!(
    /// Index into `IrArena::blocks`
    BlockId,
    "B"
);
arena_id!(
    /// Index into `IrArena::funcs`
    FuncId,
    "fn"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes() {
        assert_eq!(OperandId::new(3).to_string(), "%3");
        assert_eq!(OpId::new(0).to_string(), "op0");
        assert_eq!(BlockId::new(12).to_string(), "B12");
        assert_eq!(FuncId::new(1).to_string(), "fn1");
        assert_eq!(BlockId::new(12).index(), 12);
    }
}
