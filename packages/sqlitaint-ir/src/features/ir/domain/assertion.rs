//! Type assertions attached to operands
//!
//! Negation is stored as a flag and applied when the assertion is queried.

use super::ids::OperandId;
use super::operand::OperandKind;
use crate::features::ir::domain::arena::IrArena;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionMode {
    Intersect,
    Union,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Assertion {
    /// Operand holds the asserted type (a string type name or class name)
    Type { value: OperandId, negated: bool },
    Composite {
        children: Vec<Assertion>,
        mode: AssertionMode,
        negated: bool,
    },
}

/// Assertion about `var`, attached to the operand that carries it
#[derive(Debug, Clone, PartialEq)]
pub struct VarAssertion {
    pub var: OperandId,
    pub assertion: Assertion,
}

/// Types that cannot carry an injected string
const NON_STRING_TYPES: &[&str] = &[
    "int", "integer", "long", "float", "double", "real", "bool", "boolean", "null", "numeric",
];

impl Assertion {
    pub fn type_of(value: OperandId) -> Self {
        Assertion::Type {
            value,
            negated: false,
        }
    }

    pub fn is_negated(&self) -> bool {
        match self {
            Assertion::Type { negated, .. } | Assertion::Composite { negated, .. } => *negated,
        }
    }

    /// Same assertion with the negation flag flipped
    pub fn negation(&self) -> Self {
        let mut out = self.clone();
        match &mut out {
            Assertion::Type { negated, .. } | Assertion::Composite { negated, .. } => {
                *negated = !*negated
            }
        }
        out
    }

    /// Operands referenced by this assertion tree
    pub fn operands(&self) -> Vec<OperandId> {
        match self {
            Assertion::Type { value, .. } => vec![*value],
            Assertion::Composite { children, .. } => {
                children.iter().flat_map(|c| c.operands()).collect()
            }
        }
    }

    /// True when every value satisfying the assertion is int, float, bool or null
    pub fn excludes_strings(&self, arena: &IrArena) -> bool {
        self.excludes_strings_under(arena, false)
    }

    fn excludes_strings_under(&self, arena: &IrArena, outer_negated: bool) -> bool {
        match self {
            Assertion::Type { value, negated } => {
                if outer_negated ^ *negated {
                    return false;
                }
                match &arena.operand(*value).kind {
                    OperandKind::String(name) => {
                        NON_STRING_TYPES.contains(&name.to_ascii_lowercase().as_str())
                    }
                    _ => false,
                }
            }
            Assertion::Composite {
                children,
                mode,
                negated,
            } => {
                let negated = outer_negated ^ *negated;
                // De Morgan: a negated union behaves as an intersection of negations
                let any = matches!(
                    (mode, negated),
                    (AssertionMode::Intersect, false) | (AssertionMode::Union, true)
                );
                if any {
                    children
                        .iter()
                        .any(|c| c.excludes_strings_under(arena, negated))
                } else {
                    !children.is_empty()
                        && children
                            .iter()
                            .all(|c| c.excludes_strings_under(arena, negated))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negation_flips_flag_only() {
        let mut arena = IrArena::new();
        let int = arena.new_operand(OperandKind::String("int".into()));
        let a = Assertion::type_of(int);
        let n = a.negation();
        assert!(n.is_negated());
        assert_eq!(n.negation(), a);
    }

    #[test]
    fn test_excludes_strings_for_scalar_types() {
        let mut arena = IrArena::new();
        let int = arena.new_operand(OperandKind::String("int".into()));
        let string = arena.new_operand(OperandKind::String("string".into()));

        assert!(Assertion::type_of(int).excludes_strings(&arena));
        assert!(!Assertion::type_of(string).excludes_strings(&arena));
        assert!(!Assertion::type_of(int).negation().excludes_strings(&arena));
    }

    #[test]
    fn test_composite_modes() {
        let mut arena = IrArena::new();
        let int = arena.new_operand(OperandKind::String("int".into()));
        let float = arena.new_operand(OperandKind::String("float".into()));
        let string = arena.new_operand(OperandKind::String("string".into()));

        let union_numeric = Assertion::Composite {
            children: vec![Assertion::type_of(int), Assertion::type_of(float)],
            mode: AssertionMode::Union,
            negated: false,
        };
        assert!(union_numeric.excludes_strings(&arena));

        let union_mixed = Assertion::Composite {
            children: vec![Assertion::type_of(int), Assertion::type_of(string)],
            mode: AssertionMode::Union,
            negated: false,
        };
        assert!(!union_mixed.excludes_strings(&arena));

        let intersect = Assertion::Composite {
            children: vec![Assertion::type_of(string), Assertion::type_of(int)],
            mode: AssertionMode::Intersect,
            negated: false,
        };
        assert!(intersect.excludes_strings(&arena));
    }
}
