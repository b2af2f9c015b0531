/*
 * Constant Folding
 *
 * Pure ops whose inputs resolve to literals are evaluated at analysis time:
 * ```
 * t1 = Binary(==, 1, 2)   → every use of t1 reads `false`
 * t2 = Cast(int, "12ab")  → every use of t2 reads `12`
 * ```
 * The folded op is removed, so a second run finds nothing to do.
 */

use std::cmp::Ordering;

use tracing::trace;

use crate::features::ir::domain::{BinaryOp, CastKind, FuncId, IrArena, OpId, OpKind, UnaryOp};
use crate::features::optimizer::domain::Scalar;

#[derive(Debug, Default)]
pub struct ConstantFolder {
    folded: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FoldStats {
    pub folded: usize,
}

impl ConstantFolder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one function until no op changes
    pub fn fold(&mut self, arena: &mut IrArena, func: FuncId) -> FoldStats {
        self.folded = 0;
        loop {
            let mut changed = false;
            let ops: Vec<OpId> = arena
                .func(func)
                .blocks
                .iter()
                .filter(|b| !arena.block(**b).dead)
                .flat_map(|b| arena.block(*b).instructions.clone())
                .collect();
            for op in ops {
                if self.try_fold(arena, op) {
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        FoldStats {
            folded: self.folded,
        }
    }

    fn try_fold(&mut self, arena: &mut IrArena, op: OpId) -> bool {
        let Some(value) = Self::evaluate(arena, &arena.op(op).kind) else {
            return false;
        };
        let Some(result) = arena.op(op).kind.result() else {
            return false;
        };
        trace!(op = %op, value = ?value, "folded");
        let constant = arena.new_operand(value.into_kind());
        arena.replace_all_uses(result, constant);
        arena.remove_op(op);
        self.folded += 1;
        true
    }

    /// Value of a pure op over literal inputs
    pub fn evaluate(arena: &IrArena, kind: &OpKind) -> Option<Scalar> {
        let literal = |id| arena.literal_of(id).and_then(Scalar::from_kind);
        match kind {
            OpKind::Binary {
                op, left, right, ..
            } => evaluate_binary(*op, &literal(*left)?, &literal(*right)?),
            OpKind::Unary { op, expr, .. } => evaluate_unary(*op, &literal(*expr)?),
            OpKind::Cast { kind, expr, .. } => evaluate_cast(*kind, &literal(*expr)?),
            OpKind::ConcatList { list, .. } => {
                let mut out = String::new();
                for part in list {
                    out.push_str(&literal(*part)?.to_php_string());
                }
                Some(Scalar::String(out))
            }
            _ => None,
        }
    }
}

pub fn evaluate_binary(op: BinaryOp, left: &Scalar, right: &Scalar) -> Option<Scalar> {
    use BinaryOp::*;

    let ordered = |accept: fn(Ordering) -> bool| left.compare(right).map(|o| Scalar::Bool(accept(o)));
    Some(match op {
        Plus => Scalar::Number(left.to_number()? + right.to_number()?),
        Minus => Scalar::Number(left.to_number()? - right.to_number()?),
        Mul => Scalar::Number(left.to_number()? * right.to_number()?),
        Div => {
            let divisor = right.to_number()?;
            if divisor == 0.0 {
                return None;
            }
            Scalar::Number(left.to_number()? / divisor)
        }
        Mod => {
            let divisor = right.to_int()?;
            if divisor == 0 {
                return None;
            }
            Scalar::Number(left.to_int()?.checked_rem(divisor)? as f64)
        }
        Pow => Scalar::Number(left.to_number()?.powf(right.to_number()?)),
        Concat => Scalar::String(left.to_php_string() + &right.to_php_string()),

        Equal => Scalar::Bool(left.loose_eq(right)),
        NotEqual => Scalar::Bool(!left.loose_eq(right)),
        Identical => Scalar::Bool(left.same_type(right) && left.strict_eq(right)),
        NotIdentical => Scalar::Bool(!(left.same_type(right) && left.strict_eq(right))),
        Smaller => ordered(|o| o == Ordering::Less)?,
        SmallerOrEqual => ordered(|o| o != Ordering::Greater)?,
        Greater => ordered(|o| o == Ordering::Greater)?,
        GreaterOrEqual => ordered(|o| o != Ordering::Less)?,
        Spaceship => Scalar::Number(match left.compare(right)? {
            Ordering::Less => -1.0,
            Ordering::Equal => 0.0,
            Ordering::Greater => 1.0,
        }),

        LogicalAnd => Scalar::Bool(left.truthy() && right.truthy()),
        LogicalOr => Scalar::Bool(left.truthy() || right.truthy()),
        LogicalXor => Scalar::Bool(left.truthy() ^ right.truthy()),

        BitwiseAnd | BitwiseOr | BitwiseXor | ShiftLeft | ShiftRight => {
            // string-on-string bitwise ops work bytewise
            if matches!((left, right), (Scalar::String(_), Scalar::String(_))) {
                return None;
            }
            let (a, b) = (left.to_int()?, right.to_int()?);
            let value = match op {
                BitwiseAnd => a & b,
                BitwiseOr => a | b,
                BitwiseXor => a ^ b,
                ShiftLeft => a.checked_shl(u32::try_from(b).ok()?)?,
                _ => a.checked_shr(u32::try_from(b).ok()?)?,
            };
            Scalar::Number(value as f64)
        }

        Coalesce => match left {
            Scalar::Null => right.clone(),
            other => other.clone(),
        },
    })
}

pub fn evaluate_unary(op: UnaryOp, value: &Scalar) -> Option<Scalar> {
    Some(match op {
        UnaryOp::BooleanNot => Scalar::Bool(!value.truthy()),
        UnaryOp::UnaryMinus => Scalar::Number(-value.to_number()?),
        UnaryOp::UnaryPlus => Scalar::Number(value.to_number()?),
        UnaryOp::BitwiseNot => match value {
            Scalar::Number(_) => Scalar::Number(!value.to_int()? as f64),
            _ => return None,
        },
        _ => return None,
    })
}

pub fn evaluate_cast(kind: CastKind, value: &Scalar) -> Option<Scalar> {
    Some(match kind {
        CastKind::Int => Scalar::Number(value.to_int()? as f64),
        CastKind::Double => Scalar::Number(value.to_number()?),
        CastKind::Bool => Scalar::Bool(value.truthy()),
        CastKind::String => Scalar::String(value.to_php_string()),
        CastKind::Unset => Scalar::Null,
        CastKind::Array | CastKind::Object => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::ir::domain::{OperandId, OperandKind};
    use crate::shared::models::Position;

    fn setup() -> (IrArena, FuncId) {
        let mut arena = IrArena::new();
        let f = arena.new_func("{main}");
        (arena, f)
    }

    fn emit(arena: &mut IrArena, f: FuncId, kind: OpKind) -> OpId {
        let entry = arena.func(f).entry;
        let op = arena.add_op(kind, Position::zero(), None);
        arena.append(entry, op);
        op
    }

    fn binary_op(
        arena: &mut IrArena,
        f: FuncId,
        op: BinaryOp,
        left: OperandKind,
        right: OperandKind,
    ) -> (OperandId, OpId) {
        let left = arena.new_operand(left);
        let right = arena.new_operand(right);
        let result = arena.new_temporary(None);
        let op = emit(
            arena,
            f,
            OpKind::Binary {
                op,
                left,
                right,
                result,
            },
        );
        (result, op)
    }

    fn echo_of(arena: &IrArena, op: OpId) -> &OperandKind {
        match arena.op(op).kind {
            OpKind::Echo { expr } => &arena.operand(expr).kind,
            ref other => panic!("expected echo, got {}", other.name()),
        }
    }

    #[test]
    fn test_comparison_folds_into_condition() {
        let (mut arena, f) = setup();
        let entry = arena.func(f).entry;
        let then_block = arena.new_block(Some(f));
        let else_block = arena.new_block(Some(f));
        let (cond, compare) = binary_op(
            &mut arena,
            f,
            BinaryOp::Equal,
            OperandKind::Number(1.0),
            OperandKind::Number(2.0),
        );
        let jump = emit(
            &mut arena,
            f,
            OpKind::JumpIf {
                cond,
                if_target: then_block,
                else_target: else_block,
            },
        );
        arena.add_block_condition(then_block, cond);

        let stats = ConstantFolder::new().fold(&mut arena, f);

        assert_eq!(stats.folded, 1);
        assert!(arena.op(compare).block.is_none(), "folded op is detached");
        assert_eq!(arena.block(entry).instructions, vec![jump]);
        let OpKind::JumpIf { cond: folded, .. } = arena.op(jump).kind else {
            panic!("terminator changed kind");
        };
        assert_eq!(arena.operand(folded).kind, OperandKind::Bool(false));
        assert_eq!(arena.block(then_block).conditions, vec![folded]);
    }

    #[test]
    fn test_identity_compares_variants() {
        let (mut arena, f) = setup();
        let (result, _) = binary_op(
            &mut arena,
            f,
            BinaryOp::Identical,
            OperandKind::Number(1.0),
            OperandKind::String("1".to_string()),
        );
        let echo = emit(&mut arena, f, OpKind::Echo { expr: result });

        ConstantFolder::new().fold(&mut arena, f);
        assert_eq!(echo_of(&arena, echo), &OperandKind::Bool(false));
    }

    #[test]
    fn test_chained_ops_fold_transitively() {
        let (mut arena, f) = setup();
        let (sum, _) = binary_op(
            &mut arena,
            f,
            BinaryOp::Plus,
            OperandKind::Number(2.0),
            OperandKind::String("3".to_string()),
        );
        let suffix = arena.new_operand(OperandKind::String("px".to_string()));
        let joined = arena.new_temporary(None);
        emit(
            &mut arena,
            f,
            OpKind::ConcatList {
                list: vec![sum, suffix],
                result: joined,
            },
        );
        let echo = emit(&mut arena, f, OpKind::Echo { expr: joined });

        let stats = ConstantFolder::new().fold(&mut arena, f);
        assert_eq!(stats.folded, 2);
        assert_eq!(echo_of(&arena, echo), &OperandKind::String("5px".to_string()));
    }

    #[test]
    fn test_unfoldable_inputs_left_alone() {
        let (mut arena, f) = setup();
        let input = arena.new_operand(OperandKind::Symbolic {
            tag: "getsymbolic".to_string(),
        });
        let zero = arena.new_operand(OperandKind::Number(0.0));
        let one = arena.new_operand(OperandKind::Number(1.0));
        let r1 = arena.new_temporary(None);
        let r2 = arena.new_temporary(None);
        emit(
            &mut arena,
            f,
            OpKind::Binary {
                op: BinaryOp::Concat,
                left: input,
                right: one,
                result: r1,
            },
        );
        emit(
            &mut arena,
            f,
            OpKind::Binary {
                op: BinaryOp::Div,
                left: one,
                right: zero,
                result: r2,
            },
        );

        let stats = ConstantFolder::new().fold(&mut arena, f);
        assert_eq!(stats.folded, 0, "symbolic input and division by zero stay");
    }

    #[test]
    fn test_casts_and_negation() {
        assert_eq!(
            evaluate_cast(CastKind::Int, &Scalar::String("12ab".to_string())),
            Some(Scalar::Number(12.0))
        );
        assert_eq!(evaluate_cast(CastKind::Array, &Scalar::Null), None);
        assert_eq!(
            evaluate_unary(UnaryOp::BooleanNot, &Scalar::String("0".to_string())),
            Some(Scalar::Bool(true))
        );
        assert_eq!(
            evaluate_binary(BinaryOp::Coalesce, &Scalar::Null, &Scalar::Number(4.0)),
            Some(Scalar::Number(4.0))
        );
        assert_eq!(
            evaluate_binary(BinaryOp::Spaceship, &Scalar::Number(1.0), &Scalar::Number(3.0)),
            Some(Scalar::Number(-1.0))
        );
    }

    #[test]
    fn test_fold_is_idempotent() {
        let (mut arena, f) = setup();
        let (result, _) = binary_op(
            &mut arena,
            f,
            BinaryOp::Smaller,
            OperandKind::Number(1.0),
            OperandKind::Number(2.0),
        );
        emit(&mut arena, f, OpKind::Echo { expr: result });

        ConstantFolder::new().fold(&mut arena, f);
        let snapshot = arena.clone();
        let again = ConstantFolder::new().fold(&mut arena, f);

        assert_eq!(again, FoldStats::default());
        assert_eq!(arena, snapshot);
    }
}
