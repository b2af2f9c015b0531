//! IR domain models

pub mod arena;
pub mod assertion;
pub mod block;
pub mod func;
pub mod ids;
pub mod op;
pub mod operand;
pub mod script;
pub mod types;

pub use arena::IrArena;
pub use assertion::{Assertion, AssertionMode, VarAssertion};
pub use block::Block;
pub use func::{flags as func_flags, Func, MAIN_FUNC_NAME};
pub use ids::{BlockId, FuncId, OpId, OperandId};
pub use op::{BinaryOp, CastKind, Op, OpKind, OperandSlot, UnaryOp};
pub use operand::{Operand, OperandKind, VarScope};
pub use script::Script;
pub use types::OpType;
