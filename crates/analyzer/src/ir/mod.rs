//! Intermediate representation: three-address operations over two parallel
//! variable namespaces (non-SSA and SSA), plus the lowering and SSA passes
//! that produce them.

pub mod lowering;
pub mod operation;
pub mod ssa;
pub mod variable;

pub use lowering::{lower_cfg, LoweringContext};
pub use operation::{BinaryOperator, BuiltinFunction, Ir, Operation, SsaIr, UnaryOperator};
pub use ssa::compute_ssa;
pub use variable::{Builtin, Constant, SsaVariable, Variable};
