//! Data dependency
//!
//! `is_dependent(variable, source, context)` answers whether `variable`'s
//! value is reachable by a def-use chain originating at `source`. No graph
//! is materialized: each query walks operation `read` lists backward from
//! the target until the source is found or no further operands remain. The
//! walk terminates because the def-chain is bounded by the number of
//! operations in the function.
//!
//! Writes through a reference variable are treated as writes to its base,
//! so `balances[msg.sender] = x` makes `balances` dependent on `x`.

use std::collections::HashSet;

use crate::cfg::Cfg;
use crate::ir::variable::{SsaVariable, Variable};

/// Non-SSA query: one identity per logical variable, flow-insensitive over
/// the function body.
pub fn is_dependent(variable: &Variable, source: &Variable, context: &Cfg) -> bool {
    if variable == source {
        return true;
    }

    let mut reached: HashSet<Variable> = HashSet::new();
    reached.insert(variable.clone());
    if let Variable::Reference { .. } = variable {
        reached.insert(variable.dereferenced().clone());
    }

    let mut changed = true;
    while changed {
        changed = false;
        for op in context.operations() {
            let Some(lvalue) = op.lvalue() else { continue };
            let defines = reached.contains(lvalue)
                || matches!(lvalue, Variable::Reference { .. })
                    && reached.contains(lvalue.dereferenced());
            if !defines {
                continue;
            }
            for operand in op.read() {
                if operand == source || operand.dereferenced() == source {
                    return true;
                }
                if reached.insert(operand.clone()) {
                    changed = true;
                }
            }
        }
    }
    false
}

/// SSA query: precise and flow-sensitive. Each SSA variable has exactly one
/// definition, so the walk follows the single static def-chain.
pub fn is_dependent_ssa(variable: &SsaVariable, source: &SsaVariable, context: &Cfg) -> bool {
    if variable == source {
        return true;
    }

    let mut reached: HashSet<SsaVariable> = HashSet::new();
    reached.insert(variable.clone());

    let mut changed = true;
    while changed {
        changed = false;
        for op in context.ssa_operations() {
            let Some(lvalue) = op.lvalue() else { continue };
            let defines = reached.contains(lvalue)
                || matches!(lvalue.base, Variable::Reference { .. })
                    && reached
                        .iter()
                        .any(|r| r.base == *lvalue.base.dereferenced());
            if !defines {
                continue;
            }
            for operand in op.read() {
                if operand == source {
                    return true;
                }
                if reached.insert(operand.clone()) {
                    changed = true;
                }
            }
        }
    }
    false
}

/// Every variable `variable` transitively depends on, the non-SSA closure.
pub fn dependencies(variable: &Variable, context: &Cfg) -> HashSet<Variable> {
    let mut reached: HashSet<Variable> = HashSet::new();
    reached.insert(variable.clone());

    let mut changed = true;
    while changed {
        changed = false;
        for op in context.operations() {
            let Some(lvalue) = op.lvalue() else { continue };
            let defines = reached.contains(lvalue)
                || matches!(lvalue, Variable::Reference { .. })
                    && reached.contains(lvalue.dereferenced());
            if !defines {
                continue;
            }
            for operand in op.read() {
                if reached.insert(operand.clone()) {
                    changed = true;
                }
            }
        }
    }
    reached.remove(variable);
    reached
}
