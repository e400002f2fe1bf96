//! SSA construction
//!
//! A second pass over the lowered operations that renumbers every
//! definition: each write to a logical variable mints a fresh version, and
//! each read resolves to the most recent definition in reverse-postorder.
//! Structured control flow (`if`/`for`/`while` merges only) keeps a single
//! dominating definition per read, so no explicit phi nodes are needed.
//! Version 0 denotes the value on entry (parameters, initial state);
//! builtins and constants are never versioned.

use std::collections::HashMap;

use crate::cfg::Cfg;
use crate::ir::operation::{Operation, SsaIr};
use crate::ir::variable::{SsaVariable, Variable};

pub fn compute_ssa(cfg: &mut Cfg) {
    let mut versions: HashMap<Variable, usize> = HashMap::new();

    for id in cfg.reverse_postorder() {
        let ssa_ops: Vec<SsaIr> = cfg
            .node(id)
            .irs
            .iter()
            .map(|op| renumber(op, &mut versions))
            .collect();
        cfg.node_mut(id).irs_ssa = ssa_ops;
    }
}

fn read(variable: &Variable, versions: &HashMap<Variable, usize>) -> SsaVariable {
    let version = versions.get(variable).copied().unwrap_or(0);
    SsaVariable::new(variable.clone(), version)
}

fn write(variable: &Variable, versions: &mut HashMap<Variable, usize>) -> SsaVariable {
    if !variable.is_assignable() {
        return SsaVariable::initial(variable.clone());
    }
    let version = versions.entry(variable.clone()).or_insert(0);
    *version += 1;
    SsaVariable::new(variable.clone(), *version)
}

fn renumber(op: &Operation<Variable>, versions: &mut HashMap<Variable, usize>) -> SsaIr {
    // Reads are resolved before the write so `x = x + 1` reads the old
    // version.
    match op {
        Operation::Assignment { lvalue, rvalue } => {
            let rvalue = read(rvalue, versions);
            Operation::Assignment {
                lvalue: write(lvalue, versions),
                rvalue,
            }
        }
        Operation::Binary {
            lvalue,
            operator,
            left,
            right,
        } => {
            let left = read(left, versions);
            let right = read(right, versions);
            Operation::Binary {
                lvalue: write(lvalue, versions),
                operator: *operator,
                left,
                right,
            }
        }
        Operation::Unary {
            lvalue,
            operator,
            operand,
        } => {
            let operand = read(operand, versions);
            Operation::Unary {
                lvalue: write(lvalue, versions),
                operator: *operator,
                operand,
            }
        }
        Operation::TypeConversion {
            lvalue,
            value,
            target_type,
        } => {
            let value = read(value, versions);
            Operation::TypeConversion {
                lvalue: write(lvalue, versions),
                value,
                target_type: target_type.clone(),
            }
        }
        Operation::InternalCall {
            lvalue,
            function,
            arguments,
        } => {
            let arguments = arguments.iter().map(|a| read(a, versions)).collect();
            Operation::InternalCall {
                lvalue: lvalue.as_ref().map(|l| write(l, versions)),
                function: function.clone(),
                arguments,
            }
        }
        Operation::HighLevelCall {
            lvalue,
            destination,
            function,
            arguments,
            call_value,
        } => {
            let destination = read(destination, versions);
            let arguments = arguments.iter().map(|a| read(a, versions)).collect();
            let call_value = call_value.as_ref().map(|v| read(v, versions));
            Operation::HighLevelCall {
                lvalue: lvalue.as_ref().map(|l| write(l, versions)),
                destination,
                function: function.clone(),
                arguments,
                call_value,
            }
        }
        Operation::LibraryCall {
            lvalue,
            library,
            function,
            arguments,
        } => {
            let arguments = arguments.iter().map(|a| read(a, versions)).collect();
            Operation::LibraryCall {
                lvalue: lvalue.as_ref().map(|l| write(l, versions)),
                library: library.clone(),
                function: function.clone(),
                arguments,
            }
        }
        Operation::LowLevelCall {
            lvalue,
            destination,
            function,
            arguments,
            call_value,
        } => {
            let destination = read(destination, versions);
            let arguments = arguments.iter().map(|a| read(a, versions)).collect();
            let call_value = call_value.as_ref().map(|v| read(v, versions));
            Operation::LowLevelCall {
                lvalue: lvalue.as_ref().map(|l| write(l, versions)),
                destination,
                function: function.clone(),
                arguments,
                call_value,
            }
        }
        Operation::Send {
            lvalue,
            destination,
            value,
            reverts_on_failure,
        } => {
            let destination = read(destination, versions);
            let value = read(value, versions);
            Operation::Send {
                lvalue: lvalue.as_ref().map(|l| write(l, versions)),
                destination,
                value,
                reverts_on_failure: *reverts_on_failure,
            }
        }
        Operation::SolidityCall {
            lvalue,
            function,
            arguments,
        } => {
            let arguments = arguments.iter().map(|a| read(a, versions)).collect();
            Operation::SolidityCall {
                lvalue: lvalue.as_ref().map(|l| write(l, versions)),
                function: function.clone(),
                arguments,
            }
        }
        Operation::Index { lvalue, base, index } => {
            let base = read(base, versions);
            let index = read(index, versions);
            Operation::Index {
                lvalue: write(lvalue, versions),
                base,
                index,
            }
        }
        Operation::Member {
            lvalue,
            base,
            member,
        } => {
            let base = read(base, versions);
            Operation::Member {
                lvalue: write(lvalue, versions),
                base,
                member: member.clone(),
            }
        }
        Operation::Length { lvalue, value } => {
            let value = read(value, versions);
            Operation::Length {
                lvalue: write(lvalue, versions),
                value,
            }
        }
        Operation::Condition { value } => Operation::Condition {
            value: read(value, versions),
        },
        Operation::Return { values } => Operation::Return {
            values: values.iter().map(|v| read(v, versions)).collect(),
        },
        Operation::Unsupported { reason } => Operation::Unsupported {
            reason: reason.clone(),
        },
        Operation::Nop => Operation::Nop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::NodeType;
    use crate::ir::operation::BinaryOperator;
    use crate::ir::variable::Constant;
    use std::collections::HashMap as Map;

    fn straight_line(ops: Vec<Operation<Variable>>) -> Cfg {
        let mut cfg = Cfg::new();
        let node = cfg.add_node(NodeType::Expression);
        cfg.add_edge(cfg.entry(), node);
        cfg.node_mut(node).irs = ops;
        cfg
    }

    #[test]
    fn test_each_write_mints_a_fresh_version() {
        let x = Variable::local("x");
        let mut cfg = straight_line(vec![
            Operation::Assignment {
                lvalue: x.clone(),
                rvalue: Variable::Constant(Constant::Number("1".into())),
            },
            Operation::Assignment {
                lvalue: x.clone(),
                rvalue: Variable::Constant(Constant::Number("2".into())),
            },
        ]);
        compute_ssa(&mut cfg);

        let lvalues: Vec<_> = cfg
            .ssa_operations()
            .filter_map(|op| op.lvalue().cloned())
            .collect();
        assert_eq!(lvalues[0], SsaVariable::new(x.clone(), 1));
        assert_eq!(lvalues[1], SsaVariable::new(x, 2));
    }

    #[test]
    fn test_self_increment_reads_previous_version() {
        let x = Variable::local("x");
        let one = Variable::Constant(Constant::Number("1".into()));
        let mut cfg = straight_line(vec![
            Operation::Assignment {
                lvalue: x.clone(),
                rvalue: one.clone(),
            },
            Operation::Binary {
                lvalue: x.clone(),
                operator: BinaryOperator::Addition,
                left: x.clone(),
                right: one,
            },
        ]);
        compute_ssa(&mut cfg);

        let ops: Vec<_> = cfg.ssa_operations().collect();
        match ops[1] {
            Operation::Binary { lvalue, left, .. } => {
                assert_eq!(left, &SsaVariable::new(x.clone(), 1));
                assert_eq!(lvalue, &SsaVariable::new(x, 2));
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_single_definition_invariant() {
        let x = Variable::local("x");
        let y = Variable::local("y");
        let mut cfg = straight_line(vec![
            Operation::Assignment {
                lvalue: x.clone(),
                rvalue: Variable::Constant(Constant::Number("1".into())),
            },
            Operation::Assignment {
                lvalue: y,
                rvalue: x.clone(),
            },
            Operation::Assignment {
                lvalue: x,
                rvalue: Variable::Constant(Constant::Number("3".into())),
            },
        ]);
        compute_ssa(&mut cfg);

        let mut definitions: Map<SsaVariable, usize> = Map::new();
        for op in cfg.ssa_operations() {
            if let Some(lvalue) = op.lvalue() {
                *definitions.entry(lvalue.clone()).or_insert(0) += 1;
            }
        }
        assert!(!definitions.is_empty());
        assert!(definitions.values().all(|&count| count == 1));
    }

    #[test]
    fn test_builtins_are_never_versioned() {
        use crate::ir::variable::Builtin;
        let mut cfg = straight_line(vec![Operation::Binary {
            lvalue: Variable::Temporary { index: 0 },
            operator: BinaryOperator::Modulo,
            left: Variable::local("x"),
            right: Variable::Builtin(Builtin::BlockTimestamp),
        }]);
        compute_ssa(&mut cfg);
        let op = cfg.ssa_operations().next().unwrap();
        match op {
            Operation::Binary { right, .. } => assert_eq!(right.version, 0),
            _ => unreachable!(),
        }
    }
}
