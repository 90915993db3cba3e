//! Structural well-formedness checks.
//!
//! The mutation engine rewrites control flow in place, so every stage that
//! hands a program back to the caller runs these checks first. A failure is an
//! engine bug, never an input problem, and is reported as
//! [`crate::Error::Verification`].
//!
//! Checked per function:
//! - every placed block is non-empty and ends in its only terminator
//! - phis come before every other instruction of their block
//! - every phi names each predecessor exactly once and nothing else
//! - branch targets are placed blocks and the entry has no predecessors
//! - operands reference placed instructions, in-range arguments and known symbols
//! - every use is dominated by its definition (uses in unreachable code are exempt)
//! - switch case values are unique
//! - no instruction is placed twice

use std::collections::{HashMap, HashSet};

use crate::{
    ir::{DominatorTree, Function, InstrId, Op, Operand, Program, Type},
    Error, Result,
};

/// Verifies every function of `program` plus the program-level symbol table.
///
/// # Errors
///
/// Returns [`Error::Verification`] describing the first violation found.
pub fn verify_program(program: &Program) -> Result<()> {
    let mut names = HashSet::new();
    for global in program.globals() {
        if !names.insert(global.name()) {
            return Err(Error::verification(
                "<program>",
                format!("duplicate global '{}'", global.name()),
            ));
        }
    }
    let mut functions = HashSet::new();
    for function in program.functions() {
        if !functions.insert(function.name()) {
            return Err(Error::verification(
                "<program>",
                format!("duplicate function '{}'", function.name()),
            ));
        }
    }

    for function in program.functions() {
        verify_function(function)?;
        for (_, _, id) in function.iter_instructions() {
            let instr = function.instruction(id);
            if let Op::Call { callee, .. } = instr.op() {
                if !functions.contains(callee.as_str()) {
                    return Err(Error::verification(
                        function.name(),
                        format!("{id} calls unknown function '{callee}'"),
                    ));
                }
            }
            for operand in instr.op().operands() {
                match operand {
                    Operand::Global(name) if !names.contains(name.as_str()) => {
                        return Err(Error::verification(
                            function.name(),
                            format!("{id} references unknown global '{name}'"),
                        ));
                    }
                    Operand::Function(name) if !functions.contains(name.as_str()) => {
                        return Err(Error::verification(
                            function.name(),
                            format!("{id} references unknown function '{name}'"),
                        ));
                    }
                    _ => {}
                }
            }
        }
    }
    Ok(())
}

/// Verifies the structure of a single function.
///
/// # Errors
///
/// Returns [`Error::Verification`] describing the first violation found.
pub fn verify_function(function: &Function) -> Result<()> {
    let fail = |message: String| Err(Error::verification(function.name(), message));

    if function.is_declaration() {
        if !function.layout().is_empty() {
            return fail("declaration has a body".to_string());
        }
        return Ok(());
    }
    let Some(entry) = function.entry() else {
        return fail("definition has no blocks".to_string());
    };

    let placed_blocks: HashSet<_> = function.layout().iter().copied().collect();
    if placed_blocks.len() != function.layout().len() {
        return fail("a block is placed twice".to_string());
    }

    // Placement and block shape.
    let mut placed: HashMap<InstrId, (usize, usize)> = HashMap::new();
    for (block_pos, &block) in function.layout().iter().enumerate() {
        let instrs = function.block(block).instructions();
        let name = function.block(block).name();
        if instrs.is_empty() {
            return fail(format!("block '{name}' is empty"));
        }
        let mut seen_non_phi = false;
        for (idx, &id) in instrs.iter().enumerate() {
            if function.get_instruction(id).is_none() {
                return fail(format!("block '{name}' holds foreign handle {id}"));
            }
            if placed.insert(id, (block_pos, idx)).is_some() {
                return fail(format!("{id} is placed more than once"));
            }
            let op = function.instruction(id).op();
            let is_last = idx + 1 == instrs.len();
            if op.is_terminator() != is_last {
                return fail(if is_last {
                    format!("block '{name}' does not end in a terminator")
                } else {
                    format!("terminator {id} in the middle of block '{name}'")
                });
            }
            if op.is_phi() {
                if seen_non_phi {
                    return fail(format!("phi {id} after non-phi in block '{name}'"));
                }
            } else {
                seen_non_phi = true;
            }
        }
        for succ in function.successors(block) {
            if !placed_blocks.contains(&succ) {
                return fail(format!("block '{name}' branches to detached {succ}"));
            }
        }
        if let Some(term) = function.terminator(block) {
            if let Op::Switch { cases, .. } = function.instruction(term).op() {
                let mut values = HashSet::new();
                if !cases.iter().all(|(v, _)| values.insert(*v)) {
                    return fail(format!("switch {term} has duplicate case values"));
                }
            }
        }
    }

    let preds = function.predecessors();
    if preds.get(&entry).is_some_and(|p| !p.is_empty()) {
        return fail("entry block has predecessors".to_string());
    }

    let dom = DominatorTree::compute(function);
    let location = |id: InstrId| placed.get(&id).copied();

    for (block, idx, id) in function.iter_instructions() {
        let instr = function.instruction(id);
        let op = instr.op();

        for operand in op.operands() {
            match operand {
                Operand::Arg(i) if *i >= function.params().len() => {
                    return fail(format!("{id} reads argument {i} out of range"));
                }
                Operand::Value(v) if location(*v).is_none() => {
                    return fail(format!("{id} reads detached value {v}"));
                }
                Operand::Value(v) if !function.instruction(*v).has_result() => {
                    return fail(format!("{id} reads {v}, which produces no value"));
                }
                _ => {}
            }
        }

        match op {
            Op::Phi { incoming } => {
                let expected: HashSet<_> = preds
                    .get(&block)
                    .map(|p| p.iter().copied().collect())
                    .unwrap_or_default();
                let mut actual = HashSet::new();
                for (pred, _) in incoming {
                    if !actual.insert(*pred) {
                        return fail(format!("phi {id} names {pred} twice"));
                    }
                }
                if actual != expected {
                    return fail(format!(
                        "phi {id} incoming blocks do not match the predecessors of '{}'",
                        function.block(block).name()
                    ));
                }
                for (pred, value) in incoming {
                    if let Operand::Value(v) = value {
                        if !dom.is_reachable(*pred) {
                            continue;
                        }
                        let def_block = function.layout()[placed[v].0];
                        if !dom.dominates(def_block, *pred) {
                            return fail(format!(
                                "phi {id} reads {v} along an edge it does not dominate"
                            ));
                        }
                    }
                }
            }
            _ => {
                if !dom.is_reachable(block) {
                    continue;
                }
                for v in op.value_operands() {
                    let (def_pos, def_idx) = placed[&v];
                    let def_block = function.layout()[def_pos];
                    let ok = if def_block == block {
                        def_idx < idx
                    } else {
                        dom.dominates(def_block, block)
                    };
                    if !ok {
                        return fail(format!("{id} reads {v} before it is defined"));
                    }
                }
            }
        }

        match op {
            Op::Store { ptr, .. } | Op::Load { ptr } if function.operand_type(ptr) != Type::Ptr => {
                return fail(format!("{id} accesses memory through a non-pointer"));
            }
            Op::CondBr { cond, .. } if function.operand_type(cond) != Type::I1 => {
                return fail(format!("{id} branches on a non-i1 condition"));
            }
            Op::Ret { value } => {
                let ty = value
                    .as_ref()
                    .map_or(Type::Void, |v| function.operand_type(v));
                if ty != function.return_type() {
                    return fail(format!("{id} returns {ty}, expected {}", function.return_type()));
                }
            }
            _ => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, BlockOrigin, FunctionBuilder, Instruction};

    fn add_function() -> Function {
        let mut b = FunctionBuilder::new("f", vec![Type::I32, Type::I32], Type::I32);
        b.block("entry");
        let x = b.binary(BinaryOp::Add, Operand::Arg(0), Operand::Arg(1));
        b.ret(Some(x));
        b.finish()
    }

    #[test]
    fn test_valid_function_passes() {
        assert!(verify_function(&add_function()).is_ok());
    }

    #[test]
    fn test_missing_terminator() {
        let mut f = add_function();
        let entry = f.entry().unwrap();
        let term = f.terminator(entry).unwrap();
        f.remove_instruction(entry, term);
        let err = verify_function(&f).unwrap_err();
        assert!(err.is_internal());
    }

    #[test]
    fn test_use_before_def() {
        let mut f = add_function();
        let entry = f.entry().unwrap();
        let add = f.block(entry).instructions()[0];
        f.insert_instruction(
            entry,
            0,
            Instruction::new(
                Op::Binary {
                    op: BinaryOp::Mul,
                    lhs: Operand::Value(add),
                    rhs: Operand::Arg(0),
                },
                Type::I32,
            ),
        );
        assert!(verify_function(&f).is_err());
    }

    #[test]
    fn test_phi_must_match_predecessors() {
        let mut b = FunctionBuilder::new("p", vec![Type::I1], Type::I32);
        let entry = b.block("entry");
        let join = b.declare_block("join");
        b.cond_br(Operand::Arg(0), join, join);
        b.switch_to(join);
        let p = b.phi(
            Type::I32,
            vec![
                (entry, Operand::Const(crate::ir::Constant::i32(1))),
                (join, Operand::Const(crate::ir::Constant::i32(2))),
            ],
        );
        b.ret(Some(p));
        let f = b.finish();
        assert!(verify_function(&f).is_err());
    }

    #[test]
    fn test_detached_target_rejected() {
        let mut f = add_function();
        let entry = f.entry().unwrap();
        let loose = f.create_block("loose", BlockOrigin::Mutant(1));
        let term = f.terminator(entry).unwrap();
        f.instruction_mut(term).set_op(Op::Br { target: loose });
        assert!(verify_function(&f).is_err());
    }

    #[test]
    fn test_unknown_callee() {
        let mut b = FunctionBuilder::new("main", vec![], Type::Void);
        b.block("entry");
        b.call("missing", vec![], Type::Void);
        b.ret(None);
        let mut program = Program::new("p");
        program.add_function(b.finish());
        assert!(verify_program(&program).is_err());
    }
}
