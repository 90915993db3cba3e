//! Weak-mutation instrumentation.
//!
//! Turns an encoded program into one that always runs the original code but
//! reports, at every dispatch site and for every mutant, whether the mutant
//! would have produced a different state right after its statement:
//!
//! ```text
//! call metamut_weak_mutation_log(i32 <id>, i1 <differs>)
//! ```
//!
//! `differs` compares the observable outputs of the original portion and the
//! mutant's fragment: stored values and addresses in order, the operands of
//! the terminator, and the values handed to phis of the successors. Both sides
//! are recomputed at the dispatch site from their side-effect free
//! instructions. Whenever that cannot be done safely the condition is the
//! constant `true`: bodies containing calls, phis, allocas, instructions that
//! may trap or loads following a store, and outputs whose shapes do not line
//! up. Outputs that are the same operand on both sides are not compared, so a
//! mutant that provably changes nothing reports the constant `false`.

use std::collections::HashMap;

use crate::{
    ir::{
        verify_program, BinaryOp, BlockId, CmpPredicate, Constant, Function, FunctionAttributes,
        InstrId, Instruction, Op, Operand, Program, Type,
    },
    mutation::{dispatch_sites, EncodedProgram, MutationConfig},
    Result,
};

/// Body and observable outputs of a dispatched block.
struct Outputs {
    body: Vec<InstrId>,
    values: Vec<Operand>,
    successors: Vec<BlockId>,
    terminator: &'static str,
}

fn outputs(function: &Function, block: BlockId) -> Option<Outputs> {
    let term = function.terminator(block)?;
    let instrs = function.block(block).instructions();
    let body: Vec<InstrId> = instrs[..instrs.len() - 1].to_vec();

    let mut values = Vec::new();
    let mut stored = false;
    for &id in &body {
        match function.instruction(id).op() {
            Op::Store { value, ptr } => {
                values.push(value.clone());
                values.push(ptr.clone());
                stored = true;
            }
            Op::Load { .. } if stored => return None,
            Op::Call { .. } | Op::Phi { .. } | Op::Alloca { .. } => return None,
            op if op.may_trap() && !matches!(op, Op::Load { .. }) => return None,
            _ => {}
        }
    }
    let term_op = function.instruction(term).op();
    values.extend(term_op.operands().into_iter().cloned());
    let successors = function.successors(block);
    for &succ in &successors {
        for phi in function.phis(succ) {
            if let Op::Phi { incoming } = function.instruction(phi).op() {
                if let Some((_, v)) = incoming.iter().find(|(pred, _)| *pred == block) {
                    values.push(v.clone());
                }
            }
        }
    }
    Some(Outputs {
        body,
        values,
        successors,
        terminator: term_op.mnemonic(),
    })
}

/// Re-emits the pure part of `body` at the end of `site`.
fn materialize(
    function: &mut Function,
    site: BlockId,
    body: &[InstrId],
) -> HashMap<InstrId, Operand> {
    let mut map: HashMap<InstrId, Operand> = HashMap::new();
    for &id in body {
        let mut copy = function.instruction(id).clone();
        if matches!(copy.op(), Op::Store { .. }) {
            continue;
        }
        for operand in copy.op_mut().operands_mut() {
            if let Some(mapped) = operand.as_value().and_then(|v| map.get(&v)) {
                *operand = mapped.clone();
            }
        }
        copy.set_name(None);
        let new = function.push_instruction(site, copy);
        map.insert(id, Operand::Value(new));
    }
    map
}

fn mapped(map: &HashMap<InstrId, Operand>, operand: &Operand) -> Operand {
    operand
        .as_value()
        .and_then(|v| map.get(&v))
        .cloned()
        .unwrap_or_else(|| operand.clone())
}

/// Builds the `differs` condition for one mutant at the end of `site`.
fn difference(
    function: &mut Function,
    site: BlockId,
    original: BlockId,
    mutant: BlockId,
) -> Operand {
    let may_differ = Operand::Const(Constant::bool(true));
    let (Some(left), Some(right)) = (outputs(function, original), outputs(function, mutant))
    else {
        return may_differ;
    };
    if left.values.len() != right.values.len()
        || left.successors != right.successors
        || left.terminator != right.terminator
        || left
            .values
            .iter()
            .zip(&right.values)
            .any(|(a, b)| function.operand_type(a) != function.operand_type(b))
    {
        return may_differ;
    }

    let left_map = materialize(function, site, &left.body);
    let right_map = materialize(function, site, &right.body);
    let mut differs: Option<Operand> = None;
    for (a, b) in left.values.iter().zip(&right.values) {
        let (a, b) = (mapped(&left_map, a), mapped(&right_map, b));
        if a == b {
            continue;
        }
        let ne = function.push_instruction(
            site,
            Instruction::new(
                Op::Cmp {
                    pred: CmpPredicate::Ne,
                    lhs: a,
                    rhs: b,
                },
                Type::I1,
            ),
        );
        differs = Some(match differs {
            None => Operand::Value(ne),
            Some(prev) => Operand::Value(function.push_instruction(
                site,
                Instruction::new(
                    Op::Binary {
                        op: BinaryOp::Or,
                        lhs: prev,
                        rhs: Operand::Value(ne),
                    },
                    Type::I1,
                ),
            )),
        });
    }
    differs.unwrap_or(Operand::Const(Constant::bool(false)))
}

/// Builds the weak-mutation variant of an encoded program.
///
/// The encoded program is left untouched. In the result every dispatch site
/// logs each of its mutants and then branches to the original statement;
/// mutant blocks are removed.
///
/// # Errors
///
/// Returns [`crate::Error::Verification`] if the instrumented program is not
/// well formed.
pub fn instrument(encoded: &EncodedProgram, config: &MutationConfig) -> Result<Program> {
    let mut program = encoded.program().clone();
    let log_name = config.weak_log_name.clone();
    let selector = encoded.selector().to_string();

    let mut logged = 0usize;
    for function in program.functions_mut() {
        if function.is_declaration() {
            continue;
        }
        let sites = dispatch_sites(function, &selector, None);
        if sites.is_empty() {
            continue;
        }
        for site in sites {
            function.remove_instruction(site.block, site.switch);
            function.remove_instruction(site.block, site.load);
            for (id, entry) in site.cases {
                let differs = difference(function, site.block, site.original, entry);
                function.push_instruction(
                    site.block,
                    Instruction::new(
                        Op::Call {
                            callee: log_name.clone(),
                            args: vec![Operand::Const(Constant::i32(id)), differs],
                        },
                        Type::Void,
                    ),
                );
                logged += 1;
            }
            function.push_instruction(
                site.block,
                Instruction::new(
                    Op::Br {
                        target: site.original,
                    },
                    Type::Void,
                ),
            );
        }
        function.prune_unreachable();
    }

    if logged > 0 && program.function(&log_name).is_none() {
        let mut log = Function::declaration(log_name, vec![Type::I32, Type::I1], Type::Void);
        log.add_attributes(FunctionAttributes::INSTRUMENTATION);
        program.add_function(log);
    }
    verify_program(&program)?;
    log::info!(
        "weak mutation: {} log call(s) in '{}'",
        logged,
        program.name()
    );
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::FunctionBuilder,
        mutation::{Mutator, OperatorConfig, OperatorRegistry},
    };

    fn log_args(program: &Program) -> Vec<(i64, Operand)> {
        let main = program.function("main").unwrap();
        main.iter_instructions()
            .filter_map(|(_, _, id)| match main.instruction(id).op() {
                Op::Call { callee, args } if callee == crate::mutation::DEFAULT_WEAK_LOG => {
                    Some((args[0].as_const().unwrap().value(), args[1].clone()))
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_instrumented_program_logs_every_mutant() {
        let mut b = FunctionBuilder::new("main", vec![Type::I32, Type::Ptr], Type::Void);
        b.block("entry");
        let x = b.binary(BinaryOp::Add, Operand::Arg(0), Operand::Const(Constant::i32(1)));
        b.store(x, Operand::Arg(1));
        b.ret(None);
        let mut program = Program::new("weak");
        program.add_function(b.finish());

        let registry = OperatorRegistry::from_config(
            &OperatorConfig::parse(
                "ADD(A, B) --> AddToSub, SUB(A, B)\nSTMT --> Delete, DELSTMT",
            )
            .unwrap(),
        );
        let config = MutationConfig::default();
        let run = Mutator::new(config.clone(), registry)
            .generate(program)
            .unwrap();
        assert_eq!(run.encoded.highest_id(), 2);

        let weak = instrument(&run.encoded, &config).unwrap();
        let main = weak.function("main").unwrap();
        assert!(main
            .iter_instructions()
            .all(|(_, _, id)| !matches!(main.instruction(id).op(), Op::Switch { .. })));
        assert!(main.layout().iter().all(|b| !matches!(
            main.block(*b).origin(),
            crate::ir::BlockOrigin::Mutant(_)
        )));

        let args = log_args(&weak);
        let ids: Vec<i64> = args.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 2]);
        // The subtraction is compared, statement deletion drops the store.
        assert!(matches!(args[0].1, Operand::Value(_)));
        assert_eq!(args[1].1, Operand::Const(Constant::bool(true)));
    }
}
