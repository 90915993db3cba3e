//! Normalisation run on every function before statements are extracted.
//!
//! Two rewrites make the control-flow graph safe to cut into statements:
//!
//! - [`demote_variable_phis`] turns every phi with a non-constant incoming
//!   value into a stack slot. Such a phi would otherwise glue the value
//!   computations of all its predecessors into a single statement.
//! - [`insert_phi_proxies`] gives every edge into a block with phis its own
//!   single-branch block. A statement headed by phis can then be dispatched
//!   from those proxies without splitting the phi block itself.

use std::collections::HashSet;

use crate::{
    ir::{BlockId, BlockOrigin, Function, InstrId, Instruction, Op, Operand, Type},
    mutation::GenerationSession,
};

/// Removes phis whose result is never read, repeatedly.
fn remove_unused_phis(function: &mut Function) -> usize {
    let mut removed = 0;
    loop {
        let users = function.users();
        let dead: Vec<(BlockId, InstrId)> = function
            .iter_instructions()
            .filter(|(_, _, id)| {
                function.instruction(*id).op().is_phi()
                    && users.get(id).map_or(true, |u| u.iter().all(|user| user == id))
            })
            .map(|(block, _, id)| (block, id))
            .collect();
        if dead.is_empty() {
            return removed;
        }
        for (block, id) in dead {
            function.remove_instruction(block, id);
            removed += 1;
        }
    }
}

/// Number of leading phis, allocas and demotion loads of `block`.
fn leading_merge_count(function: &Function, block: BlockId, loads: &HashSet<InstrId>) -> usize {
    function
        .block(block)
        .instructions()
        .iter()
        .take_while(|id| {
            let op = function.instruction(**id).op();
            op.is_phi() || op.is_alloca() || loads.contains(id)
        })
        .count()
}

/// Demotes every phi that has a non-constant incoming value to a stack slot.
///
/// The slot is allocated in the entry block after the leading allocas. Each
/// incoming value is stored in its incoming block, right after its definition
/// when it is defined there and at the top of the block otherwise. The phi is
/// replaced by a load at the top of its own block. Phis nobody reads are
/// deleted first.
///
/// # Returns
///
/// The number of phis demoted.
pub fn demote_variable_phis(function: &mut Function) -> usize {
    let Some(entry) = function.entry() else {
        return 0;
    };
    remove_unused_phis(function);

    let candidates: Vec<(BlockId, InstrId)> = function
        .iter_instructions()
        .filter(|(_, _, id)| match function.instruction(*id).op() {
            Op::Phi { incoming } => incoming.iter().any(|(_, v)| v.as_const().is_none()),
            _ => false,
        })
        .map(|(block, _, id)| (block, id))
        .collect();

    let mut loads: HashSet<InstrId> = HashSet::new();
    for &(block, phi) in &candidates {
        let ty = function.instruction(phi).ty();
        let incoming = match function.instruction(phi).op() {
            Op::Phi { incoming } => incoming.clone(),
            _ => continue,
        };

        let slot_index = function
            .block(entry)
            .instructions()
            .iter()
            .take_while(|id| function.instruction(**id).op().is_alloca())
            .count();
        let slot = function.insert_instruction(
            entry,
            slot_index,
            Instruction::new(Op::Alloca { ty }, Type::Ptr),
        );

        for (pred, value) in incoming {
            let top = leading_merge_count(function, pred, &loads);
            let index = value
                .as_value()
                .and_then(|def| function.block(pred).position(def))
                .map_or(top, |pos| (pos + 1).max(top));
            function.insert_instruction(
                pred,
                index,
                Instruction::new(
                    Op::Store {
                        value,
                        ptr: Operand::Value(slot),
                    },
                    Type::Void,
                ),
            );
        }

        let name = function.instruction(phi).name().map(str::to_string);
        function.remove_instruction(block, phi);
        let index = function.phis(block).len();
        let load = function.insert_instruction(
            block,
            index,
            Instruction::new(
                Op::Load {
                    ptr: Operand::Value(slot),
                },
                ty,
            ),
        );
        function.instruction_mut(load).set_name(name);
        function.replace_uses(phi, &Operand::Value(load));
        loads.insert(load);
    }

    if !candidates.is_empty() {
        log::debug!(
            "demoted {} variable phi(s) in '{}'",
            candidates.len(),
            function.name()
        );
    }
    candidates.len()
}

/// Inserts a proxy block on every edge into a block that starts with phis.
///
/// Edges already coming from a proxy are left alone, so the rewrite can be
/// applied more than once.
///
/// # Returns
///
/// The number of proxy blocks inserted.
pub fn insert_phi_proxies(function: &mut Function, session: &mut GenerationSession) -> usize {
    let preds = function.predecessors();
    let targets: Vec<BlockId> = function
        .layout()
        .iter()
        .copied()
        .filter(|&b| !function.phis(b).is_empty())
        .collect();

    let mut inserted = 0;
    for block in targets {
        let phis = function.phis(block);
        for &pred in preds.get(&block).map_or(&[][..], Vec::as_slice) {
            if function.block(pred).origin() == BlockOrigin::Proxy {
                continue;
            }
            let proxy = function.create_block(
                format!("phi.proxy{}", session.next_proxy()),
                BlockOrigin::Proxy,
            );
            function.push_instruction(proxy, Instruction::new(Op::Br { target: block }, Type::Void));
            function.place_block_before(block, proxy);
            function.redirect_edge(pred, block, proxy);
            for &phi in &phis {
                function
                    .instruction_mut(phi)
                    .op_mut()
                    .replace_incoming_block(pred, proxy);
            }
            inserted += 1;
        }
    }
    inserted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{verify_function, CmpPredicate, Constant, FunctionBuilder};

    /// `r = c ? a : 7` written with a phi at the join.
    fn select_like() -> Function {
        let mut b = FunctionBuilder::new("f", vec![Type::I1, Type::I32], Type::I32);
        let entry = b.block("entry");
        let left = b.declare_block("left");
        let join = b.declare_block("join");
        b.switch_to(entry);
        b.cond_br(Operand::Arg(0), left, join);
        b.switch_to(left);
        let a = b.binary(
            crate::ir::BinaryOp::Add,
            Operand::Arg(1),
            Operand::Const(Constant::i32(1)),
        );
        b.br(join);
        b.switch_to(join);
        let r = b.phi(
            Type::I32,
            vec![(left, a), (entry, Operand::Const(Constant::i32(7)))],
        );
        b.ret(Some(r));
        b.finish()
    }

    #[test]
    fn test_demotes_variable_phi() {
        let mut f = select_like();
        assert_eq!(demote_variable_phis(&mut f), 1);
        verify_function(&f).unwrap();

        let entry = f.entry().unwrap();
        let first = f.block(entry).instructions()[0];
        assert!(f.instruction(first).op().is_alloca());
        assert!(f
            .iter_instructions()
            .all(|(_, _, id)| !f.instruction(id).op().is_phi()));
        let stores = f
            .iter_instructions()
            .filter(|(_, _, id)| matches!(f.instruction(*id).op(), Op::Store { .. }))
            .count();
        assert_eq!(stores, 2);
    }

    #[test]
    fn test_store_follows_local_definition() {
        let mut f = select_like();
        demote_variable_phis(&mut f);
        let left = f.layout()[1];
        let ops: Vec<&'static str> = f
            .block(left)
            .instructions()
            .iter()
            .map(|id| f.instruction(*id).op().mnemonic())
            .collect();
        assert_eq!(ops, vec!["add", "store", "br"]);
    }

    #[test]
    fn test_constant_phi_gets_proxies() {
        let mut b = FunctionBuilder::new("g", vec![Type::I32], Type::I1);
        let entry = b.block("entry");
        let yes = b.declare_block("yes");
        let join = b.declare_block("join");
        b.switch_to(entry);
        let c = b.cmp(CmpPredicate::Sgt, Operand::Arg(0), Operand::Const(Constant::i32(0)));
        b.cond_br(c, yes, join);
        b.switch_to(yes);
        b.br(join);
        b.switch_to(join);
        let p = b.phi(
            Type::I1,
            vec![
                (entry, Operand::Const(Constant::bool(false))),
                (yes, Operand::Const(Constant::bool(true))),
            ],
        );
        b.ret(Some(p));
        let mut f = b.finish();

        assert_eq!(demote_variable_phis(&mut f), 0);
        let mut session = GenerationSession::new();
        assert_eq!(insert_phi_proxies(&mut f, &mut session), 2);
        verify_function(&f).unwrap();
        let preds = f.predecessors();
        assert!(preds[&join]
            .iter()
            .all(|&p| f.block(p).origin() == BlockOrigin::Proxy));
        assert_eq!(insert_phi_proxies(&mut f, &mut session), 0);
    }

    #[test]
    fn test_unused_phi_removed() {
        let mut b = FunctionBuilder::new("h", vec![Type::I32], Type::Void);
        let entry = b.block("entry");
        let next = b.declare_block("next");
        b.switch_to(entry);
        b.br(next);
        b.switch_to(next);
        b.phi(Type::I32, vec![(entry, Operand::Arg(0))]);
        b.ret(None);
        let mut f = b.finish();
        assert_eq!(demote_variable_phis(&mut f), 0);
        assert!(f.phis(next).is_empty());
    }
}
