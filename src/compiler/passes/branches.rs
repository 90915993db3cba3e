//! Branch simplification pass.
//!
//! Rewrites terminators whose outcome is known into unconditional branches:
//!
//! - `br i1 true/false, a, b` → `br a` / `br b`
//! - `br i1 %c, a, a` → `br a`
//! - `switch` on a constant → `br` to the matching case or the default
//! - `switch` without cases, or whose cases all go to the default → `br default`
//!
//! Phi entries of successors that lost their edge are removed so the phis stay
//! consistent with the new predecessor sets.

use crate::{
    compiler::{pass::ProgramPass, EventKind, EventLog},
    ir::{BlockId, Function, InstrId, Op, Operand},
    Result,
};

/// Folds branches with a statically known target.
pub struct BranchSimplificationPass;

impl Default for BranchSimplificationPass {
    fn default() -> Self {
        Self::new()
    }
}

impl BranchSimplificationPass {
    /// Creates a new branch simplification pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the single target a terminator always takes, if known.
    fn known_target(function: &Function, op: &Op) -> Option<BlockId> {
        match op {
            Op::CondBr {
                on_true, on_false, ..
            } if on_true == on_false => Some(*on_true),
            Op::CondBr {
                cond: Operand::Const(c),
                on_true,
                on_false,
            } => Some(if c.is_zero() { *on_false } else { *on_true }),
            Op::Switch {
                value: Operand::Const(c),
                default,
                cases,
            } => {
                let ty = function.operand_type(&Operand::Const(*c));
                Some(
                    cases
                        .iter()
                        .find(|(case, _)| ty.normalize(*case) == c.value())
                        .map_or(*default, |(_, target)| *target),
                )
            }
            Op::Switch { default, cases, .. }
                if cases.iter().all(|(_, target)| target == default) =>
            {
                Some(*default)
            }
            _ => None,
        }
    }

    fn find_candidates(function: &Function) -> Vec<(BlockId, InstrId, BlockId)> {
        function
            .layout()
            .iter()
            .filter_map(|&block| {
                let term = function.terminator(block)?;
                Self::known_target(function, function.instruction(term).op())
                    .map(|target| (block, term, target))
            })
            .collect()
    }
}

impl ProgramPass for BranchSimplificationPass {
    fn name(&self) -> &'static str {
        "branch-simplification"
    }

    fn description(&self) -> &'static str {
        "Turns branches with a known outcome into unconditional jumps"
    }

    fn run_on_function(&self, function: &mut Function, events: &mut EventLog) -> Result<bool> {
        let candidates = Self::find_candidates(function);
        for &(block, term, target) in &candidates {
            let dropped: Vec<BlockId> = function
                .successors(block)
                .into_iter()
                .filter(|&succ| succ != target)
                .collect();
            let mnemonic = function.instruction(term).op().mnemonic();
            function
                .instruction_mut(term)
                .set_op(Op::Br { target });

            for succ in dropped {
                for phi in function.phis(succ) {
                    function
                        .instruction_mut(phi)
                        .op_mut()
                        .remove_incoming_block(block);
                }
            }
            events
                .record(EventKind::BranchSimplified)
                .at(function.name(), block.index())
                .message(format!("{mnemonic} -> br {target}"));
        }
        Ok(!candidates.is_empty())
    }
}
