//! Block merging pass.
//!
//! Merges a block `S` into its predecessor `B` when `B` ends in `br S`, `S`
//! is not the entry and `B` is the only predecessor of `S`. Phis of `S` have a
//! single incoming value at that point and are replaced by it.
//!
//! After the reducer pins the selector, every dispatch site collapses into a
//! chain of unconditional branches; this pass folds that chain back into one
//! block so that structurally equal variants print identically.

use crate::{
    compiler::{pass::ProgramPass, EventKind, EventLog},
    ir::{BlockId, Function, Op},
    Result,
};

/// Merges straight-line block chains.
pub struct BlockMergePass;

impl Default for BlockMergePass {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockMergePass {
    /// Creates a new block merging pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Finds the next `(pred, succ)` pair that can be merged.
    fn find_pair(function: &Function) -> Option<(BlockId, BlockId)> {
        let entry = function.entry()?;
        let preds = function.predecessors();
        function.layout().iter().find_map(|&block| {
            let term = function.terminator(block)?;
            let Op::Br { target } = function.instruction(term).op() else {
                return None;
            };
            let target = *target;
            let single = preds.get(&target).is_some_and(|p| p.as_slice() == [block]);
            (target != block && target != entry && single).then_some((block, target))
        })
    }

    fn merge(function: &mut Function, pred: BlockId, succ: BlockId) {
        for phi in function.phis(succ) {
            let value = match function.instruction(phi).op() {
                Op::Phi { incoming } => incoming.first().map(|(_, v)| v.clone()),
                _ => None,
            };
            if let Some(value) = value {
                function.replace_uses(phi, &value);
            }
            function.remove_instruction(succ, phi);
        }

        if let Some(term) = function.terminator(pred) {
            function.remove_instruction(pred, term);
        }
        let moved = std::mem::take(function.block_mut(succ).instructions_mut());
        function.block_mut(pred).instructions_mut().extend(moved);

        for next in function.successors(pred) {
            for phi in function.phis(next) {
                function
                    .instruction_mut(phi)
                    .op_mut()
                    .replace_incoming_block(succ, pred);
            }
        }
        function.remove_block(succ);
    }
}

impl ProgramPass for BlockMergePass {
    fn name(&self) -> &'static str {
        "block-merge"
    }

    fn description(&self) -> &'static str {
        "Merges blocks joined by a single unconditional edge"
    }

    fn run_on_function(&self, function: &mut Function, events: &mut EventLog) -> Result<bool> {
        let mut changed = false;
        while let Some((pred, succ)) = Self::find_pair(function) {
            let name = function.block(succ).name().to_string();
            Self::merge(function, pred, succ);
            events
                .record(EventKind::BlocksMerged)
                .at(function.name(), pred.index())
                .message(format!("{name} into {}", function.block(pred).name()));
            changed = true;
        }
        Ok(changed)
    }
}
