//! Dead code elimination pass.
//!
//! Three cleanups, applied in order:
//!
//! 1. **Unreachable blocks**: blocks not reachable from the entry are taken out
//!    of the layout, and phi entries naming them are dropped.
//! 2. **Trivial phis**: a phi whose incoming values are all the same (ignoring
//!    references to itself) is replaced by that value.
//! 3. **Unused instructions**: side-effect free instructions whose result is
//!    never read are removed, repeatedly, until none are left.

use std::collections::HashSet;

use crate::{
    compiler::{pass::ProgramPass, EventKind, EventLog},
    ir::{BlockId, Function, InstrId, Op, Operand},
    Result,
};

/// Removes unreachable blocks, trivial phis and unused pure instructions.
pub struct DeadCodeEliminationPass;

impl Default for DeadCodeEliminationPass {
    fn default() -> Self {
        Self::new()
    }
}

impl DeadCodeEliminationPass {
    /// Creates a new dead code elimination pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn remove_unreachable_blocks(function: &mut Function, events: &mut EventLog) -> bool {
        let dead = function.prune_unreachable();
        for &block in &dead {
            events
                .record(EventKind::BlockRemoved)
                .at(function.name(), block.index())
                .message(format!("unreachable {}", function.block(block).name()));
        }
        !dead.is_empty()
    }

    /// Returns the single value a phi merges, if it is trivial.
    fn trivial_phi_value(id: InstrId, op: &Op) -> Option<Operand> {
        let Op::Phi { incoming } = op else {
            return None;
        };
        let own = Operand::Value(id);
        let mut value: Option<&Operand> = None;
        for (_, operand) in incoming {
            if *operand == own {
                continue;
            }
            match value {
                Some(v) if v != operand => return None,
                _ => value = Some(operand),
            }
        }
        value.cloned()
    }

    fn remove_trivial_phis(function: &mut Function, events: &mut EventLog) -> bool {
        let mut changed = false;
        loop {
            let found = function.iter_instructions().find_map(|(block, _, id)| {
                Self::trivial_phi_value(id, function.instruction(id).op())
                    .map(|value| (block, id, value))
            });
            let Some((block, id, value)) = found else {
                break;
            };
            function.replace_uses(id, &value);
            function.remove_instruction(block, id);
            events
                .record(EventKind::PhiSimplified)
                .at(function.name(), id.index())
                .message("trivial phi");
            changed = true;
        }
        changed
    }

    fn remove_unused(function: &mut Function, events: &mut EventLog) -> bool {
        let mut changed = false;
        loop {
            let used: HashSet<InstrId> = function.users().into_keys().collect();
            let dead: Vec<(BlockId, InstrId)> = function
                .iter_instructions()
                .filter(|(_, _, id)| {
                    let instr = function.instruction(*id);
                    instr.has_result() && instr.op().is_pure() && !used.contains(id)
                })
                .map(|(block, _, id)| (block, id))
                .collect();
            if dead.is_empty() {
                break;
            }
            for (block, id) in dead {
                let mnemonic = function.instruction(id).op().mnemonic();
                function.remove_instruction(block, id);
                events
                    .record(EventKind::InstructionRemoved)
                    .at(function.name(), id.index())
                    .message(format!("unused {mnemonic}"));
            }
            changed = true;
        }
        changed
    }
}

impl ProgramPass for DeadCodeEliminationPass {
    fn name(&self) -> &'static str {
        "dead-code-elimination"
    }

    fn description(&self) -> &'static str {
        "Removes unreachable blocks, trivial phis and unused pure instructions"
    }

    fn run_on_function(&self, function: &mut Function, events: &mut EventLog) -> Result<bool> {
        let mut changed = Self::remove_unreachable_blocks(function, events);
        changed |= Self::remove_trivial_phis(function, events);
        changed |= Self::remove_unused(function, events);
        Ok(changed)
    }
}
