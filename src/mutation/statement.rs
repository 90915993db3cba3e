//! Statement extraction.
//!
//! A statement is the maximal group of instructions that belong to one
//! source-level operation: everything reachable from a seed instruction by
//! following operands backwards and users forwards, stopping at stack slots.
//! Mutation operators rewrite whole statements, and the encoder multiplexes
//! variants at statement granularity.
//!
//! # Architecture
//!
//! The [`StatementExtractor`] sweeps the blocks of a function in layout order.
//! The first unclaimed instruction it meets seeds a new statement, whose
//! member set is computed up front by a flood fill. Later instructions that
//! are already members are appended to their statement as they are met, so a
//! statement that continues into a later block gets one
//! [`StatementPortion`] per block.
//!
//! After each block every statement that has a portion there is checked for
//! atomicity: its instructions inside the block must be contiguous, allocas
//! excepted. A violation means the block cannot be split around the
//! statement and is reported as an internal error.
//!
//! All phis of one block are always members of the same statement (a phi
//! group). Proxy blocks inserted by
//! [`insert_phi_proxies`](crate::mutation::insert_phi_proxies) are never part
//! of a statement.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::{
    ir::{BlockId, BlockOrigin, Function, InstrId},
    mutation::{insert_phi_proxies, GenerationSession},
    Result,
};

/// The instructions of a statement that live in one block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementPortion {
    block: BlockId,
    instructions: Vec<InstrId>,
}

impl StatementPortion {
    /// Returns the block the portion was extracted from.
    ///
    /// Encoding splits blocks, so after encoding has started the portion may
    /// live in a block split off from this one.
    #[must_use]
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// Returns the instructions in block order.
    #[must_use]
    pub fn instructions(&self) -> &[InstrId] {
        &self.instructions
    }

    /// Returns the first instruction.
    #[must_use]
    pub fn first(&self) -> Option<InstrId> {
        self.instructions.first().copied()
    }

    /// Returns the last instruction.
    #[must_use]
    pub fn last(&self) -> Option<InstrId> {
        self.instructions.last().copied()
    }
}

/// One atomic high-level statement.
#[derive(Debug, Clone)]
pub struct Statement {
    index: usize,
    instructions: Vec<InstrId>,
    positions: Vec<usize>,
    portions: Vec<StatementPortion>,
    members: HashSet<InstrId>,
    complete: bool,
}

impl Statement {
    fn new(index: usize, members: HashSet<InstrId>) -> Self {
        Self {
            index,
            instructions: Vec::with_capacity(members.len()),
            positions: Vec::with_capacity(members.len()),
            portions: Vec::new(),
            members,
            complete: false,
        }
    }

    fn push(&mut self, block: BlockId, id: InstrId, position: usize) {
        match self.portions.last_mut() {
            Some(portion) if portion.block == block => portion.instructions.push(id),
            _ => self.portions.push(StatementPortion {
                block,
                instructions: vec![id],
            }),
        }
        self.instructions.push(id);
        self.positions.push(position);
        self.complete = self.instructions.len() == self.members.len();
    }

    /// Returns the run-wide ordinal of the statement.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the instructions in layout order.
    #[must_use]
    pub fn instructions(&self) -> &[InstrId] {
        &self.instructions
    }

    /// Returns the layout positions of the instructions, aligned with
    /// [`Statement::instructions`].
    #[must_use]
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Returns the per-block portions in layout order.
    #[must_use]
    pub fn portions(&self) -> &[StatementPortion] {
        &self.portions
    }

    /// Returns the index of the portion holding `id`.
    #[must_use]
    pub fn portion_of(&self, id: InstrId) -> Option<usize> {
        self.portions
            .iter()
            .position(|p| p.instructions.contains(&id))
    }

    /// Returns `true` if `id` belongs to this statement.
    #[must_use]
    pub fn contains(&self, id: InstrId) -> bool {
        self.members.contains(&id)
    }

    /// Returns `true` once every member has been collected.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Returns the number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if the statement has no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// Partitions functions into statements.
pub struct StatementExtractor;

impl Default for StatementExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementExtractor {
    /// Creates a new extractor.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Extracts the statements of `function`.
    ///
    /// Phi blocks get their proxy predecessors first (a no-op if they already
    /// have them); after that the function is only read.
    ///
    /// # Arguments
    ///
    /// * `function` - The function to partition. Declarations yield nothing.
    /// * `session` - Run-wide counters for statement and proxy ordinals.
    ///
    /// # Returns
    ///
    /// The statements in the order their first instruction appears.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if a statement is not contiguous
    /// inside one of its blocks, or if an instruction was claimed by a
    /// statement but never reached by the sweep.
    pub fn extract(
        &self,
        function: &mut Function,
        session: &mut GenerationSession,
    ) -> Result<Vec<Statement>> {
        if function.is_declaration() {
            return Ok(Vec::new());
        }
        insert_phi_proxies(function, session);
        let function: &Function = function;

        let positions = function.positions();
        let locations = function.locations();
        let users = function.users();
        let proxies: HashSet<BlockId> = function
            .layout()
            .iter()
            .copied()
            .filter(|&b| function.block(b).origin() == BlockOrigin::Proxy)
            .collect();

        let mut statements: Vec<Statement> = Vec::new();
        let mut owner: HashMap<InstrId, usize> = HashMap::new();

        for &block in function.layout() {
            if proxies.contains(&block) {
                continue;
            }
            let mut touched: Vec<usize> = Vec::new();
            for &id in function.block(block).instructions() {
                if function.instruction(id).op().is_alloca() {
                    continue;
                }
                let slot = match owner.get(&id) {
                    Some(&slot) => slot,
                    None => {
                        let members = Self::flood(function, id, &owner, &users, &locations, &proxies);
                        let slot = statements.len();
                        for &member in &members {
                            owner.insert(member, slot);
                        }
                        statements.push(Statement::new(session.next_statement(), members));
                        slot
                    }
                };
                let position = positions.get(&id).copied().unwrap_or_default();
                statements[slot].push(block, id, position);
                if !touched.contains(&slot) {
                    touched.push(slot);
                }
            }

            for slot in touched {
                Self::check_atomic(function, block, &statements[slot])?;
            }
        }

        if let Some(stmt) = statements.iter().find(|s| !s.is_complete()) {
            let missing = stmt
                .members
                .iter()
                .find(|m| !stmt.instructions.contains(m))
                .map_or_else(String::new, ToString::to_string);
            return Err(malformed_error!(
                "instruction {} of '{}' reachable but not registered visited",
                missing,
                function.name()
            ));
        }

        log::debug!(
            "extracted {} statement(s) from '{}'",
            statements.len(),
            function.name()
        );
        Ok(statements)
    }

    /// Collects the members of the statement seeded by `seed`.
    fn flood(
        function: &Function,
        seed: InstrId,
        owner: &HashMap<InstrId, usize>,
        users: &HashMap<InstrId, Vec<InstrId>>,
        locations: &HashMap<InstrId, (BlockId, usize)>,
        proxies: &HashSet<BlockId>,
    ) -> HashSet<InstrId> {
        let eligible = |id: InstrId| {
            locations
                .get(&id)
                .is_some_and(|(block, _)| !proxies.contains(block))
                && !owner.contains_key(&id)
                && !function.instruction(id).op().is_alloca()
        };

        let mut members: HashSet<InstrId> = HashSet::new();
        let mut worklist: VecDeque<InstrId> = VecDeque::from([seed]);
        while let Some(id) = worklist.pop_front() {
            if !eligible(id) || !members.insert(id) {
                continue;
            }
            let instr = function.instruction(id);
            if instr.op().is_phi() {
                if let Some((block, _)) = locations.get(&id) {
                    worklist.extend(function.phis(*block));
                }
            }
            worklist.extend(instr.op().value_operands());
            if let Some(readers) = users.get(&id) {
                worklist.extend(readers.iter().copied());
            }
        }
        members
    }

    /// Checks that the portion of `stmt` in `block` is contiguous.
    fn check_atomic(function: &Function, block: BlockId, stmt: &Statement) -> Result<()> {
        let Some(portion) = stmt.portions.iter().rev().find(|p| p.block == block) else {
            return Ok(());
        };
        let instrs = function.block(block).instructions();
        let (Some(first), Some(last)) = (portion.first(), portion.last()) else {
            return Ok(());
        };
        let (Some(start), Some(end)) = (
            instrs.iter().position(|&i| i == first),
            instrs.iter().position(|&i| i == last),
        ) else {
            return Err(malformed_error!(
                "statement {} lost track of its portion in block {}",
                stmt.index,
                block
            ));
        };

        for &id in &instrs[start..=end] {
            if !stmt.contains(id) && !function.instruction(id).op().is_alloca() {
                return Err(malformed_error!(
                    "statement {} is not contiguous in block '{}' of '{}': {} interleaves",
                    stmt.index,
                    function.block(block).name(),
                    function.name(),
                    id
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{BinaryOp, CmpPredicate, Constant, FunctionBuilder, Operand, Type},
        mutation::demote_variable_phis,
        Error,
    };

    #[test]
    fn test_single_block_statements() {
        let mut b = FunctionBuilder::new("f", vec![Type::I32, Type::I32], Type::I32);
        b.block("entry");
        let slot = b.alloca(Type::I32);
        let x = b.binary(BinaryOp::Add, Operand::Arg(0), Operand::Arg(1));
        b.store(x, slot.clone());
        let y = b.load(Type::I32, slot);
        let z = b.binary(BinaryOp::Mul, y, Operand::Const(Constant::i32(2)));
        b.ret(Some(z));
        let mut f = b.finish();

        let mut session = GenerationSession::new();
        let stmts = StatementExtractor::new().extract(&mut f, &mut session).unwrap();
        assert_eq!(stmts.len(), 2);
        assert_eq!(stmts[0].len(), 2);
        assert_eq!(stmts[1].len(), 3);
        assert!(stmts.iter().all(Statement::is_complete));
        assert_eq!(stmts[0].positions(), &[1, 2]);
        assert_eq!(stmts[1].portions().len(), 1);
    }

    #[test]
    fn test_statement_spanning_blocks() {
        let mut b = FunctionBuilder::new("f", vec![Type::I32], Type::I32);
        let entry = b.block("entry");
        let next = b.declare_block("next");
        b.switch_to(entry);
        let x = b.binary(BinaryOp::Add, Operand::Arg(0), Operand::Const(Constant::i32(1)));
        b.br(next);
        b.switch_to(next);
        let y = b.binary(BinaryOp::Mul, x, Operand::Const(Constant::i32(3)));
        b.ret(Some(y.clone()));
        let mut f = b.finish();

        let mut session = GenerationSession::new();
        let stmts = StatementExtractor::new().extract(&mut f, &mut session).unwrap();
        // `br next` stands alone; add, mul and ret form one statement.
        assert_eq!(stmts.len(), 2);
        let spanning = &stmts[0];
        assert_eq!(spanning.portions().len(), 2);
        assert_eq!(spanning.portions()[0].block(), entry);
        assert_eq!(spanning.portions()[1].block(), next);
        assert_eq!(spanning.portion_of(y.as_value().unwrap()), Some(1));
    }

    #[test]
    fn test_phi_group_and_proxies() {
        let mut b = FunctionBuilder::new("g", vec![Type::I32, Type::Ptr], Type::I32);
        let entry = b.block("entry");
        let yes = b.declare_block("yes");
        let join = b.declare_block("join");
        b.switch_to(entry);
        let c = b.cmp(CmpPredicate::Slt, Operand::Arg(0), Operand::Const(Constant::i32(0)));
        b.cond_br(c, yes, join);
        b.switch_to(yes);
        b.br(join);
        b.switch_to(join);
        let p = b.phi(
            Type::I32,
            vec![
                (entry, Operand::Const(Constant::i32(1))),
                (yes, Operand::Const(Constant::i32(-1))),
            ],
        );
        let q = b.phi(
            Type::I32,
            vec![
                (entry, Operand::Const(Constant::i32(0))),
                (yes, Operand::Const(Constant::i32(5))),
            ],
        );
        let s = b.binary(BinaryOp::Add, p.clone(), Operand::Arg(0));
        b.store(q, Operand::Arg(1));
        b.ret(Some(s));
        let mut f = b.finish();
        demote_variable_phis(&mut f);

        // Without the phi group, {p, add, ret} and {q, store} would interleave.
        let mut session = GenerationSession::new();
        let stmts = StatementExtractor::new().extract(&mut f, &mut session).unwrap();
        let phi_stmt = stmts
            .iter()
            .find(|s| s.contains(p.as_value().unwrap()))
            .unwrap();
        assert_eq!(phi_stmt.portions()[0].block(), join);
        assert_eq!(phi_stmt.portions()[0].instructions().len(), 5);
        assert!(f
            .layout()
            .iter()
            .any(|&b| f.block(b).origin() == BlockOrigin::Proxy));
    }

    #[test]
    fn test_interleaved_statements_rejected() {
        let mut b = FunctionBuilder::new("h", vec![Type::I32, Type::Ptr, Type::Ptr], Type::Void);
        b.block("entry");
        let a = b.binary(BinaryOp::Add, Operand::Arg(0), Operand::Arg(0));
        let m = b.binary(BinaryOp::Mul, Operand::Arg(0), Operand::Arg(0));
        b.store(a, Operand::Arg(1));
        b.store(m, Operand::Arg(2));
        b.ret(None);
        let mut f = b.finish();

        let mut session = GenerationSession::new();
        let err = StatementExtractor::new()
            .extract(&mut f, &mut session)
            .unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }));
    }
}
