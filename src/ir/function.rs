//! Functions: the arena that owns blocks and instructions.
//!
//! # Architecture
//!
//! A [`Function`] owns two arenas, one of [`Instruction`]s and one of
//! [`Block`]s, plus an ordered `layout` of the blocks that are actually part of
//! the control-flow graph. Handles ([`InstrId`], [`BlockId`]) never move or get
//! reused, so transformations can hold them across edits.
//!
//! A block or instruction that was allocated but is not reachable through the
//! layout is *detached*. Detached items are invisible to the verifier, the
//! printer and the optimisation passes; mutation operators build their
//! replacement fragments as detached blocks and the encoder places them.
//!
//! Back-references (who uses a value, which blocks precede a block) are never
//! stored. [`Function::users`] and [`Function::predecessors`] derive them on
//! demand from the current layout.

use std::collections::{HashMap, HashSet};

use bitflags::bitflags;

use crate::ir::{
    Block, BlockId, BlockOrigin, DominatorTree, InstrId, Instruction, Op, Operand, Type,
};

bitflags! {
    /// Per-function flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FunctionAttributes: u32 {
        /// The function has no body.
        const DECLARATION = 0x1;
        /// Support code for instrumentation; never mutated.
        const INSTRUMENTATION = 0x2;
    }
}

/// A function with an arena-backed control-flow graph.
#[derive(Debug, Clone)]
pub struct Function {
    name: String,
    params: Vec<Type>,
    ret: Type,
    attributes: FunctionAttributes,
    instructions: Vec<Instruction>,
    blocks: Vec<Block>,
    layout: Vec<BlockId>,
}

impl Function {
    /// Creates a function definition without blocks.
    ///
    /// # Arguments
    ///
    /// * `name` - Symbol name, unique within its program.
    /// * `params` - Parameter types in order.
    /// * `ret` - Return type.
    #[must_use]
    pub fn new(name: impl Into<String>, params: Vec<Type>, ret: Type) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
            attributes: FunctionAttributes::empty(),
            instructions: Vec::new(),
            blocks: Vec::new(),
            layout: Vec::new(),
        }
    }

    /// Creates a body-less declaration.
    #[must_use]
    pub fn declaration(name: impl Into<String>, params: Vec<Type>, ret: Type) -> Self {
        let mut function = Self::new(name, params, ret);
        function.attributes = FunctionAttributes::DECLARATION;
        function
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the parameter types.
    #[must_use]
    pub fn params(&self) -> &[Type] {
        &self.params
    }

    /// Returns the return type.
    #[must_use]
    pub fn return_type(&self) -> Type {
        self.ret
    }

    /// Returns the attribute flags.
    #[must_use]
    pub fn attributes(&self) -> FunctionAttributes {
        self.attributes
    }

    /// Adds attribute flags.
    pub fn add_attributes(&mut self, attributes: FunctionAttributes) {
        self.attributes |= attributes;
    }

    /// Returns `true` if the function has no body.
    #[must_use]
    pub fn is_declaration(&self) -> bool {
        self.attributes.contains(FunctionAttributes::DECLARATION)
    }

    /// Returns the instruction behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not minted by this function.
    #[must_use]
    pub fn instruction(&self, id: InstrId) -> &Instruction {
        &self.instructions[id.0]
    }

    /// Returns the instruction behind a handle for editing.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not minted by this function.
    pub fn instruction_mut(&mut self, id: InstrId) -> &mut Instruction {
        &mut self.instructions[id.0]
    }

    /// Returns the instruction behind a handle, or `None` for foreign handles.
    #[must_use]
    pub fn get_instruction(&self, id: InstrId) -> Option<&Instruction> {
        self.instructions.get(id.0)
    }

    /// Returns the block behind a handle.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not minted by this function.
    #[must_use]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.0]
    }

    /// Returns the block behind a handle for editing.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not minted by this function.
    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.0]
    }

    /// Returns the block behind a handle, or `None` for foreign handles.
    #[must_use]
    pub fn get_block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0)
    }

    /// Returns the placed blocks in layout order. The first one is the entry.
    #[must_use]
    pub fn layout(&self) -> &[BlockId] {
        &self.layout
    }

    /// Returns the entry block, if the function has a body.
    #[must_use]
    pub fn entry(&self) -> Option<BlockId> {
        self.layout.first().copied()
    }

    /// Returns `true` if `block` is part of the layout.
    #[must_use]
    pub fn is_placed(&self, block: BlockId) -> bool {
        self.layout.contains(&block)
    }

    /// Returns the number of arena slots, placed or not.
    #[must_use]
    pub fn arena_len(&self) -> usize {
        self.instructions.len()
    }

    /// Allocates a detached block.
    pub fn create_block(&mut self, name: impl Into<String>, origin: BlockOrigin) -> BlockId {
        let id = BlockId(self.blocks.len());
        self.blocks.push(Block::new(name, origin));
        id
    }

    /// Allocates a block and places it at the end of the layout.
    pub fn append_block(&mut self, name: impl Into<String>, origin: BlockOrigin) -> BlockId {
        let id = self.create_block(name, origin);
        self.layout.push(id);
        id
    }

    /// Places `block` right after `after`, or at the end if `after` is not placed.
    pub fn place_block_after(&mut self, after: BlockId, block: BlockId) {
        match self.layout.iter().position(|&b| b == after) {
            Some(pos) => self.layout.insert(pos + 1, block),
            None => self.layout.push(block),
        }
    }

    /// Places `block` right before `before`, or at the end if `before` is not placed.
    pub fn place_block_before(&mut self, before: BlockId, block: BlockId) {
        match self.layout.iter().position(|&b| b == before) {
            Some(pos) => self.layout.insert(pos, block),
            None => self.layout.push(block),
        }
    }

    /// Removes `block` from the layout. The block stays in the arena, detached.
    ///
    /// Phi entries in other blocks that name `block` are not touched.
    pub fn remove_block(&mut self, block: BlockId) {
        self.layout.retain(|&b| b != block);
    }

    /// Allocates a detached instruction.
    pub fn add_instruction(&mut self, instruction: Instruction) -> InstrId {
        let id = InstrId(self.instructions.len());
        self.instructions.push(instruction);
        id
    }

    /// Allocates an instruction and appends it to `block`.
    pub fn push_instruction(&mut self, block: BlockId, instruction: Instruction) -> InstrId {
        let id = self.add_instruction(instruction);
        self.blocks[block.0].instructions_mut().push(id);
        id
    }

    /// Allocates an instruction and inserts it into `block` at `index`.
    pub fn insert_instruction(
        &mut self,
        block: BlockId,
        index: usize,
        instruction: Instruction,
    ) -> InstrId {
        let id = self.add_instruction(instruction);
        let list = self.blocks[block.0].instructions_mut();
        let index = index.min(list.len());
        list.insert(index, id);
        id
    }

    /// Detaches `id` from `block`.
    ///
    /// # Returns
    ///
    /// `true` if the instruction was in the block.
    pub fn remove_instruction(&mut self, block: BlockId, id: InstrId) -> bool {
        let list = self.blocks[block.0].instructions_mut();
        let before = list.len();
        list.retain(|&i| i != id);
        list.len() != before
    }

    /// Returns the terminator of `block`, if its last instruction is one.
    #[must_use]
    pub fn terminator(&self, block: BlockId) -> Option<InstrId> {
        let last = self.blocks[block.0].last()?;
        self.instructions[last.0]
            .op()
            .is_terminator()
            .then_some(last)
    }

    /// Returns the distinct successors of `block` in edge order.
    #[must_use]
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        let mut out: Vec<BlockId> = Vec::new();
        if let Some(term) = self.terminator(block) {
            for succ in self.instructions[term.0].op().successors() {
                if !out.contains(&succ) {
                    out.push(succ);
                }
            }
        }
        out
    }

    /// Returns the distinct predecessors of every placed block.
    ///
    /// Blocks without predecessors map to an empty list. Predecessors are listed
    /// in layout order.
    #[must_use]
    pub fn predecessors(&self) -> HashMap<BlockId, Vec<BlockId>> {
        let mut preds: HashMap<BlockId, Vec<BlockId>> =
            self.layout.iter().map(|&b| (b, Vec::new())).collect();
        for &block in &self.layout {
            for succ in self.successors(block) {
                let entry = preds.entry(succ).or_default();
                if !entry.contains(&block) {
                    entry.push(block);
                }
            }
        }
        preds
    }

    /// Returns the leading phi instructions of `block`.
    #[must_use]
    pub fn phis(&self, block: BlockId) -> Vec<InstrId> {
        self.blocks[block.0]
            .instructions()
            .iter()
            .copied()
            .take_while(|&id| self.instructions[id.0].op().is_phi())
            .collect()
    }

    /// Iterates over every placed instruction as `(block, index, id)`.
    pub fn iter_instructions(&self) -> impl Iterator<Item = (BlockId, usize, InstrId)> + '_ {
        self.layout.iter().flat_map(move |&block| {
            self.blocks[block.0]
                .instructions()
                .iter()
                .enumerate()
                .map(move |(idx, &id)| (block, idx, id))
        })
    }

    /// Maps every placed instruction to its block and index.
    #[must_use]
    pub fn locations(&self) -> HashMap<InstrId, (BlockId, usize)> {
        self.iter_instructions()
            .map(|(block, idx, id)| (id, (block, idx)))
            .collect()
    }

    /// Returns the placed block that currently holds `id`.
    #[must_use]
    pub fn block_of(&self, id: InstrId) -> Option<BlockId> {
        self.layout
            .iter()
            .copied()
            .find(|&b| self.blocks[b.0].instructions().contains(&id))
    }

    /// Numbers the placed instructions in layout order, starting at zero.
    ///
    /// These positions are what mutant metadata records; they are stable for as
    /// long as the function is not edited.
    #[must_use]
    pub fn positions(&self) -> HashMap<InstrId, usize> {
        self.iter_instructions()
            .enumerate()
            .map(|(pos, (_, _, id))| (id, pos))
            .collect()
    }

    /// Returns, for each placed instruction, the placed instructions that read it.
    ///
    /// Users are listed in layout order without duplicates.
    #[must_use]
    pub fn users(&self) -> HashMap<InstrId, Vec<InstrId>> {
        let mut users: HashMap<InstrId, Vec<InstrId>> = HashMap::new();
        for (_, _, id) in self.iter_instructions() {
            for used in self.instructions[id.0].op().value_operands() {
                let entry = users.entry(used).or_default();
                if !entry.contains(&id) {
                    entry.push(id);
                }
            }
        }
        users
    }

    /// Returns the type of an operand as seen from this function.
    #[must_use]
    pub fn operand_type(&self, operand: &Operand) -> Type {
        match operand {
            Operand::Value(id) => self
                .instructions
                .get(id.0)
                .map_or(Type::Void, Instruction::ty),
            Operand::Arg(i) => self.params.get(*i).copied().unwrap_or(Type::Void),
            Operand::Const(c) => c.ty(),
            Operand::Global(_) | Operand::Function(_) => Type::Ptr,
        }
    }

    /// Rewrites every read of `old` into a read of `new`, across the whole arena.
    ///
    /// # Returns
    ///
    /// The number of operands rewritten.
    pub fn replace_uses(&mut self, old: InstrId, new: &Operand) -> usize {
        self.replace_uses_except(old, new, &HashSet::new())
    }

    /// Like [`Function::replace_uses`] but leaves the instructions in `skip` alone.
    pub fn replace_uses_except(
        &mut self,
        old: InstrId,
        new: &Operand,
        skip: &HashSet<InstrId>,
    ) -> usize {
        let old = Operand::Value(old);
        let mut count = 0;
        for (idx, instr) in self.instructions.iter_mut().enumerate() {
            if skip.contains(&InstrId(idx)) {
                continue;
            }
            count += instr.op_mut().replace_operand(&old, new);
        }
        count
    }

    /// Splits `block` before the instruction at `index`.
    ///
    /// Instructions from `index` on move into a new block placed right after
    /// `block`, and `block` gets an unconditional branch to it. Phis in the
    /// successors of the moved terminator are updated to name the new block.
    ///
    /// # Arguments
    ///
    /// * `block` - The block to split.
    /// * `index` - First instruction of the new block.
    /// * `name` - Label of the new block.
    /// * `origin` - Origin recorded on the new block.
    ///
    /// # Returns
    ///
    /// The handle of the new block.
    pub fn split_block(
        &mut self,
        block: BlockId,
        index: usize,
        name: impl Into<String>,
        origin: BlockOrigin,
    ) -> BlockId {
        let index = index.min(self.blocks[block.0].len());
        let moved = self.blocks[block.0].instructions_mut().split_off(index);
        let tail = self.create_block(name, origin);
        *self.blocks[tail.0].instructions_mut() = moved;

        for succ in self.successors(tail) {
            for phi in self.phis(succ) {
                self.instructions[phi.0]
                    .op_mut()
                    .replace_incoming_block(block, tail);
            }
        }

        self.push_instruction(block, Instruction::new(Op::Br { target: tail }, Type::Void));
        self.place_block_after(block, tail);
        tail
    }

    /// Takes every block that cannot be reached from the entry out of the
    /// layout and drops phi entries that name one of them.
    ///
    /// # Returns
    ///
    /// The blocks that were removed, in layout order.
    pub fn prune_unreachable(&mut self) -> Vec<BlockId> {
        let tree = DominatorTree::compute(self);
        let dead: Vec<BlockId> = self
            .layout
            .iter()
            .copied()
            .filter(|&b| !tree.is_reachable(b))
            .collect();
        if dead.is_empty() {
            return dead;
        }
        for &block in &dead {
            self.remove_block(block);
        }
        let placed = self.layout.clone();
        for block in placed {
            for phi in self.phis(block) {
                for &gone in &dead {
                    self.instructions[phi.0].op_mut().remove_incoming_block(gone);
                }
            }
        }
        dead
    }

    /// Redirects the edges of `from`'s terminator that target `old` to `new`.
    ///
    /// # Returns
    ///
    /// `true` if an edge was changed.
    pub fn redirect_edge(&mut self, from: BlockId, old: BlockId, new: BlockId) -> bool {
        match self.terminator(from) {
            Some(term) => self.instructions[term.0]
                .op_mut()
                .replace_successor(old, new),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, Constant};

    fn diamond() -> (Function, [BlockId; 4], InstrId) {
        let mut f = Function::new("diamond", vec![Type::I1, Type::I32], Type::I32);
        let entry = f.append_block("entry", BlockOrigin::Source);
        let left = f.append_block("left", BlockOrigin::Source);
        let right = f.append_block("right", BlockOrigin::Source);
        let join = f.append_block("join", BlockOrigin::Source);
        f.push_instruction(
            entry,
            Instruction::new(
                Op::CondBr {
                    cond: Operand::Arg(0),
                    on_true: left,
                    on_false: right,
                },
                Type::Void,
            ),
        );
        f.push_instruction(left, Instruction::new(Op::Br { target: join }, Type::Void));
        f.push_instruction(right, Instruction::new(Op::Br { target: join }, Type::Void));
        let phi = f.push_instruction(
            join,
            Instruction::new(
                Op::Phi {
                    incoming: vec![
                        (left, Operand::Const(Constant::i32(1))),
                        (right, Operand::Arg(1)),
                    ],
                },
                Type::I32,
            ),
        );
        f.push_instruction(
            join,
            Instruction::new(
                Op::Ret {
                    value: Some(Operand::Value(phi)),
                },
                Type::Void,
            ),
        );
        (f, [entry, left, right, join], phi)
    }

    #[test]
    fn test_predecessors() {
        let (f, [entry, left, right, join], _) = diamond();
        let preds = f.predecessors();
        assert!(preds[&entry].is_empty());
        assert_eq!(preds[&left], vec![entry]);
        assert_eq!(preds[&join], vec![left, right]);
    }

    #[test]
    fn test_split_updates_successor_phis() {
        let (mut f, [_, left, _, join], phi) = diamond();
        let tail = f.split_block(left, 0, "left.tail", BlockOrigin::Source);
        assert_eq!(f.layout()[2], tail);
        assert_eq!(f.successors(left), vec![tail]);
        match f.instruction(phi).op() {
            Op::Phi { incoming } => assert_eq!(incoming[0].0, tail),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(f.predecessors()[&join].len(), 2);
    }

    #[test]
    fn test_users_and_replace() {
        let mut f = Function::new("f", vec![Type::I32], Type::I32);
        let entry = f.append_block("entry", BlockOrigin::Source);
        let a = f.push_instruction(
            entry,
            Instruction::new(
                Op::Binary {
                    op: BinaryOp::Add,
                    lhs: Operand::Arg(0),
                    rhs: Operand::Arg(0),
                },
                Type::I32,
            ),
        );
        let r = f.push_instruction(
            entry,
            Instruction::new(
                Op::Ret {
                    value: Some(Operand::Value(a)),
                },
                Type::Void,
            ),
        );
        assert_eq!(f.users()[&a], vec![r]);
        assert_eq!(f.replace_uses(a, &Operand::Arg(0)), 1);
        assert!(f.users().get(&a).is_none());
        assert_eq!(f.positions()[&r], 1);
    }

    #[test]
    fn test_detached_blocks_are_invisible() {
        let (mut f, _, _) = diamond();
        let loose = f.create_block("loose", BlockOrigin::Mutant(1));
        f.push_instruction(loose, Instruction::new(Op::Unreachable, Type::Void));
        assert!(!f.is_placed(loose));
        assert_eq!(f.iter_instructions().count(), 5);
    }
}
