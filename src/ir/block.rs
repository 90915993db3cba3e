//! Basic blocks.

use std::fmt;

use crate::ir::InstrId;

/// Why a block exists.
///
/// Source blocks come from the subject program. Every other origin is created
/// by the mutation engine, and the reducer relies on [`BlockOrigin::Mutant`]
/// to find fragment blocks that lost their dispatch edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockOrigin {
    /// Part of the program as it was handed in.
    Source,
    /// Single-branch block inserted on an edge into a block with phis.
    Proxy,
    /// Isolated original computation of the statement with this ordinal.
    Original(usize),
    /// Code that followed the statement with this ordinal in its block.
    After(usize),
    /// Replacement fragment of the mutant with this ID.
    Mutant(u32),
}

impl fmt::Display for BlockOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockOrigin::Source => write!(f, "source"),
            BlockOrigin::Proxy => write!(f, "proxy"),
            BlockOrigin::Original(n) => write!(f, "original.stmt{n}"),
            BlockOrigin::After(n) => write!(f, "after.stmt{n}"),
            BlockOrigin::Mutant(id) => write!(f, "mutant{id}"),
        }
    }
}

/// A basic block: an ordered list of instruction handles ending in a terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    name: String,
    origin: BlockOrigin,
    instructions: Vec<InstrId>,
}

impl Block {
    /// Creates an empty block.
    #[must_use]
    pub fn new(name: impl Into<String>, origin: BlockOrigin) -> Self {
        Self {
            name: name.into(),
            origin,
            instructions: Vec::new(),
        }
    }

    /// Returns the block label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the block.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Returns why the block exists.
    #[must_use]
    pub fn origin(&self) -> BlockOrigin {
        self.origin
    }

    /// Changes the block origin.
    pub fn set_origin(&mut self, origin: BlockOrigin) {
        self.origin = origin;
    }

    /// Returns the instruction handles in order.
    #[must_use]
    pub fn instructions(&self) -> &[InstrId] {
        &self.instructions
    }

    /// Returns the instruction list for editing.
    pub fn instructions_mut(&mut self) -> &mut Vec<InstrId> {
        &mut self.instructions
    }

    /// Returns the number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns `true` if the block holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the last instruction, which is the terminator in a well-formed block.
    #[must_use]
    pub fn last(&self) -> Option<InstrId> {
        self.instructions.last().copied()
    }

    /// Returns the position of `id` in this block.
    #[must_use]
    pub fn position(&self, id: InstrId) -> Option<usize> {
        self.instructions.iter().position(|&i| i == id)
    }
}
