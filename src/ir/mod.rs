//! The program representation the mutation engine rewrites.
//!
//! This is a small SSA-style IR in the spirit of LLVM's: functions made of
//! basic blocks, blocks made of instructions, values flowing through explicit
//! operands, merge points expressed as phis and memory accessed through stack
//! slots and globals.
//!
//! # Architecture
//!
//! - [`Program`] owns [`Global`]s and [`Function`]s.
//! - [`Function`] owns arenas of [`Block`]s and [`Instruction`]s and an ordered
//!   layout of placed blocks; all cross references are [`BlockId`] / [`InstrId`]
//!   handles into those arenas.
//! - [`FunctionBuilder`] builds functions incrementally.
//! - [`DominatorTree`] and [`verify_function`] / [`verify_program`] check
//!   well-formedness.
//! - [`canonical_text`] renders a name-insensitive form used for equivalence.

mod block;
mod builder;
mod dominators;
mod function;
mod instruction;
mod ops;
mod printer;
mod program;
mod types;
mod verify;

pub use block::{Block, BlockOrigin};
pub use builder::FunctionBuilder;
pub use dominators::DominatorTree;
pub use function::{Function, FunctionAttributes};
pub use instruction::Instruction;
pub use ops::{BinaryOp, BlockId, CastOp, CmpPredicate, InstrId, Op, Operand};
pub use printer::{canonical_function_text, canonical_text};
pub use program::{Global, Program};
pub use types::{Constant, Type};
pub use verify::{verify_function, verify_program};
