//! Built-in optimisation passes.
//!
//! Every pass here is semantics preserving on its own; the combination run by
//! [`crate::compiler::PassScheduler::standard`] is what decides whether two
//! variants of a program are trivially equivalent.

mod algebraic;
mod branches;
mod constants;
mod deadcode;
mod globals;
mod merge;

pub use algebraic::AlgebraicSimplificationPass;
pub use branches::BranchSimplificationPass;
pub use constants::{fold_binary, fold_cmp, ConstantFoldingPass};
pub use deadcode::DeadCodeEliminationPass;
pub use globals::{GlobalConstantPass, GlobalDcePass};
pub use merge::BlockMergePass;
