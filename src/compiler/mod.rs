//! Optimisation infrastructure used for equivalence reduction.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      Optimisation Pipeline                       │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  PassScheduler               Fixpoint execution                  │
//! │    ├─ global passes           (see the whole program)            │
//! │    └─ per-function passes     (skip declarations)                │
//! │    Each iteration: run every pass once, repeat until stable      │
//! │                                                                  │
//! │  ProgramPass trait           Interface for all passes            │
//! │    ├─ run_on_function()       Per-function transformation        │
//! │    └─ run_global()            Whole-program transformation       │
//! │                                                                  │
//! │  Passes (7 built-in)                                             │
//! │    ├─ Value: global constants, constant folding, algebraic       │
//! │    ├─ CFG: branch simplification, block merging                  │
//! │    └─ Cleanup: DCE, global DCE                                   │
//! │                                                                  │
//! │  EventLog                    Change tracking and diagnostics     │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

mod events;
mod pass;
mod passes;
mod scheduler;

pub use events::{Event, EventBuilder, EventKind, EventLog};
pub use pass::ProgramPass;
pub use passes::{
    fold_binary, fold_cmp, AlgebraicSimplificationPass, BlockMergePass, BranchSimplificationPass,
    ConstantFoldingPass, DeadCodeEliminationPass, GlobalConstantPass, GlobalDcePass,
};
pub use scheduler::PassScheduler;
