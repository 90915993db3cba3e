//! Dependence-based mutant selection.
//!
//! Selection works on mutant metadata alone, so it can run from stored
//! artifacts without the encoded program.
//!
//! # Architecture
//!
//! ```text
//! DependenceSource ──┐
//!  (DefUseDependence,│
//!   StaticDependence)├─► MutantDependenceGraph ──► MutantSelection
//! MutantInfoList ────┘      save / load (JSON)      ├─ smart_select
//!                                                    ├─ random_mutants
//!                                                    └─ random_sdl_mutants
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use metamut::selection::{
//!     DefUseDependence, MutantDependenceGraph, MutantSelection, SelectionConfig,
//! };
//!
//! let source = DefUseDependence::new(&run.subject);
//! let graph = MutantDependenceGraph::build(&source, &run.mutants);
//! graph.save("depends.json")?;
//!
//! let selection = MutantSelection::new(&run.mutants, &graph, SelectionConfig::default())?;
//! let picked = selection.smart_select();
//! ```

mod config;
mod graph;
mod selector;
mod source;

pub use config::SelectionConfig;
pub use graph::{MutantDependenceGraph, MutantDepends};
pub use selector::{MutantSelection, RandomSelection};
pub use source::{DefUseDependence, DependenceSource, IrValue, StaticDependence};
