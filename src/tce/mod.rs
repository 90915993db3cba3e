//! Equivalence reduction of encoded programs.
//!
//! Mutants that compile to the same program as the original, or as another
//! mutant, cannot be told apart by any test. [`EquivalenceReducer`] finds
//! them by optimising one pinned copy of the encoded program per selector
//! value and comparing the results with an [`EquivalenceOracle`].
//!
//! # Examples
//!
//! ```rust,ignore
//! use metamut::tce::{EquivalenceReducer, ReductionConfig};
//!
//! let mut run = mutator.generate(program)?;
//! let report = EquivalenceReducer::new(ReductionConfig::default())
//!     .reduce(&mut run.encoded, &mut run.mutants)?;
//! println!("{} -> {} mutants", report.pre, report.post);
//! ```

mod diff;
mod reducer;

pub use diff::{EquivalenceOracle, StructuralDiff};
pub use reducer::{extract_mutant, EquivalenceReducer, ReductionConfig, ReductionReport};
