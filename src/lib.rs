// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]

//! # metamut
//!
//! Meta-mutant generation, equivalence reduction and dependence-based mutant
//! selection over a compact SSA intermediate representation.
//!
//! Mutation testing measures a test suite by how many small semantic changes
//! ("mutants") of a program it detects. Building and running one program per
//! mutant does not scale, so `metamut` packs every mutant into a single
//! *meta-variant*: at each mutated statement a load of one global selector
//! picks, at run time, either the original code or one of the mutants.
//!
//! ## Features
//!
//! - **Statement discovery** - Groups instructions into atomic statements,
//!   including statements spanning several blocks and phi-headed statements
//! - **Rule-driven operators** - Arithmetic, logical, relational and
//!   statement-deletion operators from a small line-oriented rule language
//! - **Meta-variant encoding** - One switch per mutated statement, verified
//!   before the program is handed back
//! - **Trivial compiler equivalence** - Optimises one pinned copy per mutant
//!   and collapses mutants with identical results
//! - **Dependence-based selection** - Greedy spreading over a mutant
//!   dependence graph, plus random and statement-deletion-only sampling
//! - **Weak mutation** - Instrumented variants that report whether a mutant
//!   changes the state right after its statement
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use metamut::prelude::*;
//!
//! let mut b = FunctionBuilder::new("main", vec![Type::I32, Type::Ptr], Type::Void);
//! b.block("entry");
//! let sum = b.binary(BinaryOp::Add, Operand::Arg(0), Operand::Arg(0));
//! b.store(sum, Operand::Arg(1));
//! b.ret(None);
//! let mut program = Program::new("demo");
//! program.add_function(b.finish());
//!
//! let rules = OperatorConfig::parse("ADD(A, B) --> AddToSub, SUB(A, B)")?;
//! let mutator = Mutator::new(MutationConfig::default(), OperatorRegistry::from_config(&rules));
//! let mut run = mutator.generate(program)?;
//!
//! let report = EquivalenceReducer::default().reduce(&mut run.encoded, &mut run.mutants)?;
//! println!("{} mutants before TCE, {} after", report.pre, report.post);
//! # Ok::<(), metamut::Error>(())
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────────────────────┐   ┌───────────┐   ┌─────────────┐
//! │    ir      │──►│          mutation            │──►│    tce    │──►│  selection  │
//! │ Program    │   │ extract ► generate ► encode  │   │ pin, opt, │   │ dependence  │
//! │ Function   │   │ EncodedProgram               │   │ compare   │   │ graph,      │
//! │ verifier   │   │ MutantInfoList               │   │ renumber  │   │ sampling    │
//! └────────────┘   └──────────────────────────────┘   └─────┬─────┘   └─────────────┘
//!                                                           │
//!                                                     ┌─────┴─────┐
//!                                                     │ compiler  │
//!                                                     │ passes    │
//!                                                     └───────────┘
//! ```
//!
//! - [`ir`] - The program model, builder, printer and well-formedness checks
//! - [`compiler`] - The optimisation passes and their fixpoint scheduler
//! - [`mutation`] - Statement extraction, operators, generation, encoding
//! - [`tce`] - Equivalence reduction and single-mutant extraction
//! - [`selection`] - Mutant dependence graph and selection strategies
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result`]. Errors for which
//! [`Error::is_internal`] is `true` mean the engine produced a broken
//! program; such a program is never returned.
//!
//! ```rust,no_run
//! use metamut::{mutation::OperatorConfig, Error};
//!
//! match OperatorConfig::parse("ADD(A, B) --> Broken") {
//!     Ok(_) => println!("parsed"),
//!     Err(Error::Config { line, message }) => println!("line {line}: {message}"),
//!     Err(e) => println!("other error: {e}"),
//! }
//! ```
//!
//! ## Logging
//!
//! Stage summaries are logged through the [`log`] facade at `info`, per
//! statement detail at `debug` and skipped candidates at `warn`. No logger is
//! installed by the library.

#[macro_use]
pub(crate) mod error;

/// The intermediate representation mutants are generated over.
///
/// Functions own their blocks and instructions in arenas addressed by
/// [`ir::BlockId`] and [`ir::InstrId`]; use lists are derived on demand.
pub mod ir;

/// Optimisation passes used to decide trivial equivalence.
pub mod compiler;

/// Mutant generation and meta-variant encoding.
pub mod mutation;

/// Trivial compiler equivalence.
pub mod tce;

/// Dependence-based mutant selection.
pub mod selection;

/// Convenient re-exports of the most commonly used types and traits.
///
/// ```rust,no_run
/// use metamut::prelude::*;
///
/// let mutator = Mutator::with_defaults()?;
/// println!("{} operators", mutator.registry().len());
/// # Ok::<(), metamut::Error>(())
/// ```
pub mod prelude;

/// A type alias for [`std::result::Result<T, Error>`] where the error type
/// defaults to [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// `metamut` Error type
///
/// Every fallible operation of the crate reports one of its variants.
pub use error::Error;
