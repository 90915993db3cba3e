//! Mutant generation and meta-variant encoding.
//!
//! This module turns a program into a *meta-variant*: a single program that
//! contains every mutant, with a global selector deciding at run time which
//! one executes. Selector value `k` runs mutant `k`; any value above the
//! highest ID runs the original code.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Mutator                                 │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  preprocess           demote variable phis, insert phi proxies   │
//! │       │                                                          │
//! │       ▼                                                          │
//! │  StatementExtractor   group instructions into statements         │
//! │       │                                                          │
//! │       ▼                                                          │
//! │  MutantGenerator      operators ─► fragments (detached blocks)   │
//! │       │                                                          │
//! │       ▼                                                          │
//! │  MetaEncoder          split, place fragments, switch on selector │
//! │       │                                                          │
//! │       ▼                                                          │
//! │  EncodedProgram + MutantInfoList + subject program               │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`weak::instrument`] derives the weak-mutation variant of an encoded
//! program.
//!
//! # Examples
//!
//! ```rust,ignore
//! use metamut::mutation::{Mutator, MutationConfig, OperatorConfig, OperatorRegistry};
//!
//! let rules = OperatorConfig::parse("ADD(A, B) --> AddToSub, SUB(A, B)")?;
//! let mutator = Mutator::new(MutationConfig::default(), OperatorRegistry::from_config(&rules));
//! let run = mutator.generate(program)?;
//!
//! println!("{} mutants", run.encoded.highest_id());
//! run.mutants.save("mutants.json")?;
//! ```

mod config;
mod encoder;
mod engine;
mod generator;
mod info;
mod operators;
mod preprocess;
mod session;
mod statement;
pub mod weak;

pub use config::{
    MutationConfig, DEFAULT_DEBUG_PREFIX, DEFAULT_RANGE_MARKER, DEFAULT_SELECTOR,
    DEFAULT_SYMBOLIC_FUNCTION, DEFAULT_WEAK_LOG,
};
pub use encoder::MetaEncoder;
pub(crate) use encoder::dispatch_sites;
pub use engine::{EncodedProgram, MutationRun, Mutator};
pub use generator::{Mutant, MutantGenerator};
pub use info::{MutantInfo, MutantInfoList};
pub use operators::{
    DeleteStatementOperator, ExpressionOperator, Fragment, FragmentBuilder, MatchHit, MatchSite,
    MatcherKind, MatcherSpec, MutantCandidate, MutantSpec, MutationOperator, OperatorConfig,
    OperatorMatch, OperatorRegistry, OperatorRule, ReplacerKind, ReplacerSpec, RuleOperand,
    DEFAULT_OPERATORS,
};
pub use preprocess::{demote_variable_phis, insert_phi_proxies};
pub use session::GenerationSession;
pub use statement::{Statement, StatementExtractor, StatementPortion};
