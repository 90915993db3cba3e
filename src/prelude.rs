//! # metamut Prelude
//!
//! This module provides a convenient prelude for the most commonly used types
//! and traits of the library. Import it to get the whole pipeline from
//! building a program to selecting mutants in one line.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all metamut operations
pub use crate::Error;

/// The result type used throughout metamut
pub use crate::Result;

// ================================================================================================
// Intermediate Representation
// ================================================================================================

/// Programs, functions and the builder used to assemble them
pub use crate::ir::{Function, FunctionBuilder, Global, Program};

/// Instructions, operands and types
pub use crate::ir::{BinaryOp, CmpPredicate, Constant, Instruction, Op, Operand, Type};

/// Well-formedness checks
pub use crate::ir::{verify_function, verify_program};

// ================================================================================================
// Mutation
// ================================================================================================

/// Whole-program generation and its results
pub use crate::mutation::{EncodedProgram, MutationConfig, MutationRun, Mutator};

/// Operator rules and their registry
pub use crate::mutation::{MutationOperator, OperatorConfig, OperatorRegistry};

/// Mutant metadata
pub use crate::mutation::{MutantInfo, MutantInfoList};

// ================================================================================================
// Equivalence Reduction
// ================================================================================================

/// Trivial compiler equivalence
pub use crate::tce::{
    extract_mutant, EquivalenceOracle, EquivalenceReducer, ReductionConfig, ReductionReport,
    StructuralDiff,
};

// ================================================================================================
// Selection
// ================================================================================================

/// Dependence graph and selection strategies
pub use crate::selection::{
    DefUseDependence, DependenceSource, MutantDependenceGraph, MutantSelection, SelectionConfig,
};
