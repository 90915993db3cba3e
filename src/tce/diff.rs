//! Structural equivalence of programs.

use crate::ir::{canonical_text, Program};

/// Decides whether two programs are distinct.
///
/// The reducer keeps one digest per equivalence class instead of a whole
/// program, so the comparison is split into digesting a program and
/// comparing two digests.
pub trait EquivalenceOracle {
    /// What a program is reduced to for comparison.
    type Digest;

    /// Reduces `program` to its digest.
    fn digest(&self, program: &Program) -> Self::Digest;

    /// Compares two digests.
    ///
    /// # Returns
    ///
    /// `Some(true)` if the programs are distinct, `Some(false)` if they are
    /// proven identical and `None` if the comparison was inconclusive.
    fn are_distinct(&self, a: &Self::Digest, b: &Self::Digest) -> Option<bool>;

    /// Digests and compares two programs.
    fn are_programs_distinct(&self, a: &Program, b: &Program) -> Option<bool> {
        self.are_distinct(&self.digest(a), &self.digest(b))
    }
}

/// Compares the canonical text of programs.
///
/// The canonical rendering numbers blocks and values by position, so two
/// programs are identical exactly when their renderings are byte-equal.
/// An empty rendering means printing failed and compares as inconclusive.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralDiff;

impl StructuralDiff {
    /// Creates the oracle.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl EquivalenceOracle for StructuralDiff {
    type Digest = String;

    fn digest(&self, program: &Program) -> String {
        canonical_text(program)
    }

    fn are_distinct(&self, a: &String, b: &String) -> Option<bool> {
        if a.is_empty() || b.is_empty() {
            return None;
        }
        Some(a != b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, FunctionBuilder, Operand, Type};

    fn program(op: BinaryOp, value_name: &str) -> Program {
        let mut b = FunctionBuilder::new("f", vec![Type::I32, Type::I32], Type::I32);
        b.block("entry");
        let x = b.binary(op, Operand::Arg(0), Operand::Arg(1));
        b.ret(Some(x));
        let mut function = b.finish();
        let first = function.iter_instructions().next();
        if let Some((_, _, id)) = first {
            function
                .instruction_mut(id)
                .set_name(Some(value_name.to_string()));
        }
        let mut program = Program::new("p");
        program.add_function(function);
        program
    }

    #[test]
    fn test_names_do_not_matter() {
        let diff = StructuralDiff::new();
        assert_eq!(
            diff.are_programs_distinct(&program(BinaryOp::Add, "x"), &program(BinaryOp::Add, "y")),
            Some(false)
        );
    }

    #[test]
    fn test_operations_matter() {
        let diff = StructuralDiff::new();
        assert_eq!(
            diff.are_programs_distinct(&program(BinaryOp::Add, "x"), &program(BinaryOp::Sub, "x")),
            Some(true)
        );
    }

    #[test]
    fn test_empty_digest_is_inconclusive() {
        let diff = StructuralDiff::new();
        assert_eq!(diff.are_distinct(&String::new(), &"x".to_string()), None);
    }
}
