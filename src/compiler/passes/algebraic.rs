//! Algebraic simplifications pass.
//!
//! This pass transforms algebraic identities into simpler forms:
//!
//! ## Self-canceling operations
//! - `x xor x` → `0`
//! - `x sub x` → `0`
//!
//! ## Idempotent operations
//! - `x or x` → `x`
//! - `x and x` → `x`
//!
//! ## Identity operations (with constant 0)
//! - `x add 0` / `0 add x` → `x`
//! - `x sub 0` → `x`
//! - `x xor 0` / `x or 0` → `x`
//! - `x shl 0` / `x lshr 0` / `x ashr 0` → `x`
//!
//! ## Absorbing operations (with constant 0)
//! - `x mul 0` / `x and 0` → `0`
//!
//! ## Identity operations (with constant 1)
//! - `x mul 1` / `x sdiv 1` / `x udiv 1` → `x`
//! - `x srem 1` / `x urem 1` → `0`
//!
//! ## All-bits-set identity (with constant -1)
//! - `x and -1` → `x`
//! - `x or -1` → `-1`
//!
//! ## Reflexive comparisons
//! - `x eq x`, `x sge x`, ... → `true`; `x ne x`, `x slt x`, ... → `false`
//!
//! ## Canonical operand order
//! Commutative operations and comparisons get their operands sorted by
//! [`Operand::rank`] (comparisons swap their predicate accordingly), so
//! `b * a` and `a * b` end up textually identical. Mutants that only swap the
//! operands of a commutative operator are thereby recognised as equivalent.

use crate::{
    compiler::{pass::ProgramPass, EventKind, EventLog},
    ir::{BinaryOp, BlockId, CmpPredicate, Constant, Function, InstrId, Op, Operand, Type},
    Result,
};

/// Algebraic simplifications pass that transforms redundant operations.
///
/// This pass identifies patterns like `x xor x`, `x or x`, and operations
/// with identity elements (0 for add/xor/or, 1 for mul) and simplifies them.
pub struct AlgebraicSimplificationPass;

impl Default for AlgebraicSimplificationPass {
    fn default() -> Self {
        Self::new()
    }
}

/// The type of simplification applied.
#[derive(Debug, Clone)]
enum Simplification {
    /// Replace with a constant value
    Constant(Constant),
    /// Replace with another operand
    Copy(Operand),
    /// Keep the instruction but rewrite it into canonical form
    Canonicalize(Op),
}

/// Information about a simplification candidate.
#[derive(Debug)]
struct SimplificationCandidate {
    /// Block holding the instruction
    block: BlockId,
    /// The instruction
    id: InstrId,
    /// The simplification to apply
    simplification: Simplification,
    /// Description for logging
    description: &'static str,
}

impl AlgebraicSimplificationPass {
    /// Creates a new algebraic simplification pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Identifies simplification candidates in the function.
    fn find_candidates(function: &Function) -> Vec<SimplificationCandidate> {
        function
            .iter_instructions()
            .filter_map(|(block, _, id)| {
                let instr = function.instruction(id);
                Self::check_simplification(instr.op(), instr.ty()).map(
                    |(simplification, description)| SimplificationCandidate {
                        block,
                        id,
                        simplification,
                        description,
                    },
                )
            })
            .collect()
    }

    /// Checks if an operation can be algebraically simplified.
    fn check_simplification(op: &Op, ty: Type) -> Option<(Simplification, &'static str)> {
        match op {
            Op::Binary { op, lhs, rhs } => Self::check_binary(*op, ty, lhs, rhs),
            Op::Cmp { pred, lhs, rhs } => {
                if lhs == rhs {
                    let result = matches!(
                        pred,
                        CmpPredicate::Eq
                            | CmpPredicate::Sge
                            | CmpPredicate::Sle
                            | CmpPredicate::Uge
                            | CmpPredicate::Ule
                    );
                    return Some((
                        Simplification::Constant(Constant::bool(result)),
                        "reflexive compare → const",
                    ));
                }
                if lhs.rank() > rhs.rank() {
                    return Some((
                        Simplification::Canonicalize(Op::Cmp {
                            pred: pred.swapped(),
                            lhs: rhs.clone(),
                            rhs: lhs.clone(),
                        }),
                        "compare operands swapped",
                    ));
                }
                None
            }
            Op::Select {
                on_true, on_false, ..
            } if on_true == on_false => {
                Some((Simplification::Copy(on_true.clone()), "select → copy"))
            }
            _ => None,
        }
    }

    fn check_binary(
        op: BinaryOp,
        ty: Type,
        lhs: &Operand,
        rhs: &Operand,
    ) -> Option<(Simplification, &'static str)> {
        let zero = Constant::new(ty, 0);
        let to_const = |c: Constant| Some((Simplification::Constant(c), "algebraic → const"));
        let to_copy = |o: &Operand| Some((Simplification::Copy(o.clone()), "algebraic → copy"));

        if lhs == rhs {
            match op {
                BinaryOp::Xor | BinaryOp::Sub => return to_const(zero),
                BinaryOp::Or | BinaryOp::And => return to_copy(lhs),
                _ => {}
            }
        }

        // Constants sit on the right after canonicalisation, except for the
        // non-commutative ops where the left side matters.
        if let Some(c) = rhs.as_const() {
            match op {
                BinaryOp::Add
                | BinaryOp::Sub
                | BinaryOp::Xor
                | BinaryOp::Or
                | BinaryOp::Shl
                | BinaryOp::LShr
                | BinaryOp::AShr
                    if c.is_zero() =>
                {
                    return to_copy(lhs)
                }
                BinaryOp::Mul | BinaryOp::And if c.is_zero() => return to_const(zero),
                BinaryOp::Mul | BinaryOp::SDiv | BinaryOp::UDiv if c.value() == 1 => {
                    return to_copy(lhs)
                }
                BinaryOp::SRem | BinaryOp::URem if c.value() == 1 => return to_const(zero),
                BinaryOp::And if c.is_all_ones() => return to_copy(lhs),
                BinaryOp::Or if c.is_all_ones() => return to_const(c),
                _ => {}
            }
        }

        if op.is_commutative() && lhs.rank() > rhs.rank() {
            return Some((
                Simplification::Canonicalize(Op::Binary {
                    op,
                    lhs: rhs.clone(),
                    rhs: lhs.clone(),
                }),
                "commutative operands swapped",
            ));
        }
        None
    }

    /// Applies the simplifications to the function.
    fn apply_simplifications(
        function: &mut Function,
        candidates: Vec<SimplificationCandidate>,
        events: &mut EventLog,
    ) {
        for candidate in candidates {
            let kind = match candidate.simplification {
                Simplification::Constant(value) => {
                    function.replace_uses(candidate.id, &Operand::Const(value));
                    function.remove_instruction(candidate.block, candidate.id);
                    EventKind::AlgebraicSimplified
                }
                Simplification::Copy(operand) => {
                    function.replace_uses(candidate.id, &operand);
                    function.remove_instruction(candidate.block, candidate.id);
                    EventKind::AlgebraicSimplified
                }
                Simplification::Canonicalize(op) => {
                    function.instruction_mut(candidate.id).set_op(op);
                    EventKind::OperandsCanonicalized
                }
            };
            events
                .record(kind)
                .at(function.name(), candidate.id.index())
                .message(candidate.description);
        }
    }
}

impl ProgramPass for AlgebraicSimplificationPass {
    fn name(&self) -> &'static str {
        "algebraic-simplification"
    }

    fn description(&self) -> &'static str {
        "Simplify algebraic identities (x xor x = 0, x or x = x, etc.)"
    }

    fn run_on_function(&self, function: &mut Function, events: &mut EventLog) -> Result<bool> {
        let candidates = Self::find_candidates(function);
        let changed = !candidates.is_empty();
        Self::apply_simplifications(function, candidates, events);
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_div_by_one() {
        let op = Op::Binary {
            op: BinaryOp::SDiv,
            lhs: Operand::Arg(0),
            rhs: Operand::Const(Constant::i32(1)),
        };
        let (simplification, _) =
            AlgebraicSimplificationPass::check_simplification(&op, Type::I32).unwrap();
        assert!(matches!(simplification, Simplification::Copy(Operand::Arg(0))));
    }

    #[test]
    fn test_rem_by_one() {
        let op = Op::Binary {
            op: BinaryOp::URem,
            lhs: Operand::Arg(0),
            rhs: Operand::Const(Constant::i32(1)),
        };
        let (simplification, _) =
            AlgebraicSimplificationPass::check_simplification(&op, Type::I32).unwrap();
        assert!(matches!(simplification, Simplification::Constant(c) if c.is_zero()));
    }

    #[test]
    fn test_eq_same_operand() {
        let op = Op::Cmp {
            pred: CmpPredicate::Eq,
            lhs: Operand::Arg(1),
            rhs: Operand::Arg(1),
        };
        let (simplification, _) =
            AlgebraicSimplificationPass::check_simplification(&op, Type::I1).unwrap();
        assert!(matches!(simplification, Simplification::Constant(c) if !c.is_zero()));
    }

    #[test]
    fn test_slt_same_operand() {
        let op = Op::Cmp {
            pred: CmpPredicate::Slt,
            lhs: Operand::Arg(1),
            rhs: Operand::Arg(1),
        };
        let (simplification, _) =
            AlgebraicSimplificationPass::check_simplification(&op, Type::I1).unwrap();
        assert!(matches!(simplification, Simplification::Constant(c) if c.is_zero()));
    }

    #[test]
    fn test_commutative_swap() {
        let op = Op::Binary {
            op: BinaryOp::Mul,
            lhs: Operand::Arg(1),
            rhs: Operand::Arg(0),
        };
        let (simplification, _) =
            AlgebraicSimplificationPass::check_simplification(&op, Type::I32).unwrap();
        match simplification {
            Simplification::Canonicalize(Op::Binary { lhs, rhs, .. }) => {
                assert_eq!(lhs, Operand::Arg(0));
                assert_eq!(rhs, Operand::Arg(1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_compare_swap_flips_predicate() {
        let op = Op::Cmp {
            pred: CmpPredicate::Sgt,
            lhs: Operand::Const(Constant::i32(3)),
            rhs: Operand::Arg(0),
        };
        let (simplification, _) =
            AlgebraicSimplificationPass::check_simplification(&op, Type::I1).unwrap();
        assert!(matches!(
            simplification,
            Simplification::Canonicalize(Op::Cmp {
                pred: CmpPredicate::Slt,
                ..
            })
        ));
    }

    #[test]
    fn test_sub_not_swapped() {
        let op = Op::Binary {
            op: BinaryOp::Sub,
            lhs: Operand::Arg(1),
            rhs: Operand::Arg(0),
        };
        assert!(AlgebraicSimplificationPass::check_simplification(&op, Type::I32).is_none());
    }
}
