//! Constant folding pass.
//!
//! Evaluates operations whose operands are all constants:
//!
//! - arithmetic, bitwise and shift operations (wrapping at the type width)
//! - comparisons
//! - casts
//! - `select` with a constant condition (becomes a copy of the chosen operand)
//!
//! Operations with undefined results are left alone: division or remainder by
//! zero, signed overflow of `sdiv`/`srem`, and shifts by at least the width.

use crate::{
    compiler::{pass::ProgramPass, EventKind, EventLog},
    ir::{BinaryOp, CastOp, CmpPredicate, Constant, Function, Op, Operand, Type},
    Result,
};

/// Folds operations over constants.
pub struct ConstantFoldingPass;

impl Default for ConstantFoldingPass {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluates `lhs op rhs` at type `ty`.
///
/// # Returns
///
/// The folded constant, or `None` if the result is undefined.
#[must_use]
pub fn fold_binary(op: BinaryOp, ty: Type, lhs: Constant, rhs: Constant) -> Option<Constant> {
    let (a, b) = (lhs.value(), rhs.value());
    let (ua, ub) = (lhs.unsigned(), rhs.unsigned());
    let bits = u64::from(ty.bits());
    let min = ty.normalize(1i64.wrapping_shl(ty.bits().saturating_sub(1)));

    let value = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::SDiv | BinaryOp::SRem if b == 0 || (a == min && b == -1) => return None,
        BinaryOp::SDiv => a.wrapping_div(b),
        BinaryOp::SRem => a.wrapping_rem(b),
        BinaryOp::UDiv | BinaryOp::URem if ub == 0 => return None,
        BinaryOp::UDiv => (ua / ub) as i64,
        BinaryOp::URem => (ua % ub) as i64,
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::Shl | BinaryOp::LShr | BinaryOp::AShr if ub >= bits => return None,
        BinaryOp::Shl => a.wrapping_shl(ub as u32),
        BinaryOp::LShr => (ua >> ub) as i64,
        BinaryOp::AShr => a >> ub,
    };
    Some(Constant::new(ty, value))
}

/// Evaluates `lhs pred rhs`.
#[must_use]
pub fn fold_cmp(pred: CmpPredicate, lhs: Constant, rhs: Constant) -> bool {
    let (a, b) = (lhs.value(), rhs.value());
    let (ua, ub) = (lhs.unsigned(), rhs.unsigned());
    match pred {
        CmpPredicate::Eq => a == b,
        CmpPredicate::Ne => a != b,
        CmpPredicate::Sgt => a > b,
        CmpPredicate::Sge => a >= b,
        CmpPredicate::Slt => a < b,
        CmpPredicate::Sle => a <= b,
        CmpPredicate::Ugt => ua > ub,
        CmpPredicate::Uge => ua >= ub,
        CmpPredicate::Ult => ua < ub,
        CmpPredicate::Ule => ua <= ub,
    }
}

impl ConstantFoldingPass {
    /// Creates a new constant folding pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns the value an instruction folds to, if any.
    fn fold(op: &Op, ty: Type) -> Option<Operand> {
        match op {
            Op::Binary { op, lhs, rhs } => {
                fold_binary(*op, ty, lhs.as_const()?, rhs.as_const()?).map(Operand::Const)
            }
            Op::Cmp { pred, lhs, rhs } => Some(Operand::Const(Constant::bool(fold_cmp(
                *pred,
                lhs.as_const()?,
                rhs.as_const()?,
            )))),
            Op::Cast { op, value } => {
                let c = value.as_const()?;
                let raw = match op {
                    CastOp::ZExt => c.unsigned() as i64,
                    CastOp::SExt | CastOp::Trunc => c.value(),
                };
                Some(Operand::Const(Constant::new(ty, raw)))
            }
            Op::Select {
                cond,
                on_true,
                on_false,
            } => {
                let c = cond.as_const()?;
                Some(if c.is_zero() {
                    on_false.clone()
                } else {
                    on_true.clone()
                })
            }
            _ => None,
        }
    }
}

impl ProgramPass for ConstantFoldingPass {
    fn name(&self) -> &'static str {
        "constant-folding"
    }

    fn description(&self) -> &'static str {
        "Evaluates operations whose operands are all constants"
    }

    fn run_on_function(&self, function: &mut Function, events: &mut EventLog) -> Result<bool> {
        let candidates: Vec<_> = function
            .iter_instructions()
            .filter_map(|(block, _, id)| {
                let instr = function.instruction(id);
                Self::fold(instr.op(), instr.ty()).map(|value| (block, id, value))
            })
            .collect();

        for (block, id, value) in &candidates {
            let mnemonic = function.instruction(*id).op().mnemonic();
            function.replace_uses(*id, value);
            function.remove_instruction(*block, *id);
            events
                .record(EventKind::ConstantFolded)
                .at(function.name(), id.index())
                .message(format!("{mnemonic} folded"));
        }
        Ok(!candidates.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FunctionBuilder;

    #[test]
    fn test_fold_binary_wraps() {
        let c = |v| Constant::new(Type::I8, v);
        assert_eq!(
            fold_binary(BinaryOp::Add, Type::I8, c(127), c(1)).unwrap().value(),
            -128
        );
        assert_eq!(
            fold_binary(BinaryOp::LShr, Type::I8, c(-1), c(4)).unwrap().value(),
            15
        );
        assert!(fold_binary(BinaryOp::SDiv, Type::I8, c(-128), c(-1)).is_none());
        assert!(fold_binary(BinaryOp::URem, Type::I8, c(3), c(0)).is_none());
        assert!(fold_binary(BinaryOp::Shl, Type::I8, c(1), c(8)).is_none());
    }

    #[test]
    fn test_fold_cmp_unsigned() {
        let a = Constant::i32(-1);
        let b = Constant::i32(1);
        assert!(fold_cmp(CmpPredicate::Ugt, a, b));
        assert!(fold_cmp(CmpPredicate::Slt, a, b));
    }

    #[test]
    fn test_pass_folds_chain() {
        let mut b = FunctionBuilder::new("f", vec![], Type::I32);
        b.block("entry");
        let x = b.binary(
            BinaryOp::Mul,
            Operand::Const(Constant::i32(6)),
            Operand::Const(Constant::i32(7)),
        );
        b.ret(Some(x));
        let mut f = b.finish();
        let mut events = EventLog::new();
        assert!(ConstantFoldingPass::new()
            .run_on_function(&mut f, &mut events)
            .unwrap());
        let entry = f.entry().unwrap();
        let ret = f.terminator(entry).unwrap();
        assert_eq!(
            f.instruction(ret).op(),
            &Op::Ret {
                value: Some(Operand::Const(Constant::i32(42)))
            }
        );
    }
}
