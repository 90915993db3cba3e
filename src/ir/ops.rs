//! Operations, operands and the handles that tie them to a function.
//!
//! Every instruction carries one [`Op`]. Ops refer to other values through
//! [`Operand`] and to blocks through [`BlockId`]; neither is an owning link.
//! The owning structure is the function's arena, see [`crate::ir::Function`].

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::ir::{Constant, Type};

/// Handle of an instruction inside its function's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstrId(pub(crate) usize);

impl InstrId {
    /// Returns the raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Handle of a basic block inside its function's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub(crate) usize);

impl BlockId {
    /// Returns the raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bb{}", self.0)
    }
}

/// A value an instruction reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /// The result of another instruction of the same function.
    Value(InstrId),
    /// A function parameter by index.
    Arg(usize),
    /// An immediate constant.
    Const(Constant),
    /// The address of a program global, by name.
    Global(String),
    /// The address of a function, by name.
    Function(String),
}

impl Operand {
    /// Returns the instruction this operand reads, if any.
    #[must_use]
    pub fn as_value(&self) -> Option<InstrId> {
        match self {
            Operand::Value(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the constant this operand holds, if any.
    #[must_use]
    pub fn as_const(&self) -> Option<Constant> {
        match self {
            Operand::Const(c) => Some(*c),
            _ => None,
        }
    }

    /// Ordering key used to put commutative operands into a canonical order.
    ///
    /// Arguments sort first, then instruction results, then addresses, then
    /// constants; ties keep their relative order.
    #[must_use]
    pub fn rank(&self) -> (u8, usize) {
        match self {
            Operand::Arg(i) => (0, *i),
            Operand::Value(id) => (1, id.0),
            Operand::Global(_) => (2, 0),
            Operand::Function(_) => (3, 0),
            Operand::Const(_) => (4, 0),
        }
    }
}

impl From<InstrId> for Operand {
    fn from(id: InstrId) -> Self {
        Operand::Value(id)
    }
}

impl From<Constant> for Operand {
    fn from(c: Constant) -> Self {
        Operand::Const(c)
    }
}

/// Two-operand integer arithmetic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum BinaryOp {
    /// Wrapping addition.
    Add,
    /// Wrapping subtraction.
    Sub,
    /// Wrapping multiplication.
    Mul,
    /// Signed division.
    SDiv,
    /// Unsigned division.
    UDiv,
    /// Signed remainder.
    SRem,
    /// Unsigned remainder.
    URem,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Bitwise exclusive or.
    Xor,
    /// Shift left.
    Shl,
    /// Logical shift right.
    LShr,
    /// Arithmetic shift right.
    AShr,
}

impl BinaryOp {
    /// Returns `true` if `a op b == b op a`.
    #[must_use]
    pub const fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Mul | BinaryOp::And | BinaryOp::Or | BinaryOp::Xor
        )
    }

    /// Returns `true` if the operation traps on some inputs (division by zero).
    #[must_use]
    pub const fn may_trap(self) -> bool {
        matches!(
            self,
            BinaryOp::SDiv | BinaryOp::UDiv | BinaryOp::SRem | BinaryOp::URem
        )
    }
}

/// Integer comparison predicates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum CmpPredicate {
    /// Equal.
    Eq,
    /// Not equal.
    Ne,
    /// Signed greater than.
    Sgt,
    /// Signed greater or equal.
    Sge,
    /// Signed less than.
    Slt,
    /// Signed less or equal.
    Sle,
    /// Unsigned greater than.
    Ugt,
    /// Unsigned greater or equal.
    Uge,
    /// Unsigned less than.
    Ult,
    /// Unsigned less or equal.
    Ule,
}

impl CmpPredicate {
    /// Returns the predicate that gives the same result with swapped operands.
    #[must_use]
    pub const fn swapped(self) -> Self {
        match self {
            CmpPredicate::Eq => CmpPredicate::Eq,
            CmpPredicate::Ne => CmpPredicate::Ne,
            CmpPredicate::Sgt => CmpPredicate::Slt,
            CmpPredicate::Sge => CmpPredicate::Sle,
            CmpPredicate::Slt => CmpPredicate::Sgt,
            CmpPredicate::Sle => CmpPredicate::Sge,
            CmpPredicate::Ugt => CmpPredicate::Ult,
            CmpPredicate::Uge => CmpPredicate::Ule,
            CmpPredicate::Ult => CmpPredicate::Ugt,
            CmpPredicate::Ule => CmpPredicate::Uge,
        }
    }
}

/// Integer width conversions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum CastOp {
    /// Zero extension.
    ZExt,
    /// Sign extension.
    SExt,
    /// Truncation.
    Trunc,
}

/// The operation an instruction performs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Op {
    /// Reserves a stack slot of the given type.
    Alloca {
        /// Type stored in the slot
        ty: Type,
    },
    /// Reads memory. The loaded type is the instruction's type.
    Load {
        /// Address to read
        ptr: Operand,
    },
    /// Writes memory.
    Store {
        /// Value to write
        value: Operand,
        /// Address to write to
        ptr: Operand,
    },
    /// Integer arithmetic.
    Binary {
        /// The operation
        op: BinaryOp,
        /// Left operand
        lhs: Operand,
        /// Right operand
        rhs: Operand,
    },
    /// Integer comparison producing `i1`.
    Cmp {
        /// The predicate
        pred: CmpPredicate,
        /// Left operand
        lhs: Operand,
        /// Right operand
        rhs: Operand,
    },
    /// `cond ? on_true : on_false`.
    Select {
        /// `i1` condition
        cond: Operand,
        /// Value when the condition holds
        on_true: Operand,
        /// Value otherwise
        on_false: Operand,
    },
    /// Width conversion to the instruction's type.
    Cast {
        /// The conversion
        op: CastOp,
        /// Value to convert
        value: Operand,
    },
    /// Direct call by function name.
    Call {
        /// Callee name
        callee: String,
        /// Arguments in order
        args: Vec<Operand>,
    },
    /// Merge of values flowing in from predecessor blocks.
    Phi {
        /// One entry per predecessor
        incoming: Vec<(BlockId, Operand)>,
    },
    /// Unconditional branch.
    Br {
        /// Branch target
        target: BlockId,
    },
    /// Two-way branch on an `i1`.
    CondBr {
        /// Condition
        cond: Operand,
        /// Target when true
        on_true: BlockId,
        /// Target when false
        on_false: BlockId,
    },
    /// Multi-way branch.
    Switch {
        /// Scrutinee
        value: Operand,
        /// Target when no case matches
        default: BlockId,
        /// `(case value, target)` pairs
        cases: Vec<(i64, BlockId)>,
    },
    /// Function return.
    Ret {
        /// Returned value, if the function is not `void`
        value: Option<Operand>,
    },
    /// Marks a point control never reaches.
    Unreachable,
}

impl Op {
    /// Returns `true` for block terminators.
    #[must_use]
    pub const fn is_terminator(&self) -> bool {
        matches!(
            self,
            Op::Br { .. } | Op::CondBr { .. } | Op::Switch { .. } | Op::Ret { .. } | Op::Unreachable
        )
    }

    /// Returns `true` for phi nodes.
    #[must_use]
    pub const fn is_phi(&self) -> bool {
        matches!(self, Op::Phi { .. })
    }

    /// Returns `true` for stack allocations.
    #[must_use]
    pub const fn is_alloca(&self) -> bool {
        matches!(self, Op::Alloca { .. })
    }

    /// Returns `true` if removing an unused instance of this op cannot change
    /// observable behaviour.
    #[must_use]
    pub fn is_pure(&self) -> bool {
        match self {
            Op::Alloca { .. }
            | Op::Load { .. }
            | Op::Cmp { .. }
            | Op::Select { .. }
            | Op::Cast { .. }
            | Op::Phi { .. } => true,
            Op::Binary { op, .. } => !op.may_trap(),
            _ => false,
        }
    }

    /// Returns `true` if the op may fault at run time.
    #[must_use]
    pub fn may_trap(&self) -> bool {
        match self {
            Op::Binary { op, .. } => op.may_trap(),
            Op::Load { .. } | Op::Store { .. } | Op::Call { .. } | Op::Unreachable => true,
            _ => false,
        }
    }

    /// Short mnemonic, used for printing and event messages.
    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        match self {
            Op::Alloca { .. } => "alloca",
            Op::Load { .. } => "load",
            Op::Store { .. } => "store",
            Op::Binary { op, .. } => (*op).into(),
            Op::Cmp { .. } => "icmp",
            Op::Select { .. } => "select",
            Op::Cast { op, .. } => (*op).into(),
            Op::Call { .. } => "call",
            Op::Phi { .. } => "phi",
            Op::Br { .. } | Op::CondBr { .. } => "br",
            Op::Switch { .. } => "switch",
            Op::Ret { .. } => "ret",
            Op::Unreachable => "unreachable",
        }
    }

    /// Returns the operands read by this op, in a fixed order.
    #[must_use]
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            Op::Alloca { .. } | Op::Br { .. } | Op::Unreachable => Vec::new(),
            Op::Load { ptr } => vec![ptr],
            Op::Store { value, ptr } => vec![value, ptr],
            Op::Binary { lhs, rhs, .. } | Op::Cmp { lhs, rhs, .. } => vec![lhs, rhs],
            Op::Select {
                cond,
                on_true,
                on_false,
            } => vec![cond, on_true, on_false],
            Op::Cast { value, .. } => vec![value],
            Op::Call { args, .. } => args.iter().collect(),
            Op::Phi { incoming } => incoming.iter().map(|(_, v)| v).collect(),
            Op::CondBr { cond, .. } => vec![cond],
            Op::Switch { value, .. } => vec![value],
            Op::Ret { value } => value.iter().collect(),
        }
    }

    /// Mutable counterpart of [`Op::operands`].
    pub fn operands_mut(&mut self) -> Vec<&mut Operand> {
        match self {
            Op::Alloca { .. } | Op::Br { .. } | Op::Unreachable => Vec::new(),
            Op::Load { ptr } => vec![ptr],
            Op::Store { value, ptr } => vec![value, ptr],
            Op::Binary { lhs, rhs, .. } | Op::Cmp { lhs, rhs, .. } => vec![lhs, rhs],
            Op::Select {
                cond,
                on_true,
                on_false,
            } => vec![cond, on_true, on_false],
            Op::Cast { value, .. } => vec![value],
            Op::Call { args, .. } => args.iter_mut().collect(),
            Op::Phi { incoming } => incoming.iter_mut().map(|(_, v)| v).collect(),
            Op::CondBr { cond, .. } => vec![cond],
            Op::Switch { value, .. } => vec![value],
            Op::Ret { value } => value.iter_mut().collect(),
        }
    }

    /// Returns the instructions this op reads.
    #[must_use]
    pub fn value_operands(&self) -> Vec<InstrId> {
        self.operands()
            .into_iter()
            .filter_map(Operand::as_value)
            .collect()
    }

    /// Replaces every operand equal to `old` with `new`.
    ///
    /// # Returns
    ///
    /// The number of operands that were rewritten.
    pub fn replace_operand(&mut self, old: &Operand, new: &Operand) -> usize {
        let mut count = 0;
        for operand in self.operands_mut() {
            if operand == old {
                *operand = new.clone();
                count += 1;
            }
        }
        count
    }

    /// Returns the control-flow successors of a terminator, in order and with
    /// duplicates preserved.
    #[must_use]
    pub fn successors(&self) -> Vec<BlockId> {
        match self {
            Op::Br { target } => vec![*target],
            Op::CondBr {
                on_true, on_false, ..
            } => vec![*on_true, *on_false],
            Op::Switch { default, cases, .. } => {
                let mut out = Vec::with_capacity(cases.len() + 1);
                out.push(*default);
                out.extend(cases.iter().map(|(_, b)| *b));
                out
            }
            _ => Vec::new(),
        }
    }

    /// Redirects every edge to `old` so it targets `new` instead.
    ///
    /// # Returns
    ///
    /// `true` if at least one edge was changed.
    pub fn replace_successor(&mut self, old: BlockId, new: BlockId) -> bool {
        let mut changed = false;
        let mut swap = |b: &mut BlockId| {
            if *b == old {
                *b = new;
                changed = true;
            }
        };
        match self {
            Op::Br { target } => swap(target),
            Op::CondBr {
                on_true, on_false, ..
            } => {
                swap(on_true);
                swap(on_false);
            }
            Op::Switch { default, cases, .. } => {
                swap(default);
                for (_, b) in cases.iter_mut() {
                    swap(b);
                }
            }
            _ => {}
        }
        changed
    }

    /// Renames the predecessor `old` to `new` in a phi's incoming list.
    pub fn replace_incoming_block(&mut self, old: BlockId, new: BlockId) {
        if let Op::Phi { incoming } = self {
            for (block, _) in incoming.iter_mut() {
                if *block == old {
                    *block = new;
                }
            }
        }
    }

    /// Drops every incoming entry from `pred` in a phi.
    ///
    /// # Returns
    ///
    /// `true` if an entry was removed.
    pub fn remove_incoming_block(&mut self, pred: BlockId) -> bool {
        if let Op::Phi { incoming } = self {
            let before = incoming.len();
            incoming.retain(|(b, _)| *b != pred);
            return incoming.len() != before;
        }
        false
    }
}
