//! A single IR instruction.

use crate::ir::{Op, Type};

/// One instruction: an operation, the type of its result and an optional name.
///
/// The name is cosmetic. It is used by the printer and ignored by the
/// canonical form that equivalence checks compare.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    op: Op,
    ty: Type,
    name: Option<String>,
}

impl Instruction {
    /// Creates an unnamed instruction.
    ///
    /// # Arguments
    ///
    /// * `op` - The operation performed.
    /// * `ty` - The result type, `Type::Void` if the op produces nothing.
    #[must_use]
    pub fn new(op: Op, ty: Type) -> Self {
        Self { op, ty, name: None }
    }

    /// Creates a named instruction.
    #[must_use]
    pub fn named(op: Op, ty: Type, name: impl Into<String>) -> Self {
        Self {
            op,
            ty,
            name: Some(name.into()),
        }
    }

    /// Returns the operation.
    #[must_use]
    pub fn op(&self) -> &Op {
        &self.op
    }

    /// Returns the operation for in-place rewriting.
    pub fn op_mut(&mut self) -> &mut Op {
        &mut self.op
    }

    /// Replaces the operation, keeping type and name.
    pub fn set_op(&mut self, op: Op) {
        self.op = op;
    }

    /// Returns the result type.
    #[must_use]
    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Returns the display name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Sets or clears the display name.
    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    /// Returns `true` if the instruction produces a value other code can read.
    #[must_use]
    pub fn has_result(&self) -> bool {
        self.ty != Type::Void
    }

    /// Returns `true` if this is a call to `callee`.
    #[must_use]
    pub fn is_call_to(&self, callee: &str) -> bool {
        matches!(&self.op, Op::Call { callee: c, .. } if c == callee)
    }

    /// Returns the callee name for call instructions.
    #[must_use]
    pub fn callee(&self) -> Option<&str> {
        match &self.op {
            Op::Call { callee, .. } => Some(callee),
            _ => None,
        }
    }
}
