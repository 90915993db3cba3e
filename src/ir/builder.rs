//! Incremental construction of functions.
//!
//! # Examples
//!
//! ```rust,ignore
//! use metamut::ir::{BinaryOp, FunctionBuilder, Operand, Type};
//!
//! let mut b = FunctionBuilder::new("sum", vec![Type::I32, Type::I32], Type::I32);
//! b.block("entry");
//! let x = b.binary(BinaryOp::Add, Operand::Arg(0), Operand::Arg(1));
//! b.ret(Some(x));
//! let function = b.finish();
//! ```

use crate::ir::{
    BinaryOp, BlockId, BlockOrigin, CastOp, CmpPredicate, Function, InstrId, Instruction, Op,
    Operand, Type,
};

/// Appends instructions to a function, one block at a time.
pub struct FunctionBuilder {
    function: Function,
    current: Option<BlockId>,
    last: Option<InstrId>,
}

impl FunctionBuilder {
    /// Starts a new function definition.
    #[must_use]
    pub fn new(name: impl Into<String>, params: Vec<Type>, ret: Type) -> Self {
        Self {
            function: Function::new(name, params, ret),
            current: None,
            last: None,
        }
    }

    /// Appends a new source block and makes it the insertion point.
    pub fn block(&mut self, name: impl Into<String>) -> BlockId {
        let id = self.function.append_block(name, BlockOrigin::Source);
        self.current = Some(id);
        id
    }

    /// Appends a new source block without moving the insertion point.
    pub fn declare_block(&mut self, name: impl Into<String>) -> BlockId {
        self.function.append_block(name, BlockOrigin::Source)
    }

    /// Moves the insertion point to the end of `block`.
    pub fn switch_to(&mut self, block: BlockId) {
        self.current = Some(block);
    }

    /// Returns the current insertion block.
    #[must_use]
    pub fn current_block(&self) -> Option<BlockId> {
        self.current
    }

    /// Returns the most recently emitted instruction.
    #[must_use]
    pub fn last_instruction(&self) -> Option<InstrId> {
        self.last
    }

    /// Names the most recently emitted instruction.
    pub fn name_last(&mut self, name: impl Into<String>) {
        if let Some(id) = self.last {
            self.function.instruction_mut(id).set_name(Some(name.into()));
        }
    }

    /// Returns the function under construction.
    #[must_use]
    pub fn function(&self) -> &Function {
        &self.function
    }

    /// Finishes construction.
    #[must_use]
    pub fn finish(self) -> Function {
        self.function
    }

    fn emit(&mut self, op: Op, ty: Type) -> InstrId {
        let block = match self.current {
            Some(block) => block,
            None => self.block("entry"),
        };
        let id = self
            .function
            .push_instruction(block, Instruction::new(op, ty));
        self.last = Some(id);
        id
    }

    /// Emits `alloca ty` and returns the slot address.
    pub fn alloca(&mut self, ty: Type) -> Operand {
        Operand::Value(self.emit(Op::Alloca { ty }, Type::Ptr))
    }

    /// Emits a load of `ty` from `ptr`.
    pub fn load(&mut self, ty: Type, ptr: Operand) -> Operand {
        Operand::Value(self.emit(Op::Load { ptr }, ty))
    }

    /// Emits a store of `value` to `ptr`.
    pub fn store(&mut self, value: Operand, ptr: Operand) -> InstrId {
        self.emit(Op::Store { value, ptr }, Type::Void)
    }

    /// Emits an arithmetic op. The result type is the type of `lhs`.
    pub fn binary(&mut self, op: BinaryOp, lhs: Operand, rhs: Operand) -> Operand {
        let ty = self.function.operand_type(&lhs);
        Operand::Value(self.emit(Op::Binary { op, lhs, rhs }, ty))
    }

    /// Emits an integer comparison.
    pub fn cmp(&mut self, pred: CmpPredicate, lhs: Operand, rhs: Operand) -> Operand {
        Operand::Value(self.emit(Op::Cmp { pred, lhs, rhs }, Type::I1))
    }

    /// Emits a select. The result type is the type of `on_true`.
    pub fn select(&mut self, cond: Operand, on_true: Operand, on_false: Operand) -> Operand {
        let ty = self.function.operand_type(&on_true);
        Operand::Value(self.emit(
            Op::Select {
                cond,
                on_true,
                on_false,
            },
            ty,
        ))
    }

    /// Emits a width conversion to `ty`.
    pub fn cast(&mut self, op: CastOp, value: Operand, ty: Type) -> Operand {
        Operand::Value(self.emit(Op::Cast { op, value }, ty))
    }

    /// Emits a direct call returning `ty`.
    pub fn call(&mut self, callee: impl Into<String>, args: Vec<Operand>, ty: Type) -> InstrId {
        self.emit(
            Op::Call {
                callee: callee.into(),
                args,
            },
            ty,
        )
    }

    /// Emits a phi of type `ty`.
    pub fn phi(&mut self, ty: Type, incoming: Vec<(BlockId, Operand)>) -> Operand {
        Operand::Value(self.emit(Op::Phi { incoming }, ty))
    }

    /// Emits an unconditional branch.
    pub fn br(&mut self, target: BlockId) -> InstrId {
        self.emit(Op::Br { target }, Type::Void)
    }

    /// Emits a two-way branch.
    pub fn cond_br(&mut self, cond: Operand, on_true: BlockId, on_false: BlockId) -> InstrId {
        self.emit(
            Op::CondBr {
                cond,
                on_true,
                on_false,
            },
            Type::Void,
        )
    }

    /// Emits a multi-way branch.
    pub fn switch(&mut self, value: Operand, default: BlockId, cases: Vec<(i64, BlockId)>) -> InstrId {
        self.emit(
            Op::Switch {
                value,
                default,
                cases,
            },
            Type::Void,
        )
    }

    /// Emits a return.
    pub fn ret(&mut self, value: Option<Operand>) -> InstrId {
        self.emit(Op::Ret { value }, Type::Void)
    }

    /// Emits `unreachable`.
    pub fn unreachable(&mut self) -> InstrId {
        self.emit(Op::Unreachable, Type::Void)
    }
}
