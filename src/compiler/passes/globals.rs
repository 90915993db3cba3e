//! Whole-program passes over globals and declarations.
//!
//! - [`GlobalConstantPass`] replaces loads of read-only globals with the
//!   global's initializer. Pinning the mutant selector to a constant and
//!   running this pass is what turns a dispatch site into a plain branch.
//! - [`GlobalDcePass`] drops read-only globals and declarations that nothing
//!   references any more.

use std::collections::{HashMap, HashSet};

use crate::{
    compiler::{pass::ProgramPass, EventKind, EventLog},
    ir::{Constant, Function, Op, Operand, Program},
    Result,
};

/// Folds loads of constant globals.
pub struct GlobalConstantPass;

impl Default for GlobalConstantPass {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalConstantPass {
    /// Creates a new global constant folding pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn fold_function(
        function: &mut Function,
        constants: &HashMap<String, Constant>,
        events: &mut EventLog,
    ) -> bool {
        let candidates: Vec<_> = function
            .iter_instructions()
            .filter_map(|(block, _, id)| match function.instruction(id).op() {
                Op::Load {
                    ptr: Operand::Global(name),
                } => constants.get(name).map(|c| (block, id, *c)),
                _ => None,
            })
            .collect();

        for &(block, id, constant) in &candidates {
            let ty = function.instruction(id).ty();
            let value = Operand::Const(Constant::new(ty, constant.value()));
            function.replace_uses(id, &value);
            function.remove_instruction(block, id);
            events
                .record(EventKind::GlobalFolded)
                .at(function.name(), id.index())
                .message(format!("load -> {}", constant.value()));
        }
        !candidates.is_empty()
    }
}

impl ProgramPass for GlobalConstantPass {
    fn name(&self) -> &'static str {
        "global-constant"
    }

    fn description(&self) -> &'static str {
        "Replaces loads of read-only globals with their initializer"
    }

    fn is_global(&self) -> bool {
        true
    }

    fn run_on_function(&self, _function: &mut Function, _events: &mut EventLog) -> Result<bool> {
        Ok(false)
    }

    fn run_global(&self, program: &mut Program, events: &mut EventLog) -> Result<bool> {
        let constants: HashMap<String, Constant> = program
            .globals()
            .iter()
            .filter(|g| g.is_constant())
            .map(|g| (g.name().to_string(), g.initializer()))
            .collect();
        if constants.is_empty() {
            return Ok(false);
        }

        let mut changed = false;
        for function in program.functions_mut() {
            if function.is_declaration() {
                continue;
            }
            changed |= Self::fold_function(function, &constants, events);
        }
        Ok(changed)
    }
}

/// Removes unreferenced read-only globals and declarations.
pub struct GlobalDcePass;

impl Default for GlobalDcePass {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalDcePass {
    /// Creates a new global dead-code elimination pass.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProgramPass for GlobalDcePass {
    fn name(&self) -> &'static str {
        "global-dce"
    }

    fn description(&self) -> &'static str {
        "Removes constant globals and declarations nothing refers to"
    }

    fn is_global(&self) -> bool {
        true
    }

    fn run_on_function(&self, _function: &mut Function, _events: &mut EventLog) -> Result<bool> {
        Ok(false)
    }

    fn run_global(&self, program: &mut Program, events: &mut EventLog) -> Result<bool> {
        let mut globals: HashSet<String> = HashSet::new();
        let mut functions: HashSet<String> = HashSet::new();
        for function in program.functions() {
            for (_, _, id) in function.iter_instructions() {
                let op = function.instruction(id).op();
                if let Op::Call { callee, .. } = op {
                    functions.insert(callee.clone());
                }
                for operand in op.operands() {
                    match operand {
                        Operand::Global(name) => {
                            globals.insert(name.clone());
                        }
                        Operand::Function(name) => {
                            functions.insert(name.clone());
                        }
                        _ => {}
                    }
                }
            }
        }

        let dead_globals: Vec<String> = program
            .globals()
            .iter()
            .filter(|g| g.is_constant() && !globals.contains(g.name()))
            .map(|g| g.name().to_string())
            .collect();
        let dead_functions: Vec<String> = program
            .functions()
            .iter()
            .filter(|f| f.is_declaration() && !functions.contains(f.name()))
            .map(|f| f.name().to_string())
            .collect();

        for name in &dead_globals {
            program.remove_global(name);
            events
                .record(EventKind::SymbolRemoved)
                .message(format!("global @{name}"));
        }
        for name in &dead_functions {
            program.remove_function(name);
            events
                .record(EventKind::SymbolRemoved)
                .message(format!("declaration @{name}"));
        }
        Ok(!dead_globals.is_empty() || !dead_functions.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, Global, Type};

    fn program_with_selector(constant: bool) -> Program {
        let mut program = Program::new("p");
        let mut global = Global::new("sel", Type::I32, 4);
        global.set_constant(constant);
        program.add_global(global);
        program.add_function(Function::declaration("unused", vec![], Type::Void));
        let mut b = FunctionBuilder::new("main", vec![], Type::I32);
        b.block("entry");
        let v = b.load(Type::I32, Operand::Global("sel".into()));
        b.ret(Some(v));
        program.add_function(b.finish());
        program
    }

    #[test]
    fn test_folds_constant_global() {
        let mut program = program_with_selector(true);
        let mut events = EventLog::new();
        assert!(GlobalConstantPass::new()
            .run_global(&mut program, &mut events)
            .unwrap());
        let main = program.function("main").unwrap();
        let entry = main.entry().unwrap();
        assert_eq!(main.block(entry).len(), 1);
        assert!(GlobalDcePass::new()
            .run_global(&mut program, &mut events)
            .unwrap());
        assert!(program.global("sel").is_none());
        assert!(program.function("unused").is_none());
    }

    #[test]
    fn test_mutable_global_untouched() {
        let mut program = program_with_selector(false);
        let mut events = EventLog::new();
        assert!(!GlobalConstantPass::new()
            .run_global(&mut program, &mut events)
            .unwrap());
        GlobalDcePass::new()
            .run_global(&mut program, &mut events)
            .unwrap();
        assert!(program.global("sel").is_some());
    }
}
