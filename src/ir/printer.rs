//! Textual rendering of programs.
//!
//! Two renderings share one writer:
//!
//! - The [`fmt::Display`] form uses block labels and instruction names where
//!   they exist. It is meant for humans and debugging.
//! - The canonical form ([`canonical_text`]) numbers blocks and values by
//!   position and sorts order-insensitive lists (phi entries, switch cases).
//!   Two programs that differ only in names, arena layout or detached garbage
//!   produce identical canonical text, which is what the equivalence reducer
//!   compares.

use std::{collections::HashMap, fmt, fmt::Write as _};

use crate::ir::{BlockId, Function, InstrId, Op, Operand, Program};

struct Printer<'a> {
    function: &'a Function,
    canonical: bool,
    block_names: HashMap<BlockId, String>,
    value_names: HashMap<InstrId, String>,
    block_pos: HashMap<BlockId, usize>,
}

impl<'a> Printer<'a> {
    fn new(function: &'a Function, canonical: bool) -> Self {
        let mut block_names = HashMap::new();
        let mut block_pos = HashMap::new();
        for (pos, &block) in function.layout().iter().enumerate() {
            block_pos.insert(block, pos);
            let name = if canonical {
                format!("bb{pos}")
            } else {
                function.block(block).name().to_string()
            };
            block_names.insert(block, name);
        }

        let mut value_names = HashMap::new();
        let mut counter = 0usize;
        for (_, _, id) in function.iter_instructions() {
            let instr = function.instruction(id);
            if !instr.has_result() {
                continue;
            }
            let name = match (canonical, instr.name()) {
                (false, Some(name)) => format!("%{name}"),
                (false, None) => format!("%{}", id.index()),
                (true, _) => format!("%v{counter}"),
            };
            counter += 1;
            value_names.insert(id, name);
        }

        Self {
            function,
            canonical,
            block_names,
            value_names,
            block_pos,
        }
    }

    fn block(&self, block: BlockId) -> String {
        self.block_names
            .get(&block)
            .cloned()
            .unwrap_or_else(|| format!("<detached {block}>"))
    }

    fn operand(&self, operand: &Operand) -> String {
        let ty = self.function.operand_type(operand);
        let text = match operand {
            Operand::Value(id) => self
                .value_names
                .get(id)
                .cloned()
                .unwrap_or_else(|| format!("<detached {id}>")),
            Operand::Arg(i) => format!("%arg{i}"),
            Operand::Const(c) => c.to_string(),
            Operand::Global(name) | Operand::Function(name) => format!("@{name}"),
        };
        format!("{ty} {text}")
    }

    fn instruction(&self, out: &mut String, id: InstrId) -> fmt::Result {
        let instr = self.function.instruction(id);
        out.push_str("  ");
        if let Some(name) = self.value_names.get(&id) {
            write!(out, "{name} = ")?;
        }
        let op = instr.op();
        match op {
            Op::Alloca { ty } => write!(out, "alloca {ty}")?,
            Op::Load { ptr } => write!(out, "load {}, {}", instr.ty(), self.operand(ptr))?,
            Op::Store { value, ptr } => {
                write!(out, "store {}, {}", self.operand(value), self.operand(ptr))?;
            }
            Op::Binary { op, lhs, rhs } => {
                write!(out, "{op} {}, {}", self.operand(lhs), self.operand(rhs))?;
            }
            Op::Cmp { pred, lhs, rhs } => {
                write!(out, "icmp {pred} {}, {}", self.operand(lhs), self.operand(rhs))?;
            }
            Op::Select {
                cond,
                on_true,
                on_false,
            } => write!(
                out,
                "select {}, {}, {}",
                self.operand(cond),
                self.operand(on_true),
                self.operand(on_false)
            )?,
            Op::Cast { op, value } => {
                write!(out, "{op} {} to {}", self.operand(value), instr.ty())?;
            }
            Op::Call { callee, args } => {
                let args: Vec<String> = args.iter().map(|a| self.operand(a)).collect();
                write!(out, "call {} @{callee}({})", instr.ty(), args.join(", "))?;
            }
            Op::Phi { incoming } => {
                let mut entries: Vec<(usize, String)> = incoming
                    .iter()
                    .map(|(b, v)| {
                        (
                            self.block_pos.get(b).copied().unwrap_or(usize::MAX),
                            format!("[ {}, {} ]", self.operand(v), self.block(*b)),
                        )
                    })
                    .collect();
                if self.canonical {
                    entries.sort();
                }
                let entries: Vec<String> = entries.into_iter().map(|(_, e)| e).collect();
                write!(out, "phi {} {}", instr.ty(), entries.join(", "))?;
            }
            Op::Br { target } => write!(out, "br label {}", self.block(*target))?,
            Op::CondBr {
                cond,
                on_true,
                on_false,
            } => write!(
                out,
                "br {}, label {}, label {}",
                self.operand(cond),
                self.block(*on_true),
                self.block(*on_false)
            )?,
            Op::Switch {
                value,
                default,
                cases,
            } => {
                let mut cases = cases.clone();
                if self.canonical {
                    cases.sort_by_key(|(v, _)| *v);
                }
                let cases: Vec<String> = cases
                    .iter()
                    .map(|(v, b)| format!("{v} -> {}", self.block(*b)))
                    .collect();
                write!(
                    out,
                    "switch {}, label {} [{}]",
                    self.operand(value),
                    self.block(*default),
                    cases.join(", ")
                )?;
            }
            Op::Ret { value: Some(v) } => write!(out, "ret {}", self.operand(v))?,
            Op::Ret { value: None } => write!(out, "ret void")?,
            Op::Unreachable => write!(out, "unreachable")?,
        }
        out.push('\n');
        Ok(())
    }

    fn function(&self, out: &mut String) -> fmt::Result {
        let f = self.function;
        let params: Vec<String> = f
            .params()
            .iter()
            .enumerate()
            .map(|(i, ty)| format!("{ty} %arg{i}"))
            .collect();
        if f.is_declaration() {
            writeln!(out, "declare {} @{}({})", f.return_type(), f.name(), params.join(", "))?;
            return Ok(());
        }
        writeln!(out, "define {} @{}({}) {{", f.return_type(), f.name(), params.join(", "))?;
        for &block in f.layout() {
            writeln!(out, "{}:", self.block(block))?;
            for &id in f.block(block).instructions() {
                self.instruction(out, id)?;
            }
        }
        writeln!(out, "}}")
    }
}

fn render(program: &Program, canonical: bool) -> Result<String, fmt::Error> {
    let mut out = String::new();
    for global in program.globals() {
        writeln!(
            out,
            "@{} = {} {} {}",
            global.name(),
            if global.is_constant() { "constant" } else { "global" },
            global.ty(),
            global.initializer()
        )?;
    }
    for function in program.functions() {
        Printer::new(function, canonical).function(&mut out)?;
    }
    Ok(out)
}

/// Renders `program` with positional numbering and sorted unordered lists.
///
/// Two programs with equal canonical text are structurally identical.
#[must_use]
pub fn canonical_text(program: &Program) -> String {
    render(program, true).unwrap_or_default()
}

/// Renders a single function with positional numbering.
#[must_use]
pub fn canonical_function_text(function: &Function) -> String {
    let mut out = String::new();
    match Printer::new(function, true).function(&mut out) {
        Ok(()) => out,
        Err(_) => String::new(),
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        Printer::new(self, false).function(&mut out)?;
        f.write_str(&out)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(self, false)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, FunctionBuilder, Type};

    fn build(name_value: bool) -> Program {
        let mut b = FunctionBuilder::new("f", vec![Type::I32, Type::I32], Type::I32);
        b.block(if name_value { "start" } else { "entry" });
        let x = b.binary(BinaryOp::Add, Operand::Arg(0), Operand::Arg(1));
        if name_value {
            b.name_last("sum");
        }
        b.ret(Some(x));
        let mut p = Program::new("p");
        p.add_function(b.finish());
        p
    }

    #[test]
    fn test_display_uses_names() {
        let text = build(true).to_string();
        assert!(text.contains("start:"));
        assert!(text.contains("%sum = add i32 %arg0, i32 %arg1"));
    }

    #[test]
    fn test_canonical_ignores_names() {
        assert_eq!(canonical_text(&build(true)), canonical_text(&build(false)));
        assert_ne!(build(true).to_string(), build(false).to_string());
    }
}
