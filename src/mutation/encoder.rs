//! Meta-variant encoding.
//!
//! Rewrites the code around a statement so that one load of the selector
//! global decides at run time whether the original statement or one of its
//! mutants executes.
//!
//! # Architecture
//!
//! For every portion of a statement that has mutants:
//!
//! ```text
//!   before ──────────────┐          (proxies, for a phi-headed portion)
//!   ...                  │
//!   call range_marker(min, max)
//!   %sel = load i32 @selector
//!   switch %sel, default original [1 → mutant1, 2 → mutant2]
//!        │            │            │
//!        ▼            ▼            ▼
//!    mutant1       mutant2     stmtN.original
//!        │            │            │
//!        └────────────┴─────┬──────┘
//!                           ▼
//!                      stmtN.after      (merge phis for escaping values)
//! ```
//!
//! The portion is cut out of its block with two splits: one right before its
//! first instruction, giving the "original" block, and one right after its
//! last instruction, giving the "after" block. A portion that ends in a
//! terminator has no "after" block; its fragments carry their own copy of the
//! terminator. A portion headed by phis is not split at the front: its proxy
//! predecessors become the dispatch sites.

use std::collections::HashSet;

use crate::{
    ir::{BlockId, BlockOrigin, Constant, Function, InstrId, Instruction, Op, Operand, Type},
    mutation::{operators::Fragment, Mutant, MutationConfig, Statement},
    Result,
};

/// Wires generated mutants into a function.
pub struct MetaEncoder<'a> {
    config: &'a MutationConfig,
}

impl<'a> MetaEncoder<'a> {
    /// Creates an encoder using the selector and marker names of `config`.
    #[must_use]
    pub fn new(config: &'a MutationConfig) -> Self {
        Self { config }
    }

    /// Encodes `mutants` of `statement` into `function`.
    ///
    /// Each portion with at least one fragment gets its own dispatch. The
    /// mutants must be sorted by ID.
    ///
    /// # Returns
    ///
    /// The number of dispatch sites emitted.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the statement can no longer be
    /// located or isolated.
    pub fn encode_statement(
        &self,
        function: &mut Function,
        statement: &Statement,
        mutants: &[Mutant],
    ) -> Result<usize> {
        let mut sites = 0;
        for index in 0..statement.portions().len() {
            let present: Vec<(&Mutant, &Fragment)> = mutants
                .iter()
                .filter_map(|m| m.fragment_for(index).map(|f| (m, f)))
                .collect();
            if present.is_empty() {
                continue;
            }
            sites += self.encode_portion(function, statement, index, &present)?;
        }
        Ok(sites)
    }

    fn encode_portion(
        &self,
        function: &mut Function,
        statement: &Statement,
        index: usize,
        present: &[(&Mutant, &Fragment)],
    ) -> Result<usize> {
        let portion = &statement.portions()[index];
        let (Some(first), Some(last)) = (portion.first(), portion.last()) else {
            return Err(malformed_error!(
                "statement {} has an empty portion",
                statement.index()
            ));
        };
        let Some(block) = function.block_of(first) else {
            return Err(malformed_error!(
                "statement {} is no longer placed",
                statement.index()
            ));
        };
        let n = statement.index();
        let label = if statement.portions().len() > 1 {
            format!("stmt{n}.{index}")
        } else {
            format!("stmt{n}")
        };

        let (original, sites) = if function.instruction(first).op().is_phi() {
            let preds = function.predecessors().remove(&block).unwrap_or_default();
            if preds.is_empty()
                || preds
                    .iter()
                    .any(|&p| function.block(p).origin() != BlockOrigin::Proxy)
            {
                return Err(malformed_error!(
                    "phi-headed statement {} is reached without a proxy",
                    n
                ));
            }
            (block, preds)
        } else {
            let start = Self::hoist_allocas(function, block, first, last)?;
            let original = function.split_block(
                block,
                start,
                format!("{label}.original"),
                BlockOrigin::Original(n),
            );
            (original, vec![block])
        };

        let terminates = function.instruction(last).op().is_terminator();
        let after = if terminates {
            None
        } else {
            let Some(pos) = function.block(original).position(last) else {
                return Err(malformed_error!("{} left its statement block", last));
            };
            Some(function.split_block(
                original,
                pos + 1,
                format!("{label}.after"),
                BlockOrigin::After(n),
            ))
        };

        for &(mutant, fragment) in present {
            self.place_fragment(function, original, index, mutant, fragment, terminates)?;
        }
        if let Some(after) = after {
            Self::merge_escaping(function, portion.instructions(), original, after, present)?;
        }
        for &site in &sites {
            self.emit_dispatch(function, site, original, present)?;
        }

        log::debug!(
            "'{}': {} mutant(s) of statement {} dispatched from {} site(s)",
            function.name(),
            present.len(),
            n,
            sites.len()
        );
        Ok(sites.len())
    }

    /// Moves allocas lying between `first` and `last` in front of `first`.
    ///
    /// # Returns
    ///
    /// The index `first` ends up at.
    fn hoist_allocas(
        function: &mut Function,
        block: BlockId,
        first: InstrId,
        last: InstrId,
    ) -> Result<usize> {
        let instrs = function.block(block).instructions();
        let position = |id: InstrId| instrs.iter().position(|&i| i == id);
        let (Some(start), Some(end)) = (position(first), position(last)) else {
            return Err(malformed_error!(
                "statement range {}..{} is not inside one block",
                first,
                last
            ));
        };
        let allocas: Vec<InstrId> = instrs[start..=end]
            .iter()
            .copied()
            .filter(|&id| function.instruction(id).op().is_alloca())
            .collect();
        if allocas.is_empty() {
            return Ok(start);
        }

        let list = function.block_mut(block).instructions_mut();
        list.retain(|id| !allocas.contains(id));
        for (k, &alloca) in allocas.iter().enumerate() {
            list.insert(start + k, alloca);
        }
        Ok(start + allocas.len())
    }

    fn place_fragment(
        &self,
        function: &mut Function,
        original: BlockId,
        index: usize,
        mutant: &Mutant,
        fragment: &Fragment,
        terminates: bool,
    ) -> Result<()> {
        let id = mutant.id();
        let base = if mutant.fragments().len() > 1 {
            format!("mutant{id}.{index}")
        } else {
            format!("mutant{id}")
        };
        for (k, &block) in fragment.blocks().iter().enumerate() {
            let name = if k == 0 {
                base.clone()
            } else {
                format!("{base}.{k}")
            };
            let target = function.block_mut(block);
            target.set_name(name);
            target.set_origin(BlockOrigin::Mutant(id));
            function.place_block_before(original, block);
        }

        let Some(exit) = fragment.exit() else {
            return Err(malformed_error!("mutant {} has an empty fragment", id));
        };
        if terminates {
            // The copied terminator adds an edge into every successor.
            for succ in function.successors(exit) {
                for phi in function.phis(succ) {
                    let value = match function.instruction(phi).op() {
                        Op::Phi { incoming } => incoming
                            .iter()
                            .find(|(pred, _)| *pred == original)
                            .map(|(_, v)| v.clone()),
                        _ => None,
                    };
                    let Some(value) = value else {
                        continue;
                    };
                    let value = match value.as_value().and_then(|v| fragment.value_of(v)) {
                        Some(replacement) => replacement.clone(),
                        None => value,
                    };
                    if let Op::Phi { incoming } = function.instruction_mut(phi).op_mut() {
                        incoming.push((exit, value));
                    }
                }
            }
        } else {
            let Some(term) = function.terminator(original) else {
                return Err(malformed_error!(
                    "block '{}' lost its terminator",
                    function.block(original).name()
                ));
            };
            let copy = function.instruction(term).clone();
            function.push_instruction(exit, copy);
        }
        Ok(())
    }

    /// Merges values of the portion that are read after it.
    fn merge_escaping(
        function: &mut Function,
        portion: &[InstrId],
        original: BlockId,
        after: BlockId,
        present: &[(&Mutant, &Fragment)],
    ) -> Result<()> {
        let inside: HashSet<InstrId> = portion.iter().copied().collect();
        let users = function.users();
        let escaping: Vec<InstrId> = portion
            .iter()
            .copied()
            .filter(|id| function.instruction(*id).has_result())
            .filter(|id| {
                users
                    .get(id)
                    .is_some_and(|u| u.iter().any(|user| !inside.contains(user)))
            })
            .collect();

        for (k, value) in escaping.into_iter().enumerate() {
            let mut incoming = vec![(original, Operand::Value(value))];
            for &(mutant, fragment) in present {
                let (Some(exit), Some(replacement)) = (fragment.exit(), fragment.value_of(value))
                else {
                    return Err(malformed_error!(
                        "mutant {} has no replacement for escaping {}",
                        mutant.id(),
                        value
                    ));
                };
                incoming.push((exit, replacement.clone()));
            }
            let ty = function.instruction(value).ty();
            let phi = function.insert_instruction(after, k, Instruction::new(Op::Phi { incoming }, ty));
            let mut skip = inside.clone();
            skip.insert(phi);
            function.replace_uses_except(value, &Operand::Value(phi), &skip);
        }
        Ok(())
    }

    fn emit_dispatch(
        &self,
        function: &mut Function,
        site: BlockId,
        original: BlockId,
        present: &[(&Mutant, &Fragment)],
    ) -> Result<()> {
        let Some(term) = function.terminator(site) else {
            return Err(malformed_error!(
                "dispatch site '{}' has no terminator",
                function.block(site).name()
            ));
        };
        if !matches!(function.instruction(term).op(), Op::Br { target } if *target == original) {
            return Err(malformed_error!(
                "dispatch site '{}' does not branch to the original statement",
                function.block(site).name()
            ));
        }
        function.remove_instruction(site, term);

        let mut cases = Vec::with_capacity(present.len());
        for &(mutant, fragment) in present {
            let Some(entry) = fragment.entry() else {
                return Err(malformed_error!("mutant {} has an empty fragment", mutant.id()));
            };
            cases.push((i64::from(mutant.id()), entry));
        }

        if self.config.emit_range_marker {
            let min = present.iter().map(|(m, _)| m.id()).min().unwrap_or_default();
            let max = present.iter().map(|(m, _)| m.id()).max().unwrap_or_default();
            function.push_instruction(
                site,
                Instruction::new(
                    Op::Call {
                        callee: self.config.range_marker_name.clone(),
                        args: vec![
                            Operand::Const(Constant::i32(i64::from(min))),
                            Operand::Const(Constant::i32(i64::from(max))),
                        ],
                    },
                    Type::Void,
                ),
            );
        }
        let selector = function.push_instruction(
            site,
            Instruction::new(
                Op::Load {
                    ptr: Operand::Global(self.config.selector_name.clone()),
                },
                Type::I32,
            ),
        );
        function.push_instruction(
            site,
            Instruction::new(
                Op::Switch {
                    value: Operand::Value(selector),
                    default: original,
                    cases,
                },
                Type::Void,
            ),
        );
        Ok(())
    }
}

/// A dispatch emitted by [`MetaEncoder`], as found in an encoded function.
#[derive(Debug, Clone)]
pub(crate) struct DispatchSite {
    pub block: BlockId,
    pub marker: Option<InstrId>,
    pub load: InstrId,
    pub switch: InstrId,
    pub original: BlockId,
    pub cases: Vec<(i64, BlockId)>,
}

/// Finds every block ending in a switch over a load of `selector`.
///
/// `marker` names the range-marker function; its call in the same block is
/// reported with the site.
pub(crate) fn dispatch_sites(
    function: &Function,
    selector: &str,
    marker: Option<&str>,
) -> Vec<DispatchSite> {
    let mut sites = Vec::new();
    for &block in function.layout() {
        let Some(term) = function.terminator(block) else {
            continue;
        };
        let Op::Switch {
            value: Operand::Value(load),
            default,
            cases,
        } = function.instruction(term).op()
        else {
            continue;
        };
        let reads_selector = matches!(
            function.instruction(*load).op(),
            Op::Load { ptr: Operand::Global(name) } if name == selector
        );
        if !reads_selector {
            continue;
        }
        let marker = marker.and_then(|name| {
            function
                .block(block)
                .instructions()
                .iter()
                .rev()
                .copied()
                .find(|&id| function.instruction(id).is_call_to(name))
        });
        sites.push(DispatchSite {
            block,
            marker,
            load: *load,
            switch: term,
            original: *default,
            cases: cases.clone(),
        });
    }
    sites
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{BinaryOp, CmpPredicate, FunctionBuilder, Global, Program},
        mutation::{
            GenerationSession, MutantGenerator, OperatorConfig, OperatorRegistry,
            StatementExtractor,
        },
    };

    fn encode(f: &mut Function, rules: &str) -> (Vec<Mutant>, usize) {
        let registry = OperatorRegistry::from_config(&OperatorConfig::parse(rules).unwrap());
        let config = MutationConfig::default();
        let mut session = GenerationSession::new();
        let statements = StatementExtractor::new().extract(f, &mut session).unwrap();
        let generator = MutantGenerator::new(&registry, &config);
        let encoder = MetaEncoder::new(&config);
        let mut all = Vec::new();
        let mut sites = 0;
        for statement in &statements {
            let mutants = generator.generate(f, statement, &mut session).unwrap();
            sites += encoder.encode_statement(f, statement, &mutants).unwrap();
            all.extend(mutants);
        }
        (all, sites)
    }

    fn check(f: Function) {
        let mut program = Program::new("test");
        program.add_global(Global::new(crate::mutation::DEFAULT_SELECTOR, Type::I32, 0));
        program.add_function(Function::declaration(
            crate::mutation::DEFAULT_RANGE_MARKER,
            vec![Type::I32, Type::I32],
            Type::Void,
        ));
        program.add_function(f);
        crate::ir::verify_program(&program).unwrap();
    }

    fn switch_cases(f: &Function) -> Vec<Vec<i64>> {
        f.iter_instructions()
            .filter_map(|(_, _, id)| match f.instruction(id).op() {
                Op::Switch { cases, .. } => Some(cases.iter().map(|(v, _)| *v).collect()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_fall_through_statement() {
        let mut b = FunctionBuilder::new("f", vec![Type::I32, Type::I32, Type::Ptr], Type::I32);
        b.block("entry");
        let x = b.binary(BinaryOp::Add, Operand::Arg(0), Operand::Arg(1));
        b.store(x, Operand::Arg(2));
        b.ret(Some(Operand::Arg(0)));
        let mut f = b.finish();

        let (mutants, sites) = encode(&mut f, "ADD(A, B) --> AddToSub, SUB(A, B); AddToMul, MUL(A, B)");
        assert_eq!(mutants.len(), 2);
        assert_eq!(sites, 1);
        assert_eq!(switch_cases(&f), vec![vec![1, 2]]);

        let names: Vec<&str> = f.layout().iter().map(|b| f.block(*b).name()).collect();
        assert_eq!(
            names,
            vec!["entry", "mutant1", "mutant2", "stmt0.original", "stmt0.after"]
        );
        check(f);
    }

    #[test]
    fn test_terminating_statement_keeps_its_terminator() {
        let mut b = FunctionBuilder::new("g", vec![Type::I32], Type::I1);
        b.block("entry");
        let c = b.cmp(CmpPredicate::Slt, Operand::Arg(0), Operand::Const(Constant::i32(4)));
        b.ret(Some(c));
        let mut f = b.finish();

        let (_, sites) = encode(&mut f, "ICMP_SLT(A, B) --> SltToSle, ICMP_SLE(A, B)");
        assert_eq!(sites, 1);
        let mutant = f.layout()[1];
        let ops: Vec<&'static str> = f
            .block(mutant)
            .instructions()
            .iter()
            .map(|id| f.instruction(*id).op().mnemonic())
            .collect();
        assert_eq!(ops, vec!["icmp", "ret"]);
        check(f);
    }

    #[test]
    fn test_phi_headed_statement_dispatches_from_proxies() {
        let mut b = FunctionBuilder::new("h", vec![Type::I32, Type::Ptr], Type::Void);
        let entry = b.block("entry");
        let yes = b.declare_block("yes");
        let join = b.declare_block("join");
        b.switch_to(entry);
        let c = b.cmp(CmpPredicate::Sgt, Operand::Arg(0), Operand::Const(Constant::i32(0)));
        b.cond_br(c, yes, join);
        b.switch_to(yes);
        b.br(join);
        b.switch_to(join);
        let p = b.phi(
            Type::I32,
            vec![
                (entry, Operand::Const(Constant::i32(1))),
                (yes, Operand::Const(Constant::i32(2))),
            ],
        );
        let q = b.binary(BinaryOp::Add, p, Operand::Arg(0));
        b.store(q, Operand::Arg(1));
        b.ret(None);
        let mut f = b.finish();

        let (mutants, sites) = encode(&mut f, "ADD(A, B) --> AddToSub, SUB(A, B)");
        assert_eq!(mutants.len(), 1);
        assert_eq!(sites, 2);
        assert_eq!(switch_cases(&f), vec![vec![1], vec![1]]);
        check(f);
    }

    #[test]
    fn test_escaping_value_gets_merge_phi() {
        // One statement in two blocks: the product is stored in `next`.
        let mut b = FunctionBuilder::new("k", vec![Type::I32, Type::Ptr], Type::Void);
        b.block("entry");
        let next = b.declare_block("next");
        let done = b.declare_block("done");
        let x = b.binary(BinaryOp::Add, Operand::Arg(0), Operand::Const(Constant::i32(1)));
        let s = b.binary(BinaryOp::Mul, x.clone(), Operand::Const(Constant::i32(3)));
        b.br(next);
        b.switch_to(next);
        b.store(s, Operand::Arg(1));
        b.br(done);
        b.switch_to(done);
        b.ret(None);
        let mut f = b.finish();

        let (mutants, _) = encode(&mut f, "ADD(A, B) --> AddToSub, SUB(A, B)");
        assert_eq!(mutants.len(), 1);
        let merges = f
            .iter_instructions()
            .filter(|(_, _, id)| f.instruction(*id).op().is_phi())
            .count();
        assert_eq!(merges, 1);
        check(f);
    }
}
