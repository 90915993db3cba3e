//! Operators that rewrite a single binary operation or comparison.

use std::collections::{hash_map::Entry, HashMap};

use crate::{
    ir::{Constant, Function, InstrId, Op, Operand},
    mutation::{
        operators::{
            FragmentBuilder, MatchHit, MatchSite, MatcherKind, MatcherSpec, MutantCandidate,
            MutantSpec, MutationOperator, OperatorMatch, ReplacerKind, ReplacerSpec, RuleOperand,
        },
        Statement,
    },
    Result,
};

/// What the matched instruction turns into.
enum Replacement {
    /// Same instruction, different op
    Op(Op),
    /// The instruction disappears and its readers use this value
    Value(Operand),
}

/// One mutant kind of a binary-operation or comparison rule.
///
/// Every instruction of the statement that fits the matcher yields one
/// candidate. A candidate whose rebuilt instruction is identical to the
/// original is dropped.
pub struct ExpressionOperator {
    matcher: MatcherSpec,
    mutant: MutantSpec,
}

impl ExpressionOperator {
    /// Creates the operator for one `(matcher, mutant kind)` pair.
    #[must_use]
    pub fn new(matcher: MatcherSpec, mutant: MutantSpec) -> Self {
        Self { matcher, mutant }
    }

    /// Binds the matcher placeholders against `op`.
    fn bind(&self, op: &Op) -> Option<HashMap<String, Operand>> {
        let (lhs, rhs) = match (self.matcher.kind, op) {
            (MatcherKind::Binary(want), Op::Binary { op, lhs, rhs }) if want == *op => (lhs, rhs),
            (MatcherKind::Cmp(want), Op::Cmp { pred, lhs, rhs }) if want == *pred => (lhs, rhs),
            _ => return None,
        };

        let mut bindings: HashMap<String, Operand> = HashMap::new();
        for (placeholder, actual) in self.matcher.operands.iter().zip([lhs, rhs]) {
            match placeholder {
                RuleOperand::Named(name) => match bindings.entry(name.clone()) {
                    Entry::Occupied(bound) => {
                        if bound.get() != actual {
                            return None;
                        }
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(actual.clone());
                    }
                },
                RuleOperand::Literal(value) => {
                    let constant = actual.as_const()?;
                    if constant.value() != constant.ty().normalize(*value) {
                        return None;
                    }
                }
            }
        }
        Some(bindings)
    }

    fn resolve(
        &self,
        function: &Function,
        original: InstrId,
        bindings: &HashMap<String, Operand>,
        operand: &RuleOperand,
    ) -> Result<Operand> {
        match operand {
            RuleOperand::Named(name) => bindings.get(name).cloned().ok_or_else(|| {
                malformed_error!("operand '{}' of {} is not bound", name, self.mutant.name)
            }),
            RuleOperand::Literal(value) => {
                // Literals take the type of the matched operands.
                let ty = match function.instruction(original).op().operands().first() {
                    Some(first) => function.operand_type(first),
                    None => function.instruction(original).ty(),
                };
                Ok(Operand::Const(Constant::new(ty, *value)))
            }
        }
    }

    fn replacement(
        &self,
        function: &Function,
        original: InstrId,
        bindings: &HashMap<String, Operand>,
    ) -> Result<Replacement> {
        let pair = |operands: &[RuleOperand]| -> Result<(Operand, Operand)> {
            match operands {
                [lhs, rhs] => Ok((
                    self.resolve(function, original, bindings, lhs)?,
                    self.resolve(function, original, bindings, rhs)?,
                )),
                _ => Err(malformed_error!(
                    "{} expects two operands, got {}",
                    self.mutant.name,
                    operands.len()
                )),
            }
        };

        Ok(match &self.mutant.replacer {
            ReplacerSpec::Binary(op, operands) => {
                let (lhs, rhs) = pair(operands)?;
                Replacement::Op(Op::Binary { op: *op, lhs, rhs })
            }
            ReplacerSpec::Cmp(pred, operands) => {
                let (lhs, rhs) = pair(operands)?;
                Replacement::Op(Op::Cmp {
                    pred: *pred,
                    lhs,
                    rhs,
                })
            }
            ReplacerSpec::Operand(name) => Replacement::Value(self.resolve(
                function,
                original,
                bindings,
                &RuleOperand::Named(name.clone()),
            )?),
            ReplacerSpec::Const(value) => Replacement::Value(Operand::Const(Constant::new(
                function.instruction(original).ty(),
                *value,
            ))),
            ReplacerSpec::DeleteStatement => {
                return Err(malformed_error!(
                    "{} cannot delete a statement",
                    self.mutant.name
                ))
            }
        })
    }
}

impl MutationOperator for ExpressionOperator {
    fn name(&self) -> &str {
        &self.mutant.name
    }

    fn replacer(&self) -> ReplacerKind {
        self.mutant.replacer.kind()
    }

    fn matches(&self, site: &MatchSite<'_>) -> Option<OperatorMatch> {
        let function = site.function();
        let hits: Vec<MatchHit> = site
            .mutable()
            .iter()
            .filter_map(|&id| {
                self.bind(function.instruction(id).op())
                    .map(|bindings| MatchHit {
                        altered: vec![id],
                        bindings,
                    })
            })
            .collect();
        (!hits.is_empty()).then(|| OperatorMatch::new(hits))
    }

    fn replace(
        &self,
        found: &OperatorMatch,
        function: &mut Function,
        statement: &Statement,
    ) -> Result<Vec<MutantCandidate>> {
        let mut candidates = Vec::with_capacity(found.hits().len());
        for hit in found.hits() {
            let [original] = hit.altered.as_slice() else {
                return Err(malformed_error!(
                    "{} expects exactly one altered instruction",
                    self.mutant.name
                ));
            };
            let original = *original;
            let replacement = self.replacement(function, original, &hit.bindings)?;
            if let Replacement::Op(op) = &replacement {
                if op == function.instruction(original).op() {
                    continue;
                }
            }

            let Some(portion) = statement.portion_of(original) else {
                return Err(malformed_error!(
                    "{} is not part of statement {}",
                    original,
                    statement.index()
                ));
            };
            let mut builder = FragmentBuilder::clone_portion(function, statement, portion)?;
            match replacement {
                Replacement::Op(op) => builder.set_op(function, original, op)?,
                Replacement::Value(value) => builder.replace_with(function, original, &value)?,
            }
            candidates.push(MutantCandidate {
                fragments: vec![builder.finish(function)],
                altered: vec![original],
            });
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{BinaryOp, CmpPredicate, FunctionBuilder, Type},
        mutation::{operators::OperatorConfig, GenerationSession, StatementExtractor},
    };

    fn operator(text: &str) -> ExpressionOperator {
        let config = OperatorConfig::parse(text).unwrap();
        let rule = &config.rules()[0];
        ExpressionOperator::new(rule.matcher.clone(), rule.mutants[0].clone())
    }

    fn store_of(op: BinaryOp, rhs: Operand) -> (Function, Vec<Statement>) {
        let mut b = FunctionBuilder::new("f", vec![Type::I32, Type::I32, Type::Ptr], Type::Void);
        b.block("entry");
        let x = b.binary(op, Operand::Arg(0), rhs);
        b.store(x, Operand::Arg(2));
        b.ret(None);
        let mut f = b.finish();
        let statements = StatementExtractor::new()
            .extract(&mut f, &mut GenerationSession::new())
            .unwrap();
        (f, statements)
    }

    #[test]
    fn test_binary_replacement() {
        let (mut f, statements) = store_of(BinaryOp::Add, Operand::Arg(1));
        let op = operator("ADD(A, B) --> AddToSub, SUB(A, B)");
        let mutable = statements[0].instructions().to_vec();
        let found = op
            .matches(&MatchSite::new(&f, &statements[0], &mutable))
            .unwrap();
        assert_eq!(found.hits().len(), 1);

        let candidates = op.replace(&found, &mut f, &statements[0]).unwrap();
        assert_eq!(candidates.len(), 1);
        let block = candidates[0].fragments[0].entry().unwrap();
        let first = f.block(block).instructions()[0];
        assert_eq!(
            f.instruction(first).op(),
            &Op::Binary {
                op: BinaryOp::Sub,
                lhs: Operand::Arg(0),
                rhs: Operand::Arg(1),
            }
        );
    }

    #[test]
    fn test_literal_matcher_requires_constant() {
        let op = operator("MUL(A, 1) --> MulOne, OPERAND(A)");
        let (f, statements) = store_of(BinaryOp::Mul, Operand::Arg(1));
        let mutable = statements[0].instructions().to_vec();
        assert!(op
            .matches(&MatchSite::new(&f, &statements[0], &mutable))
            .is_none());

        let (f, statements) = store_of(BinaryOp::Mul, Operand::Const(Constant::i32(1)));
        let mutable = statements[0].instructions().to_vec();
        assert!(op
            .matches(&MatchSite::new(&f, &statements[0], &mutable))
            .is_some());
    }

    #[test]
    fn test_identical_rebuild_is_dropped() {
        let (mut f, statements) = store_of(BinaryOp::Add, Operand::Arg(1));
        let op = operator("ADD(A, B) --> Same, ADD(A, B)");
        let mutable = statements[0].instructions().to_vec();
        let found = op
            .matches(&MatchSite::new(&f, &statements[0], &mutable))
            .unwrap();
        assert!(op.replace(&found, &mut f, &statements[0]).unwrap().is_empty());
    }

    #[test]
    fn test_const_replacement_of_comparison() {
        let mut b = FunctionBuilder::new("g", vec![Type::I32], Type::I1);
        b.block("entry");
        let c = b.cmp(CmpPredicate::Slt, Operand::Arg(0), Operand::Const(Constant::i32(4)));
        b.ret(Some(c.clone()));
        let mut f = b.finish();
        let statements = StatementExtractor::new()
            .extract(&mut f, &mut GenerationSession::new())
            .unwrap();

        let op = operator("ICMP_SLT(A, B) --> SltFalse, CONST(0)");
        let mutable = statements[0].instructions().to_vec();
        let found = op
            .matches(&MatchSite::new(&f, &statements[0], &mutable))
            .unwrap();
        let candidates = op.replace(&found, &mut f, &statements[0]).unwrap();
        let fragment = &candidates[0].fragments[0];
        let c = c.as_value().unwrap();
        assert_eq!(
            fragment.value_of(c),
            Some(&Operand::Const(Constant::bool(false)))
        );
        let block = fragment.entry().unwrap();
        let ret = f.block(block).instructions()[0];
        assert_eq!(
            f.instruction(ret).op(),
            &Op::Ret {
                value: Some(Operand::Const(Constant::bool(false)))
            }
        );
    }
}
