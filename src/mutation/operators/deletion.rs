//! Statement deletion.

use crate::{
    ir::Function,
    mutation::{
        operators::{
            FragmentBuilder, MatchHit, MatchSite, MutantCandidate, MutationOperator,
            OperatorMatch, ReplacerKind,
        },
        Statement,
    },
    Result,
};

/// Replaces a whole statement with nothing.
///
/// Only statements that live in one block and fall through to the next
/// instruction can be deleted: removing a terminator would leave control
/// nowhere to go.
pub struct DeleteStatementOperator {
    name: String,
}

impl DeleteStatementOperator {
    /// Creates the operator with the given kind label.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl MutationOperator for DeleteStatementOperator {
    fn name(&self) -> &str {
        &self.name
    }

    fn replacer(&self) -> ReplacerKind {
        ReplacerKind::DeleteStatement
    }

    fn matches(&self, site: &MatchSite<'_>) -> Option<OperatorMatch> {
        let statement = site.statement();
        let [portion] = statement.portions() else {
            return None;
        };
        let last = portion.last()?;
        if site.function().instruction(last).op().is_terminator() || site.mutable().is_empty() {
            return None;
        }
        Some(OperatorMatch::new(vec![MatchHit {
            altered: site.mutable().to_vec(),
            ..MatchHit::default()
        }]))
    }

    fn replace(
        &self,
        found: &OperatorMatch,
        function: &mut Function,
        _statement: &Statement,
    ) -> Result<Vec<MutantCandidate>> {
        Ok(found
            .hits()
            .iter()
            .map(|hit| MutantCandidate {
                fragments: vec![FragmentBuilder::empty(function, 0).finish(function)],
                altered: hit.altered.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{BinaryOp, Constant, FunctionBuilder, Operand, Type},
        mutation::{GenerationSession, StatementExtractor},
    };

    #[test]
    fn test_deletes_only_fall_through_statements() {
        let mut b = FunctionBuilder::new("f", vec![Type::I32, Type::Ptr], Type::I32);
        b.block("entry");
        let x = b.binary(BinaryOp::Add, Operand::Arg(0), Operand::Const(Constant::i32(2)));
        b.store(x, Operand::Arg(1));
        b.ret(Some(Operand::Arg(0)));
        let mut f = b.finish();
        let statements = StatementExtractor::new()
            .extract(&mut f, &mut GenerationSession::new())
            .unwrap();
        assert_eq!(statements.len(), 2);

        let op = DeleteStatementOperator::new("Del");
        let store = statements[0].instructions().to_vec();
        let found = op
            .matches(&MatchSite::new(&f, &statements[0], &store))
            .unwrap();
        let candidates = op.replace(&found, &mut f, &statements[0]).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].altered, store);
        let block = candidates[0].fragments[0].entry().unwrap();
        assert!(f.block(block).is_empty());

        let ret = statements[1].instructions().to_vec();
        assert!(op
            .matches(&MatchSite::new(&f, &statements[1], &ret))
            .is_none());
    }
}
