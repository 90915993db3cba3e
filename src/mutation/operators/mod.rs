//! Mutation operators and the registry that resolves them.
//!
//! An operator is a match/replace rule over one statement. Matching only
//! reads the function; replacing clones the affected statement portion into
//! detached blocks and edits the clone, so the code being mutated is never
//! touched until the encoder wires the fragments in.
//!
//! # Architecture
//!
//! ```text
//! OperatorConfig (rules.rs)
//!     │  one operator per (rule, mutant kind)
//!     ▼
//! OperatorRegistry ──► ExpressionOperator     binary / cmp / operand / const
//!                  └─► DeleteStatementOperator   DELSTMT
//!
//! MutationOperator::matches(&MatchSite) ─► OperatorMatch
//! MutationOperator::replace(&OperatorMatch, ..) ─► Vec<MutantCandidate>
//!                                                  └─ Fragment per portion
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use metamut::mutation::{OperatorConfig, OperatorRegistry};
//!
//! let config = OperatorConfig::parse("ADD(A, B) --> AddToSub, SUB(A, B)")?;
//! let registry = OperatorRegistry::from_config(&config);
//! assert_eq!(registry.len(), 1);
//! ```

mod deletion;
mod expression;
mod rules;

use std::collections::HashMap;

pub use deletion::DeleteStatementOperator;
pub use expression::ExpressionOperator;
pub use rules::{
    MatcherKind, MatcherSpec, MutantSpec, OperatorConfig, OperatorRule, ReplacerKind,
    ReplacerSpec, RuleOperand, DEFAULT_OPERATORS,
};

use crate::{
    ir::{BlockId, BlockOrigin, Function, InstrId, Op, Operand},
    mutation::Statement,
    Result,
};

/// What an operator gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct MatchSite<'a> {
    function: &'a Function,
    statement: &'a Statement,
    mutable: &'a [InstrId],
}

impl<'a> MatchSite<'a> {
    /// Creates a match site.
    ///
    /// # Arguments
    ///
    /// * `function` - The function holding the statement.
    /// * `statement` - The statement being mutated.
    /// * `mutable` - The statement's instructions operators may touch.
    #[must_use]
    pub fn new(function: &'a Function, statement: &'a Statement, mutable: &'a [InstrId]) -> Self {
        Self {
            function,
            statement,
            mutable,
        }
    }

    /// The enclosing function.
    #[must_use]
    pub fn function(&self) -> &'a Function {
        self.function
    }

    /// The statement under mutation.
    #[must_use]
    pub fn statement(&self) -> &'a Statement {
        self.statement
    }

    /// Instructions of the statement that operators may alter, in order.
    #[must_use]
    pub fn mutable(&self) -> &'a [InstrId] {
        self.mutable
    }
}

/// One place an operator matched.
#[derive(Debug, Clone, Default)]
pub struct MatchHit {
    /// Instructions of the original statement this hit alters
    pub altered: Vec<InstrId>,
    /// Matcher placeholder bindings
    pub bindings: HashMap<String, Operand>,
}

/// Result of a successful match: every hit inside the statement.
#[derive(Debug, Clone, Default)]
pub struct OperatorMatch {
    hits: Vec<MatchHit>,
}

impl OperatorMatch {
    /// Creates a match from its hits.
    #[must_use]
    pub fn new(hits: Vec<MatchHit>) -> Self {
        Self { hits }
    }

    /// The hits in statement order.
    #[must_use]
    pub fn hits(&self) -> &[MatchHit] {
        &self.hits
    }
}

/// Replacement code for one portion of a statement.
///
/// The blocks are detached from the layout until the encoder places them. The
/// last block ends in a terminator only if the portion it replaces does.
#[derive(Debug, Clone)]
pub struct Fragment {
    portion: usize,
    blocks: Vec<BlockId>,
    values: HashMap<InstrId, Operand>,
}

impl Fragment {
    /// Index of the statement portion this fragment replaces.
    #[must_use]
    pub fn portion(&self) -> usize {
        self.portion
    }

    /// The fragment's blocks, entry first.
    #[must_use]
    pub fn blocks(&self) -> &[BlockId] {
        &self.blocks
    }

    /// The block dispatch jumps to.
    #[must_use]
    pub fn entry(&self) -> Option<BlockId> {
        self.blocks.first().copied()
    }

    /// The block control leaves the fragment from.
    #[must_use]
    pub fn exit(&self) -> Option<BlockId> {
        self.blocks.last().copied()
    }

    /// What each original value of the portion is replaced with.
    #[must_use]
    pub fn value_of(&self, original: InstrId) -> Option<&Operand> {
        self.values.get(&original)
    }
}

/// One candidate mutant produced by an operator.
#[derive(Debug, Clone)]
pub struct MutantCandidate {
    /// Replacement code, one fragment per altered portion
    pub fragments: Vec<Fragment>,
    /// Original instructions the candidate alters
    pub altered: Vec<InstrId>,
}

/// Clones a statement portion into a detached block and edits the clone.
///
/// Cloning runs in two phases: every instruction is copied first, then the
/// operands of the copies are redirected from the originals to their clones.
pub struct FragmentBuilder {
    portion: usize,
    block: BlockId,
    originals: Vec<InstrId>,
    clones: HashMap<InstrId, InstrId>,
    replaced: HashMap<InstrId, Operand>,
}

impl FragmentBuilder {
    /// Clones portion `portion` of `statement`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the portion does not exist.
    pub fn clone_portion(
        function: &mut Function,
        statement: &Statement,
        portion: usize,
    ) -> Result<Self> {
        let Some(source) = statement.portions().get(portion) else {
            return Err(malformed_error!(
                "statement {} has no portion {}",
                statement.index(),
                portion
            ));
        };
        let originals = source.instructions().to_vec();

        let block = function.create_block("mutant", BlockOrigin::Mutant(0));
        let mut clones = HashMap::with_capacity(originals.len());
        for &original in &originals {
            let copy = function.instruction(original).clone();
            let clone = function.push_instruction(block, copy);
            clones.insert(original, clone);
        }
        for clone in clones.values() {
            for operand in function.instruction_mut(*clone).op_mut().operands_mut() {
                if let Some(id) = operand.as_value() {
                    if let Some(mapped) = clones.get(&id) {
                        *operand = Operand::Value(*mapped);
                    }
                }
            }
        }

        Ok(Self {
            portion,
            block,
            originals,
            clones,
            replaced: HashMap::new(),
        })
    }

    /// Starts an empty fragment for `portion`, used to delete it.
    pub fn empty(function: &mut Function, portion: usize) -> Self {
        Self {
            portion,
            block: function.create_block("mutant", BlockOrigin::Mutant(0)),
            originals: Vec::new(),
            clones: HashMap::new(),
            replaced: HashMap::new(),
        }
    }

    /// Returns the clone of `original`, if it was cloned and not replaced.
    #[must_use]
    pub fn clone_of(&self, original: InstrId) -> Option<InstrId> {
        if self.replaced.contains_key(&original) {
            return None;
        }
        self.clones.get(&original).copied()
    }

    /// Rewrites an operand of the original portion into the fragment's terms.
    #[must_use]
    pub fn remap(&self, operand: &Operand) -> Operand {
        match operand.as_value() {
            Some(id) => {
                if let Some(value) = self.replaced.get(&id) {
                    value.clone()
                } else if let Some(clone) = self.clones.get(&id) {
                    Operand::Value(*clone)
                } else {
                    operand.clone()
                }
            }
            None => operand.clone(),
        }
    }

    /// Gives the clone of `original` a new op, expressed in original operands.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `original` is not in the portion.
    pub fn set_op(&self, function: &mut Function, original: InstrId, mut op: Op) -> Result<()> {
        let Some(clone) = self.clone_of(original) else {
            return Err(malformed_error!("{} is not part of the fragment", original));
        };
        for operand in op.operands_mut() {
            *operand = self.remap(operand);
        }
        function.instruction_mut(clone).set_op(op);
        Ok(())
    }

    /// Drops the clone of `original` and makes its readers use `value`.
    ///
    /// `value` is expressed in original operands.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if `original` is not in the portion.
    pub fn replace_with(
        &mut self,
        function: &mut Function,
        original: InstrId,
        value: &Operand,
    ) -> Result<()> {
        let Some(clone) = self.clone_of(original) else {
            return Err(malformed_error!("{} is not part of the fragment", original));
        };
        let value = self.remap(value);
        function.remove_instruction(self.block, clone);
        let old = Operand::Value(clone);
        for other in self.clones.values() {
            function
                .instruction_mut(*other)
                .op_mut()
                .replace_operand(&old, &value);
        }
        self.replaced.insert(original, value);
        Ok(())
    }

    /// Finishes the fragment.
    #[must_use]
    pub fn finish(self, function: &Function) -> Fragment {
        let mut values = HashMap::new();
        for original in &self.originals {
            if !function.instruction(*original).has_result() {
                continue;
            }
            if let Some(value) = self.replaced.get(original) {
                values.insert(*original, value.clone());
            } else if let Some(clone) = self.clones.get(original) {
                values.insert(*original, Operand::Value(*clone));
            }
        }
        Fragment {
            portion: self.portion,
            blocks: vec![self.block],
            values,
        }
    }
}

/// A match/replace rule over one statement.
pub trait MutationOperator {
    /// Kind label recorded for every mutant this operator creates.
    fn name(&self) -> &str;

    /// The replacer category.
    fn replacer(&self) -> ReplacerKind;

    /// Looks for places in the statement this operator applies to.
    ///
    /// Returns `None` when the operator declines the statement.
    fn matches(&self, site: &MatchSite<'_>) -> Option<OperatorMatch>;

    /// Builds one candidate per hit.
    ///
    /// Implementations only allocate detached blocks and instructions; the
    /// placed code of `function` must stay unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the match does not fit the statement.
    fn replace(
        &self,
        found: &OperatorMatch,
        function: &mut Function,
        statement: &Statement,
    ) -> Result<Vec<MutantCandidate>>;
}

/// Ordered collection of operators, resolved once per run.
#[derive(Default)]
pub struct OperatorRegistry {
    operators: Vec<Box<dyn MutationOperator>>,
}

impl OperatorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves every mutant kind of `config` to an operator, in file order.
    #[must_use]
    pub fn from_config(config: &OperatorConfig) -> Self {
        let mut registry = Self::new();
        for rule in config.rules() {
            for mutant in &rule.mutants {
                match mutant.replacer.kind() {
                    ReplacerKind::DeleteStatement => {
                        registry.register(DeleteStatementOperator::new(mutant.name.clone()));
                    }
                    ReplacerKind::Binary
                    | ReplacerKind::Cmp
                    | ReplacerKind::Operand
                    | ReplacerKind::Const => {
                        registry.register(ExpressionOperator::new(
                            rule.matcher.clone(),
                            mutant.clone(),
                        ));
                    }
                }
            }
        }
        registry
    }

    /// A registry holding the built-in catalog.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the catalog fails to parse.
    pub fn builtin() -> Result<Self> {
        Ok(Self::from_config(&OperatorConfig::builtin()?))
    }

    /// Appends an operator.
    pub fn register<O: MutationOperator + 'static>(&mut self, operator: O) {
        self.operators.push(Box::new(operator));
    }

    /// Iterates over the operators in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn MutationOperator> {
        self.operators.iter().map(AsRef::as_ref)
    }

    /// Number of registered operators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operators.len()
    }

    /// Returns `true` if no operator is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{BinaryOp, Constant, FunctionBuilder, Type},
        mutation::{GenerationSession, StatementExtractor},
    };

    #[test]
    fn test_registry_order_follows_config() {
        let config = OperatorConfig::parse(
            "ADD(A, B) --> AddToSub, SUB(A, B); AddToMul, MUL(A, B)\nSTMT --> Del, DELSTMT",
        )
        .unwrap();
        let registry = OperatorRegistry::from_config(&config);
        let names: Vec<&str> = registry.iter().map(|o| o.name()).collect();
        assert_eq!(names, vec!["AddToSub", "AddToMul", "Del"]);
        assert_eq!(
            registry.iter().last().unwrap().replacer(),
            ReplacerKind::DeleteStatement
        );
    }

    #[test]
    fn test_fragment_clone_remaps_operands() {
        let mut b = FunctionBuilder::new("f", vec![Type::I32, Type::Ptr], Type::Void);
        b.block("entry");
        let x = b.binary(BinaryOp::Add, Operand::Arg(0), Operand::Const(Constant::i32(1)));
        let y = b.binary(BinaryOp::Mul, x.clone(), x.clone());
        b.store(y, Operand::Arg(1));
        b.ret(None);
        let mut f = b.finish();

        let statements = StatementExtractor::new()
            .extract(&mut f, &mut GenerationSession::new())
            .unwrap();
        let statement = &statements[0];
        let x = x.as_value().unwrap();

        let mut builder = FragmentBuilder::clone_portion(&mut f, statement, 0).unwrap();
        builder
            .replace_with(&mut f, x, &Operand::Arg(0))
            .unwrap();
        let fragment = builder.finish(&f);

        let block = fragment.entry().unwrap();
        assert!(!f.is_placed(block));
        let ops: Vec<&Op> = f
            .block(block)
            .instructions()
            .iter()
            .map(|id| f.instruction(*id).op())
            .collect();
        assert_eq!(ops.len(), 2);
        assert_eq!(
            ops[0],
            &Op::Binary {
                op: BinaryOp::Mul,
                lhs: Operand::Arg(0),
                rhs: Operand::Arg(0),
            }
        );
        assert_eq!(fragment.value_of(x), Some(&Operand::Arg(0)));
    }
}
