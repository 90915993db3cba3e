//! Applies the registered operators to one statement.

use std::collections::HashSet;

use crate::{
    ir::{Function, InstrId},
    mutation::{
        operators::{Fragment, MatchSite, MutantCandidate, OperatorRegistry, ReplacerKind},
        GenerationSession, MutationConfig, Statement,
    },
    Result,
};

/// A generated mutant, ready to be encoded.
#[derive(Debug, Clone)]
pub struct Mutant {
    id: u32,
    kind: String,
    replacer: ReplacerKind,
    statement: usize,
    fragments: Vec<Fragment>,
    altered: Vec<InstrId>,
}

impl Mutant {
    /// The mutant's ID.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Kind label of the operator that produced it.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Replacer category of the producing operator.
    #[must_use]
    pub fn replacer(&self) -> ReplacerKind {
        self.replacer
    }

    /// Index of the originating statement.
    #[must_use]
    pub fn statement(&self) -> usize {
        self.statement
    }

    /// Replacement fragments, at most one per statement portion.
    #[must_use]
    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    /// The fragment replacing portion `portion`, if the mutant alters it.
    #[must_use]
    pub fn fragment_for(&self, portion: usize) -> Option<&Fragment> {
        self.fragments.iter().find(|f| f.portion() == portion)
    }

    /// Original instructions the mutant alters.
    #[must_use]
    pub fn altered(&self) -> &[InstrId] {
        &self.altered
    }
}

/// Runs every operator of a registry over statements.
///
/// Operators run in registry order and each accepted candidate gets the next
/// ID of the session, so IDs follow operator-then-candidate order.
pub struct MutantGenerator<'a> {
    registry: &'a OperatorRegistry,
    config: &'a MutationConfig,
}

impl<'a> MutantGenerator<'a> {
    /// Creates a generator.
    #[must_use]
    pub fn new(registry: &'a OperatorRegistry, config: &'a MutationConfig) -> Self {
        Self { registry, config }
    }

    /// Returns the instructions of `statement` operators may see.
    ///
    /// Allocations and debug markers are filtered out. Returns `None` for a
    /// statement that must not be mutated at all: one that injects symbolic
    /// values, or one made only of debug markers.
    #[must_use]
    pub fn mutable_instructions(
        &self,
        function: &Function,
        statement: &Statement,
    ) -> Option<Vec<InstrId>> {
        let mut mutable = Vec::with_capacity(statement.len());
        for &id in statement.instructions() {
            let instr = function.instruction(id);
            if instr.is_call_to(&self.config.symbolic_function) {
                return None;
            }
            if instr.op().is_alloca()
                || instr
                    .callee()
                    .is_some_and(|callee| self.config.is_debug_marker(callee))
            {
                continue;
            }
            mutable.push(id);
        }
        (!mutable.is_empty()).then_some(mutable)
    }

    /// Generates every mutant of `statement`.
    ///
    /// Only detached blocks are added to `function`; its placed code is left
    /// unchanged.
    ///
    /// # Errors
    ///
    /// Propagates operator failures.
    pub fn generate(
        &self,
        function: &mut Function,
        statement: &Statement,
        session: &mut GenerationSession,
    ) -> Result<Vec<Mutant>> {
        let Some(mutable) = self.mutable_instructions(function, statement) else {
            return Ok(Vec::new());
        };
        let escaping = self.escaping_values(function, statement);

        let mut mutants = Vec::new();
        for operator in self.registry.iter() {
            let found = {
                let site = MatchSite::new(function, statement, &mutable);
                operator.matches(&site)
            };
            let Some(found) = found else {
                continue;
            };
            for candidate in operator.replace(&found, function, statement)? {
                if !self.is_encodable(function, statement, &candidate, &escaping) {
                    log::warn!(
                        "{} in '{}': skipping a candidate for statement {} whose values escape a terminating portion",
                        operator.name(),
                        function.name(),
                        statement.index()
                    );
                    continue;
                }
                mutants.push(Mutant {
                    id: session.next_mutant_id(),
                    kind: operator.name().to_string(),
                    replacer: operator.replacer(),
                    statement: statement.index(),
                    fragments: candidate.fragments,
                    altered: candidate.altered,
                });
            }
        }

        if !mutants.is_empty() {
            log::debug!(
                "statement {} of '{}': {} mutant(s)",
                statement.index(),
                function.name(),
                mutants.len()
            );
        }
        Ok(mutants)
    }

    /// Values of each portion that are read outside that portion.
    fn escaping_values(&self, function: &Function, statement: &Statement) -> Vec<HashSet<InstrId>> {
        let users = function.users();
        statement
            .portions()
            .iter()
            .map(|portion| {
                let inside: HashSet<InstrId> = portion.instructions().iter().copied().collect();
                portion
                    .instructions()
                    .iter()
                    .copied()
                    .filter(|id| {
                        users
                            .get(id)
                            .is_some_and(|u| u.iter().any(|user| !inside.contains(user)))
                    })
                    .collect()
            })
            .collect()
    }

    /// A fragment can be wired in if the values it replaces can be merged back.
    ///
    /// Merging needs a block after the portion, so a portion ending in a
    /// terminator must not define values read elsewhere, and the fragment has
    /// to provide a replacement for every escaping value.
    fn is_encodable(
        &self,
        function: &Function,
        statement: &Statement,
        candidate: &MutantCandidate,
        escaping: &[HashSet<InstrId>],
    ) -> bool {
        candidate.fragments.iter().all(|fragment| {
            let Some(escapes) = escaping.get(fragment.portion()) else {
                return false;
            };
            if escapes.is_empty() {
                return true;
            }
            let terminates = statement.portions()[fragment.portion()]
                .last()
                .is_some_and(|last| function.instruction(last).op().is_terminator());
            !terminates && escapes.iter().all(|id| fragment.value_of(*id).is_some())
        })
    }
}
