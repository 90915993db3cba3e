//! Whole-program mutation.
//!
//! [`Mutator`] drives the stages over every function of a program:
//!
//! 1. Preprocessing: variable phis are demoted and phi blocks get proxies.
//! 2. A copy of the preprocessed program is kept as the *subject*. Mutant
//!    metadata positions refer to it.
//! 3. Per function: statements are extracted, mutants generated and encoded,
//!    and the function is verified.
//! 4. The selector global and the range-marker declaration are added, the
//!    selector is initialised to one past the highest ID and the whole program
//!    is verified.
//!
//! The program is taken by value and only handed back inside a
//! [`MutationRun`] once every check passed.

use crate::{
    ir::{verify_function, verify_program, Function, FunctionAttributes, Global, Program, Type},
    mutation::{
        demote_variable_phis, insert_phi_proxies, GenerationSession, MetaEncoder, MutantGenerator,
        MutantInfo, MutantInfoList, MutationConfig, OperatorRegistry, StatementExtractor,
    },
    Error, Result,
};

/// A program with every mutant encoded behind the selector global.
#[derive(Debug, Clone)]
pub struct EncodedProgram {
    program: Program,
    selector: String,
    range_marker: Option<String>,
    highest: u32,
}

impl EncodedProgram {
    /// Wraps an already encoded program.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotMutated`] if the program has no global named
    /// `selector`.
    pub fn from_parts(
        program: Program,
        selector: impl Into<String>,
        range_marker: Option<String>,
        highest: u32,
    ) -> Result<Self> {
        let selector = selector.into();
        if program.global(&selector).is_none() {
            return Err(Error::NotMutated);
        }
        Ok(Self {
            program,
            selector,
            range_marker,
            highest,
        })
    }

    /// The encoded program.
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    pub(crate) fn program_mut(&mut self) -> &mut Program {
        &mut self.program
    }

    /// Gives up the wrapper and returns the program.
    #[must_use]
    pub fn into_program(self) -> Program {
        self.program
    }

    /// Name of the selector global.
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Name of the range-marker function, if the program calls one.
    #[must_use]
    pub fn range_marker(&self) -> Option<&str> {
        self.range_marker.as_deref()
    }

    pub(crate) fn clear_range_marker(&mut self) {
        self.range_marker = None;
    }

    /// The highest mutant ID the program dispatches to.
    #[must_use]
    pub fn highest_id(&self) -> u32 {
        self.highest
    }

    pub(crate) fn set_highest_id(&mut self, highest: u32) {
        self.highest = highest;
    }

    /// The selector value that runs the unmutated program.
    #[must_use]
    pub fn original_selector_value(&self) -> u32 {
        self.highest + 1
    }
}

/// Everything a generation run produces.
#[derive(Debug, Clone)]
pub struct MutationRun {
    /// The program with all mutants encoded
    pub encoded: EncodedProgram,
    /// Metadata of every mutant, in ID order
    pub mutants: MutantInfoList,
    /// The preprocessed, unmutated program the metadata positions refer to
    pub subject: Program,
}

/// Generates and encodes the mutants of whole programs.
pub struct Mutator {
    config: MutationConfig,
    registry: OperatorRegistry,
}

impl Mutator {
    /// Creates a mutator.
    ///
    /// # Arguments
    ///
    /// * `config` - Symbol names and preprocessing switches.
    /// * `registry` - The operators to apply, in order.
    #[must_use]
    pub fn new(config: MutationConfig, registry: OperatorRegistry) -> Self {
        Self { config, registry }
    }

    /// A mutator with the default configuration and the built-in operators.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the built-in catalog fails to parse.
    pub fn with_defaults() -> Result<Self> {
        Ok(Self::new(MutationConfig::default(), OperatorRegistry::builtin()?))
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &MutationConfig {
        &self.config
    }

    /// The operators in use.
    #[must_use]
    pub fn registry(&self) -> &OperatorRegistry {
        &self.registry
    }

    fn is_mutable(&self, function: &Function) -> bool {
        !function.is_declaration()
            && !function
                .attributes()
                .contains(FunctionAttributes::INSTRUMENTATION)
            && self.config.instrumentation_function.as_deref() != Some(function.name())
    }

    /// Mutates every eligible function of `program`.
    ///
    /// # Errors
    ///
    /// - [`Error::SelectorCollision`] if the program already defines the
    ///   selector.
    /// - [`Error::Malformed`] or [`Error::Verification`] if a stage broke the
    ///   program. The program is dropped in that case.
    pub fn generate(&self, mut program: Program) -> Result<MutationRun> {
        let selector = &self.config.selector_name;
        if program.global(selector).is_some() || program.function(selector).is_some() {
            return Err(Error::SelectorCollision(selector.clone()));
        }

        let mut session = GenerationSession::new();
        for function in program.functions_mut() {
            if !self.is_mutable(function) {
                continue;
            }
            if self.config.demote_phis {
                demote_variable_phis(function);
            }
            insert_phi_proxies(function, &mut session);
        }
        let subject = program.clone();

        let extractor = StatementExtractor::new();
        let generator = MutantGenerator::new(&self.registry, &self.config);
        let encoder = MetaEncoder::new(&self.config);
        let mut mutants = MutantInfoList::new();
        let mut statements_seen = 0;
        let mut sites = 0;

        for function in program.functions_mut() {
            if !self.is_mutable(function) {
                continue;
            }
            let statements = extractor.extract(function, &mut session)?;
            statements_seen += statements.len();
            for statement in &statements {
                let generated = generator.generate(function, statement, &mut session)?;
                if generated.is_empty() {
                    continue;
                }
                for mutant in &generated {
                    mutants.push(MutantInfo::new(function, statement, mutant));
                }
                sites += encoder.encode_statement(function, statement, &generated)?;
            }
            verify_function(function)?;
        }

        let highest = session.highest_mutant_id();
        let mut selector_global = Global::new(selector.clone(), Type::I32, i64::from(highest) + 1);
        selector_global.set_constant(false);
        program.add_global(selector_global);

        let mut range_marker = None;
        if self.config.emit_range_marker && sites > 0 {
            let name = &self.config.range_marker_name;
            if program.function(name).is_none() {
                let mut marker =
                    Function::declaration(name.clone(), vec![Type::I32, Type::I32], Type::Void);
                marker.add_attributes(FunctionAttributes::INSTRUMENTATION);
                program.add_function(marker);
            }
            range_marker = Some(name.clone());
        }

        verify_program(&program)?;
        log::info!(
            "'{}': {} statement(s), {} mutant(s), {} dispatch site(s)",
            program.name(),
            statements_seen,
            highest,
            sites
        );

        Ok(MutationRun {
            encoded: EncodedProgram {
                program,
                selector: selector.clone(),
                range_marker,
                highest,
            },
            mutants,
            subject,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ir::{BinaryOp, FunctionBuilder, Operand},
        mutation::OperatorConfig,
    };

    fn subject() -> Program {
        let mut b = FunctionBuilder::new("main", vec![Type::I32, Type::Ptr], Type::Void);
        b.block("entry");
        let x = b.binary(BinaryOp::Add, Operand::Arg(0), Operand::Arg(0));
        b.store(x, Operand::Arg(1));
        b.ret(None);
        let mut program = Program::new("subject");
        program.add_function(b.finish());
        program
    }

    fn mutator(rules: &str) -> Mutator {
        Mutator::new(
            MutationConfig::default(),
            OperatorRegistry::from_config(&OperatorConfig::parse(rules).unwrap()),
        )
    }

    #[test]
    fn test_selector_initialised_past_highest() {
        let run = mutator("ADD(A, B) --> AddToSub, SUB(A, B); AddToMul, MUL(A, B)")
            .generate(subject())
            .unwrap();
        assert_eq!(run.encoded.highest_id(), 2);
        let selector = run.encoded.program().global(run.encoded.selector()).unwrap();
        assert_eq!(selector.initializer().value(), 3);
        assert!(!selector.is_constant());
        assert_eq!(run.mutants.len(), 2);
        assert!(run.encoded.range_marker().is_some());
    }

    #[test]
    fn test_selector_collision() {
        let mut program = subject();
        program.add_global(Global::new(crate::mutation::DEFAULT_SELECTOR, Type::I32, 0));
        assert!(matches!(
            mutator("ADD(A, B) --> AddToSub, SUB(A, B)").generate(program),
            Err(Error::SelectorCollision(_))
        ));
    }

    #[test]
    fn test_instrumentation_function_untouched() {
        let mut program = subject();
        let mut b = FunctionBuilder::new("helper", vec![Type::I32], Type::I32);
        b.block("entry");
        let y = b.binary(BinaryOp::Add, Operand::Arg(0), Operand::Arg(0));
        b.ret(Some(y));
        program.add_function(b.finish());

        let mut config = MutationConfig::default();
        config.instrumentation_function = Some("helper".to_string());
        let registry = OperatorRegistry::from_config(
            &OperatorConfig::parse("ADD(A, B) --> AddToSub, SUB(A, B)").unwrap(),
        );
        let run = Mutator::new(config, registry).generate(program).unwrap();
        assert_eq!(run.encoded.highest_id(), 1);
        assert!(run.mutants.iter().all(|m| m.function == "main"));
        let helper = run.encoded.program().function("helper").unwrap();
        assert_eq!(helper.layout().len(), 1);
    }

    #[test]
    fn test_no_mutants_still_carries_selector() {
        let run = mutator("MUL(A, B) --> MulToAdd, ADD(A, B)")
            .generate(subject())
            .unwrap();
        assert_eq!(run.encoded.highest_id(), 0);
        assert!(run.encoded.range_marker().is_none());
        let selector = run.encoded.program().global(run.encoded.selector()).unwrap();
        assert_eq!(selector.initializer().value(), 1);
    }
}
