//! Equivalence reduction integration tests.
//!
//! Mutants are generated with `Mutator`, reduced with `EquivalenceReducer`
//! and the rewritten program and metadata are checked against the expected
//! remap tables.

use metamut::{
    ir::{canonical_text, BinaryOp, FunctionBuilder, Op, Operand, Program, Type},
    mutation::{MutationConfig, MutationRun, Mutator, OperatorConfig, OperatorRegistry},
    tce::{extract_mutant, EquivalenceReducer, ReductionConfig},
    Error, Result,
};

fn subject() -> Program {
    let mut b = FunctionBuilder::new("main", vec![Type::I32, Type::I32, Type::Ptr], Type::Void);
    b.block("entry");
    let x = b.binary(BinaryOp::Add, Operand::Arg(0), Operand::Arg(1));
    b.store(x, Operand::Arg(2));
    b.ret(None);
    let mut program = Program::new("scenario_b");
    program.add_function(b.finish());
    program
}

fn generate(rules: &str) -> Result<MutationRun> {
    let config = OperatorConfig::parse(rules)?;
    Mutator::new(
        MutationConfig::default(),
        OperatorRegistry::from_config(&config),
    )
    .generate(subject())
}

const SCENARIO_B: &str =
    "ADD(A, B) --> AddToMul, MUL(A, B); AddToMulSwapped, MUL(B, A); AddSwapped, ADD(B, A)";

#[test]
fn test_scenario_b_duplicates_collapse() -> Result<()> {
    let mut run = generate(SCENARIO_B)?;
    assert_eq!(run.encoded.highest_id(), 3);

    let report = EquivalenceReducer::new(ReductionConfig::default())
        .reduce(&mut run.encoded, &mut run.mutants)?;
    assert_eq!(report.pre, 3);
    assert_eq!(report.post, 1);
    assert_eq!(report.remap, vec![0, 1, 1, 0]);
    assert_eq!(report.equivalent(), vec![3]);
    assert_eq!(report.duplicates(), vec![(2, 1)]);

    // The duplicate's record now carries the survivor's ID.
    assert_eq!(run.mutants.len(), 2);
    assert!(run.mutants.iter().all(|m| m.id == 1));
    assert_eq!(run.mutants.get(1).map(|m| m.kind.as_str()), Some("AddToMul"));

    assert_eq!(run.encoded.highest_id(), 1);
    let selector = run
        .encoded
        .program()
        .global(run.encoded.selector())
        .ok_or(Error::NotMutated)?;
    assert_eq!(selector.initializer().value(), 2);

    let main = run.encoded.program().function("main").unwrap();
    let cases: Vec<i64> = main
        .iter_instructions()
        .filter_map(|(_, _, id)| match main.instruction(id).op() {
            Op::Switch { cases, .. } => Some(cases.iter().map(|(v, _)| *v).collect::<Vec<_>>()),
            _ => None,
        })
        .flatten()
        .collect();
    assert_eq!(cases, vec![1]);
    Ok(())
}

#[test]
fn test_reduction_is_deterministic() -> Result<()> {
    let reducer = EquivalenceReducer::default();
    let mut first = generate(SCENARIO_B)?;
    let mut second = generate(SCENARIO_B)?;
    let a = reducer.reduce(&mut first.encoded, &mut first.mutants)?;
    let b = reducer.reduce(&mut second.encoded, &mut second.mutants)?;
    assert_eq!(a, b);
    assert_eq!(
        canonical_text(first.encoded.program()),
        canonical_text(second.encoded.program())
    );
    Ok(())
}

#[test]
fn test_merged_mutants_are_identical() -> Result<()> {
    let run = generate(SCENARIO_B)?;
    let mul = canonical_text(&extract_mutant(&run.encoded, 1)?);
    let swapped = canonical_text(&extract_mutant(&run.encoded, 2)?);
    let original = canonical_text(&extract_mutant(&run.encoded, 0)?);
    assert_eq!(mul, swapped);
    assert_ne!(mul, original);
    assert_eq!(canonical_text(&extract_mutant(&run.encoded, 3)?), original);
    Ok(())
}

#[test]
fn test_reduced_mutant_still_selectable() -> Result<()> {
    let mut run = generate(SCENARIO_B)?;
    let before = canonical_text(&extract_mutant(&run.encoded, 1)?);
    EquivalenceReducer::default().reduce(&mut run.encoded, &mut run.mutants)?;
    let after = canonical_text(&extract_mutant(&run.encoded, 1)?);
    assert_eq!(before, after);
    assert!(matches!(
        extract_mutant(&run.encoded, 2),
        Err(Error::UnknownMutant { id: 2, highest: 1 })
    ));
    Ok(())
}
