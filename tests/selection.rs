//! Dependence graph and selection integration tests.

use std::collections::HashSet;

use metamut::{
    ir::{BinaryOp, CmpPredicate, Constant, FunctionBuilder, Operand, Program, Type},
    mutation::{MutantInfo, MutantInfoList, Mutator, ReplacerKind},
    selection::{
        DefUseDependence, IrValue, MutantDependenceGraph, MutantSelection, SelectionConfig,
        StaticDependence,
    },
    Error, Result,
};
use proptest::prelude::*;

fn info(id: u32, statement: usize, positions: Vec<usize>) -> MutantInfo {
    MutantInfo {
        id,
        function: "f".to_string(),
        statement,
        fingerprint: String::new(),
        kind: "Kind".to_string(),
        replacer: ReplacerKind::Binary,
        altered: positions.clone(),
        statement_positions: positions,
    }
}

/// 20 mutants, two per statement, over 10 statements.
fn twenty_over_ten() -> MutantInfoList {
    (1..=20u32)
        .map(|id| {
            let statement = ((id - 1) / 2) as usize;
            info(id, statement, vec![statement])
        })
        .collect()
}

fn statement_of(mutants: &MutantInfoList, id: u32) -> usize {
    mutants.get(id).map(|m| m.statement).unwrap_or(usize::MAX)
}

#[test]
fn test_scenario_c_spread_sampling() -> Result<()> {
    let mutants = twenty_over_ten();
    let graph = MutantDependenceGraph::build(&StaticDependence::new(), &mutants);

    for seed in 0..16 {
        let selection = MutantSelection::new(&mutants, &graph, SelectionConfig::seeded(seed))?;

        let small = selection.random_mutants(5);
        assert_eq!(small.spread.len(), 5);
        assert!(small.dummy.is_empty());
        let statements: HashSet<usize> = small
            .spread
            .iter()
            .map(|&id| statement_of(&mutants, id))
            .collect();
        assert_eq!(statements.len(), 5);

        let large = selection.random_mutants(15);
        assert_eq!(large.spread.len(), 10);
        assert_eq!(large.dummy.len(), 5);
        let statements: HashSet<usize> = large
            .spread
            .iter()
            .map(|&id| statement_of(&mutants, id))
            .collect();
        assert_eq!(statements.len(), 10);
        let all: HashSet<u32> = large.spread.iter().chain(&large.dummy).copied().collect();
        assert_eq!(all.len(), 15);

        let everything = selection.random_mutants(50);
        assert_eq!(everything.len(), 20);
    }
    Ok(())
}

#[test]
fn test_smart_selection_respects_threshold() -> Result<()> {
    // Mutant 3 sits at position 2, which reads positions 0, 1 and 3.
    let mutants: MutantInfoList = (1..=4u32)
        .map(|id| info(id, (id - 1) as usize, vec![(id - 1) as usize]))
        .collect();
    let mut source = StaticDependence::new();
    for from in [0, 1, 3] {
        source.add_data(IrValue::new("f", from), IrValue::new("f", 2));
    }
    let graph = MutantDependenceGraph::build(&source, &mutants);

    // Three relaxations leave mutant 3 at 0.75^3, below the default 0.5.
    let selection = MutantSelection::new(&mutants, &graph, SelectionConfig::default())?;
    assert_eq!(selection.smart_select(), vec![1, 2, 4]);

    let lenient = SelectionConfig {
        threshold: 0.4,
        ..SelectionConfig::default()
    };
    let selection = MutantSelection::new(&mutants, &graph, lenient)?;
    assert_eq!(selection.smart_select(), vec![1, 2, 4, 3]);
    Ok(())
}

#[test]
fn test_smart_selection_spreads_over_statements() -> Result<()> {
    let mutants = twenty_over_ten();
    let mut source = StaticDependence::new();
    for pos in 0..9 {
        source.add_data(IrValue::new("f", pos), IrValue::new("f", pos + 1));
    }
    let graph = MutantDependenceGraph::build(&source, &mutants);
    let selection = MutantSelection::new(&mutants, &graph, SelectionConfig::default())?;
    let picked = selection.smart_select();

    assert_eq!(picked[0], 1);
    let statements: HashSet<usize> = picked.iter().map(|&id| statement_of(&mutants, id)).collect();
    assert_eq!(statements.len(), picked.len());
    Ok(())
}

#[test]
fn test_random_selection_from_unordered_store() -> Result<()> {
    let records = [info(2, 1, vec![1]), info(1, 0, vec![0]), info(2, 1, vec![1])];
    let stored = serde_json::json!({ "mutants": records });
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("mutants.json");
    std::fs::write(&path, serde_json::to_string_pretty(&stored)?)?;

    let mutants = MutantInfoList::load(&path)?;
    assert_eq!(mutants.ids(), vec![1, 2]);
    let graph = MutantDependenceGraph::build(&StaticDependence::new(), &mutants);
    for seed in 0..8 {
        let selection = MutantSelection::new(&mutants, &graph, SelectionConfig::seeded(seed))?;
        let picked = selection.random_mutants(3);
        let mut all: Vec<u32> = picked.spread.iter().chain(&picked.dummy).copied().collect();
        all.sort_unstable();
        assert_eq!(all, vec![1, 2]);
    }
    Ok(())
}

#[test]
fn test_graph_from_generated_program() -> Result<()> {
    // int f(int a, int *out) { int s = a + 1; *out = s; return s > 3; }
    let mut b = FunctionBuilder::new("f", vec![Type::I32, Type::Ptr], Type::I1);
    b.block("entry");
    let s = b.binary(BinaryOp::Add, Operand::Arg(0), Operand::Const(Constant::i32(1)));
    b.store(s.clone(), Operand::Arg(1));
    let c = b.cmp(CmpPredicate::Sgt, s, Operand::Const(Constant::i32(3)));
    b.ret(Some(c));
    let mut program = Program::new("graph");
    program.add_function(b.finish());

    let run = Mutator::with_defaults()?.generate(program)?;
    let source = DefUseDependence::new(&run.subject);
    let graph = MutantDependenceGraph::build(&source, &run.mutants);
    assert_eq!(graph.len(), run.mutants.ids().len());
    assert_eq!(graph.highest_id(), run.encoded.highest_id());

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("depends.json");
    graph.save(&path)?;
    let loaded = MutantDependenceGraph::load(&path, &run.mutants)?;
    assert_eq!(loaded, graph);

    let selection = MutantSelection::new(&run.mutants, &loaded, SelectionConfig::seeded(1))?;
    let picked = selection.smart_select();
    assert!(picked.iter().all(|id| run.mutants.get(*id).is_some()));
    Ok(())
}

#[test]
fn test_stale_graph_store() -> Result<()> {
    let mutants = twenty_over_ten();
    let graph = MutantDependenceGraph::build(&StaticDependence::new(), &mutants);
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("depends.json");
    graph.save(&path)?;

    let mut remapped = mutants.clone();
    let mut table: Vec<u32> = (0..=20).collect();
    table[20] = 0;
    remapped.apply_remap(&table)?;
    assert!(matches!(
        MutantDependenceGraph::load(&path, &remapped),
        Err(Error::StaleStore {
            expected: 19,
            found: 20
        })
    ));
    Ok(())
}

proptest! {
    #[test]
    fn prop_dependence_relations_are_symmetric(
        statements in prop::collection::vec(0usize..6, 1..24),
        data in prop::collection::vec((0usize..6, 0usize..6), 0..20),
        control in prop::collection::vec((0usize..6, 0usize..6), 0..20),
    ) {
        let mutants: MutantInfoList = statements
            .iter()
            .enumerate()
            .map(|(idx, &stmt)| info(idx as u32 + 1, stmt, vec![stmt]))
            .collect();
        let mut source = StaticDependence::new();
        for (from, to) in data {
            source.add_data(IrValue::new("f", from), IrValue::new("f", to));
        }
        for (from, to) in control {
            source.add_control(IrValue::new("f", from), IrValue::new("f", to));
        }
        let graph = MutantDependenceGraph::build(&source, &mutants);

        for a in graph.ids() {
            let node = graph.depends(a).unwrap();
            for &b in &node.out_data {
                prop_assert!(graph.depends(b).unwrap().in_data.contains(&a));
            }
            for &b in &node.in_data {
                prop_assert!(graph.depends(b).unwrap().out_data.contains(&a));
            }
            for &b in &node.out_ctrl {
                prop_assert!(graph.depends(b).unwrap().in_ctrl.contains(&a));
            }
            for &b in &node.in_ctrl {
                prop_assert!(graph.depends(b).unwrap().out_ctrl.contains(&a));
            }
            for b in graph.ids() {
                let same = statement_of(&mutants, a) == statement_of(&mutants, b);
                prop_assert_eq!(a != b && same, node.ties.contains(&b));
                if same {
                    prop_assert!(!node.out_data.contains(&b));
                    prop_assert!(!node.out_ctrl.contains(&b));
                }
            }
        }
    }
}
