//! Mutant-level dependence graph.
//!
//! Lifts value-level dependences to mutants: mutant `A` has an outgoing data
//! edge to mutant `B` when some instruction of `A`'s statement has a data
//! dependent in `B`'s statement, and likewise for control dependence. Mutants
//! of the same statement are linked by a tie edge instead; they never get
//! data or control edges between each other.
//!
//! Every relation is stored on both ends, so `B ∈ out_data(A)` holds exactly
//! when `A ∈ in_data(B)`.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{
    mutation::MutantInfoList,
    selection::{DependenceSource, IrValue},
    Error, Result,
};

/// The dependence relations of one mutant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutantDepends {
    /// Mutants data dependent on this one
    pub out_data: BTreeSet<u32>,
    /// Mutants this one is data dependent on
    pub in_data: BTreeSet<u32>,
    /// Mutants control dependent on this one
    pub out_ctrl: BTreeSet<u32>,
    /// Mutants this one is control dependent on
    pub in_ctrl: BTreeSet<u32>,
    /// Other mutants of the same statement
    pub ties: BTreeSet<u32>,
}

/// Adjacency lists over mutant IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutantDependenceGraph {
    highest: u32,
    nodes: BTreeMap<u32, MutantDepends>,
}

impl MutantDependenceGraph {
    /// Builds the graph of every mutant in `mutants`.
    ///
    /// # Arguments
    ///
    /// * `source` - Value-level dependences of the subject program.
    /// * `mutants` - Mutant metadata; statement positions and function names
    ///   identify the values each mutant touches.
    #[must_use]
    pub fn build(source: &dyn DependenceSource, mutants: &MutantInfoList) -> Self {
        let mut graph = Self {
            highest: mutants.highest_id(),
            nodes: mutants
                .ids()
                .into_iter()
                .map(|id| (id, MutantDepends::default()))
                .collect(),
        };

        let mut statements: BTreeMap<u32, BTreeSet<usize>> = BTreeMap::new();
        let mut values: BTreeMap<u32, BTreeSet<IrValue>> = BTreeMap::new();
        let mut owners: HashMap<IrValue, BTreeSet<u32>> = HashMap::new();
        for info in mutants.iter() {
            statements.entry(info.id).or_default().insert(info.statement);
            for &pos in &info.statement_positions {
                let value = IrValue::new(info.function.clone(), pos);
                owners.entry(value.clone()).or_default().insert(info.id);
                values.entry(info.id).or_default().insert(value);
            }
        }
        let share_statement = |a: u32, b: u32| match (statements.get(&a), statements.get(&b)) {
            (Some(x), Some(y)) => !x.is_disjoint(y),
            _ => false,
        };

        for (&from, touched) in &values {
            for value in touched {
                for dependent in source.data_dependents(value) {
                    for &to in owners.get(&dependent).into_iter().flatten() {
                        if to != from && !share_statement(from, to) {
                            graph.add_data(from, to);
                        }
                    }
                }
                for dependent in source.control_dependents(value) {
                    for &to in owners.get(&dependent).into_iter().flatten() {
                        if to != from && !share_statement(from, to) {
                            graph.add_ctrl(from, to);
                        }
                    }
                }
            }
        }

        for group in mutants.by_statement().values() {
            for (i, &a) in group.iter().enumerate() {
                for &b in &group[i + 1..] {
                    graph.add_tie(a, b);
                }
            }
        }

        log::info!(
            "mutant dependence graph: {} mutant(s), {} data, {} control, {} tie edge(s)",
            graph.nodes.len(),
            graph.nodes.values().map(|n| n.out_data.len()).sum::<usize>(),
            graph.nodes.values().map(|n| n.out_ctrl.len()).sum::<usize>(),
            graph.nodes.values().map(|n| n.ties.len()).sum::<usize>() / 2
        );
        graph
    }

    fn add_data(&mut self, from: u32, to: u32) {
        self.nodes.entry(from).or_default().out_data.insert(to);
        self.nodes.entry(to).or_default().in_data.insert(from);
    }

    fn add_ctrl(&mut self, from: u32, to: u32) {
        self.nodes.entry(from).or_default().out_ctrl.insert(to);
        self.nodes.entry(to).or_default().in_ctrl.insert(from);
    }

    fn add_tie(&mut self, a: u32, b: u32) {
        self.nodes.entry(a).or_default().ties.insert(b);
        self.nodes.entry(b).or_default().ties.insert(a);
    }

    /// The highest mutant ID the graph was built for.
    #[must_use]
    pub fn highest_id(&self) -> u32 {
        self.highest
    }

    /// Number of mutants with a node.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The relations of mutant `id`.
    #[must_use]
    pub fn depends(&self, id: u32) -> Option<&MutantDepends> {
        self.nodes.get(&id)
    }

    /// Iterates over the mutant IDs in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes.keys().copied()
    }

    /// Writes the graph as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] or [`Error::Serialization`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Reads a graph written by [`MutantDependenceGraph::save`] and checks it
    /// against the current metadata.
    ///
    /// # Errors
    ///
    /// - [`Error::FileError`] or [`Error::Serialization`] if the store cannot
    ///   be read.
    /// - [`Error::StaleStore`] if the graph covers a different ID range or a
    ///   different set of mutants than `mutants`.
    /// - [`Error::GraphError`] if an edge names a mutant without a node.
    pub fn load(path: impl AsRef<Path>, mutants: &MutantInfoList) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let graph: Self = serde_json::from_reader(reader)?;

        let expected = mutants.highest_id();
        let ids = mutants.ids();
        if graph.highest != expected || !graph.ids().eq(ids.iter().copied()) {
            return Err(Error::StaleStore {
                expected,
                found: graph.highest,
            });
        }
        graph.check_consistency()?;
        Ok(graph)
    }

    fn check_consistency(&self) -> Result<()> {
        for (&id, node) in &self.nodes {
            let relations = [
                (&node.out_data, "out_data"),
                (&node.in_data, "in_data"),
                (&node.out_ctrl, "out_ctrl"),
                (&node.in_ctrl, "in_ctrl"),
                (&node.ties, "ties"),
            ];
            for (set, name) in relations {
                if let Some(other) = set.iter().find(|other| !self.nodes.contains_key(other)) {
                    return Err(Error::GraphError(format!(
                        "{name} of mutant {id} references unknown mutant {other}"
                    )));
                }
            }
            let mirrored = node.out_data.iter().all(|o| self.nodes[o].in_data.contains(&id))
                && node.out_ctrl.iter().all(|o| self.nodes[o].in_ctrl.contains(&id))
                && node.ties.iter().all(|o| self.nodes[o].ties.contains(&id));
            if !mirrored {
                return Err(Error::GraphError(format!(
                    "relations of mutant {id} are not symmetric"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mutation::{MutantInfo, ReplacerKind},
        selection::StaticDependence,
    };

    fn info(id: u32, statement: usize, positions: Vec<usize>) -> MutantInfo {
        MutantInfo {
            id,
            function: "f".to_string(),
            statement,
            fingerprint: String::new(),
            kind: "K".to_string(),
            replacer: ReplacerKind::Binary,
            altered: positions.clone(),
            statement_positions: positions,
        }
    }

    fn sample() -> (StaticDependence, MutantInfoList) {
        let mut source = StaticDependence::new();
        source.add_data(IrValue::new("f", 1), IrValue::new("f", 4));
        source.add_control(IrValue::new("f", 4), IrValue::new("f", 7));
        let mutants = [
            info(1, 0, vec![0, 1]),
            info(2, 0, vec![0, 1]),
            info(3, 1, vec![4, 5]),
            info(4, 2, vec![7]),
        ]
        .into_iter()
        .collect();
        (source, mutants)
    }

    #[test]
    fn test_build_edges() {
        let (source, mutants) = sample();
        let graph = MutantDependenceGraph::build(&source, &mutants);
        assert_eq!(graph.len(), 4);

        let one = graph.depends(1).unwrap();
        assert_eq!(one.out_data, BTreeSet::from([3]));
        assert_eq!(one.ties, BTreeSet::from([2]));
        let three = graph.depends(3).unwrap();
        assert_eq!(three.in_data, BTreeSet::from([1, 2]));
        assert_eq!(three.out_ctrl, BTreeSet::from([4]));
        assert!(three.ties.is_empty());
        assert_eq!(graph.depends(4).unwrap().in_ctrl, BTreeSet::from([3]));
    }

    #[test]
    fn test_store_round_trip_and_staleness() {
        let (source, mutants) = sample();
        let graph = MutantDependenceGraph::build(&source, &mutants);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depends.json");
        graph.save(&path).unwrap();
        assert_eq!(MutantDependenceGraph::load(&path, &mutants).unwrap(), graph);

        let fewer: MutantInfoList = mutants.iter().filter(|m| m.id < 4).cloned().collect();
        assert!(matches!(
            MutantDependenceGraph::load(&path, &fewer),
            Err(Error::StaleStore {
                expected: 3,
                found: 4
            })
        ));
    }

    #[test]
    fn test_missing_store() {
        let (_, mutants) = sample();
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            MutantDependenceGraph::load(dir.path().join("absent.json"), &mutants),
            Err(Error::FileError(_))
        ));
    }
}
