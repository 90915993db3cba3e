//! Greedy and random mutant selection.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

use crate::{
    mutation::MutantInfoList,
    selection::{MutantDependenceGraph, SelectionConfig},
    Error, Result,
};

/// Outcome of [`MutantSelection::random_mutants`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RandomSelection {
    /// At most one mutant per statement
    pub spread: Vec<u32>,
    /// Picks requested beyond one per statement
    pub dummy: Vec<u32>,
}

impl RandomSelection {
    /// Total number of picked mutants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.spread.len() + self.dummy.len()
    }

    /// Returns `true` if nothing was picked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spread.is_empty() && self.dummy.is_empty()
    }
}

/// Chooses a subset of mutants to execute.
pub struct MutantSelection<'a> {
    mutants: &'a MutantInfoList,
    graph: &'a MutantDependenceGraph,
    config: SelectionConfig,
}

impl<'a> MutantSelection<'a> {
    /// Creates a selection engine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleStore`] if `graph` was built for a different set
    /// of mutant IDs than `mutants`.
    pub fn new(
        mutants: &'a MutantInfoList,
        graph: &'a MutantDependenceGraph,
        config: SelectionConfig,
    ) -> Result<Self> {
        if graph.highest_id() != mutants.highest_id() || !graph.ids().eq(mutants.ids()) {
            return Err(Error::StaleStore {
                expected: mutants.highest_id(),
                found: graph.highest_id(),
            });
        }
        Ok(Self {
            mutants,
            graph,
            config,
        })
    }

    /// The settings in use.
    #[must_use]
    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// Greedy selection spreading picks over the dependence graph.
    ///
    /// Every mutant starts with score 1. The highest scoring mutant is picked
    /// (lowest ID on equal scores) and the scores of its tie, data and control
    /// neighbours that are still candidates are multiplied by the matching
    /// relaxation factor. Picking stops when the best remaining score is
    /// below the threshold.
    ///
    /// # Returns
    ///
    /// The picked IDs in pick order.
    #[must_use]
    pub fn smart_select(&self) -> Vec<u32> {
        let mut scores: BTreeMap<u32, f64> = self
            .mutants
            .ids()
            .into_iter()
            .map(|id| (id, 1.0))
            .collect();
        let mut selected = Vec::new();

        loop {
            let mut best: Option<(u32, f64)> = None;
            for (&id, &score) in &scores {
                if best.map_or(true, |(_, top)| score > top) {
                    best = Some((id, score));
                }
            }
            let Some((pick, score)) = best else {
                break;
            };
            if score < self.config.threshold {
                break;
            }
            scores.remove(&pick);
            selected.push(pick);
            self.relax(pick, &mut scores);
        }

        log::info!(
            "smart selection: {} of {} mutant(s) at threshold {}",
            selected.len(),
            self.mutants.ids().len(),
            self.config.threshold
        );
        selected
    }

    fn relax(&self, pick: u32, scores: &mut BTreeMap<u32, f64>) {
        let Some(node) = self.graph.depends(pick) else {
            return;
        };
        let data: BTreeSet<u32> = node.out_data.union(&node.in_data).copied().collect();
        let ctrl: BTreeSet<u32> = node.out_ctrl.union(&node.in_ctrl).copied().collect();
        let relations = [
            (&node.ties, self.config.tie_relaxation),
            (&data, self.config.data_relaxation),
            (&ctrl, self.config.control_relaxation),
        ];
        for (neighbours, factor) in relations {
            for id in neighbours {
                if let Some(score) = scores.get_mut(id) {
                    *score *= factor;
                }
            }
        }
    }

    fn rng(&self) -> StdRng {
        match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Draws `number` mutants uniformly without replacement.
    ///
    /// Draws go to the spread list as long as they hit a statement not yet
    /// represented there. Once every statement is represented, further draws
    /// go to the dummy list.
    #[must_use]
    pub fn random_mutants(&self, number: usize) -> RandomSelection {
        let mut pool = self.mutants.ids();
        pool.shuffle(&mut self.rng());

        let mut result = RandomSelection::default();
        let mut covered: HashSet<usize> = HashSet::new();
        let mut surplus = Vec::new();
        for id in pool {
            if result.spread.len() == number {
                break;
            }
            match self.mutants.get(id) {
                Some(info) if covered.insert(info.statement) => result.spread.push(id),
                _ => surplus.push(id),
            }
        }
        let missing = number.saturating_sub(result.spread.len());
        result.dummy = surplus.into_iter().take(missing).collect();

        log::info!(
            "random selection: {} spread, {} dummy",
            result.spread.len(),
            result.dummy.len()
        );
        result
    }

    /// Draws `number` statement-deletion mutants uniformly without
    /// replacement.
    #[must_use]
    pub fn random_sdl_mutants(&self, number: usize) -> Vec<u32> {
        let mut pool: Vec<u32> = self
            .mutants
            .ids()
            .into_iter()
            .filter(|&id| self.mutants.is_statement_deletion(id))
            .collect();
        pool.shuffle(&mut self.rng());
        pool.truncate(number);
        pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        mutation::{MutantInfo, ReplacerKind},
        selection::StaticDependence,
    };

    fn info(id: u32, statement: usize, replacer: ReplacerKind) -> MutantInfo {
        MutantInfo {
            id,
            function: "f".to_string(),
            statement,
            fingerprint: String::new(),
            kind: "K".to_string(),
            replacer,
            altered: vec![statement],
            statement_positions: vec![statement],
        }
    }

    #[test]
    fn test_smart_select_skips_ties() {
        let mutants: MutantInfoList = [
            info(1, 0, ReplacerKind::Binary),
            info(2, 0, ReplacerKind::Binary),
            info(3, 1, ReplacerKind::Binary),
        ]
        .into_iter()
        .collect();
        let graph = MutantDependenceGraph::build(&StaticDependence::new(), &mutants);
        let selection =
            MutantSelection::new(&mutants, &graph, SelectionConfig::default()).unwrap();
        assert_eq!(selection.smart_select(), vec![1, 3]);
    }

    #[test]
    fn test_smart_select_relaxes_data_dependents() {
        let mutants: MutantInfoList = [
            info(1, 0, ReplacerKind::Binary),
            info(2, 1, ReplacerKind::Binary),
            info(3, 2, ReplacerKind::Binary),
        ]
        .into_iter()
        .collect();
        let mut source = StaticDependence::new();
        source.add_data(
            crate::selection::IrValue::new("f", 0),
            crate::selection::IrValue::new("f", 1),
        );
        let graph = MutantDependenceGraph::build(&source, &mutants);
        let config = SelectionConfig {
            data_relaxation: 0.4,
            ..SelectionConfig::default()
        };
        let selection = MutantSelection::new(&mutants, &graph, config).unwrap();
        assert_eq!(selection.smart_select(), vec![1, 3]);
    }

    #[test]
    fn test_sdl_only() {
        let mutants: MutantInfoList = [
            info(1, 0, ReplacerKind::DeleteStatement),
            info(2, 0, ReplacerKind::Binary),
            info(3, 1, ReplacerKind::DeleteStatement),
        ]
        .into_iter()
        .collect();
        let graph = MutantDependenceGraph::build(&StaticDependence::new(), &mutants);
        let selection =
            MutantSelection::new(&mutants, &graph, SelectionConfig::seeded(7)).unwrap();
        let mut picked = selection.random_sdl_mutants(10);
        picked.sort_unstable();
        assert_eq!(picked, vec![1, 3]);
        assert_eq!(selection.random_sdl_mutants(1).len(), 1);
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let mutants: MutantInfoList = (1..=8)
            .map(|id| info(id, (id as usize) % 3, ReplacerKind::Binary))
            .collect();
        let graph = MutantDependenceGraph::build(&StaticDependence::new(), &mutants);
        let selection =
            MutantSelection::new(&mutants, &graph, SelectionConfig::seeded(42)).unwrap();
        let first = selection.random_mutants(5);
        assert_eq!(first, selection.random_mutants(5));
        assert_eq!(first.spread.len(), 3);
        assert_eq!(first.dummy.len(), 2);
    }

    #[test]
    fn test_graph_with_other_ids_rejected() {
        let built: MutantInfoList = [
            info(1, 0, ReplacerKind::Binary),
            info(3, 1, ReplacerKind::Binary),
        ]
        .into_iter()
        .collect();
        let graph = MutantDependenceGraph::build(&StaticDependence::new(), &built);
        let current: MutantInfoList = [
            info(2, 0, ReplacerKind::Binary),
            info(3, 1, ReplacerKind::Binary),
        ]
        .into_iter()
        .collect();
        assert!(matches!(
            MutantSelection::new(&current, &graph, SelectionConfig::default()),
            Err(Error::StaleStore {
                expected: 3,
                found: 3
            })
        ));
    }

    #[test]
    fn test_stale_graph_rejected() {
        let mutants: MutantInfoList = [info(1, 0, ReplacerKind::Binary)].into_iter().collect();
        let graph = MutantDependenceGraph::default();
        assert!(matches!(
            MutantSelection::new(&mutants, &graph, SelectionConfig::default()),
            Err(Error::StaleStore { .. })
        ));
    }
}
