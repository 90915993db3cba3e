//! Trivial compiler equivalence.
//!
//! For every selector value from 0 (the original program) through the highest
//! mutant ID, a copy of the encoded program is pinned to that value and
//! optimised, then compared against the retained representatives:
//!
//! ```text
//! id 0 ─► pin ─► optimise ─► digest ───────────────► original
//! id k ─► pin ─► optimise ─► digest ─┬─ == original ─► remap[k] = 0
//!                                    ├─ == rep of j ─► remap[k] = remap[j]
//!                                    └─ otherwise ───► remap[k] = next ID
//! ```
//!
//! Only one optimised copy is alive at a time; representatives are kept as
//! digests. The remap table is then applied to the dispatch sites of the
//! encoded program and to the mutant metadata.

use std::collections::HashMap;

use crate::{
    compiler::{EventLog, PassScheduler},
    ir::{verify_program, BlockOrigin, Constant, Instruction, Op, Operand, Program, Type},
    mutation::{dispatch_sites, EncodedProgram, MutantInfoList},
    tce::{EquivalenceOracle, StructuralDiff},
    Error, Result,
};

/// Settings of the reducer.
#[derive(Debug, Clone)]
pub struct ReductionConfig {
    /// Iteration limit of the optimisation pipeline, per pinned copy
    pub max_iterations: usize,
}

impl Default for ReductionConfig {
    fn default() -> Self {
        Self { max_iterations: 32 }
    }
}

/// Outcome of a reduction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReductionReport {
    /// Number of mutants before the reduction
    pub pre: u32,
    /// Number of surviving mutants
    pub post: u32,
    /// `remap[old]` is the new ID of mutant `old`, 0 if it is equivalent to
    /// the original program. `remap[0]` is always 0.
    pub remap: Vec<u32>,
}

impl ReductionReport {
    /// Old IDs of the mutants equivalent to the original program.
    #[must_use]
    pub fn equivalent(&self) -> Vec<u32> {
        self.old_ids()
            .filter(|&old| self.remap[old as usize] == 0)
            .collect()
    }

    /// Old IDs of the mutants that duplicate an earlier surviving mutant,
    /// paired with the survivor's new ID.
    #[must_use]
    pub fn duplicates(&self) -> Vec<(u32, u32)> {
        let mut seen = vec![false; self.post as usize + 1];
        let mut out = Vec::new();
        for old in self.old_ids() {
            let new = self.remap[old as usize];
            if new == 0 {
                continue;
            }
            if seen[new as usize] {
                out.push((old, new));
            }
            seen[new as usize] = true;
        }
        out
    }

    fn old_ids(&self) -> impl Iterator<Item = u32> + '_ {
        (1..self.remap.len()).filter_map(|old| u32::try_from(old).ok())
    }
}

/// Collapses mutants that optimise to the same program.
pub struct EquivalenceReducer<O: EquivalenceOracle = StructuralDiff> {
    config: ReductionConfig,
    oracle: O,
}

impl EquivalenceReducer<StructuralDiff> {
    /// Creates a reducer comparing canonical program text.
    #[must_use]
    pub fn new(config: ReductionConfig) -> Self {
        Self::with_oracle(config, StructuralDiff::new())
    }
}

impl Default for EquivalenceReducer<StructuralDiff> {
    fn default() -> Self {
        Self::new(ReductionConfig::default())
    }
}

impl<O: EquivalenceOracle> EquivalenceReducer<O> {
    /// Creates a reducer with a custom equivalence oracle.
    #[must_use]
    pub fn with_oracle(config: ReductionConfig, oracle: O) -> Self {
        Self { config, oracle }
    }

    /// The settings in use.
    #[must_use]
    pub fn config(&self) -> &ReductionConfig {
        &self.config
    }

    /// Reduces `encoded` and rewrites `mutants` accordingly.
    ///
    /// # Arguments
    ///
    /// * `encoded` - The encoded program; its dispatch sites are rewritten.
    /// * `mutants` - Metadata of the program's mutants; IDs are remapped and
    ///   the records of mutants equivalent to the original are dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::UnknownMutant`] if the metadata names an ID the program does
    ///   not dispatch to.
    /// - [`Error::Verification`] if the rewritten program is not well formed.
    ///   `encoded` and `mutants` are left unchanged in that case.
    pub fn reduce(
        &self,
        encoded: &mut EncodedProgram,
        mutants: &mut MutantInfoList,
    ) -> Result<ReductionReport> {
        let pre = encoded.highest_id();
        let known = mutants.highest_id();
        if known > pre {
            return Err(Error::UnknownMutant {
                id: known,
                highest: pre,
            });
        }

        let original = self.oracle.digest(&optimised(encoded, 0, &self.scheduler())?);
        let mut representatives: Vec<(u32, O::Digest)> = Vec::new();
        let mut remap = vec![0u32; pre as usize + 1];
        let mut post = 0u32;

        for id in 1..=pre {
            let digest = {
                let pinned = optimised(encoded, id, &self.scheduler())?;
                self.oracle.digest(&pinned)
            };
            if self.oracle.are_distinct(&original, &digest) == Some(false) {
                log::debug!("mutant {id} is equivalent to the original program");
                continue;
            }
            let duplicate = representatives
                .iter()
                .find(|(_, rep)| self.oracle.are_distinct(rep, &digest) == Some(false))
                .map(|(new, _)| *new);
            remap[id as usize] = match duplicate {
                Some(new) => {
                    log::debug!("mutant {id} duplicates surviving mutant {new}");
                    new
                }
                None => {
                    post += 1;
                    representatives.push((post, digest));
                    post
                }
            };
        }
        drop(representatives);

        let mut program = encoded.program().clone();
        let markers_left = rewrite_dispatch(
            &mut program,
            encoded.selector(),
            encoded.range_marker(),
            &remap,
        )?;
        if let Some(global) = program.global_mut(encoded.selector()) {
            global.set_initializer(i64::from(post) + 1);
        }
        if !markers_left {
            if let Some(marker) = encoded.range_marker() {
                program.remove_function(marker);
            }
        }
        verify_program(&program)?;

        *encoded.program_mut() = program;
        encoded.set_highest_id(post);
        if !markers_left {
            encoded.clear_range_marker();
        }
        let dropped = mutants.apply_remap(&remap)?;

        log::info!(
            "TCE on '{}': {} mutant(s) before, {} after, {} equivalent record(s) dropped",
            encoded.program().name(),
            pre,
            post,
            dropped.len()
        );
        Ok(ReductionReport { pre, post, remap })
    }

    fn scheduler(&self) -> PassScheduler {
        PassScheduler::standard().with_max_iterations(self.config.max_iterations)
    }
}

/// Pins the selector of a copy of `encoded` to `id` and optimises it.
fn optimised(encoded: &EncodedProgram, id: u32, scheduler: &PassScheduler) -> Result<Program> {
    let mut program = encoded.program().clone();
    let Some(selector) = program.global_mut(encoded.selector()) else {
        return Err(Error::NotMutated);
    };
    selector.set_initializer(i64::from(id));
    selector.set_constant(true);

    if let Some(marker) = encoded.range_marker() {
        for function in program.functions_mut() {
            let calls: Vec<_> = function
                .iter_instructions()
                .filter(|(_, _, instr)| function.instruction(*instr).is_call_to(marker))
                .map(|(block, _, instr)| (block, instr))
                .collect();
            for (block, instr) in calls {
                function.remove_instruction(block, instr);
            }
        }
    }

    let mut events = EventLog::new();
    let iterations = scheduler.run_pipeline(&mut program, &mut events)?;
    log::debug!(
        "selector {}: {} iteration(s), {} change(s): {}",
        id,
        iterations,
        events.transformation_count(),
        events.summary()
    );
    for event in events.iter() {
        log::trace!("selector {id}: {event}");
    }
    Ok(program)
}

/// Applies `remap` to every dispatch site of `program`.
///
/// A survivor keeps only the case of its lowest old ID, so selecting it runs
/// exactly the representative's code. Sites left without cases branch
/// straight to the original statement.
///
/// # Returns
///
/// `true` if at least one range-marker call remains.
fn rewrite_dispatch(
    program: &mut Program,
    selector: &str,
    marker: Option<&str>,
    remap: &[u32],
) -> Result<bool> {
    let highest = u32::try_from(remap.len().saturating_sub(1)).unwrap_or(u32::MAX);
    let mut representative: HashMap<u32, i64> = HashMap::new();
    for (old, &new) in remap.iter().enumerate().skip(1) {
        if new != 0 {
            representative.entry(new).or_insert(old as i64);
        }
    }

    let mut markers_left = false;
    for function in program.functions_mut() {
        if function.is_declaration() {
            continue;
        }
        let sites = dispatch_sites(function, selector, marker);
        if sites.is_empty() {
            continue;
        }
        for site in sites {
            let mut cases = Vec::with_capacity(site.cases.len());
            for (old, entry) in site.cases {
                let new = usize::try_from(old)
                    .ok()
                    .and_then(|idx| remap.get(idx))
                    .copied()
                    .ok_or(Error::UnknownMutant {
                        id: u32::try_from(old).unwrap_or(u32::MAX),
                        highest,
                    })?;
                if new == 0 || representative.get(&new) != Some(&old) {
                    continue;
                }
                let block = function.block_mut(entry);
                block.set_name(format!("mutant{new}"));
                block.set_origin(BlockOrigin::Mutant(new));
                cases.push((i64::from(new), entry));
            }

            if cases.is_empty() {
                function.remove_instruction(site.block, site.switch);
                function.remove_instruction(site.block, site.load);
                if let Some(call) = site.marker {
                    function.remove_instruction(site.block, call);
                }
                function.push_instruction(
                    site.block,
                    Instruction::new(
                        Op::Br {
                            target: site.original,
                        },
                        Type::Void,
                    ),
                );
                continue;
            }

            if let Some(call) = site.marker {
                let min = cases.iter().map(|(id, _)| *id).min().unwrap_or_default();
                let max = cases.iter().map(|(id, _)| *id).max().unwrap_or_default();
                if let Op::Call { args, .. } = function.instruction_mut(call).op_mut() {
                    *args = vec![
                        Operand::Const(Constant::i32(min)),
                        Operand::Const(Constant::i32(max)),
                    ];
                }
                markers_left = true;
            }
            if let Op::Switch { cases: old, .. } = function.instruction_mut(site.switch).op_mut() {
                *old = cases;
            }
        }
        function.prune_unreachable();
    }
    Ok(markers_left)
}

/// Returns the stand-alone, optimised program of mutant `id`.
///
/// ID 0 yields the optimised original program.
///
/// # Errors
///
/// - [`Error::UnknownMutant`] if `id` is above the highest mutant ID.
/// - [`Error::Verification`] if the optimised program is not well formed.
pub fn extract_mutant(encoded: &EncodedProgram, id: u32) -> Result<Program> {
    let highest = encoded.highest_id();
    if id > highest {
        return Err(Error::UnknownMutant { id, highest });
    }
    let program = optimised(encoded, id, &PassScheduler::standard())?;
    verify_program(&program)?;
    Ok(program)
}
