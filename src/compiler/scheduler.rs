//! Pass scheduler for orchestrating pass execution.
//!
//! The `PassScheduler` runs an ordered list of [`ProgramPass`]es over a
//! program, repeating the whole list until an iteration makes no change or
//! the iteration limit is reached.

use crate::{
    compiler::{
        pass::ProgramPass, AlgebraicSimplificationPass, BlockMergePass, BranchSimplificationPass,
        ConstantFoldingPass, DeadCodeEliminationPass, EventKind, EventLog, GlobalConstantPass,
        GlobalDcePass,
    },
    ir::Program,
    Result,
};

/// Orchestrates pass execution in a fixpoint loop.
///
/// Within one iteration every pass runs once, in registration order. Global
/// passes see the whole program; per-function passes are applied to each
/// function whose [`ProgramPass::should_run`] accepts it.
pub struct PassScheduler {
    /// Maximum iterations for the entire pipeline.
    max_iterations: usize,
    /// The passes, in execution order.
    passes: Vec<Box<dyn ProgramPass>>,
}

impl Default for PassScheduler {
    fn default() -> Self {
        Self::new(32)
    }
}

impl PassScheduler {
    /// Creates an empty scheduler with the specified iteration limit.
    ///
    /// # Arguments
    ///
    /// * `max_iterations` - Maximum iterations for the entire pipeline before stopping.
    #[must_use]
    pub fn new(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            passes: Vec::new(),
        }
    }

    /// Creates the pipeline used to decide trivial equivalence.
    ///
    /// Global constant folding first turns a pinned selector load into an
    /// immediate; constant folding, algebraic simplification and branch
    /// folding then resolve the dispatch, and dead code elimination, block
    /// merging and global cleanup remove what is left of the other variants.
    #[must_use]
    pub fn standard() -> Self {
        let mut scheduler = Self::default();
        scheduler.add_pass(GlobalConstantPass::new());
        scheduler.add_pass(ConstantFoldingPass::new());
        scheduler.add_pass(AlgebraicSimplificationPass::new());
        scheduler.add_pass(BranchSimplificationPass::new());
        scheduler.add_pass(DeadCodeEliminationPass::new());
        scheduler.add_pass(BlockMergePass::new());
        scheduler.add_pass(GlobalDcePass::new());
        scheduler
    }

    /// Replaces the iteration limit.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Appends a pass to the pipeline.
    pub fn add_pass<P: ProgramPass + 'static>(&mut self, pass: P) {
        self.passes.push(Box::new(pass));
    }

    /// Returns the names of the registered passes in execution order.
    #[must_use]
    pub fn pass_names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    /// Runs all passes once over the program.
    ///
    /// Returns `true` if any pass made changes, `false` otherwise.
    fn run_passes_once(&self, program: &mut Program, events: &mut EventLog) -> Result<bool> {
        let mut any_changed = false;

        for pass in &self.passes {
            let changed = if pass.is_global() {
                pass.run_global(program, events)?
            } else {
                let mut changed = false;
                for function in program.functions_mut() {
                    if !pass.should_run(function) {
                        continue;
                    }
                    changed |= pass.run_on_function(function, events)?;
                }
                changed
            };

            if changed {
                events
                    .record(EventKind::PassCompleted)
                    .message(format!("{} changed the program", pass.name()));
            }
            any_changed |= changed;
        }

        Ok(any_changed)
    }

    /// Runs the pipeline until no pass makes a change.
    ///
    /// # Arguments
    ///
    /// * `program` - The program to transform in place.
    /// * `events` - Log that receives the events of every pass.
    ///
    /// # Returns
    ///
    /// The number of iterations completed.
    ///
    /// # Errors
    ///
    /// Returns an error if any pass fails during execution.
    pub fn run_pipeline(&self, program: &mut Program, events: &mut EventLog) -> Result<usize> {
        let mut iterations = 0;
        for iteration in 0..self.max_iterations {
            iterations = iteration + 1;
            if !self.run_passes_once(program, events)? {
                break;
            }
        }
        if iterations == self.max_iterations {
            log::debug!(
                "pass pipeline on '{}' stopped after {} iterations",
                program.name(),
                iterations
            );
        }
        Ok(iterations)
    }
}
