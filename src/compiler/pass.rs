//! Pass trait for the optimisation pipeline.
//!
//! Every transformation the equivalence reducer relies on implements
//! [`ProgramPass`]. Passes are plain unit structs; the scheduler owns them as
//! trait objects and runs them in a fixed order until nothing changes.

use crate::{
    compiler::EventLog,
    ir::{Function, Program},
    Result,
};

/// An optimisation pass over the IR.
///
/// Per-function passes implement [`ProgramPass::run_on_function`]. Passes
/// that need to see the whole program (global folding, symbol removal)
/// override [`ProgramPass::is_global`] and [`ProgramPass::run_global`].
pub trait ProgramPass {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Should this pass run on a specific function?
    ///
    /// Called before `run_on_function`. The default skips declarations.
    fn should_run(&self, function: &Function) -> bool {
        !function.is_declaration()
    }

    /// Run the pass on a single function.
    ///
    /// Returns `true` if any changes were made, `false` otherwise.
    ///
    /// # Arguments
    ///
    /// * `function` - The function to transform.
    /// * `events` - Log that receives one event per change.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass fails to process the function.
    fn run_on_function(&self, function: &mut Function, events: &mut EventLog) -> Result<bool>;

    /// Run on the entire program (for interprocedural passes).
    ///
    /// # Errors
    ///
    /// Returns an error if the pass fails to process the program.
    fn run_global(&self, _program: &mut Program, _events: &mut EventLog) -> Result<bool> {
        Ok(false)
    }

    /// Does this pass operate globally?
    ///
    /// Global passes have their `run_global` called instead of iterating
    /// over functions with `run_on_function`.
    fn is_global(&self) -> bool {
        false
    }

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }
}
