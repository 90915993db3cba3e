//! Value-level dependence sources.
//!
//! The dependence graph builder only consumes [`DependenceSource`]; whole
//! program data and control dependence analyses are expected to live outside
//! this crate and be plugged in through it.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::ir::{InstrId, Op, Operand, Program};

/// An instruction of the subject program, addressed by function name and
/// layout position.
///
/// Positions are the ones [`crate::ir::Function::positions`] assigns and that
/// mutant metadata records.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IrValue {
    /// Name of the enclosing function
    pub function: String,
    /// Layout position inside the function
    pub position: usize,
}

impl IrValue {
    /// Creates a value reference.
    #[must_use]
    pub fn new(function: impl Into<String>, position: usize) -> Self {
        Self {
            function: function.into(),
            position,
        }
    }
}

/// Answers data and control dependence queries about IR values.
pub trait DependenceSource {
    /// Values that read what `value` computes or writes.
    fn data_dependents(&self, value: &IrValue) -> Vec<IrValue>;

    /// Values whose execution depends on the outcome of `value`.
    fn control_dependents(&self, value: &IrValue) -> Vec<IrValue>;
}

/// A dependence source backed by explicit adjacency sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticDependence {
    data: BTreeMap<IrValue, BTreeSet<IrValue>>,
    control: BTreeMap<IrValue, BTreeSet<IrValue>>,
}

impl StaticDependence {
    /// Creates a source without edges.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `to` is data dependent on `from`.
    pub fn add_data(&mut self, from: IrValue, to: IrValue) {
        self.data.entry(from).or_default().insert(to);
    }

    /// Records that `to` is control dependent on `from`.
    pub fn add_control(&mut self, from: IrValue, to: IrValue) {
        self.control.entry(from).or_default().insert(to);
    }

    /// Number of recorded data edges.
    #[must_use]
    pub fn data_edges(&self) -> usize {
        self.data.values().map(BTreeSet::len).sum()
    }
}

impl DependenceSource for StaticDependence {
    fn data_dependents(&self, value: &IrValue) -> Vec<IrValue> {
        self.data
            .get(value)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn control_dependents(&self, value: &IrValue) -> Vec<IrValue> {
        self.control
            .get(value)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// Intra-procedural data dependence from the def-use relation.
///
/// A value's dependents are its users, and every store to a stack slot or
/// global has the loads of the same location in that function as
/// dependents. There is no control dependence.
#[derive(Debug, Clone)]
pub struct DefUseDependence {
    inner: StaticDependence,
}

impl DefUseDependence {
    /// Computes the def-use dependences of every defined function.
    #[must_use]
    pub fn new(program: &Program) -> Self {
        let mut inner = StaticDependence::new();
        for function in program.functions() {
            if function.is_declaration() {
                continue;
            }
            let name = function.name();
            let positions = function.positions();
            let value = |id: &InstrId| positions.get(id).map(|&pos| IrValue::new(name, pos));

            for (def, users) in function.users() {
                let Some(from) = value(&def) else {
                    continue;
                };
                for to in users.iter().filter_map(value) {
                    inner.add_data(from.clone(), to);
                }
            }

            let mut stores: HashMap<Operand, Vec<InstrId>> = HashMap::new();
            let mut loads: HashMap<Operand, Vec<InstrId>> = HashMap::new();
            for (_, _, id) in function.iter_instructions() {
                match function.instruction(id).op() {
                    Op::Store { ptr, .. } if is_location(ptr) => {
                        stores.entry(ptr.clone()).or_default().push(id);
                    }
                    Op::Load { ptr } if is_location(ptr) => {
                        loads.entry(ptr.clone()).or_default().push(id);
                    }
                    _ => {}
                }
            }
            for (location, writers) in &stores {
                let Some(readers) = loads.get(location) else {
                    continue;
                };
                for from in writers.iter().filter_map(value) {
                    for to in readers.iter().filter_map(value) {
                        inner.add_data(from.clone(), to);
                    }
                }
            }
        }
        log::debug!(
            "def-use dependence of '{}': {} data edge(s)",
            program.name(),
            inner.data_edges()
        );
        Self { inner }
    }
}

fn is_location(ptr: &Operand) -> bool {
    matches!(ptr, Operand::Value(_) | Operand::Global(_))
}

impl DependenceSource for DefUseDependence {
    fn data_dependents(&self, value: &IrValue) -> Vec<IrValue> {
        self.inner.data_dependents(value)
    }

    fn control_dependents(&self, _value: &IrValue) -> Vec<IrValue> {
        Vec::new()
    }
}
