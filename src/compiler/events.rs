//! Event logging for the optimisation pipeline.
//!
//! Passes record what they changed so the reducer (and tests) can inspect
//! why two variants ended up equal. Events can be safely ignored when not
//! needed.
//!
//! # Example
//!
//! ```rust,ignore
//! use metamut::compiler::{EventLog, EventKind};
//!
//! let mut log = EventLog::new();
//! log.record(EventKind::ConstantFolded)
//!     .at("main", 3)
//!     .message("2 + 3 -> 5");
//! assert_eq!(log.summary(), "1 constant folded");
//! ```

use std::{collections::BTreeMap, fmt};

/// Categories of events that can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A load of a read-only global was replaced by its value.
    GlobalFolded,
    /// An operation over constants was evaluated.
    ConstantFolded,
    /// An algebraic identity was applied.
    AlgebraicSimplified,
    /// Operands of a commutative operation were put in canonical order.
    OperandsCanonicalized,
    /// A conditional or multi-way branch became unconditional.
    BranchSimplified,
    /// An instruction was removed.
    InstructionRemoved,
    /// A basic block was removed.
    BlockRemoved,
    /// Two blocks were merged into one.
    BlocksMerged,
    /// A phi node was simplified.
    PhiSimplified,
    /// An unused global or declaration was removed.
    SymbolRemoved,

    /// A pass changed the program during one iteration.
    PassCompleted,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::GlobalFolded => "global folded",
            Self::ConstantFolded => "constant folded",
            Self::AlgebraicSimplified => "algebraic simplification",
            Self::OperandsCanonicalized => "operands canonicalized",
            Self::BranchSimplified => "branch simplified",
            Self::InstructionRemoved => "instruction removed",
            Self::BlockRemoved => "block removed",
            Self::BlocksMerged => "blocks merged",
            Self::PhiSimplified => "phi simplified",
            Self::SymbolRemoved => "symbol removed",
            Self::PassCompleted => "pass completed",
        }
    }

    /// Returns true if this event represents a code transformation.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        !matches!(self, Self::PassCompleted)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single logged event.
#[derive(Debug, Clone)]
pub struct Event {
    /// The type of event.
    pub kind: EventKind,
    /// The function where the event occurred (if applicable).
    pub function: Option<String>,
    /// Location within the function (instruction or block index).
    pub location: Option<usize>,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.function, self.location) {
            (Some(function), Some(at)) => {
                write!(f, "[{}] {}@{}: {}", self.kind, function, at, self.message)
            }
            (Some(function), None) => write!(f, "[{}] {}: {}", self.kind, function, self.message),
            (None, _) => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

/// Builder for creating events with a fluent API.
///
/// Created by [`EventLog::record`]. The event is added to the log when the
/// builder is dropped.
pub struct EventBuilder<'a> {
    log: &'a mut EventLog,
    kind: EventKind,
    function: Option<String>,
    location: Option<usize>,
    message: Option<String>,
}

impl EventBuilder<'_> {
    /// Sets the function and location where the event occurred.
    pub fn at(mut self, function: &str, location: usize) -> Self {
        self.function = Some(function.to_string());
        self.location = Some(location);
        self
    }

    /// Sets a custom message describing the event.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());

        self.log.events.push(Event {
            kind: self.kind,
            function: self.function.take(),
            location: self.location.take(),
            message,
        });
    }
}

/// Collection of events from one pipeline run.
///
/// Statistics are derived from the events rather than tracked separately.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    /// Creates an empty event log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if no events have been logged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Starts building a new event of the given kind.
    pub fn record(&mut self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder {
            log: self,
            kind,
            function: None,
            location: None,
            message: None,
        }
    }

    /// Returns true if any event of the given kind exists.
    #[must_use]
    pub fn has(&self, kind: EventKind) -> bool {
        self.events.iter().any(|e| e.kind == kind)
    }

    /// Returns the number of events of the given kind.
    #[must_use]
    pub fn count(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    /// Returns the number of transformation events.
    #[must_use]
    pub fn transformation_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| e.kind.is_transformation())
            .count()
    }

    /// Iterates over the events in recording order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Returns a one-line summary of transformation counts by kind.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for event in self.events.iter().filter(|e| e.kind.is_transformation()) {
            *counts.entry(event.kind.description()).or_default() += 1;
        }
        if counts.is_empty() {
            return "no changes".to_string();
        }
        counts
            .into_iter()
            .map(|(kind, n)| format!("{n} {kind}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_records_on_drop() {
        let mut log = EventLog::new();
        log.record(EventKind::ConstantFolded)
            .at("f", 2)
            .message("1 + 2 -> 3");
        log.record(EventKind::PassCompleted)
            .message("constant-folding changed the program");
        assert_eq!(log.len(), 2);
        assert!(log.has(EventKind::ConstantFolded));
        assert_eq!(log.transformation_count(), 1);
        assert_eq!(log.summary(), "1 constant folded");
        let first = log.iter().next().unwrap();
        assert_eq!(first.to_string(), "[constant folded] f@2: 1 + 2 -> 3");
    }

    #[test]
    fn test_summary_counts_by_kind() {
        let mut log = EventLog::new();
        assert_eq!(log.summary(), "no changes");
        log.record(EventKind::InstructionRemoved);
        log.record(EventKind::InstructionRemoved);
        log.record(EventKind::BlocksMerged);
        assert_eq!(log.summary(), "1 blocks merged, 2 instruction removed");
    }

    #[test]
    fn test_default_message() {
        let mut log = EventLog::new();
        log.record(EventKind::BlockRemoved);
        let event = log.iter().next().unwrap();
        assert_eq!(event.message, "block removed");
    }
}
