use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// The variants fall into three classes that callers are expected to treat differently:
///
/// # Error Categories
///
/// ## Internal invariant violations (fatal)
/// - [`Error::Malformed`] - An invariant of the engine itself was broken
/// - [`Error::Verification`] - A produced program failed the well-formedness checks
///
/// A program that caused one of these is never handed back to the caller. Use
/// [`Error::is_internal`] to detect this class.
///
/// ## Configuration errors (recoverable)
/// - [`Error::Config`] - A mutation operator rule could not be parsed or resolved
/// - [`Error::SelectorCollision`] - The subject program already defines the selector
/// - [`Error::NotMutated`] - A stage expected an encoded program and got a plain one
/// - [`Error::UnknownMutant`] - A mutant ID outside the generated range was requested
///
/// ## External store errors (fail only the load/save in question)
/// - [`Error::FileError`] - Filesystem I/O errors
/// - [`Error::Serialization`] - JSON encoding or decoding errors
/// - [`Error::StaleStore`] - A persisted artifact does not match the current mutant set
///
/// # Examples
///
/// ```rust,ignore
/// use metamut::{Error, mutation::OperatorConfig};
///
/// match OperatorConfig::parse("ADD(A,B) -> Broken") {
///     Err(Error::Config { line, message }) => eprintln!("line {line}: {message}"),
///     Err(e) if e.is_internal() => panic!("generation bug: {e}"),
///     Err(e) => eprintln!("{e}"),
///     Ok(_) => {}
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An internal invariant of the engine was violated.
    ///
    /// Raised for conditions that can only be produced by a bug in extraction,
    /// generation or encoding (an instruction reached but never registered with
    /// a statement, a statement whose instructions are not contiguous inside a
    /// block, a dispatch site without a selector). The error includes the source
    /// location where the violation was detected.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was violated
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// A function or program failed the structural well-formedness checks.
    ///
    /// Produced by [`crate::ir::verify_function`] and [`crate::ir::verify_program`].
    /// When raised after encoding or reduction this is fatal: the program that
    /// failed is dropped and never returned.
    #[error("Verification failed in '{function}': {message}")]
    Verification {
        /// Name of the offending function, or `<program>` for module-level checks
        function: String,
        /// What was wrong
        message: String,
    },

    /// A mutation operator rule is malformed or references an unknown operand.
    ///
    /// The line number is 1-based and refers to the configuration text that was
    /// being parsed. Loading aborts at the first bad line.
    #[error("Operator configuration error at line {line}: {message}")]
    Config {
        /// 1-based line of the configuration text
        line: usize,
        /// What was wrong with the line
        message: String,
    },

    /// The subject program already defines a global with the selector's name.
    #[error("The program already contains a global named '{0}'")]
    SelectorCollision(String),

    /// A stage that needs an encoded program was handed one without a selector.
    #[error("The program carries no mutant selector")]
    NotMutated,

    /// A mutant ID outside `0..=highest` was requested.
    #[error("Mutant {id} does not exist (highest is {highest})")]
    UnknownMutant {
        /// The requested ID
        id: u32,
        /// The highest valid ID
        highest: u32,
    },

    /// A persisted artifact does not describe the current mutant set.
    ///
    /// Returned when a dependence graph is loaded against a metadata list with a
    /// different ID range. Only the load fails; the artifact has to be rebuilt.
    #[error("Stale store - expected mutants 1..={expected}, found 1..={found}")]
    StaleStore {
        /// Highest ID of the current metadata
        expected: u32,
        /// Highest ID recorded in the store
        found: u32,
    },

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that occur while reading or writing the
    /// metadata and dependence-graph stores.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// JSON encoding or decoding error.
    #[error("{0}")]
    Serialization(#[from] serde_json::Error),

    /// Error during dependence graph analysis.
    ///
    /// Raised when the dependence graph is inconsistent with itself, for example
    /// an edge that references a mutant without a node.
    #[error("{0}")]
    GraphError(String),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Returns `true` for errors that indicate a bug in the engine rather than
    /// a problem with the caller's input.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::Malformed { .. } | Error::Verification { .. })
    }

    pub(crate) fn verification(function: &str, message: impl Into<String>) -> Self {
        Error::Verification {
            function: function.to_string(),
            message: message.into(),
        }
    }
}
