use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Global type definitions
///
/// Stores the operation-mode enumeration, document field names, run-mode
/// specifications and the harness error type used globally by the crate.

// ============================================================================
// Document field names
// ============================================================================

/// Primary key field, unique per document
pub const ID: &str = "_id";

/// Number of the worker thread that inserted the document, starting from 1
pub const THREAD_ID: &str = "threadId";

/// Number of inserts executed by the inserting thread, starting from 1
pub const THREAD_RUN_COUNT: &str = "threadRunCount";

/// A random i64, rewritten by update modes
pub const RANDOM_LONG: &str = "rnd";

/// Document version, starting from 1, incremented by update modes
pub const VERSION: &str = "v";

/// Optional random text payload of user-defined size
pub const RANDOM_TEXT: &str = "randomText";

// ============================================================================
// Operation modes
// ============================================================================

/// The closed set of operation kinds the harness can drive.
///
/// "one" variants filter on the unique `_id` field, "many" variants filter on
/// the non-unique `threadRunCount` field shared by many documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationMode {
    Insert,
    UpdateOne,
    UpdateMany,
    CountOne,
    CountMany,
    FindOne,
    FindMany,
    DeleteOne,
    DeleteMany,
    Wait,
}

impl OperationMode {
    /// All modes accepted on the command line
    pub const ALL: [OperationMode; 10] = [
        OperationMode::Insert,
        OperationMode::UpdateOne,
        OperationMode::UpdateMany,
        OperationMode::CountOne,
        OperationMode::CountMany,
        OperationMode::FindOne,
        OperationMode::FindMany,
        OperationMode::DeleteOne,
        OperationMode::DeleteMany,
        OperationMode::Wait,
    ];

    /// The document field this mode filters on
    pub fn queried_field(&self) -> &'static str {
        match self {
            OperationMode::UpdateMany
            | OperationMode::CountMany
            | OperationMode::FindMany
            | OperationMode::DeleteMany => THREAD_RUN_COUNT,
            _ => ID,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OperationMode::Insert => "INSERT",
            OperationMode::UpdateOne => "UPDATE_ONE",
            OperationMode::UpdateMany => "UPDATE_MANY",
            OperationMode::CountOne => "COUNT_ONE",
            OperationMode::CountMany => "COUNT_MANY",
            OperationMode::FindOne => "FIND_ONE",
            OperationMode::FindMany => "FIND_MANY",
            OperationMode::DeleteOne => "DELETE_ONE",
            OperationMode::DeleteMany => "DELETE_MANY",
            OperationMode::Wait => "WAIT",
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperationMode {
    type Err = DocbenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_uppercase();
        OperationMode::ALL
            .iter()
            .find(|m| m.name() == upper)
            .copied()
            .ok_or_else(|| {
                DocbenchError::Config(format!(
                    "mode must be one of INSERT, UPDATE_ONE, UPDATE_MANY, COUNT_ONE, \
                     COUNT_MANY, FIND_ONE, FIND_MANY, DELETE_ONE, DELETE_MANY or WAIT, got '{}'",
                    s
                ))
            })
    }
}

// ============================================================================
// Run modes
// ============================================================================

/// One configured combination of operation kind, thread count and budgets.
/// Immutable once a round starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunModeSpec {
    pub mode: OperationMode,
    /// Number of worker threads for this mode-run
    pub threads: usize,
    /// Number of operations to execute; 0 means unbounded (wall clock only)
    pub op_budget: u64,
    /// Hard wall-clock cap for this mode-run
    pub max_duration: Duration,
}

/// How a mode-run ended. A timeout is a status, not a failure: metrics
/// recorded up to the cutoff remain valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    TimedOut,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunOutcome::Completed => write!(f, "in time"),
            RunOutcome::TimedOut => write!(f, "timed out"),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Harness error type
#[derive(Debug)]
pub enum DocbenchError {
    /// Invalid command-line configuration
    Config(String),
    /// Store error surfaced outside a worker loop (setup, teardown)
    Store(crate::store::StoreError),
    /// The bounded recovery sequence was exhausted; the environment is broken
    UnrecoverableStore(String),
    /// A worker or reporter thread died while the run waited on it
    Interrupted(String),
    /// I/O error while writing reports
    Io(std::io::Error),
}

impl fmt::Display for DocbenchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocbenchError::Config(msg) => write!(f, "Configuration error: {}", msg),
            DocbenchError::Store(err) => write!(f, "Store error: {}", err),
            DocbenchError::UnrecoverableStore(msg) => {
                write!(f, "Unrecoverable store failure: {}", msg)
            }
            DocbenchError::Interrupted(msg) => write!(f, "Interrupted: {}", msg),
            DocbenchError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for DocbenchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DocbenchError::Store(err) => Some(err),
            DocbenchError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<crate::store::StoreError> for DocbenchError {
    fn from(err: crate::store::StoreError) -> Self {
        DocbenchError::Store(err)
    }
}

impl From<std::io::Error> for DocbenchError {
    fn from(err: std::io::Error) -> Self {
        DocbenchError::Io(err)
    }
}

/// Result type for harness operations
pub type DocbenchResult<T> = Result<T, DocbenchError>;
