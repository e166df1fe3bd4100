use std::error::Error;
use std::fmt;

/// Failures raised by the teaching protocol and its collaborators.
///
/// Contract violations by a teacher or learner are not recoverable; they
/// propagate to the caller of `teach` wrapped in `anyhow::Error` and can be
/// recovered with `downcast_ref::<TeachingError>()`.
#[derive(Debug, Clone, PartialEq)]
pub enum TeachingError {
    /// The label vector has fewer than two classes or does not start at 0.
    InvalidLabels(String),
    /// Feature matrix and label vector disagree on the number of rows.
    ShapeMismatch { rows: usize, labels: usize },
    /// A teacher broke the id contract (too many ids, duplicates, empty first batch).
    ProtocolViolation(String),
    /// The protocol finished without a single round.
    NoRounds {
        teacher: String,
        learner: String,
        dataset: String,
    },
    UnknownStrategy(String),
    UnknownTeacher(String),
    UnknownLearner(String),
    InvalidParameter { param: String, reason: String },
    /// Two results with different dataset/teacher/learner identity were combined.
    IdentityMismatch(String),
    /// Two timers with different phase names were combined.
    PhaseMismatch { left: Vec<String>, right: Vec<String> },
    NotFitted(String),
}

impl fmt::Display for TeachingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TeachingError::InvalidLabels(msg) => write!(f, "Invalid labels: {}", msg),
            TeachingError::ShapeMismatch { rows, labels } => write!(
                f,
                "Feature matrix has {} rows but label vector has {} entries",
                rows, labels
            ),
            TeachingError::ProtocolViolation(msg) => write!(f, "Protocol violation: {}", msg),
            TeachingError::NoRounds {
                teacher,
                learner,
                dataset,
            } => write!(
                f,
                "There was no training round (teacher: {}, learner: {}, dataset: {})",
                teacher, learner, dataset
            ),
            TeachingError::UnknownStrategy(s) => write!(f, "Unknown batch strategy: {}", s),
            TeachingError::UnknownTeacher(s) => write!(f, "Unknown teacher: {}", s),
            TeachingError::UnknownLearner(s) => write!(f, "Unknown learner: {}", s),
            TeachingError::InvalidParameter { param, reason } => {
                write!(f, "Invalid parameter '{}': {}", param, reason)
            }
            TeachingError::IdentityMismatch(msg) => {
                write!(f, "Cannot combine teaching results: {}", msg)
            }
            TeachingError::PhaseMismatch { left, right } => write!(
                f,
                "Timer phases differ: {:?} vs {:?}",
                left, right
            ),
            TeachingError::NotFitted(name) => write!(f, "{} must be fitted before predict", name),
        }
    }
}

impl Error for TeachingError {}
