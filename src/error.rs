use std::path::PathBuf;
use thiserror::Error;

/// Every failure the library can report. Validation errors raised while
/// building folds or datasets abort the whole cross-validation run.
#[derive(Error, Debug)]
pub enum CcnnError {
    #[error("Shape mismatch in {what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: &'static str,
        expected: String,
        found: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(
        "Batch size {batch_size} does not divide the {instances} training instances; \
         the last partial batch would be silently skipped"
    )]
    BatchRemainder { instances: usize, batch_size: usize },

    #[error("Only {subjects} unique subjects for {folds} folds; every fold needs at least one test subject")]
    TooFewSubjects { subjects: usize, folds: usize },

    #[error("Fold {fold} is out of range for a table with {num_folds} folds")]
    FoldOutOfRange { fold: usize, num_folds: usize },

    #[error("Fold {fold} has an empty {which} split")]
    EmptySplit { fold: usize, which: &'static str },

    #[error("Malformed fold table: {0}")]
    MalformedFoldTable(String),

    #[error("Parameter '{name}' has shape {found:?}, expected {expected:?}")]
    ParamShape {
        name: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Parameter bundle is missing '{0}'")]
    MissingParam(String),

    #[error("Malformed file '{}': {reason}", path.display())]
    Format { path: PathBuf, reason: String },

    #[error("Unable to save data to '{}': {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CcnnError>;
