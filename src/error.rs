//! Error taxonomy shared by the baking tool and the evaluator.
//!
//! Display strings never interpolate their `source`; callers render the whole
//! chain with `{:#}` on an `anyhow::Error` to get a single diagnostic line.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Which dataset a loader or validator was working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetRole {
    GroundTruth,
    Predictions,
}

impl fmt::Display for DatasetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GroundTruth => f.write_str("ground truth"),
            Self::Predictions => f.write_str("predictions"),
        }
    }
}

/// Process exit classes. Codes are part of the CLI contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Internal,
    Usage,
    InputNotFound,
    MalformedJson,
    SchemaViolation,
    CorruptPayload,
    MissingPayload,
}

impl FailureClass {
    pub fn code(self) -> i32 {
        match self {
            Self::Internal => 1,
            Self::Usage => 2,
            Self::InputNotFound => 3,
            Self::MalformedJson => 4,
            Self::SchemaViolation => 5,
            Self::CorruptPayload => 6,
            Self::MissingPayload => 7,
        }
    }
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("input file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed JSON in {origin}")]
    MalformedJson {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
}

impl InputError {
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::NotFound { .. } => FailureClass::InputNotFound,
            Self::Unreadable { .. } => FailureClass::Internal,
            Self::MalformedJson { .. } => FailureClass::MalformedJson,
        }
    }
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("dataset must be a JSON array of documents")]
    NotAList,

    #[error("dataset must contain at least one document")]
    EmptyDataset,

    #[error("document at index {index} is not a JSON object")]
    NotAnObject { index: usize },

    #[error("document at index {index} must declare a non-empty string document_id")]
    MissingDocumentId { index: usize },

    #[error(
        "duplicate document_id '{document_id}' at index {index} (first declared at index {first_index})"
    )]
    DuplicateDocumentId {
        document_id: String,
        index: usize,
        first_index: usize,
    },

    #[error("document '{document_id}' (index {index}) must carry an object-valued 'fields' entry")]
    InvalidFields { index: usize, document_id: String },

    #[error("document '{document_id}' (index {index}) field '{field}' must be a string")]
    NonStringField {
        index: usize,
        document_id: String,
        field: String,
    },

    #[error("document '{document_id}' (index {index}) declares unrecognized field '{field}'")]
    UnrecognizedField {
        index: usize,
        document_id: String,
        field: String,
    },

    #[error("extraction template is invalid: {reason}")]
    Template { reason: String },
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("embedded payload is corrupt ({reason}); rebake the evaluator")]
    CorruptPayload { reason: String },

    #[error(
        "embedded payload was baked for schema version {embedded} but this evaluator uses {expected}; rebake the evaluator"
    )]
    SchemaMismatch { embedded: String, expected: String },

    #[error("failed to serialize canonical dataset")]
    Serialize(#[source] serde_json::Error),

    #[error("failed to compress payload")]
    Compress(#[source] io::Error),
}

impl CodecError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptPayload {
            reason: reason.into(),
        }
    }

    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::CorruptPayload { .. } | Self::SchemaMismatch { .. } => {
                FailureClass::CorruptPayload
            }
            Self::Serialize(_) | Self::Compress(_) => FailureClass::Internal,
        }
    }
}

#[derive(Debug, Error)]
pub enum BakeError {
    #[error("no ground truth given; pass --ground-truth, --ground-truth-json or set GROUND_TRUTH_PATH")]
    MissingSource,

    #[error("ground truth input not found: {}", .path.display())]
    InputNotFound { path: PathBuf },

    #[error("failed to read ground truth from {}", .path.display())]
    UnreadableInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("ground truth from {origin} is not valid JSON")]
    MalformedJson {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("ground truth failed schema validation")]
    SchemaViolation(#[from] SchemaError),

    #[error("failed to encode ground truth payload")]
    Codec(#[from] CodecError),

    #[error("evaluator template not found: {}", .path.display())]
    EvaluatorNotFound { path: PathBuf },

    #[error("failed to read evaluator template {}", .path.display())]
    EvaluatorUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("payload section would expose plaintext of document at index {index}")]
    PlaintextLeak { index: usize },

    #[error("failed to write artifact {}", .path.display())]
    Packaging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl From<InputError> for BakeError {
    fn from(error: InputError) -> Self {
        match error {
            InputError::NotFound { path } => Self::InputNotFound { path },
            InputError::Unreadable { path, source } => Self::UnreadableInput { path, source },
            InputError::MalformedJson { origin, source } => Self::MalformedJson { origin, source },
        }
    }
}

impl BakeError {
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::MissingSource => FailureClass::Usage,
            Self::InputNotFound { .. } | Self::EvaluatorNotFound { .. } => {
                FailureClass::InputNotFound
            }
            Self::MalformedJson { .. } => FailureClass::MalformedJson,
            Self::SchemaViolation(_) => FailureClass::SchemaViolation,
            Self::Codec(error) => error.failure_class(),
            Self::UnreadableInput { .. }
            | Self::EvaluatorUnreadable { .. }
            | Self::PlaintextLeak { .. }
            | Self::Packaging { .. } => FailureClass::Internal,
        }
    }
}

/// Run-time failures of the evaluator surface.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("--predictions is required unless --info or --template is given")]
    MissingPredictions,

    #[error("this evaluator carries no embedded ground truth; bake one with pdf-eval-bake or pass --ground-truth")]
    MissingGroundTruth,

    #[error("failed to load {role}")]
    Input {
        role: DatasetRole,
        #[source]
        source: InputError,
    },

    #[error("{role} failed schema validation")]
    Schema {
        role: DatasetRole,
        #[source]
        source: SchemaError,
    },

    #[error("failed to locate the running evaluator")]
    SelfUnreadable(#[source] io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("failed to write metrics to {}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl EvalError {
    pub fn failure_class(&self) -> FailureClass {
        match self {
            Self::MissingPredictions => FailureClass::Usage,
            Self::MissingGroundTruth => FailureClass::MissingPayload,
            Self::Input { source, .. } => source.failure_class(),
            Self::Schema { .. } => FailureClass::SchemaViolation,
            Self::Codec(error) => error.failure_class(),
            Self::SelfUnreadable(_) | Self::Output { .. } => FailureClass::Internal,
        }
    }
}

/// Classifies an `anyhow` chain by the first typed error found in it.
pub fn classify(error: &anyhow::Error) -> FailureClass {
    for cause in error.chain() {
        if let Some(error) = cause.downcast_ref::<EvalError>() {
            return error.failure_class();
        }
        if let Some(error) = cause.downcast_ref::<BakeError>() {
            return error.failure_class();
        }
        if let Some(error) = cause.downcast_ref::<CodecError>() {
            return error.failure_class();
        }
        if let Some(error) = cause.downcast_ref::<InputError>() {
            return error.failure_class();
        }
        if cause.downcast_ref::<SchemaError>().is_some() {
            return FailureClass::SchemaViolation;
        }
    }
    FailureClass::Internal
}
