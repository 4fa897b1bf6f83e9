use thiserror::Error;

#[derive(Error, Debug)]
pub enum FieldTestError {
    #[error("Missing or malformed field: {field}")]
    Validation { field: String },

    #[error("Invalid measurement: {0}")]
    InvalidMeasurement(String),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Curve not found: {0}")]
    MissingCurve(String),

    #[error("Curve has no deflection tolerance: {0}")]
    MissingTolerance(String),

    #[error("Archived record is read-only: {0}")]
    ReadOnlyArchive(String),

    #[error("Curve still referenced by open forms: {0}")]
    CurveInUse(String),

    #[error("Invalid passcode")]
    Unauthorized,

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Persistence failure: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, FieldTestError>;

impl FieldTestError {
    pub(crate) fn validation(field: impl Into<String>) -> Self {
        FieldTestError::Validation {
            field: field.into(),
        }
    }

    /// Backing-store faults. The triggering operation committed nothing and
    /// may be retried.
    pub fn is_persistence_failure(&self) -> bool {
        matches!(
            self,
            FieldTestError::Io(_)
                | FieldTestError::Serialization(_)
                | FieldTestError::Persistence(_)
        )
    }

    /// Errors caused by operator input that can be corrected and resubmitted.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            FieldTestError::Validation { .. } | FieldTestError::InvalidMeasurement(_)
        )
    }
}

impl From<toml::de::Error> for FieldTestError {
    fn from(err: toml::de::Error) -> Self {
        FieldTestError::Config(err.to_string())
    }
}
