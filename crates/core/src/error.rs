use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Constraint configuration that is invalid or cannot be honoured for the
/// given school.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("lunch_break_required is enabled but the school defines no break period")]
    NoBreakPeriod,
    #[error("{0} is a hard rule and cannot be disabled")]
    HardRuleDisabled(&'static str),
    #[error("{rule} has invalid weight {weight}; weights must be finite and non-negative")]
    InvalidWeight { rule: &'static str, weight: f64 },
    #[error("max_consecutive_periods limit must be at least 1")]
    ZeroConsecutiveLimit,
    #[error("search.swap_tolerance must be finite and non-negative, got {0}")]
    InvalidTolerance(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    School,
    Period,
    Subject,
    Teacher,
    Class,
    Classroom,
    Requirement,
    Availability,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EntityKind::School => "school",
            EntityKind::Period => "period",
            EntityKind::Subject => "subject",
            EntityKind::Teacher => "teacher",
            EntityKind::Class => "class",
            EntityKind::Classroom => "classroom",
            EntityKind::Requirement => "requirement",
            EntityKind::Availability => "availability record",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    DuplicateId,
    UnknownReference,
    InvalidValue,
    Unschedulable,
}

/// One malformed entity. Validation reports all of them at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{entity} {id}: {message}")]
pub struct InputValidationError {
    pub kind: ValidationErrorKind,
    pub entity: EntityKind,
    pub id: String,
    pub message: String,
}

impl InputValidationError {
    pub(crate) fn new(
        kind: ValidationErrorKind,
        entity: EntityKind,
        id: impl ToString,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            entity,
            id: id.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerateError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("invalid input: {} error(s)", .0.len())]
    InputValidation(Vec<InputValidationError>),
    #[error("generation cancelled")]
    Cancelled,
}

impl From<Vec<InputValidationError>> for GenerateError {
    fn from(errors: Vec<InputValidationError>) -> Self {
        GenerateError::InputValidation(errors)
    }
}
