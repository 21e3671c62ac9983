use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    Required { field: String },
    TooShort { field: String, min: usize, actual: usize },
    TooLong { field: String, max: usize, actual: usize },
    UnknownReference { field: String, id: i64 },
    InvalidValue { field: String, message: String },
}

impl ValidationError {
    pub fn field(&self) -> &str {
        match self {
            Self::Required { field }
            | Self::TooShort { field, .. }
            | Self::TooLong { field, .. }
            | Self::UnknownReference { field, .. }
            | Self::InvalidValue { field, .. } => field,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required { field } => write!(f, "Field '{}' is required", field),
            Self::TooShort { field, min, actual } => {
                write!(f, "Field '{}' is too short: {} < {} chars", field, actual, min)
            }
            Self::TooLong { field, max, actual } => {
                write!(f, "Field '{}' is too long: {} > {} chars", field, actual, max)
            }
            Self::UnknownReference { field, id } => {
                write!(f, "Field '{}' references unknown id {}", field, id)
            }
            Self::InvalidValue { field, message } => {
                write!(f, "Field '{}' has invalid value: {}", field, message)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Every violation found for one submitted form, in check order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn has_error_for(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field() == field)
    }

    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }

    pub fn to_error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_error_messages().join("; "))
    }
}

pub fn validate_string_required(value: &str, field_name: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        Err(ValidationError::Required {
            field: field_name.to_string(),
        })
    } else {
        Ok(())
    }
}

/// Lengths count characters, not bytes.
pub fn validate_length(
    value: &str,
    field_name: &str,
    min: Option<usize>,
    max: Option<usize>,
) -> Result<(), ValidationError> {
    let len = value.chars().count();

    if let Some(min_len) = min {
        if len < min_len {
            return Err(ValidationError::TooShort {
                field: field_name.to_string(),
                min: min_len,
                actual: len,
            });
        }
    }

    if let Some(max_len) = max {
        if len > max_len {
            return Err(ValidationError::TooLong {
                field: field_name.to_string(),
                max: max_len,
                actual: len,
            });
        }
    }

    Ok(())
}

pub struct Validator {
    result: ValidationResult,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            result: ValidationResult::new(),
        }
    }

    /// Required text with a length window. An empty value only reports
    /// `Required`, never an additional `TooShort`.
    pub fn text(mut self, value: &str, field_name: &str, min: Option<usize>, max: Option<usize>) -> Self {
        if let Err(e) = validate_string_required(value, field_name) {
            self.result.add_error(e);
        } else if let Err(e) = validate_length(value, field_name, min, max) {
            self.result.add_error(e);
        }
        self
    }

    /// Required reference that must resolve through `exists`.
    pub fn reference<F>(mut self, value: Option<i64>, field_name: &str, exists: F) -> Self
    where
        F: FnOnce(i64) -> bool,
    {
        match value {
            None => self.result.add_error(ValidationError::Required {
                field: field_name.to_string(),
            }),
            Some(id) if !exists(id) => self.result.add_error(ValidationError::UnknownReference {
                field: field_name.to_string(),
                id,
            }),
            Some(_) => {}
        }
        self
    }

    pub fn present<T>(mut self, value: Option<&T>, field_name: &str) -> Self {
        if value.is_none() {
            self.result.add_error(ValidationError::Required {
                field: field_name.to_string(),
            });
        }
        self
    }

    pub fn custom<F>(mut self, validation_fn: F) -> Self
    where
        F: FnOnce() -> Option<ValidationError>,
    {
        if let Some(error) = validation_fn() {
            self.result.add_error(error);
        }
        self
    }

    pub fn validate(self) -> Result<(), ValidationResult> {
        if self.result.is_valid() {
            Ok(())
        } else {
            Err(self.result)
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
