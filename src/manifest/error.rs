use thiserror::Error;

/// Errors produced while parsing or validating a recipe descriptor.
///
/// All of these are recoverable from the host's point of view: the manifest is
/// rejected (or the submitted configuration is refused) and the host keeps running.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("missing required field '{0}'")]
    MissingField(String),

    #[error("type mismatch in '{field}': {detail}")]
    TypeMismatch { field: String, detail: String },

    #[error("duplicate parameter name '{0}'")]
    DuplicateParamName(String),

    #[error("parameter '{param}' references unknown role '{role}'")]
    UnknownRole { param: String, role: String },

    #[error("invalid default for parameter '{param}': {detail}")]
    InvalidDefault { param: String, detail: String },

    #[error("value out of range for parameter '{param}': {detail}")]
    OutOfRange { param: String, detail: String },

    #[error("mandatory parameter '{0}' has no value")]
    MissingMandatory(String),
}

impl ValidationError {
    /// The parameter or field name the error points at, for form-level reporting.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::MissingField(field) => field,
            ValidationError::TypeMismatch { field, .. } => field,
            ValidationError::DuplicateParamName(name) => name,
            ValidationError::UnknownRole { param, .. } => param,
            ValidationError::InvalidDefault { param, .. } => param,
            ValidationError::OutOfRange { param, .. } => param,
            ValidationError::MissingMandatory(name) => name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_offending_field() {
        let err = ValidationError::MissingField("params".to_string());
        assert_eq!(err.to_string(), "missing required field 'params'");
        assert_eq!(err.field(), "params");

        let err = ValidationError::UnknownRole {
            param: "text_column".to_string(),
            role: "side_dataset".to_string(),
        };
        assert!(err.to_string().contains("side_dataset"));
        assert_eq!(err.field(), "text_column");
    }
}
