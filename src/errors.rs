use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// One field-level complaint returned by the server alongside a rejected payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("NETWORK_FAILURE: {0}")]
    Network(String),
    #[error("VALIDATION_FAILED: {message}")]
    Validation {
        message: String,
        fields: Vec<FieldError>,
    },
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("UNAUTHORIZED: {0}")]
    Unauthorized(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl AppError {
    /// Human readable text without the error code prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::Network(message)
            | Self::NotFound(message)
            | Self::Unauthorized(message)
            | Self::Io(message)
            | Self::Internal(message) => message,
            Self::Validation { message, .. } => message,
        }
    }

    pub fn validation_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation { fields, .. } => fields,
            _ => &[],
        }
    }

    /// Field to message mapping for inline form errors. The first message wins
    /// when the server reports several problems for one field.
    pub fn validation_map(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        for error in self.validation_errors() {
            map.entry(error.field.clone())
                .or_insert_with(|| error.message.clone());
        }
        map
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::{AppError, FieldError};

    #[test]
    fn validation_map_keeps_first_message_per_field() {
        let error = AppError::Validation {
            message: "Invalid event".to_string(),
            fields: vec![
                FieldError {
                    field: "name".to_string(),
                    message: "Name is required".to_string(),
                },
                FieldError {
                    field: "name".to_string(),
                    message: "Name is too short".to_string(),
                },
                FieldError {
                    field: "startsAt".to_string(),
                    message: "Must be in the future".to_string(),
                },
            ],
        };

        let map = error.validation_map();
        assert_eq!(map.len(), 2);
        assert_eq!(map["name"], "Name is required");
        assert_eq!(error.message(), "Invalid event");
        assert!(error.to_string().starts_with("VALIDATION_FAILED"));
    }

    #[test]
    fn non_validation_errors_have_no_field_errors() {
        let error = AppError::Network("connection reset".to_string());
        assert!(error.validation_errors().is_empty());
        assert!(error.validation_map().is_empty());
        assert_eq!(error.message(), "connection reset");
    }
}
