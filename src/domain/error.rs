use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("invalid `{field}`: {message}")]
    Validation { field: &'static str, message: String },
}

impl DomainError {
    /// Field-level validation failure surfaced to admin clients.
    pub fn field(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn field_name(&self) -> Option<&'static str> {
        match self {
            DomainError::Validation { field, .. } => Some(field),
        }
    }
}
