use thiserror::Error;

/// Coarse error category used by the feed client to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Per-record problem. Drop the record and keep the connection.
    MalformedRecord,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

impl ValidationError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::MalformedRecord
    }

    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ValidationError::MissingField("src_port");
        assert_eq!(err.to_string(), "missing field: src_port");

        let err = ValidationError::invalid("dst_port", "out of range: 70000");
        assert_eq!(err.to_string(), "invalid field dst_port: out of range: 70000");
    }

    #[test]
    fn test_every_error_is_malformed_record() {
        assert_eq!(ValidationError::NotAnObject.kind(), ErrorKind::MalformedRecord);
        assert_eq!(
            ValidationError::InvalidJson("eof".into()).kind(),
            ErrorKind::MalformedRecord
        );
    }
}
