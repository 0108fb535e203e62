use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QuotationError {
    #[error("payload extraction failed: {reason}")]
    Extraction { reason: String },
    #[error("invalid specification: {reason}")]
    InvalidSpecification { reason: String },
    #[error("upstream conversational service unavailable: {reason}")]
    UpstreamUnavailable { reason: String },
}

impl QuotationError {
    pub fn extraction(reason: impl Into<String>) -> Self {
        Self::Extraction { reason: reason.into() }
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidSpecification { reason: reason.into() }
    }

    pub fn upstream(reason: impl Into<String>) -> Self {
        Self::UpstreamUnavailable { reason: reason.into() }
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::Extraction { .. } => "extraction_failed",
            Self::InvalidSpecification { .. } => "invalid_specification",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
        }
    }

    /// Payload problems are answered in-conversation; upstream failures are not.
    pub fn is_recoverable_in_conversation(&self) -> bool {
        matches!(self, Self::Extraction { .. } | Self::InvalidSpecification { .. })
    }

    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The quotation assistant is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl From<QuotationError> for InterfaceError {
    fn from(value: QuotationError) -> Self {
        match value {
            QuotationError::Extraction { reason }
            | QuotationError::InvalidSpecification { reason } => {
                Self::BadRequest { message: reason, correlation_id: "unassigned".to_owned() }
            }
            QuotationError::UpstreamUnavailable { reason } => Self::ServiceUnavailable {
                message: reason,
                correlation_id: "unassigned".to_owned(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{InterfaceError, QuotationError};

    #[test]
    fn payload_errors_map_to_bad_request_interface_error() {
        let interface =
            QuotationError::extraction("payload is not valid JSON").into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn upstream_error_maps_to_service_unavailable() {
        let interface =
            QuotationError::upstream("request timed out after 30s").into_interface("req-2");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.correlation_id(), "req-2");
        assert!(!interface.user_message().contains("timed out"));
    }

    #[test]
    fn reason_codes_distinguish_payload_failures() {
        assert_eq!(QuotationError::extraction("x").reason_code(), "extraction_failed");
        assert_eq!(QuotationError::invalid("x").reason_code(), "invalid_specification");
        assert!(QuotationError::invalid("x").is_recoverable_in_conversation());
        assert!(!QuotationError::upstream("x").is_recoverable_in_conversation());
    }
}
