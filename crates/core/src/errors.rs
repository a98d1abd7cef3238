use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("customer id must be a positive integer, got {0}")]
    InvalidCustomerId(i64),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("upstream overloaded: {0}")]
    Overloaded(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
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
    pub fn status_code(&self) -> u16 {
        match self {
            Self::BadRequest { .. } => 400,
            Self::ServiceUnavailable { .. } => 503,
            Self::Internal { .. } => 500,
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }

    /// Short text safe to return to the caller. Never carries internals
    /// beyond the message the application layer chose to expose.
    pub fn user_message(&self) -> String {
        match self {
            Self::BadRequest { message, .. } => message.clone(),
            Self::ServiceUnavailable { .. } => {
                "The AI service is currently overloaded. Please try again later.".to_string()
            }
            Self::Internal { message, .. } => format!("Error processing your request: {message}"),
        }
    }
}

impl ApplicationError {
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

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { message: error.to_string(), correlation_id }
            }
            ApplicationError::InvalidInput(message) => Self::BadRequest { message, correlation_id },
            ApplicationError::Overloaded(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Integration(message) | ApplicationError::Configuration(message) => {
                Self::Internal { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, InterfaceError};

    #[test]
    fn invalid_input_maps_to_bad_request_with_correlation_id() {
        let error = ApplicationError::InvalidInput("Query cannot be empty".to_owned());
        let interface = error.into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(interface.status_code(), 400);
        assert_eq!(interface.user_message(), "Query cannot be empty");
    }

    #[test]
    fn domain_error_maps_to_bad_request() {
        let interface =
            ApplicationError::from(DomainError::InvalidCustomerId(0)).into_interface("req-2");

        assert_eq!(interface.status_code(), 400);
        assert!(interface.user_message().contains("positive integer"));
    }

    #[test]
    fn overload_maps_to_service_unavailable() {
        let interface = ApplicationError::Overloaded("sales backend answered 503".to_owned())
            .into_interface("req-3");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.status_code(), 503);
        assert_eq!(
            interface.user_message(),
            "The AI service is currently overloaded. Please try again later."
        );
    }

    #[test]
    fn integration_error_maps_to_internal() {
        let error = ApplicationError::Integration("event channel closed".to_owned());
        let interface = error.into_interface("req-4");

        assert_eq!(interface.status_code(), 500);
        assert_eq!(interface.correlation_id(), "req-4");
        assert_eq!(
            interface.user_message(),
            "Error processing your request: event channel closed"
        );
    }
}
