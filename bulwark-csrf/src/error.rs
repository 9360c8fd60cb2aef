use thiserror::Error;

/// Message reported for every rejected request.
pub const ERROR_MESSAGE: &str = "Invalid or missing csrf token";

/// Why a request failed CSRF validation.
///
/// Every kind leads to the same rejection response; the distinction only
/// shows up in logs.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    #[error("CSRF token is malformed")]
    Malformed,

    #[error("CSRF token signature does not match")]
    BadSignature,

    #[error("CSRF token expired")]
    Expired,

    #[error("Missing CSRF token")]
    Missing,

    #[error("Submitted CSRF token does not match the cookie token")]
    Mismatch,
}

/// Errors raised while setting up CSRF protection.
#[derive(Error, Debug)]
pub enum CsrfError {
    #[error("CSRF secret is required")]
    MissingSecret,

    #[error("CSRF secret must be at least {min} bytes, got {len}")]
    WeakSecret { len: usize, min: usize },

    #[error("Invalid CSRF configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, CsrfError>;

impl From<VerifyError> for bulwark_core::Error {
    fn from(_: VerifyError) -> Self {
        bulwark_core::Error::Forbidden(ERROR_MESSAGE.to_string())
    }
}

impl From<CsrfError> for bulwark_core::Error {
    fn from(err: CsrfError) -> Self {
        bulwark_core::Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_verify_error_maps_to_forbidden() {
        let err: bulwark_core::Error = VerifyError::Mismatch.into();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), format!("Forbidden: {}", ERROR_MESSAGE));
    }

    #[test]
    fn test_weak_secret_message() {
        let err = CsrfError::WeakSecret { len: 3, min: 32 };
        assert_eq!(
            err.to_string(),
            "CSRF secret must be at least 32 bytes, got 3"
        );
    }
}
