use reqwest::StatusCode;
use thiserror::Error;

/// Gym API client errors.
#[derive(Debug, Error)]
pub enum GymError {
    /// The API base URL could not be parsed. Must be an absolute http(s) URL.
    #[error("Invalid API base URL: {0}")]
    InvalidBaseUrl(String),
    /// A configuration value could not be parsed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The backend rejected the email and password.
    #[error("Invalid email or password.")]
    InvalidCredentials,
    /// The account exists but its role may not use the dashboard.
    #[error("Access Denied: Admin or Staff privileges required.")]
    AccessDenied,
    /// The backend issued a token whose claims could not be decoded.
    #[error("The session token could not be decoded.")]
    MalformedToken,

    /// Failed to send a request to the gym API.
    #[error("Failed to send a request to the gym API.")]
    RequestFailed(#[from] reqwest::Error),
    /// Failed to decode a gym API response.
    #[error("Failed to decode gym API response.")]
    FailedToDecode,

    /// The gym API returned a 400: Bad Request status code.
    #[error("Bad request: {0}")]
    BadRequest(String),
    /// The gym API returned a 401: Unauthorized status code.
    /// The token is missing, malformed or expired on the server side.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    /// The gym API returned a 403: Forbidden status code.
    /// The token is valid but its role is not allowed on the route.
    #[error("Forbidden: {0}")]
    Forbidden(String),
    /// The gym API returned a 404: Not Found status code.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The gym API returned any other non-success status code.
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Reading or writing the persisted token failed.
    #[error("Token storage failed: {0}")]
    Storage(#[from] std::io::Error),

    /// A form was submitted with missing or invalid fields.
    #[error("{0}")]
    Validation(String),
}

impl GymError {
    /// Maps a non-success status code and the backend's error message to an error.
    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::BAD_REQUEST => GymError::BadRequest(message),
            StatusCode::UNAUTHORIZED => GymError::Unauthorized(message),
            StatusCode::FORBIDDEN => GymError::Forbidden(message),
            StatusCode::NOT_FOUND => GymError::NotFound(message),
            _ => GymError::ServerError {
                status: status.as_u16(),
                message,
            },
        }
    }
}

pub type GymResult<T> = Result<T, GymError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_status_codes() {
        assert!(matches!(
            GymError::from_status(StatusCode::NOT_FOUND, "Member not found".into()),
            GymError::NotFound(msg) if msg == "Member not found"
        ));
        assert!(matches!(
            GymError::from_status(StatusCode::FORBIDDEN, String::new()),
            GymError::Forbidden(_)
        ));
        assert!(matches!(
            GymError::from_status(StatusCode::BAD_GATEWAY, "upstream".into()),
            GymError::ServerError { status: 502, .. }
        ));
    }

    #[test]
    fn login_messages_match_dashboard_copy() {
        assert_eq!(
            GymError::AccessDenied.to_string(),
            "Access Denied: Admin or Staff privileges required."
        );
        assert_eq!(
            GymError::InvalidCredentials.to_string(),
            "Invalid email or password."
        );
    }
}
