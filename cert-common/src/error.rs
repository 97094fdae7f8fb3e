use std::fmt::Display;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use url::Url;

/// Errors talking to the certificates backend.
///
/// Not-found responses on lookups are not errors; those calls return `Ok(None)`.
#[derive(Error, Debug)]
pub enum ClientError {
    RequestError(#[source] reqwest::Error),
    Timeout,
    Unauthorized,
    // All other invalid status codes
    ApiError(u16, Box<Url>, String),
    InvalidUrl(String),
    DecodeError(String),
}

impl Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::RequestError(err) => {
                write!(f, "could not reach the certificates backend: {err}")
            }
            ClientError::Timeout => write!(f, "the certificates backend did not answer in time"),
            ClientError::Unauthorized => write!(f, "session expired or missing, log in again"),
            ClientError::InvalidUrl(msg) => write!(f, "failed to build URL: {msg}"),
            ClientError::DecodeError(msg) => {
                write!(f, "unexpected response from the certificates backend: {msg}")
            }
            ClientError::ApiError(status, url, body) => {
                // We only parse the api error on display to catch all errors even when the body is not JSON
                match serde_json::from_str::<ApiErrorResponse>(body) {
                    Ok(api_error) => write!(f, "API error ({status}): {}", api_error.message()),
                    Err(_) => write!(
                        f,
                        "API error: status='{status}' url='{url}' message='{body}'",
                    ),
                }
            }
        }
    }
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::ApiError(status, _, _) => Some(*status),
            ClientError::Unauthorized => Some(401),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            ClientError::Timeout
        } else if error.is_decode() {
            ClientError::DecodeError(error.to_string())
        } else {
            ClientError::RequestError(error)
        }
    }
}

/// FastAPI error body. `detail` is either a message or a list of validation errors.
#[derive(Deserialize, Debug)]
struct ApiErrorResponse {
    detail: Value,
}

impl ApiErrorResponse {
    fn message(&self) -> String {
        match &self.detail {
            Value::String(msg) => msg.clone(),
            Value::Array(items) => items
                .iter()
                .map(|item| match item.get("msg").and_then(Value::as_str) {
                    Some(msg) => msg.to_string(),
                    None => item.to_string(),
                })
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        }
    }
}

/// A form field that failed validation before submission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("{0} is required")]
    Missing(&'static str),
    #[error("{field} is locked by the selected {source_name} and cannot be edited")]
    Locked {
        field: &'static str,
        source_name: &'static str,
    },
    #[error("issue date '{0}' is not a valid YYYY-MM-DD date")]
    InvalidDate(String),
    #[error("certificate code '{0}' cannot contain spaces")]
    InvalidCode(String),
}

/// Every field error found when validating a form for submission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub struct InvalidForm(pub Vec<FormError>);

impl Display for InvalidForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "the form has errors: {}", messages.join(", "))
    }
}

/// Why submitting the issuance form did not produce a certificate.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] InvalidForm),
    #[error(transparent)]
    Client(#[from] ClientError),
}
