use anyhow::Error;
use cert_common::error::{ClientError, SubmitError};

pub struct CapturedError {
    pub inner: Error,
    /// What the user can do about it, if we know.
    pub hint: Option<String>,
}

fn client_error(inner: &Error) -> Option<&ClientError> {
    inner.chain().find_map(|err| {
        err.downcast_ref::<ClientError>().or_else(|| match err.downcast_ref::<SubmitError>() {
            Some(SubmitError::Client(client)) => Some(client),
            _ => None,
        })
    })
}

impl From<Error> for CapturedError {
    fn from(inner: Error) -> Self {
        let hint = match client_error(&inner) {
            Some(ClientError::Unauthorized) => {
                Some("Run 'certdesk login' to start a new session".to_string())
            }
            Some(ClientError::Timeout) => Some(
                "Set CERTDESK_REQUEST_TIMEOUT_MS to wait longer for slow backends".to_string(),
            ),
            Some(ClientError::RequestError(_)) => {
                Some("Check --api-url or CERTDESK_API_URL points at a running backend".to_string())
            }
            _ => None,
        };
        Self { inner, hint }
    }
}
