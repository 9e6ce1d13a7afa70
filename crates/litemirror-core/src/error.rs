/// Maximum length of a remote response body kept in an error message.
const BODY_EXCERPT_LEN: usize = 200;

/// Errors from the token-authenticated read client. No retries happen at this
/// layer; callers decide whether a failure is fatal or skippable.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Transport(String),

    #[error("tracker API {status}: {body}")]
    Status { status: u16, body: String },

    #[error("decode response: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn from_status(status: u16, body: &str) -> Self {
        Self::Status {
            status,
            body: excerpt(body),
        }
    }
}

/// Errors from the session login flow.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("LITETRACKER_EMAIL and LITETRACKER_PASSWORD must be set for write operations")]
    MissingCredentials,

    #[error("login rejected (status {status}): check LITETRACKER_EMAIL and LITETRACKER_PASSWORD")]
    InvalidCredentials { status: u16 },

    #[error("could not find CSRF token on login page")]
    CsrfNotFound,

    #[error("tracker unreachable: {0}")]
    Unreachable(String),
}

/// Errors from session-authenticated write operations. `SessionExpired` is the
/// one variant the write wrapper reacts to (forced re-login plus a single
/// retry); everything else surfaces to the caller as-is.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("session expired")]
    SessionExpired,

    #[error("write rejected (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("fetch current story state: {0}")]
    Read(#[from] ApiError),
}

impl WriteError {
    /// Classify an HTTP status from the session-authenticated surface.
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => Self::SessionExpired,
            _ => Self::Rejected {
                status,
                body: excerpt(body),
            },
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }
}

fn excerpt(body: &str) -> String {
    if body.chars().count() <= BODY_EXCERPT_LEN {
        body.to_string()
    } else {
        let cut: String = body.chars().take(BODY_EXCERPT_LEN).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_401_is_session_expired() {
        assert!(WriteError::from_status(401, "unauthorized").is_session_expired());
    }

    #[test]
    fn other_statuses_are_rejections() {
        let err = WriteError::from_status(422, "label already exists");
        assert!(!err.is_session_expired());
        assert!(matches!(err, WriteError::Rejected { status: 422, .. }));
    }

    #[test]
    fn rejection_keeps_body_excerpt() {
        let err = WriteError::from_status(500, "boom");
        assert_eq!(err.to_string(), "write rejected (status 500): boom");
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(5000);
        let ApiError::Status { body, .. } = ApiError::from_status(502, &body) else {
            panic!("expected Status");
        };
        assert!(body.chars().count() <= BODY_EXCERPT_LEN + 1);
        assert!(body.ends_with('…'));
    }

    #[test]
    fn auth_error_converts_into_write_error() {
        let err: WriteError = AuthError::MissingCredentials.into();
        assert!(matches!(err, WriteError::Auth(AuthError::MissingCredentials)));
    }
}
