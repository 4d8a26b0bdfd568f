use thiserror::Error;

/// Failures talking to the tracker or the CI system.
#[derive(Debug, Error)]
pub(crate) enum RemoteError {
    /// Credentials rejected (401 Unauthorized)
    #[error("{service} rejected the credentials: HTTP 401 Unauthorized")]
    Unauthorized { service: &'static str },

    /// Credentials valid but lacking permission (403 Forbidden)
    #[error("{service} denied access to {path}: HTTP 403 Forbidden")]
    Forbidden { service: &'static str, path: String },

    #[error("{service} has no resource at {path}: HTTP 404 Not Found")]
    NotFound { service: &'static str, path: String },

    #[error("{service} returned HTTP {code} for {path}: {body}")]
    Status {
        service: &'static str,
        path: String,
        code: u16,
        body: String,
    },

    /// Network or other transport error
    #[error("{service} request failed: {message}")]
    Transport {
        service: &'static str,
        message: String,
    },

    /// Rejected locally; the request is never sent.
    #[error("{value:?} is not a valid {service} id")]
    InvalidId {
        service: &'static str,
        value: String,
    },

    #[error("failed to parse {service} response from {path}: {message}")]
    Parse {
        service: &'static str,
        path: String,
        message: String,
    },
}

impl RemoteError {
    pub(crate) fn from_ureq(service: &'static str, path: &str, err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(401, _) => Self::Unauthorized { service },
            ureq::Error::Status(403, _) => Self::Forbidden {
                service,
                path: path.to_string(),
            },
            ureq::Error::Status(404, _) => Self::NotFound {
                service,
                path: path.to_string(),
            },
            ureq::Error::Status(code, resp) => Self::Status {
                service,
                path: path.to_string(),
                code,
                body: resp.into_string().unwrap_or_default(),
            },
            other => Self::Transport {
                service,
                message: other.to_string(),
            },
        }
    }

    pub(crate) fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Everything a shell command can fail with once its arguments parsed.
#[derive(Debug, Error)]
pub(crate) enum ShellError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// The command was well-formed but cannot run in the current state.
    #[error("{0}")]
    Usage(String),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to render {what}: {message}")]
    Render { what: &'static str, message: String },
}

impl ShellError {
    pub(crate) fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}
