use reqwest::StatusCode;
use thiserror::Error;

/// Why a page or image request produced no usable body.
///
/// Every network stage (resolver, page fetch, image probe, fallback) reports
/// through this type so the orchestrator can tell transient trouble from a
/// dead link.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("could not reach host: {0}")]
    Connect(String),

    #[error("timed out while connecting")]
    ConnectTimeout,

    #[error("timed out waiting for the response")]
    RequestTimeout,

    #[error("redirect limit exceeded")]
    RedirectLoop,

    #[error("upstream answered {status}")]
    Http { status: StatusCode, retriable: bool },

    #[error("payload of {0} bytes exceeds the cap")]
    BodyTooLarge(u64),

    #[error("content-type {0} is not accepted here")]
    UnsupportedContentType(String),

    #[error("body read failed: {0}")]
    Io(String),

    #[error("{0}")]
    Unknown(String),
}

impl FetchError {
    /// Non-success status. Server errors and 429 are transient.
    pub fn http(status: StatusCode) -> Self {
        Self::Http {
            status,
            retriable: status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn should_retry(&self) -> bool {
        match self {
            Self::Http { retriable, .. } => *retriable,
            Self::InvalidUrl(_) | Self::BodyTooLarge(_) | Self::UnsupportedContentType(_) => false,
            Self::Connect(_)
            | Self::ConnectTimeout
            | Self::RequestTimeout
            | Self::RedirectLoop
            | Self::Io(_)
            | Self::Unknown(_) => true,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectTimeout | Self::RequestTimeout)
    }

    pub fn from_reqwest_error(err: reqwest::Error) -> Self {
        match err.status() {
            _ if err.is_timeout() && err.is_connect() => Self::ConnectTimeout,
            _ if err.is_timeout() => Self::RequestTimeout,
            _ if err.is_redirect() => Self::RedirectLoop,
            Some(status) => Self::http(status),
            None if err.is_connect() || err.is_request() => Self::Connect(err.to_string()),
            None if err.is_body() || err.is_decode() => Self::Io(err.to_string()),
            None => Self::Unknown(err.to_string()),
        }
    }
}
