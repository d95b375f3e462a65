//! Error types and the classifier every operation funnels through.
//!
//! # Design
//! `classify` is the only place raw transport failures and HTTP failure
//! statuses turn into an [`ApiError`]. Operations never hand a
//! [`TransportError`] to their caller. The sub-type ([`ApiErrorType`]) is
//! derived from message text, since the server reports grant failures only
//! through the wording of its error payload.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::HttpResponse;

/// Coarse sub-type derived from an error's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiErrorType {
    #[serde(rename = "unknown")]
    Unknown,
    /// The server rejected the supplied credentials or grant.
    #[serde(rename = "oauth: invalid grant")]
    InvalidGrant,
}

impl fmt::Display for ApiErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorType::Unknown => write!(f, "unknown"),
            ApiErrorType::InvalidGrant => write!(f, "oauth: invalid grant"),
        }
    }
}

pub fn parse_api_err_type(text: &str) -> ApiErrorType {
    if text.contains("invalid_grant") {
        ApiErrorType::InvalidGrant
    } else {
        ApiErrorType::Unknown
    }
}

/// Structured error payload returned by the server on failure statuses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(
        rename = "error_description",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<String>,
}

impl ErrorDetail {
    fn parts(&self) -> impl Iterator<Item = &str> {
        [&self.error, &self.message, &self.description]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .filter(|part| !part.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.parts().next().is_none()
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, part) in self.parts().enumerate() {
            if i > 0 {
                f.write_str(": ")?;
            }
            f.write_str(part)?;
        }
        Ok(())
    }
}

/// Failure reported by a [`Transport`](crate::transport::Transport) when no
/// response could be obtained.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Network, DNS, TLS or body-read failure.
    #[error("request failed: {0}")]
    Request(String),

    /// A before-request hook refused to let the request go out.
    #[error("{0}")]
    Aborted(String),

    #[error("invalid transport configuration: {0}")]
    Config(String),
}

/// The single error shape returned by every client operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No response was obtained.
    #[error("{message}")]
    Transport {
        message: String,
        error_type: ApiErrorType,
    },

    /// The transport returned neither a response nor an error.
    #[error("empty response")]
    EmptyResponse,

    /// The server answered with a failure status.
    #[error("{message}")]
    Server {
        code: u16,
        message: String,
        detail: Option<ErrorDetail>,
        error_type: ApiErrorType,
    },

    /// The call succeeded but the body did not have the expected shape.
    #[error("{context}: {source_message}")]
    Decode {
        context: String,
        source_message: String,
    },

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    /// HTTP status for server-reported failures, 0 otherwise.
    pub fn code(&self) -> u16 {
        match self {
            ApiError::Server { code, .. } => *code,
            _ => 0,
        }
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    pub fn error_type(&self) -> ApiErrorType {
        match self {
            ApiError::Transport { error_type, .. } | ApiError::Server { error_type, .. } => {
                *error_type
            }
            _ => ApiErrorType::Unknown,
        }
    }

    /// The error for a round trip that produced no response.
    pub fn from_transport(error: &TransportError, context: &str) -> Self {
        let text = error.to_string();
        ApiError::Transport {
            message: format!("{context}: {text}"),
            error_type: parse_api_err_type(&text),
        }
    }

    pub fn decode(context: &str, err: impl fmt::Display) -> Self {
        ApiError::Decode {
            context: context.to_string(),
            source_message: err.to_string(),
        }
    }
}

/// Normalize the outcome of one round trip.
///
/// Returns `Ok(())` only when a response is present and its status is not a
/// failure.
pub fn classify(
    response: Option<&HttpResponse>,
    error: Option<&TransportError>,
    context: &str,
) -> Result<(), ApiError> {
    if let Some(err) = error {
        return Err(ApiError::from_transport(err, context));
    }

    let Some(response) = response else {
        return Err(ApiError::EmptyResponse);
    };

    if !response.is_error() {
        return Ok(());
    }

    let detail = serde_json::from_str::<ErrorDetail>(&response.body)
        .ok()
        .filter(|d| !d.is_empty());
    let message = match &detail {
        Some(detail) => format!("{}: {detail}", response.status_line()),
        None => response.status_line(),
    };
    Err(ApiError::Server {
        code: response.status,
        error_type: parse_api_err_type(&message),
        message,
        detail,
    })
}
