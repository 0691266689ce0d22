#![allow(non_snake_case)]

use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

use serde::Serialize;

pub async fn handler404(path: Uri) -> Error {
    Error::NotFound {
        message: format!("Invalid path: {}", path),
    }
}

pub fn Fine<V>(v: V) -> Success<V>
where
    V: Serialize,
{
    Success::of(v)
}

#[derive(Debug, Clone, Serialize)]
pub struct Success<V> {
    success: bool,
    #[serde(flatten)]
    value: V,
}

impl<V: Serialize> Success<V> {
    pub fn of(value: V) -> Self {
        Self {
            success: true,
            value,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "error")]
pub enum Error {
    NotFound { message: String },
    Unauthorized { message: String },
    Forbidden { message: String },
    InvalidDate { message: String },
    InvalidPayload { message: String },
    UnsupportedFormat { message: String },
    MissingCredentials { message: String },
    UserAlreadyExists { message: String },
    AuthenticationFailure { message: String },
    InternalError { kind: &'static str, message: String },
    Unknown { message: String },
}

impl Error {
    pub fn unauthorized() -> Error {
        Error::Unauthorized {
            message: "Unauthorized".to_string(),
        }
    }

    pub fn invalid_date() -> Error {
        Error::InvalidDate {
            message: "Invalid date format. Use YYYY-MM-DD".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Unauthorized { .. } | Error::AuthenticationFailure { .. } => {
                StatusCode::UNAUTHORIZED
            }
            Error::Forbidden { .. } => StatusCode::FORBIDDEN,
            Error::InvalidDate { .. }
            | Error::InvalidPayload { .. }
            | Error::UnsupportedFormat { .. }
            | Error::MissingCredentials { .. } => StatusCode::BAD_REQUEST,
            Error::UserAlreadyExists { .. } => StatusCode::CONFLICT,
            Error::InternalError { .. } | Error::Unknown { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Text shown to the user when the error ends up on an HTML page.
    pub fn message(&self) -> &str {
        match self {
            Error::NotFound { message }
            | Error::Unauthorized { message }
            | Error::Forbidden { message }
            | Error::InvalidDate { message }
            | Error::InvalidPayload { message }
            | Error::UnsupportedFormat { message }
            | Error::MissingCredentials { message }
            | Error::UserAlreadyExists { message }
            | Error::AuthenticationFailure { message }
            | Error::InternalError { message, .. }
            | Error::Unknown { message } => message,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            log::error!("Request failed: {:?}", self);
        }
        (status, Json(self)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::InternalError {
            kind: "DatabaseError",
            message: err.to_string(),
        }
    }
}

impl From<pbkdf2::password_hash::Error> for Error {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        Self::InternalError {
            kind: "HashingError",
            message: err.to_string(),
        }
    }
}

impl From<handlebars::RenderError> for Error {
    fn from(err: handlebars::RenderError) -> Self {
        Self::InternalError {
            kind: "TemplateError",
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Unknown {
            message: err.to_string(),
        }
    }
}
