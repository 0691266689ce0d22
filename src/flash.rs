//! One-shot user messages that survive a single redirect.
//!
//! The message rides in a `flash` cookie, hex encoded so that arbitrary text
//! stays a valid cookie value. Whoever renders it clears the cookie.

use std::convert::Infallible;

use axum::async_trait;
use axum::extract::{FromRequest, RequestParts};
use axum::headers::Cookie;
use axum::http::header::{self, HeaderValue};
use axum::response::{IntoResponse, Redirect, Response};
use axum::TypedHeader;
use serde::Serialize;

pub const FLASH_COOKIE: &str = "flash";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Success,
    Info,
    Warning,
    Danger,
}

impl Kind {
    fn as_str(&self) -> &'static str {
        match self {
            Kind::Success => "success",
            Kind::Info => "info",
            Kind::Warning => "warning",
            Kind::Danger => "danger",
        }
    }

    fn parse(s: &str) -> Option<Kind> {
        match s {
            "success" => Some(Kind::Success),
            "info" => Some(Kind::Info),
            "warning" => Some(Kind::Warning),
            "danger" => Some(Kind::Danger),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub kind: Kind,
    pub message: String,
}

impl Flash {
    pub fn new<S: Into<String>>(kind: Kind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn success<S: Into<String>>(message: S) -> Self {
        Self::new(Kind::Success, message)
    }

    pub fn info<S: Into<String>>(message: S) -> Self {
        Self::new(Kind::Info, message)
    }

    pub fn warning<S: Into<String>>(message: S) -> Self {
        Self::new(Kind::Warning, message)
    }

    pub fn danger<S: Into<String>>(message: S) -> Self {
        Self::new(Kind::Danger, message)
    }

    pub fn encode(&self) -> String {
        hex::encode(format!("{}:{}", self.kind.as_str(), self.message))
    }

    pub fn decode(value: &str) -> Option<Flash> {
        let bytes = hex::decode(value).ok()?;
        let text = String::from_utf8(bytes).ok()?;
        let (kind, message) = text.split_once(':')?;
        Some(Flash::new(Kind::parse(kind)?, message))
    }

    pub fn set_cookie(&self) -> String {
        format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            FLASH_COOKIE,
            self.encode()
        )
    }
}

pub fn clear_cookie() -> String {
    format!("{}=; Path=/; Max-Age=0; HttpOnly; SameSite=Lax", FLASH_COOKIE)
}

/// Appends `Set-Cookie` headers to any response. Values that can't be
/// header values are logged and skipped.
pub trait AddCookies: IntoResponse + Sized {
    fn add_cookies<I>(self, cookies: I) -> Response
    where
        I: IntoIterator<Item = String>,
    {
        let mut r = self.into_response();
        for cookie in cookies {
            match HeaderValue::try_from(cookie) {
                Ok(value) => {
                    r.headers_mut().append(header::SET_COOKIE, value);
                }
                Err(e) => log::error!("Dropping unrepresentable cookie: {}", e),
            }
        }
        r
    }
}

impl<T: IntoResponse + Sized> AddCookies for T {}

/// Redirects to `to`, showing `flash` on the page that ends up rendered.
pub fn redirect(to: &str, flash: Flash) -> Response {
    Redirect::to(to).add_cookies([flash.set_cookie()])
}

/// The flash message that arrived with the request, if any.
#[derive(Debug, Clone, Default)]
pub struct Incoming(pub Option<Flash>);

#[async_trait]
impl<B> FromRequest<B> for Incoming
where
    B: Send,
{
    type Rejection = Infallible;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        let flash = TypedHeader::<Cookie>::from_request(req)
            .await
            .ok()
            .and_then(|TypedHeader(cookies)| cookies.get(FLASH_COOKIE).and_then(Flash::decode));
        Ok(Incoming(flash))
    }
}
