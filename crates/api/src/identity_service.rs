//! Client of the external identity service that owns browser sessions.
//!
//! The session path of credential resolution relays the caller's cookies and
//! CSRF token to `{base}/api/v1/user` and reads back who is logged in.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderValue, header};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Domain used when the request carries no usable host.
pub const DEFAULT_DOMAIN: &str = "appscode.com";

const CSRF_COOKIE: &str = "_csrf";
const CSRF_HEADER: &str = "x-csrf-token";

/// Logged-in user as reported by the identity service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalIdentity {
    pub id: i64,
    #[serde(rename = "login")]
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub avatar_url: String,
    pub language: String,
    pub is_admin: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created: Option<DateTime<Utc>>,
    pub restricted: bool,
    #[serde(rename = "active")]
    pub is_active: bool,
    pub prohibit_login: bool,
    pub location: String,
    pub website: String,
    pub description: String,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity service request failed: {0}")]
    Transport(String),

    #[error("identity service returned status {0}")]
    Status(u16),

    #[error("failed to decode identity payload: {0}")]
    Decode(String),

    #[error("invalid identity service url: {0}")]
    InvalidUrl(String),
}

/// Session material taken from an inbound request.
#[derive(Debug, Clone, Default)]
pub struct SessionCredentials {
    pub host: Option<String>,
    pub cookie: Option<HeaderValue>,
    pub csrf_token: Option<String>,
}

impl SessionCredentials {
    /// Collect cookies and the CSRF token from request headers.
    ///
    /// The token comes from the `X-Csrf-Token` header, else from the `_csrf`
    /// cookie.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let cookie = headers.get(header::COOKIE).cloned();
        let csrf_token = headers
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or_else(|| {
                cookie
                    .as_ref()
                    .and_then(|c| c.to_str().ok())
                    .and_then(|c| cookie_value(c, CSRF_COOKIE))
                    .map(str::to_string)
            });
        Self {
            host,
            cookie,
            csrf_token,
        }
    }

    pub fn has_cookies(&self) -> bool {
        self.cookie.as_ref().is_some_and(|c| !c.is_empty())
    }
}

/// Value of cookie `name` in a `Cookie` header.
pub fn cookie_value<'a>(cookie_header: &'a str, name: &str) -> Option<&'a str> {
    cookie_header.split(';').find_map(|pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key == name).then_some(value)
    })
}

/// Identity service base URL for a request addressed to `host`.
///
/// The port is dropped and the service is reached on port 3003 of the same
/// host (or `https://host` in production).
pub fn base_url_for_host(host: Option<&str>, production: bool) -> String {
    let domain = host
        .filter(|h| !h.is_empty())
        .and_then(|h| Url::parse(&format!("http://{h}")).ok())
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_DOMAIN.to_string());
    if production {
        format!("https://{domain}")
    } else {
        format!("http://{domain}:3003")
    }
}

#[async_trait]
pub trait IdentityService: Send + Sync {
    /// The user logged in with `session`.
    async fn current_user(&self, session: &SessionCredentials) -> Result<ExternalIdentity, IdentityError>;
}

/// `IdentityService` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpIdentityService {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpIdentityService {
    pub fn new(base_url: Option<String>, timeout: Duration) -> Result<Self, IdentityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, session: &SessionCredentials) -> Result<Url, IdentityError> {
        let base = match &self.base_url {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => base_url_for_host(session.host.as_deref(), false),
        };
        Url::parse(&format!("{base}/api/v1/user")).map_err(|e| IdentityError::InvalidUrl(e.to_string()))
    }
}

#[async_trait]
impl IdentityService for HttpIdentityService {
    #[tracing::instrument(skip(self, session), err)]
    async fn current_user(&self, session: &SessionCredentials) -> Result<ExternalIdentity, IdentityError> {
        let url = self.endpoint(session)?;
        let mut request = self.client.get(url);
        if let Some(cookie) = &session.cookie {
            request = request.header(header::COOKIE, cookie.clone());
        }
        if let Some(csrf) = &session.csrf_token {
            request = request.header(CSRF_HEADER, csrf.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Err(IdentityError::Status(response.status().as_u16()));
        }
        response
            .json::<ExternalIdentity>()
            .await
            .map_err(|e| IdentityError::Decode(e.to_string()))
    }
}
