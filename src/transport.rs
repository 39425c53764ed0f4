//! HTTP transports for the HSDB and Orca APIs.
//!
//! The HSDB transport owns the bearer credential and recovers from
//! credential expiry; the Orca transport attaches a static API key.

use std::sync::Mutex;
use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Error;

/// Total request attempts before a rejected credential becomes an error.
pub const DEFAULT_AUTH_ATTEMPTS: u32 = 2;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access: String,
}

/// Bearer-authenticated transport for the HSDB API.
///
/// Holds the current bearer token and replaces it wholesale when the server
/// rejects it with 403, then retries the request, up to
/// [`DEFAULT_AUTH_ATTEMPTS`] total attempts. The token is mutated only
/// between attempts, never during one; a single instance must not be shared
/// by concurrent in-flight requests unless callers serialize them.
pub struct HsdbTransport {
    client: Client,
    base_url: String,
    username: String,
    password: String,
    token: Mutex<Option<String>>,
    max_attempts: u32,
}

impl HsdbTransport {
    /// Create a new HSDB transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(
        base_url: &str,
        username: &str,
        password: &str,
        timeout: Duration,
        max_attempts: Option<u32>,
    ) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            username: username.to_string(),
            password: password.to_string(),
            token: Mutex::new(None),
            max_attempts: max_attempts.unwrap_or(DEFAULT_AUTH_ATTEMPTS),
        })
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange the configured username/password for a fresh bearer token,
    /// replacing whatever token was held before.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Auth`] if the credentials are rejected or the login
    /// endpoint is unreachable.
    pub async fn authenticate(&self) -> Result<(), Error> {
        let url = format!("{}/jwt-token/", self.base_url);
        let body = LoginRequest {
            username: &self.username,
            password: &self.password,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("login endpoint unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Auth(format!(
                "login rejected with status {}",
                status.as_u16()
            )));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("invalid login response: {e}")))?;

        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(login.access);
        Ok(())
    }

    /// Current token, authenticating first if none is held yet.
    async fn bearer(&self) -> Result<String, Error> {
        {
            let token = self.token.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(current) = token.as_ref() {
                return Ok(current.clone());
            }
        }

        self.authenticate().await?;

        let token = self.token.lock().unwrap_or_else(|e| e.into_inner());
        token
            .clone()
            .ok_or_else(|| Error::Auth("no token after authentication".to_string()))
    }

    /// Issue a bearer-authenticated request, re-authenticating on 403.
    ///
    /// A 403 response replaces the token and retries; any other status is
    /// returned to the caller as-is. Once attempts are exhausted with the
    /// credential still rejected, the failure surfaces as
    /// [`Error::AuthRetriesExhausted`] rather than as a response the caller
    /// could mistake for an empty result.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<Response, Error> {
        let mut last_status = StatusCode::FORBIDDEN;

        for attempt in 0..self.max_attempts {
            let token = self.bearer().await?;
            let mut request = self.client.request(method.clone(), url).bearer_auth(&token);
            if let Some(json) = body {
                request = request.json(json);
            }

            let response = request.send().await.map_err(|e| Error::Http(e.to_string()))?;

            if response.status() != StatusCode::FORBIDDEN {
                return Ok(response);
            }

            last_status = response.status();
            if attempt + 1 < self.max_attempts {
                debug!(url, "bearer token rejected, re-authenticating");
                self.authenticate().await?;
            }
        }

        warn!(
            url,
            status = last_status.as_u16(),
            attempts = self.max_attempts,
            "request still rejected after re-authentication"
        );
        Err(Error::AuthRetriesExhausted {
            attempts: self.max_attempts,
            status: last_status.as_u16(),
        })
    }

    /// Issue a bearer-authenticated GET.
    pub async fn get(&self, url: &str) -> Result<Response, Error> {
        self.request(Method::GET, url, None).await
    }
}

/// Token-authenticated transport for the Orca API.
///
/// The API key is static; there is no expiry to recover from.
pub struct OrcaTransport {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OrcaTransport {
    /// Create a new Orca transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, Error> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST a JSON body to an API path.
    pub async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<Response, Error> {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))
    }
}
