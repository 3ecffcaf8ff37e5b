//! OAuth 2.0 credential manager
//!
//! Exchanges a refresh token (or authorization code) for an access token and
//! caches the result for the rest of the run. A cached token is reused while
//! its expiry is further away than the safety margin; otherwise a new one is
//! requested. Nothing is persisted.
//!
//! Credentials come from the run environment:
//!
//! | variable        | meaning                                         |
//! |-----------------|-------------------------------------------------|
//! | `token_url`     | token-issuance endpoint                         |
//! | `client_id`     | OAuth client id                                 |
//! | `client_secret` | OAuth client secret                             |
//! | `refresh_token` | refresh token to exchange                       |
//! | `auth_code`     | used instead of `refresh_token` when it is unset |
//! | `redirect_uri`  | optional, sent with `auth_code`                 |

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use crate::collection::{Environment, ACCESS_TOKEN_VAR, TOKEN_EXPIRES_AT_VAR, TOKEN_TYPE_VAR};
use crate::engine::error::AuthError;

pub const TOKEN_URL_VAR: &str = "token_url";
pub const CLIENT_ID_VAR: &str = "client_id";
pub const CLIENT_SECRET_VAR: &str = "client_secret";
pub const REFRESH_TOKEN_VAR: &str = "refresh_token";
pub const AUTH_CODE_VAR: &str = "auth_code";
pub const REDIRECT_URI_VAR: &str = "redirect_uri";

/// Tokens expiring sooner than this are refreshed before use
pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// Lifetime assumed when the endpoint omits `expires_in`
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// What is exchanged for an access token
#[derive(Clone, PartialEq, Eq)]
pub enum Grant {
    RefreshToken(String),
    AuthorizationCode {
        code: String,
        redirect_uri: Option<String>,
    },
}

impl Grant {
    fn secret(&self) -> &str {
        match self {
            Grant::RefreshToken(token) => token,
            Grant::AuthorizationCode { code, .. } => code,
        }
    }

    fn form_fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            Grant::RefreshToken(token) => {
                vec![("grant_type", "refresh_token"), ("refresh_token", token.as_str())]
            }
            Grant::AuthorizationCode { code, redirect_uri } => {
                let mut fields = vec![("grant_type", "authorization_code"), ("code", code.as_str())];
                if let Some(uri) = redirect_uri {
                    fields.push(("redirect_uri", uri.as_str()));
                }
                fields
            }
        }
    }
}

impl fmt::Debug for Grant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grant::RefreshToken(_) => f.write_str("RefreshToken(..)"),
            Grant::AuthorizationCode { redirect_uri, .. } => f
                .debug_struct("AuthorizationCode")
                .field("redirect_uri", redirect_uri)
                .finish_non_exhaustive(),
        }
    }
}

/// Everything needed to call the token endpoint
#[derive(Clone)]
pub struct ClientCredentials {
    pub token_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub grant: Grant,
}

impl ClientCredentials {
    pub fn refresh(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            grant: Grant::RefreshToken(refresh_token.into()),
        }
    }

    /// Read credentials from the run environment
    pub fn from_environment(env: &Environment) -> Result<Self, AuthError> {
        let required = |key: &str| {
            env.get(key)
                .map(String::from)
                .ok_or_else(|| AuthError::MissingCredential(key.to_string()))
        };

        let grant = match (env.get(REFRESH_TOKEN_VAR), env.get(AUTH_CODE_VAR)) {
            (Some(token), _) => Grant::RefreshToken(token.to_string()),
            (None, Some(code)) => Grant::AuthorizationCode {
                code: code.to_string(),
                redirect_uri: env.get(REDIRECT_URI_VAR).map(String::from),
            },
            (None, None) => {
                return Err(AuthError::MissingCredential(REFRESH_TOKEN_VAR.to_string()))
            }
        };

        Ok(Self {
            token_url: required(TOKEN_URL_VAR)?,
            client_id: required(CLIENT_ID_VAR)?,
            client_secret: required(CLIENT_SECRET_VAR)?,
            grant,
        })
    }

    /// Stable, non-reversible identifier of the grant secret
    pub fn fingerprint(&self) -> String {
        fingerprint(self.grant.secret())
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("grant", &self.grant)
            .finish_non_exhaustive()
    }
}

fn fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    hex::encode(&digest[..8])
}

/// An issued access token
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    pub access_token: String,
    pub token_type: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// The refresh token (or code) this token was obtained with
    pub refresh_token: String,
}

impl Token {
    /// Whether the token expires within `margin` of `now`
    pub fn expires_within(&self, margin: Duration, now: DateTime<Utc>) -> bool {
        match (self.expires_at - now).to_std() {
            Ok(remaining) => remaining <= margin,
            Err(_) => true,
        }
    }

    /// `Authorization` header value
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("token_type", &self.token_type)
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Parse a token endpoint reply
pub fn parse_token_response(
    body: &str,
    refresh_token: &str,
    issued_at: DateTime<Utc>,
) -> Result<Token, AuthError> {
    let json: Value = serde_json::from_str(body)
        .map_err(|e| AuthError::MalformedResponse(format!("body is not JSON: {}", e)))?;

    let access_token = json
        .get("access_token")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::MalformedResponse("missing access_token".to_string()))?;

    let token_type = json
        .get("token_type")
        .and_then(Value::as_str)
        .unwrap_or("Bearer");

    let expires_in = match json.get("expires_in") {
        None | Some(Value::Null) => DEFAULT_EXPIRES_IN_SECS,
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| AuthError::MalformedResponse(format!("invalid expires_in {}", n)))?,
        Some(Value::String(s)) => s
            .parse::<i64>()
            .map_err(|_| AuthError::MalformedResponse(format!("invalid expires_in '{}'", s)))?,
        Some(other) => {
            return Err(AuthError::MalformedResponse(format!(
                "invalid expires_in {}",
                other
            )))
        }
    };

    let expires_at = chrono::TimeDelta::try_seconds(expires_in.max(0))
        .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
        .ok_or_else(|| {
            AuthError::MalformedResponse(format!("expires_in {} is out of range", expires_in))
        })?;

    Ok(Token {
        access_token: access_token.to_string(),
        token_type: token_type.to_string(),
        issued_at,
        expires_at,
        refresh_token: refresh_token.to_string(),
    })
}

type CacheKey = (String, String);

/// Acquires, caches and refreshes bearer tokens for one run
#[derive(Debug)]
pub struct CredentialManager {
    client: reqwest::Client,
    margin: Duration,
    timeout: Duration,
    cache: HashMap<CacheKey, Token>,
    acquisitions: usize,
}

impl Default for CredentialManager {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialManager {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            margin: DEFAULT_EXPIRY_MARGIN,
            timeout: DEFAULT_TOKEN_TIMEOUT,
            cache: HashMap::new(),
            acquisitions: 0,
        }
    }

    /// Set the expiry safety margin
    pub fn margin(mut self, margin: Duration) -> Self {
        self.margin = margin;
        self
    }

    /// Set the token endpoint deadline
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Number of calls made to the token endpoint since the last reset
    pub fn acquisitions(&self) -> usize {
        self.acquisitions
    }

    /// Drop every cached token and reset the counter
    pub fn reset(&mut self) {
        self.cache.clear();
        self.acquisitions = 0;
    }

    /// Exchange the grant for a fresh access token
    #[instrument(skip(self, credentials), fields(client_id = %credentials.client_id))]
    pub async fn acquire_token(
        &mut self,
        credentials: &ClientCredentials,
    ) -> Result<Token, AuthError> {
        let mut form = vec![
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];
        form.extend(credentials.grant.form_fields());

        self.acquisitions += 1;
        let issued_at = Utc::now();

        let response = self
            .client
            .post(&credentials.token_url)
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Token endpoint request failed");
                AuthError::Unreachable(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Unreachable(e.to_string()))?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Token endpoint rejected the grant");
            return Err(AuthError::EndpointStatus {
                status: status.as_u16(),
                body,
            });
        }

        let token = parse_token_response(&body, credentials.grant.secret(), issued_at)?;
        info!(
            fingerprint = %credentials.fingerprint(),
            expires_at = %token.expires_at,
            "Acquired access token"
        );
        Ok(token)
    }

    /// Return a cached token if it is still comfortably valid, otherwise acquire one
    pub async fn get_valid_token(
        &mut self,
        credentials: &ClientCredentials,
    ) -> Result<Token, AuthError> {
        let key = (credentials.client_id.clone(), credentials.fingerprint());

        if let Some(token) = self.cache.get(&key) {
            if !token.expires_within(self.margin, Utc::now()) {
                debug!(fingerprint = %key.1, "Using cached access token");
                return Ok(token.clone());
            }
            debug!(fingerprint = %key.1, "Cached access token is about to expire");
        }

        let token = self.acquire_token(credentials).await?;
        self.cache.insert(key, token.clone());
        Ok(token)
    }

    /// Obtain a valid token for the environment's credentials and publish
    /// its fields back into the environment
    pub async fn token_for(&mut self, env: &mut Environment) -> Result<Token, AuthError> {
        let credentials = ClientCredentials::from_environment(env)?;
        let token = self.get_valid_token(&credentials).await?;

        env.set(ACCESS_TOKEN_VAR, token.access_token.clone());
        env.set(TOKEN_TYPE_VAR, token.token_type.clone());
        env.set(TOKEN_EXPIRES_AT_VAR, token.expires_at.to_rfc3339());

        Ok(token)
    }
}
