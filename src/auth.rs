//! OAuth2 access tokens for the Drive API.
//!
//! One [`Authenticator`] is created per process and cloned into every client;
//! clones share the cached token.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{DriveError, Result};
use crate::models::{
    AuthorizedUserCredentials, Credentials, ServiceAccountCredentials, TokenResponse,
};

/// Google OAuth2 token endpoint.
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Google Drive API scope.
const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Refresh this long before the token actually expires.
const EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// JWT claims for service account authentication.
#[derive(Debug, Serialize)]
struct Claims {
    iss: String,   // Issuer (service account email)
    scope: String, // OAuth scope
    aud: String,   // Audience (token endpoint)
    exp: u64,      // Expiration time
    iat: u64,      // Issued at
}

/// Cached access token with expiration.
#[derive(Clone)]
struct CachedToken {
    access_token: String,
    expires_at: SystemTime,
}

enum TokenSource {
    ServiceAccount(ServiceAccountCredentials),
    AuthorizedUser(AuthorizedUserCredentials),
    Static(String),
}

/// Supplies bearer tokens for Drive requests.
#[derive(Clone)]
pub struct Authenticator {
    source: Arc<TokenSource>,
    client: Client,
    cached_token: Arc<RwLock<Option<CachedToken>>>,
}

impl Authenticator {
    /// Create an authenticator from a credentials JSON file.
    ///
    /// The file may hold a service account key or `authorized_user`
    /// credentials with a refresh token.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(DriveError::CredentialsFileError)?;
        let credentials: Credentials = serde_json::from_str(&content)?;
        Ok(Self::new(credentials))
    }

    pub fn new(credentials: Credentials) -> Self {
        let source = match credentials {
            Credentials::ServiceAccount(c) => TokenSource::ServiceAccount(c),
            Credentials::AuthorizedUser(c) => TokenSource::AuthorizedUser(c),
        };
        Self::with_source(source)
    }

    /// Use a token obtained elsewhere. It is never refreshed.
    pub fn from_access_token(token: impl Into<String>) -> Self {
        Self::with_source(TokenSource::Static(token.into()))
    }

    fn with_source(source: TokenSource) -> Self {
        Self {
            source: Arc::new(source),
            client: Client::new(),
            cached_token: Arc::new(RwLock::new(None)),
        }
    }

    /// Get a valid access token, refreshing if necessary.
    pub async fn get_access_token(&self) -> Result<String> {
        if let TokenSource::Static(token) = self.source.as_ref() {
            return Ok(token.clone());
        }

        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                if token.expires_at > SystemTime::now() + EXPIRY_BUFFER {
                    return Ok(token.access_token.clone());
                }
            }
        }

        let new_token = self.refresh_token().await?;

        {
            let mut cached = self.cached_token.write().await;
            *cached = Some(new_token.clone());
        }

        Ok(new_token.access_token)
    }

    async fn refresh_token(&self) -> Result<CachedToken> {
        let request = match self.source.as_ref() {
            TokenSource::ServiceAccount(creds) => {
                let token_uri = creds.token_uri.as_deref().unwrap_or(TOKEN_URI);
                let jwt = sign_assertion(creds, token_uri, unix_now()?)?;
                let params = [
                    ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                    ("assertion", jwt.as_str()),
                ];
                self.client.post(token_uri).form(&params)
            }
            TokenSource::AuthorizedUser(creds) => {
                let token_uri = creds.token_uri.as_deref().unwrap_or(TOKEN_URI);
                let params = [
                    ("grant_type", "refresh_token"),
                    ("client_id", creds.client_id.as_str()),
                    ("client_secret", creds.client_secret.as_str()),
                    ("refresh_token", creds.refresh_token.as_str()),
                ];
                self.client.post(token_uri).form(&params)
            }
            TokenSource::Static(_) => {
                return Err(DriveError::AuthenticationError(
                    "static access tokens cannot be refreshed".to_string(),
                ))
            }
        };

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DriveError::TokenRefreshError(format!(
                "Status {}: {}",
                status, body
            )));
        }

        let token_response: TokenResponse = response.json().await?;
        debug!(expires_in = token_response.expires_in, "refreshed access token");

        let expires_at = SystemTime::now() + Duration::from_secs(token_response.expires_in);

        Ok(CachedToken {
            access_token: token_response.access_token,
            expires_at,
        })
    }
}

fn unix_now() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| DriveError::AuthenticationError(format!("system clock error: {}", e)))
}

/// Sign the RS256 assertion exchanged for a service account token.
fn sign_assertion(creds: &ServiceAccountCredentials, token_uri: &str, now: u64) -> Result<String> {
    let claims = Claims {
        iss: creds.client_email.clone(),
        scope: DRIVE_SCOPE.to_string(),
        aud: token_uri.to_string(),
        iat: now,
        exp: now + 3600,
    };

    let header = Header::new(Algorithm::RS256);
    let key = EncodingKey::from_rsa_pem(creds.private_key.as_bytes())?;
    Ok(encode(&header, &claims, &key)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_serialization() {
        let claims = Claims {
            iss: "test@example.iam.gserviceaccount.com".to_string(),
            scope: DRIVE_SCOPE.to_string(),
            aud: TOKEN_URI.to_string(),
            iat: 1234567890,
            exp: 1234571490,
        };

        let json = serde_json::to_string(&claims).unwrap();
        assert!(json.contains("test@example.iam.gserviceaccount.com"));
        assert!(json.contains(DRIVE_SCOPE));
    }

    #[test]
    fn test_invalid_private_key_is_jwt_error() {
        let creds = ServiceAccountCredentials {
            client_email: "svc@example.iam.gserviceaccount.com".to_string(),
            private_key: "not a pem".to_string(),
            token_uri: None,
        };

        let err = sign_assertion(&creds, TOKEN_URI, 0).unwrap_err();
        assert!(matches!(err, DriveError::JwtError(_)));
    }

    #[tokio::test]
    async fn test_static_token_is_returned_as_is() {
        let auth = Authenticator::from_access_token("ya29.token");
        assert_eq!(auth.get_access_token().await.unwrap(), "ya29.token");
    }
}
