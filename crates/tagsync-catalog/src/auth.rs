//! Identity service login.
//!
//! # Endpoint Format
//!
//! - POST `{identity_url}/identity-service/api/v1/Login`
//!   with `{"username": "...", "password": "..."}` → `{"sessionId": "...", "currentOrgId": "..."}`
//! - GET `{identity_url}/identity-service/api/v1/jwt/Token?client_id=cdlg_app&nonce=...&access_code=`
//!   with `IDS-SESSION-ID` and `X-INFA-ORG-ID` headers → `{"jwt_token": "..."}`

use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{CatalogError, Result};

/// OAuth client id of the catalog application.
const CLIENT_ID: &str = "cdlg_app";

/// Nonce sent with the token exchange.
const TOKEN_NONCE: &str = "gxx3t69BWB49BHHNn";

/// Session credentials for the search service.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub session_id: String,
    pub org_id: String,
    pub jwt: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("org_id", &self.org_id)
            .field("session_id", &"<redacted>")
            .field("jwt", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    session_id: String,
    current_org_id: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    jwt_token: String,
}

/// Client for the identity service.
#[derive(Debug, Clone)]
pub struct IdentityClient {
    client: Client,
    base_url: String,
}

impl IdentityClient {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CatalogError::InvalidConfig(format!("HTTP client error: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Log in and exchange the session for a JWT.
    pub async fn login(&self, username: &str, password: &str) -> Result<Credentials> {
        let (session_id, org_id) = self.session(username, password).await?;
        let jwt = self.token(&session_id, &org_id).await?;
        info!("Logged in to org {}", org_id);
        Ok(Credentials {
            session_id,
            org_id,
            jwt,
        })
    }

    async fn session(&self, username: &str, password: &str) -> Result<(String, String)> {
        let url = format!("{}/identity-service/api/v1/Login", self.base_url);
        debug!("Logging in as {} at {}", username, url);

        let response = self
            .client
            .post(&url)
            .json(&LoginRequest { username, password })
            .send()
            .await
            .map_err(|e| CatalogError::Connection(format!("Login request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Auth(format!("login returned {}: {}", status, body)));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Auth(format!("unexpected login response: {}", e)))?;
        Ok((login.session_id, login.current_org_id))
    }

    async fn token(&self, session_id: &str, org_id: &str) -> Result<String> {
        let url = format!("{}/identity-service/api/v1/jwt/Token", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("client_id", CLIENT_ID),
                ("nonce", TOKEN_NONCE),
                ("access_code", ""),
            ])
            .header("Content-Type", "application/json")
            .header("IDS-SESSION-ID", session_id)
            .header("X-INFA-ORG-ID", org_id)
            .send()
            .await
            .map_err(|e| CatalogError::Connection(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Auth(format!(
                "token exchange returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CatalogError::Auth(format!("unexpected token response: {}", e)))?;
        Ok(token.jwt_token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_login_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/identity-service/api/v1/Login"))
            .and(body_json(json!({"username": "svc", "password": "pw"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sessionId": "sess-1",
                "currentOrgId": "org-9",
                "name": "svc"
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/identity-service/api/v1/jwt/Token"))
            .and(query_param("client_id", "cdlg_app"))
            .and(header("IDS-SESSION-ID", "sess-1"))
            .and(header("X-INFA-ORG-ID", "org-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jwt_token": "jwt-abc"})))
            .mount(&server)
            .await;

        let client = IdentityClient::new(server.uri(), 5).unwrap();
        let creds = client.login("svc", "pw").await.unwrap();

        assert_eq!(creds.session_id, "sess-1");
        assert_eq!(creds.org_id, "org-9");
        assert_eq!(creds.jwt, "jwt-abc");
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/identity-service/api/v1/Login"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
            .mount(&server)
            .await;

        let client = IdentityClient::new(server.uri(), 5).unwrap();
        let result = client.login("svc", "wrong").await;

        assert!(matches!(result, Err(CatalogError::Auth(_))));
    }

    #[tokio::test]
    async fn test_token_missing_field() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/identity-service/api/v1/Login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sessionId": "s",
                "currentOrgId": "o"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/identity-service/api/v1/jwt/Token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = IdentityClient::new(server.uri(), 5).unwrap();
        assert!(matches!(
            client.login("svc", "pw").await,
            Err(CatalogError::Auth(_))
        ));
    }

    #[test]
    fn test_credentials_debug_redacts() {
        let creds = Credentials {
            session_id: "secret-session".into(),
            org_id: "org".into(),
            jwt: "secret-jwt".into(),
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("org"));
    }
}
