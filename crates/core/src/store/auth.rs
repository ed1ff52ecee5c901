use crate::config::ApiKey;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_IDENTITY_BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

/// A signed-in user. The id token authorizes document access for `uid`.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub uid: String,
    pub id_token: String,
    pub email: String,
}

impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("uid", &self.uid)
            .field("email", &self.email)
            .field("id_token", &"<redacted>")
            .finish()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("an account with this email already exists")]
    EmailInUse,

    #[error("first and last name are required")]
    MissingName,

    #[error("auth error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("http error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("invalid auth response: {0}")]
    InvalidResponse(String),
}

impl AuthError {
    /// Maps an Identity Toolkit error message such as `WEAK_PASSWORD : ...`.
    fn from_api(status: u16, message: String) -> Self {
        let code = message.split(" :").next().unwrap_or_default().trim();
        match code {
            "INVALID_LOGIN_CREDENTIALS" | "INVALID_PASSWORD" | "EMAIL_NOT_FOUND" => {
                AuthError::InvalidCredentials
            }
            "EMAIL_EXISTS" => AuthError::EmailInUse,
            _ => AuthError::Api { status, message },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasswordResponse {
    local_id: String,
    id_token: String,
    #[serde(default)]
    email: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct FirebaseAuth {
    client: Client,
    api_key: ApiKey,
    base_url: String,
}

impl FirebaseAuth {
    pub fn new(api_key: ApiKey) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default http client");
                Client::new()
            });
        Self {
            client,
            api_key,
            base_url: DEFAULT_IDENTITY_BASE_URL.to_owned(),
        }
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_owned();
        self
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        self.password_call("accounts:signInWithPassword", email, password)
            .await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        self.password_call("accounts:signUp", email, password).await
    }

    async fn password_call(
        &self,
        method: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, method))
            .map_err(|e| AuthError::InvalidResponse(format!("bad auth url: {e}")))?;
        url.query_pairs_mut().append_pair("key", self.api_key.expose());

        tracing::debug!(method, "calling identity toolkit");
        let response = self
            .client
            .post(url)
            .json(&PasswordRequest {
                email,
                password,
                return_secure_token: true,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(AuthError::from_api(status.as_u16(), message));
        }

        let parsed: PasswordResponse =
            serde_json::from_str(&body).map_err(|e| AuthError::InvalidResponse(e.to_string()))?;
        Ok(AuthSession {
            uid: parsed.local_id,
            id_token: parsed.id_token,
            email: if parsed.email.is_empty() {
                email.to_owned()
            } else {
                parsed.email
            },
        })
    }
}
