//! Authenticated HTTP session against the cloud API

use reqwest::{header, Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::app::options::ApiOptions;
use crate::authn::credentials::Credentials;
use crate::authn::token::AccessToken;
use crate::errors::AppError;
use crate::utils::login_scope;

/// HTTP client for the cloud API.
///
/// Owns the access token once logged in; every request built through this
/// client carries it as a bearer header.
pub struct HttpClient {
    client: Client,
    options: ApiOptions,
    token: RwLock<Option<AccessToken>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginRequest<'a> {
    client_id: &'a str,
    email: &'a str,
    password: &'a str,
    scope: String,
}

/// Error body returned by the API on non-success statuses
#[derive(Debug, Default, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(options: &ApiOptions) -> Result<Self, AppError> {
        let client = Client::builder().timeout(options.request_timeout).build()?;

        Ok(Self {
            client,
            options: options.clone(),
            token: RwLock::new(None),
        })
    }

    /// Current token, if logged in
    pub async fn token(&self) -> Option<AccessToken> {
        self.token.read().await.clone()
    }

    pub(crate) fn auth_url(&self, path: &str) -> String {
        format!("{}{}", self.options.auth_base_url.trim_end_matches('/'), path)
    }

    pub(crate) fn app_url(&self, path: &str) -> String {
        format!("{}{}", self.options.app_base_url.trim_end_matches('/'), path)
    }

    /// Add the bearer header when a token is present; without one the request
    /// goes out unchanged.
    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.token.read().await.as_ref() {
            Some(token) if !token.access_token.is_empty() => {
                request.header(header::AUTHORIZATION, token.bearer())
            }
            _ => request,
        }
    }

    /// Send a request through the session
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response, AppError> {
        let response = self.authorize(request).await.send().await?;
        Ok(response)
    }

    pub(crate) fn get(&self, url: &str) -> RequestBuilder {
        debug!("GET {}", url);
        self.client.get(url)
    }

    pub(crate) fn post(&self, url: &str) -> RequestBuilder {
        debug!("POST {}", url);
        self.client.post(url)
    }

    /// Exchange credentials for an access token.
    ///
    /// A single attempt: empty credentials fail before any request is made,
    /// and a rejected login is returned as is.
    pub async fn login(&self, credentials: &Credentials) -> Result<AccessToken, AppError> {
        credentials.ensure_present()?;

        let body = LoginRequest {
            client_id: &self.options.client_id,
            email: credentials.username(),
            password: credentials.password(),
            scope: login_scope(),
        };

        let url = self.auth_url("/userManagement/login");
        let response = self.send(self.post(&url).json(&body)).await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = error_message(response).await;
            error!("Login failed: {} - {}", status, message);
            return Err(AppError::AuthRejected(message));
        }

        let token: AccessToken = response.json().await?;
        *self.token.write().await = Some(token.clone());

        info!(user_id = %token.user_id, "logged in successfully");
        Ok(token)
    }
}

/// Pull `message` out of an error body, falling back to the raw body or the
/// status line when the body is not the expected JSON.
pub(crate) async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiMessage>(&body) {
        Ok(api) if !api.message.is_empty() => api.message,
        _ if !body.trim().is_empty() => body,
        _ => status.to_string(),
    }
}
