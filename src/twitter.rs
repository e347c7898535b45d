use crate::config::Config;
use crate::error::TwitterError;
use crate::oauth::OAuthSigner;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

pub const VERIFY_CREDENTIALS_PATH: &str = "/1.1/account/verify_credentials.json";
pub const USER_TIMELINE_PATH: &str = "/1.1/statuses/user_timeline.json";

/// A status on the user's timeline. Only the identifiers matter here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: u64,
    pub id_str: String,
}

impl Tweet {
    pub fn new(id: u64) -> Self {
        Self {
            id,
            id_str: id.to_string(),
        }
    }
}

/// Authenticated account as returned by verify_credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id_str: String,
    pub screen_name: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// A request against the REST API. GET params become the query string,
/// POST params the form body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub params: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>, params: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            params,
        }
    }

    pub fn post(path: impl Into<String>, params: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            params,
        }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Successful response body
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }
}

/// Authenticated transport. Implementations return
/// `TwitterError::RateLimited` when the provider throttles the request.
#[allow(async_fn_in_trait)] // Single-task use; no Send bound needed
pub trait Transport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TwitterError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TwitterError> {
        (**self).send(request).await
    }
}

/// Ask the provider who the access token belongs to
pub async fn verify_credentials(transport: &impl Transport) -> Result<User, TwitterError> {
    let request = ApiRequest::get(VERIFY_CREDENTIALS_PATH, Vec::new());
    let response = transport.send(&request).await?;
    let user: User = serde_json::from_str(&response.body)?;
    Ok(user)
}

/// OAuth-signed HTTP transport
pub struct TwitterClient {
    http_client: reqwest::Client,
    base_url: Url,
    signer: OAuthSigner,
}

impl TwitterClient {
    pub fn new(config: &Config) -> Result<Self, TwitterError> {
        let sweep = config.sweep();
        let http_client = reqwest::Client::builder()
            .timeout(sweep.request_timeout())
            .user_agent(format!("tweetsweep/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http_client,
            base_url: Url::parse(&sweep.api_base_url)?,
            signer: OAuthSigner::new(config),
        })
    }
}

impl Transport for TwitterClient {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TwitterError> {
        let url = self.base_url.join(&request.path)?;
        let auth_header =
            self.signer
                .authorization_header(request.method.as_str(), url.as_str(), &request.params)?;

        debug!("{} {}", request.method.as_str(), url);

        let builder = match request.method {
            Method::Get => self.http_client.get(url).query(&request.params),
            Method::Post => self.http_client.post(url).form(&request.params),
        };

        let response = builder.header(AUTHORIZATION, auth_header).send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let reset_at = rate_limit_reset(response.headers());
            return Err(TwitterError::RateLimited { reset_at });
        }

        let body = response.text().await?;

        if !status.is_success() {
            warn!("{} {} returned HTTP {}", request.method.as_str(), request.path, status);
            return Err(TwitterError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        Ok(ApiResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Decode `x-rate-limit-reset` (unix seconds). A missing or garbled header
/// means "now", leaving the minimum wait in charge.
fn rate_limit_reset(headers: &HeaderMap) -> DateTime<Utc> {
    headers
        .get("x-rate-limit-reset")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}
