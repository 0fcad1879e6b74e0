/*
[INPUT]:  Base URL, unauthorized callback, token store, request parameters
[OUTPUT]: Parsed JSON responses or normalized errors
[POS]:    HTTP layer - core client with bearer injection and single-flight token refresh
[UPDATE]: When changing request construction, refresh coordination or retry policy
*/

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::TokenStore;
use crate::http::{ApiError, NormalizedError, RefreshError, Result};
use crate::types::{RefreshTokenRequest, RefreshTokenResponse};

pub(crate) const REFRESH_TOKEN_PATH: &str = "/api/v1/auth/refresh-token";

/// Callback fired once per failed token refresh
pub type UnauthorizedHandler = Arc<dyn Fn() + Send + Sync>;

type RefreshOperation = Shared<BoxFuture<'static, std::result::Result<String, RefreshError>>>;

static DEFAULT_CLIENT: RwLock<Option<ApiClient>> = RwLock::new(None);

/// Client configuration.
///
/// Replaced wholesale by [`ApiClient::configure`].
#[derive(Clone)]
pub struct ApiClientConfig {
    pub base_url: String,
    pub on_unauthorized: Option<UnauthorizedHandler>,
    /// Per-request timeout; `None` leaves it to the transport
    pub timeout: Option<Duration>,
}

impl ApiClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            on_unauthorized: None,
            timeout: None,
        }
    }

    pub fn with_on_unauthorized(mut self, handler: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_unauthorized = Some(Arc::new(handler));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// `base_url + path`, validated
    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}{}", self.base_url, path))?)
    }
}

impl fmt::Debug for ApiClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClientConfig")
            .field("base_url", &self.base_url)
            .field("on_unauthorized", &self.on_unauthorized.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

struct ClientInner {
    http: Client,
    config: RwLock<ApiClientConfig>,
    tokens: Arc<dyn TokenStore>,
    refresh: Mutex<Option<RefreshOperation>>,
}

/// HTTP client for the Astrogator's Table API.
///
/// Cheap to clone; clones share configuration, token store and the
/// in-flight refresh.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config())
            .field("refresh_in_flight", &self.refresh_in_flight())
            .finish()
    }
}

impl ApiClient {
    /// Create a new client
    pub fn new(config: ApiClientConfig, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let http = Client::builder().build()?;
        Ok(Self::with_http_client(http, config, tokens))
    }

    /// Create a client around an existing reqwest client
    pub fn with_http_client(
        http: Client,
        config: ApiClientConfig,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                http,
                config: RwLock::new(config),
                tokens,
                refresh: Mutex::new(None),
            }),
        }
    }

    /// Replace the configuration. Last write wins.
    pub fn configure(&self, config: ApiClientConfig) {
        debug!(base_url = %config.base_url, "api client configured");
        *self.inner.config.write().unwrap_or_else(PoisonError::into_inner) = config;
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> ApiClientConfig {
        self.inner
            .config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn token_store(&self) -> &Arc<dyn TokenStore> {
        &self.inner.tokens
    }

    /// Whether a token refresh is currently outstanding
    pub fn refresh_in_flight(&self) -> bool {
        self.inner
            .refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Perform a JSON request against `base_url + path`.
    ///
    /// A 401 on a request that carried an access token triggers one shared
    /// token refresh and a single retry. A 204 yields `T` parsed from `{}`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        headers: Option<HeaderMap>,
    ) -> Result<T> {
        let config = self.config();
        let url = config.endpoint(path)?;

        let mut request_headers = HeaderMap::new();
        request_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(extra) = headers {
            request_headers.extend(extra);
        }

        let access_token = self.inner.tokens.access_token();
        if let Some(token) = &access_token {
            request_headers.insert(AUTHORIZATION, bearer(token)?);
        }

        let mut response = self
            .send(&config, &method, &url, &request_headers, body.as_ref())
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED && access_token.is_some() {
            debug!(%method, path, "access token rejected; awaiting refresh");
            let new_access = self
                .refreshed_access_token()
                .await
                .map_err(ApiError::AuthenticationFailed)?;

            request_headers.insert(AUTHORIZATION, bearer(&new_access)?);
            response = self
                .send(&config, &method, &url, &request_headers, body.as_ref())
                .await?;
        }

        read_json(response).await
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, None, None).await
    }

    pub async fn post<T, B>(&self, path: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = to_json_body(body)?;
        self.request(Method::POST, path, body, None).await
    }

    pub async fn put<T, B>(&self, path: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = to_json_body(body)?;
        self.request(Method::PUT, path, body, None).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = to_json_body(body)?;
        self.request(Method::PATCH, path, body, None).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::DELETE, path, None, None).await
    }

    async fn send(
        &self,
        config: &ApiClientConfig,
        method: &Method,
        url: &Url,
        headers: &HeaderMap,
        body: Option<&serde_json::Value>,
    ) -> Result<Response> {
        let mut builder = self
            .inner
            .http
            .request(method.clone(), url.clone())
            .headers(headers.clone());
        if let Some(body) = body {
            builder = builder.body(serde_json::to_vec(body)?);
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(builder.send().await?)
    }

    /// Join the in-flight refresh, or start one if none is registered.
    async fn refreshed_access_token(&self) -> std::result::Result<String, RefreshError> {
        let operation = {
            let mut slot = self
                .inner
                .refresh
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(operation) => {
                    debug!("joining in-flight token refresh");
                    operation.clone()
                }
                None => {
                    let operation = self.start_refresh();
                    *slot = Some(operation.clone());
                    operation
                }
            }
        };

        operation.await
    }

    /// Build the shared refresh operation. It clears its own slot as it
    /// settles, whatever the outcome.
    fn start_refresh(&self) -> RefreshOperation {
        let client = self.clone();
        async move {
            let outcome = client.refresh_access_token().await;
            client
                .inner
                .refresh
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            outcome
        }
        .boxed()
        .shared()
    }

    async fn refresh_access_token(&self) -> std::result::Result<String, RefreshError> {
        let outcome = self.exchange_refresh_token().await;
        if let Err(e) = &outcome {
            warn!(error = %e, "token refresh failed; clearing credentials");
            self.inner.tokens.clear_tokens();
            if let Some(on_unauthorized) = self.config().on_unauthorized {
                on_unauthorized();
            }
        }
        outcome
    }

    /// POST /api/v1/auth/refresh-token
    async fn exchange_refresh_token(&self) -> std::result::Result<String, RefreshError> {
        let refresh_token = self
            .inner
            .tokens
            .refresh_token()
            .ok_or(RefreshError::MissingRefreshToken)?;

        let config = self.config();
        let url = config
            .endpoint(REFRESH_TOKEN_PATH)
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let mut builder = self.inner.http.post(url).json(&RefreshTokenRequest {
            refresh_token: refresh_token.clone(),
        });
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
            });
        }

        let data: RefreshTokenResponse = response
            .json()
            .await
            .map_err(|e| RefreshError::InvalidResponse(e.to_string()))?;

        self.inner
            .tokens
            .set_tokens(&data.access_token, &refresh_token);
        debug!("access token refreshed");
        Ok(data.access_token)
    }
}

/// Install the process-wide client, replacing any previous one.
pub fn initialize_api_client(
    config: ApiClientConfig,
    tokens: Arc<dyn TokenStore>,
) -> Result<ApiClient> {
    let client = ApiClient::new(config, tokens)?;
    *DEFAULT_CLIENT.write().unwrap_or_else(PoisonError::into_inner) = Some(client.clone());
    Ok(client)
}

/// The process-wide client installed by [`initialize_api_client`]
pub fn api_client() -> Result<ApiClient> {
    DEFAULT_CLIENT
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or(ApiError::NotConfigured)
}

fn bearer(token: &str) -> Result<HeaderValue> {
    Ok(HeaderValue::from_str(&format!("Bearer {token}"))?)
}

fn to_json_body<B: Serialize + ?Sized>(body: Option<&B>) -> Result<Option<serde_json::Value>> {
    Ok(body.map(serde_json::to_value).transpose()?)
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        let error = NormalizedError::from_response(status, &body);
        return Err(ApiError::Request(error));
    }

    if status == StatusCode::NO_CONTENT {
        return Ok(serde_json::from_value(serde_json::json!({}))?);
    }

    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
