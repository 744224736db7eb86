use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::config::{access_key_api_config_from_env, AccessKeyApiConfig};
use crate::error::{ConfigError, RequestFailure};

/// Query pair attached to regenerate and re-upload requests so the backend
/// treats them as a replacement of an existing key.
pub const NOT_PRIMARY_UPLOAD: (&str, &str) = ("is_primary_uploading", "false");

const ACCESS_KEY_PATH: &str = "api/user/access_key";
const ACCESS_KEY_GENERATE_PATH: &str = "api/user/access_key/generate";

pub type QueryParams = [(&'static str, &'static str)];

/// Successful access-key response as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessKeyResponse {
    pub status: u16,
    #[serde(default)]
    pub body: Value,
}

impl AccessKeyResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn ok(body: Value) -> Self {
        Self::new(200, body)
    }
}

/// Public key file sent by upload and re-upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyUpload {
    pub file_name: String,
    pub content: String,
}

impl KeyUpload {
    pub fn new(file_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            content: content.into(),
        }
    }

    fn into_form(self) -> Form {
        let part = Part::text(self.content).file_name(self.file_name);
        Form::new().part("file", part)
    }
}

/// Builds and issues the access-key requests.
#[async_trait]
pub trait AccessKeyRequests: Send + Sync {
    async fn check(&self) -> Result<AccessKeyResponse, RequestFailure>;

    async fn generate(&self) -> Result<AccessKeyResponse, RequestFailure>;

    async fn regenerate(&self, query: &QueryParams) -> Result<AccessKeyResponse, RequestFailure>;

    async fn upload(&self, key: KeyUpload) -> Result<AccessKeyResponse, RequestFailure>;

    async fn reupload(
        &self,
        key: KeyUpload,
        query: &QueryParams,
    ) -> Result<AccessKeyResponse, RequestFailure>;
}

#[derive(Clone)]
pub struct HttpAccessKeyFacade {
    client: reqwest::Client,
    base_url: Url,
    auth_token: Option<String>,
}

impl HttpAccessKeyFacade {
    pub fn new(config: AccessKeyApiConfig) -> Result<Self, ConfigError> {
        let base_url = parse_base_url(&config.base_url)?;
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url,
            auth_token: config.auth_token,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(access_key_api_config_from_env())
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some(token) = &self.auth_token {
            request.bearer_auth(token)
        } else {
            request
        }
    }

    async fn execute(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<AccessKeyResponse, RequestFailure> {
        tracing::debug!(operation, "sending access key request");
        let response = self.auth(request).send().await?;
        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_ascii_lowercase().contains("json"))
            .unwrap_or(false);
        let text = response.text().await?;

        if !status.is_success() {
            return Err(RequestFailure::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let body = if text.trim().is_empty() {
            Value::Null
        } else if is_json {
            serde_json::from_str(&text).map_err(|err| RequestFailure::Decode(err.to_string()))?
        } else {
            Value::String(text)
        };
        tracing::debug!(operation, status = status.as_u16(), "access key request completed");
        Ok(AccessKeyResponse::new(status.as_u16(), body))
    }
}

#[async_trait]
impl AccessKeyRequests for HttpAccessKeyFacade {
    async fn check(&self) -> Result<AccessKeyResponse, RequestFailure> {
        self.execute("check", self.client.get(self.endpoint(ACCESS_KEY_PATH)))
            .await
    }

    async fn generate(&self) -> Result<AccessKeyResponse, RequestFailure> {
        self.execute(
            "generate",
            self.client.post(self.endpoint(ACCESS_KEY_GENERATE_PATH)),
        )
        .await
    }

    async fn regenerate(&self, query: &QueryParams) -> Result<AccessKeyResponse, RequestFailure> {
        self.execute(
            "regenerate",
            self.client
                .post(self.endpoint(ACCESS_KEY_GENERATE_PATH))
                .query(query),
        )
        .await
    }

    async fn upload(&self, key: KeyUpload) -> Result<AccessKeyResponse, RequestFailure> {
        self.execute(
            "upload",
            self.client
                .post(self.endpoint(ACCESS_KEY_PATH))
                .multipart(key.into_form()),
        )
        .await
    }

    async fn reupload(
        &self,
        key: KeyUpload,
        query: &QueryParams,
    ) -> Result<AccessKeyResponse, RequestFailure> {
        self.execute(
            "reupload",
            self.client
                .post(self.endpoint(ACCESS_KEY_PATH))
                .query(query)
                .multipart(key.into_form()),
        )
        .await
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw.trim()).map_err(|source| ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}
