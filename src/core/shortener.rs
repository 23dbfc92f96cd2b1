use crate::domain::model::{ShortenFailure, ShortenResult};
use crate::domain::ports::Shortener;
use crate::utils::error::Result;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.vk.com/method";
pub const DEFAULT_METHOD: &str = "utils.getShortLink";
pub const DEFAULT_API_VERSION: &str = "5.131";

/// 短網址服務的連線設定
#[derive(Debug, Clone)]
pub struct ShortenerConfig {
    pub api_base: String,
    pub method: String,
    pub access_token: String,
    pub api_version: String,
    /// Visibility flag sent as `private`; "0" makes link stats public.
    pub private: String,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl ShortenerConfig {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            method: DEFAULT_METHOD.to_string(),
            access_token: access_token.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            private: "0".to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 0,
            retry_delay: Duration::from_millis(500),
        }
    }

    pub fn method_url(&self) -> String {
        format!("{}/{}/", self.api_base.trim_end_matches('/'), self.method)
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    response: Option<ShortLinkPayload>,
    error: Option<ApiErrorPayload>,
}

#[derive(Debug, Deserialize)]
struct ShortLinkPayload {
    short_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorPayload {
    error_code: i64,
    #[serde(default)]
    error_msg: String,
}

/// Shortener backed by the VK `utils.getShortLink` method.
pub struct VkShortener {
    config: ShortenerConfig,
    client: Client,
}

impl VkShortener {
    pub fn new(config: ShortenerConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ShortenerConfig {
        &self.config
    }

    async fn attempt(&self, url: &str) -> ShortenResult {
        let request = self.client.get(self.config.method_url()).query(&[
            ("url", url),
            ("access_token", self.config.access_token.as_str()),
            ("v", self.config.api_version.as_str()),
            ("private", self.config.private.as_str()),
        ]);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return ShortenResult::failure(classify_transport_error(&e)),
        };

        let status = response.status();
        tracing::debug!("Shortener response status: {}", status);
        if !status.is_success() {
            return ShortenResult::failure(ShortenFailure::Status(status.as_u16()));
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return ShortenResult::failure(classify_transport_error(&e)),
        };

        parse_payload(&body)
    }
}

#[async_trait::async_trait]
impl Shortener for VkShortener {
    async fn shorten(&self, url: &str) -> ShortenResult {
        let mut attempt = 0;
        loop {
            let result = self.attempt(url).await;
            match result {
                ShortenResult::Failure { ref reason }
                    if reason.is_retryable() && attempt < self.config.max_retries =>
                {
                    attempt += 1;
                    let delay = self.config.retry_delay * attempt;
                    tracing::debug!(
                        "Retrying {} in {:?} (attempt {}/{}): {}",
                        url,
                        delay,
                        attempt,
                        self.config.max_retries,
                        reason
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }
}

fn classify_transport_error(error: &reqwest::Error) -> ShortenFailure {
    if error.is_timeout() {
        ShortenFailure::Timeout
    } else {
        ShortenFailure::Transport(error.to_string())
    }
}

fn parse_payload(body: &str) -> ShortenResult {
    let envelope: ApiEnvelope = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) => return ShortenResult::failure(ShortenFailure::MalformedPayload(e.to_string())),
    };

    if let Some(error) = envelope.error {
        return ShortenResult::failure(ShortenFailure::Service {
            code: error.error_code,
            message: error.error_msg,
        });
    }

    match envelope.response.and_then(|r| r.short_url) {
        Some(short_url) if !short_url.is_empty() => ShortenResult::success(short_url),
        _ => ShortenResult::failure(ShortenFailure::MissingShortUrl),
    }
}
