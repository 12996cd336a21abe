//! HTTP transport with a uniform retry policy.

use crate::error::HarvestResult;
use crate::retry::{retry_with_backoff, AttemptError, RetryExhausted, RetryPolicy};
use chatsweep_core::config::HttpConfig;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// One account's HTTP session.
///
/// Every call goes through [`retry_with_backoff`]; a call succeeds only when
/// the server answers `200 OK` with a JSON body that the caller's extractor
/// accepts.
#[derive(Debug, Clone)]
pub struct RetryingHttpClient {
    http: Client,
    policy: RetryPolicy,
}

impl RetryingHttpClient {
    /// Build a client with timeout, proxy and TLS settings from configuration.
    pub fn new(config: &HttpConfig, user_agent: &str) -> HarvestResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(user_agent.to_string())
            .default_headers(headers)
            .danger_accept_invalid_certs(!config.verify_tls);
        if let Some(proxy) = config.proxy.as_deref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            http: builder.build()?,
            policy: RetryPolicy::from_config(config),
        })
    }

    /// Replace the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Active retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Send the request built by `build` until `extract` accepts a response
    /// or the policy is exhausted.
    pub async fn call_json<T, B, X>(
        &self,
        label: &str,
        build: B,
        extract: X,
    ) -> Result<T, RetryExhausted>
    where
        B: Fn(&Client) -> RequestBuilder,
        X: Fn(&Value) -> Result<T, AttemptError>,
    {
        let http = &self.http;
        let build = &build;
        let extract = &extract;
        retry_with_backoff(&self.policy, label, move |_| async move {
            let response = build(http).send().await?;
            let status = response.status();
            if status != StatusCode::OK {
                return Err(AttemptError::Status(status.as_u16()));
            }
            let body = response
                .json::<Value>()
                .await
                .map_err(|e| AttemptError::Decode(e.to_string()))?;
            extract(&body)
        })
        .await
    }
}
