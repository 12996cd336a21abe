//! Remote chat service client: authenticate, list conversations, fetch
//! conversation history.

use crate::error::{HarvestError, HarvestResult};
use crate::http::RetryingHttpClient;
use crate::retry::{AttemptError, RetryPolicy};
use chatsweep_core::config::{HttpConfig, RemoteConfig};
use chatsweep_core::{Conversation, Message, SweepConfig};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

const TOKEN_PATH: &[&str] = &["data", "biz_data", "user", "token"];
const CONVERSATIONS_PATH: &[&str] = &["data", "biz_data", "chat_sessions"];
const MESSAGES_PATH: &[&str] = &["data", "biz_data", "chat_messages"];

/// Walk nested objects by key. Any missing key or non-object yields `None`.
pub fn json_path<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(value, |current, key| current.as_object()?.get(*key))
}

/// How the account identifier is presented to the login endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginShape {
    /// Identifier sent as `email`, `mobile` left empty.
    Email,
    /// Identifier sent as `mobile`, `email` left empty.
    Mobile,
}

impl LoginShape {
    /// Shapes tried in order when the identifier kind is unknown.
    pub const DEFAULT_ORDER: [LoginShape; 2] = [LoginShape::Email, LoginShape::Mobile];

    /// Login request body for this shape.
    pub fn payload(self, identifier: &str, secret: &str) -> Value {
        let (email, mobile) = match self {
            Self::Email => (identifier, ""),
            Self::Mobile => ("", identifier),
        };
        json!({
            "email": email,
            "mobile": mobile,
            "password": secret,
            "area_code": "",
            "device_id": "",
            "os": "",
        })
    }
}

/// Bearer token plus the verbatim login response kept for audit.
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Bearer token for subsequent calls.
    pub token: String,
    /// Raw login response body.
    pub raw: Value,
}

/// Result of a list or fetch call.
///
/// Keeps "the server returned nothing" apart from "every attempt failed".
#[derive(Debug, Clone, PartialEq)]
pub enum Listing<T> {
    /// The server returned at least one item.
    Items(Vec<T>),
    /// The server answered successfully with no items.
    Empty,
    /// Retries were exhausted.
    Failed {
        /// Error of the final attempt.
        error: String,
    },
}

impl<T> Listing<T> {
    fn from_items(items: Vec<T>) -> Self {
        if items.is_empty() {
            Self::Empty
        } else {
            Self::Items(items)
        }
    }

    /// Items, treating failure as an empty result.
    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Items(items) => items,
            Self::Empty | Self::Failed { .. } => Vec::new(),
        }
    }

    /// Whether retries were exhausted.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone)]
struct Endpoints {
    login: String,
    list: String,
    history: String,
}

impl Endpoints {
    fn resolve(remote: &RemoteConfig) -> HarvestResult<Self> {
        let base = remote
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                HarvestError::Core(chatsweep_core::Error::config(
                    "remote.base_url is not configured",
                ))
            })?
            .trim_end_matches('/');
        let join = |path: &str| {
            if path.starts_with('/') {
                format!("{}{}", base, path)
            } else {
                format!("{}/{}", base, path)
            }
        };
        Ok(Self {
            login: join(&remote.login_path),
            list: join(&remote.list_path),
            history: join(&remote.history_path),
        })
    }
}

/// Client for one account against the remote chat service.
#[derive(Debug, Clone)]
pub struct RemoteChatClient {
    http: RetryingHttpClient,
    endpoints: Endpoints,
    login_shapes: Vec<LoginShape>,
}

impl RemoteChatClient {
    /// Create a client from remote and HTTP settings.
    pub fn new(remote: &RemoteConfig, http: &HttpConfig) -> HarvestResult<Self> {
        Ok(Self {
            http: RetryingHttpClient::new(http, &remote.user_agent)?,
            endpoints: Endpoints::resolve(remote)?,
            login_shapes: LoginShape::DEFAULT_ORDER.to_vec(),
        })
    }

    /// Create a client from the full run configuration.
    pub fn from_config(config: &SweepConfig) -> HarvestResult<Self> {
        Self::new(&config.remote, &config.http)
    }

    /// Replace the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.http = self.http.with_policy(policy);
        self
    }

    /// Replace the order in which login payload shapes are tried.
    pub fn with_login_shapes(mut self, shapes: Vec<LoginShape>) -> Self {
        self.login_shapes = shapes;
        self
    }

    /// Log in, trying each payload shape with the full retry policy.
    pub async fn authenticate(&self, identifier: &str, secret: &str) -> HarvestResult<AuthSession> {
        let mut last_error = String::from("no login payload shape configured");

        for shape in &self.login_shapes {
            let payload = shape.payload(identifier, secret);
            let result = self
                .http
                .call_json(
                    "login",
                    |http| http.post(&self.endpoints.login).json(&payload),
                    |body| {
                        let token = json_path(body, TOKEN_PATH)
                            .and_then(Value::as_str)
                            .filter(|token| !token.is_empty())
                            .ok_or_else(|| {
                                AttemptError::MissingField(TOKEN_PATH.join("."))
                            })?;
                        Ok(AuthSession {
                            token: token.to_string(),
                            raw: body.clone(),
                        })
                    },
                )
                .await;

            match result {
                Ok(session) => {
                    info!("Authenticated {} using {:?} login", identifier, shape);
                    return Ok(session);
                }
                Err(exhausted) => {
                    debug!("{:?} login for {} failed: {}", shape, identifier, exhausted);
                    last_error = exhausted.last_error.to_string();
                }
            }
        }

        Err(HarvestError::Authentication(last_error))
    }

    /// List the account's conversations in server order.
    pub async fn list_conversations(&self, token: &str) -> Listing<Conversation> {
        let url = self.endpoints.list.as_str();
        let result = self
            .http
            .call_json(
                "list conversations",
                |http| http.get(url).bearer_auth(token),
                |body| extract_array(body, CONVERSATIONS_PATH),
            )
            .await;

        match result {
            Ok(items) => Listing::from_items(items),
            Err(exhausted) => {
                warn!("Listing conversations failed: {}", exhausted);
                Listing::Failed {
                    error: exhausted.to_string(),
                }
            }
        }
    }

    /// Fetch every message of one conversation in server order.
    pub async fn fetch_conversation(&self, token: &str, conversation_id: &str) -> Listing<Message> {
        let url = self.endpoints.history.as_str();
        let result = self
            .http
            .call_json(
                "fetch conversation",
                |http| {
                    http.get(url)
                        .query(&[("chat_session_id", conversation_id)])
                        .bearer_auth(token)
                },
                |body| extract_array(body, MESSAGES_PATH),
            )
            .await;

        match result {
            Ok(items) => Listing::from_items(items),
            Err(exhausted) => {
                warn!("Fetching conversation {} failed: {}", conversation_id, exhausted);
                Listing::Failed {
                    error: exhausted.to_string(),
                }
            }
        }
    }
}

fn extract_array<T: DeserializeOwned>(body: &Value, path: &[&str]) -> Result<Vec<T>, AttemptError> {
    let items = json_path(body, path)
        .filter(|value| value.is_array())
        .ok_or_else(|| AttemptError::MissingField(path.join(".")))?;
    serde_json::from_value(items.clone()).map_err(|e| AttemptError::Decode(e.to_string()))
}
