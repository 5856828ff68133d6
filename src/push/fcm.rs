//! Firebase Cloud Messaging HTTP v1 channel.
//!
//! FCM v1 has no multicast endpoint, so one multicast is one
//! `messages:send` request per token, run with bounded concurrency.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};

use crate::config::PushConfig;
use crate::notification::PushMessage;

use super::{PushChannel, PushChannelError, PushResponse, MAX_MULTICAST_ADDRESSES};

#[derive(Serialize)]
struct SendRequest<'a> {
    message: MessageBody<'a>,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    token: &'a str,
    notification: NotificationBody<'a>,
    data: &'a BTreeMap<String, String>,
}

#[derive(Serialize)]
struct NotificationBody<'a> {
    title: &'a str,
    body: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    name: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorStatus,
}

#[derive(Deserialize)]
struct ErrorStatus {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "errorCode", default)]
    error_code: Option<String>,
}

/// FCM error codes that describe the sender, not the token
const CALL_LEVEL_ERROR_CODES: &[&str] = &["SENDER_ID_MISMATCH", "THIRD_PARTY_AUTH_ERROR"];

/// Result of one per-token request
enum TokenResult {
    Response(PushResponse),
    /// Credentials or sender refused; says nothing about the token
    CallRejected(String),
    Unreachable(String),
}

/// FCM HTTP v1 push channel
pub struct FcmChannel {
    client: reqwest::Client,
    send_url: String,
    project_id: String,
    access_token: String,
    max_concurrency: usize,
}

impl FcmChannel {
    pub fn new(config: &PushConfig) -> Result<Self, PushChannelError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            send_url: format!(
                "{}/v1/projects/{}/messages:send",
                config.endpoint.trim_end_matches('/'),
                config.project_id
            ),
            project_id: config.project_id.clone(),
            access_token: config.access_token.clone(),
            max_concurrency: config.max_concurrency.max(1),
        })
    }

    async fn send_one(&self, message: &PushMessage, token: &str) -> TokenResult {
        let request = SendRequest {
            message: MessageBody {
                token,
                notification: NotificationBody {
                    title: &message.title,
                    body: &message.body,
                },
                data: &message.data,
            },
        };

        let response = match self
            .client
            .post(&self.send_url)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return TokenResult::Unreachable(e.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<SendResponse>().await {
                Ok(body) => TokenResult::Response(PushResponse::sent(body.name)),
                Err(e) => TokenResult::Response(PushResponse::rejected(format!(
                    "Unreadable FCM response: {}",
                    e
                ))),
            };
        }

        let body = response.text().await.unwrap_or_default();
        let reason = error_reason(status.as_u16(), &body);
        if is_call_level(status, &reason) {
            TokenResult::CallRejected(reason)
        } else {
            TokenResult::Response(PushResponse::rejected(reason))
        }
    }
}

/// Most specific reason FCM gives for a rejected token.
///
/// Prefers the FCM error code (`UNREGISTERED`, `INVALID_ARGUMENT` ...), then
/// the canonical status, then the bare HTTP status.
fn error_reason(http_status: u16, body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| {
            envelope
                .error
                .details
                .into_iter()
                .find_map(|d| d.error_code)
                .or(envelope.error.status)
        })
        .unwrap_or_else(|| format!("HTTP {}", http_status))
}

/// 401/403 and sender errors reject the request, not the token
fn is_call_level(status: reqwest::StatusCode, reason: &str) -> bool {
    status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
        || CALL_LEVEL_ERROR_CODES.contains(&reason)
}

#[async_trait]
impl PushChannel for FcmChannel {
    #[tracing::instrument(
        name = "fcm.send_multicast",
        skip(self, message, addresses),
        fields(address_count = addresses.len())
    )]
    async fn send_multicast(
        &self,
        message: &PushMessage,
        addresses: &[String],
    ) -> Result<Vec<PushResponse>, PushChannelError> {
        if self.project_id.is_empty() {
            return Err(PushChannelError::NotConfigured("missing project_id".into()));
        }
        if self.access_token.is_empty() {
            return Err(PushChannelError::NotConfigured("missing access_token".into()));
        }
        if addresses.len() > MAX_MULTICAST_ADDRESSES {
            return Err(PushChannelError::TooManyAddresses(addresses.len()));
        }
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        let requests: Vec<_> = addresses
            .iter()
            .enumerate()
            .map(|(idx, token)| async move { (idx, self.send_one(message, token).await) })
            .collect();

        let mut results: Vec<(usize, TokenResult)> = stream::iter(requests)
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;
        results.sort_by_key(|(idx, _)| *idx);

        // No token got an answer about itself: the call failed as a whole
        if results
            .iter()
            .all(|(_, r)| !matches!(r, TokenResult::Response(_)))
        {
            let rejected = results.iter().find_map(|(_, r)| match r {
                TokenResult::CallRejected(reason) => Some(reason.clone()),
                _ => None,
            });
            if let Some(reason) = rejected {
                return Err(PushChannelError::Rejected(reason));
            }
            let first = results
                .into_iter()
                .find_map(|(_, r)| match r {
                    TokenResult::Unreachable(e) => Some(e),
                    _ => None,
                })
                .unwrap_or_default();
            return Err(PushChannelError::Transport(first));
        }

        let unreachable = results
            .iter()
            .filter(|(_, r)| matches!(r, TokenResult::Unreachable(_)))
            .count();
        if unreachable > 0 {
            tracing::warn!(
                unreachable = unreachable,
                total = results.len(),
                "Some FCM requests failed at transport level"
            );
        }

        Ok(results
            .into_iter()
            .map(|(_, r)| match r {
                TokenResult::Response(response) => response,
                TokenResult::CallRejected(reason) | TokenResult::Unreachable(reason) => {
                    PushResponse::rejected(reason)
                }
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "fcm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::response::{IntoResponse, Response};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    const GOOD_TOKEN: &str = "good-token";

    /// Minimal FCM v1 stand-in. Token names pick the answer.
    async fn fake_fcm(headers: HeaderMap, Json(body): Json<Value>) -> Response {
        let authorized = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            == Some(&format!("Bearer {}", GOOD_TOKEN)[..]);
        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": { "code": 401, "status": "UNAUTHENTICATED" } })),
            )
                .into_response();
        }

        let token = body["message"]["token"].as_str().unwrap_or_default().to_string();
        match token.as_str() {
            "tok-stale" => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": {
                    "code": 404,
                    "status": "NOT_FOUND",
                    "details": [{ "errorCode": "UNREGISTERED" }]
                }})),
            )
                .into_response(),
            "tok-foreign" => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": {
                    "code": 400,
                    "status": "INVALID_ARGUMENT",
                    "details": [{ "errorCode": "SENDER_ID_MISMATCH" }]
                }})),
            )
                .into_response(),
            "tok-slow" => {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Json(json!({ "name": format!("projects/demo/messages/{}", token) })).into_response()
            }
            "tok-hang" => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                StatusCode::OK.into_response()
            }
            _ => Json(json!({ "name": format!("projects/demo/messages/{}", token) })).into_response(),
        }
    }

    async fn spawn_fake_fcm() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().fallback(fake_fcm);
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn live_channel(access_token: &str) -> FcmChannel {
        FcmChannel::new(&PushConfig {
            endpoint: spawn_fake_fcm().await,
            access_token: access_token.into(),
            timeout_ms: 1_000,
            ..config()
        })
        .unwrap()
    }

    fn tokens(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn message() -> PushMessage {
        PushMessage {
            title: "Title".into(),
            body: "Body".into(),
            data: BTreeMap::from([("type".to_string(), "new_provider".to_string())]),
        }
    }

    fn config() -> PushConfig {
        PushConfig {
            enabled: true,
            endpoint: "http://127.0.0.1:1/".into(),
            project_id: "demo".into(),
            access_token: "token".into(),
            timeout_ms: 500,
            ..Default::default()
        }
    }

    #[test]
    fn test_send_url() {
        let channel = FcmChannel::new(&config()).unwrap();
        assert_eq!(
            channel.send_url,
            "http://127.0.0.1:1/v1/projects/demo/messages:send"
        );
    }

    #[test]
    fn test_request_body_shape() {
        let msg = message();
        let request = SendRequest {
            message: MessageBody {
                token: "tok-1",
                notification: NotificationBody {
                    title: &msg.title,
                    body: &msg.body,
                },
                data: &msg.data,
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["message"]["token"], "tok-1");
        assert_eq!(value["message"]["notification"]["title"], "Title");
        assert_eq!(value["message"]["data"]["type"], "new_provider");
    }

    #[test]
    fn test_error_reason_prefers_fcm_code() {
        let body = r#"{"error":{"code":404,"status":"NOT_FOUND","details":[
            {"@type":"type.googleapis.com/google.firebase.fcm.v1.FcmError","errorCode":"UNREGISTERED"}
        ]}}"#;
        assert_eq!(error_reason(404, body), "UNREGISTERED");

        let body = r#"{"error":{"code":400,"status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(error_reason(400, body), "INVALID_ARGUMENT");

        assert_eq!(error_reason(502, "<html>"), "HTTP 502");
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_the_call() {
        let channel = FcmChannel::new(&PushConfig {
            access_token: String::new(),
            ..config()
        })
        .unwrap();

        let result = channel.send_multicast(&message(), &["tok".to_string()]).await;
        assert!(matches!(result, Err(PushChannelError::NotConfigured(_))));
    }

    #[tokio::test]
    async fn test_too_many_addresses() {
        let channel = FcmChannel::new(&config()).unwrap();
        let addresses: Vec<String> = (0..=MAX_MULTICAST_ADDRESSES).map(|i| i.to_string()).collect();

        let result = channel.send_multicast(&message(), &addresses).await;
        assert!(matches!(result, Err(PushChannelError::TooManyAddresses(501))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_call_failure() {
        let channel = FcmChannel::new(&config()).unwrap();

        let result = channel
            .send_multicast(&message(), &["a".to_string(), "b".to_string()])
            .await;
        assert!(matches!(result, Err(PushChannelError::Transport(_))));
    }

    #[tokio::test]
    async fn test_responses_keep_token_order() {
        let channel = live_channel(GOOD_TOKEN).await;

        let responses = channel
            .send_multicast(&message(), &tokens(&["tok-slow", "tok-1", "tok-stale"]))
            .await
            .unwrap();

        assert_eq!(responses.len(), 3);
        assert_eq!(
            responses[0].message_id.as_deref(),
            Some("projects/demo/messages/tok-slow")
        );
        assert_eq!(
            responses[1].message_id.as_deref(),
            Some("projects/demo/messages/tok-1")
        );
        assert!(!responses[2].success);
        assert_eq!(responses[2].error.as_deref(), Some("UNREGISTERED"));
    }

    #[tokio::test]
    async fn test_unauthenticated_is_call_failure() {
        let channel = live_channel("expired-token").await;

        let result = channel
            .send_multicast(&message(), &tokens(&["tok-1", "tok-2"]))
            .await;

        match result {
            Err(PushChannelError::Rejected(reason)) => assert_eq!(reason, "UNAUTHENTICATED"),
            other => panic!("expected call rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_uniform_sender_mismatch_is_call_failure() {
        let channel = live_channel(GOOD_TOKEN).await;

        let result = channel
            .send_multicast(&message(), &tokens(&["tok-foreign", "tok-foreign"]))
            .await;
        assert!(matches!(result, Err(PushChannelError::Rejected(r)) if r == "SENDER_ID_MISMATCH"));
    }

    #[tokio::test]
    async fn test_partial_transport_failure() {
        let channel = FcmChannel::new(&PushConfig {
            endpoint: spawn_fake_fcm().await,
            access_token: GOOD_TOKEN.into(),
            timeout_ms: 300,
            ..config()
        })
        .unwrap();

        let responses = channel
            .send_multicast(&message(), &tokens(&["tok-1", "tok-hang"]))
            .await
            .unwrap();

        assert!(responses[0].success);
        assert!(!responses[1].success);
        assert!(responses[1].error.is_some());
    }

    #[test]
    fn test_call_level_classification() {
        assert!(is_call_level(reqwest::StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"));
        assert!(is_call_level(reqwest::StatusCode::FORBIDDEN, "PERMISSION_DENIED"));
        assert!(is_call_level(reqwest::StatusCode::BAD_REQUEST, "THIRD_PARTY_AUTH_ERROR"));
        assert!(!is_call_level(reqwest::StatusCode::NOT_FOUND, "UNREGISTERED"));
        assert!(!is_call_level(reqwest::StatusCode::BAD_REQUEST, "INVALID_ARGUMENT"));
    }
}
