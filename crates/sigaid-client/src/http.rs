//! Reqwest-based Authority client with retry.
//!
//! Transient failures (connect errors, timeouts, 5xx) are retried with
//! capped exponential backoff and full jitter up to the caller's
//! deadline. Protocol rejections are mapped to [`ClientError`] and
//! surfaced immediately; `LeaseHeldByAnother` in particular is never
//! retried here.

use rand::Rng;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::{Duration, Instant};

use sigaid_core::wire::{
    AcquireLeaseRequest, AgentInfo, ErrorResponse, LeaseGrant, LeaseStatus, RegisterAgentRequest,
    ReleaseLeaseRequest, RenewLeaseRequest, StateHeadResponse, StateHistoryResponse, VerifyRequest,
    VerifyResponse,
};
use sigaid_core::{ChainHead, StateEntry};

use crate::config::ClientConfig;
use crate::error::ClientError;

const BASE_DELAY: Duration = Duration::from_millis(250);
const MAX_DELAY: Duration = Duration::from_secs(10);

/// Low-level HTTP client for the Authority wire contract.
#[derive(Clone)]
pub struct AuthorityClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct AppendStateBody<'a> {
    entry: &'a StateEntry,
    lease_token: &'a str,
}

impl AuthorityClient {
    pub fn new(config: &ClientConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self {
            http,
            base_url: config.authority_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full-jitter backoff: uniform over [0, min(cap, base * 2^attempt)].
    fn backoff_delay(attempt: u32) -> Duration {
        let exp = BASE_DELAY.saturating_mul(2u32.saturating_pow(attempt));
        let cap = exp.min(MAX_DELAY);
        let jittered = rand::thread_rng().gen_range(0..=cap.as_millis() as u64);
        Duration::from_millis(jittered)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
        deadline: Option<Instant>,
    ) -> Result<(StatusCode, Vec<u8>), ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempt: u32 = 0;

        loop {
            let mut request = self.http.request(method.clone(), &url);
            if let Some(key) = &self.api_key {
                request = request.header("x-api-key", key);
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(ClientError::DeadlineExceeded);
                }
                request = request.timeout(remaining);
            }

            let transient_reason = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let bytes = response
                        .bytes()
                        .await
                        .map(|b| b.to_vec())
                        .unwrap_or_default();
                    if status.is_server_error() {
                        format!("authority returned {status}")
                    } else {
                        return Ok((status, bytes));
                    }
                }
                Err(e) if e.is_connect() || e.is_timeout() => e.to_string(),
                Err(e) => return Err(ClientError::AuthorityUnavailable(e.to_string())),
            };

            let delay = Self::backoff_delay(attempt);
            attempt += 1;
            let give_up = match deadline {
                Some(deadline) => Instant::now() + delay >= deadline,
                // Without a deadline, transient errors get a handful of
                // attempts rather than retrying forever.
                None => attempt >= 4,
            };
            if give_up {
                return Err(ClientError::AuthorityUnavailable(transient_reason));
            }
            tracing::debug!(attempt, ?delay, reason = %transient_reason, "retrying request");
            tokio::time::sleep(delay).await;
        }
    }

    fn map_error(status: StatusCode, body: &[u8]) -> ClientError {
        let parsed: Option<ErrorResponse> = serde_json::from_slice(body).ok();
        let Some(err) = parsed else {
            return ClientError::UnexpectedResponse {
                status: status.as_u16(),
                code: "unparseable".into(),
            };
        };

        match err.error.as_str() {
            "lease_held" => ClientError::LeaseHeldByAnother {
                holder_session_id: err.holder_session_id.unwrap_or_default(),
                expires_at: err
                    .expires_at
                    .as_deref()
                    .and_then(|s| sigaid_core::canonical::parse_timestamp(s).ok()),
            },
            "session_mismatch" => ClientError::SessionMismatch,
            "lease_expired" => ClientError::LeaseExpired,
            "no_active_lease" | "token_invalid" => ClientError::NoActiveLease,
            "fork" => {
                let current_head = err
                    .current_head
                    .as_ref()
                    .and_then(|h| h.to_head().ok())
                    .unwrap_or(ChainHead::GENESIS);
                ClientError::Fork { current_head }
            }
            "sequence_mismatch" => ClientError::SequenceMismatch {
                expected: err.expected_sequence,
            },
            "agent_not_found" => ClientError::AgentNotFound,
            "agent_exists" => ClientError::AgentExists,
            "invalid_signature" | "clock_skew" | "nonce_replayed" => ClientError::InvalidSignature,
            "permission_denied" => ClientError::PermissionDenied,
            code => ClientError::UnexpectedResponse {
                status: status.as_u16(),
                code: code.to_string(),
            },
        }
    }

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
        deadline: Option<Instant>,
    ) -> Result<T, ClientError> {
        let (status, bytes) = self.send(method, path, body, deadline).await?;
        if status.is_success() {
            serde_json::from_slice(&bytes).map_err(|e| ClientError::UnexpectedResponse {
                status: status.as_u16(),
                code: format!("bad body: {e}"),
            })
        } else {
            Err(Self::map_error(status, &bytes))
        }
    }

    async fn request_no_content(
        &self,
        method: Method,
        path: &str,
        body: Option<&impl Serialize>,
        deadline: Option<Instant>,
    ) -> Result<(), ClientError> {
        let (status, bytes) = self.send(method, path, body, deadline).await?;
        if status.is_success() {
            Ok(())
        } else {
            Err(Self::map_error(status, &bytes))
        }
    }

    // ── Agents ──────────────────────────────────────────────────────────

    pub async fn register_agent(&self, req: &RegisterAgentRequest) -> Result<AgentInfo, ClientError> {
        self.request_json(Method::POST, "/v1/agents", Some(req), None)
            .await
    }

    pub async fn get_agent(&self, agent_id: &str) -> Result<AgentInfo, ClientError> {
        self.request_json::<AgentInfo>(Method::GET, &format!("/v1/agents/{agent_id}"), None::<&()>, None)
            .await
    }

    // ── Leases ──────────────────────────────────────────────────────────

    pub async fn acquire_lease(
        &self,
        req: &AcquireLeaseRequest,
        deadline: Option<Instant>,
    ) -> Result<LeaseGrant, ClientError> {
        self.request_json(Method::POST, "/v1/leases", Some(req), deadline)
            .await
    }

    pub async fn renew_lease(
        &self,
        agent_id: &str,
        req: &RenewLeaseRequest,
        deadline: Option<Instant>,
    ) -> Result<LeaseGrant, ClientError> {
        self.request_json(Method::PUT, &format!("/v1/leases/{agent_id}"), Some(req), deadline)
            .await
    }

    pub async fn release_lease(
        &self,
        agent_id: &str,
        req: &ReleaseLeaseRequest,
        deadline: Option<Instant>,
    ) -> Result<(), ClientError> {
        self.request_no_content(
            Method::DELETE,
            &format!("/v1/leases/{agent_id}"),
            Some(req),
            deadline,
        )
        .await
    }

    pub async fn lease_status(&self, agent_id: &str) -> Result<LeaseStatus, ClientError> {
        self.request_json::<LeaseStatus>(
            Method::GET,
            &format!("/v1/leases/{agent_id}"),
            None::<&()>,
            None,
        )
        .await
    }

    // ── State chain ─────────────────────────────────────────────────────

    pub async fn append_state(
        &self,
        agent_id: &str,
        entry: &StateEntry,
        lease_token: &str,
        deadline: Option<Instant>,
    ) -> Result<StateHeadResponse, ClientError> {
        let body = AppendStateBody { entry, lease_token };
        self.request_json(
            Method::POST,
            &format!("/v1/state/{agent_id}"),
            Some(&body),
            deadline,
        )
        .await
    }

    pub async fn state_head(&self, agent_id: &str) -> Result<ChainHead, ClientError> {
        let resp: StateHeadResponse = self
            .request_json(Method::GET, &format!("/v1/state/{agent_id}"), None::<&()>, None)
            .await?;
        Ok(resp.to_head()?)
    }

    pub async fn state_history(
        &self,
        agent_id: &str,
        offset: u64,
        limit: u64,
    ) -> Result<StateHistoryResponse, ClientError> {
        self.request_json::<StateHistoryResponse>(
            Method::GET,
            &format!("/v1/state/{agent_id}/history?offset={offset}&limit={limit}"),
            None::<&()>,
            None,
        )
        .await
    }

    // ── Verification ────────────────────────────────────────────────────

    pub async fn verify(
        &self,
        req: &VerifyRequest,
        deadline: Option<Instant>,
    ) -> Result<VerifyResponse, ClientError> {
        self.request_json(Method::POST, "/v1/verify", Some(req), deadline)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped_and_jittered() {
        for attempt in 0..10 {
            let delay = AuthorityClient::backoff_delay(attempt);
            assert!(delay <= MAX_DELAY);
        }
    }

    #[test]
    fn test_map_lease_held() {
        let body = serde_json::json!({
            "error": "lease_held",
            "holder_session_id": "sid_abc",
            "expires_at": "2026-01-14T12:00:00.000000Z",
        });
        let err = AuthorityClient::map_error(
            StatusCode::CONFLICT,
            serde_json::to_vec(&body).unwrap().as_slice(),
        );
        match err {
            ClientError::LeaseHeldByAnother {
                holder_session_id,
                expires_at,
            } => {
                assert_eq!(holder_session_id, "sid_abc");
                assert!(expires_at.is_some());
            }
            other => panic!("expected LeaseHeldByAnother, got {other:?}"),
        }
    }

    #[test]
    fn test_map_fork_carries_head() {
        let body = serde_json::json!({
            "error": "fork",
            "current_head": {
                "sequence": 2,
                "entry_hash_base64": sigaid_core::canonical::b64_encode(&[7u8; 32]),
            },
        });
        let err = AuthorityClient::map_error(
            StatusCode::CONFLICT,
            serde_json::to_vec(&body).unwrap().as_slice(),
        );
        match err {
            ClientError::Fork { current_head } => assert_eq!(current_head.sequence, 2),
            other => panic!("expected Fork, got {other:?}"),
        }
    }

    #[test]
    fn test_map_sequence_mismatch_typed_field() {
        let body = serde_json::json!({
            "error": "sequence_mismatch",
            "expected_sequence": 7,
        });
        let err = AuthorityClient::map_error(
            StatusCode::CONFLICT,
            serde_json::to_vec(&body).unwrap().as_slice(),
        );
        match err {
            ClientError::SequenceMismatch { expected } => assert_eq!(expected, Some(7)),
            other => panic!("expected SequenceMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_map_unknown_code() {
        let body = serde_json::json!({ "error": "weird" });
        let err = AuthorityClient::map_error(
            StatusCode::IM_A_TEAPOT,
            serde_json::to_vec(&body).unwrap().as_slice(),
        );
        assert!(matches!(err, ClientError::UnexpectedResponse { .. }));
    }
}
