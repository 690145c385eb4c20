//! Lease acquisition and the single-holder session.
//!
//! [`AgentClient`] is the entry point for an agent process. Acquiring
//! yields a [`LeaseSession`]: the capability to append state and answer
//! challenges while the lease is held. A background task renews the lease
//! at `ttl * renew_fraction`; if renewal cannot succeed before the safety
//! margin the session reports the lease lost and stops.

use chrono::{DateTime, Utc};
use rand::RngCore;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use sigaid_core::canonical;
use sigaid_core::wire::{AcquireLeaseRequest, RegisterAgentRequest, ReleaseLeaseRequest, RenewLeaseRequest};
use sigaid_core::{
    ActionType, AgentId, Challenge, Keypair, ProofBundle, SignDomain, StateEntry,
};

use crate::chain::StateChain;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::http::AuthorityClient;
use crate::prover::Prover;

fn generate_session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    format!("sid_{}", hex::encode(bytes))
}

pub(crate) struct ClientInner {
    pub(crate) keypair: Keypair,
    pub(crate) agent_id: AgentId,
    pub(crate) config: ClientConfig,
    pub(crate) http: AuthorityClient,
}

/// An agent process's connection to the Authority.
#[derive(Clone)]
pub struct AgentClient {
    inner: Arc<ClientInner>,
}

impl AgentClient {
    pub fn new(keypair: Keypair, config: ClientConfig) -> Self {
        let http = AuthorityClient::new(&config);
        let agent_id = keypair.agent_id();
        Self {
            inner: Arc::new(ClientInner {
                keypair,
                agent_id,
                config,
                http,
            }),
        }
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.inner.agent_id
    }

    pub fn authority(&self) -> &AuthorityClient {
        &self.inner.http
    }

    /// Register this identity with the Authority. Idempotent: an
    /// already-registered identity is not an error.
    pub async fn register(&self, metadata: Option<serde_json::Value>) -> Result<(), ClientError> {
        let req = RegisterAgentRequest {
            agent_id: self.inner.agent_id.to_string(),
            public_key_base64: canonical::b64_encode(self.inner.keypair.public_key().as_bytes()),
            metadata,
        };
        match self.inner.http.register_agent(&req).await {
            Ok(_) => Ok(()),
            Err(ClientError::AgentExists) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn signed_acquire_request(&self, session_id: &str, ttl_seconds: u64) -> AcquireLeaseRequest {
        let agent_id = self.inner.agent_id.to_string();
        let now = Utc::now();
        let mut nonce = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let message =
            canonical::lease_request_bytes(&agent_id, session_id, now, &nonce, ttl_seconds);
        let signature = self.inner.keypair.sign(SignDomain::Lease, &message);

        AcquireLeaseRequest {
            agent_id,
            session_id: session_id.to_string(),
            timestamp: canonical::format_timestamp(now),
            nonce_hex: hex::encode(nonce),
            ttl_seconds,
            signature_hex: signature.to_hex(),
        }
    }

    /// Acquire the exclusive lease for this identity.
    ///
    /// With `wait = false`, a held lease surfaces `LeaseHeldByAnother`
    /// immediately. With `wait = true`, held responses are retried with
    /// bounded exponential backoff and full jitter until `deadline`.
    pub async fn acquire(
        &self,
        wait: bool,
        deadline: Option<Instant>,
    ) -> Result<LeaseSession, ClientError> {
        let ttl_seconds = self.inner.config.lease_ttl.as_secs();
        let mut attempt: u32 = 0;

        loop {
            // Fresh session id and nonce per attempt.
            let session_id = generate_session_id();
            let request = self.signed_acquire_request(&session_id, ttl_seconds);

            match self.inner.http.acquire_lease(&request, deadline).await {
                Ok(grant) => {
                    tracing::info!(
                        agent_id = %self.inner.agent_id.short(),
                        session_id,
                        expires_at = %grant.expires_at,
                        "lease acquired"
                    );
                    return Ok(LeaseSession::start(
                        Arc::clone(&self.inner),
                        session_id,
                        grant.lease_token,
                        grant.acquired_at,
                        grant.expires_at,
                    ));
                }
                Err(held @ ClientError::LeaseHeldByAnother { .. }) if wait => {
                    let base = Duration::from_millis(500)
                        .saturating_mul(2u32.saturating_pow(attempt))
                        .min(Duration::from_secs(15));
                    let delay = Duration::from_millis(
                        rand::thread_rng().next_u64() % (base.as_millis() as u64 + 1),
                    );
                    attempt += 1;

                    let past_deadline = deadline
                        .map(|d| Instant::now() + delay >= d)
                        .unwrap_or(false);
                    if past_deadline {
                        return Err(held);
                    }
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Scoped acquisition: acquire, run `f` with the session, then
    /// release on every exit path. The inner future runs as its own task
    /// so a panic still reaches the release before being resumed, and if
    /// this scope itself is cancelled (dropped mid-await, timed out,
    /// lost a `select!`) the block is aborted and the session's drop
    /// cleanup attempts the release best-effort with a short deadline.
    pub async fn with_lease<F, Fut, T>(&self, f: F) -> Result<T, ClientError>
    where
        F: FnOnce(LeaseSession) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let session = self.acquire(false, None).await?;
        let work = AbortOnDrop::new(tokio::spawn(f(session.clone())));
        let result = work.join().await;
        session.release().await;

        match result {
            Ok(value) => Ok(value),
            Err(join_err) => {
                if join_err.is_panic() {
                    std::panic::resume_unwind(join_err.into_panic());
                }
                Err(ClientError::LeaseLost("scope cancelled".into()))
            }
        }
    }
}

/// Aborts the wrapped task unless it was awaited to completion. Dropping
/// the `with_lease` future mid-await lands here, which stops the block
/// instead of letting it run on unsupervised.
struct AbortOnDrop<T>(Option<JoinHandle<T>>);

impl<T> AbortOnDrop<T> {
    fn new(handle: JoinHandle<T>) -> Self {
        Self(Some(handle))
    }

    async fn join(mut self) -> Result<T, tokio::task::JoinError> {
        self.0.take().expect("joined once").await
    }
}

impl<T> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        if let Some(handle) = &self.0 {
            handle.abort();
        }
    }
}

struct LeaseState {
    token: String,
    acquired_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    renew_count: u64,
}

/// Background renewal: sleep to `acquired_at + ttl * renew_fraction`,
/// renew, repeat. Only a weak session reference is held across sleeps,
/// so the loop winds down on its own once every session handle is gone.
async fn renew_loop(weak: std::sync::Weak<SessionInner>) {
    loop {
        let wait = {
            let Some(inner) = weak.upgrade() else { return };
            if inner.released.load(Ordering::SeqCst) {
                return;
            }
            let state = inner.state.read().await;
            let ttl = state.expires_at - state.acquired_at;
            let fraction = inner.client.config.renew_fraction.clamp(0.1, 0.95);
            let renew_at = state.acquired_at
                + chrono::Duration::milliseconds((ttl.num_milliseconds() as f64 * fraction) as i64);
            (renew_at - Utc::now()).to_std().unwrap_or(Duration::ZERO)
        };
        tokio::time::sleep(wait).await;

        let Some(inner) = weak.upgrade() else { return };
        let session = LeaseSession { inner };
        if session.inner.released.load(Ordering::SeqCst) {
            return;
        }
        if session.renew_now().await.is_err() {
            return;
        }
    }
}

struct SessionInner {
    client: Arc<ClientInner>,
    session_id: String,
    state: RwLock<LeaseState>,
    chain: StateChain,
    released: AtomicBool,
    lost_tx: watch::Sender<Option<String>>,
    lost_rx: watch::Receiver<Option<String>>,
    renew_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for SessionInner {
    /// Last-resort cleanup when a session goes away without an explicit
    /// `release` (scope cancelled, handle leaked). Stops the renewal task
    /// and attempts the release best-effort with a short deadline; if no
    /// runtime is left, the Authority expires the lease at TTL.
    fn drop(&mut self) {
        if self.released.load(Ordering::SeqCst) {
            return;
        }

        if let Some(handle) = self.renew_task.lock().unwrap().take() {
            handle.abort();
        }

        // No clones remain at drop, so the state lock is uncontended.
        let Ok(state) = self.state.try_read() else {
            return;
        };
        let req = ReleaseLeaseRequest {
            session_id: self.session_id.clone(),
            token: state.token.clone(),
        };
        drop(state);

        let http = self.client.http.clone();
        let agent_id = self.client.agent_id.to_string();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let deadline = Instant::now() + Duration::from_secs(5);
                if let Err(e) = http.release_lease(&agent_id, &req, Some(deadline)).await {
                    tracing::debug!(error = %e, "drop-path release failed; lease will expire");
                }
            });
        }
    }
}

/// A held lease: the capability to act as this agent identity.
///
/// Cloning shares the one session; releasing any clone releases all.
#[derive(Clone)]
pub struct LeaseSession {
    inner: Arc<SessionInner>,
}

impl LeaseSession {
    fn start(
        client: Arc<ClientInner>,
        session_id: String,
        token: String,
        acquired_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let (lost_tx, lost_rx) = watch::channel(None);
        let chain = StateChain::new(
            client.http.clone(),
            client.keypair.clone(),
            client.agent_id.clone(),
        );

        let session = Self {
            inner: Arc::new(SessionInner {
                client,
                session_id,
                state: RwLock::new(LeaseState {
                    token,
                    acquired_at,
                    expires_at,
                    renew_count: 0,
                }),
                chain,
                released: AtomicBool::new(false),
                lost_tx,
                lost_rx,
                renew_task: Mutex::new(None),
            }),
        };

        if session.inner.client.config.auto_renew {
            // The task holds only a weak reference, so an abandoned
            // session still drops (and cleans up) while renewal runs.
            let weak = Arc::downgrade(&session.inner);
            let handle = tokio::spawn(renew_loop(weak));
            *session.inner.renew_task.lock().unwrap() = Some(handle);
        }

        session
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn agent_id(&self) -> &AgentId {
        &self.inner.client.agent_id
    }

    /// Seconds of safety margin before expiry at which the lease is
    /// considered lost locally, even if the Authority might disagree.
    fn safety_margin(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.inner.client.config.renew_safety_margin)
            .unwrap_or_else(|_| chrono::Duration::seconds(10))
    }

    /// The current token, failing if the lease is released, reported
    /// lost, or locally within the safety margin of expiry (clock jumps
    /// count as loss).
    pub async fn token(&self) -> Result<String, ClientError> {
        if self.inner.released.load(Ordering::SeqCst) {
            return Err(ClientError::NoActiveLease);
        }
        if let Some(reason) = self.inner.lost_rx.borrow().clone() {
            return Err(ClientError::LeaseLost(reason));
        }

        let state = self.inner.state.read().await;
        if Utc::now() > state.expires_at - self.safety_margin() {
            return Err(ClientError::LeaseLost("lease expiry reached locally".into()));
        }
        Ok(state.token.clone())
    }

    pub async fn expires_at(&self) -> DateTime<Utc> {
        self.inner.state.read().await.expires_at
    }

    pub async fn renew_count(&self) -> u64 {
        self.inner.state.read().await.renew_count
    }

    /// Watch for lease loss; yields the reason once lost.
    pub fn lost(&self) -> watch::Receiver<Option<String>> {
        self.inner.lost_rx.clone()
    }

    /// Renew immediately, retrying transient failures until the safety
    /// margin. Used by the background task and available to callers.
    pub async fn renew_now(&self) -> Result<(), ClientError> {
        let (token, expires_at) = {
            let state = self.inner.state.read().await;
            (state.token.clone(), state.expires_at)
        };

        let now = Utc::now();
        let margin = self.safety_margin();
        if now > expires_at - margin {
            let reason = "renewal window already past safety margin".to_string();
            let _ = self.inner.lost_tx.send(Some(reason.clone()));
            return Err(ClientError::LeaseLost(reason));
        }

        let remaining = (expires_at - margin - now)
            .to_std()
            .unwrap_or(Duration::ZERO);
        let deadline = Instant::now() + remaining;

        let req = RenewLeaseRequest {
            session_id: self.inner.session_id.clone(),
            current_token: token,
            ttl_seconds: self.inner.client.config.lease_ttl.as_secs(),
        };
        let agent_id = self.inner.client.agent_id.to_string();

        match self
            .inner
            .client
            .http
            .renew_lease(&agent_id, &req, Some(deadline))
            .await
        {
            Ok(grant) => {
                let mut state = self.inner.state.write().await;
                state.token = grant.lease_token;
                state.acquired_at = grant.acquired_at;
                state.expires_at = grant.expires_at;
                state.renew_count += 1;
                tracing::debug!(
                    session_id = %self.inner.session_id,
                    expires_at = %grant.expires_at,
                    "lease renewed"
                );
                Ok(())
            }
            Err(e) => {
                let reason = format!("renewal failed: {e}");
                let _ = self.inner.lost_tx.send(Some(reason.clone()));
                tracing::warn!(session_id = %self.inner.session_id, %reason, "lease lost");
                Err(ClientError::LeaseLost(reason))
            }
        }
    }

    /// Release the lease. Best-effort and idempotent: network failure
    /// does not block the caller (the Authority will expire the lease),
    /// and repeated calls are no-ops. The renewal task is stopped and
    /// awaited.
    pub async fn release(&self) {
        if self.inner.released.swap(true, Ordering::SeqCst) {
            return;
        }

        let renew_task = self.inner.renew_task.lock().unwrap().take();
        if let Some(handle) = renew_task {
            handle.abort();
            let _ = handle.await;
        }

        let token = self.inner.state.read().await.token.clone();
        let req = ReleaseLeaseRequest {
            session_id: self.inner.session_id.clone(),
            token,
        };
        let agent_id = self.inner.client.agent_id.to_string();
        let deadline = Instant::now() + Duration::from_secs(5);

        if let Err(e) = self
            .inner
            .client
            .http
            .release_lease(&agent_id, &req, Some(deadline))
            .await
        {
            tracing::debug!(error = %e, "best-effort release failed; lease will expire");
        }
    }

    // ── State chain ─────────────────────────────────────────────────────

    /// Append an action to this agent's state chain under the held lease.
    pub async fn append(
        &self,
        action_type: ActionType,
        summary: &str,
        payload: &[u8],
    ) -> Result<StateEntry, ClientError> {
        let token = self.token().await?;
        self.inner
            .chain
            .append(&token, action_type, summary, payload)
            .await
    }

    /// The chain handle, for head inspection and offline verification.
    pub fn chain(&self) -> &StateChain {
        &self.inner.chain
    }

    // ── Proofs ──────────────────────────────────────────────────────────

    /// Build a proof bundle answering `challenge` with the current lease
    /// token and state head.
    pub async fn create_proof(&self, challenge: &Challenge) -> Result<ProofBundle, ClientError> {
        let token = self.token().await?;
        let head_entry = self.inner.chain.last_entry().await;
        let prover = Prover::new(self.inner.client.keypair.clone());
        Ok(prover.create_proof(token, head_entry, challenge))
    }
}
