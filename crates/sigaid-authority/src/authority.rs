//! The Authority service: the operations behind the wire contract.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use sigaid_core::canonical;
use sigaid_core::wire::{
    AcquireLeaseRequest, AgentInfo, LeaseGrant, LeaseStatus, RegisterAgentRequest,
    ReleaseLeaseRequest, RenewLeaseRequest, StateHeadResponse, VerifyRequest, VerifyResponse,
};
use sigaid_core::{
    AgentId, ChainHead, Ed25519PublicKey, Ed25519Signature, LeaseClaims, MerkleProof, MerkleTree,
    ReasonCode, SignDomain, StateEntry, TokenError, CLOCK_SKEW,
};

use crate::error::AuthorityError;
use crate::lease::{AcquireOutcome, LeaseTable};
use crate::registry::Registry;
use crate::store::{AppendOutcome, ChainStore};
use crate::token::TokenSealer;

/// Authority configuration.
#[derive(Debug, Clone)]
pub struct AuthorityConfig {
    /// Accepted request timestamp skew.
    pub clock_skew: Duration,

    /// Minimum and maximum grantable lease TTLs.
    pub min_ttl: Duration,
    pub max_ttl: Duration,

    /// API key required from service callers; `None` disables auth (tests).
    pub api_key: Option<String>,
}

impl Default for AuthorityConfig {
    fn default() -> Self {
        Self {
            clock_skew: CLOCK_SKEW,
            min_ttl: Duration::seconds(1),
            max_ttl: Duration::seconds(3600),
            api_key: None,
        }
    }
}

/// Result of a successful state append.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendResult {
    /// Entry committed; the new head.
    Committed(ChainHead),
    /// Entry was already committed (idempotent re-send).
    AlreadyCommitted(ChainHead),
}

/// The Authority: registry + lease table + token sealer + chain store.
pub struct Authority {
    registry: Registry,
    leases: LeaseTable,
    sealer: TokenSealer,
    store: Arc<dyn ChainStore>,
    config: AuthorityConfig,
}

impl Authority {
    pub fn new(store: Arc<dyn ChainStore>, sealer: TokenSealer, config: AuthorityConfig) -> Self {
        Self {
            registry: Registry::new(),
            leases: LeaseTable::new(config.clock_skew),
            sealer,
            store,
            config,
        }
    }

    pub fn config(&self) -> &AuthorityConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    // ── Agents ──────────────────────────────────────────────────────────

    pub fn register_agent(&self, req: &RegisterAgentRequest) -> Result<AgentInfo, AuthorityError> {
        let agent_id = AgentId::parse(&req.agent_id)
            .map_err(|e| AuthorityError::BadRequest(e.to_string()))?;
        let key_bytes = canonical::b64_decode(&req.public_key_base64)
            .map_err(|e| AuthorityError::BadRequest(format!("bad public key: {e}")))?;
        let key_arr: [u8; 32] = key_bytes
            .try_into()
            .map_err(|_| AuthorityError::BadRequest("public key must be 32 bytes".into()))?;
        let public_key = Ed25519PublicKey::from_bytes(key_arr);

        self.registry
            .register(agent_id, public_key, req.metadata.clone(), Utc::now())
    }

    pub fn get_agent(&self, agent_id: &str) -> Result<AgentInfo, AuthorityError> {
        self.registry.get(agent_id)
    }

    // ── Leases ──────────────────────────────────────────────────────────

    fn clamp_ttl(&self, ttl_seconds: u64) -> Duration {
        Duration::seconds(ttl_seconds as i64)
            .max(self.config.min_ttl)
            .min(self.config.max_ttl)
    }

    /// Handle an acquire request: signature, skew, replay, then the
    /// atomic slot transition.
    pub fn acquire_lease(&self, req: &AcquireLeaseRequest) -> Result<LeaseGrant, AuthorityError> {
        let now = Utc::now();
        let public_key = self.registry.public_key(&req.agent_id)?;

        let timestamp = canonical::parse_timestamp(&req.timestamp)
            .map_err(|e| AuthorityError::BadRequest(e.to_string()))?;
        let nonce =
            hex::decode(&req.nonce_hex).map_err(|e| AuthorityError::BadRequest(e.to_string()))?;
        let signature = Ed25519Signature::from_hex(&req.signature_hex)
            .map_err(|_| AuthorityError::InvalidSignature)?;

        let message = canonical::lease_request_bytes(
            &req.agent_id,
            &req.session_id,
            timestamp,
            &nonce,
            req.ttl_seconds,
        );
        if !public_key.verify(SignDomain::Lease, &message, &signature) {
            return Err(AuthorityError::InvalidSignature);
        }

        if (now - timestamp).abs() > self.config.clock_skew {
            return Err(AuthorityError::ClockSkew);
        }

        if !self.leases.check_and_store_nonce(&req.agent_id, &nonce, now) {
            return Err(AuthorityError::NonceReplayed);
        }

        let ttl = self.clamp_ttl(req.ttl_seconds);
        match self
            .leases
            .try_acquire(&req.agent_id, &req.session_id, now, ttl)
        {
            AcquireOutcome::Granted(record) => {
                tracing::info!(
                    agent_id = %req.agent_id,
                    session_id = %req.session_id,
                    expires_at = %record.expires_at,
                    "lease granted"
                );
                let claims = TokenSealer::claims(
                    &req.agent_id,
                    &req.session_id,
                    now,
                    ttl,
                    record.sequence,
                );
                Ok(LeaseGrant {
                    lease_token: self.sealer.seal(&claims),
                    acquired_at: record.acquired_at,
                    expires_at: record.expires_at,
                    sequence: record.sequence,
                })
            }
            AcquireOutcome::Held {
                holder_session_id,
                expires_at,
            } => Err(AuthorityError::LeaseHeld {
                holder_session_id,
                expires_at,
            }),
        }
    }

    /// Handle a renew request against the caller's current token.
    pub fn renew_lease(
        &self,
        agent_id: &str,
        req: &RenewLeaseRequest,
    ) -> Result<LeaseGrant, AuthorityError> {
        let now = Utc::now();
        let claims = self.open_claims(&req.current_token, now)?;
        if !claims.matches(agent_id, &req.session_id) {
            return Err(AuthorityError::SessionMismatch);
        }

        let ttl = self.clamp_ttl(req.ttl_seconds);
        match self.leases.renew(agent_id, &req.session_id, now, ttl) {
            Some(record) => {
                let claims =
                    TokenSealer::claims(agent_id, &req.session_id, now, ttl, record.sequence);
                Ok(LeaseGrant {
                    lease_token: self.sealer.seal(&claims),
                    acquired_at: record.acquired_at,
                    expires_at: record.expires_at,
                    sequence: record.sequence,
                })
            }
            None => Err(AuthorityError::LeaseExpired),
        }
    }

    /// Handle a release. Idempotent: a second release (or one for an
    /// already-expired slot) succeeds.
    pub fn release_lease(
        &self,
        agent_id: &str,
        req: &ReleaseLeaseRequest,
    ) -> Result<(), AuthorityError> {
        // Expiry is irrelevant for release; only authenticity matters.
        let claims = self
            .sealer
            .open(&req.token)
            .map_err(|_| AuthorityError::TokenInvalid)?;
        if !claims.matches(agent_id, &req.session_id) {
            return Err(AuthorityError::SessionMismatch);
        }
        self.leases.release(agent_id, &req.session_id);
        tracing::info!(agent_id, session_id = %req.session_id, "lease released");
        Ok(())
    }

    pub fn lease_status(&self, agent_id: &str) -> LeaseStatus {
        match self.leases.status(agent_id, Utc::now()) {
            Some(record) => LeaseStatus {
                held: true,
                holder_session_id: Some(record.session_id),
                expires_at: Some(canonical::format_timestamp(record.expires_at)),
                sequence: Some(record.sequence),
            },
            None => LeaseStatus {
                held: false,
                holder_session_id: None,
                expires_at: None,
                sequence: None,
            },
        }
    }

    fn open_claims(&self, token: &str, now: DateTime<Utc>) -> Result<LeaseClaims, AuthorityError> {
        self.sealer.open_valid(token, now).map_err(|e| match e {
            TokenError::Expired => AuthorityError::LeaseExpired,
            TokenError::Invalid => AuthorityError::TokenInvalid,
        })
    }

    /// Check that `token` authorizes operations for `agent_id` right now.
    fn require_active_lease(
        &self,
        agent_id: &str,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<LeaseClaims, AuthorityError> {
        let claims = self
            .sealer
            .open_valid(token, now)
            .map_err(|_| AuthorityError::NoActiveLease)?;
        if claims.agent_id != agent_id {
            return Err(AuthorityError::NoActiveLease);
        }
        if !self.leases.holds(agent_id, &claims.session_id, now) {
            return Err(AuthorityError::NoActiveLease);
        }
        Ok(claims)
    }

    // ── State chain ─────────────────────────────────────────────────────

    /// Append a state entry under a held lease.
    pub async fn append_entry(
        &self,
        agent_id: &str,
        entry: &StateEntry,
        token: &str,
    ) -> Result<AppendResult, AuthorityError> {
        let now = Utc::now();
        let registered_key = self.registry.public_key(agent_id)?;
        self.require_active_lease(agent_id, token, now)?;

        if entry.agent_id.as_str() != agent_id {
            return Err(AuthorityError::BadRequest(
                "entry agent_id does not match path".into(),
            ));
        }
        if !entry.verify_hash() {
            return Err(AuthorityError::BadRequest("entry_hash does not recompute".into()));
        }
        // Identity keys do not rotate mid-chain: every entry must verify
        // under the registered key.
        if !entry.verify_signature(&registered_key) {
            return Err(AuthorityError::InvalidSignature);
        }

        match self.store.append(entry).await? {
            AppendOutcome::Appended(head) => {
                self.registry
                    .set_chain_length(agent_id, (head.sequence + 1) as u64);
                tracing::debug!(agent_id, sequence = entry.sequence, "entry appended");
                Ok(AppendResult::Committed(head))
            }
            AppendOutcome::Duplicate => {
                let head = self.store.head(agent_id).await?;
                Ok(AppendResult::AlreadyCommitted(head))
            }
            AppendOutcome::Fork { current_head } => {
                tracing::warn!(agent_id, sequence = entry.sequence, "fork rejected");
                Err(AuthorityError::Fork { current_head })
            }
            AppendOutcome::SequenceMismatch { expected } => {
                Err(AuthorityError::SequenceMismatch { expected })
            }
        }
    }

    pub async fn state_head(&self, agent_id: &str) -> Result<ChainHead, AuthorityError> {
        // Unknown agents 404 rather than reporting an empty chain.
        self.registry.public_key(agent_id)?;
        Ok(self.store.head(agent_id).await?)
    }

    pub async fn state_history(
        &self,
        agent_id: &str,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<StateEntry>, u64), AuthorityError> {
        self.registry.public_key(agent_id)?;
        let entries = self.store.range(agent_id, offset, limit).await?;
        let total = self.store.len(agent_id).await?;
        Ok((entries, total))
    }

    /// Serve a Merkle inclusion proof for `sequence` against the root of
    /// the current committed chain.
    pub async fn inclusion_proof(
        &self,
        agent_id: &str,
        sequence: u64,
    ) -> Result<(MerkleProof, sigaid_core::Blake3Hash), AuthorityError> {
        self.registry.public_key(agent_id)?;
        let total = self.store.len(agent_id).await?;
        let entries = self.store.range(agent_id, 0, total).await?;
        let tree = MerkleTree::from_entries(&entries);
        let proof = tree
            .proof(sequence)
            .ok_or_else(|| AuthorityError::BadRequest(format!("sequence {sequence} not committed")))?;
        Ok((proof, tree.root()))
    }

    // ── Verification ────────────────────────────────────────────────────

    /// The online half of proof verification: everything the Authority
    /// can corroborate about a bundle.
    pub async fn verify_proof(&self, req: &VerifyRequest) -> VerifyResponse {
        let agent_id = req.proof.agent_id.to_string();
        let outcome = self.verify_proof_inner(req).await;

        let (valid, reason_code) = match outcome {
            Ok(()) => (true, None),
            Err(code) => (false, Some(code.as_str().to_string())),
        };
        self.registry.record_verification(&agent_id, valid);

        VerifyResponse {
            valid,
            agent_id,
            reason_code,
        }
    }

    async fn verify_proof_inner(&self, req: &VerifyRequest) -> Result<(), ReasonCode> {
        let now = Utc::now();
        let proof = &req.proof;
        let agent_id = proof.agent_id.to_string();
        let require_lease = req.require_lease.unwrap_or(true);

        let registered_key = self
            .registry
            .public_key(&agent_id)
            .map_err(|_| ReasonCode::BadAgentId)?;
        if registered_key != proof.agent_id.public_key() {
            return Err(ReasonCode::BadAgentId);
        }

        // The bundle's own signatures (the service re-checks the challenge
        // bytes against what it issued; the Authority checks consistency).
        let self_challenge = sigaid_core::Challenge::new(proof.challenge.clone())
            .map_err(|_| ReasonCode::ChallengeMismatch)?;
        match proof.verify_offline(&self_challenge, &Default::default(), now, None) {
            sigaid_core::VerificationOutcome::ValidOffline => {}
            sigaid_core::VerificationOutcome::Invalid(code) => return Err(code),
            sigaid_core::VerificationOutcome::Valid => {}
        }

        // Lease corroboration: token opens, claims match the lease record,
        // and the record is live.
        if require_lease {
            let claims = self
                .sealer
                .open_valid(&proof.lease_token, now)
                .map_err(|_| ReasonCode::NoActiveLease)?;
            if claims.agent_id != agent_id {
                return Err(ReasonCode::NoActiveLease);
            }
            if !self.leases.holds(&agent_id, &claims.session_id, now) {
                return Err(ReasonCode::NoActiveLease);
            }
        }

        // Head corroboration: the bundle's head must be the committed head.
        let committed = self
            .store
            .head(&agent_id)
            .await
            .map_err(|_| ReasonCode::AuthorityUnavailable)?;
        let bundle_seq = proof
            .state_head
            .as_ref()
            .map(|e| e.sequence as i64)
            .unwrap_or(-1);
        if bundle_seq != committed.sequence || proof.state_head_hash() != committed.entry_hash {
            return Err(ReasonCode::StateHeadMismatch);
        }

        if let Some(min) = req.min_reputation_score {
            let info = self
                .registry
                .get(&agent_id)
                .map_err(|_| ReasonCode::BadAgentId)?;
            if info.reputation.score() < min {
                return Err(ReasonCode::NoActiveLease);
            }
        }

        Ok(())
    }

    /// Wire form of the current head.
    pub async fn state_head_response(
        &self,
        agent_id: &str,
    ) -> Result<StateHeadResponse, AuthorityError> {
        Ok(StateHeadResponse::from_head(&self.state_head(agent_id).await?))
    }
}
