//! Client-side state chain handle.
//!
//! Tracks the last known head locally, builds and signs entries, and
//! submits them under the current lease token. A `Fork` response from the
//! Authority poisons the handle permanently: forks are never reconciled,
//! only surfaced.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use sigaid_core::{ActionType, AgentId, ChainHead, Keypair, StateEntry, StateEntryBuilder};

use crate::error::ClientError;
use crate::http::AuthorityClient;

struct HeadState {
    head: ChainHead,
    /// The full entry at the head, when this process appended it.
    last_entry: Option<StateEntry>,
}

/// Handle to one agent's chain.
pub struct StateChain {
    http: AuthorityClient,
    keypair: Keypair,
    agent_id: AgentId,
    head: Mutex<Option<HeadState>>,
    poisoned: AtomicBool,
}

impl StateChain {
    pub fn new(http: AuthorityClient, keypair: Keypair, agent_id: AgentId) -> Self {
        Self {
            http,
            keypair,
            agent_id,
            head: Mutex::new(None),
            poisoned: AtomicBool::new(false),
        }
    }

    /// True once a fork response has been observed.
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }

    /// The last entry appended by this handle, if any.
    pub async fn last_entry(&self) -> Option<StateEntry> {
        self.head.lock().await.as_ref().and_then(|h| h.last_entry.clone())
    }

    /// The last known head, fetching from the Authority when unknown.
    pub async fn head(&self) -> Result<ChainHead, ClientError> {
        let mut guard = self.head.lock().await;
        if let Some(state) = guard.as_ref() {
            return Ok(state.head);
        }
        let head = self.http.state_head(self.agent_id.as_str()).await?;
        *guard = Some(HeadState {
            head,
            last_entry: None,
        });
        Ok(head)
    }

    /// Build, sign, and submit the next entry under `lease_token`.
    ///
    /// A `Fork` rejection is fatal: the handle is poisoned and every
    /// subsequent call fails with `ChainPoisoned`. A sequence mismatch
    /// invalidates the local head so the next call re-syncs.
    pub async fn append(
        &self,
        lease_token: &str,
        action_type: ActionType,
        summary: &str,
        payload: &[u8],
    ) -> Result<StateEntry, ClientError> {
        if self.is_poisoned() {
            return Err(ClientError::ChainPoisoned);
        }

        let mut guard = self.head.lock().await;
        let head = match guard.as_ref() {
            Some(state) => state.head,
            None => {
                let head = self.http.state_head(self.agent_id.as_str()).await?;
                *guard = Some(HeadState {
                    head,
                    last_entry: None,
                });
                head
            }
        };

        let builder = StateEntryBuilder::new(self.agent_id.clone(), &self.keypair);
        let entry = builder.build_at(
            head.next_sequence(),
            head.entry_hash,
            action_type,
            summary,
            payload,
            Utc::now(),
        )?;

        match self
            .http
            .append_state(self.agent_id.as_str(), &entry, lease_token, None)
            .await
        {
            Ok(response) => {
                let new_head = response.to_head()?;
                *guard = Some(HeadState {
                    head: new_head,
                    last_entry: Some(entry.clone()),
                });
                Ok(entry)
            }
            Err(fork @ ClientError::Fork { .. }) => {
                self.poisoned.store(true, Ordering::SeqCst);
                tracing::error!(
                    agent_id = %self.agent_id.short(),
                    "fork response; chain handle poisoned"
                );
                Err(fork)
            }
            Err(ClientError::SequenceMismatch { expected }) => {
                // Another holder advanced the chain. Resync the head so
                // the next append starts from committed state, and check
                // it against the sequence the Authority expects.
                match self.http.state_head(self.agent_id.as_str()).await {
                    Ok(head) => {
                        if expected.is_some_and(|e| e != head.next_sequence()) {
                            tracing::warn!(
                                agent_id = %self.agent_id.short(),
                                expected = ?expected,
                                head = head.sequence,
                                "resynced head disagrees with rejected append"
                            );
                        }
                        *guard = Some(HeadState {
                            head,
                            last_entry: None,
                        });
                    }
                    Err(_) => *guard = None,
                }
                Err(ClientError::SequenceMismatch { expected })
            }
            Err(e) => Err(e),
        }
    }

    /// Fetch and verify a run of entries from the Authority.
    pub async fn fetch_and_verify(
        &self,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<StateEntry>, ClientError> {
        let response = self
            .http
            .state_history(self.agent_id.as_str(), offset, limit)
            .await?;
        sigaid_core::verify_chain(&response.entries, &self.keypair.public_key())
            .map_err(|e| ClientError::Core(sigaid_core::CoreError::MalformedEntry(e.to_string())))?;
        Ok(response.entries)
    }
}
