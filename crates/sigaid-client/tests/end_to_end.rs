//! End-to-end scenarios: a real client against an in-process Authority
//! served over HTTP.

use std::sync::Arc;
use std::time::Duration;

use sigaid_authority::http::serve;
use sigaid_authority::store::MemoryStore;
use sigaid_authority::{Authority, AuthorityConfig, TokenSealer};
use sigaid_client::{AgentClient, ClientConfig, ClientError, Verifier};
use sigaid_core::{ActionType, Keypair, StateEntryBuilder, VerificationOutcome, VerifyPolicy};

async fn spawn_authority(api_key: Option<String>) -> String {
    let config = AuthorityConfig {
        api_key,
        ..AuthorityConfig::default()
    };
    let authority = Arc::new(Authority::new(
        Arc::new(MemoryStore::new()),
        TokenSealer::generate(),
        config,
    ));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = serve(authority, listener).await;
    });
    format!("http://{addr}")
}

fn client_config(url: &str, ttl: Duration) -> ClientConfig {
    ClientConfig::default()
        .with_authority_url(url)
        .with_lease_ttl(ttl)
}

#[tokio::test]
async fn clone_rejection() {
    let url = spawn_authority(None).await;
    let seed = [0x01u8; 32];

    let a = AgentClient::new(Keypair::from_seed(&seed), client_config(&url, Duration::from_secs(60)));
    let b = AgentClient::new(Keypair::from_seed(&seed), client_config(&url, Duration::from_secs(60)));
    a.register(None).await.unwrap();
    b.register(None).await.unwrap();

    let before = chrono::Utc::now();
    let (ra, rb) = tokio::join!(a.acquire(false, None), b.acquire(false, None));

    // Exactly one instance wins.
    let (winner, loser) = match (ra, rb) {
        (Ok(session), Err(e)) => (session, e),
        (Err(e), Ok(session)) => (session, e),
        (Ok(_), Ok(_)) => panic!("both clones acquired the lease"),
        (Err(ea), Err(eb)) => panic!("neither clone acquired: {ea:?} / {eb:?}"),
    };

    match loser {
        ClientError::LeaseHeldByAnother {
            holder_session_id,
            expires_at,
        } => {
            assert_eq!(holder_session_id, winner.session_id());
            let expires = expires_at.expect("holder expiry reported");
            let lower = before + chrono::Duration::seconds(59);
            let upper = chrono::Utc::now() + chrono::Duration::seconds(61);
            assert!(expires > lower && expires < upper, "expiry {expires} out of window");
        }
        other => panic!("expected LeaseHeldByAnother, got {other:?}"),
    }

    winner.release().await;
}

#[tokio::test]
async fn fork_is_fatal() {
    let url = spawn_authority(None).await;
    let keypair = Keypair::from_seed(&[0x02; 32]);
    let client = AgentClient::new(keypair.clone(), client_config(&url, Duration::from_secs(60)));
    client.register(None).await.unwrap();

    // Client A commits sequences 0, 1, 2 and releases.
    let session = client.acquire(false, None).await.unwrap();
    for i in 0..3 {
        session
            .append(ActionType::ToolCall, &format!("step {i}"), b"payload")
            .await
            .unwrap();
    }
    session.release().await;

    // Client B acquires and crafts a conflicting entry at sequence 2:
    // correctly linked to entry 1, but with different content than the
    // committed entry 2.
    let session_b = client.acquire(false, None).await.unwrap();
    let history = client
        .authority()
        .state_history(client.agent_id().as_str(), 0, 10)
        .await
        .unwrap()
        .entries;
    assert_eq!(history.len(), 3);
    let head_before = client
        .authority()
        .state_head(client.agent_id().as_str())
        .await
        .unwrap();
    assert_eq!(head_before.sequence, 2);

    let builder = StateEntryBuilder::new(keypair.agent_id(), &keypair);
    let forged = builder
        .build_at(
            2,
            history[1].entry_hash,
            ActionType::ToolCall,
            "rewritten history",
            b"evil",
            chrono::Utc::now(),
        )
        .unwrap();

    let token = session_b.token().await.unwrap();
    let err = client
        .authority()
        .append_state(client.agent_id().as_str(), &forged, &token, None)
        .await
        .unwrap_err();
    match err {
        ClientError::Fork { current_head } => {
            assert_eq!(current_head, head_before);
        }
        other => panic!("expected Fork, got {other:?}"),
    }

    // No state change.
    let head_after = client
        .authority()
        .state_head(client.agent_id().as_str())
        .await
        .unwrap();
    assert_eq!(head_after, head_before);

    session_b.release().await;
}

#[tokio::test]
async fn lease_expiry_observed() {
    let url = spawn_authority(None).await;
    let keypair = Keypair::from_seed(&[0x03; 32]);
    let mut config = client_config(&url, Duration::from_secs(2));
    config.auto_renew = false;
    config.renew_safety_margin = Duration::from_millis(200);
    let client = AgentClient::new(keypair, config);
    client.register(None).await.unwrap();

    let session = client.acquire(false, None).await.unwrap();
    let token = session.token().await.unwrap();

    tokio::time::sleep(Duration::from_millis(2100)).await;

    // Raw append with the stale token: the Authority sees the slot expired.
    let stale_keypair = Keypair::from_seed(&[0x03; 32]);
    let builder = StateEntryBuilder::new(
        client.agent_id().clone(),
        &stale_keypair,
    );
    let entry = builder
        .build(None, ActionType::TaskStart, "too late", b"", chrono::Utc::now())
        .unwrap();
    let err = client
        .authority()
        .append_state(client.agent_id().as_str(), &entry, &token, None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NoActiveLease), "got {err:?}");

    // The Authority reports the slot free.
    let status = client
        .authority()
        .lease_status(client.agent_id().as_str())
        .await
        .unwrap();
    assert!(!status.held);

    // The client also refuses the token locally.
    assert!(session.token().await.is_err());
}

#[tokio::test]
async fn proof_verification_online() {
    let url = spawn_authority(None).await;
    let keypair = Keypair::from_seed(&[0x04; 32]);
    let client = AgentClient::new(keypair, client_config(&url, Duration::from_secs(60)));
    client.register(None).await.unwrap();

    let session = client.acquire(false, None).await.unwrap();
    for i in 0..5 {
        session
            .append(ActionType::Decision, &format!("decision {i}"), b"detail")
            .await
            .unwrap();
    }

    let verifier = Verifier::new(&client_config(&url, Duration::from_secs(60)));
    let challenge = verifier.create_challenge();
    let proof = session.create_proof(&challenge).await.unwrap();

    let policy = VerifyPolicy {
        require_lease: true,
        ..VerifyPolicy::default()
    };

    // Valid while the lease is held.
    let outcome = verifier.verify(&proof, &challenge, &policy).await.unwrap();
    assert_eq!(outcome, VerificationOutcome::Valid);

    // One flipped byte in the challenge signature invalidates it.
    let mut tampered = proof.clone();
    tampered.challenge_signature.0[0] ^= 0x01;
    let outcome = verifier.verify(&tampered, &challenge, &policy).await.unwrap();
    assert_eq!(
        outcome,
        VerificationOutcome::Invalid(sigaid_core::ReasonCode::BadSignature)
    );

    // After release, a lease-requiring verification fails.
    session.release().await;
    let outcome = verifier.verify(&proof, &challenge, &policy).await.unwrap();
    assert_eq!(
        outcome,
        VerificationOutcome::Invalid(sigaid_core::ReasonCode::NoActiveLease)
    );

    // Offline verification still attests to the cryptography.
    let offline = verifier.verify_offline(&proof, &challenge, &VerifyPolicy::default(), None);
    assert_eq!(offline, VerificationOutcome::ValidOffline);
}

#[tokio::test]
async fn auto_renew_keeps_lease_alive() {
    let url = spawn_authority(None).await;
    let keypair = Keypair::from_seed(&[0x05; 32]);
    let mut config = client_config(&url, Duration::from_secs(3));
    config.renew_fraction = 0.5;
    config.renew_safety_margin = Duration::from_millis(500);
    let client = AgentClient::new(keypair, config);
    client.register(None).await.unwrap();

    let session = client.acquire(false, None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(4000)).await;

    // Past the original TTL, the session is still live thanks to renewal.
    assert!(session.renew_count().await >= 1);
    session.token().await.unwrap();
    session
        .append(ActionType::ToolCall, "still here", b"")
        .await
        .unwrap();

    session.release().await;
}

#[tokio::test]
async fn release_is_idempotent() {
    let url = spawn_authority(None).await;
    let keypair = Keypair::from_seed(&[0x06; 32]);
    let client = AgentClient::new(keypair, client_config(&url, Duration::from_secs(60)));
    client.register(None).await.unwrap();

    let session = client.acquire(false, None).await.unwrap();
    session.release().await;
    session.release().await;

    // Slot is free for the next acquirer.
    let session = client.acquire(false, None).await.unwrap();
    session.release().await;
}

#[tokio::test]
async fn with_lease_releases_on_success_and_panic() {
    let url = spawn_authority(None).await;
    let keypair = Keypair::from_seed(&[0x07; 32]);
    let client = AgentClient::new(keypair, client_config(&url, Duration::from_secs(60)));
    client.register(None).await.unwrap();

    let value = client
        .with_lease(|session| async move {
            session
                .append(ActionType::TaskStart, "scoped work", b"")
                .await
                .map(|entry| entry.sequence)
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(value, 0);

    let status = client
        .authority()
        .lease_status(client.agent_id().as_str())
        .await
        .unwrap();
    assert!(!status.held, "lease must be released after scope");

    // A panic inside the scope still releases before resuming.
    let panicked = std::panic::AssertUnwindSafe(client.with_lease(|_session| async move {
        panic!("scope exploded");
    }));
    let result = futures_catch_unwind(panicked).await;
    assert!(result.is_err());

    let status = client
        .authority()
        .lease_status(client.agent_id().as_str())
        .await
        .unwrap();
    assert!(!status.held, "lease must be released after panic");
}

#[tokio::test]
async fn cancelled_scope_aborts_block_and_releases() {
    let url = spawn_authority(None).await;
    let keypair = Keypair::from_seed(&[0x0a; 32]);
    let client = AgentClient::new(keypair, client_config(&url, Duration::from_secs(60)));
    client.register(None).await.unwrap();

    // The scope is dropped mid-flight by the timeout; the block must be
    // aborted and the lease released best-effort rather than sitting held
    // until TTL.
    let result = tokio::time::timeout(
        Duration::from_millis(300),
        client.with_lease(|_session| async move {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }),
    )
    .await;
    assert!(result.is_err(), "scope should have timed out");

    // Drop-path cleanup runs on a spawned task; give it a moment.
    let mut released = false;
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let status = client
            .authority()
            .lease_status(client.agent_id().as_str())
            .await
            .unwrap();
        if !status.held {
            released = true;
            break;
        }
    }
    assert!(released, "cancelled scope left the lease held");

    // The slot is immediately reusable.
    let session = client.acquire(false, None).await.unwrap();
    session.release().await;
}

/// Minimal catch_unwind for a future without pulling in the futures crate.
async fn futures_catch_unwind<F>(
    fut: std::panic::AssertUnwindSafe<F>,
) -> Result<F::Output, Box<dyn std::any::Any + Send>>
where
    F: std::future::Future,
{
    use std::panic::AssertUnwindSafe;
    use std::pin::pin;
    use std::task::Poll;

    let mut fut = pin!(fut.0);
    std::future::poll_fn(move |cx| {
        match std::panic::catch_unwind(AssertUnwindSafe(|| fut.as_mut().poll(cx))) {
            Ok(Poll::Pending) => Poll::Pending,
            Ok(Poll::Ready(output)) => Poll::Ready(Ok(output)),
            Err(payload) => Poll::Ready(Err(payload)),
        }
    })
    .await
}

#[tokio::test]
async fn keyfile_backed_identity() {
    let url = spawn_authority(None).await;
    let dir = tempfile_dir();
    let path = dir.join("agent.key");

    // Provision an identity to disk, then load it back for the client.
    let original = Keypair::generate();
    let params = sigaid_keystore::KdfParams { log_n: 10, r: 8, p: 1 };
    sigaid_keystore::write_keyfile(&path, &original, "passphrase", params).unwrap();
    let restored = sigaid_keystore::read_keyfile(&path, "passphrase").unwrap();
    assert_eq!(restored.agent_id(), original.agent_id());

    let client = AgentClient::new(restored, client_config(&url, Duration::from_secs(60)));
    client.register(None).await.unwrap();
    let session = client.acquire(false, None).await.unwrap();
    session.release().await;

    let _ = std::fs::remove_dir_all(&dir);
}

fn tempfile_dir() -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("sigaid-e2e-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[tokio::test]
async fn api_key_required_when_configured() {
    let url = spawn_authority(Some("secret-key".into())).await;
    let keypair = Keypair::from_seed(&[0x08; 32]);

    // Without the key: rejected.
    let no_key = AgentClient::new(keypair.clone(), client_config(&url, Duration::from_secs(60)));
    let err = no_key.register(None).await.unwrap_err();
    assert!(matches!(err, ClientError::PermissionDenied), "got {err:?}");

    // With the key: accepted.
    let mut config = client_config(&url, Duration::from_secs(60));
    config.api_key = Some("secret-key".into());
    let with_key = AgentClient::new(keypair, config);
    with_key.register(None).await.unwrap();
}

#[tokio::test]
async fn wait_mode_acquire_eventually_succeeds() {
    let url = spawn_authority(None).await;
    let keypair = Keypair::from_seed(&[0x09; 32]);
    let mut config = client_config(&url, Duration::from_secs(2));
    config.auto_renew = false;
    let client = AgentClient::new(keypair, config);
    client.register(None).await.unwrap();

    let holder = client.acquire(false, None).await.unwrap();

    // The waiter outlives the holder's 2-second TTL.
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    let waiter = client.acquire(true, Some(deadline)).await.unwrap();
    assert_ne!(waiter.session_id(), holder.session_id());
    waiter.release().await;
}
