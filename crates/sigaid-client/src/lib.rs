//! # SigAid Client
//!
//! The agent-side SDK: talk to the Authority, hold exactly one lease,
//! append to the state chain, and answer verification challenges.
//!
//! ```no_run
//! use sigaid_client::{AgentClient, ClientConfig};
//! use sigaid_core::{ActionType, Keypair};
//!
//! # async fn example() -> Result<(), sigaid_client::ClientError> {
//! let keypair = Keypair::generate();
//! let client = AgentClient::new(keypair, ClientConfig::from_env());
//! client.register(None).await?;
//!
//! client
//!     .with_lease(|session| async move {
//!         session
//!             .append(ActionType::ToolCall, "searched the web", b"{}")
//!             .await
//!     })
//!     .await??;
//! # Ok(())
//! # }
//! ```

pub mod chain;
pub mod config;
pub mod error;
pub mod http;
pub mod lease;
pub mod prover;
pub mod verifier;

pub use chain::StateChain;
pub use config::ClientConfig;
pub use error::ClientError;
pub use http::AuthorityClient;
pub use lease::{AgentClient, LeaseSession};
pub use prover::Prover;
pub use verifier::Verifier;
