//! # SigAid Authority
//!
//! The central process that enforces single-holder leases and append
//! ordering on agent state chains.
//!
//! The crate is split into the semantic layer and the HTTP layer:
//!
//! - [`LeaseTable`] - per-agent lease slots with compare-and-set
//!   transitions and a nonce replay cache
//! - [`TokenSealer`] - authenticated `v4.local` lease token envelope
//! - [`store`] - the [`store::ChainStore`] trait with in-memory and
//!   SQLite backends
//! - [`Registry`] - agent registration and reputation counters
//! - [`Authority`] - ties the above together into the operations the
//!   wire contract exposes
//! - [`http`] - the axum router for the `/v1/*` API
//!
//! All lease transitions for one agent are linearizable: every mutation
//! happens under that agent's slot entry inside the table lock.

pub mod authority;
pub mod error;
pub mod http;
pub mod lease;
pub mod registry;
pub mod store;
pub mod token;

pub use authority::{Authority, AuthorityConfig};
pub use error::AuthorityError;
pub use lease::{AcquireOutcome, LeaseRecord, LeaseTable};
pub use registry::{RegisteredAgent, Registry};
pub use token::TokenSealer;
