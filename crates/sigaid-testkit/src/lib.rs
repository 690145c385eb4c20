//! # SigAid Testkit
//!
//! Testing utilities shared across the workspace:
//!
//! - **Fixtures**: seeded identities and prebuilt chains for test setup
//! - **Golden vectors**: pinned outputs for cross-implementation checks
//! - **Generators**: proptest strategies for property-based tests

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::TestIdentity;
pub use generators::{arb_action_type, arb_seed, arb_summary};
pub use vectors::{all_identity_vectors, all_mt_vectors, all_render_vectors, verify_all_vectors};
