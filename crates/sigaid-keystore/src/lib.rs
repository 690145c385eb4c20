//! # SigAid Keystore
//!
//! Encrypted at-rest storage for identity keypairs.
//!
//! The keyfile is a small binary container: scrypt stretches the password
//! into a 32-byte key, and XChaCha20-Poly1305 seals the Ed25519 seed. Any
//! bit flip anywhere in the file makes decryption fail. Writes are atomic
//! (write-to-temp-and-rename), so a crash never leaves a torn keyfile.

pub mod error;
pub mod keyfile;

pub use error::KeyfileError;
pub use keyfile::{read_keyfile, write_keyfile, KdfParams, KEYFILE_MAGIC, KEYFILE_VERSION};
