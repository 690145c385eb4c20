//! The binary keyfile container.
//!
//! Layout (all integers big-endian):
//!
//! ```text
//! magic    4 bytes  "SGKF"
//! version  1 byte   0x01
//! log_n    1 byte   scrypt cost exponent
//! r        4 bytes  scrypt block size
//! p        4 bytes  scrypt parallelism
//! salt     16 bytes
//! nonce    24 bytes XChaCha20-Poly1305
//! sealed   *        ciphertext (32-byte seed) || 16-byte tag
//! ```

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use std::fs;
use std::path::Path;
use zeroize::Zeroizing;

use sigaid_core::Keypair;

use crate::error::KeyfileError;

/// Magic prefix identifying a SigAid keyfile.
pub const KEYFILE_MAGIC: &[u8; 4] = b"SGKF";

/// Current container version.
pub const KEYFILE_VERSION: u8 = 1;

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
const HEADER_LEN: usize = 4 + 1 + 1 + 4 + 4 + SALT_LEN + NONCE_LEN;

/// scrypt parameters stored in the container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// Cost exponent; N = 2^log_n.
    pub log_n: u8,
    pub r: u32,
    pub p: u32,
}

impl KdfParams {
    /// Interactive preset: N = 2^15, fast enough for login-style flows.
    pub const INTERACTIVE: Self = Self { log_n: 15, r: 8, p: 1 };

    /// Sensitive preset: N = 2^20, roughly a second of stretching.
    pub const SENSITIVE: Self = Self { log_n: 20, r: 8, p: 1 };

    fn to_scrypt(self) -> Result<scrypt::Params, KeyfileError> {
        scrypt::Params::new(self.log_n, self.r, self.p, 32)
            .map_err(|_| KeyfileError::InvalidParams)
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self::INTERACTIVE
    }
}

fn derive_key(password: &str, salt: &[u8], params: KdfParams) -> Result<Zeroizing<[u8; 32]>, KeyfileError> {
    let mut key = Zeroizing::new([0u8; 32]);
    scrypt::scrypt(password.as_bytes(), salt, &params.to_scrypt()?, key.as_mut())
        .map_err(|_| KeyfileError::InvalidParams)?;
    Ok(key)
}

/// Write a keypair to an encrypted keyfile.
///
/// Always uses a fresh salt and a fresh nonce. An existing file at `path`
/// is replaced atomically via write-to-temp-and-rename.
pub fn write_keyfile(
    path: &Path,
    keypair: &Keypair,
    password: &str,
    params: KdfParams,
) -> Result<(), KeyfileError> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let key = derive_key(password, &salt, params)?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_ref()));
    let seed = keypair.seed();
    let sealed = cipher
        .encrypt(XNonce::from_slice(&nonce), seed.as_slice())
        .map_err(|_| KeyfileError::Corrupt("seal failed".into()))?;

    let mut contents = Vec::with_capacity(HEADER_LEN + sealed.len());
    contents.extend_from_slice(KEYFILE_MAGIC);
    contents.push(KEYFILE_VERSION);
    contents.push(params.log_n);
    contents.extend_from_slice(&params.r.to_be_bytes());
    contents.extend_from_slice(&params.p.to_be_bytes());
    contents.extend_from_slice(&salt);
    contents.extend_from_slice(&nonce);
    contents.extend_from_slice(&sealed);

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    std::io::Write::write_all(&mut tmp, &contents)?;
    tmp.persist(path).map_err(|e| KeyfileError::Io(e.error))?;
    Ok(())
}

/// Read and decrypt a keyfile.
///
/// Structural problems (bad magic, truncation, unknown version) surface as
/// `Corrupt`; a well-formed container that fails to open surfaces as
/// `WrongPassword`.
pub fn read_keyfile(path: &Path, password: &str) -> Result<Keypair, KeyfileError> {
    let contents = fs::read(path)?;

    if contents.len() < HEADER_LEN + 16 {
        return Err(KeyfileError::Corrupt("truncated".into()));
    }
    if &contents[..4] != KEYFILE_MAGIC {
        return Err(KeyfileError::Corrupt("bad magic".into()));
    }
    if contents[4] != KEYFILE_VERSION {
        return Err(KeyfileError::Corrupt(format!(
            "unsupported version {}",
            contents[4]
        )));
    }

    let params = KdfParams {
        log_n: contents[5],
        r: u32::from_be_bytes(contents[6..10].try_into().unwrap()),
        p: u32::from_be_bytes(contents[10..14].try_into().unwrap()),
    };
    let salt = &contents[14..14 + SALT_LEN];
    let nonce = &contents[14 + SALT_LEN..HEADER_LEN];
    let sealed = &contents[HEADER_LEN..];

    let key = derive_key(password, salt, params)?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_ref()));
    let seed_bytes = Zeroizing::new(
        cipher
            .decrypt(XNonce::from_slice(nonce), sealed)
            .map_err(|_| KeyfileError::WrongPassword)?,
    );

    let seed: [u8; 32] = seed_bytes
        .as_slice()
        .try_into()
        .map_err(|_| KeyfileError::Corrupt("bad seed length".into()))?;

    Ok(Keypair::from_seed(&seed))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Small cost keeps the tests fast; production presets stay untested
    // for speed but share the same code path.
    const TEST_PARAMS: KdfParams = KdfParams { log_n: 10, r: 8, p: 1 };

    #[test]
    fn test_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.key");
        let keypair = Keypair::from_seed(&[0x42; 32]);

        write_keyfile(&path, &keypair, "hunter2", TEST_PARAMS).unwrap();
        let loaded = read_keyfile(&path, "hunter2").unwrap();
        assert_eq!(loaded.public_key(), keypair.public_key());
    }

    #[test]
    fn test_wrong_password() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.key");
        let keypair = Keypair::generate();

        write_keyfile(&path, &keypair, "correct", TEST_PARAMS).unwrap();
        let err = read_keyfile(&path, "incorrect").unwrap_err();
        assert!(matches!(err, KeyfileError::WrongPassword));
    }

    #[test]
    fn test_any_bit_flip_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.key");
        let keypair = Keypair::from_seed(&[0x01; 32]);
        write_keyfile(&path, &keypair, "pw", TEST_PARAMS).unwrap();

        let original = fs::read(&path).unwrap();
        // Flip one bit at a sample of offsets across the whole file.
        for offset in [0, 4, 5, 9, 20, 35, 60, original.len() - 1] {
            let mut mutated = original.clone();
            mutated[offset] ^= 0x01;
            fs::write(&path, &mutated).unwrap();
            assert!(
                read_keyfile(&path, "pw").is_err(),
                "bit flip at {offset} not detected"
            );
        }
    }

    #[test]
    fn test_atomic_replace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.key");

        let first = Keypair::from_seed(&[0x01; 32]);
        let second = Keypair::from_seed(&[0x02; 32]);
        write_keyfile(&path, &first, "pw", TEST_PARAMS).unwrap();
        write_keyfile(&path, &second, "pw", TEST_PARAMS).unwrap();

        let loaded = read_keyfile(&path, "pw").unwrap();
        assert_eq!(loaded.public_key(), second.public_key());
    }

    #[test]
    fn test_fresh_salt_and_nonce_each_write() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.key");
        let b = dir.path().join("b.key");
        let keypair = Keypair::from_seed(&[0x03; 32]);

        write_keyfile(&a, &keypair, "pw", TEST_PARAMS).unwrap();
        write_keyfile(&b, &keypair, "pw", TEST_PARAMS).unwrap();
        assert_ne!(fs::read(&a).unwrap(), fs::read(&b).unwrap());
    }

    #[test]
    fn test_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.key");
        fs::write(&path, b"NOPExxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx").unwrap();
        assert!(matches!(
            read_keyfile(&path, "pw").unwrap_err(),
            KeyfileError::Corrupt(_)
        ));
    }

    #[test]
    fn test_unknown_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.key");
        let keypair = Keypair::generate();
        write_keyfile(&path, &keypair, "pw", TEST_PARAMS).unwrap();

        let mut contents = fs::read(&path).unwrap();
        contents[4] = 9;
        fs::write(&path, &contents).unwrap();
        assert!(matches!(
            read_keyfile(&path, "pw").unwrap_err(),
            KeyfileError::Corrupt(_)
        ));
    }
}
