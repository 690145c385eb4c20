//! # SigAid Face
//!
//! Deterministic visual identity: a pure mapping from a 32-byte key to a
//! vector-graphic portrait. The same key produces the byte-identical
//! document on every platform and in every conforming implementation —
//! the rendering pipeline, the PRNG, and the number formatting are all
//! frozen.
//!
//! ```
//! use sigaid_face::Face;
//!
//! let face = Face::from_bytes(&[0x5a; 32]);
//! let svg = face.to_vector_graphic(200, true);
//! assert!(svg.starts_with("<svg"));
//! println!("{} - {}", face.fingerprint(), face.describe());
//! ```

pub mod fmt;
pub mod mt;
pub mod params;
pub mod svg;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use thiserror::Error;

use params::{
    FaceParams, AURA_STYLES, BG_STYLES, CHEEK_PATTERNS, CHIN_FEATURES, CROWN_STYLES,
    EYE_EXPRESSIONS, EYE_STYLES, FACE_SHAPES, FOREHEAD_MARKS, MOUTH_STYLES, PALETTES,
    SIDE_ACCESSORIES,
};

pub use mt::Mt19937;
pub use params::total_combinations;
pub use svg::CANVAS_SIZE;

/// Errors for the textual constructors.
#[derive(Debug, Error)]
pub enum FaceError {
    #[error("invalid hex input: {0}")]
    InvalidHex(String),

    #[error("invalid base64 input: {0}")]
    InvalidBase64(String),

    #[error("empty input")]
    Empty,
}

/// A deterministic visual identity derived from a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Face {
    key: [u8; 32],
}

impl Face {
    /// Build a face from arbitrary bytes.
    ///
    /// Inputs shorter than 32 bytes are first hashed to 32 with Blake3;
    /// longer inputs are truncated to their first 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let key: [u8; 32] = if bytes.len() < 32 {
            *blake3::hash(bytes).as_bytes()
        } else {
            bytes[..32].try_into().expect("length checked")
        };
        Self { key }
    }

    /// Build from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, FaceError> {
        let bytes = hex::decode(s).map_err(|e| FaceError::InvalidHex(e.to_string()))?;
        if bytes.is_empty() {
            return Err(FaceError::Empty);
        }
        Ok(Self::from_bytes(&bytes))
    }

    /// Build from a Base64 string.
    pub fn from_base64(s: &str) -> Result<Self, FaceError> {
        let bytes = BASE64
            .decode(s)
            .map_err(|e| FaceError::InvalidBase64(e.to_string()))?;
        if bytes.is_empty() {
            return Err(FaceError::Empty);
        }
        Ok(Self::from_bytes(&bytes))
    }

    /// The 32 key bytes this face is derived from.
    pub fn key_bytes(&self) -> &[u8; 32] {
        &self.key
    }

    /// The extracted render parameters.
    pub fn params(&self) -> FaceParams {
        FaceParams::from_key(&self.key)
    }

    /// Render the vector-graphic document at the given display size.
    pub fn to_vector_graphic(&self, size: u32, animated: bool) -> String {
        svg::render(&self.params(), size, animated)
    }

    /// A `data:` URI embedding the rendered document.
    pub fn to_data_uri(&self, size: u32, animated: bool) -> String {
        let document = self.to_vector_graphic(size, animated);
        format!("data:image/svg+xml;base64,{}", BASE64.encode(document))
    }

    /// Eight hex characters: the first 4 bytes of Blake3 of the key.
    pub fn fingerprint(&self) -> String {
        let hash = blake3::hash(&self.key);
        hex::encode(&hash.as_bytes()[..4])
    }

    /// Short human-readable feature summary.
    pub fn describe(&self) -> String {
        let p = self.params();
        format!(
            "{} | {} | {} eyes | {} crown",
            PALETTES[p.palette].name,
            FACE_SHAPES[p.face_shape],
            EYE_STYLES[p.eye_style],
            CROWN_STYLES[p.crown_style],
        )
    }

    /// Complete feature breakdown as (feature, variant) pairs.
    pub fn full_description(&self) -> Vec<(&'static str, &'static str)> {
        let p = self.params();
        vec![
            ("palette", PALETTES[p.palette].name),
            ("face_shape", FACE_SHAPES[p.face_shape]),
            ("eye_style", EYE_STYLES[p.eye_style]),
            ("eye_expression", EYE_EXPRESSIONS[p.eye_expression]),
            ("mouth_style", MOUTH_STYLES[p.mouth_style]),
            ("crown", CROWN_STYLES[p.crown_style]),
            ("forehead_mark", FOREHEAD_MARKS[p.forehead_mark]),
            ("cheek_pattern", CHEEK_PATTERNS[p.cheek_pattern]),
            ("chin_feature", CHIN_FEATURES[p.chin_feature]),
            ("side_accessory", SIDE_ACCESSORIES[p.side_accessory]),
            ("background", BG_STYLES[p.bg_style]),
            ("aura", AURA_STYLES[p.aura_style]),
        ]
    }

    /// Visual distance in [0, 1]: the Hamming distance over the 12
    /// categorical indices divided by 12. Identical keys score 0.
    pub fn similarity(&self, other: &Face) -> f64 {
        if self.key == other.key {
            return 0.0;
        }
        let a = self.params().categorical_indices();
        let b = other.params().categorical_indices();
        let differing = a.iter().zip(&b).filter(|(x, y)| x != y).count();
        differing as f64 / 12.0
    }
}
