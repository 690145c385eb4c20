//! Feature tables and parameter extraction.
//!
//! The table sizes are normative: 20 palettes, 12 face shapes, 16 eye
//! styles, 8 eye expressions, 14 mouth styles, 16 crown styles, 12
//! forehead marks, 10 cheek patterns, 8 chin features, 10 side
//! accessories, 6 backgrounds, 6 auras. Changing any size changes which
//! feature every existing key maps to.

/// One color palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub name: &'static str,
    pub primary: &'static str,
    pub secondary: &'static str,
    pub accent: &'static str,
    pub glow: &'static str,
    pub bg: &'static str,
}

pub const PALETTES: [Palette; 20] = [
    Palette { name: "Cyan", primary: "#00f5ff", secondary: "#0088aa", accent: "#00ff88", glow: "#00f5ff", bg: "#0a0a12" },
    Palette { name: "Matrix", primary: "#00ff41", secondary: "#008f11", accent: "#88ff88", glow: "#00ff41", bg: "#0a0f0a" },
    Palette { name: "Purple", primary: "#bf00ff", secondary: "#6600aa", accent: "#ff00ff", glow: "#bf00ff", bg: "#0f0a12" },
    Palette { name: "Gold", primary: "#ffd700", secondary: "#ff8c00", accent: "#ffee88", glow: "#ffd700", bg: "#12100a" },
    Palette { name: "Ice", primary: "#88ddff", secondary: "#4499cc", accent: "#ffffff", glow: "#88ddff", bg: "#0a0c10" },
    Palette { name: "Rose", primary: "#ff0080", secondary: "#aa0055", accent: "#ff88bb", glow: "#ff0080", bg: "#120a0c" },
    Palette { name: "Emerald", primary: "#00ff88", secondary: "#00aa55", accent: "#88ffcc", glow: "#00ff88", bg: "#0a100c" },
    Palette { name: "Violet", primary: "#8800ff", secondary: "#5500aa", accent: "#bb88ff", glow: "#8800ff", bg: "#0c0a12" },
    Palette { name: "Blood", primary: "#ff2222", secondary: "#aa0000", accent: "#ff8888", glow: "#ff2222", bg: "#120a0a" },
    Palette { name: "Solar", primary: "#ffaa00", secondary: "#ff6600", accent: "#ffdd44", glow: "#ffaa00", bg: "#12100a" },
    Palette { name: "Arctic", primary: "#aaeeff", secondary: "#66bbdd", accent: "#ffffff", glow: "#aaeeff", bg: "#0a0e12" },
    Palette { name: "Toxic", primary: "#aaff00", secondary: "#66aa00", accent: "#ddff66", glow: "#aaff00", bg: "#0c100a" },
    Palette { name: "Sunset", primary: "#ff6644", secondary: "#cc3366", accent: "#ffaa88", glow: "#ff6644", bg: "#120c0a" },
    Palette { name: "Midnight", primary: "#4466ff", secondary: "#2233aa", accent: "#8899ff", glow: "#4466ff", bg: "#0a0a14" },
    Palette { name: "Chrome", primary: "#cccccc", secondary: "#888888", accent: "#ffffff", glow: "#cccccc", bg: "#101010" },
    Palette { name: "Plasma", primary: "#ff00ff", secondary: "#00ffff", accent: "#ff88ff", glow: "#ff00ff", bg: "#0f0a10" },
    Palette { name: "Neon", primary: "#ff00aa", secondary: "#ffff00", accent: "#00ffaa", glow: "#ff00aa", bg: "#0a0808" },
    Palette { name: "Ocean", primary: "#0066cc", secondary: "#004488", accent: "#00aaff", glow: "#0088ff", bg: "#080a10" },
    Palette { name: "Lava", primary: "#ff4400", secondary: "#cc2200", accent: "#ffaa00", glow: "#ff6600", bg: "#100808" },
    Palette { name: "Void", primary: "#6633aa", secondary: "#331166", accent: "#9966ff", glow: "#7744cc", bg: "#08060c" },
];

pub const FACE_SHAPES: [&str; 12] = [
    "oval", "angular", "hexagonal", "diamond", "shield", "heart", "octagonal", "rounded_square",
    "pentagon", "triangle", "pill", "star",
];

pub const EYE_STYLES: [&str; 16] = [
    "holo_ring", "matrix_scan", "data_orb", "cyber_lens", "visor_bar", "split_iris",
    "compound", "target_lock", "energy_slit", "binary_dots", "spiral", "crosshair",
    "scanner_bar", "diamond_core", "pixel_grid", "flame_eye",
];

pub const EYE_EXPRESSIONS: [&str; 8] = [
    "neutral", "wide", "narrow", "tilt_up", "tilt_down", "asymmetric", "squint", "shock",
];

pub const MOUTH_STYLES: [&str; 14] = [
    "data_stream", "waveform", "minimal", "grid", "vent", "speaker", "binary",
    "smile_arc", "glyph", "silent", "pixel_smile", "teeth_grid", "equalizer", "circuit_mouth",
];

pub const CROWN_STYLES: [&str; 16] = [
    "none", "antenna_single", "antenna_dual", "horns", "halo", "mohawk_data",
    "floating_orbs", "energy_spikes", "circuit_crown", "visor_top", "flames", "crystals",
    "crown_peaks", "satellite", "wings", "data_cloud",
];

pub const FOREHEAD_MARKS: [&str; 12] = [
    "none", "third_eye", "symbol_circle", "barcode", "circuit_node", "gem",
    "scanner_line", "binary_row", "hexagon", "omega", "cross", "infinity",
];

pub const CHEEK_PATTERNS: [&str; 10] = [
    "none", "circuit_lines", "tribal_bars", "dots", "vents", "data_ports",
    "scars", "glyphs", "binary_stream", "wave_lines",
];

pub const CHIN_FEATURES: [&str; 8] = [
    "none", "vent", "light_bar", "beard_lines", "energy_core", "port", "speaker_grille",
    "data_jack",
];

pub const SIDE_ACCESSORIES: [&str; 10] = [
    "none", "earpiece_left", "earpiece_right", "earpiece_both", "antenna_side",
    "blade", "coil", "jack", "wing_fins", "data_nodes",
];

pub const BG_STYLES: [&str; 6] = [
    "data_rain", "hex_grid", "circuit", "particles", "void", "matrix_code",
];

pub const AURA_STYLES: [&str; 6] = [
    "glow", "double_ring", "glitch", "holographic", "pulse", "electric",
];

/// Characters raining in matrix-style backgrounds.
pub const MATRIX_CHARS: &str =
    "アイウエオカキクケコサシスセソタチツテトナニヌネノハヒフヘホマミムメモヤユヨラリルレロワヲン0123456789ABCDEF";

/// Symbols used by glyph-style marks.
pub const SYMBOLS: [&str; 14] = [
    "◯", "△", "□", "◇", "⬡", "✦", "⚡", "Ω", "Δ", "Ψ", "∞", "⊕", "✕", "☆",
];

/// Map a byte onto [lo, hi] in IEEE-754 double precision.
pub fn byte_to_range(v: u8, lo: f64, hi: f64) -> f64 {
    lo + (v as f64 / 255.0) * (hi - lo)
}

/// Every parameter the renderer consumes, extracted from 32 key bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceParams {
    // Categorical indices (bytes 0-11).
    pub palette: usize,
    pub face_shape: usize,
    pub eye_style: usize,
    pub eye_expression: usize,
    pub mouth_style: usize,
    pub crown_style: usize,
    pub forehead_mark: usize,
    pub cheek_pattern: usize,
    pub chin_feature: usize,
    pub side_accessory: usize,
    pub bg_style: usize,
    pub aura_style: usize,

    // Continuous variations (bytes 12-19).
    pub face_width: f64,
    pub face_height: f64,
    pub eye_size: f64,
    pub eye_spacing: f64,
    pub mouth_width: f64,
    pub crown_size: f64,
    pub mark_size: f64,
    pub accessory_size: f64,

    // Effects (bytes 20-23).
    pub glow_intensity: f64,
    pub animation_speed: f64,
    pub glitch_amount: f64,
    pub particle_density: u32,

    // Renderer seeds (bytes 24-31, big-endian pairs).
    pub pattern_seed: u16,
    pub circuit_seed: u16,
    pub particle_seed: u16,
    pub effect_seed: u16,
}

impl FaceParams {
    /// Extract all parameters from exactly 32 bytes.
    pub fn from_key(b: &[u8; 32]) -> Self {
        Self {
            palette: b[0] as usize % PALETTES.len(),
            face_shape: b[1] as usize % FACE_SHAPES.len(),
            eye_style: b[2] as usize % EYE_STYLES.len(),
            eye_expression: b[3] as usize % EYE_EXPRESSIONS.len(),
            mouth_style: b[4] as usize % MOUTH_STYLES.len(),
            crown_style: b[5] as usize % CROWN_STYLES.len(),
            forehead_mark: b[6] as usize % FOREHEAD_MARKS.len(),
            cheek_pattern: b[7] as usize % CHEEK_PATTERNS.len(),
            chin_feature: b[8] as usize % CHIN_FEATURES.len(),
            side_accessory: b[9] as usize % SIDE_ACCESSORIES.len(),
            bg_style: b[10] as usize % BG_STYLES.len(),
            aura_style: b[11] as usize % AURA_STYLES.len(),
            face_width: byte_to_range(b[12], 50.0, 70.0),
            face_height: byte_to_range(b[13], 65.0, 85.0),
            eye_size: byte_to_range(b[14], 10.0, 20.0),
            eye_spacing: byte_to_range(b[15], 22.0, 38.0),
            mouth_width: byte_to_range(b[16], 18.0, 40.0),
            crown_size: byte_to_range(b[17], 0.7, 1.3),
            mark_size: byte_to_range(b[18], 0.7, 1.3),
            accessory_size: byte_to_range(b[19], 0.8, 1.2),
            glow_intensity: byte_to_range(b[20], 0.5, 1.0),
            animation_speed: byte_to_range(b[21], 1.5, 3.5),
            glitch_amount: byte_to_range(b[22], 0.1, 0.3),
            particle_density: byte_to_range(b[23], 8.0, 20.0).floor() as u32,
            pattern_seed: u16::from_be_bytes([b[24], b[25]]),
            circuit_seed: u16::from_be_bytes([b[26], b[27]]),
            particle_seed: u16::from_be_bytes([b[28], b[29]]),
            effect_seed: u16::from_be_bytes([b[30], b[31]]),
        }
    }

    /// The 12 categorical indices in table order.
    pub fn categorical_indices(&self) -> [usize; 12] {
        [
            self.palette,
            self.face_shape,
            self.eye_style,
            self.eye_expression,
            self.mouth_style,
            self.crown_style,
            self.forehead_mark,
            self.cheek_pattern,
            self.chin_feature,
            self.side_accessory,
            self.bg_style,
            self.aura_style,
        ]
    }
}

/// The number of distinct categorical combinations. A normative
/// self-check: the product of all twelve table sizes.
pub fn total_combinations() -> u64 {
    (PALETTES.len()
        * FACE_SHAPES.len()
        * EYE_STYLES.len()
        * EYE_EXPRESSIONS.len()
        * MOUTH_STYLES.len()
        * CROWN_STYLES.len()
        * FOREHEAD_MARKS.len()
        * CHEEK_PATTERNS.len()
        * CHIN_FEATURES.len()
        * SIDE_ACCESSORIES.len()
        * BG_STYLES.len()
        * AURA_STYLES.len()) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_sizes_are_normative() {
        assert_eq!(PALETTES.len(), 20);
        assert_eq!(FACE_SHAPES.len(), 12);
        assert_eq!(EYE_STYLES.len(), 16);
        assert_eq!(EYE_EXPRESSIONS.len(), 8);
        assert_eq!(MOUTH_STYLES.len(), 14);
        assert_eq!(CROWN_STYLES.len(), 16);
        assert_eq!(FOREHEAD_MARKS.len(), 12);
        assert_eq!(CHEEK_PATTERNS.len(), 10);
        assert_eq!(CHIN_FEATURES.len(), 8);
        assert_eq!(SIDE_ACCESSORIES.len(), 10);
        assert_eq!(BG_STYLES.len(), 6);
        assert_eq!(AURA_STYLES.len(), 6);
    }

    #[test]
    fn test_total_combinations() {
        assert_eq!(total_combinations(), 2_378_170_368_000);
    }

    #[test]
    fn test_byte_to_range_endpoints() {
        assert_eq!(byte_to_range(0, 50.0, 70.0), 50.0);
        assert_eq!(byte_to_range(255, 50.0, 70.0), 70.0);
        let mid = byte_to_range(128, 0.0, 255.0);
        assert!((mid - 128.0 * 255.0 / 255.0).abs() < 0.51);
    }

    #[test]
    fn test_extraction_uses_each_byte() {
        let mut base = [0u8; 32];
        base[0] = 3;
        base[24] = 0xab;
        base[25] = 0xcd;
        let p = FaceParams::from_key(&base);
        assert_eq!(p.palette, 3);
        assert_eq!(p.pattern_seed, 0xabcd);
        assert_eq!(p.face_width, 50.0);
        assert_eq!(p.particle_density, 8);

        let mut high = [0xffu8; 32];
        high[23] = 255;
        let p = FaceParams::from_key(&high);
        assert_eq!(p.particle_density, 20);
    }

    #[test]
    fn test_extraction_deterministic() {
        let key = [0x5au8; 32];
        assert_eq!(FaceParams::from_key(&key), FaceParams::from_key(&key));
    }
}
