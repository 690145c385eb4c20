//! Vector-graphic rendering.
//!
//! The document is assembled in a fixed order: defs, animations,
//! background, aura, pre-face crowns (halo, flames, data_cloud), face
//! shape, forehead mark, eyes, cheeks, mouth, chin, side accessories,
//! post-face crowns, scan overlay. Every subcomponent that draws from the
//! random stream installs its named seed immediately before drawing, so
//! its geometry never depends on what was drawn earlier.
//!
//! All coordinate arithmetic is f64; every emitted number goes through
//! [`crate::fmt::num`].

use crate::fmt::num as n;
use crate::mt::Mt19937;
use crate::params::{
    FaceParams, Palette, AURA_STYLES, BG_STYLES, CHEEK_PATTERNS, CHIN_FEATURES, CROWN_STYLES,
    EYE_EXPRESSIONS, EYE_STYLES, FACE_SHAPES, FOREHEAD_MARKS, MATRIX_CHARS, MOUTH_STYLES,
    PALETTES, SIDE_ACCESSORIES, SYMBOLS,
};

/// Fixed viewport edge length.
pub const CANVAS_SIZE: u32 = 200;

/// Reference center of the viewport.
const C: f64 = 100.0;

struct Ctx<'a> {
    p: &'a FaceParams,
    pal: &'a Palette,
    animated: bool,
}

/// Render the complete document.
pub fn render(params: &FaceParams, size: u32, animated: bool) -> String {
    let ctx = Ctx {
        p: params,
        pal: &PALETTES[params.palette],
        animated,
    };

    let mut parts: Vec<String> = vec![format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 {CANVAS_SIZE} {CANVAS_SIZE}\" width=\"{size}\" height=\"{size}\">"
    )];

    parts.push(ctx.defs());
    if animated {
        parts.push(ctx.animations());
    }

    parts.push(ctx.background());
    parts.push(ctx.aura());

    let crown = CROWN_STYLES[params.crown_style];
    let crown_is_backdrop = matches!(crown, "halo" | "flames" | "data_cloud");
    if crown_is_backdrop {
        parts.push(ctx.crown());
    }

    parts.push(ctx.face());
    parts.push(ctx.forehead_mark());
    parts.push(ctx.eyes());
    parts.push(ctx.cheeks());
    parts.push(ctx.mouth());
    parts.push(ctx.chin());
    parts.push(ctx.side_accessories());

    if crown != "none" && !crown_is_backdrop {
        parts.push(ctx.crown());
    }

    if animated {
        parts.push(ctx.scan_overlay());
    }

    parts.push("</svg>".to_string());
    parts.retain(|s| !s.is_empty());
    parts.join("\n")
}

impl Ctx<'_> {
    fn pulse(&self) -> &'static str {
        if self.animated { "class=\"pulse\"" } else { "" }
    }

    fn defs(&self) -> String {
        let Palette {
            primary, secondary, ..
        } = *self.pal;
        format!(
            r##"<defs>
<linearGradient id="face-grad" x1="0%" y1="0%" x2="100%" y2="100%">
<stop offset="0%" stop-color="{primary}" stop-opacity="0.2"/>
<stop offset="50%" stop-color="{secondary}" stop-opacity="0.1"/>
<stop offset="100%" stop-color="{primary}" stop-opacity="0.2"/>
</linearGradient>
<radialGradient id="face-glass" cx="30%" cy="30%" r="70%">
<stop offset="0%" stop-color="white" stop-opacity="0.25"/>
<stop offset="50%" stop-color="{primary}" stop-opacity="0.1"/>
<stop offset="100%" stop-color="{secondary}" stop-opacity="0.05"/>
</radialGradient>
<filter id="glow" x="-50%" y="-50%" width="200%" height="200%">
<feGaussianBlur stdDeviation="3" result="blur"/>
<feMerge><feMergeNode in="blur"/><feMergeNode in="blur"/><feMergeNode in="SourceGraphic"/></feMerge>
</filter>
<filter id="glow-strong" x="-100%" y="-100%" width="300%" height="300%">
<feGaussianBlur stdDeviation="6" result="blur"/>
<feMerge><feMergeNode in="blur"/><feMergeNode in="blur"/><feMergeNode in="blur"/><feMergeNode in="SourceGraphic"/></feMerge>
</filter>
<filter id="glitch">
<feColorMatrix type="matrix" values="1 0 0 0 0  0 0 0 0 0  0 0 0 0 0  0 0 0 1 0" result="r"/>
<feOffset in="r" dx="2" dy="0" result="r-shift"/>
<feColorMatrix in="SourceGraphic" type="matrix" values="0 0 0 0 0  0 0 0 0 0  0 0 1 0 0  0 0 0 1 0" result="b"/>
<feOffset in="b" dx="-2" dy="0" result="b-shift"/>
<feBlend in="r-shift" in2="SourceGraphic" mode="screen" result="rg"/>
<feBlend in="rg" in2="b-shift" mode="screen"/>
</filter>
</defs>"##
        )
    }

    fn animations(&self) -> String {
        let speed = self.p.animation_speed;
        let glow = self.pal.glow;
        format!(
            r##"<style>
@keyframes pulse {{ 0%, 100% {{ opacity: 0.7; }} 50% {{ opacity: 1; }} }}
@keyframes glow-pulse {{ 0%, 100% {{ filter: drop-shadow(0 0 4px {glow}); }} 50% {{ filter: drop-shadow(0 0 12px {glow}); }} }}
@keyframes float {{ 0%, 100% {{ transform: translateY(0); }} 50% {{ transform: translateY(-4px); }} }}
@keyframes rotate {{ 0% {{ transform: rotate(0deg); }} 100% {{ transform: rotate(360deg); }} }}
@keyframes glitch {{ 0%, 92%, 100% {{ transform: translate(0); }} 94% {{ transform: translate(-2px, 1px); }} 96% {{ transform: translate(2px, -1px); }} 98% {{ transform: translate(-1px, -1px); }} }}
@keyframes flicker {{ 0%, 90%, 100% {{ opacity: 1; }} 92% {{ opacity: 0.8; }} 96% {{ opacity: 0.7; }} }}
@keyframes data-fall {{ 0% {{ transform: translateY(-20px); opacity: 0; }} 10% {{ opacity: 0.8; }} 90% {{ opacity: 0.8; }} 100% {{ transform: translateY(220px); opacity: 0; }} }}
@keyframes electric {{ 0%, 100% {{ opacity: 0.6; }} 25% {{ opacity: 1; }} 50% {{ opacity: 0.4; }} 75% {{ opacity: 0.9; }} }}
@keyframes flame {{ 0%, 100% {{ transform: scaleY(1) translateY(0); }} 50% {{ transform: scaleY(1.1) translateY(-2px); }} }}
.pulse {{ animation: pulse {s1}s ease-in-out infinite; }}
.glow-pulse {{ animation: glow-pulse {s1}s ease-in-out infinite; }}
.float {{ animation: float {s15}s ease-in-out infinite; }}
.rotate {{ animation: rotate {s4}s linear infinite; }}
.glitch {{ animation: glitch {s5}s steps(1) infinite; }}
.flicker {{ animation: flicker {s3}s steps(1) infinite; }}
.electric {{ animation: electric {s05}s steps(2) infinite; }}
.flame {{ animation: flame {s08}s ease-in-out infinite; }}
</style>"##,
            s1 = n(speed),
            s15 = n(speed * 1.5),
            s4 = n(speed * 4.0),
            s5 = n(speed * 5.0),
            s3 = n(speed * 3.0),
            s05 = n(speed * 0.5),
            s08 = n(speed * 0.8),
        )
    }

    fn background(&self) -> String {
        let p = self.p;
        let style = BG_STYLES[p.bg_style];
        let primary = self.pal.primary;
        let mut parts = vec![format!(
            "<rect width=\"{CANVAS_SIZE}\" height=\"{CANVAS_SIZE}\" fill=\"{}\"/>",
            self.pal.bg
        )];

        match style {
            "data_rain" => {
                let mut rng = Mt19937::new(p.particle_seed as u32);
                for _ in 0..p.particle_density {
                    let x = rng.randint(5, CANVAS_SIZE as i64 - 5);
                    let delay = rng.uniform(0.0, 5.0);
                    let duration = rng.uniform(3.0, 6.0);
                    let ch = rng.choice_char(MATRIX_CHARS);
                    parts.push(format!(
                        "<text x=\"{x}\" y=\"0\" fill=\"{primary}\" font-family=\"monospace\" font-size=\"10\" opacity=\"0.5\" style=\"animation: data-fall {}s linear {}s infinite;\">{ch}</text>",
                        n(duration), n(delay)
                    ));
                }
            }
            "hex_grid" => {
                let mut y = -10i64;
                while y < CANVAS_SIZE as i64 + 20 {
                    let offset = if y.div_euclid(30).rem_euclid(2) == 1 { 17 } else { 0 };
                    let mut x = -10i64 + offset;
                    while x < CANVAS_SIZE as i64 + 20 {
                        parts.push(format!(
                            "<polygon points=\"{x},{ym10} {xp8},{ym5} {xp8},{yp5} {x},{yp10} {xm8},{yp5} {xm8},{ym5}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"0.5\" opacity=\"0.1\"/>",
                            ym10 = y - 10, ym5 = y - 5, yp5 = y + 5, yp10 = y + 10,
                            xp8 = x + 8, xm8 = x - 8,
                        ));
                        x += 34;
                    }
                    y += 30;
                }
            }
            "circuit" => {
                let mut rng = Mt19937::new(p.circuit_seed as u32);
                for _ in 0..12 {
                    let x1 = rng.randint(0, CANVAS_SIZE as i64);
                    let y1 = rng.randint(0, CANVAS_SIZE as i64);
                    let x2 = x1 + *rng.choice(&[-40i64, -20, 20, 40]);
                    let y2 = y1;
                    let x3 = x2;
                    let y3 = y2 + *rng.choice(&[-40i64, -20, 20, 40]);
                    parts.push(format!(
                        "<path d=\"M{x1},{y1} L{x2},{y2} L{x3},{y3}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\" opacity=\"0.15\"/>"
                    ));
                    parts.push(format!(
                        "<circle cx=\"{x3}\" cy=\"{y3}\" r=\"2\" fill=\"{primary}\" opacity=\"0.2\"/>"
                    ));
                }
            }
            "particles" => {
                let mut rng = Mt19937::new(p.particle_seed as u32);
                for _ in 0..p.particle_density * 2 {
                    let x = rng.randint(5, CANVAS_SIZE as i64 - 5);
                    let y = rng.randint(5, CANVAS_SIZE as i64 - 5);
                    let size = rng.uniform(1.0, 3.0);
                    let delay = rng.uniform(0.0, 3.0);
                    parts.push(format!(
                        "<circle cx=\"{x}\" cy=\"{y}\" r=\"{}\" fill=\"{primary}\" opacity=\"0.3\" class=\"float\" style=\"animation-delay: {}s;\"/>",
                        n(size), n(delay)
                    ));
                }
            }
            "matrix_code" => {
                let mut rng = Mt19937::new(p.particle_seed as u32);
                for _ in 0..p.particle_density + 8 {
                    let x = rng.randint(5, CANVAS_SIZE as i64 - 5);
                    let delay = rng.uniform(0.0, 4.0);
                    let duration = rng.uniform(2.5, 5.0);
                    let col_height = rng.randint(3, 6);
                    for j in 0..col_height {
                        let ch = rng.choice_char(MATRIX_CHARS);
                        let opacity = 0.8 - j as f64 * 0.15;
                        parts.push(format!(
                            "<text x=\"{x}\" y=\"{y}\" fill=\"{primary}\" font-family=\"monospace\" font-size=\"9\" opacity=\"{op}\" style=\"animation: data-fall {dur}s linear {del}s infinite;\">{ch}</text>",
                            y = j * 12,
                            op = n(opacity),
                            dur = n(duration),
                            del = n(delay + j as f64 * 0.1),
                        ));
                    }
                }
            }
            // "void": just the backdrop rect.
            _ => {}
        }

        parts.join("\n")
    }

    fn aura(&self) -> String {
        let p = self.p;
        let aura = AURA_STYLES[p.aura_style];
        let primary = self.pal.primary;
        let secondary = self.pal.secondary;
        let glow = self.pal.glow;
        let radius = p.face_width.max(p.face_height) + 12.0;
        let anim = if self.animated { "class=\"glow-pulse\"" } else { "" };

        match aura {
            "glow" => format!(
                "<circle cx=\"{c}\" cy=\"{c}\" r=\"{r}\" fill=\"none\" stroke=\"{glow}\" stroke-width=\"2\" opacity=\"0.5\" {anim} filter=\"url(#glow)\"/>",
                c = n(C), r = n(radius)
            ),
            "double_ring" => format!(
                "<circle cx=\"{c}\" cy=\"{c}\" r=\"{r}\" fill=\"none\" stroke=\"{glow}\" stroke-width=\"1.5\" opacity=\"0.5\" {anim}/>\n\
                 <circle cx=\"{c}\" cy=\"{c}\" r=\"{r6}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\" opacity=\"0.3\"/>\n\
                 <circle cx=\"{c}\" cy=\"{c}\" r=\"{r12}\" fill=\"none\" stroke=\"{glow}\" stroke-width=\"0.5\" opacity=\"0.2\"/>",
                c = n(C), r = n(radius), r6 = n(radius + 6.0), r12 = n(radius + 12.0)
            ),
            "glitch" => {
                let g = if self.animated { "class=\"glitch\"" } else { "" };
                format!(
                    "<g {g}><circle cx=\"{c}\" cy=\"{c}\" r=\"{r}\" fill=\"none\" stroke=\"{glow}\" stroke-width=\"2\" opacity=\"0.6\"/></g>",
                    c = n(C), r = n(radius)
                )
            }
            "holographic" => format!(
                "<circle cx=\"{c}\" cy=\"{c}\" r=\"{r}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\" opacity=\"0.4\" stroke-dasharray=\"4 4\" {anim}/>\n\
                 <circle cx=\"{c}\" cy=\"{c}\" r=\"{r4}\" fill=\"none\" stroke=\"{glow}\" stroke-width=\"0.5\" opacity=\"0.3\" stroke-dasharray=\"2 6\"/>\n\
                 <circle cx=\"{c}\" cy=\"{c}\" r=\"{rm4}\" fill=\"none\" stroke=\"{secondary}\" stroke-width=\"0.5\" opacity=\"0.3\" stroke-dasharray=\"6 2\"/>",
                c = n(C), r = n(radius), r4 = n(radius + 4.0), rm4 = n(radius - 4.0)
            ),
            "pulse" => {
                let pulse = self.pulse();
                format!(
                    "<circle cx=\"{c}\" cy=\"{c}\" r=\"{r}\" fill=\"none\" stroke=\"{glow}\" stroke-width=\"3\" opacity=\"0.4\" {pulse} filter=\"url(#glow)\"/>\n\
                     <circle cx=\"{c}\" cy=\"{c}\" r=\"{rm3}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\" opacity=\"0.6\"/>",
                    c = n(C), r = n(radius), rm3 = n(radius - 3.0)
                )
            }
            _ => {
                // electric
                let e = if self.animated { "class=\"electric\"" } else { "" };
                let mut parts = vec![format!(
                    "<circle cx=\"{c}\" cy=\"{c}\" r=\"{r}\" fill=\"none\" stroke=\"{glow}\" stroke-width=\"2\" opacity=\"0.5\" {e}/>",
                    c = n(C), r = n(radius)
                )];
                for i in 0..6 {
                    let angle = (i as f64) * 60.0 * std::f64::consts::PI / 180.0;
                    let x1 = C + radius * angle.cos();
                    let y1 = C + radius * angle.sin();
                    let x2 = C + (radius + 8.0) * (angle + 0.1).cos();
                    let y2 = C + (radius + 8.0) * (angle + 0.1).sin();
                    let x3 = C + (radius + 5.0) * (angle - 0.1).cos();
                    let y3 = C + (radius + 5.0) * (angle - 0.1).sin();
                    parts.push(format!(
                        "<path d=\"M{},{} L{},{} L{},{}\" fill=\"none\" stroke=\"{glow}\" stroke-width=\"1.5\" {e}/>",
                        n(x1), n(y1), n(x2), n(y2), n(x3), n(y3)
                    ));
                }
                parts.join("\n")
            }
        }
    }

    fn face_shape_element(&self) -> String {
        let p = self.p;
        let shape = FACE_SHAPES[p.face_shape];
        let primary = self.pal.primary;
        let (w, h) = (p.face_width, p.face_height);
        let c = C;

        let poly = |pts: &[(f64, f64)]| {
            let joined = pts
                .iter()
                .map(|(x, y)| format!("{},{}", n(*x), n(*y)))
                .collect::<Vec<_>>()
                .join(" ");
            format!(
                "<polygon points=\"{joined}\" fill=\"url(#face-glass)\" stroke=\"{primary}\" stroke-width=\"1.5\"/>"
            )
        };

        match shape {
            "oval" => format!(
                "<ellipse cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"{}\" fill=\"url(#face-glass)\" stroke=\"{primary}\" stroke-width=\"1.5\"/>",
                n(c), n(c), n(w), n(h)
            ),
            "angular" => poly(&[
                (c, c - h),
                (c + w * 0.85, c - h * 0.35),
                (c + w * 0.7, c + h * 0.65),
                (c, c + h),
                (c - w * 0.7, c + h * 0.65),
                (c - w * 0.85, c - h * 0.35),
            ]),
            "hexagonal" => {
                let pts: Vec<(f64, f64)> = (0..6)
                    .map(|i| {
                        let a = std::f64::consts::PI / 3.0 * i as f64 - std::f64::consts::PI / 2.0;
                        (c + w * a.cos(), c + h * a.sin())
                    })
                    .collect();
                poly(&pts)
            }
            "diamond" => poly(&[(c, c - h), (c + w, c), (c, c + h), (c - w, c)]),
            "shield" => format!(
                "<path d=\"M{c0},{ymh} Q{xpw},{yh05} {xpw},{yh02} Q{xp07},{yph} {c0},{yph} Q{xm07},{yph} {xmw},{yh02} Q{xmw},{yh05} {c0},{ymh}\" fill=\"url(#face-glass)\" stroke=\"{primary}\" stroke-width=\"1.5\"/>",
                c0 = n(c), ymh = n(c - h), xpw = n(c + w), yh05 = n(c - h * 0.5),
                yh02 = n(c + h * 0.2), xp07 = n(c + w * 0.7), yph = n(c + h),
                xm07 = n(c - w * 0.7), xmw = n(c - w)
            ),
            "heart" => format!(
                "<path d=\"M{c0},{y03} Q{c0},{ymh} {xm05},{ymh} Q{xmw},{ymh} {xmw},{y03} Q{xmw},{yp03} {c0},{yph} Q{xpw},{yp03} {xpw},{y03} Q{xpw},{ymh} {xp05},{ymh} Q{c0},{ymh} {c0},{y03}\" fill=\"url(#face-glass)\" stroke=\"{primary}\" stroke-width=\"1.5\"/>",
                c0 = n(c), y03 = n(c - h * 0.3), ymh = n(c - h), xm05 = n(c - w * 0.5),
                xmw = n(c - w), yp03 = n(c + h * 0.3), yph = n(c + h),
                xpw = n(c + w), xp05 = n(c + w * 0.5)
            ),
            "octagonal" => {
                let d = w * 0.4;
                poly(&[
                    (c - d, c - h),
                    (c + d, c - h),
                    (c + w, c - d),
                    (c + w, c + d),
                    (c + d, c + h),
                    (c - d, c + h),
                    (c - w, c + d),
                    (c - w, c - d),
                ])
            }
            "rounded_square" => format!(
                "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" rx=\"{}\" fill=\"url(#face-glass)\" stroke=\"{primary}\" stroke-width=\"1.5\"/>",
                n(c - w), n(c - h), n(w * 2.0), n(h * 2.0), n(w * 0.25)
            ),
            "pentagon" => {
                let pts: Vec<(f64, f64)> = (0..5)
                    .map(|i| {
                        let a = 2.0 * std::f64::consts::PI / 5.0 * i as f64
                            - std::f64::consts::PI / 2.0;
                        (c + w * 0.95 * a.cos(), c + h * 0.95 * a.sin())
                    })
                    .collect();
                poly(&pts)
            }
            "triangle" => poly(&[(c, c - h), (c + w, c + h * 0.8), (c - w, c + h * 0.8)]),
            "pill" => format!(
                "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" rx=\"{}\" fill=\"url(#face-glass)\" stroke=\"{primary}\" stroke-width=\"1.5\"/>",
                n(c - w * 0.7), n(c - h), n(w * 1.4), n(h * 2.0), n(w * 0.7)
            ),
            _ => {
                // star
                let pts: Vec<(f64, f64)> = (0..10)
                    .map(|i| {
                        let a = std::f64::consts::PI / 5.0 * i as f64 - std::f64::consts::PI / 2.0;
                        let r = if i % 2 == 0 { w } else { w * 0.5 };
                        (c + r * a.cos(), c + h / w * r * a.sin())
                    })
                    .collect();
                poly(&pts)
            }
        }
    }

    fn face(&self) -> String {
        let g = if self.animated { "class=\"glitch\"" } else { "" };
        format!("<g {g}>{}</g>", self.face_shape_element())
    }

    fn forehead_mark(&self) -> String {
        let p = self.p;
        let mark = FOREHEAD_MARKS[p.forehead_mark];
        if mark == "none" {
            return String::new();
        }

        let primary = self.pal.primary;
        let glow = self.pal.glow;
        let y = C - p.face_height * 0.55;
        let size = 8.0 * p.mark_size;
        let anim = self.pulse();

        match mark {
            "third_eye" => format!(
                "<circle cx=\"{c}\" cy=\"{y}\" r=\"{s}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1.5\" {anim}/><circle cx=\"{c}\" cy=\"{y}\" r=\"{s04}\" fill=\"{glow}\" filter=\"url(#glow)\" {anim}/>",
                c = n(C), y = n(y), s = n(size), s04 = n(size * 0.4)
            ),
            "symbol_circle" => {
                let symbol = SYMBOLS[p.pattern_seed as usize % SYMBOLS.len()];
                format!(
                    "<circle cx=\"{c}\" cy=\"{y}\" r=\"{s}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\"/><text x=\"{c}\" y=\"{y3}\" text-anchor=\"middle\" fill=\"{glow}\" font-size=\"{fs}\" {anim}>{symbol}</text>",
                    c = n(C), y = n(y), s = n(size), y3 = n(y + 3.0), fs = n(size * 1.2)
                )
            }
            "barcode" => {
                let lines: Vec<String> = (-3i64..4)
                    .map(|i| {
                        let bit = (p.pattern_seed >> (i + 3)) & 1 == 1;
                        let width = if bit { 1.0 } else { 2.0 };
                        format!(
                            "<rect x=\"{x}\" y=\"{yt}\" width=\"{w}\" height=\"{s}\" fill=\"{primary}\"/>",
                            x = n(C + i as f64 * 3.0 - width / 2.0),
                            yt = n(y - size / 2.0),
                            w = n(width),
                            s = n(size),
                        )
                    })
                    .collect();
                format!("<g opacity=\"0.8\">{}</g>", lines.join("\n"))
            }
            "circuit_node" => format!(
                "<circle cx=\"{c}\" cy=\"{y}\" r=\"{s05}\" fill=\"{glow}\" filter=\"url(#glow)\" {anim}/><line x1=\"{xms}\" y1=\"{y}\" x2=\"{xms06}\" y2=\"{y}\" stroke=\"{primary}\" stroke-width=\"1\"/><line x1=\"{xps06}\" y1=\"{y}\" x2=\"{xps}\" y2=\"{y}\" stroke=\"{primary}\" stroke-width=\"1\"/><line x1=\"{c}\" y1=\"{yms}\" x2=\"{c}\" y2=\"{yms06}\" stroke=\"{primary}\" stroke-width=\"1\"/>",
                c = n(C), y = n(y), s05 = n(size * 0.5),
                xms = n(C - size), xms06 = n(C - size * 0.6),
                xps06 = n(C + size * 0.6), xps = n(C + size),
                yms = n(y - size), yms06 = n(y - size * 0.6)
            ),
            "gem" => {
                let pts = [
                    (C, y - size),
                    (C + size * 0.7, y),
                    (C, y + size * 0.5),
                    (C - size * 0.7, y),
                ];
                let joined = pts
                    .iter()
                    .map(|(x, py)| format!("{},{}", n(*x), n(*py)))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!(
                    "<polygon points=\"{joined}\" fill=\"{glow}\" opacity=\"0.6\" filter=\"url(#glow)\" {anim}/><polygon points=\"{joined}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\"/>"
                )
            }
            "scanner_line" => format!(
                "<line x1=\"{xl}\" y1=\"{y}\" x2=\"{xr}\" y2=\"{y}\" stroke=\"{glow}\" stroke-width=\"2\" filter=\"url(#glow)\" {anim}/><circle cx=\"{xl}\" cy=\"{y}\" r=\"2\" fill=\"{primary}\"/><circle cx=\"{xr}\" cy=\"{y}\" r=\"2\" fill=\"{primary}\"/>",
                xl = n(C - size * 1.5), xr = n(C + size * 1.5), y = n(y)
            ),
            "binary_row" => {
                let bits = format!("{:08b}", p.pattern_seed % 256);
                format!(
                    "<text x=\"{c}\" y=\"{y3}\" text-anchor=\"middle\" fill=\"{primary}\" font-family=\"monospace\" font-size=\"6\" {anim}>{bits}</text>",
                    c = n(C), y3 = n(y + 3.0)
                )
            }
            "hexagon" => {
                let pts: Vec<(f64, f64)> = (0..6)
                    .map(|i| {
                        let a = std::f64::consts::PI / 3.0 * i as f64 - std::f64::consts::PI / 2.0;
                        (C + size * 0.8 * a.cos(), y + size * 0.8 * a.sin())
                    })
                    .collect();
                let joined = pts
                    .iter()
                    .map(|(x, py)| format!("{},{}", n(*x), n(*py)))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!(
                    "<polygon points=\"{joined}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1.5\" {anim}/><circle cx=\"{c}\" cy=\"{y}\" r=\"{s03}\" fill=\"{glow}\" filter=\"url(#glow)\"/>",
                    c = n(C), y = n(y), s03 = n(size * 0.3)
                )
            }
            "omega" => format!(
                "<text x=\"{c}\" y=\"{yt}\" text-anchor=\"middle\" fill=\"{glow}\" font-size=\"{fs}\" filter=\"url(#glow)\" {anim}>Ω</text>",
                c = n(C), yt = n(y + size * 0.4), fs = n(size * 2.0)
            ),
            "cross" => format!(
                "<line x1=\"{xl}\" y1=\"{y}\" x2=\"{xr}\" y2=\"{y}\" stroke=\"{glow}\" stroke-width=\"2\" filter=\"url(#glow)\" {anim}/><line x1=\"{c}\" y1=\"{yt}\" x2=\"{c}\" y2=\"{yb}\" stroke=\"{glow}\" stroke-width=\"2\" filter=\"url(#glow)\"/>",
                xl = n(C - size), xr = n(C + size), y = n(y),
                c = n(C), yt = n(y - size), yb = n(y + size)
            ),
            _ => format!(
                // infinity
                "<text x=\"{c}\" y=\"{yt}\" text-anchor=\"middle\" fill=\"{glow}\" font-size=\"{fs}\" filter=\"url(#glow)\" {anim}>∞</text>",
                c = n(C), yt = n(y + size * 0.3), fs = n(size * 2.5)
            ),
        }
    }

    fn eyes(&self) -> String {
        let p = self.p;
        let style = EYE_STYLES[p.eye_style];
        let expr = EYE_EXPRESSIONS[p.eye_expression];
        let primary = self.pal.primary;
        let glow = self.pal.glow;
        let accent = self.pal.accent;

        let eye_y = C - 5.0;
        let left_x = C - p.eye_spacing / 2.0;
        let right_x = C + p.eye_spacing / 2.0;
        let mut size = p.eye_size;

        let (mut left_mod, mut right_mod) = (0.0f64, 0.0f64);
        let mut size_mod = 1.0f64;
        match expr {
            "wide" => size_mod = 1.2,
            "narrow" => size_mod = 0.75,
            "tilt_up" => {
                left_mod = 3.0;
                right_mod = -3.0;
            }
            "tilt_down" => {
                left_mod = -3.0;
                right_mod = 3.0;
            }
            "asymmetric" => {
                left_mod = -2.0;
                size_mod = 0.9;
            }
            "squint" => {
                size_mod = 0.6;
                left_mod = 1.0;
                right_mod = -1.0;
            }
            "shock" => size_mod = 1.4,
            _ => {}
        }
        size *= size_mod;

        let anim = self.pulse();
        let mut parts: Vec<String> = Vec::new();

        for (ex, ey) in [(left_x, eye_y + left_mod), (right_x, eye_y + right_mod)] {
            match style {
                "holo_ring" => {
                    for i in 0..3 {
                        parts.push(format!(
                            "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1.5\" opacity=\"{}\"/>",
                            n(ex), n(ey), n(size - i as f64 * 3.0), n(1.0 - i as f64 * 0.3)
                        ));
                    }
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{glow}\" filter=\"url(#glow)\" {anim}/>",
                        n(ex), n(ey), n(size * 0.25)
                    ));
                }
                "matrix_scan" => {
                    let (w, h) = (size * 1.4, size * 0.7);
                    parts.push(format!(
                        "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1.5\" rx=\"2\"/>",
                        n(ex - w / 2.0), n(ey - h / 2.0), n(w), n(h)
                    ));
                    parts.push(format!(
                        "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"{glow}\" stroke-width=\"2\" filter=\"url(#glow)\" {anim}/>",
                        n(ex - w / 2.0 + 3.0), n(ey), n(ex + w / 2.0 - 3.0), n(ey)
                    ));
                }
                "data_orb" => {
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{glow}\" opacity=\"0.2\" filter=\"url(#glow)\"/>",
                        n(ex), n(ey), n(size)
                    ));
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\"/>",
                        n(ex), n(ey), n(size * 0.6)
                    ));
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{glow}\" filter=\"url(#glow)\" {anim}/>",
                        n(ex), n(ey), n(size * 0.25)
                    ));
                }
                "cyber_lens" => {
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"rgba(0,0,0,0.4)\" stroke=\"{primary}\" stroke-width=\"1.5\"/>",
                        n(ex), n(ey), n(size)
                    ));
                    parts.push(format!(
                        "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"{primary}\" stroke-width=\"0.5\" opacity=\"0.5\"/>",
                        n(ex - size), n(ey), n(ex + size), n(ey)
                    ));
                    parts.push(format!(
                        "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"{primary}\" stroke-width=\"0.5\" opacity=\"0.5\"/>",
                        n(ex), n(ey - size), n(ex), n(ey + size)
                    ));
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"3\" fill=\"{glow}\" filter=\"url(#glow)\" {anim}/>",
                        n(ex), n(ey)
                    ));
                }
                "visor_bar" => {
                    let (w, h) = (size * 2.0, size * 0.5);
                    parts.push(format!(
                        "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{glow}\" opacity=\"0.4\" filter=\"url(#glow)\" rx=\"2\"/>",
                        n(ex - w / 2.0), n(ey - h / 2.0), n(w), n(h)
                    ));
                    parts.push(format!(
                        "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\" rx=\"2\"/>",
                        n(ex - w / 2.0), n(ey - h / 2.0), n(w), n(h)
                    ));
                }
                "split_iris" => {
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1.5\"/>",
                        n(ex), n(ey), n(size)
                    ));
                    parts.push(format!(
                        "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"{glow}\" stroke-width=\"2\" filter=\"url(#glow)\"/>",
                        n(ex), n(ey - size), n(ex), n(ey + size)
                    ));
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"2\" fill=\"{accent}\" {anim}/>",
                        n(ex - size * 0.35), n(ey)
                    ));
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"2\" fill=\"{accent}\" {anim}/>",
                        n(ex + size * 0.35), n(ey)
                    ));
                }
                "compound" => {
                    for i in 0..6 {
                        let a = std::f64::consts::PI / 3.0 * i as f64;
                        parts.push(format!(
                            "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\"/>",
                            n(ex + size * 0.5 * a.cos()), n(ey + size * 0.5 * a.sin()), n(size * 0.3)
                        ));
                    }
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{glow}\" filter=\"url(#glow)\" {anim}/>",
                        n(ex), n(ey), n(size * 0.3)
                    ));
                }
                "target_lock" => {
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\" stroke-dasharray=\"4 2\"/>",
                        n(ex), n(ey), n(size)
                    ));
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"none\" stroke=\"{glow}\" stroke-width=\"1.5\"/>",
                        n(ex), n(ey), n(size * 0.5)
                    ));
                    for deg in [0.0f64, 90.0, 180.0, 270.0] {
                        let rad = deg.to_radians();
                        parts.push(format!(
                            "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"{primary}\" stroke-width=\"1.5\"/>",
                            n(ex + size * 0.6 * rad.cos()), n(ey + size * 0.6 * rad.sin()),
                            n(ex + size * 1.1 * rad.cos()), n(ey + size * 1.1 * rad.sin())
                        ));
                    }
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"2\" fill=\"{glow}\" filter=\"url(#glow)\" {anim}/>",
                        n(ex), n(ey)
                    ));
                }
                "energy_slit" => {
                    parts.push(format!(
                        "<ellipse cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"{}\" fill=\"{glow}\" opacity=\"0.6\" filter=\"url(#glow)\" {anim}/>",
                        n(ex), n(ey), n(size), n(size * 0.3)
                    ));
                    parts.push(format!(
                        "<ellipse cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"{}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1.5\"/>",
                        n(ex), n(ey), n(size), n(size * 0.3)
                    ));
                }
                "binary_dots" => {
                    let value = (p.pattern_seed as i64 + ex as i64).rem_euclid(16);
                    let bits = format!("{value:04b}");
                    for (i, bit) in bits.chars().enumerate() {
                        let fill = if bit == '1' { glow } else { "none" };
                        parts.push(format!(
                            "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{fill}\" stroke=\"{primary}\" stroke-width=\"1\"/>",
                            n(ex + (i as f64 - 1.5) * size * 0.5), n(ey), n(size * 0.2)
                        ));
                    }
                }
                "spiral" => {
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\"/>",
                        n(ex), n(ey), n(size)
                    ));
                    let mut path = format!("M{},{}", n(ex), n(ey));
                    for i in 0..20 {
                        let r = size * 0.05 * i as f64;
                        let a = i as f64 * 0.5;
                        path.push_str(&format!(
                            " L{},{}",
                            n(ex + r * a.cos()),
                            n(ey + r * a.sin())
                        ));
                    }
                    parts.push(format!(
                        "<path d=\"{path}\" fill=\"none\" stroke=\"{glow}\" stroke-width=\"1.5\" filter=\"url(#glow)\" {anim}/>"
                    ));
                }
                "crosshair" => {
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\"/>",
                        n(ex), n(ey), n(size)
                    ));
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"0.5\"/>",
                        n(ex), n(ey), n(size * 0.5)
                    ));
                    for (dx, dy) in [(-1.0f64, 0.0f64), (1.0, 0.0), (0.0, -1.0), (0.0, 1.0)] {
                        parts.push(format!(
                            "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"{glow}\" stroke-width=\"1.5\"/>",
                            n(ex + dx * size * 0.6), n(ey + dy * size * 0.6),
                            n(ex + dx * size * 1.2), n(ey + dy * size * 1.2)
                        ));
                    }
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"2\" fill=\"{glow}\" filter=\"url(#glow)\" {anim}/>",
                        n(ex), n(ey)
                    ));
                }
                "scanner_bar" => {
                    let w = size * 2.5;
                    parts.push(format!(
                        "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"6\" fill=\"{glow}\" opacity=\"0.5\" filter=\"url(#glow)\" rx=\"3\" {anim}/>",
                        n(ex - w / 2.0), n(ey - 3.0), n(w)
                    ));
                    parts.push(format!(
                        "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"6\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\" rx=\"3\"/>",
                        n(ex - w / 2.0), n(ey - 3.0), n(w)
                    ));
                }
                "diamond_core" => {
                    let pts = [
                        (ex, ey - size),
                        (ex + size, ey),
                        (ex, ey + size),
                        (ex - size, ey),
                    ];
                    let joined = pts
                        .iter()
                        .map(|(x, y)| format!("{},{}", n(*x), n(*y)))
                        .collect::<Vec<_>>()
                        .join(" ");
                    parts.push(format!(
                        "<polygon points=\"{joined}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1.5\"/>"
                    ));
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{glow}\" filter=\"url(#glow)\" {anim}/>",
                        n(ex), n(ey), n(size * 0.3)
                    ));
                }
                "pixel_grid" => {
                    let ps = size * 0.4;
                    for i in -1i64..2 {
                        for j in -1i64..2 {
                            let fill = if (i + j).rem_euclid(2) == 0 { glow } else { "none" };
                            parts.push(format!(
                                "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{fill}\" stroke=\"{primary}\" stroke-width=\"0.5\" opacity=\"0.8\"/>",
                                n(ex + i as f64 * ps - ps / 2.0),
                                n(ey + j as f64 * ps - ps / 2.0),
                                n(ps), n(ps)
                            ));
                        }
                    }
                }
                _ => {
                    // flame_eye
                    let flame = if self.animated { "class=\"flame\"" } else { "" };
                    parts.push(format!(
                        "<ellipse cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"{}\" fill=\"{glow}\" opacity=\"0.3\" filter=\"url(#glow)\" {flame}/>",
                        n(ex), n(ey), n(size * 0.8), n(size)
                    ));
                    parts.push(format!(
                        "<ellipse cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"{}\" fill=\"{glow}\" opacity=\"0.5\" {flame}/>",
                        n(ex), n(ey + size * 0.2), n(size * 0.5), n(size * 0.7)
                    ));
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{accent}\" filter=\"url(#glow)\" {anim}/>",
                        n(ex), n(ey + size * 0.3), n(size * 0.25)
                    ));
                }
            }
        }

        format!("<g class=\"eyes\">{}</g>", parts.join("\n"))
    }

    fn cheeks(&self) -> String {
        let p = self.p;
        let pattern = CHEEK_PATTERNS[p.cheek_pattern];
        if pattern == "none" {
            return String::new();
        }

        let primary = self.pal.primary;
        let glow = self.pal.glow;
        let y = C + 5.0;
        let left_x = C - p.face_width * 0.6;
        let right_x = C + p.face_width * 0.6;
        let anim = self.pulse();
        let mut parts: Vec<String> = Vec::new();

        for cx in [left_x, right_x] {
            let mirror: f64 = if cx < C { -1.0 } else { 1.0 };
            match pattern {
                "circuit_lines" => {
                    parts.push(format!(
                        "<path d=\"M{},{} L{},{} L{},{} L{},{}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\" opacity=\"0.7\"/>",
                        n(cx), n(y - 8.0),
                        n(cx + mirror * 10.0), n(y - 8.0),
                        n(cx + mirror * 10.0), n(y + 8.0),
                        n(cx + mirror * 5.0), n(y + 8.0)
                    ));
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"2\" fill=\"{glow}\" filter=\"url(#glow)\"/>",
                        n(cx + mirror * 5.0), n(y + 8.0)
                    ));
                }
                "tribal_bars" => {
                    for i in 0..3 {
                        parts.push(format!(
                            "<line x1=\"{}\" y1=\"{yy}\" x2=\"{}\" y2=\"{yy}\" stroke=\"{primary}\" stroke-width=\"2\" opacity=\"{}\"/>",
                            n(cx), n(cx + mirror * 12.0),
                            n(0.9 - i as f64 * 0.2),
                            yy = n(y - 6.0 + i as f64 * 6.0),
                        ));
                    }
                }
                "dots" => {
                    for i in 0..3 {
                        for j in 0..2 {
                            parts.push(format!(
                                "<circle cx=\"{}\" cy=\"{}\" r=\"1.5\" fill=\"{primary}\" opacity=\"0.7\"/>",
                                n(cx + mirror * i as f64 * 5.0), n(y - 4.0 + j as f64 * 8.0)
                            ));
                        }
                    }
                }
                "vents" => {
                    for i in 0..4 {
                        let x = if mirror > 0.0 { cx } else { cx - 8.0 };
                        parts.push(format!(
                            "<rect x=\"{}\" y=\"{}\" width=\"8\" height=\"2\" fill=\"{primary}\" opacity=\"0.6\"/>",
                            n(x), n(y - 8.0 + i as f64 * 5.0)
                        ));
                    }
                }
                "data_ports" => {
                    let x = if mirror < 0.0 { cx - 4.0 } else { cx };
                    parts.push(format!(
                        "<rect x=\"{}\" y=\"{}\" width=\"8\" height=\"12\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\" rx=\"1\"/>",
                        n(x), n(y - 6.0)
                    ));
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"2\" fill=\"{glow}\" filter=\"url(#glow)\" {anim}/>",
                        n(cx + mirror * 2.0), n(y)
                    ));
                }
                "scars" => {
                    parts.push(format!(
                        "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"{primary}\" stroke-width=\"1.5\" opacity=\"0.6\"/>",
                        n(cx - mirror * 5.0), n(y - 10.0), n(cx + mirror * 8.0), n(y + 10.0)
                    ));
                    parts.push(format!(
                        "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"{primary}\" stroke-width=\"1\" opacity=\"0.4\"/>",
                        n(cx), n(y - 8.0), n(cx + mirror * 10.0), n(y + 5.0)
                    ));
                }
                "glyphs" => {
                    let which = if cx < C { 0usize } else { 1 };
                    let symbol = SYMBOLS[(p.pattern_seed as usize + which) % SYMBOLS.len()];
                    parts.push(format!(
                        "<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" fill=\"{glow}\" font-size=\"12\" opacity=\"0.8\" {anim}>{symbol}</text>",
                        n(cx), n(y + 4.0)
                    ));
                }
                "binary_stream" => {
                    for i in 0..4 {
                        let ch = if (p.pattern_seed >> i) & 1 == 1 { '1' } else { '0' };
                        parts.push(format!(
                            "<text x=\"{}\" y=\"{}\" fill=\"{primary}\" font-family=\"monospace\" font-size=\"6\" opacity=\"0.7\">{ch}</text>",
                            n(cx + mirror * 4.0), n(y - 8.0 + i as f64 * 6.0)
                        ));
                    }
                }
                _ => {
                    // wave_lines
                    let mut path = format!("M{},{}", n(cx), n(y - 8.0));
                    for i in 0..4 {
                        let bump = if i % 2 == 1 { 3.0 } else { -3.0 };
                        path.push_str(&format!(
                            " Q{},{} {},{}",
                            n(cx + mirror * (i as f64 * 4.0 + 2.0)),
                            n(y - 8.0 + i as f64 * 4.0 + bump),
                            n(cx + mirror * (i as f64 * 4.0 + 4.0)),
                            n(y - 8.0 + i as f64 * 4.0)
                        ));
                    }
                    parts.push(format!(
                        "<path d=\"{path}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1.5\" opacity=\"0.6\"/>"
                    ));
                }
            }
        }

        format!("<g class=\"cheeks\">{}</g>", parts.join("\n"))
    }

    fn mouth(&self) -> String {
        let p = self.p;
        let style = MOUTH_STYLES[p.mouth_style];
        let primary = self.pal.primary;
        let glow = self.pal.glow;
        let accent = self.pal.accent;
        let y = C + p.face_height * 0.4;
        let w = p.mouth_width;
        let anim = self.pulse();
        let mut parts: Vec<String> = Vec::new();

        match style {
            "data_stream" => {
                for i in 0..5 {
                    let ch = if (p.pattern_seed >> i) & 1 == 1 { '1' } else { '0' };
                    parts.push(format!(
                        "<text x=\"{}\" y=\"{}\" fill=\"{primary}\" font-family=\"monospace\" font-size=\"9\" style=\"animation-delay:{}s\" {anim}>{ch}</text>",
                        n(C - w / 2.0 + i as f64 * w / 4.0), n(y + 3.0), n(i as f64 * 0.15)
                    ));
                }
            }
            "waveform" => {
                let mut rng = Mt19937::new(p.pattern_seed as u32);
                let mut path = format!("M{},{}", n(C - w / 2.0), n(y));
                for i in 0..10 {
                    let sign = if i % 2 == 1 { 1.0 } else { -1.0 };
                    let dy = rng.uniform(3.0, 8.0) * sign;
                    path.push_str(&format!(
                        " L{},{}",
                        n(C - w / 2.0 + i as f64 * w / 9.0),
                        n(y + dy)
                    ));
                }
                path.push_str(&format!(" L{},{}", n(C + w / 2.0), n(y)));
                parts.push(format!(
                    "<path d=\"{path}\" fill=\"none\" stroke=\"{glow}\" stroke-width=\"2\" filter=\"url(#glow)\" {anim}/>"
                ));
            }
            "minimal" => parts.push(format!(
                "<line x1=\"{}\" y1=\"{y0}\" x2=\"{}\" y2=\"{y0}\" stroke=\"{glow}\" stroke-width=\"2.5\" stroke-linecap=\"round\" filter=\"url(#glow)\" {anim}/>",
                n(C - w / 2.0), n(C + w / 2.0), y0 = n(y)
            )),
            "grid" => {
                for i in 0..3 {
                    parts.push(format!(
                        "<line x1=\"{}\" y1=\"{yy}\" x2=\"{}\" y2=\"{yy}\" stroke=\"{primary}\" stroke-width=\"1.5\" opacity=\"0.7\"/>",
                        n(C - w / 3.0), n(C + w / 3.0),
                        yy = n(y - 3.0 + i as f64 * 3.0)
                    ));
                }
                for i in 0..4 {
                    parts.push(format!(
                        "<line x1=\"{xx}\" y1=\"{}\" x2=\"{xx}\" y2=\"{}\" stroke=\"{accent}\" stroke-width=\"1\" opacity=\"0.5\"/>",
                        n(y - 3.0), n(y + 3.0),
                        xx = n(C - w / 3.0 + i as f64 * w / 4.5)
                    ));
                }
            }
            "vent" => {
                parts.push(format!(
                    "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"8\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\" rx=\"2\"/>",
                    n(C - w / 2.0), n(y - 4.0), n(w)
                ));
                for i in 0..5 {
                    let x = C - w / 2.0 + 4.0 + i as f64 * (w - 8.0) / 4.0;
                    parts.push(format!(
                        "<line x1=\"{x0}\" y1=\"{}\" x2=\"{x0}\" y2=\"{}\" stroke=\"{primary}\" stroke-width=\"1.5\"/>",
                        n(y - 2.0), n(y + 2.0), x0 = n(x)
                    ));
                }
            }
            "speaker" => {
                parts.push(format!(
                    "<ellipse cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"5\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1.5\"/>",
                    n(C), n(y), n(w / 2.0)
                ));
                parts.push(format!(
                    "<ellipse cx=\"{}\" cy=\"{}\" rx=\"{}\" ry=\"2.5\" fill=\"{glow}\" opacity=\"0.4\" filter=\"url(#glow)\" {anim}/>",
                    n(C), n(y), n(w / 4.0)
                ));
            }
            "binary" => {
                let bits = format!("{:08b}", p.pattern_seed % 256);
                parts.push(format!(
                    "<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" fill=\"{primary}\" font-family=\"monospace\" font-size=\"7\">{bits}</text>",
                    n(C), n(y + 3.0)
                ));
            }
            "smile_arc" => parts.push(format!(
                "<path d=\"M{},{y2} Q{},{} {},{y2}\" fill=\"none\" stroke=\"{glow}\" stroke-width=\"2\" stroke-linecap=\"round\" filter=\"url(#glow)\" {anim}/>",
                n(C - w / 2.0), n(C), n(y + 8.0), n(C + w / 2.0), y2 = n(y - 2.0)
            )),
            "glyph" => {
                let symbol = SYMBOLS[p.pattern_seed as usize % SYMBOLS.len()];
                parts.push(format!(
                    "<text x=\"{}\" y=\"{}\" text-anchor=\"middle\" fill=\"{glow}\" font-size=\"14\" filter=\"url(#glow)\" {anim}>{symbol}</text>",
                    n(C), n(y + 5.0)
                ));
            }
            "silent" => parts.push(format!(
                "<line x1=\"{}\" y1=\"{y0}\" x2=\"{}\" y2=\"{y0}\" stroke=\"{primary}\" stroke-width=\"1\" opacity=\"0.4\"/>",
                n(C - w / 4.0), n(C + w / 4.0), y0 = n(y)
            )),
            "pixel_smile" => {
                let ps = 4.0;
                for i in -2i64..3 {
                    let dy = if i.abs() < 2 { 0.0 } else { -ps };
                    parts.push(format!(
                        "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{glow}\" opacity=\"0.8\"/>",
                        n(C + i as f64 * ps - ps / 2.0), n(y + dy), n(ps), n(ps)
                    ));
                }
            }
            "teeth_grid" => {
                let tw = w / 6.0;
                for i in 0..6 {
                    parts.push(format!(
                        "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"6\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\" rx=\"1\"/>",
                        n(C - w / 2.0 + i as f64 * tw + 1.0), n(y - 3.0), n(tw - 2.0)
                    ));
                }
            }
            "equalizer" => {
                let mut rng = Mt19937::new(p.pattern_seed as u32);
                for i in 0..8 {
                    let h = rng.uniform(3.0, 10.0);
                    parts.push(format!(
                        "<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{glow}\" opacity=\"0.7\" {anim}/>",
                        n(C - w / 2.0 + i as f64 * w / 8.0 + 1.0), n(y - h / 2.0),
                        n(w / 8.0 - 2.0), n(h)
                    ));
                }
            }
            _ => {
                // circuit_mouth
                parts.push(format!(
                    "<line x1=\"{}\" y1=\"{y0}\" x2=\"{}\" y2=\"{y0}\" stroke=\"{primary}\" stroke-width=\"1.5\"/>",
                    n(C - w / 2.0), n(C + w / 2.0), y0 = n(y)
                ));
                for i in 0..3 {
                    let x = C - w / 3.0 + i as f64 * w / 3.0;
                    parts.push(format!(
                        "<circle cx=\"{}\" cy=\"{}\" r=\"2\" fill=\"{glow}\" {anim}/>",
                        n(x), n(y)
                    ));
                }
            }
        }

        format!("<g class=\"mouth\">{}</g>", parts.join("\n"))
    }

    fn chin(&self) -> String {
        let p = self.p;
        let feature = CHIN_FEATURES[p.chin_feature];
        if feature == "none" {
            return String::new();
        }

        let primary = self.pal.primary;
        let glow = self.pal.glow;
        let y = C + p.face_height * 0.7;
        let anim = self.pulse();

        match feature {
            "vent" => {
                let lines: Vec<String> = (0..4)
                    .map(|i| {
                        let x = C - 12.0 + i as f64 * 8.0;
                        format!(
                            "<line x1=\"{x0}\" y1=\"{}\" x2=\"{x0}\" y2=\"{}\" stroke=\"{primary}\" stroke-width=\"2\" opacity=\"0.6\"/>",
                            n(y), n(y + 6.0), x0 = n(x)
                        )
                    })
                    .collect();
                format!("<g class=\"chin\">{}</g>", lines.join(""))
            }
            "light_bar" => format!(
                "<rect x=\"{}\" y=\"{}\" width=\"30\" height=\"4\" fill=\"{glow}\" opacity=\"0.5\" filter=\"url(#glow)\" rx=\"2\" {anim}/>",
                n(C - 15.0), n(y)
            ),
            "beard_lines" => {
                let lines: Vec<String> = (0..5)
                    .map(|i| {
                        let x = C - 10.0 + i as f64 * 5.0;
                        let extra = if i % 2 == 1 { 3.0 } else { 0.0 };
                        format!(
                            "<line x1=\"{x0}\" y1=\"{}\" x2=\"{x0}\" y2=\"{}\" stroke=\"{primary}\" stroke-width=\"1\" opacity=\"0.5\"/>",
                            n(y), n(y + 10.0 + extra), x0 = n(x)
                        )
                    })
                    .collect();
                format!("<g class=\"chin\">{}</g>", lines.join(""))
            }
            "energy_core" => format!(
                "<circle cx=\"{c}\" cy=\"{y3}\" r=\"6\" fill=\"{glow}\" opacity=\"0.3\" filter=\"url(#glow)\"/><circle cx=\"{c}\" cy=\"{y3}\" r=\"3\" fill=\"{glow}\" filter=\"url(#glow-strong)\" {anim}/>",
                c = n(C), y3 = n(y + 3.0)
            ),
            "port" => format!(
                "<rect x=\"{}\" y=\"{y0}\" width=\"12\" height=\"8\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\" rx=\"1\"/><rect x=\"{}\" y=\"{y2}\" width=\"6\" height=\"4\" fill=\"{glow}\" opacity=\"0.5\"/>",
                n(C - 6.0), n(C - 3.0), y0 = n(y), y2 = n(y + 2.0)
            ),
            "speaker_grille" => {
                let lines: Vec<String> = (0..4)
                    .map(|i| {
                        format!(
                            "<line x1=\"{}\" y1=\"{yy}\" x2=\"{}\" y2=\"{yy}\" stroke=\"{primary}\" stroke-width=\"1.5\" opacity=\"0.6\"/>",
                            n(C - 10.0), n(C + 10.0),
                            yy = n(y + i as f64 * 3.0)
                        )
                    })
                    .collect();
                format!("<g class=\"chin\">{}</g>", lines.join(""))
            }
            _ => format!(
                // data_jack
                "<rect x=\"{}\" y=\"{y0}\" width=\"16\" height=\"10\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1.5\" rx=\"2\"/><circle cx=\"{}\" cy=\"{y5}\" r=\"2\" fill=\"{glow}\" {anim}/><circle cx=\"{}\" cy=\"{y5}\" r=\"2\" fill=\"{glow}\" {anim}/>",
                n(C - 8.0), n(C - 3.0), n(C + 3.0), y0 = n(y), y5 = n(y + 5.0)
            ),
        }
    }

    fn side_accessories(&self) -> String {
        let p = self.p;
        let accessory = SIDE_ACCESSORIES[p.side_accessory];
        if accessory == "none" {
            return String::new();
        }

        let primary = self.pal.primary;
        let glow = self.pal.glow;
        let size = 10.0 * p.accessory_size;
        let y = C - 5.0;
        let anim = self.pulse();
        let mut parts: Vec<String> = Vec::new();

        let both = matches!(
            accessory,
            "earpiece_both" | "antenna_side" | "blade" | "coil" | "jack" | "wing_fins" | "data_nodes"
        );
        let left = accessory == "earpiece_left" || both;
        let right = accessory == "earpiece_right" || both;

        for (side, draw) in [(-1.0f64, left), (1.0f64, right)] {
            if !draw {
                continue;
            }
            let x = C + side * (p.face_width + 8.0);

            if accessory.starts_with("earpiece") {
                parts.push(format!(
                    "<ellipse cx=\"{}\" cy=\"{}\" rx=\"4\" ry=\"{}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1.5\"/>",
                    n(x), n(y), n(size * 0.8)
                ));
                parts.push(format!(
                    "<circle cx=\"{}\" cy=\"{}\" r=\"2\" fill=\"{glow}\" filter=\"url(#glow)\" {anim}/>",
                    n(x), n(y)
                ));
            } else {
                match accessory {
                    "antenna_side" => {
                        parts.push(format!(
                            "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"{primary}\" stroke-width=\"1.5\"/>",
                            n(x), n(y), n(x + side * size), n(y - size * 1.5)
                        ));
                        parts.push(format!(
                            "<circle cx=\"{}\" cy=\"{}\" r=\"3\" fill=\"{glow}\" filter=\"url(#glow)\" {anim}/>",
                            n(x + side * size), n(y - size * 1.5)
                        ));
                    }
                    "blade" => {
                        let pts = [
                            (x, y - size),
                            (x + side * size * 0.5, y),
                            (x, y + size),
                        ];
                        let joined = pts
                            .iter()
                            .map(|(px, py)| format!("{},{}", n(*px), n(*py)))
                            .collect::<Vec<_>>()
                            .join(" ");
                        parts.push(format!(
                            "<polygon points=\"{joined}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1.5\"/>"
                        ));
                        parts.push(format!(
                            "<line x1=\"{x0}\" y1=\"{}\" x2=\"{x0}\" y2=\"{}\" stroke=\"{glow}\" stroke-width=\"1\" filter=\"url(#glow)\"/>",
                            n(y - size + 2.0), n(y + size - 2.0), x0 = n(x)
                        ));
                    }
                    "coil" => {
                        for i in 0..4 {
                            parts.push(format!(
                                "<ellipse cx=\"{}\" cy=\"{}\" rx=\"3\" ry=\"2\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\" opacity=\"{}\"/>",
                                n(x + side * 3.0), n(y - 6.0 + i as f64 * 4.0),
                                n(1.0 - i as f64 * 0.2)
                            ));
                        }
                    }
                    "jack" => {
                        let jx = if side < 0.0 { x - 3.0 } else { x };
                        parts.push(format!(
                            "<rect x=\"{}\" y=\"{}\" width=\"6\" height=\"8\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\" rx=\"1\"/>",
                            n(jx), n(y - 4.0)
                        ));
                        parts.push(format!(
                            "<circle cx=\"{}\" cy=\"{}\" r=\"2\" fill=\"{glow}\" {anim}/>",
                            n(x + side * 1.5), n(y)
                        ));
                    }
                    "wing_fins" => {
                        let pts = [
                            (x, y - size),
                            (x + side * size * 0.8, y - size * 0.5),
                            (x + side * size * 0.6, y + size * 0.5),
                            (x, y + size * 0.3),
                        ];
                        let joined = pts
                            .iter()
                            .map(|(px, py)| format!("{},{}", n(*px), n(*py)))
                            .collect::<Vec<_>>()
                            .join(" ");
                        parts.push(format!(
                            "<polygon points=\"{joined}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1.5\"/>"
                        ));
                        parts.push(format!(
                            "<line x1=\"{}\" y1=\"{}\" x2=\"{}\" y2=\"{}\" stroke=\"{glow}\" stroke-width=\"1\" filter=\"url(#glow)\"/>",
                            n(x), n(y - size * 0.3), n(x + side * size * 0.5), n(y)
                        ));
                    }
                    _ => {
                        // data_nodes
                        for i in 0..3 {
                            let nx = x + side * (5.0 + i as f64 * 4.0);
                            let ny = y - 8.0 + i as f64 * 8.0;
                            parts.push(format!(
                                "<circle cx=\"{}\" cy=\"{}\" r=\"3\" fill=\"{glow}\" filter=\"url(#glow)\" class=\"float\" style=\"animation-delay:{}s\"/>",
                                n(nx), n(ny), n(i as f64 * 0.2)
                            ));
                        }
                    }
                }
            }
        }

        format!("<g class=\"side-accessories\">{}</g>", parts.join("\n"))
    }

    fn crown(&self) -> String {
        let p = self.p;
        let crown = CROWN_STYLES[p.crown_style];
        if crown == "none" {
            return String::new();
        }

        let primary = self.pal.primary;
        let glow = self.pal.glow;
        let accent = self.pal.accent;
        let y = C - p.face_height - 5.0;
        let size = 15.0 * p.crown_size;
        let anim = self.pulse();
        let float = if self.animated { "class=\"float\"" } else { "" };

        match crown {
            "antenna_single" => format!(
                "<line x1=\"{c}\" y1=\"{y0}\" x2=\"{c}\" y2=\"{yt}\" stroke=\"{primary}\" stroke-width=\"2\"/><circle cx=\"{c}\" cy=\"{yt}\" r=\"4\" fill=\"{glow}\" filter=\"url(#glow-strong)\" {anim}/>",
                c = n(C), y0 = n(y), yt = n(y - size * 1.5)
            ),
            "antenna_dual" => format!(
                "<line x1=\"{xl}\" y1=\"{y0}\" x2=\"{xlt}\" y2=\"{yt}\" stroke=\"{primary}\" stroke-width=\"2\"/><line x1=\"{xr}\" y1=\"{y0}\" x2=\"{xrt}\" y2=\"{yt}\" stroke=\"{primary}\" stroke-width=\"2\"/><circle cx=\"{xlt}\" cy=\"{yt}\" r=\"3\" fill=\"{glow}\" filter=\"url(#glow)\" {anim}/><circle cx=\"{xrt}\" cy=\"{yt}\" r=\"3\" fill=\"{glow}\" filter=\"url(#glow)\" {anim}/>",
                xl = n(C - 10.0), xr = n(C + 10.0), xlt = n(C - 15.0), xrt = n(C + 15.0),
                y0 = n(y), yt = n(y - size * 1.2)
            ),
            "horns" => format!(
                "<path d=\"M{xl20},{y5} Q{xl25},{ys} {xl15},{yt}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"3\" stroke-linecap=\"round\"/><path d=\"M{xr20},{y5} Q{xr25},{ys} {xr15},{yt}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"3\" stroke-linecap=\"round\"/><circle cx=\"{xl15}\" cy=\"{yt}\" r=\"2\" fill=\"{glow}\" filter=\"url(#glow)\"/><circle cx=\"{xr15}\" cy=\"{yt}\" r=\"2\" fill=\"{glow}\" filter=\"url(#glow)\"/>",
                xl20 = n(C - 20.0), xl25 = n(C - 25.0), xl15 = n(C - 15.0),
                xr20 = n(C + 20.0), xr25 = n(C + 25.0), xr15 = n(C + 15.0),
                y5 = n(y + 5.0), ys = n(y - size), yt = n(y - size * 1.5)
            ),
            "halo" => format!(
                "<ellipse cx=\"{c}\" cy=\"{yh}\" rx=\"{rx}\" ry=\"{ry}\" fill=\"none\" stroke=\"{glow}\" stroke-width=\"2\" filter=\"url(#glow)\" {anim}/><ellipse cx=\"{c}\" cy=\"{yh}\" rx=\"{rx}\" ry=\"{ry}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"0.5\" opacity=\"0.5\"/>",
                c = n(C), yh = n(y - size * 0.3),
                rx = n(p.face_width * 0.9), ry = n(size * 0.4)
            ),
            "mohawk_data" => {
                let mut rng = Mt19937::new(p.effect_seed as u32);
                let chars: Vec<String> = (0..7)
                    .map(|i| {
                        let ch = rng.choice_char(MATRIX_CHARS);
                        let lift = 0.5 + 0.5 * (1.0 - (i as f64 - 3.0).abs() / 3.0);
                        format!(
                            "<text x=\"{}\" y=\"{}\" fill=\"{glow}\" font-family=\"monospace\" font-size=\"8\" opacity=\"0.8\">{ch}</text>",
                            n(C - 15.0 + i as f64 * 5.0), n(y - size * lift)
                        )
                    })
                    .collect();
                format!("<g {float}>{}</g>", chars.join(""))
            }
            "floating_orbs" => {
                let orbs: Vec<String> = (0..5)
                    .map(|i| {
                        let lift = 0.3 + 0.4 * (1.0 - (i as f64 - 2.0).abs() / 2.0);
                        format!(
                            "<circle cx=\"{}\" cy=\"{}\" r=\"4\" fill=\"{glow}\" filter=\"url(#glow)\" class=\"float\" style=\"animation-delay:{}s\"/>",
                            n(C - 20.0 + i as f64 * 10.0), n(y - size * lift), n(i as f64 * 0.3)
                        )
                    })
                    .collect();
                format!("<g>{}</g>", orbs.join(""))
            }
            "energy_spikes" => {
                let spikes: Vec<String> = (0..5)
                    .map(|i| {
                        let lift = 0.6 + 0.4 * (1.0 - (i as f64 - 2.0).abs() / 2.0);
                        format!(
                            "<line x1=\"{x0}\" y1=\"{}\" x2=\"{x0}\" y2=\"{}\" stroke=\"{glow}\" stroke-width=\"2\" filter=\"url(#glow)\" {anim}/>",
                            n(y), n(y - size * lift),
                            x0 = n(C - 16.0 + i as f64 * 8.0)
                        )
                    })
                    .collect();
                format!("<g>{}</g>", spikes.join(""))
            }
            "circuit_crown" => format!(
                "<path d=\"M{xm25},{y0} L{xm20},{y08} L{xm10},{y05} L{c},{ys} L{xp10},{y05} L{xp20},{y08} L{xp25},{y0}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1.5\"/><circle cx=\"{c}\" cy=\"{ys}\" r=\"3\" fill=\"{glow}\" filter=\"url(#glow)\" {anim}/><circle cx=\"{xm20}\" cy=\"{y08}\" r=\"2\" fill=\"{accent}\"/><circle cx=\"{xp20}\" cy=\"{y08}\" r=\"2\" fill=\"{accent}\"/>",
                xm25 = n(C - 25.0), xm20 = n(C - 20.0), xm10 = n(C - 10.0),
                xp10 = n(C + 10.0), xp20 = n(C + 20.0), xp25 = n(C + 25.0),
                c = n(C), y0 = n(y), y08 = n(y - size * 0.8), y05 = n(y - size * 0.5),
                ys = n(y - size)
            ),
            "visor_top" => format!(
                "<rect x=\"{x0}\" y=\"{y0}\" width=\"{w}\" height=\"{h}\" fill=\"{glow}\" opacity=\"0.3\" filter=\"url(#glow)\" rx=\"2\"/><rect x=\"{x0}\" y=\"{y0}\" width=\"{w}\" height=\"{h}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1\" rx=\"2\"/>",
                x0 = n(C - p.face_width * 0.7), y0 = n(y - size * 0.3),
                w = n(p.face_width * 1.4), h = n(size * 0.5)
            ),
            "flames" => {
                let mut rng = Mt19937::new(p.effect_seed as u32);
                let flames: Vec<String> = (0..7)
                    .map(|i| {
                        let cy_h = size * (0.5 + rng.uniform(0.3, 0.7)) / 2.0;
                        let ry = size * (0.5 + rng.uniform(0.3, 0.7)) / 2.0;
                        format!(
                            "<ellipse cx=\"{}\" cy=\"{}\" rx=\"4\" ry=\"{}\" fill=\"{glow}\" opacity=\"0.4\" filter=\"url(#glow)\" class=\"flame\"/>",
                            n(C - 18.0 + i as f64 * 6.0), n(y - cy_h), n(ry)
                        )
                    })
                    .collect();
                format!("<g>{}</g>", flames.join(""))
            }
            "crystals" => {
                let crystals: Vec<String> = (0..5)
                    .map(|i| {
                        let x = C - 16.0 + i as f64 * 8.0;
                        let h = size * (0.5 + 0.5 * (1.0 - (i as f64 - 2.0).abs() / 2.0));
                        let pts = [
                            (x, y),
                            (x - 4.0, y - h * 0.3),
                            (x, y - h),
                            (x + 4.0, y - h * 0.3),
                        ];
                        let joined = pts
                            .iter()
                            .map(|(px, py)| format!("{},{}", n(*px), n(*py)))
                            .collect::<Vec<_>>()
                            .join(" ");
                        format!(
                            "<polygon points=\"{joined}\" fill=\"{glow}\" opacity=\"0.3\" stroke=\"{primary}\" stroke-width=\"1\"/>"
                        )
                    })
                    .collect();
                format!("<g>{}</g>", crystals.join("\n"))
            }
            "crown_peaks" => {
                let pts = [
                    (C - 25.0, y),
                    (C - 20.0, y - size * 0.6),
                    (C - 15.0, y - size * 0.3),
                    (C - 10.0, y - size * 0.9),
                    (C - 5.0, y - size * 0.3),
                    (C, y - size * 1.1),
                    (C + 5.0, y - size * 0.3),
                    (C + 10.0, y - size * 0.9),
                    (C + 15.0, y - size * 0.3),
                    (C + 20.0, y - size * 0.6),
                    (C + 25.0, y),
                ];
                let joined = pts
                    .iter()
                    .map(|(px, py)| format!("{},{}", n(*px), n(*py)))
                    .collect::<Vec<_>>()
                    .join(" ");
                format!(
                    "<polygon points=\"{joined}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"2\"/><circle cx=\"{c}\" cy=\"{yt}\" r=\"3\" fill=\"{glow}\" filter=\"url(#glow)\" {anim}/>",
                    c = n(C), yt = n(y - size * 1.1)
                )
            }
            "satellite" => format!(
                "<ellipse cx=\"{c}\" cy=\"{yh}\" rx=\"{rx}\" ry=\"{ry}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1.5\"/><line x1=\"{c}\" y1=\"{y0}\" x2=\"{c}\" y2=\"{ys}\" stroke=\"{primary}\" stroke-width=\"2\"/><circle cx=\"{c}\" cy=\"{ys}\" r=\"4\" fill=\"{glow}\" filter=\"url(#glow)\" {anim}/>",
                c = n(C), yh = n(y - size * 0.5), rx = n(size * 1.2), ry = n(size * 0.3),
                y0 = n(y), ys = n(y - size)
            ),
            "wings" => format!(
                "<path d=\"M{xm5},{y0} Q{xm20},{y05} {xm30},{y08} Q{xm20},{y03} {xm5},{y5}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1.5\"/><path d=\"M{xp5},{y0} Q{xp20},{y05} {xp30},{y08} Q{xp20},{y03} {xp5},{y5}\" fill=\"none\" stroke=\"{primary}\" stroke-width=\"1.5\"/><circle cx=\"{xm30}\" cy=\"{y08}\" r=\"2\" fill=\"{glow}\" filter=\"url(#glow)\"/><circle cx=\"{xp30}\" cy=\"{y08}\" r=\"2\" fill=\"{glow}\" filter=\"url(#glow)\"/>",
                xm5 = n(C - 5.0), xm20 = n(C - 20.0), xm30 = n(C - 30.0),
                xp5 = n(C + 5.0), xp20 = n(C + 20.0), xp30 = n(C + 30.0),
                y0 = n(y), y5 = n(y + 5.0),
                y05 = n(y - size * 0.5), y08 = n(y - size * 0.8), y03 = n(y - size * 0.3)
            ),
            _ => {
                // data_cloud
                let mut rng = Mt19937::new(p.effect_seed as u32);
                let cloud: Vec<String> = (0..8)
                    .map(|i| {
                        let cx = C - 20.0 + rng.uniform(0.0, 40.0);
                        let cy = y - size * 0.5 + rng.uniform(-size * 0.3, size * 0.3);
                        let ch = rng.choice_char(MATRIX_CHARS);
                        format!(
                            "<text x=\"{}\" y=\"{}\" fill=\"{glow}\" font-family=\"monospace\" font-size=\"8\" opacity=\"0.6\" class=\"float\" style=\"animation-delay:{}s\">{ch}</text>",
                            n(cx), n(cy), n(i as f64 * 0.2)
                        )
                    })
                    .collect();
                format!("<g>{}</g>", cloud.join("\n"))
            }
        }
    }

    fn scan_overlay(&self) -> String {
        format!(
            "<rect x=\"0\" y=\"0\" width=\"{CANVAS_SIZE}\" height=\"3\" fill=\"{}\" opacity=\"0.15\"><animate attributeName=\"y\" from=\"-10\" to=\"{}\" dur=\"{}s\" repeatCount=\"indefinite\"/></rect>",
            self.pal.primary,
            CANVAS_SIZE + 10,
            n(self.p.animation_speed * 2.0)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::FaceParams;

    fn params_for(key: [u8; 32]) -> FaceParams {
        FaceParams::from_key(&key)
    }

    #[test]
    fn test_render_deterministic() {
        let p = params_for([0x5a; 32]);
        assert_eq!(render(&p, 200, true), render(&p, 200, true));
        assert_eq!(render(&p, 200, false), render(&p, 200, false));
    }

    #[test]
    fn test_render_well_formed() {
        for fill in 0u8..16 {
            let p = params_for([fill.wrapping_mul(17); 32]);
            let svg = render(&p, 200, true);
            assert!(svg.starts_with("<svg "));
            assert!(svg.ends_with("</svg>"));
            assert!(svg.contains("viewBox=\"0 0 200 200\""));
        }
    }

    #[test]
    fn test_static_render_has_no_animations() {
        let p = params_for([0x33; 32]);
        let svg = render(&p, 200, false);
        assert!(!svg.contains("<style>"));
        assert!(!svg.contains("<animate"));
    }

    #[test]
    fn test_size_attribute_only_scales_viewport() {
        let p = params_for([0x44; 32]);
        let small = render(&p, 128, false);
        let large = render(&p, 512, false);
        assert!(small.contains("width=\"128\""));
        assert!(large.contains("width=\"512\""));
        // The geometry itself is identical.
        let strip = |s: &str| s.splitn(2, '>').nth(1).unwrap().to_string();
        assert_eq!(strip(&small), strip(&large));
    }

    #[test]
    fn test_every_style_variant_renders() {
        // Drive each categorical byte through its full table (the largest
        // table has 20 entries).
        for byte_idx in 0..12usize {
            for value in 0u8..20 {
                let mut key = [7u8; 32];
                key[byte_idx] = value;
                let p = params_for(key);
                let svg = render(&p, 200, true);
                assert!(svg.ends_with("</svg>"));
            }
        }
    }

    #[test]
    fn test_seed_isolation_across_subcomponents() {
        // Two keys that differ only in circuit_seed must differ only in
        // the circuit background; with a non-circuit background they
        // render identically.
        let mut a = [0u8; 32];
        a[10] = 4; // bg_style "void"
        let mut b = a;
        b[26] = 0xff; // circuit_seed
        let pa = params_for(a);
        let pb = params_for(b);
        assert_eq!(render(&pa, 200, true), render(&pb, 200, true));
    }
}
