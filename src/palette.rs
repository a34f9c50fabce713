//! Background-aware text palette derivation.
//!
//! Given a background image, pick text colors that stay readable on top of
//! it: a warm accent for the competition line when the image contains one,
//! dark neutrals for everything else, with lightness nudged until WCAG
//! contrast targets are met. Derivation is best-effort; any failure falls
//! back to the fixed default palette.

use std::collections::HashMap;

use tracing::debug;

use crate::style::{HexColor, StyleOverrides, TextRole};

/// Contrast ratio required for the emphasis role (competition line).
const EMPHASIS_CONTRAST: f64 = 7.0;
/// Contrast ratio required for body roles.
const BODY_CONTRAST: f64 = 4.5;
/// Lightness step per adjustment attempt, in HSL percentage units.
const LIGHTNESS_STEP: f64 = 5.0;
const MAX_ATTEMPTS: usize = 20;

/// Upper bound on dominant colors extracted from a background.
const PALETTE_SIZE: usize = 5;
/// Sampling grid: at most this many samples per image axis.
const SAMPLE_GRID: u32 = 64;

/// One derived color per text role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TextPalette {
    pub competition: HexColor,
    pub date_time: HexColor,
    pub team_name: HexColor,
    pub score: HexColor,
}

impl TextPalette {
    pub fn role(&self, role: TextRole) -> HexColor {
        match role {
            TextRole::Competition => self.competition,
            TextRole::DateTime => self.date_time,
            TextRole::TeamName => self.team_name,
            TextRole::Score => self.score,
        }
    }

    /// Express this palette as color overrides for the style resolver.
    pub fn to_overrides(&self) -> StyleOverrides {
        let mut overrides = StyleOverrides::default();
        for role in TextRole::ALL {
            overrides.colors.insert(role, self.role(role).to_string());
        }
        overrides
    }
}

impl Default for TextPalette {
    fn default() -> Self {
        Self {
            competition: HexColor::from_rgb(0x99, 0x1B, 0x1B),
            date_time: HexColor::from_rgb(0x1F, 0x29, 0x37),
            team_name: HexColor::from_rgb(0x1F, 0x29, 0x37),
            score: HexColor::from_rgb(0x1F, 0x29, 0x37),
        }
    }
}

/// Derive a text palette from encoded image bytes. `None` when the bytes do
/// not decode to an image with sampleable pixels.
pub fn try_derive_palette(image_bytes: &[u8]) -> Option<TextPalette> {
    let image = match image::load_from_memory(image_bytes) {
        Ok(img) => img.to_rgb8(),
        Err(err) => {
            debug!(error = %err, "palette derivation: decode failed");
            return None;
        }
    };

    let dominant = dominant_colors(&image);
    if dominant.is_empty() {
        return None;
    }
    let bg_luminance = mean_luminance(&image);

    Some(derive_from_candidates(&dominant, bg_luminance))
}

/// As [`try_derive_palette`], falling back to the default palette on failure.
pub fn derive_palette(image_bytes: &[u8]) -> TextPalette {
    try_derive_palette(image_bytes).unwrap_or_default()
}

fn derive_from_candidates(dominant: &[HexColor], bg_luminance: f64) -> TextPalette {
    let defaults = TextPalette::default();

    // Competition: a warm, saturated hue from the image if present.
    let warm = dominant.iter().copied().find(|c| {
        let (h, s, _) = rgb_to_hsl(*c);
        (h >= 350.0 || h <= 10.0) && s >= 50.0
    });
    let competition_base = warm.unwrap_or(defaults.competition);
    let competition = adjust_for_contrast(competition_base, bg_luminance, EMPHASIS_CONTRAST)
        .unwrap_or(defaults.competition);

    // Body roles: the darkest dominant color nudged toward readability.
    let darkest = dominant
        .iter()
        .copied()
        .min_by(|a, b| {
            let la = rgb_to_hsl(*a).2;
            let lb = rgb_to_hsl(*b).2;
            la.partial_cmp(&lb).unwrap_or(std::cmp::Ordering::Equal)
        })
        .unwrap_or(defaults.team_name);
    let body =
        adjust_for_contrast(darkest, bg_luminance, BODY_CONTRAST).unwrap_or(defaults.team_name);

    TextPalette {
        competition,
        date_time: body,
        team_name: body,
        score: body,
    }
}

/// Memoizes successful derivations per image reference so re-selecting a
/// background never re-decodes.
#[derive(Debug, Default)]
pub struct PaletteCache {
    entries: HashMap<String, TextPalette>,
}

impl PaletteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_derive(&mut self, key: &str, image_bytes: &[u8]) -> TextPalette {
        if let Some(palette) = self.entries.get(key) {
            return *palette;
        }
        match try_derive_palette(image_bytes) {
            Some(palette) => {
                self.entries.insert(key.to_string(), palette);
                palette
            }
            // A failed decode is not pinned; a later select can retry.
            None => TextPalette::default(),
        }
    }

    pub fn peek(&self, key: &str) -> Option<TextPalette> {
        self.entries.get(key).copied()
    }
}

/// WCAG contrast ratio between two relative luminances.
pub fn contrast_ratio(l1: f64, l2: f64) -> f64 {
    let (hi, lo) = if l1 >= l2 { (l1, l2) } else { (l2, l1) };
    (hi + 0.05) / (lo + 0.05)
}

/// Step a color's lightness toward the readable side of the background until
/// the target contrast is met. Returns `None` when the budget runs out.
fn adjust_for_contrast(color: HexColor, bg_luminance: f64, target: f64) -> Option<HexColor> {
    let darken = bg_luminance >= 0.5;
    let (h, s, mut l) = rgb_to_hsl(color);

    let mut current = color;
    for _ in 0..=MAX_ATTEMPTS {
        if contrast_ratio(current.luminance(), bg_luminance) >= target {
            return Some(current);
        }
        l = if darken {
            (l - LIGHTNESS_STEP).max(0.0)
        } else {
            (l + LIGHTNESS_STEP).min(100.0)
        };
        current = hsl_to_rgb(h, s, l);
    }
    if contrast_ratio(current.luminance(), bg_luminance) >= target {
        Some(current)
    } else {
        None
    }
}

/// Top dominant colors via grid subsampling into a 4-bit-per-channel
/// histogram. Each returned color is the mean of its bucket.
fn dominant_colors(image: &image::RgbImage) -> Vec<HexColor> {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return Vec::new();
    }
    let step_x = (w / SAMPLE_GRID).max(1);
    let step_y = (h / SAMPLE_GRID).max(1);

    // bucket key -> (count, sum_r, sum_g, sum_b)
    let mut histogram: HashMap<u16, (u64, u64, u64, u64)> = HashMap::new();
    let mut y = 0;
    while y < h {
        let mut x = 0;
        while x < w {
            let px = image.get_pixel(x, y).0;
            let key = (u16::from(px[0] >> 4) << 8)
                | (u16::from(px[1] >> 4) << 4)
                | u16::from(px[2] >> 4);
            let entry = histogram.entry(key).or_insert((0, 0, 0, 0));
            entry.0 += 1;
            entry.1 += u64::from(px[0]);
            entry.2 += u64::from(px[1]);
            entry.3 += u64::from(px[2]);
            x += step_x;
        }
        y += step_y;
    }

    let mut buckets: Vec<_> = histogram.into_values().collect();
    buckets.sort_by(|a, b| b.0.cmp(&a.0));
    buckets
        .into_iter()
        .take(PALETTE_SIZE)
        .map(|(count, r, g, b)| {
            HexColor::from_rgb(
                (r / count) as u8,
                (g / count) as u8,
                (b / count) as u8,
            )
        })
        .collect()
}

fn mean_luminance(image: &image::RgbImage) -> f64 {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return 1.0;
    }
    let step_x = (w / SAMPLE_GRID).max(1);
    let step_y = (h / SAMPLE_GRID).max(1);

    let mut sum = 0.0;
    let mut count = 0u64;
    let mut y = 0;
    while y < h {
        let mut x = 0;
        while x < w {
            let px = image.get_pixel(x, y).0;
            sum += HexColor::from_rgb(px[0], px[1], px[2]).luminance();
            count += 1;
            x += step_x;
        }
        y += step_y;
    }
    sum / count as f64
}

/// RGB to HSL: hue in degrees 0..360, saturation and lightness 0..100.
pub fn rgb_to_hsl(color: HexColor) -> (f64, f64, f64) {
    let [r, g, b] = color.rgb();
    let r = f64::from(r) / 255.0;
    let g = f64::from(g) / 255.0;
    let b = f64::from(b) / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;
    let l = (max + min) / 2.0;

    if delta < 1e-9 {
        return (0.0, 0.0, l * 100.0);
    }

    let s = if l > 0.5 {
        delta / (2.0 - max - min)
    } else {
        delta / (max + min)
    };

    let h = if (max - r).abs() < 1e-9 {
        60.0 * (((g - b) / delta).rem_euclid(6.0))
    } else if (max - g).abs() < 1e-9 {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    (h.rem_euclid(360.0), s * 100.0, l * 100.0)
}

/// HSL back to RGB. Inputs as produced by [`rgb_to_hsl`].
pub fn hsl_to_rgb(h: f64, s: f64, l: f64) -> HexColor {
    let h = h.rem_euclid(360.0);
    let s = (s / 100.0).clamp(0.0, 1.0);
    let l = (l / 100.0).clamp(0.0, 1.0);

    let c = (1.0 - (2.0 * l - 1.0).abs()) * s;
    let x = c * (1.0 - ((h / 60.0).rem_euclid(2.0) - 1.0).abs());
    let m = l - c / 2.0;

    let (r, g, b) = match h as u32 {
        0..60 => (c, x, 0.0),
        60..120 => (x, c, 0.0),
        120..180 => (0.0, c, x),
        180..240 => (0.0, x, c),
        240..300 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };

    HexColor::from_rgb(
        ((r + m) * 255.0).round() as u8,
        ((g + m) * 255.0).round() as u8,
        ((b + m) * 255.0).round() as u8,
    )
}
