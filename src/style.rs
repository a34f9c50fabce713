use std::collections::BTreeMap;

use crate::error::{CourtsideError, CourtsideResult};

/// A numeric style field clamped to `[MIN, MAX]` on every write.
///
/// All style numbers go through this one abstraction instead of repeating the
/// validate-or-ignore pattern at each call site. Values are clamped when set
/// (including deserialization), never when read.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct Bounded<const MIN: i64, const MAX: i64>(f64);

impl<const MIN: i64, const MAX: i64> Bounded<MIN, MAX> {
    pub fn new(value: f64) -> Self {
        Self(clamp_bound::<MIN, MAX>(value))
    }

    pub fn get(self) -> f64 {
        self.0
    }

    pub fn set(&mut self, value: f64) {
        self.0 = clamp_bound::<MIN, MAX>(value);
    }

    pub const fn min() -> f64 {
        MIN as f64
    }

    pub const fn max() -> f64 {
        MAX as f64
    }
}

fn clamp_bound<const MIN: i64, const MAX: i64>(value: f64) -> f64 {
    if value.is_nan() {
        return MIN as f64;
    }
    value.clamp(MIN as f64, MAX as f64)
}

impl<'de, const MIN: i64, const MAX: i64> serde::Deserialize<'de> for Bounded<MIN, MAX> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = f64::deserialize(deserializer)?;
        Ok(Self::new(raw))
    }
}

/// Font size in virtual units for card text roles.
pub type FontSize = Bounded<12, 48>;

/// Shield (team crest) side length in virtual units.
pub type ShieldSize = Bounded<30, 100>;

/// Strict `#RRGGBB` color. Three-digit shorthand and out-of-alphabet digits
/// are rejected at parse time, so an invalid override can never replace a
/// previously valid color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HexColor {
    rgb: [u8; 3],
}

impl HexColor {
    pub const BLACK: Self = Self { rgb: [0, 0, 0] };
    pub const WHITE: Self = Self { rgb: [255, 255, 255] };

    pub const fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self { rgb: [r, g, b] }
    }

    pub fn parse(s: &str) -> CourtsideResult<Self> {
        let rest = s
            .strip_prefix('#')
            .ok_or_else(|| CourtsideError::validation("hex color must start with '#'"))?;
        if rest.len() != 6 || !rest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(CourtsideError::validation(format!(
                "hex color must be #RRGGBB, got \"{s}\""
            )));
        }

        let byte = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&rest[range], 16)
                .map_err(|_| CourtsideError::validation("invalid hex byte"))
        };
        Ok(Self {
            rgb: [byte(0..2)?, byte(2..4)?, byte(4..6)?],
        })
    }

    pub fn rgb(self) -> [u8; 3] {
        self.rgb
    }

    pub fn to_rgba8(self, opacity: f64) -> crate::core::Rgba8 {
        crate::core::Rgba8 {
            r: self.rgb[0],
            g: self.rgb[1],
            b: self.rgb[2],
            a: (opacity.clamp(0.0, 1.0) * 255.0).round() as u8,
        }
    }

    /// Relative luminance (WCAG), 0.0 for black through 1.0 for white.
    pub fn luminance(self) -> f64 {
        fn channel(c: u8) -> f64 {
            let c = f64::from(c) / 255.0;
            if c <= 0.03928 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            }
        }
        0.2126 * channel(self.rgb[0]) + 0.7152 * channel(self.rgb[1]) + 0.0722 * channel(self.rgb[2])
    }
}

impl std::fmt::Display for HexColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "#{:02X}{:02X}{:02X}",
            self.rgb[0], self.rgb[1], self.rgb[2]
        )
    }
}

impl serde::Serialize for HexColor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for HexColor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// The four text roles a card styles independently.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum TextRole {
    Competition,
    DateTime,
    TeamName,
    Score,
}

impl TextRole {
    pub const ALL: [TextRole; 4] = [
        TextRole::Competition,
        TextRole::DateTime,
        TextRole::TeamName,
        TextRole::Score,
    ];

    /// Emphasis roles demand a higher contrast ratio from derived palettes.
    pub fn is_emphasis(self) -> bool {
        matches!(self, TextRole::Competition)
    }
}

/// Text-shadow / drop-shadow descriptor in virtual units.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShadowSpec {
    pub dx: f64,
    pub dy: f64,
    pub blur: f64,
    pub color: HexColor,
    pub opacity: f64,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TextStyle {
    pub family: String,
    pub size: FontSize,
    pub weight: u16,
    pub color: HexColor,
    pub shadow: Option<ShadowSpec>,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScoreBackground {
    pub color: HexColor,
    pub opacity: f64,
}

impl ScoreBackground {
    pub fn set_opacity(&mut self, opacity: f64) {
        self.opacity = opacity.clamp(0.0, 1.0);
    }
}

/// Shield sizing: one shared size with optional per-side overrides.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShieldStyle {
    pub size: ShieldSize,
    pub local: Option<ShieldSize>,
    pub visitor: Option<ShieldSize>,
    pub shadow: Option<ShadowSpec>,
}

impl ShieldStyle {
    pub fn local_size(&self) -> f64 {
        self.local.unwrap_or(self.size).get()
    }

    pub fn visitor_size(&self) -> f64 {
        self.visitor.unwrap_or(self.size).get()
    }
}

/// Resolved style parameters consumed by the layout composer.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StyleSet {
    pub competition: TextStyle,
    pub date_time: TextStyle,
    pub team_name: TextStyle,
    pub score: TextStyle,
    pub score_background: ScoreBackground,
    pub shield: ShieldStyle,
}

impl Default for StyleSet {
    fn default() -> Self {
        let text = |size: f64, weight: u16, color: HexColor| TextStyle {
            family: "Montserrat".to_string(),
            size: FontSize::new(size),
            weight,
            color,
            shadow: None,
        };

        Self {
            competition: text(17.28, 700, HexColor::from_rgb(0x99, 0x1B, 0x1B)),
            date_time: text(17.28, 400, HexColor::from_rgb(0x1F, 0x29, 0x37)),
            team_name: text(19.44, 600, HexColor::from_rgb(0x1F, 0x29, 0x37)),
            score: text(21.6, 700, HexColor::from_rgb(0x1F, 0x29, 0x37)),
            score_background: ScoreBackground {
                color: HexColor::from_rgb(0xF3, 0xF4, 0xF6),
                opacity: 1.0,
            },
            shield: ShieldStyle {
                size: ShieldSize::new(75.0),
                local: None,
                visitor: None,
                shadow: None,
            },
        }
    }
}

impl StyleSet {
    pub fn role(&self, role: TextRole) -> &TextStyle {
        match role {
            TextRole::Competition => &self.competition,
            TextRole::DateTime => &self.date_time,
            TextRole::TeamName => &self.team_name,
            TextRole::Score => &self.score,
        }
    }

    pub fn role_mut(&mut self, role: TextRole) -> &mut TextStyle {
        match role {
            TextRole::Competition => &mut self.competition,
            TextRole::DateTime => &mut self.date_time,
            TextRole::TeamName => &mut self.team_name,
            TextRole::Score => &mut self.score,
        }
    }

    /// Merge user overrides on top of these defaults.
    ///
    /// Each field resolves independently: an override wins only if it passes
    /// its own validity check (hex colors must parse, weights must be in the
    /// CSS range); numeric sizes are clamped to their bounds rather than
    /// rejected. An invalid override leaves the default untouched.
    pub fn resolve(&self, overrides: &StyleOverrides) -> StyleSet {
        let mut out = self.clone();

        for role in TextRole::ALL {
            if let Some(raw) = overrides.colors.get(&role)
                && let Ok(color) = HexColor::parse(raw)
            {
                out.role_mut(role).color = color;
            }
            if let Some(size) = overrides.sizes.get(&role) {
                out.role_mut(role).size.set(*size);
            }
            if let Some(family) = overrides.families.get(&role)
                && !family.trim().is_empty()
            {
                out.role_mut(role).family = family.clone();
            }
            if let Some(weight) = overrides.weights.get(&role)
                && (100..=900).contains(weight)
            {
                out.role_mut(role).weight = *weight;
            }
        }

        if let Some(raw) = &overrides.score_background_color
            && let Ok(color) = HexColor::parse(raw)
        {
            out.score_background.color = color;
        }
        if let Some(op) = overrides.score_background_opacity {
            out.score_background.set_opacity(op);
        }

        if let Some(size) = overrides.shield_size {
            out.shield.size.set(size);
        }
        if let Some(size) = overrides.shield_local {
            out.shield.local = Some(ShieldSize::new(size));
        }
        if let Some(size) = overrides.shield_visitor {
            out.shield.visitor = Some(ShieldSize::new(size));
        }

        out
    }
}

/// Raw, unvalidated user overrides, exactly as collected from the UI layer.
///
/// Validation happens at [`StyleSet::resolve`] time so that a bad value can
/// never poison the stored defaults.
#[derive(Clone, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StyleOverrides {
    pub colors: BTreeMap<TextRole, String>,
    pub sizes: BTreeMap<TextRole, f64>,
    pub families: BTreeMap<TextRole, String>,
    pub weights: BTreeMap<TextRole, u16>,
    pub score_background_color: Option<String>,
    pub score_background_opacity: Option<f64>,
    pub shield_size: Option<f64>,
    pub shield_local: Option<f64>,
    pub shield_visitor: Option<f64>,
}

impl StyleOverrides {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_clamps_on_write_both_directions() {
        assert_eq!(FontSize::new(9999.0).get(), 48.0);
        assert_eq!(FontSize::new(1.0).get(), 12.0);
        assert_eq!(ShieldSize::new(-5.0).get(), 30.0);

        let mut size = FontSize::new(20.0);
        size.set(f64::INFINITY);
        assert_eq!(size.get(), 48.0);
        size.set(f64::NAN);
        assert_eq!(size.get(), 12.0);
    }

    #[test]
    fn bounded_clamps_on_deserialize() {
        let size: FontSize = serde_json::from_str("500").unwrap();
        assert_eq!(size.get(), 48.0);
    }

    #[test]
    fn hex_color_accepts_strict_six_digit_only() {
        assert!(HexColor::parse("#1A2B3C").is_ok());
        assert!(HexColor::parse("#fff").is_err());
        assert!(HexColor::parse("#ZZZZZZ").is_err());
        assert!(HexColor::parse("1A2B3C").is_err());
        assert!(HexColor::parse("#1A2B3C0").is_err());
    }

    #[test]
    fn hex_color_display_roundtrip() {
        let c = HexColor::parse("#a1b2c3").unwrap();
        assert_eq!(c.to_string(), "#A1B2C3");
        let de: HexColor = serde_json::from_str("\"#A1B2C3\"").unwrap();
        assert_eq!(de, c);
    }

    #[test]
    fn resolve_ignores_invalid_color_and_keeps_default() {
        let defaults = StyleSet::default();
        let mut overrides = StyleOverrides::default();
        overrides
            .colors
            .insert(TextRole::Competition, "#ZZZZZZ".to_string());
        overrides
            .colors
            .insert(TextRole::Score, "#1A2B3C".to_string());

        let resolved = defaults.resolve(&overrides);
        assert_eq!(resolved.competition.color, defaults.competition.color);
        assert_eq!(resolved.score.color, HexColor::from_rgb(0x1A, 0x2B, 0x3C));
    }

    #[test]
    fn resolve_clamps_numeric_overrides() {
        let defaults = StyleSet::default();
        let mut overrides = StyleOverrides::default();
        overrides.sizes.insert(TextRole::TeamName, 9999.0);
        overrides.shield_size = Some(-5.0);

        let resolved = defaults.resolve(&overrides);
        assert_eq!(resolved.team_name.size.get(), 48.0);
        assert_eq!(resolved.shield.size.get(), 30.0);
    }

    #[test]
    fn resolve_fields_are_independent() {
        let defaults = StyleSet::default();
        let mut overrides = StyleOverrides::default();
        overrides.weights.insert(TextRole::DateTime, 9000); // invalid
        overrides
            .families
            .insert(TextRole::DateTime, "Oswald".to_string());

        let resolved = defaults.resolve(&overrides);
        assert_eq!(resolved.date_time.weight, defaults.date_time.weight);
        assert_eq!(resolved.date_time.family, "Oswald");
    }

    #[test]
    fn shield_side_overrides_fall_back_to_shared_size() {
        let mut shield = StyleSet::default().shield;
        assert_eq!(shield.local_size(), 75.0);
        shield.local = Some(ShieldSize::new(40.0));
        assert_eq!(shield.local_size(), 40.0);
        assert_eq!(shield.visitor_size(), 75.0);
    }

    #[test]
    fn style_set_json_roundtrip() {
        let styles = StyleSet::default();
        let s = serde_json::to_string(&styles).unwrap();
        let de: StyleSet = serde_json::from_str(&s).unwrap();
        assert_eq!(de, styles);
    }

    #[test]
    fn luminance_endpoints() {
        assert!(HexColor::BLACK.luminance() < 1e-9);
        assert!((HexColor::WHITE.luminance() - 1.0).abs() < 1e-9);
    }
}
