//! Font registration and text shaping.
//!
//! Wraps Parley's font and layout contexts behind a small library keyed by
//! family name. Card text is always a single line; callers measure the shaped
//! layout and position it themselves.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use tracing::info;

use crate::{
    core::Rgba8,
    error::{CourtsideError, CourtsideResult},
    model::FontStyle,
};

/// Brush carried through Parley layouts: straight RGBA8 text color.
pub type TextBrush = Rgba8;

pub struct FontLibrary {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrush>,
    // registered family name (lowercased) -> raw font bytes
    faces: HashMap<String, Vec<u8>>,
    font_data_cache: HashMap<String, vello_cpu::peniko::FontData>,
    default_family: Option<String>,
}

impl Default for FontLibrary {
    fn default() -> Self {
        Self::new()
    }
}

impl FontLibrary {
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            faces: HashMap::new(),
            font_data_cache: HashMap::new(),
            default_family: None,
        }
    }

    pub fn has_fonts(&self) -> bool {
        !self.faces.is_empty()
    }

    /// Register a font face from raw bytes. Returns the family name Parley
    /// reports for it. The first registered family becomes the fallback for
    /// unknown family requests.
    pub fn register_bytes(&mut self, bytes: Vec<u8>) -> CourtsideResult<String> {
        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes.clone()), None);
        let family_id = families
            .first()
            .map(|(id, _)| *id)
            .ok_or_else(|| CourtsideError::validation("no font families in font bytes"))?;
        let family_name = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| CourtsideError::validation("registered font family has no name"))?
            .to_string();

        self.faces.insert(family_name.to_lowercase(), bytes);
        if self.default_family.is_none() {
            self.default_family = Some(family_name.clone());
        }
        Ok(family_name)
    }

    /// Register every `.ttf`/`.otf` file in a directory.
    pub fn register_dir(&mut self, dir: impl AsRef<Path>) -> CourtsideResult<usize> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .with_context(|| format!("reading fonts dir {}", dir.display()))?;

        let mut count = 0;
        for entry in entries {
            let path = entry.context("reading fonts dir entry")?.path();
            let is_font = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"));
            if !is_font {
                continue;
            }
            let bytes =
                std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?;
            let family = self.register_bytes(bytes)?;
            info!(family, path = %path.display(), "registered font");
            count += 1;
        }
        Ok(count)
    }

    /// Resolve a requested family to a registered one, falling back to the
    /// default family when unknown.
    fn resolve_family(&self, family: &str) -> CourtsideResult<String> {
        let key = family.to_lowercase();
        if self.faces.contains_key(&key) {
            return Ok(family.to_string());
        }
        self.default_family
            .clone()
            .ok_or_else(|| CourtsideError::validation("no fonts registered"))
    }

    /// Font handle for glyph drawing, resolved like [`Self::resolve_family`].
    pub fn font_data(&mut self, family: &str) -> CourtsideResult<vello_cpu::peniko::FontData> {
        let resolved = self.resolve_family(family)?.to_lowercase();
        if let Some(font) = self.font_data_cache.get(&resolved) {
            return Ok(font.clone());
        }
        let bytes = self
            .faces
            .get(&resolved)
            .ok_or_else(|| CourtsideError::validation("font family not registered"))?
            .clone();
        let font =
            vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(bytes), 0);
        self.font_data_cache.insert(resolved, font.clone());
        Ok(font)
    }

    /// Shape a single line of text. The returned layout is unbroken; its
    /// `width()`/`height()` give the measured extents in pixels.
    pub fn layout_line(
        &mut self,
        text: &str,
        family: &str,
        size_px: f32,
        weight: u16,
        style: FontStyle,
        brush: TextBrush,
    ) -> CourtsideResult<parley::Layout<TextBrush>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(CourtsideError::validation(
                "text size must be finite and > 0",
            ));
        }
        let family_name = self.resolve_family(family)?;

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family_name)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::FontWeight(
            parley::style::FontWeight::new(f32::from(weight)),
        ));
        if style == FontStyle::Italic {
            builder.push_default(parley::style::StyleProperty::FontStyle(
                parley::style::FontStyle::Italic,
            ));
        }
        builder.push_default(parley::style::StyleProperty::Brush(brush));

        let mut layout: parley::Layout<TextBrush> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_library_reports_no_fonts() {
        let lib = FontLibrary::new();
        assert!(!lib.has_fonts());
        assert!(lib.resolve_family("Montserrat").is_err());
    }

    #[test]
    fn garbage_bytes_are_rejected() {
        let mut lib = FontLibrary::new();
        assert!(lib.register_bytes(b"not a font".to_vec()).is_err());
    }

    #[test]
    fn layout_without_fonts_is_an_error() {
        let mut lib = FontLibrary::new();
        let result = lib.layout_line(
            "CB Norte",
            "Montserrat",
            19.44,
            400,
            FontStyle::Normal,
            TextBrush::BLACK,
        );
        assert!(result.is_err());
    }

    #[test]
    fn missing_dir_is_an_error() {
        let mut lib = FontLibrary::new();
        assert!(lib.register_dir("/nonexistent/fonts").is_err());
    }
}
