//! Owned card state with synchronous persistence.
//!
//! [`StyleStore`] holds everything the user can change about a card: style
//! overrides, free text elements, corner logos, backgrounds and the selected
//! background. Every mutation clamps on write, persists its slice of state
//! through a [`KvStore`] and notifies subscribers. Persistence is
//! fire-and-forget: a failed write is logged and the in-memory state stays
//! authoritative for the session.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use anyhow::Context;
use kurbo::Vec2;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::{
    error::{CourtsideError, CourtsideResult},
    model::{Background, Logo, TextElement},
    palette::PaletteCache,
    style::{StyleOverrides, StyleSet, TextRole},
};

/// Persistence keys. One slice of state per key.
pub mod keys {
    pub const TEXT_COLORS: &str = "text-colors";
    pub const TEXT_STYLES: &str = "text-styles";
    pub const LOGOS: &str = "logos";
    pub const BACKGROUNDS: &str = "backgrounds";
    pub const SELECTED_BACKGROUND: &str = "selected-background";
    pub const SHIELD_SIZE: &str = "shield-size";
}

/// String key to JSON string storage.
pub trait KvStore {
    fn get(&self, key: &str) -> CourtsideResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> CourtsideResult<()>;
}

/// One file per key under a state directory.
#[derive(Clone, Debug)]
pub struct FsKvStore {
    dir: PathBuf,
}

impl FsKvStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KvStore for FsKvStore {
    fn get(&self, key: &str) -> CourtsideResult<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(CourtsideError::persistence(format!(
                "reading {}: {err}",
                path.display()
            ))),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> CourtsideResult<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating state dir {}", self.dir.display()))
            .map_err(|err| CourtsideError::persistence(format!("{err:#}")))?;
        let path = self.path_for(key);
        std::fs::write(&path, value)
            .with_context(|| format!("writing {}", path.display()))
            .map_err(|err| CourtsideError::persistence(format!("{err:#}")))
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Clone, Debug, Default)]
pub struct MemKvStore {
    entries: HashMap<String, String>,
}

impl MemKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KvStore for MemKvStore {
    fn get(&self, key: &str) -> CourtsideResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> CourtsideResult<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Typed change notifications delivered to subscribers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreEvent {
    StylesChanged,
    TextElementsChanged,
    LogosChanged,
    BackgroundsChanged,
    SelectionChanged,
}

pub type SubscriberId = u64;

// Non-color style state persisted together under `text-styles`.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
struct TextStylesRecord {
    overrides: StyleOverrides,
    elements: Vec<TextElement>,
}

#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
#[serde(default)]
struct ShieldRecord {
    size: Option<f64>,
    local: Option<f64>,
    visitor: Option<f64>,
}

pub struct StyleStore {
    kv: Box<dyn KvStore>,
    overrides: StyleOverrides,
    elements: Vec<TextElement>,
    logos: Vec<Logo>,
    backgrounds: Vec<Background>,
    selected_background: Option<String>,
    palette_cache: PaletteCache,
    subscribers: Vec<(SubscriberId, Box<dyn FnMut(StoreEvent)>)>,
    next_subscriber: SubscriberId,
}

impl StyleStore {
    /// Load persisted state. A missing or corrupted value falls back to its
    /// default for the session and is logged, never fatal.
    pub fn load(kv: Box<dyn KvStore>) -> Self {
        let colors: BTreeMap<TextRole, String> = read_or_default(kv.as_ref(), keys::TEXT_COLORS);
        let styles: TextStylesRecord = read_or_default(kv.as_ref(), keys::TEXT_STYLES);
        let logos: Vec<Logo> = read_or_default(kv.as_ref(), keys::LOGOS);
        let backgrounds: Vec<Background> = read_or_default(kv.as_ref(), keys::BACKGROUNDS);
        let selected: Option<String> = read_or_default(kv.as_ref(), keys::SELECTED_BACKGROUND);
        let shield: ShieldRecord = read_or_default(kv.as_ref(), keys::SHIELD_SIZE);

        let mut overrides = styles.overrides;
        overrides.colors = colors;
        overrides.shield_size = shield.size;
        overrides.shield_local = shield.local;
        overrides.shield_visitor = shield.visitor;

        Self {
            kv,
            overrides,
            elements: styles.elements,
            logos,
            backgrounds,
            selected_background: selected,
            palette_cache: PaletteCache::new(),
            subscribers: Vec::new(),
            next_subscriber: 0,
        }
    }

    // ---- read side ----

    /// Defaults merged with current overrides. Invalid overrides fall away
    /// here, so the result is always drawable.
    pub fn resolved_styles(&self) -> StyleSet {
        StyleSet::default().resolve(&self.overrides)
    }

    pub fn overrides(&self) -> &StyleOverrides {
        &self.overrides
    }

    pub fn text_elements(&self) -> &[TextElement] {
        &self.elements
    }

    pub fn text_element(&self, id: &str) -> Option<&TextElement> {
        self.elements.iter().find(|e| e.id == id)
    }

    pub fn logos(&self) -> &[Logo] {
        &self.logos
    }

    pub fn logo(&self, id: &str) -> Option<&Logo> {
        self.logos.iter().find(|l| l.id == id)
    }

    pub fn backgrounds(&self) -> &[Background] {
        &self.backgrounds
    }

    pub fn selected_background(&self) -> Option<&Background> {
        let id = self.selected_background.as_deref()?;
        self.backgrounds.iter().find(|b| b.id == id)
    }

    // ---- subscriptions ----

    pub fn subscribe(&mut self, f: impl FnMut(StoreEvent) + 'static) -> SubscriberId {
        let id = self.next_subscriber;
        self.next_subscriber += 1;
        self.subscribers.push((id, Box::new(f)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriberId) {
        self.subscribers.retain(|(sid, _)| *sid != id);
    }

    fn notify(&mut self, event: StoreEvent) {
        for (_, f) in &mut self.subscribers {
            f(event);
        }
    }

    // ---- style mutations ----

    /// Set a per-role color override. Invalid hex strings are stored as-is
    /// and simply lose at resolve time, matching the per-field validity rule.
    pub fn set_role_color(&mut self, role: TextRole, raw: impl Into<String>) {
        self.overrides.colors.insert(role, raw.into());
        self.persist_colors();
        self.notify(StoreEvent::StylesChanged);
    }

    pub fn set_role_size(&mut self, role: TextRole, size: f64) {
        self.overrides.sizes.insert(role, size);
        self.persist_text_styles();
        self.notify(StoreEvent::StylesChanged);
    }

    pub fn set_role_family(&mut self, role: TextRole, family: impl Into<String>) {
        self.overrides.families.insert(role, family.into());
        self.persist_text_styles();
        self.notify(StoreEvent::StylesChanged);
    }

    /// Set a per-role weight override. Out-of-range weights are stored as-is
    /// and lose at resolve time, like invalid colors.
    pub fn set_role_weight(&mut self, role: TextRole, weight: u16) {
        self.overrides.weights.insert(role, weight);
        self.persist_text_styles();
        self.notify(StoreEvent::StylesChanged);
    }

    pub fn set_score_background_color(&mut self, raw: impl Into<String>) {
        self.overrides.score_background_color = Some(raw.into());
        self.persist_text_styles();
        self.notify(StoreEvent::StylesChanged);
    }

    pub fn set_score_background_opacity(&mut self, opacity: f64) {
        self.overrides.score_background_opacity = Some(opacity.clamp(0.0, 1.0));
        self.persist_text_styles();
        self.notify(StoreEvent::StylesChanged);
    }

    pub fn set_shield_size(&mut self, size: f64) {
        self.overrides.shield_size = Some(size);
        self.persist_shield();
        self.notify(StoreEvent::StylesChanged);
    }

    pub fn set_shield_side_sizes(&mut self, local: Option<f64>, visitor: Option<f64>) {
        self.overrides.shield_local = local;
        self.overrides.shield_visitor = visitor;
        self.persist_shield();
        self.notify(StoreEvent::StylesChanged);
    }

    // ---- text elements ----

    pub fn upsert_text_element(&mut self, element: TextElement) {
        match self.elements.iter_mut().find(|e| e.id == element.id) {
            Some(existing) => *existing = element,
            None => self.elements.push(element),
        }
        self.persist_text_styles();
        self.notify(StoreEvent::TextElementsChanged);
    }

    pub fn remove_text_element(&mut self, id: &str) {
        self.elements.retain(|e| e.id != id);
        self.persist_text_styles();
        self.notify(StoreEvent::TextElementsChanged);
    }

    /// Move a text element. The position clamps to the canvas.
    pub fn set_text_position(&mut self, id: &str, position: Vec2) -> CourtsideResult<()> {
        let element = self
            .elements
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CourtsideError::validation(format!("no text element '{id}'")))?;
        element.set_position(position);
        self.persist_text_styles();
        self.notify(StoreEvent::TextElementsChanged);
        Ok(())
    }

    pub fn set_text_rotation(&mut self, id: &str, degrees: f64) -> CourtsideResult<()> {
        let element = self
            .elements
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CourtsideError::validation(format!("no text element '{id}'")))?;
        element.rotation = degrees;
        self.persist_text_styles();
        self.notify(StoreEvent::TextElementsChanged);
        Ok(())
    }

    pub fn set_text_content(&mut self, id: &str, text: impl Into<String>) -> CourtsideResult<()> {
        let element = self
            .elements
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CourtsideError::validation(format!("no text element '{id}'")))?;
        element.text = text.into();
        self.persist_text_styles();
        self.notify(StoreEvent::TextElementsChanged);
        Ok(())
    }

    // ---- logos ----

    pub fn upsert_logo(&mut self, logo: Logo) {
        match self.logos.iter_mut().find(|l| l.id == logo.id) {
            Some(existing) => *existing = logo,
            None => self.logos.push(logo),
        }
        self.persist_logos();
        self.notify(StoreEvent::LogosChanged);
    }

    pub fn remove_logo(&mut self, id: &str) {
        self.logos.retain(|l| l.id != id);
        self.persist_logos();
        self.notify(StoreEvent::LogosChanged);
    }

    /// Move a logo. Horizontal travel is symmetric, vertical travel follows
    /// the logo's section bounds.
    pub fn set_logo_position(&mut self, id: &str, position: Vec2) -> CourtsideResult<()> {
        let logo = self
            .logos
            .iter_mut()
            .find(|l| l.id == id)
            .ok_or_else(|| CourtsideError::validation(format!("no logo '{id}'")))?;
        logo.position = logo.section.clamp_offset(position);
        self.persist_logos();
        self.notify(StoreEvent::LogosChanged);
        Ok(())
    }

    // ---- backgrounds ----

    pub fn upsert_background(&mut self, background: Background) {
        match self.backgrounds.iter_mut().find(|b| b.id == background.id) {
            Some(existing) => *existing = background,
            None => self.backgrounds.push(background),
        }
        self.persist_backgrounds();
        self.notify(StoreEvent::BackgroundsChanged);
    }

    pub fn remove_background(&mut self, id: &str) {
        self.backgrounds.retain(|b| b.id != id);
        if self.selected_background.as_deref() == Some(id) {
            self.selected_background = None;
            self.persist_selected();
            self.notify(StoreEvent::SelectionChanged);
        }
        self.persist_backgrounds();
        self.notify(StoreEvent::BackgroundsChanged);
    }

    pub fn set_background_opacity(&mut self, id: &str, opacity: f64) -> CourtsideResult<()> {
        let background = self
            .backgrounds
            .iter_mut()
            .find(|b| b.id == id)
            .ok_or_else(|| CourtsideError::validation(format!("no background '{id}'")))?;
        background.set_opacity(opacity);
        self.persist_backgrounds();
        self.notify(StoreEvent::BackgroundsChanged);
        Ok(())
    }

    /// Select a background. Palette derivation runs here and only here: when
    /// the image bytes are available, the derived colors seed the role color
    /// overrides. Manual color edits made afterwards win (last write).
    pub fn select_background(
        &mut self,
        id: &str,
        image_bytes: Option<&[u8]>,
    ) -> CourtsideResult<()> {
        let background = self
            .backgrounds
            .iter()
            .find(|b| b.id == id)
            .ok_or_else(|| CourtsideError::validation(format!("no background '{id}'")))?;

        if let Some(bytes) = image_bytes {
            let key = background.image.raw().to_string();
            let palette = self.palette_cache.get_or_derive(&key, bytes);
            for role in TextRole::ALL {
                self.overrides
                    .colors
                    .insert(role, palette.role(role).to_string());
            }
            info!(background = id, "seeded role colors from background palette");
            self.persist_colors();
            self.notify(StoreEvent::StylesChanged);
        }

        self.selected_background = Some(id.to_string());
        self.persist_selected();
        self.notify(StoreEvent::SelectionChanged);
        Ok(())
    }

    /// Deselect the background. Role colors keep whatever they were seeded to.
    pub fn clear_background_selection(&mut self) {
        if self.selected_background.take().is_some() {
            self.persist_selected();
            self.notify(StoreEvent::SelectionChanged);
        }
    }

    // ---- persistence ----

    fn persist_colors(&mut self) {
        let value = self.overrides.colors.clone();
        self.persist(keys::TEXT_COLORS, &value);
    }

    fn persist_text_styles(&mut self) {
        let mut overrides = self.overrides.clone();
        overrides.colors.clear();
        overrides.shield_size = None;
        overrides.shield_local = None;
        overrides.shield_visitor = None;
        let record = TextStylesRecord {
            overrides,
            elements: self.elements.clone(),
        };
        self.persist(keys::TEXT_STYLES, &record);
    }

    fn persist_shield(&mut self) {
        let record = ShieldRecord {
            size: self.overrides.shield_size,
            local: self.overrides.shield_local,
            visitor: self.overrides.shield_visitor,
        };
        self.persist(keys::SHIELD_SIZE, &record);
    }

    fn persist_logos(&mut self) {
        let value = self.logos.clone();
        self.persist(keys::LOGOS, &value);
    }

    fn persist_backgrounds(&mut self) {
        let value = self.backgrounds.clone();
        self.persist(keys::BACKGROUNDS, &value);
    }

    fn persist_selected(&mut self) {
        let value = self.selected_background.clone();
        self.persist(keys::SELECTED_BACKGROUND, &value);
    }

    fn persist(&mut self, key: &str, value: &impl serde::Serialize) {
        let json = match serde_json::to_string(value) {
            Ok(json) => json,
            Err(err) => {
                warn!(key, error = %err, "failed to serialize state slice");
                return;
            }
        };
        if let Err(err) = self.kv.set(key, &json) {
            warn!(key, error = %err, "failed to persist state slice");
        }
    }
}

fn read_or_default<T: DeserializeOwned + Default>(kv: &dyn KvStore, key: &str) -> T {
    let raw = match kv.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return T::default(),
        Err(err) => {
            warn!(key, error = %err, "failed to read persisted state, using defaults");
            return T::default();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            warn!(key, error = %err, "corrupted persisted state, using defaults");
            T::default()
        }
    }
}
