//! Image references, loading, and pixel-space preparation.
//!
//! Everything the compositor draws goes through [`ImageBank`], which resolves
//! a raw reference, fetches bytes from an [`ImageSource`], decodes raster or
//! SVG content into premultiplied RGBA8 and applies the requested shape
//! (circular shield mask, square background crop). Any failure along the way
//! substitutes a generated placeholder so a card never renders broken.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::warn;

use crate::error::{CourtsideError, CourtsideResult};

/// Raw image reference exactly as fetched or stored. May be invalid.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn raw(&self) -> &str {
        &self.0
    }
}

/// Outcome of reference validation. Invalid references degrade to the
/// placeholder instead of erroring.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ValidatedRef {
    Url(String),
    Placeholder,
}

impl ValidatedRef {
    /// Cache key for this reference.
    pub fn key(&self) -> &str {
        match self {
            ValidatedRef::Url(url) => url,
            ValidatedRef::Placeholder => "",
        }
    }
}

/// Validate a reference: absolute URLs pass through, protocol-relative URLs
/// get `https:`, bare host/path strings get an `https://` prefix. Anything
/// still malformed becomes the placeholder.
pub fn resolve_image_ref(image_ref: &ImageRef) -> ValidatedRef {
    let raw = image_ref.raw().trim();
    if raw.is_empty() {
        return ValidatedRef::Placeholder;
    }
    if let Some(rest) = raw.strip_prefix("//") {
        let candidate = format!("https://{rest}");
        return if is_absolute_url(&candidate) {
            ValidatedRef::Url(candidate)
        } else {
            ValidatedRef::Placeholder
        };
    }
    if is_absolute_url(raw) {
        return ValidatedRef::Url(raw.to_string());
    }
    let candidate = format!("https://{raw}");
    if is_absolute_url(&candidate) {
        ValidatedRef::Url(candidate)
    } else {
        ValidatedRef::Placeholder
    }
}

fn is_absolute_url(s: &str) -> bool {
    if s.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((scheme, rest)) = s.split_once("://") else {
        return false;
    };
    let scheme_ok = scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '.' | '-'));
    scheme_ok && !rest.is_empty() && !rest.starts_with('/')
}

/// Prepared raster image in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    fn from_raw(width: u32, height: u32, rgba8_premul: Vec<u8>) -> Self {
        debug_assert_eq!(rgba8_premul.len(), width as usize * height as usize * 4);
        Self {
            width,
            height,
            rgba8_premul: Arc::new(rgba8_premul),
        }
    }
}

/// Provides encoded bytes for a validated reference. The HTTP client itself
/// lives outside this crate; these implementations cover local mirrors and
/// tests.
pub trait ImageSource {
    fn fetch(&self, validated: &ValidatedRef) -> CourtsideResult<Vec<u8>>;
}

/// Serves references from a directory mirroring the URL path structure:
/// `https://host/a/b.png` is read from `<root>/a/b.png`.
#[derive(Clone, Debug)]
pub struct FsImageSource {
    root: PathBuf,
}

impl FsImageSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn local_path(&self, url: &str) -> CourtsideResult<PathBuf> {
        let after_scheme = url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(url);
        let path = after_scheme
            .split_once('/')
            .map(|(_, path)| path)
            .unwrap_or("");
        let rel = normalize_rel_path(path)?;
        Ok(self.root.join(rel))
    }
}

/// Normalize a URL path into a safe relative file path: `/` separators, no
/// empty or `.` segments, parent traversal rejected.
fn normalize_rel_path(source: &str) -> CourtsideResult<String> {
    let s = source.replace('\\', "/");
    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(CourtsideError::image_load(
                "image paths must not contain '..'",
            ));
        }
        out.push(part);
    }
    if out.is_empty() {
        return Err(CourtsideError::image_load("image path has no file name"));
    }
    Ok(out.join("/"))
}

impl ImageSource for FsImageSource {
    fn fetch(&self, validated: &ValidatedRef) -> CourtsideResult<Vec<u8>> {
        let ValidatedRef::Url(url) = validated else {
            return Err(CourtsideError::image_load("placeholder has no bytes"));
        };
        let path = self.local_path(url)?;
        std::fs::read(&path)
            .with_context(|| format!("reading image {}", path.display()))
            .map_err(|err| CourtsideError::image_load(format!("{err:#}")))
    }
}

/// In-memory source keyed by the validated URL. Used by tests and by callers
/// that fetched bytes themselves.
#[derive(Clone, Debug, Default)]
pub struct InMemorySource {
    entries: HashMap<String, Vec<u8>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(url.into(), bytes);
    }
}

impl ImageSource for InMemorySource {
    fn fetch(&self, validated: &ValidatedRef) -> CourtsideResult<Vec<u8>> {
        let ValidatedRef::Url(url) = validated else {
            return Err(CourtsideError::image_load("placeholder has no bytes"));
        };
        self.entries
            .get(url)
            .cloned()
            .ok_or_else(|| CourtsideError::image_load(format!("no bytes for {url}")))
    }
}

/// Pixel-space preparation applied after decode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ImageShape {
    /// As decoded.
    Original,
    /// Center-cropped to a square ("cover" fit for backgrounds).
    CoverSquare,
    /// Center-cropped square with a circular alpha mask (shields).
    Circle,
}

/// Caches prepared images per (reference, shape). Never fails outward:
/// validation, fetch and decode problems all substitute the placeholder and
/// log once per attempt.
pub struct ImageBank {
    source: Box<dyn ImageSource>,
    cache: HashMap<(String, ImageShape), Arc<PreparedImage>>,
    placeholders: HashMap<ImageShape, Arc<PreparedImage>>,
}

impl ImageBank {
    pub fn new(source: Box<dyn ImageSource>) -> Self {
        Self {
            source,
            cache: HashMap::new(),
            placeholders: HashMap::new(),
        }
    }

    pub fn prepare(&mut self, image_ref: &ImageRef, shape: ImageShape) -> Arc<PreparedImage> {
        let validated = resolve_image_ref(image_ref);
        let url = match &validated {
            ValidatedRef::Url(url) => url.clone(),
            ValidatedRef::Placeholder => return self.placeholder(shape),
        };

        let key = (url, shape);
        if let Some(prepared) = self.cache.get(&key) {
            return Arc::clone(prepared);
        }

        let prepared = match self.load_and_shape(&validated, shape) {
            Ok(img) => Arc::new(img),
            Err(err) => {
                warn!(reference = %key.0, error = %err, "image unavailable, using placeholder");
                self.placeholder(shape)
            }
        };
        self.cache.insert(key, Arc::clone(&prepared));
        prepared
    }

    fn load_and_shape(
        &mut self,
        validated: &ValidatedRef,
        shape: ImageShape,
    ) -> CourtsideResult<PreparedImage> {
        let bytes = self.source.fetch(validated)?;
        let decoded = decode_image(&bytes)?;
        Ok(apply_shape(&decoded, shape))
    }

    fn placeholder(&mut self, shape: ImageShape) -> Arc<PreparedImage> {
        Arc::clone(
            self.placeholders
                .entry(shape)
                .or_insert_with(|| Arc::new(apply_shape(&placeholder_image(), shape))),
        )
    }
}

pub fn apply_shape(image: &PreparedImage, shape: ImageShape) -> PreparedImage {
    match shape {
        ImageShape::Original => image.clone(),
        ImageShape::CoverSquare => center_crop_square(image),
        ImageShape::Circle => circular_mask(&center_crop_square(image)),
    }
}

/// Decode encoded bytes into premultiplied RGBA8. SVG content is detected by
/// sniffing and rasterized at its intrinsic size.
pub fn decode_image(bytes: &[u8]) -> CourtsideResult<PreparedImage> {
    if looks_like_svg(bytes) {
        return rasterize_svg(bytes);
    }
    let dyn_img = image::load_from_memory(bytes)
        .context("decode image from memory")
        .map_err(|err| CourtsideError::image_load(format!("{err:#}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);
    Ok(PreparedImage::from_raw(width, height, rgba8_premul))
}

fn looks_like_svg(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(1024)];
    let Ok(text) = std::str::from_utf8(head) else {
        return false;
    };
    let trimmed = text.trim_start();
    trimmed.starts_with("<svg") || (trimmed.starts_with("<?xml") && text.contains("<svg"))
}

fn rasterize_svg(bytes: &[u8]) -> CourtsideResult<PreparedImage> {
    let opts = usvg::Options::default();
    let tree = usvg::Tree::from_data(bytes, &opts)
        .map_err(|err| CourtsideError::image_load(format!("parse svg: {err}")))?;

    let size = tree.size();
    let width = size.width().ceil().max(1.0) as u32;
    let height = size.height().ceil().max(1.0) as u32;
    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| CourtsideError::image_load("failed to allocate svg pixmap"))?;

    let sx = width as f32 / size.width();
    let sy = height as f32 / size.height();
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::from_scale(sx, sy),
        &mut pixmap.as_mut(),
    );
    // tiny_skia pixmaps are already premultiplied RGBA8
    Ok(PreparedImage::from_raw(width, height, pixmap.data().to_vec()))
}

pub fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

/// Crop to the largest centered square ("cover" fit).
pub fn center_crop_square(image: &PreparedImage) -> PreparedImage {
    let side = image.width.min(image.height);
    if side == 0 || (image.width == side && image.height == side) {
        return image.clone();
    }
    let x0 = (image.width - side) / 2;
    let y0 = (image.height - side) / 2;

    let src = image.rgba8_premul.as_slice();
    let mut out = Vec::with_capacity(side as usize * side as usize * 4);
    for y in 0..side {
        let row_start = (((y0 + y) * image.width + x0) as usize) * 4;
        out.extend_from_slice(&src[row_start..row_start + side as usize * 4]);
    }
    PreparedImage::from_raw(side, side, out)
}

/// Multiply alpha by an inscribed-circle coverage mask with a one pixel
/// feathered edge. Expects a square input.
pub fn circular_mask(image: &PreparedImage) -> PreparedImage {
    let side = image.width.min(image.height);
    if side == 0 {
        return image.clone();
    }
    let center = (side as f64 - 1.0) / 2.0;
    let radius = side as f64 / 2.0;

    let mut out = image.rgba8_premul.as_slice().to_vec();
    for y in 0..side {
        for x in 0..side {
            let dx = x as f64 - center;
            let dy = y as f64 - center;
            let dist = (dx * dx + dy * dy).sqrt();
            let coverage = (radius - dist).clamp(0.0, 1.0);
            if coverage >= 1.0 {
                continue;
            }
            let idx = ((y * image.width + x) as usize) * 4;
            for c in 0..4 {
                out[idx + c] = (f64::from(out[idx + c]) * coverage).round() as u8;
            }
        }
    }
    PreparedImage::from_raw(image.width, image.height, out)
}

/// Deterministic placeholder: a neutral grey disc on a transparent square.
/// Substituted for any reference that cannot be resolved or decoded.
pub fn placeholder_image() -> PreparedImage {
    const SIDE: u32 = 128;
    const GREY: [u8; 4] = [0xD1, 0xD5, 0xDB, 0xFF];

    let mut buf = vec![0u8; (SIDE * SIDE * 4) as usize];
    let center = (SIDE as f64 - 1.0) / 2.0;
    let radius = SIDE as f64 / 2.0 - 2.0;
    for y in 0..SIDE {
        for x in 0..SIDE {
            let dx = x as f64 - center;
            let dy = y as f64 - center;
            let coverage = (radius - (dx * dx + dy * dy).sqrt()).clamp(0.0, 1.0);
            if coverage <= 0.0 {
                continue;
            }
            let idx = ((y * SIDE + x) as usize) * 4;
            for c in 0..4 {
                buf[idx + c] = (f64::from(GREY[c]) * coverage).round() as u8;
            }
        }
    }
    PreparedImage::from_raw(SIDE, SIDE, buf)
}

/// Soft drop-shadow sprite: a blurred dark disc, drawn under shields.
/// `diameter` is the shield diameter in pixels; the sprite is padded by the
/// blur radius on every side.
pub fn shadow_disc_sprite(diameter: u32, blur_radius: u32, alpha: u8) -> PreparedImage {
    let pad = blur_radius.max(1);
    let side = diameter + pad * 2;
    let mut buf = vec![0u8; (side * side * 4) as usize];

    let center = (side as f64 - 1.0) / 2.0;
    let radius = diameter as f64 / 2.0;
    for y in 0..side {
        for x in 0..side {
            let dx = x as f64 - center;
            let dy = y as f64 - center;
            let coverage = (radius - (dx * dx + dy * dy).sqrt()).clamp(0.0, 1.0);
            if coverage <= 0.0 {
                continue;
            }
            let idx = ((y * side + x) as usize) * 4;
            // premultiplied black at the given alpha
            buf[idx + 3] = (f64::from(alpha) * coverage).round() as u8;
        }
    }

    // Three box passes approximate a gaussian closely enough for a shadow.
    for _ in 0..3 {
        box_blur_premul_in_place(&mut buf, side, side, pad.div_ceil(3).max(1));
    }
    PreparedImage::from_raw(side, side, buf)
}

/// Separable box blur over premultiplied RGBA8, sliding-window per axis with
/// clamped edges.
fn box_blur_premul_in_place(buf: &mut [u8], width: u32, height: u32, radius: u32) {
    if radius == 0 || width == 0 || height == 0 {
        return;
    }
    let w = width as usize;
    let h = height as usize;
    let r = radius as usize;
    let window = (2 * r + 1) as u32;
    let mut tmp = vec![0u8; buf.len()];

    // horizontal
    for y in 0..h {
        let row = y * w;
        for c in 0..4 {
            let mut acc: u32 = 0;
            for i in -(r as isize)..=(r as isize) {
                let x = i.clamp(0, (w - 1) as isize) as usize;
                acc += u32::from(buf[(row + x) * 4 + c]);
            }
            for x in 0..w {
                tmp[(row + x) * 4 + c] = (acc / window) as u8;
                let leaving = x.saturating_sub(r);
                let entering = (x + r + 1).min(w - 1);
                acc += u32::from(buf[(row + entering) * 4 + c]);
                acc -= u32::from(buf[(row + leaving) * 4 + c]);
            }
        }
    }

    // vertical
    for x in 0..w {
        for c in 0..4 {
            let mut acc: u32 = 0;
            for i in -(r as isize)..=(r as isize) {
                let y = i.clamp(0, (h - 1) as isize) as usize;
                acc += u32::from(tmp[(y * w + x) * 4 + c]);
            }
            for y in 0..h {
                buf[(y * w + x) * 4 + c] = (acc / window) as u8;
                let leaving = y.saturating_sub(r);
                let entering = (y + r + 1).min(h - 1);
                acc += u32::from(tmp[(entering * w + x) * 4 + c]);
                acc -= u32::from(tmp[(leaving * w + x) * 4 + c]);
            }
        }
    }
}
