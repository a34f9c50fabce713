//! PNG export of composed cards.
//!
//! Cards render at a fixed 4x supersample of the virtual canvas, get
//! flattened over solid white, resized with a high-quality filter to the
//! requested square resolution and written as PNG. Output files appear
//! atomically: bytes go to a temp file that is renamed into place, and the
//! temp file is removed on every failure path.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::info;

use crate::{
    core::{Rgba8, Scale},
    error::{CourtsideError, CourtsideResult},
    fonts::FontLibrary,
    layout::CardScene,
    render_cpu::{CardBitmap, render_scene},
};

/// Supersampling factor applied before the final resize.
pub const SUPERSAMPLE: f64 = 4.0;

/// Resolutions offered by the UI. Any positive value is accepted.
pub const PRESET_RESOLUTIONS: [u32; 2] = [1080, 2056];

/// Result of a finished export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportedCard {
    pub path: PathBuf,
    pub resolution: u32,
}

/// Output file name: `basketball-results[-{index}]-{res}x{res}.png`.
/// `index` is the 1-based card number, omitted for a single card.
pub fn export_file_name(index: Option<usize>, resolution: u32) -> String {
    match index {
        Some(i) => format!("basketball-results-{i}-{resolution}x{resolution}.png"),
        None => format!("basketball-results-{resolution}x{resolution}.png"),
    }
}

pub fn export_card(
    scene: &CardScene,
    fonts: &mut FontLibrary,
    out_dir: &Path,
    resolution: u32,
    index: Option<usize>,
) -> CourtsideResult<ExportedCard> {
    if resolution == 0 {
        return Err(CourtsideError::export("export resolution must be positive"));
    }

    let bitmap = render_scene(
        scene,
        Scale::from_factor(SUPERSAMPLE),
        fonts,
        Rgba8::WHITE,
    )?;
    let resized = downsample_to(&bitmap, resolution)?;

    let file_name = export_file_name(index, resolution);
    let final_path = out_dir.join(&file_name);
    let tmp_path = out_dir.join(format!(".{file_name}.tmp"));

    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating export dir {}", out_dir.display()))
        .map_err(|err| CourtsideError::export(format!("{err:#}")))?;

    let mut tmp_guard = TempFileGuard(Some(tmp_path.clone()));
    write_png(&resized, &tmp_path)?;
    std::fs::rename(&tmp_path, &final_path)
        .with_context(|| format!("moving export into place at {}", final_path.display()))
        .map_err(|err| CourtsideError::export(format!("{err:#}")))?;
    tmp_guard.0 = None;

    info!(path = %final_path.display(), resolution, "exported card");
    Ok(ExportedCard {
        path: final_path,
        resolution,
    })
}

/// Export a batch of scenes strictly in order with 1-based file indices.
/// A single scene gets no index in its file name.
pub fn export_all(
    scenes: &[CardScene],
    fonts: &mut FontLibrary,
    out_dir: &Path,
    resolution: u32,
) -> CourtsideResult<Vec<ExportedCard>> {
    let mut exported = Vec::with_capacity(scenes.len());
    for (i, scene) in scenes.iter().enumerate() {
        let index = (scenes.len() > 1).then_some(i + 1);
        exported.push(export_card(scene, fonts, out_dir, resolution, index)?);
    }
    Ok(exported)
}

/// Flatten premultiplied RGBA over white and resize to the exact target
/// square with a Catmull-Rom filter.
fn downsample_to(bitmap: &CardBitmap, resolution: u32) -> CourtsideResult<image::RgbaImage> {
    let mut flattened = Vec::with_capacity(bitmap.data.len());
    for px in bitmap.data.chunks_exact(4) {
        let a = u16::from(px[3]);
        let inv = 255 - a;
        // premultiplied source over opaque white
        flattened.push((u16::from(px[0]) + inv).min(255) as u8);
        flattened.push((u16::from(px[1]) + inv).min(255) as u8);
        flattened.push((u16::from(px[2]) + inv).min(255) as u8);
        flattened.push(255);
    }

    let img = image::RgbaImage::from_raw(bitmap.width, bitmap.height, flattened)
        .ok_or_else(|| CourtsideError::export("bitmap dimensions do not match data"))?;
    if bitmap.width == resolution && bitmap.height == resolution {
        return Ok(img);
    }
    Ok(image::imageops::resize(
        &img,
        resolution,
        resolution,
        image::imageops::FilterType::CatmullRom,
    ))
}

fn write_png(img: &image::RgbaImage, path: &Path) -> CourtsideResult<()> {
    img.save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("writing png {}", path.display()))
        .map_err(|err| CourtsideError::export(format!("{err:#}")))
}

struct TempFileGuard(Option<PathBuf>);

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if let Some(path) = self.0.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names_follow_the_pattern() {
        assert_eq!(
            export_file_name(None, 1080),
            "basketball-results-1080x1080.png"
        );
        assert_eq!(
            export_file_name(Some(2), 2056),
            "basketball-results-2-2056x2056.png"
        );
    }

    #[test]
    fn zero_resolution_is_rejected() {
        let mut fonts = FontLibrary::new();
        let err = export_card(
            &CardScene::default(),
            &mut fonts,
            Path::new("/tmp"),
            0,
            None,
        )
        .unwrap_err();
        assert!(matches!(err, CourtsideError::Export(_)));
    }

    #[test]
    fn flatten_maps_transparency_to_white() {
        let bitmap = CardBitmap {
            width: 1,
            height: 1,
            data: vec![0, 0, 0, 0],
        };
        let img = downsample_to(&bitmap, 1).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn flatten_keeps_opaque_pixels() {
        let bitmap = CardBitmap {
            width: 1,
            height: 1,
            data: vec![10, 20, 30, 255],
        };
        let img = downsample_to(&bitmap, 1).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn resize_hits_exact_target() {
        let bitmap = CardBitmap {
            width: 8,
            height: 8,
            data: vec![255; 8 * 8 * 4],
        };
        let img = downsample_to(&bitmap, 5).unwrap();
        assert_eq!(img.dimensions(), (5, 5));
    }
}
