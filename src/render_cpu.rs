//! CPU rasterization of composed card scenes.
//!
//! Executes a [`CardScene`]'s draw ops against a `vello_cpu` render context
//! at an arbitrary scale. Text is shaped here, at the final pixel size, so
//! glyph outlines never go through a raster resize.

use std::sync::Arc;

use kurbo::Shape;

use crate::{
    assets::PreparedImage,
    core::{Rgba8, Scale, VIRTUAL_CANVAS},
    error::{CourtsideError, CourtsideResult},
    fonts::FontLibrary,
    layout::{CardScene, DrawOp, TextOp},
    model::TextAlign,
};

/// Rasterized card: square, row-major premultiplied RGBA8.
#[derive(Clone, Debug)]
pub struct CardBitmap {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

pub fn render_scene(
    scene: &CardScene,
    scale: Scale,
    fonts: &mut FontLibrary,
    clear: Rgba8,
) -> CourtsideResult<CardBitmap> {
    let side = scale.to_pixels(VIRTUAL_CANVAS).round() as u32;
    let side_u16: u16 = side
        .try_into()
        .map_err(|_| CourtsideError::export(format!("render size {side} exceeds u16")))?;
    if side == 0 {
        return Err(CourtsideError::export("render size is zero"));
    }

    let mut ctx = vello_cpu::RenderContext::new(side_u16, side_u16);

    // Base fill. The canvas is opaque by construction.
    ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_paint(color_to_cpu(clear));
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        0.0,
        0.0,
        f64::from(side),
        f64::from(side),
    ));

    for op in &scene.ops {
        draw_op(&mut ctx, op, scale, fonts)?;
    }

    ctx.flush();
    let mut pixmap = vello_cpu::Pixmap::new(side_u16, side_u16);
    ctx.render_to_pixmap(&mut pixmap);

    Ok(CardBitmap {
        width: side,
        height: side,
        data: pixmap.data_as_u8_slice().to_vec(),
    })
}

fn draw_op(
    ctx: &mut vello_cpu::RenderContext,
    op: &DrawOp,
    scale: Scale,
    fonts: &mut FontLibrary,
) -> CourtsideResult<()> {
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

    match op {
        DrawOp::Rect {
            rect,
            radius,
            color,
        } => {
            ctx.set_transform(affine_to_cpu(kurbo::Affine::scale(scale.factor())));
            ctx.set_paint(color_to_cpu(*color));
            if *radius > 0.0 {
                let rounded = kurbo::RoundedRect::from_rect(*rect, *radius);
                ctx.fill_path(&bezpath_to_cpu(&rounded.to_path(0.1)));
            } else {
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                    rect.x0, rect.y0, rect.x1, rect.y1,
                ));
            }
            Ok(())
        }
        DrawOp::Image {
            image,
            dest,
            opacity,
        } => {
            if image.width == 0 || image.height == 0 {
                return Ok(());
            }
            let paint = image_paint(image)?;
            let sx = scale.to_pixels(dest.width()) / f64::from(image.width);
            let sy = scale.to_pixels(dest.height()) / f64::from(image.height);
            let transform =
                kurbo::Affine::translate((scale.to_pixels(dest.x0), scale.to_pixels(dest.y0)))
                    * kurbo::Affine::scale_non_uniform(sx, sy);
            ctx.set_transform(affine_to_cpu(transform));
            ctx.set_paint(paint);

            if *opacity < 1.0 {
                ctx.push_opacity_layer(*opacity as f32);
            }
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
                0.0,
                0.0,
                f64::from(image.width),
                f64::from(image.height),
            ));
            if *opacity < 1.0 {
                ctx.pop_layer();
            }
            Ok(())
        }
        DrawOp::Text(text) => draw_text(ctx, text, scale, fonts),
    }
}

fn draw_text(
    ctx: &mut vello_cpu::RenderContext,
    op: &TextOp,
    scale: Scale,
    fonts: &mut FontLibrary,
) -> CourtsideResult<()> {
    let size_px = scale.to_pixels(op.size) as f32;
    let layout = fonts.layout_line(&op.text, &op.family, size_px, op.weight, op.style, op.color)?;
    let font = fonts.font_data(&op.family)?;

    let width = f64::from(layout.width());
    let height = f64::from(layout.height());
    let dx = match op.align {
        TextAlign::Left | TextAlign::Justify => 0.0,
        TextAlign::Center => -width / 2.0,
        TextAlign::Right => -width,
    };

    let anchor = (scale.to_pixels(op.anchor.x), scale.to_pixels(op.anchor.y));
    let transform = kurbo::Affine::translate(anchor)
        * kurbo::Affine::rotate(op.rotation.to_radians())
        * kurbo::Affine::translate((dx, -height / 2.0));
    ctx.set_transform(affine_to_cpu(transform));

    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };

            let brush = run.style().brush;
            ctx.set_paint(color_to_cpu(brush));

            let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(&font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
    Ok(())
}

fn color_to_cpu(color: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(color.r, color.g, color.b, color.a)
}

fn affine_to_cpu(a: kurbo::Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let point = |p: kurbo::Point| vello_cpu::kurbo::Point::new(p.x, p.y);
    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point(p)),
            PathEl::LineTo(p) => out.line_to(point(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point(p1), point(p2)),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(point(p1), point(p2), point(p3)),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn image_paint(image: &Arc<PreparedImage>) -> CourtsideResult<vello_cpu::Image> {
    let w: u16 = image
        .width
        .try_into()
        .map_err(|_| CourtsideError::export("image width exceeds u16"))?;
    let h: u16 = image
        .height
        .try_into()
        .map_err(|_| CourtsideError::export("image height exceeds u16"))?;
    let bytes = image.rgba8_premul.as_slice();
    if bytes.len() != image.width as usize * image.height as usize * 4 {
        return Err(CourtsideError::export("prepared image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(image.width as usize * image.height as usize);
    for px in bytes.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    let pixmap = vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, may_have_opacities);
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{ImageBank, ImageRef, InMemorySource};
    use crate::layout::compose_card;
    use crate::model::{Background, Card};
    use crate::style::StyleSet;

    fn solid_png(r: u8, g: u8, b: u8, side: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(side, side, image::Rgba([r, g, b, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    fn pixel(bitmap: &CardBitmap, x: u32, y: u32) -> [u8; 4] {
        let idx = ((y * bitmap.width + x) * 4) as usize;
        bitmap.data[idx..idx + 4].try_into().unwrap()
    }

    #[test]
    fn empty_scene_renders_clear_color() {
        let scene = CardScene::default();
        let mut fonts = FontLibrary::new();
        let bitmap =
            render_scene(&scene, Scale::from_factor(0.1), &mut fonts, Rgba8::WHITE).unwrap();
        assert_eq!((bitmap.width, bitmap.height), (108, 108));
        assert_eq!(pixel(&bitmap, 54, 54), [255, 255, 255, 255]);
    }

    #[test]
    fn scale_doubles_pixel_positions() {
        // Opaque blue background fills the whole canvas at any scale.
        let mut source = InMemorySource::new();
        source.insert("https://cdn.example.com/bg.png", solid_png(0, 0, 255, 8));
        let mut bank = ImageBank::new(Box::new(source));

        let card = Card::new(vec![]).unwrap();
        let background = Background {
            id: "b".to_string(),
            image: ImageRef::new("https://cdn.example.com/bg.png"),
            name: "bg".to_string(),
            opacity: 1.0,
        };
        let scene = compose_card(
            &card,
            &StyleSet::default(),
            &[],
            Some(&background),
            &[],
            &mut bank,
        );

        let mut fonts = FontLibrary::new();
        let small =
            render_scene(&scene, Scale::from_factor(0.1), &mut fonts, Rgba8::WHITE).unwrap();
        let large =
            render_scene(&scene, Scale::from_factor(0.2), &mut fonts, Rgba8::WHITE).unwrap();
        assert_eq!(large.width, small.width * 2);
        // Same virtual point sampled at both scales hits the background.
        assert_eq!(pixel(&small, 50, 50), pixel(&large, 100, 100));
        assert_eq!(pixel(&small, 50, 50)[2], 255);
    }

    #[test]
    fn oversized_scale_is_rejected() {
        let scene = CardScene::default();
        let mut fonts = FontLibrary::new();
        let result = render_scene(&scene, Scale::from_factor(100.0), &mut fonts, Rgba8::WHITE);
        assert!(result.is_err());
    }
}
