//! Deterministic card layout.
//!
//! `compose_card` turns a card's games, styles, logos and free text into a
//! z-ordered list of draw operations expressed entirely in virtual canvas
//! units. The composer never touches pixels or scale factors; rasterization
//! decides those later. Composing the same inputs always yields the same
//! scene.

use std::sync::Arc;

use kurbo::{Point, Rect};

use crate::{
    assets::{ImageBank, ImageShape, PreparedImage, shadow_disc_sprite},
    core::{HALF_CANVAS, Rgba8, VIRTUAL_CANVAS},
    model::{Background, Card, FontStyle, Logo, LogoSection, TextAlign, TextElement, format_game_date, score_text},
    style::{ShadowSpec, StyleSet, TextRole, TextStyle},
};

// Vertical band occupied by match rows.
const ROWS_TOP: f64 = 140.0;
const ROWS_BOTTOM: f64 = 940.0;

// Row-internal vertical offsets from the row center.
const HEADER_COMPETITION_DY: f64 = -44.0;
const HEADER_DATE_DY: f64 = -21.0;
const TEAMS_DY: f64 = 18.0;

// Horizontal anchors within a row, offsets from the canvas center line.
const SHIELD_DX: f64 = 340.0;
const NAME_DX: f64 = 185.0;

const SCORE_PILL_WIDTH: f64 = 132.0;
const SCORE_PILL_HEIGHT: f64 = 44.0;
const SCORE_PILL_RADIUS: f64 = 10.0;

// Corner logo band anchors and sizing.
const LOGO_BAND_TOP_Y: f64 = 70.0;
const LOGO_BAND_BOTTOM_Y: f64 = 1010.0;
const LOGO_HEIGHT: f64 = 90.0;

/// One drawing instruction in virtual units. Ops are emitted back-to-front.
#[derive(Clone, Debug)]
pub enum DrawOp {
    /// Filled (optionally rounded) rectangle.
    Rect {
        rect: Rect,
        radius: f64,
        color: Rgba8,
    },
    /// Prepared image scaled into a destination rectangle.
    Image {
        image: Arc<PreparedImage>,
        dest: Rect,
        opacity: f64,
    },
    /// Single line of text, shaped at raster time.
    Text(TextOp),
}

#[derive(Clone, Debug)]
pub struct TextOp {
    pub text: String,
    pub family: String,
    /// Font size in virtual units.
    pub size: f64,
    pub weight: u16,
    pub style: FontStyle,
    pub color: Rgba8,
    /// Anchor point; `align` says how the measured box hangs off it.
    pub anchor: Point,
    pub align: TextAlign,
    /// Rotation in degrees about the anchor.
    pub rotation: f64,
}

/// A composed card, ready to rasterize at any scale.
#[derive(Clone, Debug, Default)]
pub struct CardScene {
    pub ops: Vec<DrawOp>,
}

pub fn compose_card(
    card: &Card,
    styles: &StyleSet,
    logos: &[Logo],
    background: Option<&Background>,
    texts: &[TextElement],
    bank: &mut ImageBank,
) -> CardScene {
    let mut scene = CardScene::default();

    if let Some(bg) = background {
        let image = bank.prepare(&bg.image, ImageShape::CoverSquare);
        scene.ops.push(DrawOp::Image {
            image,
            dest: Rect::new(0.0, 0.0, VIRTUAL_CANVAS, VIRTUAL_CANVAS),
            opacity: bg.opacity.clamp(0.0, 1.0),
        });
    }

    for logo in logos {
        compose_logo(&mut scene, logo, bank);
    }

    let count = card.games.len();
    for (i, game) in card.games.iter().enumerate() {
        let center_y = row_center(i, count);
        compose_row(&mut scene, game, center_y, styles, bank);
    }

    for text in texts {
        compose_text_element(&mut scene, text);
    }

    scene
}

/// Row centers are evenly distributed over the row band whatever the count,
/// so a single game sits in the middle and six games fill the band.
pub fn row_center(index: usize, count: usize) -> f64 {
    let band = ROWS_BOTTOM - ROWS_TOP;
    ROWS_TOP + band * (index as f64 + 0.5) / count.max(1) as f64
}

fn compose_logo(scene: &mut CardScene, logo: &Logo, bank: &mut ImageBank) {
    let image = bank.prepare(&logo.image, ImageShape::Original);
    if image.height == 0 {
        return;
    }
    let aspect = f64::from(image.width) / f64::from(image.height);
    let width = LOGO_HEIGHT * aspect;

    let band_y = match logo.section {
        LogoSection::Top => LOGO_BAND_TOP_Y,
        LogoSection::Bottom => LOGO_BAND_BOTTOM_Y,
    };
    let cx = HALF_CANVAS + logo.position.x;
    let cy = band_y + logo.position.y;

    scene.ops.push(DrawOp::Image {
        image,
        dest: Rect::new(
            cx - width / 2.0,
            cy - LOGO_HEIGHT / 2.0,
            cx + width / 2.0,
            cy + LOGO_HEIGHT / 2.0,
        ),
        opacity: 1.0,
    });
}

fn compose_row(
    scene: &mut CardScene,
    game: &crate::model::GameRecord,
    center_y: f64,
    styles: &StyleSet,
    bank: &mut ImageBank,
) {
    let (date_line, time) = format_game_date(game.date);

    push_role_text(
        scene,
        &game.competition_name,
        styles.role(TextRole::Competition),
        Point::new(HALF_CANVAS, center_y + HEADER_COMPETITION_DY),
    );
    push_role_text(
        scene,
        &format!("{date_line} · {time}"),
        styles.role(TextRole::DateTime),
        Point::new(HALF_CANVAS, center_y + HEADER_DATE_DY),
    );

    let teams_y = center_y + TEAMS_DY;

    compose_shield(
        scene,
        bank,
        &game.local.shield,
        styles.shield.local_size(),
        styles.shield.shadow.as_ref(),
        Point::new(HALF_CANVAS - SHIELD_DX, teams_y),
    );
    compose_shield(
        scene,
        bank,
        &game.visitor.shield,
        styles.shield.visitor_size(),
        styles.shield.shadow.as_ref(),
        Point::new(HALF_CANVAS + SHIELD_DX, teams_y),
    );

    push_role_text(
        scene,
        &game.local.name,
        styles.role(TextRole::TeamName),
        Point::new(HALF_CANVAS - NAME_DX, teams_y),
    );
    push_role_text(
        scene,
        &game.visitor.name,
        styles.role(TextRole::TeamName),
        Point::new(HALF_CANVAS + NAME_DX, teams_y),
    );

    // Score pill with "local - visitor", nulls rendered as a dash.
    scene.ops.push(DrawOp::Rect {
        rect: Rect::new(
            HALF_CANVAS - SCORE_PILL_WIDTH / 2.0,
            teams_y - SCORE_PILL_HEIGHT / 2.0,
            HALF_CANVAS + SCORE_PILL_WIDTH / 2.0,
            teams_y + SCORE_PILL_HEIGHT / 2.0,
        ),
        radius: SCORE_PILL_RADIUS,
        color: styles
            .score_background
            .color
            .to_rgba8(styles.score_background.opacity),
    });
    push_role_text(
        scene,
        &format!(
            "{} - {}",
            score_text(game.local_score),
            score_text(game.visitor_score)
        ),
        styles.role(TextRole::Score),
        Point::new(HALF_CANVAS, teams_y),
    );
}

fn compose_shield(
    scene: &mut CardScene,
    bank: &mut ImageBank,
    shield: &crate::assets::ImageRef,
    size: f64,
    shadow: Option<&ShadowSpec>,
    center: Point,
) {
    if let Some(spec) = shadow {
        let sprite = shadow_disc_sprite(
            size.round().max(1.0) as u32,
            spec.blur.round().max(1.0) as u32,
            (spec.opacity.clamp(0.0, 1.0) * 255.0).round() as u8,
        );
        let half = f64::from(sprite.width) / 2.0;
        scene.ops.push(DrawOp::Image {
            image: Arc::new(sprite),
            dest: Rect::new(
                center.x - half + spec.dx,
                center.y - half + spec.dy,
                center.x + half + spec.dx,
                center.y + half + spec.dy,
            ),
            opacity: 1.0,
        });
    }

    let image = bank.prepare(shield, ImageShape::Circle);
    let half = size / 2.0;
    scene.ops.push(DrawOp::Image {
        image,
        dest: Rect::new(
            center.x - half,
            center.y - half,
            center.x + half,
            center.y + half,
        ),
        opacity: 1.0,
    });
}

fn push_role_text(scene: &mut CardScene, text: &str, style: &TextStyle, anchor: Point) {
    if text.is_empty() {
        return;
    }
    scene.ops.push(DrawOp::Text(TextOp {
        text: text.to_string(),
        family: style.family.clone(),
        size: style.size.get(),
        weight: style.weight,
        style: FontStyle::Normal,
        color: style.color.to_rgba8(1.0),
        anchor,
        align: TextAlign::Center,
        rotation: 0.0,
    }));
}

fn compose_text_element(scene: &mut CardScene, element: &TextElement) {
    if element.text.is_empty() {
        return;
    }
    scene.ops.push(DrawOp::Text(TextOp {
        text: element.text.clone(),
        family: element.font_family.clone(),
        size: element.font_size,
        weight: element.font_weight.css_value(),
        style: element.font_style,
        color: element.color.to_rgba8(1.0),
        anchor: Point::new(
            HALF_CANVAS + element.position.x,
            HALF_CANVAS + element.position.y,
        ),
        align: element.text_align,
        rotation: element.rotation,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{ImageRef, InMemorySource};
    use crate::model::{Card, TextElement, sample_game};

    fn empty_bank() -> ImageBank {
        ImageBank::new(Box::new(InMemorySource::new()))
    }

    fn text_ops(scene: &CardScene) -> Vec<&TextOp> {
        scene
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn row_centers_are_evenly_spaced_for_any_count() {
        for count in 1..=6usize {
            let centers: Vec<f64> = (0..count).map(|i| row_center(i, count)).collect();
            if count > 1 {
                let gap = centers[1] - centers[0];
                for pair in centers.windows(2) {
                    assert!((pair[1] - pair[0] - gap).abs() < 1e-9);
                }
            }
            // symmetric within the band
            let band_mid = (ROWS_TOP + ROWS_BOTTOM) / 2.0;
            let mid = (centers[0] + centers[count - 1]) / 2.0;
            assert!((mid - band_mid).abs() < 1e-9);
        }
    }

    #[test]
    fn empty_card_composes_background_and_logos_only() {
        let card = Card::new(vec![]).unwrap();
        let background = Background {
            id: "b".to_string(),
            image: ImageRef::new("https://cdn.example.com/bg.jpg"),
            name: "bg".to_string(),
            opacity: 0.15,
        };
        let logos = vec![Logo::empty("l1", "club", LogoSection::Top)];

        let scene = compose_card(
            &card,
            &StyleSet::default(),
            &logos,
            Some(&background),
            &[],
            &mut empty_bank(),
        );
        assert_eq!(scene.ops.len(), 2);
        assert!(matches!(
            &scene.ops[0],
            DrawOp::Image { opacity, .. } if (*opacity - 0.15).abs() < 1e-9
        ));
    }

    #[test]
    fn null_score_renders_dash_and_zero_renders_zero() {
        let mut game = sample_game(1);
        game.local_score = None;
        game.visitor_score = Some(0);
        let card = Card::new(vec![game]).unwrap();

        let scene = compose_card(
            &card,
            &StyleSet::default(),
            &[],
            None,
            &[],
            &mut empty_bank(),
        );
        let scores: Vec<_> = text_ops(&scene)
            .into_iter()
            .filter(|t| t.text.contains(" - "))
            .collect();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].text, "- - 0");
    }

    #[test]
    fn background_is_painted_first_and_texts_last() {
        let card = Card::new(vec![sample_game(1)]).unwrap();
        let background = Background {
            id: "b".to_string(),
            image: ImageRef::new("https://cdn.example.com/bg.jpg"),
            name: "bg".to_string(),
            opacity: 1.0,
        };
        let overlay = TextElement::new("t1");

        let scene = compose_card(
            &card,
            &StyleSet::default(),
            &[],
            Some(&background),
            &[overlay],
            &mut empty_bank(),
        );
        assert!(matches!(&scene.ops[0], DrawOp::Image { .. }));
        assert!(matches!(scene.ops.last(), Some(DrawOp::Text(_))));
    }

    #[test]
    fn per_side_shield_sizes_apply() {
        let mut styles = StyleSet::default();
        styles.shield.local = Some(crate::style::ShieldSize::new(40.0));
        let card = Card::new(vec![sample_game(1)]).unwrap();

        let scene = compose_card(&card, &styles, &[], None, &[], &mut empty_bank());
        let shield_dests: Vec<Rect> = scene
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Image { dest, .. } => Some(*dest),
                _ => None,
            })
            .collect();
        assert_eq!(shield_dests.len(), 2);
        assert!((shield_dests[0].width() - 40.0).abs() < 1e-9);
        assert!((shield_dests[1].width() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn six_game_card_emits_rows_for_each_game() {
        let games: Vec<_> = (0..6).map(sample_game).collect();
        let card = Card::new(games).unwrap();
        let scene = compose_card(
            &card,
            &StyleSet::default(),
            &[],
            None,
            &[],
            &mut empty_bank(),
        );
        let pills = scene
            .ops
            .iter()
            .filter(|op| matches!(op, DrawOp::Rect { .. }))
            .count();
        assert_eq!(pills, 6);
    }

    #[test]
    fn free_text_rotation_and_anchor_carry_through() {
        let mut element = TextElement::new("t1");
        element.text = "Jornada 14".to_string();
        element.rotation = 12.5;
        element.set_position(kurbo::Vec2::new(100.0, -200.0));
        let card = Card::new(vec![]).unwrap();

        let scene = compose_card(
            &card,
            &StyleSet::default(),
            &[],
            None,
            &[element],
            &mut empty_bank(),
        );
        let texts = text_ops(&scene);
        assert_eq!(texts.len(), 1);
        assert!((texts[0].rotation - 12.5).abs() < 1e-9);
        assert_eq!(texts[0].anchor, Point::new(640.0, 340.0));
    }
}
